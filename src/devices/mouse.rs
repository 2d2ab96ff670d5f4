//! Virtual mouse: a relative device for motion/buttons/wheels plus an
//! absolute sibling for cursor warps, like real pointer hardware pairs.

use serde::{Deserialize, Serialize};

use super::{DeviceCore, VirtualDevice};
use crate::caps::{DeviceCapabilities, DeviceDefinition};
use crate::error::{InputError, Result};
use crate::event::*;
use crate::state::EventBatch;

/// One wheel detent in high-resolution units, per the Windows Vista wheel
/// design document the convention originates from.
pub const WHEEL_CLICK: i32 = 120;

const ABS_GRID_MAX: i32 = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Side,
    Extra,
}

impl MouseButton {
    fn code(self) -> u16 {
        match self {
            MouseButton::Left => BTN_LEFT,
            MouseButton::Middle => BTN_MIDDLE,
            MouseButton::Right => BTN_RIGHT,
            MouseButton::Side => BTN_SIDE,
            MouseButton::Extra => BTN_EXTRA,
        }
    }
}

pub struct Mouse {
    rel: DeviceCore,
    abs: DeviceCore,
}

impl Mouse {
    pub fn default_definition() -> DeviceDefinition {
        DeviceDefinition::new("haamu virtual mouse", 0xAB00, 0xAB01, 0xAB00)
    }

    pub fn create(def: &DeviceDefinition) -> Result<Self> {
        let rel = DeviceCore::create(def, DeviceCapabilities::mouse_rel())?;
        let mut abs_def = def.clone();
        abs_def.name = format!("{} (absolute)", def.name);
        let abs = DeviceCore::create(&abs_def, DeviceCapabilities::mouse_abs())?;
        Ok(Self { rel, abs })
    }

    pub fn create_default() -> Result<Self> {
        Self::create(&Self::default_definition())
    }

    /// Move the pointer by a relative delta in pixels.
    pub fn move_rel(&mut self, delta_x: i32, delta_y: i32) -> Result<()> {
        let mut batch = EventBatch::new();
        self.rel.sync.push_rel(&mut batch, REL_X, delta_x);
        self.rel.sync.push_rel(&mut batch, REL_Y, delta_y);
        self.rel.commit(batch)
    }

    /// Warp the pointer to an absolute screen position, rescaled at runtime
    /// against the given screen dimensions.
    pub fn move_abs(&mut self, x: i32, y: i32, screen_width: i32, screen_height: i32) -> Result<()> {
        if screen_width <= 0 {
            return Err(InputError::OutOfRange {
                field: "screen_width",
                value: screen_width as f64,
                min: 1.0,
                max: i32::MAX as f64,
            });
        }
        if screen_height <= 0 {
            return Err(InputError::OutOfRange {
                field: "screen_height",
                value: screen_height as f64,
                min: 1.0,
                max: i32::MAX as f64,
            });
        }
        check_screen_coord("x", x, screen_width)?;
        check_screen_coord("y", y, screen_height)?;

        let mut batch = EventBatch::new();
        self.abs
            .sync
            .set_abs(&mut batch, ABS_X, scale_to_grid(x, screen_width));
        self.abs
            .sync
            .set_abs(&mut batch, ABS_Y, scale_to_grid(y, screen_height));
        self.abs.commit(batch)
    }

    pub fn press(&mut self, button: MouseButton) -> Result<()> {
        self.set_button(button, true)
    }

    pub fn release(&mut self, button: MouseButton) -> Result<()> {
        self.set_button(button, false)
    }

    fn set_button(&mut self, button: MouseButton, pressed: bool) -> Result<()> {
        let mut batch = EventBatch::new();
        self.rel.sync.set_key(&mut batch, button.code(), pressed);
        self.rel.commit(batch)
    }

    /// Scroll vertically by a high-resolution distance; ±120 is one wheel
    /// click, fractions accumulate on the caller's side. Positive scrolls
    /// down, so the value is negated onto the kernel's up-positive wheel.
    pub fn vertical_scroll(&mut self, high_res_distance: i32) -> Result<()> {
        self.scroll(REL_WHEEL, REL_WHEEL_HI_RES, -high_res_distance)
    }

    /// Scroll horizontally; positive scrolls right.
    pub fn horizontal_scroll(&mut self, high_res_distance: i32) -> Result<()> {
        self.scroll(REL_HWHEEL, REL_HWHEEL_HI_RES, high_res_distance)
    }

    fn scroll(&mut self, wheel: u16, wheel_hi_res: u16, distance: i32) -> Result<()> {
        let mut batch = EventBatch::new();
        self.rel.sync.push_rel(&mut batch, wheel_hi_res, distance);
        self.rel
            .sync
            .push_rel(&mut batch, wheel, distance / WHEEL_CLICK);
        self.rel.commit(batch)
    }

    /// Close both kernel devices. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        self.rel.handle.close();
        self.abs.handle.close();
    }
}

impl VirtualDevice for Mouse {
    fn nodes(&self) -> Vec<String> {
        let mut nodes = self.rel.handle.nodes().to_vec();
        nodes.extend_from_slice(self.abs.handle.nodes());
        nodes
    }
}

fn check_screen_coord(field: &'static str, value: i32, limit: i32) -> Result<()> {
    if value < 0 || value > limit {
        return Err(InputError::OutOfRange {
            field,
            value: value as f64,
            min: 0.0,
            max: limit as f64,
        });
    }
    Ok(())
}

fn scale_to_grid(value: i32, limit: i32) -> i32 {
    ((value as i64 * ABS_GRID_MAX as i64) / limit as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_coordinates_rescale_onto_the_abs_grid() {
        assert_eq!(scale_to_grid(0, 1920), 0);
        assert_eq!(scale_to_grid(1920, 1920), ABS_GRID_MAX);
        assert_eq!(scale_to_grid(960, 1920), ABS_GRID_MAX / 2);
    }

    #[test]
    fn coordinates_outside_the_screen_are_rejected() {
        assert!(check_screen_coord("x", -1, 1920).is_err());
        assert!(check_screen_coord("x", 1921, 1920).is_err());
        assert!(check_screen_coord("x", 1920, 1920).is_ok());
    }
}
