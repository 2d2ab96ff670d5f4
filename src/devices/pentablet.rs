//! Virtual pen tablet, following the libinput tablet-support model: tool
//! proximity transitions, pressure or distance (never both), tilt axes.

use serde::{Deserialize, Serialize};

use super::{DeviceCore, VirtualDevice};
use crate::caps::{
    DeviceCapabilities, DeviceDefinition, PEN_DISTANCE_MAX, PEN_PRESSURE_MAX, TOUCH_MAX_X,
    TOUCH_MAX_Y,
};
use crate::error::{InputError, Result};
use crate::event::*;
use crate::state::EventBatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenTool {
    Pen,
    Eraser,
    Brush,
    Pencil,
    Airbrush,
    Touch,
    /// Real tools don't re-report their type while it is unchanged.
    SameAsBefore,
}

impl PenTool {
    fn code(self) -> Option<u16> {
        match self {
            PenTool::Pen => Some(BTN_TOOL_PEN),
            PenTool::Eraser => Some(BTN_TOOL_RUBBER),
            PenTool::Brush => Some(BTN_TOOL_BRUSH),
            PenTool::Pencil => Some(BTN_TOOL_PENCIL),
            PenTool::Airbrush => Some(BTN_TOOL_AIRBRUSH),
            PenTool::Touch => Some(BTN_TOOL_FINGER),
            PenTool::SameAsBefore => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenButton {
    Primary,
    Secondary,
    Tertiary,
}

impl PenButton {
    fn code(self) -> u16 {
        match self {
            PenButton::Primary => BTN_STYLUS,
            PenButton::Secondary => BTN_STYLUS2,
            PenButton::Tertiary => BTN_STYLUS3,
        }
    }
}

pub struct PenTablet {
    core: DeviceCore,
    current_tool: Option<u16>,
}

impl PenTablet {
    pub fn default_definition() -> DeviceDefinition {
        DeviceDefinition::new("haamu virtual pen tablet", 0xAB00, 0xAB04, 0xAB00)
    }

    pub fn create(def: &DeviceDefinition) -> Result<Self> {
        let core = DeviceCore::create(def, DeviceCapabilities::pen_tablet())?;
        Ok(Self {
            core,
            current_tool: None,
        })
    }

    pub fn create_default() -> Result<Self> {
        Self::create(&Self::default_definition())
    }

    /// Report the tool state. `x`, `y`, `pressure` and `distance` are
    /// normalised to [0.0, 1.0]; a negative `pressure` or `distance`
    /// discards that axis (a tool reports one or the other, not both).
    /// Tilt is in degrees within ±90.
    pub fn place_tool(
        &mut self,
        tool: PenTool,
        x: f64,
        y: f64,
        pressure: f64,
        distance: f64,
        tilt_x: f64,
        tilt_y: f64,
    ) -> Result<()> {
        check_unit("x", x)?;
        check_unit("y", y)?;
        if pressure >= 0.0 {
            check_unit("pressure", pressure)?;
        }
        if distance >= 0.0 {
            check_unit("distance", distance)?;
        }
        check_tilt("tilt_x", tilt_x)?;
        check_tilt("tilt_y", tilt_y)?;

        let mut batch = EventBatch::new();

        // Tool proximity transitions: release the previous tool before the
        // new one reports.
        if let Some(new_tool) = tool.code() {
            if self.current_tool != Some(new_tool) {
                if let Some(old_tool) = self.current_tool {
                    self.core.sync.set_key(&mut batch, old_tool, false);
                }
                self.core.sync.set_key(&mut batch, new_tool, true);
                self.current_tool = Some(new_tool);
            }
        }

        let sync = &mut self.core.sync;
        sync.set_abs(&mut batch, ABS_X, scale(x, TOUCH_MAX_X));
        sync.set_abs(&mut batch, ABS_Y, scale(y, TOUCH_MAX_Y));
        if pressure >= 0.0 {
            sync.set_abs(&mut batch, ABS_PRESSURE, scale(pressure, PEN_PRESSURE_MAX));
        }
        if distance >= 0.0 {
            sync.set_abs(&mut batch, ABS_DISTANCE, scale(distance, PEN_DISTANCE_MAX));
        }
        sync.set_abs(&mut batch, ABS_TILT_X, tilt_x.round() as i32);
        sync.set_abs(&mut batch, ABS_TILT_Y, tilt_y.round() as i32);

        // Contact is what pressure says it is.
        sync.set_key(&mut batch, BTN_TOUCH, pressure > 0.0);

        self.core.commit(batch)
    }

    /// Press or release a barrel button.
    pub fn set_btn(&mut self, button: PenButton, pressed: bool) -> Result<()> {
        let mut batch = EventBatch::new();
        self.core.sync.set_key(&mut batch, button.code(), pressed);
        self.core.commit(batch)
    }

    /// Close the kernel device. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        self.core.handle.close();
    }
}

impl VirtualDevice for PenTablet {
    fn nodes(&self) -> Vec<String> {
        self.core.handle.nodes().to_vec()
    }
}

fn scale(value: f64, max: i32) -> i32 {
    (value * max as f64).round() as i32
}

fn check_unit(field: &'static str, value: f64) -> Result<()> {
    if value.is_nan() || value < 0.0 || value > 1.0 {
        return Err(InputError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(())
}

fn check_tilt(field: &'static str, value: f64) -> Result<()> {
    if value.is_nan() || value < -90.0 || value > 90.0 {
        return Err(InputError::OutOfRange {
            field,
            value,
            min: -90.0,
            max: 90.0,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_map_to_their_proximity_buttons() {
        assert_eq!(PenTool::Pen.code(), Some(BTN_TOOL_PEN));
        assert_eq!(PenTool::Eraser.code(), Some(BTN_TOOL_RUBBER));
        assert_eq!(PenTool::SameAsBefore.code(), None);
    }

    #[test]
    fn unit_axes_are_bounded() {
        assert!(check_unit("x", 0.0).is_ok());
        assert!(check_unit("x", 1.0).is_ok());
        assert!(check_unit("x", -0.1).is_err());
        assert!(check_unit("pressure", 1.5).is_err());
    }

    #[test]
    fn tilt_is_bounded_to_ninety_degrees() {
        assert!(check_tilt("tilt_x", 90.0).is_ok());
        assert!(check_tilt("tilt_x", -90.0).is_ok());
        assert!(check_tilt("tilt_x", 90.5).is_err());
    }
}
