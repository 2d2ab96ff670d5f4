//! Virtual joypads: a closed set of vendor variants selected by tag, all
//! composed over the same capability/state/encoder/registrar components.
//!
//! The caller reports the full pressed-button mask each time; buttons that
//! disappeared from the mask are released automatically. The D-pad is a hat
//! axis pair, as the real drivers expose it.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DeviceCore, VirtualDevice, lock};
use crate::caps::{DeviceCapabilities, DeviceDefinition};
use crate::error::{InputError, Result};
use crate::event::*;
use crate::feedback::{CallbackRegistry, FeedbackListener};
use crate::state::{EventBatch, StateSynchronizer};

/// Pressed-button flags for [`Joypad::set_pressed_buttons`].
pub mod button {
    pub const DPAD_UP: u32 = 0x0001;
    pub const DPAD_DOWN: u32 = 0x0002;
    pub const DPAD_LEFT: u32 = 0x0004;
    pub const DPAD_RIGHT: u32 = 0x0008;

    pub const START: u32 = 0x0010;
    pub const BACK: u32 = 0x0020;
    pub const HOME: u32 = 0x0400;

    pub const LEFT_STICK: u32 = 0x0040;
    pub const RIGHT_STICK: u32 = 0x0080;
    pub const LEFT_BUTTON: u32 = 0x0100;
    pub const RIGHT_BUTTON: u32 = 0x0200;

    pub const PADDLE1: u32 = 0x010000;
    pub const PADDLE2: u32 = 0x020000;
    pub const PADDLE3: u32 = 0x040000;
    pub const PADDLE4: u32 = 0x080000;
    /// Touchpad click, Sony pads only.
    pub const TOUCHPAD: u32 = 0x100000;
    /// Share/capture/mute class of extra buttons.
    pub const MISC: u32 = 0x200000;

    pub const A: u32 = 0x1000;
    pub const B: u32 = 0x2000;
    pub const X: u32 = 0x4000;
    pub const Y: u32 = 0x8000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoypadVariant {
    Generic,
    XboxOne,
    SwitchPro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stick {
    Left,
    Right,
}

pub struct Joypad {
    variant: JoypadVariant,
    // Listener is declared before `inner` so teardown joins it first.
    listener: Option<FeedbackListener>,
    registry: Arc<CallbackRegistry>,
    inner: Arc<Mutex<JoypadInner>>,
}

struct JoypadInner {
    core: DeviceCore,
    buttons: u32,
}

impl Joypad {
    pub fn default_definition(variant: JoypadVariant) -> DeviceDefinition {
        match variant {
            JoypadVariant::Generic => {
                DeviceDefinition::new("Generic USB Gamepad", 0x0079, 0x0006, 0x0110)
            }
            JoypadVariant::XboxOne => {
                DeviceDefinition::new("Microsoft X-Box One pad", 0x045e, 0x02ea, 0x0408)
            }
            JoypadVariant::SwitchPro => {
                DeviceDefinition::new("Nintendo Switch Pro Controller", 0x057e, 0x2009, 0x8111)
            }
        }
    }

    pub fn create(variant: JoypadVariant, def: &DeviceDefinition) -> Result<Self> {
        let caps = match variant {
            JoypadVariant::Generic => DeviceCapabilities::generic_pad(),
            JoypadVariant::XboxOne => DeviceCapabilities::xbox_pad(),
            JoypadVariant::SwitchPro => DeviceCapabilities::switch_pad(),
        };
        let has_feedback = caps.has_feedback();
        let core = DeviceCore::create(def, caps)?;
        let registry = Arc::new(CallbackRegistry::default());

        let listener = if has_feedback {
            let fd = core.handle.raw_fd().ok_or(InputError::ClosedDevice)?;
            Some(FeedbackListener::spawn(fd, Arc::clone(&registry))?)
        } else {
            None
        };

        Ok(Self {
            variant,
            listener,
            registry,
            inner: Arc::new(Mutex::new(JoypadInner { core, buttons: 0 })),
        })
    }

    pub fn xbox_one() -> Result<Self> {
        Self::create(
            JoypadVariant::XboxOne,
            &Self::default_definition(JoypadVariant::XboxOne),
        )
    }

    pub fn switch_pro() -> Result<Self> {
        Self::create(
            JoypadVariant::SwitchPro,
            &Self::default_definition(JoypadVariant::SwitchPro),
        )
    }

    pub fn generic() -> Result<Self> {
        Self::create(
            JoypadVariant::Generic,
            &Self::default_definition(JoypadVariant::Generic),
        )
    }

    pub fn variant(&self) -> JoypadVariant {
        self.variant
    }

    /// The mask most recently passed to [`Joypad::set_pressed_buttons`].
    pub fn pressed_buttons(&self) -> u32 {
        lock(&self.inner).buttons
    }

    /// Set the complete pressed-button state; cleared buttons are released.
    pub fn set_pressed_buttons(&self, buttons: u32) -> Result<()> {
        let mut inner = lock(&self.inner);
        let mut batch = EventBatch::new();
        apply_button_mask(&mut inner.core.sync, button_map(self.variant), buttons, &mut batch);
        inner.buttons = buttons;
        inner.core.commit(batch)
    }

    /// Move a stick; both axes take the full signed 16-bit range.
    pub fn set_stick(&self, stick: Stick, x: i16, y: i16) -> Result<()> {
        let (code_x, code_y) = match stick {
            Stick::Left => (ABS_X, ABS_Y),
            Stick::Right => (ABS_RX, ABS_RY),
        };
        let mut inner = lock(&self.inner);
        let mut batch = EventBatch::new();
        inner.core.sync.set_abs(&mut batch, code_x, x as i32);
        inner.core.sync.set_abs(&mut batch, code_y, y as i32);
        inner.core.commit(batch)
    }

    /// Set the triggers; the full unsigned 16-bit range is rescaled onto
    /// whatever the variant declares (the Switch pad has digital triggers).
    pub fn set_triggers(&self, left: u16, right: u16) -> Result<()> {
        let mut inner = lock(&self.inner);
        let mut batch = EventBatch::new();
        match self.variant {
            JoypadVariant::XboxOne => {
                inner
                    .core
                    .sync
                    .set_abs(&mut batch, ABS_Z, scale_unsigned(left, 1023));
                inner
                    .core
                    .sync
                    .set_abs(&mut batch, ABS_RZ, scale_unsigned(right, 1023));
            }
            JoypadVariant::Generic => {
                inner
                    .core
                    .sync
                    .set_abs(&mut batch, ABS_Z, scale_unsigned(left, 255));
                inner
                    .core
                    .sync
                    .set_abs(&mut batch, ABS_RZ, scale_unsigned(right, 255));
            }
            JoypadVariant::SwitchPro => {
                inner.core.sync.set_key(&mut batch, BTN_TL2, left > 0);
                inner.core.sync.set_key(&mut batch, BTN_TR2, right > 0);
            }
        }
        inner.core.commit(batch)
    }

    /// Register the rumble callback; registering again replaces the
    /// previous one. Fails on variants without force feedback.
    pub fn set_on_rumble(
        &self,
        callback: impl Fn(u16, u16) + Send + Sync + 'static,
    ) -> Result<()> {
        if self.listener.is_none() {
            return Err(InputError::UnsupportedCapability {
                event_type: EV_FF,
                code: 0,
            });
        }
        debug!("rumble callback registered");
        self.registry.set_rumble(Arc::new(callback));
        Ok(())
    }

    /// Unregister the rumble callback; later feedback is dropped.
    pub fn clear_on_rumble(&self) {
        self.registry.clear_rumble();
    }

    /// Close the device: the feedback listener is joined first, so no
    /// callback can race the teardown.
    pub fn close(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.stop();
        }
        lock(&self.inner).core.handle.close();
    }
}

impl Drop for Joypad {
    fn drop(&mut self) {
        self.close();
    }
}

impl VirtualDevice for Joypad {
    fn nodes(&self) -> Vec<String> {
        lock(&self.inner).core.handle.nodes().to_vec()
    }
}

/// Flag-to-key table of a variant; the D-pad is handled as hat axes.
pub(crate) fn button_map(variant: JoypadVariant) -> &'static [(u32, u16)] {
    const BASE: [(u32, u16); 11] = [
        (button::A, BTN_SOUTH),
        (button::B, BTN_EAST),
        (button::X, BTN_NORTH),
        (button::Y, BTN_WEST),
        (button::LEFT_BUTTON, BTN_TL),
        (button::RIGHT_BUTTON, BTN_TR),
        (button::START, BTN_START),
        (button::BACK, BTN_SELECT),
        (button::HOME, BTN_MODE),
        (button::LEFT_STICK, BTN_THUMBL),
        (button::RIGHT_STICK, BTN_THUMBR),
    ];
    const XBOX: [(u32, u16); 16] = [
        BASE[0],
        BASE[1],
        BASE[2],
        BASE[3],
        BASE[4],
        BASE[5],
        BASE[6],
        BASE[7],
        BASE[8],
        BASE[9],
        BASE[10],
        (button::PADDLE1, BTN_TRIGGER_HAPPY5),
        (button::PADDLE2, BTN_TRIGGER_HAPPY6),
        (button::PADDLE3, BTN_TRIGGER_HAPPY7),
        (button::PADDLE4, BTN_TRIGGER_HAPPY8),
        (button::MISC, KEY_RECORD),
    ];
    const SWITCH: [(u32, u16); 12] = [
        BASE[0],
        BASE[1],
        BASE[2],
        BASE[3],
        BASE[4],
        BASE[5],
        BASE[6],
        BASE[7],
        BASE[8],
        BASE[9],
        BASE[10],
        (button::MISC, BTN_Z), // capture button
    ];
    match variant {
        JoypadVariant::Generic => &BASE,
        JoypadVariant::XboxOne => &XBOX,
        JoypadVariant::SwitchPro => &SWITCH,
    }
}

/// Diff a full button mask into the synchronizer: per-button presses and
/// releases plus the hat axis pair for the D-pad.
pub(crate) fn apply_button_mask(
    sync: &mut StateSynchronizer,
    map: &[(u32, u16)],
    mask: u32,
    batch: &mut EventBatch,
) {
    for &(flag, code) in map {
        sync.set_key(batch, code, mask & flag != 0);
    }
    sync.set_abs(
        batch,
        ABS_HAT0X,
        hat_axis(mask, button::DPAD_RIGHT, button::DPAD_LEFT),
    );
    sync.set_abs(
        batch,
        ABS_HAT0Y,
        hat_axis(mask, button::DPAD_DOWN, button::DPAD_UP),
    );
}

fn hat_axis(mask: u32, positive: u32, negative: u32) -> i32 {
    (mask & positive != 0) as i32 - (mask & negative != 0) as i32
}

/// Rescale an unsigned 16-bit input onto a declared axis range.
pub(crate) fn scale_unsigned(value: u16, max: i32) -> i32 {
    (value as i64 * max as i64 / u16::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Change;

    #[test]
    fn clearing_the_mask_releases_exactly_what_was_pressed() {
        let mut sync = StateSynchronizer::new();
        let map = button_map(JoypadVariant::XboxOne);

        let mut batch = EventBatch::new();
        apply_button_mask(
            &mut sync,
            map,
            button::A | button::B | button::DPAD_UP,
            &mut batch,
        );

        let mut batch = EventBatch::new();
        apply_button_mask(&mut sync, map, 0, &mut batch);
        let changes = batch.finish();

        let releases: Vec<u16> = changes
            .iter()
            .filter_map(|c| match c {
                Change::Key {
                    code,
                    pressed: false,
                } => Some(*code),
                _ => None,
            })
            .collect();
        assert_eq!(releases, vec![BTN_SOUTH, BTN_EAST]);
        assert!(changes.contains(&Change::Abs {
            code: ABS_HAT0Y,
            value: 0,
        }));
        // Nothing else moves: no presses, no HAT0X change.
        assert!(!changes.iter().any(|c| matches!(
            c,
            Change::Key { pressed: true, .. } | Change::Abs { code: ABS_HAT0X, .. }
        )));
    }

    #[test]
    fn dpad_maps_onto_the_hat_axes() {
        assert_eq!(hat_axis(button::DPAD_RIGHT, button::DPAD_RIGHT, button::DPAD_LEFT), 1);
        assert_eq!(hat_axis(button::DPAD_LEFT, button::DPAD_RIGHT, button::DPAD_LEFT), -1);
        assert_eq!(
            hat_axis(
                button::DPAD_LEFT | button::DPAD_RIGHT,
                button::DPAD_RIGHT,
                button::DPAD_LEFT
            ),
            0
        );
    }

    #[test]
    fn unsigned_rescale_hits_both_endpoints() {
        assert_eq!(scale_unsigned(0, 1023), 0);
        assert_eq!(scale_unsigned(u16::MAX, 1023), 1023);
        assert_eq!(scale_unsigned(u16::MAX, 255), 255);
        assert_eq!(scale_unsigned(0x8000, 255), 127);
    }

    #[test]
    fn variant_maps_stay_inside_their_capability_sets() {
        for variant in [
            JoypadVariant::Generic,
            JoypadVariant::XboxOne,
            JoypadVariant::SwitchPro,
        ] {
            let caps = match variant {
                JoypadVariant::Generic => crate::caps::DeviceCapabilities::generic_pad(),
                JoypadVariant::XboxOne => crate::caps::DeviceCapabilities::xbox_pad(),
                JoypadVariant::SwitchPro => crate::caps::DeviceCapabilities::switch_pad(),
            };
            for &(_, code) in button_map(variant) {
                assert!(caps.supports_key(code), "{:?} missing key {:#x}", variant, code);
            }
        }
    }
}
