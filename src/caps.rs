//! Device definitions and the capability descriptors built from them.
//!
//! A [`DeviceCapabilities`] value declares everything a virtual device will
//! ever emit: key codes, absolute axes with their ranges, relative axes,
//! force-feedback effects, input properties. Building one is pure (no kernel
//! call); the registrar turns it into the uinput ioctl sequence and the
//! encoder checks every outgoing event against it.

use crate::event::*;
use crate::keymap;
use crate::uinput::input_absinfo;
use serde::{Deserialize, Serialize};

/// Identity of a virtual device, supplied by the caller at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDefinition {
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
    /// Physical path reported to consumers, empty for none.
    #[serde(default)]
    pub phys: String,
    /// Unique identifier, empty for none.
    #[serde(default)]
    pub uniq: String,
}

impl DeviceDefinition {
    pub fn new(name: impl Into<String>, vendor_id: u16, product_id: u16, version: u16) -> Self {
        Self {
            name: name.into(),
            vendor_id,
            product_id,
            version,
            phys: String::new(),
            uniq: String::new(),
        }
    }

    pub fn with_phys(mut self, phys: impl Into<String>) -> Self {
        self.phys = phys.into();
        self
    }

    pub fn with_uniq(mut self, uniq: impl Into<String>) -> Self {
        self.uniq = uniq.into();
        self
    }
}

/// One absolute axis declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsAxis {
    pub code: u16,
    pub min: i32,
    pub max: i32,
    #[serde(default)]
    pub fuzz: i32,
    #[serde(default)]
    pub flat: i32,
    #[serde(default)]
    pub resolution: i32,
}

impl AbsAxis {
    pub const fn new(code: u16, min: i32, max: i32) -> Self {
        Self {
            code,
            min,
            max,
            fuzz: 0,
            flat: 0,
            resolution: 0,
        }
    }

    pub const fn with_fuzz(mut self, fuzz: i32, flat: i32) -> Self {
        self.fuzz = fuzz;
        self.flat = flat;
        self
    }

    pub const fn with_resolution(mut self, resolution: i32) -> Self {
        self.resolution = resolution;
        self
    }

    pub(crate) fn absinfo(&self) -> input_absinfo {
        input_absinfo {
            value: 0,
            minimum: self.min,
            maximum: self.max,
            fuzz: self.fuzz,
            flat: self.flat,
            resolution: self.resolution,
        }
    }
}

/// Everything a device class advertises to the kernel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub bus_type: BusType,
    pub keys: Vec<u16>,
    pub abs_axes: Vec<AbsAxis>,
    pub rel_axes: Vec<u16>,
    pub ff_effects: Vec<u16>,
    pub ff_effects_max: u32,
    pub leds: Vec<u16>,
    pub misc: Vec<u16>,
    pub props: Vec<u16>,
    /// Multitouch slot capacity, if the class tracks contacts.
    pub mt_slots: Option<usize>,
    /// Let the kernel autorepeat held keys.
    pub autorepeat: bool,
}

impl DeviceCapabilities {
    pub fn supports_key(&self, code: u16) -> bool {
        self.keys.contains(&code)
    }

    pub fn supports_rel(&self, code: u16) -> bool {
        self.rel_axes.contains(&code)
    }

    pub fn abs_axis(&self, code: u16) -> Option<&AbsAxis> {
        self.abs_axes.iter().find(|a| a.code == code)
    }

    pub fn has_feedback(&self) -> bool {
        !self.ff_effects.is_empty() || !self.leds.is_empty()
    }
}

// Touch surface geometry shared by the touchscreen and trackpad classes.
pub const TOUCH_MAX_X: i32 = 19200;
pub const TOUCH_MAX_Y: i32 = 10800;
pub const TOUCH_PRESSURE_MAX: i32 = 253;
pub const TOUCHSCREEN_SLOTS: usize = 16;
pub const TRACKPAD_SLOTS: usize = 10;

// Pen tablet axis ranges.
pub const PEN_PRESSURE_MAX: i32 = 4096;
pub const PEN_DISTANCE_MAX: i32 = 1024;

// DualSense touchpad surface.
pub const PS5_TOUCHPAD_WIDTH: i32 = 1920;
pub const PS5_TOUCHPAD_HEIGHT: i32 = 1080;
pub const PS5_TOUCHPAD_SLOTS: usize = 2;

// DualSense-style stick/trigger axes.
pub const PS5_AXIS_MAX: i32 = 255;

// Motion sensor scaling, matching what hid-playstation advertises.
pub const ACCEL_RES_PER_G: i32 = 8192;
pub const ACCEL_RANGE: i32 = 32768;
pub const GYRO_RES_PER_DEG_S: i32 = 1024;
pub const GYRO_RANGE: i32 = 2097152;

const STICK_FUZZ: i32 = 16;
const STICK_FLAT: i32 = 128;

fn mt_axes(max_x: i32, max_y: i32, slots: usize, pressure: bool, orientation: bool) -> Vec<AbsAxis> {
    let mut axes = vec![
        AbsAxis::new(ABS_MT_SLOT, 0, slots as i32 - 1),
        AbsAxis::new(ABS_MT_TRACKING_ID, 0, 65535),
        AbsAxis::new(ABS_X, 0, max_x),
        AbsAxis::new(ABS_MT_POSITION_X, 0, max_x),
        AbsAxis::new(ABS_Y, 0, max_y),
        AbsAxis::new(ABS_MT_POSITION_Y, 0, max_y),
    ];
    if pressure {
        axes.push(AbsAxis::new(ABS_PRESSURE, 0, TOUCH_PRESSURE_MAX));
        axes.push(AbsAxis::new(ABS_MT_PRESSURE, 0, TOUCH_PRESSURE_MAX));
    }
    if orientation {
        axes.push(AbsAxis::new(ABS_MT_ORIENTATION, -90, 90));
    }
    axes
}

impl DeviceCapabilities {
    /// Full keyboard: every key in the VK translation table, kernel autorepeat.
    pub fn keyboard() -> Self {
        Self {
            bus_type: BusType::Usb,
            keys: keymap::keyboard_key_codes(),
            autorepeat: true,
            ..Default::default()
        }
    }

    /// Relative half of the mouse pair: motion, buttons, wheels.
    pub fn mouse_rel() -> Self {
        Self {
            bus_type: BusType::Usb,
            keys: vec![BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, BTN_SIDE, BTN_EXTRA],
            rel_axes: vec![
                REL_X,
                REL_Y,
                REL_WHEEL,
                REL_HWHEEL,
                REL_WHEEL_HI_RES,
                REL_HWHEEL_HI_RES,
            ],
            ..Default::default()
        }
    }

    /// Absolute half of the mouse pair: a fixed 0..65535 grid the class
    /// rescales screen coordinates onto.
    pub fn mouse_abs() -> Self {
        Self {
            bus_type: BusType::Usb,
            keys: vec![BTN_LEFT],
            abs_axes: vec![
                AbsAxis::new(ABS_X, 0, 65535),
                AbsAxis::new(ABS_Y, 0, 65535),
            ],
            props: vec![INPUT_PROP_POINTER],
            ..Default::default()
        }
    }

    pub fn touchscreen() -> Self {
        Self {
            bus_type: BusType::Usb,
            keys: vec![BTN_LEFT, BTN_TOUCH],
            abs_axes: mt_axes(TOUCH_MAX_X, TOUCH_MAX_Y, TOUCHSCREEN_SLOTS, true, true),
            props: vec![INPUT_PROP_DIRECT],
            mt_slots: Some(TOUCHSCREEN_SLOTS),
            ..Default::default()
        }
    }

    pub fn trackpad() -> Self {
        Self {
            bus_type: BusType::Usb,
            keys: vec![
                BTN_LEFT,
                BTN_TOUCH,
                BTN_TOOL_FINGER,
                BTN_TOOL_DOUBLETAP,
                BTN_TOOL_TRIPLETAP,
                BTN_TOOL_QUADTAP,
                BTN_TOOL_QUINTTAP,
            ],
            abs_axes: mt_axes(TOUCH_MAX_X, TOUCH_MAX_Y, TRACKPAD_SLOTS, true, true),
            props: vec![INPUT_PROP_POINTER, INPUT_PROP_BUTTONPAD],
            mt_slots: Some(TRACKPAD_SLOTS),
            ..Default::default()
        }
    }

    pub fn pen_tablet() -> Self {
        Self {
            bus_type: BusType::Usb,
            keys: vec![
                BTN_TOOL_PEN,
                BTN_TOOL_RUBBER,
                BTN_TOOL_BRUSH,
                BTN_TOOL_PENCIL,
                BTN_TOOL_AIRBRUSH,
                BTN_TOOL_FINGER,
                BTN_TOUCH,
                BTN_STYLUS,
                BTN_STYLUS2,
                BTN_STYLUS3,
            ],
            abs_axes: vec![
                AbsAxis::new(ABS_X, 0, TOUCH_MAX_X),
                AbsAxis::new(ABS_Y, 0, TOUCH_MAX_Y),
                AbsAxis::new(ABS_PRESSURE, 0, PEN_PRESSURE_MAX),
                AbsAxis::new(ABS_DISTANCE, 0, PEN_DISTANCE_MAX),
                AbsAxis::new(ABS_TILT_X, -90, 90),
                AbsAxis::new(ABS_TILT_Y, -90, 90),
            ],
            props: vec![INPUT_PROP_DIRECT],
            ..Default::default()
        }
    }

    /// Xbox One pad, laid out the way xpad exposes the real thing: analog
    /// triggers, hat D-pad, paddles and the share button.
    pub fn xbox_pad() -> Self {
        Self {
            bus_type: BusType::Usb,
            keys: vec![
                BTN_SOUTH,
                BTN_EAST,
                BTN_NORTH,
                BTN_WEST,
                BTN_TL,
                BTN_TR,
                BTN_SELECT,
                BTN_START,
                BTN_MODE,
                BTN_THUMBL,
                BTN_THUMBR,
                BTN_TRIGGER_HAPPY5,
                BTN_TRIGGER_HAPPY6,
                BTN_TRIGGER_HAPPY7,
                BTN_TRIGGER_HAPPY8,
                KEY_RECORD,
            ],
            abs_axes: vec![
                AbsAxis::new(ABS_X, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_Y, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_RX, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_RY, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_Z, 0, 1023),
                AbsAxis::new(ABS_RZ, 0, 1023),
                AbsAxis::new(ABS_HAT0X, -1, 1),
                AbsAxis::new(ABS_HAT0Y, -1, 1),
            ],
            ff_effects: vec![FF_RUMBLE, FF_PERIODIC, FF_CONSTANT, FF_RAMP, FF_SINE, FF_GAIN],
            ff_effects_max: 16,
            ..Default::default()
        }
    }

    /// Switch Pro pad: digital ZL/ZR, no analog triggers, a capture button.
    pub fn switch_pad() -> Self {
        Self {
            bus_type: BusType::Usb,
            keys: vec![
                BTN_SOUTH,
                BTN_EAST,
                BTN_NORTH,
                BTN_WEST,
                BTN_TL,
                BTN_TR,
                BTN_TL2,
                BTN_TR2,
                BTN_SELECT,
                BTN_START,
                BTN_MODE,
                BTN_THUMBL,
                BTN_THUMBR,
                BTN_Z,
            ],
            abs_axes: vec![
                AbsAxis::new(ABS_X, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_Y, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_RX, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_RY, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_HAT0X, -1, 1),
                AbsAxis::new(ABS_HAT0Y, -1, 1),
            ],
            ff_effects: vec![FF_RUMBLE, FF_PERIODIC, FF_SINE, FF_GAIN],
            ff_effects_max: 16,
            ..Default::default()
        }
    }

    /// Plain USB gamepad without vendor extras.
    pub fn generic_pad() -> Self {
        Self {
            bus_type: BusType::Usb,
            keys: vec![
                BTN_SOUTH,
                BTN_EAST,
                BTN_NORTH,
                BTN_WEST,
                BTN_TL,
                BTN_TR,
                BTN_SELECT,
                BTN_START,
                BTN_MODE,
                BTN_THUMBL,
                BTN_THUMBR,
            ],
            abs_axes: vec![
                AbsAxis::new(ABS_X, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_Y, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_RX, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_RY, -32768, 32767).with_fuzz(STICK_FUZZ, STICK_FLAT),
                AbsAxis::new(ABS_Z, 0, 255),
                AbsAxis::new(ABS_RZ, 0, 255),
                AbsAxis::new(ABS_HAT0X, -1, 1),
                AbsAxis::new(ABS_HAT0Y, -1, 1),
            ],
            ..Default::default()
        }
    }

    /// DualSense gamepad node: DS-style 0..255 sticks and triggers, trigger
    /// buttons coupled to the analog values, lightbar LED channels.
    pub fn ps5_gamepad() -> Self {
        Self {
            bus_type: BusType::Bluetooth,
            keys: vec![
                BTN_SOUTH,
                BTN_EAST,
                BTN_NORTH,
                BTN_WEST,
                BTN_TL,
                BTN_TR,
                BTN_TL2,
                BTN_TR2,
                BTN_SELECT,
                BTN_START,
                BTN_MODE,
                BTN_THUMBL,
                BTN_THUMBR,
                KEY_MICMUTE,
            ],
            abs_axes: vec![
                AbsAxis::new(ABS_X, 0, PS5_AXIS_MAX),
                AbsAxis::new(ABS_Y, 0, PS5_AXIS_MAX),
                AbsAxis::new(ABS_RX, 0, PS5_AXIS_MAX),
                AbsAxis::new(ABS_RY, 0, PS5_AXIS_MAX),
                AbsAxis::new(ABS_Z, 0, PS5_AXIS_MAX),
                AbsAxis::new(ABS_RZ, 0, PS5_AXIS_MAX),
                AbsAxis::new(ABS_HAT0X, -1, 1),
                AbsAxis::new(ABS_HAT0Y, -1, 1),
            ],
            ff_effects: vec![FF_RUMBLE, FF_PERIODIC, FF_CONSTANT, FF_RAMP, FF_SINE, FF_GAIN],
            ff_effects_max: 16,
            leds: vec![LED_MISC, LED_MAIL, LED_CHARGING],
            ..Default::default()
        }
    }

    /// DualSense motion node: accelerometer + gyroscope.
    pub fn ps5_motion() -> Self {
        Self {
            bus_type: BusType::Bluetooth,
            abs_axes: vec![
                AbsAxis::new(ABS_X, -ACCEL_RANGE, ACCEL_RANGE).with_resolution(ACCEL_RES_PER_G),
                AbsAxis::new(ABS_Y, -ACCEL_RANGE, ACCEL_RANGE).with_resolution(ACCEL_RES_PER_G),
                AbsAxis::new(ABS_Z, -ACCEL_RANGE, ACCEL_RANGE).with_resolution(ACCEL_RES_PER_G),
                AbsAxis::new(ABS_RX, -GYRO_RANGE, GYRO_RANGE).with_resolution(GYRO_RES_PER_DEG_S),
                AbsAxis::new(ABS_RY, -GYRO_RANGE, GYRO_RANGE).with_resolution(GYRO_RES_PER_DEG_S),
                AbsAxis::new(ABS_RZ, -GYRO_RANGE, GYRO_RANGE).with_resolution(GYRO_RES_PER_DEG_S),
            ],
            misc: vec![MSC_TIMESTAMP],
            props: vec![INPUT_PROP_ACCELEROMETER],
            ..Default::default()
        }
    }

    /// DualSense touchpad node: two contacts on a 1920x1080 surface.
    pub fn ps5_touchpad() -> Self {
        Self {
            bus_type: BusType::Bluetooth,
            keys: vec![BTN_LEFT, BTN_TOUCH, BTN_TOOL_FINGER, BTN_TOOL_DOUBLETAP],
            abs_axes: vec![
                AbsAxis::new(ABS_MT_SLOT, 0, PS5_TOUCHPAD_SLOTS as i32 - 1),
                AbsAxis::new(ABS_MT_TRACKING_ID, 0, 65535),
                AbsAxis::new(ABS_X, 0, PS5_TOUCHPAD_WIDTH),
                AbsAxis::new(ABS_MT_POSITION_X, 0, PS5_TOUCHPAD_WIDTH),
                AbsAxis::new(ABS_Y, 0, PS5_TOUCHPAD_HEIGHT),
                AbsAxis::new(ABS_MT_POSITION_Y, 0, PS5_TOUCHPAD_HEIGHT),
            ],
            props: vec![INPUT_PROP_POINTER, INPUT_PROP_BUTTONPAD],
            mt_slots: Some(PS5_TOUCHPAD_SLOTS),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_classes_declare_their_slot_tables() {
        let ts = DeviceCapabilities::touchscreen();
        assert_eq!(ts.mt_slots, Some(TOUCHSCREEN_SLOTS));
        let slot_axis = ts.abs_axis(ABS_MT_SLOT).unwrap();
        assert_eq!(slot_axis.max, TOUCHSCREEN_SLOTS as i32 - 1);

        let tp = DeviceCapabilities::trackpad();
        assert_eq!(tp.mt_slots, Some(TRACKPAD_SLOTS));
        assert!(tp.supports_key(BTN_TOOL_QUINTTAP));
    }

    #[test]
    fn keyboard_declares_every_mapped_key() {
        let caps = DeviceCapabilities::keyboard();
        assert!(caps.autorepeat);
        assert!(caps.supports_key(28)); // KEY_ENTER
        assert!(!caps.supports_key(BTN_SOUTH));
    }

    #[test]
    fn pad_variants_differ_in_trigger_treatment() {
        let xbox = DeviceCapabilities::xbox_pad();
        assert!(xbox.abs_axis(ABS_Z).is_some());
        assert!(!xbox.supports_key(BTN_TL2));

        let switch = DeviceCapabilities::switch_pad();
        assert!(switch.abs_axis(ABS_Z).is_none());
        assert!(switch.supports_key(BTN_TL2));
    }

    #[test]
    fn feedback_is_declared_only_where_it_exists() {
        assert!(DeviceCapabilities::xbox_pad().has_feedback());
        assert!(DeviceCapabilities::ps5_gamepad().has_feedback());
        assert!(!DeviceCapabilities::generic_pad().has_feedback());
        assert!(!DeviceCapabilities::keyboard().has_feedback());
    }

    #[test]
    fn device_definition_round_trips_through_json() {
        let def = DeviceDefinition::new("pad", 0x045e, 0x02ea, 0x0408).with_uniq("00:11:22:33:44:55");
        let json = serde_json::to_string(&def).unwrap();
        let back: DeviceDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(def, back);
    }
}
