//! DualSense joypad: a composite of three kernel devices (gamepad, motion
//! sensors, touchpad), mirroring the sub-node layout the real driver
//! exposes. The three share one generated MAC identity, used as `phys` and
//! `uniq` so consumers can correlate the nodes.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::joypad::{apply_button_mask, button, scale_unsigned};
use super::{DeviceCore, VirtualDevice, lock};
use crate::caps::{
    ACCEL_RANGE, ACCEL_RES_PER_G, DeviceCapabilities, DeviceDefinition, GYRO_RANGE,
    GYRO_RES_PER_DEG_S, PS5_AXIS_MAX, PS5_TOUCHPAD_HEIGHT, PS5_TOUCHPAD_SLOTS, PS5_TOUCHPAD_WIDTH,
};
use crate::error::{InputError, Result};
use crate::event::*;
use crate::feedback::{CallbackRegistry, FeedbackListener};
use crate::state::{EventBatch, TouchConfig, TouchPoint};

pub use super::joypad::Stick;

const STANDARD_GRAVITY: f64 = 9.80665;

/// Which motion sensor a [`PS5Joypad::set_motion`] call reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionType {
    /// m/s², inclusive of gravity. Axis assignment follows SDL's sensor
    /// convention.
    Acceleration,
    /// deg/s.
    Gyroscope,
}

/// Battery states as the DualSense reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryState {
    Discharging = 0x0,
    Charging = 0x1,
    Full = 0x2,
    VoltageOrTemperatureOutOfRange = 0xA,
    TemperatureError = 0xB,
    ChargingError = 0xF,
}

pub struct PS5Joypad {
    // Listener is declared before `inner` so teardown joins it first.
    listener: Option<FeedbackListener>,
    registry: Arc<CallbackRegistry>,
    inner: Arc<Mutex<Ps5Inner>>,
    mac_address: String,
}

struct Ps5Inner {
    gamepad: DeviceCore,
    motion: DeviceCore,
    touchpad: DeviceCore,
    battery: (BatteryState, u8),
}

impl PS5Joypad {
    pub fn default_definition() -> DeviceDefinition {
        DeviceDefinition::new(
            "Sony Interactive Entertainment DualSense Wireless Controller",
            0x054c,
            0x0ce6,
            0x8111,
        )
    }

    pub fn create(def: &DeviceDefinition) -> Result<Self> {
        let mac_address = generate_mac();

        let mut gamepad_def = def.clone();
        if gamepad_def.phys.is_empty() {
            gamepad_def.phys = mac_address.clone();
        }
        if gamepad_def.uniq.is_empty() {
            gamepad_def.uniq = mac_address.clone();
        }
        let mut motion_def = gamepad_def.clone();
        motion_def.name = format!("{} Motion Sensors", def.name);
        let mut touchpad_def = gamepad_def.clone();
        touchpad_def.name = format!("{} Touchpad", def.name);

        let gamepad = DeviceCore::create(&gamepad_def, DeviceCapabilities::ps5_gamepad())?;
        let motion = DeviceCore::create(&motion_def, DeviceCapabilities::ps5_motion())?;
        let touchpad = DeviceCore::create_with_touch(
            &touchpad_def,
            DeviceCapabilities::ps5_touchpad(),
            TouchConfig {
                slots: PS5_TOUCHPAD_SLOTS,
                max_x: PS5_TOUCHPAD_WIDTH,
                max_y: PS5_TOUCHPAD_HEIGHT,
                pressure_max: None,
                orientation: false,
                tool_buttons: true,
            },
        )?;

        let registry = Arc::new(CallbackRegistry::default());
        let fd = gamepad.handle.raw_fd().ok_or(InputError::ClosedDevice)?;
        let listener = FeedbackListener::spawn(fd, Arc::clone(&registry))?;

        debug!("DualSense composite up, mac {}", mac_address);

        Ok(Self {
            listener: Some(listener),
            registry,
            inner: Arc::new(Mutex::new(Ps5Inner {
                gamepad,
                motion,
                touchpad,
                // Full until the caller reports otherwise, so consumers
                // don't raise low-battery warnings at startup.
                battery: (BatteryState::Full, 100),
            })),
            mac_address,
        })
    }

    pub fn create_default() -> Result<Self> {
        Self::create(&Self::default_definition())
    }

    /// Generated controller MAC address, also used as the `uniq` identity
    /// of every sub-device.
    pub fn get_mac_address(&self) -> &str {
        &self.mac_address
    }

    /// Sysfs directories of the composite's kernel devices.
    pub fn get_sys_nodes(&self) -> Vec<String> {
        let inner = lock(&self.inner);
        [
            &inner.gamepad.handle,
            &inner.motion.handle,
            &inner.touchpad.handle,
        ]
        .iter()
        .map(|h| h.sys_path().to_string_lossy().to_string())
        .collect()
    }

    /// Set the complete pressed-button state; cleared buttons are released.
    /// The touchpad click lives on the touchpad sub-device.
    pub fn set_pressed_buttons(&self, buttons: u32) -> Result<()> {
        let mut inner = lock(&self.inner);

        let mut batch = EventBatch::new();
        apply_button_mask(&mut inner.gamepad.sync, PS5_BUTTON_MAP, buttons, &mut batch);
        inner.gamepad.commit(batch)?;

        let mut batch = EventBatch::new();
        inner
            .touchpad
            .sync
            .set_key(&mut batch, BTN_LEFT, buttons & button::TOUCHPAD != 0);
        inner.touchpad.commit(batch)
    }

    /// Move a stick; full signed 16-bit input, rescaled onto the DS-style
    /// 0..255 axes.
    pub fn set_stick(&self, stick: Stick, x: i16, y: i16) -> Result<()> {
        let (code_x, code_y) = match stick {
            Stick::Left => (ABS_X, ABS_Y),
            Stick::Right => (ABS_RX, ABS_RY),
        };
        let mut inner = lock(&self.inner);
        let mut batch = EventBatch::new();
        inner.gamepad.sync.set_abs(&mut batch, code_x, stick_raw(x));
        inner.gamepad.sync.set_abs(&mut batch, code_y, stick_raw(y));
        inner.gamepad.commit(batch)
    }

    /// Set the triggers; like the real pad, the digital L2/R2 buttons
    /// follow the analog values.
    pub fn set_triggers(&self, left: u16, right: u16) -> Result<()> {
        let mut inner = lock(&self.inner);
        let mut batch = EventBatch::new();
        inner
            .gamepad
            .sync
            .set_abs(&mut batch, ABS_Z, scale_unsigned(left, PS5_AXIS_MAX));
        inner
            .gamepad
            .sync
            .set_abs(&mut batch, ABS_RZ, scale_unsigned(right, PS5_AXIS_MAX));
        inner.gamepad.sync.set_key(&mut batch, BTN_TL2, left > 0);
        inner.gamepad.sync.set_key(&mut batch, BTN_TR2, right > 0);
        inner.gamepad.commit(batch)
    }

    /// Place or move a touchpad contact; raw pad coordinates.
    pub fn place_finger(&self, finger_nr: usize, x: u16, y: u16) -> Result<()> {
        if x as i32 > PS5_TOUCHPAD_WIDTH {
            return Err(InputError::OutOfRange {
                field: "x",
                value: x as f64,
                min: 0.0,
                max: PS5_TOUCHPAD_WIDTH as f64,
            });
        }
        if y as i32 > PS5_TOUCHPAD_HEIGHT {
            return Err(InputError::OutOfRange {
                field: "y",
                value: y as f64,
                min: 0.0,
                max: PS5_TOUCHPAD_HEIGHT as f64,
            });
        }
        let mut inner = lock(&self.inner);
        let mut batch = EventBatch::new();
        inner.touchpad.sync.place(
            &mut batch,
            finger_nr,
            TouchPoint {
                x: x as f64 / PS5_TOUCHPAD_WIDTH as f64,
                y: y as f64 / PS5_TOUCHPAD_HEIGHT as f64,
                pressure: 0.0,
                orientation: 0.0,
            },
        )?;
        inner.touchpad.commit(batch)
    }

    /// Lift a touchpad contact. Releasing an already-released finger is a
    /// no-op.
    pub fn release_finger(&self, finger_nr: usize) -> Result<()> {
        let mut inner = lock(&self.inner);
        let mut batch = EventBatch::new();
        inner.touchpad.sync.release(&mut batch, finger_nr)?;
        inner.touchpad.commit(batch)
    }

    /// Report motion data onto the motion sub-device. Values beyond the
    /// sensor's advertised range saturate, as real hardware does.
    pub fn set_motion(&self, motion: MotionType, x: f32, y: f32, z: f32) -> Result<()> {
        let mut inner = lock(&self.inner);
        let mut batch = EventBatch::new();
        match motion {
            MotionType::Acceleration => {
                inner.motion.sync.set_abs(&mut batch, ABS_X, accel_raw(x));
                inner.motion.sync.set_abs(&mut batch, ABS_Y, accel_raw(y));
                inner.motion.sync.set_abs(&mut batch, ABS_Z, accel_raw(z));
            }
            MotionType::Gyroscope => {
                inner.motion.sync.set_abs(&mut batch, ABS_RX, gyro_raw(x));
                inner.motion.sync.set_abs(&mut batch, ABS_RY, gyro_raw(y));
                inner.motion.sync.set_abs(&mut batch, ABS_RZ, gyro_raw(z));
            }
        }
        inner.motion.commit(batch)
    }

    /// Record the reported battery state. uinput has no battery channel, so
    /// this is caller-visible state only; it never produces feedback.
    pub fn set_battery(&self, state: BatteryState, percentage: u8) -> Result<()> {
        if percentage > 100 {
            return Err(InputError::OutOfRange {
                field: "percentage",
                value: percentage as f64,
                min: 0.0,
                max: 100.0,
            });
        }
        let mut inner = lock(&self.inner);
        inner.battery = (state, percentage);
        debug!("battery reported: {:?} {}%", state, percentage);
        Ok(())
    }

    /// Last reported battery state.
    pub fn battery(&self) -> (BatteryState, u8) {
        lock(&self.inner).battery
    }

    /// Register the rumble callback; registering again replaces the
    /// previous one.
    pub fn set_on_rumble(&self, callback: impl Fn(u16, u16) + Send + Sync + 'static) {
        debug!("rumble callback registered");
        self.registry.set_rumble(Arc::new(callback));
    }

    /// Unregister the rumble callback; later feedback is dropped.
    pub fn clear_on_rumble(&self) {
        self.registry.clear_rumble();
    }

    /// Register the lightbar callback; registering again replaces the
    /// previous one.
    pub fn set_on_led(&self, callback: impl Fn(u8, u8, u8) + Send + Sync + 'static) {
        debug!("led callback registered");
        self.registry.set_led(Arc::new(callback));
    }

    /// Unregister the lightbar callback; later feedback is dropped.
    pub fn clear_on_led(&self) {
        self.registry.clear_led();
    }

    /// Close the composite: the feedback listener is joined first, then all
    /// three kernel devices are released. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.stop();
        }
        let mut inner = lock(&self.inner);
        inner.gamepad.handle.close();
        inner.motion.handle.close();
        inner.touchpad.handle.close();
    }
}

impl Drop for PS5Joypad {
    fn drop(&mut self) {
        self.close();
    }
}

impl VirtualDevice for PS5Joypad {
    fn nodes(&self) -> Vec<String> {
        let inner = lock(&self.inner);
        let mut nodes = inner.gamepad.handle.nodes().to_vec();
        nodes.extend_from_slice(inner.motion.handle.nodes());
        nodes.extend_from_slice(inner.touchpad.handle.nodes());
        nodes
    }
}

/// Gamepad-node buttons. L2/R2 are driven by `set_triggers`, the touchpad
/// click by the touchpad sub-device.
const PS5_BUTTON_MAP: &[(u32, u16)] = &[
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
    (button::MISC, KEY_MICMUTE),
];

fn generate_mac() -> String {
    let raw: u128 = ulid::Ulid::new().into();
    let bytes = raw.to_be_bytes();
    let mut mac = [
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ];
    // Locally administered, unicast.
    mac[0] = (mac[0] & 0xFE) | 0x02;
    mac.map(|b| format!("{:02x}", b)).join(":")
}

fn stick_raw(value: i16) -> i32 {
    ((value as i64 + 32768) * PS5_AXIS_MAX as i64 / 65535) as i32
}

fn accel_raw(value: f32) -> i32 {
    let raw = (value as f64 / STANDARD_GRAVITY * ACCEL_RES_PER_G as f64).round();
    raw.clamp(-(ACCEL_RANGE as f64), ACCEL_RANGE as f64) as i32
}

fn gyro_raw(value: f32) -> i32 {
    let raw = (value as f64 * GYRO_RES_PER_DEG_S as f64).round();
    raw.clamp(-(GYRO_RANGE as f64), GYRO_RANGE as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_mac_is_local_unicast() {
        let mac = generate_mac();
        assert_eq!(mac.len(), 17);
        assert_eq!(mac.split(':').count(), 6);
        let first = u8::from_str_radix(&mac[0..2], 16).unwrap();
        assert_eq!(first & 0x01, 0); // unicast
        assert_eq!(first & 0x02, 0x02); // locally administered
    }

    #[test]
    fn sticks_rescale_onto_the_ds_axis_range() {
        assert_eq!(stick_raw(i16::MIN), 0);
        assert_eq!(stick_raw(i16::MAX), 255);
        assert_eq!(stick_raw(0), 127);
    }

    #[test]
    fn one_g_hits_the_advertised_resolution() {
        assert_eq!(accel_raw(STANDARD_GRAVITY as f32), ACCEL_RES_PER_G);
        assert_eq!(accel_raw(0.0), 0);
        // Saturates at the advertised ±4g range.
        assert_eq!(accel_raw(1000.0), ACCEL_RANGE);
        assert_eq!(accel_raw(-1000.0), -ACCEL_RANGE);
    }

    #[test]
    fn gyro_scales_by_degrees_per_second() {
        assert_eq!(gyro_raw(1.0), GYRO_RES_PER_DEG_S);
        assert_eq!(gyro_raw(-2.0), -2 * GYRO_RES_PER_DEG_S);
        assert_eq!(gyro_raw(1.0e9), GYRO_RANGE);
    }

    #[test]
    fn button_map_stays_inside_the_gamepad_capability_set() {
        let caps = DeviceCapabilities::ps5_gamepad();
        for &(_, code) in PS5_BUTTON_MAP {
            assert!(caps.supports_key(code), "missing key {:#x}", code);
        }
    }
}
