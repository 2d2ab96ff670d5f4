//! Virtual trackpad: a pure multitouch touchpad as libinput defines it,
//! with contact-count tool buttons and a physical click button.

use super::{DeviceCore, VirtualDevice};
use crate::caps::{
    DeviceCapabilities, DeviceDefinition, TOUCH_MAX_X, TOUCH_MAX_Y, TOUCH_PRESSURE_MAX,
    TRACKPAD_SLOTS,
};
use crate::error::Result;
use crate::event::BTN_LEFT;
use crate::state::{EventBatch, TouchConfig, TouchPoint};

pub struct Trackpad {
    core: DeviceCore,
}

impl Trackpad {
    pub fn default_definition() -> DeviceDefinition {
        DeviceDefinition::new("haamu virtual touchpad", 0xAB00, 0xAB02, 0xAB00)
    }

    pub fn create(def: &DeviceDefinition) -> Result<Self> {
        let core = DeviceCore::create_with_touch(
            def,
            DeviceCapabilities::trackpad(),
            TouchConfig {
                slots: TRACKPAD_SLOTS,
                max_x: TOUCH_MAX_X,
                max_y: TOUCH_MAX_Y,
                pressure_max: Some(TOUCH_PRESSURE_MAX),
                orientation: true,
                tool_buttons: true,
            },
        )?;
        Ok(Self { core })
    }

    pub fn create_default() -> Result<Self> {
        Self::create(&Self::default_definition())
    }

    /// Place or move a contact; same coordinate domains as the touchscreen.
    pub fn place_finger(
        &mut self,
        finger_nr: usize,
        x: f64,
        y: f64,
        pressure: f64,
        orientation: i32,
    ) -> Result<()> {
        let mut batch = EventBatch::new();
        self.core.sync.place(
            &mut batch,
            finger_nr,
            TouchPoint {
                x,
                y,
                pressure,
                orientation: orientation as f64,
            },
        )?;
        self.core.commit(batch)
    }

    /// Lift a contact. Releasing an already-released finger is a no-op.
    pub fn release_finger(&mut self, finger_nr: usize) -> Result<()> {
        let mut batch = EventBatch::new();
        self.core.sync.release(&mut batch, finger_nr)?;
        self.core.commit(batch)
    }

    /// Press or release the pad's physical click.
    pub fn set_left_btn(&mut self, pressed: bool) -> Result<()> {
        let mut batch = EventBatch::new();
        self.core.sync.set_key(&mut batch, BTN_LEFT, pressed);
        self.core.commit(batch)
    }

    /// Close the kernel device. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        self.core.handle.close();
    }
}

impl VirtualDevice for Trackpad {
    fn nodes(&self) -> Vec<String> {
        self.core.handle.nodes().to_vec()
    }
}
