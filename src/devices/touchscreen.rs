//! Virtual touchscreen: direct multitouch surface with 16 tracked contacts.

use super::{DeviceCore, VirtualDevice};
use crate::caps::{
    DeviceCapabilities, DeviceDefinition, TOUCH_MAX_X, TOUCH_MAX_Y, TOUCH_PRESSURE_MAX,
    TOUCHSCREEN_SLOTS,
};
use crate::error::Result;
use crate::state::{EventBatch, TouchConfig, TouchPoint};

pub struct TouchScreen {
    core: DeviceCore,
}

impl TouchScreen {
    pub fn default_definition() -> DeviceDefinition {
        DeviceDefinition::new("haamu virtual touchscreen", 0xAB00, 0xAB03, 0xAB00)
    }

    pub fn create(def: &DeviceDefinition) -> Result<Self> {
        let core = DeviceCore::create_with_touch(
            def,
            DeviceCapabilities::touchscreen(),
            TouchConfig {
                slots: TOUCHSCREEN_SLOTS,
                max_x: TOUCH_MAX_X,
                max_y: TOUCH_MAX_Y,
                pressure_max: Some(TOUCH_PRESSURE_MAX),
                orientation: true,
                tool_buttons: false,
            },
        )?;
        Ok(Self { core })
    }

    pub fn create_default() -> Result<Self> {
        Self::create(&Self::default_definition())
    }

    /// Place or move a contact. `x` and `y` are normalised device
    /// coordinates in [0.0, 1.0] from the top-left corner, `pressure` is in
    /// [0.0, 1.0] and `orientation` in degrees within ±90.
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

    /// Close the kernel device. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        self.core.handle.close();
    }
}

impl VirtualDevice for TouchScreen {
    fn nodes(&self) -> Vec<String> {
        self.core.handle.nodes().to_vec()
    }
}
