//! Virtual keyboard. Key codes are Win32 Virtual-Key codes, translated to
//! the evdev keys the device declares; held keys autorepeat in the kernel.

use super::{DeviceCore, VirtualDevice};
use crate::caps::{DeviceCapabilities, DeviceDefinition};
use crate::error::{InputError, Result};
use crate::event::EV_KEY;
use crate::keymap;
use crate::state::EventBatch;

pub struct Keyboard {
    core: DeviceCore,
}

impl Keyboard {
    pub fn default_definition() -> DeviceDefinition {
        DeviceDefinition::new("haamu virtual keyboard", 0xAB00, 0xAB05, 0xAB00)
    }

    pub fn create(def: &DeviceDefinition) -> Result<Self> {
        let core = DeviceCore::create(def, DeviceCapabilities::keyboard())?;
        Ok(Self { core })
    }

    pub fn create_default() -> Result<Self> {
        Self::create(&Self::default_definition())
    }

    /// Press a key by Virtual-Key code. Pressing an already-pressed key is
    /// a no-op against the tracked state.
    pub fn press(&mut self, key_code: u16) -> Result<()> {
        self.set_key(key_code, true)
    }

    /// Release a key by Virtual-Key code.
    pub fn release(&mut self, key_code: u16) -> Result<()> {
        self.set_key(key_code, false)
    }

    fn set_key(&mut self, key_code: u16, pressed: bool) -> Result<()> {
        let code = keymap::vk_to_key(key_code).ok_or(InputError::UnsupportedCapability {
            event_type: EV_KEY,
            code: key_code,
        })?;
        let mut batch = EventBatch::new();
        self.core.sync.set_key(&mut batch, code, pressed);
        self.core.commit(batch)
    }

    /// Close the kernel device. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        self.core.handle.close();
    }
}

impl VirtualDevice for Keyboard {
    fn nodes(&self) -> Vec<String> {
        self.core.handle.nodes().to_vec()
    }
}
