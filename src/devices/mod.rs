//! Device-class specializations: thin policy layers over the shared
//! capability builder, state synchronizer, encoder and registrar.

use std::sync::{Mutex, MutexGuard};

use crate::caps::{DeviceCapabilities, DeviceDefinition};
use crate::encoder;
use crate::error::Result;
use crate::registrar::DeviceHandle;
use crate::state::{EventBatch, StateSynchronizer, TouchConfig};

mod joypad;
mod keyboard;
mod mouse;
mod pentablet;
mod ps5;
mod touchscreen;
mod trackpad;

pub use joypad::{Joypad, JoypadVariant, Stick, button};
pub use keyboard::Keyboard;
pub use mouse::{Mouse, MouseButton};
pub use pentablet::{PenButton, PenTablet, PenTool};
pub use ps5::{BatteryState, MotionType, PS5Joypad};
pub use touchscreen::TouchScreen;
pub use trackpad::Trackpad;

/// Common surface of every virtual device.
pub trait VirtualDevice {
    /// Device node paths created for this instance, stable for its lifetime.
    fn nodes(&self) -> Vec<String>;
}

/// One kernel device plus its tracked state: what every class is built on.
pub(crate) struct DeviceCore {
    pub(crate) handle: DeviceHandle,
    pub(crate) caps: DeviceCapabilities,
    pub(crate) sync: StateSynchronizer,
}

impl DeviceCore {
    pub(crate) fn create(def: &DeviceDefinition, caps: DeviceCapabilities) -> Result<Self> {
        let handle = DeviceHandle::create(def, &caps)?;
        Ok(Self {
            handle,
            caps,
            sync: StateSynchronizer::new(),
        })
    }

    pub(crate) fn create_with_touch(
        def: &DeviceDefinition,
        caps: DeviceCapabilities,
        touch: TouchConfig,
    ) -> Result<Self> {
        let handle = DeviceHandle::create(def, &caps)?;
        Ok(Self {
            handle,
            caps,
            sync: StateSynchronizer::with_touch(touch),
        })
    }

    /// Encode and write one batch; empty batches are suppressed entirely.
    pub(crate) fn commit(&mut self, batch: EventBatch) -> Result<()> {
        if !self.handle.is_open() {
            return Err(crate::error::InputError::ClosedDevice);
        }
        if batch.is_empty() {
            return Ok(());
        }
        let events = encoder::encode(&batch.finish(), &self.caps)?;
        self.handle.write_batch(&events)
    }
}

/// Poison-proof lock: device state stays usable even if a caller thread
/// panicked while holding the guard.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
