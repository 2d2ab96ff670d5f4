//! haamu - Virtual Input Device Emulation Library
//!
//! Creates kernel-visible input devices - keyboards, mice, joypads,
//! touchscreens, trackpads and pen tablets - through Linux uinput, and
//! translates typed "set state" calls into the event batches the kernel
//! input subsystem expects. Force feedback and lightbar requests flow back
//! to the owning process through registered callbacks.

pub mod caps;
pub mod devices;
pub mod encoder;
pub mod error;
pub mod event;
pub mod feedback;
pub mod keymap;
pub mod registrar;
pub mod state;
pub mod uinput;

// Re-export commonly used types
pub use caps::{AbsAxis, DeviceCapabilities, DeviceDefinition};
pub use devices::{
    BatteryState, Joypad, JoypadVariant, Keyboard, MotionType, Mouse, MouseButton, PS5Joypad,
    PenButton, PenTablet, PenTool, Stick, TouchScreen, Trackpad, VirtualDevice, button,
};
pub use error::{InputError, Result};
pub use event::{BusType, InputEventRecord};
pub use feedback::FeedbackEvent;
pub use keymap::{key_code_from_name, vk};
pub use registrar::DeviceHandle;
pub use state::{Change, EventBatch, StateSynchronizer};
