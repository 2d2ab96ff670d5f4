use thiserror::Error;

/// Errors surfaced by the emulation core.
///
/// Everything here is reported synchronously to the caller of the offending
/// operation; the core never retries on its own. Feedback callbacks are the
/// one exception to the propagation rule: a panicking callback is caught at
/// the dispatch boundary and logged instead.
#[derive(Debug, Error)]
pub enum InputError {
    /// The kernel refused to materialize the virtual device.
    ///
    /// Typically a permission problem on `/dev/uinput` or resource
    /// exhaustion. Fatal to construction; retry policy belongs to the
    /// caller.
    #[error("device creation failed during {context}: {source}")]
    DeviceCreation {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing an event batch to the kernel failed.
    #[error("failed to write events to device: {0}")]
    Write(#[source] std::io::Error),

    /// The device handle was already closed.
    #[error("device is closed")]
    ClosedDevice,

    /// A continuous value fell outside the range the device advertises.
    #[error("{field} value {value} is outside the allowed range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// An enumerated value (key code, button flag, tool type, ...) is not
    /// part of the device capability set.
    #[error("event type {event_type:#x} code {code:#x} is not in the device capability set")]
    UnsupportedCapability { event_type: u16, code: u16 },

    /// A touch slot index beyond the declared multitouch capacity.
    #[error("touch slot {slot} exceeds the device capacity of {capacity}")]
    InvalidSlot { slot: usize, capacity: usize },

    /// A key name lookup missed.
    #[error("unknown key name `{0}`")]
    UnknownKeyName(String),
}

impl InputError {
    pub(crate) fn creation(context: impl Into<String>, source: std::io::Error) -> Self {
        InputError::DeviceCreation {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, InputError>;
