//! Lowers ordered change batches into wire events, validating every field
//! against the device's declared capabilities.
//!
//! The encoder is the last guard before the kernel: an enumerated code the
//! device never advertised is rejected outright, and a continuous value
//! outside its declared axis range is a caller error, never silently
//! clamped (device classes pre-normalize, so reaching this is a bug in the
//! caller, not in normal operation).

use crate::caps::DeviceCapabilities;
use crate::error::{InputError, Result};
use crate::event::*;
use crate::state::Change;

pub fn encode(changes: &[Change], caps: &DeviceCapabilities) -> Result<Vec<InputEventRecord>> {
    let mut events = Vec::with_capacity(changes.len());
    for change in changes {
        match *change {
            Change::Key { code, pressed } => {
                if !caps.supports_key(code) {
                    return Err(InputError::UnsupportedCapability {
                        event_type: EV_KEY,
                        code,
                    });
                }
                events.push(InputEventRecord::new(EV_KEY, code, pressed as i32));
            }
            Change::Abs { code, value } => {
                let axis = caps.abs_axis(code).ok_or(InputError::UnsupportedCapability {
                    event_type: EV_ABS,
                    code,
                })?;
                // Tracking id -1 is the MT release marker, legal on any
                // tracking axis regardless of its declared minimum.
                let releasing = code == ABS_MT_TRACKING_ID && value == -1;
                if !releasing && (value < axis.min || value > axis.max) {
                    return Err(InputError::OutOfRange {
                        field: abs_code_name(code),
                        value: value as f64,
                        min: axis.min as f64,
                        max: axis.max as f64,
                    });
                }
                events.push(InputEventRecord::new(EV_ABS, code, value));
            }
            Change::Rel { code, value } => {
                if !caps.supports_rel(code) {
                    return Err(InputError::UnsupportedCapability {
                        event_type: EV_REL,
                        code,
                    });
                }
                events.push(InputEventRecord::new(EV_REL, code, value));
            }
            Change::Sync => events.push(InputEventRecord::syn()),
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EventBatch, StateSynchronizer};

    #[test]
    fn encodes_an_ordered_batch_with_a_terminal_marker() {
        let caps = DeviceCapabilities::generic_pad();
        let mut sync = StateSynchronizer::new();
        let mut batch = EventBatch::new();
        sync.set_key(&mut batch, BTN_SOUTH, true);
        sync.set_abs(&mut batch, ABS_X, 1000);

        let events = encode(&batch.finish(), &caps).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], InputEventRecord::new(EV_KEY, BTN_SOUTH, 1));
        assert_eq!(events[1], InputEventRecord::new(EV_ABS, ABS_X, 1000));
        assert_eq!(events[2], InputEventRecord::syn());
    }

    #[test]
    fn rejects_keys_outside_the_capability_set() {
        let caps = DeviceCapabilities::generic_pad();
        let changes = [Change::Key {
            code: BTN_TOOL_PEN,
            pressed: true,
        }];
        let err = encode(&changes, &caps).unwrap_err();
        assert!(matches!(
            err,
            InputError::UnsupportedCapability {
                event_type: EV_KEY,
                code: BTN_TOOL_PEN,
            }
        ));
    }

    #[test]
    fn rejects_axis_values_outside_the_declared_range() {
        let caps = DeviceCapabilities::ps5_gamepad();
        let changes = [Change::Abs {
            code: ABS_Z,
            value: 300,
        }];
        let err = encode(&changes, &caps).unwrap_err();
        assert!(matches!(err, InputError::OutOfRange { value, .. } if value == 300.0));
    }

    #[test]
    fn tracking_id_release_marker_passes_validation() {
        let caps = DeviceCapabilities::touchscreen();
        let changes = [Change::Abs {
            code: ABS_MT_TRACKING_ID,
            value: -1,
        }];
        let events = encode(&changes, &caps).unwrap();
        assert_eq!(events[0].value, -1);
    }

    #[test]
    fn rejects_relative_motion_on_absolute_devices() {
        let caps = DeviceCapabilities::touchscreen();
        let changes = [Change::Rel {
            code: REL_X,
            value: 4,
        }];
        assert!(matches!(
            encode(&changes, &caps).unwrap_err(),
            InputError::UnsupportedCapability {
                event_type: EV_REL,
                ..
            }
        ));
    }
}
