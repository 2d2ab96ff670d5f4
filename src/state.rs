//! Per-device input state and delta computation.
//!
//! The synchronizer holds the last-sent value of every button, axis and
//! touch slot, and turns a "set state" call into the minimal ordered batch
//! of field changes. Within a batch, key events precede axis events precede
//! the terminal synchronization marker. A call that changes nothing yields
//! an empty batch and the device suppresses the kernel write entirely.

use std::collections::{HashMap, HashSet};

use crate::error::{InputError, Result};
use crate::event::*;

/// One primitive field change, pre-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Key { code: u16, pressed: bool },
    Abs { code: u16, value: i32 },
    Rel { code: u16, value: i32 },
    /// Terminal marker: everything before it is one atomic state update.
    Sync,
}

/// Ordered batch of changes produced by one state-mutating call.
#[derive(Debug, Default)]
pub struct EventBatch {
    changes: Vec<Change>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub(crate) fn key(&mut self, code: u16, pressed: bool) {
        self.changes.push(Change::Key { code, pressed });
    }

    pub(crate) fn abs(&mut self, code: u16, value: i32) {
        self.changes.push(Change::Abs { code, value });
    }

    pub(crate) fn rel(&mut self, code: u16, value: i32) {
        self.changes.push(Change::Rel { code, value });
    }

    /// Orders the batch (keys, then axes, then the marker) and returns it.
    pub fn finish(mut self) -> Vec<Change> {
        fn rank(change: &Change) -> u8 {
            match change {
                Change::Key { .. } => 0,
                Change::Abs { .. } | Change::Rel { .. } => 1,
                Change::Sync => 2,
            }
        }
        // Stable: multitouch sequences keep their slot-select ordering.
        self.changes.sort_by_key(rank);
        self.changes.push(Change::Sync);
        self.changes
    }
}

/// Geometry and feature set of a touch surface, fixed per device class.
#[derive(Debug, Clone, Copy)]
pub struct TouchConfig {
    pub slots: usize,
    pub max_x: i32,
    pub max_y: i32,
    /// Scale for the pressure axes, if the class reports pressure.
    pub pressure_max: Option<i32>,
    /// Whether the class reports contact orientation (degrees, ±90).
    pub orientation: bool,
    /// Emit BTN_TOOL_FINGER/DOUBLETAP/... transitions on contact-count
    /// changes, as libinput expects from touchpads.
    pub tool_buttons: bool,
}

/// Caller-domain values of one tracked contact. Stored un-scaled so a
/// read-back returns exactly what was supplied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
    pub orientation: f64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveContact {
    tracking_id: u16,
    point: TouchPoint,
}

#[derive(Debug)]
struct TouchState {
    config: TouchConfig,
    slots: Vec<Option<ActiveContact>>,
    /// Slot the kernel currently has selected, -1 before the first select.
    current_slot: i32,
    next_tracking_id: u16,
}

/// Holds the InputState of one kernel device and computes deltas against it.
#[derive(Debug, Default)]
pub struct StateSynchronizer {
    keys: HashSet<u16>,
    axes: HashMap<u16, i32>,
    touch: Option<TouchState>,
}

impl StateSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_touch(config: TouchConfig) -> Self {
        Self {
            touch: Some(TouchState {
                config,
                slots: vec![None; config.slots],
                current_slot: -1,
                next_tracking_id: 0,
            }),
            ..Default::default()
        }
    }

    /// Press or release a key; nothing is emitted when the state is unchanged.
    pub fn set_key(&mut self, batch: &mut EventBatch, code: u16, pressed: bool) {
        if self.keys.contains(&code) == pressed {
            return;
        }
        if pressed {
            self.keys.insert(code);
        } else {
            self.keys.remove(&code);
        }
        batch.key(code, pressed);
    }

    /// Move an absolute axis; nothing is emitted when the value is unchanged.
    pub fn set_abs(&mut self, batch: &mut EventBatch, code: u16, value: i32) {
        if self.axes.get(&code) == Some(&value) {
            return;
        }
        self.axes.insert(code, value);
        batch.abs(code, value);
    }

    /// Relative motion carries no state; zero deltas are dropped.
    pub fn push_rel(&mut self, batch: &mut EventBatch, code: u16, value: i32) {
        if value != 0 {
            batch.rel(code, value);
        }
    }

    /// Place or move a contact. Validates before mutating, so a failed call
    /// leaves the state exactly as it was.
    pub fn place(&mut self, batch: &mut EventBatch, slot: usize, point: TouchPoint) -> Result<()> {
        let touch = match self.touch.as_mut() {
            Some(t) => t,
            None => return Err(InputError::InvalidSlot { slot, capacity: 0 }),
        };
        let config = touch.config;
        if slot >= config.slots {
            return Err(InputError::InvalidSlot {
                slot,
                capacity: config.slots,
            });
        }
        check_unit("x", point.x)?;
        check_unit("y", point.y)?;
        if config.pressure_max.is_some() {
            check_unit("pressure", point.pressure)?;
        }
        if config.orientation {
            check_range("orientation", point.orientation, -90.0, 90.0)?;
        }

        let scaled_x = (point.x * config.max_x as f64).round() as i32;
        let scaled_y = (point.y * config.max_y as f64).round() as i32;
        let scaled_pressure = config
            .pressure_max
            .map(|max| (point.pressure * max as f64).round() as i32);
        let scaled_orientation = point.orientation.round() as i32;

        let previous = touch.slots[slot];
        if let Some(active) = &previous {
            if active.point == point {
                return Ok(());
            }
        }

        let was_active = previous.is_some();
        let old_count = touch.slots.iter().filter(|s| s.is_some()).count();

        if touch.current_slot != slot as i32 {
            batch.abs(ABS_MT_SLOT, slot as i32);
            touch.current_slot = slot as i32;
        }

        let tracking_id = match previous {
            Some(active) => active.tracking_id,
            None => {
                let id = touch.next_tracking_id;
                touch.next_tracking_id = touch.next_tracking_id.wrapping_add(1);
                batch.abs(ABS_MT_TRACKING_ID, id as i32);
                id
            }
        };

        let old_point = previous.map(|a| a.point);
        if old_point.map(|p| p.x) != Some(point.x) {
            batch.abs(ABS_MT_POSITION_X, scaled_x);
        }
        if old_point.map(|p| p.y) != Some(point.y) {
            batch.abs(ABS_MT_POSITION_Y, scaled_y);
        }
        if let Some(scaled) = scaled_pressure {
            if old_point.map(|p| p.pressure) != Some(point.pressure) {
                batch.abs(ABS_MT_PRESSURE, scaled);
            }
        }
        if config.orientation && old_point.map(|p| p.orientation) != Some(point.orientation) {
            batch.abs(ABS_MT_ORIENTATION, scaled_orientation);
        }

        touch.slots[slot] = Some(ActiveContact { tracking_id, point });

        // Single-touch mirrors follow the most recently placed contact.
        self.set_abs(batch, ABS_X, scaled_x);
        self.set_abs(batch, ABS_Y, scaled_y);
        if let Some(scaled) = scaled_pressure {
            self.set_abs(batch, ABS_PRESSURE, scaled);
        }

        if !was_active {
            let new_count = old_count + 1;
            if old_count == 0 {
                self.set_key(batch, BTN_TOUCH, true);
            }
            if config.tool_buttons {
                self.tool_transition(batch, old_count, new_count);
            }
        }
        Ok(())
    }

    /// Release a contact. Releasing an empty slot is a no-op, not an error;
    /// only an index beyond the declared capacity fails.
    pub fn release(&mut self, batch: &mut EventBatch, slot: usize) -> Result<()> {
        let touch = match self.touch.as_mut() {
            Some(t) => t,
            None => return Err(InputError::InvalidSlot { slot, capacity: 0 }),
        };
        let config = touch.config;
        if slot >= config.slots {
            return Err(InputError::InvalidSlot {
                slot,
                capacity: config.slots,
            });
        }
        if touch.slots[slot].is_none() {
            return Ok(());
        }
        let old_count = touch.slots.iter().filter(|s| s.is_some()).count();

        if touch.current_slot != slot as i32 {
            batch.abs(ABS_MT_SLOT, slot as i32);
            touch.current_slot = slot as i32;
        }
        batch.abs(ABS_MT_TRACKING_ID, -1);
        touch.slots[slot] = None;

        let new_count = old_count - 1;
        if new_count == 0 {
            self.set_key(batch, BTN_TOUCH, false);
        }
        if config.tool_buttons {
            self.tool_transition(batch, old_count, new_count);
        }
        Ok(())
    }

    fn tool_transition(&mut self, batch: &mut EventBatch, old_count: usize, new_count: usize) {
        let old_btn = tool_button_for(old_count);
        let new_btn = tool_button_for(new_count);
        if old_btn == new_btn {
            return;
        }
        if let Some(code) = old_btn {
            self.set_key(batch, code, false);
        }
        if let Some(code) = new_btn {
            self.set_key(batch, code, true);
        }
    }

    /// Whether a key is currently held, per the tracked state.
    pub fn key_pressed(&self, code: u16) -> bool {
        self.keys.contains(&code)
    }

    /// Last sent value of an absolute axis, if any.
    pub fn abs_value(&self, code: u16) -> Option<i32> {
        self.axes.get(&code).copied()
    }

    /// Last caller-supplied values of a touch slot.
    pub fn touch_point(&self, slot: usize) -> Option<TouchPoint> {
        self.touch
            .as_ref()
            .and_then(|t| t.slots.get(slot))
            .and_then(|s| s.map(|a| a.point))
    }

    /// Number of currently tracked contacts.
    pub fn active_contacts(&self) -> usize {
        self.touch
            .as_ref()
            .map(|t| t.slots.iter().filter(|s| s.is_some()).count())
            .unwrap_or(0)
    }
}

fn tool_button_for(count: usize) -> Option<u16> {
    match count {
        0 => None,
        1 => Some(BTN_TOOL_FINGER),
        2 => Some(BTN_TOOL_DOUBLETAP),
        3 => Some(BTN_TOOL_TRIPLETAP),
        4 => Some(BTN_TOOL_QUADTAP),
        _ => Some(BTN_TOOL_QUINTTAP),
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<()> {
    check_range(field, value, 0.0, 1.0)
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_nan() || value < min || value > max {
        return Err(InputError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_sync() -> StateSynchronizer {
        StateSynchronizer::with_touch(TouchConfig {
            slots: 16,
            max_x: 19200,
            max_y: 10800,
            pressure_max: Some(253),
            orientation: true,
            tool_buttons: false,
        })
    }

    fn point(x: f64, y: f64, pressure: f64, orientation: f64) -> TouchPoint {
        TouchPoint {
            x,
            y,
            pressure,
            orientation,
        }
    }

    #[test]
    fn unchanged_key_state_emits_nothing() {
        let mut sync = StateSynchronizer::new();
        let mut batch = EventBatch::new();
        sync.set_key(&mut batch, BTN_SOUTH, true);
        assert!(!batch.is_empty());

        let mut second = EventBatch::new();
        sync.set_key(&mut second, BTN_SOUTH, true);
        assert!(second.is_empty());
    }

    #[test]
    fn unchanged_axis_value_emits_nothing() {
        let mut sync = StateSynchronizer::new();
        let mut batch = EventBatch::new();
        sync.set_abs(&mut batch, ABS_X, 120);
        sync.set_abs(&mut batch, ABS_X, 120);
        let changes = batch.finish();
        assert_eq!(
            changes
                .iter()
                .filter(|c| matches!(c, Change::Abs { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn keys_precede_axes_precede_the_marker() {
        let mut sync = StateSynchronizer::new();
        let mut batch = EventBatch::new();
        sync.set_abs(&mut batch, ABS_X, 5);
        sync.set_key(&mut batch, BTN_SOUTH, true);
        sync.push_rel(&mut batch, REL_X, 3);
        let changes = batch.finish();
        assert!(matches!(changes[0], Change::Key { code: BTN_SOUTH, pressed: true }));
        assert!(matches!(changes[changes.len() - 1], Change::Sync));
        let axis_pos = changes
            .iter()
            .position(|c| matches!(c, Change::Abs { .. }))
            .unwrap();
        assert!(axis_pos > 0 && axis_pos < changes.len() - 1);
    }

    #[test]
    fn placing_a_finger_reads_back_exactly() {
        let mut sync = touch_sync();
        let mut batch = EventBatch::new();
        sync.place(&mut batch, 3, point(0.75, 0.25, 0.8, 45.0)).unwrap();

        let stored = sync.touch_point(3).unwrap();
        assert_eq!(stored.x, 0.75);
        assert_eq!(stored.y, 0.25);
        assert_eq!(stored.pressure, 0.8);
        assert_eq!(stored.orientation, 45.0);

        // Scaled values land on the single-touch mirrors.
        assert_eq!(sync.abs_value(ABS_X), Some(14400));
        assert_eq!(sync.abs_value(ABS_Y), Some(2700));
        assert_eq!(sync.abs_value(ABS_PRESSURE), Some(202));
    }

    #[test]
    fn replacing_a_finger_at_the_same_point_is_a_no_op() {
        let mut sync = touch_sync();
        let mut batch = EventBatch::new();
        sync.place(&mut batch, 0, point(0.5, 0.5, 0.5, 0.0)).unwrap();

        let mut second = EventBatch::new();
        sync.place(&mut second, 0, point(0.5, 0.5, 0.5, 0.0)).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn moving_a_finger_emits_only_the_changed_fields() {
        let mut sync = touch_sync();
        let mut batch = EventBatch::new();
        sync.place(&mut batch, 0, point(0.5, 0.5, 0.5, 0.0)).unwrap();

        let mut second = EventBatch::new();
        sync.place(&mut second, 0, point(0.6, 0.5, 0.5, 0.0)).unwrap();
        let changes = second.finish();
        // x (MT + mirror) and the marker; y and pressure are unchanged.
        assert!(changes.contains(&Change::Abs {
            code: ABS_MT_POSITION_X,
            value: 11520,
        }));
        assert!(changes.iter().all(|c| !matches!(
            c,
            Change::Abs {
                code: ABS_MT_POSITION_Y,
                ..
            }
        )));
    }

    #[test]
    fn releasing_an_unplaced_slot_is_a_no_op() {
        let mut sync = touch_sync();
        let mut batch = EventBatch::new();
        sync.release(&mut batch, 5).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn releasing_twice_is_a_no_op() {
        let mut sync = touch_sync();
        let mut batch = EventBatch::new();
        sync.place(&mut batch, 2, point(0.1, 0.2, 0.3, 0.0)).unwrap();

        let mut first = EventBatch::new();
        sync.release(&mut first, 2).unwrap();
        assert!(!first.is_empty());

        let mut second = EventBatch::new();
        sync.release(&mut second, 2).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn out_of_capacity_slot_fails() {
        let mut sync = touch_sync();
        let mut batch = EventBatch::new();
        let err = sync
            .place(&mut batch, 16, point(0.5, 0.5, 0.5, 0.0))
            .unwrap_err();
        assert!(matches!(
            err,
            InputError::InvalidSlot {
                slot: 16,
                capacity: 16,
            }
        ));
        let err = sync.release(&mut batch, 99).unwrap_err();
        assert!(matches!(err, InputError::InvalidSlot { slot: 99, .. }));
    }

    #[test]
    fn out_of_range_coordinate_fails_and_leaves_state_untouched() {
        let mut sync = touch_sync();
        let mut batch = EventBatch::new();
        let err = sync
            .place(&mut batch, 0, point(1.5, 0.5, 0.5, 0.0))
            .unwrap_err();
        assert!(matches!(err, InputError::OutOfRange { field: "x", .. }));
        assert!(batch.is_empty());
        assert!(sync.touch_point(0).is_none());
        assert_eq!(sync.active_contacts(), 0);
    }

    #[test]
    fn btn_touch_tracks_first_and_last_contact() {
        let mut sync = touch_sync();
        let mut batch = EventBatch::new();
        sync.place(&mut batch, 0, point(0.1, 0.1, 0.5, 0.0)).unwrap();
        assert!(sync.key_pressed(BTN_TOUCH));

        let mut batch = EventBatch::new();
        sync.place(&mut batch, 1, point(0.2, 0.2, 0.5, 0.0)).unwrap();
        assert!(batch.finish().iter().all(|c| !matches!(
            c,
            Change::Key {
                code: BTN_TOUCH,
                ..
            }
        )));

        let mut batch = EventBatch::new();
        sync.release(&mut batch, 0).unwrap();
        assert!(sync.key_pressed(BTN_TOUCH));
        let mut batch = EventBatch::new();
        sync.release(&mut batch, 1).unwrap();
        assert!(!sync.key_pressed(BTN_TOUCH));
    }

    #[test]
    fn tool_buttons_follow_the_contact_count() {
        let mut sync = StateSynchronizer::with_touch(TouchConfig {
            slots: 10,
            max_x: 19200,
            max_y: 10800,
            pressure_max: Some(253),
            orientation: true,
            tool_buttons: true,
        });
        let mut batch = EventBatch::new();
        sync.place(&mut batch, 0, point(0.1, 0.1, 0.5, 0.0)).unwrap();
        assert!(sync.key_pressed(BTN_TOOL_FINGER));

        let mut batch = EventBatch::new();
        sync.place(&mut batch, 1, point(0.2, 0.2, 0.5, 0.0)).unwrap();
        assert!(!sync.key_pressed(BTN_TOOL_FINGER));
        assert!(sync.key_pressed(BTN_TOOL_DOUBLETAP));

        let mut batch = EventBatch::new();
        sync.release(&mut batch, 1).unwrap();
        assert!(sync.key_pressed(BTN_TOOL_FINGER));
        assert!(!sync.key_pressed(BTN_TOOL_DOUBLETAP));
    }

    #[test]
    fn tracking_ids_are_unique_per_contact() {
        let mut sync = touch_sync();
        let mut batch = EventBatch::new();
        sync.place(&mut batch, 0, point(0.1, 0.1, 0.5, 0.0)).unwrap();
        let first_id = match batch
            .finish()
            .iter()
            .find(|c| matches!(c, Change::Abs { code: ABS_MT_TRACKING_ID, .. }))
        {
            Some(&Change::Abs { value, .. }) => value,
            _ => panic!("no tracking id emitted"),
        };

        let mut batch = EventBatch::new();
        sync.release(&mut batch, 0).unwrap();
        let mut batch = EventBatch::new();
        sync.place(&mut batch, 0, point(0.1, 0.1, 0.5, 0.0)).unwrap();
        let second_id = match batch
            .finish()
            .iter()
            .find(|c| matches!(c, Change::Abs { code: ABS_MT_TRACKING_ID, .. }))
        {
            Some(&Change::Abs { value, .. }) => value,
            _ => panic!("no tracking id emitted"),
        };
        assert_ne!(first_id, second_id);
    }
}
