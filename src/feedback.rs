//! Reverse path: device-initiated events (force feedback, lightbar LEDs)
//! delivered back to the owning process.
//!
//! Each feedback-capable device runs one listener thread polling its uinput
//! fd. Force feedback on uinput is a two-step dance: consumers upload
//! effects (`EV_UINPUT`/`UI_FF_UPLOAD`, fetched with the begin/end ioctl
//! pair), then trigger them with `EV_FF` events. The listener simulates the
//! uploaded effects over time and reports the accumulated rumble magnitudes
//! whenever they change. Test with `fftest` against the created node.
//!
//! Callbacks are registered last-write-wins, run on the listener thread
//! (never the caller's), and a panicking callback is caught and logged at
//! the dispatch boundary.

use std::collections::HashMap;
use std::mem::size_of;
use std::os::fd::RawFd;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use crate::error::{InputError, Result};
use crate::event::{EV_FF, EV_LED, FF_CONSTANT, FF_GAIN, FF_PERIODIC, FF_RAMP, FF_RUMBLE, LED_CHARGING, LED_MAIL, LED_MISC};
use crate::uinput::{
    EV_UINPUT, UI_BEGIN_FF_ERASE, UI_BEGIN_FF_UPLOAD, UI_END_FF_ERASE, UI_END_FF_UPLOAD,
    UI_FF_ERASE, UI_FF_UPLOAD, ff_effect, input_event, uinput_ff_erase, uinput_ff_upload,
};

/// A device-initiated event, as delivered to registered callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackEvent {
    /// Accumulated rumble magnitudes: `low` drives the low-frequency
    /// (strong) motor, `high` the high-frequency (weak) one.
    Rumble { low: u16, high: u16 },
    /// Lightbar color requested by a consumer.
    LedColor { r: u8, g: u8, b: u8 },
}

pub(crate) type RumbleCallback = Arc<dyn Fn(u16, u16) + Send + Sync>;
pub(crate) type LedCallback = Arc<dyn Fn(u8, u8, u8) + Send + Sync>;

/// At most one callback per feedback kind; registering again replaces.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    rumble: Mutex<Option<RumbleCallback>>,
    led: Mutex<Option<LedCallback>>,
}

impl CallbackRegistry {
    pub(crate) fn set_rumble(&self, callback: RumbleCallback) {
        *lock(&self.rumble) = Some(callback);
    }

    pub(crate) fn clear_rumble(&self) {
        *lock(&self.rumble) = None;
    }

    pub(crate) fn set_led(&self, callback: LedCallback) {
        *lock(&self.led) = Some(callback);
    }

    pub(crate) fn clear_led(&self) {
        *lock(&self.led) = None;
    }

    /// Route one feedback event to its registered callback, if any. Events
    /// arriving before a callback is registered are dropped, not buffered.
    pub(crate) fn dispatch(&self, event: FeedbackEvent) {
        match event {
            FeedbackEvent::Rumble { low, high } => self.fire_rumble(low, high),
            FeedbackEvent::LedColor { r, g, b } => self.fire_led(r, g, b),
        }
    }

    /// The callback runs without the registry lock held, so it may
    /// re-register or call back into the device freely.
    pub(crate) fn fire_rumble(&self, low: u16, high: u16) {
        let callback = lock(&self.rumble).clone();
        if let Some(callback) = callback {
            if catch_unwind(AssertUnwindSafe(|| callback(low, high))).is_err() {
                error!("rumble callback panicked");
            }
        }
    }

    pub(crate) fn fire_led(&self, r: u8, g: u8, b: u8) {
        let callback = lock(&self.led).clone();
        if let Some(callback) = callback {
            if catch_unwind(AssertUnwindSafe(|| callback(r, g, b))).is_err() {
                error!("led callback panicked");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

const MAX_GAIN: i64 = 0xFFFF;

#[derive(Debug, Clone, Copy, Default)]
struct Magnitudes {
    weak: i64,
    strong: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Envelope {
    attack_length: i64,
    attack_level: i64,
    fade_length: i64,
    fade_level: i64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveEffect {
    delay: Duration,
    /// `None` plays until explicitly stopped (replay length 0).
    length: Option<Duration>,
    start: Magnitudes,
    end: Magnitudes,
    envelope: Envelope,
    started_at: Option<Instant>,
}

/// Effect bookkeeping and rumble/LED accumulation, kept free of fds so it
/// can be driven directly in tests.
#[derive(Default)]
pub(crate) struct FeedbackState {
    effects: HashMap<i16, ActiveEffect>,
    gain: Option<i64>,
    last_rumble: (u16, u16),
    led: [u8; 3],
    led_dirty: bool,
}

impl FeedbackState {
    pub(crate) fn upload(&mut self, effect: &ff_effect) {
        let mut parsed = parse_effect(effect);
        // A re-upload of a playing effect keeps its playback timing.
        if let Some(old) = self.effects.get(&effect.id) {
            parsed.started_at = old.started_at;
        }
        self.effects.insert(effect.id, parsed);
    }

    pub(crate) fn erase(&mut self, id: i16) {
        self.effects.remove(&id);
    }

    pub(crate) fn playback(&mut self, id: i16, on: bool, now: Instant) {
        if let Some(effect) = self.effects.get_mut(&id) {
            effect.started_at = on.then_some(now);
        }
    }

    pub(crate) fn set_gain(&mut self, value: i32) {
        self.gain = Some((value as i64).clamp(0, MAX_GAIN));
    }

    pub(crate) fn led_event(&mut self, code: u16, value: i32) {
        let channel = match code {
            LED_MISC => 0,
            LED_MAIL => 1,
            LED_CHARGING => 2,
            _ => return,
        };
        let level = value.clamp(0, 255) as u8;
        if self.led[channel] != level {
            self.led[channel] = level;
            self.led_dirty = true;
        }
    }

    fn current_rumble(&self, now: Instant) -> (u16, u16) {
        let mut total = Magnitudes::default();
        for effect in self.effects.values() {
            let m = simulate(effect, now);
            total.weak += m.weak;
            total.strong += m.strong;
        }
        let gain = self.gain.unwrap_or(MAX_GAIN);
        let low = (total.strong * gain / MAX_GAIN).clamp(0, MAX_GAIN) as u16;
        let high = (total.weak * gain / MAX_GAIN).clamp(0, MAX_GAIN) as u16;
        (low, high)
    }

    /// The accumulated magnitudes, if they changed since the last poll.
    pub(crate) fn poll_rumble(&mut self, now: Instant) -> Option<(u16, u16)> {
        let current = self.current_rumble(now);
        if current == self.last_rumble {
            return None;
        }
        self.last_rumble = current;
        Some(current)
    }

    /// The folded lightbar color, once per change.
    pub(crate) fn take_led(&mut self) -> Option<(u8, u8, u8)> {
        if !self.led_dirty {
            return None;
        }
        self.led_dirty = false;
        Some((self.led[0], self.led[1], self.led[2]))
    }
}

fn parse_effect(effect: &ff_effect) -> ActiveEffect {
    // Duration values above 32767 ms are reserved per the kernel docs.
    let length_ms = effect.replay.length.min(32767) as u64;
    let delay_ms = effect.replay.delay.min(32767) as u64;

    let (start, end, envelope) = match effect.type_ {
        FF_CONSTANT => {
            let c = unsafe { effect.u.constant };
            let level = c.level as i64;
            (
                Magnitudes {
                    weak: level,
                    strong: level,
                },
                Magnitudes {
                    weak: level,
                    strong: level,
                },
                convert_envelope(&c.envelope),
            )
        }
        FF_PERIODIC => {
            let p = unsafe { effect.u.periodic };
            let level = p.magnitude as i64;
            (
                Magnitudes {
                    weak: level,
                    strong: level,
                },
                Magnitudes {
                    weak: level,
                    strong: level,
                },
                convert_envelope(&p.envelope),
            )
        }
        FF_RAMP => {
            let r = unsafe { effect.u.ramp };
            (
                Magnitudes {
                    weak: r.start_level as i64,
                    strong: r.start_level as i64,
                },
                Magnitudes {
                    weak: r.end_level as i64,
                    strong: r.end_level as i64,
                },
                convert_envelope(&r.envelope),
            )
        }
        FF_RUMBLE => {
            let r = unsafe { effect.u.rumble };
            let m = Magnitudes {
                weak: r.weak_magnitude as i64,
                strong: r.strong_magnitude as i64,
            };
            (m, m, Envelope::default())
        }
        _ => (Magnitudes::default(), Magnitudes::default(), Envelope::default()),
    };

    ActiveEffect {
        delay: Duration::from_millis(delay_ms),
        length: (length_ms > 0).then(|| Duration::from_millis(length_ms)),
        start,
        end,
        envelope,
        started_at: None,
    }
}

fn convert_envelope(envelope: &crate::uinput::ff_envelope) -> Envelope {
    Envelope {
        attack_length: envelope.attack_length as i64,
        attack_level: envelope.attack_level as i64,
        fade_length: envelope.fade_length as i64,
        fade_level: envelope.fade_level as i64,
    }
}

fn simulate(effect: &ActiveEffect, now: Instant) -> Magnitudes {
    let Some(started_at) = effect.started_at else {
        return Magnitudes::default();
    };
    let since = now.saturating_duration_since(started_at);
    if since < effect.delay {
        return Magnitudes::default();
    }
    let t = (since - effect.delay).as_millis() as i64;

    let (mut weak, mut strong, time_left) = match effect.length {
        Some(length) => {
            let length_ms = length.as_millis() as i64;
            if t >= length_ms {
                return Magnitudes::default();
            }
            let weak = effect.start.weak + (effect.end.weak - effect.start.weak) * t / length_ms;
            let strong =
                effect.start.strong + (effect.end.strong - effect.start.strong) * t / length_ms;
            (weak, strong, Some(length_ms - t))
        }
        None => (effect.start.weak, effect.start.strong, None),
    };

    let env = effect.envelope;
    if env.attack_length > 0 && t < env.attack_length {
        // Ramp from attack_level up to the effect magnitude.
        weak = (env.attack_level * (env.attack_length - t) + weak * t) / env.attack_length;
        strong = (env.attack_level * (env.attack_length - t) + strong * t) / env.attack_length;
    } else if let Some(time_left) = time_left {
        if env.fade_length > 0 && time_left < env.fade_length {
            let dt = env.fade_length - time_left;
            weak = (env.fade_level * dt + weak * (env.fade_length - dt)) / env.fade_length;
            strong = (env.fade_level * dt + strong * (env.fade_length - dt)) / env.fade_length;
        }
    }

    Magnitudes { weak, strong }
}

const POLL_TIMEOUT_MS: i32 = 250;

/// Dedicated notification thread of one device, decoupled from the caller.
pub(crate) struct FeedbackListener {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FeedbackListener {
    /// Spawn the listener over a duplicate of the device fd.
    pub(crate) fn spawn(fd: RawFd, registry: Arc<CallbackRegistry>) -> Result<Self> {
        let dup = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) };
        if dup < 0 {
            return Err(InputError::creation(
                "duplicating device fd for the feedback listener",
                std::io::Error::last_os_error(),
            ));
        }
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("feedback-listener".into())
            .spawn(move || listen(dup, stop_flag, registry))
            .map_err(|e| {
                unsafe { libc::close(dup) };
                InputError::creation("spawning the feedback listener", e)
            })?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Stop the listener and block until any in-flight callback dispatch
    /// has completed. Safe to call more than once.
    pub(crate) fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for FeedbackListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen(fd: RawFd, stop: Arc<AtomicBool>, registry: Arc<CallbackRegistry>) {
    let mut state = FeedbackState::default();
    while !stop.load(Ordering::Relaxed) {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, POLL_TIMEOUT_MS) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            error!("polling feedback fd failed: {}", err);
            break;
        }
        if rc > 0 {
            if pfd.revents & (libc::POLLERR | libc::POLLHUP) != 0 {
                debug!("feedback fd hung up, stopping listener");
                break;
            }
            if pfd.revents & libc::POLLIN != 0 {
                drain_events(fd, &mut state);
            }
        }

        let now = Instant::now();
        if let Some((low, high)) = state.poll_rumble(now) {
            trace!("rumble changed: low={} high={}", low, high);
            registry.dispatch(FeedbackEvent::Rumble { low, high });
        }
        if let Some((r, g, b)) = state.take_led() {
            trace!("lightbar changed: #{:02x}{:02x}{:02x}", r, g, b);
            registry.dispatch(FeedbackEvent::LedColor { r, g, b });
        }
    }
    unsafe { libc::close(fd) };
}

fn drain_events(fd: RawFd, state: &mut FeedbackState) {
    const EVENT_SIZE: usize = size_of::<input_event>();
    let mut buf = [0u8; EVENT_SIZE * 32];
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            match err.kind() {
                std::io::ErrorKind::WouldBlock => break,
                std::io::ErrorKind::Interrupted => continue,
                _ => {
                    warn!("reading feedback events failed: {}", err);
                    break;
                }
            }
        }
        if n == 0 {
            break;
        }
        for chunk in buf[..n as usize].chunks_exact(EVENT_SIZE) {
            let ev: input_event =
                unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const input_event) };
            handle_event(fd, state, &ev);
        }
    }
}

fn handle_event(fd: RawFd, state: &mut FeedbackState, ev: &input_event) {
    match (ev.type_, ev.code) {
        (EV_UINPUT, UI_FF_UPLOAD) => {
            let mut upload: uinput_ff_upload = unsafe { std::mem::zeroed() };
            upload.request_id = ev.value as u32;
            if unsafe { libc::ioctl(fd, UI_BEGIN_FF_UPLOAD as libc::c_ulong, &mut upload) } < 0 {
                warn!(
                    "UI_BEGIN_FF_UPLOAD failed: {}",
                    std::io::Error::last_os_error()
                );
                return;
            }
            state.upload(&upload.effect);
            trace!("uploaded ff effect {}", upload.effect.id);
            upload.retval = 0;
            if unsafe { libc::ioctl(fd, UI_END_FF_UPLOAD as libc::c_ulong, &upload) } < 0 {
                warn!(
                    "UI_END_FF_UPLOAD failed: {}",
                    std::io::Error::last_os_error()
                );
            }
        }
        (EV_UINPUT, UI_FF_ERASE) => {
            let mut erase = uinput_ff_erase {
                request_id: ev.value as u32,
                ..Default::default()
            };
            if unsafe { libc::ioctl(fd, UI_BEGIN_FF_ERASE as libc::c_ulong, &mut erase) } < 0 {
                warn!(
                    "UI_BEGIN_FF_ERASE failed: {}",
                    std::io::Error::last_os_error()
                );
                return;
            }
            state.erase(erase.effect_id as i16);
            trace!("erased ff effect {}", erase.effect_id);
            erase.retval = 0;
            if unsafe { libc::ioctl(fd, UI_END_FF_ERASE as libc::c_ulong, &erase) } < 0 {
                warn!("UI_END_FF_ERASE failed: {}", std::io::Error::last_os_error());
            }
        }
        (EV_FF, FF_GAIN) => state.set_gain(ev.value),
        (EV_FF, code) => state.playback(code as i16, ev.value != 0, Instant::now()),
        (EV_LED, code) => state.led_event(code, ev.value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uinput::{ff_effect_u, ff_envelope, ff_replay, ff_rumble_effect, ff_trigger};

    fn rumble_effect(id: i16, strong: u16, weak: u16, length: u16) -> ff_effect {
        ff_effect {
            type_: FF_RUMBLE,
            id,
            direction: 0,
            trigger: ff_trigger::default(),
            replay: ff_replay { length, delay: 0 },
            u: ff_effect_u {
                rumble: ff_rumble_effect {
                    strong_magnitude: strong,
                    weak_magnitude: weak,
                },
            },
        }
    }

    #[test]
    fn played_rumble_effect_reports_its_magnitudes() {
        let mut state = FeedbackState::default();
        state.upload(&rumble_effect(1, 0x8000, 0x4000, 1000));
        let t0 = Instant::now();

        assert_eq!(state.poll_rumble(t0), None); // uploaded but not playing
        state.playback(1, true, t0);
        assert_eq!(state.poll_rumble(t0), Some((0x8000, 0x4000)));
        assert_eq!(state.poll_rumble(t0), None); // unchanged, fires once

        state.playback(1, false, t0);
        assert_eq!(state.poll_rumble(t0), Some((0, 0)));
    }

    #[test]
    fn effects_expire_after_their_replay_length() {
        let mut state = FeedbackState::default();
        state.upload(&rumble_effect(1, 1000, 1000, 200));
        let t0 = Instant::now();
        state.playback(1, true, t0);
        assert!(state.poll_rumble(t0).is_some());
        assert_eq!(
            state.poll_rumble(t0 + Duration::from_millis(500)),
            Some((0, 0))
        );
    }

    #[test]
    fn zero_length_effects_play_until_stopped() {
        let mut state = FeedbackState::default();
        state.upload(&rumble_effect(1, 500, 500, 0));
        let t0 = Instant::now();
        state.playback(1, true, t0);
        assert_eq!(state.poll_rumble(t0), Some((500, 500)));
        assert_eq!(state.poll_rumble(t0 + Duration::from_secs(3600)), None);
    }

    #[test]
    fn gain_scales_the_accumulated_magnitudes() {
        let mut state = FeedbackState::default();
        state.upload(&rumble_effect(1, 0x8000, 0x8000, 0));
        let t0 = Instant::now();
        state.playback(1, true, t0);
        state.set_gain(0x8000);
        let (low, high) = state.poll_rumble(t0).unwrap();
        assert_eq!(low, (0x8000i64 * 0x8000 / 0xFFFF) as u16);
        assert_eq!(low, high);
    }

    #[test]
    fn concurrent_effects_accumulate() {
        let mut state = FeedbackState::default();
        state.upload(&rumble_effect(1, 100, 10, 0));
        state.upload(&rumble_effect(2, 200, 20, 0));
        let t0 = Instant::now();
        state.playback(1, true, t0);
        state.playback(2, true, t0);
        assert_eq!(state.poll_rumble(t0), Some((300, 30)));
    }

    #[test]
    fn envelope_attack_ramps_up_from_the_attack_level() {
        let effect = ActiveEffect {
            delay: Duration::ZERO,
            length: Some(Duration::from_millis(1000)),
            start: Magnitudes {
                weak: 1000,
                strong: 1000,
            },
            end: Magnitudes {
                weak: 1000,
                strong: 1000,
            },
            envelope: Envelope {
                attack_length: 500,
                attack_level: 0,
                fade_length: 0,
                fade_level: 0,
            },
            started_at: Some(Instant::now()),
        };
        let t0 = effect.started_at.unwrap();
        assert_eq!(simulate(&effect, t0).strong, 0);
        assert_eq!(simulate(&effect, t0 + Duration::from_millis(250)).strong, 500);
        assert_eq!(simulate(&effect, t0 + Duration::from_millis(600)).strong, 1000);
    }

    #[test]
    fn delayed_effects_stay_silent_until_due() {
        let mut effect = parse_effect(&rumble_effect(1, 700, 700, 100));
        effect.delay = Duration::from_millis(300);
        let t0 = Instant::now();
        effect.started_at = Some(t0);
        assert_eq!(simulate(&effect, t0).strong, 0);
        assert_eq!(simulate(&effect, t0 + Duration::from_millis(350)).strong, 700);
    }

    #[test]
    fn led_events_fold_into_one_color_change() {
        let mut state = FeedbackState::default();
        state.led_event(LED_MISC, 255);
        state.led_event(LED_MAIL, 128);
        state.led_event(LED_CHARGING, 0);
        assert_eq!(state.take_led(), Some((255, 128, 0)));
        assert_eq!(state.take_led(), None);

        state.led_event(LED_MAIL, 128); // unchanged channel
        assert_eq!(state.take_led(), None);
    }

    #[test]
    fn registering_a_second_callback_replaces_the_first() {
        let registry = CallbackRegistry::default();
        let first_hits = Arc::new(Mutex::new(0u32));
        let second_hits = Arc::new(Mutex::new(0u32));

        let hits = Arc::clone(&first_hits);
        registry.set_rumble(Arc::new(move |_, _| *hits.lock().unwrap() += 1));
        let hits = Arc::clone(&second_hits);
        registry.set_rumble(Arc::new(move |_, _| *hits.lock().unwrap() += 1));

        registry.fire_rumble(1, 2);
        assert_eq!(*first_hits.lock().unwrap(), 0);
        assert_eq!(*second_hits.lock().unwrap(), 1);
    }

    #[test]
    fn a_panicking_callback_does_not_unwind_into_the_dispatcher() {
        let registry = CallbackRegistry::default();
        registry.set_rumble(Arc::new(|_, _| panic!("boom")));
        registry.fire_rumble(1, 2); // must not propagate
        registry.clear_rumble();
        registry.fire_rumble(3, 4); // dropped, no callback registered
    }

    #[test]
    fn events_before_registration_are_dropped_not_buffered() {
        let registry = CallbackRegistry::default();
        registry.fire_rumble(9, 9);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.set_rumble(Arc::new(move |low, high| sink.lock().unwrap().push((low, high))));
        registry.fire_rumble(1, 2);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2)]);
    }

    #[test]
    fn reupload_keeps_playback_timing() {
        let mut state = FeedbackState::default();
        state.upload(&rumble_effect(1, 100, 100, 0));
        let t0 = Instant::now();
        state.playback(1, true, t0);
        assert_eq!(state.poll_rumble(t0), Some((100, 100)));

        state.upload(&rumble_effect(1, 900, 900, 0));
        assert_eq!(state.poll_rumble(t0), Some((900, 900)));
    }

    #[test]
    fn unused_envelope_parse_defaults() {
        let parsed = parse_effect(&ff_effect {
            type_: FF_CONSTANT,
            id: 3,
            direction: 0,
            trigger: ff_trigger::default(),
            replay: ff_replay {
                length: 100,
                delay: 0,
            },
            u: ff_effect_u {
                constant: crate::uinput::ff_constant_effect {
                    level: 123,
                    envelope: ff_envelope::default(),
                },
            },
        });
        assert_eq!(parsed.start.weak, 123);
        assert_eq!(parsed.end.strong, 123);
    }
}
