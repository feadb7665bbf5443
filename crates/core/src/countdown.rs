//! Tick-driven countdown for timed sessions.
//!
//! The countdown never reads the wall clock. A host calls [`CountdownClock::tick`]
//! once per elapsed second (from a real interval or from virtual time in tests)
//! and reacts to the returned events.

use std::fmt;

/// A one-shot remaining-time alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningThreshold {
    FiveMinutes,
    OneMinute,
}

impl WarningThreshold {
    /// Thresholds in firing order.
    pub const ALL: [WarningThreshold; 2] = [WarningThreshold::FiveMinutes, WarningThreshold::OneMinute];

    /// Remaining seconds at or below which the warning fires.
    #[must_use]
    pub fn seconds(self) -> u32 {
        match self {
            WarningThreshold::FiveMinutes => 300,
            WarningThreshold::OneMinute => 60,
        }
    }

    fn index(self) -> usize {
        match self {
            WarningThreshold::FiveMinutes => 0,
            WarningThreshold::OneMinute => 1,
        }
    }
}

impl fmt::Display for WarningThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningThreshold::FiveMinutes => f.write_str("5 minutes remaining"),
            WarningThreshold::OneMinute => f.write_str("1 minute remaining"),
        }
    }
}

/// Something the countdown wants the host to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Tick { time_left_seconds: u32 },
    Warning(WarningThreshold),
    Expired,
}

/// Single countdown with warning thresholds and a one-shot expiry.
#[derive(Debug, Clone, Default)]
pub struct CountdownClock {
    time_left_seconds: u32,
    running: bool,
    expired: bool,
    warned: [bool; 2],
}

impl CountdownClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting down from `duration_seconds`.
    ///
    /// A non-positive duration leaves the clock stopped: the session is untimed
    /// and will never expire. Restarting an already started clock is ignored.
    pub fn start(&mut self, duration_seconds: i64) {
        if self.running || self.expired {
            return;
        }
        let Ok(duration) = u32::try_from(duration_seconds) else {
            return;
        };
        if duration == 0 {
            return;
        }
        self.time_left_seconds = duration;
        self.running = true;
        tracing::debug!(duration_seconds = duration, "countdown started");
    }

    /// Stop the countdown. Idempotent; a stopped clock ignores ticks.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Advance by one second.
    ///
    /// Returns the events produced by this tick in order: the tick itself, any
    /// newly crossed warnings, and expiry when the clock reaches zero.
    pub fn tick(&mut self) -> Vec<ClockEvent> {
        if !self.running {
            return Vec::new();
        }

        self.time_left_seconds = self.time_left_seconds.saturating_sub(1);
        let mut events = vec![ClockEvent::Tick {
            time_left_seconds: self.time_left_seconds,
        }];

        for threshold in WarningThreshold::ALL {
            let fired = &mut self.warned[threshold.index()];
            if !*fired && self.time_left_seconds <= threshold.seconds() {
                *fired = true;
                tracing::info!(time_left = self.time_left_seconds, %threshold, "time warning");
                events.push(ClockEvent::Warning(threshold));
            }
        }

        if self.time_left_seconds == 0 && !self.expired {
            self.expired = true;
            self.running = false;
            tracing::info!("countdown expired");
            events.push(ClockEvent::Expired);
        }

        events
    }

    /// Add time to a running countdown. Warnings already fired stay fired.
    pub fn extend(&mut self, seconds: u32) {
        if self.running {
            self.time_left_seconds = self.time_left_seconds.saturating_add(seconds);
        }
    }

    #[must_use]
    pub fn time_left_seconds(&self) -> u32 {
        self.time_left_seconds
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.expired
    }

    #[must_use]
    pub fn has_warned(&self, threshold: WarningThreshold) -> bool {
        self.warned[threshold.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(clock: &mut CountdownClock, ticks: usize) -> Vec<ClockEvent> {
        (0..ticks).flat_map(|_| clock.tick()).collect()
    }

    fn count(events: &[ClockEvent], wanted: ClockEvent) -> usize {
        events.iter().filter(|e| **e == wanted).count()
    }

    #[test]
    fn untimed_clock_never_starts_or_expires() {
        for duration in [0, -5] {
            let mut clock = CountdownClock::new();
            clock.start(duration);
            assert!(!clock.is_running());
            assert!(run(&mut clock, 10).is_empty());
            assert!(!clock.has_expired());
        }
    }

    #[test]
    fn never_negative_and_expires_exactly_once() {
        let mut clock = CountdownClock::new();
        clock.start(3);
        let mut expiries = 0;
        for _ in 0..10 {
            for event in clock.tick() {
                if event == ClockEvent::Expired {
                    expiries += 1;
                }
            }
            // u32 cannot go negative; check it bottoms out at zero
            assert!(clock.time_left_seconds() <= 3);
        }
        assert_eq!(expiries, 1);
        assert_eq!(clock.time_left_seconds(), 0);
        assert!(!clock.is_running());
    }

    #[test]
    fn ten_minute_session_warns_in_order() {
        let mut clock = CountdownClock::new();
        clock.start(600);

        let events = run(&mut clock, 539);
        assert_eq!(clock.time_left_seconds(), 61);
        assert_eq!(count(&events, ClockEvent::Warning(WarningThreshold::FiveMinutes)), 1);
        assert_eq!(count(&events, ClockEvent::Warning(WarningThreshold::OneMinute)), 0);

        let events = run(&mut clock, 1);
        assert_eq!(clock.time_left_seconds(), 60);
        assert_eq!(events.last(), Some(&ClockEvent::Warning(WarningThreshold::OneMinute)));

        let events = run(&mut clock, 60);
        assert_eq!(count(&events, ClockEvent::Expired), 1);
        assert_eq!(count(&events, ClockEvent::Warning(WarningThreshold::FiveMinutes)), 0);
    }

    #[test]
    fn one_minute_warning_is_inclusive_at_sixty() {
        // 541 ticks from 600 leave 59 seconds, already inside the one-minute band.
        let mut clock = CountdownClock::new();
        clock.start(600);
        let events = run(&mut clock, 541);
        assert_eq!(clock.time_left_seconds(), 59);
        assert_eq!(count(&events, ClockEvent::Warning(WarningThreshold::FiveMinutes)), 1);
        assert_eq!(count(&events, ClockEvent::Warning(WarningThreshold::OneMinute)), 1);
        assert!(clock.has_warned(WarningThreshold::OneMinute));
        assert!(!clock.has_expired());
    }

    #[test]
    fn five_minute_warning_fires_when_crossing_300() {
        let mut clock = CountdownClock::new();
        clock.start(600);
        let events = run(&mut clock, 299);
        assert!(!clock.has_warned(WarningThreshold::FiveMinutes));
        assert!(events.iter().all(|e| matches!(e, ClockEvent::Tick { .. })));
        let events = run(&mut clock, 1);
        assert_eq!(
            events,
            vec![
                ClockEvent::Tick { time_left_seconds: 300 },
                ClockEvent::Warning(WarningThreshold::FiveMinutes)
            ]
        );
    }

    #[test]
    fn short_session_fires_both_warnings_on_first_tick_in_order() {
        let mut clock = CountdownClock::new();
        clock.start(30);
        assert_eq!(
            clock.tick(),
            vec![
                ClockEvent::Tick { time_left_seconds: 29 },
                ClockEvent::Warning(WarningThreshold::FiveMinutes),
                ClockEvent::Warning(WarningThreshold::OneMinute),
            ]
        );
    }

    #[test]
    fn extension_does_not_rearm_warnings() {
        let mut clock = CountdownClock::new();
        clock.start(301);
        let events = run(&mut clock, 1);
        assert_eq!(count(&events, ClockEvent::Warning(WarningThreshold::FiveMinutes)), 1);

        clock.extend(600);
        assert_eq!(clock.time_left_seconds(), 900);
        let events = run(&mut clock, 850);
        assert_eq!(clock.time_left_seconds(), 50);
        assert_eq!(count(&events, ClockEvent::Warning(WarningThreshold::FiveMinutes)), 0);
        assert_eq!(count(&events, ClockEvent::Warning(WarningThreshold::OneMinute)), 1);
    }

    #[test]
    fn stopped_clock_ignores_ticks_and_extension() {
        let mut clock = CountdownClock::new();
        clock.start(100);
        run(&mut clock, 10);
        clock.stop();
        clock.stop();
        assert!(run(&mut clock, 5).is_empty());
        clock.extend(50);
        assert_eq!(clock.time_left_seconds(), 90);
    }
}
