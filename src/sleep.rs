use std::time::{Duration, Instant};

pub const MIN_MINUTES: u64 = 5;
pub const MAX_MINUTES: u64 = 120;
pub const DEFAULT_MINUTES: u64 = 30;
pub const ADJUST_STEP_SECS: i64 = 60;

const MAX_SECS: u64 = MAX_MINUTES * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    Minutes,
    EndOfSong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Armed {
    deadline: Instant,
    mode: SleepMode,
}

#[derive(Debug, Clone, Default)]
pub struct SleepTimer {
    armed: Option<Armed>,
}

impl SleepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.armed.is_some()
    }

    pub fn mode(&self) -> Option<SleepMode> {
        self.armed.map(|armed| armed.mode)
    }

    pub fn start_minutes(&mut self, minutes: u64, now: Instant) -> u64 {
        let minutes = minutes.clamp(MIN_MINUTES, MAX_MINUTES);
        self.armed = Some(Armed {
            deadline: now + Duration::from_secs(minutes * 60),
            mode: SleepMode::Minutes,
        });
        log::info!("sleep timer set for {minutes} min");
        minutes
    }

    pub fn start_end_of_song(
        &mut self,
        time_ms: u64,
        length_ms: Option<u64>,
        now: Instant,
    ) -> Option<u64> {
        let length_ms = length_ms.filter(|length| *length > 0)?;
        let secs = (length_ms.saturating_sub(time_ms) / 1000).max(1);
        self.armed = Some(Armed {
            deadline: now + Duration::from_secs(secs),
            mode: SleepMode::EndOfSong,
        });
        log::info!("sleep timer set for end of song ({secs}s)");
        Some(secs)
    }

    pub fn adjust(&mut self, delta_secs: i64, now: Instant) -> Option<u64> {
        let remaining = self.remaining_secs(now)?;
        let adjusted = (remaining as i64)
            .saturating_add(delta_secs)
            .clamp(0, MAX_SECS as i64) as u64;
        if adjusted == 0 {
            self.cancel();
            return None;
        }

        if let Some(armed) = self.armed.as_mut() {
            armed.deadline = now + Duration::from_secs(adjusted);
        }
        Some(adjusted)
    }

    pub fn cancel(&mut self) {
        if self.armed.take().is_some() {
            log::info!("sleep timer cancelled");
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.armed
            .map(|armed| armed.deadline.saturating_duration_since(now))
    }

    pub fn remaining_secs(&self, now: Instant) -> Option<u64> {
        self.remaining(now).map(|left| left.as_secs())
    }

    /// True exactly once, when the deadline has passed. The timer disarms itself.
    pub fn check_expired(&mut self, now: Instant) -> bool {
        match self.armed {
            Some(armed) if now >= armed.deadline => {
                self.armed = None;
                log::info!("sleep timer expired");
                true
            }
            _ => false,
        }
    }

    pub fn label(&self, now: Instant) -> String {
        match self.remaining_secs(now) {
            None => String::from("--"),
            Some(secs) if secs >= 60 => format!("{:02}", secs / 60),
            Some(secs) => format!("{secs:02}"),
        }
    }
}

pub fn format_clock(total_secs: u64) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_are_clamped() {
        let now = Instant::now();
        let mut timer = SleepTimer::new();
        assert_eq!(timer.start_minutes(1, now), MIN_MINUTES);
        assert_eq!(timer.remaining_secs(now), Some(300));
        assert_eq!(timer.start_minutes(500, now), MAX_MINUTES);
        assert_eq!(timer.mode(), Some(SleepMode::Minutes));
    }

    #[test]
    fn end_of_song_needs_length() {
        let now = Instant::now();
        let mut timer = SleepTimer::new();
        assert_eq!(timer.start_end_of_song(1_000, None, now), None);
        assert!(!timer.is_active());

        assert_eq!(timer.start_end_of_song(170_000, Some(180_500), now), Some(10));
        assert_eq!(timer.mode(), Some(SleepMode::EndOfSong));
        assert_eq!(timer.start_end_of_song(180_000, Some(180_200), now), Some(1));
    }

    #[test]
    fn adjust_clamps_and_cancels_at_zero() {
        let now = Instant::now();
        let mut timer = SleepTimer::new();
        assert_eq!(timer.adjust(ADJUST_STEP_SECS, now), None, "idle timer ignores adjust");

        timer.start_minutes(MAX_MINUTES, now);
        assert_eq!(timer.adjust(ADJUST_STEP_SECS, now), Some(MAX_SECS));

        timer.start_minutes(MIN_MINUTES, now);
        assert_eq!(timer.adjust(-ADJUST_STEP_SECS, now), Some(240));
        for _ in 0..4 {
            timer.adjust(-ADJUST_STEP_SECS, now);
        }
        assert!(!timer.is_active());
    }

    #[test]
    fn expiry_fires_once() {
        let now = Instant::now();
        let mut timer = SleepTimer::new();
        timer.start_minutes(5, now);
        assert!(!timer.check_expired(now + Duration::from_secs(299)));
        assert!(timer.check_expired(now + Duration::from_secs(300)));
        assert!(!timer.check_expired(now + Duration::from_secs(301)));
        assert!(!timer.is_active());
    }

    #[test]
    fn labels_switch_to_seconds_under_a_minute() {
        let now = Instant::now();
        let mut timer = SleepTimer::new();
        assert_eq!(timer.label(now), "--");

        timer.start_minutes(30, now);
        assert_eq!(timer.label(now), "30");
        assert_eq!(timer.label(now + Duration::from_secs(30 * 60 - 45)), "45");
        assert_eq!(timer.label(now + Duration::from_secs(30 * 60 - 5)), "05");
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(95), "01:35");
        assert_eq!(format_clock(7_200), "120:00");
    }
}
