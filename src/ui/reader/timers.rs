use std::time::{Duration, Instant};

/// Turns the page every `interval` while enabled.
#[derive(Debug, Clone)]
pub struct AutoFlip {
    interval: Duration,
    last_flip: Instant,
    enabled: bool,
}

impl AutoFlip {
    pub fn new(interval_secs: u64, enabled: bool, now: Instant) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs.max(1)),
            last_flip: now,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool, now: Instant) {
        self.enabled = enabled;
        self.last_flip = now;
    }

    /// Restart the countdown, e.g. after a manual page turn.
    pub fn reset(&mut self, now: Instant) {
        self.last_flip = now;
    }

    /// True when a flip is due; the countdown restarts.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.enabled && now.duration_since(self.last_flip) >= self.interval {
            self.last_flip = now;
            true
        } else {
            false
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.enabled
            .then(|| self.interval.saturating_sub(now.duration_since(self.last_flip)))
    }
}

/// Fires once per `interval` of continuous reading; an interval of zero disables it.
#[derive(Debug, Clone)]
pub struct Reminder {
    interval: Option<Duration>,
    next_due: Instant,
}

impl Reminder {
    pub fn new(interval_minutes: u64, now: Instant) -> Self {
        let interval = (interval_minutes > 0).then(|| Duration::from_secs(interval_minutes * 60));
        Self {
            interval,
            next_due: now + interval.unwrap_or_default(),
        }
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        match self.interval {
            Some(interval) if now >= self.next_due => {
                self.next_due = now + interval;
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.interval
            .map(|_| self.next_due.saturating_duration_since(now))
    }

    /// Push the next reminder back, e.g. by the time the reader was hidden.
    pub fn postpone(&mut self, by: Duration) {
        self.next_due += by;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_flip_fires_each_interval() {
        let start = Instant::now();
        let mut flip = AutoFlip::new(5, true, start);

        assert!(!flip.tick(start + Duration::from_secs(4)));
        assert_eq!(flip.remaining(start + Duration::from_secs(4)), Some(Duration::from_secs(1)));
        assert!(flip.tick(start + Duration::from_secs(5)));
        assert!(!flip.tick(start + Duration::from_secs(6)));
        assert!(flip.tick(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_auto_flip_disabled() {
        let start = Instant::now();
        let mut flip = AutoFlip::new(5, false, start);
        assert!(!flip.tick(start + Duration::from_secs(60)));
        assert_eq!(flip.remaining(start), None);

        flip.set_enabled(true, start + Duration::from_secs(60));
        assert!(!flip.tick(start + Duration::from_secs(62)));
        assert!(flip.tick(start + Duration::from_secs(65)));
    }

    #[test]
    fn test_auto_flip_reset_and_zero_interval() {
        let start = Instant::now();
        let mut flip = AutoFlip::new(0, true, start);
        assert!(flip.tick(start + Duration::from_secs(1)));

        let mut flip = AutoFlip::new(5, true, start);
        flip.reset(start + Duration::from_secs(4));
        assert!(!flip.tick(start + Duration::from_secs(6)));
    }

    #[test]
    fn test_reminder_once_per_interval() {
        let start = Instant::now();
        let mut reminder = Reminder::new(30, start);
        assert!(!reminder.tick(start + Duration::from_secs(29 * 60)));
        assert!(reminder.tick(start + Duration::from_secs(30 * 60)));
        assert!(!reminder.tick(start + Duration::from_secs(31 * 60)));
        assert!(reminder.tick(start + Duration::from_secs(60 * 60)));
    }

    #[test]
    fn test_reminder_disabled() {
        let start = Instant::now();
        let mut reminder = Reminder::new(0, start);
        assert!(!reminder.tick(start + Duration::from_secs(24 * 3600)));
        assert_eq!(reminder.remaining(start), None);
    }

    #[test]
    fn test_reminder_postpone() {
        let start = Instant::now();
        let mut reminder = Reminder::new(1, start);
        reminder.postpone(Duration::from_secs(30));
        assert!(!reminder.tick(start + Duration::from_secs(60)));
        assert_eq!(
            reminder.remaining(start + Duration::from_secs(60)),
            Some(Duration::from_secs(30))
        );
        assert!(reminder.tick(start + Duration::from_secs(90)));
    }
}
