use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use bf_core::domain::UserId;

/// One search per user per period.
#[derive(Clone, Debug)]
pub struct Cooldown {
    period: Duration,
    last_use: HashMap<UserId, Instant>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_use: HashMap::new(),
        }
    }

    pub fn check(&mut self, user_id: UserId) -> (bool, Option<Duration>) {
        self.check_at(user_id, Instant::now())
    }

    /// Consume the user's slot if it is free; otherwise report the remaining wait.
    pub fn check_at(&mut self, user_id: UserId, now: Instant) -> (bool, Option<Duration>) {
        if self.period.is_zero() {
            return (true, None);
        }

        if let Some(last) = self.last_use.get(&user_id) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.period {
                return (false, Some(self.period - elapsed));
            }
        }

        // Forget users whose slot has reopened so the map stays small.
        let period = self.period;
        self.last_use
            .retain(|_, last| now.saturating_duration_since(*last) < period);
        self.last_use.insert(user_id, now);
        (true, None)
    }
}
