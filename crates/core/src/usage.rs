use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::UsageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub day: NaiveDate,
    pub chat: u32,
    pub voice: u32,
    pub video: u32,
}

impl UsageCounters {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            chat: 0,
            voice: 0,
            video: 0,
        }
    }

    /// Counters are per calendar day; a new day starts from zero.
    pub fn roll_over(&mut self, today: NaiveDate) {
        if self.day != today {
            *self = Self::new(today);
        }
    }

    pub fn get(&self, kind: UsageKind) -> u32 {
        match kind {
            UsageKind::Chat => self.chat,
            UsageKind::Voice => self.voice,
            UsageKind::Video => self.video,
        }
    }

    pub fn increment(&mut self, kind: UsageKind, today: NaiveDate) {
        self.roll_over(today);
        let slot = match kind {
            UsageKind::Chat => &mut self.chat,
            UsageKind::Voice => &mut self.voice,
            UsageKind::Video => &mut self.video,
        };
        *slot = slot.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDecision {
    pub kind: UsageKind,
    pub allowed: bool,
    pub used: u32,
    /// `None` when the session is not metered (guests).
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePolicy {
    pub chat_daily_limit: u32,
    pub voice_daily_limit: u32,
    pub video_daily_limit: u32,
}

impl Default for UsagePolicy {
    fn default() -> Self {
        Self {
            chat_daily_limit: 10,
            voice_daily_limit: 1,
            video_daily_limit: 1,
        }
    }
}

impl UsagePolicy {
    pub fn limit_for(&self, kind: UsageKind) -> u32 {
        match kind {
            UsageKind::Chat => self.chat_daily_limit,
            UsageKind::Voice => self.voice_daily_limit,
            UsageKind::Video => self.video_daily_limit,
        }
    }

    /// Guests are not metered; signed-up free-tier sessions are.
    pub fn check(
        &self,
        kind: UsageKind,
        counters: &UsageCounters,
        is_guest: bool,
        today: NaiveDate,
    ) -> UsageDecision {
        let used = if counters.day == today {
            counters.get(kind)
        } else {
            0
        };

        if is_guest {
            return UsageDecision {
                kind,
                allowed: true,
                used,
                limit: None,
                remaining: None,
            };
        }

        let limit = self.limit_for(kind);
        UsageDecision {
            kind,
            allowed: used < limit,
            used,
            limit: Some(limit),
            remaining: Some(limit.saturating_sub(used)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).expect("valid date")
    }

    #[test]
    fn eleventh_chat_is_blocked_for_members() {
        let policy = UsagePolicy::default();
        let mut counters = UsageCounters::new(day(1));
        for _ in 0..10 {
            assert!(policy.check(UsageKind::Chat, &counters, false, day(1)).allowed);
            counters.increment(UsageKind::Chat, day(1));
        }
        let decision = policy.check(UsageKind::Chat, &counters, false, day(1));
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, Some(0));
    }

    #[test]
    fn guests_are_not_metered() {
        let policy = UsagePolicy::default();
        let mut counters = UsageCounters::new(day(1));
        for _ in 0..50 {
            counters.increment(UsageKind::Chat, day(1));
        }
        let decision = policy.check(UsageKind::Chat, &counters, true, day(1));
        assert!(decision.allowed);
        assert_eq!(decision.limit, None);
    }

    #[test]
    fn counters_reset_on_a_new_day() {
        let policy = UsagePolicy::default();
        let mut counters = UsageCounters::new(day(1));
        counters.increment(UsageKind::Voice, day(1));
        assert!(!policy.check(UsageKind::Voice, &counters, false, day(1)).allowed);
        assert!(policy.check(UsageKind::Voice, &counters, false, day(2)).allowed);

        counters.increment(UsageKind::Chat, day(2));
        assert_eq!(counters.day, day(2));
        assert_eq!(counters.voice, 0);
        assert_eq!(counters.chat, 1);
    }
}
