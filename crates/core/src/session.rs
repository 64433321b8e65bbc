use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::chart::NatalChart;
use crate::models::{BirthProfile, ChatMessage, ChatSender, Intent, Persona, UsageKind};
use crate::responses::ResponseContext;
use crate::usage::UsageCounters;

pub const MAX_HISTORY_MESSAGES: usize = 40;

/// Everything one user's conversation and dashboard need, passed explicitly
/// to whoever needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub user_name: Option<String>,
    pub persona: Persona,
    pub is_guest: bool,
    pub birth: Option<BirthProfile>,
    pub chart: Option<NatalChart>,
    pub usage: UsageCounters,
    pub history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(
        session_id: impl Into<String>,
        user_name: Option<String>,
        persona: Persona,
        is_guest: bool,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_name: user_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            persona,
            is_guest,
            birth: None,
            chart: None,
            usage: UsageCounters::new(now.date_naive()),
            history: Vec::new(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn set_persona(&mut self, persona: Persona) {
        self.persona = persona;
    }

    /// The chart is computed once per birth profile and reused for the rest
    /// of the session.
    pub fn set_birth(&mut self, profile: BirthProfile, chart: NatalChart) {
        self.birth = Some(profile);
        self.chart = Some(chart);
    }

    pub fn touch(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.expires_at = now + ttl;
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn record_usage(&mut self, kind: UsageKind, now: DateTime<Utc>) {
        self.usage.increment(kind, now.date_naive());
    }

    pub fn response_context(&self, transits: &[String]) -> ResponseContext {
        let chart = self.chart.as_ref();
        ResponseContext {
            user_name: self.user_name.clone(),
            sun_sign: chart
                .and_then(NatalChart::sun_sign)
                .map(|sign| sign.label().to_string()),
            moon_sign: chart
                .and_then(NatalChart::moon_sign)
                .map(|sign| sign.label().to_string()),
            rising_sign: chart.map(|chart| chart.rising_sign().label().to_string()),
            transits: transits.to_vec(),
        }
    }

    pub fn push_message(
        &mut self,
        sender: ChatSender,
        text: impl Into<String>,
        intent: Option<Intent>,
        at: DateTime<Utc>,
    ) {
        let prefix = match sender {
            ChatSender::User => "user",
            ChatSender::Assistant => "ai",
        };
        self.history.push(ChatMessage {
            id: format!("{prefix}-{}-{}", at.timestamp_millis(), self.history.len()),
            sender,
            text: text.into(),
            intent,
            at,
        });

        if self.history.len() > MAX_HISTORY_MESSAGES {
            let keep_from = self.history.len() - MAX_HISTORY_MESSAGES;
            self.history = self.history.split_off(keep_from);
        }
    }

    pub fn record_exchange(
        &mut self,
        user_text: &str,
        reply_text: &str,
        intent: Intent,
        at: DateTime<Utc>,
    ) {
        self.push_message(ChatSender::User, user_text, None, at);
        self.push_message(ChatSender::Assistant, reply_text, Some(intent), at);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::chart::ChartGenerator;

    fn session() -> SessionContext {
        SessionContext::new(
            "s-1",
            Some("  Alex ".to_string()),
            Persona::Friend,
            false,
            Utc::now(),
            Duration::hours(24),
        )
    }

    #[test]
    fn history_is_capped() {
        let mut session = session();
        let now = Utc::now();
        for index in 0..30 {
            session.record_exchange(&format!("message {index}"), "reply", Intent::Fallback, now);
        }
        assert_eq!(session.history.len(), MAX_HISTORY_MESSAGES);
        assert_eq!(session.history[0].text, "message 10");
        assert_eq!(session.history.last().map(|m| m.sender), Some(ChatSender::Assistant));
    }

    #[test]
    fn context_without_chart_leaves_signs_empty() {
        let context = session().response_context(&[]);
        assert_eq!(context.user_name.as_deref(), Some("Alex"));
        assert!(context.sun_sign.is_none());
        assert!(context.rising_sign.is_none());
    }

    #[test]
    fn context_reads_signs_from_the_session_chart() {
        let mut session = session();
        let profile = BirthProfile {
            date: "1990-01-01".to_string(),
            time: "00:00".to_string(),
            location: "Nowhere".to_string(),
            latitude: 0.0,
            longitude: 0.0,
        };
        let params = profile.to_parameters().expect("valid profile");
        let chart = ChartGenerator::default().generate(&params, &mut ChaCha8Rng::seed_from_u64(1));
        let expected_sun = chart.sun_sign().map(|sign| sign.label().to_string());
        session.set_birth(profile, chart);

        let context = session.response_context(&crate::horoscope::default_transits());
        assert_eq!(context.sun_sign, expected_sun);
        assert_eq!(context.transits.len(), 5);
    }

    #[test]
    fn expiry_moves_with_touch() {
        let mut session = session();
        let later = session.expires_at + Duration::minutes(1);
        assert!(session.is_expired(later));
        session.touch(later, Duration::hours(1));
        assert!(!session.is_expired(later));
    }
}
