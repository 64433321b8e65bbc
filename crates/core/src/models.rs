use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LyraError, LyraResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Persona {
    #[default]
    Astrologer,
    Therapist,
    Friend,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Self::Astrologer, Self::Therapist, Self::Friend];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "astrologer" => Some(Self::Astrologer),
            "therapist" => Some(Self::Therapist),
            "friend" => Some(Self::Friend),
            _ => None,
        }
    }

    /// Unknown or missing labels resolve to the default persona.
    pub fn from_optional_str(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Astrologer => "Astrologer",
            Self::Therapist => "Therapist",
            Self::Friend => "Friend",
        }
    }

    pub fn tagline(self) -> &'static str {
        match self {
            Self::Astrologer => "Wise & Technical",
            Self::Therapist => "Supportive & Soft",
            Self::Friend => "Casual & Encouraging",
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            Self::Astrologer => "🔮",
            Self::Therapist => "💙",
            Self::Friend => "✨",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Persona {
    type Err = LyraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| LyraError::UnknownPersona(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Sad,
    Happy,
    Love,
    Career,
    Money,
    Health,
    Question,
    Fallback,
}

impl Intent {
    pub const ALL: [Intent; 9] = [
        Self::Greeting,
        Self::Sad,
        Self::Happy,
        Self::Love,
        Self::Career,
        Self::Money,
        Self::Health,
        Self::Question,
        Self::Fallback,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "greeting" => Some(Self::Greeting),
            "sad" => Some(Self::Sad),
            "happy" => Some(Self::Happy),
            "love" => Some(Self::Love),
            "career" => Some(Self::Career),
            "money" => Some(Self::Money),
            "health" => Some(Self::Health),
            "question" => Some(Self::Question),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Sad => "sad",
            Self::Happy => "happy",
            Self::Love => "love",
            Self::Career => "career",
            Self::Money => "money",
            Self::Health => "health",
            Self::Question => "question",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for Intent {
    type Err = LyraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| LyraError::UnknownIntent(s.to_string()))
    }
}

/// Birth moment and place fed to the chart generator. Values are not
/// validated; out-of-range input still yields a chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BirthParameters {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub latitude: f64,
    pub longitude: f64,
}

impl BirthParameters {
    pub fn from_datetime<Tz: TimeZone>(at: &DateTime<Tz>, latitude: f64, longitude: f64) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
            day: at.day(),
            hour: at.hour(),
            minute: at.minute(),
            latitude,
            longitude,
        }
    }

    /// Stable 64-bit digest of every field, used to seed birth-keyed charts.
    pub fn digest(&self) -> u64 {
        let mut bytes = Vec::with_capacity(40);
        bytes.extend_from_slice(&self.year.to_le_bytes());
        bytes.extend_from_slice(&self.month.to_le_bytes());
        bytes.extend_from_slice(&self.day.to_le_bytes());
        bytes.extend_from_slice(&self.hour.to_le_bytes());
        bytes.extend_from_slice(&self.minute.to_le_bytes());
        bytes.extend_from_slice(&self.latitude.to_bits().to_le_bytes());
        bytes.extend_from_slice(&self.longitude.to_bits().to_le_bytes());
        crate::geo::fnv1a(&bytes)
    }
}

/// What the onboarding flow collects before anything is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthProfile {
    pub date: String,
    pub time: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl BirthProfile {
    pub fn to_parameters(&self) -> LyraResult<BirthParameters> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| LyraError::InvalidBirthDate(self.date.clone()))?;
        let raw_time = self.time.trim();
        let time = NaiveTime::parse_from_str(raw_time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw_time, "%H:%M:%S"))
            .map_err(|_| LyraError::InvalidBirthTime(self.time.clone()))?;

        Ok(BirthParameters {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            hour: time.hour(),
            minute: time.minute(),
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: ChatSender,
    pub text: String,
    pub intent: Option<Intent>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInput {
    pub session_id: Option<String>,
    pub text: String,
    pub persona: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Chat,
    Voice,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub session_id: String,
    pub reply_text: String,
    pub intent: Intent,
    pub persona: Persona,
    pub limited: bool,
    pub usage: crate::usage::UsageDecision,
    pub typing_delay_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_persona_resolves_to_default() {
        assert_eq!(Persona::from_optional_str(Some("Oracle")), Persona::Astrologer);
        assert_eq!(Persona::from_optional_str(Some(" friend ")), Persona::Friend);
        assert_eq!(Persona::from_optional_str(None), Persona::Astrologer);
        assert!("Oracle".parse::<Persona>().is_err());
    }

    #[test]
    fn birth_profile_parses_onboarding_strings() {
        let profile = BirthProfile {
            date: "1990-01-01".to_string(),
            time: "07:45".to_string(),
            location: "New York".to_string(),
            latitude: 40.7128,
            longitude: -74.0060,
        };
        let params = profile.to_parameters().expect("valid profile");
        assert_eq!(params.year, 1990);
        assert_eq!(params.hour, 7);
        assert_eq!(params.minute, 45);
    }

    #[test]
    fn birth_profile_rejects_bad_time() {
        let profile = BirthProfile {
            date: "1990-01-01".to_string(),
            time: "quarter past".to_string(),
            location: String::new(),
            latitude: 0.0,
            longitude: 0.0,
        };
        assert!(matches!(
            profile.to_parameters(),
            Err(LyraError::InvalidBirthTime(_))
        ));
    }

    #[test]
    fn digest_is_stable_and_field_sensitive() {
        let base = BirthParameters {
            year: 1990,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            latitude: 0.0,
            longitude: 0.0,
        };
        let moved = BirthParameters {
            latitude: 1.0,
            ..base
        };
        assert_eq!(base.digest(), base.digest());
        assert_ne!(base.digest(), moved.digest());
    }
}
