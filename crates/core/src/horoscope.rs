use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TRANSITS: [&str; 5] = [
    "Mercury retrograde in Sagittarius",
    "Venus conjunct Jupiter",
    "Mars square Pluto",
    "Jupiter trine your Sun",
    "Saturn sextile your Moon",
];

pub fn default_transits() -> Vec<String> {
    DEFAULT_TRANSITS.iter().map(|transit| transit.to_string()).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoroscopePeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl HoroscopePeriod {
    pub fn text(self) -> &'static str {
        match self {
            Self::Daily => "Today's cosmic energy brings powerful transformation. Jupiter's alignment with your natal Sun suggests breakthrough moments in personal growth. Trust your intuition as Mercury dances through your communication sector.",
            Self::Weekly => "This week, Mercury retrograde in your communication sector asks for patience in relationships. Venus brings harmony to your creative projects and social connections. The lunar eclipse illuminates hidden aspects of your personality.",
            Self::Monthly => "This month brings profound changes as Pluto aspects your midheaven. Career shifts align with your soul's purpose. Embrace the transformation with confidence as Saturn's lessons prepare you for long-term success.",
        }
    }
}

impl FromStr for HoroscopePeriod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnergyMeter {
    pub name: &'static str,
    pub value: f64,
}

/// Cosmetic gauges, redrawn on every dashboard view.
pub fn energy_meters<R: Rng + ?Sized>(rng: &mut R) -> Vec<EnergyMeter> {
    ["Love", "Career", "Health", "Finance"]
        .into_iter()
        .map(|name| EnergyMeter {
            name,
            value: rng.gen_range(0.0..100.0),
        })
        .collect()
}

/// Simulated "typing" pause before a reply is shown.
pub fn typing_delay<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    Duration::from_millis(1_500 + rng.gen_range(0..1_000))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn meters_are_percentages() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let meters = energy_meters(&mut rng);
        assert_eq!(meters.len(), 4);
        assert!(meters.iter().all(|meter| (0.0..100.0).contains(&meter.value)));
    }

    #[test]
    fn typing_delay_is_bounded() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let delay = typing_delay(&mut rng);
            assert!(delay >= Duration::from_millis(1_500));
            assert!(delay < Duration::from_millis(2_500));
        }
    }

    #[test]
    fn parses_periods() {
        assert_eq!("Weekly".parse::<HoroscopePeriod>(), Ok(HoroscopePeriod::Weekly));
        assert!("yearly".parse::<HoroscopePeriod>().is_err());
    }
}
