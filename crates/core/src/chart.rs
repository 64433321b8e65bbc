//! Mock natal charts.
//!
//! Positions, signs and houses are drawn from a random source. They are not
//! derived from an ephemeris and carry no astronomical meaning; two charts for
//! the same person differ unless [`ChartMode::BirthSeeded`] is used.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::models::BirthParameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        Self::Aries,
        Self::Taurus,
        Self::Gemini,
        Self::Cancer,
        Self::Leo,
        Self::Virgo,
        Self::Libra,
        Self::Scorpio,
        Self::Sagittarius,
        Self::Capricorn,
        Self::Aquarius,
        Self::Pisces,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Aries => "Aries",
            Self::Taurus => "Taurus",
            Self::Gemini => "Gemini",
            Self::Cancer => "Cancer",
            Self::Leo => "Leo",
            Self::Virgo => "Virgo",
            Self::Libra => "Libra",
            Self::Scorpio => "Scorpio",
            Self::Sagittarius => "Sagittarius",
            Self::Capricorn => "Capricorn",
            Self::Aquarius => "Aquarius",
            Self::Pisces => "Pisces",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Self::Aries => "♈",
            Self::Taurus => "♉",
            Self::Gemini => "♊",
            Self::Cancer => "♋",
            Self::Leo => "♌",
            Self::Virgo => "♍",
            Self::Libra => "♎",
            Self::Scorpio => "♏",
            Self::Sagittarius => "♐",
            Self::Capricorn => "♑",
            Self::Aquarius => "♒",
            Self::Pisces => "♓",
        }
    }

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&Self::Aries)
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CelestialBody {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
}

impl CelestialBody {
    pub const ALL: [CelestialBody; 10] = [
        Self::Sun,
        Self::Moon,
        Self::Mercury,
        Self::Venus,
        Self::Mars,
        Self::Jupiter,
        Self::Saturn,
        Self::Uranus,
        Self::Neptune,
        Self::Pluto,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Sun => "Sun",
            Self::Moon => "Moon",
            Self::Mercury => "Mercury",
            Self::Venus => "Venus",
            Self::Mars => "Mars",
            Self::Jupiter => "Jupiter",
            Self::Saturn => "Saturn",
            Self::Uranus => "Uranus",
            Self::Neptune => "Neptune",
            Self::Pluto => "Pluto",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Self::Sun => "☉",
            Self::Moon => "☽",
            Self::Mercury => "☿",
            Self::Venus => "♀",
            Self::Mars => "♂",
            Self::Jupiter => "♃",
            Self::Saturn => "♄",
            Self::Uranus => "♅",
            Self::Neptune => "♆",
            Self::Pluto => "♇",
        }
    }

    /// Chance that a generated position is flagged retrograde.
    pub fn retrograde_probability(self) -> f64 {
        match self {
            Self::Sun | Self::Moon | Self::Venus => 0.0,
            Self::Mercury => 0.2,
            Self::Mars => 0.1,
            Self::Jupiter => 0.3,
            Self::Saturn => 0.4,
            Self::Uranus | Self::Neptune => 0.5,
            Self::Pluto => 0.6,
        }
    }
}

impl fmt::Display for CelestialBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectKind {
    Conjunction,
    Sextile,
    Trine,
    Square,
}

impl AspectKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Conjunction => "Conjunction",
            Self::Sextile => "Sextile",
            Self::Trine => "Trine",
            Self::Square => "Square",
        }
    }
}

/// Body pairs every chart reports, independent of actual separation.
pub const FIXED_ASPECTS: [(CelestialBody, CelestialBody, AspectKind); 4] = [
    (CelestialBody::Sun, CelestialBody::Moon, AspectKind::Conjunction),
    (CelestialBody::Mercury, CelestialBody::Venus, AspectKind::Sextile),
    (CelestialBody::Mars, CelestialBody::Jupiter, AspectKind::Trine),
    (CelestialBody::Saturn, CelestialBody::Pluto, AspectKind::Square),
];

pub const COMPATIBILITY_ASPECTS: [&str; 6] = [
    "Strong emotional connection through Moon aspects",
    "Complementary communication styles via Mercury harmony",
    "Shared values and goals indicated by Venus-Jupiter alignment",
    "Harmonious energy exchange with Mars-Sun compatibility",
    "Deep spiritual connection through Neptune-Pluto aspects",
    "Balanced partnership dynamics via Libra influences",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPosition {
    pub body: CelestialBody,
    pub ecliptic_degree: f64,
    pub sign: ZodiacSign,
    pub house: u8,
    pub retrograde: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseCusp {
    pub number: u8,
    pub horizon_degree: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aspect {
    pub first: CelestialBody,
    pub second: CelestialBody,
    pub kind: AspectKind,
    pub orb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub horizon_degree: f64,
    pub sign: ZodiacSign,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartMode {
    /// Every draw is independent of the birth data.
    #[default]
    Mock,
    /// Draws come from a generator seeded by the birth data, so equal input
    /// gives equal charts. Still not an ephemeris.
    BirthSeeded,
}

impl FromStr for ChartMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "mock" | "random" => Ok(Self::Mock),
            "birth_seeded" | "seeded" => Ok(Self::BirthSeeded),
            other => Err(format!("unknown chart mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NatalChart {
    pub mode: ChartMode,
    pub bodies: Vec<BodyPosition>,
    pub houses: Vec<HouseCusp>,
    pub aspects: Vec<Aspect>,
    pub ascendant: ChartPoint,
    pub midheaven: ChartPoint,
}

impl NatalChart {
    pub fn body(&self, body: CelestialBody) -> Option<&BodyPosition> {
        self.bodies.iter().find(|position| position.body == body)
    }

    pub fn sun_sign(&self) -> Option<ZodiacSign> {
        self.body(CelestialBody::Sun).map(|position| position.sign)
    }

    pub fn moon_sign(&self) -> Option<ZodiacSign> {
        self.body(CelestialBody::Moon).map(|position| position.sign)
    }

    pub fn rising_sign(&self) -> ZodiacSign {
        self.ascendant.sign
    }
}

/// Cosmetic output: the score and aspect list are not derived from the charts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub percentage: u8,
    pub sun_sign_match: bool,
    pub moon_sign_match: bool,
    pub aspects: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChartGenerator {
    mode: ChartMode,
}

impl ChartGenerator {
    pub fn new(mode: ChartMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ChartMode {
        self.mode
    }

    /// Draws from `rng` in `Mock` mode and from a birth-keyed generator in
    /// `BirthSeeded` mode.
    pub fn generate<R: Rng + ?Sized>(&self, birth: &BirthParameters, rng: &mut R) -> NatalChart {
        match self.mode {
            ChartMode::Mock => self.generate_with(birth, rng),
            ChartMode::BirthSeeded => {
                let mut seeded = ChaCha8Rng::seed_from_u64(birth.digest());
                self.generate_with(birth, &mut seeded)
            }
        }
    }

    /// Always draws from `rng`; birth data is accepted but unused.
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        _birth: &BirthParameters,
        rng: &mut R,
    ) -> NatalChart {
        let bodies = CelestialBody::ALL
            .iter()
            .map(|body| BodyPosition {
                body: *body,
                ecliptic_degree: rng.gen_range(0.0..360.0),
                sign: ZodiacSign::random(rng),
                house: rng.gen_range(1..=12),
                retrograde: rng.gen_bool(body.retrograde_probability()),
            })
            .collect();

        let houses = (0..12u8)
            .map(|index| HouseCusp {
                number: index + 1,
                horizon_degree: f64::from(index) * 30.0 + rng.gen_range(0.0..30.0),
            })
            .collect();

        let aspects = FIXED_ASPECTS
            .iter()
            .map(|(first, second, kind)| Aspect {
                first: *first,
                second: *second,
                kind: *kind,
                orb: rng.gen_range(0.0..10.0),
            })
            .collect();

        let ascendant = ChartPoint {
            horizon_degree: rng.gen_range(0.0..360.0),
            sign: ZodiacSign::random(rng),
        };
        let midheaven = ChartPoint {
            horizon_degree: rng.gen_range(0.0..360.0),
            sign: ZodiacSign::random(rng),
        };

        NatalChart {
            mode: self.mode,
            bodies,
            houses,
            aspects,
            ascendant,
            midheaven,
        }
    }

    /// Same generator, fed the wall-clock moment at latitude/longitude 0.
    pub fn current_transits<Tz: TimeZone, R: Rng + ?Sized>(
        &self,
        now: &DateTime<Tz>,
        rng: &mut R,
    ) -> NatalChart {
        self.generate(&BirthParameters::from_datetime(now, 0.0, 0.0), rng)
    }

    pub fn compatibility<R: Rng + ?Sized>(
        &self,
        first: &BirthParameters,
        second: &BirthParameters,
        rng: &mut R,
    ) -> CompatibilityReport {
        let chart_a = self.generate(first, rng);
        let chart_b = self.generate(second, rng);

        CompatibilityReport {
            percentage: rng.gen_range(60..100),
            sun_sign_match: chart_a.sun_sign() == chart_b.sun_sign(),
            moon_sign_match: chart_a.moon_sign() == chart_b.moon_sign(),
            aspects: COMPATIBILITY_ASPECTS
                .iter()
                .map(|aspect| aspect.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn birth(year: i32, latitude: f64) -> BirthParameters {
        BirthParameters {
            year,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            latitude,
            longitude: 0.0,
        }
    }

    fn assert_shape(chart: &NatalChart) {
        assert_eq!(chart.bodies.len(), 10);
        assert_eq!(chart.houses.len(), 12);
        assert_eq!(chart.aspects.len(), 4);
        for position in &chart.bodies {
            assert!((1..=12).contains(&position.house));
            assert!((0.0..360.0).contains(&position.ecliptic_degree));
        }
        for (index, cusp) in chart.houses.iter().enumerate() {
            let start = index as f64 * 30.0;
            assert!(cusp.horizon_degree >= start && cusp.horizon_degree < start + 30.0);
        }
        for aspect in &chart.aspects {
            assert!((0.0..10.0).contains(&aspect.orb));
        }
        assert!((0.0..360.0).contains(&chart.ascendant.horizon_degree));
        assert!((0.0..360.0).contains(&chart.midheaven.horizon_degree));
    }

    #[test]
    fn shape_holds_for_ordinary_and_degenerate_input() {
        let generator = ChartGenerator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for params in [birth(1990, 0.0), birth(0, 999.0), birth(-4000, f64::NAN)] {
            assert_shape(&generator.generate(&params, &mut rng));
        }
    }

    #[test]
    fn bodies_follow_fixed_order_and_aspects_fixed_pairs() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let chart = ChartGenerator::default().generate(&birth(1990, 0.0), &mut rng);
        let order = chart.bodies.iter().map(|position| position.body).collect::<Vec<_>>();
        assert_eq!(order, CelestialBody::ALL.to_vec());
        assert_eq!(chart.aspects[0].first, CelestialBody::Sun);
        assert_eq!(chart.aspects[3].kind, AspectKind::Square);
    }

    #[test]
    fn luminaries_and_venus_never_retrograde() {
        let generator = ChartGenerator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..200 {
            let chart = generator.generate(&birth(1990, 0.0), &mut rng);
            for body in [CelestialBody::Sun, CelestialBody::Moon, CelestialBody::Venus] {
                assert!(!chart.body(body).map(|p| p.retrograde).unwrap_or(true));
            }
        }
    }

    #[test]
    fn mock_mode_ignores_birth_data() {
        let generator = ChartGenerator::new(ChartMode::Mock);
        let first = generator.generate(&birth(1990, 0.0), &mut ChaCha8Rng::seed_from_u64(9));
        let second = generator.generate(&birth(1990, 0.0), &mut ChaCha8Rng::seed_from_u64(10));
        assert_ne!(first, second);
    }

    #[test]
    fn birth_seeded_mode_is_reproducible() {
        let generator = ChartGenerator::new(ChartMode::BirthSeeded);
        let first = generator.generate(&birth(1990, 12.5), &mut ChaCha8Rng::seed_from_u64(1));
        let second = generator.generate(&birth(1990, 12.5), &mut ChaCha8Rng::seed_from_u64(2));
        let other = generator.generate(&birth(1991, 12.5), &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.mode, ChartMode::BirthSeeded);
    }

    #[test]
    fn transits_have_full_shape() {
        let chart = ChartGenerator::default()
            .current_transits(&Utc::now(), &mut ChaCha8Rng::seed_from_u64(4));
        assert_shape(&chart);
    }

    #[test]
    fn compatibility_is_cosmetic() {
        let generator = ChartGenerator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for _ in 0..100 {
            let report = generator.compatibility(&birth(1990, 0.0), &birth(1965, 40.7), &mut rng);
            assert!((60..100).contains(&report.percentage));
            assert_eq!(report.aspects.len(), COMPATIBILITY_ASPECTS.len());
        }
    }

    #[test]
    fn parses_modes() {
        assert_eq!("birth-seeded".parse::<ChartMode>(), Ok(ChartMode::BirthSeeded));
        assert_eq!("MOCK".parse::<ChartMode>(), Ok(ChartMode::Mock));
        assert!("ephemeris".parse::<ChartMode>().is_err());
    }
}
