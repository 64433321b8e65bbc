pub mod chart;
pub mod error;
pub mod geo;
pub mod horoscope;
pub mod intent;
pub mod models;
pub mod render;
pub mod responses;
pub mod session;
pub mod usage;

pub use chart::{
    Aspect, AspectKind, BodyPosition, CelestialBody, ChartGenerator, ChartMode, ChartPoint,
    CompatibilityReport, HouseCusp, NatalChart, ZodiacSign,
};
pub use error::{LyraError, LyraResult};
pub use geo::{resolve_location, GeoPoint};
pub use horoscope::{default_transits, energy_meters, typing_delay, EnergyMeter, HoroscopePeriod};
pub use intent::{classify_intent, normalize_text, IntentClassifier, RegexIntentClassifier};
pub use models::*;
pub use render::{render_chart_svg, ChartRenderer, ChartTheme, DEFAULT_CHART_SIZE};
pub use responses::{
    limit_reached_message, welcome_message, ResponseContext, TemplateLibrary,
};
pub use session::SessionContext;
pub use usage::{UsageCounters, UsageDecision, UsagePolicy};
