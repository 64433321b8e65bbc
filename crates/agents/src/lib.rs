mod settings;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use lyra_core::{
    default_transits, energy_meters, limit_reached_message, normalize_text, resolve_location,
    typing_delay, welcome_message, BirthParameters, BirthProfile, ChartGenerator, ChartRenderer,
    ChatInput, ChatMessage, ChatReply, CompatibilityReport, EnergyMeter, HoroscopePeriod, Intent,
    IntentClassifier, NatalChart, Persona, RegexIntentClassifier, SessionContext, TemplateLibrary,
    UsageCounters, UsageDecision, UsageKind, UsagePolicy,
};
use lyra_observability::AppMetrics;
use lyra_storage::SessionRepository;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub use settings::AgentSettings;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("session '{0}' not found or expired")]
    SessionNotFound(String),

    #[error("message text is empty")]
    EmptyMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartSession {
    pub user_name: Option<String>,
    pub persona: Option<String>,
    #[serde(default)]
    pub is_guest: bool,
}

/// Onboarding answers. Coordinates are optional; a missing pair is
/// resolved from the location label.
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingInput {
    pub user_name: Option<String>,
    pub persona: Option<String>,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl OnboardingInput {
    pub fn to_profile(&self) -> BirthProfile {
        let (latitude, longitude) = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => (latitude, longitude),
            _ => {
                let point = resolve_location(&self.location);
                (point.latitude, point.longitude)
            }
        };

        BirthProfile {
            date: self.date.clone(),
            time: self.time.clone(),
            location: self.location.trim().to_string(),
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_name: Option<String>,
    pub persona: Persona,
    pub persona_tagline: &'static str,
    pub is_guest: bool,
    pub birth: Option<BirthProfile>,
    pub big_three: Option<BigThree>,
    pub usage: UsageCounters,
    pub history: Vec<ChatMessage>,
    pub expires_at: DateTime<Utc>,
    pub welcome_message: String,
}

impl SessionSnapshot {
    fn from_session(session: &SessionContext) -> Self {
        Self {
            session_id: session.session_id.clone(),
            user_name: session.user_name.clone(),
            persona: session.persona,
            persona_tagline: session.persona.tagline(),
            is_guest: session.is_guest,
            birth: session.birth.clone(),
            big_three: session.chart.as_ref().map(BigThree::from_chart),
            usage: session.usage,
            history: session.history.clone(),
            expires_at: session.expires_at,
            welcome_message: welcome_message(session.persona),
        }
    }
}

/// Sun, Moon and Rising sign labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BigThree {
    pub sun: Option<&'static str>,
    pub moon: Option<&'static str>,
    pub rising: &'static str,
}

impl BigThree {
    pub fn from_chart(chart: &NatalChart) -> Self {
        Self {
            sun: chart.sun_sign().map(|sign| sign.label()),
            moon: chart.moon_sign().map(|sign| sign.label()),
            rising: chart.rising_sign().label(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HoroscopeView {
    pub period: HoroscopePeriod,
    pub text: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub session_id: String,
    pub persona: Persona,
    pub user_name: Option<String>,
    pub big_three: Option<BigThree>,
    pub chart: Option<NatalChart>,
    pub chart_svg: Option<String>,
    pub horoscope: HoroscopeView,
    pub energy: Vec<EnergyMeter>,
    pub transits: Vec<String>,
    pub chat_usage: UsageDecision,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub chart: NatalChart,
    pub big_three: BigThree,
    pub svg: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitsView {
    pub generated_at: DateTime<Utc>,
    pub chart: NatalChart,
    pub transits: Vec<String>,
}

pub struct LyraAgent<S>
where
    S: SessionRepository,
{
    store: Arc<S>,
    classifier: Arc<dyn IntentClassifier>,
    templates: Arc<TemplateLibrary>,
    generator: ChartGenerator,
    renderer: ChartRenderer,
    usage_policy: UsagePolicy,
    session_ttl: Duration,
    rng: Mutex<ChaCha8Rng>,
    metrics: Arc<AppMetrics>,
}

impl<S> LyraAgent<S>
where
    S: SessionRepository,
{
    pub fn new(store: Arc<S>, metrics: Arc<AppMetrics>, settings: &AgentSettings) -> Result<Self> {
        let classifier: Arc<dyn IntentClassifier> = match settings.intent_rules_path.as_deref() {
            Some(path) => Arc::new(
                RegexIntentClassifier::from_json(&read_definition(path)?)
                    .with_context(|| format!("invalid intent rules in {}", path.display()))?,
            ),
            None => Arc::new(RegexIntentClassifier::builtin()),
        };

        let templates = match settings.templates_path.as_deref() {
            Some(path) => TemplateLibrary::builtin().merge(
                TemplateLibrary::from_json(&read_definition(path)?)
                    .with_context(|| format!("invalid templates in {}", path.display()))?,
            ),
            None => TemplateLibrary::builtin(),
        };

        let rng = match settings.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            store,
            classifier,
            templates: Arc::new(templates),
            generator: ChartGenerator::new(settings.chart_mode),
            renderer: ChartRenderer::default(),
            usage_policy: settings.usage_policy,
            session_ttl: settings.session_ttl,
            rng: Mutex::new(rng),
            metrics,
        })
    }

    pub fn metrics(&self) -> &AppMetrics {
        &self.metrics
    }

    #[instrument(skip(self, request))]
    pub async fn start_session(&self, request: StartSession) -> Result<SessionSnapshot> {
        let now = Utc::now();
        let persona = Persona::from_optional_str(request.persona.as_deref());
        let session = self.new_session(request.user_name, persona, request.is_guest, now);
        self.insert_session(&session, now).await?;

        info!(
            session_id = %session.session_id,
            persona = %session.persona,
            guest = session.is_guest,
            "session started"
        );
        Ok(SessionSnapshot::from_session(&session))
    }

    pub async fn session(&self, session_id: &str) -> Result<SessionSnapshot> {
        let session = self.load_active(session_id, Utc::now()).await?;
        Ok(SessionSnapshot::from_session(&session))
    }

    /// Drops the session. Returns `false` when it was already gone.
    pub async fn end_session(&self, session_id: &str) -> Result<bool> {
        let removed = self.store.delete_session(session_id).await?;
        info!(session_id, removed, "session ended");
        Ok(removed)
    }

    /// Stores the birth profile and a chart computed from it. The chart is
    /// reused for the rest of the session.
    #[instrument(skip(self, input))]
    pub async fn onboard(
        &self,
        session_id: &str,
        input: OnboardingInput,
    ) -> Result<SessionSnapshot> {
        let now = Utc::now();
        let profile = input.to_profile();
        let birth = profile.to_parameters()?;
        let user_name = input
            .user_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let persona = input
            .persona
            .as_deref()
            .map(|label| Persona::from_optional_str(Some(label)));

        let snapshot = self
            .update_active(session_id, now, |session| {
                if let Some(name) = user_name {
                    session.user_name = Some(name.to_string());
                }
                if let Some(persona) = persona {
                    session.set_persona(persona);
                }
                session.set_birth(profile, self.generate_chart(&birth));
                session.touch(now, self.session_ttl);
                SessionSnapshot::from_session(session)
            })
            .await?;

        info!(session_id = %snapshot.session_id, "onboarding completed");
        Ok(snapshot)
    }

    pub async fn set_persona(&self, session_id: &str, persona: Persona) -> Result<SessionSnapshot> {
        let now = Utc::now();
        self.update_active(session_id, now, |session| {
            session.set_persona(persona);
            session.touch(now, self.session_ttl);
            SessionSnapshot::from_session(session)
        })
        .await
    }

    /// Only turns that reach a session are counted, so the latency average
    /// covers exactly the counted requests.
    #[instrument(skip(self, input))]
    pub async fn handle_chat(&self, input: ChatInput) -> Result<ChatReply> {
        let started = Instant::now();

        let text = normalize_text(&input.text);
        if text.is_empty() {
            return Err(AgentError::EmptyMessage.into());
        }

        let now = Utc::now();
        let requested_persona = input.persona.as_deref().and_then(Persona::parse);
        let reply = match input.session_id.as_deref() {
            Some(session_id) => {
                self.update_active(session_id, now, |session| {
                    self.take_turn(session, &text, requested_persona, now)
                })
                .await?
            }
            None => {
                let mut session = self.new_session(
                    input.user_name.clone(),
                    requested_persona.unwrap_or_default(),
                    true,
                    now,
                );
                let reply = self.take_turn(&mut session, &text, requested_persona, now);
                self.insert_session(&session, now).await?;
                reply
            }
        };

        self.metrics.inc_chat_request();
        self.metrics.observe_chat_latency(started.elapsed());
        info!(
            session_id = %reply.session_id,
            persona = %reply.persona,
            intent = %reply.intent,
            limited = reply.limited,
            "chat handled"
        );

        Ok(reply)
    }

    pub async fn dashboard(
        &self,
        session_id: &str,
        period: HoroscopePeriod,
        width: u32,
        height: u32,
    ) -> Result<Dashboard> {
        let now = Utc::now();
        let session = self.load_active(session_id, now).await?;

        let chart_svg = session.chart.as_ref().map(|chart| {
            self.metrics.inc_chart_rendered();
            self.renderer.render(chart, width, height)
        });
        let energy = energy_meters(&mut *self.rng.lock());
        let chat_usage = self.usage_policy.check(
            UsageKind::Chat,
            &session.usage,
            session.is_guest,
            now.date_naive(),
        );

        Ok(Dashboard {
            session_id: session.session_id,
            persona: session.persona,
            user_name: session.user_name,
            big_three: session.chart.as_ref().map(BigThree::from_chart),
            chart: session.chart,
            chart_svg,
            horoscope: HoroscopeView {
                period,
                text: period.text(),
            },
            energy,
            transits: default_transits(),
            chat_usage,
        })
    }

    /// SVG for the session's stored chart, or for the current sky when the
    /// session has not been onboarded.
    pub async fn session_chart_svg(
        &self,
        session_id: &str,
        width: u32,
        height: u32,
    ) -> Result<String> {
        let session = self.load_active(session_id, Utc::now()).await?;
        let chart = match session.chart {
            Some(chart) => chart,
            None => self.current_transits().chart,
        };
        self.metrics.inc_chart_rendered();
        Ok(self.renderer.render(&chart, width, height))
    }

    pub fn chart(&self, birth: &BirthParameters, width: u32, height: u32) -> ChartView {
        let chart = self.generate_chart(birth);
        self.metrics.inc_chart_rendered();
        let svg = self.renderer.render(&chart, width, height);
        ChartView {
            big_three: BigThree::from_chart(&chart),
            chart,
            svg,
        }
    }

    pub fn render_svg(&self, chart: &NatalChart, width: u32, height: u32) -> String {
        self.metrics.inc_chart_rendered();
        self.renderer.render(chart, width, height)
    }

    pub fn current_transits(&self) -> TransitsView {
        let now = Utc::now();
        let chart = self
            .generator
            .current_transits(&now, &mut *self.rng.lock());
        self.metrics.inc_chart_generated();
        TransitsView {
            generated_at: now,
            chart,
            transits: default_transits(),
        }
    }

    pub fn compatibility(
        &self,
        first: &BirthParameters,
        second: &BirthParameters,
    ) -> CompatibilityReport {
        let report = self
            .generator
            .compatibility(first, second, &mut *self.rng.lock());
        debug!(percentage = report.percentage, "compatibility computed");
        report
    }

    pub fn classify(&self, text: &str) -> Intent {
        self.classifier.classify(&normalize_text(text))
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.store.purge_expired(Utc::now()).await
    }

    /// Gates, answers and records one message against `session`. Runs while
    /// the store holds the session, so the usage check and increment cannot
    /// interleave with another turn.
    fn take_turn(
        &self,
        session: &mut SessionContext,
        text: &str,
        requested_persona: Option<Persona>,
        now: DateTime<Utc>,
    ) -> ChatReply {
        let today = now.date_naive();
        if let Some(persona) = requested_persona {
            session.set_persona(persona);
        }

        let gate = self
            .usage_policy
            .check(UsageKind::Chat, &session.usage, session.is_guest, today);

        let (intent, reply_text, typing_delay_ms) = if gate.allowed {
            let intent = self.classifier.classify(text);
            let context = session.response_context(&default_transits());
            let mut rng = self.rng.lock();
            let reply = self
                .templates
                .select_response(session.persona, intent, &context, &mut *rng);
            let delay = typing_delay(&mut *rng).as_millis() as u64;
            (intent, reply, delay)
        } else {
            self.metrics.inc_limit_block();
            (Intent::Fallback, limit_reached_message().to_string(), 0)
        };

        if gate.allowed {
            session.record_usage(UsageKind::Chat, now);
            if intent == Intent::Fallback {
                self.metrics.inc_fallback_intent();
            }
        }
        session.record_exchange(text, &reply_text, intent, now);
        session.touch(now, self.session_ttl);

        let usage = self
            .usage_policy
            .check(UsageKind::Chat, &session.usage, session.is_guest, today);

        ChatReply {
            session_id: session.session_id.clone(),
            reply_text,
            intent,
            persona: session.persona,
            limited: !gate.allowed,
            usage,
            typing_delay_ms,
        }
    }

    fn generate_chart(&self, birth: &BirthParameters) -> NatalChart {
        let chart = self.generator.generate(birth, &mut *self.rng.lock());
        self.metrics.inc_chart_generated();
        chart
    }

    fn new_session(
        &self,
        user_name: Option<String>,
        persona: Persona,
        is_guest: bool,
        now: DateTime<Utc>,
    ) -> SessionContext {
        SessionContext::new(
            Uuid::new_v4().to_string(),
            user_name,
            persona,
            is_guest,
            now,
            self.session_ttl,
        )
    }

    /// Every new session first clears out the expired ones, so guest
    /// sessions from one-off chats do not pile up.
    async fn insert_session(&self, session: &SessionContext, now: DateTime<Utc>) -> Result<()> {
        let purged = self.store.purge_expired(now).await?;
        if purged > 0 {
            debug!(purged, "expired sessions removed");
        }
        self.store.upsert_session(session).await
    }

    async fn update_active<F, T>(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        apply: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut SessionContext) -> T + Send,
        T: Send,
    {
        let applied = self
            .store
            .update_session(session_id, |session| {
                (!session.is_expired(now)).then(|| apply(session))
            })
            .await?;

        match applied.flatten() {
            Some(value) => Ok(value),
            None => Err(AgentError::SessionNotFound(session_id.to_string()).into()),
        }
    }

    async fn load_active(&self, session_id: &str, now: DateTime<Utc>) -> Result<SessionContext> {
        match self.store.load_session(session_id).await? {
            Some(session) if !session.is_expired(now) => Ok(session),
            _ => Err(AgentError::SessionNotFound(session_id.to_string()).into()),
        }
    }
}

fn read_definition(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))
}
