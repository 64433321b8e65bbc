use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lyra_agents::{AgentSettings, LyraAgent, OnboardingInput, StartSession};
use lyra_core::{BirthParameters, BirthProfile, ChartMode, ChatInput, Persona};
use lyra_observability::{init_tracing, AppMetrics};
use lyra_storage::MemoryStore;

#[derive(Debug, Parser)]
#[command(name = "lyra")]
#[command(about = "Lyra astrology companion CLI")]
struct Cli {
    /// Seed for every random draw; omit for a fresh sky each run.
    #[arg(long, env = "LYRA_RNG_SEED", global = true)]
    seed: Option<u64>,

    /// `mock` or `birth-seeded`.
    #[arg(long, env = "LYRA_CHART_MODE", global = true)]
    mode: Option<String>,

    #[arg(long, env = "LYRA_TEMPLATES_PATH", global = true)]
    templates: Option<PathBuf>,

    #[arg(long, env = "LYRA_INTENT_RULES_PATH", global = true)]
    intent_rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat {
        #[arg(long, default_value = "astrologer")]
        persona: String,
        #[arg(long)]
        name: Option<String>,
        /// Print replies immediately instead of simulating typing.
        #[arg(long)]
        no_delay: bool,
    },
    Chart {
        #[command(flatten)]
        birth: BirthArgs,
        #[arg(long, default_value_t = 400)]
        size: u32,
        /// Write SVG to this file instead of printing chart JSON.
        #[arg(long)]
        svg: Option<PathBuf>,
    },
    Transits,
    Compatibility {
        /// First person as `YYYY-MM-DD[THH:MM]`.
        first: String,
        /// Second person as `YYYY-MM-DD[THH:MM]`.
        second: String,
    },
    Classify {
        text: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct BirthArgs {
    #[arg(long)]
    date: String,
    #[arg(long, default_value = "12:00")]
    time: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long, allow_hyphen_values = true)]
    latitude: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    longitude: Option<f64>,
}

impl BirthArgs {
    fn to_parameters(&self) -> Result<BirthParameters> {
        let profile = OnboardingInput {
            user_name: None,
            persona: None,
            date: self.date.clone(),
            time: self.time.clone(),
            location: self.location.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
        .to_profile();
        Ok(profile.to_parameters()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("lyra_cli");
    let cli = Cli::parse();

    let agent = build_agent(&cli)?;

    match cli.command {
        Command::Chat {
            persona,
            name,
            no_delay,
        } => run_chat(agent, &persona, name, no_delay).await?,
        Command::Chart { birth, size, svg } => {
            let view = agent.chart(&birth.to_parameters()?, size, size);
            match svg {
                Some(path) => {
                    std::fs::write(&path, &view.svg)
                        .with_context(|| format!("failed writing {}", path.display()))?;
                    println!(
                        "sun {} / moon {} / rising {} -> {}",
                        view.big_three.sun.unwrap_or("?"),
                        view.big_three.moon.unwrap_or("?"),
                        view.big_three.rising,
                        path.display()
                    );
                }
                None => println!("{}", serde_json::to_string_pretty(&view.chart)?),
            }
        }
        Command::Transits => {
            let view = agent.current_transits();
            for transit in &view.transits {
                println!("- {transit}");
            }
            println!("{}", serde_json::to_string_pretty(&view.chart)?);
        }
        Command::Compatibility { first, second } => {
            let first = parse_moment(&first).context("invalid first birth moment")?;
            let second = parse_moment(&second).context("invalid second birth moment")?;
            let report = agent.compatibility(&first, &second);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Classify { text } => {
            let text = text.join(" ");
            println!("{}", agent.classify(&text));
        }
    }

    Ok(())
}

async fn run_chat(
    agent: LyraAgent<MemoryStore>,
    persona: &str,
    name: Option<String>,
    no_delay: bool,
) -> Result<()> {
    let persona = Persona::from_optional_str(Some(persona));
    let session = agent
        .start_session(StartSession {
            user_name: name,
            persona: Some(persona.label().to_string()),
            is_guest: true,
        })
        .await?;

    println!("{} {} ({})", persona.badge(), persona, persona.tagline());
    println!("{}", session.welcome_message);
    println!("type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let reply = agent
            .handle_chat(ChatInput {
                session_id: Some(session.session_id.clone()),
                text: message.to_string(),
                persona: None,
                user_name: None,
            })
            .await?;

        if !no_delay && reply.typing_delay_ms > 0 {
            print!("{} is typing...", reply.persona);
            io::stdout().flush()?;
            tokio::time::sleep(Duration::from_millis(reply.typing_delay_ms)).await;
            println!();
        }

        println!("\n{}\n", reply.reply_text);
    }

    agent.end_session(&session.session_id).await?;
    Ok(())
}

/// `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM`, at the default coordinates.
fn parse_moment(raw: &str) -> Result<BirthParameters> {
    let (date, time) = raw.split_once('T').unwrap_or((raw, "12:00"));
    let point = lyra_core::GeoPoint::default();
    let profile = BirthProfile {
        date: date.to_string(),
        time: time.to_string(),
        location: String::new(),
        latitude: point.latitude,
        longitude: point.longitude,
    };
    Ok(profile.to_parameters()?)
}

fn build_agent(cli: &Cli) -> Result<LyraAgent<MemoryStore>> {
    let mut settings = AgentSettings::from_env()?;
    if let Some(mode) = cli.mode.as_deref() {
        settings.chart_mode = mode
            .parse::<ChartMode>()
            .map_err(anyhow::Error::msg)
            .context("invalid --mode value")?;
    }
    if cli.seed.is_some() {
        settings.rng_seed = cli.seed;
    }
    if let Some(path) = cli.templates.clone() {
        settings.templates_path = Some(path);
    }
    if let Some(path) = cli.intent_rules.clone() {
        settings.intent_rules_path = Some(path);
    }

    LyraAgent::new(Arc::new(MemoryStore::new()), AppMetrics::shared(), &settings)
}
