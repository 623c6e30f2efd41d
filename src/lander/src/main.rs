//! Lander — command-line host for the exit orchestration engine.
//!
//! Loads an advertiser configuration, boots the engine on an in-memory page
//! and reports what an exit would do.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, Offset};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use url::Url;

use lander_core::event_bus::capture_sink;
use lander_core::{EngineSettings, TrackingEvent};
use lander_engine::memory::HistoryEntry;
use lander_engine::runner::ResolvedTab;
use lander_engine::{ExitEngine, MemoryEnvironment, PageMetadata};

#[derive(Parser, Debug)]
#[command(name = "lander")]
#[command(about = "Exit orchestration for advertising landing pages")]
#[command(version)]
struct Cli {
    /// Flat advertiser configuration (JSON object)
    #[arg(long, env = "LANDER__CONFIG")]
    config: PathBuf,

    /// Landing page URL, including its incoming query string
    #[arg(long, env = "LANDER__PAGE_URL")]
    page_url: Url,

    /// IANA timezone reported to the tracking endpoint
    #[arg(long, env = "TZ", default_value = "UTC")]
    timezone: String,

    /// Document title packed into the `cmeta` tracking field
    #[arg(long, default_value = "")]
    title: String,

    /// Referrer packed into the `cmeta` tracking field
    #[arg(long, default_value = "")]
    referrer: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the normalized exit table
    Table,
    /// Print the URLs a named exit resolves to
    Resolve { exit: String },
    /// Run a named exit on an in-memory page and print the outcome
    Simulate {
        exit: String,
        /// Skip arming the back-trap
        #[arg(long, default_value_t = false)]
        no_back: bool,
        /// Back-button presses to replay after the exit ran
        #[arg(long, default_value_t = 0)]
        back_presses: u32,
    },
}

#[derive(Serialize)]
struct ResolveReport<'a> {
    exit: &'a str,
    current_tab: Option<String>,
    new_tab: Option<String>,
}

#[derive(Serialize)]
struct SimulationReport<'a> {
    exit: &'a str,
    ran: bool,
    tracking: Vec<TrackingEvent>,
    opened_tabs: &'a [String],
    navigations: &'a [String],
    reloads: &'a [String],
    history: &'a [HistoryEntry],
    cursor: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lander=info,lander_engine=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = EngineSettings::load_or_default();

    let raw = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    let config: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", cli.config.display()))?;

    // JavaScript sign convention: minutes to add to local time to reach UTC.
    let offset_minutes = -Local::now().offset().fix().local_minus_utc() / 60;
    let env = MemoryEnvironment::new(cli.page_url.clone())
        .with_timezone(&cli.timezone, offset_minutes)
        .with_metadata(PageMetadata {
            title: cli.title.clone(),
            referrer: cli.referrer.clone(),
        });

    let sink = capture_sink();
    let mut engine = ExitEngine::boot(env, &config, settings.clone())?
        .with_tracking_sink(sink.clone());

    info!(
        page_url = %cli.page_url,
        exits = engine.table().exits.len(),
        "configuration loaded"
    );

    let output = match &cli.command {
        Command::Table => serde_json::to_string_pretty(engine.table())?,
        Command::Resolve { exit } => {
            let plan = engine.plan(exit);
            let url_of = |tab: Option<&ResolvedTab>| tab.map(|t| t.url.clone());
            let report = ResolveReport {
                exit,
                current_tab: url_of(plan.as_ref().and_then(|p| p.current_tab.as_ref())),
                new_tab: url_of(plan.as_ref().and_then(|p| p.new_tab.as_ref())),
            };
            serde_json::to_string_pretty(&report)?
        }
        Command::Simulate {
            exit,
            no_back,
            back_presses,
        } => {
            let ran = engine.run_exit(exit, !no_back);
            engine.advance(Duration::from_millis(settings.navigation_delay_ms));
            for _ in 0..*back_presses {
                if !engine.back() {
                    break;
                }
            }
            let env = engine.env();
            let report = SimulationReport {
                exit,
                ran,
                tracking: sink.events(),
                opened_tabs: env.opened_tabs(),
                navigations: env.navigations(),
                reloads: env.reloads(),
                history: env.history(),
                cursor: env.cursor(),
            };
            serde_json::to_string_pretty(&report)?
        }
    };

    println!("{output}");
    Ok(())
}
