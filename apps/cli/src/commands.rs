//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use kaprogress_browser::{Credentials, Session, SessionSettings};
use kaprogress_core::{ProgressReporter, RunSummary, track_courses};
use kaprogress_shared::{
    AppConfig, CourseReport, CredentialsConfig, TraversalConfig, VisitFailure, init_config,
    load_config, load_config_from,
};
use tracing::{error, info};

use crate::render::{OutputFormat, render, summary_line};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ka-progress: per-unit Khan Academy progress reports.
#[derive(Parser)]
#[command(
    name = "ka-progress",
    version,
    about = "Report a learner's Khan Academy progress for every unit of a course.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.kaprogress/kaprogress.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Log in and report progress for each course.
    Track {
        /// Course slug, e.g. /math/cc-sixth-grade-math (repeatable).
        /// Defaults to the configured course list.
        #[arg(short = 's', long = "slug")]
        slugs: Vec<String>,

        /// Run the browser without a window.
        #[arg(long, overrides_with = "no_headless")]
        headless: bool,

        /// Show the browser window.
        #[arg(long, overrides_with = "headless")]
        no_headless: bool,

        /// Report output format.
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "kaprogress=info",
        1 => "kaprogress=debug",
        _ => "kaprogress=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Track {
            slugs,
            headless,
            no_headless,
            format,
        } => {
            let headless = match (headless, no_headless) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            cmd_track(config_path.as_deref(), slugs, headless, format).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// track
// ---------------------------------------------------------------------------

async fn cmd_track(
    config_path: Option<&Path>,
    slugs: Vec<String>,
    headless: Option<bool>,
    format: OutputFormat,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if !slugs.is_empty() {
        config.defaults.courses = slugs;
    }

    // Credentials come first so a missing login never launches a browser.
    let credentials = resolve_credentials(&config.credentials)?;
    let settings = SessionSettings::from_config(&config, headless)?;
    let traversal = TraversalConfig::from(&config);

    info!(
        courses = traversal.courses.len(),
        headless = settings.headless,
        "starting progress run"
    );

    let reporter = CliProgress::new(format);
    reporter.phase("Launching browser");
    let session = Session::launch(settings)
        .await
        .wrap_err("failed to start browser session")?;

    reporter.phase("Logging in");
    if let Err(e) = session.login(&credentials).await {
        reporter.clear();
        if let Err(close) = session.close().await {
            error!(error = %close, "failed to close browser session");
        }
        return Err(e).wrap_err("login failed");
    }

    let summary = track_courses(session.page(), &traversal, &reporter).await;

    if let Err(e) = session.close().await {
        error!(error = %e, "failed to close browser session");
    }

    println!("{}", summary_line(&summary));
    for (slug, reason) in &summary.failed {
        println!("  {slug}: {reason}");
    }

    Ok(())
}

/// Env vars first, then an interactive prompt for whatever is missing.
fn resolve_credentials(config: &CredentialsConfig) -> Result<Credentials> {
    let (identifier, password) = Credentials::from_env(config);

    let identifier = match identifier {
        Some(v) => v,
        None => Input::<String>::new()
            .with_prompt("Khan Academy email or username")
            .allow_empty(true)
            .interact_text()
            .wrap_err("failed to read identifier")?,
    };
    let password = match password {
        Some(v) => v,
        None => Password::new()
            .with_prompt("Password")
            .allow_empty_password(true)
            .interact()
            .wrap_err("failed to read password")?,
    };

    Ok(Credentials::new(identifier, password)?)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner; prints each course
/// report as soon as it is ready.
struct CliProgress {
    spinner: ProgressBar,
    format: OutputFormat,
}

impl CliProgress {
    fn new(format: OutputFormat) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner, format }
    }

    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn course_started(&self, slug: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Course [{current}/{total}] {slug}"));
    }

    fn unit_started(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Unit [{current}/{total}] {url}"));
    }

    fn unit_skipped(&self, url: &str, failure: &VisitFailure) {
        self.spinner
            .set_message(format!("Skipped {url}: {failure}"));
    }

    fn course_finished(&self, report: &CourseReport) {
        match render(report, self.format) {
            Ok(text) => self.spinner.suspend(|| println!("{text}")),
            Err(e) => error!(course = %report.title, error = %e, "failed to render report"),
        }
    }

    fn course_failed(&self, slug: &str, reason: &str) {
        self.spinner
            .set_message(format!("Failed {slug}: {reason}"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_flags_parse() {
        let cli = Cli::parse_from([
            "ka-progress",
            "-v",
            "track",
            "-s",
            "/math/geometry",
            "--slug",
            "/math/algebra",
            "--no-headless",
            "--format",
            "json",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Track {
                slugs,
                headless,
                no_headless,
                format,
            } => {
                assert_eq!(slugs, ["/math/geometry", "/math/algebra"]);
                assert!(!headless);
                assert!(no_headless);
                assert!(matches!(format, OutputFormat::Json));
            }
            Command::Config { .. } => panic!("expected track"),
        }
    }

    #[test]
    fn track_defaults() {
        let cli = Cli::parse_from(["ka-progress", "track"]);
        match cli.command {
            Command::Track {
                slugs,
                headless,
                no_headless,
                format,
            } => {
                assert!(slugs.is_empty());
                assert!(!headless && !no_headless);
                assert!(matches!(format, OutputFormat::Table));
            }
            Command::Config { .. } => panic!("expected track"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["ka-progress", "config", "show", "--config", "/tmp/ka.toml"]);
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/ka.toml")));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
