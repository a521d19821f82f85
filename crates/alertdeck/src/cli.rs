//! Clap derive structures for the `alertdeck` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so nothing here
//! may reach outside clap, clap_complete and humantime.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// alertdeck -- live alert dashboard for the terminal
#[derive(Debug, Parser)]
#[command(
    name = "alertdeck",
    version,
    about = "Watch and query real-time alerts from the command line",
    long_about = "A terminal dashboard for an alert service.\n\n\
        Alerts arrive over a push stream and are reconciled with periodic\n\
        snapshots, so nothing missed during a reconnect stays missing.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Service profile to use
    #[arg(long, short = 'p', env = "ALERTDECK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Service base URL (overrides profile)
    #[arg(long, short = 'u', env = "ALERTDECK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Push stream URL (derived from the base URL when unset)
    #[arg(long, env = "ALERTDECK_STREAM_URL", global = true)]
    pub stream_url: Option<String>,

    /// Account email for password login
    #[arg(long, short = 'e', env = "ALERTDECK_EMAIL", global = true)]
    pub email: Option<String>,

    /// Pre-issued bearer token (skips password login)
    #[arg(long, env = "ALERTDECK_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ALERTDECK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ALERTDECK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "ALERTDECK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one alert id per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one page of alerts
    #[command(alias = "ls")]
    Alerts(AlertsArgs),

    /// Live dashboard: stream alerts and keep the view reconciled
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Submit detection events
    Events(EventsArgs),

    /// Verify credentials against the service
    Login,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Alerts ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeverityArg {
    Critical,
    Normal,
}

#[derive(Debug, Args)]
pub struct AlertsArgs {
    /// Only alerts of this severity
    #[arg(long, short = 's')]
    pub severity: Option<SeverityArg>,

    /// Number of alerts to skip
    #[arg(long)]
    pub skip: Option<u32>,

    /// Max alerts to return (service default 100)
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: Option<u32>,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum FilterArg {
    #[default]
    All,
    Critical,
    Normal,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Which alerts to display
    #[arg(long, short = 'f', default_value = "all")]
    pub filter: FilterArg,

    /// Do not open the push stream; rely on polling only
    #[arg(long)]
    pub no_stream: bool,

    /// Snapshot poll interval, e.g. "5s" or "1m" ("0s" disables polling)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub poll_interval: Option<Duration>,

    /// Max alerts pulled per snapshot
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: Option<u32>,
}

// ── Events ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EventsArgs {
    #[command(subcommand)]
    pub command: EventsCommand,
}

#[derive(Debug, Subcommand)]
pub enum EventsCommand {
    /// Submit one detection event
    Create {
        /// Reporting device
        #[arg(long)]
        device_id: String,

        /// Detection type, e.g. "person"
        #[arg(long)]
        event_type: String,

        /// Detector confidence in [0, 1]
        #[arg(long)]
        confidence: f64,

        /// Raw detector payload as a JSON object
        #[arg(long)]
        data: Option<String>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets redacted)
    Show,

    /// List configured profiles
    Profiles,

    /// Store a profile's password or token in the system keyring
    SetPassword {
        /// Profile to update (defaults to the active profile)
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
