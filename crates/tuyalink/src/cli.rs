//! Clap derive structures for the `tuyalink` CLI.
//!
//! Defines the command tree, global flags, and shared types. Also compiled
//! by `build.rs` for man page generation, so it depends on clap only.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tuyalink -- watch and control Tuya cloud devices
#[derive(Debug, Parser)]
#[command(
    name = "tuyalink",
    version,
    about = "Watch and control Tuya cloud devices from the command line",
    long_about = "Talks to the Tuya open platform: signed REST calls for device\n\
        listing and commands, and the encrypted MQTT event channel for\n\
        live status updates.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "TUYALINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "TUYALINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TUYALINK_OUTPUT",
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

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "TUYALINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
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
    /// Inspect devices on the account
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Stream live device events until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Send one command to a device
    Send(SendArgs),

    /// List and run tap-to-run scenes (smart-home accounts)
    Scenes(ScenesArgs),

    /// List learned infrared remotes and press their keys (smart-home accounts)
    #[command(alias = "ir")]
    Infrared(InfraredArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List every device with its online state
    #[command(alias = "ls")]
    List,

    /// Show one device with its current status
    Get {
        /// Device id
        device: String,
    },

    /// Show the commands and status ranges a device supports
    Spec {
        /// Device id
        device: String,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only show events for these device ids (repeatable)
    #[arg(long, short = 'd')]
    pub device: Vec<String>,
}

// ── Send ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Device id
    pub device: String,

    /// Data point code, e.g. `switch_led`
    pub code: String,

    /// Value; parsed as JSON, falling back to a plain string
    pub value: String,
}

// ── Scenes ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScenesArgs {
    #[command(subcommand)]
    pub command: ScenesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ScenesCommand {
    /// List scenes across every home
    #[command(alias = "ls")]
    List,

    /// Run a scene
    Trigger {
        /// Home id the scene belongs to
        home: String,
        /// Scene id
        scene: String,
    },
}

// ── Infrared ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct InfraredArgs {
    #[command(subcommand)]
    pub command: InfraredCommand,
}

#[derive(Debug, Subcommand)]
pub enum InfraredCommand {
    /// List remotes learned by each infrared hub, with their keys
    #[command(alias = "ls")]
    List,

    /// Press one key on a learned remote
    Press {
        /// Infrared hub device id
        hub: String,
        /// Remote id
        remote: String,
        /// Key name, e.g. `power`
        key: String,
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
    /// Print the config file location
    Path,

    /// Show the resolved configuration (secrets are hidden)
    Show,

    /// List configured profiles
    Profiles,

    /// Store a secret for the active profile in the system keyring
    ///
    /// The secret is read from the first line of stdin.
    SetSecret {
        #[arg(value_enum)]
        kind: SecretKind,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SecretKind {
    /// Cloud project access secret
    AccessSecret,
    /// Account password
    Password,
}

impl SecretKind {
    pub fn keyring_name(self) -> &'static str {
        match self {
            Self::AccessSecret => "access-secret",
            Self::Password => "password",
        }
    }
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
