use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use replay_engine::replay::{DEFAULT_BATCH_BYTES, DEFAULT_BATCH_SIZE};

use crate::error::CliError;

/// Config file looked up in the working directory before the home default.
pub const LOCAL_CONFIG_FILE: &str = "kafka-replay.toml";
/// Env var consulted last when resolving brokers.
pub const BROKERS_ENV: &str = "KAFKA_BROKERS";

// ═══════════════════════════════════════════════════════════════
//  CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "kafka-replay", about = "Record Kafka topic traffic to a file and replay it later")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file (default: ./kafka-replay.toml, then ~/.kafka-replay/config.toml)
    #[arg(long, global = true, env = "KAFKA_REPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Profile to use from the configuration file
    #[arg(long, global = true, env = "KAFKA_REPLAY_PROFILE")]
    pub profile: Option<String>,

    /// Broker address(es), comma-separated or repeated
    #[arg(long, global = true, env = "KAFKA_REPLAY_BROKERS", value_delimiter = ',')]
    pub brokers: Vec<String>,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Only log warnings and errors; disables progress output
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text
    #[default]
    Table,
    /// JSON; one object per line for streams
    Json,
    /// Raw payload bytes, concatenated with no separator (cat only)
    Raw,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record messages from a topic partition into a file
    Record(RecordArgs),
    /// Publish a recorded file back to a topic
    Replay(ReplayArgs),
    /// Decode a recorded file to stdout
    Cat(CatArgs),
    /// Show brokers, topics and partitions
    Info,
    /// Internal diagnostics (unstable)
    #[command(subcommand)]
    Debug(DebugCommand),
    /// Print version information
    Version,
}

#[derive(Subcommand, Clone, Copy, Debug)]
pub enum DebugCommand {
    /// Print the resolved configuration
    Config,
}

#[derive(Args, Clone, Debug)]
pub struct RecordArgs {
    /// Topic to record from
    #[arg(long, short = 't')]
    pub topic: String,

    /// Partition to record from
    #[arg(long, short = 'p', default_value_t = 0)]
    pub partition: i32,

    /// Consumer group id
    #[arg(long, short = 'g', default_value = "kafka-replay-record")]
    pub group_id: String,

    /// Start at this absolute offset
    #[arg(long, conflicts_with = "from_beginning")]
    pub offset: Option<i64>,

    /// Start at the earliest available offset
    #[arg(long)]
    pub from_beginning: bool,

    /// Recording file to create
    #[arg(long, short = 'o', default_value = "messages.log")]
    pub output: PathBuf,

    /// Stop after this many messages (0 = until interrupted)
    #[arg(long, short = 'l', default_value_t = 0)]
    pub limit: u64,
}

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Topic to publish to
    #[arg(long, short = 't')]
    pub topic: String,

    /// Recording file to read
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Messages per second (0 = unlimited)
    #[arg(long, short = 'r', default_value_t = 0)]
    pub rate: u32,

    /// Restart from the beginning at end of file until interrupted
    #[arg(long = "loop")]
    pub loop_forever: bool,

    /// Send recorded timestamps instead of the current time
    #[arg(long)]
    pub preserve_timestamps: bool,

    /// Messages per publish call
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Payload bytes per publish call
    #[arg(long, default_value_t = DEFAULT_BATCH_BYTES)]
    pub batch_bytes: u64,

    /// Create the topic if it does not exist
    #[arg(long)]
    pub create_topic: bool,
}

#[derive(Args, Clone, Debug)]
pub struct CatArgs {
    /// Recording file to read
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Show recorded timestamps instead of the current time
    #[arg(long)]
    pub preserve_timestamps: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// Named connection settings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default)]
    pub brokers: Vec<String>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self, CliError> {
        toml::from_str(content).map_err(|e| CliError::config(format!("parse: {e}")))
    }

    /// Read `path`. A missing file is `Ok(None)`, not an error.
    pub fn load(path: &Path) -> Result<Option<Self>, CliError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CliError::config(format!("cannot read '{}': {e}", path.display()))),
        };
        Self::parse(&content)
            .map(Some)
            .map_err(|e| CliError::config(format!("'{}': {e}", path.display())))
    }

    /// Look up `name`, or `default_profile` when no name is given.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), CliError> {
        let name = name
            .or(self.default_profile.as_deref())
            .ok_or_else(|| CliError::config("no profile specified and no default_profile configured"))?;
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| CliError::config(format!("profile '{name}' not found in config")))
    }
}

/// Pick the config file: explicit path, then the working directory, then home.
pub fn resolve_path(explicit: Option<&Path>, cwd: &Path, home: Option<&Path>) -> Result<PathBuf, CliError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let local = cwd.join(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Ok(local);
    }
    let home = home.ok_or_else(|| CliError::config("unable to determine home directory for default config path"))?;
    Ok(home.join(".kafka-replay").join("config.toml"))
}

/// Brokers by precedence: flag, then profile, then the env value.
///
/// A profile that cannot be resolved is skipped, not fatal.
pub fn resolve_brokers(
    flag: &[String],
    profile: Option<&str>,
    config: &FileConfig,
    env: Option<&str>,
) -> Result<Vec<String>, CliError> {
    let flag = clean_list(flag.iter().map(String::as_str));
    if !flag.is_empty() {
        return Ok(flag);
    }

    if !config.profiles.is_empty() {
        match config.profile(profile) {
            Ok((name, p)) if !p.brokers.is_empty() => {
                tracing::debug!(profile = name, "using brokers from profile");
                return Ok(p.brokers.clone());
            }
            Ok(_) => {}
            Err(e) if profile.is_some() => tracing::warn!(error = %e, "ignoring profile"),
            Err(_) => {}
        }
    }

    if let Some(env) = env {
        let brokers = clean_list(env.split(','));
        if !brokers.is_empty() {
            return Ok(brokers);
        }
    }

    Err(CliError::config(format!(
        "no brokers configured; set --brokers, a profile, or {BROKERS_ENV}"
    )))
}

fn clean_list<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ═══════════════════════════════════════════════════════════════
//  Settings: file config + global flags
// ═══════════════════════════════════════════════════════════════

pub struct Settings {
    pub path: PathBuf,
    pub found: bool,
    pub file: FileConfig,
    pub profile: Option<String>,
    flag_brokers: Vec<String>,
}

impl Settings {
    pub fn load(global: &GlobalArgs) -> Result<Self, CliError> {
        let cwd = std::env::current_dir()
            .map_err(|e| CliError::config(format!("unable to get current directory: {e}")))?;
        let home = dirs::home_dir();
        let path = resolve_path(global.config.as_deref(), &cwd, home.as_deref())?;
        let file = FileConfig::load(&path)?;
        tracing::debug!(path = %path.display(), found = file.is_some(), "configuration resolved");

        Ok(Self {
            path,
            found: file.is_some(),
            file: file.unwrap_or_default(),
            profile: global.profile.clone(),
            flag_brokers: global.brokers.clone(),
        })
    }

    pub fn brokers(&self) -> Result<Vec<String>, CliError> {
        let env = std::env::var(BROKERS_ENV).ok();
        resolve_brokers(&self.flag_brokers, self.profile.as_deref(), &self.file, env.as_deref())
    }
}
