//! Daemon configuration from command-line flags and environment

use hermes_core::{HermesError, HermesResult};
use hermes_runtime::NodeConfig;

/// Listen address used when neither flag nor environment sets one
pub const DEFAULT_ADDR: &str = "localhost:10001";

/// Environment variable for the listen address
pub const ENV_ADDR: &str = "HERMES_ADDR";

/// Environment variable for the comma separated peer list
pub const ENV_FOLLOW: &str = "HERMES_FOLLOW";

/// What the daemon was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(DaemonConfig),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Listening address
    pub addr: String,
    /// Peers to follow at startup
    pub follow: Vec<String>,
    pub node: NodeConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            addr: DEFAULT_ADDR.to_string(),
            follow: Vec::new(),
            node: NodeConfig::default(),
        }
    }
}

/// Split a comma separated address list, skipping empty entries
pub fn parse_follow_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(String::from)
        .collect()
}

impl Command {
    /// Parse flags (without the program name). Flags win over `env`.
    pub fn parse<I, F>(args: I, env: F) -> HermesResult<Command>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = DaemonConfig::default();
        if let Some(addr) = env(ENV_ADDR) {
            config.addr = addr;
        }
        if let Some(follow) = env(ENV_FOLLOW) {
            config.follow = parse_follow_list(&follow);
        }

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Command::Help),
                "--addr" => config.addr = flag_value(&arg, args.next())?,
                "--follow" => config.follow = parse_follow_list(&flag_value(&arg, args.next())?),
                "--dedup-capacity" => {
                    let raw = flag_value(&arg, args.next())?;
                    let capacity = raw.parse().map_err(|_| {
                        HermesError::Config(format!("invalid --dedup-capacity value: {}", raw))
                    })?;
                    config.node = config.node.with_dedup_capacity(capacity);
                }
                other => return Err(HermesError::Config(format!("unknown flag: {}", other))),
            }
        }

        config.node.validate()?;
        Ok(Command::Run(config))
    }
}

fn flag_value(flag: &str, value: Option<String>) -> HermesResult<String> {
    value.ok_or_else(|| HermesError::Config(format!("{} requires a value", flag)))
}
