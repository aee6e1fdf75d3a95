//! Agent configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use switchboard_proto::codec::MAX_FRAME_SIZE;

/// Default prefix of the inbound subscription topic
pub const DEFAULT_TOPIC_PREFIX: &str = "rpc:agent";

/// Environment variable names read by [`AgentConfig::from_env`]
pub mod env {
    /// Agent identity
    pub const AGENT_ID: &str = "SWITCHBOARD_AGENT_ID";
    /// Topic prefix
    pub const TOPIC_PREFIX: &str = "SWITCHBOARD_TOPIC_PREFIX";
    /// Number of task records kept
    pub const TASK_RETENTION: &str = "SWITCHBOARD_TASK_RETENTION";
    /// Fallback log filter
    pub const LOG_LEVEL: &str = "SWITCHBOARD_LOG_LEVEL";
    /// Maximum stdio frame size in bytes
    pub const MAX_FRAME_SIZE: &str = "SWITCHBOARD_MAX_FRAME_SIZE";
}

/// Agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent identity, scopes the inbound topic
    pub agent_id: String,
    /// Prefix of the inbound topic
    pub topic_prefix: String,
    /// Number of completed task records kept; `None` keeps all of them
    pub task_retention: Option<usize>,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Maximum frame size for the stdio transport
    pub max_frame_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            task_retention: None,
            log_level: "info".to_string(),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl AgentConfig {
    /// Create a configuration for an agent id with defaults elsewhere
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    /// Inbound subscription topic, `<prefix>:<agent_id>`
    pub fn topic(&self) -> String {
        format!("{}:{}", self.topic_prefix, self.agent_id)
    }

    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load and validate configuration from a variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(agent_id) = lookup(env::AGENT_ID) {
            config.agent_id = agent_id;
        }
        if let Some(prefix) = lookup(env::TOPIC_PREFIX) {
            config.topic_prefix = prefix;
        }
        if let Some(retention) = lookup(env::TASK_RETENTION) {
            config.task_retention = Some(parse_var(env::TASK_RETENTION, &retention)?);
        }
        if let Some(level) = lookup(env::LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(size) = lookup(env::MAX_FRAME_SIZE) {
            config.max_frame_size = parse_var(env::MAX_FRAME_SIZE, &size)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::MissingAgentId);
        }
        if self.task_retention == Some(0) {
            return Err(ConfigError::ZeroRetention);
        }
        if u32::try_from(self.max_frame_size).is_err() {
            return Err(ConfigError::FrameSizeOutOfRange(self.max_frame_size));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
