use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dependency cycle involving agents: {agents:?}")]
    DependencyCycle {
        /// Agent ids participating in (or reachable from) the cycle.
        agents: Vec<String>,
    },

    #[error("Agent {agent} depends on unknown agent {dependency}")]
    UnknownDependency { agent: String, dependency: String },

    #[error("Agent {agent} has a non-positive estimated duration")]
    InvalidDuration { agent: String },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    #[error("Executor pool is full (max: {max})")]
    PoolFull { max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
