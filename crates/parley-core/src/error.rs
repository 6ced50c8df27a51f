use parley_abi::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `step()` was called with no prompt or step batch pending.
    #[error("no pending batch: call start_completion() before step()")]
    NoPendingBatch,

    /// A previous engine failure left the session unusable.
    #[error("session failed earlier and must be torn down")]
    Failed,
}
