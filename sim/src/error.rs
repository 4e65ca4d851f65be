use controller::ConfigError;
use thiserror::Error;

/// Failures surfaced by the simulation host.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to load simulation config: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid player configuration for `{name}`: {source}")]
    Player {
        name: String,
        #[source]
        source: ConfigError,
    },

    #[error("invalid simulation config: {0}")]
    Invalid(String),

    #[error("no active character named `{0}`")]
    UnknownCharacter(String),

    #[error("character `{0}` already exists")]
    DuplicateCharacter(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<figment::Error> for SimError {
    fn from(e: figment::Error) -> Self {
        SimError::Load(Box::new(e))
    }
}
