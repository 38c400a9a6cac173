use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Map a dotted settings path back to the environment variable that would
/// have supplied it, e.g. `analyzer.api_key` to `FIXOS_ANALYZER__API_KEY`.
pub fn to_env_var(field: &str) -> String {
    let path = field
        .split('.')
        .map(|part| part.to_uppercase())
        .collect::<Vec<_>>()
        .join("__");
    format!("FIXOS_{path}")
}
