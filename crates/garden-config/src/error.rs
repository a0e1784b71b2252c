use std::path::PathBuf;

use thiserror::Error;

use crate::validation::FieldError;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid YAML in {path}: {source}")]
  Yaml {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("invalid JSON in {path}: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("unsupported infrastructure provider: {0}")]
  UnsupportedProvider(String),

  #[error("invalid imports: {}", join_field_errors(.errors))]
  Invalid { errors: Vec<FieldError> },
}

fn join_field_errors(errors: &[FieldError]) -> String {
  let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
  errors.join("; ")
}
