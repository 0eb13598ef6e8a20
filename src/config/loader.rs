//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::synth::{ConstructError, Template};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Synthesis failed: {0}")]
    Synth(#[from] ConstructError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate an app file already in memory.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::debug!(
        path = %path.display(),
        stack = %config.stack.name,
        constructs = config.constructs.len(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Load an app file and synthesize its template.
pub fn synthesize_file(path: &Path) -> Result<Template, ConfigError> {
    Ok(load_config(path)?.synthesize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [stack]
            name = "app"
            region = "us-east-1"

            [[constructs]]
            type = "queue"
            id = "jobs"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.constructs.len(), 1);
        let template = synthesize_file(file.path()).unwrap();
        assert!(template.resources.contains_key("JobsQueue"));
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/app.toml")),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(parse_config("[stack"), Err(ConfigError::Parse(_))));

        let err = parse_config("[stack]\nname = \"app\"\nregion = \"\"\n").unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: stack.region must not be empty");
    }
}
