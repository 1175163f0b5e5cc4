//! Run configuration files.

use std::path::Path;

use tl_kernel::SimConfig;

use crate::error::{AppError, AppResult};

/// Load a [`SimConfig`] from YAML; absent keys keep their defaults.
pub fn load_sim_config(path: &Path) -> AppResult<SimConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_sim_config(&content)
}

pub fn parse_sim_config(content: &str) -> AppResult<SimConfig> {
    if content.trim().is_empty() {
        return Ok(SimConfig::default());
    }
    serde_yaml::from_str(content)
        .map_err(|e| AppError::Config(format!("Failed to parse run config YAML: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_the_default_config() {
        assert_eq!(parse_sim_config("\n").unwrap(), SimConfig::default());
    }

    #[test]
    fn unknown_types_are_reported() {
        let err = parse_sim_config("threads: many\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)), "{err}");
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_sim_config(Path::new("/nonexistent/run.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.yaml"));
    }
}
