//! Layered settings loading: `config/base.yaml`, then `.env`, then `APP_*`
//! environment variables (`__` separates nested keys).

use config::{Config, Environment, File, FileFormat};
pub use config::ConfigError;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "APP";

/// Load settings for the crate rooted at `crate_dir`.
///
/// Works both when the process runs inside the crate directory and when it
/// runs from the workspace root.
pub fn load_settings<T: DeserializeOwned>(crate_dir: &str) -> Result<T, ConfigError> {
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir()
        .map_err(|e| ConfigError::Message(format!("Failed to determine current directory: {}", e)))?;

    load_settings_from(&configuration_directory(&base_path, crate_dir))
}

/// Load settings from `<directory>/base.yaml` plus the environment overlay.
pub fn load_settings_from<T: DeserializeOwned>(directory: &Path) -> Result<T, ConfigError> {
    Config::builder()
        .add_source(File::from(directory.join("base.yaml")).required(true))
        .add_source(environment())
        .build()?
        .try_deserialize::<T>()
}

/// Parse settings from an in-memory YAML document plus the environment overlay.
pub fn parse_settings<T: DeserializeOwned>(yaml: &str) -> Result<T, ConfigError> {
    Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .add_source(environment())
        .build()?
        .try_deserialize::<T>()
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

fn configuration_directory(base_path: &Path, crate_dir: &str) -> PathBuf {
    if base_path.ends_with(crate_dir) {
        base_path.join("config")
    } else {
        base_path.join(crate_dir).join("config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serial_test::serial;

    #[derive(Debug, Deserialize)]
    struct Sample {
        api: SampleApi,
    }

    #[derive(Debug, Deserialize)]
    struct SampleApi {
        base_url: String,
        timeout_secs: u64,
    }

    const YAML: &str = "api:\n  base_url: \"https://api.example.test\"\n  timeout_secs: 30\n";

    #[test]
    fn configuration_directory_from_workspace_root() {
        let dir = configuration_directory(Path::new("/work"), "idv-orchestrator");
        assert_eq!(dir, PathBuf::from("/work/idv-orchestrator/config"));
    }

    #[test]
    fn configuration_directory_from_crate_dir() {
        let dir = configuration_directory(Path::new("/work/idv-orchestrator"), "idv-orchestrator");
        assert_eq!(dir, PathBuf::from("/work/idv-orchestrator/config"));
    }

    #[test]
    #[serial]
    fn parse_settings_reads_yaml() {
        let sample: Sample = parse_settings(YAML).unwrap();
        assert_eq!(sample.api.base_url, "https://api.example.test");
        assert_eq!(sample.api.timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn environment_overrides_nested_keys() {
        std::env::set_var("APP_API__BASE_URL", "https://eu.example.test");
        let sample: Result<Sample, _> = parse_settings(YAML);
        std::env::remove_var("APP_API__BASE_URL");

        assert_eq!(sample.unwrap().api.base_url, "https://eu.example.test");
    }

    #[test]
    #[serial]
    fn missing_base_file_is_an_error() {
        let result: Result<Sample, _> = load_settings_from(Path::new("/nonexistent/config"));
        assert!(result.is_err());
    }
}
