use std::path::{Path, PathBuf};

use config::Config;
use serde::Deserialize;

use crate::constants::{
    APP_NAME, DEFAULT_CONFIG_CONTENT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL_ID, DEFAULT_REGION,
};
use crate::usage::CostRates;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub verbosity: Option<String>,
    pub model_config: ModelConfig,
    pub aws_settings: AwsSettings,
    pub cost_rates: CostRates,
}

#[derive(Debug, Deserialize)]
pub struct AwsSettings {
    pub profile: Option<String>,
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: i32,
    pub streaming: bool,
    pub system_prompt: Option<String>,
}

impl Settings {
    /// Loads settings from the user's config directory, writing a default
    /// config file there on first run.
    pub fn new() -> Result<Self, config::ConfigError> {
        let config_path = Self::default_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_CONFIG_CONTENT).ok();
        }

        Self::load(&config_path)
    }

    /// `<config dir>/bedrock-cli/config.toml`, or `config.toml` in the
    /// working directory when the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|mut path| {
                path.push(APP_NAME);
                path.push("config.toml");
                path
            })
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Layers the given file (optional) and `BEDROCK_CLI__*` variables over
    /// the built-in defaults.
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        let rates = CostRates::default();
        let settings = Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("BEDROCK_CLI")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("model_config.model_id", DEFAULT_MODEL_ID)?
            .set_default("model_config.temperature", 0.0_f64)?
            .set_default("model_config.max_tokens", DEFAULT_MAX_TOKENS as i64)?
            .set_default("model_config.streaming", true)?
            .set_default("aws_settings.region", DEFAULT_REGION)?
            .set_default("cost_rates.per_thousand_prompt", rates.per_thousand_prompt)?
            .set_default(
                "cost_rates.per_thousand_completion",
                rates.per_thousand_completion,
            )?
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(settings.model_config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(settings.model_config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(settings.model_config.temperature, 0.0);
        assert!(settings.model_config.streaming);
        assert_eq!(settings.aws_settings.region, DEFAULT_REGION);
        assert!(settings.aws_settings.profile.is_none());
        assert_eq!(settings.cost_rates, CostRates::default());
    }

    #[test]
    #[serial]
    fn default_config_content_parses() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(DEFAULT_CONFIG_CONTENT.as_bytes()).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.verbosity.as_deref(), Some("warn"));
        assert_eq!(settings.model_config.model_id, DEFAULT_MODEL_ID);
        assert!(settings.model_config.system_prompt.is_none());
    }

    #[test]
    #[serial]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[aws_settings]\nregion = \"eu-west-1\"\nprofile = \"work\"\n\n[cost_rates]\nper_thousand_prompt = 0.001\nper_thousand_completion = 0.002"
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.aws_settings.region, "eu-west-1");
        assert_eq!(settings.aws_settings.profile.as_deref(), Some("work"));
        assert_eq!(settings.cost_rates.per_thousand_prompt, 0.001);
        assert_eq!(settings.cost_rates.per_thousand_completion, 0.002);
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[model_config]\nmax_tokens = 100").unwrap();

        std::env::set_var("BEDROCK_CLI__MODEL_CONFIG__MAX_TOKENS", "256");
        let settings = Settings::load(file.path());
        std::env::remove_var("BEDROCK_CLI__MODEL_CONFIG__MAX_TOKENS");

        assert_eq!(settings.unwrap().model_config.max_tokens, 256);
    }
}
