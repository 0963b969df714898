use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

/// Top-level configuration. Every section falls back to its defaults, so a
/// partial file (or none at all) is valid.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub sandbox: SandboxSettings,
    pub model: ModelConfig,
    pub telemetry: TelemetryConfig,
}

/// When a file directive ends the agent loop.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DirectivePolicy {
    /// The first directive sets the summary, even if the same turn issued
    /// tool calls.
    #[default]
    Immediate,
    /// A directive only counts on a turn that issued no tool calls.
    AfterToolCalls,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub max_rounds: usize,
    pub template_id: String,
    pub directive_policy: DirectivePolicy,
    pub command_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 15,
            template_id: "sandforge-nextjs:latest".into(),
            directive_policy: DirectivePolicy::Immediate,
            command_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SandboxSettings {
    pub memory_limit_bytes: i64,
    pub cpu_quota: i64,
    /// "none", "bridge", "host" or a custom Docker network name.
    pub network: String,
    pub workdir: String,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 1024 * 1024 * 1024, // 1GB
            cpu_quota: 100_000,                     // 1 CPU core
            network: "none".into(),
            workdir: "/home/user".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<Secret<String>>,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            temperature: 0.1,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    pub json_logs: bool,
}

impl AppConfig {
    /// Load layered configuration.
    ///
    /// Sources, later wins: `config/default`, `config/{SANDFORGE_ENV}`,
    /// `config/local`, an explicit file, then `SANDFORGE__SECTION__KEY`
    /// environment variables.
    pub fn load(explicit: Option<&str>) -> Result<Self, ConfigError> {
        let env = std::env::var("SANDFORGE_ENV").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::with_name(path));
        }

        builder
            // Map SANDFORGE__ENGINE__MAX_ROUNDS=5 to engine.max_rounds
            .add_source(Environment::with_prefix("SANDFORGE").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.engine.max_rounds, 15);
        assert_eq!(config.engine.directive_policy, DirectivePolicy::Immediate);
        assert_eq!(config.sandbox.network, "none");
        assert!(config.model.api_key.is_none());
        assert!(!config.telemetry.json_logs);
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("engine.max_rounds", 3)
            .unwrap()
            .set_override("engine.directive_policy", "after_tool_calls")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.engine.max_rounds, 3);
        assert_eq!(config.engine.directive_policy, DirectivePolicy::AfterToolCalls);
        assert_eq!(config.engine.command_timeout_secs, 120);
        assert_eq!(config.model.model, "gpt-4o-mini");
    }
}
