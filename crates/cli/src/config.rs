use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use agent::{
    AnthropicProvider, AwsCredentials, BedrockAuth, BedrockProvider, DEFAULT_MAX_ITERATIONS,
    ModelGateway,
};
use markup::SizeLimits;
use proto::ConfigError;
use serde::{Deserialize, Serialize};
use tools::McpBridgeConfig;
use tracing::debug;

/// Model backends the binary can drive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// AWS Bedrock runtime. Default.
    #[default]
    Bedrock,
    /// Anthropic Messages API.
    Anthropic,
}

impl ModelProvider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bedrock => "bedrock",
            Self::Anthropic => "anthropic",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bedrock" => Some(Self::Bedrock),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Bedrock API key; takes precedence over SigV4 credentials.
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub anthropic_api_key: String,
    /// Overrides the provider endpoint (proxies, VPC endpoints).
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            region: default_region(),
            model_id: default_model_id(),
            max_tokens: default_max_tokens(),
            bearer_token: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            session_token: String::new(),
            anthropic_api_key: String::new(),
            endpoint: None,
        }
    }
}

fn default_region() -> String {
    "ap-northeast-1".to_string()
}

fn default_model_id() -> String {
    "apac.anthropic.claude-sonnet-4-20250514-v1:0".to_string()
}

fn default_max_tokens() -> u32 {
    10000
}

impl ModelConfig {
    /// Picks the Bedrock authentication scheme from whatever is configured.
    ///
    /// Bearer token first, then an access/secret key pair.
    pub fn bedrock_auth(&self) -> Option<BedrockAuth> {
        if !self.bearer_token.trim().is_empty() {
            return Some(BedrockAuth::Bearer(self.bearer_token.trim().to_string()));
        }
        if self.access_key.trim().is_empty() || self.secret_key.trim().is_empty() {
            return None;
        }
        let session_token = Some(self.session_token.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Some(BedrockAuth::SigV4(AwsCredentials {
            access_key: self.access_key.trim().to_string(),
            secret_key: self.secret_key.trim().to_string(),
            session_token,
        }))
    }
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tool server script (`.py` or `.js`). Unset runs without tools.
    #[serde(default)]
    pub script_path: Option<PathBuf>,
    #[serde(default = "default_python_command")]
    pub python_command: String,
    #[serde(default = "default_node_command")]
    pub node_command: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Reconnect a dropped tool server before each chat request.
    #[serde(default = "default_true")]
    pub reconnect_on_demand: bool,
    /// View id suggested to the model when the user names none.
    #[serde(default)]
    pub default_view_id: Option<String>,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Append `[ツール実行: name]` to answers for every tool that ran.
    #[serde(default)]
    pub show_tool_markers: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            script_path: None,
            python_command: default_python_command(),
            node_command: default_node_command(),
            max_iterations: default_max_iterations(),
            reconnect_on_demand: true,
            default_view_id: None,
            handshake_timeout_secs: default_handshake_timeout_secs(),
            show_tool_markers: false,
        }
    }
}

fn default_python_command() -> String {
    "python".to_string()
}

fn default_node_command() -> String {
    "node".to_string()
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_true() -> bool {
    true
}

fn default_handshake_timeout_secs() -> u64 {
    30
}

/// `[tableau]` section: connection settings handed to the tool server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableauConfig {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub jwt_sub_claim: Option<String>,
    #[serde(default)]
    pub connected_app_client_id: Option<String>,
    #[serde(default)]
    pub connected_app_client_secret: Option<String>,
    #[serde(default)]
    pub connected_app_secret_value: Option<String>,
    #[serde(default)]
    pub pat_name: Option<String>,
    #[serde(default)]
    pub pat_value: Option<String>,
}

impl TableauConfig {
    /// `(ENV_NAME, value)` pairs for every setting that is present.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        [
            ("SERVER", &self.server),
            ("SITE_NAME", &self.site_name),
            ("AUTH", &self.auth),
            ("JWT_SUB_CLAIM", &self.jwt_sub_claim),
            ("CONNECTED_APP_CLIENT_ID", &self.connected_app_client_id),
            ("CONNECTED_APP_CLIENT_SECRET", &self.connected_app_client_secret),
            ("CONNECTED_APP_SECRET_VALUE", &self.connected_app_secret_value),
            ("PAT_NAME", &self.pat_name),
            ("PAT_VALUE", &self.pat_value),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "SERVER" => Some(&mut self.server),
            "SITE_NAME" => Some(&mut self.site_name),
            "AUTH" => Some(&mut self.auth),
            "JWT_SUB_CLAIM" => Some(&mut self.jwt_sub_claim),
            "CONNECTED_APP_CLIENT_ID" => Some(&mut self.connected_app_client_id),
            "CONNECTED_APP_CLIENT_SECRET" => Some(&mut self.connected_app_client_secret),
            "CONNECTED_APP_SECRET_VALUE" => Some(&mut self.connected_app_secret_value),
            "PAT_NAME" => Some(&mut self.pat_name),
            "PAT_VALUE" => Some(&mut self.pat_value),
            _ => None,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated origins, or `*`.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> String {
    "*".to_string()
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            structured: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[markup]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupConfig {
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            max_height: default_max_height(),
        }
    }
}

fn default_max_width() -> u32 {
    600
}

fn default_max_height() -> u32 {
    400
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub tableau: TableauConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub markup: MarkupConfig,
}

impl Config {
    /// Loads config from `path`, `./config.toml` or `~/.lumen/config.toml`,
    /// then applies process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] with a custom variable lookup.
    pub fn load_with(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            let cwd = std::env::current_dir().ok()?.join("config.toml");
            if cwd.exists() {
                return Some(cwd);
            }
            let home = std::env::var("HOME").ok()?;
            let home_config = PathBuf::from(home).join(".lumen").join("config.toml");
            if home_config.exists() {
                return Some(home_config);
            }
            None
        });
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        config.apply_overrides(lookup)?;
        config.validate()?;

        debug!(
            provider = config.model.provider.name(),
            model = %config.model.model_id,
            script = ?config.tools.script_path,
            "Config loaded"
        );
        Ok(config)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(*k));

        if let Some(name) = lookup("LUMEN_PROVIDER") {
            self.model.provider =
                ModelProvider::from_name(&name).ok_or_else(|| ConfigError::InvalidValue {
                    field: "LUMEN_PROVIDER".into(),
                    reason: format!("unknown provider '{name}'"),
                })?;
        }
        if let Some(region) = lookup("AWS_REGION") {
            self.model.region = region;
        }
        if let Some(key) = first(&["AWS_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]) {
            self.model.access_key = key;
        }
        if let Some(secret) = first(&["AWS_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]) {
            self.model.secret_key = secret;
        }
        if let Some(token) = lookup("AWS_SESSION_TOKEN") {
            self.model.session_token = token;
        }
        if let Some(token) = lookup("AWS_BEARER_TOKEN_BEDROCK") {
            self.model.bearer_token = token;
        }
        if let Some(model_id) = lookup("BEDROCK_MODEL_ID") {
            self.model.model_id = model_id;
        }
        if let Some(raw) = lookup("MAX_TOKENS") {
            self.model.max_tokens = parse_number("MAX_TOKENS", &raw)?;
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.model.anthropic_api_key = key;
        }

        if let Some(script) = lookup("SERVER_SCRIPT_PATH") {
            self.tools.script_path = Some(PathBuf::from(script)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(raw) = lookup("MCP_MAX_ITERATIONS") {
            self.tools.max_iterations = parse_number("MCP_MAX_ITERATIONS", &raw)?;
        }

        for key in tools::ANALYTICS_ENV_KEYS {
            if let Some(value) = lookup(&format!("TABLEAU_{key}"))
                && let Some(slot) = self.tableau.slot_mut(key)
            {
                *slot = Some(value);
            }
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(raw) = lookup("LOG_STRUCTURED") {
            self.logging.structured = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
            self.server.cors_origins = origins;
        }
        if let Some(raw) = lookup("LUMEN_PORT") {
            self.server.port = parse_number("LUMEN_PORT", &raw)?;
        }
        Ok(())
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.max_tokens == 0 {
            return Err(invalid("model.max_tokens", "must be greater than 0"));
        }
        if self.tools.max_iterations == 0 {
            return Err(invalid("tools.max_iterations", "must be greater than 0"));
        }
        if self.model.model_id.trim().is_empty() {
            return Err(ConfigError::MissingField("model.model_id".into()));
        }
        if self.markup.max_width == 0 || self.markup.max_height == 0 {
            return Err(invalid("markup", "size limits must be greater than 0"));
        }
        Ok(())
    }

    /// Launch settings for the tool server.
    pub fn bridge_config(&self) -> McpBridgeConfig {
        let mut env = self.tableau.env_pairs();
        env.push(("DEFAULT_LOG_LEVEL".to_string(), self.logging.level.clone()));
        McpBridgeConfig {
            script_path: self.tools.script_path.clone(),
            python_command: self.tools.python_command.clone(),
            node_command: self.tools.node_command.clone(),
            env,
            handshake_timeout: Duration::from_secs(self.tools.handshake_timeout_secs),
        }
    }

    pub fn size_limits(&self) -> SizeLimits {
        SizeLimits {
            max_width: self.markup.max_width,
            max_height: self.markup.max_height,
        }
    }

    /// `host:port` the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Builds the configured model gateway.
    pub fn build_gateway(&self) -> Result<Arc<dyn ModelGateway>, ConfigError> {
        let model = &self.model;
        match model.provider {
            ModelProvider::Bedrock => {
                let auth = model.bedrock_auth().ok_or_else(|| {
                    ConfigError::MissingField(
                        "model.bearer_token or model.access_key/model.secret_key".into(),
                    )
                })?;
                let mut provider = BedrockProvider::new(
                    auth,
                    model.region.trim(),
                    model.model_id.trim(),
                    model.max_tokens,
                );
                if let Some(endpoint) = model.endpoint.as_deref() {
                    provider = provider.with_endpoint(endpoint);
                }
                Ok(Arc::new(provider))
            }
            ModelProvider::Anthropic => {
                let key = model.anthropic_api_key.trim();
                if key.is_empty() {
                    return Err(ConfigError::MissingField("model.anthropic_api_key".into()));
                }
                let provider = match model.endpoint.as_deref() {
                    Some(base) => AnthropicProvider::with_base_url(
                        key,
                        model.model_id.trim(),
                        model.max_tokens,
                        base,
                    ),
                    None => AnthropicProvider::new(key, model.model_id.trim(), model.max_tokens),
                };
                Ok(Arc::new(provider))
            }
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(field, &format!("'{raw}' is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{remove_env_var, set_env_var, with_locked_env};
    use std::collections::HashMap;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, content).expect("write config");
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let cfg = Config::default();
        assert_eq!(cfg.model.provider, ModelProvider::Bedrock);
        assert_eq!(cfg.model.region, "ap-northeast-1");
        assert_eq!(
            cfg.model.model_id,
            "apac.anthropic.claude-sonnet-4-20250514-v1:0"
        );
        assert_eq!(cfg.model.max_tokens, 10000);
        assert_eq!(cfg.tools.max_iterations, 20);
        assert!(cfg.tools.reconnect_on_demand);
        assert!(!cfg.tools.show_tool_markers);
        assert_eq!(cfg.server.cors_origins, "*");
        assert_eq!(cfg.markup.max_width, 600);
        assert_eq!(cfg.markup.max_height, 400);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_reads_explicit_file_path() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config_path = tmp.path().join("config.toml");
        write_file(
            &config_path,
            r#"
[model]
provider = "anthropic"
model_id = "claude-sonnet-4-20250514"
max_tokens = 2048
anthropic_api_key = "from_file"

[tools]
script_path = "/opt/tools/server.js"
max_iterations = 5
default_view_id = "view-42"
show_tool_markers = true

[tableau]
server = "https://tableau.example.com"
site_name = "analytics"

[server]
port = 9100
cors_origins = "http://localhost:3000"

[markup]
max_width = 800
"#,
        );
        let cfg = Config::load_with(Some(&config_path), vars(&[])).expect("config should parse");
        assert_eq!(cfg.model.provider, ModelProvider::Anthropic);
        assert_eq!(cfg.model.model_id, "claude-sonnet-4-20250514");
        assert_eq!(cfg.model.max_tokens, 2048);
        assert_eq!(
            cfg.tools.script_path.as_deref(),
            Some(Path::new("/opt/tools/server.js"))
        );
        assert_eq!(cfg.tools.max_iterations, 5);
        assert_eq!(cfg.tools.default_view_id.as_deref(), Some("view-42"));
        assert!(cfg.tools.show_tool_markers);
        assert_eq!(cfg.tableau.site_name.as_deref(), Some("analytics"));
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9100");
        assert_eq!(cfg.markup.max_width, 800);
        assert_eq!(cfg.markup.max_height, 400);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config_path = tmp.path().join("config.toml");
        write_file(&config_path, "[model\nprovider = ");
        let err = Config::load_with(Some(&config_path), vars(&[])).expect_err("should fail");
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn load_reports_missing_explicit_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let missing = tmp.path().join("nope.toml");
        let err = Config::load_with(Some(&missing), vars(&[])).expect_err("should fail");
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn env_overrides_take_priority_over_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config_path = tmp.path().join("config.toml");
        write_file(
            &config_path,
            r#"
[model]
region = "us-east-1"
bearer_token = "file-token"
"#,
        );
        let cfg = Config::load_with(
            Some(&config_path),
            vars(&[
                ("AWS_REGION", "eu-west-1"),
                ("AWS_BEARER_TOKEN_BEDROCK", "env-token"),
                ("BEDROCK_MODEL_ID", "anthropic.claude-3-haiku"),
                ("MAX_TOKENS", "512"),
                ("SERVER_SCRIPT_PATH", "/srv/tools.py"),
                ("MCP_MAX_ITERATIONS", "3"),
                ("CORS_ALLOWED_ORIGINS", "https://a.example,https://b.example"),
                ("LUMEN_PORT", "8088"),
                ("LOG_STRUCTURED", "true"),
                ("TABLEAU_PAT_NAME", "robot"),
            ]),
        )
        .expect("config");
        assert_eq!(cfg.model.region, "eu-west-1");
        assert_eq!(cfg.model.bearer_token, "env-token");
        assert_eq!(cfg.model.model_id, "anthropic.claude-3-haiku");
        assert_eq!(cfg.model.max_tokens, 512);
        assert_eq!(
            cfg.tools.script_path.as_deref(),
            Some(Path::new("/srv/tools.py"))
        );
        assert_eq!(cfg.tools.max_iterations, 3);
        assert_eq!(cfg.server.cors_origins, "https://a.example,https://b.example");
        assert_eq!(cfg.server.port, 8088);
        assert!(cfg.logging.structured);
        assert_eq!(cfg.tableau.pat_name.as_deref(), Some("robot"));
    }

    #[test]
    fn aws_key_aliases_prefer_short_names() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config_path = tmp.path().join("config.toml");
        write_file(&config_path, "");
        let cfg = Config::load_with(
            Some(&config_path),
            vars(&[
                ("AWS_ACCESS_KEY", "AKIASHORT"),
                ("AWS_ACCESS_KEY_ID", "AKIALONG"),
                ("AWS_SECRET_ACCESS_KEY", "long-secret"),
            ]),
        )
        .expect("config");
        assert_eq!(cfg.model.access_key, "AKIASHORT");
        assert_eq!(cfg.model.secret_key, "long-secret");
    }

    #[test]
    fn invalid_numeric_override_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config_path = tmp.path().join("config.toml");
        write_file(&config_path, "");
        let err = Config::load_with(Some(&config_path), vars(&[("MAX_TOKENS", "lots")]))
            .expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "MAX_TOKENS"));

        let err = Config::load_with(Some(&config_path), vars(&[("MCP_MAX_ITERATIONS", "0")]))
            .expect_err("zero iterations");
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "tools.max_iterations")
        );
    }

    #[test]
    fn unknown_provider_override_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config_path = tmp.path().join("config.toml");
        write_file(&config_path, "");
        let err = Config::load_with(Some(&config_path), vars(&[("LUMEN_PROVIDER", "openai")]))
            .expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn load_reads_process_environment() {
        with_locked_env(|| {
            let tmp = tempfile::tempdir().expect("tempdir");
            let config_path = tmp.path().join("config.toml");
            write_file(&config_path, "");
            set_env_var("LUMEN_PROVIDER", "Anthropic");
            let cfg = Config::load(Some(&config_path));
            remove_env_var("LUMEN_PROVIDER");
            assert_eq!(cfg.expect("config").model.provider, ModelProvider::Anthropic);
        });
    }

    #[test]
    fn bedrock_auth_prefers_bearer_token() {
        let mut model = ModelConfig {
            access_key: "AKIA".into(),
            secret_key: "secret".into(),
            ..ModelConfig::default()
        };
        assert!(matches!(model.bedrock_auth(), Some(BedrockAuth::SigV4(ref c)) if c.session_token.is_none()));

        model.session_token = "sess".into();
        assert!(matches!(
            model.bedrock_auth(),
            Some(BedrockAuth::SigV4(ref c)) if c.session_token.as_deref() == Some("sess")
        ));

        model.bearer_token = " bedrock-key ".into();
        assert!(matches!(model.bedrock_auth(), Some(BedrockAuth::Bearer(ref t)) if t == "bedrock-key"));

        assert!(ModelConfig::default().bedrock_auth().is_none());
    }

    #[test]
    fn build_gateway_requires_credentials() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.build_gateway().err(),
            Some(ConfigError::MissingField(_))
        ));

        let mut cfg = Config::default();
        cfg.model.provider = ModelProvider::Anthropic;
        assert!(cfg.build_gateway().is_err());
        cfg.model.anthropic_api_key = "sk-ant-test".into();
        cfg.model.model_id = "claude-sonnet-4-20250514".into();
        let gateway = cfg.build_gateway().expect("gateway");
        assert_eq!(gateway.model_id(), "claude-sonnet-4-20250514");
    }

    #[test]
    fn bridge_config_forwards_only_present_tableau_settings() {
        let mut cfg = Config::default();
        cfg.tools.script_path = Some(PathBuf::from("server.py"));
        cfg.tools.handshake_timeout_secs = 5;
        cfg.tableau.server = Some("https://tableau.example.com".into());
        cfg.tableau.pat_value = Some("secret".into());
        cfg.logging.level = "debug".into();

        let bridge = cfg.bridge_config();
        assert_eq!(bridge.handshake_timeout, Duration::from_secs(5));
        assert_eq!(bridge.launcher().expect("launcher").0, "python");
        assert_eq!(
            bridge.env,
            vec![
                ("SERVER".to_string(), "https://tableau.example.com".to_string()),
                ("PAT_VALUE".to_string(), "secret".to_string()),
                ("DEFAULT_LOG_LEVEL".to_string(), "debug".to_string()),
            ]
        );
        assert!(
            bridge
                .env
                .iter()
                .all(|(k, _)| tools::ANALYTICS_ENV_KEYS.contains(&k.as_str()))
        );
    }
}
