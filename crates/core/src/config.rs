use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub query: QueryConfig,
    pub aws: AwsConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct QueryConfig {
    pub database: String,
    pub output_location: String,
    pub workgroup: Option<String>,
    pub region: String,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AwsConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub max_iterations: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// How the managed query engine will be reached with the loaded settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineAccess {
    Signed,
    /// Unsigned calls, only usable against an overridden endpoint such as a local emulator.
    UnsignedOverride,
    Unconfigured,
}

impl EngineAccess {
    pub fn is_ready(self) -> bool {
        !matches!(self, Self::Unconfigured)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub query_database: Option<String>,
    pub query_output_location: Option<String>,
    pub query_region: Option<String>,
    pub query_endpoint: Option<String>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            query: QueryConfig {
                database: "analytics".to_string(),
                output_location: "s3://querydesk-athena-results/query-results/".to_string(),
                workgroup: None,
                region: "us-west-2".to_string(),
                endpoint: None,
                timeout_secs: 30,
            },
            aws: AwsConfig { access_key_id: None, secret_access_key: None, session_token: None },
            agent: AgentConfig {
                model_id: "us.anthropic.claude-sonnet-4-20250514-v1:0".to_string(),
                max_tokens: 4096,
                temperature: 0.1,
                top_p: 0.95,
                max_iterations: 10,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl QueryConfig {
    /// Engine endpoint, defaulting to the regional Athena endpoint.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://athena.{}.amazonaws.com", self.region),
        }
    }
}

impl AwsConfig {
    pub fn has_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("querydesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn engine_access(&self) -> EngineAccess {
        match (self.aws.has_credentials(), self.query.endpoint.is_some()) {
            (true, _) => EngineAccess::Signed,
            (false, true) => EngineAccess::UnsignedOverride,
            (false, false) => EngineAccess::Unconfigured,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(query) = patch.query {
            if let Some(database) = query.database {
                self.query.database = database;
            }
            if let Some(output_location) = query.output_location {
                self.query.output_location = output_location;
            }
            if let Some(workgroup) = query.workgroup {
                self.query.workgroup = Some(workgroup);
            }
            if let Some(region) = query.region {
                self.query.region = region;
            }
            if let Some(endpoint) = query.endpoint {
                self.query.endpoint = Some(endpoint);
            }
            if let Some(timeout_secs) = query.timeout_secs {
                self.query.timeout_secs = timeout_secs;
            }
        }

        if let Some(aws) = patch.aws {
            if let Some(access_key_id) = aws.access_key_id {
                self.aws.access_key_id = Some(access_key_id);
            }
            if let Some(secret_access_key) = aws.secret_access_key {
                self.aws.secret_access_key = Some(secret_value(secret_access_key));
            }
            if let Some(session_token) = aws.session_token {
                self.aws.session_token = Some(secret_value(session_token));
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(model_id) = agent.model_id {
                self.agent.model_id = model_id;
            }
            if let Some(max_tokens) = agent.max_tokens {
                self.agent.max_tokens = max_tokens;
            }
            if let Some(temperature) = agent.temperature {
                self.agent.temperature = temperature;
            }
            if let Some(top_p) = agent.top_p {
                self.agent.top_p = top_p;
            }
            if let Some(max_iterations) = agent.max_iterations {
                self.agent.max_iterations = max_iterations;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("QUERYDESK_QUERY_DATABASE") {
            self.query.database = value;
        }
        if let Some(value) = read_env("QUERYDESK_QUERY_OUTPUT_LOCATION") {
            self.query.output_location = value;
        }
        if let Some(value) = read_env("QUERYDESK_QUERY_WORKGROUP") {
            self.query.workgroup = Some(value);
        }
        let region = read_env("QUERYDESK_QUERY_REGION").or_else(|| read_env("AWS_REGION"));
        if let Some(value) = region {
            self.query.region = value;
        }
        if let Some(value) = read_env("QUERYDESK_QUERY_ENDPOINT") {
            self.query.endpoint = Some(value);
        }
        if let Some(value) = read_env("QUERYDESK_QUERY_TIMEOUT_SECS") {
            self.query.timeout_secs = parse_u64("QUERYDESK_QUERY_TIMEOUT_SECS", &value)?;
        }

        let access_key_id =
            read_env("QUERYDESK_AWS_ACCESS_KEY_ID").or_else(|| read_env("AWS_ACCESS_KEY_ID"));
        if let Some(value) = access_key_id {
            self.aws.access_key_id = Some(value);
        }
        let secret_access_key = read_env("QUERYDESK_AWS_SECRET_ACCESS_KEY")
            .or_else(|| read_env("AWS_SECRET_ACCESS_KEY"));
        if let Some(value) = secret_access_key {
            self.aws.secret_access_key = Some(secret_value(value));
        }
        let session_token =
            read_env("QUERYDESK_AWS_SESSION_TOKEN").or_else(|| read_env("AWS_SESSION_TOKEN"));
        if let Some(value) = session_token {
            self.aws.session_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("QUERYDESK_AGENT_MODEL_ID") {
            self.agent.model_id = value;
        }
        if let Some(value) = read_env("QUERYDESK_AGENT_MAX_TOKENS") {
            self.agent.max_tokens = parse_u32("QUERYDESK_AGENT_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("QUERYDESK_AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_u32("QUERYDESK_AGENT_MAX_ITERATIONS", &value)?;
        }

        if let Some(value) = read_env("QUERYDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("QUERYDESK_SERVER_PORT") {
            self.server.port = parse_u16("QUERYDESK_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("QUERYDESK_LOGGING_LEVEL").or_else(|| read_env("QUERYDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("QUERYDESK_LOGGING_FORMAT").or_else(|| read_env("QUERYDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database) = overrides.query_database {
            self.query.database = database;
        }
        if let Some(output_location) = overrides.query_output_location {
            self.query.output_location = output_location;
        }
        if let Some(region) = overrides.query_region {
            self.query.region = region;
        }
        if let Some(endpoint) = overrides.query_endpoint {
            self.query.endpoint = Some(endpoint);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_query(&self.query)?;
        validate_aws(&self.aws)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("querydesk.toml"), PathBuf::from("config/querydesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_query(query: &QueryConfig) -> Result<(), ConfigError> {
    if query.database.trim().is_empty() {
        return Err(ConfigError::Validation("query.database is required".to_string()));
    }

    if !query.output_location.starts_with("s3://") {
        return Err(ConfigError::Validation(
            "query.output_location must be an s3:// URI where the engine writes result files"
                .to_string(),
        ));
    }

    if query.region.trim().is_empty() {
        return Err(ConfigError::Validation("query.region is required".to_string()));
    }

    if let Some(endpoint) = &query.endpoint {
        if !is_http_url(endpoint) {
            return Err(ConfigError::Validation(
                "query.endpoint must start with http:// or https://".to_string(),
            ));
        }
    }

    if query.timeout_secs == 0 || query.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "query.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_aws(aws: &AwsConfig) -> Result<(), ConfigError> {
    let has_secret = aws
        .secret_access_key
        .as_ref()
        .map(|value| !value.expose_secret().trim().is_empty())
        .unwrap_or(false);

    match (&aws.access_key_id, has_secret) {
        (Some(_), false) => Err(ConfigError::Validation(
            "aws.secret_access_key is required when aws.access_key_id is set".to_string(),
        )),
        (None, true) => Err(ConfigError::Validation(
            "aws.access_key_id is required when aws.secret_access_key is set".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.model_id.trim().is_empty() {
        return Err(ConfigError::Validation("agent.model_id is required".to_string()));
    }

    if agent.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "agent.max_tokens must be greater than zero".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&agent.temperature) {
        return Err(ConfigError::Validation(
            "agent.temperature must be in range 0.0..=1.0".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&agent.top_p) {
        return Err(ConfigError::Validation("agent.top_p must be in range 0.0..=1.0".to_string()));
    }

    if agent.max_iterations == 0 {
        return Err(ConfigError::Validation(
            "agent.max_iterations must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    query: Option<QueryPatch>,
    aws: Option<AwsPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryPatch {
    database: Option<String>,
    output_location: Option<String>,
    workgroup: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AwsPatch {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    model_id: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_iterations: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
