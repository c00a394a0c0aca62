use anyhow::{Context, Result};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_CONFIG_PATH: &str = ".env";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_URL: &str = "https://api.sansekai.my.id/api/melolo";
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;
pub const DEFAULT_STREAM_CACHE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Deployment flavour. Cache administration endpoints and error traces are
/// only exposed in development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw values found in an env file; everything is optional.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub api_url: Option<String>,
    pub environment: Option<Environment>,
    pub public_dir: Option<PathBuf>,
    pub cache_ttl_secs: Option<u64>,
    pub stream_cache_ttl_secs: Option<u64>,
    pub upstream_timeout_secs: Option<u64>,
}

/// Fully resolved runtime settings handed to the server.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub api_url: String,
    pub environment: Environment,
    pub public_dir: PathBuf,
    pub cache_ttl: Duration,
    pub stream_cache_ttl: Duration,
    pub upstream_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_url: DEFAULT_API_URL.to_string(),
            environment: Environment::default(),
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            stream_cache_ttl: Duration::from_secs(DEFAULT_STREAM_CACHE_TTL_SECS),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Applies the values of an env file on top of the current settings.
    pub fn apply(&mut self, cfg: &EnvConfig) {
        if let Some(host) = &cfg.host {
            self.host = host.clone();
        }
        if let Some(port) = cfg.port {
            self.port = port;
        }
        if let Some(api_url) = &cfg.api_url {
            self.api_url = api_url.trim_end_matches('/').to_string();
        }
        if let Some(environment) = cfg.environment {
            self.environment = environment;
        }
        if let Some(public_dir) = &cfg.public_dir {
            self.public_dir = public_dir.clone();
        }
        if let Some(secs) = cfg.cache_ttl_secs {
            self.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = cfg.stream_cache_ttl_secs {
            self.stream_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = cfg.upstream_timeout_secs {
            self.upstream_timeout = Duration::from_secs(secs);
        }
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"').trim_matches('\'');
            apply_pair(&mut cfg, key.trim(), value)
                .with_context(|| format!("Parsing {} from {}", key.trim(), path.display()))?;
        }
    }
    Ok(Some(cfg))
}

/// Collects overrides from the process environment through `lookup`, so
/// callers can pass `std::env::var` or a fixed map in tests.
pub fn env_overrides<F>(lookup: F) -> Result<EnvConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = EnvConfig::default();
    for key in KNOWN_KEYS {
        if let Some(value) = lookup(key) {
            apply_pair(&mut cfg, key, value.trim())
                .with_context(|| format!("Parsing {key} from the environment"))?;
        }
    }
    Ok(cfg)
}

const KNOWN_KEYS: [&str; 8] = [
    "HOST",
    "PORT",
    "API_URL",
    "APP_ENV",
    "PUBLIC_DIR",
    "CACHE_TTL_SECS",
    "STREAM_CACHE_TTL_SECS",
    "UPSTREAM_TIMEOUT_SECS",
];

fn apply_pair(cfg: &mut EnvConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "HOST" => {
            if !value.is_empty() {
                cfg.host = Some(value.to_string());
            }
        }
        "PORT" => cfg.port = Some(value.parse().context("PORT must be a valid port number")?),
        "API_URL" => {
            if !value.is_empty() {
                cfg.api_url = Some(value.to_string());
            }
        }
        "APP_ENV" => cfg.environment = Some(Environment::parse(value)),
        "PUBLIC_DIR" => {
            if !value.is_empty() {
                cfg.public_dir = Some(PathBuf::from(value));
            }
        }
        "CACHE_TTL_SECS" => cfg.cache_ttl_secs = Some(parse_secs(value)?),
        "STREAM_CACHE_TTL_SECS" => cfg.stream_cache_ttl_secs = Some(parse_secs(value)?),
        "UPSTREAM_TIMEOUT_SECS" => cfg.upstream_timeout_secs = Some(parse_secs(value)?),
        _ => {}
    }
    Ok(())
}

fn parse_secs(value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .with_context(|| format!("expected a number of seconds, got {value:?}"))
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(Path::new(DEFAULT_CONFIG_PATH), |key| std::env::var(key).ok())
}

/// Defaults, then the env file (if present), then the environment.
pub fn load_settings_from<F>(path: impl AsRef<Path>, lookup: F) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let path = path.as_ref();
    let mut settings = Settings::default();
    if let Some(file_cfg) = read_env_config(path)? {
        settings.apply(&file_cfg);
    }
    settings.apply(&env_overrides(lookup)?);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn read_env_config_extracts_port() {
        let cfg = make_config("PORT=\"4242\"\nAPI_URL=\"https://up.example/api\"\n");
        let parsed = read_env_config(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.port, Some(4242));
        assert_eq!(parsed.api_url.as_deref(), Some("https://up.example/api"));
    }

    #[test]
    fn read_env_config_skips_comments_and_exports() {
        let cfg = make_config("# comment\n\nexport APP_ENV=production\nUNRELATED=1\n");
        let parsed = read_env_config(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.environment, Some(Environment::Production));
        assert!(parsed.port.is_none());
    }

    #[test]
    fn read_env_config_rejects_bad_port() {
        let cfg = make_config("PORT=abc\n");
        assert!(read_env_config(cfg.path()).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = load_settings_from("/definitely/not/here/.env", no_env).unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.host, DEFAULT_HOST);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert!(settings.is_development());
        assert_eq!(settings.cache_ttl, Duration::from_secs(300));
        assert_eq!(settings.stream_cache_ttl, Duration::from_secs(1800));
        assert_eq!(settings.upstream_timeout, Duration::from_secs(10));
    }

    #[test]
    fn environment_overrides_file_values() {
        let cfg = make_config("PORT=4000\nCACHE_TTL_SECS=60\nAPI_URL=https://a.example/\n");
        let env: HashMap<&str, &str> = HashMap::from([("PORT", "5000"), ("APP_ENV", "production")]);
        let settings =
            load_settings_from(cfg.path(), |key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(settings.port, 5000);
        assert_eq!(settings.cache_ttl, Duration::from_secs(60));
        assert_eq!(settings.api_url, "https://a.example");
        assert_eq!(settings.environment, Environment::Production);
    }

    #[test]
    fn unknown_environment_means_development() {
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(" Production "), Environment::Production);
    }
}
