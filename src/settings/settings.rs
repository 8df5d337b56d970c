use anyhow::{Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub log: Log,
    #[serde(default)]
    pub rate_limit: RateLimit,
    #[serde(default)]
    pub realtime: Realtime,
    pub revocation: Revocation,
    pub storage: Storage,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub signing_key: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_hasher")]
    pub hasher: String, // "argon2" or "fake"
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct RateLimit {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Realtime {
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Revocation {
    pub backend: String, // "storage" or "redis"
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    pub redis_url: Option<String>,
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory" or "mysql"
    pub mysql_url: Option<String>,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for Realtime {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

fn default_access_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_hasher() -> String {
    "argon2".to_string()
}

fn default_capacity() -> usize {
    100
}

fn default_window_secs() -> u64 {
    60
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_redis_prefix() -> String {
    "revoked".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "FASTTRACK";
const SIGNING_KEY_ENV: &str = "JWT_SIGNING_KEY";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);
    build(Config::builder().add_source(File::with_name(path)))
}

/// Same layering as [`parse_settings`], from an inline TOML document.
pub fn parse_settings_str(toml: &str) -> Result<Settings> {
    build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
}

fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Settings> {
    let mut settings: Settings = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    if let Ok(key) = std::env::var(SIGNING_KEY_ENV) {
        settings.auth.signing_key = key;
    }
    if settings.auth.signing_key.is_empty() {
        return Err(anyhow!("auth.signing_key must not be empty"));
    }
    ensure_positive(&settings)?;

    Ok(settings)
}

// zero periods panic in `tokio::time::interval`, a zero ceiling or window disables limiting
fn ensure_positive(settings: &Settings) -> Result<()> {
    let checks = [
        ("auth.access_ttl_secs", settings.auth.access_ttl_secs),
        ("auth.refresh_ttl_secs", settings.auth.refresh_ttl_secs),
        ("rate_limit.capacity", settings.rate_limit.capacity as u64),
        ("rate_limit.window_secs", settings.rate_limit.window_secs),
        ("realtime.ping_interval_secs", settings.realtime.ping_interval_secs),
        ("revocation.sweep_interval_secs", settings.revocation.sweep_interval_secs),
    ];
    match checks.iter().find(|(_, value)| *value == 0) {
        Some((key, _)) => Err(anyhow!("{key} must be greater than zero")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[auth]
issuer = "fasttrack.test"
audience = "fasttrack-client"
signing_key = "inline"

[http]
address = "127.0.0.1:8080"

[log]
filter = "info"

[revocation]
backend = "storage"

[storage]
backend = "memory"
"#;

    #[test]
    fn defaults_fill_omitted_keys() {
        let settings = parse_settings_str(MINIMAL).unwrap();
        assert_eq!(settings.auth.access_ttl_secs, 900);
        assert_eq!(settings.auth.refresh_ttl_secs, 604_800);
        assert_eq!(settings.auth.hasher, "argon2");
        assert_eq!(settings.rate_limit.capacity, 100);
        assert_eq!(settings.rate_limit.window_secs, 60);
        assert_eq!(settings.realtime.ping_interval_secs, 30);
        assert!(settings.http.cert_path.is_none());
    }

    #[test]
    fn empty_signing_key_is_rejected() {
        let toml = MINIMAL.replace(r#"signing_key = "inline""#, r#"signing_key = """#);
        if std::env::var(SIGNING_KEY_ENV).is_err() {
            assert!(parse_settings_str(&toml).is_err());
        }
    }

    #[test]
    fn zero_periods_and_limits_are_rejected() {
        let cases = [
            ("rate_limit", "capacity = 0"),
            ("rate_limit", "window_secs = 0"),
            ("realtime", "ping_interval_secs = 0"),
            ("revocation", "sweep_interval_secs = 0"),
        ];
        for (section, line) in cases {
            let header = format!("[{section}]\n");
            let toml = if MINIMAL.contains(&header) {
                MINIMAL.replace(&header, &format!("{header}{line}\n"))
            } else {
                format!("{MINIMAL}\n{header}{line}\n")
            };
            let error = parse_settings_str(&toml).unwrap_err();
            let key = line.split(' ').next().unwrap();
            assert!(error.to_string().contains(key), "{line}: {error}");
        }

        let toml = MINIMAL.replace("[auth]\n", "[auth]\naccess_ttl_secs = 0\n");
        assert!(parse_settings_str(&toml).is_err());
    }
}
