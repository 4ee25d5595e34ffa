use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub backend: Backend,
    pub email: EmailSettings,
    pub http: Http,
    pub jwt: Jwt,
    pub log: Log,
    pub magic_link: MagicLink,
    pub mysql: Option<MySql>,
    pub redis: Option<Redis>,
    #[serde(default)]
    pub throttle: Throttle,
}

#[derive(Debug, Deserialize)]
pub struct Backend {
    pub store: String, // "redis" or "memory"
    pub users: String, // "mysql" or "memory"
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
pub struct Redis {
    pub url: String,
    #[serde(default)]
    pub key_prefix: String,
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct MySql {
    pub url: String,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub access_secret: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

#[derive(Deserialize)]
pub struct MagicLink {
    pub secret: String,
    #[serde(default = "default_magic_link_ttl_secs")]
    pub ttl_secs: u64,
    pub frontend_url: String,
    #[serde(default = "default_magic_link_send_limit")]
    pub send_limit: u64,
    #[serde(default = "default_magic_link_send_window_secs")]
    pub send_window_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Throttle {
    pub max_attempts: u64,
    pub window_secs: u64,
}

impl Default for Throttle {
    fn default() -> Self {
        Throttle {
            max_attempts: 5,
            window_secs: 900,
        }
    }
}

#[derive(Deserialize)]
pub struct EmailSettings {
    pub backend: String, // "fake" or "smtp"
    pub from: String,
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

// Secrets stay out of the startup log line.
impl std::fmt::Debug for Jwt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwt")
            .field("access_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

impl std::fmt::Debug for MagicLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagicLink")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .field("frontend_url", &self.frontend_url)
            .field("send_limit", &self.send_limit)
            .field("send_window_secs", &self.send_window_secs)
            .finish()
    }
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("backend", &self.backend)
            .field("from", &self.from)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .finish_non_exhaustive()
    }
}

fn default_op_timeout_ms() -> u64 {
    500
}

fn default_access_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_magic_link_ttl_secs() -> u64 {
    15 * 60
}

fn default_magic_link_send_limit() -> u64 {
    5
}

fn default_magic_link_send_window_secs() -> u64 {
    60 * 60
}

fn default_smtp_port() -> u16 {
    587
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.jwt.access_secret.is_empty() {
            bail!("jwt.access_secret must not be empty");
        }
        if self.magic_link.secret.is_empty() {
            bail!("magic_link.secret must not be empty");
        }
        if self.jwt.access_secret == self.magic_link.secret {
            bail!("jwt.access_secret and magic_link.secret must differ");
        }
        if self.jwt.access_ttl_secs == 0
            || self.jwt.refresh_ttl_secs == 0
            || self.magic_link.ttl_secs == 0
        {
            bail!("token lifetimes must be positive");
        }
        if self.throttle.max_attempts == 0 || self.throttle.window_secs == 0 {
            bail!("throttle.max_attempts and throttle.window_secs must be positive");
        }
        if self.magic_link.send_limit == 0 || self.magic_link.send_window_secs == 0 {
            bail!("magic_link.send_limit and magic_link.send_window_secs must be positive");
        }

        match self.backend.store.as_str() {
            "memory" => {}
            "redis" if self.redis.is_some() => {}
            "redis" => bail!("backend.store = \"redis\" requires a [redis] section"),
            other => bail!("unknown store backend: {other:?}"),
        }
        match self.backend.users.as_str() {
            "memory" => {}
            "mysql" if self.mysql.is_some() => {}
            "mysql" => bail!("backend.users = \"mysql\" requires a [mysql] section"),
            other => bail!("unknown users backend: {other:?}"),
        }
        match self.email.backend.as_str() {
            "fake" => {}
            "smtp" if self.email.smtp_host.is_some() => {}
            "smtp" => bail!("email.backend = \"smtp\" requires email.smtp_host"),
            other => bail!("unknown email backend: {other:?}"),
        }
        if self.http.cert_path.is_some() != self.http.key_path.is_some() {
            bail!("http.cert_path and http.key_path must be set together");
        }

        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Load the settings file, then apply `LATCHKEY__SECTION__KEY` environment
/// overrides, e.g. `LATCHKEY__JWT__ACCESS_SECRET`.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("LATCHKEY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const BASE: &str = r#"
[backend]
store = "memory"
users = "memory"

[email]
backend = "fake"
from = "Latchkey <noreply@localhost>"

[http]
address = "127.0.0.1:8080"

[log]
filter = "info"

[jwt]
access_secret = "access-secret"

[magic_link]
secret = "magic-secret"
frontend_url = "http://localhost:5173"
"#;

    fn load(toml: &str) -> Result<Settings> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn defaults_fill_in_lifetimes_and_throttle() {
        let settings = load(BASE).unwrap();
        assert_eq!(settings.jwt.access_ttl_secs, 900);
        assert_eq!(settings.jwt.refresh_ttl_secs, 604_800);
        assert_eq!(settings.magic_link.ttl_secs, 900);
        assert_eq!(settings.throttle.max_attempts, 5);
        assert_eq!(settings.throttle.window_secs, 900);
        assert_eq!(settings.magic_link.send_limit, 5);
        assert_eq!(settings.magic_link.send_window_secs, 3600);
    }

    #[test]
    fn zero_send_limit_is_rejected() {
        let toml = format!("{BASE}send_limit = 0\n");
        assert!(load(&toml).is_err());
    }

    #[test]
    fn shared_secret_is_rejected() {
        let toml = BASE.replace("magic-secret", "access-secret");
        assert!(load(&toml).is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let toml = BASE.replace("\"access-secret\"", "\"\"");
        assert!(load(&toml).is_err());
    }

    #[test]
    fn redis_backend_needs_its_section() {
        let toml = BASE.replace("store = \"memory\"", "store = \"redis\"");
        assert!(load(&toml).is_err());

        let toml = format!("{toml}\n[redis]\nurl = \"redis://127.0.0.1/\"\n");
        let settings = load(&toml).unwrap();
        assert_eq!(settings.redis.unwrap().op_timeout_ms, 500);
    }

    #[test]
    fn secrets_are_not_debug_printed() {
        let settings = load(BASE).unwrap();
        let printed = format!("{settings:?}");
        assert!(!printed.contains("access-secret"));
        assert!(!printed.contains("magic-secret"));
    }
}
