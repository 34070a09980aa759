//! Application configuration loaded from an INI file and environment variables.
//!
//! Keys live in the `[DEFAULT]` section of the file named by `RPCHARBOT_CONF`
//! (default `config.ini`). Variables like `RPCHARBOT_DEFAULT__BOTAUTHCODE`
//! override file values.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::locale::Locale;

/// Environment variable naming the configuration file.
pub const CONFIG_FILE_ENV: &str = "RPCHARBOT_CONF";

const ENV_PREFIX: &str = "RPCHARBOT";
const SECTION: &str = "default";

/// Bot configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Username of the bot on Kik
    #[serde(rename = "botusername", default = "default_bot_username")]
    pub bot_username: String,

    /// API key of the bot, also the webhook signing secret
    #[serde(rename = "botauthcode", default = "default_auth_code")]
    pub bot_auth_code: SecretString,

    /// Public host, used for webhook and picture URLs
    #[serde(rename = "remotehostip", default = "default_remote_host")]
    pub remote_host_ip: String,

    #[serde(rename = "remoteport", default = "default_remote_port")]
    pub remote_port: String,

    #[serde(rename = "picturepath", default = "default_picture_path")]
    pub picture_path: String,

    #[serde(rename = "databasepath", default = "default_database_path")]
    pub database_path: String,

    /// Comma-separated admin user ids
    #[serde(rename = "admins", default = "default_admins")]
    pub admins: String,

    /// Display id of the group
    #[serde(rename = "kikgroup", default = "default_kik_group")]
    pub kik_group: String,

    /// Chat id of the group; members writing there count as authed
    #[serde(rename = "kikgroupchatid", default)]
    pub kik_group_chat_id: String,

    #[serde(rename = "logrequests", default)]
    pub log_requests: bool,

    /// Bind address
    #[serde(rename = "localip", default = "default_local_ip")]
    pub local_ip: String,

    #[serde(rename = "localport", default = "default_local_port")]
    pub local_port: u16,

    #[serde(rename = "kikapiurl", default = "default_kik_api_url")]
    pub kik_api_url: String,

    #[serde(rename = "locale", default)]
    pub locale: Locale,

    #[serde(rename = "loglevel", default = "default_log_level")]
    pub log_level: String,

    #[serde(rename = "sourcecodeurl", default)]
    pub source_code_url: Option<String>,

    #[serde(rename = "ratelimitperminute", default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_username: default_bot_username(),
            bot_auth_code: default_auth_code(),
            remote_host_ip: default_remote_host(),
            remote_port: default_remote_port(),
            picture_path: default_picture_path(),
            database_path: default_database_path(),
            admins: default_admins(),
            kik_group: default_kik_group(),
            kik_group_chat_id: String::new(),
            log_requests: false,
            local_ip: default_local_ip(),
            local_port: default_local_port(),
            kik_api_url: default_kik_api_url(),
            locale: Locale::default(),
            log_level: default_log_level(),
            source_code_url: None,
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

// Default value functions
fn default_bot_username() -> String {
    "rpcharbot".into()
}

fn default_auth_code() -> SecretString {
    SecretString::new(String::new())
}

fn default_remote_host() -> String {
    "www.example.com".into()
}

fn default_remote_port() -> String {
    "8080".into()
}

fn default_picture_path() -> String {
    "{home}/pictures".into()
}

fn default_database_path() -> String {
    "{home}/database.db".into()
}

fn default_admins() -> String {
    "admin1".into()
}

fn default_kik_group() -> String {
    "somegroup".into()
}

fn default_local_ip() -> String {
    "0.0.0.0".into()
}

fn default_local_port() -> u16 {
    8080
}

fn default_kik_api_url() -> String {
    kik_client::DEFAULT_API_URL.into()
}

fn default_log_level() -> String {
    "info".into()
}

/// Webhook batches per minute unless `RateLimitPerMinute` says otherwise.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 600;

fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT_PER_MINUTE
}

impl Config {
    /// Load configuration from the INI file and the environment.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let path = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| "config.ini".into());
        Self::load_from(&path)
    }

    /// Load configuration from `path`, still honouring environment overrides.
    pub fn load_from(path: &str) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Ini).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {path}"))?;

        let root: HashMap<String, config::Value> = raw
            .try_deserialize()
            .context("Failed to read configuration sections")?;

        let mut builder = config::Config::builder();
        for (key, value) in fold_section(root)? {
            builder = builder
                .set_override(key.as_str(), value)
                .context("Invalid configuration key")?;
        }

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Admin user ids, lowercased.
    pub fn admin_list(&self) -> Vec<String> {
        self.admins
            .split(',')
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// The admin users are pointed to, e.g. to approve pictures.
    pub fn first_admin(&self) -> String {
        self.admin_list()
            .into_iter()
            .next()
            .unwrap_or_else(default_admins)
    }

    pub fn is_admin_id(&self, user_id: &str) -> bool {
        let user_id = user_id.to_lowercase();
        self.admin_list().iter().any(|a| *a == user_id)
    }

    pub fn picture_dir(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.picture_path))
    }

    pub fn database_file(&self) -> String {
        expand_home(&self.database_path)
    }

    /// Public URL of an uploaded picture.
    pub fn picture_url(&self, filename: &str) -> String {
        format!(
            "{}:{}/picture/{}",
            self.remote_host_ip.trim_end_matches('/'),
            self.remote_port,
            filename
        )
    }

    pub fn webhook_url(&self) -> String {
        format!(
            "{}:{}/incoming",
            self.remote_host_ip.trim_end_matches('/'),
            self.remote_port
        )
    }
}

/// Flatten the `[DEFAULT]` section into lowercase keys.
///
/// File keys may keep their case while environment keys arrive lowercased;
/// the lowercase spelling wins so environment overrides take effect.
fn fold_section(root: HashMap<String, config::Value>) -> Result<HashMap<String, String>> {
    let mut folded: HashMap<String, (bool, String)> = HashMap::new();

    for (section, value) in root {
        if !section.eq_ignore_ascii_case(SECTION) {
            continue;
        }
        let table = value
            .into_table()
            .context("The [DEFAULT] section must be a table")?;

        for (key, value) in table {
            let lowercase = key.to_lowercase();
            let exact = lowercase == key;
            let value = value
                .into_string()
                .with_context(|| format!("Invalid value for {key}"))?;

            match folded.get(&lowercase) {
                Some((true, _)) if !exact => {}
                _ => {
                    folded.insert(lowercase, (exact, value));
                }
            }
        }
    }

    Ok(folded.into_iter().map(|(k, (_, v))| (k, v)).collect())
}

/// Replace `{home}` with the current user's home directory.
pub fn expand_home(path: &str) -> String {
    if !path.contains("{home}") {
        return path.to_string();
    }
    let home = dirs::home_dir()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".into());
    path.replace("{home}", &home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn test_load_ini_file() {
        let mut file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        writeln!(
            file,
            "[DEFAULT]\nBotUsername = steckbot\nBotAuthCode = s3cret\nAdmins = Alice, bob\n\
             KikGroup = rpg\nLogRequests = true\nLocalPort = 9000\nLocale = en"
        )
        .unwrap();

        let config = Config::load_from(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.bot_username, "steckbot");
        assert_eq!(config.bot_auth_code.expose_secret(), "s3cret");
        assert_eq!(config.admin_list(), vec!["alice", "bob"]);
        assert_eq!(config.first_admin(), "alice");
        assert!(config.is_admin_id("ALICE"));
        assert!(config.log_requests);
        assert_eq!(config.local_port, 9000);
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.rate_limit_per_minute, 600);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_from("/nonexistent/rpchar.ini").unwrap();
        assert_eq!(config.kik_group, "somegroup");
        assert_eq!(config.local_ip, "0.0.0.0");
        assert_eq!(config.locale, Locale::De);
        assert!(!config.log_requests);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/var/db.sqlite"), "/var/db.sqlite");
        let expanded = expand_home("{home}/pictures");
        assert!(expanded.ends_with("/pictures"));
        assert!(!expanded.contains("{home}"));
    }

    #[test]
    fn test_picture_url() {
        let config = Config {
            remote_host_ip: "https://bot.example.com".into(),
            remote_port: "443".into(),
            ..Config::default()
        };
        assert_eq!(
            config.picture_url("alice-alice-1-1500000000.jpg"),
            "https://bot.example.com:443/picture/alice-alice-1-1500000000.jpg"
        );
    }
}
