use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::fs_utils::write_atomic;

/// Setting names as they appear in the config file.
pub mod keys {
    pub const ACCESS_KEY_ID: &str = "AccessKey_ID";
    pub const ACCESS_KEY_SECRET: &str = "AccessKey_Secret";
    pub const USER_ID: &str = "User_ID";
    pub const ENDPOINT: &str = "Endpoint";
    pub const DOMAIN: &str = "Domain";
    pub const RECORD: &str = "Record";
    pub const RECORD_VALUE: &str = "Record_Value";
    pub const KEY_PATH: &str = "Key_Path";
    pub const CERT_ID: &str = "Cert_Id";
    pub const FC_UPDATE: &str = "FC-Update";
    pub const SSL_ENDPOINT: &str = "SSL_Endpoint";
    pub const FC_ENDPOINT: &str = "FC_Endpoint";
    pub const CERTBOT_PATH: &str = "Certbot_Path";
    pub const ACME_SERVER: &str = "Acme_Server";
    pub const ACME_EMAIL: &str = "Acme_Email";
    pub const CERTBOT_TIMEOUT_SECS: &str = "Certbot_Timeout_Secs";
    pub const RENEW_BEFORE_DAYS: &str = "Renew_Before_Days";
}

pub const DEFAULT_RECORD: &str = "_acme-challenge";
pub const DEFAULT_SSL_ENDPOINT: &str = "cas.aliyuncs.com";
pub const DEFAULT_REGION: &str = "cn-hangzhou";
pub const DEFAULT_ACME_SERVER: &str = "https://acme-v02.api.letsencrypt.org/directory";
pub const DEFAULT_CERTBOT_TIMEOUT_SECS: u64 = 600;
pub const MAX_RENEW_BEFORE_DAYS: i64 = 3650;

/// Written on first run so the operator has every key to fill in.
pub const TEMPLATE: &str = "AccessKey_ID=
AccessKey_Secret=
User_ID=

Endpoint=
Domain=
Record=
Record_Value=

Key_Path=
Cert_Id=

FC-Update=0

# Endpoint: see https://api.aliyun.com/product/Alidns
";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Raw key/value pairs read from the config file.
///
/// Values are kept in this map and never exported into the process environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    /// Parse a `.env` style file.
    ///
    /// Hyphens in key names are treated as underscores, so `FC-Update` and
    /// `FC_Update` name the same setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains a malformed line.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let normalized = content
            .lines()
            .map(normalize_line_key)
            .collect::<Vec<_>>()
            .join("\n");

        let mut values = HashMap::new();
        for item in dotenvy::from_read_iter(normalized.as_bytes()) {
            let (key, value) = item.map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            values.insert(key, value);
        }

        debug!(path = %path.display(), keys = values.len(), "Read config file");
        Ok(Self { values })
    }

    #[must_use]
    pub fn from_pairs<K: AsRef<str>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let mut settings = Self::default();
        for (key, value) in pairs {
            settings.insert(key.as_ref(), value);
        }
        settings
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.values
            .get(&normalize_key(name))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parse_u64(&self, name: &str, default: u64) -> Result<u64, ConfigError> {
        match self.optional(name) {
            Some(val) => val.parse().map_err(|e| ConfigError::ParseInt {
                name: name.to_string(),
                source: e,
            }),
            None => Ok(default),
        }
    }

    fn parse_flag(&self, name: &str) -> Result<bool, ConfigError> {
        let value = self.required(name)?;
        match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: format!("expected 0 or 1, got '{value}'"),
            }),
        }
    }
}

/// Alibaba Cloud access key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// What the DNS-01 hook needs: enough to find and write the TXT record.
#[derive(Debug, Clone)]
pub struct DnsSettings {
    pub credentials: Credentials,
    /// Alidns endpoint, e.g. `alidns.cn-hangzhou.aliyuncs.com`.
    pub endpoint: String,
    /// Zone the wildcard certificate is issued for.
    pub domain: String,
    /// Host part of the TXT record, usually `_acme-challenge`.
    pub record: String,
}

impl DnsSettings {
    /// Load only the DNS subset of the config file.
    ///
    /// `Record` falls back to `_acme-challenge`, so the hook works before the
    /// rest of the file has been filled in.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or a DNS setting is missing.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_settings(&Settings::read(path)?)
    }

    /// # Errors
    ///
    /// Returns an error if a DNS setting is missing.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            credentials: Credentials {
                access_key_id: settings.required(keys::ACCESS_KEY_ID)?,
                access_key_secret: settings.required(keys::ACCESS_KEY_SECRET)?,
            },
            endpoint: settings.required(keys::ENDPOINT)?,
            domain: settings.required(keys::DOMAIN)?,
            record: settings.or_default(keys::RECORD, DEFAULT_RECORD),
        })
    }
}

/// How certbot is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmeSettings {
    pub certbot_path: String,
    pub server: String,
    pub email: String,
    pub timeout: Duration,
}

/// Complete configuration for one renewal run. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct RenewalConfig {
    pub dns: DnsSettings,
    /// Alibaba Cloud account id, used for Function Compute.
    pub account_id: String,
    /// Directory holding `fullchain.pem` and `privkey.pem`.
    pub key_path: PathBuf,
    /// Identifier of the certificate currently in the SSL store, if any.
    pub cert_id: Option<String>,
    /// Whether Function Compute custom domains get the new certificate.
    pub fc_update: bool,
    pub ssl_endpoint: String,
    pub fc_endpoint: String,
    pub acme: AcmeSettings,
    /// Renew this long before the recorded expiry.
    pub renew_before: chrono::Duration,
}

impl RenewalConfig {
    /// Load and validate the full configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, a required key is missing,
    /// or a value is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::from_settings(&Settings::read(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration from already parsed settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is missing or cannot be parsed.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let dns = DnsSettings {
            credentials: Credentials {
                access_key_id: settings.required(keys::ACCESS_KEY_ID)?,
                access_key_secret: settings.required(keys::ACCESS_KEY_SECRET)?,
            },
            endpoint: settings.required(keys::ENDPOINT)?,
            domain: settings.required(keys::DOMAIN)?,
            record: settings.required(keys::RECORD)?,
        };
        let account_id = settings.required(keys::USER_ID)?;
        let key_path = PathBuf::from(settings.required(keys::KEY_PATH)?);
        let fc_update = settings.parse_flag(keys::FC_UPDATE)?;

        let fc_endpoint = settings.optional(keys::FC_ENDPOINT).unwrap_or_else(|| {
            let region = region_from_endpoint(&dns.endpoint)
                .unwrap_or_else(|| DEFAULT_REGION.to_string());
            format!("{account_id}.{region}.fc.aliyuncs.com")
        });

        let acme = AcmeSettings {
            certbot_path: settings.or_default(keys::CERTBOT_PATH, "certbot"),
            server: settings.or_default(keys::ACME_SERVER, DEFAULT_ACME_SERVER),
            email: settings
                .optional(keys::ACME_EMAIL)
                .unwrap_or_else(|| format!("admin@{}", dns.domain)),
            timeout: Duration::from_secs(
                settings.parse_u64(keys::CERTBOT_TIMEOUT_SECS, DEFAULT_CERTBOT_TIMEOUT_SECS)?,
            ),
        };

        let renew_before_days = settings.parse_u64(keys::RENEW_BEFORE_DAYS, 0)?;
        let renew_before = i64::try_from(renew_before_days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .ok_or_else(|| ConfigError::InvalidValue {
                name: keys::RENEW_BEFORE_DAYS.to_string(),
                message: format!("{renew_before_days} days is out of range"),
            })?;

        Ok(Self {
            dns,
            account_id,
            key_path,
            cert_id: settings.optional(keys::CERT_ID),
            fc_update,
            ssl_endpoint: settings.or_default(keys::SSL_ENDPOINT, DEFAULT_SSL_ENDPOINT),
            fc_endpoint,
            acme,
            renew_before,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dns.domain.starts_with("*.") {
            return Err(ConfigError::InvalidValue {
                name: keys::DOMAIN.to_string(),
                message: "give the bare domain, the wildcard is added automatically".to_string(),
            });
        }
        if self.dns.domain.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                name: keys::DOMAIN.to_string(),
                message: "cannot contain whitespace".to_string(),
            });
        }
        if self.acme.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: keys::CERTBOT_TIMEOUT_SECS.to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.renew_before > chrono::Duration::days(MAX_RENEW_BEFORE_DAYS) {
            return Err(ConfigError::InvalidValue {
                name: keys::RENEW_BEFORE_DAYS.to_string(),
                message: format!("must be at most {MAX_RENEW_BEFORE_DAYS}"),
            });
        }
        Ok(())
    }
}

/// Extract the region from an Alidns endpoint such as `alidns.cn-hangzhou.aliyuncs.com`.
#[must_use]
pub fn region_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint
        .split_once("://")
        .map_or(endpoint, |(_, rest)| rest)
        .split(['/', ':'])
        .next()?;
    let labels: Vec<&str> = host.split('.').collect();
    match labels.as_slice() {
        [_, region, "aliyuncs", "com"] => Some((*region).to_string()),
        _ => None,
    }
}

/// Outcome of checking for the config file at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPresence {
    Existing,
    TemplateCreated,
}

/// Create the template config file if none exists yet.
///
/// # Errors
///
/// Returns an error if the template cannot be written.
pub fn ensure_config_file(path: &Path) -> Result<ConfigPresence, ConfigError> {
    if path.exists() {
        return Ok(ConfigPresence::Existing);
    }

    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(TEMPLATE.as_bytes()).map_err(write_err)?;

    Ok(ConfigPresence::TemplateCreated)
}

/// Line-preserving editor for the config file.
///
/// Used to rewrite `Cert_Id` while keeping every other line, including the
/// operator's comments, exactly as it was.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl ConfigFile {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: content.lines().map(String::from).collect(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw value of `key`, without quote or variable processing.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            let (k, v) = split_assignment(line)?;
            (k == key).then(|| v.trim())
        })
    }

    /// Set `key` in place, or append it when absent. Duplicate entries collapse into one.
    pub fn set(&mut self, key: &str, value: &str) {
        let entry = format!("{key}={value}");
        match self.position(key) {
            Some(idx) => {
                self.lines[idx] = entry;
                let mut seen = 0;
                self.lines.retain(|line| {
                    if line_key(line) == Some(key) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.lines.push(entry),
        }
    }

    /// Drop every line assigning `key`.
    pub fn remove(&mut self, key: &str) {
        self.lines.retain(|line| line_key(line) != Some(key));
    }

    /// Write the whole file back atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be replaced.
    pub fn save(&self) -> Result<(), ConfigError> {
        let mut content = self.lines.join("\n");
        content.push('\n');
        write_atomic(&self.path, content.as_bytes()).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.lines.iter().position(|line| line_key(line) == Some(key))
    }
}

fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
}

fn normalize_line_key(line: &str) -> String {
    match line.split_once('=') {
        Some((key, value)) if !key.trim_start().starts_with('#') => {
            format!("{}={value}", normalize_key(key))
        }
        _ => line.to_string(),
    }
}

fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, value) = trimmed.split_once('=')?;
    Some((key.trim(), value))
}

fn line_key(line: &str) -> Option<&str> {
    split_assignment(line).map(|(k, _)| k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_settings() -> Settings {
        Settings::from_pairs([
            (keys::ACCESS_KEY_ID, "LTAIexample"),
            (keys::ACCESS_KEY_SECRET, "secret"),
            (keys::USER_ID, "1234567890"),
            (keys::ENDPOINT, "alidns.cn-shanghai.aliyuncs.com"),
            (keys::DOMAIN, "example.com"),
            (keys::RECORD, "_acme-challenge"),
            (keys::KEY_PATH, "/etc/letsencrypt/live/example.com"),
            (keys::CERT_ID, "14523"),
            (keys::FC_UPDATE, "1"),
        ])
    }

    #[test]
    fn test_from_settings_applies_defaults() {
        let config = RenewalConfig::from_settings(&complete_settings()).unwrap();
        assert_eq!(config.cert_id.as_deref(), Some("14523"));
        assert!(config.fc_update);
        assert_eq!(config.ssl_endpoint, DEFAULT_SSL_ENDPOINT);
        assert_eq!(config.fc_endpoint, "1234567890.cn-shanghai.fc.aliyuncs.com");
        assert_eq!(config.acme.email, "admin@example.com");
        assert_eq!(config.acme.server, DEFAULT_ACME_SERVER);
        assert_eq!(config.acme.timeout, Duration::from_secs(600));
        assert_eq!(config.renew_before, chrono::Duration::zero());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_required_key() {
        let mut settings = complete_settings();
        settings.insert(keys::KEY_PATH, "  ");
        let err = RenewalConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref k) if k == keys::KEY_PATH));
    }

    #[test]
    fn test_cert_id_is_optional() {
        let mut settings = complete_settings();
        settings.insert(keys::CERT_ID, "");
        let config = RenewalConfig::from_settings(&settings).unwrap();
        assert_eq!(config.cert_id, None);
    }

    #[test]
    fn test_fc_update_flag_must_be_boolean() {
        let mut settings = complete_settings();
        settings.insert(keys::FC_UPDATE, "maybe");
        assert!(matches!(
            RenewalConfig::from_settings(&settings),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_wildcard_domain_rejected() {
        let mut settings = complete_settings();
        settings.insert(keys::DOMAIN, "*.example.com");
        let config = RenewalConfig::from_settings(&settings).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_renew_before_days_is_bounded() {
        let mut settings = complete_settings();
        settings.insert(keys::RENEW_BEFORE_DAYS, "3650");
        RenewalConfig::from_settings(&settings).unwrap().validate().unwrap();

        settings.insert(keys::RENEW_BEFORE_DAYS, "100000000");
        let config = RenewalConfig::from_settings(&settings).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref name, .. }) if name == keys::RENEW_BEFORE_DAYS
        ));
    }

    #[test]
    fn test_dns_settings_default_record() {
        let mut settings = complete_settings();
        settings.insert(keys::RECORD, "");
        let dns = DnsSettings::from_settings(&settings).unwrap();
        assert_eq!(dns.record, DEFAULT_RECORD);
    }

    #[test]
    fn test_read_accepts_hyphenated_keys_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# note\nFC-Update=1\nDomain=\"example.com\"\nCert_Id=\n",
        )
        .unwrap();

        let settings = Settings::read(&path).unwrap();
        assert!(settings.parse_flag(keys::FC_UPDATE).unwrap());
        assert_eq!(settings.optional(keys::DOMAIN).as_deref(), Some("example.com"));
        assert_eq!(settings.optional(keys::CERT_ID), None);
    }

    #[test]
    fn test_region_from_endpoint() {
        assert_eq!(
            region_from_endpoint("alidns.cn-hangzhou.aliyuncs.com").as_deref(),
            Some("cn-hangzhou")
        );
        assert_eq!(
            region_from_endpoint("https://alidns.ap-southeast-1.aliyuncs.com/").as_deref(),
            Some("ap-southeast-1")
        );
        assert_eq!(region_from_endpoint("alidns.aliyuncs.com"), None);
        assert_eq!(region_from_endpoint("http://127.0.0.1:8080"), None);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials {
            access_key_id: "id".to_string(),
            access_key_secret: "hunter2".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_ensure_config_file_writes_template_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        assert_eq!(ensure_config_file(&path).unwrap(), ConfigPresence::TemplateCreated);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, TEMPLATE);

        std::fs::write(&path, "Domain=example.com\n").unwrap();
        assert_eq!(ensure_config_file(&path).unwrap(), ConfigPresence::Existing);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Domain=example.com\n");
    }

    #[test]
    fn test_template_fails_validation_until_filled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        ensure_config_file(&path).unwrap();
        assert!(matches!(
            RenewalConfig::load(&path),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_config_file_set_and_remove_preserve_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# credentials\nAccessKey_ID=abc\nCert_Id=111\n\nFC-Update=1\n",
        )
        .unwrap();

        let mut file = ConfigFile::open(&path).unwrap();
        file.remove(keys::CERT_ID);
        file.save().unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# credentials\nAccessKey_ID=abc\n\nFC-Update=1\n"
        );

        let mut file = ConfigFile::open(&path).unwrap();
        file.set(keys::CERT_ID, "222");
        file.save().unwrap();
        let reread = ConfigFile::open(&path).unwrap();
        assert_eq!(reread.get(keys::CERT_ID), Some("222"));
        assert_eq!(reread.get(keys::ACCESS_KEY_ID), Some("abc"));

        let settings = Settings::read(&path).unwrap();
        assert_eq!(settings.optional(keys::CERT_ID).as_deref(), Some("222"));
    }

    #[test]
    fn test_config_file_set_replaces_in_place_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "Cert_Id=1\nDomain=example.com\nCert_Id=2\n").unwrap();

        let mut file = ConfigFile::open(&path).unwrap();
        file.set(keys::CERT_ID, "3");
        file.save().unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Cert_Id=3\nDomain=example.com\n"
        );
    }

    #[test]
    fn test_commented_key_is_not_touched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "# Cert_Id=old\n").unwrap();

        let mut file = ConfigFile::open(&path).unwrap();
        assert_eq!(file.get(keys::CERT_ID), None);
        file.set(keys::CERT_ID, "9");
        file.save().unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# Cert_Id=old\nCert_Id=9\n"
        );
    }
}
