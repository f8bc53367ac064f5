// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use society_app::{ActorId, ActorProvider, DEFAULT_OVERLAY_MIN, DEFAULT_PAGE_SIZE};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const APP_NAME: &str = "society";
const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "warn";
pub const CONFIG_PATH_ENV: &str = "SOCIETY_CONFIG_PATH";
pub const ACTOR_ID_ENV: &str = "SOCIETY_ACTOR_ID";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub listing: Listing,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            session: Session::default(),
            listing: Listing::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    pub actor_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub page_size: Option<i64>,
    pub overlay_min: Option<String>,
}

impl Default for Listing {
    fn default() -> Self {
        Self {
            page_size: Some(i64::from(DEFAULT_PAGE_SIZE)),
            overlay_min: Some("300ms".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and keep values under [server], [session], [listing], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.server.base_url {
            let trimmed = base_url.trim();
            if trimmed.is_empty() {
                bail!("server.base_url in {} must not be empty", path.display());
            }
            society_api::parse_base_url(trimmed).with_context(|| {
                format!("server.base_url in {} is invalid", path.display())
            })?;
        }

        if let Some(timeout) = &self.server.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed.is_zero() {
                bail!(
                    "server.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(page_size) = self.listing.page_size
            && (page_size <= 0 || page_size > i64::from(u32::MAX))
        {
            bail!(
                "listing.page_size in {} must be positive, got {}",
                path.display(),
                page_size
            );
        }

        if let Some(overlay_min) = &self.listing.overlay_min {
            parse_duration(overlay_min).with_context(|| {
                format!("listing.overlay_min in {} is invalid", path.display())
            })?;
        }

        if let Some(level) = &self.log.level
            && level.trim().is_empty()
        {
            bail!("log.level in {} must not be empty", path.display());
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim()
            .trim_end_matches('/')
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.server.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn page_size(&self) -> u32 {
        self.listing
            .page_size
            .and_then(|size| u32::try_from(size).ok())
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn overlay_min(&self) -> Result<Duration> {
        match &self.listing.overlay_min {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_OVERLAY_MIN),
        }
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# society config\n# Place this file at: {}\n\nversion = 1\n\n[server]\nbase_url = \"{}\"\n# <N>ms, <N>s or <N>m\ntimeout = \"{}\"\n\n[session]\n# Optional. Writes go out as actor \"0\" when unset; {} overrides it.\n# actor_id = \"42\"\n\n[listing]\npage_size = {}\noverlay_min = \"300ms\"\n\n[log]\n# RUST_LOG takes precedence when set\nlevel = \"{}\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_TIMEOUT,
            ACTOR_ID_ENV,
            DEFAULT_PAGE_SIZE,
            DEFAULT_LOG_LEVEL,
        )
    }
}

/// The env var wins over `[session].actor_id`; blank values count as unset.
impl ActorProvider for Config {
    fn current_actor(&self) -> Option<ActorId> {
        env::var(ACTOR_ID_ENV)
            .ok()
            .or_else(|| self.session.actor_id.clone())
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| ActorId::new(raw.trim()))
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 300ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{ACTOR_ID_ENV, CONFIG_PATH_ENV, Config, parse_duration};
    use anyhow::Result;
    use society_app::ActorProvider;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.base_url(), "http://localhost:5000/api");
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        assert_eq!(config.page_size(), 25);
        assert_eq!(config.overlay_min()?, Duration::from_millis(300));
        assert_eq!(config.log_level(), "warn");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[server]\nbase_url=\"http://x\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[server], [session], [listing], and [log]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[server]\nbase_url=\"https://society.example/api/\"\ntimeout=\"2s\"\n[listing]\npage_size = 50\noverlay_min=\"150ms\"\n[log]\nlevel=\"debug\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "https://society.example/api");
        assert_eq!(config.timeout()?, Duration::from_secs(2));
        assert_eq!(config.page_size(), 50);
        assert_eq!(config.overlay_min()?, Duration::from_millis(150));
        assert_eq!(config.log_level(), "debug");
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 3\n")?;
        let error = Config::load(&path).expect_err("v3 config should fail");
        assert!(error.to_string().contains("unsupported config version 3"));
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() -> Result<()> {
        for (body, needle) in [
            ("version = 1\n[listing]\npage_size = 0\n", "listing.page_size"),
            ("version = 1\n[server]\ntimeout = \"0s\"\n", "server.timeout"),
            ("version = 1\n[server]\ntimeout = \"soon\"\n", "invalid duration"),
            ("version = 1\n[server]\nbase_url = \" \"\n", "must not be empty"),
            ("version = 1\n[server]\nbase_url = \"ftp://x\"\n", "server.base_url"),
            ("version = 1\n[server]\nbase_url = \"http://\"\n", "not a valid URL"),
            ("version = 1\n[server]\nbase_url = \"mailto:x@y\"\n", "server.base_url"),
        ] {
            let (_temp, path) = write_config(body)?;
            let error = Config::load(&path).expect_err("invalid config should fail");
            assert!(
                format!("{error:#}").contains(needle),
                "expected {needle:?} in {error:#}"
            );
        }
        Ok(())
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let (_temp, path) = write_config("")?;
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.page_size(), 25);
        Ok(())
    }

    #[test]
    fn actor_env_overrides_config() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n[session]\nactor_id = \"12\"\n")?;
        let config = Config::load(&path)?;

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var(ACTOR_ID_ENV);
        }
        assert_eq!(config.actor_or_anonymous().as_str(), "12");

        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(ACTOR_ID_ENV, "99");
        }
        let overridden = config.actor_or_anonymous();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(ACTOR_ID_ENV);
        }
        assert_eq!(overridden.as_str(), "99");

        assert!(Config::default().actor_or_anonymous().is_anonymous());
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn parse_duration_accepts_supported_units() -> Result<()> {
        assert_eq!(parse_duration("300ms")?, Duration::from_millis(300));
        assert_eq!(parse_duration("10s")?, Duration::from_secs(10));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("5h").is_err());
        Ok(())
    }
}
