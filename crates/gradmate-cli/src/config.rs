//! Configuration file management for gradmate.
//!
//! Provides a TOML-based config file at `~/.config/gradmate/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use gradmate_core::generator::GeminiConfig;
use gradmate_core::generator::gemini::{API_KEY_ENV_VAR, DEFAULT_BASE_URL, DEFAULT_MODEL};
use gradmate_db::config::DbConfig;

/// Env var overriding `ai.model`.
pub const MODEL_ENV_VAR: &str = "GRADMATE_AI_MODEL";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request header carrying the authenticated user id.
    #[serde(default = "default_user_header")]
    pub user_header: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_ai_timeout_secs() -> u64 {
    30
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_user_header() -> String {
    "x-user-id".to_string()
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            user_header: default_user_header(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the gradmate config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/gradmate` or `~/.config/gradmate`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("gradmate");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("gradmate")
}

/// Return the path to the gradmate config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix since it may hold an API key.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct GradmateConfig {
    pub db_config: DbConfig,
    pub gemini: GeminiConfig,
    pub server: ServerSection,
}

impl GradmateConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `GRADMATE_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - API key: `GEMINI_API_KEY` > `ai.api_key` > none (AI features degrade)
    /// - Model: `GRADMATE_AI_MODEL` > `ai.model` > `gemini-1.5-flash`
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        let (ai, server) = match file_config {
            Some(cfg) => (cfg.ai, cfg.server),
            None => (AiSection::default(), ServerSection::default()),
        };

        let api_key = std::env::var(API_KEY_ENV_VAR)
            .ok()
            .or(ai.api_key)
            .filter(|k| !k.trim().is_empty());
        let model = std::env::var(MODEL_ENV_VAR).unwrap_or(ai.model);
        if ai.timeout_secs == 0 {
            bail!("ai.timeout_secs must be greater than zero");
        }

        Ok(Self {
            db_config,
            gemini: GeminiConfig {
                api_key,
                model,
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout: Duration::from_secs(ai.timeout_secs),
            },
            server,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point config lookup at an empty temp dir for the duration of `f`.
    fn with_config_home<T>(contents: Option<&str>, f: impl FnOnce() -> T) -> T {
        let tmp = tempfile::TempDir::new().unwrap();
        if let Some(contents) = contents {
            let dir = tmp.path().join("gradmate");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("config.toml"), contents).unwrap();
        }
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let out = f();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }
        out
    }

    fn clear_env() {
        for var in [DbConfig::ENV_VAR, API_KEY_ENV_VAR, MODEL_ENV_VAR] {
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    fn minimal_file_fills_section_defaults() {
        let cfg: ConfigFile =
            toml::from_str("[database]\nurl = \"postgresql://db:5432/gradmate\"\n").unwrap();
        assert_eq!(cfg.ai.model, DEFAULT_MODEL);
        assert_eq!(cfg.ai.timeout_secs, 30);
        assert_eq!(cfg.ai.api_key, None);
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.server.user_header, "x-user-id");
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let _lock = lock_env();
        let original = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://testhost:5432/testdb".to_string(),
            },
            ai: AiSection {
                api_key: Some("k-123".to_string()),
                ..AiSection::default()
            },
            server: ServerSection {
                port: 8080,
                ..ServerSection::default()
            },
        };

        let loaded = with_config_home(None, || {
            save_config(&original).unwrap();
            load_config().unwrap()
        });

        assert_eq!(loaded.database.url, original.database.url);
        assert_eq!(loaded.ai.api_key.as_deref(), Some("k-123"));
        assert_eq!(loaded.server.port, 8080);
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let mode = with_config_home(None, || {
            save_config(&ConfigFile {
                database: DatabaseSection {
                    url: DbConfig::DEFAULT_URL.to_string(),
                },
                ai: AiSection::default(),
                server: ServerSection::default(),
            })
            .unwrap();
            std::fs::metadata(config_path()).unwrap().permissions().mode()
        });
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };

        let config = with_config_home(None, || {
            GradmateConfig::resolve(Some("postgresql://cli:5432/clidb")).unwrap()
        });
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");

        clear_env();
    }

    #[test]
    fn resolve_env_overrides_config_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(API_KEY_ENV_VAR, "env-key") };
        unsafe { std::env::set_var(MODEL_ENV_VAR, "gemini-2.0-flash") };

        let file = "[database]\nurl = \"postgresql://file:5432/filedb\"\n\n[ai]\napi_key = \"file-key\"\nmodel = \"file-model\"\n";
        let config = with_config_home(Some(file), || GradmateConfig::resolve(None).unwrap());
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.gemini.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.gemini.model, "gemini-2.0-flash");

        clear_env();
    }

    #[test]
    fn resolve_reads_config_file() {
        let _lock = lock_env();
        clear_env();

        let file = "[database]\nurl = \"postgresql://file:5432/filedb\"\n\n[ai]\napi_key = \"file-key\"\ntimeout_secs = 12\n\n[server]\nport = 9000\nuser_header = \"x-student-id\"\n";
        let config = with_config_home(Some(file), || GradmateConfig::resolve(None).unwrap());
        assert_eq!(config.db_config.database_url, "postgresql://file:5432/filedb");
        assert_eq!(config.gemini.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.gemini.model, DEFAULT_MODEL);
        assert_eq!(config.gemini.timeout, Duration::from_secs(12));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.user_header, "x-student-id");
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        clear_env();

        let config = with_config_home(None, || GradmateConfig::resolve(None).unwrap());
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.gemini.api_key, None);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn resolve_rejects_zero_timeout() {
        let _lock = lock_env();
        clear_env();

        let file = "[database]\nurl = \"postgresql://file:5432/filedb\"\n\n[ai]\ntimeout_secs = 0\n";
        let result = with_config_home(Some(file), || GradmateConfig::resolve(None));
        assert!(result.is_err());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let _lock = lock_env();
        let path = config_path();
        assert!(
            path.ends_with("gradmate/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
