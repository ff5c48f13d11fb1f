// Configuration loading and parsing (config/cardtable.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the single config file, both in `defaults/` and `config/`.
pub const CONFIG_FILE: &str = "cardtable.toml";

/// Fallback poll period when the file omits `[polling]`.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub poll_interval: Duration,
    /// Resolved SQLite path. `:memory:` is accepted.
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Root URL of the authority, e.g. `http://127.0.0.1:5000`.
    pub base_url: String,
}

/// Which room to join and under what name.
///
/// The authority identifies players by a session cookie that only lives as
/// long as the process, so the client joins at every startup. Both fields
/// may be left out of the file, but [`SessionConfig::identity`] refuses to
/// start without them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub room_code: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
}

impl SessionConfig {
    /// The `(room_code, player_name)` pair to join with.
    pub fn identity(&self) -> Result<(&str, &str), ConfigError> {
        let room = self
            .room_code
            .as_deref()
            .ok_or_else(|| ConfigError::ValidationError {
                field: "session.room_code".into(),
                message: "required to join a room at startup".into(),
            })?;
        let name = self
            .player_name
            .as_deref()
            .ok_or_else(|| ConfigError::ValidationError {
                field: "session.player_name".into(),
                message: "required to join a room at startup".into(),
            })?;
        Ok((room, name))
    }
}

// ---------------------------------------------------------------------------
// cardtable.toml raw structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    server: ServerConfig,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    polling: PollingSection,
    #[serde(default)]
    storage: StorageSection,
}

#[derive(Debug, Clone, Deserialize)]
struct PollingSection {
    #[serde(default = "default_interval_ms")]
    interval_ms: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        PollingSection {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StorageSection {
    #[serde(default)]
    db_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/cardtable.toml` relative to `base_dir`.
///
/// Does not copy defaults; see [`load_config`].
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    parse_config(&text, &path)
}

/// Parse config text; `origin` is only used in error messages.
pub fn parse_config(text: &str, origin: &Path) -> Result<Config, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: origin.to_path_buf(),
        source: e,
    })?;

    let db_path = match file.storage.db_path.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => default_db_path()?,
    };

    let config = Config {
        server: ServerConfig {
            base_url: file.server.base_url.trim_end_matches('/').to_string(),
        },
        session: SessionConfig {
            room_code: non_blank(file.session.room_code),
            player_name: non_blank(file.session.player_name),
        },
        poll_interval: Duration::from_millis(file.polling.interval_ms),
        db_path,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure the config file exists by copying it from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            // Never overwrite a user's edited config.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `<data dir>/cardtable/session.db` for the current user.
fn default_db_path() -> Result<PathBuf, ConfigError> {
    let dirs = directories::ProjectDirs::from("", "", "cardtable").ok_or_else(|| {
        ConfigError::ValidationError {
            field: "storage.db_path".into(),
            message: "not set and no home directory to default to".into(),
        }
    })?;
    Ok(dirs.data_dir().join("session.db"))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let url = &config.server.base_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError {
            field: "server.base_url".into(),
            message: format!("must start with http:// or https://, got {url:?}"),
        });
    }

    if config.poll_interval.is_zero() {
        return Err(ConfigError::ValidationError {
            field: "polling.interval_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    // A room code without a name (or vice versa) cannot form a join request.
    if config.session.room_code.is_some() != config.session.player_name.is_some() {
        return Err(ConfigError::ValidationError {
            field: "session".into(),
            message: "room_code and player_name must be set together".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
