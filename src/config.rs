// Server configuration, loaded from a JSON file with CLI and env overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::GameLayout;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Errors from reading or writing the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Application configuration.
///
/// Field names on disk are camelCase. Every field has a default, so a partial
/// file is valid and unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Manifest file name inside each game folder.
    pub game_config_name: String,
    /// Directory holding one sub-directory per game.
    pub games_dir: PathBuf,
    /// Port to bind the HTTP server to.
    pub content_server_port: u16,
    /// Address to bind the HTTP server to.
    pub bind_address: String,
    /// Cover image file name inside each game folder.
    pub cover_file_name: String,
    /// Download archive file name inside each game folder.
    pub archive_file_name: String,
    pub listing_path: String,
    pub download_prefix: String,
    pub cover_prefix: String,
    /// Catalog cache lifetime. Zero rescans on every request.
    pub catalog_cache_secs: u64,
    /// Time allowed to produce a response head.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            game_config_name: "game.json".to_string(),
            games_dir: PathBuf::from("./games"),
            content_server_port: 9494,
            bind_address: "0.0.0.0".to_string(),
            cover_file_name: "cover.jpg".to_string(),
            archive_file_name: "game.zip".to_string(),
            listing_path: "/games.json".to_string(),
            download_prefix: "/download/".to_string(),
            cover_prefix: "/cover/".to_string(),
            catalog_cache_secs: 0,
            request_timeout_secs: 30,
        }
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from an existing file.
    File,
    /// File was absent; defaults were written to it.
    CreatedDefaults,
    /// Defaults in memory only (file unusable or not writable).
    InMemoryDefaults,
}

impl Config {
    /// Load configuration from the file named by CLI/env, then apply overrides.
    ///
    /// Config path: `--config <path>`, then `LANLAUNCHER_CONFIG`, then
    /// `./config.json`.
    ///
    /// Port: `--port <port>`, then `PORT`, then the file value.
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();

        let path = Self::parse_cli_value(&args, "--config")
            .or_else(|| std::env::var("LANLAUNCHER_CONFIG").ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let (mut config, source) = Self::load_or_init(&path);
        tracing::info!(path = %path.display(), ?source, "Configuration loaded");

        if let Some(port) = Self::parse_cli_value(&args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| std::env::var("PORT").ok().and_then(|v| v.parse().ok()))
        {
            config.content_server_port = port;
        }

        config.games_dir = config.resolve_games_dir(&path);
        config
    }

    /// Read the config file, or create it with defaults when it does not exist.
    ///
    /// Never fails: problems are logged and in-memory defaults are used. An
    /// existing file that cannot be parsed is left untouched.
    pub fn load_or_init(path: &Path) -> (Self, ConfigSource) {
        if !path.exists() {
            tracing::info!("No config file found, creating from defaults");
            let config = Config::default();
            return match config.write(path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "Wrote new config file");
                    (config, ConfigSource::CreatedDefaults)
                }
                Err(e) => {
                    tracing::error!("{e}; continuing with defaults");
                    (config, ConfigSource::InMemoryDefaults)
                }
            };
        }

        match Self::read(path) {
            Ok(config) => (config, ConfigSource::File),
            Err(e) => {
                tracing::error!("{e}; continuing with defaults");
                (Config::default(), ConfigSource::InMemoryDefaults)
            }
        }
    }

    /// Read and parse an existing config file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write this config as pretty JSON with four-space indentation.
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source: source.into(),
        })?;
        std::fs::write(path, buf).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Relative games directories are taken relative to the config file.
    pub fn resolve_games_dir(&self, config_path: &Path) -> PathBuf {
        if self.games_dir.is_absolute() {
            return self.games_dir.clone();
        }
        match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(&self.games_dir),
            _ => self.games_dir.clone(),
        }
    }

    /// File names the scanner and file routes look for inside a game folder.
    pub fn layout(&self) -> GameLayout {
        GameLayout {
            manifest_file_name: self.game_config_name.clone(),
            cover_file_name: self.cover_file_name.clone(),
            archive_file_name: self.archive_file_name.clone(),
        }
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_cache_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}
