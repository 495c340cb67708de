// SPDX-License-Identifier: MPL-2.0-only

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

pub const NAME: &str = "vidpaper";
pub const CONFIG_FILE: &str = "config.ron";
pub const RECORD_FILE: &str = "vidpaper.pid";
pub const DEFAULT_RENDERER: &str = "mpv";
pub const DEFAULT_ACK_TIMEOUT_MS: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Settings shared by the `start`, `stop` and `status` commands.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Setters)]
#[serde(default, deny_unknown_fields)]
#[must_use]
pub struct Config {
    /// renderer executable, searched on `PATH` unless it names a path
    #[setters(into)]
    pub renderer: String,
    /// extra renderer flags, passed after the fixed flags and before the video
    pub renderer_args: Vec<String>,
    /// where the renderer's process id is recorded
    #[setters(strip_option)]
    pub record_path: Option<PathBuf>,
    /// how long the shell gets to acknowledge the worker surface request
    pub spawn_ack_timeout_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            renderer: DEFAULT_RENDERER.into(),
            renderer_args: Vec::new(),
            record_path: None,
            spawn_ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Default location of the config file, `<config dir>/vidpaper/config.ron`.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(NAME).join(CONFIG_FILE))
    }

    /// Parse a config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid config.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        ron::de::from_str(&contents).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the config at `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults silently; a broken one is logged
    /// and also falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::path) else {
            tracing::debug!("no config directory on this system, using defaults");
            return Self::default();
        };

        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(why) => {
                tracing::warn!(%why, "config file error, falling back to defaults");
                Self::default()
            }
        }
    }

    /// The record location, defaulting to a fixed file in the temp directory.
    #[must_use]
    pub fn record_location(&self) -> PathBuf {
        self.record_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(RECORD_FILE))
    }

    #[must_use]
    pub fn spawn_ack_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.spawn_ack_timeout_ms))
    }
}
