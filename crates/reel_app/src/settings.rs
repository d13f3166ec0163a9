// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine settings.
//!
//! Stored as RON next to the user's projects. Missing fields fall back to
//! their defaults so older files keep loading.

use crate::error::{AppError, Result};
use reel_graph::media::VideoParams;
use reel_time::Rational;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "reel.ron";

/// Log filter used when neither `RUST_LOG` nor the settings provide one
pub const DEFAULT_LOG_FILTER: &str = "reel_app=info,reel_graph=info";

/// Engine-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Format version
    pub version: u32,
    /// Frame duration used to step through ranges
    pub timebase: Rational,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Reuse results for nodes reached by several paths
    pub memoize: bool,
    /// Rendered tables kept by the frame cache
    pub cache_capacity: usize,
    /// Render worker threads, `None` for one per core
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_threads: Option<usize>,
    /// Tracing filter directives overriding the default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            timebase: Rational::new(1, 24).unwrap_or(Rational::ONE),
            width: 1920,
            height: 1080,
            memoize: true,
            cache_capacity: 256,
            render_threads: None,
            log_filter: None,
        }
    }
}

impl EngineSettings {
    /// Parse settings from RON text
    pub fn from_ron(text: &str, path: &Path) -> Result<Self> {
        let settings: Self = ron::from_str(text).map_err(|source| AppError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if settings.version > SETTINGS_VERSION {
            return Err(AppError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_VERSION,
            });
        }
        if settings.timebase.is_zero() || settings.timebase.is_negative() {
            return Err(AppError::InvalidArgument(format!(
                "timebase must be positive, got {}",
                settings.timebase
            )));
        }
        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text, path)
    }

    /// Load settings, using defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        crate::project::write_atomic(path, text.as_bytes())
    }

    /// Output resolution
    pub fn video_params(&self) -> VideoParams {
        VideoParams {
            width: self.width,
            height: self.height,
        }
    }
}
