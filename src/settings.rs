//! Engine settings with persistence
//!
//! Settings are saved to `~/.config/vesper/settings.toml`

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// All engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    pub scheduler: SchedulerSettings,
    pub diagnostics: DiagnosticsSettings,
}

impl EngineSettings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vesper"))
    }

    /// Get the settings file path
    fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.toml"))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            warn!("Could not determine config directory");
            return Self::default();
        };

        if !path.exists() {
            info!("No settings file found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(dir) = Self::config_dir() else {
            anyhow::bail!("Could not determine config directory");
        };

        let path = dir.join("settings.toml");

        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Frame loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Time scale multiplier applied to every frame delta
    pub time_scale: f32,
    /// Raw delta fed to the clock each frame of the headless run
    pub frame_delta: f32,
    /// How many frames the headless run simulates
    pub frame_count: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            frame_delta: 1.0 / 60.0,
            frame_count: 240,
        }
    }
}

/// Diagnostics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSettings {
    /// Warn when a frame's step+draw wall time exceeds the threshold
    pub warn_slow_frames: bool,
    /// Slow-frame threshold in milliseconds
    pub slow_frame_ms: f32,
    /// Print the scene report as JSON at the end of the run
    pub dump_report: bool,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            warn_slow_frames: true,
            slow_frame_ms: 8.0,
            dump_report: true,
        }
    }
}
