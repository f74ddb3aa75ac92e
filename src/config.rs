//! Config model and persistence helpers.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Remote diagnosis backend.
    pub service: ServiceCfg,
    /// Signed-in account; an empty token means guest.
    pub account: AccountCfg,
    /// Voice note capture and playback commands.
    pub audio: AudioCfg,
    /// Loading screen timer intervals.
    #[serde(default)]
    pub loading: LoadingCfg,
}

/// Backend location and request limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCfg {
    /// Base URL without a trailing slash, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

/// Account values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCfg {
    /// Bearer token issued at sign-in.
    pub access_token: String,
    /// Name shown in the status bar.
    pub display_name: String,
}

/// External commands used for the microphone and speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCfg {
    /// Whether the user allowed microphone access.
    pub microphone_allowed: bool,
    /// Directory where captures are written.
    pub recordings_dir: String,
    /// Recorder argv; the output path is appended.
    pub record_command: Vec<String>,
    /// Player argv; the clip path is appended.
    pub play_command: Vec<String>,
}

/// Timer intervals for the loading screen, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingCfg {
    pub progress_tick_ms: u64,
    pub status_rotate_ms: u64,
    pub fact_rotate_ms: u64,
    /// Pause after the bar completes before the result is shown.
    pub settle_ms: u64,
}

impl Default for LoadingCfg {
    fn default() -> Self {
        Self {
            progress_tick_ms: 300,
            status_rotate_ms: 3000,
            fact_rotate_ms: 5000,
            settle_ms: 500,
        }
    }
}

impl LoadingCfg {
    /// Every interval must be non-zero; the timers cannot tick at period 0.
    pub fn validate(&self) -> Result<()> {
        for (name, ms) in [
            ("progress_tick_ms", self.progress_tick_ms),
            ("status_rotate_ms", self.status_rotate_ms),
            ("fact_rotate_ms", self.fact_rotate_ms),
        ] {
            if ms == 0 {
                bail!("loading.{name} must be greater than 0");
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            let cfg: Self = toml::from_str(&s)?;
            cfg.loading
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid {}: {e}", path.display()))?;
            Ok(cfg)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// True when no access token is configured.
    pub fn is_guest(&self) -> bool {
        self.account.access_token.trim().is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceCfg {
                base_url: "http://127.0.0.1:8787".into(),
                request_timeout_secs: 90,
            },
            account: AccountCfg {
                access_token: "".into(),
                display_name: "".into(),
            },
            audio: AudioCfg {
                microphone_allowed: true,
                recordings_dir: "recordings".into(),
                record_command: ["arecord", "-q", "-f", "cd", "-t", "wav"]
                    .map(String::from)
                    .to_vec(),
                play_command: ["aplay", "-q"].map(String::from).to_vec(),
            },
            loading: LoadingCfg::default(),
        }
    }
}
