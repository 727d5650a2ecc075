use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::db::Database;

use super::player::backend::BackendKind;

/// Advisory stream-quality preference. Stored and exported, but never
/// enforced by the playback core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Quality {
    Auto,
    High,
    Medium,
    Low,
}

impl Quality {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) autoplay_on_load: bool,
    pub(crate) preferred_quality: Quality,
    pub(crate) auto_advance: bool,
    pub(crate) preferred_backend: BackendKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autoplay_on_load: true,
            preferred_quality: Quality::Auto,
            auto_advance: true,
            preferred_backend: BackendKind::Mpv,
        }
    }
}

impl Settings {
    /// A missing or corrupt settings row reads as defaults; user data must
    /// never make startup fail.
    pub(crate) fn load(db: &Database) -> Settings {
        db.settings_json()
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub(crate) fn save(&self, db: &Database) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        db.save_settings_json(&raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_json_falls_back_to_defaults() {
        let parsed: Settings = serde_json::from_str("{}").expect("empty object uses defaults");
        assert_eq!(parsed, Settings::default());
        assert!(serde_json::from_str::<Settings>("{not json").is_err());
    }

    #[test]
    fn settings_round_trip_keeps_backend_choice() {
        let settings = Settings {
            preferred_backend: BackendKind::Ffplay,
            auto_advance: false,
            ..Settings::default()
        };
        let raw = serde_json::to_string(&settings).expect("serialize");
        let back: Settings = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(back, settings);
    }
}
