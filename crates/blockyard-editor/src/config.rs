//! Editor configuration, loaded from RON.
//!
//! ```ron
//! (
//!     render_url: Some("https://cms.example/admin/blocks/{type}/render"),
//!     align_version: 2,
//!     request_timeout_secs: 5,
//!     shortcuts: {
//!         "ctrl+shift+d": duplicate,
//!     },
//! )
//! ```
//!
//! Every field is optional.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shortcuts::{Action, ShortcutController};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Render endpoint template with `{type}` / `{id}` placeholders.
    pub render_url: Option<String>,
    /// Layout version passed to `align` capabilities.
    pub align_version: u32,
    pub request_timeout_secs: u64,
    /// Extra or overriding chord bindings, layered on the defaults.
    pub shortcuts: BTreeMap<String, Action>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            render_url: None,
            align_version: 1,
            request_timeout_secs: 10,
            shortcuts: BTreeMap::new(),
        }
    }
}

impl EditorConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_ron(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded editor config");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Default bindings with this config's overrides applied.
    pub fn shortcut_controller(&self) -> Result<ShortcutController, ConfigError> {
        ShortcutController::from_config(&self.shortcuts).map_err(ConfigError::Shortcut)
    }
}

/// Error type for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("bad shortcut: {0}")]
    Shortcut(String),
}
