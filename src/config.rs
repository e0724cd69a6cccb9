//! User settings, stored as JSON on disk or as a row in the local store.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Row limit used when a question names none.
    pub default_row_limit: u32,
    pub max_history_size: usize,
    /// Prior turns rendered into predictor context.
    pub context_turns: usize,
    pub enable_spatial_ops: bool,
    pub predictor_enabled: bool,
    /// Predictions must score strictly above this.
    pub predictor_min_confidence: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_row_limit: 50,
            max_history_size: 100,
            context_turns: 3,
            enable_spatial_ops: true,
            predictor_enabled: true,
            predictor_min_confidence: 0.6,
        }
    }
}

impl Settings {
    /// Reads settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("Reading {}", path.display())),
        };
        serde_json::from_str(&content).with_context(|| format!("Parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Creating {}", dir.display()))?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Writing {}", path.display()))?;
        Ok(())
    }
}
