// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor configuration, stored as RON.

use nodeweave_editor_graph::graphs::procedural::{GRAPH_TYPE, MATERIAL_TYPE};
use nodeweave_editor_graph::ViewState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for this configuration
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The configuration could not be serialized
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),
}

/// General editor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Name shown in window titles and logs
    pub name: String,
    /// Document type created by the entry screen's "new graph" action
    pub entry_graph_type: String,
    /// Root opened at startup when none is given
    pub default_root: Option<String>,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            name: "NodeWeave".to_string(),
            entry_graph_type: GRAPH_TYPE.to_string(),
            default_root: None,
        }
    }
}

/// Mode switching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    /// Node types edited with the shading graph
    pub specialization_types: Vec<String>,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            specialization_types: vec![MATERIAL_TYPE.to_string()],
        }
    }
}

/// Node placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    /// Offset between nodes placed without an explicit position
    pub offset: [f32; 2],
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self { offset: [220.0, 0.0] }
    }
}

/// Event pump limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpSettings {
    /// Rounds per `process_pending` call before giving up on quiescence
    pub max_iterations: usize,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self { max_iterations: 16 }
    }
}

/// Undo history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Maximum number of undo steps kept by documents the editor creates
    pub undo_depth: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { undo_depth: 100 }
    }
}

/// Creation menus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuSettings {
    /// Extra node types, as a RON list of `CreatableType`
    pub extra_types_file: Option<PathBuf>,
}

/// Complete editor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// General settings
    pub editor: EditorSettings,
    /// Mode switching
    pub navigation: NavigationSettings,
    /// Node placement
    pub placement: PlacementSettings,
    /// Event pump
    pub pump: PumpSettings,
    /// Undo history
    pub history: HistorySettings,
    /// Graph view
    pub view: ViewState,
    /// Creation menus
    pub menus: MenuSettings,
}

impl EditorConfig {
    /// Parse a configuration from RON
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(content)?)
    }

    /// Load the configuration; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Serialize as pretty RON
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Save the configuration
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }
}
