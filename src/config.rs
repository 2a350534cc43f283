/// Startup configuration for a conversion run
use crate::constants::{DEFAULT_MESH_MIME, DEFAULT_RESOLUTION, DEFAULT_TEXTURE_MIME};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run configuration loaded from `config.json`. The tool paths are
/// required; the variant filters fall back to the Megascans defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Directory containing the model compiler binary.
    pub bin_path: PathBuf,
    /// Game content root receiving every generated artifact.
    pub game_path: PathBuf,
    /// Square texture resolution edge requested from descriptors.
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    /// Raster mime type accepted when resolving texture variants.
    #[serde(default = "default_texture_mime")]
    pub texture_mime: String,
    /// Mesh mime type accepted when resolving geometry variants.
    #[serde(default = "default_mesh_mime")]
    pub mesh_mime: String,
}

fn default_resolution() -> u32 {
    DEFAULT_RESOLUTION
}

fn default_texture_mime() -> String {
    DEFAULT_TEXTURE_MIME.to_string()
}

fn default_mesh_mime() -> String {
    DEFAULT_MESH_MIME.to_string()
}

impl RunConfig {
    /// Loads configuration from `path`. Any failure here is fatal for the
    /// run; nothing is converted with a partial configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Resolution string as descriptors declare it (`4096x4096`).
    pub fn resolution_string(&self) -> String {
        format!("{0}x{0}", self.resolution)
    }
}
