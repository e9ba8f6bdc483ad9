//! Configuration loading.
//!
//! Every value has a compiled default so the tool runs without a config
//! file. Resolution order for the file itself:
//! 1. Explicit path (`--config` or `IDR_MASK_UPLOAD_CONFIG`), which must exist
//! 2. `<config dir>/idr-mask-upload/config.toml` when present
//! 3. Compiled defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "IDR_MASK_UPLOAD_CONFIG";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub layout: LayoutConfig,
}

/// Gateway location and credentials.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    /// Server index passed to the login form
    pub server_id: u32,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            url: "http://localhost:4080".into(),
            server_id: 1,
            username: None,
            password: None,
        }
    }
}

impl ServerConfig {
    /// Apply command line or environment values on top of the file.
    pub fn apply_overrides(
        &mut self,
        url: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) {
        if let Some(url) = url {
            self.url = url;
        }
        if username.is_some() {
            self.username = username;
        }
        if password.is_some() {
            self.password = password;
        }
    }
}

/// How masks are stored once uploaded.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Server-side directory the files are placed under
    pub data_dir: String,
    pub namespace: String,
    pub mimetype: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            data_dir: "/data/OMERO".into(),
            namespace: "openmicroscopy.org/idr/analysis/original".into(),
            mimetype: "image/png".into(),
        }
    }
}

/// Naming conventions tying repository objects to files on disk.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub fileset_path: PathBuf,
    pub segmentation_subdir: PathBuf,
    pub screen_name: String,
    pub plate_suffix: String,
    pub fields_per_well: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            fileset_path: PathBuf::from("/uod/idr/filesets/idr0033-rohban-pathways"),
            segmentation_subdir: PathBuf::from("20170214-original/images_segmented_outlines"),
            screen_name: "idr0033-rohban-pathways/screenA".into(),
            plate_suffix: "_illum_corrected".into(),
            fields_per_well: 9,
        }
    }
}

impl Config {
    /// Load configuration following the resolution order above.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                log::debug!("No config file found, using compiled defaults");
                Ok(Config::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.layout.plate_suffix.is_empty() {
            return Err(Error::Config("layout.plate_suffix must not be empty".into()));
        }
        if self.layout.fields_per_well == 0 {
            return Err(Error::Config("layout.fields_per_well must be positive".into()));
        }
        Ok(())
    }
}

/// `<config dir>/idr-mask-upload/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("idr-mask-upload").join("config.toml"))
}
