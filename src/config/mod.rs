use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::domain::operation::DEFAULT_RESOLUTION_PX_PER_MM;
use crate::domain::{CropMode, LithophaneParameters};
use crate::mesh::StlFormat;

fn default_width_mm() -> f32 {
    100.0
}
fn default_height_mm() -> f32 {
    100.0
}
fn default_min_thickness_mm() -> f32 {
    0.8
}
fn default_max_thickness_mm() -> f32 {
    5.0
}
fn default_resolution() -> f32 {
    DEFAULT_RESOLUTION_PX_PER_MM
}

/// Settings read from `lithophane.toml`
///
/// Every key is optional; command-line flags take precedence over the file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default = "default_width_mm")]
    pub width_mm: f32,
    #[serde(default = "default_height_mm")]
    pub height_mm: f32,
    #[serde(default = "default_min_thickness_mm")]
    pub min_thickness_mm: f32,
    #[serde(default = "default_max_thickness_mm")]
    pub max_thickness_mm: f32,
    #[serde(default = "default_resolution", alias = "pixels_per_mm")]
    pub resolution_px_per_mm: f32,
    #[serde(default)]
    pub blur_mm: f32,
    #[serde(default, alias = "angle")]
    pub build_angle_deg: f32,
    #[serde(default)]
    pub crop_mode: CropMode,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub format: StlFormat,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            width_mm: default_width_mm(),
            height_mm: default_height_mm(),
            min_thickness_mm: default_min_thickness_mm(),
            max_thickness_mm: default_max_thickness_mm(),
            resolution_px_per_mm: default_resolution(),
            blur_mm: 0.0,
            build_angle_deg: 0.0,
            crop_mode: CropMode::Exact,
            invert: false,
            output: None,
            format: StlFormat::Binary,
            verbose: false,
        }
    }
}

impl FileConfig {
    /// First config file found in the search paths that parses
    pub fn load() -> Option<Self> {
        for path in get_config_paths() {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match Self::parse(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        warn!(path = %path.display(), "failed to parse config file: {e}");
                    }
                }
            }
        }
        None
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Lithophane parameters described by this file
    pub fn parameters(&self) -> LithophaneParameters {
        LithophaneParameters::new(
            self.width_mm,
            self.height_mm,
            self.min_thickness_mm,
            self.max_thickness_mm,
        )
        .with_resolution(self.resolution_px_per_mm)
        .with_blur(self.blur_mm)
        .with_build_angle(self.build_angle_deg)
        .with_crop_mode(self.crop_mode)
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("lithophane.toml"),
        PathBuf::from(".lithophane.toml"),
    ];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("lithophane").join("config.toml"));
        paths.push(config_dir.join("lithophane.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".lithophane.toml"));
        paths.push(home.join(".config").join("lithophane").join("config.toml"));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert!(config.parameters().validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let config = FileConfig::parse(
            r#"
            width_mm = 120.0
            pixels_per_mm = 4.0
            crop_mode = "pad"
            format = "ascii"
            output = "out/photo.stl"
            "#,
        )
        .unwrap();
        assert_eq!(config.width_mm, 120.0);
        assert_eq!(config.height_mm, 100.0);
        assert_eq!(config.resolution_px_per_mm, 4.0);
        assert_eq!(config.crop_mode, CropMode::Pad);
        assert_eq!(config.format, StlFormat::Ascii);
        assert_eq!(config.output, Some(PathBuf::from("out/photo.stl")));

        let params = config.parameters();
        assert_eq!(params.width_mm, 120.0);
        assert_eq!(params.crop_mode, CropMode::Pad);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(FileConfig::parse("road_scale = 1.5").is_err());
        assert!(FileConfig::parse("crop_mode = \"keep_full_image\"").is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lithophane.toml");
        std::fs::write(&path, "min_thickness_mm = 0.6\nverbose = true\n").unwrap();
        let config = FileConfig::from_path(&path).unwrap();
        assert_eq!(config.min_thickness_mm, 0.6);
        assert!(config.verbose);
        assert!(FileConfig::from_path(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_search_paths_start_local() {
        let paths = get_config_paths();
        assert_eq!(paths[0], PathBuf::from("lithophane.toml"));
        assert_eq!(paths[1], PathBuf::from(".lithophane.toml"));
    }
}
