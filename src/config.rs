use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(path) = option_env!("FACECODE_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    ProjectDirs::from("", "", "facecode")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("facecode.toml"))
});

/// Settings for the detection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub detector_model: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            score_threshold: 0.6,
            nms_threshold: 0.3,
            detector_model: PathBuf::from("face_detection_yunet_2023mar.onnx"),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "score_threshold = 0.8\n").unwrap();

        let cfg = load_config(Some(path.as_path())).unwrap();
        assert_eq!(cfg.score_threshold, 0.8);
        assert_eq!(cfg.nms_threshold, 0.3);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            score_threshold: 0.75,
            nms_threshold: 0.4,
            detector_model: PathBuf::from("/opt/models/yunet.onnx"),
        };
        save_config(&cfg, Some(path.as_path())).unwrap();
        assert_eq!(load_config(Some(path.as_path())).unwrap(), cfg);
    }

    #[test]
    fn test_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "score_threshold = [").unwrap();
        assert!(load_config(Some(path.as_path())).is_err());
    }
}
