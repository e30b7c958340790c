use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::utils::{normalize_path, ProjectError, Result};

/// 工程配置
///
/// 平台目录不存在时视为没有该平台。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub ios_path: Option<PathBuf>,
    pub android_path: Option<PathBuf>,
}

/// 配置文件内容（JSON），路径相对工程根目录
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    ios_path: Option<PathBuf>,
    android_path: Option<PathBuf>,
}

impl ProjectConfig {
    /// 按默认布局推断：`ios/App`（不存在时为 `ios`）与 `android`
    pub fn for_root(root: &Path) -> Self {
        let nested = root.join("ios").join("App");
        let ios = if nested.is_dir() { nested } else { root.join("ios") };

        Self {
            root: root.to_path_buf(),
            ios_path: existing_dir(ios),
            android_path: existing_dir(root.join("android")),
        }
    }

    /// 读取可选的配置文件覆盖默认值
    pub fn load(root: &Path, file: Option<&Path>) -> Result<Self> {
        let mut config = Self::for_root(root);
        let Some(file) = file else {
            return Ok(config);
        };

        let text = std::fs::read_to_string(file)?;
        let overrides: ConfigFile = serde_json::from_str(&text).map_err(|e| {
            ProjectError::Configuration(format!("invalid config file {}: {}", file.display(), e))
        })?;

        if let Some(ios) = overrides.ios_path {
            config.ios_path = existing_dir(normalize_path(&root.join(ios)));
        }
        if let Some(android) = overrides.android_path {
            config.android_path = existing_dir(normalize_path(&root.join(android)));
        }

        debug!(?config, "loaded project config");
        Ok(config)
    }
}

fn existing_dir(path: PathBuf) -> Option<PathBuf> {
    path.is_dir().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_layout() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("ios/App")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("android")).unwrap();

        let config = ProjectConfig::for_root(temp_dir.path());
        assert_eq!(config.ios_path, Some(temp_dir.path().join("ios/App")));
        assert_eq!(config.android_path, Some(temp_dir.path().join("android")));
    }

    #[test]
    fn test_missing_platforms() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("ios")).unwrap();

        let config = ProjectConfig::for_root(temp_dir.path());
        assert_eq!(config.ios_path, Some(temp_dir.path().join("ios")));
        assert_eq!(config.android_path, None);
    }

    #[test]
    fn test_config_file_overrides() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("native/ios")).unwrap();
        let file = temp_dir.path().join("project.json");
        std::fs::write(&file, r#"{"iosPath": "native/./ios", "androidPath": "native/android"}"#).unwrap();

        let config = ProjectConfig::load(temp_dir.path(), Some(&file)).unwrap();
        assert_eq!(config.ios_path, Some(temp_dir.path().join("native/ios")));
        assert_eq!(config.android_path, None);
    }

    #[test]
    fn test_invalid_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("project.json");
        std::fs::write(&file, "{ not json").unwrap();

        assert!(matches!(
            ProjectConfig::load(temp_dir.path(), Some(&file)),
            Err(ProjectError::Configuration(_))
        ));
    }
}
