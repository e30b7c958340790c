use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum ProjectError {
    /// 请求的 target / 文件 / build 名称不存在
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 文件内容无法按预期格式解析
    #[error("Unable to parse {path}: {message}")]
    Grammar { path: PathBuf, message: String },

    /// 操作前置条件不满足（不会做任何修改）
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// 同一路径已以另一种格式打开
    #[error("{path} is already open as a different document kind (expected {expected})")]
    DocumentKind { path: PathBuf, expected: &'static str },

    #[error("{0} is not open in the staging area")]
    NotOpen(PathBuf),

    #[error("Gradle block '{target}' not found in {path}")]
    GradleBlockNotFound { path: PathBuf, target: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProjectError {
    pub fn grammar(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ProjectError::Grammar {
            path: path.into(),
            message: message.into(),
        }
    }

    /// 语法错误会中止整个运行，其余错误只影响单个操作
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProjectError::Grammar { .. })
    }

    /// 是否为“文件不存在”类的 IO 错误（可选文件缺失时跳过并警告）
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProjectError::Io(e) if e.kind() == ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/// 词法规范化路径（不访问文件系统，文件可能尚不存在）
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// 尝试删除空目录
///
/// 目录非空或已不存在时静默忽略，其它错误（如权限）向上传播
pub fn remove_dir_if_empty(dir: &Path) -> std::io::Result<bool> {
    match std::fs::remove_dir(dir) {
        Ok(()) => Ok(true),
        Err(e) if matches!(e.kind(), ErrorKind::DirectoryNotEmpty | ErrorKind::NotFound) => {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// 将路径转换为 posix 风格（Xcode 工程内始终使用 `/`）
pub fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_remove_dir_if_empty() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty");
        let full = temp_dir.path().join("full");
        std::fs::create_dir_all(&empty).unwrap();
        std::fs::create_dir_all(&full).unwrap();
        std::fs::write(full.join("keep.txt"), "x").unwrap();

        assert!(remove_dir_if_empty(&empty).unwrap());
        assert!(!empty.exists());

        // 非空目录保留，不报错
        assert!(!remove_dir_if_empty(&full).unwrap());
        assert!(full.exists());

        // 不存在的目录不报错
        assert!(!remove_dir_if_empty(&temp_dir.path().join("missing")).unwrap());
    }

    #[test]
    fn test_error_classification() {
        assert!(ProjectError::grammar("a.pbxproj", "bad").is_fatal());
        assert!(!ProjectError::Configuration("x".into()).is_fatal());

        let missing = ProjectError::Io(std::io::Error::new(ErrorKind::NotFound, "gone"));
        assert!(missing.is_not_found());
    }

    #[test]
    fn test_to_posix() {
        assert_eq!(to_posix(Path::new("App/App.entitlements")), "App/App.entitlements");
    }
}
