/// 原样写入的文件（复制操作使用）与待删除的文件
use std::any::Any;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::staging::StagedDocument;
use crate::io::FileWriter;
use crate::utils::{remove_dir_if_empty, Result};

/// 原始字节文档
#[derive(Debug, Clone, Default)]
pub struct RawFile {
    bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }
}

impl StagedDocument for RawFile {
    fn kind(&self) -> &'static str {
        "raw"
    }

    fn render(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn supports_diff(&self) -> bool {
        std::str::from_utf8(&self.bytes).is_ok()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 提交时删除的文件
///
/// 删除后自下而上清理变空的父目录，直到 `prune_until`（不含）。
/// 非空目录保留。
#[derive(Debug, Clone, Default)]
pub struct RemovedFile {
    prune_until: Option<PathBuf>,
}

impl RemovedFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pruning_until(root: impl Into<PathBuf>) -> Self {
        Self {
            prune_until: Some(root.into()),
        }
    }
}

impl StagedDocument for RemovedFile {
    fn kind(&self) -> &'static str {
        "removed"
    }

    fn render(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn commit(&self, path: &Path, writer: &dyn FileWriter) -> Result<()> {
        writer.remove(path)?;

        let Some(stop) = &self.prune_until else {
            return Ok(());
        };
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == stop.as_path() || !current.starts_with(stop) {
                break;
            }
            if !remove_dir_if_empty(current)? {
                break;
            }
            debug!(dir = %current.display(), "removed empty directory");
            dir = current.parent();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::DefaultFileWriter;
    use tempfile::TempDir;

    #[test]
    fn test_removed_file_prunes_empty_parents() {
        let temp_dir = TempDir::new().unwrap();
        let java = temp_dir.path().join("java");
        let file = java.join("io/ionic/starter/MainActivity.java");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "package io.ionic.starter;").unwrap();
        std::fs::write(java.join("io/Keep.java"), "package io;").unwrap();

        RemovedFile::pruning_until(&java)
            .commit(&file, &DefaultFileWriter)
            .unwrap();

        assert!(!file.exists());
        assert!(!java.join("io/ionic").exists());
        // 非空目录保留
        assert!(java.join("io").exists());
        assert!(java.exists());
    }

    #[test]
    fn test_removed_file_renders_empty() {
        assert!(RemovedFile::new().render().unwrap().is_empty());
    }
}
