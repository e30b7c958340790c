/// 文件 IO 实现
///
/// 提供基于文件系统的默认读写实现
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use super::traits::{FileReader, FileWriter};

/// 默认的文件读取器（基于 std::fs）
#[derive(Debug, Clone, Default)]
pub struct DefaultFileReader;

impl FileReader for DefaultFileReader {
    fn read(&self, path: &Path) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_dir(&self, dir: &Path) -> std::io::Result<Option<Vec<PathBuf>>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(Some(files))
    }
}

/// 默认的文件写入器（基于 std::fs）
#[derive(Debug, Clone, Default)]
pub struct DefaultFileWriter;

impl FileWriter for DefaultFileWriter {
    fn write(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        // 确保父目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, data)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_reader() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("Info.plist");
        std::fs::write(&test_file, b"<plist/>").unwrap();

        let reader = DefaultFileReader;
        assert_eq!(reader.read(&test_file).unwrap(), Some(b"<plist/>".to_vec()));
        assert!(reader.exists(&test_file));
    }

    #[test]
    fn test_reader_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let reader = DefaultFileReader;
        let missing = temp_dir.path().join("missing.strings");

        assert_eq!(reader.read(&missing).unwrap(), None);
        assert!(!reader.exists(&missing));
    }

    #[test]
    fn test_list_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("io/ionic/starter");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("b.txt"), "b").unwrap();
        std::fs::write(dir.join("MainActivity.java"), "a").unwrap();

        let reader = DefaultFileReader;
        assert_eq!(
            reader.list_dir(&dir).unwrap(),
            Some(vec![dir.join("MainActivity.java"), dir.join("b.txt")])
        );
        assert_eq!(reader.list_dir(&temp_dir.path().join("missing")).unwrap(), None);
    }

    #[test]
    fn test_writer_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("App").join("en.lproj").join("Localizable.strings");

        // 测试自动创建父目录
        let writer = DefaultFileWriter;
        writer.write(&test_file, &[1, 2, 3, 4]).unwrap();

        assert_eq!(std::fs::read(&test_file).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_writer_remove() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("MainActivity.java");
        std::fs::write(&test_file, b"class MainActivity {}").unwrap();

        let writer = DefaultFileWriter;
        writer.remove(&test_file).unwrap();
        assert!(!test_file.exists());

        // 再次删除不报错
        writer.remove(&test_file).unwrap();
    }
}
