/// 暂存区
///
/// 每个绝对路径最多对应一个暂存条目。重复打开同一路径返回同一个内存模型，
/// 不会重新解析，也不会丢失尚未提交的修改。
use std::any::Any;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::delta::{CommitReport, FileDiff};
use crate::io::{DefaultFileReader, DefaultFileWriter, FileReader, FileWriter};
use crate::utils::{normalize_path, ProjectError, Result};

/// 可暂存的文档
///
/// 实现者负责把内存模型序列化为最终写入磁盘的字节。
pub trait StagedDocument: Any + Debug {
    /// 文档类型名（用于错误信息）
    fn kind(&self) -> &'static str;

    /// 生成提交时写入的字节
    fn render(&self) -> Result<Vec<u8>>;

    /// 提交到磁盘
    ///
    /// 可重复调用，不依赖其它条目的提交顺序
    fn commit(&self, path: &Path, writer: &dyn FileWriter) -> Result<()> {
        let data = self.render()?;
        writer.write(path, &data)?;
        Ok(())
    }

    /// 是否参与差异预览（二进制内容返回 false）
    fn supports_diff(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 暂存条目
#[derive(Debug)]
pub struct StagedEntry {
    path: PathBuf,
    document: Box<dyn StagedDocument>,
}

impl StagedEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &dyn StagedDocument {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> &mut dyn StagedDocument {
        self.document.as_mut()
    }
}

/// 文档加载结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// 路径早已打开，返回的是现有模型
    AlreadyOpen,
    /// 从磁盘读取并解析
    Loaded,
    /// 磁盘上不存在，创建了空文档
    Created,
}

/// 暂存区 - 管理所有待写入文件
///
/// # 核心特性
/// - **延迟写入**: 在 `commit_all` 之前不触碰磁盘
/// - **唯一所有者**: 每个路径的内存模型只由暂存区持有
/// - **部分提交**: 某个条目提交失败不会回滚其它条目
#[derive(Debug)]
pub struct StagingArea {
    entries: IndexMap<PathBuf, StagedEntry>,
    reader: Box<dyn FileReader>,
    writer: Box<dyn FileWriter>,
}

impl Default for StagingArea {
    fn default() -> Self {
        Self::new()
    }
}

impl StagingArea {
    /// 使用基于 std::fs 的默认读写器创建暂存区
    pub fn new() -> Self {
        Self::with_io(Box::new(DefaultFileReader), Box::new(DefaultFileWriter))
    }

    /// 使用自定义读写器创建暂存区
    pub fn with_io(reader: Box<dyn FileReader>, writer: Box<dyn FileWriter>) -> Self {
        Self {
            entries: IndexMap::new(),
            reader,
            writer,
        }
    }

    /// 登记一个条目；路径已打开时不做任何事并返回 false
    pub fn open(&mut self, path: &Path, document: Box<dyn StagedDocument>) -> bool {
        let key = normalize_path(path);
        if self.entries.contains_key(&key) {
            return false;
        }
        debug!(path = %key.display(), kind = document.kind(), "staged");
        self.entries.insert(
            key.clone(),
            StagedEntry {
                path: key,
                document,
            },
        );
        true
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.entries.contains_key(&normalize_path(path))
    }

    pub fn get(&self, path: &Path) -> Option<&StagedEntry> {
        self.entries.get(&normalize_path(path))
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut StagedEntry> {
        self.entries.get_mut(&normalize_path(path))
    }

    /// 强制替换已打开路径的模型
    pub fn set(&mut self, path: &Path, document: Box<dyn StagedDocument>) -> Result<()> {
        let entry = self
            .get_mut(path)
            .ok_or_else(|| ProjectError::NotOpen(path.to_path_buf()))?;
        entry.document = document;
        Ok(())
    }

    /// 按类型取得已打开的文档
    ///
    /// 路径未打开返回 `Ok(None)`；以其它类型打开返回 `DocumentKind` 错误
    pub fn document<T: StagedDocument>(&self, path: &Path) -> Result<Option<&T>> {
        match self.get(path) {
            None => Ok(None),
            Some(entry) => entry
                .document
                .as_any()
                .downcast_ref::<T>()
                .map(Some)
                .ok_or_else(|| kind_error::<T>(path)),
        }
    }

    /// 按类型取得已打开文档的可变引用
    pub fn document_mut<T: StagedDocument>(&mut self, path: &Path) -> Result<Option<&mut T>> {
        match self.get_mut(path) {
            None => Ok(None),
            Some(entry) => entry
                .document
                .as_any_mut()
                .downcast_mut::<T>()
                .map(Some)
                .ok_or_else(|| kind_error::<T>(path)),
        }
    }

    /// 取得文档，若未打开则读取磁盘并解析后登记
    ///
    /// `parse` 收到文件内容；文件不存在时收到 `None`，应返回空的默认文档
    pub fn open_with<T, F>(&mut self, path: &Path, parse: F) -> Result<(&mut T, LoadOutcome)>
    where
        T: StagedDocument,
        F: FnOnce(Option<Vec<u8>>) -> Result<T>,
    {
        let outcome = if self.is_open(path) {
            LoadOutcome::AlreadyOpen
        } else {
            let source = self.read_source(path)?;
            let outcome = if source.is_some() {
                LoadOutcome::Loaded
            } else {
                LoadOutcome::Created
            };
            let document = parse(source)?;
            self.open(path, Box::new(document));
            outcome
        };

        let document = self
            .document_mut::<T>(path)?
            .ok_or_else(|| ProjectError::NotOpen(path.to_path_buf()))?;
        Ok((document, outcome))
    }

    /// 通过暂存区的读取器读取磁盘内容（不登记）
    pub fn read_source(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.reader.read(path)?)
    }

    /// 磁盘上是否存在该文件
    pub fn exists_on_disk(&self, path: &Path) -> bool {
        self.reader.exists(path)
    }

    /// 通过读取器列出磁盘目录下的直接文件；目录不存在时为 None
    pub fn list_source_dir(&self, dir: &Path) -> Result<Option<Vec<PathBuf>>> {
        Ok(self.reader.list_dir(dir)?)
    }

    /// 所有已暂存路径（按打开顺序）
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 提交所有条目
    ///
    /// 每个条目独立提交，失败会记录在报告中，不会回滚已写入的兄弟条目
    pub fn commit_all(&self) -> CommitReport {
        let mut report = CommitReport::default();

        for entry in self.entries.values() {
            match entry.document.commit(&entry.path, self.writer.as_ref()) {
                Ok(()) => {
                    debug!(path = %entry.path.display(), "committed");
                    report.written.push(entry.path.clone());
                }
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "commit failed");
                    report.failed.push((entry.path.clone(), e));
                }
            }
        }

        report
    }

    /// 预览所有条目的差异，不写磁盘
    pub fn diff_all(&self) -> Result<Vec<FileDiff>> {
        let mut diffs = Vec::new();

        for entry in self.entries.values() {
            if !entry.document.supports_diff() {
                continue;
            }

            let old = self
                .reader
                .read(&entry.path)?
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            let new = String::from_utf8_lossy(&entry.document.render()?).into_owned();

            diffs.push(FileDiff {
                path: entry.path.clone(),
                old,
                new,
            });
        }

        Ok(diffs)
    }
}

fn kind_error<T: 'static>(path: &Path) -> ProjectError {
    ProjectError::DocumentKind {
        path: path.to_path_buf(),
        expected: std::any::type_name::<T>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::RawFile;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Failing;

    impl StagedDocument for Failing {
        fn kind(&self) -> &'static str {
            "failing"
        }

        fn render(&self) -> Result<Vec<u8>> {
            Err(ProjectError::Configuration("cannot render".to_string()))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_open_is_idempotent() {
        let mut staging = StagingArea::new();
        let path = Path::new("/tmp/project/a.txt");

        assert!(staging.open(path, Box::new(RawFile::new(b"first".to_vec()))));
        assert!(!staging.open(path, Box::new(RawFile::new(b"second".to_vec()))));

        let doc = staging.document::<RawFile>(path).unwrap().unwrap();
        assert_eq!(doc.bytes(), b"first");
        assert_eq!(staging.len(), 1);
    }

    #[test]
    fn test_paths_are_normalized() {
        let mut staging = StagingArea::new();
        staging.open(Path::new("/p/ios/./App/../App/Info.plist"), Box::new(RawFile::new(vec![])));

        assert!(staging.is_open(Path::new("/p/ios/App/Info.plist")));
    }

    #[test]
    fn test_open_with_returns_live_model() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.bin");
        std::fs::write(&path, b"disk").unwrap();

        let mut staging = StagingArea::new();
        let (doc, outcome) = staging
            .open_with(&path, |bytes| Ok(RawFile::new(bytes.unwrap_or_default())))
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);
        doc.set_bytes(b"edited".to_vec());

        // 第二次打开不会重新读取磁盘
        let (doc, outcome) = staging
            .open_with(&path, |_| -> Result<RawFile> { panic!("must not reparse") })
            .unwrap();
        assert_eq!(outcome, LoadOutcome::AlreadyOpen);
        assert_eq!(doc.bytes(), b"edited");
        assert_eq!(std::fs::read(&path).unwrap(), b"disk");
    }

    #[test]
    fn test_open_with_missing_file_creates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("new.bin");

        let mut staging = StagingArea::new();
        let (_, outcome) = staging
            .open_with(&path, |bytes| {
                assert!(bytes.is_none());
                Ok(RawFile::new(Vec::new()))
            })
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Created);
    }

    #[test]
    fn test_document_kind_mismatch() {
        let mut staging = StagingArea::new();
        let path = Path::new("/x/failing");
        staging.open(path, Box::new(Failing));

        let result = staging.document::<RawFile>(path);
        assert!(matches!(result, Err(ProjectError::DocumentKind { .. })));
    }

    #[test]
    fn test_set_requires_open_path() {
        let mut staging = StagingArea::new();
        let result = staging.set(Path::new("/x/missing"), Box::new(RawFile::new(vec![])));
        assert!(matches!(result, Err(ProjectError::NotOpen(_))));
    }

    #[test]
    fn test_commit_all_reports_failures_without_rollback() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("out").join("good.txt");
        let bad = temp_dir.path().join("bad.txt");

        let mut staging = StagingArea::new();
        staging.open(&bad, Box::new(Failing));
        staging.open(&good, Box::new(RawFile::new(b"ok".to_vec())));

        let report = staging.commit_all();
        assert_eq!(report.written, vec![good.clone()]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_success());
        assert_eq!(std::fs::read(&good).unwrap(), b"ok");
    }

    #[test]
    fn test_diff_all_does_not_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        std::fs::write(&path, "old\n").unwrap();

        let mut staging = StagingArea::new();
        staging.open(&path, Box::new(RawFile::new(b"new\n".to_vec())));

        let diffs = staging.diff_all().unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].old, "old\n");
        assert_eq!(diffs[0].new, "new\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\n");
    }
}
