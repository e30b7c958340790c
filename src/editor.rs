/// 暂存层模块
///
/// 该模块提供延迟写入的虚拟暂存区。所有格式编辑器的文档都登记在这里，
/// 遵循"修改-保存分离"原则，所有修改操作仅在内存中进行，需要显式调用提交。
///
/// # 架构设计
///
/// - **staging**: 暂存区，按绝对路径持有每个文件的内存模型
/// - **delta**: 差异预览和提交报告
/// - **raw**: 原样复制的二进制/文本文件
///
/// # 使用示例
///
/// ```rust,ignore
/// use mobile_project_edit::editor::StagingArea;
/// use mobile_project_edit::PlistFile;
///
/// let mut staging = StagingArea::new();
/// let plist = PlistFile::open(&mut staging, Path::new("/app/Info.plist"))?;
/// plist.set(patch);
///
/// for diff in staging.diff_all()? {
///     println!("{}", diff);
/// }
/// let report = staging.commit_all();
/// ```
pub mod delta;
pub mod raw;
pub mod staging;

// === 导出公共接口 ===
pub use delta::{CommitReport, FileDiff};
pub use raw::{RawFile, RemovedFile};
pub use staging::{LoadOutcome, StagedDocument, StagedEntry, StagingArea};
