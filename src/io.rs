/// IO 抽象层模块
///
/// 该模块提供了文件读写的抽象接口，遵循依赖倒置原则。
/// 暂存区（staging）只通过这里的 trait 访问磁盘，测试和预览可以替换实现。
///
/// # 架构设计
///
/// - **traits**: 定义 Reader/Writer trait 接口
/// - **fs_io**: 基于 std::fs 的默认实现
///
/// # 使用示例
///
/// ```rust,ignore
/// use mobile_project_edit::io::{DefaultFileReader, FileReader};
///
/// let reader = DefaultFileReader;
/// let data = reader.read(Path::new("Info.plist"))?;
/// ```
pub mod traits;
pub mod fs_io;

// === 导出 trait 定义 ===
pub use traits::{FileReader, FileWriter};

// === 导出默认实现 ===
pub use fs_io::{DefaultFileReader, DefaultFileWriter};
