/// IO 抽象层 - trait 定义
///
/// 该模块定义了文件读写的抽象接口，支持依赖注入和测试 mock。
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// 文件读取 trait
///
/// # 职责
/// - 从文件系统读取原始字节
/// - 不负责解析，仅负责 IO
pub trait FileReader: Debug {
    /// 读取文件的原始数据
    ///
    /// # 返回
    /// 文件不存在时返回 `Ok(None)`，其余 IO 错误向上传播
    fn read(&self, path: &Path) -> std::io::Result<Option<Vec<u8>>>;

    /// 检查文件是否存在
    fn exists(&self, path: &Path) -> bool;

    /// 目录下的直接文件（不含子目录，按路径排序）
    ///
    /// 目录不存在时返回 `Ok(None)`
    fn list_dir(&self, dir: &Path) -> std::io::Result<Option<Vec<PathBuf>>>;
}

/// 文件写入 trait
///
/// # 职责
/// - 将序列化后的数据写入文件系统
/// - 不负责序列化，仅负责 IO
pub trait FileWriter: Debug {
    /// 写入文件数据
    ///
    /// # 参数
    /// * `path` - 目标文件路径
    /// * `data` - 要写入的原始数据
    fn write(&self, path: &Path, data: &[u8]) -> std::io::Result<()>;

    /// 删除文件；文件不存在不视为错误
    fn remove(&self, path: &Path) -> std::io::Result<()>;
}
