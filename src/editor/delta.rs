/// 差异预览与提交报告
///
/// `diff_all` 返回每个暂存文件的新旧文本，`commit_all` 返回逐条目的提交结果。
use std::path::PathBuf;

use crate::utils::ProjectError;

/// 单个文件的差异
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// 文件路径
    pub path: PathBuf,
    /// 磁盘上的当前内容（文件不存在时为空）
    pub old: String,
    /// 提交后将写入的内容
    pub new: String,
}

impl FileDiff {
    /// 内容是否发生变化
    pub fn is_changed(&self) -> bool {
        self.old != self.new
    }

    /// 统计变化的行数（按位置逐行比较，仅用于摘要）
    pub fn changed_lines(&self) -> usize {
        let old: Vec<&str> = self.old.lines().collect();
        let new: Vec<&str> = self.new.lines().collect();
        let common = old.len().min(new.len());
        let differing = (0..common).filter(|&i| old[i] != new[i]).count();
        differing + old.len().max(new.len()) - common
    }
}

impl std::fmt::Display for FileDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.is_changed() {
            return write!(f, "{}: unchanged", self.path.display());
        }
        if self.new.is_empty() {
            return write!(f, "{}: removed", self.path.display());
        }
        if self.old.is_empty() {
            return write!(
                f,
                "{}: new file ({} lines)",
                self.path.display(),
                self.new.lines().count()
            );
        }
        write!(
            f,
            "{}: {} lines changed",
            self.path.display(),
            self.changed_lines()
        )
    }
}

/// 提交报告
#[derive(Debug, Default)]
pub struct CommitReport {
    /// 成功写入的文件
    pub written: Vec<PathBuf>,
    /// 写入失败的文件及原因
    pub failed: Vec<(PathBuf, ProjectError)>,
}

impl CommitReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// 生成提交摘要
    pub fn summary(&self) -> String {
        format!(
            "written: {}, failed: {}",
            self.written.len(),
            self.failed.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(old: &str, new: &str) -> FileDiff {
        FileDiff {
            path: PathBuf::from("App/Info.plist"),
            old: old.to_string(),
            new: new.to_string(),
        }
    }

    #[test]
    fn test_unchanged() {
        let d = diff("a\nb\n", "a\nb\n");
        assert!(!d.is_changed());
        assert_eq!(d.to_string(), "App/Info.plist: unchanged");
    }

    #[test]
    fn test_changed_lines() {
        let d = diff("a\nb\nc\n", "a\nB\nc\nd\n");
        assert!(d.is_changed());
        assert_eq!(d.changed_lines(), 2);
        assert_eq!(d.to_string(), "App/Info.plist: 2 lines changed");
    }

    #[test]
    fn test_new_file() {
        let d = diff("", "x\ny\n");
        assert_eq!(d.to_string(), "App/Info.plist: new file (2 lines)");
    }

    #[test]
    fn test_removed_file() {
        let d = diff("x\n", "");
        assert_eq!(d.to_string(), "App/Info.plist: removed");
    }

    #[test]
    fn test_summary() {
        let mut report = CommitReport::default();
        report.written.push(PathBuf::from("a"));
        report.failed.push((
            PathBuf::from("b"),
            ProjectError::Configuration("x".to_string()),
        ));

        assert_eq!(report.summary(), "written: 1, failed: 1");
        assert!(!report.is_success());
    }
}
