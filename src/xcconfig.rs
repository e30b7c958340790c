/// `.xcconfig` 构建配置文件编辑器
///
/// 按行处理 `KEY = value` 语句。值在行尾、`;` 或 `//` 注释处结束，
/// 注释和无法识别的行（如 `#include`）原样保留。
use std::any::Any;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use crate::editor::{StagedDocument, StagingArea};
use crate::utils::Result;

fn assignment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^\S\n]*([^\s/=]+)[^\S\n]*=[^\S\r\n]*").expect("Invalid xcconfig regex")
    })
}

/// 一行中的赋值语句
struct Assignment<'a> {
    key: &'a str,
    /// 值在行内的字节范围（不含结尾空白）
    value: Range<usize>,
}

fn parse_line(line: &str) -> Option<Assignment<'_>> {
    let caps = assignment_regex().captures(line)?;
    let key = caps.get(1)?.as_str();
    let start = caps.get(0)?.end();

    let rest = &line[start..];
    let mut end = rest.find(['\n', '\r', ';']).unwrap_or(rest.len());
    if let Some(comment) = rest[..end].find("//") {
        end = comment;
    }
    let value_len = rest[..end].trim_end().len();

    Some(Assignment {
        key,
        value: start..start + value_len,
    })
}

/// xcconfig 文件
#[derive(Debug, Clone, Default)]
pub struct XCConfigFile {
    doc: String,
    modified: bool,
    loaded: bool,
}

impl XCConfigFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            doc: text.to_string(),
            modified: false,
            loaded: true,
        }
    }

    pub fn open<'a>(staging: &'a mut StagingArea, path: &Path) -> Result<&'a mut Self> {
        let (file, outcome) = staging.open_with(path, |bytes| {
            Ok(match bytes {
                Some(bytes) => Self::from_text(&String::from_utf8_lossy(&bytes)),
                None => Self::new(),
            })
        })?;
        debug!(path = %path.display(), ?outcome, "xcconfig");
        Ok(file)
    }

    /// 原始文本
    pub fn document(&self) -> &str {
        &self.doc
    }

    /// 解析出的键值（重复的键以最后一次为准）
    pub fn pairs(&self) -> IndexMap<String, String> {
        self.doc
            .split_inclusive('\n')
            .filter_map(|line| {
                parse_line(line).map(|a| (a.key.to_string(), line[a.value].to_string()))
            })
            .collect()
    }

    /// 改写已存在的键，未出现的键追加到末尾
    pub fn set<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values: IndexMap<String, String> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if values.is_empty() {
            return;
        }

        let mut found = Vec::new();
        let mut out = String::with_capacity(self.doc.len());

        for line in self.doc.split_inclusive('\n') {
            let replacement = parse_line(line).and_then(|a| {
                let value = values.get(a.key)?;
                found.push(a.key.to_string());
                let indent = line.len() - line.trim_start().len();
                Some(format!(
                    "{}{} = {}{}",
                    &line[..indent],
                    a.key,
                    value,
                    &line[a.value.end..]
                ))
            });
            match replacement {
                Some(text) => out.push_str(&text),
                None => out.push_str(line),
            }
        }

        for (key, value) in values.iter().filter(|(k, _)| !found.contains(k)) {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format!("{} = {}\n", key, value));
        }

        if out != self.doc {
            debug!(keys = ?values.keys().collect::<Vec<_>>(), "xcconfig updated");
            self.doc = out;
            self.modified = true;
        }
    }

    /// 生成文本
    pub fn generate(&self) -> String {
        self.doc.clone()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// 是否从磁盘加载
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl StagedDocument for XCConfigFile {
    fn kind(&self) -> &'static str {
        "xcconfig"
    }

    fn render(&self) -> Result<Vec<u8>> {
        Ok(self.doc.as_bytes().to_vec())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
