use std::any::Any;
use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use super::parse::recompute_positions;
use super::{generate_strings, parse_strings, StringsEntry, StringsNode};
use crate::editor::{LoadOutcome, StagedDocument, StagingArea};
use crate::utils::{ProjectError, Result};

/// 磁盘上的文本编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringsEncoding {
    #[default]
    Utf8,
    /// 带 BOM 的 UTF-8
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl StringsEncoding {
    /// 按 BOM 解码
    pub fn decode(bytes: &[u8]) -> (String, Self) {
        match encoding_rs::Encoding::for_bom(bytes) {
            Some((encoding, bom_len)) => {
                let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
                let kind = if encoding == encoding_rs::UTF_16LE {
                    StringsEncoding::Utf16Le
                } else if encoding == encoding_rs::UTF_16BE {
                    StringsEncoding::Utf16Be
                } else {
                    StringsEncoding::Utf8Bom
                };
                (text.into_owned(), kind)
            }
            None => (String::from_utf8_lossy(bytes).into_owned(), StringsEncoding::Utf8),
        }
    }

    /// 以相同编码（含 BOM）编码
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            StringsEncoding::Utf8 => text.as_bytes().to_vec(),
            StringsEncoding::Utf8Bom => {
                let mut out = vec![0xEF, 0xBB, 0xBF];
                out.extend_from_slice(text.as_bytes());
                out
            }
            StringsEncoding::Utf16Le => {
                let mut out = vec![0xFF, 0xFE];
                out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
                out
            }
            StringsEncoding::Utf16Be => {
                let mut out = vec![0xFE, 0xFF];
                out.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
                out
            }
        }
    }
}

/// iOS `.strings` 本地化表
#[derive(Debug, Clone, Default)]
pub struct StringsFile {
    nodes: Vec<StringsNode>,
    encoding: StringsEncoding,
    /// 加载时的原始字节
    source: Option<Vec<u8>>,
    modified: bool,
}

impl StringsFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从原始字节解析（按 BOM 识别编码）
    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self> {
        let (text, encoding) = StringsEncoding::decode(&bytes);
        let nodes = parse_strings(&text).map_err(|e| ProjectError::grammar(path, e))?;
        Ok(Self {
            nodes,
            encoding,
            source: Some(bytes),
            modified: false,
        })
    }

    pub fn open<'a>(staging: &'a mut StagingArea, path: &Path) -> Result<&'a mut Self> {
        Self::open_with_outcome(staging, path).map(|(file, _)| file)
    }

    pub fn open_with_outcome<'a>(
        staging: &'a mut StagingArea,
        path: &Path,
    ) -> Result<(&'a mut Self, LoadOutcome)> {
        let (file, outcome) = staging.open_with(path, |bytes| match bytes {
            Some(bytes) => Self::from_bytes(path, bytes),
            None => Ok(Self::new()),
        })?;
        if outcome != LoadOutcome::AlreadyOpen {
            debug!(path = %path.display(), ?outcome, "loaded strings");
        }
        Ok((file, outcome))
    }

    /// 所有节点（含空白与注释）
    pub fn nodes(&self) -> &[StringsNode] {
        &self.nodes
    }

    /// 所有键值条目
    pub fn entries(&self) -> impl Iterator<Item = &StringsEntry> {
        self.nodes.iter().filter_map(StringsNode::as_entry)
    }

    /// 第一个匹配键的值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn encoding(&self) -> StringsEncoding {
        self.encoding
    }

    /// 插入或更新
    ///
    /// 已存在的键只改写第一个条目的值；新键追加在末尾，与前文空一行
    pub fn set<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in values {
            let (key, value) = (key.as_ref(), value.as_ref());
            let existing = self.nodes.iter_mut().find_map(|node| match node {
                StringsNode::Entry(entry) if entry.key == key => Some(entry),
                _ => None,
            });

            match existing {
                Some(entry) => {
                    if entry.value != value {
                        entry.set_value(value);
                        self.modified = true;
                    }
                }
                None => {
                    self.append(StringsEntry::new(key, value));
                    self.modified = true;
                }
            }
        }
        recompute_positions(&mut self.nodes);
    }

    /// 从 JSON 对象读取键值后调用 [`set`](Self::set)；非字符串值按 JSON 文本写入
    pub fn set_from_json(&mut self, json: &[u8]) -> Result<()> {
        let values: IndexMap<String, serde_json::Value> = serde_json::from_slice(json)?;
        let values = values.into_iter().map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        });
        self.set(values);
        Ok(())
    }

    /// 新条目放在末尾空白之前，保留文件的结尾换行
    fn append(&mut self, entry: StringsEntry) {
        let trailing = match self.nodes.last() {
            Some(StringsNode::Filler(text)) if text.trim().is_empty() => 1,
            _ => 0,
        };
        let at = self.nodes.len() - trailing;
        let has_content = at > 0;

        let mut insert = Vec::with_capacity(2);
        if has_content {
            insert.push(StringsNode::Filler("\n\n".to_string()));
        }
        insert.push(StringsNode::Entry(entry));
        self.nodes.splice(at..at, insert);
    }

    /// 生成文本
    pub fn generate(&self) -> String {
        generate_strings(&self.nodes)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl StagedDocument for StringsFile {
    fn kind(&self) -> &'static str {
        "strings"
    }

    fn render(&self) -> Result<Vec<u8>> {
        match (&self.source, self.modified) {
            (Some(source), false) => Ok(source.clone()),
            _ => Ok(self.encoding.encode(&self.generate())),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
