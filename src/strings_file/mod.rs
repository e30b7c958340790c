mod file;
mod parse;

#[cfg(test)]
mod tests;

pub use file::{StringsEncoding, StringsFile};
pub use parse::{generate_strings, parse_strings};

/// `.strings` 表中的一个键值条目
///
/// 行号从 0 开始，列号从 1 开始；`end_col` 指向结尾 `;` 所在列。
/// 位置只是附加信息，插入新条目后重新计算，不用于定位。
#[derive(Debug, Clone, PartialEq)]
pub struct StringsEntry {
    /// 条目前最后一个注释的内容（不含 `/* */` 或 `//`）
    pub comment: String,
    pub key: String,
    pub value: String,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
    /// 原文片段，用于未修改条目的逐字节还原
    pub(crate) raw: Option<RawEntry>,
}

/// 条目原文，按值的位置切成三段
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawEntry {
    /// 键开头到值内容之前（含开引号）
    pub prefix: String,
    /// 值的原始转义文本
    pub value: String,
    /// 值内容之后到 `;`（含闭引号）
    pub suffix: String,
}

impl StringsEntry {
    /// 新条目（位置在加入文档后计算）
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            comment: String::new(),
            key: key.into(),
            value: value.into(),
            start_line: 0,
            start_col: 0,
            end_line: 0,
            end_col: 0,
            raw: None,
        }
    }

    /// 更新值，保留键与分隔符的原始排版
    pub fn set_value(&mut self, value: &str) {
        if self.value == value {
            return;
        }
        self.value = value.to_string();
        if let Some(raw) = self.raw.as_mut() {
            raw.value = escape(value);
        }
    }

    /// 生成条目文本
    pub fn to_text(&self) -> String {
        match &self.raw {
            Some(raw) => format!("{}{}{}", raw.prefix, raw.value, raw.suffix),
            None => format!("\"{}\" = \"{}\";", escape(&self.key), escape(&self.value)),
        }
    }
}

/// 文档节点：条目或条目之间的原始文本（空白与注释）
#[derive(Debug, Clone, PartialEq)]
pub enum StringsNode {
    Entry(StringsEntry),
    Filler(String),
}

impl StringsNode {
    pub fn as_entry(&self) -> Option<&StringsEntry> {
        match self {
            StringsNode::Entry(entry) => Some(entry),
            StringsNode::Filler(_) => None,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            StringsNode::Entry(entry) => entry.to_text(),
            StringsNode::Filler(text) => text.clone(),
        }
    }
}

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
