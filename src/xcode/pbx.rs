use std::borrow::Cow;
use std::fmt;

/// pbxproj 中的字符串（键、标识符或值）
///
/// 保存文件中的原文以便原样写回；`quoted` 记录原文是否带引号。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbxString {
    /// 引号内的原文，转义序列保持原样
    raw: String,
    quoted: bool,
}

impl PbxString {
    /// 由逻辑值构造，按 Xcode 规则决定是否加引号
    pub fn new(value: &str) -> Self {
        if needs_quotes(value) {
            Self {
                raw: escape(value),
                quoted: true,
            }
        } else {
            Self {
                raw: value.to_string(),
                quoted: false,
            }
        }
    }

    pub(crate) fn from_raw(raw: &str, quoted: bool) -> Self {
        Self {
            raw: raw.to_string(),
            quoted,
        }
    }

    /// 逻辑值（去引号、反转义）
    pub fn value(&self) -> Cow<'_, str> {
        if self.quoted && self.raw.contains('\\') {
            Cow::Owned(unescape(&self.raw))
        } else {
            Cow::Borrowed(&self.raw)
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    pub(crate) fn write(&self, out: &mut String) {
        if self.quoted {
            out.push('"');
            out.push_str(&self.raw);
            out.push('"');
        } else {
            out.push_str(&self.raw);
        }
    }
}

impl fmt::Display for PbxString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value())
    }
}

impl From<&str> for PbxString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// 不需要引号的字符集：字母数字与 `_$/:.`
fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '/' | ':' | '.'))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// pbxproj 值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PbxValue {
    String(PbxString),
    Array(Vec<PbxItem>),
    Object(PbxObject),
}

impl PbxValue {
    pub fn string(value: &str) -> Self {
        PbxValue::String(PbxString::new(value))
    }

    pub fn as_str(&self) -> Option<Cow<'_, str>> {
        match self {
            PbxValue::String(s) => Some(s.value()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&PbxObject> {
        match self {
            PbxValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut PbxObject> {
        match self {
            PbxValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PbxItem]> {
        match self {
            PbxValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<PbxItem>> {
        match self {
            PbxValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for PbxValue {
    fn from(value: &str) -> Self {
        PbxValue::string(value)
    }
}

impl From<String> for PbxValue {
    fn from(value: String) -> Self {
        PbxValue::string(&value)
    }
}

impl From<PbxObject> for PbxValue {
    fn from(value: PbxObject) -> Self {
        PbxValue::Object(value)
    }
}

/// 数组元素及其注释
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbxItem {
    pub value: PbxValue,
    pub comment: Option<String>,
}

impl PbxItem {
    pub fn new(value: impl Into<PbxValue>, comment: Option<&str>) -> Self {
        Self {
            value: value.into(),
            comment: comment.map(str::to_string),
        }
    }
}

/// 字典条目，`/* ... */` 注释分别挂在键和值上
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbxEntry {
    pub key: PbxString,
    pub key_comment: Option<String>,
    pub value: PbxValue,
    pub value_comment: Option<String>,
}

impl PbxEntry {
    pub fn new(key: &str, value: impl Into<PbxValue>) -> Self {
        Self {
            key: PbxString::new(key),
            key_comment: None,
            value: value.into(),
            value_comment: None,
        }
    }

    pub fn with_key_comment(mut self, comment: &str) -> Self {
        self.key_comment = Some(comment.to_string());
        self
    }

    pub fn with_value_comment(mut self, comment: &str) -> Self {
        self.value_comment = Some(comment.to_string());
        self
    }
}

/// 有序字典（保持文件中的键顺序）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PbxObject {
    entries: Vec<PbxEntry>,
}

impl PbxObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[PbxEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut PbxEntry> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, key: &str) -> Option<&PbxEntry> {
        self.entries.iter().find(|e| e.key.value() == key)
    }

    pub fn entry_mut(&mut self, key: &str) -> Option<&mut PbxEntry> {
        self.entries.iter_mut().find(|e| e.key.value() == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&PbxValue> {
        self.entry(key).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PbxValue> {
        self.entry_mut(key).map(|e| &mut e.value)
    }

    /// 字符串值
    pub fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).and_then(PbxValue::as_str)
    }

    /// 设置键值；已存在时只替换值（保留键注释，清除旧的值注释）
    pub fn insert(&mut self, key: &str, value: impl Into<PbxValue>) {
        let value = value.into();
        match self.entry_mut(key) {
            Some(entry) => {
                entry.value = value;
                entry.value_comment = None;
            }
            None => self.entries.push(PbxEntry::new(key, value)),
        }
    }

    /// 追加完整条目（不检查重复）
    pub fn push(&mut self, entry: PbxEntry) {
        self.entries.push(entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<PbxEntry> {
        let index = self.entries.iter().position(|e| e.key.value() == key)?;
        Some(self.entries.remove(index))
    }
}
