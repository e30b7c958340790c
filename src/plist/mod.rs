mod file;
mod parse;
mod write;

#[cfg(test)]
mod tests;

pub use file::PlistFile;
pub use parse::parse_plist;
pub use write::write_plist;

use indexmap::IndexMap;

use crate::merge::MergeValue;

/// plist 字典类型（保持键的插入顺序）
pub type PlistDict = IndexMap<String, PlistValue>;

/// 属性列表节点
#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    /// ISO 8601 文本，原样保留
    Date(String),
    /// base64 文本（已去除空白）
    Data(String),
    Array(Vec<PlistValue>),
    Dictionary(PlistDict),
}

impl PlistValue {
    /// 空字典
    pub fn empty_dict() -> Self {
        PlistValue::Dictionary(PlistDict::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PlistValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PlistValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&PlistDict> {
        match self {
            PlistValue::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut PlistDict> {
        match self {
            PlistValue::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// 字典键查找
    pub fn get(&self, key: &str) -> Option<&PlistValue> {
        self.as_dict().and_then(|d| d.get(key))
    }

    /// 从 JSON 值转换
    ///
    /// `null` 没有对应的 plist 类型，返回 None；字典中的 `null` 键被丢弃
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        Some(match value {
            Value::Null => return None,
            Value::Bool(b) => PlistValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PlistValue::Integer(i),
                None => PlistValue::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => PlistValue::String(s),
            Value::Array(items) => {
                PlistValue::Array(items.into_iter().filter_map(Self::from_json).collect())
            }
            Value::Object(map) => PlistValue::Dictionary(
                map.into_iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k, v)))
                    .collect(),
            ),
        })
    }
}

impl From<&str> for PlistValue {
    fn from(value: &str) -> Self {
        PlistValue::String(value.to_string())
    }
}

impl From<String> for PlistValue {
    fn from(value: String) -> Self {
        PlistValue::String(value)
    }
}

impl From<i64> for PlistValue {
    fn from(value: i64) -> Self {
        PlistValue::Integer(value)
    }
}

impl From<bool> for PlistValue {
    fn from(value: bool) -> Self {
        PlistValue::Boolean(value)
    }
}

impl MergeValue for PlistValue {
    fn as_array(&self) -> Option<&[Self]> {
        match self {
            PlistValue::Array(items) => Some(items),
            _ => None,
        }
    }

    fn is_object(&self) -> bool {
        matches!(self, PlistValue::Dictionary(_))
    }

    fn from_array(items: Vec<Self>) -> Self {
        PlistValue::Array(items)
    }

    fn entry_mut(&mut self, key: &str) -> Option<&mut Self> {
        self.as_dict_mut().and_then(|d| d.get_mut(key))
    }

    fn insert_entry(&mut self, key: String, value: Self) {
        if let Some(d) = self.as_dict_mut() {
            d.insert(key, value);
        }
    }

    fn into_entries(self) -> Option<Vec<(String, Self)>> {
        match self {
            PlistValue::Dictionary(d) => Some(d.into_iter().collect()),
            _ => None,
        }
    }
}
