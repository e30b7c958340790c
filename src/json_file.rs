/// JSON 资源文件编辑器
use std::any::Any;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::editor::{StagedDocument, StagingArea};
use crate::merge::{merge_into, MergePolicy, MergeValue};
use crate::utils::{ProjectError, Result};

/// JSON 文件
///
/// 键顺序保持不变（serde_json `preserve_order`），输出为两空格缩进
#[derive(Debug, Clone)]
pub struct JsonFile {
    source: Option<String>,
    doc: Value,
    modified: bool,
}

impl Default for JsonFile {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFile {
    pub fn new() -> Self {
        Self {
            source: None,
            doc: Value::Object(Map::new()),
            modified: false,
        }
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let doc = if text.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(text).map_err(|e| ProjectError::grammar(path, e.to_string()))?
        };
        Ok(Self {
            source: Some(text.to_string()),
            doc,
            modified: false,
        })
    }

    /// 在暂存区中打开
    pub fn open<'a>(staging: &'a mut StagingArea, path: &Path) -> Result<&'a mut Self> {
        let (file, outcome) = staging.open_with(path, |bytes| match bytes {
            Some(bytes) => Self::parse(path, &String::from_utf8_lossy(&bytes)),
            None => Ok(Self::new()),
        })?;
        debug!(path = %path.display(), ?outcome, "json");
        Ok(file)
    }

    pub fn document(&self) -> &Value {
        &self.doc
    }

    /// 合并，数组和对象整体覆盖
    pub fn set(&mut self, patch: Value) {
        self.apply(patch, MergePolicy::Overwrite);
    }

    /// 合并，数组去重拼接
    pub fn merge(&mut self, patch: Value) {
        self.apply(patch, MergePolicy::Union);
    }

    fn apply(&mut self, patch: Value, policy: MergePolicy) {
        if !patch.is_object() {
            return;
        }
        merge_into(&mut self.doc, patch, policy);
        self.modified = true;
    }

    /// 序列化（两空格缩进，末尾换行）
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&self.doc)?;
        out.push('\n');
        Ok(out)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl StagedDocument for JsonFile {
    fn kind(&self) -> &'static str {
        "json"
    }

    fn render(&self) -> Result<Vec<u8>> {
        match (&self.source, self.modified) {
            (Some(source), false) => Ok(source.as_bytes().to_vec()),
            _ => Ok(self.to_json()?.into_bytes()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl MergeValue for Value {
    fn as_array(&self) -> Option<&[Self]> {
        Value::as_array(self).map(Vec::as_slice)
    }

    fn is_object(&self) -> bool {
        Value::is_object(self)
    }

    fn from_array(items: Vec<Self>) -> Self {
        Value::Array(items)
    }

    fn entry_mut(&mut self, key: &str) -> Option<&mut Self> {
        self.as_object_mut().and_then(|map| map.get_mut(key))
    }

    fn insert_entry(&mut self, key: String, value: Self) {
        if let Some(map) = self.as_object_mut() {
            map.insert(key, value);
        }
    }

    fn into_entries(self) -> Option<Vec<(String, Self)>> {
        match self {
            Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOURCE: &str = "{\n    \"name\": \"app\",\n    \"plugins\": [\"a\"]\n}";

    #[test]
    fn test_unmodified_roundtrip() {
        let file = JsonFile::parse(Path::new("a.json"), SOURCE).unwrap();
        assert_eq!(file.render().unwrap(), SOURCE.as_bytes());
    }

    #[test]
    fn test_set_and_merge() {
        let mut file = JsonFile::parse(Path::new("a.json"), SOURCE).unwrap();
        file.merge(json!({"plugins": ["b"]}));
        assert_eq!(file.document()["plugins"], json!(["a", "b"]));

        file.set(json!({"plugins": ["c"], "extra": {"x": 1}}));
        assert_eq!(
            file.to_json().unwrap(),
            "{\n  \"name\": \"app\",\n  \"plugins\": [\n    \"c\"\n  ],\n  \"extra\": {\n    \"x\": 1\n  }\n}\n"
        );
    }

    #[test]
    fn test_invalid_json_is_grammar_error() {
        let result = JsonFile::parse(Path::new("bad.json"), "{ nope");
        assert!(matches!(result, Err(ProjectError::Grammar { .. })));
    }
}
