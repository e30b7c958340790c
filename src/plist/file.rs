use std::any::Any;
use std::path::Path;

use tracing::debug;

use super::{parse_plist, write_plist, PlistValue};
use crate::editor::{LoadOutcome, StagedDocument, StagingArea};
use crate::merge::{merge_into, MergePolicy};
use crate::utils::{ProjectError, Result};

/// 属性列表编辑器
///
/// 文档根始终是字典。三种合并算法对应 [`MergePolicy`] 的三个变体：
/// - `set`: 数组与字典由新值整体覆盖
/// - `merge`: 数组去重拼接
/// - `update`: 兼容旧调用方的算法，由 `replace` 控制
#[derive(Debug, Clone)]
pub struct PlistFile {
    /// 加载时的原文（未修改时原样写回）
    source: Option<String>,
    doc: PlistValue,
    modified: bool,
}

impl Default for PlistFile {
    fn default() -> Self {
        Self::new()
    }
}

impl PlistFile {
    /// 创建空文档
    pub fn new() -> Self {
        Self {
            source: None,
            doc: PlistValue::empty_dict(),
            modified: false,
        }
    }

    /// 从文本解析
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let doc = parse_plist(text).map_err(|e| ProjectError::grammar(path, e))?;
        if !matches!(doc, PlistValue::Dictionary(_)) {
            return Err(ProjectError::grammar(path, "plist root must be a <dict>"));
        }
        Ok(Self {
            source: Some(text.to_string()),
            doc,
            modified: false,
        })
    }

    /// 在暂存区中打开（已打开时直接返回现有模型）
    pub fn open<'a>(staging: &'a mut StagingArea, path: &Path) -> Result<&'a mut Self> {
        Self::open_with_outcome(staging, path).map(|(file, _)| file)
    }

    /// 同 [`open`](Self::open)，同时返回文件是新建还是从磁盘加载
    pub fn open_with_outcome<'a>(
        staging: &'a mut StagingArea,
        path: &Path,
    ) -> Result<(&'a mut Self, LoadOutcome)> {
        let (file, outcome) = staging.open_with(path, |bytes| match bytes {
            Some(bytes) => Self::parse(path, &String::from_utf8_lossy(&bytes)),
            None => Ok(Self::new()),
        })?;
        if outcome != LoadOutcome::AlreadyOpen {
            debug!(path = %path.display(), ?outcome, "loaded plist");
        }
        Ok((file, outcome))
    }

    /// 获取文档
    pub fn document(&self) -> &PlistValue {
        &self.doc
    }

    /// 获取可变文档（视为已修改）
    pub fn document_mut(&mut self) -> &mut PlistValue {
        self.modified = true;
        &mut self.doc
    }

    /// 整体替换文档
    pub fn set_document(&mut self, doc: PlistValue) {
        self.doc = doc;
        self.modified = true;
    }

    /// 用 plist XML 文本替换文档
    pub fn set_from_xml(&mut self, xml: &str) -> Result<()> {
        let doc = parse_plist(xml).map_err(|e| ProjectError::grammar("<inline plist>", e))?;
        self.set_document(doc);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PlistValue> {
        self.doc.get(key)
    }

    /// 设置单个顶层键
    pub fn insert(&mut self, key: &str, value: impl Into<PlistValue>) {
        if let Some(dict) = self.document_mut().as_dict_mut() {
            dict.insert(key.to_string(), value.into());
        }
    }

    /// 合并，已有数组/字典由新值整体覆盖
    pub fn set(&mut self, patch: PlistValue) {
        self.apply(patch, MergePolicy::Overwrite);
    }

    /// 合并，数组去重拼接
    pub fn merge(&mut self, patch: PlistValue) {
        self.apply(patch, MergePolicy::Union);
    }

    /// 兼容旧行为的合并算法
    pub fn update(&mut self, entries: PlistValue, replace: bool) {
        self.apply(entries, MergePolicy::Update { replace });
    }

    fn apply(&mut self, patch: PlistValue, policy: MergePolicy) {
        // 非字典补丁没有可合并的键
        if !matches!(patch, PlistValue::Dictionary(_)) {
            return;
        }
        merge_into(self.document_mut(), patch, policy);
    }

    /// 序列化为 XML
    pub fn to_xml(&self) -> String {
        write_plist(&self.doc)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl StagedDocument for PlistFile {
    fn kind(&self) -> &'static str {
        "plist"
    }

    fn render(&self) -> Result<Vec<u8>> {
        match (&self.source, self.modified) {
            (Some(source), false) => Ok(source.as_bytes().to_vec()),
            _ => Ok(self.to_xml().into_bytes()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
