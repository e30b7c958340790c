/// Gradle 构建脚本编辑器
///
/// 按点分路径（如 `android.defaultConfig`）定位花括号块，以文本拼接的方式
/// 替换或插入语句。块结构在每次修改时重新扫描，不维护语法树。
mod scanner;


use std::any::Any;
use std::ops::Range;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::editor::{StagedDocument, StagingArea};
use crate::utils::{ProjectError, Result};
use scanner::{find_block, scan_blocks, Block};

const DEFAULT_INDENT: &str = "    ";
pub(crate) const DEFAULT_CONFIG: &str = "android.defaultConfig";

/// 结构化插入的语句写法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradleInsertType {
    /// 沿用块内已有写法：有 `=` 赋值时用 `key = value`，否则 `key value`
    #[default]
    Infer,
    /// `key(value)`
    Method,
    /// `key = value`
    Variable,
}

/// 待插入的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradleEntry {
    /// 键值，值为原始 Gradle 表达式（字符串需自带引号）
    Property { key: String, value: String },
    /// 原样插入的一行
    Raw(String),
}

impl GradleEntry {
    pub fn property(key: impl Into<String>, value: impl Into<String>) -> Self {
        GradleEntry::Property {
            key: key.into(),
            value: value.into(),
        }
    }

    fn render(&self, insert_type: GradleInsertType, uses_assignment: bool) -> String {
        match self {
            GradleEntry::Raw(text) => text.trim().to_string(),
            GradleEntry::Property { key, value } => match insert_type {
                GradleInsertType::Method => format!("{}({})", key, value),
                GradleInsertType::Variable => format!("{} = {}", key, value),
                GradleInsertType::Infer if uses_assignment => format!("{} = {}", key, value),
                GradleInsertType::Infer => format!("{} {}", key, value),
            },
        }
    }
}

/// 块内的一条语句（只含直接位于该块中的语句）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub key: String,
    /// 键与值之间的原始文本，如 `" "`、`" = "`、`"("`
    pub separator: String,
    pub value: String,
    /// 值之后的原始文本（方法调用写法的 `)`）
    pub suffix: String,
    /// 整条语句（已去除首尾空白）
    pub text: String,
    range: Range<usize>,
}

impl Statement {
    fn parse(text: &str, start: usize) -> Option<Self> {
        let key_len = text
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '$')))
            .unwrap_or(text.len());
        if key_len == 0 {
            return None;
        }
        let key = &text[..key_len];
        let rest = &text[key_len..];
        let after_ws = rest.trim_start();
        let ws = &rest[..rest.len() - after_ws.len()];

        let (separator, value, suffix) = if let Some(value) = after_ws.strip_prefix('=') {
            let trimmed = value.trim_start();
            let sep = format!("{}={}", ws, &value[..value.len() - trimmed.len()]);
            (sep, trimmed.to_string(), String::new())
        } else if after_ws.starts_with('(') && after_ws.ends_with(')') {
            let inner = &after_ws[1..after_ws.len() - 1];
            (format!("{}(", ws), inner.to_string(), ")".to_string())
        } else {
            (ws.to_string(), after_ws.to_string(), String::new())
        };

        Some(Self {
            key: key.to_string(),
            separator,
            value,
            suffix,
            text: text.to_string(),
            range: start..start + text.len(),
        })
    }

    /// 去掉引号后的值
    pub fn unquoted_value(&self) -> &str {
        unquote(&self.value)
    }

    fn with_value(&self, value: &str) -> String {
        format!("{}{}{}{}", self.key, self.separator, value, self.suffix)
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// 折叠空白，用于判断片段是否已存在
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 行首空白
fn line_indent(src: &str, pos: usize) -> &str {
    let line_start = src[..pos].rfind('\n').map_or(0, |i| i + 1);
    let line = &src[line_start..];
    &line[..line.len() - line.trim_start().len()]
}

/// Gradle 构建脚本
#[derive(Debug, Clone)]
pub struct GradleFile {
    path: PathBuf,
    text: String,
    modified: bool,
}

impl GradleFile {
    /// 解析并校验花括号配对
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        scan_blocks(text).map_err(|e| ProjectError::grammar(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            text: text.to_string(),
            modified: false,
        })
    }

    /// 在暂存区中打开；文件不存在时返回 NotFound IO 错误
    pub fn open<'a>(staging: &'a mut StagingArea, path: &Path) -> Result<&'a mut Self> {
        let (file, outcome) = staging.open_with(path, |bytes| match bytes {
            Some(bytes) => Self::parse(path, &String::from_utf8_lossy(&bytes)),
            None => Err(ProjectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ))),
        })?;
        debug!(path = %path.display(), ?outcome, "gradle");
        Ok(file)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn block(&self, target: &str) -> Result<Block> {
        let blocks = scan_blocks(&self.text).map_err(|e| ProjectError::grammar(&self.path, e))?;
        find_block(&blocks, target)
            .cloned()
            .ok_or_else(|| ProjectError::GradleBlockNotFound {
                path: self.path.clone(),
                target: target.to_string(),
            })
    }

    /// 块是否存在
    pub fn has_block(&self, target: &str) -> bool {
        self.block(target).is_ok()
    }

    /// 直接位于块内的语句（跳过子块、块头、空行与注释行）
    pub fn statements(&self, target: &str) -> Result<Vec<Statement>> {
        let block = self.block(target)?;
        let blocks = scan_blocks(&self.text).map_err(|e| ProjectError::grammar(&self.path, e))?;
        let children: Vec<&Block> = blocks
            .iter()
            .filter(|b| b.open > block.open && b.close < block.close)
            .collect();

        let body = block.body();
        let mut statements = Vec::new();
        let mut offset = body.start;

        for line in self.text[body.clone()].split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*') {
                continue;
            }
            let start = line_start + (line.len() - line.trim_start().len());
            let nested = children
                .iter()
                .any(|b| (b.head_start <= start && start <= b.close) || (b.open >= start && b.open < offset));
            if nested {
                continue;
            }
            if let Some(statement) = Statement::parse(trimmed, start) {
                statements.push(statement);
            }
        }

        Ok(statements)
    }

    /// 块内第一个键匹配的语句值（已去除引号）
    pub fn get_property(&self, target: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .statements(target)?
            .into_iter()
            .find(|s| s.key == key)
            .map(|s| s.unquoted_value().to_string()))
    }

    /// 替换块内语句的值
    ///
    /// `exact` 时语句键必须与给定键相同，否则语句以给定文本开头即可。
    /// 返回被匹配的语句数。
    pub fn replace_properties(
        &mut self,
        target: &str,
        replacements: &IndexMap<String, String>,
        exact: bool,
    ) -> Result<usize> {
        let statements = self.statements(target)?;
        let mut splices = Vec::new();

        for statement in &statements {
            let hit = replacements.iter().find(|(key, _)| {
                statement.key == **key || (!exact && statement.text.starts_with(key.as_str()))
            });
            if let Some((_, value)) = hit {
                let text = statement.with_value(value);
                splices.push((statement.range.clone(), text));
            }
        }

        let matched = splices.len();
        if matched == 0 {
            warn!(path = %self.path.display(), target, keys = ?replacements.keys().collect::<Vec<_>>(), "no gradle statements matched");
        }
        for (range, text) in splices.into_iter().rev() {
            if self.text[range.clone()] != text {
                self.text.replace_range(range, &text);
                self.modified = true;
            }
        }

        debug!(path = %self.path.display(), target, matched, "replaced gradle properties");
        Ok(matched)
    }

    /// 在块的结尾花括号前插入文本片段
    ///
    /// `exact` 时若块内已有等价片段（忽略空白差异）则跳过，返回是否插入
    pub fn insert_fragment(&mut self, target: &str, fragment: &str, exact: bool) -> Result<bool> {
        let block = self.block(target)?;
        if exact && normalize(&self.text[block.body()]).contains(&normalize(fragment)) {
            debug!(path = %self.path.display(), target, "fragment already present");
            return Ok(false);
        }

        let lines = dedent_lines(fragment);
        if lines.is_empty() {
            return Ok(false);
        }
        self.splice_lines(&block, &lines);
        debug!(path = %self.path.display(), target, "inserted gradle fragment");
        Ok(true)
    }

    /// 按写法渲染条目并插入块尾，跳过已存在的条目
    ///
    /// 重复判断：`exact` 时比较整条语句，否则比较键与去引号后的值。
    /// 返回插入的条目数。
    pub fn insert_properties(
        &mut self,
        target: &str,
        entries: &[GradleEntry],
        insert_type: GradleInsertType,
        exact: bool,
    ) -> Result<usize> {
        let block = self.block(target)?;
        let statements = self.statements(target)?;
        let uses_assignment = statements.iter().any(|s| s.separator.contains('='));

        let mut lines: Vec<String> = Vec::new();
        for entry in entries {
            let rendered = entry.render(insert_type, uses_assignment);
            let duplicate = match entry {
                GradleEntry::Property { key, value } if !exact => statements
                    .iter()
                    .any(|s| s.key == *key && s.unquoted_value() == unquote(value)),
                _ => statements
                    .iter()
                    .any(|s| normalize(&s.text) == normalize(&rendered)),
            };
            if !duplicate && !lines.contains(&rendered) {
                lines.push(rendered);
            }
        }

        if !lines.is_empty() {
            self.splice_lines(&block, &lines);
        }
        debug!(path = %self.path.display(), target, inserted = lines.len(), "inserted gradle properties");
        Ok(lines.len())
    }

    /// 设置语句值；语句不存在时插入
    pub fn set_property(&mut self, target: &str, key: &str, value: &str) -> Result<()> {
        let exists = self.statements(target)?.iter().any(|s| s.key == key);
        if exists {
            let mut replacement = IndexMap::new();
            replacement.insert(key.to_string(), value.to_string());
            self.replace_properties(target, &replacement, true)?;
        } else {
            self.insert_properties(
                target,
                &[GradleEntry::property(key, value)],
                GradleInsertType::Infer,
                true,
            )?;
        }
        Ok(())
    }

    /// 设置字符串值，沿用原有的引号风格
    fn set_string_property(&mut self, target: &str, key: &str, value: &str) -> Result<()> {
        let quote = self
            .statements(target)?
            .into_iter()
            .find(|s| s.key == key)
            .and_then(|s| s.value.trim().chars().next().filter(|c| *c == '\''))
            .unwrap_or('"');
        self.set_property(target, key, &format!("{quote}{value}{quote}"))
    }

    pub fn version_code(&self) -> Result<Option<u64>> {
        Ok(self
            .get_property(DEFAULT_CONFIG, "versionCode")?
            .and_then(|v| v.parse().ok()))
    }

    pub fn set_version_code(&mut self, version_code: u64) -> Result<()> {
        self.set_property(DEFAULT_CONFIG, "versionCode", &version_code.to_string())
    }

    /// versionCode 加一，返回新值
    pub fn increment_version_code(&mut self) -> Result<u64> {
        let current = self.version_code()?.ok_or_else(|| {
            ProjectError::Configuration(format!(
                "versionCode not found in {}",
                self.path.display()
            ))
        })?;
        self.set_version_code(current + 1)?;
        Ok(current + 1)
    }

    pub fn version_name(&self) -> Result<Option<String>> {
        self.get_property(DEFAULT_CONFIG, "versionName")
    }

    pub fn set_version_name(&mut self, version_name: &str) -> Result<()> {
        self.set_string_property(DEFAULT_CONFIG, "versionName", version_name)
    }

    pub fn application_id(&self) -> Result<Option<String>> {
        self.get_property(DEFAULT_CONFIG, "applicationId")
    }

    pub fn set_application_id(&mut self, application_id: &str) -> Result<()> {
        self.set_string_property(DEFAULT_CONFIG, "applicationId", application_id)
    }

    /// 在块尾插入若干行，按块内缩进对齐
    fn splice_lines(&mut self, block: &Block, lines: &[String]) {
        let block_indent = line_indent(&self.text, block.head_start).to_string();
        let indent = self.body_indent(block, &block_indent);

        let text: String = lines
            .iter()
            .map(|line| {
                let line = line.trim_end();
                if line.is_empty() {
                    "\n".to_string()
                } else {
                    format!("\n{}{}", indent, line)
                }
            })
            .collect();

        let body = block.body();
        let content = &self.text[body.clone()];
        if content.trim().is_empty() {
            self.text
                .replace_range(body, &format!("{}\n{}", text, block_indent));
        } else {
            let at = body.start + content.trim_end().len();
            self.text.insert_str(at, &text);
        }
        self.modified = true;
    }

    fn body_indent(&self, block: &Block, block_indent: &str) -> String {
        let existing = self.text[block.body()]
            .lines()
            .skip(1)
            .find(|line| !line.trim().is_empty())
            .map(|line| &line[..line.len() - line.trim_start().len()]);

        match existing {
            Some(indent) if indent.len() > block_indent.len() => indent.to_string(),
            _ => {
                let unit = if block_indent.contains('\t') { "\t" } else { DEFAULT_INDENT };
                format!("{}{}", block_indent, unit)
            }
        }
    }
}

/// 片段去公共缩进后的各行（去除首尾空行，内部多行结构保留）
fn dedent_lines(fragment: &str) -> Vec<String> {
    let lines: Vec<&str> = fragment.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return Vec::new();
    };

    let lines = &lines[first..=last];
    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| l.get(common..).unwrap_or("").trim_end().to_string())
        .collect()
}

impl StagedDocument for GradleFile {
    fn kind(&self) -> &'static str {
        "gradle"
    }

    fn render(&self) -> Result<Vec<u8>> {
        Ok(self.text.as_bytes().to_vec())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
