use std::any::Any;
use std::ops::Range;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use roxmltree::{Document, Node};
use serde::Deserialize;
use tracing::{debug, warn, Level};

use super::selector::Selector;
use super::tag::scan_start_tag;
use super::{dedent, element_name, escape_attr, line_indent, parse_options, reindent, unescape};
use crate::editor::{StagedDocument, StagingArea};
use crate::utils::{ProjectError, Result};

/// 从根元素开始的子元素下标序列
type NodePath = Vec<usize>;

const DEFAULT_INDENT: &str = "    ";
const FRAGMENT_ROOT: &str = "fragment-root";

/// 属性写入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrMode {
    /// 保留补丁未提及的属性
    #[default]
    Merge,
    /// 清空后重写全部属性（命名空间声明除外）
    Replace,
}

struct Splice {
    range: Range<usize>,
    text: String,
}

/// XML 文件
///
/// 每次修改都基于当前文本重新解析，节点以子元素下标路径定位。
/// 选择器匹配不到节点时，`inject` 会补建简单路径，其余操作记录警告后跳过。
#[derive(Debug, Clone)]
pub struct XmlFile {
    path: PathBuf,
    text: String,
    modified: bool,
}

impl XmlFile {
    /// 解析并校验文本
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        Document::parse_with_options(text, parse_options())
            .map_err(|e| ProjectError::grammar(path, e.to_string()))?;
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
        debug!(path = %path.display(), ?outcome, "xml");
        Ok(file)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn document(&self) -> Result<Document<'_>> {
        Document::parse_with_options(&self.text, parse_options())
            .map_err(|e| ProjectError::grammar(&self.path, e.to_string()))
    }

    fn resolve(&self, selector: &Selector) -> Result<Vec<NodePath>> {
        let doc = self.document()?;
        Ok(selector
            .select(&doc, &self.text)
            .into_iter()
            .map(node_path)
            .collect())
    }

    /// 选择器匹配的节点数
    pub fn count(&self, selector: &str) -> Result<usize> {
        let selector = parse_selector(selector)?;
        Ok(self.resolve(&selector)?.len())
    }

    /// 第一个匹配节点的属性值
    pub fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let selector = parse_selector(selector)?;
        let doc = self.document()?;
        Ok(selector
            .select(&doc, &self.text)
            .first()
            .and_then(|node| attribute_value(&self.text, *node, name)))
    }

    /// 根元素的属性值
    pub fn root_attribute(&self, name: &str) -> Result<Option<String>> {
        let doc = self.document()?;
        Ok(attribute_value(&self.text, doc.root_element(), name))
    }

    /// 设置根元素的属性
    pub fn set_root_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.edit_at(&[], |src, node| set_attribute_splice(src, node, name, value))?;
        Ok(())
    }

    /// 设置所有匹配节点的单个属性
    pub fn set_attribute(&mut self, selector: &str, name: &str, value: &str) -> Result<usize> {
        let mut attrs = IndexMap::new();
        attrs.insert(name.to_string(), value.to_string());
        self.set_attrs(selector, &attrs, AttrMode::Merge)
    }

    /// 写入属性
    pub fn set_attrs(
        &mut self,
        selector: &str,
        attrs: &IndexMap<String, String>,
        mode: AttrMode,
    ) -> Result<usize> {
        let paths = self.matched(selector, "attrs")?;

        for path in &paths {
            match mode {
                AttrMode::Replace => {
                    self.edit_at(path, |src, node| replace_attributes_splice(src, node, attrs))?;
                }
                AttrMode::Merge => {
                    for (name, value) in attrs {
                        self.edit_at(path, |src, node| set_attribute_splice(src, node, name, value))?;
                    }
                }
            }
        }

        debug!(path = %self.path.display(), selector, matched = paths.len(), ?mode, "set attributes");
        Ok(paths.len())
    }

    /// 第一个匹配节点的文本内容
    pub fn text_content(&self, selector: &str) -> Result<Option<String>> {
        let selector = parse_selector(selector)?;
        let doc = self.document()?;
        Ok(selector
            .select(&doc, &self.text)
            .first()
            .map(|node| {
                node.children()
                    .filter(|n| n.is_text())
                    .filter_map(|n| n.text())
                    .collect()
            }))
    }

    /// 将所有匹配节点的内容替换为文本
    pub fn set_text(&mut self, selector: &str, text: &str) -> Result<usize> {
        let paths = self.matched(selector, "text")?;

        for path in &paths {
            self.edit_at(path, |src, node| set_text_splice(src, node, text))?;
        }

        debug!(path = %self.path.display(), selector, matched = paths.len(), "set text");
        Ok(paths.len())
    }

    /// 删除所有匹配节点上的指定属性
    pub fn delete_attributes<S: AsRef<str>>(&mut self, selector: &str, names: &[S]) -> Result<usize> {
        let paths = self.matched(selector, "deleteAttributes")?;

        for path in &paths {
            for name in names {
                self.edit_at(path, |src, node| remove_attribute_splice(src, node, name.as_ref()))?;
            }
        }

        debug!(path = %self.path.display(), selector, matched = paths.len(), "deleted attributes");
        Ok(paths.len())
    }

    /// 删除所有匹配节点（连同其所在行的缩进）
    pub fn delete(&mut self, selector: &str) -> Result<usize> {
        let paths = self.matched(selector, "delete")?;

        for path in paths.iter().rev() {
            if path.is_empty() {
                warn!(path = %self.path.display(), selector, "refusing to delete the root element");
                continue;
            }
            self.edit_at(path, |src, node| Some(remove_node_splice(src, node)))?;
        }

        debug!(path = %self.path.display(), selector, matched = paths.len(), "deleted nodes");
        Ok(paths.len())
    }

    /// 将片段作为子节点注入每个匹配节点（已有等价子节点时跳过）
    ///
    /// 选择器没有匹配且为简单的子元素路径时，先补建缺失的元素
    pub fn inject(&mut self, selector: &str, fragment: &str) -> Result<usize> {
        let parsed = parse_selector(selector)?;
        let mut paths = self.resolve(&parsed)?;
        if paths.is_empty() {
            match self.create_path(&parsed)? {
                Some(path) => paths.push(path),
                None => {
                    warn!(path = %self.path.display(), selector, "inject: no matching node and path cannot be created");
                    return Ok(0);
                }
            }
        }

        let wrapped = self.fragment_source(fragment)?;
        let fragment_doc = parse_fragment(&wrapped)?;
        let elements: Vec<Node> = fragment_doc
            .root_element()
            .children()
            .filter(|n| n.is_element())
            .collect();

        for path in &paths {
            for element in &elements {
                let wanted = canonical(&wrapped, *element);
                let present = {
                    let doc = self.document()?;
                    node_at(&doc, path).is_some_and(|parent| {
                        parent
                            .children()
                            .filter(|n| n.is_element())
                            .any(|child| canonical(&self.text, child) == wanted)
                    })
                };
                if !present {
                    self.insert_element(path, &wrapped, *element)?;
                }
            }
        }

        debug!(path = %self.path.display(), selector, matched = paths.len(), "injected");
        Ok(paths.len())
    }

    /// 将片段递归合并进每个匹配节点
    ///
    /// 片段根与目标同名时合并到目标本身，否则作为子节点合并。
    /// 子节点按标签名与 `android:name` / `name` 属性配对，配不上的追加。
    pub fn merge(&mut self, selector: &str, fragment: &str) -> Result<usize> {
        let paths = self.matched(selector, "merge")?;
        let wrapped = self.fragment_source(fragment)?;
        let fragment_doc = parse_fragment(&wrapped)?;

        for path in &paths {
            for element in fragment_doc.root_element().children().filter(|n| n.is_element()) {
                let same_tag = {
                    let doc = self.document()?;
                    node_at(&doc, path).is_some_and(|node| {
                        element_name(&self.text, node) == element_name(&wrapped, element)
                    })
                };
                if same_tag {
                    self.merge_element(path, &wrapped, element)?;
                } else {
                    self.merge_child(path, &wrapped, element)?;
                }
            }
        }

        debug!(path = %self.path.display(), selector, matched = paths.len(), "merged");
        Ok(paths.len())
    }

    /// 用片段整体替换每个匹配节点
    pub fn replace(&mut self, selector: &str, fragment: &str) -> Result<usize> {
        let paths = self.matched(selector, "replace")?;
        let wrapped = self.fragment_source(fragment)?;
        parse_fragment(&wrapped)?;
        let text = dedent(fragment);

        for path in paths.iter().rev() {
            self.edit_at(path, |src, node| {
                let replacement = reindent(&text, 0, line_indent(src, node.range().start));
                (src[node.range()] != replacement).then(|| Splice {
                    range: node.range(),
                    text: replacement,
                })
            })?;
        }

        debug!(path = %self.path.display(), selector, matched = paths.len(), "replaced");
        Ok(paths.len())
    }

    /// 解析选择器并解析匹配
    fn matched(&self, selector: &str, operation: &str) -> Result<Vec<NodePath>> {
        let parsed = parse_selector(selector)?;
        let paths = self.resolve(&parsed)?;
        if paths.is_empty() {
            if no_match_level(operation) == Level::WARN {
                warn!(path = %self.path.display(), selector, operation, "selector matched no nodes");
            } else {
                debug!(path = %self.path.display(), selector, operation, "selector matched no nodes");
            }
        }
        Ok(paths)
    }

    fn merge_element(&mut self, target: &[usize], fragment_src: &str, element: Node) -> Result<()> {
        if let Some(tag) = scan_start_tag(fragment_src, element.range().start) {
            for attr in tag.attrs.iter().filter(|a| !a.is_namespace_decl()) {
                let value = unescape(attr.value);
                self.edit_at(target, |src, node| set_attribute_splice(src, node, attr.name, &value))?;
            }
        }

        for child in element.children().filter(|n| n.is_element()) {
            self.merge_child(target, fragment_src, child)?;
        }
        Ok(())
    }

    fn merge_child(&mut self, target: &[usize], fragment_src: &str, element: Node) -> Result<()> {
        let name = element_name(fragment_src, element);
        let key = identity(fragment_src, element);

        let existing = {
            let doc = self.document()?;
            node_at(&doc, target).and_then(|parent| {
                parent
                    .children()
                    .filter(|n| n.is_element())
                    .position(|child| {
                        element_name(&self.text, child) == name
                            && match &key {
                                Some((attr, value)) => {
                                    attribute_value(&self.text, child, attr).as_ref() == Some(value)
                                }
                                None => true,
                            }
                    })
            })
        };

        match existing {
            Some(index) => {
                let mut path = target.to_vec();
                path.push(index);
                self.merge_element(&path, fragment_src, element)
            }
            None => self.insert_element(target, fragment_src, element).map(|_| ()),
        }
    }

    fn insert_element(&mut self, target: &[usize], fragment_src: &str, element: Node) -> Result<bool> {
        let text = &fragment_src[element.range()];
        let strip = line_indent(fragment_src, element.range().start).len();
        self.edit_at(target, |src, node| insert_child_splice(src, node, text, strip))
    }

    /// 补建简单路径中缺失的元素，返回最内层新元素的路径
    fn create_path(&mut self, selector: &Selector) -> Result<Option<NodePath>> {
        let Some(names) = selector.simple_path() else {
            return Ok(None);
        };

        for depth in (1..names.len()).rev() {
            let Some(parent) = self.resolve(&selector.prefix(depth))?.into_iter().next() else {
                continue;
            };

            let index = {
                let doc = self.document()?;
                node_at(&doc, &parent)
                    .map(|node| node.children().filter(|n| n.is_element()).count())
                    .unwrap_or(0)
            };
            let missing = &names[depth..];
            let text = nested_elements(missing);
            if !self.edit_at(&parent, |src, node| insert_child_splice(src, node, &text, 0))? {
                return Ok(None);
            }

            debug!(path = %self.path.display(), created = ?missing, "created missing xml path");
            let mut path = parent;
            path.push(index);
            path.extend(std::iter::repeat(0).take(missing.len() - 1));
            return Ok(Some(path));
        }

        Ok(None)
    }

    /// 用根元素的命名空间声明包裹片段，使带前缀的属性可以解析
    fn fragment_source(&self, fragment: &str) -> Result<String> {
        let doc = self.document()?;
        let namespaces: String = scan_start_tag(&self.text, doc.root_element().range().start)
            .map(|tag| {
                tag.attrs
                    .iter()
                    .filter(|a| a.is_namespace_decl())
                    .map(|a| format!(" {}=\"{}\"", a.name, a.value))
                    .collect()
            })
            .unwrap_or_default();
        Ok(format!(
            "<{root}{namespaces}>{fragment}</{root}>",
            root = FRAGMENT_ROOT
        ))
    }

    /// 在 `path` 处计算并应用一次拼接，返回是否有修改
    fn edit_at<F>(&mut self, path: &[usize], build: F) -> Result<bool>
    where
        F: FnOnce(&str, Node) -> Option<Splice>,
    {
        let splice = {
            let doc = self.document()?;
            let node = node_at(&doc, path).ok_or_else(|| {
                ProjectError::Configuration(format!(
                    "xml node {:?} no longer exists in {}",
                    path,
                    self.path.display()
                ))
            })?;
            build(&self.text, node)
        };

        match splice {
            Some(splice) => {
                self.text.replace_range(splice.range, &splice.text);
                self.modified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl StagedDocument for XmlFile {
    fn kind(&self) -> &'static str {
        "xml"
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

/// 选择器没有匹配时的日志级别；删除与属性修改静默跳过
pub(super) fn no_match_level(operation: &str) -> Level {
    match operation {
        "attrs" | "deleteAttributes" | "delete" => Level::DEBUG,
        _ => Level::WARN,
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(ProjectError::Configuration)
}

fn parse_fragment(wrapped: &str) -> Result<Document<'_>> {
    Document::parse_with_options(wrapped, parse_options())
        .map_err(|e| ProjectError::Configuration(format!("invalid xml fragment: {}", e)))
}

fn node_path(node: Node) -> NodePath {
    let mut path = Vec::new();
    let mut current = node;
    while let Some(parent) = current.parent_element() {
        let index = parent
            .children()
            .filter(|n| n.is_element())
            .position(|n| n == current)
            .unwrap_or(0);
        path.push(index);
        current = parent;
    }
    path.reverse();
    path
}

fn node_at<'a, 'input>(doc: &'a Document<'input>, path: &[usize]) -> Option<Node<'a, 'input>> {
    let mut node = doc.root_element();
    for &index in path {
        node = node.children().filter(|n| n.is_element()).nth(index)?;
    }
    Some(node)
}

fn attribute_value(src: &str, node: Node, name: &str) -> Option<String> {
    scan_start_tag(src, node.range().start)?
        .attr(name)
        .map(|a| unescape(a.value))
}

/// 子节点配对用的标识属性
fn identity(src: &str, node: Node) -> Option<(&'static str, String)> {
    ["android:name", "name"]
        .into_iter()
        .find_map(|attr| attribute_value(src, node, attr).map(|value| (attr, value)))
}

/// 忽略排版与属性顺序的结构表示
fn canonical(src: &str, node: Node) -> String {
    let mut out = String::new();
    write_canonical(src, node, &mut out);
    out
}

fn write_canonical(src: &str, node: Node, out: &mut String) {
    if node.is_text() {
        out.push_str(node.text().unwrap_or_default().trim());
        return;
    }
    if !node.is_element() {
        return;
    }

    let mut attrs: Vec<(String, String)> = scan_start_tag(src, node.range().start)
        .map(|tag| {
            tag.attrs
                .iter()
                .filter(|a| !a.is_namespace_decl())
                .map(|a| (a.name.to_string(), unescape(a.value)))
                .collect()
        })
        .unwrap_or_default();
    attrs.sort();

    out.push('<');
    out.push_str(element_name(src, node));
    for (name, value) in attrs {
        out.push_str(&format!(" {}=\"{}\"", name, value));
    }
    out.push('>');
    for child in node.children() {
        write_canonical(src, child, out);
    }
    out.push_str("</>");
}

fn nested_elements(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [leaf] => format!("<{}/>", leaf),
        [name, rest @ ..] => {
            let inner = nested_elements(rest)
                .lines()
                .map(|line| format!("{}{}", DEFAULT_INDENT, line))
                .collect::<Vec<_>>()
                .join("\n");
            format!("<{name}>\n{inner}\n</{name}>")
        }
    }
}

fn set_attribute_splice(src: &str, node: Node, name: &str, value: &str) -> Option<Splice> {
    let tag = scan_start_tag(src, node.range().start)?;
    if let Some(attr) = tag.attr(name) {
        if unescape(attr.value) == value {
            return None;
        }
        return Some(Splice {
            range: attr.value_range.clone(),
            text: escape_attr(value),
        });
    }

    // 属性分行书写时新属性也另起一行
    let (at, separator) = match tag.attrs.last() {
        Some(last) if src[last.ws_start..last.start].contains('\n') => {
            (last.end, format!("\n{}", line_indent(src, last.start)))
        }
        Some(last) => (last.end, " ".to_string()),
        None => (tag.name_end, " ".to_string()),
    };
    Some(Splice {
        range: at..at,
        text: format!("{}{}=\"{}\"", separator, name, escape_attr(value)),
    })
}

/// 替换元素内容；自闭合元素展开为成对标签
fn set_text_splice(src: &str, node: Node, text: &str) -> Option<Splice> {
    let tag = scan_start_tag(src, node.range().start)?;
    let escaped = escape_text(text);

    if tag.self_closing {
        return Some(Splice {
            range: tag.tail_start..tag.end,
            text: format!(">{}</{}>", escaped, tag.name),
        });
    }

    let close = node.range().start + src[node.range()].rfind("</")?;
    (src[tag.end..close] != escaped).then(|| Splice {
        range: tag.end..close,
        text: escaped,
    })
}

fn escape_text(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn remove_attribute_splice(src: &str, node: Node, name: &str) -> Option<Splice> {
    let tag = scan_start_tag(src, node.range().start)?;
    let attr = tag.attr(name)?;
    Some(Splice {
        range: attr.ws_start..attr.end,
        text: String::new(),
    })
}

fn replace_attributes_splice(
    src: &str,
    node: Node,
    attrs: &IndexMap<String, String>,
) -> Option<Splice> {
    let tag = scan_start_tag(src, node.range().start)?;

    let mut text: String = tag
        .attrs
        .iter()
        .filter(|a| a.is_namespace_decl())
        .map(|a| &src[a.ws_start..a.end])
        .collect();
    for (name, value) in attrs {
        text.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
    }

    let range = tag.name_end..tag.tail_start;
    (src[range.clone()] != text).then_some(Splice { range, text })
}

fn remove_node_splice(src: &str, node: Node) -> Splice {
    let range = node.range();
    let start = match src[..range.start].rfind('\n') {
        Some(newline) if src[newline + 1..range.start].trim().is_empty() => newline,
        _ => range.start,
    };
    Splice {
        range: start..range.end,
        text: String::new(),
    }
}

fn insert_child_splice(src: &str, node: Node, element: &str, strip: usize) -> Option<Splice> {
    let tag = scan_start_tag(src, node.range().start)?;
    let node_indent = line_indent(src, node.range().start);
    let child_indent = child_indent(src, node, node_indent);
    let body = reindent(element, strip, &child_indent);

    if tag.self_closing {
        return Some(Splice {
            range: tag.tail_start..tag.end,
            text: format!(">\n{}{}\n{}</{}>", child_indent, body, node_indent, tag.name),
        });
    }

    let range = node.range();
    let close = range.start + src[range.clone()].rfind("</")?;
    let inner = &src[tag.end..close];
    if inner.trim().is_empty() {
        Some(Splice {
            range: tag.end..close,
            text: format!("\n{}{}\n{}", child_indent, body, node_indent),
        })
    } else {
        let at = tag.end + inner.trim_end().len();
        Some(Splice {
            range: at..at,
            text: format!("\n{}{}", child_indent, body),
        })
    }
}

/// 子元素缩进：沿用已有子元素的缩进，否则在本节点缩进上加一级
fn child_indent(src: &str, node: Node, node_indent: &str) -> String {
    if let Some(child) = node.children().find(|n| n.is_element()) {
        let indent = line_indent(src, child.range().start);
        if indent.len() > node_indent.len() {
            return indent.to_string();
        }
    }

    let unit = node
        .parent_element()
        .map(|parent| line_indent(src, parent.range().start))
        .filter(|parent| node_indent.len() > parent.len() && node_indent.starts_with(parent))
        .map(|parent| &node_indent[parent.len()..])
        .unwrap_or(DEFAULT_INDENT);
    format!("{}{}", node_indent, unit)
}
