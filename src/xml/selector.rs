use std::fmt;
use std::str::FromStr;

use roxmltree::{Document, Node};

use super::tag::scan_start_tag;
use super::{element_name, unescape};

/// 节点选择器（XPath 的一个子集）
///
/// 支持：`/a/b`、`a/b`、`//x`、`a//x`、`*`、`[@attr]`、`[@attr='v']`、`[n]`。
/// 相对路径与绝对路径一样从文档节点开始求值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    descendant: bool,
    name: Option<String>,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttr(String),
    AttrEquals(String, String),
    /// 1 起始
    Position(usize),
}

impl Selector {
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut rest = text.trim();
        if rest.is_empty() {
            return Err("empty selector".to_string());
        }

        let mut steps = Vec::new();
        while !rest.is_empty() {
            let descendant = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                true
            } else {
                rest = rest.strip_prefix('/').unwrap_or(rest);
                false
            };

            let name_len = rest.find(['/', '[']).unwrap_or(rest.len());
            let name = rest[..name_len].trim();
            if name.is_empty() {
                return Err(format!("missing element name in selector '{}'", text));
            }
            rest = &rest[name_len..];

            let mut predicates = Vec::new();
            while rest.starts_with('[') {
                let close = closing_bracket(rest)
                    .ok_or_else(|| format!("unterminated predicate in selector '{}'", text))?;
                predicates.push(parse_predicate(&rest[1..close], text)?);
                rest = &rest[close + 1..];
            }

            steps.push(Step {
                descendant,
                name: (name != "*").then(|| name.to_string()),
                predicates,
            });
        }

        Ok(Self { steps })
    }

    /// 仅由无谓词的子元素步组成时返回元素名序列（用于补建缺失路径）
    pub fn simple_path(&self) -> Option<Vec<&str>> {
        self.steps
            .iter()
            .map(|s| match (&s.name, s.descendant, s.predicates.is_empty()) {
                (Some(name), false, true) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// 前 `depth` 步组成的选择器
    pub fn prefix(&self, depth: usize) -> Selector {
        Selector {
            steps: self.steps[..depth.min(self.steps.len())].to_vec(),
        }
    }

    /// 按文档顺序返回匹配的元素
    pub(crate) fn select<'a, 'input>(
        &self,
        doc: &'a Document<'input>,
        src: &str,
    ) -> Vec<Node<'a, 'input>> {
        let mut current = vec![doc.root()];

        for step in &self.steps {
            let mut next = Vec::new();
            for context in &current {
                if step.descendant {
                    for parent in context.descendants() {
                        next.extend(step.apply(parent, src));
                    }
                } else {
                    next.extend(step.apply(*context, src));
                }
            }
            next.sort_by_key(|n| n.range().start);
            next.dedup_by_key(|n| n.range().start);
            current = next;
        }

        current
    }
}

impl Step {
    /// 在 `parent` 的子元素中筛选
    fn apply<'a, 'input>(&self, parent: Node<'a, 'input>, src: &str) -> Vec<Node<'a, 'input>> {
        let mut matched: Vec<_> = parent
            .children()
            .filter(|n| n.is_element())
            .filter(|n| match &self.name {
                Some(name) => element_name(src, *n) == name.as_str(),
                None => true,
            })
            .collect();

        for predicate in &self.predicates {
            matched = match predicate {
                Predicate::Position(p) => matched.get(p - 1).copied().into_iter().collect(),
                _ => matched
                    .into_iter()
                    .filter(|n| predicate.matches(src, *n))
                    .collect(),
            };
        }

        matched
    }
}

impl Predicate {
    fn matches(&self, src: &str, node: Node) -> bool {
        let Some(tag) = scan_start_tag(src, node.range().start) else {
            return false;
        };
        match self {
            Predicate::HasAttr(name) => tag.attr(name).is_some(),
            Predicate::AttrEquals(name, value) => tag
                .attr(name)
                .is_some_and(|a| unescape(a.value) == *value),
            Predicate::Position(_) => true,
        }
    }
}

fn closing_bracket(text: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in text.char_indices().skip(1) {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_predicate(body: &str, selector: &str) -> Result<Predicate, String> {
    let body = body.trim();
    if let Some(attr) = body.strip_prefix('@') {
        return Ok(match attr.split_once('=') {
            Some((name, value)) => {
                let value = value.trim();
                let unquoted = value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
                    .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                    .unwrap_or(value);
                Predicate::AttrEquals(name.trim().to_string(), unquoted.to_string())
            }
            None => Predicate::HasAttr(attr.trim().to_string()),
        });
    }

    match body.parse::<usize>() {
        Ok(n) if n > 0 => Ok(Predicate::Position(n)),
        _ => Err(format!("unsupported predicate '[{}]' in selector '{}'", body, selector)),
    }
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            f.write_str(if step.descendant { "//" } else { "/" })?;
            f.write_str(step.name.as_deref().unwrap_or("*"))?;
            for predicate in &step.predicates {
                match predicate {
                    Predicate::HasAttr(name) => write!(f, "[@{}]", name)?,
                    Predicate::AttrEquals(name, value) => write!(f, "[@{}='{}']", name, value)?,
                    Predicate::Position(n) => write!(f, "[{}]", n)?,
                }
            }
        }
        Ok(())
    }
}
