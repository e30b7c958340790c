/// 通用 XML 编辑器
///
/// 结构由 roxmltree 解析，修改以字节范围拼接的方式写回原文，
/// 未被选中的节点逐字节保持不变。
mod file;
mod selector;
mod tag;


pub use file::{AttrMode, XmlFile};
pub use selector::Selector;

use roxmltree::Node;

use tag::scan_name;

pub(crate) fn parse_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    }
}

/// 元素带前缀的原始名称
pub(crate) fn element_name<'s>(src: &'s str, node: Node) -> &'s str {
    scan_name(src, node.range().start + 1)
}

pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

pub(crate) fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// `pos` 所在行的行首空白
pub(crate) fn line_indent(src: &str, pos: usize) -> &str {
    let line_start = src[..pos].rfind('\n').map_or(0, |i| i + 1);
    let line = &src[line_start..];
    &line[..line.len() - line.trim_start().len()]
}

/// 去掉公共缩进与首尾空行
pub(crate) fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text
        .trim_matches(|c| c == '\n' || c == '\r')
        .lines()
        .collect();
    let common = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| l.get(common..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// 第一行原样，其余行去掉至多 `strip` 字节的行首空白后加上 `indent`
pub(crate) fn reindent(text: &str, strip: usize, indent: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i == 0 {
            out.push_str(line.trim_end());
            continue;
        }
        out.push('\n');
        let leading = line.len() - line.trim_start().len();
        let body = &line[leading.min(strip)..];
        if !body.trim().is_empty() {
            out.push_str(indent);
            out.push_str(body.trim_end());
        }
    }
    out
}
