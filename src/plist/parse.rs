use roxmltree::{Document, Node, ParsingOptions};

use super::{PlistDict, PlistValue};

/// 解析 XML plist 文本
///
/// 根元素可以是 `<plist>`（取其第一个子元素），也可以直接是值元素
pub fn parse_plist(text: &str) -> Result<PlistValue, String> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(text.trim_start(), options).map_err(|e| e.to_string())?;
    let root = doc.root_element();

    let value_node = if root.tag_name().name() == "plist" {
        match root.children().find(Node::is_element) {
            Some(node) => node,
            None => return Ok(PlistValue::empty_dict()),
        }
    } else {
        root
    };

    parse_value(value_node)
}

fn parse_value(node: Node) -> Result<PlistValue, String> {
    let text = || node.text().unwrap_or_default();

    match node.tag_name().name() {
        "string" => Ok(PlistValue::String(text().to_string())),
        "integer" => text()
            .trim()
            .parse::<i64>()
            .map(PlistValue::Integer)
            .map_err(|e| format!("invalid <integer> '{}': {}", text(), e)),
        "real" => text()
            .trim()
            .parse::<f64>()
            .map(PlistValue::Real)
            .map_err(|e| format!("invalid <real> '{}': {}", text(), e)),
        "true" => Ok(PlistValue::Boolean(true)),
        "false" => Ok(PlistValue::Boolean(false)),
        "date" => Ok(PlistValue::Date(text().trim().to_string())),
        "data" => Ok(PlistValue::Data(
            text().chars().filter(|c| !c.is_whitespace()).collect(),
        )),
        "array" => node
            .children()
            .filter(Node::is_element)
            .map(parse_value)
            .collect::<Result<Vec<_>, _>>()
            .map(PlistValue::Array),
        "dict" => parse_dict(node).map(PlistValue::Dictionary),
        other => Err(format!("unexpected element <{}>", other)),
    }
}

fn parse_dict(node: Node) -> Result<PlistDict, String> {
    let mut dict = PlistDict::new();
    let mut children = node.children().filter(Node::is_element);

    while let Some(key_node) = children.next() {
        if key_node.tag_name().name() != "key" {
            return Err(format!(
                "expected <key> in <dict>, found <{}>",
                key_node.tag_name().name()
            ));
        }
        let key = key_node.text().unwrap_or_default().to_string();
        let value_node = children
            .next()
            .ok_or_else(|| format!("missing value for key '{}'", key))?;
        dict.insert(key, parse_value(value_node)?);
    }

    Ok(dict)
}
