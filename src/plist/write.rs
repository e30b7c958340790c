use super::PlistValue;

const HEADER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
    "<plist version=\"1.0\">\n",
);

/// 序列化为 Apple 格式的 XML plist（制表符缩进，根值不缩进）
pub fn write_plist(value: &PlistValue) -> String {
    let mut out = String::from(HEADER);
    write_value(&mut out, value, 0);
    out.push_str("</plist>\n");
    out
}

fn write_value(out: &mut String, value: &PlistValue, depth: usize) {
    let indent = "\t".repeat(depth);

    match value {
        PlistValue::String(s) => push_line(out, &indent, &format!("<string>{}</string>", escape(s))),
        PlistValue::Integer(n) => push_line(out, &indent, &format!("<integer>{}</integer>", n)),
        PlistValue::Real(r) => push_line(out, &indent, &format!("<real>{}</real>", r)),
        PlistValue::Boolean(true) => push_line(out, &indent, "<true/>"),
        PlistValue::Boolean(false) => push_line(out, &indent, "<false/>"),
        PlistValue::Date(d) => push_line(out, &indent, &format!("<date>{}</date>", escape(d))),
        PlistValue::Data(d) => push_line(out, &indent, &format!("<data>{}</data>", d)),
        PlistValue::Array(items) if items.is_empty() => push_line(out, &indent, "<array/>"),
        PlistValue::Array(items) => {
            push_line(out, &indent, "<array>");
            for item in items {
                write_value(out, item, depth + 1);
            }
            push_line(out, &indent, "</array>");
        }
        PlistValue::Dictionary(dict) if dict.is_empty() => push_line(out, &indent, "<dict/>"),
        PlistValue::Dictionary(dict) => {
            push_line(out, &indent, "<dict>");
            let inner = "\t".repeat(depth + 1);
            for (key, item) in dict {
                push_line(out, &inner, &format!("<key>{}</key>", escape(key)));
                write_value(out, item, depth + 1);
            }
            push_line(out, &indent, "</dict>");
        }
    }
}

fn push_line(out: &mut String, indent: &str, line: &str) {
    out.push_str(indent);
    out.push_str(line);
    out.push('\n');
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
