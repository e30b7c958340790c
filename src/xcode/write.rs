use std::collections::BTreeMap;

use super::pbx::{PbxEntry, PbxObject, PbxValue};

/// 单行写出的 section
const INLINE_SECTIONS: [&str; 2] = ["PBXBuildFile", "PBXFileReference"];

/// 按 Xcode 的布局写出 project.pbxproj
///
/// `objects` 字典按 `isa` 分 section（按名称排序），section 内保持对象原有顺序。
pub fn write_pbxproj(header: &str, root: &PbxObject, trailer: &str) -> String {
    let mut out = String::with_capacity(64 * 1024);
    out.push_str(header);
    out.push_str("{\n");

    for entry in root.entries() {
        indent(&mut out, 1);
        write_key(&mut out, entry);
        match (&entry.value, entry.key.value() == "objects") {
            (PbxValue::Object(objects), true) => write_sections(&mut out, objects),
            (value, _) => write_value(&mut out, value, 1),
        }
        write_comment(&mut out, entry.value_comment.as_deref());
        out.push_str(";\n");
    }

    out.push('}');
    out.push_str(trailer);
    out
}

fn write_sections(out: &mut String, objects: &PbxObject) {
    let mut sections: BTreeMap<String, Vec<&PbxEntry>> = BTreeMap::new();
    for entry in objects.entries() {
        let isa = entry
            .value
            .as_object()
            .and_then(|o| o.get_str("isa"))
            .map(|isa| isa.into_owned())
            .unwrap_or_default();
        sections.entry(isa).or_default().push(entry);
    }

    out.push_str("{\n");
    for (isa, entries) in &sections {
        out.push_str(&format!("\n/* Begin {} section */\n", isa));
        let inline = INLINE_SECTIONS.contains(&isa.as_str());
        for entry in entries {
            indent(out, 2);
            write_key(out, entry);
            if inline {
                write_inline(out, &entry.value);
            } else {
                write_value(out, &entry.value, 2);
            }
            write_comment(out, entry.value_comment.as_deref());
            out.push_str(";\n");
        }
        out.push_str(&format!("/* End {} section */\n", isa));
    }
    indent(out, 1);
    out.push('}');
}

fn write_key(out: &mut String, entry: &PbxEntry) {
    entry.key.write(out);
    write_comment(out, entry.key_comment.as_deref());
    out.push_str(" = ");
}

fn write_comment(out: &mut String, comment: Option<&str>) {
    if let Some(comment) = comment {
        out.push_str(" /* ");
        out.push_str(comment);
        out.push_str(" */");
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

/// 多行写法，`depth` 为值所在行的缩进层级
fn write_value(out: &mut String, value: &PbxValue, depth: usize) {
    match value {
        PbxValue::String(s) => s.write(out),
        PbxValue::Object(object) => {
            out.push_str("{\n");
            for entry in object.entries() {
                indent(out, depth + 1);
                write_key(out, entry);
                write_value(out, &entry.value, depth + 1);
                write_comment(out, entry.value_comment.as_deref());
                out.push_str(";\n");
            }
            indent(out, depth);
            out.push('}');
        }
        PbxValue::Array(items) => {
            out.push_str("(\n");
            for item in items {
                indent(out, depth + 1);
                write_value(out, &item.value, depth + 1);
                write_comment(out, item.comment.as_deref());
                out.push_str(",\n");
            }
            indent(out, depth);
            out.push(')');
        }
    }
}

/// 单行写法：`{isa = PBXBuildFile; fileRef = X /* a */; }`
fn write_inline(out: &mut String, value: &PbxValue) {
    match value {
        PbxValue::String(s) => s.write(out),
        PbxValue::Object(object) => {
            out.push('{');
            for entry in object.entries() {
                write_key(out, entry);
                write_inline(out, &entry.value);
                write_comment(out, entry.value_comment.as_deref());
                out.push_str("; ");
            }
            out.push('}');
        }
        PbxValue::Array(items) => {
            out.push('(');
            for item in items {
                write_inline(out, &item.value);
                write_comment(out, item.comment.as_deref());
                out.push_str(", ");
            }
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xcode::parse::parse_pbxproj;

    #[test]
    fn test_inline_sections() {
        let text = "{\n\tobjects = {\n\n/* Begin PBXBuildFile section */\n\t\tA1 /* WebKit.framework in Frameworks */ = {isa = PBXBuildFile; fileRef = B1 /* WebKit.framework */; settings = {ATTRIBUTES = (Weak, ); }; };\n/* End PBXBuildFile section */\n\t};\n}\n";
        let parsed = parse_pbxproj(text).unwrap();
        assert_eq!(write_pbxproj(&parsed.header, &parsed.root, &parsed.trailer), text);
    }

    #[test]
    fn test_sections_are_sorted() {
        let text = "{ objects = { B = {isa = XCBuildConfiguration; name = Debug; }; A = {isa = PBXGroup; children = (); }; }; }";
        let parsed = parse_pbxproj(text).unwrap();
        let out = write_pbxproj(&parsed.header, &parsed.root, &parsed.trailer);

        let group = out.find("/* Begin PBXGroup section */").unwrap();
        let config = out.find("/* Begin XCBuildConfiguration section */").unwrap();
        assert!(group < config);
        assert!(out.contains("\t\tA = {\n\t\t\tisa = PBXGroup;\n\t\t\tchildren = (\n\t\t\t);\n\t\t};\n"));
    }
}
