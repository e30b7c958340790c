use super::pbx::{PbxEntry, PbxItem, PbxObject, PbxString, PbxValue};

/// 解析结果：根字典之前的头部、根字典、其后的尾部
#[derive(Debug, Clone)]
pub struct ParsedPbx {
    pub header: String,
    pub root: PbxObject,
    pub trailer: String,
}

/// 解析 project.pbxproj 文本
///
/// 语法为 OpenStep 风格的 plist：`{ key = value; }`、`( a, b, )`、
/// 裸标识符或带引号字符串。紧跟在键或值之后的 `/* ... */` 注释保留在模型中，
/// 其余注释（如 section 标记）在写回时重新生成。
pub fn parse_pbxproj(text: &str) -> Result<ParsedPbx, String> {
    let mut parser = Parser { src: text, pos: 0 };

    parser.trivia()?;
    if parser.peek() != Some('{') {
        return Err(parser.error("expected '{' at start of project"));
    }
    let header = text[..parser.pos].to_string();

    let root = parser.object()?;

    let trailer_start = parser.pos;
    parser.trivia()?;
    if parser.pos < text.len() {
        return Err(parser.error("unexpected content after root object"));
    }

    Ok(ParsedPbx {
        header,
        root,
        trailer: text[trailer_start..].to_string(),
    })
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        if self.peek() == Some(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn error(&self, message: &str) -> String {
        let line = self.src[..self.pos].matches('\n').count() + 1;
        match self.peek() {
            Some(c) => format!("{} at line {} (found '{}')", message, line, c),
            None => format!("{} at line {} (found end of input)", message, line),
        }
    }

    /// 跳过空白与注释，返回最后一个块注释的内容；块注释未闭合时报错
    fn trivia(&mut self) -> Result<Option<String>, String> {
        let mut comment = None;
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if let Some(body) = trimmed.strip_prefix("/*") {
                let Some(end) = body.find("*/") else {
                    return Err(self.error("unterminated comment"));
                };
                comment = Some(body[..end].trim().to_string());
                self.pos += 2 + end + 2;
            } else if trimmed.starts_with("//") {
                let end = trimmed.find('\n').unwrap_or(trimmed.len());
                self.pos += end;
            } else {
                return Ok(comment);
            }
        }
    }

    fn value(&mut self) -> Result<PbxValue, String> {
        match self.peek() {
            Some('{') => self.object().map(PbxValue::Object),
            Some('(') => self.array().map(PbxValue::Array),
            _ => self.string().map(PbxValue::String),
        }
    }

    fn object(&mut self) -> Result<PbxObject, String> {
        self.expect('{')?;
        let mut object = PbxObject::new();

        loop {
            self.trivia()?;
            if self.peek() == Some('}') {
                self.bump();
                return Ok(object);
            }

            let key = self.string()?;
            let key_comment = self.trivia()?;
            self.expect('=')?;
            self.trivia()?;
            let value = self.value()?;
            let value_comment = self.trivia()?;
            self.expect(';')?;

            object.push(PbxEntry {
                key,
                key_comment,
                value,
                value_comment,
            });
        }
    }

    fn array(&mut self) -> Result<Vec<PbxItem>, String> {
        self.expect('(')?;
        let mut items = Vec::new();

        loop {
            self.trivia()?;
            if self.peek() == Some(')') {
                self.bump();
                return Ok(items);
            }

            let value = self.value()?;
            let comment = self.trivia()?;
            items.push(PbxItem { value, comment });

            match self.peek() {
                Some(',') => self.bump(),
                Some(')') => {}
                _ => return Err(self.error("expected ',' or ')' in array")),
            }
        }
    }

    fn string(&mut self) -> Result<PbxString, String> {
        if self.peek() == Some('"') {
            self.bump();
            let start = self.pos;
            let mut escaped = false;
            for (i, c) in self.rest().char_indices() {
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => {
                        let raw = &self.src[start..start + i];
                        self.pos = start + i + 1;
                        return Ok(PbxString::from_raw(raw, true));
                    }
                    _ => escaped = false,
                }
            }
            return Err(self.error("unterminated string"));
        }

        let rest = self.rest();
        let mut len = 0;
        for (i, c) in rest.char_indices() {
            let comment_start = c == '/' && matches!(rest[i + 1..].chars().next(), Some('*' | '/'));
            if c.is_whitespace() || matches!(c, ';' | ',' | '=' | '{' | '}' | '(' | ')' | '"') || comment_start {
                break;
            }
            len = i + c.len_utf8();
        }

        if len == 0 {
            return Err(self.error("unexpected character"));
        }
        let raw = &rest[..len];
        self.pos += len;
        Ok(PbxString::from_raw(raw, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comments_and_quotes() {
        let parsed = parse_pbxproj(
            "// !$*UTF8*$!\n{\n\tobjects = {\n/* Begin X section */\n\t\tAB /* App */ = {isa = PBXNativeTarget; name = \"My \\\"App\\\"\"; };\n\t};\n\trootObject = AB /* Project object */;\n}\n",
        )
        .unwrap();

        assert_eq!(parsed.header, "// !$*UTF8*$!\n");
        assert_eq!(parsed.trailer, "\n");

        let objects = parsed.root.get("objects").unwrap().as_object().unwrap();
        let target = objects.entry("AB").unwrap();
        assert_eq!(target.key_comment.as_deref(), Some("App"));

        let name = target.value.as_object().unwrap().get("name").unwrap();
        assert_eq!(name.as_str().unwrap(), "My \"App\"");

        let root_entry = parsed.root.entry("rootObject").unwrap();
        assert_eq!(root_entry.value_comment.as_deref(), Some("Project object"));
    }

    #[test]
    fn test_parse_array_items() {
        let parsed = parse_pbxproj("{ files = (A /* a.swift in Sources */, B, \"$(inherited)\", ); }").unwrap();
        let files = parsed.root.get("files").unwrap().as_array().unwrap();

        assert_eq!(files.len(), 3);
        assert_eq!(files[0].comment.as_deref(), Some("a.swift in Sources"));
        assert_eq!(files[1].comment, None);
        assert_eq!(files[2].value.as_str().unwrap(), "$(inherited)");
    }

    #[test]
    fn test_bare_path_with_slash() {
        let parsed = parse_pbxproj("{ INFOPLIST_FILE = App/Info.plist; }").unwrap();
        assert_eq!(parsed.root.get_str("INFOPLIST_FILE").unwrap(), "App/Info.plist");
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_pbxproj("").is_err());
        assert!(parse_pbxproj("{ a = b }").unwrap_err().contains("expected ';'"));
        assert!(parse_pbxproj("{ a = \"open; }").unwrap_err().contains("unterminated"));
        assert!(parse_pbxproj("{ a = b; } extra").is_err());
    }
}
