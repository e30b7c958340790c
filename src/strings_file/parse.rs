use super::{unescape, RawEntry, StringsEntry, StringsNode};

/// 带行列追踪的字符扫描器
struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 0,
            col: 1,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn advance(&mut self, bytes: usize) {
        let end = self.pos + bytes;
        while self.pos < end && self.bump().is_some() {}
    }

    fn error(&self, message: &str) -> String {
        format!("{} at line {}, column {}", message, self.line + 1, self.col)
    }

    /// 跳过空白和注释，返回最后一个注释的内容
    fn skip_trivia(&mut self) -> Result<Option<String>, String> {
        let mut comment = None;
        loop {
            let rest = self.rest();
            if rest.starts_with("/*") {
                let end = rest[2..]
                    .find("*/")
                    .ok_or_else(|| self.error("unterminated comment"))?;
                comment = Some(rest[2..2 + end].to_string());
                self.advance(end + 4);
            } else if rest.starts_with("//") {
                let end = rest.find('\n').unwrap_or(rest.len());
                comment = Some(rest[2..end].to_string());
                self.advance(end);
            } else if self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            } else {
                return Ok(comment);
            }
        }
    }

    /// 读取带引号或裸露的记号，返回内容的字节范围
    fn token(&mut self, what: &str) -> Result<(usize, usize, bool), String> {
        match self.peek() {
            Some('"') => {
                self.bump();
                let start = self.pos;
                loop {
                    match self.bump() {
                        Some('\\') => {
                            self.bump();
                        }
                        Some('"') => return Ok((start, self.pos - 1, true)),
                        Some(_) => {}
                        None => return Err(self.error(&format!("unterminated {}", what))),
                    }
                }
            }
            Some(c) if is_bare(c) => {
                let start = self.pos;
                while self.peek().is_some_and(is_bare) {
                    self.bump();
                }
                Ok((start, self.pos, false))
            }
            _ => Err(self.error(&format!("expected {}", what))),
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }
}

fn is_bare(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '$' | ':' | '/')
}

/// 解析 `.strings` 文本
///
/// 依次拼接所有节点的文本可还原原文
pub fn parse_strings(src: &str) -> Result<Vec<StringsNode>, String> {
    let mut scanner = Scanner::new(src);
    let mut nodes = Vec::new();

    loop {
        let filler_start = scanner.pos;
        let comment = scanner.skip_trivia()?;
        if scanner.pos > filler_start {
            nodes.push(StringsNode::Filler(src[filler_start..scanner.pos].to_string()));
        }
        if scanner.peek().is_none() {
            break;
        }

        let entry_start = scanner.pos;
        let (start_line, start_col) = (scanner.line, scanner.col);

        let (key_start, key_end, _) = scanner.token("key")?;
        scanner.skip_trivia()?;
        scanner.expect('=')?;
        scanner.skip_trivia()?;
        let (value_start, value_end, _) = scanner.token("value")?;
        scanner.skip_trivia()?;
        let (end_line, end_col) = (scanner.line, scanner.col);
        scanner.expect(';')?;

        nodes.push(StringsNode::Entry(StringsEntry {
            comment: comment.unwrap_or_default(),
            key: unescape(&src[key_start..key_end]),
            value: unescape(&src[value_start..value_end]),
            start_line,
            start_col,
            end_line,
            end_col,
            raw: Some(RawEntry {
                prefix: src[entry_start..value_start].to_string(),
                value: src[value_start..value_end].to_string(),
                suffix: src[value_end..scanner.pos].to_string(),
            }),
        }));
    }

    Ok(nodes)
}

/// 将节点还原为文本
pub fn generate_strings(nodes: &[StringsNode]) -> String {
    nodes.iter().map(StringsNode::to_text).collect()
}

/// 按生成文本重新计算每个条目的行列
pub(crate) fn recompute_positions(nodes: &mut [StringsNode]) {
    let (mut line, mut col) = (0usize, 1usize);

    for node in nodes.iter_mut() {
        let text = node.to_text();
        if let StringsNode::Entry(entry) = node {
            entry.start_line = line;
            entry.start_col = col;
        }

        let mut last = (line, col);
        for c in text.chars() {
            last = (line, col);
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }

        if let StringsNode::Entry(entry) = node {
            entry.end_line = last.0;
            entry.end_col = last.1;
        }
    }
}
