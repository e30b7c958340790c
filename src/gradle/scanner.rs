/// 花括号块扫描
///
/// 只识别 `{`/`}` 的嵌套关系，字符串（含三引号）与注释中的括号被忽略。
/// 不尝试解析 Groovy / Kotlin 语法本身。

/// 一个花括号块
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Block {
    /// `{` 之前的语句头，如 `android`、`getByName("release")`
    pub head: String,
    /// 语句头起点
    pub head_start: usize,
    /// `{` 的位置
    pub open: usize,
    /// 匹配的 `}` 的位置
    pub close: usize,
    /// 外层块的下标
    pub parent: Option<usize>,
}

impl Block {
    /// 路径中的一段是否指向本块
    ///
    /// 可匹配完整语句头、语句头的首个标识符或其中的字符串参数
    pub fn matches(&self, segment: &str) -> bool {
        if self.head == segment {
            return true;
        }
        let ident: &str = self
            .head
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .next()
            .unwrap_or_default();
        if ident == segment {
            return true;
        }
        self.head
            .split(['"', '\''])
            .skip(1)
            .step_by(2)
            .any(|arg| arg == segment)
    }

    /// 块内文本的字节范围（不含花括号）
    pub fn body(&self) -> std::ops::Range<usize> {
        self.open + 1..self.close
    }
}

/// 扫描所有块，按 `{` 出现的顺序返回
pub(crate) fn scan_blocks(src: &str) -> Result<Vec<Block>, String> {
    let bytes = src.as_bytes();
    let mut blocks: Vec<Block> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = src[i..].find('\n').map_or(bytes.len(), |n| i + n);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = src[i + 2..]
                    .find("*/")
                    .ok_or_else(|| format!("unterminated comment at byte {}", i))?;
                i += 2 + end + 2;
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i = skip_string(src, i, quote)?;
                continue;
            }
            b'{' => {
                let (head, head_start) = block_head(src, i);
                blocks.push(Block {
                    head,
                    head_start,
                    open: i,
                    close: i,
                    parent: stack.last().copied(),
                });
                stack.push(blocks.len() - 1);
            }
            b'}' => {
                let index = stack
                    .pop()
                    .ok_or_else(|| format!("unbalanced '}}' at byte {}", i))?;
                blocks[index].close = i;
            }
            _ => {}
        }
        i += 1;
    }

    match stack.last() {
        Some(&index) => Err(format!("unclosed block '{}'", blocks[index].head)),
        None => Ok(blocks),
    }
}

/// 跳过从 `start` 开始的字符串，返回其后的位置
fn skip_string(src: &str, start: usize, quote: u8) -> Result<usize, String> {
    let bytes = src.as_bytes();
    let triple = [quote; 3];
    if bytes[start..].starts_with(&triple) {
        let delimiter = std::str::from_utf8(&triple).unwrap_or("\"\"\"");
        let end = src[start + 3..]
            .find(delimiter)
            .ok_or_else(|| format!("unterminated string at byte {}", start))?;
        return Ok(start + 3 + end + 3);
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Ok(i + 1),
            b'\n' => return Err(format!("unterminated string at byte {}", start)),
            _ => i += 1,
        }
    }
    Err(format!("unterminated string at byte {}", start))
}

/// `{` 之前的语句头；同一行为空时取上一行（`{` 另起一行的写法）
fn block_head(src: &str, open: usize) -> (String, usize) {
    let before = &src[..open];
    let boundary = before
        .rfind(['\n', ';', '{', '}'])
        .map_or(0, |i| i + 1);
    let head = before[boundary..].trim();
    if !head.is_empty() {
        let start = boundary + (before[boundary..].len() - before[boundary..].trim_start().len());
        return (head.to_string(), start);
    }

    if boundary > 0 && before.as_bytes()[boundary - 1] == b'\n' {
        let previous = &before[..boundary - 1];
        let line_start = previous.rfind(['\n', ';', '{', '}']).map_or(0, |i| i + 1);
        let head = previous[line_start..].trim();
        let start = line_start + (previous[line_start..].len() - previous[line_start..].trim_start().len());
        return (head.to_string(), start);
    }

    (String::new(), open)
}

/// 按点分路径查找块
pub(crate) fn find_block<'a>(blocks: &'a [Block], target: &str) -> Option<&'a Block> {
    let mut parent: Option<usize> = None;
    let mut found = None;

    for segment in target.split('.').map(str::trim).filter(|s| !s.is_empty()) {
        let index = blocks
            .iter()
            .position(|b| b.parent == parent && b.matches(segment))?;
        parent = Some(index);
        found = Some(&blocks[index]);
    }

    found
}
