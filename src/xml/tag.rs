use std::ops::Range;

/// 开始标签中的一个属性（所有位置均为源文本中的绝对字节偏移）
#[derive(Debug, Clone)]
pub(crate) struct RawAttribute<'a> {
    /// 带前缀的原始名称，如 `android:name`
    pub name: &'a str,
    /// 未反转义的原始值
    pub value: &'a str,
    /// 属性前空白的起点
    pub ws_start: usize,
    pub start: usize,
    pub value_range: Range<usize>,
    /// 闭引号之后
    pub end: usize,
}

impl RawAttribute<'_> {
    pub fn is_namespace_decl(&self) -> bool {
        self.name == "xmlns" || self.name.starts_with("xmlns:")
    }
}

/// 元素的开始标签
#[derive(Debug, Clone)]
pub(crate) struct StartTag<'a> {
    pub name: &'a str,
    pub name_end: usize,
    pub attrs: Vec<RawAttribute<'a>>,
    /// `>` 或 `/>` 之前空白的起点
    pub tail_start: usize,
    /// `>` 之后
    pub end: usize,
    pub self_closing: bool,
}

impl<'a> StartTag<'a> {
    pub fn attr(&self, name: &str) -> Option<&RawAttribute<'a>> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'/' | b'>' | b'=')
}

/// 读取 `start` 处的名称
pub(crate) fn scan_name(src: &str, start: usize) -> &str {
    let bytes = src.as_bytes();
    let mut end = start;
    while end < bytes.len() && !is_name_end(bytes[end]) {
        end += 1;
    }
    &src[start..end]
}

/// 扫描 `start`（指向 `<`）处的开始标签
///
/// 输入已通过 XML 解析器校验，遇到意外字符时返回 None
pub(crate) fn scan_start_tag(src: &str, start: usize) -> Option<StartTag<'_>> {
    let bytes = src.as_bytes();
    if bytes.get(start) != Some(&b'<') {
        return None;
    }

    let name = scan_name(src, start + 1);
    let name_end = start + 1 + name.len();
    let mut pos = name_end;
    let mut attrs = Vec::new();

    loop {
        let ws_start = pos;
        while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }

        match bytes.get(pos)? {
            b'/' if bytes.get(pos + 1) == Some(&b'>') => {
                return Some(StartTag {
                    name,
                    name_end,
                    attrs,
                    tail_start: ws_start,
                    end: pos + 2,
                    self_closing: true,
                });
            }
            b'>' => {
                return Some(StartTag {
                    name,
                    name_end,
                    attrs,
                    tail_start: ws_start,
                    end: pos + 1,
                    self_closing: false,
                });
            }
            _ => {}
        }

        let attr_start = pos;
        let attr_name = scan_name(src, pos);
        if attr_name.is_empty() {
            return None;
        }
        pos += attr_name.len();
        while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }
        if bytes.get(pos) != Some(&b'=') {
            return None;
        }
        pos += 1;
        while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
            pos += 1;
        }

        let quote = *bytes.get(pos)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let value_start = pos + 1;
        let value_len = src[value_start..].find(quote as char)?;
        let value_end = value_start + value_len;
        pos = value_end + 1;

        attrs.push(RawAttribute {
            name: attr_name,
            value: &src[value_start..value_end],
            ws_start,
            start: attr_start,
            value_range: value_start..value_end,
            end: pos,
        });
    }
}
