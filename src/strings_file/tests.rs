use super::*;
use crate::editor::StagedDocument;
use std::path::Path;

const FIXTURE: &str = r#"
/* Insert Element menu item */

"Insert Element" = "Insert Element";

/* Error string used for unknown error types. */

"ErrorString_1" = "An unknown error occurred.";

"KeyWithoutComment"    =   "This key has no comment" ;

/****/

   "This is a key"  ="This is a value";
    "#;

fn load() -> StringsFile {
    StringsFile::from_bytes(Path::new("Localizable.strings"), FIXTURE.as_bytes().to_vec()).unwrap()
}

fn summary(file: &StringsFile) -> Vec<(String, String, String, usize, usize, usize, usize)> {
    file.entries()
        .map(|e| {
            (
                e.comment.clone(),
                e.key.clone(),
                e.value.clone(),
                e.start_line,
                e.start_col,
                e.end_line,
                e.end_col,
            )
        })
        .collect()
}

fn row(comment: &str, key: &str, value: &str, pos: (usize, usize, usize, usize)) -> (String, String, String, usize, usize, usize, usize) {
    (comment.into(), key.into(), value.into(), pos.0, pos.1, pos.2, pos.3)
}

#[test]
fn test_parse_entries_with_positions() {
    let file = load();
    assert_eq!(
        summary(&file),
        vec![
            row(" Insert Element menu item ", "Insert Element", "Insert Element", (3, 1, 3, 36)),
            row(
                " Error string used for unknown error types. ",
                "ErrorString_1",
                "An unknown error occurred.",
                (7, 1, 7, 47)
            ),
            row("", "KeyWithoutComment", "This key has no comment", (9, 1, 9, 54)),
            row("**", "This is a key", "This is a value", (13, 4, 13, 39)),
        ]
    );
}

#[test]
fn test_generate_is_byte_exact() {
    let file = load();
    assert_eq!(file.generate(), FIXTURE);
    assert_eq!(file.render().unwrap(), FIXTURE.as_bytes());
}

#[test]
fn test_set_existing_key_keeps_layout() {
    let mut file = load();
    file.set([("KeyWithoutComment", "Changed")]);

    assert_eq!(file.get("KeyWithoutComment"), Some("Changed"));
    assert!(file
        .generate()
        .contains("\"KeyWithoutComment\"    =   \"Changed\" ;"));
    assert!(file.generate().contains("   \"This is a key\"  =\"This is a value\";"));
}

#[test]
fn test_set_new_key_appends_one_entry() {
    let mut file = load();
    let before: Vec<_> = summary(&file);

    file.set([("NewKey", "V")]);

    let after = summary(&file);
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(&after[..before.len()], &before[..]);

    let new = file.entries().last().unwrap();
    assert_eq!((new.key.as_str(), new.value.as_str()), ("NewKey", "V"));
    assert_eq!((new.start_line, new.start_col), (15, 1));
    assert_eq!((new.end_line, new.end_col), (15, 15));

    assert!(file
        .generate()
        .ends_with("\"This is a value\";\n\n\"NewKey\" = \"V\";\n    "));
}

#[test]
fn test_set_is_idempotent() {
    let mut once = load();
    once.set([("NewKey", "V"), ("Insert Element", "Insert")]);
    let mut twice = once.clone();
    twice.set([("NewKey", "V"), ("Insert Element", "Insert")]);

    assert_eq!(once.generate(), twice.generate());
}

#[test]
fn test_set_on_empty_document() {
    let mut file = StringsFile::new();
    file.set([("A", "1"), ("B", "2")]);
    assert_eq!(file.generate(), "\"A\" = \"1\";\n\n\"B\" = \"2\";");
}

#[test]
fn test_escapes() {
    let file = StringsFile::from_bytes(
        Path::new("a.strings"),
        br#"quote = "say \"hi\"\n"; // trailing"#.to_vec(),
    )
    .unwrap();
    assert_eq!(file.get("quote"), Some("say \"hi\"\n"));

    let mut file = file;
    file.set([("other", "a\"b")]);
    assert!(file.generate().contains("\"other\" = \"a\\\"b\";"));
}

#[test]
fn test_utf16_roundtrip() {
    let text = "\"Hello\" = \"你好\";\n";
    let bytes = StringsEncoding::Utf16Le.encode(text);
    assert_eq!(&bytes[..2], &[0xFF, 0xFE]);

    let mut file = StringsFile::from_bytes(Path::new("zh.strings"), bytes.clone()).unwrap();
    assert_eq!(file.encoding(), StringsEncoding::Utf16Le);
    assert_eq!(file.get("Hello"), Some("你好"));
    assert_eq!(file.render().unwrap(), bytes);

    file.set([("Bye", "再见")]);
    let rendered = file.render().unwrap();
    let (decoded, encoding) = StringsEncoding::decode(&rendered);
    assert_eq!(encoding, StringsEncoding::Utf16Le);
    assert_eq!(decoded, "\"Hello\" = \"你好\";\n\n\"Bye\" = \"再见\";\n");
}

#[test]
fn test_set_from_json() {
    let mut file = StringsFile::new();
    file.set_from_json(br#"{"Greeting": "Hi", "Count": 3}"#).unwrap();
    assert_eq!(file.get("Greeting"), Some("Hi"));
    assert_eq!(file.get("Count"), Some("3"));

    assert!(matches!(file.set_from_json(b"[1, 2]"), Err(crate::ProjectError::Json(_))));
}

#[test]
fn test_unterminated_entry_is_grammar_error() {
    let result = StringsFile::from_bytes(Path::new("bad.strings"), b"\"a\" = \"b\"".to_vec());
    assert!(matches!(result, Err(crate::ProjectError::Grammar { .. })));
}
