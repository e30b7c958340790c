use super::*;
use crate::editor::StagedDocument;
use std::path::Path;

const APP_CLIP_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>NSAppClip</key>
	<dict>
		<key>NSAppClipRequestEphemeralUserNotification</key>
		<false/>
		<key>NSAppClipRequestLocationConfirmation</key>
		<false/>
	</dict>
	<key>UIApplicationSceneManifest</key>
	<dict>
		<key>UIApplicationSupportsMultipleScenes</key>
		<false/>
		<key>UISceneConfigurations</key>
		<dict>
			<key>UIWindowSceneSessionRoleApplication</key>
			<array>
				<dict>
					<key>UISceneConfigurationName</key>
					<string>Default Configuration</string>
					<key>UISceneDelegateClassName</key>
					<string>$(PRODUCT_MODULE_NAME).SceneDelegate</string>
					<key>UISceneStoryboardFile</key>
					<string>Main</string>
				</dict>
			</array>
		</dict>
	</dict>
</dict>
</plist>
"#;

fn load() -> PlistFile {
    PlistFile::parse(Path::new("AppClip.plist"), APP_CLIP_PLIST).unwrap()
}

fn dict(entries: Vec<(&str, PlistValue)>) -> PlistValue {
    PlistValue::Dictionary(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

#[test]
fn test_load_document() {
    let file = load();
    let clip = file.get("NSAppClip").unwrap();
    assert_eq!(
        clip.get("NSAppClipRequestLocationConfirmation"),
        Some(&PlistValue::Boolean(false))
    );

    let configs = file
        .get("UIApplicationSceneManifest")
        .and_then(|m| m.get("UISceneConfigurations"))
        .and_then(|c| c.get("UIWindowSceneSessionRoleApplication"))
        .unwrap();
    match configs {
        PlistValue::Array(items) => {
            assert_eq!(items.len(), 1);
            assert_eq!(
                items[0].get("UISceneStoryboardFile"),
                Some(&PlistValue::String("Main".to_string()))
            );
        }
        other => panic!("expected array, got {:?}", other),
    }
}

#[test]
fn test_unmodified_roundtrip_is_byte_exact() {
    let file = load();
    assert_eq!(file.render().unwrap(), APP_CLIP_PLIST.as_bytes());
}

#[test]
fn test_writer_matches_apple_layout() {
    // 示例文本本身就是 Apple 的标准格式，重新序列化应完全一致
    let file = load();
    assert_eq!(file.to_xml(), APP_CLIP_PLIST);
}

#[test]
fn test_set_replaces_nested_dict() {
    let mut file = load();
    file.set(dict(vec![(
        "UIApplicationSceneManifest",
        dict(vec![("TestKey", PlistValue::Boolean(true))]),
    )]));

    assert_eq!(
        file.get("UIApplicationSceneManifest"),
        Some(&dict(vec![("TestKey", PlistValue::Boolean(true))]))
    );
    assert!(file.get("NSAppClip").is_some());
}

#[test]
fn test_merge_keeps_existing_keys() {
    let mut file = load();
    file.merge(dict(vec![(
        "UIApplicationSceneManifest",
        dict(vec![("TestKey", PlistValue::Boolean(true))]),
    )]));

    let manifest = file.get("UIApplicationSceneManifest").unwrap();
    assert_eq!(manifest.get("TestKey"), Some(&PlistValue::Boolean(true)));
    assert_eq!(
        manifest.get("UIApplicationSupportsMultipleScenes"),
        Some(&PlistValue::Boolean(false))
    );
    assert!(manifest.get("UISceneConfigurations").is_some());
}

#[test]
fn test_set_and_merge_arrays() {
    let mut set_file = PlistFile::new();
    set_file.insert("A", PlistValue::Array(vec![1.into(), 2.into()]));
    let mut merge_file = set_file.clone();

    let patch = dict(vec![("A", PlistValue::Array(vec![3.into()]))]);
    set_file.set(patch.clone());
    merge_file.merge(patch.clone());

    assert_eq!(set_file.get("A"), Some(&PlistValue::Array(vec![3.into()])));
    assert_eq!(
        merge_file.get("A"),
        Some(&PlistValue::Array(vec![1.into(), 2.into(), 3.into()]))
    );

    // merge 重复应用结果不变
    merge_file.merge(patch);
    assert_eq!(
        merge_file.get("A"),
        Some(&PlistValue::Array(vec![1.into(), 2.into(), 3.into()]))
    );
}

#[test]
fn test_update_with_replace() {
    let mut file = load();
    file.update(
        dict(vec![(
            "UIApplicationSceneManifest",
            dict(vec![("TestKey", PlistValue::Boolean(true))]),
        )]),
        true,
    );

    assert_eq!(
        file.get("UIApplicationSceneManifest"),
        Some(&dict(vec![("TestKey", PlistValue::Boolean(true))]))
    );
}

#[test]
fn test_modified_document_is_reserialized() {
    let mut file = load();
    file.insert("CFBundleDisplayName", "My App");

    let xml = String::from_utf8(file.render().unwrap()).unwrap();
    assert!(xml.ends_with("\t<key>CFBundleDisplayName</key>\n\t<string>My App</string>\n</dict>\n</plist>\n"));
}

#[test]
fn test_set_from_xml() {
    let mut file = PlistFile::new();
    file.set_from_xml(
        r#"
<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>NSFoo</key>
  <dict>
    <key>Bar</key>
    <true/>
  </dict>
</dict>
</plist>
    "#,
    )
    .unwrap();

    assert_eq!(
        file.get("NSFoo"),
        Some(&dict(vec![("Bar", PlistValue::Boolean(true))]))
    );
}

#[test]
fn test_scalar_types() {
    let xml = "<plist version=\"1.0\"><dict><key>i</key><integer>42</integer><key>r</key><real>1.5</real><key>s</key><string>a &amp; b</string><key>e</key><array/></dict></plist>";
    let file = PlistFile::parse(Path::new("t.plist"), xml).unwrap();

    assert_eq!(file.get("i"), Some(&PlistValue::Integer(42)));
    assert_eq!(file.get("r"), Some(&PlistValue::Real(1.5)));
    assert_eq!(file.get("s"), Some(&PlistValue::String("a & b".to_string())));
    assert_eq!(file.get("e"), Some(&PlistValue::Array(vec![])));
    assert!(file.to_xml().contains("\t<string>a &amp; b</string>\n\t<key>e</key>\n\t<array/>\n"));
}

#[test]
fn test_grammar_error() {
    let result = PlistFile::parse(Path::new("bad.plist"), "<plist><dict><key>a</key></dict></plist>");
    assert!(matches!(result, Err(crate::ProjectError::Grammar { .. })));
}

#[test]
fn test_from_json() {
    let value = PlistValue::from_json(serde_json::json!({
        "CFBundleURLTypes": [{"CFBundleURLSchemes": ["app"]}],
        "Count": 3,
        "Skip": null
    }))
    .unwrap();

    assert_eq!(value.get("Count"), Some(&PlistValue::Integer(3)));
    assert!(value.get("Skip").is_none());
}
