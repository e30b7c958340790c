use std::fs;
use std::path::{Path, PathBuf};

use mobile_project_edit::{
    EditorKind, MobileProject, Operation, ProjectConfig, ProjectError, StringsFile, XcodeProject,
};
use tempfile::TempDir;

const APP_PBXPROJ: &str = include_str!("fixtures/App.pbxproj");

const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleDevelopmentRegion</key>
	<string>en</string>
	<key>CFBundleDisplayName</key>
	<string>Starter</string>
	<key>CFBundleVersion</key>
	<string>1</string>
</dict>
</plist>
"#;

const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="io.ionic.starter">

    <application
        android:allowBackup="true"
        android:label="@string/app_name">

        <activity
            android:name="io.ionic.starter.MainActivity"
            android:label="@string/title_activity_main"
            android:launchMode="singleTask"
            android:exported="true">
        </activity>
    </application>
</manifest>
"#;

const APP_GRADLE: &str = r#"apply plugin: 'com.android.application'

android {
    namespace "io.ionic.starter"
    compileSdkVersion rootProject.ext.compileSdkVersion
    defaultConfig {
        applicationId "io.ionic.starter"
        minSdkVersion rootProject.ext.minSdkVersion
        versionCode 1
        versionName "1.0"
    }
}

dependencies {
    implementation fileTree(include: ['*.jar'], dir: 'libs')
}
"#;

const STRINGS_XML: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<resources>
    <string name="app_name">capacitor-configure-test</string>
    <string name="title_activity_main">capacitor-configure-test</string>
</resources>
"#;

const MAIN_ACTIVITY: &str = "package io.ionic.starter;\n\nimport com.getcapacitor.BridgeActivity;\n\npublic class MainActivity extends BridgeActivity {}\n";

/// 在临时目录中创建同时包含 iOS 与 Android 的工程
fn fixture() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let ios = root.join("ios/App");
    fs::create_dir_all(ios.join("App.xcodeproj")).unwrap();
    fs::create_dir_all(ios.join("App")).unwrap();
    fs::write(ios.join("App.xcodeproj/project.pbxproj"), APP_PBXPROJ).unwrap();
    fs::write(ios.join("App/Info.plist"), INFO_PLIST).unwrap();

    let main = root.join("android/app/src/main");
    fs::create_dir_all(main.join("java/io/ionic/starter")).unwrap();
    fs::create_dir_all(main.join("res/values")).unwrap();
    fs::write(main.join("AndroidManifest.xml"), MANIFEST).unwrap();
    fs::write(main.join("res/values/strings.xml"), STRINGS_XML).unwrap();
    fs::write(main.join("java/io/ionic/starter/MainActivity.java"), MAIN_ACTIVITY).unwrap();
    fs::write(root.join("android/app/build.gradle"), APP_GRADLE).unwrap();

    temp_dir
}

fn load(root: &Path) -> MobileProject {
    let mut project = MobileProject::new(ProjectConfig::for_root(root));
    project.load().unwrap();
    project
}

fn pbxproj_path(root: &Path) -> PathBuf {
    root.join("ios/App/App.xcodeproj/project.pbxproj")
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

fn apply(project: &mut MobileProject, json: &str) {
    let operations = Operation::parse_list(json).unwrap();
    let report = project.apply_all(&operations).unwrap();
    assert!(report.is_complete(), "skipped: {:?}", report.skipped);
}

#[test]
fn test_load_detects_both_platforms() {
    let temp_dir = fixture();
    let mut project = load(temp_dir.path());

    let mut ios = project.ios().unwrap();
    assert_eq!(ios.app_target().unwrap().name, "App");
    assert_eq!(ios.bundle_id(None, None).unwrap().as_deref(), Some("io.ionic.starter"));
    assert_eq!(ios.display_name(None, None).unwrap().as_deref(), Some("Starter"));

    let mut android = project.android().unwrap();
    assert_eq!(android.package_name().unwrap().as_deref(), Some("io.ionic.starter"));
    assert_eq!(android.version_code().unwrap(), Some(1));
}

#[test]
fn test_unmodified_commit_is_byte_identical() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut project = load(root);

    // 只读访问
    project.ios().unwrap().targets().unwrap();
    project.android().unwrap().version_name().unwrap();

    assert!(project.diff().unwrap().iter().all(|d| !d.is_changed()));
    assert!(project.commit().is_success());

    assert_eq!(read(root, "ios/App/App.xcodeproj/project.pbxproj"), APP_PBXPROJ);
    assert_eq!(read(root, "ios/App/App/Info.plist"), INFO_PLIST);
    assert_eq!(read(root, "android/app/src/main/AndroidManifest.xml"), MANIFEST);
    assert_eq!(read(root, "android/app/build.gradle"), APP_GRADLE);
}

#[test]
fn test_build_number_fans_out() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut project = load(root);

    apply(&mut project, r#"[{"op": "iosBuildNumber", "value": 42}]"#);
    project.commit();

    let pbxproj = read(root, "ios/App/App.xcodeproj/project.pbxproj");
    assert_eq!(pbxproj.matches("CURRENT_PROJECT_VERSION = 42;").count(), 2);

    let plist = read(root, "ios/App/App/Info.plist");
    assert!(plist.contains("\t<key>CFBundleVersion</key>\n\t<string>$(CURRENT_PROJECT_VERSION)</string>\n"));
    // 其它键保持原样
    assert!(plist.contains("\t<key>CFBundleDisplayName</key>\n\t<string>Starter</string>\n"));
}

#[test]
fn test_increment_build_and_version() {
    let temp_dir = fixture();
    let mut project = load(temp_dir.path());

    apply(
        &mut project,
        r#"[
            {"op": "iosIncrementBuild"},
            {"op": "iosIncrementBuild", "build": "Release"},
            {"op": "iosVersion", "value": "2.0"}
        ]"#,
    );

    let mut ios = project.ios().unwrap();
    assert_eq!(ios.build(None, Some("Debug")).unwrap().as_deref(), Some("2"));
    assert_eq!(ios.build(None, Some("Release")).unwrap().as_deref(), Some("3"));
    assert_eq!(ios.version(None, Some("Release")).unwrap().as_deref(), Some("2.0"));
}

#[test]
fn test_strings_upsert_registers_new_file() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    fs::write(
        root.join("ios/App/App/Existing.strings"),
        "/* Greeting */\n\"hello\" = \"Hello\";\n",
    )
    .unwrap();
    let mut project = load(root);

    apply(
        &mut project,
        r#"[
            {"op": "iosStrings", "file": "App/Existing.strings", "set": {"hello": "Hi", "bye": "Bye"}},
            {"op": "iosStrings", "file": "App/Localizable.strings", "set": {"title": "My App"}}
        ]"#,
    );
    project.commit();

    assert_eq!(
        read(root, "ios/App/App/Existing.strings"),
        "/* Greeting */\n\"hello\" = \"Hi\";\n\n\"bye\" = \"Bye\";\n"
    );
    assert_eq!(read(root, "ios/App/App/Localizable.strings").trim(), "\"title\" = \"My App\";");

    let pbxproj = read(root, "ios/App/App.xcodeproj/project.pbxproj");
    assert!(pbxproj.contains("path = Localizable.strings;"));
    assert!(!pbxproj.contains("path = Existing.strings;"));
}

#[test]
fn test_strings_from_staged_json() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    fs::write(root.join("strings.json"), r#"{"title": "Old"}"#).unwrap();
    let mut project = load(root);

    // 已暂存的 JSON 优先于磁盘内容
    apply(
        &mut project,
        r#"[
            {"op": "json", "platform": "ios", "file": "../../strings.json", "set": {"title": "New", "count": 2}},
            {"op": "iosStrings", "file": "App/Localizable.strings", "setFromJson": "strings.json"}
        ]"#,
    );
    let strings = project.strings_file(Path::new("ios/App/App/Localizable.strings")).unwrap();
    assert_eq!(strings.get("title"), Some("New"));
    assert_eq!(strings.get("count"), Some("2"));

    let err = project
        .apply(&Operation::parse_list(
            r#"[{"op": "iosStrings", "file": "App/Localizable.strings", "setFromJson": "missing.json"}]"#,
        )
        .unwrap()[0])
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_entitlements_are_created() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut project = load(root);

    apply(
        &mut project,
        r#"[
            {"op": "iosEntitlements", "entries": [
                {"keychain-access-groups": ["$(AppIdentifierPrefix)io.ionic.starter"]},
                {"com.apple.developer.associated-domains": ["applinks:example.com"]}
            ]}
        ]"#,
    );

    let mut ios = project.ios().unwrap();
    assert_eq!(
        ios.entitlements_file(None, Some("Release")).unwrap().as_deref(),
        Some("App/App.entitlements")
    );
    let entitlements = ios.entitlements(None, None).unwrap().unwrap();
    assert!(entitlements.get("keychain-access-groups").is_some());
    assert!(entitlements.get("com.apple.developer.associated-domains").is_some());

    project.commit();
    let written = read(root, "ios/App/App/App.entitlements");
    assert!(written.contains("<string>applinks:example.com</string>"));
    assert!(read(root, "ios/App/App.xcodeproj/project.pbxproj").contains("path = App.entitlements;"));
}

#[test]
fn test_manifest_delete_attributes_keeps_siblings() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut project = load(root);

    apply(
        &mut project,
        r#"[{"op": "xml", "platform": "android", "target": "//activity", "deleteAttributes": ["android:launchMode"]}]"#,
    );
    project.commit();

    let expected = MANIFEST.replace("            android:launchMode=\"singleTask\"\n", "");
    assert_eq!(read(root, "android/app/src/main/AndroidManifest.xml"), expected);
}

#[test]
fn test_android_app_name_and_versions() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut project = load(root);

    apply(
        &mut project,
        r#"[
            {"op": "androidAppName", "value": "New App Name"},
            {"op": "androidVersionName", "value": "2.0.0"},
            {"op": "androidIncrementVersionCode"}
        ]"#,
    );
    project.commit();

    let strings = read(root, "android/app/src/main/res/values/strings.xml");
    assert!(strings.contains("<string name=\"app_name\">New App Name</string>"));
    assert!(strings.contains("<string name=\"title_activity_main\">capacitor-configure-test</string>"));

    let gradle = read(root, "android/app/build.gradle");
    assert!(gradle.contains("        versionCode 2\n"));
    assert!(gradle.contains("        versionName \"2.0.0\"\n"));
}

#[test]
fn test_package_rename() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut project = load(root);

    apply(&mut project, r#"[{"op": "androidPackageName", "value": "com.example.newapp"}]"#);
    project.commit();

    let manifest = read(root, "android/app/src/main/AndroidManifest.xml");
    assert!(manifest.contains("package=\"com.example.newapp\""));
    assert!(manifest.contains("android:name=\"com.example.newapp.MainActivity\""));
    assert!(read(root, "android/app/build.gradle").contains("applicationId \"com.example.newapp\""));

    let java = root.join("android/app/src/main/java");
    assert!(read(root, "android/app/src/main/java/com/example/newapp/MainActivity.java")
        .starts_with("package com.example.newapp;"));
    assert!(!java.join("io").exists());
}

#[test]
fn test_package_rename_precondition_leaves_project_unchanged() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let java = root.join("android/app/src/main/java");
    fs::rename(java.join("io/ionic/starter"), java.join("io/ionic/other")).unwrap();

    let mut project = load(root);
    let err = project
        .apply(&Operation::AndroidPackageName {
            value: "io.ionic.newapp".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, ProjectError::Precondition(_)));
    assert!(!err.is_fatal());

    assert!(project.commit().is_success());
    assert_eq!(read(root, "android/app/src/main/AndroidManifest.xml"), MANIFEST);
    assert_eq!(read(root, "android/app/build.gradle"), APP_GRADLE);
    assert!(java.join("io/ionic/other/MainActivity.java").exists());
    assert!(!java.join("io/ionic/newapp").exists());
}

#[test]
fn test_dry_run_diff_does_not_write() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut project = load(root);

    apply(
        &mut project,
        r#"[
            {"op": "iosBundleId", "value": "com.example.app"},
            {"op": "json", "platform": "ios", "file": "App/capacitor.config.json", "set": {"appId": "com.example.app"}}
        ]"#,
    );

    let changed: Vec<String> = project
        .diff()
        .unwrap()
        .iter()
        .filter(|d| d.is_changed())
        .map(|d| d.to_string())
        .collect();
    assert_eq!(changed.len(), 2);
    assert!(changed[0].starts_with(&pbxproj_path(root).display().to_string()));
    assert!(changed[1].ends_with("new file (3 lines)"));

    assert_eq!(read(root, "ios/App/App.xcodeproj/project.pbxproj"), APP_PBXPROJ);
    assert!(!root.join("ios/App/App/capacitor.config.json").exists());
}

#[test]
fn test_same_path_returns_same_model() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    let mut project = load(root);

    let path = Path::new("ios/App/App/Localizable.strings");
    project.strings_file(path).unwrap().set([("a", "1")]);
    project.strings_file(path).unwrap().set([("b", "2")]);

    let strings = project
        .staging()
        .document::<StringsFile>(&root.join(path))
        .unwrap()
        .unwrap();
    assert_eq!(strings.get("a"), Some("1"));
    assert_eq!(strings.get("b"), Some("2"));

    // 同一路径不能以其它格式再次打开
    assert!(matches!(
        project.editor(EditorKind::Xcconfig, path),
        Err(ProjectError::DocumentKind { .. })
    ));
}

#[test]
fn test_malformed_xcode_project_aborts_load() {
    let temp_dir = fixture();
    let root = temp_dir.path();
    fs::write(pbxproj_path(root), "// !$*UTF8*$!\n{\n\tobjects = {\n").unwrap();

    let mut project = MobileProject::new(ProjectConfig::for_root(root));
    let err = project.load().unwrap_err();
    assert!(err.is_fatal());

    let mut staging = mobile_project_edit::StagingArea::new();
    assert!(XcodeProject::open(&mut staging, &pbxproj_path(root)).is_err());
}
