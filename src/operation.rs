/// 操作模型
///
/// 一个操作列表（JSON）描述对工程的一组修改，按顺序应用到 [`MobileProject`]。
///
/// ```json
/// [
///   { "op": "iosBundleId", "value": "com.example.app" },
///   { "op": "androidVersionCode", "value": 42 },
///   { "op": "xml", "platform": "android", "target": "//activity", "deleteAttributes": ["android:launchMode"] }
/// ]
/// ```
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::gradle::{GradleEntry, GradleInsertType};
use crate::plist::PlistValue;
use crate::project::{AndroidProject, IosProject, MobileProject, ResourceDir};
use crate::utils::{ProjectError, Result};
use crate::xcode::FrameworkOptions;
use crate::xml::AttrMode;

/// 目标平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

/// 字符串或数字
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl Scalar {
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// Gradle 插入内容：原样片段或条目列表
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GradleInsert {
    Fragment(String),
    Entries(Vec<GradleInsertItem>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GradleInsertItem {
    Raw(String),
    Properties(IndexMap<String, Scalar>),
}

/// 单个 Gradle 修改
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradleChange {
    /// 相对 Android 根目录，如 `app/build.gradle`
    pub file: PathBuf,
    /// 点分块路径
    pub target: String,
    #[serde(default)]
    pub insert: Option<GradleInsert>,
    #[serde(default)]
    pub replace: Option<IndexMap<String, Scalar>>,
    #[serde(default)]
    pub insert_type: GradleInsertType,
    #[serde(default)]
    pub exact: bool,
}

/// 单个 XML 修改
///
/// 文件查找顺序：`resFile`（Android 资源目录）、`file`（平台根目录）；
/// Android 两者都缺省时为 `AndroidManifest.xml`。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XmlChange {
    pub platform: Platform,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub res_file: Option<PathBuf>,
    pub target: String,
    #[serde(default)]
    pub attrs: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub attrs_mode: AttrMode,
    #[serde(default)]
    pub inject: Option<String>,
    #[serde(default)]
    pub merge: Option<String>,
    #[serde(default)]
    pub replace: Option<String>,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub delete_attributes: Option<Vec<String>>,
}

/// 一个工程操作
///
/// iOS 操作的 `target` 缺省为应用 target；`build` 缺省时读取第一个构建配置、
/// 写入全部构建配置。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Operation {
    IosBundleId {
        target: Option<String>,
        build: Option<String>,
        value: String,
    },
    IosProductName {
        target: Option<String>,
        value: String,
    },
    IosDisplayName {
        target: Option<String>,
        build: Option<String>,
        value: String,
    },
    IosVersion {
        target: Option<String>,
        build: Option<String>,
        value: String,
    },
    IosBuildNumber {
        target: Option<String>,
        build: Option<String>,
        value: Scalar,
    },
    IosIncrementBuild {
        target: Option<String>,
        build: Option<String>,
    },
    IosBuildSettings {
        target: Option<String>,
        build: Option<String>,
        settings: IndexMap<String, Scalar>,
    },
    IosFrameworks {
        target: Option<String>,
        frameworks: Vec<String>,
        #[serde(default)]
        weak: bool,
        #[serde(default)]
        custom: bool,
    },
    IosEntitlements {
        target: Option<String>,
        build: Option<String>,
        entries: Vec<Value>,
        #[serde(default)]
        replace: bool,
    },
    IosPlist {
        target: Option<String>,
        build: Option<String>,
        /// 相对 iOS 根目录；缺省为 target 的 Info.plist
        file: Option<PathBuf>,
        #[serde(default)]
        entries: Vec<Value>,
        #[serde(default)]
        replace: bool,
        /// 整体替换文档的 plist XML
        xml: Option<String>,
    },
    IosStrings {
        file: PathBuf,
        set: Option<IndexMap<String, String>>,
        /// 相对工程根目录的 JSON 文件
        set_from_json: Option<PathBuf>,
    },
    IosXcconfig {
        file: PathBuf,
        set: IndexMap<String, String>,
    },
    Xml(XmlChange),
    Json {
        platform: Platform,
        file: Option<PathBuf>,
        res_file: Option<PathBuf>,
        set: Option<Value>,
        merge: Option<Value>,
    },
    AndroidPackageName {
        value: String,
    },
    AndroidAppName {
        value: String,
    },
    AndroidVersionName {
        value: String,
    },
    AndroidVersionCode {
        value: u64,
    },
    AndroidIncrementVersionCode,
    AndroidGradle {
        entries: Vec<GradleChange>,
    },
    AndroidResource {
        dir: ResourceDir,
        file: String,
        text: Option<String>,
        /// 相对工程根目录
        source: Option<PathBuf>,
    },
    Copy {
        src: PathBuf,
        dest: PathBuf,
    },
}

impl Operation {
    /// 操作名（JSON 中的 `op`）
    pub fn name(&self) -> &'static str {
        match self {
            Operation::IosBundleId { .. } => "iosBundleId",
            Operation::IosProductName { .. } => "iosProductName",
            Operation::IosDisplayName { .. } => "iosDisplayName",
            Operation::IosVersion { .. } => "iosVersion",
            Operation::IosBuildNumber { .. } => "iosBuildNumber",
            Operation::IosIncrementBuild { .. } => "iosIncrementBuild",
            Operation::IosBuildSettings { .. } => "iosBuildSettings",
            Operation::IosFrameworks { .. } => "iosFrameworks",
            Operation::IosEntitlements { .. } => "iosEntitlements",
            Operation::IosPlist { .. } => "iosPlist",
            Operation::IosStrings { .. } => "iosStrings",
            Operation::IosXcconfig { .. } => "iosXcconfig",
            Operation::Xml(_) => "xml",
            Operation::Json { .. } => "json",
            Operation::AndroidPackageName { .. } => "androidPackageName",
            Operation::AndroidAppName { .. } => "androidAppName",
            Operation::AndroidVersionName { .. } => "androidVersionName",
            Operation::AndroidVersionCode { .. } => "androidVersionCode",
            Operation::AndroidIncrementVersionCode => "androidIncrementVersionCode",
            Operation::AndroidGradle { .. } => "androidGradle",
            Operation::AndroidResource { .. } => "androidResource",
            Operation::Copy { .. } => "copy",
        }
    }

    /// 从 JSON 数组解析操作列表
    pub fn parse_list(text: &str) -> Result<Vec<Operation>> {
        Ok(serde_json::from_str(text)?)
    }
}

/// [`MobileProject::apply_all`] 的结果
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: usize,
    /// 跳过的操作：下标、操作名、原因
    pub skipped: Vec<(usize, &'static str, ProjectError)>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl MobileProject {
    /// 依次应用操作
    ///
    /// 语法错误立即中止并返回；其它错误记录警告后继续下一个操作。
    pub fn apply_all(&mut self, operations: &[Operation]) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for (index, operation) in operations.iter().enumerate() {
            match self.apply(operation) {
                Ok(()) => report.applied += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(index, op = operation.name(), error = %e, "skipping operation");
                    report.skipped.push((index, operation.name(), e));
                }
            }
        }

        info!(applied = report.applied, skipped = report.skipped.len(), "applied operations");
        Ok(report)
    }

    /// 应用单个操作
    pub fn apply(&mut self, operation: &Operation) -> Result<()> {
        debug!(op = operation.name(), "applying operation");

        match operation {
            Operation::IosBundleId { target, build, value } => {
                self.require_ios()?
                    .set_bundle_id(target.as_deref(), build.as_deref(), value)
            }
            Operation::IosProductName { target, value } => {
                self.require_ios()?.set_product_name(target.as_deref(), value)
            }
            Operation::IosDisplayName { target, build, value } => {
                self.require_ios()?
                    .set_display_name(target.as_deref(), build.as_deref(), value)
            }
            Operation::IosVersion { target, build, value } => {
                self.require_ios()?
                    .set_version(target.as_deref(), build.as_deref(), value)
            }
            Operation::IosBuildNumber { target, build, value } => {
                self.require_ios()?
                    .set_build(target.as_deref(), build.as_deref(), &value.to_text())
            }
            Operation::IosIncrementBuild { target, build } => {
                let number = self
                    .require_ios()?
                    .increment_build(target.as_deref(), build.as_deref())?;
                debug!(number, "incremented build number");
                Ok(())
            }
            Operation::IosBuildSettings { target, build, settings } => {
                let mut ios = self.require_ios()?;
                for (key, value) in settings {
                    ios.set_build_property(target.as_deref(), build.as_deref(), key, &value.to_text())?;
                }
                Ok(())
            }
            Operation::IosFrameworks { target, frameworks, weak, custom } => {
                let mut options = FrameworkOptions::empty();
                options.set(FrameworkOptions::WEAK, *weak);
                options.set(FrameworkOptions::CUSTOM, *custom);

                let mut ios = self.require_ios()?;
                for framework in frameworks {
                    ios.add_framework(target.as_deref(), framework, options)?;
                }
                Ok(())
            }
            Operation::IosEntitlements { target, build, entries, replace } => {
                let mut ios = self.require_ios()?;
                for entry in entries {
                    let entry = plist_value(entry)?;
                    if *replace {
                        ios.set_entitlements(target.as_deref(), build.as_deref(), entry)?;
                    } else {
                        ios.add_entitlements(target.as_deref(), build.as_deref(), entry)?;
                    }
                }
                Ok(())
            }
            Operation::IosPlist { target, build, file, entries, replace, xml } => {
                self.apply_plist(target.as_deref(), build.as_deref(), file.as_deref(), entries, *replace, xml.as_deref())
            }
            Operation::IosStrings { file, set, set_from_json } => {
                let json = match set_from_json {
                    Some(path) => Some(self.read_json_source(path)?),
                    None => None,
                };
                let mut ios = self.require_ios()?;
                let strings = ios.strings_file(file)?;
                if let Some(values) = set {
                    strings.set(values);
                }
                if let Some(json) = json {
                    strings.set_from_json(&json)?;
                }
                Ok(())
            }
            Operation::IosXcconfig { file, set } => {
                let mut ios = self.require_ios()?;
                ios.xcconfig_file(file)?.set(set.clone());
                Ok(())
            }
            Operation::Xml(change) => self.apply_xml(change),
            Operation::Json { platform, file, res_file, set, merge } => {
                let path = self.platform_file(*platform, file.as_deref(), res_file.as_deref())?;
                let json = self.json_file(&path)?;
                if let Some(patch) = set {
                    json.set(patch.clone());
                }
                if let Some(patch) = merge {
                    json.merge(patch.clone());
                }
                Ok(())
            }
            Operation::AndroidPackageName { value } => {
                self.require_android()?.set_package_name(value).map(|_| ())
            }
            Operation::AndroidAppName { value } => self.require_android()?.set_app_name(value),
            Operation::AndroidVersionName { value } => {
                self.require_android()?.set_version_name(value)
            }
            Operation::AndroidVersionCode { value } => {
                self.require_android()?.set_version_code(*value)
            }
            Operation::AndroidIncrementVersionCode => {
                self.require_android()?.increment_version_code().map(|_| ())
            }
            Operation::AndroidGradle { entries } => {
                let mut android = self.require_android()?;
                for entry in entries {
                    apply_gradle(&mut android, entry)?;
                }
                Ok(())
            }
            Operation::AndroidResource { dir, file, text, source } => {
                let source = source.as_deref().map(|p| self.resolve(p));
                let mut android = self.require_android()?;
                match (text, source) {
                    (Some(text), _) => android.add_resource(*dir, file, text),
                    (None, Some(source)) => android.copy_to_resources(*dir, file, &source),
                    (None, None) => Err(ProjectError::Configuration(
                        "androidResource requires 'text' or 'source'".to_string(),
                    )),
                }
            }
            Operation::Copy { src, dest } => self.copy_file(src, dest),
        }
    }

    fn require_ios(&mut self) -> Result<IosProject<'_>> {
        self.ios()
            .ok_or_else(|| ProjectError::Configuration("iOS platform not found in project".to_string()))
    }

    fn require_android(&mut self) -> Result<AndroidProject<'_>> {
        self.android()
            .ok_or_else(|| ProjectError::Configuration("Android platform not found in project".to_string()))
    }

    /// 经暂存区读取的 JSON 源文件（已暂存的内容优先）
    fn read_json_source(&self, path: &Path) -> Result<Vec<u8>> {
        let path = self.resolve(path);
        if let Some(entry) = self.staging().get(&path) {
            return entry.document().render();
        }
        self.staging().read_source(&path)?.ok_or_else(|| {
            ProjectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ))
        })
    }

    fn apply_plist(
        &mut self,
        target: Option<&str>,
        build: Option<&str>,
        file: Option<&Path>,
        entries: &[Value],
        replace: bool,
        xml: Option<&str>,
    ) -> Result<()> {
        let mut ios = self.require_ios()?;

        let Some(file) = file else {
            if xml.is_some() {
                return Err(ProjectError::Configuration(
                    "iosPlist 'xml' requires an explicit 'file'".to_string(),
                ));
            }
            for entry in entries {
                ios.update_info_plist(target, build, plist_value(entry)?, replace)?;
            }
            return Ok(());
        };

        let plist = ios.plist_file(file)?;
        if let Some(xml) = xml {
            plist.set_from_xml(xml)?;
        }
        for entry in entries {
            plist.update(plist_value(entry)?, replace);
        }
        Ok(())
    }

    fn apply_xml(&mut self, change: &XmlChange) -> Result<()> {
        let path = self.platform_file(change.platform, change.file.as_deref(), change.res_file.as_deref())?;
        let xml = self.xml_file(&path)?;
        let target = change.target.as_str();

        if let Some(attrs) = &change.attrs {
            xml.set_attrs(target, attrs, change.attrs_mode)?;
        }
        if let Some(fragment) = &change.inject {
            xml.inject(target, fragment)?;
        }
        if let Some(fragment) = &change.merge {
            xml.merge(target, fragment)?;
        }
        if let Some(fragment) = &change.replace {
            xml.replace(target, fragment)?;
        }
        if change.delete {
            xml.delete(target)?;
        }
        if let Some(names) = &change.delete_attributes {
            xml.delete_attributes(target, names)?;
        }
        Ok(())
    }

    /// 操作中的文件路径解析为绝对路径
    fn platform_file(&mut self, platform: Platform, file: Option<&Path>, res_file: Option<&Path>) -> Result<PathBuf> {
        match platform {
            Platform::Ios => {
                let ios = self.require_ios()?;
                let file = file.ok_or_else(|| {
                    ProjectError::Configuration("iOS file operations require 'file'".to_string())
                })?;
                Ok(ios.root().join(file))
            }
            Platform::Android => {
                let android = self.require_android()?;
                Ok(match (res_file, file) {
                    (Some(res_file), _) => android.resources_root().join(res_file),
                    (None, Some(file)) => android.root().join(file),
                    (None, None) => android.manifest_path(),
                })
            }
        }
    }
}

fn plist_value(value: &Value) -> Result<PlistValue> {
    PlistValue::from_json(value.clone())
        .ok_or_else(|| ProjectError::Configuration("plist entries cannot be null".to_string()))
}

/// 应用一个 Gradle 修改；文件不存在时记录后跳过
fn apply_gradle(android: &mut AndroidProject<'_>, change: &GradleChange) -> Result<()> {
    let gradle = match android.gradle_file(&change.file) {
        Ok(gradle) => gradle,
        Err(e) if e.is_not_found() => {
            warn!(file = %change.file.display(), "can't locate Gradle file, skipping");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if let Some(replace) = &change.replace {
        let replacements: IndexMap<String, String> = replace
            .iter()
            .map(|(key, value)| (key.clone(), value.to_text()))
            .collect();
        gradle.replace_properties(&change.target, &replacements, change.exact)?;
        return Ok(());
    }

    match &change.insert {
        Some(GradleInsert::Fragment(fragment)) => {
            gradle.insert_fragment(&change.target, fragment, change.exact)?;
        }
        Some(GradleInsert::Entries(items)) => {
            let entries: Vec<GradleEntry> = items
                .iter()
                .flat_map(|item| match item {
                    GradleInsertItem::Raw(line) => vec![GradleEntry::Raw(line.clone())],
                    GradleInsertItem::Properties(props) => props
                        .iter()
                        .map(|(key, value)| GradleEntry::property(key.clone(), value.to_text()))
                        .collect(),
                })
                .collect();
            gradle.insert_properties(&change.target, &entries, change.insert_type, change.exact)?;
        }
        None => {
            return Err(ProjectError::Configuration(format!(
                "gradle change for '{}' needs 'insert' or 'replace'",
                change.target
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="io.ionic.starter">
    <application android:label="@string/app_name">
        <activity android:name="io.ionic.starter.MainActivity" android:launchMode="singleTask" android:exported="true">
        </activity>
    </application>
</manifest>
"#;

    fn android_fixture() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let main = temp_dir.path().join("android/app/src/main");
        std::fs::create_dir_all(&main).unwrap();
        std::fs::write(main.join("AndroidManifest.xml"), MANIFEST).unwrap();
        std::fs::write(
            temp_dir.path().join("android/app/build.gradle"),
            "android {\n    defaultConfig {\n        versionCode 1\n        versionName \"1.0\"\n    }\n}\n",
        )
        .unwrap();
        temp_dir
    }

    fn load(root: &Path) -> MobileProject {
        let mut project = MobileProject::new(ProjectConfig::for_root(root));
        project.load().unwrap();
        project
    }

    #[test]
    fn test_parse_operations() {
        let ops = Operation::parse_list(
            r#"[
                {"op": "iosBundleId", "target": "App", "value": "com.example.app"},
                {"op": "iosBuildNumber", "value": 12},
                {"op": "androidIncrementVersionCode"},
                {"op": "xml", "platform": "android", "target": "//activity", "deleteAttributes": ["android:launchMode"]},
                {"op": "androidGradle", "entries": [
                    {"file": "app/build.gradle", "target": "dependencies", "insert": [{"implementation": "'a:b:1'"}], "insertType": "method"}
                ]},
                {"op": "androidResource", "dir": "mipmap-hdpi", "file": "icon.png", "source": "icon.png"}
            ]"#,
        )
        .unwrap();

        assert_eq!(ops.len(), 6);
        assert_eq!(
            ops[0],
            Operation::IosBundleId {
                target: Some("App".to_string()),
                build: None,
                value: "com.example.app".to_string()
            }
        );
        assert!(matches!(&ops[1], Operation::IosBuildNumber { value, .. } if value.to_text() == "12"));
        assert_eq!(ops[2].name(), "androidIncrementVersionCode");
        match &ops[3] {
            Operation::Xml(change) => {
                assert_eq!(change.platform, Platform::Android);
                assert_eq!(change.delete_attributes.as_deref(), Some(&["android:launchMode".to_string()][..]));
                assert!(!change.delete);
            }
            other => panic!("unexpected operation {:?}", other),
        }
        match &ops[4] {
            Operation::AndroidGradle { entries } => {
                assert_eq!(entries[0].insert_type, GradleInsertType::Method);
                assert!(matches!(entries[0].insert, Some(GradleInsert::Entries(_))));
            }
            other => panic!("unexpected operation {:?}", other),
        }
        assert!(matches!(&ops[5], Operation::AndroidResource { dir: ResourceDir::MipmapHdpi, .. }));
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        assert!(Operation::parse_list(r#"[{"op": "windowsThing"}]"#).is_err());
    }

    #[test]
    fn test_manifest_delete_attributes() {
        let temp_dir = android_fixture();
        let mut project = load(temp_dir.path());

        let ops = Operation::parse_list(
            r#"[{"op": "xml", "platform": "android", "target": "//activity", "deleteAttributes": ["android:launchMode"]}]"#,
        )
        .unwrap();
        let report = project.apply_all(&ops).unwrap();
        assert!(report.is_complete());
        project.commit();

        let manifest =
            std::fs::read_to_string(temp_dir.path().join("android/app/src/main/AndroidManifest.xml")).unwrap();
        assert!(manifest.contains(
            "<activity android:name=\"io.ionic.starter.MainActivity\" android:exported=\"true\">"
        ));
        assert!(!manifest.contains("launchMode"));
    }

    #[test]
    fn test_missing_gradle_file_is_skipped() {
        let temp_dir = android_fixture();
        let mut project = load(temp_dir.path());

        let ops = Operation::parse_list(
            r#"[
                {"op": "androidGradle", "entries": [
                    {"file": "missing/build.gradle", "target": "android", "insert": "foo 1"},
                    {"file": "app/build.gradle", "target": "android.defaultConfig", "replace": {"versionName": "\"2.0\""}}
                ]}
            ]"#,
        )
        .unwrap();
        let report = project.apply_all(&ops).unwrap();
        assert!(report.is_complete());
        assert_eq!(
            project.android().unwrap().version_name().unwrap().as_deref(),
            Some("2.0")
        );
    }

    #[test]
    fn test_non_fatal_errors_continue() {
        let temp_dir = android_fixture();
        let mut project = load(temp_dir.path());

        let ops = Operation::parse_list(
            r#"[
                {"op": "iosBundleId", "value": "com.example"},
                {"op": "copy", "src": "missing.png", "dest": "android/icon.png"},
                {"op": "androidVersionCode", "value": 7}
            ]"#,
        )
        .unwrap();
        let report = project.apply_all(&ops).unwrap();

        assert_eq!(report.applied, 1);
        let skipped: Vec<_> = report.skipped.iter().map(|(i, name, _)| (*i, *name)).collect();
        assert_eq!(skipped, vec![(0, "iosBundleId"), (1, "copy")]);
        assert!(matches!(report.skipped[0].2, ProjectError::Configuration(_)));
        assert_eq!(project.android().unwrap().version_code().unwrap(), Some(7));
    }

    #[test]
    fn test_grammar_error_aborts() {
        let temp_dir = android_fixture();
        std::fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();
        let mut project = load(temp_dir.path());

        let ops = Operation::parse_list(
            r#"[
                {"op": "json", "platform": "android", "file": "../broken.json", "set": {"a": 1}},
                {"op": "androidVersionCode", "value": 7}
            ]"#,
        )
        .unwrap();
        let err = project.apply_all(&ops).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(project.android().unwrap().version_code().unwrap(), Some(1));
    }
}
