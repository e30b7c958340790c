use std::any::Any;
use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use tracing::debug;

use super::parse::parse_pbxproj;
use super::pbx::{PbxEntry, PbxItem, PbxObject, PbxValue};
use super::write::write_pbxproj;
use crate::editor::{StagedDocument, StagingArea};
use crate::utils::{ProjectError, Result};

pub const APPLICATION_PRODUCT_TYPE: &str = "com.apple.product-type.application";

bitflags! {
    /// 添加 framework 的选项
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameworkOptions: u8 {
        const WEAK = 0x01;      // ATTRIBUTES = (Weak, )
        const CUSTOM = 0x02;    // 工程内的 framework，而非 SDK 自带
    }
}

/// 原生 target
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: String,
    pub name: String,
    pub product_name: Option<String>,
    pub product_type: Option<String>,
    pub build_configurations: Vec<BuildConfiguration>,
}

/// target 的一个构建配置（Debug / Release ...）
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfiguration {
    pub id: String,
    pub name: String,
    pub build_settings: PbxObject,
}

impl BuildConfiguration {
    pub fn setting(&self, key: &str) -> Option<Cow<'_, str>> {
        self.build_settings.get_str(key)
    }
}

/// Xcode 工程（project.pbxproj）
///
/// 对象图以 24 位十六进制标识符为键。未修改时提交原文，修改后按 Xcode 布局重新生成。
#[derive(Debug, Clone)]
pub struct XcodeProject {
    path: PathBuf,
    source: Option<String>,
    header: String,
    root: PbxObject,
    trailer: String,
    modified: bool,
}

impl XcodeProject {
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let parsed = parse_pbxproj(text).map_err(|e| ProjectError::grammar(path, e))?;
        if parsed.root.get("objects").and_then(PbxValue::as_object).is_none() {
            return Err(ProjectError::grammar(path, "missing 'objects' dictionary"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            source: Some(text.to_string()),
            header: parsed.header,
            root: parsed.root,
            trailer: parsed.trailer,
            modified: false,
        })
    }

    /// 在暂存区中打开；工程文件必须存在
    pub fn open<'a>(staging: &'a mut StagingArea, path: &Path) -> Result<&'a mut Self> {
        let (project, outcome) = staging.open_with(path, |bytes| match bytes {
            Some(bytes) => Self::parse(path, &String::from_utf8_lossy(&bytes)),
            None => Err(ProjectError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ))),
        })?;
        debug!(path = %path.display(), ?outcome, "opened xcode project");
        Ok(project)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// 序列化
    pub fn to_pbxproj(&self) -> String {
        write_pbxproj(&self.header, &self.root, &self.trailer)
    }

    pub fn objects(&self) -> Option<&PbxObject> {
        self.root.get("objects").and_then(PbxValue::as_object)
    }

    fn objects_mut(&mut self) -> Result<&mut PbxObject> {
        let path = self.path.clone();
        self.root
            .get_mut("objects")
            .and_then(PbxValue::as_object_mut)
            .ok_or_else(|| ProjectError::grammar(path, "missing 'objects' dictionary"))
    }

    pub fn object(&self, id: &str) -> Option<&PbxObject> {
        self.objects()?.get(id)?.as_object()
    }

    fn object_mut(&mut self, id: &str) -> Result<&mut PbxObject> {
        self.objects_mut()?
            .get_mut(id)
            .and_then(PbxValue::as_object_mut)
            .ok_or_else(|| ProjectError::Configuration(format!("Object '{}' not found in project", id)))
    }

    /// 指定 isa 的全部对象
    pub fn objects_with_isa<'a>(
        &'a self,
        isa: &'a str,
    ) -> impl Iterator<Item = (String, &'a PbxObject)> + 'a {
        self.objects()
            .into_iter()
            .flat_map(PbxObject::entries)
            .filter_map(move |entry| {
                let object = entry.value.as_object()?;
                (object.get_str("isa")? == isa).then(|| (entry.key.value().into_owned(), object))
            })
    }

    // ========== target 与构建配置 ==========

    pub fn targets(&self) -> Vec<Target> {
        self.objects_with_isa("PBXNativeTarget")
            .map(|(id, object)| self.make_target(id, object))
            .collect()
    }

    pub fn target(&self, name: &str) -> Option<Target> {
        self.targets().into_iter().find(|t| t.name == name)
    }

    /// 唯一的 application 类型 target
    pub fn app_target(&self) -> Result<Target> {
        let mut apps: Vec<Target> = self
            .targets()
            .into_iter()
            .filter(|t| t.product_type.as_deref() == Some(APPLICATION_PRODUCT_TYPE))
            .collect();

        match apps.len() {
            1 => Ok(apps.remove(0)),
            0 => Err(ProjectError::Configuration(
                "No target supplied and unable to find the main app target".to_string(),
            )),
            n => Err(ProjectError::Configuration(format!(
                "No target supplied and {} application targets found ({})",
                n,
                apps.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// 按名称取得 target；未指定名称时取应用 target
    pub fn resolve_target(&self, name: Option<&str>) -> Result<Target> {
        match name {
            None => self.app_target(),
            Some(name) => self
                .target(name)
                .ok_or_else(|| ProjectError::Configuration(format!("Target '{}' not found in project", name))),
        }
    }

    fn make_target(&self, id: String, object: &PbxObject) -> Target {
        let build_configurations = object
            .get_str("buildConfigurationList")
            .and_then(|list| self.object(&list))
            .and_then(|list| list.get("buildConfigurations"))
            .and_then(PbxValue::as_array)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| {
                let config_id = item.value.as_str()?;
                let config = self.object(&config_id)?;
                Some(BuildConfiguration {
                    id: config_id.into_owned(),
                    name: config.get_str("name").unwrap_or_default().into_owned(),
                    build_settings: config
                        .get("buildSettings")
                        .and_then(PbxValue::as_object)
                        .cloned()
                        .unwrap_or_default(),
                })
            })
            .collect();

        Target {
            id,
            name: object.get_str("name").unwrap_or_default().into_owned(),
            product_name: object.get_str("productName").map(Cow::into_owned),
            product_type: object.get_str("productType").map(Cow::into_owned),
            build_configurations,
        }
    }

    pub fn build_configurations(&self, target: Option<&str>) -> Result<Vec<BuildConfiguration>> {
        Ok(self.resolve_target(target)?.build_configurations)
    }

    pub fn build_configuration_names(&self, target: Option<&str>) -> Result<Vec<String>> {
        Ok(self
            .build_configurations(target)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// 选出目标构建配置：指定 build 时只有一个，否则为该 target 的全部配置
    fn select_configurations(&self, target: Option<&str>, build: Option<&str>) -> Result<Vec<BuildConfiguration>> {
        let target = self.resolve_target(target)?;
        match build {
            None => Ok(target.build_configurations),
            Some(build) => target
                .build_configurations
                .into_iter()
                .find(|c| c.name == build)
                .map(|c| vec![c])
                .ok_or_else(|| {
                    ProjectError::Configuration(format!(
                        "Build configuration '{}' not found for target '{}'",
                        build, target.name
                    ))
                }),
        }
    }

    // ========== 构建设置 ==========

    /// 读取构建设置；未指定 build 时取第一个配置
    pub fn build_setting(&self, target: Option<&str>, build: Option<&str>, key: &str) -> Result<Option<PbxValue>> {
        Ok(self
            .select_configurations(target, build)?
            .first()
            .and_then(|c| c.build_settings.get(key).cloned()))
    }

    pub fn get_build_property(&self, target: Option<&str>, build: Option<&str>, key: &str) -> Result<Option<String>> {
        Ok(self
            .build_setting(target, build, key)?
            .and_then(|v| v.as_str().map(Cow::into_owned)))
    }

    /// 写入构建设置；未指定 build 时写入该 target 的全部配置
    ///
    /// 返回被修改的配置数
    pub fn update_build_property(
        &mut self,
        target: Option<&str>,
        build: Option<&str>,
        key: &str,
        value: PbxValue,
    ) -> Result<usize> {
        let configs = self.select_configurations(target, build)?;

        for config in &configs {
            let object = self.object_mut(&config.id)?;
            if object.get("buildSettings").and_then(PbxValue::as_object).is_none() {
                object.insert("buildSettings", PbxObject::new());
            }
            if let Some(settings) = object.get_mut("buildSettings").and_then(PbxValue::as_object_mut) {
                settings.insert(key, value.clone());
            }
        }

        self.modified = true;
        debug!(key, configurations = configs.len(), "updated build property");
        Ok(configs.len())
    }

    pub fn set_build_property(&mut self, target: Option<&str>, build: Option<&str>, key: &str, value: &str) -> Result<usize> {
        self.update_build_property(target, build, key, PbxValue::string(value))
    }

    pub fn bundle_id(&self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        self.get_build_property(target, build, "PRODUCT_BUNDLE_IDENTIFIER")
    }

    pub fn set_bundle_id(&mut self, target: Option<&str>, build: Option<&str>, bundle_id: &str) -> Result<()> {
        self.set_build_property(target, build, "PRODUCT_BUNDLE_IDENTIFIER", bundle_id)
            .map(|_| ())
    }

    /// target 的 productName
    pub fn product_name(&self, target: Option<&str>) -> Result<Option<String>> {
        Ok(self.resolve_target(target)?.product_name)
    }

    /// 设置 PRODUCT_NAME（全部构建配置）
    pub fn set_product_name(&mut self, target: Option<&str>, product_name: &str) -> Result<()> {
        self.set_build_property(target, None, "PRODUCT_NAME", product_name)
            .map(|_| ())
    }

    /// CURRENT_PROJECT_VERSION
    pub fn build_number(&self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        self.get_build_property(target, build, "CURRENT_PROJECT_VERSION")
    }

    pub fn set_build_number(&mut self, target: Option<&str>, build: Option<&str>, number: &str) -> Result<()> {
        self.set_build_property(target, build, "CURRENT_PROJECT_VERSION", number)
            .map(|_| ())
    }

    /// MARKETING_VERSION
    pub fn version(&self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        self.get_build_property(target, build, "MARKETING_VERSION")
    }

    pub fn set_version(&mut self, target: Option<&str>, build: Option<&str>, version: &str) -> Result<()> {
        self.set_build_property(target, build, "MARKETING_VERSION", version)
            .map(|_| ())
    }

    /// INFOPLIST_FILE（相对 iOS 工程根目录）
    pub fn info_plist(&self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        self.get_build_property(target, build, "INFOPLIST_FILE")
    }

    /// CODE_SIGN_ENTITLEMENTS
    pub fn entitlements_file(&self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        self.get_build_property(target, build, "CODE_SIGN_ENTITLEMENTS")
    }

    // ========== 标识符 ==========

    /// 生成不与现有对象冲突的 24 位大写十六进制标识符
    ///
    /// 同一 seed 在同一工程中总得到相同结果
    pub fn generate_id(&self, seed: &str) -> String {
        let mut attempt = 0u32;
        loop {
            let id = hash_id(seed, attempt);
            if !self.objects().is_some_and(|o| o.contains_key(&id)) {
                return id;
            }
            attempt += 1;
        }
    }

    fn add_object(&mut self, id: &str, comment: &str, object: PbxObject) -> Result<()> {
        self.objects_mut()?
            .push(PbxEntry::new(id, object).with_key_comment(comment));
        self.modified = true;
        Ok(())
    }

    // ========== framework ==========

    /// target 链接的 framework 名称（取构建文件注释的第一个词）
    pub fn frameworks(&self, target: Option<&str>) -> Result<Vec<String>> {
        let target = self.resolve_target(target)?;
        let Some(phase) = self
            .build_phase_id(&target.id, "PBXFrameworksBuildPhase")
            .and_then(|id| self.object(&id))
        else {
            return Ok(Vec::new());
        };

        Ok(phase
            .get("files")
            .and_then(PbxValue::as_array)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.comment.as_deref())
            .filter_map(|comment| comment.split(' ').next())
            .map(str::to_string)
            .collect())
    }

    /// 为 target 添加 framework；已存在时不做修改并返回 false
    pub fn add_framework(&mut self, target: Option<&str>, name: &str, options: FrameworkOptions) -> Result<bool> {
        let target = self.resolve_target(target)?;
        if self.frameworks(Some(&target.name))?.iter().any(|f| f == name) {
            debug!(framework = name, target = %target.name, "framework already linked");
            return Ok(false);
        }

        let file_ref_id = match self.find_file_reference(name) {
            Some(id) => id,
            None => {
                let id = self.generate_id(&format!("{} fileRef", name));
                self.add_object(&id, name, framework_file_reference(name, options))?;
                let group = match self.group_named("Frameworks") {
                    Some(group) => group,
                    None => self.main_group_id()?,
                };
                self.push_child(&group, "children", &id, name)?;
                id
            }
        };

        let comment = format!("{} in Frameworks", name);
        let build_file_id = self.generate_id(&format!("{} {} buildFile", target.id, name));
        let mut build_file = PbxObject::new();
        build_file.insert("isa", "PBXBuildFile");
        build_file.push(PbxEntry::new("fileRef", file_ref_id.as_str()).with_value_comment(name));
        if options.contains(FrameworkOptions::WEAK) {
            let mut settings = PbxObject::new();
            settings.insert("ATTRIBUTES", PbxValue::Array(vec![PbxItem::new("Weak", None)]));
            build_file.insert("settings", settings);
        }
        self.add_object(&build_file_id, &comment, build_file)?;

        let phase_id = match self.build_phase_id(&target.id, "PBXFrameworksBuildPhase") {
            Some(id) => id,
            None => self.add_frameworks_phase(&target.id)?,
        };
        self.push_child(&phase_id, "files", &build_file_id, &comment)?;

        debug!(framework = name, target = %target.name, ?options, "added framework");
        Ok(true)
    }

    fn build_phase_id(&self, target_id: &str, isa: &str) -> Option<String> {
        self.object(target_id)?
            .get("buildPhases")?
            .as_array()?
            .iter()
            .filter_map(|item| item.value.as_str())
            .find(|id| {
                self.object(id)
                    .and_then(|phase| phase.get_str("isa"))
                    .is_some_and(|phase_isa| phase_isa == isa)
            })
            .map(Cow::into_owned)
    }

    fn add_frameworks_phase(&mut self, target_id: &str) -> Result<String> {
        let id = self.generate_id(&format!("{} Frameworks", target_id));
        let mut phase = PbxObject::new();
        phase.insert("isa", "PBXFrameworksBuildPhase");
        phase.insert("buildActionMask", "2147483647");
        phase.insert("files", PbxValue::Array(Vec::new()));
        phase.insert("runOnlyForDeploymentPostprocessing", "0");
        self.add_object(&id, "Frameworks", phase)?;
        self.push_child(target_id, "buildPhases", &id, "Frameworks")?;
        Ok(id)
    }

    /// 向对象的数组属性追加带注释的标识符
    fn push_child(&mut self, object_id: &str, key: &str, child: &str, comment: &str) -> Result<()> {
        let object = self.object_mut(object_id)?;
        if object.get(key).and_then(PbxValue::as_array).is_none() {
            object.insert(key, PbxValue::Array(Vec::new()));
        }
        if let Some(items) = object.get_mut(key).and_then(PbxValue::as_array_mut) {
            items.push(PbxItem::new(child, Some(comment)));
        }
        self.modified = true;
        Ok(())
    }

    // ========== 文件与分组 ==========

    /// PBXProject 的 mainGroup
    pub fn main_group_id(&self) -> Result<String> {
        self.root
            .get_str("rootObject")
            .and_then(|root| self.object(&root))
            .and_then(|project| project.get_str("mainGroup"))
            .map(Cow::into_owned)
            .ok_or_else(|| ProjectError::Configuration("Unable to find the project's main group".to_string()))
    }

    fn group_named(&self, name: &str) -> Option<String> {
        self.objects_with_isa("PBXGroup")
            .find(|(_, group)| group.get_str("name").is_some_and(|n| n == name))
            .map(|(id, _)| id)
    }

    /// 文件名或路径末段等于 `name` 的文件引用
    fn find_file_reference(&self, name: &str) -> Option<String> {
        self.objects_with_isa("PBXFileReference")
            .find(|(_, file)| {
                file.get_str("name").is_some_and(|n| n == name)
                    || file
                        .get_str("path")
                        .is_some_and(|p| p.rsplit('/').next() == Some(name))
            })
            .map(|(id, _)| id)
    }

    /// 子分组中 `path` 或 `name` 等于 `component` 的分组
    fn child_group(&self, group_id: &str, component: &str) -> Option<String> {
        self.object(group_id)?
            .get("children")?
            .as_array()?
            .iter()
            .filter_map(|item| item.value.as_str())
            .find(|id| {
                self.object(id).is_some_and(|child| {
                    child.get_str("isa").is_some_and(|isa| isa == "PBXGroup")
                        && (child.get_str("path").is_some_and(|p| p == component)
                            || child.get_str("name").is_some_and(|n| n == component))
                })
            })
            .map(Cow::into_owned)
    }

    /// 把工程根目录下的文件登记到文件列表
    ///
    /// 沿路径逐级进入已存在的分组，余下的部分作为文件引用的 `path`。
    /// 文件已登记时返回 `Ok(None)`。
    pub fn add_file(&mut self, relative_path: &str) -> Result<Option<String>> {
        let mut group = self.main_group_id()?;
        let components: Vec<&str> = relative_path.split('/').filter(|c| !c.is_empty()).collect();
        let Some(file_name) = components.last().copied() else {
            return Err(ProjectError::Configuration("Cannot add an empty path to the project".to_string()));
        };

        let mut consumed = 0;
        for component in &components[..components.len() - 1] {
            match self.child_group(&group, component) {
                Some(child) => {
                    group = child;
                    consumed += 1;
                }
                None => break,
            }
        }
        let path = components[consumed..].join("/");

        let exists = self
            .object(&group)
            .and_then(|g| g.get("children"))
            .and_then(PbxValue::as_array)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.value.as_str())
            .any(|id| {
                self.object(&id)
                    .and_then(|f| f.get_str("path"))
                    .is_some_and(|p| p == path.as_str())
            });
        if exists {
            return Ok(None);
        }

        let id = self.generate_id(&format!("{} fileRef", relative_path));
        let mut file = PbxObject::new();
        file.insert("isa", "PBXFileReference");
        file.insert("lastKnownFileType", last_known_file_type(file_name));
        file.insert("path", path.as_str());
        file.insert("sourceTree", "<group>");
        self.add_object(&id, file_name, file)?;
        self.push_child(&group, "children", &id, file_name)?;

        debug!(file = relative_path, id = %id, "registered file reference");
        Ok(Some(id))
    }
}

impl StagedDocument for XcodeProject {
    fn kind(&self) -> &'static str {
        "pbxproj"
    }

    fn render(&self) -> Result<Vec<u8>> {
        match (&self.source, self.modified) {
            (Some(source), false) => Ok(source.as_bytes().to_vec()),
            _ => Ok(self.to_pbxproj().into_bytes()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn framework_file_reference(name: &str, options: FrameworkOptions) -> PbxObject {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    let (file_type, sdk_dir) = match extension {
        "tbd" => ("sourcecode.text-based-dylib-definition", "usr/lib"),
        "dylib" => ("compiled.mach-o.dylib", "usr/lib"),
        _ => ("wrapper.framework", "System/Library/Frameworks"),
    };

    let mut file = PbxObject::new();
    file.insert("isa", "PBXFileReference");
    file.insert("lastKnownFileType", file_type);
    if options.contains(FrameworkOptions::CUSTOM) {
        file.insert("path", name);
        file.insert("sourceTree", "<group>");
    } else {
        file.insert("name", name);
        file.insert("path", format!("{}/{}", sdk_dir, name));
        file.insert("sourceTree", "SDKROOT");
    }
    file
}

fn last_known_file_type(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("plist") => "text.plist.xml",
        Some("strings") => "text.plist.strings",
        Some("entitlements") => "text.plist.entitlements",
        Some("xcconfig") => "text.xcconfig",
        Some("json") => "text.json",
        Some("swift") => "sourcecode.swift",
        Some("m") => "sourcecode.c.objc",
        Some("h") => "sourcecode.c.h",
        Some("xml") => "text.xml",
        _ => "text",
    }
}

/// 两个不同起点的 FNV-1a 散列拼出 96 位标识符
fn hash_id(seed: &str, attempt: u32) -> String {
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = |offset: u64| {
        seed.bytes()
            .chain(attempt.to_le_bytes())
            .fold(offset, |h, b| (h ^ u64::from(b)).wrapping_mul(PRIME))
    };

    let high = hash(0xcbf2_9ce4_8422_2325);
    let low = hash(0x8422_2325_cbf2_9ce4);
    format!("{:016X}{:08X}", high, low >> 32)
}
