use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::staged_raw;
use crate::editor::{RawFile, RemovedFile, StagingArea};
use crate::gradle::{GradleFile, DEFAULT_CONFIG};
use crate::utils::{ProjectError, Result};
use crate::xml::XmlFile;

const APP_NAME_SELECTOR: &str = "resources/string[@name='app_name']";
const ACTIVITY_SELECTOR: &str = "manifest/application/activity";

fn package_statement() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(package\s+)[^;\s]+").expect("Invalid package regex"))
}

/// `AndroidManifest.xml` 的位置
pub(crate) fn manifest_path(android_root: &Path) -> PathBuf {
    android_root.join("app").join("src").join("main").join("AndroidManifest.xml")
}

/// Android 资源目录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceDir {
    Anim,
    Animator,
    Color,
    Drawable,
    DrawableLdpi,
    DrawableMdpi,
    DrawableHdpi,
    DrawableXhdpi,
    DrawableXxhdpi,
    DrawableXxxhdpi,
    Font,
    Layout,
    Menu,
    Mipmap,
    MipmapLdpi,
    MipmapMdpi,
    MipmapHdpi,
    MipmapXhdpi,
    MipmapXxhdpi,
    MipmapXxxhdpi,
    Raw,
    Values,
    Xml,
}

impl ResourceDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceDir::Anim => "anim",
            ResourceDir::Animator => "animator",
            ResourceDir::Color => "color",
            ResourceDir::Drawable => "drawable",
            ResourceDir::DrawableLdpi => "drawable-ldpi",
            ResourceDir::DrawableMdpi => "drawable-mdpi",
            ResourceDir::DrawableHdpi => "drawable-hdpi",
            ResourceDir::DrawableXhdpi => "drawable-xhdpi",
            ResourceDir::DrawableXxhdpi => "drawable-xxhdpi",
            ResourceDir::DrawableXxxhdpi => "drawable-xxxhdpi",
            ResourceDir::Font => "font",
            ResourceDir::Layout => "layout",
            ResourceDir::Menu => "menu",
            ResourceDir::Mipmap => "mipmap",
            ResourceDir::MipmapLdpi => "mipmap-ldpi",
            ResourceDir::MipmapMdpi => "mipmap-mdpi",
            ResourceDir::MipmapHdpi => "mipmap-hdpi",
            ResourceDir::MipmapXhdpi => "mipmap-xhdpi",
            ResourceDir::MipmapXxhdpi => "mipmap-xxhdpi",
            ResourceDir::MipmapXxxhdpi => "mipmap-xxxhdpi",
            ResourceDir::Raw => "raw",
            ResourceDir::Values => "values",
            ResourceDir::Xml => "xml",
        }
    }
}

impl fmt::Display for ResourceDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Android 平台视图
///
/// 目录布局固定为单模块 `app/`：清单位于 `app/src/main`，
/// 构建脚本为 `build.gradle` 与 `app/build.gradle`（存在 `.kts` 时使用 Kotlin 版本）。
#[derive(Debug)]
pub struct AndroidProject<'a> {
    staging: &'a mut StagingArea,
    root: &'a Path,
}

impl<'a> AndroidProject<'a> {
    pub(crate) fn new(staging: &'a mut StagingArea, root: &'a Path) -> Self {
        Self { staging, root }
    }

    pub fn root(&self) -> &Path {
        self.root
    }

    pub fn app_root(&self) -> PathBuf {
        self.root.join("app")
    }

    pub fn manifest_path(&self) -> PathBuf {
        manifest_path(self.root)
    }

    /// `app/src/main/java`
    pub fn java_root(&self) -> PathBuf {
        self.app_root().join("src").join("main").join("java")
    }

    /// `app/src/main/res`
    pub fn resources_root(&self) -> PathBuf {
        self.app_root().join("src").join("main").join("res")
    }

    pub fn manifest(&mut self) -> Result<&mut XmlFile> {
        let path = self.manifest_path();
        XmlFile::open(self.staging, &path)
    }

    /// 顶层 `build.gradle`
    pub fn build_gradle(&mut self) -> Result<&mut GradleFile> {
        let path = self.gradle_path(self.root);
        GradleFile::open(self.staging, &path)
    }

    /// `app/build.gradle`
    pub fn app_build_gradle(&mut self) -> Result<&mut GradleFile> {
        let path = self.gradle_path(&self.app_root());
        GradleFile::open(self.staging, &path)
    }

    /// Android 根目录下的任意 Gradle 文件
    pub fn gradle_file(&mut self, relative: &Path) -> Result<&mut GradleFile> {
        GradleFile::open(self.staging, &self.root.join(relative))
    }

    pub fn xml_file(&mut self, relative: &Path) -> Result<&mut XmlFile> {
        XmlFile::open(self.staging, &self.root.join(relative))
    }

    /// 资源目录下的 XML（如 `values/strings.xml`）
    pub fn resource_xml_file(&mut self, relative: &Path) -> Result<&mut XmlFile> {
        let path = self.resources_root().join(relative);
        XmlFile::open(self.staging, &path)
    }

    fn gradle_path(&self, dir: &Path) -> PathBuf {
        let groovy = dir.join("build.gradle");
        let kotlin = dir.join("build.gradle.kts");
        if !self.staging.exists_on_disk(&groovy) && self.staging.exists_on_disk(&kotlin) {
            kotlin
        } else {
            groovy
        }
    }

    // ========== 包名 ==========

    /// 清单 `<manifest package>`
    pub fn package_name(&mut self) -> Result<Option<String>> {
        self.manifest()?.root_attribute("package")
    }

    /// 重命名应用包
    ///
    /// 修改清单的 package 与主 Activity 类名、`applicationId`，并把旧包目录下的文件
    /// 移到新包目录（改写 `.java` / `.kt` 的 package 语句）。文件移动同样暂存到提交时进行，
    /// 提交时旧目录中变空的祖先目录会被删除。
    ///
    /// 所有目标（清单 activity、`android.defaultConfig`、旧包目录）先行解析，
    /// 任一缺失都返回错误且不做任何修改。新旧包名相同时返回 `Ok(false)`。
    pub fn set_package_name(&mut self, package_name: &str) -> Result<bool> {
        let old_package = self.package_name()?.ok_or_else(|| {
            ProjectError::Precondition("<manifest> has no package attribute".to_string())
        })?;
        if old_package == package_name {
            debug!(package = %package_name, "package name unchanged");
            return Ok(false);
        }

        if self.manifest()?.count(ACTIVITY_SELECTOR)? == 0 {
            return Err(ProjectError::Precondition(
                "<manifest> has no <activity> under <application> to rename".to_string(),
            ));
        }

        let gradle_path = self.gradle_path(&self.app_root());
        let has_gradle = self.staging.is_open(&gradle_path) || self.staging.exists_on_disk(&gradle_path);
        if has_gradle {
            self.app_build_gradle()?.statements(DEFAULT_CONFIG)?;
        }

        let java_root = self.java_root();
        let old_dir = package_dir(&java_root, &old_package);
        let moved = self.read_package_files(&old_dir)?.ok_or_else(|| {
            ProjectError::Precondition(format!(
                "Current Java package name and directory structure do not match the <manifest> package attribute ({} does not exist). Ensure these match before modifying the project package name",
                old_dir.display()
            ))
        })?;

        let new_dir = package_dir(&java_root, package_name);
        let mut staged = Vec::with_capacity(moved.len());
        for (old_path, bytes) in &moved {
            let Some(name) = old_path.file_name() else {
                continue;
            };
            let new_path = new_dir.join(name);
            // 目标路径已按其它类型打开时在修改前失败
            self.staging.document::<RawFile>(&new_path)?;
            let bytes = if is_source_file(old_path) {
                rewrite_package(bytes, package_name)
            } else {
                bytes.clone()
            };
            staged.push((new_path, bytes));
        }

        let manifest = self.manifest()?;
        manifest.set_root_attribute("package", package_name)?;
        manifest.set_attribute(ACTIVITY_SELECTOR, "android:name", &format!("{}.MainActivity", package_name))?;

        if has_gradle {
            self.app_build_gradle()?.set_application_id(package_name)?;
        } else {
            warn!(path = %gradle_path.display(), "app build.gradle not found, applicationId not updated");
        }

        for (new_path, bytes) in staged {
            staged_raw(self.staging, &new_path)?.set_bytes(bytes);
        }
        for (old_path, _) in &moved {
            self.stage_removal(old_path, &java_root)?;
        }

        info!(from = %old_package, to = %package_name, files = moved.len(), "renamed android package");
        Ok(true)
    }

    /// 旧包目录下的直接文件（按名称排序）及其内容；目录不存在时为 None
    fn read_package_files(&self, dir: &Path) -> Result<Option<Vec<(PathBuf, Vec<u8>)>>> {
        let Some(paths) = self.staging.list_source_dir(dir)? else {
            return Ok(None);
        };

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = match self.staging.get(&path) {
                Some(entry) => entry.document().render()?,
                None => self.staging.read_source(&path)?.unwrap_or_default(),
            };
            files.push((path, bytes));
        }
        Ok(Some(files))
    }

    fn stage_removal(&mut self, path: &Path, java_root: &Path) -> Result<()> {
        let removed = RemovedFile::pruning_until(java_root);
        if !self.staging.open(path, Box::new(removed.clone())) {
            self.staging.set(path, Box::new(removed))?;
        }
        Ok(())
    }

    // ========== 版本 ==========

    pub fn version_code(&mut self) -> Result<Option<u64>> {
        self.app_build_gradle()?.version_code()
    }

    pub fn set_version_code(&mut self, version_code: u64) -> Result<()> {
        self.app_build_gradle()?.set_version_code(version_code)
    }

    pub fn increment_version_code(&mut self) -> Result<u64> {
        self.app_build_gradle()?.increment_version_code()
    }

    pub fn version_name(&mut self) -> Result<Option<String>> {
        self.app_build_gradle()?.version_name()
    }

    pub fn set_version_name(&mut self, version_name: &str) -> Result<()> {
        self.app_build_gradle()?.set_version_name(version_name)
    }

    pub fn application_id(&mut self) -> Result<Option<String>> {
        self.app_build_gradle()?.application_id()
    }

    pub fn set_application_id(&mut self, application_id: &str) -> Result<()> {
        self.app_build_gradle()?.set_application_id(application_id)
    }

    // ========== 资源 ==========

    /// `values/strings.xml` 中的 `app_name`
    pub fn app_name(&mut self) -> Result<Option<String>> {
        self.resource_xml_file(Path::new("values/strings.xml"))?
            .text_content(APP_NAME_SELECTOR)
    }

    /// 设置 `values/strings.xml` 中的 `app_name`；条目不存在时返回配置错误
    pub fn set_app_name(&mut self, app_name: &str) -> Result<()> {
        let strings = self.resource_xml_file(Path::new("values/strings.xml"))?;
        if strings.count(APP_NAME_SELECTOR)? == 0 {
            return Err(ProjectError::Configuration(
                "values/strings.xml has no <string name=\"app_name\">".to_string(),
            ));
        }
        strings.set_text(APP_NAME_SELECTOR, app_name)?;
        Ok(())
    }

    pub fn resource_path(&self, dir: ResourceDir, file: &str) -> PathBuf {
        self.resources_root().join(dir.as_str()).join(file)
    }

    /// 资源文件内容（已暂存的内容优先）；不存在时为 None
    pub fn get_resource(&self, dir: ResourceDir, file: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resource_path(dir, file);
        match self.staging.get(&path) {
            Some(entry) => Ok(Some(entry.document().render()?)),
            None => self.staging.read_source(&path),
        }
    }

    /// 写入资源文件（提交时创建目录）
    pub fn add_resource(&mut self, dir: ResourceDir, file: &str, contents: &str) -> Result<()> {
        let path = self.resource_path(dir, file);
        staged_raw(self.staging, &path)?.set_bytes(contents.as_bytes().to_vec());
        debug!(path = %path.display(), "staged resource");
        Ok(())
    }

    /// 把 `source` 复制为资源文件
    pub fn copy_to_resources(&mut self, dir: ResourceDir, file: &str, source: &Path) -> Result<()> {
        let bytes = self.staging.read_source(source)?.ok_or_else(|| {
            ProjectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", source.display()),
            ))
        })?;
        let path = self.resource_path(dir, file);
        staged_raw(self.staging, &path)?.set_bytes(bytes);
        debug!(src = %source.display(), dest = %path.display(), "staged resource copy");
        Ok(())
    }
}

fn package_dir(java_root: &Path, package: &str) -> PathBuf {
    package
        .split('.')
        .fold(java_root.to_path_buf(), |dir, part| dir.join(part))
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "java" || ext == "kt")
}

/// 改写第一条 package 语句；非 UTF-8 内容原样返回
fn rewrite_package(bytes: &[u8], package_name: &str) -> Vec<u8> {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return bytes.to_vec();
    };
    package_statement()
        .replace(text, |caps: &regex::Captures| format!("{}{}", &caps[1], package_name))
        .into_owned()
        .into_bytes()
}
