/// 移动工程门面
///
/// 把 iOS / Android 两个平台的文件编辑器组织在同一个暂存区之上。
///
/// # 架构设计
///
/// - **ios**: Xcode 工程、Info.plist、entitlements 等 iOS 侧操作
/// - **android**: 清单、Gradle、资源目录与包名重命名
///
/// 平台视图（[`IosProject`] / [`AndroidProject`]）只借用暂存区，
/// 所有文档模型始终由暂存区持有。
///
/// # 使用示例
///
/// ```rust,ignore
/// let config = ProjectConfig::for_root(Path::new("my-app"));
/// let mut project = MobileProject::new(config);
/// project.load()?;
///
/// if let Some(mut ios) = project.ios() {
///     ios.set_bundle_id(None, None, "com.example.app")?;
/// }
/// project.commit();
/// ```
pub mod android;
pub mod ios;

pub use android::{AndroidProject, ResourceDir};
pub use ios::IosProject;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ProjectConfig;
use crate::editor::{CommitReport, FileDiff, LoadOutcome, RawFile, StagedDocument, StagingArea};
use crate::gradle::GradleFile;
use crate::json_file::JsonFile;
use crate::plist::PlistFile;
use crate::strings_file::StringsFile;
use crate::utils::{ProjectError, Result};
use crate::xcconfig::XCConfigFile;
use crate::xcode::XcodeProject;
use crate::xml::XmlFile;

/// 编辑器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    Plist,
    Strings,
    Xcconfig,
    Xml,
    Json,
    Gradle,
    Pbxproj,
    Raw,
}

/// 移动工程
#[derive(Debug)]
pub struct MobileProject {
    config: ProjectConfig,
    staging: StagingArea,
    /// 加载后定位到的 project.pbxproj
    pbxproj: Option<PathBuf>,
}

impl MobileProject {
    pub fn new(config: ProjectConfig) -> Self {
        Self::with_staging(config, StagingArea::new())
    }

    /// 使用自定义暂存区（例如替换了读写器）
    pub fn with_staging(config: ProjectConfig, staging: StagingArea) -> Self {
        Self {
            config,
            staging,
            pbxproj: None,
        }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut StagingArea {
        &mut self.staging
    }

    /// 加载平台的主文件
    ///
    /// Xcode 工程无法解析时返回语法错误（后续操作都依赖它）；
    /// 缺失的工程文件或清单只记录警告。
    pub fn load(&mut self) -> Result<()> {
        if let Some(ios_root) = self.config.ios_path.clone() {
            match find_pbxproj(&ios_root)? {
                Some(path) => {
                    XcodeProject::open(&mut self.staging, &path)?;
                    info!(path = %path.display(), "loaded xcode project");
                    self.pbxproj = Some(path);
                }
                None => warn!(root = %ios_root.display(), "no .xcodeproj found, iOS operations disabled"),
            }
        }

        if let Some(android_root) = self.config.android_path.clone() {
            let manifest = android::manifest_path(&android_root);
            match XmlFile::open(&mut self.staging, &manifest) {
                Ok(_) => info!(path = %manifest.display(), "loaded android manifest"),
                Err(e) if e.is_not_found() => {
                    warn!(path = %manifest.display(), "AndroidManifest.xml not found")
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// iOS 平台视图；没有 iOS 平台或尚未加载 Xcode 工程时为 None
    pub fn ios(&mut self) -> Option<IosProject<'_>> {
        let root = self.config.ios_path.as_deref()?;
        let pbxproj = self.pbxproj.as_deref()?;
        Some(IosProject::new(&mut self.staging, root, pbxproj))
    }

    /// Android 平台视图
    pub fn android(&mut self) -> Option<AndroidProject<'_>> {
        let root = self.config.android_path.as_deref()?;
        Some(AndroidProject::new(&mut self.staging, root))
    }

    /// 相对路径按工程根目录解析
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root.join(path)
        }
    }

    // ========== 编辑器访问 ==========

    /// 取得（或创建）路径上的 plist；新建于 iOS 目录下的文件会登记到 Xcode 工程
    pub fn plist_file(&mut self, path: &Path) -> Result<&mut PlistFile> {
        let path = self.resolve(path);
        let (_, outcome) = PlistFile::open_with_outcome(&mut self.staging, &path)?;
        self.register_created(&path, outcome)?;
        self.staging
            .document_mut::<PlistFile>(&path)?
            .ok_or(ProjectError::NotOpen(path))
    }

    pub fn strings_file(&mut self, path: &Path) -> Result<&mut StringsFile> {
        let path = self.resolve(path);
        let (_, outcome) = StringsFile::open_with_outcome(&mut self.staging, &path)?;
        self.register_created(&path, outcome)?;
        self.staging
            .document_mut::<StringsFile>(&path)?
            .ok_or(ProjectError::NotOpen(path))
    }

    pub fn xcconfig_file(&mut self, path: &Path) -> Result<&mut XCConfigFile> {
        let path = self.resolve(path);
        XCConfigFile::open(&mut self.staging, &path)
    }

    pub fn xml_file(&mut self, path: &Path) -> Result<&mut XmlFile> {
        let path = self.resolve(path);
        XmlFile::open(&mut self.staging, &path)
    }

    pub fn json_file(&mut self, path: &Path) -> Result<&mut JsonFile> {
        let path = self.resolve(path);
        JsonFile::open(&mut self.staging, &path)
    }

    pub fn gradle_file(&mut self, path: &Path) -> Result<&mut GradleFile> {
        let path = self.resolve(path);
        GradleFile::open(&mut self.staging, &path)
    }

    /// 原样文件；不存在时为空
    pub fn raw_file(&mut self, path: &Path) -> Result<&mut RawFile> {
        let path = self.resolve(path);
        staged_raw(&mut self.staging, &path)
    }

    /// 按种类取得编辑器
    pub fn editor(&mut self, kind: EditorKind, path: &Path) -> Result<&mut dyn StagedDocument> {
        let document: &mut dyn StagedDocument = match kind {
            EditorKind::Plist => self.plist_file(path)?,
            EditorKind::Strings => self.strings_file(path)?,
            EditorKind::Xcconfig => self.xcconfig_file(path)?,
            EditorKind::Xml => self.xml_file(path)?,
            EditorKind::Json => self.json_file(path)?,
            EditorKind::Gradle => self.gradle_file(path)?,
            EditorKind::Raw => self.raw_file(path)?,
            EditorKind::Pbxproj => {
                let path = self.resolve(path);
                XcodeProject::open(&mut self.staging, &path)?
            }
        };
        Ok(document)
    }

    /// 复制文件（提交时写入）
    pub fn copy_file(&mut self, src: &Path, dest: &Path) -> Result<()> {
        let src = self.resolve(src);
        let dest = self.resolve(dest);
        let bytes = self.staging.read_source(&src)?.ok_or_else(|| {
            ProjectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", src.display()),
            ))
        })?;

        staged_raw(&mut self.staging, &dest)?.set_bytes(bytes);
        debug!(src = %src.display(), dest = %dest.display(), "staged copy");
        Ok(())
    }

    /// 新建于 iOS 目录下的文件登记为 Xcode 文件引用
    fn register_created(&mut self, path: &Path, outcome: LoadOutcome) -> Result<()> {
        if outcome != LoadOutcome::Created {
            return Ok(());
        }
        if let Some(mut ios) = self.ios() {
            ios.register_file(path)?;
        }
        Ok(())
    }

    // ========== 提交 ==========

    pub fn commit(&self) -> CommitReport {
        let report = self.staging.commit_all();
        info!(summary = %report.summary(), "committed project");
        report
    }

    pub fn diff(&self) -> Result<Vec<FileDiff>> {
        self.staging.diff_all()
    }
}

/// 暂存的原样文件；未打开时以磁盘内容（或空）登记
pub(crate) fn staged_raw<'a>(staging: &'a mut StagingArea, path: &Path) -> Result<&'a mut RawFile> {
    staging
        .open_with(path, |bytes| Ok(RawFile::new(bytes.unwrap_or_default())))
        .map(|(file, _)| file)
}

/// 在 iOS 根目录下查找 `*.xcodeproj/project.pbxproj`
fn find_pbxproj(ios_root: &Path) -> Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(ios_root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "xcodeproj"))
        .map(|dir| dir.join(crate::PBXPROJ_FILE_NAME))
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();

    if candidates.len() > 1 {
        warn!(count = candidates.len(), "multiple .xcodeproj directories found, using the first");
    }
    Ok(candidates.into_iter().next())
}
