use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::editor::{LoadOutcome, StagingArea};
use crate::plist::{PlistFile, PlistValue};
use crate::strings_file::StringsFile;
use crate::utils::{to_posix, ProjectError, Result};
use crate::xcconfig::XCConfigFile;
use crate::xcode::{BuildConfiguration, FrameworkOptions, Target, XcodeProject};

/// iOS 平台视图
///
/// `target` 为 None 时使用应用 target；`build` 为 None 时读取第一个构建配置、
/// 写入全部构建配置。
#[derive(Debug)]
pub struct IosProject<'a> {
    staging: &'a mut StagingArea,
    root: &'a Path,
    pbxproj: &'a Path,
}

impl<'a> IosProject<'a> {
    pub(crate) fn new(staging: &'a mut StagingArea, root: &'a Path, pbxproj: &'a Path) -> Self {
        Self {
            staging,
            root,
            pbxproj,
        }
    }

    /// iOS 工程根目录（如 `ios/App`）
    pub fn root(&self) -> &Path {
        self.root
    }

    /// 暂存区中的 Xcode 工程
    pub fn pbx(&mut self) -> Result<&mut XcodeProject> {
        XcodeProject::open(self.staging, self.pbxproj)
    }

    fn pbx_ref(&mut self) -> Result<&XcodeProject> {
        self.pbx().map(|p| &*p)
    }

    // ========== target ==========

    pub fn targets(&mut self) -> Result<Vec<Target>> {
        Ok(self.pbx_ref()?.targets())
    }

    pub fn target(&mut self, name: &str) -> Result<Option<Target>> {
        Ok(self.pbx_ref()?.target(name))
    }

    pub fn app_target(&mut self) -> Result<Target> {
        self.pbx_ref()?.app_target()
    }

    pub fn build_configurations(&mut self, target: Option<&str>) -> Result<Vec<BuildConfiguration>> {
        self.pbx_ref()?.build_configurations(target)
    }

    pub fn build_configuration_names(&mut self, target: Option<&str>) -> Result<Vec<String>> {
        self.pbx_ref()?.build_configuration_names(target)
    }

    // ========== 构建设置 ==========

    pub fn build_property(&mut self, target: Option<&str>, build: Option<&str>, key: &str) -> Result<Option<String>> {
        self.pbx_ref()?.get_build_property(target, build, key)
    }

    pub fn set_build_property(&mut self, target: Option<&str>, build: Option<&str>, key: &str, value: &str) -> Result<()> {
        self.pbx()?.set_build_property(target, build, key, value).map(|_| ())
    }

    pub fn bundle_id(&mut self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        self.pbx_ref()?.bundle_id(target, build)
    }

    pub fn set_bundle_id(&mut self, target: Option<&str>, build: Option<&str>, bundle_id: &str) -> Result<()> {
        self.pbx()?.set_bundle_id(target, build, bundle_id)
    }

    pub fn product_name(&mut self, target: Option<&str>) -> Result<Option<String>> {
        self.pbx_ref()?.product_name(target)
    }

    pub fn set_product_name(&mut self, target: Option<&str>, product_name: &str) -> Result<()> {
        self.pbx()?.set_product_name(target, product_name)
    }

    pub fn version(&mut self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        self.pbx_ref()?.version(target, build)
    }

    /// 设置 MARKETING_VERSION，并让 Info.plist 引用它
    pub fn set_version(&mut self, target: Option<&str>, build: Option<&str>, version: &str) -> Result<()> {
        self.pbx()?.set_version(target, build, version)?;
        self.reference_setting(target, build, "CFBundleShortVersionString", "$(MARKETING_VERSION)")
    }

    /// 构建号：CURRENT_PROJECT_VERSION，缺失时读取 Info.plist 的 CFBundleVersion
    pub fn build(&mut self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        if let Some(number) = self.pbx_ref()?.build_number(target, build)? {
            return Ok(Some(number));
        }

        let plist = self.info_plist(target, build)?;
        Ok(plist.get("CFBundleVersion").and_then(|v| match v {
            PlistValue::String(s) => Some(s.clone()),
            PlistValue::Integer(n) => Some(n.to_string()),
            _ => None,
        }))
    }

    /// 设置 CURRENT_PROJECT_VERSION，并让 Info.plist 引用它
    pub fn set_build(&mut self, target: Option<&str>, build: Option<&str>, number: &str) -> Result<()> {
        self.pbx()?.set_build_number(target, build, number)?;
        self.reference_setting(target, build, "CFBundleVersion", "$(CURRENT_PROJECT_VERSION)")
    }

    /// Info.plist 键改为引用构建设置；没有 Info.plist 时只记录警告
    fn reference_setting(&mut self, target: Option<&str>, build: Option<&str>, key: &str, reference: &str) -> Result<()> {
        match self.info_plist(target, build) {
            Ok(plist) => {
                if plist.get(key).and_then(PlistValue::as_str) != Some(reference) {
                    plist.insert(key, reference);
                }
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(key, error = %e, "Info.plist not found, key not updated");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// 构建号加一（没有构建号时设为 1），返回新值
    pub fn increment_build(&mut self, target: Option<&str>, build: Option<&str>) -> Result<u64> {
        let next = match self.build(target, build)? {
            None => 1,
            Some(current) => current.trim().parse::<u64>().map(|n| n + 1).map_err(|_| {
                ProjectError::Configuration(format!("Build number '{}' is not an integer", current))
            })?,
        };
        self.set_build(target, build, &next.to_string())?;
        Ok(next)
    }

    // ========== Info.plist ==========

    /// INFOPLIST_FILE 解析后的绝对路径
    pub fn info_plist_path(&mut self, target: Option<&str>, build: Option<&str>) -> Result<PathBuf> {
        let file = self
            .pbx_ref()?
            .info_plist(target, build)?
            .ok_or_else(|| ProjectError::Configuration("Unable to load plist file: INFOPLIST_FILE is not set".to_string()))?;
        let relative = file
            .strip_prefix("$(SRCROOT)/")
            .or_else(|| file.strip_prefix("${SRCROOT}/"))
            .unwrap_or(&file);
        Ok(self.root.join(relative))
    }

    /// target 的 Info.plist；磁盘上不存在时返回 NotFound IO 错误
    fn info_plist(&mut self, target: Option<&str>, build: Option<&str>) -> Result<&mut PlistFile> {
        let path = self.info_plist_path(target, build)?;
        if !self.staging.is_open(&path) && !self.staging.exists_on_disk(&path) {
            return Err(ProjectError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Unable to load plist file {}", path.display()),
            )));
        }
        PlistFile::open(self.staging, &path)
    }

    pub fn display_name(&mut self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        Ok(self
            .info_plist(target, build)?
            .get("CFBundleDisplayName")
            .and_then(PlistValue::as_str)
            .map(str::to_string))
    }

    pub fn set_display_name(&mut self, target: Option<&str>, build: Option<&str>, display_name: &str) -> Result<()> {
        self.info_plist(target, build)?
            .insert("CFBundleDisplayName", display_name);
        Ok(())
    }

    /// 以 `update` 算法合并进 Info.plist
    pub fn update_info_plist(&mut self, target: Option<&str>, build: Option<&str>, entries: PlistValue, replace: bool) -> Result<()> {
        self.info_plist(target, build)?.update(entries, replace);
        Ok(())
    }

    // ========== framework ==========

    pub fn frameworks(&mut self, target: Option<&str>) -> Result<Vec<String>> {
        self.pbx_ref()?.frameworks(target)
    }

    pub fn add_framework(&mut self, target: Option<&str>, name: &str, options: FrameworkOptions) -> Result<bool> {
        self.pbx()?.add_framework(target, name, options)
    }

    // ========== entitlements ==========

    pub fn entitlements_file(&mut self, target: Option<&str>, build: Option<&str>) -> Result<Option<String>> {
        self.pbx_ref()?.entitlements_file(target, build)
    }

    /// 当前 entitlements；target 没有 entitlements 文件（或文件不存在）时为 None
    pub fn entitlements(&mut self, target: Option<&str>, build: Option<&str>) -> Result<Option<PlistValue>> {
        let Some(file) = self.entitlements_file(target, build)? else {
            return Ok(None);
        };
        let path = self.root.join(file);
        if !self.staging.is_open(&path) && !self.staging.exists_on_disk(&path) {
            return Ok(None);
        }
        Ok(Some(PlistFile::open(self.staging, &path)?.document().clone()))
    }

    /// 合并 entitlements（`update` 算法，不替换）
    pub fn add_entitlements(&mut self, target: Option<&str>, build: Option<&str>, entries: PlistValue) -> Result<()> {
        self.entitlements_plist(target, build)?.update(entries, false);
        Ok(())
    }

    /// 写入 entitlements，已有数组和字典整体替换
    pub fn set_entitlements(&mut self, target: Option<&str>, build: Option<&str>, entries: PlistValue) -> Result<()> {
        self.entitlements_plist(target, build)?.update(entries, true);
        Ok(())
    }

    /// target 的 entitlements 文件；没有时创建 `<Target>/<Target>.entitlements`
    /// 并写入 CODE_SIGN_ENTITLEMENTS
    fn entitlements_plist(&mut self, target: Option<&str>, build: Option<&str>) -> Result<&mut PlistFile> {
        let relative = match self.entitlements_file(target, build)? {
            Some(file) => file,
            None => {
                let target_name = self.pbx_ref()?.resolve_target(target)?.name;
                let file_name = format!(
                    "{}.entitlements",
                    target_name.split_whitespace().collect::<Vec<_>>().join("_")
                );
                let relative = format!("{}/{}", target_name, file_name);
                self.set_build_property(target, build, "CODE_SIGN_ENTITLEMENTS", &relative)?;
                debug!(file = %relative, "created entitlements file");
                relative
            }
        };

        self.plist_file(Path::new(&relative))
    }

    // ========== 文件 ==========

    /// iOS 根目录下的 plist；新建时登记到 Xcode 工程
    pub fn plist_file(&mut self, relative: &Path) -> Result<&mut PlistFile> {
        let path = self.root.join(relative);
        let (_, outcome) = PlistFile::open_with_outcome(self.staging, &path)?;
        if outcome == LoadOutcome::Created {
            self.register_file(&path)?;
        }
        PlistFile::open(self.staging, &path)
    }

    /// iOS 根目录下的 .strings；新建时登记到 Xcode 工程
    pub fn strings_file(&mut self, relative: &Path) -> Result<&mut StringsFile> {
        let path = self.root.join(relative);
        let (_, outcome) = StringsFile::open_with_outcome(self.staging, &path)?;
        if outcome == LoadOutcome::Created {
            self.register_file(&path)?;
        }
        StringsFile::open(self.staging, &path)
    }

    pub fn xcconfig_file(&mut self, relative: &Path) -> Result<&mut XCConfigFile> {
        XCConfigFile::open(self.staging, &self.root.join(relative))
    }

    /// 把 iOS 根目录下的文件登记为 Xcode 文件引用；根目录外的路径忽略
    pub fn register_file(&mut self, path: &Path) -> Result<Option<String>> {
        let Ok(relative) = path.strip_prefix(self.root) else {
            return Ok(None);
        };
        let relative = to_posix(relative);
        let added = self.pbx()?.add_file(&relative)?;
        match &added {
            Some(id) => debug!(file = %relative, id = %id, "registered new file in xcode project"),
            None => warn!(file = %relative, "file already referenced by xcode project"),
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const APP_PBXPROJ: &str = include_str!("../../tests/fixtures/App.pbxproj");

    fn fixture(info_plist: Option<&str>) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("App.xcodeproj")).unwrap();
        std::fs::create_dir_all(root.join("App")).unwrap();
        std::fs::write(root.join("App.xcodeproj/project.pbxproj"), APP_PBXPROJ).unwrap();
        if let Some(text) = info_plist {
            std::fs::write(root.join("App/Info.plist"), text).unwrap();
        }
        temp_dir
    }

    const INFO_PLIST: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist version=\"1.0\">\n<dict>\n\t<key>CFBundleVersion</key>\n\t<string>$(CURRENT_PROJECT_VERSION)</string>\n</dict>\n</plist>\n";

    #[test]
    fn test_info_plist_path_strips_srcroot() {
        let temp_dir = fixture(Some(INFO_PLIST));
        let root = temp_dir.path();
        let pbxproj = root.join("App.xcodeproj/project.pbxproj");
        let mut staging = StagingArea::new();
        let mut ios = IosProject::new(&mut staging, root, &pbxproj);

        ios.set_build_property(None, None, "INFOPLIST_FILE", "$(SRCROOT)/App/Info.plist")
            .unwrap();
        assert_eq!(ios.info_plist_path(None, None).unwrap(), root.join("App/Info.plist"));
    }

    #[test]
    fn test_existing_reference_is_not_a_modification() {
        let temp_dir = fixture(Some(INFO_PLIST));
        let root = temp_dir.path();
        let pbxproj = root.join("App.xcodeproj/project.pbxproj");
        let mut staging = StagingArea::new();

        IosProject::new(&mut staging, root, &pbxproj)
            .set_build(None, None, "7")
            .unwrap();

        let plist = staging
            .document::<PlistFile>(&root.join("App/Info.plist"))
            .unwrap()
            .unwrap();
        assert!(!plist.is_modified());
    }

    #[test]
    fn test_missing_info_plist() {
        let temp_dir = fixture(None);
        let root = temp_dir.path();
        let pbxproj = root.join("App.xcodeproj/project.pbxproj");
        let mut staging = StagingArea::new();
        let mut ios = IosProject::new(&mut staging, root, &pbxproj);

        assert!(ios.display_name(None, None).unwrap_err().is_not_found());
        // 构建号仍写入工程，Info.plist 不会被创建
        ios.set_build(None, None, "5").unwrap();
        assert_eq!(ios.build(None, Some("Release")).unwrap().as_deref(), Some("5"));
        assert!(!staging.is_open(&root.join("App/Info.plist")));
    }

    #[test]
    fn test_increment_build_rejects_non_numeric() {
        let temp_dir = fixture(Some(INFO_PLIST));
        let root = temp_dir.path();
        let pbxproj = root.join("App.xcodeproj/project.pbxproj");
        let mut staging = StagingArea::new();
        let mut ios = IosProject::new(&mut staging, root, &pbxproj);

        ios.set_build(None, None, "1.2.3").unwrap();
        assert!(matches!(
            ios.increment_build(None, None),
            Err(ProjectError::Configuration(_))
        ));
    }

    #[test]
    fn test_register_file_outside_root_is_ignored() {
        let temp_dir = fixture(Some(INFO_PLIST));
        let root = temp_dir.path();
        let pbxproj = root.join("App.xcodeproj/project.pbxproj");
        let mut staging = StagingArea::new();
        let mut ios = IosProject::new(&mut staging, root, &pbxproj);

        assert_eq!(ios.register_file(Path::new("/elsewhere/file.txt")).unwrap(), None);
        assert!(!ios.pbx().unwrap().is_modified());
    }
}
