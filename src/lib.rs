pub mod utils;
pub mod io;
pub mod editor;
pub mod merge;
pub mod plist;
pub mod strings_file;
pub mod xcconfig;
pub mod json_file;
pub mod xml;
pub mod gradle;
pub mod xcode;
pub mod config;
pub mod project;
pub mod operation;

// 重新导出主要结构
pub use config::ProjectConfig;
pub use editor::{CommitReport, FileDiff, LoadOutcome, RawFile, RemovedFile, StagedDocument, StagingArea};
pub use gradle::{GradleEntry, GradleFile, GradleInsertType};
pub use json_file::JsonFile;
pub use operation::{ApplyReport, Operation, Platform};
pub use plist::{PlistFile, PlistValue};
pub use project::{AndroidProject, EditorKind, IosProject, MobileProject, ResourceDir};
pub use strings_file::StringsFile;
pub use utils::{ProjectError, Result};
pub use xcconfig::XCConfigFile;
pub use xcode::{FrameworkOptions, XcodeProject};
pub use xml::{AttrMode, XmlFile};

// 常量定义
pub const PBXPROJ_FILE_NAME: &str = "project.pbxproj";
