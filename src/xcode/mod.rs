/// Xcode 工程模型
///
/// - **pbx**: OpenStep plist 值模型（保留注释与引号写法）
/// - **parse**: project.pbxproj 解析
/// - **write**: 按 Xcode 布局序列化
/// - **project**: target、构建配置、framework 与文件引用
mod parse;
mod pbx;
mod project;
mod write;


pub use parse::{parse_pbxproj, ParsedPbx};
pub use pbx::{PbxEntry, PbxItem, PbxObject, PbxString, PbxValue};
pub use project::{BuildConfiguration, FrameworkOptions, Target, XcodeProject, APPLICATION_PRODUCT_TYPE};
pub use write::write_pbxproj;
