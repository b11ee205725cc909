//! 扩展插件接口
//!
//! 引擎按 启动 / 每帧更新 / 关闭 三个阶段驱动扩展。
//! 插件只在引擎线程上使用，因此不要求 `Send`。

pub mod registry;
pub use registry::{PluginError, PluginRegistry, PluginResult};

/// 插件版本信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PluginVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

/// 插件元数据
#[derive(Debug, Clone)]
pub struct PluginMetadata {
    pub name: String,
    pub version: PluginVersion,
    pub description: String,
}

/// 引擎插件 Trait
pub trait EnginePlugin {
    /// 插件名称
    fn name(&self) -> &'static str;

    /// 插件版本
    fn version(&self) -> PluginVersion {
        PluginVersion::new(1, 0, 0)
    }

    /// 插件描述
    fn description(&self) -> &'static str {
        ""
    }

    /// 启动阶段
    fn startup(&mut self) {}

    /// 更新阶段 - 每帧调用
    fn update(&mut self) {}

    /// 关闭阶段 - 清理资源
    fn shutdown(&mut self) {}

    /// 获取插件元数据
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: self.name().to_string(),
            version: self.version(),
            description: self.description().to_string(),
        }
    }
}
