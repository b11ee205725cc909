//! 插件注册表
//!
//! 按注册顺序启动和更新插件，按相反顺序关闭。

use super::{EnginePlugin, PluginMetadata};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PluginError {
    #[error("Duplicate plugin: {0}")]
    DuplicatePlugin(String),
    #[error("Plugin not found: {0}")]
    NotFound(String),
}

pub type PluginResult<T> = Result<T, PluginError>;

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn EnginePlugin>>,
    metadata: HashMap<String, PluginMetadata>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加插件
    pub fn add<P: EnginePlugin + 'static>(&mut self, plugin: P) -> PluginResult<&mut Self> {
        let metadata = plugin.metadata();
        let name = metadata.name.clone();

        if self.metadata.contains_key(&name) {
            return Err(PluginError::DuplicatePlugin(name));
        }

        tracing::debug!("Registered plugin {} {:?}", name, metadata.version);
        self.metadata.insert(name, metadata);
        self.plugins.push(Box::new(plugin));
        Ok(self)
    }

    /// 启动所有插件
    pub fn startup_all(&mut self) {
        for plugin in &mut self.plugins {
            plugin.startup();
        }
    }

    /// 更新所有插件
    pub fn update_all(&mut self) {
        for plugin in &mut self.plugins {
            plugin.update();
        }
    }

    /// 关闭所有插件
    pub fn shutdown_all(&mut self) {
        // 反向顺序关闭
        for plugin in self.plugins.iter_mut().rev() {
            plugin.shutdown();
        }
    }

    /// 移除并关闭插件
    pub fn remove_plugin(&mut self, name: &str) -> PluginResult<()> {
        if self.metadata.remove(name).is_none() {
            return Err(PluginError::NotFound(name.to_string()));
        }

        if let Some(index) = self.plugins.iter().position(|p| p.name() == name) {
            let mut plugin = self.plugins.remove(index);
            plugin.shutdown();
        }
        Ok(())
    }

    /// 获取插件列表
    pub fn list_plugins(&self) -> Vec<&PluginMetadata> {
        self.metadata.values().collect()
    }

    /// 检查插件是否已注册
    pub fn has_plugin(&self, name: &str) -> bool {
        self.metadata.contains_key(name)
    }

    /// 获取插件数量
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }
}
