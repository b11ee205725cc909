//! 统一错误处理模块
//!
//! 提供扩展范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **平台层错误** (`PlatformError`): 调用原生计费 SDK 失败（JNI、不支持的平台等）
//! - **脚本层错误** (`ScriptError`): 回调调用失败、实例已销毁、值转换失败
//! - **扩展错误** (`IapError`): 请求网关返回给调用方的错误，可包裹以上两层
//!
//! 分发器从不向外返回错误：单条命令的失败只记录日志，不影响同批次的其它命令。

use crate::config::ConfigError;
use thiserror::Error;

/// 扩展核心错误类型
#[derive(Error, Debug)]
pub enum IapError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("IAP extension is not running")]
    NotRunning,

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// 脚本系统错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("Script runtime error: {0}")]
    Runtime(String),

    #[error("Invalid script binding: {0}")]
    InvalidBinding(String),

    #[error("Script instance has been deleted")]
    InstanceDestroyed,

    #[error("Value conversion failed: {0}")]
    Conversion(String),
}

/// 平台层错误
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("JNI error: {0}")]
    Jni(String),

    #[error("Platform not supported: {0}")]
    NotSupported(String),

    #[error("Native call {method} failed: {reason}")]
    Call { method: &'static str, reason: String },
}

/// 结果类型别名
pub type IapResult<T> = Result<T, IapError>;
pub type ScriptResult<T> = Result<T, ScriptError>;
pub type PlatformResult<T> = Result<T, PlatformError>;
