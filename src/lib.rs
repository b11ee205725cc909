//! # Game Engine IAP
//!
//! In-app purchase extension for the game engine. Native billing services
//! (Google Play, Amazon) complete requests on their own threads; this crate
//! relays those results to script callbacks on the engine thread.
//!
//! ## Architecture
//!
//! - **Relay**: native threads push results into a mutex-guarded command
//!   queue through a cloneable [`relay::ResultSink`]
//! - **Dispatcher**: once per engine tick the queue is drained and every
//!   command is decoded and delivered to the registered script listener
//! - **Gateway**: validates script requests, registers listeners and
//!   forwards requests to the native layer without blocking
//!
//! ### Example
//!
//! ```ignore
//! use game_engine_iap::config::ExtensionConfig;
//! use game_engine_iap::iap::Iap;
//! use game_engine_iap::platform::RecordingBilling;
//! use game_engine_iap::scripting::QuickJsHost;
//!
//! let settings = ExtensionConfig::load_or_default();
//! game_engine_iap::core::init_logging(&settings.logging);
//!
//! let config = settings.provider_config();
//! let host = QuickJsHost::new(config.provider)?;
//! let mut iap = Iap::new(config, host, RecordingBilling::new());
//!
//! // engine loop
//! iap.update();
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Errors, logging and shared macros
//! - [`config`]: Extension configuration
//! - [`relay`]: Cross-thread command queue
//! - [`iap`]: Extension context, dispatcher and request gateway
//! - [`scripting`]: Script host abstraction and hosts
//! - [`platform`]: Native billing layer
//! - [`plugins`]: Engine plugin lifecycle

/// Errors, logging initialisation and shared macros
pub mod core;
/// Extension configuration (TOML / JSON / environment)
pub mod config;
/// Cross-thread command relay
pub mod relay;
/// In-app purchase extension context
pub mod iap;
/// Script host abstraction
pub mod scripting;
/// Native billing layer
pub mod platform;
/// Engine plugin lifecycle
pub mod plugins;

pub use crate::core::{IapError, IapResult};
pub use crate::iap::{DispatchStats, Iap};
pub use crate::relay::ResultSink;
