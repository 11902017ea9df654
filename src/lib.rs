//! Coordination core of a desktop media-browsing client: the playback queue,
//! debounced search over a remote collection, and the command and
//! confirmation plumbing between the UI process and its host process.

pub mod app_bootstrap;
pub mod app_runtime;
pub mod app_state;
pub mod collection;
pub mod command_router;
pub mod config;
pub mod config_persistence;
pub mod debounce;
pub mod host_bridge;
pub mod host_ipc;
#[cfg(feature = "os-media-controls")]
pub mod media_controls_manager;
pub mod media_filter;
pub mod notices;
pub mod playlist;
pub mod protocol;
pub mod search_state;
pub mod session;
