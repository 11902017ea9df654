//! Persistent application configuration model and defaults.

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Search box behavior.
    pub search: SearchConfig,
    #[serde(default)]
    /// Account-switch confirmation behavior.
    pub session: SessionConfig,
    #[serde(default)]
    /// Toast notice presentation.
    pub notices: NoticesConfig,
    #[serde(default)]
    /// Remote collection endpoint.
    pub collection: CollectionConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a term is committed.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SessionConfig {
    /// Upper bound on the host's answer to a main-window request.
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NoticesConfig {
    #[serde(default = "default_max_visible")]
    pub max_visible: u32,
    #[serde(default = "default_toast_timeout_ms")]
    pub toast_timeout_ms: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_base_url")]
    pub base_url: String,
    /// Collection loaded at startup; `0` disables the startup load.
    #[serde(default)]
    pub startup_season_id: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_ms: default_confirm_timeout_ms(),
        }
    }
}

impl Default for NoticesConfig {
    fn default() -> Self {
        Self {
            max_visible: default_max_visible(),
            toast_timeout_ms: default_toast_timeout_ms(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            base_url: default_collection_base_url(),
            startup_season_id: 0,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_debounce_ms() -> u32 {
    300
}

fn default_confirm_timeout_ms() -> u32 {
    5_000
}

fn default_max_visible() -> u32 {
    3
}

fn default_toast_timeout_ms() -> u32 {
    3_000
}

fn default_collection_base_url() -> String {
    "https://api.bilibili.com/x/space/fav/season/list".to_string()
}

fn default_request_timeout_ms() -> u32 {
    10_000
}

/// Clamps loaded values into ranges the runtime can work with.
pub fn sanitize_config(config: Config) -> Config {
    let base_url = config.collection.base_url.trim().to_string();
    Config {
        search: SearchConfig {
            debounce_ms: config.search.debounce_ms.clamp(50, 5_000),
        },
        session: SessionConfig {
            confirm_timeout_ms: config.session.confirm_timeout_ms.clamp(500, 60_000),
        },
        notices: NoticesConfig {
            max_visible: config.notices.max_visible.clamp(1, 10),
            toast_timeout_ms: config.notices.toast_timeout_ms.clamp(500, 30_000),
        },
        collection: CollectionConfig {
            base_url: if base_url.is_empty() {
                default_collection_base_url()
            } else {
                base_url
            },
            startup_season_id: config.collection.startup_season_id,
            request_timeout_ms: config.collection.request_timeout_ms.clamp(1_000, 120_000),
        },
    }
}
