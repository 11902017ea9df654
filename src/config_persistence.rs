use std::path::{Path, PathBuf};

use log::{info, warn};
use toml_edit::{value, DocumentMut, Item, Table};

use crate::config::{sanitize_config, Config};

const APP_CONFIG_DIR: &str = "reelqueue";
const CONFIG_FILE_NAME: &str = "config.toml";

fn set_table_value_preserving_decor(table: &mut Table, key: &str, item: Item) {
    let existing_value_decor = table
        .get(key)
        .and_then(|current| current.as_value().map(|value| value.decor().clone()));
    table[key] = item;
    if let Some(existing_value_decor) = existing_value_decor {
        if let Some(next_value) = table[key].as_value_mut() {
            *next_value.decor_mut() = existing_value_decor;
        }
    }
}

fn set_if_changed<T: PartialEq>(table: &mut Table, key: &str, previous: T, next: T, item: Item) {
    if table.contains_key(key) && previous == next {
        return;
    }
    set_table_value_preserving_decor(table, key, item);
}

fn section_table<'a>(document: &'a mut DocumentMut, key: &str) -> Option<&'a mut Table> {
    let root = document.as_table_mut();
    if !matches!(root.get(key), Some(item) if item.is_table()) {
        root.insert(key, Item::Table(Table::new()));
    }
    root.get_mut(key).and_then(Item::as_table_mut)
}

fn write_config_to_document(document: &mut DocumentMut, previous: &Config, config: &Config) {
    if let Some(search) = section_table(document, "search") {
        set_if_changed(
            search,
            "debounce_ms",
            previous.search.debounce_ms,
            config.search.debounce_ms,
            value(i64::from(config.search.debounce_ms)),
        );
    }

    if let Some(session) = section_table(document, "session") {
        set_if_changed(
            session,
            "confirm_timeout_ms",
            previous.session.confirm_timeout_ms,
            config.session.confirm_timeout_ms,
            value(i64::from(config.session.confirm_timeout_ms)),
        );
    }

    if let Some(notices) = section_table(document, "notices") {
        set_if_changed(
            notices,
            "max_visible",
            previous.notices.max_visible,
            config.notices.max_visible,
            value(i64::from(config.notices.max_visible)),
        );
        set_if_changed(
            notices,
            "toast_timeout_ms",
            previous.notices.toast_timeout_ms,
            config.notices.toast_timeout_ms,
            value(i64::from(config.notices.toast_timeout_ms)),
        );
    }

    if let Some(collection) = section_table(document, "collection") {
        set_if_changed(
            collection,
            "base_url",
            previous.collection.base_url.as_str(),
            config.collection.base_url.as_str(),
            value(config.collection.base_url.clone()),
        );
        // TOML integers are signed; ids past i64::MAX cannot be written back.
        match i64::try_from(config.collection.startup_season_id) {
            Ok(season_id) => set_if_changed(
                collection,
                "startup_season_id",
                previous.collection.startup_season_id,
                config.collection.startup_season_id,
                value(season_id),
            ),
            Err(_) => warn!(
                "Skipping startup_season_id {}: out of TOML integer range",
                config.collection.startup_season_id
            ),
        }
        set_if_changed(
            collection,
            "request_timeout_ms",
            previous.collection.request_timeout_ms,
            config.collection.request_timeout_ms,
            value(i64::from(config.collection.request_timeout_ms)),
        );
    }
}

/// Re-renders `existing_text` with `config`'s values, keeping comments and
/// layout of keys that did not change.
pub fn serialize_config_with_preserved_comments(
    existing_text: &str,
    config: &Config,
) -> Result<String, String> {
    let previous = toml::from_str::<Config>(existing_text)
        .map_err(|err| format!("failed to parse existing config as Config: {}", err))?;
    let mut document = existing_text
        .parse::<DocumentMut>()
        .map_err(|err| format!("failed to parse existing config as TOML document: {}", err))?;
    write_config_to_document(&mut document, &previous, config);
    Ok(document.to_string())
}

pub fn persist_config_file(config: &Config, path: &Path) {
    let existing_text = std::fs::read_to_string(path).ok();
    let config_text = if let Some(existing_text) = existing_text {
        match serialize_config_with_preserved_comments(&existing_text, config) {
            Ok(updated_text) => Some(updated_text),
            Err(err) => {
                warn!(
                    "Failed to preserve config comments for {} ({}). Falling back to plain serialization.",
                    path.display(),
                    err
                );
                toml::to_string(config).ok()
            }
        }
    } else {
        toml::to_string(config).ok()
    };

    let Some(config_text) = config_text else {
        log::error!("Failed to serialize config for {}", path.display());
        return;
    };

    if let Err(err) = std::fs::write(path, config_text) {
        log::error!("Failed to persist config to {}: {}", path.display(), err);
    }
}

pub fn default_config_path() -> Result<PathBuf, String> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| "no per-user configuration directory on this platform".to_string())?;
    Ok(config_dir.join(APP_CONFIG_DIR).join(CONFIG_FILE_NAME))
}

/// Loads the config at `path`, writing defaults first when it does not exist.
///
/// An unparsable file falls back to defaults without being overwritten.
/// Values clamped by [`sanitize_config`] are written back in place.
pub fn load_or_create_config(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                format!("failed to create config dir {}: {}", parent.display(), err)
            })?;
        }
        let default_text = toml::to_string(&Config::default())
            .map_err(|err| format!("failed to serialize default config: {}", err))?;
        std::fs::write(path, default_text)
            .map_err(|err| format!("failed to write config {}: {}", path.display(), err))?;
    }

    let config_content = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let loaded = match toml::from_str::<Config>(&config_content) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Failed to parse config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            return Ok(Config::default());
        }
    };

    let config = sanitize_config(loaded.clone());
    if config != loaded {
        info!("Config values out of range. Writing clamped values to {}", path.display());
        persist_config_file(&config, path);
    }
    Ok(config)
}
