//! Remote video collection model and the fetch collaborator.
//!
//! The fetch layer is intentionally thin: one request per load, no retry and no
//! cache. Its result only feeds the search filter as the source list.

use std::time::Duration;

use log::debug;

use crate::playlist::{PlaylistItem, PlaylistItemKind};

/// Channel that owns a collection or a video.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct MediaOwner {
    #[serde(default)]
    pub mid: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct MediaCounters {
    #[serde(default)]
    pub play: u64,
}

/// One video row in a collection.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct MediaEntry {
    #[serde(default)]
    pub id: u64,
    pub bvid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cover: String,
    /// Length in seconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub upper: Option<MediaOwner>,
    #[serde(default)]
    pub cnt_info: MediaCounters,
}

impl MediaEntry {
    pub fn to_playlist_item(&self) -> PlaylistItem {
        PlaylistItem {
            kind: PlaylistItemKind::Video,
            id: self.bvid.clone(),
            title: self.title.clone(),
            cover_url: self.cover.clone(),
            owner_mid: self.upper.as_ref().map(|owner| owner.mid),
            owner_name: self.upper.as_ref().map(|owner| owner.name.clone()),
        }
    }
}

/// Header information of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct CollectionInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub upper: Option<MediaOwner>,
    #[serde(default)]
    pub media_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct MediaCollection {
    #[serde(default)]
    pub info: CollectionInfo,
    #[serde(default)]
    pub medias: Vec<MediaEntry>,
}

impl MediaCollection {
    /// Queue items for "play all" / "add to queue", in collection order.
    pub fn playlist_items(&self) -> Vec<PlaylistItem> {
        self.medias.iter().map(MediaEntry::to_playlist_item).collect()
    }
}

#[derive(Debug, serde::Deserialize)]
struct CollectionEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<MediaCollection>,
}

/// Decodes the `{code, message, data}` response envelope.
pub fn parse_collection_response(body: &str) -> Result<MediaCollection, String> {
    let envelope: CollectionEnvelope = serde_json::from_str(body)
        .map_err(|err| format!("failed to decode collection response: {err}"))?;
    if envelope.code != 0 {
        return Err(format!(
            "collection request rejected (code {}): {}",
            envelope.code, envelope.message
        ));
    }
    Ok(envelope.data.unwrap_or_default())
}

/// Read side of the data-fetch collaborator.
pub trait CollectionSource: Send + Sync {
    fn fetch_collection(&self, season_id: u64) -> Result<MediaCollection, String>;
}

/// Fetches collections over HTTP with a single blocking request.
pub struct HttpCollectionSource {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpCollectionSource {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(request_timeout).build();
        Self {
            agent,
            base_url: base_url.into(),
        }
    }
}

impl CollectionSource for HttpCollectionSource {
    fn fetch_collection(&self, season_id: u64) -> Result<MediaCollection, String> {
        debug!(
            "HttpCollectionSource: fetching season_id={} from {}",
            season_id, self.base_url
        );
        let body = self
            .agent
            .get(&self.base_url)
            .query("season_id", &season_id.to_string())
            .call()
            .map_err(|err| format!("collection request failed: {err}"))?
            .into_string()
            .map_err(|err| format!("failed to read collection response: {err}"))?;
        parse_collection_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_collection_response;
    use crate::playlist::PlaylistItemKind;

    const SAMPLE_RESPONSE: &str = r#"{
        "code": 0,
        "message": "0",
        "data": {
            "info": {
                "title": "Weekend builds",
                "intro": "Side projects",
                "cover": "https://img.example/cover.jpg",
                "upper": { "mid": 42, "name": "Ferris" },
                "media_count": 2
            },
            "medias": [
                {
                    "id": 1001,
                    "bvid": "BV1aa",
                    "title": "Episode 1",
                    "cover": "https://img.example/1.jpg",
                    "duration": 615,
                    "upper": { "mid": 42, "name": "Ferris" },
                    "cnt_info": { "play": 1200 }
                },
                { "id": 1002, "bvid": "BV1bb", "title": "Episode 2" }
            ]
        }
    }"#;

    #[test]
    fn test_parses_collection_envelope() {
        let collection = parse_collection_response(SAMPLE_RESPONSE).expect("valid payload");
        assert_eq!(collection.info.title, "Weekend builds");
        assert_eq!(collection.info.media_count, 2);
        assert_eq!(collection.medias.len(), 2);
        assert_eq!(collection.medias[0].cnt_info.play, 1200);
        assert!(collection.medias[1].upper.is_none());
    }

    #[test]
    fn test_entries_convert_to_playlist_items_in_order() {
        let collection = parse_collection_response(SAMPLE_RESPONSE).expect("valid payload");
        let items = collection.playlist_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, PlaylistItemKind::Video);
        assert_eq!(items[0].id, "BV1aa");
        assert_eq!(items[0].owner_mid, Some(42));
        assert_eq!(items[0].owner_name.as_deref(), Some("Ferris"));
        assert_eq!(items[1].owner_name, None);
    }

    #[test]
    fn test_nonzero_code_is_an_error() {
        let err = parse_collection_response(r#"{"code": -404, "message": "not found"}"#)
            .expect_err("rejected payload");
        assert!(err.contains("-404"));
        assert!(err.contains("not found"));
    }

    #[test]
    fn test_missing_data_yields_empty_collection() {
        let collection = parse_collection_response(r#"{"code": 0}"#).expect("valid payload");
        assert!(collection.medias.is_empty());
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        assert!(parse_collection_response("<html>").is_err());
    }
}
