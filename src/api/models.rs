use crate::error::AppResult;
use serde::{Deserialize, Serialize};

// Auth types
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Library collection an item belongs to. Also the path segment of the
/// save/remove/contains endpoints, so the snapshot type and the saved-status
/// lookup can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Tracks,
    Episodes,
    Audiobooks,
    Ad,
}

impl ItemType {
    /// Path segment for the library endpoints. Ads have none.
    pub fn collection_path(self) -> Option<&'static str> {
        match self {
            ItemType::Tracks => Some("tracks"),
            ItemType::Episodes => Some("episodes"),
            ItemType::Audiobooks => Some("audiobooks"),
            ItemType::Ad => None,
        }
    }
}

/// Normalized "currently playing" record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSnapshot {
    pub id: String,
    pub track: String,
    pub artist: String,
    pub album_url: String,
    pub is_playing: bool,
    pub device_id: String,
    pub volume_percent: u32,
    pub progress_ms: u64,
    pub duration_ms: u64,
    pub is_saved: bool,
    #[serde(rename = "type")]
    pub item_type: ItemType,
}

impl TrackSnapshot {
    /// Fraction of the item already played, 0.0 when the duration is unknown.
    pub fn progress_fraction(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.progress_ms as f64 / self.duration_ms as f64
    }
}

// Wire payloads

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfilePayload {
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicePayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub volume_percent: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherRef {
    #[serde(default)]
    pub publisher: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: AlbumRef,
}

/// Podcast episode or audiobook chapter; both arrive under the "episode" tag.
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub show: Option<PublisherRef>,
    #[serde(default)]
    pub audiobook: Option<PublisherRef>,
}

impl EpisodeItem {
    pub fn item_type(&self) -> ItemType {
        if self.kind == "episode" {
            ItemType::Episodes
        } else {
            ItemType::Audiobooks
        }
    }

    pub fn publisher(&self) -> String {
        self.show
            .as_ref()
            .or(self.audiobook.as_ref())
            .map(|p| p.publisher.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub enum PlayingItem {
    Track(TrackItem),
    Episode(EpisodeItem),
    Ad,
    Unknown(String),
}

/// GET /me/player response body.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerStatePayload {
    #[serde(default)]
    pub device: Option<DevicePayload>,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub currently_playing_type: String,
    #[serde(default)]
    pub item: Option<serde_json::Value>,
}

impl PlayerStatePayload {
    /// Resolve the loosely-typed `item` against `currently_playing_type`.
    pub fn playing_item(&self) -> AppResult<PlayingItem> {
        let item = || self.item.clone().unwrap_or(serde_json::Value::Null);
        let playing = match self.currently_playing_type.as_str() {
            "track" => PlayingItem::Track(serde_json::from_value(item())?),
            "episode" => PlayingItem::Episode(serde_json::from_value(item())?),
            "ad" => PlayingItem::Ad,
            other => PlayingItem::Unknown(other.to_string()),
        };
        Ok(playing)
    }

    pub fn device_id(&self) -> String {
        self.device
            .as_ref()
            .and_then(|d| d.id.clone())
            .unwrap_or_default()
    }

    pub fn volume_percent(&self) -> u32 {
        self.device
            .as_ref()
            .and_then(|d| d.volume_percent)
            .unwrap_or(0)
    }
}
