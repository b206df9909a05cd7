use crate::api::client::{ApiRequest, Method};
use crate::api::models::{
    EpisodeItem, Image, ItemType, PlayerStatePayload, PlayingItem, TrackItem, TrackSnapshot,
};
use crate::commands::dispatcher::CommandDispatcher;
use crate::commands::{
    ADDITIONAL_TYPES, AD_PLAYING, TRACK_DATA_ERROR, UNKNOWN_PLAYING_TYPE, WEB_PLAYER_NOT_OPEN,
};
use crate::error::{AppError, AppResult};
use crate::outcome::{ErrorCause, Outcome, OutcomeData};

/// Ads report no usable duration; the caller re-polls after this long.
pub const AD_DURATION_MS: u64 = 15_000;

fn first_image(images: &[Image]) -> String {
    images.first().map(|i| i.url.clone()).unwrap_or_default()
}

fn track_snapshot(payload: &PlayerStatePayload, track: TrackItem) -> TrackSnapshot {
    TrackSnapshot {
        id: track.id.unwrap_or_default(),
        track: track.name,
        artist: track
            .artists
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_default(),
        album_url: first_image(&track.album.images),
        is_playing: payload.is_playing,
        device_id: payload.device_id(),
        volume_percent: payload.volume_percent(),
        progress_ms: payload.progress_ms.unwrap_or(0),
        duration_ms: track.duration_ms,
        is_saved: false,
        item_type: ItemType::Tracks,
    }
}

fn episode_snapshot(payload: &PlayerStatePayload, episode: EpisodeItem) -> TrackSnapshot {
    TrackSnapshot {
        item_type: episode.item_type(),
        artist: episode.publisher(),
        album_url: first_image(&episode.images),
        id: episode.id.unwrap_or_default(),
        track: episode.name,
        is_playing: payload.is_playing,
        device_id: payload.device_id(),
        volume_percent: payload.volume_percent(),
        progress_ms: payload.progress_ms.unwrap_or(0),
        duration_ms: episode.duration_ms,
        is_saved: false,
    }
}

fn ad_snapshot(payload: &PlayerStatePayload) -> TrackSnapshot {
    TrackSnapshot {
        id: String::new(),
        track: String::new(),
        artist: String::new(),
        album_url: String::new(),
        is_playing: payload.is_playing,
        device_id: payload.device_id(),
        volume_percent: payload.volume_percent(),
        progress_ms: payload.progress_ms.unwrap_or(0),
        duration_ms: AD_DURATION_MS,
        is_saved: false,
        item_type: ItemType::Ad,
    }
}

impl CommandDispatcher {
    /// Fetch the player state and normalize it into a `TrackSnapshot`,
    /// then look up whether the item is in the user's library.
    pub async fn get_currently_playing(&self, access_token: &str) -> Outcome {
        let request = ApiRequest::new(Method::Get, "/player")
            .query(ADDITIONAL_TYPES.0, ADDITIONAL_TYPES.1);
        let response = match self.gateway().call(&request, access_token).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Player state request failed: {}", e);
                return Outcome::error_with_cause(TRACK_DATA_ERROR, ErrorCause::PlayerState);
            }
        };

        match response.status {
            200 => {}
            204 => return Outcome::failure(WEB_PLAYER_NOT_OPEN),
            status => {
                log::error!("Player state request failed with status {}", status);
                return Outcome::error_with_cause(TRACK_DATA_ERROR, ErrorCause::PlayerState);
            }
        }

        let payload = match response.json::<PlayerStatePayload>() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Unreadable player state: {}", e);
                return Outcome::error_with_cause(TRACK_DATA_ERROR, ErrorCause::PlayerState);
            }
        };
        let item = match payload.playing_item() {
            Ok(item) => item,
            Err(e) => {
                log::error!("Unreadable {} item: {}", payload.currently_playing_type, e);
                return Outcome::error_with_cause(TRACK_DATA_ERROR, ErrorCause::PlayerState);
            }
        };

        let mut snapshot = match item {
            PlayingItem::Track(track) => track_snapshot(&payload, track),
            PlayingItem::Episode(episode) => episode_snapshot(&payload, episode),
            PlayingItem::Ad => {
                return Outcome::SuccessWithNotice {
                    data: OutcomeData::Snapshot(ad_snapshot(&payload)),
                    notice: AD_PLAYING.to_string(),
                }
            }
            PlayingItem::Unknown(tag) => {
                log::warn!("Unknown currently playing type {:?}", tag);
                return Outcome::error(UNKNOWN_PLAYING_TYPE);
            }
        };

        match self
            .is_saved(access_token, snapshot.item_type, &snapshot.id)
            .await
        {
            Ok(saved) => snapshot.is_saved = saved,
            Err(e) => {
                log::error!("Saved-status lookup for {} failed: {}", snapshot.id, e);
                return Outcome::error_with_cause(TRACK_DATA_ERROR, ErrorCause::SavedStatus);
            }
        }

        Outcome::Success(Some(OutcomeData::Snapshot(snapshot)))
    }

    async fn is_saved(
        &self,
        access_token: &str,
        item_type: ItemType,
        id: &str,
    ) -> AppResult<bool> {
        // Local files have no id and cannot be in the library.
        let Some(collection) = item_type.collection_path().filter(|_| !id.is_empty()) else {
            return Ok(false);
        };
        let request = ApiRequest::new(Method::Get, format!("/{}/contains", collection))
            .query("ids", id)
            .query(ADDITIONAL_TYPES.0, ADDITIONAL_TYPES.1);
        let response = self.gateway().call(&request, access_token).await?;
        if response.status != 200 {
            return Err(AppError::SpotifyApi {
                status: response.status,
                message: response.body,
            });
        }
        let saved: Vec<bool> = response.json()?;
        saved.first().copied().ok_or_else(|| AppError::SpotifyApi {
            status: response.status,
            message: "Empty saved-status response".into(),
        })
    }
}
