mod dispatcher;
mod now_playing;

pub use dispatcher::CommandDispatcher;

use crate::api::client::{ApiRequest, Method};
use crate::api::models::ItemType;
use serde::Deserialize;

pub const TRACK_COMMAND_ERROR: &str = "Error when completing track command.";
pub const PROFILE_ERROR: &str = "Error occured when getting user profile.";
pub const TRACK_DATA_ERROR: &str = "Error occured when getting track data.";
pub const WEB_PLAYER_NOT_OPEN: &str = "Web player not open in browser.";
pub const UNKNOWN_PLAYING_TYPE: &str = "Unknown currently playing type.";
pub const AD_PLAYING: &str = "Ad is playing.";

/// Lets podcast episodes and audiobook chapters be addressed by the player
/// endpoints; sent on every call.
const ADDITIONAL_TYPES: (&str, &str) = ("additional_types", "episode");

/// A request from the UI layer, tagged by its `command` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    SignIn,
    SignOut,
    GetProfile,
    GetCurrentlyPlaying,
    Play,
    Pause,
    Next,
    Previous,
    SaveTrack {
        id: String,
        #[serde(rename = "type")]
        item_type: ItemType,
    },
    RemoveTrack {
        id: String,
        #[serde(rename = "type")]
        item_type: ItemType,
    },
    #[serde(rename_all = "camelCase")]
    SetVolume {
        volume: u32,
        #[serde(default)]
        device_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SeekPosition {
        position: u64,
        #[serde(default)]
        device_id: Option<String>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SignIn => "signIn",
            Command::SignOut => "signOut",
            Command::GetProfile => "getProfile",
            Command::GetCurrentlyPlaying => "getCurrentlyPlaying",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::Next => "next",
            Command::Previous => "previous",
            Command::SaveTrack { .. } => "saveTrack",
            Command::RemoveTrack { .. } => "removeTrack",
            Command::SetVolume { .. } => "setVolume",
            Command::SeekPosition { .. } => "seekPosition",
        }
    }

    /// The one call a playback-control command maps to. `None` for
    /// non-playback commands and for library calls on an ad.
    pub fn playback_request(&self) -> Option<ApiRequest> {
        let request = match self {
            Command::Play => ApiRequest::new(Method::Put, "/player/play"),
            Command::Pause => ApiRequest::new(Method::Put, "/player/pause"),
            Command::Next => ApiRequest::new(Method::Post, "/player/next"),
            Command::Previous => ApiRequest::new(Method::Post, "/player/previous"),
            Command::SaveTrack { id, item_type } => {
                ApiRequest::new(Method::Put, format!("/{}", item_type.collection_path()?))
                    .query("ids", id)
            }
            Command::RemoveTrack { id, item_type } => {
                ApiRequest::new(Method::Delete, format!("/{}", item_type.collection_path()?))
                    .query("ids", id)
            }
            Command::SetVolume { volume, device_id } => with_device(
                ApiRequest::new(Method::Put, "/player/volume")
                    .query("volume_percent", (*volume).min(100)),
                device_id,
            ),
            Command::SeekPosition {
                position,
                device_id,
            } => with_device(
                ApiRequest::new(Method::Put, "/player/seek").query("position_ms", position),
                device_id,
            ),
            Command::SignIn
            | Command::SignOut
            | Command::GetProfile
            | Command::GetCurrentlyPlaying => return None,
        };
        Some(request.query(ADDITIONAL_TYPES.0, ADDITIONAL_TYPES.1))
    }

    pub fn is_playback(&self) -> bool {
        matches!(
            self,
            Command::Play
                | Command::Pause
                | Command::Next
                | Command::Previous
                | Command::SaveTrack { .. }
                | Command::RemoveTrack { .. }
                | Command::SetVolume { .. }
                | Command::SeekPosition { .. }
        )
    }
}

fn with_device(request: ApiRequest, device_id: &Option<String>) -> ApiRequest {
    match device_id.as_deref() {
        Some(id) if !id.is_empty() => request.query("device_id", id),
        _ => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Command {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_command_specific_fields() {
        assert_eq!(
            parse(json!({"command": "saveTrack", "id": "t1", "type": "episodes"})),
            Command::SaveTrack {
                id: "t1".into(),
                item_type: ItemType::Episodes
            }
        );
        assert_eq!(
            parse(json!({"command": "seekPosition", "position": 5000, "deviceId": "d"})),
            Command::SeekPosition {
                position: 5000,
                device_id: Some("d".into())
            }
        );
        assert_eq!(
            parse(json!({"command": "setVolume", "volume": 30})),
            Command::SetVolume {
                volume: 30,
                device_id: None
            }
        );
    }

    #[test]
    fn unknown_command_does_not_parse() {
        assert!(serde_json::from_value::<Command>(json!({"command": "shuffle"})).is_err());
    }

    #[test]
    fn every_playback_request_asks_for_episodes() {
        let commands = [
            Command::Play,
            Command::Pause,
            Command::Next,
            Command::Previous,
            Command::SaveTrack {
                id: "a".into(),
                item_type: ItemType::Tracks,
            },
            Command::RemoveTrack {
                id: "a".into(),
                item_type: ItemType::Audiobooks,
            },
            Command::SetVolume {
                volume: 10,
                device_id: None,
            },
            Command::SeekPosition {
                position: 0,
                device_id: None,
            },
        ];
        for command in commands {
            assert!(command.is_playback());
            let request = command.playback_request().unwrap();
            assert_eq!(request.query_value("additional_types"), Some("episode"));
        }
    }

    #[test]
    fn seek_maps_to_put_with_position_and_device() {
        let request = Command::SeekPosition {
            position: 42_000,
            device_id: Some("dev".into()),
        }
        .playback_request()
        .unwrap();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, "/player/seek");
        assert_eq!(request.query_value("position_ms"), Some("42000"));
        assert_eq!(request.query_value("device_id"), Some("dev"));
    }

    #[test]
    fn library_paths_follow_item_type() {
        let save = Command::SaveTrack {
            id: "e1".into(),
            item_type: ItemType::Episodes,
        }
        .playback_request()
        .unwrap();
        assert_eq!((save.method, save.path.as_str()), (Method::Put, "/episodes"));
        assert_eq!(save.query_value("ids"), Some("e1"));

        let remove = Command::RemoveTrack {
            id: "t1".into(),
            item_type: ItemType::Tracks,
        }
        .playback_request()
        .unwrap();
        assert_eq!((remove.method, remove.path.as_str()), (Method::Delete, "/tracks"));
    }

    #[test]
    fn ads_cannot_be_saved() {
        let save = Command::SaveTrack {
            id: String::new(),
            item_type: ItemType::Ad,
        };
        assert_eq!(save.playback_request(), None);
    }

    #[test]
    fn volume_is_clamped() {
        let request = Command::SetVolume {
            volume: 250,
            device_id: Some(String::new()),
        }
        .playback_request()
        .unwrap();
        assert_eq!(request.query_value("volume_percent"), Some("100"));
        assert_eq!(request.query_value("device_id"), None);
    }

    #[test]
    fn session_commands_are_not_playback() {
        for command in [
            Command::SignIn,
            Command::SignOut,
            Command::GetProfile,
            Command::GetCurrentlyPlaying,
        ] {
            assert!(!command.is_playback());
            assert_eq!(command.playback_request(), None);
        }
    }
}
