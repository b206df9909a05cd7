use crate::api::client::{ApiRequest, Gateway, Method};
use crate::api::models::ProfilePayload;
use crate::commands::{Command, PROFILE_ERROR, TRACK_COMMAND_ERROR};
use crate::outcome::{Outcome, OutcomeData};
use std::sync::Arc;

/// Maps commands onto single gateway calls and classifies the result.
/// Nothing here retries.
pub struct CommandDispatcher {
    gateway: Arc<dyn Gateway>,
}

impl CommandDispatcher {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub(super) fn gateway(&self) -> &dyn Gateway {
        self.gateway.as_ref()
    }

    /// Play, pause, skip, library and volume/seek commands.
    ///
    /// 200/204 succeed, 403 means the account tier cannot use the player
    /// endpoints (a `Failure` the caller can route around), everything else
    /// is an `Error`.
    pub async fn track_command(&self, command: &Command, access_token: &str) -> Outcome {
        let Some(request) = command.playback_request() else {
            log::warn!("{} has no playback request", command.name());
            return Outcome::error(TRACK_COMMAND_ERROR);
        };

        match self.gateway.call(&request, access_token).await {
            Ok(response) => match response.status {
                200 | 204 => Outcome::success(),
                403 => {
                    log::info!("{} forbidden for this account tier", command.name());
                    Outcome::Failure(None)
                }
                status => {
                    log::error!("{} failed with status {}", command.name(), status);
                    Outcome::error(TRACK_COMMAND_ERROR)
                }
            },
            Err(e) => {
                log::error!("{} failed: {}", command.name(), e);
                Outcome::error(TRACK_COMMAND_ERROR)
            }
        }
    }

    pub async fn get_profile(&self, access_token: &str) -> Outcome {
        let request = ApiRequest::new(Method::Get, "");
        let response = match self.gateway.call(&request, access_token).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Profile request failed: {}", e);
                return Outcome::error(PROFILE_ERROR);
            }
        };

        match response.status {
            200 => match response.json::<ProfilePayload>() {
                Ok(profile) => {
                    let profile_url = profile
                        .images
                        .into_iter()
                        .next()
                        .map(|image| image.url)
                        .unwrap_or_default();
                    Outcome::Success(Some(OutcomeData::Profile { profile_url }))
                }
                Err(e) => {
                    log::error!("Unreadable profile payload: {}", e);
                    Outcome::error(PROFILE_ERROR)
                }
            },
            403 => Outcome::failure(PROFILE_ERROR),
            status => {
                log::error!("Profile request failed with status {}", status);
                Outcome::error(PROFILE_ERROR)
            }
        }
    }
}
