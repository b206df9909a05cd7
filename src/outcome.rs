use crate::api::models::TrackSnapshot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Failure,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutcomeData {
    Snapshot(TrackSnapshot),
    #[serde(rename_all = "camelCase")]
    Profile { profile_url: String },
}

/// Which remote call an `Error` came from when a command makes two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCause {
    PlayerState,
    SavedStatus,
}

/// Result of every dispatch path.
///
/// `Failure` is an expected limitation the caller may work around;
/// `Error` is unexpected. `SuccessWithNotice` is a success that still carries
/// a message for the caller (an ad is playing); on the wire it keeps the
/// `kind: "success"` plus `error.message` shape hosts already read.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Option<OutcomeData>),
    SuccessWithNotice { data: OutcomeData, notice: String },
    Failure(Option<String>),
    Error {
        message: String,
        cause: Option<ErrorCause>,
    },
}

impl Outcome {
    pub fn success() -> Self {
        Outcome::Success(None)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure(Some(message.into()))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Outcome::Error {
            message: message.into(),
            cause: None,
        }
    }

    pub fn error_with_cause(message: impl Into<String>, cause: ErrorCause) -> Self {
        Outcome::Error {
            message: message.into(),
            cause: Some(cause),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) | Outcome::SuccessWithNotice { .. } => OutcomeKind::Success,
            Outcome::Failure(_) => OutcomeKind::Failure,
            Outcome::Error { .. } => OutcomeKind::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind() == OutcomeKind::Success
    }

    pub fn is_failure(&self) -> bool {
        self.kind() == OutcomeKind::Failure
    }

    /// The `error.message` a host would read.
    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::SuccessWithNotice { notice, .. } => Some(notice),
            Outcome::Failure(message) => message.as_deref(),
            Outcome::Error { message, .. } => Some(message),
        }
    }

    pub fn data(&self) -> Option<&OutcomeData> {
        match self {
            Outcome::Success(data) => data.as_ref(),
            Outcome::SuccessWithNotice { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Option<&TrackSnapshot> {
        match self.data() {
            Some(OutcomeData::Snapshot(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<ErrorCause> {
        match self {
            Outcome::Error { cause, .. } => *cause,
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct WireError<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<ErrorCause>,
}

#[derive(Serialize)]
struct WireOutcome<'a> {
    kind: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a OutcomeData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<WireError<'a>>,
}

impl Serialize for Outcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let error = self.message().map(|message| WireError {
            message,
            cause: self.cause(),
        });
        WireOutcome {
            kind: self.kind(),
            data: self.data(),
            error,
        }
        .serialize(serializer)
    }
}
