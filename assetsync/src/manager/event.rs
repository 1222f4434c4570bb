//! Notifications delivered to the hosting application.

use std::fmt;

use crate::download::ErrorCode;

/// Failure category carried by [`UpdateEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateErrorCode {
    Network,
    CreateFile,
    InvalidUrl,
    InvalidStoragePath,
    /// A fetched manifest was malformed.
    Parse,
    /// The manifest to check against names no remote manifest URL.
    NoManifestUrl,
}

impl From<ErrorCode> for UpdateErrorCode {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Network => Self::Network,
            ErrorCode::CreateFile => Self::CreateFile,
            ErrorCode::InvalidUrl => Self::InvalidUrl,
            ErrorCode::InvalidStoragePath => Self::InvalidStoragePath,
        }
    }
}

impl fmt::Display for UpdateErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::CreateFile => "create-file",
            Self::InvalidUrl => "invalid-url",
            Self::InvalidStoragePath => "invalid-storage-path",
            Self::Parse => "parse",
            Self::NoManifestUrl => "no-manifest-url",
        };
        f.write_str(name)
    }
}

/// Something the hosting application may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// No usable local manifest; `url` is where the bundled one was expected.
    NoLocalManifest { url: String },
    AlreadyUpToDate,
    NewVersionFound,
    UpdateFinished,
    /// Share of the current batch completed, 0 to 100.
    UpdatingProgress { percent: u8 },
    AssetLoaded { asset_id: String },
    Error {
        code: UpdateErrorCode,
        message: String,
        asset_id: Option<String>,
    },
}

impl UpdateEvent {
    /// Stable event name, e.g. `AM_Update_Finished` or `AM_hero_Loaded`.
    pub fn name(&self) -> String {
        match self {
            Self::NoLocalManifest { .. } => "AM_No_Local_Manifest".to_string(),
            Self::AlreadyUpToDate => "AM_Already_Up_To_Date".to_string(),
            Self::NewVersionFound => "AM_New_Version_Found".to_string(),
            Self::UpdateFinished => "AM_Update_Finished".to_string(),
            Self::UpdatingProgress { .. } => "AM_Updating".to_string(),
            Self::AssetLoaded { asset_id } => format!("AM_{}_Loaded", asset_id),
            Self::Error { .. } => "AM_Error".to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl fmt::Display for UpdateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLocalManifest { url } => write!(f, "no local manifest ({})", url),
            Self::AlreadyUpToDate => f.write_str("already up to date"),
            Self::NewVersionFound => f.write_str("new version found"),
            Self::UpdateFinished => f.write_str("update finished"),
            Self::UpdatingProgress { percent } => write!(f, "updating {}%", percent),
            Self::AssetLoaded { asset_id } => write!(f, "asset {} loaded", asset_id),
            Self::Error {
                code,
                message,
                asset_id: Some(id),
            } => write!(f, "{} error on {}: {}", code, id, message),
            Self::Error { code, message, .. } => write!(f, "{} error: {}", code, message),
        }
    }
}

/// Receiver of [`UpdateEvent`]s.
///
/// Implemented for any `FnMut(&UpdateEvent) + Send` closure.
pub trait EventListener: Send {
    fn on_event(&mut self, event: &UpdateEvent);
}

impl<F> EventListener for F
where
    F: FnMut(&UpdateEvent) + Send,
{
    fn on_event(&mut self, event: &UpdateEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(
            UpdateEvent::NoLocalManifest { url: "x".into() }.name(),
            "AM_No_Local_Manifest"
        );
        assert_eq!(UpdateEvent::AlreadyUpToDate.name(), "AM_Already_Up_To_Date");
        assert_eq!(UpdateEvent::NewVersionFound.name(), "AM_New_Version_Found");
        assert_eq!(UpdateEvent::UpdateFinished.name(), "AM_Update_Finished");
        assert_eq!(
            UpdateEvent::UpdatingProgress { percent: 50 }.name(),
            "AM_Updating"
        );
        assert_eq!(
            UpdateEvent::AssetLoaded {
                asset_id: "hero".into()
            }
            .name(),
            "AM_hero_Loaded"
        );
    }

    #[test]
    fn test_error_code_from_transport() {
        assert_eq!(
            UpdateErrorCode::from(ErrorCode::Network),
            UpdateErrorCode::Network
        );
        assert_eq!(
            UpdateErrorCode::from(ErrorCode::InvalidStoragePath),
            UpdateErrorCode::InvalidStoragePath
        );
    }

    #[test]
    fn test_error_display_with_asset() {
        let event = UpdateEvent::Error {
            code: UpdateErrorCode::Network,
            message: "HTTP 404".into(),
            asset_id: Some("b".into()),
        };
        assert!(event.is_error());
        assert_eq!(event.to_string(), "network error on b: HTTP 404");
    }

    #[test]
    fn test_closure_listener() {
        let mut seen = Vec::new();
        {
            let mut listener = |event: &UpdateEvent| seen.push(event.name());
            listener.on_event(&UpdateEvent::UpdateFinished);
        }
        assert_eq!(seen, vec!["AM_Update_Finished".to_string()]);
    }
}
