//! Update protocol state machine.
//!
//! [`UpdateMachine::step`] is a pure transition function: it takes one
//! [`Input`] plus a snapshot of the manifest [`Facts`] it depends on, updates
//! the stored state, and returns the [`Effect`]s the caller must perform.
//! Nothing here touches the network, the filesystem or the listener.
//!
//! ```text
//!  UNKNOWN ──► PREDOWNLOAD_VERSION ──► DOWNLOADING_VERSION ──► VERSION_LOADED
//!                     ▲ fetch failed           │                    │ parse
//!                     └────────────────────────┘                    ▼
//!  PREDOWNLOAD_MANIFEST ◄── version differs + pending / no version URL
//!        │         ▲ fetch failed
//!        ▼         │
//!  DOWNLOADING_MANIFEST ──► MANIFEST_LOADED ──► NEED_UPDATE ──► UPDATING
//!                                 │ same                            │ all done
//!                                 └──────────► UP_TO_DATE ◄─────────┘
//! ```

use std::fmt;

use super::event::{UpdateErrorCode, UpdateEvent};
use crate::download::DownloadError;

/// Unit id used for the version file fetch.
pub const VERSION_ID: &str = "@version";

/// Unit id used for the full manifest fetch.
pub const MANIFEST_ID: &str = "@manifest";

/// Protocol state.
///
/// [`UpdateState::Checking`] is only ever reported, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateState {
    Unknown,
    PredownloadVersion,
    DownloadingVersion,
    VersionLoaded,
    PredownloadManifest,
    DownloadingManifest,
    ManifestLoaded,
    NeedUpdate,
    UpToDate,
    Updating,
    Checking,
}

impl UpdateState {
    /// The state as presented to callers.
    ///
    /// Every intermediate checking stage collapses to [`UpdateState::Checking`].
    pub fn reported(self) -> Self {
        match self {
            Self::PredownloadVersion
            | Self::DownloadingVersion
            | Self::VersionLoaded
            | Self::PredownloadManifest
            | Self::DownloadingManifest
            | Self::ManifestLoaded => Self::Checking,
            other => other,
        }
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "UNKNOWN",
            Self::PredownloadVersion => "PREDOWNLOAD_VERSION",
            Self::DownloadingVersion => "DOWNLOADING_VERSION",
            Self::VersionLoaded => "VERSION_LOADED",
            Self::PredownloadManifest => "PREDOWNLOAD_MANIFEST",
            Self::DownloadingManifest => "DOWNLOADING_MANIFEST",
            Self::ManifestLoaded => "MANIFEST_LOADED",
            Self::NeedUpdate => "NEED_UPDATE",
            Self::UpToDate => "UP_TO_DATE",
            Self::Updating => "UPDATING",
            Self::Checking => "CHECKING",
        };
        f.write_str(name)
    }
}

/// Result of parsing a fetched version or manifest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// The file could not be parsed.
    Invalid(String),
    /// Parsed, and its version equals the local manifest's.
    Same,
    /// Parsed, and its version differs from the local manifest's.
    Differs,
}

/// Something that happened, fed to [`UpdateMachine::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    CheckUpdate,
    Update,
    VersionFetched,
    VersionFetchFailed(DownloadError),
    ManifestFetched,
    ManifestFetchFailed(DownloadError),
    VersionParsed(Comparison),
    ManifestParsed(Comparison),
    /// The diff against the fully loaded remote manifest.
    DiffComputed { downloads: usize, deletions: usize },
    AssetDownloaded { asset_id: String, percent: u8 },
    AssetFailed { asset_id: String, error: DownloadError },
    /// The outstanding-unit set of the current batch became empty.
    BatchComplete,
}

/// Work for the caller to perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchVersion,
    FetchManifest,
    /// Parse the fetched version file; answer with [`Input::VersionParsed`].
    ParseVersion,
    /// Parse the fetched manifest; answer with [`Input::ManifestParsed`].
    ParseManifest,
    /// Diff local against remote; answer with [`Input::DiffComputed`].
    ComputeDiff,
    /// Apply deletions and start downloading the diff's units.
    LaunchBatch,
    /// Relaunch the failed units of a settled batch.
    RetryFailed,
    /// Replace the local manifest with the remote one.
    Promote,
    /// Forget the remote manifest and any in-flight fetch.
    ClearRemote,
    /// Emit `no-local-manifest` for the configured bundled manifest.
    NotifyNoLocalManifest,
    Notify(UpdateEvent),
    /// Feed another input after the remaining effects.
    Reenter(Input),
}

/// Manifest-derived conditions the transitions depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Facts {
    pub local_loaded: bool,
    pub has_version_url: bool,
    pub has_manifest_url: bool,
    pub remote_loaded: bool,
    /// The current batch has nothing in flight but still holds failed units.
    pub batch_settled_with_failures: bool,
}

/// Stored protocol state plus the pending-update flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMachine {
    state: UpdateState,
    pending_update: bool,
}

impl Default for UpdateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateMachine {
    pub fn new() -> Self {
        Self {
            state: UpdateState::Unknown,
            pending_update: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn in_state(state: UpdateState) -> Self {
        Self {
            state,
            pending_update: false,
        }
    }

    /// The stored state, never [`UpdateState::Checking`].
    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn pending_update(&self) -> bool {
        self.pending_update
    }

    /// Return to `UNKNOWN` with no pending update.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Apply one input.
    ///
    /// Inputs that do not apply to the current state are ignored and yield
    /// no effects.
    pub fn step(&mut self, input: Input, facts: &Facts) -> Vec<Effect> {
        match input {
            Input::CheckUpdate => self.check_update(facts),
            Input::Update => self.update(facts),
            Input::VersionFetched => self.fetched(UpdateState::DownloadingVersion),
            Input::ManifestFetched => self.fetched(UpdateState::DownloadingManifest),
            Input::VersionFetchFailed(error) => self.fetch_failed(
                UpdateState::DownloadingVersion,
                UpdateState::PredownloadVersion,
                VERSION_ID,
                error,
            ),
            Input::ManifestFetchFailed(error) => self.fetch_failed(
                UpdateState::DownloadingManifest,
                UpdateState::PredownloadManifest,
                MANIFEST_ID,
                error,
            ),
            Input::VersionParsed(outcome) => self.version_parsed(outcome),
            Input::ManifestParsed(outcome) => self.manifest_parsed(outcome),
            Input::DiffComputed {
                downloads,
                deletions,
            } => self.diff_computed(downloads, deletions),
            Input::AssetDownloaded { asset_id, percent } => {
                if self.state != UpdateState::Updating {
                    return Vec::new();
                }
                vec![
                    Effect::Notify(UpdateEvent::AssetLoaded { asset_id }),
                    Effect::Notify(UpdateEvent::UpdatingProgress { percent }),
                ]
            }
            Input::AssetFailed { asset_id, error } => {
                if self.state != UpdateState::Updating {
                    return Vec::new();
                }
                vec![Effect::Notify(UpdateEvent::Error {
                    code: error.code.into(),
                    message: error.message,
                    asset_id: Some(asset_id),
                })]
            }
            Input::BatchComplete => {
                if self.state != UpdateState::Updating {
                    return Vec::new();
                }
                self.state = UpdateState::UpToDate;
                self.pending_update = false;
                vec![
                    Effect::Promote,
                    Effect::Notify(UpdateEvent::UpdateFinished),
                ]
            }
        }
    }

    fn check_update(&mut self, facts: &Facts) -> Vec<Effect> {
        if !facts.local_loaded {
            return vec![Effect::NotifyNoLocalManifest];
        }

        match self.state {
            UpdateState::Unknown | UpdateState::PredownloadVersion => {
                if facts.has_version_url {
                    self.state = UpdateState::DownloadingVersion;
                    vec![Effect::FetchVersion]
                } else {
                    self.state = UpdateState::PredownloadManifest;
                    vec![Effect::Reenter(Input::CheckUpdate)]
                }
            }
            UpdateState::VersionLoaded => vec![Effect::ParseVersion],
            UpdateState::PredownloadManifest => {
                if facts.has_manifest_url {
                    self.state = UpdateState::DownloadingManifest;
                    vec![Effect::FetchManifest]
                } else {
                    self.state = UpdateState::Unknown;
                    self.pending_update = false;
                    vec![
                        Effect::ClearRemote,
                        Effect::Notify(UpdateEvent::Error {
                            code: UpdateErrorCode::NoManifestUrl,
                            message: "local manifest has no remote manifest url".to_string(),
                            asset_id: None,
                        }),
                    ]
                }
            }
            UpdateState::ManifestLoaded => vec![Effect::ParseManifest],
            UpdateState::UpToDate => vec![Effect::Notify(UpdateEvent::AlreadyUpToDate)],
            UpdateState::NeedUpdate => vec![Effect::Notify(UpdateEvent::NewVersionFound)],
            UpdateState::DownloadingVersion
            | UpdateState::DownloadingManifest
            | UpdateState::Updating
            | UpdateState::Checking => Vec::new(),
        }
    }

    fn update(&mut self, facts: &Facts) -> Vec<Effect> {
        if !facts.local_loaded {
            return vec![Effect::NotifyNoLocalManifest];
        }

        match self.state {
            UpdateState::UpToDate => Vec::new(),
            UpdateState::Updating => {
                if facts.batch_settled_with_failures {
                    vec![Effect::RetryFailed]
                } else {
                    Vec::new()
                }
            }
            UpdateState::NeedUpdate => {
                if facts.remote_loaded {
                    self.pending_update = false;
                    vec![Effect::ComputeDiff]
                } else {
                    self.pending_update = true;
                    self.state = UpdateState::PredownloadManifest;
                    vec![Effect::Reenter(Input::CheckUpdate)]
                }
            }
            _ => {
                self.pending_update = true;
                vec![Effect::Reenter(Input::CheckUpdate)]
            }
        }
    }

    fn fetched(&mut self, expected: UpdateState) -> Vec<Effect> {
        if self.state != expected {
            return Vec::new();
        }
        self.state = match expected {
            UpdateState::DownloadingVersion => UpdateState::VersionLoaded,
            _ => UpdateState::ManifestLoaded,
        };
        vec![Effect::Reenter(Input::CheckUpdate)]
    }

    fn fetch_failed(
        &mut self,
        expected: UpdateState,
        rollback: UpdateState,
        unit_id: &str,
        error: DownloadError,
    ) -> Vec<Effect> {
        if self.state != expected {
            return Vec::new();
        }
        self.state = rollback;
        self.pending_update = false;
        vec![
            Effect::ClearRemote,
            Effect::Notify(UpdateEvent::Error {
                code: error.code.into(),
                message: error.message,
                asset_id: Some(unit_id.to_string()),
            }),
        ]
    }

    fn version_parsed(&mut self, outcome: Comparison) -> Vec<Effect> {
        if self.state != UpdateState::VersionLoaded {
            return Vec::new();
        }
        match outcome {
            Comparison::Invalid(message) => {
                // The version file only short-cuts the check; fall back to
                // the full manifest but still report the parse failure.
                self.state = UpdateState::PredownloadManifest;
                vec![
                    Effect::Notify(UpdateEvent::Error {
                        code: UpdateErrorCode::Parse,
                        message,
                        asset_id: Some(VERSION_ID.to_string()),
                    }),
                    Effect::Reenter(Input::CheckUpdate),
                ]
            }
            Comparison::Same => self.up_to_date(),
            Comparison::Differs => {
                self.state = UpdateState::NeedUpdate;
                let mut effects = vec![Effect::Notify(UpdateEvent::NewVersionFound)];
                if self.pending_update {
                    self.state = UpdateState::PredownloadManifest;
                    effects.push(Effect::Reenter(Input::CheckUpdate));
                }
                effects
            }
        }
    }

    fn manifest_parsed(&mut self, outcome: Comparison) -> Vec<Effect> {
        if self.state != UpdateState::ManifestLoaded {
            return Vec::new();
        }
        match outcome {
            Comparison::Invalid(message) => {
                self.state = UpdateState::Unknown;
                self.pending_update = false;
                vec![
                    Effect::ClearRemote,
                    Effect::Notify(UpdateEvent::Error {
                        code: UpdateErrorCode::Parse,
                        message,
                        asset_id: Some(MANIFEST_ID.to_string()),
                    }),
                ]
            }
            Comparison::Same => self.up_to_date(),
            Comparison::Differs => {
                self.state = UpdateState::NeedUpdate;
                let mut effects = vec![Effect::Notify(UpdateEvent::NewVersionFound)];
                if self.pending_update {
                    effects.push(Effect::Reenter(Input::Update));
                }
                effects
            }
        }
    }

    fn up_to_date(&mut self) -> Vec<Effect> {
        self.state = UpdateState::UpToDate;
        self.pending_update = false;
        vec![
            Effect::ClearRemote,
            Effect::Notify(UpdateEvent::AlreadyUpToDate),
        ]
    }

    fn diff_computed(&mut self, downloads: usize, deletions: usize) -> Vec<Effect> {
        if self.state != UpdateState::NeedUpdate {
            return Vec::new();
        }
        if downloads == 0 && deletions == 0 {
            // Versions differ but every asset matches: adopt the remote
            // manifest so the next check does not find the same difference.
            self.state = UpdateState::UpToDate;
            return vec![
                Effect::Promote,
                Effect::Notify(UpdateEvent::AlreadyUpToDate),
            ];
        }

        self.state = UpdateState::Updating;
        let mut effects = vec![Effect::LaunchBatch];
        if downloads == 0 {
            effects.push(Effect::Reenter(Input::BatchComplete));
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> Facts {
        Facts {
            local_loaded: true,
            has_version_url: true,
            has_manifest_url: true,
            remote_loaded: false,
            batch_settled_with_failures: false,
        }
    }

    fn network(message: &str) -> DownloadError {
        DownloadError::network(message)
    }

    #[test]
    fn test_check_update_fetches_version() {
        let mut machine = UpdateMachine::new();
        let effects = machine.step(Input::CheckUpdate, &facts());

        assert_eq!(effects, vec![Effect::FetchVersion]);
        assert_eq!(machine.state(), UpdateState::DownloadingVersion);
    }

    #[test]
    fn test_check_update_without_version_url_skips_to_manifest() {
        let mut machine = UpdateMachine::new();
        let facts = Facts {
            has_version_url: false,
            ..facts()
        };

        let effects = machine.step(Input::CheckUpdate, &facts);
        assert_eq!(effects, vec![Effect::Reenter(Input::CheckUpdate)]);
        assert_eq!(machine.state(), UpdateState::PredownloadManifest);

        let effects = machine.step(Input::CheckUpdate, &facts);
        assert_eq!(effects, vec![Effect::FetchManifest]);
        assert_eq!(machine.state(), UpdateState::DownloadingManifest);
    }

    #[test]
    fn test_check_update_without_any_url_falls_back_to_unknown() {
        let mut machine = UpdateMachine::in_state(UpdateState::PredownloadManifest);
        let facts = Facts {
            has_version_url: false,
            has_manifest_url: false,
            ..facts()
        };

        let effects = machine.step(Input::CheckUpdate, &facts);

        assert_eq!(machine.state(), UpdateState::Unknown);
        assert_eq!(effects[0], Effect::ClearRemote);
        assert!(matches!(
            &effects[1],
            Effect::Notify(UpdateEvent::Error {
                code: UpdateErrorCode::NoManifestUrl,
                ..
            })
        ));
    }

    #[test]
    fn test_no_local_manifest_aborts() {
        let mut machine = UpdateMachine::new();
        let facts = Facts {
            local_loaded: false,
            ..facts()
        };

        for input in [Input::CheckUpdate, Input::Update] {
            let effects = machine.step(input, &facts);
            assert_eq!(effects, vec![Effect::NotifyNoLocalManifest]);
            assert_eq!(machine.state(), UpdateState::Unknown);
            assert!(!machine.pending_update());
        }
    }

    #[test]
    fn test_version_fetched_then_parsed_same() {
        let mut machine = UpdateMachine::in_state(UpdateState::DownloadingVersion);

        let effects = machine.step(Input::VersionFetched, &facts());
        assert_eq!(effects, vec![Effect::Reenter(Input::CheckUpdate)]);
        assert_eq!(machine.state(), UpdateState::VersionLoaded);

        let effects = machine.step(Input::CheckUpdate, &facts());
        assert_eq!(effects, vec![Effect::ParseVersion]);

        let effects = machine.step(Input::VersionParsed(Comparison::Same), &facts());
        assert_eq!(machine.state(), UpdateState::UpToDate);
        assert!(effects.contains(&Effect::Notify(UpdateEvent::AlreadyUpToDate)));
    }

    #[test]
    fn test_version_differs_without_pending_stops_at_need_update() {
        let mut machine = UpdateMachine::in_state(UpdateState::VersionLoaded);
        let effects = machine.step(Input::VersionParsed(Comparison::Differs), &facts());

        assert_eq!(machine.state(), UpdateState::NeedUpdate);
        assert_eq!(
            effects,
            vec![Effect::Notify(UpdateEvent::NewVersionFound)]
        );
    }

    #[test]
    fn test_version_differs_with_pending_advances_to_manifest() {
        let mut machine = UpdateMachine {
            state: UpdateState::VersionLoaded,
            pending_update: true,
        };
        let effects = machine.step(Input::VersionParsed(Comparison::Differs), &facts());

        assert_eq!(machine.state(), UpdateState::PredownloadManifest);
        assert_eq!(
            effects,
            vec![
                Effect::Notify(UpdateEvent::NewVersionFound),
                Effect::Reenter(Input::CheckUpdate),
            ]
        );
    }

    #[test]
    fn test_invalid_version_file_reports_parse_error_and_falls_back() {
        let mut machine = UpdateMachine::in_state(UpdateState::VersionLoaded);
        let effects = machine.step(
            Input::VersionParsed(Comparison::Invalid("bad json".into())),
            &facts(),
        );

        assert_eq!(machine.state(), UpdateState::PredownloadManifest);
        assert_eq!(
            effects,
            vec![
                Effect::Notify(UpdateEvent::Error {
                    code: UpdateErrorCode::Parse,
                    message: "bad json".into(),
                    asset_id: Some(VERSION_ID.to_string()),
                }),
                Effect::Reenter(Input::CheckUpdate),
            ]
        );
    }

    #[test]
    fn test_version_fetch_failure_rolls_back_and_clears() {
        let mut machine = UpdateMachine {
            state: UpdateState::DownloadingVersion,
            pending_update: true,
        };
        let effects = machine.step(Input::VersionFetchFailed(network("timeout")), &facts());

        assert_eq!(machine.state(), UpdateState::PredownloadVersion);
        assert!(!machine.pending_update());
        assert_eq!(effects[0], Effect::ClearRemote);
        assert_eq!(
            effects[1],
            Effect::Notify(UpdateEvent::Error {
                code: UpdateErrorCode::Network,
                message: "timeout".into(),
                asset_id: Some(VERSION_ID.into()),
            })
        );

        // A later check starts over from the version file.
        let effects = machine.step(Input::CheckUpdate, &facts());
        assert_eq!(effects, vec![Effect::FetchVersion]);
    }

    #[test]
    fn test_manifest_fetch_failure_rolls_back() {
        let mut machine = UpdateMachine::in_state(UpdateState::DownloadingManifest);
        let effects = machine.step(Input::ManifestFetchFailed(network("reset")), &facts());

        assert_eq!(machine.state(), UpdateState::PredownloadManifest);
        assert_eq!(effects[0], Effect::ClearRemote);

        let effects = machine.step(Input::CheckUpdate, &facts());
        assert_eq!(effects, vec![Effect::FetchManifest]);
    }

    #[test]
    fn test_manifest_parse_failure_goes_unknown_with_error() {
        let mut machine = UpdateMachine {
            state: UpdateState::ManifestLoaded,
            pending_update: true,
        };
        let effects = machine.step(
            Input::ManifestParsed(Comparison::Invalid("not an object".into())),
            &facts(),
        );

        assert_eq!(machine.state(), UpdateState::Unknown);
        assert!(!machine.pending_update());
        assert!(matches!(
            &effects[1],
            Effect::Notify(UpdateEvent::Error {
                code: UpdateErrorCode::Parse,
                ..
            })
        ));
    }

    #[test]
    fn test_manifest_differs_with_pending_reenters_update() {
        let mut machine = UpdateMachine {
            state: UpdateState::ManifestLoaded,
            pending_update: true,
        };
        let effects = machine.step(Input::ManifestParsed(Comparison::Differs), &facts());

        assert_eq!(machine.state(), UpdateState::NeedUpdate);
        assert_eq!(effects.last(), Some(&Effect::Reenter(Input::Update)));

        let loaded = Facts {
            remote_loaded: true,
            ..facts()
        };
        let effects = machine.step(Input::Update, &loaded);
        assert_eq!(effects, vec![Effect::ComputeDiff]);
        assert!(!machine.pending_update());
    }

    #[test]
    fn test_update_from_unknown_sets_pending() {
        let mut machine = UpdateMachine::new();
        let effects = machine.step(Input::Update, &facts());

        assert!(machine.pending_update());
        assert_eq!(effects, vec![Effect::Reenter(Input::CheckUpdate)]);
    }

    #[test]
    fn test_update_in_need_update_without_remote_fetches_manifest() {
        let mut machine = UpdateMachine::in_state(UpdateState::NeedUpdate);
        let effects = machine.step(Input::Update, &facts());

        assert!(machine.pending_update());
        assert_eq!(machine.state(), UpdateState::PredownloadManifest);
        assert_eq!(effects, vec![Effect::Reenter(Input::CheckUpdate)]);
    }

    #[test]
    fn test_diff_with_downloads_launches_batch() {
        let mut machine = UpdateMachine::in_state(UpdateState::NeedUpdate);
        let effects = machine.step(
            Input::DiffComputed {
                downloads: 2,
                deletions: 0,
            },
            &facts(),
        );

        assert_eq!(machine.state(), UpdateState::Updating);
        assert_eq!(effects, vec![Effect::LaunchBatch]);
    }

    #[test]
    fn test_deletions_only_passes_through_updating() {
        let mut machine = UpdateMachine::in_state(UpdateState::NeedUpdate);
        let effects = machine.step(
            Input::DiffComputed {
                downloads: 0,
                deletions: 1,
            },
            &facts(),
        );

        assert_eq!(machine.state(), UpdateState::Updating);
        assert_eq!(
            effects,
            vec![Effect::LaunchBatch, Effect::Reenter(Input::BatchComplete)]
        );

        let effects = machine.step(Input::BatchComplete, &facts());
        assert_eq!(machine.state(), UpdateState::UpToDate);
        assert_eq!(
            effects,
            vec![Effect::Promote, Effect::Notify(UpdateEvent::UpdateFinished)]
        );
    }

    #[test]
    fn test_empty_diff_promotes_without_batch() {
        let mut machine = UpdateMachine::in_state(UpdateState::NeedUpdate);
        let effects = machine.step(
            Input::DiffComputed {
                downloads: 0,
                deletions: 0,
            },
            &facts(),
        );

        assert_eq!(machine.state(), UpdateState::UpToDate);
        assert_eq!(
            effects,
            vec![Effect::Promote, Effect::Notify(UpdateEvent::AlreadyUpToDate)]
        );
    }

    #[test]
    fn test_asset_events_only_while_updating() {
        let mut machine = UpdateMachine::in_state(UpdateState::Updating);
        let effects = machine.step(
            Input::AssetDownloaded {
                asset_id: "a".into(),
                percent: 50,
            },
            &facts(),
        );
        assert_eq!(
            effects,
            vec![
                Effect::Notify(UpdateEvent::AssetLoaded {
                    asset_id: "a".into()
                }),
                Effect::Notify(UpdateEvent::UpdatingProgress { percent: 50 }),
            ]
        );

        let mut idle = UpdateMachine::in_state(UpdateState::UpToDate);
        let effects = idle.step(
            Input::AssetFailed {
                asset_id: "a".into(),
                error: network("x"),
            },
            &facts(),
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn test_update_while_updating_retries_only_when_settled() {
        let mut machine = UpdateMachine::in_state(UpdateState::Updating);
        assert!(machine.step(Input::Update, &facts()).is_empty());

        let settled = Facts {
            batch_settled_with_failures: true,
            ..facts()
        };
        assert_eq!(machine.step(Input::Update, &settled), vec![Effect::RetryFailed]);
        assert_eq!(machine.state(), UpdateState::Updating);
    }

    #[test]
    fn test_up_to_date_is_idempotent() {
        let mut machine = UpdateMachine::in_state(UpdateState::UpToDate);

        for _ in 0..2 {
            let effects = machine.step(Input::CheckUpdate, &facts());
            assert_eq!(effects, vec![Effect::Notify(UpdateEvent::AlreadyUpToDate)]);
            assert_eq!(machine.state(), UpdateState::UpToDate);
        }
        assert!(machine.step(Input::Update, &facts()).is_empty());
    }

    #[test]
    fn test_stray_inputs_are_ignored() {
        let mut machine = UpdateMachine::in_state(UpdateState::UpToDate);
        let stray = [
            Input::VersionFetched,
            Input::ManifestFetched,
            Input::VersionFetchFailed(network("x")),
            Input::ManifestParsed(Comparison::Differs),
            Input::DiffComputed {
                downloads: 1,
                deletions: 0,
            },
            Input::BatchComplete,
        ];
        for input in stray {
            assert!(machine.step(input, &facts()).is_empty());
            assert_eq!(machine.state(), UpdateState::UpToDate);
        }
    }

    #[test]
    fn test_reported_state() {
        assert_eq!(UpdateState::DownloadingVersion.reported(), UpdateState::Checking);
        assert_eq!(UpdateState::ManifestLoaded.reported(), UpdateState::Checking);
        assert_eq!(UpdateState::NeedUpdate.reported(), UpdateState::NeedUpdate);
        assert_eq!(UpdateState::Unknown.reported(), UpdateState::Unknown);
        assert_eq!(UpdateState::Updating.to_string(), "UPDATING");
    }
}
