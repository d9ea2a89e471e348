// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;

use tracing::{debug, info, span, warn, Level, Span};

use crate::grid::GridState;
use crate::instrument::InstrumentType;
use crate::store::{SampleId, Store, StoreError};

/// Why a load fell back to defaults.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Unable to fetch sample: {0}")]
    Store(#[from] StoreError),

    #[error("Stored recording data is malformed: {0}")]
    MalformedRecording(#[source] serde_json::Error),
}

impl SyncError {
    /// True if the store couldn't be reached or refused the request.
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Store(e) if e.is_network())
    }

    /// True if the sample arrived but couldn't be read.
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            SyncError::MalformedRecording(_) | SyncError::Store(StoreError::Parse(_))
        )
    }
}

/// The result of a load. Always usable: on failure the grid and instrument are the defaults
/// and the error says what went wrong.
#[derive(Debug)]
pub struct Loaded {
    /// The sample the grid belongs to. None for a new sample, or when nothing could be fetched.
    pub id: Option<SampleId>,
    pub name: String,
    pub grid: GridState,
    pub instrument: InstrumentType,
    /// The recoverable failure, if the defaults were used in place of stored data.
    pub error: Option<SyncError>,
}

/// Identifies one load request. A response is only applied if its ticket is still the
/// latest one issued, so a slow response for a sample the user has since navigated away
/// from is dropped rather than overwriting the newer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    target: Option<SampleId>,
    generation: u64,
}

impl LoadTicket {
    /// The first ticket for a view.
    pub fn first(target: Option<SampleId>) -> LoadTicket {
        LoadTicket {
            target,
            generation: 1,
        }
    }

    /// The ticket that supersedes this one.
    pub fn next(&self, target: Option<SampleId>) -> LoadTicket {
        LoadTicket {
            target,
            generation: self.generation + 1,
        }
    }

    /// The sample being loaded.
    pub fn target(&self) -> Option<SampleId> {
        self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Loads samples from the store into editable grid state.
pub struct Loader<S: Store> {
    store: Arc<S>,
    default_instrument: InstrumentType,
    span: Span,
}

impl<S: Store> Loader<S> {
    /// Creates a loader that falls back to the given instrument.
    pub fn new(store: Arc<S>, default_instrument: InstrumentType) -> Loader<S> {
        Loader {
            store,
            default_instrument,
            span: span!(Level::INFO, "loader"),
        }
    }

    /// The state for a brand new sample. Needs no store access.
    pub fn defaults(&self) -> Loaded {
        Loaded {
            id: None,
            name: String::new(),
            grid: GridState::default(),
            instrument: self.default_instrument,
            error: None,
        }
    }

    /// Loads the given sample, or the defaults if there is no id. Fetches the sample exactly
    /// once. Failures never escape: they come back as defaults plus the error.
    pub async fn load(&self, id: Option<SampleId>) -> Loaded {
        let Some(id) = id else {
            return self.defaults();
        };

        let record = match self.store.get_sample(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    parent: &self.span,
                    sample_id = id.0,
                    err = %e,
                    "Unable to load sample, using defaults."
                );
                return Loaded {
                    error: Some(e.into()),
                    ..self.defaults()
                };
            }
        };

        let grid = match record.recording_data.as_deref() {
            Some(recording_data) => match GridState::parse(recording_data) {
                Ok(grid) => grid,
                Err(e) => {
                    warn!(
                        parent: &self.span,
                        sample_id = id.0,
                        err = %e,
                        "Malformed recording data, using defaults."
                    );
                    return Loaded {
                        id: Some(id),
                        name: record.name,
                        error: Some(SyncError::MalformedRecording(e)),
                        ..self.defaults()
                    };
                }
            },
            None => {
                debug!(parent: &self.span, sample_id = id.0, "Sample has no recording data.");
                GridState::default()
            }
        };
        let instrument = InstrumentType::from_type_str(record.instrument_type.as_deref());

        info!(
            parent: &self.span,
            sample_id = id.0,
            instrument = instrument.as_str(),
            "Sample loaded."
        );
        Loaded {
            id: Some(id),
            name: record.name,
            grid,
            instrument,
            error: None,
        }
    }
}
