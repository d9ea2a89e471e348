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

use crate::grid::{GridState, Note, STEPS};
use crate::instrument::InstrumentType;
use crate::preview::Preview;
use crate::session::Session;
use crate::store::{SampleId, SampleRecord, Store, StoreError};
use crate::sync::{LoadTicket, Loaded, Loader, SyncError};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("The sample is still loading")]
    NotReady,

    #[error("A sample needs a name before it can be saved")]
    EmptyName,

    #[error("Step {0} is out of range for a 16 step pattern")]
    StepOutOfRange(usize),

    #[error("The store did not assign an id to the new sample")]
    NoIdAssigned,

    #[error("Unable to save sample: {0}")]
    Store(#[from] StoreError),
}

/// The sample being edited.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Draft {
    /// None until the sample has been saved once.
    pub id: Option<SampleId>,
    pub name: String,
    pub grid: GridState,
    pub instrument: InstrumentType,
}

/// Whether the editor has something to show. Nothing grid-derived exists while loading.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorState {
    Loading { ticket: LoadTicket },
    Ready(Draft),
}

/// What became of a load response.
#[derive(Debug)]
pub enum Applied {
    /// The stored sample is being edited.
    Ready,
    /// The defaults are being edited because the sample couldn't be loaded.
    Recovered(SyncError),
    /// A newer load was started since, so the response was dropped.
    Stale,
}

/// Edits one sample at a time: the grid, its instrument and name, previewing it and saving
/// it back to the store.
pub struct Editor {
    preview: Arc<Preview>,
    state: EditorState,
    /// The latest load issued. Only its response is applied.
    latest: LoadTicket,
    span: Span,
}

impl Editor {
    /// Creates an editor for a new, empty sample.
    pub fn new(preview: Arc<Preview>, instrument: InstrumentType) -> Editor {
        let editor = Editor {
            preview,
            state: EditorState::Ready(Draft {
                instrument,
                ..Default::default()
            }),
            latest: LoadTicket::first(None),
            span: span!(Level::INFO, "editor"),
        };
        editor.arrange();
        editor
    }

    /// Loads the given sample into the editor, or a new sample if there is no id.
    pub async fn open<S: Store>(&mut self, loader: &Loader<S>, id: Option<SampleId>) -> Applied {
        let ticket = self.begin_load(id);
        let loaded = loader.load(id).await;
        self.apply(ticket, loaded)
    }

    /// Marks the editor as loading the given sample and returns the ticket its response must
    /// carry. Any load already in flight is superseded.
    pub fn begin_load(&mut self, id: Option<SampleId>) -> LoadTicket {
        let ticket = self.latest.next(id);
        self.latest = ticket;
        self.state = EditorState::Loading { ticket };
        debug!(
            parent: &self.span,
            sample_id = id.map(|id| id.0),
            generation = ticket.generation(),
            "Loading."
        );
        ticket
    }

    /// Applies a load response if it answers the latest request.
    pub fn apply(&mut self, ticket: LoadTicket, loaded: Loaded) -> Applied {
        if ticket != self.latest {
            info!(
                parent: &self.span,
                sample_id = ticket.target().map(|id| id.0),
                generation = ticket.generation(),
                "Discarding stale load response."
            );
            return Applied::Stale;
        }

        self.state = EditorState::Ready(Draft {
            id: loaded.id,
            name: loaded.name,
            grid: loaded.grid,
            instrument: loaded.instrument,
        });
        self.arrange();

        match loaded.error {
            Some(e) => Applied::Recovered(e),
            None => Applied::Ready,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// The sample being edited, once loaded.
    pub fn draft(&self) -> Option<&Draft> {
        match &self.state {
            EditorState::Ready(draft) => Some(draft),
            EditorState::Loading { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EditorState::Ready(_))
    }

    /// Flips one cell. A cell switched on is sounded right away with the current instrument.
    /// Returns the new state of the cell.
    pub fn toggle(&mut self, note: Note, step: usize) -> Result<bool, EditorError> {
        if step >= STEPS {
            return Err(EditorError::StepOutOfRange(step));
        }
        let draft = self.draft_mut()?;
        draft.grid = draft.grid.toggle(note, step);
        let enabled = draft.grid.is_enabled(note, step);
        let instrument = draft.instrument;

        self.arrange();
        if enabled {
            self.preview.audition(instrument, note.pitch());
        }
        Ok(enabled)
    }

    /// Switches the instrument the sample plays with.
    pub fn set_instrument(&mut self, instrument: InstrumentType) -> Result<(), EditorError> {
        self.draft_mut()?.instrument = instrument;
        self.arrange();
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), EditorError> {
        self.draft_mut()?.name = name.to_string();
        Ok(())
    }

    /// Starts previewing the sample, superseding any preview already playing.
    pub fn preview(&self) -> Result<Session, EditorError> {
        let draft = self.draft().ok_or(EditorError::NotReady)?;
        Ok(self.preview.start(&draft.grid, draft.instrument))
    }

    /// Stops the preview, if one is playing.
    pub fn stop_preview(&self) {
        self.preview.stop();
    }

    /// Saves the sample. The first save creates it and the editor adopts the new id, later
    /// saves overwrite it. Returns the sample's id.
    pub async fn save<S: Store>(&mut self, store: &S) -> Result<SampleId, EditorError> {
        let draft = self.draft().ok_or(EditorError::NotReady)?;
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(EditorError::EmptyName);
        }

        let record = SampleRecord {
            id: None,
            name: name.to_string(),
            instrument_type: Some(draft.instrument.as_str().to_string()),
            recording_data: Some(draft.grid.to_recording_data()),
            datetime: None,
        };

        let result = match draft.id {
            Some(id) => match store.update_sample(id, &record).await {
                Ok(_) => Ok(id),
                Err(e) => Err(EditorError::from(e)),
            },
            None => match store.create_sample(&record).await {
                Ok(created) => created.id.ok_or(EditorError::NoIdAssigned),
                Err(e) => Err(EditorError::from(e)),
            },
        };

        let id = match result {
            Ok(id) => id,
            Err(e) => {
                warn!(parent: &self.span, err = %e, "Save failed.");
                return Err(e);
            }
        };

        // The draft may have been reloaded while the save was in flight.
        if let EditorState::Ready(draft) = &mut self.state {
            draft.id = Some(id);
        }
        info!(parent: &self.span, sample_id = id.0, "Sample saved.");
        Ok(id)
    }

    fn draft_mut(&mut self) -> Result<&mut Draft, EditorError> {
        match &mut self.state {
            EditorState::Ready(draft) => Ok(draft),
            EditorState::Loading { .. } => Err(EditorError::NotReady),
        }
    }

    /// Brings the engine's schedule in line with the draft.
    fn arrange(&self) {
        if let Some(draft) = self.draft() {
            self.preview.arrange(&draft.grid, draft.instrument);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::engine::{mock, Engine as _};
    use crate::grid::{GridState, Note};
    use crate::instrument::InstrumentType;
    use crate::preview::Preview;
    use crate::store::{memory, SampleId, Store as _};
    use crate::sync::{Loaded, Loader};

    use super::{Applied, Editor, EditorError, EditorState};

    fn setup() -> (mock::Engine, memory::Store, Editor) {
        let engine = mock::Engine::get("mock-engine");
        let preview = Arc::new(Preview::new(Arc::new(engine.clone())));
        let editor = Editor::new(preview, InstrumentType::Guitar);
        (engine, memory::Store::new(), editor)
    }

    fn loaded(id: i64, grid: GridState) -> Loaded {
        Loaded {
            id: Some(SampleId(id)),
            name: format!("sample {}", id),
            grid,
            instrument: InstrumentType::Piano,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_open_existing_sample() {
        let (engine, store, mut editor) = setup();
        let grid = GridState::default().toggle(Note::G, 2);
        let id = store
            .add_raw_sample("riff", Some("frenchhorn"), Some(&grid.to_recording_data()))
            .await;
        let loader = Loader::new(Arc::new(store.clone()), InstrumentType::Guitar);

        assert!(matches!(editor.open(&loader, Some(id)).await, Applied::Ready));
        let draft = editor.draft().expect("editor is ready");
        assert_eq!(grid, draft.grid);
        assert_eq!(InstrumentType::FrenchHorn, draft.instrument);
        assert_eq!(1, engine.scheduled().len());
    }

    #[tokio::test]
    async fn test_open_failure_recovers_with_defaults() {
        let (_, store, mut editor) = setup();
        store.set_unavailable(true).await;
        let loader = Loader::new(Arc::new(store.clone()), InstrumentType::Guitar);

        let applied = editor.open(&loader, Some(SampleId(3))).await;
        assert!(matches!(applied, Applied::Recovered(e) if e.is_network()));
        assert!(editor.is_ready());
        assert!(editor.draft().is_some_and(|d| d.grid.is_empty()));
    }

    #[test]
    fn test_out_of_order_responses() {
        let (_, _, mut editor) = setup();

        let first = editor.begin_load(Some(SampleId(1)));
        let second = editor.begin_load(Some(SampleId(2)));
        assert!(!editor.is_ready());

        let newer = GridState::default().toggle(Note::D, 1);
        assert!(matches!(editor.apply(second, loaded(2, newer)), Applied::Ready));

        // The slower response for the first sample turns up afterwards.
        let older = GridState::default().toggle(Note::B, 15);
        assert!(matches!(editor.apply(first, loaded(1, older)), Applied::Stale));

        let draft = editor.draft().expect("editor is ready");
        assert_eq!(Some(SampleId(2)), draft.id);
        assert_eq!(newer, draft.grid);
    }

    #[test]
    fn test_not_ready_while_loading() {
        let (engine, _, mut editor) = setup();
        editor.begin_load(Some(SampleId(1)));

        assert!(matches!(editor.state(), EditorState::Loading { .. }));
        assert!(matches!(editor.toggle(Note::C, 0), Err(EditorError::NotReady)));
        assert!(matches!(
            editor.set_instrument(InstrumentType::Drums),
            Err(EditorError::NotReady)
        ));
        assert!(matches!(editor.preview(), Err(EditorError::NotReady)));
        assert!(engine.triggered().is_empty());
    }

    #[test]
    fn test_toggle_out_of_range() {
        let (engine, _, mut editor) = setup();

        assert!(matches!(
            editor.toggle(Note::C, 16),
            Err(EditorError::StepOutOfRange(16))
        ));
        assert!(editor.draft().is_some_and(|d| d.grid.is_empty()));
        assert!(engine.triggered().is_empty());
    }

    #[test]
    fn test_toggle_auditions_and_reschedules() -> Result<(), EditorError> {
        let (engine, _, mut editor) = setup();

        assert!(editor.toggle(Note::A, 4)?);
        assert_eq!(1, engine.triggered().len());
        assert_eq!(1, engine.scheduled().len());

        // Switching off is silent.
        assert!(!editor.toggle(Note::A, 4)?);
        assert_eq!(1, engine.triggered().len());
        assert!(engine.scheduled().is_empty());

        editor.toggle(Note::C, 0)?;
        editor.set_instrument(InstrumentType::Drums)?;
        let scheduled = engine.scheduled();
        assert_eq!(1, scheduled.len());
        assert_eq!(InstrumentType::Drums, scheduled[0].instrument);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_creates_then_updates() -> Result<(), EditorError> {
        let (_, store, mut editor) = setup();

        assert!(matches!(
            editor.save(&store).await,
            Err(EditorError::EmptyName)
        ));

        editor.set_name("  first riff ")?;
        editor.toggle(Note::E, 8)?;
        let id = editor.save(&store).await?;
        assert_eq!(Some(id), editor.draft().and_then(|d| d.id));

        editor.toggle(Note::F, 9)?;
        assert_eq!(id, editor.save(&store).await?);

        let samples = store.list_samples().await?;
        assert_eq!(1, samples.len());
        assert_eq!("first riff", samples[0].name);
        assert_eq!(Some("guitar"), samples[0].instrument_type.as_deref());

        let stored = GridState::parse(samples[0].recording_data.as_deref().unwrap_or_default())
            .expect("stored grid parses");
        assert!(stored.is_enabled(Note::E, 8));
        assert!(stored.is_enabled(Note::F, 9));
        Ok(())
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() -> Result<(), EditorError> {
        let (_, store, mut editor) = setup();
        editor.set_name("riff")?;
        store.set_unavailable(true).await;

        assert!(matches!(
            editor.save(&store).await,
            Err(EditorError::Store(_))
        ));
        assert!(editor.draft().is_some_and(|d| d.id.is_none()));
        Ok(())
    }

    #[test]
    fn test_preview_from_editor() -> Result<(), EditorError> {
        let (engine, _, mut editor) = setup();
        editor.toggle(Note::C, 0)?;

        let session = editor.preview()?;
        assert!(engine.is_running());
        editor.stop_preview();
        assert!(!session.is_running());
        Ok(())
    }
}
