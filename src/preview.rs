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
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, span, Level, Span};

use crate::engine::Engine;
use crate::grid::{GridState, Pitch};
use crate::instrument::InstrumentType;
use crate::session::Session;
use crate::timeline::{Arrangement, Timeline, PATTERN_BEATS};

/// Whether a preview is playing.
enum Status {
    Idle,
    Previewing(Session),
}

struct State {
    status: Status,
    arrangement: Arrangement,
    /// The id handed to the next session.
    next_session: u64,
}

/// Previews compiled timelines through the playback engine. The engine is a single shared
/// resource, so there should be exactly one of these per engine; every view that can play a
/// preview goes through it.
pub struct Preview {
    /// The engine to play through.
    engine: Arc<dyn Engine>,
    /// Preview state. Auto-stop callbacks reach it from the engine's side.
    state: Arc<Mutex<State>>,
    /// The logging span.
    span: Span,
}

impl Preview {
    /// Creates a new, idle preview controller.
    pub fn new(engine: Arc<dyn Engine>) -> Preview {
        Preview {
            engine,
            state: Arc::new(Mutex::new(State {
                status: Status::Idle,
                arrangement: Arrangement::default(),
                next_session: 1,
            })),
            span: span!(Level::INFO, "preview"),
        }
    }

    /// Makes the engine's schedule reflect the given grid and instrument. Nothing is touched
    /// if they haven't changed since the last call. Returns true if the schedule was replaced.
    pub fn arrange(&self, grid: &GridState, instrument: InstrumentType) -> bool {
        let _enter = self.span.enter();

        let mut state = self.state.lock();
        match state.arrangement.update(grid, instrument) {
            Some(timeline) => {
                timeline.schedule(self.engine.as_ref());
                debug!(
                    instrument = instrument.as_str(),
                    events = timeline.events().len(),
                    "Rescheduled timeline."
                );
                true
            }
            None => false,
        }
    }

    /// The timeline currently on the engine.
    pub fn timeline(&self) -> Timeline {
        self.state.lock().arrangement.timeline().clone()
    }

    /// Starts a preview of the given grid. Any preview already playing, from this view or
    /// another, is stopped first and its auto-stop disarmed. The returned session ends when
    /// the pattern has played once or the preview is stopped.
    pub fn start(&self, grid: &GridState, instrument: InstrumentType) -> Session {
        self.arrange(grid, instrument);

        let _enter = self.span.enter();
        let mut state = self.state.lock();

        if let Status::Previewing(previous) = &state.status {
            info!(session = previous.id(), "Superseding running preview.");
            previous.cancel();
        }

        // Rewind and drop whatever auto-stop the previous session armed.
        self.engine.stop();
        self.engine.cancel_pending_callbacks();

        let session = Session::new(state.next_session);
        state.next_session += 1;

        let auto_stop = {
            let engine = Arc::downgrade(&self.engine);
            let state = Arc::downgrade(&self.state);
            let id = session.id();
            Box::new(move || Preview::auto_stop(engine, state, id))
        };
        self.engine.schedule_one_shot(PATTERN_BEATS, auto_stop);
        self.engine.start();

        state.status = Status::Previewing(session.clone());
        info!(
            session = session.id(),
            instrument = instrument.as_str(),
            "Preview started."
        );
        session
    }

    /// Stops the running preview. Stopping while idle does nothing.
    pub fn stop(&self) {
        let _enter = self.span.enter();

        let mut state = self.state.lock();
        let session = match &state.status {
            Status::Previewing(session) => session.clone(),
            Status::Idle => {
                debug!("Preview is not active, nothing to stop.");
                return;
            }
        };

        self.engine.stop();
        self.engine.cancel_pending_callbacks();
        session.cancel();
        state.status = Status::Idle;
        info!(session = session.id(), "Preview stopped manually.");
    }

    /// Starts a preview if idle, otherwise stops the running one. Returns the new session if
    /// one was started.
    pub fn toggle(&self, grid: &GridState, instrument: InstrumentType) -> Option<Session> {
        if self.is_previewing() {
            self.stop();
            None
        } else {
            Some(self.start(grid, instrument))
        }
    }

    /// Returns true while a preview is playing.
    pub fn is_previewing(&self) -> bool {
        matches!(self.state.lock().status, Status::Previewing(_))
    }

    /// The running session, if there is one.
    pub fn session(&self) -> Option<Session> {
        match &self.state.lock().status {
            Status::Previewing(session) => Some(session.clone()),
            Status::Idle => None,
        }
    }

    /// Sounds a single note right away with the given instrument.
    pub fn audition(&self, instrument: InstrumentType, pitch: Pitch) {
        self.engine.trigger_now(instrument, pitch);
    }

    /// Runs when the transport reaches the end of the pattern. Only the session that armed the
    /// callback may be stopped by it.
    fn auto_stop(engine: Weak<dyn Engine>, state: Weak<Mutex<State>>, id: u64) {
        let (Some(engine), Some(state)) = (engine.upgrade(), state.upgrade()) else {
            return;
        };

        let mut state = state.lock();
        let current = matches!(&state.status, Status::Previewing(session) if session.id() == id);
        if !current {
            debug!(session = id, "Ignoring auto-stop for an ended session.");
            return;
        }

        engine.stop();
        if let Status::Previewing(session) = std::mem::replace(&mut state.status, Status::Idle) {
            session.finish();
        }
        info!(session = id, "Preview stopped automatically.");
    }
}
