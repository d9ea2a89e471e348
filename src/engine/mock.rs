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
use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use crate::grid::Pitch;
use crate::instrument::InstrumentType;

use super::{Callback, Trigger};

/// A note as it was handed to the mock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledNote {
    pub instrument: InstrumentType,
    pub pitch: Pitch,
    pub start_beat: f64,
}

#[derive(Default)]
struct State {
    notes: Vec<ScheduledNote>,
    one_shots: Vec<(f64, Callback)>,
    /// Callbacks that were cancelled but are still delivered by `deliver_late`.
    late: Vec<Callback>,
    running: bool,
    position: f64,
    triggered: Vec<Trigger>,
    clear_calls: usize,
    start_calls: usize,
}

/// A mock engine. Its clock only moves when told to, and nothing is audible.
#[derive(Clone)]
pub struct Engine {
    name: String,
    /// When set, cancelled callbacks are held for late delivery instead of dropped.
    keep_cancelled: bool,
    state: Arc<Mutex<State>>,
}

impl Engine {
    /// Gets the given mock engine.
    pub fn get(name: &str) -> Engine {
        Engine {
            name: name.to_string(),
            keep_cancelled: false,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Gets a mock engine that holds cancelled callbacks so they can still be fired late,
    /// the way a callback already in flight would be.
    pub fn get_with_late_callbacks(name: &str) -> Engine {
        Engine {
            keep_cancelled: true,
            ..Engine::get(name)
        }
    }

    /// Moves the clock forward, firing every callback that comes due in beat order. Does
    /// nothing while stopped.
    pub fn advance(&self, beats: f64) {
        let due = {
            let mut state = self.state.lock();
            if !state.running {
                return;
            }
            state.position += beats;

            let position = state.position;
            let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.one_shots)
                .into_iter()
                .partition(|(at, _)| *at <= position);
            state.one_shots = pending;
            due.sort_by(|(a, _), (b, _)| a.total_cmp(b));
            due
        };

        // Fire outside of the lock, callbacks are free to call back into the engine.
        for (_, callback) in due {
            callback();
        }
    }

    /// Fires every cancelled callback that was held back.
    pub fn deliver_late(&self) {
        let late = std::mem::take(&mut self.state.lock().late);
        for callback in late {
            callback();
        }
    }

    /// The notes currently scheduled.
    pub fn scheduled(&self) -> Vec<ScheduledNote> {
        self.state.lock().notes.clone()
    }

    /// The number of armed callbacks.
    pub fn pending_callbacks(&self) -> usize {
        self.state.lock().one_shots.len()
    }

    /// Notes sounded with trigger_now.
    pub fn triggered(&self) -> Vec<Trigger> {
        self.state.lock().triggered.clone()
    }

    /// How many times the schedule has been cleared.
    pub fn clear_calls(&self) -> usize {
        self.state.lock().clear_calls
    }

    /// How many times the transport has been started.
    pub fn start_calls(&self) -> usize {
        self.state.lock().start_calls
    }
}

impl super::Engine for Engine {
    fn schedule_note(&self, instrument: InstrumentType, pitch: Pitch, start_beat: f64) {
        self.state.lock().notes.push(ScheduledNote {
            instrument,
            pitch,
            start_beat,
        });
    }

    fn clear_schedule(&self) {
        let mut state = self.state.lock();
        state.notes.clear();
        state.clear_calls += 1;
    }

    fn now(&self) -> f64 {
        self.state.lock().position
    }

    fn start(&self) {
        let mut state = self.state.lock();
        state.running = true;
        state.start_calls += 1;
        debug!(engine = self.name, "Transport started.");
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.position = 0.0;
        debug!(engine = self.name, "Transport stopped.");
    }

    fn cancel_pending_callbacks(&self) {
        let mut state = self.state.lock();
        let cancelled = std::mem::take(&mut state.one_shots);
        if self.keep_cancelled {
            state
                .late
                .extend(cancelled.into_iter().map(|(_, callback)| callback));
        }
    }

    fn schedule_one_shot(&self, at_beat: f64, callback: Callback) {
        self.state.lock().one_shots.push((at_beat, callback));
    }

    fn trigger_now(&self, instrument: InstrumentType, pitch: Pitch) {
        self.state.lock().triggered.push(Trigger { instrument, pitch });
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
