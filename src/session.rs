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
use std::sync::{Arc, Condvar, Mutex};

/// How a preview session ended, if it has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// The session is still playing.
    Running,
    /// The pattern played to the end and the session stopped itself.
    Finished,
    /// The session was stopped by hand or superseded by another session.
    Cancelled,
}

/// A handle to one preview session. Every armed auto-stop carries the id of the session that
/// armed it, so a callback that outlives its session can be recognized and ignored.
#[derive(Clone)]
pub struct Session {
    id: u64,
    state: Arc<Mutex<SessionState>>,
    condvar: Arc<Condvar>,
}

impl Session {
    /// Creates a new running session.
    pub fn new(id: u64) -> Session {
        Session {
            id,
            state: Arc::new(Mutex::new(SessionState::Running)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// The session id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The current state of the session.
    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("Error getting lock")
    }

    /// Returns true if the session is still running.
    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Marks the session as played to the end.
    pub fn finish(&self) {
        self.end(SessionState::Finished);
    }

    /// Marks the session as cancelled.
    pub fn cancel(&self) {
        self.end(SessionState::Cancelled);
    }

    /// Moves a running session to its final state. Ended sessions stay as they are.
    fn end(&self, end_state: SessionState) {
        let mut state = self.state.lock().expect("Error getting lock");
        if *state == SessionState::Running {
            *state = end_state;
            self.condvar.notify_all();
        }
    }

    /// Blocks until the session ends and returns how it ended.
    pub fn wait(&self) -> SessionState {
        *self
            .condvar
            .wait_while(self.state.lock().expect("Error getting lock"), |state| {
                *state == SessionState::Running
            })
            .expect("Error getting lock")
    }
}
