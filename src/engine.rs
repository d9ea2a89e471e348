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
use std::fmt;

use crate::grid::Pitch;
use crate::instrument::InstrumentType;

pub mod mock;
pub mod transport;

/// A callback armed on the engine's transport.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// A note the engine has been asked to sound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trigger {
    pub instrument: InstrumentType,
    pub pitch: Pitch,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("The transport engine must be created inside a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("Invalid tempo {0}, must be a positive number of beats per minute")]
    InvalidTempo(f64),
}

/// The playback engine: a single transport clock with a note schedule and one-shot
/// callbacks, all positioned in beats.
pub trait Engine: fmt::Display + Send + Sync {
    /// Schedules a note at the given beat. Scheduled notes are replayed every time the
    /// transport passes their position.
    fn schedule_note(&self, instrument: InstrumentType, pitch: Pitch, start_beat: f64);

    /// Removes every scheduled note.
    fn clear_schedule(&self);

    /// The transport position in beats. Zero while stopped.
    fn now(&self) -> f64;

    /// Starts the transport from its current position.
    fn start(&self);

    /// Stops the transport and rewinds it to zero.
    fn stop(&self);

    /// Drops every armed one-shot callback that hasn't fired yet.
    fn cancel_pending_callbacks(&self);

    /// Arms a callback that fires once when the transport reaches the given beat.
    fn schedule_one_shot(&self, at_beat: f64, callback: Callback);

    /// Sounds a note immediately, independent of the transport.
    fn trigger_now(&self, instrument: InstrumentType, pitch: Pitch);

    /// True if the transport is running.
    fn is_running(&self) -> bool;
}
