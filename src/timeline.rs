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
use crate::engine::Engine;
use crate::grid::{GridState, Pitch, STEPS, STEPS_PER_BEAT};
use crate::instrument::InstrumentType;

/// The length of one full pattern loop in beats.
pub const PATTERN_BEATS: f64 = (STEPS / STEPS_PER_BEAT) as f64;

/// A single note to be played during a preview.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackEvent {
    /// The pitch to play.
    pub note: Pitch,
    /// When to play it, in beats from the start of the pattern. Always in [0, 4).
    pub start_beat: f64,
}

/// The compiled, schedulable form of a grid for one instrument.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    instrument: InstrumentType,
    events: Vec<PlaybackEvent>,
}

impl Timeline {
    /// Compiles the grid into playback events, row-major in note order and then step order.
    pub fn compile(grid: &GridState, instrument: InstrumentType) -> Timeline {
        Timeline {
            instrument,
            events: grid
                .enabled_cells()
                .map(|(note, step)| PlaybackEvent {
                    note: note.pitch(),
                    start_beat: step_to_beat(step),
                })
                .collect(),
        }
    }

    /// The instrument the events are played with.
    pub fn instrument(&self) -> InstrumentType {
        self.instrument
    }

    /// The compiled events.
    pub fn events(&self) -> &[PlaybackEvent] {
        &self.events
    }

    /// Replaces everything scheduled on the engine with this timeline.
    pub fn schedule(&self, engine: &dyn Engine) {
        engine.clear_schedule();
        for event in self.events.iter() {
            engine.schedule_note(self.instrument, event.note, event.start_beat);
        }
    }
}

/// Converts a step index into its start beat.
pub fn step_to_beat(step: usize) -> f64 {
    step as f64 / STEPS_PER_BEAT as f64
}

/// Tracks the grid and instrument a timeline was last compiled from so that unchanged
/// state is never recompiled or rescheduled.
#[derive(Default)]
pub struct Arrangement {
    source: Option<(GridState, InstrumentType)>,
    timeline: Timeline,
}

impl Arrangement {
    /// Recompiles if the grid or instrument differs from the last compile. Returns the new
    /// timeline when it changed.
    pub fn update(&mut self, grid: &GridState, instrument: InstrumentType) -> Option<&Timeline> {
        if self.source == Some((*grid, instrument)) {
            return None;
        }

        self.source = Some((*grid, instrument));
        self.timeline = Timeline::compile(grid, instrument);
        Some(&self.timeline)
    }

    /// The most recently compiled timeline.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }
}
