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
use std::str::FromStr;

use serde_json::{Map, Value};

/// The number of note rows in a grid.
pub const NOTES: usize = 7;

/// The number of steps in a single note row.
pub const STEPS: usize = 16;

/// The number of steps that make up a single beat.
pub const STEPS_PER_BEAT: usize = 4;

/// The octave every grid note sounds at.
pub const OCTAVE: u8 = 3;

/// A note row in the grid. The declaration order is the row order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Note {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Note {
    /// All notes in row order.
    pub const ALL: [Note; NOTES] = [
        Note::C,
        Note::D,
        Note::E,
        Note::F,
        Note::G,
        Note::A,
        Note::B,
    ];

    /// The row index of the note.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The note letter used as the row key in stored recordings.
    pub fn letter(self) -> &'static str {
        match self {
            Note::C => "C",
            Note::D => "D",
            Note::E => "E",
            Note::F => "F",
            Note::G => "G",
            Note::A => "A",
            Note::B => "B",
        }
    }

    /// The sounding pitch of the note.
    pub fn pitch(self) -> Pitch {
        Pitch {
            note: self,
            octave: OCTAVE,
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

impl FromStr for Note {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Note::ALL
            .into_iter()
            .find(|note| note.letter().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown note '{}', expected one of C D E F G A B", s))
    }
}

/// A concrete pitch, e.g. C3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pitch {
    pub note: Note,
    pub octave: u8,
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.note, self.octave)
    }
}

/// The on/off state of every step of every note row in a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct GridState {
    rows: [[bool; STEPS]; NOTES],
}

impl GridState {
    /// Returns true if the given step is enabled.
    pub fn is_enabled(&self, note: Note, step: usize) -> bool {
        self.rows[note.index()].get(step).copied().unwrap_or(false)
    }

    /// Gets the steps for a single note row.
    pub fn row(&self, note: Note) -> &[bool; STEPS] {
        &self.rows[note.index()]
    }

    /// Returns a copy of the grid with exactly one step flipped. Steps past the end of the
    /// row leave the grid unchanged.
    pub fn toggle(&self, note: Note, step: usize) -> GridState {
        let mut toggled = *self;
        if let Some(cell) = toggled.rows[note.index()].get_mut(step) {
            *cell = !*cell;
        }
        toggled
    }

    /// Returns a copy of the grid with the given step forced to the given value.
    pub fn with_step(&self, note: Note, step: usize, enabled: bool) -> GridState {
        let mut updated = *self;
        if let Some(cell) = updated.rows[note.index()].get_mut(step) {
            *cell = enabled;
        }
        updated
    }

    /// True if no steps are enabled.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(|step| !step))
    }

    /// Iterates over every enabled cell in row-major order.
    pub fn enabled_cells(&self) -> impl Iterator<Item = (Note, usize)> + '_ {
        Note::ALL.into_iter().flat_map(move |note| {
            self.rows[note.index()]
                .iter()
                .enumerate()
                .filter(|(_, enabled)| **enabled)
                .map(move |(step, _)| (note, step))
        })
    }

    /// Parses the stored recording text. Invalid JSON is an error; anything structurally off
    /// inside valid JSON degrades to empty rows.
    pub fn parse(recording_data: &str) -> Result<GridState, serde_json::Error> {
        let value: Value = serde_json::from_str(recording_data)?;
        Ok(GridState::from_record(&value))
    }

    /// Builds a grid from a stored record: an ordered list of single key maps, each mapping a
    /// note letter to its step flags. Missing or malformed rows come back empty.
    pub fn from_record(record: &Value) -> GridState {
        let entries = record.as_array().map(Vec::as_slice).unwrap_or_default();
        let mut grid = GridState::default();

        for note in Note::ALL {
            // The row is expected at the note's position, but fall back to any entry that
            // carries the note's key.
            let steps = entries
                .get(note.index())
                .and_then(|entry| entry.get(note.letter()))
                .or_else(|| entries.iter().find_map(|entry| entry.get(note.letter())));

            if let Some(row) = steps.and_then(parse_row) {
                grid.rows[note.index()] = row;
            }
        }

        grid
    }

    /// The stored record form of the grid. The inverse of [GridState::from_record].
    pub fn to_record(&self) -> Value {
        Value::Array(
            Note::ALL
                .into_iter()
                .map(|note| {
                    let mut entry = Map::new();
                    entry.insert(
                        note.letter().to_string(),
                        Value::Array(
                            self.rows[note.index()]
                                .iter()
                                .map(|step| Value::Bool(*step))
                                .collect(),
                        ),
                    );
                    Value::Object(entry)
                })
                .collect(),
        )
    }

    /// The stored recording text of the grid.
    pub fn to_recording_data(&self) -> String {
        self.to_record().to_string()
    }
}

/// A row is usable if it holds at least a full pattern of booleans. Only the first pattern's
/// worth of steps is read.
fn parse_row(value: &Value) -> Option<[bool; STEPS]> {
    let steps = value.as_array()?;
    if steps.len() < STEPS {
        return None;
    }

    let mut row = [false; STEPS];
    for (cell, step) in row.iter_mut().zip(steps.iter()) {
        *cell = step.as_bool()?;
    }
    Some(row)
}

impl fmt::Display for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for note in Note::ALL {
            write!(f, "{} ", note.pitch())?;
            for (step, enabled) in self.row(note).iter().enumerate() {
                if step > 0 && step % STEPS_PER_BEAT == 0 {
                    f.write_str(" ")?;
                }
                f.write_str(if *enabled { "x" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_is_empty() {
        let grid = GridState::default();
        assert!(grid.is_empty());
        assert_eq!(0, grid.enabled_cells().count());
        for note in Note::ALL {
            assert_eq!(&[false; STEPS], grid.row(note));
        }
    }

    #[test]
    fn test_toggle_flips_one_cell() {
        let grid = GridState::default().toggle(Note::E, 5);
        assert!(grid.is_enabled(Note::E, 5));
        assert_eq!(vec![(Note::E, 5)], grid.enabled_cells().collect::<Vec<_>>());

        // Double toggle is identity, including on a busier grid.
        let busy = grid
            .toggle(Note::C, 0)
            .toggle(Note::B, 15)
            .toggle(Note::G, 7);
        for note in Note::ALL {
            for step in 0..STEPS {
                assert_eq!(busy, busy.toggle(note, step).toggle(note, step));
            }
        }
    }

    #[test]
    fn test_toggle_out_of_range() {
        let grid = GridState::default().toggle(Note::A, STEPS);
        assert!(grid.is_empty());
        assert!(!grid.is_enabled(Note::A, STEPS));
    }

    #[test]
    fn test_record_round_trip() {
        let grid = GridState::default()
            .toggle(Note::C, 0)
            .toggle(Note::D, 3)
            .toggle(Note::F, 8)
            .toggle(Note::B, 15);

        assert_eq!(grid, GridState::from_record(&grid.to_record()));
        assert_eq!(
            grid,
            GridState::parse(&grid.to_recording_data()).expect("valid json")
        );
    }

    #[test]
    fn test_record_shape() {
        let record = GridState::default().toggle(Note::C, 1).to_record();
        let entries = record.as_array().expect("array");
        assert_eq!(7, entries.len());
        assert_eq!(json!(true), entries[0]["C"][1]);
        assert_eq!(STEPS, entries[6]["B"].as_array().expect("row").len());
    }

    #[test]
    fn test_from_record_malformed_rows() {
        let mut long_row = vec![false; 18];
        long_row[2] = true;
        let mut good_row = vec![false; STEPS];
        good_row[4] = true;

        let record = json!([
            {"C": long_row},
            {"D": [true, true]},
            {"E": "nope"},
            {"X": good_row.clone()},
            {"G": good_row},
        ]);
        let grid = GridState::from_record(&record);

        // Extra steps past the pattern are ignored.
        assert!(grid.is_enabled(Note::C, 2));
        // Too short, wrong type and missing rows are all empty.
        assert_eq!(&[false; STEPS], grid.row(Note::D));
        assert_eq!(&[false; STEPS], grid.row(Note::E));
        assert_eq!(&[false; STEPS], grid.row(Note::F));
        assert_eq!(&[false; STEPS], grid.row(Note::A));
        assert!(grid.is_enabled(Note::G, 4));
    }

    #[test]
    fn test_from_record_out_of_position() {
        let mut row = vec![false; STEPS];
        row[9] = true;
        let grid = GridState::from_record(&json!([{"A": row}]));
        assert!(grid.is_enabled(Note::A, 9));
        assert_eq!(1, grid.enabled_cells().count());
    }

    #[test]
    fn test_from_record_not_a_list() {
        assert!(GridState::from_record(&json!({"C": [true]})).is_empty());
        assert!(GridState::from_record(&Value::Null).is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(GridState::parse("[{\"C\": [tru").is_err());
    }

    #[test]
    fn test_note_from_str() {
        assert_eq!(Ok(Note::F), "f".parse::<Note>());
        assert_eq!(Ok(Note::B), " B ".parse::<Note>());
        assert!("H".parse::<Note>().is_err());
        assert_eq!("C3", Note::C.pitch().to_string());
    }

    #[test]
    fn test_display() {
        let grid = GridState::default().toggle(Note::C, 0).toggle(Note::C, 4);
        let rendered = grid.to_string();
        assert!(rendered.starts_with("C3 x... x... .... ....\n"));
        assert_eq!(7, rendered.lines().count());
    }
}
