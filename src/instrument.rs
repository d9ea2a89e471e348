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

use serde::{Deserialize, Serialize};

/// The sound source used to render a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    #[default]
    Guitar,
    Piano,
    FrenchHorn,
    Drums,
}

/// The samples an instrument's sampler is built from.
#[derive(Debug, PartialEq)]
pub struct SamplerVoices {
    /// The directory the sample files are served from.
    pub base_path: &'static str,
    /// Pitch name to sample file. The sampler repitches the closest entry for anything else.
    pub files: &'static [(&'static str, &'static str)],
    /// Release time in seconds.
    pub release_secs: f32,
}

const CHROMATIC_OCTAVE_3: &[(&str, &str)] = &[
    ("C3", "C3.mp3"),
    ("C#3", "Cs3.mp3"),
    ("D3", "D3.mp3"),
    ("D#3", "Ds3.mp3"),
    ("E3", "E3.mp3"),
    ("F3", "F3.mp3"),
    ("F#3", "Fs3.mp3"),
    ("G3", "G3.mp3"),
    ("G#3", "Gs3.mp3"),
    ("A3", "A3.mp3"),
    ("A#3", "As3.mp3"),
    ("B3", "B3.mp3"),
];

const FRENCH_HORN: &[(&str, &str)] = &[
    ("A1", "A1.mp3"),
    ("C2", "C2.mp3"),
    ("G2", "G2.mp3"),
    ("D3", "D3.mp3"),
    ("F3", "F3.mp3"),
    ("A3", "A3.mp3"),
    ("C4", "C4.mp3"),
    ("D5", "D5.mp3"),
    ("F5", "F5.mp3"),
];

const DRUM_KIT: &[(&str, &str)] = &[
    ("C3", "drums1.mp3"),
    ("D3", "drums2.mp3"),
    ("E3", "drums3.mp3"),
    ("F3", "drums4.mp3"),
    ("G3", "drums5.mp3"),
    ("A3", "drums6.mp3"),
    ("B3", "drums7.mp3"),
];

impl InstrumentType {
    /// Every instrument, in the order they are offered to users.
    pub const ALL: [InstrumentType; 4] = [
        InstrumentType::Guitar,
        InstrumentType::Piano,
        InstrumentType::FrenchHorn,
        InstrumentType::Drums,
    ];

    /// The type string the remote store uses for this instrument.
    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentType::Guitar => "guitar",
            InstrumentType::Piano => "piano",
            InstrumentType::FrenchHorn => "frenchhorn",
            InstrumentType::Drums => "drums",
        }
    }

    /// A human readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            InstrumentType::Guitar => "Guitar",
            InstrumentType::Piano => "Piano",
            InstrumentType::FrenchHorn => "French Horn",
            InstrumentType::Drums => "Drums",
        }
    }

    /// Maps a stored type string to an instrument. Missing or unknown types are guitar.
    pub fn from_type_str(type_str: Option<&str>) -> InstrumentType {
        type_str
            .and_then(|type_str| type_str.parse().ok())
            .unwrap_or_default()
    }

    /// The sampler voices for this instrument.
    pub fn voices(self) -> SamplerVoices {
        match self {
            InstrumentType::Guitar => SamplerVoices {
                base_path: "/samples/guitar-acoustic/",
                files: CHROMATIC_OCTAVE_3,
                release_secs: 1.0,
            },
            InstrumentType::Piano => SamplerVoices {
                base_path: "/samples/piano/",
                files: CHROMATIC_OCTAVE_3,
                release_secs: 1.0,
            },
            InstrumentType::FrenchHorn => SamplerVoices {
                base_path: "/samples/french-horn/",
                files: FRENCH_HORN,
                release_secs: 1.0,
            },
            InstrumentType::Drums => SamplerVoices {
                base_path: "/samples/drums/",
                files: DRUM_KIT,
                release_secs: 1.0,
            },
        }
    }
}

impl FromStr for InstrumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InstrumentType::ALL
            .into_iter()
            .find(|instrument| instrument.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown instrument '{}'", s))
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use crate::grid::Note;

    use super::InstrumentType;

    #[test]
    fn test_from_type_str() {
        assert_eq!(
            InstrumentType::Piano,
            InstrumentType::from_type_str(Some("piano"))
        );
        assert_eq!(
            InstrumentType::FrenchHorn,
            InstrumentType::from_type_str(Some("frenchhorn"))
        );
        assert_eq!(
            InstrumentType::Drums,
            InstrumentType::from_type_str(Some("Drums"))
        );
        assert_eq!(
            InstrumentType::Guitar,
            InstrumentType::from_type_str(Some("kazoo"))
        );
        assert_eq!(InstrumentType::Guitar, InstrumentType::from_type_str(None));
    }

    #[test]
    fn test_store_strings_round_trip() {
        for instrument in InstrumentType::ALL {
            assert_eq!(Ok(instrument), instrument.as_str().parse());
        }
    }

    #[test]
    fn test_voice_tables() {
        assert_eq!(
            InstrumentType::Guitar.voices().files,
            InstrumentType::Piano.voices().files
        );
        assert_ne!(
            InstrumentType::Guitar.voices(),
            InstrumentType::Piano.voices()
        );
        assert_eq!(1.0, InstrumentType::FrenchHorn.voices().release_secs);
    }

    #[test]
    fn test_drums_cover_every_grid_note() {
        let voices = InstrumentType::Drums.voices();
        for note in Note::ALL {
            let pitch = note.pitch().to_string();
            assert!(
                voices.files.iter().any(|(name, _)| *name == pitch),
                "no drum sample for {}",
                pitch
            );
        }
    }
}
