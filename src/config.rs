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
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::instrument::InstrumentType;

mod error;

pub use error::ConfigError;

/// The API the original deployment talks to.
pub const DEFAULT_BASE_URL: &str = "https://comp2140.uqcloud.net/api/";

/// Settings read from an optional YAML file, overridden by `SEQSHARE_*` environment
/// variables (`SEQSHARE_API_KEY`, `SEQSHARE_TEMPO_BPM` and so on).
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Settings {
    /// The root of the resource store's REST API.
    #[serde(default = "default_base_url")]
    base_url: String,
    /// The static credential sent with every store request.
    api_key: String,
    /// The transport tempo.
    #[serde(default = "default_tempo_bpm")]
    tempo_bpm: f64,
    /// The instrument new samples start with.
    #[serde(default)]
    default_instrument: InstrumentType,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_tempo_bpm() -> f64 {
    120.0
}

impl Settings {
    /// Loads the settings, layering the environment over the file if one is given.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("SEQSHARE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.tempo_bpm.is_finite() || self.tempo_bpm <= 0.0 {
            return Err(ConfigError::InvalidTempo(self.tempo_bpm));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn default_instrument(&self) -> InstrumentType {
        self.default_instrument
    }
}
