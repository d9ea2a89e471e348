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

use serde::{Deserialize, Deserializer, Serialize};

mod error;
pub mod http;
pub mod memory;

pub use error::StoreError;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($name(s.trim().parse()?))
            }
        }
    };
}

record_id!(
    /// Identifies a stored sample.
    SampleId
);
record_id!(
    /// Identifies a stored location.
    LocationId
);
record_id!(
    /// Identifies a stored sample to location association.
    AssociationId
);

/// A sample as the store holds it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Assigned by the store on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SampleId>,
    #[serde(default)]
    pub name: String,
    /// The instrument type string.
    #[serde(rename = "type", default)]
    pub instrument_type: Option<String>,
    /// The serialized grid.
    #[serde(default)]
    pub recording_data: Option<String>,
    /// When the store last saved the sample.
    #[serde(default, skip_serializing)]
    pub datetime: Option<String>,
}

/// A place samples can be shared at. Read only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: LocationId,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub datetime: Option<String>,
    /// Whether the location accepts shared samples at all.
    #[serde(default)]
    pub sharing: bool,
}

/// Records that a sample is shared at a location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationRecord {
    pub id: AssociationId,
    pub sample_id: SampleId,
    pub location_id: LocationId,
}

/// The body used to create an association.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct NewAssociation {
    pub sample_id: SampleId,
    pub location_id: LocationId,
}

/// Coordinates arrive as either JSON numbers or decimal strings depending on the backend.
/// Anything unreadable is treated as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(string) => string.trim().parse().ok(),
        _ => None,
    })
}

/// The remote resource store: samples, locations and the associations between them.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Lists every sample.
    async fn list_samples(&self) -> Result<Vec<SampleRecord>, StoreError>;

    /// Gets one sample.
    async fn get_sample(&self, id: SampleId) -> Result<SampleRecord, StoreError>;

    /// Creates a sample and returns it as stored, id included.
    async fn create_sample(&self, sample: &SampleRecord) -> Result<SampleRecord, StoreError>;

    /// Overwrites the sample with the given id.
    async fn update_sample(
        &self,
        id: SampleId,
        sample: &SampleRecord,
    ) -> Result<SampleRecord, StoreError>;

    /// Lists every location.
    async fn list_locations(&self) -> Result<Vec<LocationRecord>, StoreError>;

    /// Lists every association.
    async fn list_associations(&self) -> Result<Vec<AssociationRecord>, StoreError>;

    /// Creates an association.
    async fn create_association(
        &self,
        association: NewAssociation,
    ) -> Result<AssociationRecord, StoreError>;

    /// Deletes an association by its own id.
    async fn delete_association(&self, id: AssociationId) -> Result<(), StoreError>;
}
