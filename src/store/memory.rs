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
use std::{collections::BTreeMap, fmt, sync::Arc};

use tokio::sync::Mutex;

use super::{
    AssociationId, AssociationRecord, LocationId, LocationRecord, NewAssociation, SampleId,
    SampleRecord, StoreError,
};

#[derive(Default)]
struct Data {
    samples: BTreeMap<SampleId, SampleRecord>,
    locations: BTreeMap<LocationId, LocationRecord>,
    associations: BTreeMap<AssociationId, AssociationRecord>,
    next_id: i64,
    unavailable: bool,
    /// The next delete finds its record already gone, as if another client removed it first.
    lose_next_delete: bool,
    sample_fetches: usize,
}

impl Data {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

/// An in-memory store. Doesn't talk to anything. Clones share the same data.
#[derive(Clone, Default)]
pub struct Store {
    data: Arc<Mutex<Data>>,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Store {
        Store::default()
    }

    /// Adds a location and returns its id.
    pub async fn add_location(&self, name: &str, sharing: bool) -> LocationId {
        let mut data = self.data.lock().await;
        let id = LocationId(data.next_id());
        data.locations.insert(
            id,
            LocationRecord {
                id,
                name: name.to_string(),
                sharing,
                ..Default::default()
            },
        );
        id
    }

    /// Adds a sample exactly as given, whatever its contents, and returns its id.
    pub async fn add_raw_sample(
        &self,
        name: &str,
        instrument_type: Option<&str>,
        recording_data: Option<&str>,
    ) -> SampleId {
        let mut data = self.data.lock().await;
        let id = SampleId(data.next_id());
        data.samples.insert(
            id,
            SampleRecord {
                id: Some(id),
                name: name.to_string(),
                instrument_type: instrument_type.map(str::to_string),
                recording_data: recording_data.map(str::to_string),
                datetime: None,
            },
        );
        id
    }

    /// Adds an association without checking for an existing one.
    pub async fn add_raw_association(
        &self,
        sample_id: SampleId,
        location_id: LocationId,
    ) -> AssociationId {
        let mut data = self.data.lock().await;
        let id = AssociationId(data.next_id());
        data.associations.insert(
            id,
            AssociationRecord {
                id,
                sample_id,
                location_id,
            },
        );
        id
    }

    /// Makes every request fail as if the store couldn't be reached.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.data.lock().await.unavailable = unavailable;
    }

    /// Makes the next association delete lose a race with another client: the record is
    /// removed but the delete reports it as missing.
    pub async fn lose_next_delete(&self) {
        self.data.lock().await.lose_next_delete = true;
    }

    /// How many single sample fetches have been made.
    pub async fn sample_fetches(&self) -> usize {
        self.data.lock().await.sample_fetches
    }

    /// Counts the associations for the given pair.
    pub async fn association_count(&self, sample_id: SampleId, location_id: LocationId) -> usize {
        self.data
            .lock()
            .await
            .associations
            .values()
            .filter(|a| a.sample_id == sample_id && a.location_id == location_id)
            .count()
    }
}

impl super::Store for Store {
    async fn list_samples(&self) -> Result<Vec<SampleRecord>, StoreError> {
        let data = self.data.lock().await;
        data.check_available()?;
        Ok(data.samples.values().cloned().collect())
    }

    async fn get_sample(&self, id: SampleId) -> Result<SampleRecord, StoreError> {
        let mut data = self.data.lock().await;
        data.sample_fetches += 1;
        data.check_available()?;
        data.samples
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind: "sample",
                id: id.0,
            })
    }

    async fn create_sample(&self, sample: &SampleRecord) -> Result<SampleRecord, StoreError> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        let id = SampleId(data.next_id());
        let stored = SampleRecord {
            id: Some(id),
            ..sample.clone()
        };
        data.samples.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_sample(
        &self,
        id: SampleId,
        sample: &SampleRecord,
    ) -> Result<SampleRecord, StoreError> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        let stored = data.samples.get_mut(&id).ok_or(StoreError::NotFound {
            kind: "sample",
            id: id.0,
        })?;
        *stored = SampleRecord {
            id: Some(id),
            ..sample.clone()
        };
        Ok(stored.clone())
    }

    async fn list_locations(&self) -> Result<Vec<LocationRecord>, StoreError> {
        let data = self.data.lock().await;
        data.check_available()?;
        Ok(data.locations.values().cloned().collect())
    }

    async fn list_associations(&self) -> Result<Vec<AssociationRecord>, StoreError> {
        let data = self.data.lock().await;
        data.check_available()?;
        Ok(data.associations.values().copied().collect())
    }

    async fn create_association(
        &self,
        association: NewAssociation,
    ) -> Result<AssociationRecord, StoreError> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        let id = AssociationId(data.next_id());
        let stored = AssociationRecord {
            id,
            sample_id: association.sample_id,
            location_id: association.location_id,
        };
        data.associations.insert(id, stored);
        Ok(stored)
    }

    async fn delete_association(&self, id: AssociationId) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        let removed = data.associations.remove(&id);
        if std::mem::take(&mut data.lose_next_delete) {
            return Err(StoreError::NotFound {
                kind: "association",
                id: id.0,
            });
        }
        removed
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                kind: "association",
                id: id.0,
            })
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memory")
    }
}
