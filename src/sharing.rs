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
use std::sync::Arc;

use tracing::{debug, info, span, Level, Span};

use crate::store::{
    AssociationRecord, LocationId, LocationRecord, NewAssociation, SampleId, Store, StoreError,
};

/// A location a sample could be shared at, and whether it currently is.
#[derive(Clone, Debug, PartialEq)]
pub struct ShareOption {
    pub location: LocationRecord,
    pub shared: bool,
}

/// Keeps the associations in the store in line with the share state a user asks for.
pub struct Reconciler<S: Store> {
    store: Arc<S>,
    span: Span,
}

impl<S: Store> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Reconciler<S> {
        Reconciler {
            store,
            span: span!(Level::INFO, "sharing"),
        }
    }

    /// Returns true if the sample is shared at the location.
    pub async fn is_shared(
        &self,
        sample_id: SampleId,
        location_id: LocationId,
    ) -> Result<bool, StoreError> {
        Ok(!self.matching(sample_id, location_id).await?.is_empty())
    }

    /// Shares or unshares the sample at the location. Asking for the state that already holds
    /// changes nothing, so repeating a call never creates a second association. Unsharing
    /// removes every association for the pair, duplicates included.
    pub async fn set_shared(
        &self,
        sample_id: SampleId,
        location_id: LocationId,
        want_shared: bool,
    ) -> Result<(), StoreError> {
        let existing = self.matching(sample_id, location_id).await?;
        match (want_shared, existing.is_empty()) {
            (true, true) => {
                let created = self
                    .store
                    .create_association(NewAssociation {
                        sample_id,
                        location_id,
                    })
                    .await?;
                info!(
                    parent: &self.span,
                    sample_id = sample_id.0,
                    location_id = location_id.0,
                    association_id = created.id.0,
                    "Sample shared."
                );
            }
            (false, false) => {
                for association in existing {
                    match self.store.delete_association(association.id).await {
                        Ok(()) => info!(
                            parent: &self.span,
                            sample_id = sample_id.0,
                            location_id = location_id.0,
                            association_id = association.id.0,
                            "Sample unshared."
                        ),
                        // Someone else got there first, the end state holds either way.
                        Err(e) if e.is_not_found() => debug!(
                            parent: &self.span,
                            association_id = association.id.0,
                            "Association already deleted."
                        ),
                        Err(e) => return Err(e),
                    }
                }
            }
            _ => debug!(
                parent: &self.span,
                sample_id = sample_id.0,
                location_id = location_id.0,
                want_shared,
                "Share state already as requested."
            ),
        }

        Ok(())
    }

    /// The locations that accept shared samples, each with the sample's current share state.
    /// Associations are fetched once for the whole listing.
    pub async fn share_listing(&self, sample_id: SampleId) -> Result<Vec<ShareOption>, StoreError> {
        let locations = self.store.list_locations().await?;
        let associations = self.store.list_associations().await?;

        Ok(locations
            .into_iter()
            .filter(|location| location.sharing)
            .map(|location| {
                let shared = associations
                    .iter()
                    .any(|a| a.sample_id == sample_id && a.location_id == location.id);
                ShareOption { location, shared }
            })
            .collect())
    }

    /// Every association between the sample and location.
    async fn matching(
        &self,
        sample_id: SampleId,
        location_id: LocationId,
    ) -> Result<Vec<AssociationRecord>, StoreError> {
        Ok(self
            .store
            .list_associations()
            .await?
            .into_iter()
            .filter(|a| a.sample_id == sample_id && a.location_id == location_id)
            .collect())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::store::{memory, StoreError};

    use super::Reconciler;

    #[tokio::test]
    async fn test_share_twice_creates_one_association() -> Result<(), StoreError> {
        let store = memory::Store::new();
        let sample = store.add_raw_sample("riff", None, None).await;
        let location = store.add_location("Great Court", true).await;
        let reconciler = Reconciler::new(Arc::new(store.clone()));

        assert!(!reconciler.is_shared(sample, location).await?);
        reconciler.set_shared(sample, location, true).await?;
        reconciler.set_shared(sample, location, true).await?;

        assert!(reconciler.is_shared(sample, location).await?);
        assert_eq!(1, store.association_count(sample, location).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_unshare_without_association() -> Result<(), StoreError> {
        let store = memory::Store::new();
        let sample = store.add_raw_sample("riff", None, None).await;
        let location = store.add_location("Library", true).await;
        let reconciler = Reconciler::new(Arc::new(store.clone()));

        reconciler.set_shared(sample, location, false).await?;
        assert!(!reconciler.is_shared(sample, location).await?);

        reconciler.set_shared(sample, location, true).await?;
        reconciler.set_shared(sample, location, false).await?;
        reconciler.set_shared(sample, location, false).await?;
        assert!(!reconciler.is_shared(sample, location).await?);
        assert_eq!(0, store.association_count(sample, location).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_unshare_only_touches_matching_pair() -> Result<(), StoreError> {
        let store = memory::Store::new();
        let sample = store.add_raw_sample("riff", None, None).await;
        let other = store.add_raw_sample("other", None, None).await;
        let location = store.add_location("Library", true).await;
        store.add_raw_association(other, location).await;
        let reconciler = Reconciler::new(Arc::new(store.clone()));

        reconciler.set_shared(sample, location, true).await?;
        reconciler.set_shared(sample, location, false).await?;
        assert!(reconciler.is_shared(other, location).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_unshare_removes_duplicates() -> Result<(), StoreError> {
        let store = memory::Store::new();
        let sample = store.add_raw_sample("riff", None, None).await;
        let location = store.add_location("Library", true).await;
        store.add_raw_association(sample, location).await;
        store.add_raw_association(sample, location).await;
        let reconciler = Reconciler::new(Arc::new(store.clone()));

        reconciler.set_shared(sample, location, false).await?;
        assert!(!reconciler.is_shared(sample, location).await?);
        assert_eq!(0, store.association_count(sample, location).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_unshare_racing_another_delete() -> Result<(), StoreError> {
        let store = memory::Store::new();
        let sample = store.add_raw_sample("riff", None, None).await;
        let location = store.add_location("Library", true).await;
        store.add_raw_association(sample, location).await;
        let reconciler = Reconciler::new(Arc::new(store.clone()));

        // The association disappears between being listed and being deleted.
        store.lose_next_delete().await;
        reconciler.set_shared(sample, location, false).await?;
        assert!(!reconciler.is_shared(sample, location).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_share_listing() -> Result<(), StoreError> {
        let store = memory::Store::new();
        let sample = store.add_raw_sample("riff", None, None).await;
        let open = store.add_location("Open", true).await;
        store.add_location("Closed", false).await;
        let shared = store.add_location("Shared", true).await;
        store.add_raw_association(sample, shared).await;
        let reconciler = Reconciler::new(Arc::new(store.clone()));

        let listing = reconciler.share_listing(sample).await?;
        let names: Vec<(&str, bool)> = listing
            .iter()
            .map(|option| (option.location.name.as_str(), option.shared))
            .collect();
        assert_eq!(vec![("Open", false), ("Shared", true)], names);
        assert_eq!(open, listing[0].location.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = memory::Store::new();
        let sample = store.add_raw_sample("riff", None, None).await;
        let location = store.add_location("Library", true).await;
        store.set_unavailable(true).await;
        let reconciler = Reconciler::new(Arc::new(store.clone()));

        assert!(reconciler
            .set_shared(sample, location, true)
            .await
            .is_err_and(|e| e.is_network()));
    }
}
