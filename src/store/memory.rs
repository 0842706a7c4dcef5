use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::models::request::{DeliveryRequest, NewDeliveryRequest, RequestStatus};
use crate::store::{RequestStore, StoreError, TransitionFields};

struct StoredRequest {
    seq: u64,
    request: DeliveryRequest,
}

/// Sharded in-memory table. A compare-and-swap holds the shard write lock for
/// the whole read-check-write, which serializes mutations of the same id.
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: DashMap<String, StoredRequest>,
    next_seq: AtomicU64,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestStore for InMemoryRequestStore {
    fn insert(&self, request: NewDeliveryRequest) -> Result<DeliveryRequest, StoreError> {
        match self.requests.entry(request.id.clone()) {
            Entry::Occupied(entry) => Err(StoreError::Conflict {
                id: entry.key().clone(),
                reason: "id already exists".to_string(),
            }),
            Entry::Vacant(entry) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                let stored = request.into_request(Utc::now());
                entry.insert(StoredRequest {
                    seq,
                    request: stored.clone(),
                });
                Ok(stored)
            }
        }
    }

    fn get(&self, id: &str) -> Result<DeliveryRequest, StoreError> {
        self.requests
            .get(id)
            .map(|entry| entry.request.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list_by_status(&self, status: RequestStatus, limit: usize) -> Vec<DeliveryRequest> {
        let mut matching: Vec<(u64, DeliveryRequest)> = self
            .requests
            .iter()
            .filter(|entry| entry.request.status == status)
            .map(|entry| (entry.seq, entry.request.clone()))
            .collect();

        matching.sort_by_key(|(seq, request)| Reverse((request.created_at, *seq)));
        matching.truncate(limit);

        matching.into_iter().map(|(_, request)| request).collect()
    }

    fn compare_and_swap_status(
        &self,
        id: &str,
        expected: Option<RequestStatus>,
        new_status: RequestStatus,
        fields: TransitionFields,
    ) -> Result<DeliveryRequest, StoreError> {
        let mut entry = self
            .requests
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let request = &mut entry.request;
        if let Some(expected) = expected {
            if request.status != expected {
                return Err(StoreError::Conflict {
                    id: id.to_string(),
                    reason: format!("status is {}, expected {}", request.status, expected),
                });
            }
        }

        request.status = new_status;
        if let Some(partner_name) = fields.partner_name {
            request.partner_name = Some(partner_name);
        }
        request.updated_at = Utc::now();

        Ok(request.clone())
    }

    fn len(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::InMemoryRequestStore;
    use crate::models::request::{NewDeliveryRequest, RequestStatus};
    use crate::store::{RequestStore, StoreError, TransitionFields};

    fn new_request(id: &str) -> NewDeliveryRequest {
        NewDeliveryRequest {
            id: id.to_string(),
            item: "Book".to_string(),
            pickup: "A".to_string(),
            drop_location: "B".to_string(),
            pickup_lat: None,
            pickup_lng: None,
            drop_lat: None,
            drop_lng: None,
            fare: "0".to_string(),
            delivery_type: "walker".to_string(),
            otp: "1234".to_string(),
        }
    }

    #[test]
    fn insert_sets_pending_and_timestamps() {
        let store = InMemoryRequestStore::new();
        let stored = store.insert(new_request("r1")).unwrap();

        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.created_at, stored.updated_at);
        assert!(stored.partner_name.is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_insert_keeps_first_record() {
        let store = InMemoryRequestStore::new();
        store.insert(new_request("r1")).unwrap();

        let mut second = new_request("r1");
        second.item = "Lamp".to_string();
        let err = store.insert(second).unwrap_err();

        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.get("r1").unwrap().item, "Book");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = InMemoryRequestStore::new();
        assert_eq!(
            store.get("nope").unwrap_err(),
            StoreError::NotFound("nope".to_string())
        );
    }

    #[test]
    fn compare_and_swap_checks_expected_status() {
        let store = InMemoryRequestStore::new();
        let created = store.insert(new_request("r1")).unwrap();

        let accepted = store
            .compare_and_swap_status(
                "r1",
                Some(RequestStatus::Pending),
                RequestStatus::Accepted,
                TransitionFields::partner("Alice"),
            )
            .unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert_eq!(accepted.partner_name.as_deref(), Some("Alice"));
        assert_eq!(accepted.created_at, created.created_at);
        assert!(accepted.updated_at >= created.updated_at);

        let err = store
            .compare_and_swap_status(
                "r1",
                Some(RequestStatus::Pending),
                RequestStatus::Accepted,
                TransitionFields::partner("Bob"),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.get("r1").unwrap().partner_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn unconditional_swap_keeps_partner() {
        let store = InMemoryRequestStore::new();
        store.insert(new_request("r1")).unwrap();
        store
            .compare_and_swap_status(
                "r1",
                None,
                RequestStatus::Accepted,
                TransitionFields::partner("Alice"),
            )
            .unwrap();

        let updated = store
            .compare_and_swap_status("r1", None, RequestStatus::PickedUp, TransitionFields::default())
            .unwrap();
        assert_eq!(updated.status, RequestStatus::PickedUp);
        assert_eq!(updated.partner_name.as_deref(), Some("Alice"));
        assert_eq!(updated.otp, "1234");
    }

    #[test]
    fn compare_and_swap_on_missing_id_is_not_found() {
        let store = InMemoryRequestStore::new();
        let err = store
            .compare_and_swap_status("ghost", None, RequestStatus::Cancelled, TransitionFields::default())
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("ghost".to_string()));
    }

    #[test]
    fn list_is_newest_first_and_capped() {
        let store = InMemoryRequestStore::new();
        for i in 0..30 {
            store.insert(new_request(&format!("r{i}"))).unwrap();
        }
        store
            .compare_and_swap_status("r29", None, RequestStatus::Cancelled, TransitionFields::default())
            .unwrap();

        let pending = store.list_by_status(RequestStatus::Pending, 20);
        assert_eq!(pending.len(), 20);
        assert_eq!(pending[0].id, "r28");
        assert_eq!(pending[19].id, "r9");
        assert!(pending
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));

        let cancelled = store.list_by_status(RequestStatus::Cancelled, 20);
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, "r29");
    }

    #[test]
    fn concurrent_expected_swaps_have_one_winner() {
        let store = InMemoryRequestStore::new();
        store.insert(new_request("r1")).unwrap();
        let wins = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for n in 0..16 {
                let store = &store;
                let wins = &wins;
                scope.spawn(move || {
                    let result = store.compare_and_swap_status(
                        "r1",
                        Some(RequestStatus::Pending),
                        RequestStatus::Accepted,
                        TransitionFields::partner(format!("partner-{n}")),
                    );
                    if result.is_ok() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("r1").unwrap().status, RequestStatus::Accepted);
    }
}
