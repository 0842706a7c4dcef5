pub mod memory;

use thiserror::Error;

use crate::models::request::{DeliveryRequest, NewDeliveryRequest, RequestStatus};

pub use memory::InMemoryRequestStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("request {0} not found")]
    NotFound(String),

    #[error("conflict on request {id}: {reason}")]
    Conflict { id: String, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct TransitionFields {
    pub partner_name: Option<String>,
}

impl TransitionFields {
    pub fn partner(name: impl Into<String>) -> Self {
        Self {
            partner_name: Some(name.into()),
        }
    }
}

pub trait RequestStore: Send + Sync {
    fn insert(&self, request: NewDeliveryRequest) -> Result<DeliveryRequest, StoreError>;

    fn get(&self, id: &str) -> Result<DeliveryRequest, StoreError>;

    fn list_by_status(&self, status: RequestStatus, limit: usize) -> Vec<DeliveryRequest>;

    fn compare_and_swap_status(
        &self,
        id: &str,
        expected: Option<RequestStatus>,
        new_status: RequestStatus,
        fields: TransitionFields,
    ) -> Result<DeliveryRequest, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
