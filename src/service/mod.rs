use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::request::{
    CreateDeliveryRequest, DeliveryRequest, NewDeliveryRequest, RequestStatus, RequestView,
    DEFAULT_DELIVERY_TYPE, DEFAULT_FARE,
};
use crate::observability::metrics::Metrics;
use crate::store::{RequestStore, StoreError, TransitionFields};

const MAX_VERIFY_ATTEMPTS: usize = 8;

pub const VERIFIED_MESSAGE: &str = "OTP verified! Delivery complete.";

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub list_limit: usize,
    pub strict_transitions: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            list_limit: 20,
            strict_transitions: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AcceptOutcome {
    pub id: String,
    pub status: RequestStatus,
    pub partner_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusOutcome {
    pub id: String,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerifyOutcome {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone)]
pub struct RequestService {
    store: Arc<dyn RequestStore>,
    metrics: Metrics,
    settings: ServiceSettings,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl RequestService {
    pub fn new(store: Arc<dyn RequestStore>, metrics: Metrics, settings: ServiceSettings) -> Self {
        Self {
            store,
            metrics,
            settings,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn create(&self, fields: CreateDeliveryRequest) -> Result<String, AppError> {
        let (Some(id), Some(item), Some(pickup), Some(drop_location), Some(otp)) = (
            required(fields.id),
            required(fields.item),
            required(fields.pickup),
            required(fields.drop_location),
            required(fields.otp),
        ) else {
            return Err(AppError::InvalidInput("Missing required fields".to_string()));
        };

        let new_request = NewDeliveryRequest {
            id,
            item,
            pickup,
            drop_location,
            pickup_lat: fields.pickup_lat,
            pickup_lng: fields.pickup_lng,
            drop_lat: fields.drop_lat,
            drop_lng: fields.drop_lng,
            fare: required(fields.fare).unwrap_or_else(|| DEFAULT_FARE.to_string()),
            delivery_type: required(fields.delivery_type)
                .unwrap_or_else(|| DEFAULT_DELIVERY_TYPE.to_string()),
            otp,
        };

        let stored = self.store.insert(new_request).map_err(|err| match err {
            StoreError::Conflict { id, .. } => AppError::DuplicateId(id),
            StoreError::NotFound(id) => AppError::Internal(format!("insert lost request {id}")),
        })?;

        self.metrics.requests_created_total.inc();
        self.metrics.requests_stored.inc();

        info!(request_id = %stored.id, item = %stored.item, "delivery request created");
        Ok(stored.id)
    }

    pub fn accept(&self, id: &str, partner_name: &str) -> Result<AcceptOutcome, AppError> {
        if id.is_empty() || partner_name.is_empty() {
            return Err(AppError::InvalidInput(
                "Missing id or partner_name".to_string(),
            ));
        }

        let accepted = self
            .store
            .compare_and_swap_status(
                id,
                Some(RequestStatus::Pending),
                RequestStatus::Accepted,
                TransitionFields::partner(partner_name),
            )
            .map_err(|err| {
                self.metrics.acceptance_conflicts_total.inc();
                debug!(request_id = %id, partner = %partner_name, error = %err, "accept rejected");
                AppError::AlreadyAccepted(id.to_string())
            })?;

        self.record_transition(accepted.status);
        info!(request_id = %id, partner = %partner_name, "delivery request accepted");

        Ok(AcceptOutcome {
            id: accepted.id,
            status: accepted.status,
            partner_name: partner_name.to_string(),
        })
    }

    pub fn update_status(&self, id: &str, status: &str) -> Result<StatusOutcome, AppError> {
        if id.is_empty() || status.is_empty() {
            return Err(AppError::InvalidInput("Missing id or status".to_string()));
        }

        let new_status: RequestStatus = status
            .parse()
            .map_err(|_| AppError::InvalidInput("Invalid status".to_string()))?;

        let expected = if self.settings.strict_transitions {
            let current = self.fetch(id)?.status;
            self.ensure_transition(current, new_status)?;
            Some(current)
        } else {
            None
        };

        let updated = self
            .store
            .compare_and_swap_status(id, expected, new_status, TransitionFields::default())
            .map_err(|err| match err {
                StoreError::NotFound(id) => AppError::NotFound(format!("request {id}")),
                StoreError::Conflict { id, reason } => {
                    AppError::Conflict(format!("request {id} changed concurrently: {reason}"))
                }
            })?;

        self.record_transition(updated.status);
        info!(request_id = %id, status = %updated.status, "delivery status updated");

        Ok(StatusOutcome {
            id: updated.id,
            status: updated.status,
        })
    }

    pub fn verify_otp(&self, id: &str, otp: &str) -> Result<VerifyOutcome, AppError> {
        if id.is_empty() || otp.is_empty() {
            return Err(AppError::InvalidInput("Missing id or otp".to_string()));
        }

        for _ in 0..MAX_VERIFY_ATTEMPTS {
            let current = self.fetch(id)?;

            if current.status == RequestStatus::Delivered {
                self.record_otp_outcome("already_delivered");
                return Err(AppError::AlreadyDelivered(id.to_string()));
            }

            if current.otp != otp {
                self.record_otp_outcome("mismatch");
                warn!(request_id = %id, "otp mismatch");
                return Err(AppError::InvalidOtp);
            }

            if self.settings.strict_transitions {
                self.ensure_transition(current.status, RequestStatus::Delivered)?;
            }

            match self.store.compare_and_swap_status(
                id,
                Some(current.status),
                RequestStatus::Delivered,
                TransitionFields::default(),
            ) {
                Ok(_) => {
                    self.record_otp_outcome("verified");
                    self.record_transition(RequestStatus::Delivered);
                    info!(request_id = %id, "otp verified, request delivered");

                    return Ok(VerifyOutcome {
                        ok: true,
                        message: VERIFIED_MESSAGE.to_string(),
                    });
                }
                Err(StoreError::NotFound(id)) => {
                    return Err(AppError::NotFound(format!("request {id}")));
                }
                Err(StoreError::Conflict { reason, .. }) => {
                    debug!(request_id = %id, reason = %reason, "status changed during otp check; retrying");
                }
            }
        }

        Err(AppError::Conflict(format!(
            "request {id} kept changing during otp verification"
        )))
    }

    pub fn get_by_id(&self, id: &str) -> Result<RequestView, AppError> {
        self.fetch(id).map(RequestView::from)
    }

    pub fn list(&self, status: Option<&str>, limit: Option<usize>) -> Vec<RequestView> {
        let status = match status.filter(|s| !s.is_empty()) {
            Some(raw) => match raw.parse::<RequestStatus>() {
                Ok(status) => status,
                Err(err) => {
                    debug!(error = %err, "list filter matches no status");
                    return Vec::new();
                }
            },
            None => RequestStatus::Pending,
        };

        let max = self.settings.list_limit;
        let limit = limit.unwrap_or(max).min(max);
        if limit == 0 {
            return Vec::new();
        }

        self.store
            .list_by_status(status, limit)
            .into_iter()
            .map(RequestView::from)
            .collect()
    }

    pub fn poll(&self, id: &str) -> Option<RequestView> {
        self.store.get(id).ok().map(RequestView::from)
    }

    fn fetch(&self, id: &str) -> Result<DeliveryRequest, AppError> {
        self.store.get(id).map_err(|err| match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("request {id}")),
            StoreError::Conflict { id, reason } => AppError::Conflict(format!("{id}: {reason}")),
        })
    }

    fn ensure_transition(&self, from: RequestStatus, to: RequestStatus) -> Result<(), AppError> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            warn!(from = %from, to = %to, "rejected status transition");
            Err(AppError::InvalidTransition { from, to })
        }
    }

    fn record_transition(&self, status: RequestStatus) {
        self.metrics
            .status_transitions_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    fn record_otp_outcome(&self, outcome: &str) {
        self.metrics
            .otp_verifications_total
            .with_label_values(&[outcome])
            .inc();
    }
}
