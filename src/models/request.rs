use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_FARE: &str = "0";
pub const DEFAULT_DELIVERY_TYPE: &str = "walker";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Accepted,
    PickedUp,
    Delivering,
    Delivered,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Pending,
        RequestStatus::Accepted,
        RequestStatus::PickedUp,
        RequestStatus::Delivering,
        RequestStatus::Delivered,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::PickedUp => "PICKED_UP",
            RequestStatus::Delivering => "DELIVERING",
            RequestStatus::Delivered => "DELIVERED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Delivered | RequestStatus::Cancelled)
    }

    fn rank(&self) -> Option<u8> {
        match self {
            RequestStatus::Pending => Some(0),
            RequestStatus::Accepted => Some(1),
            RequestStatus::PickedUp => Some(2),
            RequestStatus::Delivering => Some(3),
            RequestStatus::Delivered => Some(4),
            RequestStatus::Cancelled => None,
        }
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        if self.is_terminal() {
            return false;
        }

        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target > current,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status: {}", self.0)
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub id: String,
    pub item: String,
    pub pickup: String,
    pub drop_location: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub drop_lat: Option<f64>,
    pub drop_lng: Option<f64>,
    pub fare: String,
    pub delivery_type: String,
    pub otp: String,
    pub status: RequestStatus,
    pub partner_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDeliveryRequest {
    pub id: String,
    pub item: String,
    pub pickup: String,
    pub drop_location: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub drop_lat: Option<f64>,
    pub drop_lng: Option<f64>,
    pub fare: String,
    pub delivery_type: String,
    pub otp: String,
}

impl NewDeliveryRequest {
    pub fn into_request(self, now: DateTime<Utc>) -> DeliveryRequest {
        DeliveryRequest {
            id: self.id,
            item: self.item,
            pickup: self.pickup,
            drop_location: self.drop_location,
            pickup_lat: self.pickup_lat,
            pickup_lng: self.pickup_lng,
            drop_lat: self.drop_lat,
            drop_lng: self.drop_lng,
            fare: self.fare,
            delivery_type: self.delivery_type,
            otp: self.otp,
            status: RequestStatus::Pending,
            partner_name: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Client-facing projection of a request. Carries no OTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestView {
    pub id: String,
    pub item: String,
    pub pickup: String,
    pub drop_location: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub drop_lat: Option<f64>,
    pub drop_lng: Option<f64>,
    pub fare: String,
    pub delivery_type: String,
    pub status: RequestStatus,
    pub partner_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeliveryRequest> for RequestView {
    fn from(request: DeliveryRequest) -> Self {
        Self {
            id: request.id,
            item: request.item,
            pickup: request.pickup,
            drop_location: request.drop_location,
            pickup_lat: request.pickup_lat,
            pickup_lng: request.pickup_lng,
            drop_lat: request.drop_lat,
            drop_lng: request.drop_lng,
            fare: request.fare,
            delivery_type: request.delivery_type,
            status: request.status,
            partner_name: request.partner_name,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDeliveryRequest {
    pub id: Option<String>,
    pub item: Option<String>,
    pub pickup: Option<String>,
    pub drop_location: Option<String>,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub drop_lat: Option<f64>,
    pub drop_lng: Option<f64>,
    #[serde(default, deserialize_with = "opaque_string")]
    pub fare: Option<String>,
    pub delivery_type: Option<String>,
    #[serde(default, deserialize_with = "opaque_string")]
    pub otp: Option<String>,
}

pub fn opaque_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    let value = Option::<StringOrNumber>::deserialize(deserializer)?;
    Ok(value.map(|value| match value {
        StringOrNumber::Text(text) => text,
        StringOrNumber::Number(number) => number.to_string(),
    }))
}
