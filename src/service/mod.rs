//! Remote collaborators: diagnosis, guest quota and the saved-vehicle store.

/// Caller identity handed to every request.
pub mod auth;
/// HTTP implementation of the service traits.
pub mod client;
/// Persistent guest device id.
pub mod device_store;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::diagnosis::model::{DiagnosisRequest, DiagnosisResult, SavedVehicle};

/// Failures from the remote side. The Display text is what the error
/// classifier sees, so transport failures always mention the network.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("failed to read {what} for upload: {source}")]
    Attachment {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

/// Remaining free diagnoses for an anonymous caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct GuestQuota {
    pub remaining: i64,
}

#[async_trait]
pub trait DiagnosisService: Send + Sync {
    async fn diagnose(&self, request: DiagnosisRequest) -> Result<DiagnosisResult, ServiceError>;
}

#[async_trait]
pub trait QuotaEndpoint: Send + Sync {
    async fn guest_quota(&self) -> Result<GuestQuota, ServiceError>;
}

#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn saved_vehicles(&self) -> Result<Vec<SavedVehicle>, ServiceError>;
}
