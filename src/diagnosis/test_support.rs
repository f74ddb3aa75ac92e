//! In-test fakes for the remote collaborators and the audio device.

use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use super::{
    model::{DiagnosisRequest, DiagnosisResult, SavedVehicle, Urgency},
    recorder::{AudioBackend, RecorderError},
};
use crate::service::{DiagnosisService, GuestQuota, QuotaEndpoint, ServiceError, VehicleStore};

pub fn sample_result() -> DiagnosisResult {
    DiagnosisResult {
        urgency: Urgency::Medium,
        confidence: 0.7,
        summary: "Battery is weak".into(),
        possible_causes: vec!["Old battery".into()],
        recommended_actions: vec![],
        error_message: None,
        received_at: chrono::Local::now(),
    }
}

type MakeError = Box<dyn Fn() -> ServiceError + Send + Sync>;

pub struct FakeService {
    pub delay: Duration,
    fail_with: Option<MakeError>,
    pub calls: AtomicU32,
    pub last_request: Mutex<Option<DiagnosisRequest>>,
}

impl FakeService {
    pub fn ok(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            fail_with: None,
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        })
    }

    /// Every call fails with a fresh error built by `make`.
    pub fn failing<F>(delay: Duration, make: F) -> Arc<Self>
    where
        F: Fn() -> ServiceError + Send + Sync + 'static,
    {
        Arc::new(Self {
            delay,
            fail_with: Some(Box::new(make)),
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        })
    }

    /// Transport failure with the given detail.
    pub fn unreachable(delay: Duration, detail: &str) -> Arc<Self> {
        let detail = detail.to_string();
        Self::failing(delay, move || ServiceError::Network(detail.clone()))
    }

    /// HTTP error response carrying `message`.
    pub fn rejecting(delay: Duration, status: u16, message: &str) -> Arc<Self> {
        let message = message.to_string();
        Self::failing(delay, move || ServiceError::Api {
            status,
            message: message.clone(),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiagnosisService for FakeService {
    async fn diagnose(&self, request: DiagnosisRequest) -> Result<DiagnosisResult, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        tokio::time::sleep(self.delay).await;
        match &self.fail_with {
            Some(make) => Err(make()),
            None => Ok(sample_result()),
        }
    }
}

pub struct FakeQuota {
    answer: Result<i64, String>,
    calls: AtomicU32,
}

impl FakeQuota {
    pub fn remaining(n: i64) -> Self {
        Self {
            answer: Ok(n),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuotaEndpoint for FakeQuota {
    async fn guest_quota(&self) -> Result<GuestQuota, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Ok(remaining) => Ok(GuestQuota {
                remaining: *remaining,
            }),
            Err(m) => Err(ServiceError::Network(m.clone())),
        }
    }
}

pub fn sample_vehicle(id: &str) -> SavedVehicle {
    SavedVehicle {
        id: id.into(),
        year: Some(2017),
        make: "Toyota".into(),
        model: "Corolla".into(),
        mileage_km: Some(82_000),
    }
}

pub struct FakeVehicles(pub Result<Vec<SavedVehicle>, String>);

#[async_trait]
impl VehicleStore for FakeVehicles {
    async fn saved_vehicles(&self) -> Result<Vec<SavedVehicle>, ServiceError> {
        match &self.0 {
            Ok(list) => Ok(list.clone()),
            Err(m) => Err(ServiceError::Api {
                status: 500,
                message: m.clone(),
            }),
        }
    }
}

/// Audio device that records nothing but keeps a log of what it was asked.
#[derive(Default)]
pub struct FakeAudio {
    pub deny_permission: AtomicBool,
    pub log: Mutex<Vec<String>>,
    captures: AtomicU32,
}

impl FakeAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn denied() -> Arc<Self> {
        let audio = Self::default();
        audio.deny_permission.store(true, Ordering::SeqCst);
        Arc::new(audio)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl AudioBackend for FakeAudio {
    async fn request_permission(&self) -> bool {
        !self.deny_permission.load(Ordering::SeqCst)
    }

    async fn begin_capture(&self) -> Result<(), RecorderError> {
        self.push("begin".into());
        Ok(())
    }

    async fn finish_capture(&self) -> Result<PathBuf, RecorderError> {
        let n = self.captures.fetch_add(1, Ordering::SeqCst);
        self.push("finish".into());
        Ok(PathBuf::from(format!("voice-{n}.wav")))
    }

    async fn cancel_capture(&self) {
        self.push("cancel".into());
    }

    async fn play(&self, asset: &Path) -> Result<(), RecorderError> {
        self.push(format!("play {}", asset.display()));
        Ok(())
    }

    async fn pause(&self) {
        self.push("pause".into());
    }

    async fn stop_playback(&self) {
        self.push("stop".into());
    }

    async fn discard(&self, asset: &Path) {
        self.push(format!("discard {}", asset.display()));
    }
}
