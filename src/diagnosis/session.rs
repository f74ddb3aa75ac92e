//! The per-journey aggregate and the manager that hands it to each step.

use std::sync::Arc;

use uuid::Uuid;

use super::{
    aggregator::InputAggregator,
    errors::{ClassifiedError, ErrorCategory},
    model::{DiagnosisRequest, DiagnosisResult},
    orchestrator::{Outcome, StageTiming, SubmissionOrchestrator},
    progress::LoadingView,
    quota::GuestQuotaTracker,
    vehicle::VehicleLinker,
};
use crate::service::{DiagnosisService, QuotaEndpoint, auth::AuthContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Draft,
    Submitting,
    Succeeded,
    Failed,
}

/// Where the presentation layer should go next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    ToResult,
    ToSignUp,
    ToInputWithError(ClassifiedError),
}

/// State of one user journey, from category pick to result view.
#[derive(Debug)]
pub struct DiagnosisSession {
    pub id: Uuid,
    pub input: InputAggregator,
    pub vehicle: VehicleLinker,
    pub quota: GuestQuotaTracker,
    status: SessionStatus,
    result: Option<DiagnosisResult>,
    error: Option<ClassifiedError>,
}

impl DiagnosisSession {
    fn new(is_guest: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            input: InputAggregator::new(),
            vehicle: VehicleLinker::new(),
            quota: GuestQuotaTracker::new(is_guest),
            status: SessionStatus::Draft,
            result: None,
            error: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn result(&self) -> Option<&DiagnosisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&ClassifiedError> {
        self.error.as_ref()
    }

    fn request(&self) -> DiagnosisRequest {
        DiagnosisRequest {
            category: self.input.category(),
            description: self.input.description().trim().to_string(),
            voice: self.input.voice().cloned(),
            photos: self.input.photos().to_vec(),
            vehicle: self.vehicle.association(),
        }
    }
}

/// Owns the active session and its orchestrator. Only the step holding
/// focus gets `&mut` access, so steps never write concurrently.
pub struct SessionManager {
    service: Arc<dyn DiagnosisService>,
    auth: AuthContext,
    timing: StageTiming,
    session: Option<DiagnosisSession>,
    orchestrator: SubmissionOrchestrator,
}

impl SessionManager {
    pub fn new(service: Arc<dyn DiagnosisService>, auth: AuthContext, timing: StageTiming) -> Self {
        Self {
            service,
            auth,
            timing,
            session: None,
            orchestrator: SubmissionOrchestrator::new(timing),
        }
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Create the session on entry to the first step; reuses a live one.
    pub fn begin(&mut self) -> &mut DiagnosisSession {
        if self.session.is_none() {
            self.orchestrator = SubmissionOrchestrator::new(self.timing);
        }
        let is_guest = self.auth.is_guest;
        self.session.get_or_insert_with(|| {
            let session = DiagnosisSession::new(is_guest);
            tracing::info!("diagnosis session {} started", session.id);
            session
        })
    }

    pub fn session(&self) -> Option<&DiagnosisSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut DiagnosisSession> {
        self.session.as_mut()
    }

    pub fn loading_view(&self) -> &LoadingView {
        self.orchestrator.view()
    }

    /// Run the quota check for the current review visit.
    pub async fn check_guest_quota(&mut self, endpoint: &dyn QuotaEndpoint) {
        if let Some(session) = self.session.as_mut() {
            session.quota.check(endpoint).await;
        }
    }

    /// Dispatch the diagnosis. Returns a navigation signal when the request
    /// is refused up front; `None` means either nothing happened (no session,
    /// or already submitting) or the dispatch is now in flight.
    pub fn submit(&mut self) -> Option<Navigation> {
        let session = self.session.as_mut()?;
        if session.status != SessionStatus::Draft {
            tracing::warn!("submit ignored: session is {:?}", session.status);
            return None;
        }
        if !session.input.is_valid() {
            let error = ClassifiedError::with_category(
                ErrorCategory::MissingDescription,
                "description too short and no voice recording or photos attached",
            );
            tracing::warn!("submit rejected locally: {error}");
            session.status = SessionStatus::Failed;
            session.error = Some(error.clone());
            return Some(Navigation::ToInputWithError(error));
        }
        if !session.quota.can_diagnose() {
            tracing::info!("guest has no verified free diagnoses; asking to sign up");
            return Some(Navigation::ToSignUp);
        }

        let request = session.request();
        if self.orchestrator.start(self.service.clone(), request) {
            session.status = SessionStatus::Submitting;
        }
        None
    }

    /// Apply queued loading events without blocking (UI loop).
    pub fn poll(&mut self) -> Option<Navigation> {
        let outcome = self.orchestrator.try_next()?;
        self.settle(outcome)
    }

    /// Wait for the in-flight dispatch to finish.
    pub async fn wait(&mut self) -> Option<Navigation> {
        let outcome = self.orchestrator.next_outcome().await?;
        self.settle(outcome)
    }

    fn settle(&mut self, outcome: Outcome) -> Option<Navigation> {
        let session = self.session.as_mut()?;
        match outcome {
            Outcome::Succeeded(result) => {
                session.status = SessionStatus::Succeeded;
                session.result = Some(result);
                Some(Navigation::ToResult)
            }
            Outcome::Failed(error) => {
                session.status = SessionStatus::Failed;
                session.error = Some(error.clone());
                // A guest the server turned away for quota can only sign up.
                if session.quota.is_guest() && error.category == ErrorCategory::QuotaExceeded {
                    tracing::info!("server reports guest quota exhausted; asking to sign up");
                    return Some(Navigation::ToSignUp);
                }
                Some(Navigation::ToInputWithError(error))
            }
        }
    }

    /// Reset the inputs and vehicle of the live session.
    pub fn clear_input(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.input.clear();
            session.vehicle.clear();
        }
    }

    /// Leave the result view: the session ends here.
    pub fn clear_result(&mut self) {
        self.end("result dismissed");
    }

    /// Acknowledge a failure. The failed session is replaced by a fresh
    /// draft that keeps what the user already entered.
    pub fn clear_error(&mut self) {
        let Some(old) = self.session.take() else {
            return;
        };
        self.orchestrator.cancel();
        self.orchestrator = SubmissionOrchestrator::new(self.timing);
        let mut fresh = DiagnosisSession::new(self.auth.is_guest);
        fresh.input = old.input;
        fresh.vehicle = old.vehicle;
        tracing::info!("session {} replaced by {} after error", old.id, fresh.id);
        self.session = Some(fresh);
    }

    /// Abandon the journey, including any in-flight dispatch.
    pub fn abort(&mut self) {
        self.end("aborted");
    }

    fn end(&mut self, why: &str) {
        self.orchestrator.cancel();
        if let Some(session) = self.session.take() {
            tracing::info!("diagnosis session {} ended: {why}", session.id);
        }
    }

    #[cfg(test)]
    fn with_orchestrator(mut self, orchestrator: SubmissionOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }
}
