//! Single asynchronous diagnosis dispatch with cosmetic loading feedback.
//!
//! While a request is in flight three timers run on one [`Stage`]: a progress
//! tick, a status-message rotation and a fact rotation. The network call runs
//! detached next to them. Every timer and the request report back over one
//! channel, and this type is the only thing that mutates the loading view, so
//! ordering questions are settled by the order events are applied.

use std::{sync::Arc, time::Duration};

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::mpsc;

use super::{
    errors::ClassifiedError,
    model::{DiagnosisRequest, DiagnosisResult},
    progress::{self, LoadingView, NAVIGATION_THRESHOLD},
    stage::Stage,
};
use crate::{config::LoadingCfg, service::DiagnosisService};

/// Interval lengths for the loading stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageTiming {
    pub progress_tick: Duration,
    pub status_rotate: Duration,
    pub fact_rotate: Duration,
    /// Pause between a complete-looking bar and leaving the screen.
    pub settle: Duration,
}

impl Default for StageTiming {
    fn default() -> Self {
        Self {
            progress_tick: Duration::from_millis(300),
            status_rotate: Duration::from_millis(3000),
            fact_rotate: Duration::from_millis(5000),
            settle: Duration::from_millis(500),
        }
    }
}

impl From<&LoadingCfg> for StageTiming {
    fn from(cfg: &LoadingCfg) -> Self {
        Self {
            progress_tick: Duration::from_millis(cfg.progress_tick_ms),
            status_rotate: Duration::from_millis(cfg.status_rotate_ms),
            fact_rotate: Duration::from_millis(cfg.fact_rotate_ms),
            settle: Duration::from_millis(cfg.settle_ms),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Terminal result of one dispatch.
#[derive(Clone, Debug)]
pub enum Outcome {
    Succeeded(DiagnosisResult),
    Failed(ClassifiedError),
}

#[derive(Debug)]
enum StageEvent {
    Tick,
    RotateMessage,
    RotateFact,
    Resolved(Result<DiagnosisResult, String>),
    Settled,
}

pub struct SubmissionOrchestrator {
    timing: StageTiming,
    state: SubmissionState,
    view: LoadingView,
    /// Result that arrived but has not been handed off yet.
    pending: Option<DiagnosisResult>,
    stage: Option<Stage>,
    events_tx: Option<mpsc::UnboundedSender<StageEvent>>,
    events_rx: Option<mpsc::UnboundedReceiver<StageEvent>>,
    rng: StdRng,
}

impl SubmissionOrchestrator {
    pub fn new(timing: StageTiming) -> Self {
        let mut thread = rand::rng();
        Self::with_rng(timing, StdRng::from_rng(&mut thread))
    }

    pub fn with_rng(timing: StageTiming, rng: StdRng) -> Self {
        Self {
            timing,
            state: SubmissionState::Idle,
            view: LoadingView::default(),
            pending: None,
            stage: None,
            events_tx: None,
            events_rx: None,
            rng,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn view(&self) -> &LoadingView {
        &self.view
    }

    /// Start the dispatch. Returns false, without dispatching, unless idle.
    pub fn start(&mut self, service: Arc<dyn DiagnosisService>, request: DiagnosisRequest) -> bool {
        if self.state != SubmissionState::Idle {
            tracing::warn!("submit ignored: orchestrator is {:?}", self.state);
            return false;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut stage = Stage::new("loading");

        let t = tx.clone();
        stage.every(self.timing.progress_tick, move || t.send(StageEvent::Tick).is_ok());
        let t = tx.clone();
        stage.every(self.timing.status_rotate, move || {
            t.send(StageEvent::RotateMessage).is_ok()
        });
        let t = tx.clone();
        stage.every(self.timing.fact_rotate, move || {
            t.send(StageEvent::RotateFact).is_ok()
        });

        let t = tx.clone();
        let token = stage.token();
        stage.detach(async move {
            let outcome = service.diagnose(request).await.map_err(|e| e.to_string());
            if token.is_cancelled() {
                tracing::info!("diagnosis resolved after teardown; dropped");
                return;
            }
            let _ = t.send(StageEvent::Resolved(outcome));
        });

        tracing::info!("diagnosis dispatched");
        self.state = SubmissionState::Submitting;
        self.view = LoadingView::default();
        self.pending = None;
        self.stage = Some(stage);
        self.events_tx = Some(tx);
        self.events_rx = Some(rx);
        true
    }

    /// Apply everything already queued without waiting.
    pub fn try_next(&mut self) -> Option<Outcome> {
        loop {
            let ev = self.events_rx.as_mut()?.try_recv().ok()?;
            if let Some(outcome) = self.apply(ev) {
                return Some(outcome);
            }
        }
    }

    /// Wait until the dispatch reaches a terminal outcome.
    /// Returns `None` when nothing is in flight.
    pub async fn next_outcome(&mut self) -> Option<Outcome> {
        loop {
            let ev = self.events_rx.as_mut()?.recv().await?;
            if let Some(outcome) = self.apply(ev) {
                return Some(outcome);
            }
        }
    }

    fn apply(&mut self, ev: StageEvent) -> Option<Outcome> {
        if self.state != SubmissionState::Submitting {
            return None;
        }
        match ev {
            StageEvent::Tick => {
                // A received result pins the bar at 100.
                if self.pending.is_none() {
                    self.view.progress = progress::advance(self.view.progress, &mut self.rng);
                }
                None
            }
            StageEvent::RotateMessage => {
                self.view.rotate_message();
                None
            }
            StageEvent::RotateFact => {
                self.view.rotate_fact();
                None
            }
            StageEvent::Resolved(Ok(result)) => {
                tracing::info!(
                    "diagnosis received at simulated {:.1}%: urgency {:?}",
                    self.view.progress,
                    result.urgency
                );
                self.view.progress = 100.0;
                self.pending = Some(result);
                self.arm_settle();
                None
            }
            StageEvent::Resolved(Err(raw)) => {
                let error = ClassifiedError::classify(raw);
                tracing::error!("diagnosis failed: {error}");
                self.state = SubmissionState::Failed;
                self.teardown();
                Some(Outcome::Failed(error))
            }
            StageEvent::Settled => {
                if self.view.progress < NAVIGATION_THRESHOLD {
                    self.arm_settle();
                    return None;
                }
                let result = self.pending.take()?;
                self.state = SubmissionState::Succeeded;
                self.teardown();
                Some(Outcome::Succeeded(result))
            }
        }
    }

    /// Schedule the hand-off check one settle delay from now.
    fn arm_settle(&mut self) {
        if let (Some(stage), Some(tx)) = (self.stage.as_mut(), self.events_tx.clone()) {
            stage.after(self.timing.settle, move || {
                let _ = tx.send(StageEvent::Settled);
            });
        }
    }

    /// Release every timer; a late network result becomes a no-op.
    /// An abandoned dispatch returns to idle.
    pub fn cancel(&mut self) {
        if self.state == SubmissionState::Submitting {
            tracing::info!("submission abandoned at {:.1}%", self.view.progress);
            self.state = SubmissionState::Idle;
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        self.stage = None;
        self.events_tx = None;
        self.events_rx = None;
        self.pending = None;
    }

    /// Live timers on the loading stage, 0 once torn down.
    pub fn live_timers(&self) -> usize {
        self.stage.as_ref().map_or(0, Stage::live_timers)
    }
}
