//! Voice note capture and playback for a single diagnosis.

use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};
use thiserror::Error;

use super::{model::VoiceRecording, stage::Stage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Recorded,
    Playing,
    Paused,
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("microphone permission is required to record a voice note")]
    PermissionDenied,
    #[error("cannot {op} while {state:?}")]
    InvalidState {
        op: &'static str,
        state: RecorderState,
    },
    #[error("audio device error: {0}")]
    Device(String),
}

/// Microphone and speaker access. The recorder is the only owner.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn request_permission(&self) -> bool;
    async fn begin_capture(&self) -> Result<(), RecorderError>;
    /// Stop capturing and return where the audio was written.
    async fn finish_capture(&self) -> Result<PathBuf, RecorderError>;
    /// Stop capturing and throw the partial audio away.
    async fn cancel_capture(&self);
    async fn play(&self, asset: &Path) -> Result<(), RecorderError>;
    async fn pause(&self);
    async fn stop_playback(&self);
    async fn discard(&self, asset: &Path);
}

const TICK: Duration = Duration::from_secs(1);

pub struct Recorder {
    backend: Arc<dyn AudioBackend>,
    state: RecorderState,
    asset: Option<PathBuf>,
    duration_secs: u32,
    elapsed: Arc<AtomicU32>,
    position: Arc<AtomicU32>,
    /// One-second clock for the active recording or playback.
    clock: Option<Stage>,
}

impl Recorder {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            state: RecorderState::Idle,
            asset: None,
            duration_secs: 0,
            elapsed: Arc::new(AtomicU32::new(0)),
            position: Arc::new(AtomicU32::new(0)),
            clock: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Seconds captured so far while recording, else the final duration.
    pub fn elapsed_secs(&self) -> u32 {
        if self.state == RecorderState::Recording {
            self.elapsed.load(Ordering::SeqCst)
        } else {
            self.duration_secs
        }
    }

    pub fn position_secs(&self) -> u32 {
        self.position.load(Ordering::SeqCst)
    }

    /// The finished capture, if any.
    pub fn recording(&self) -> Option<VoiceRecording> {
        match self.state {
            RecorderState::Idle | RecorderState::Recording => None,
            _ => self.asset.as_ref().map(|asset| VoiceRecording {
                asset: asset.clone(),
                duration_secs: self.duration_secs,
            }),
        }
    }

    /// Begin a fresh capture. A previous capture is discarded once the new
    /// one has actually started.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        match self.state {
            RecorderState::Recording => return Err(self.invalid("start recording")),
            RecorderState::Playing | RecorderState::Paused => {
                self.clock = None;
                self.backend.stop_playback().await;
                self.position.store(0, Ordering::SeqCst);
                self.state = RecorderState::Recorded;
            }
            RecorderState::Idle | RecorderState::Recorded => {}
        }

        if !self.backend.request_permission().await {
            tracing::warn!("voice recording refused: microphone permission denied");
            return Err(RecorderError::PermissionDenied);
        }
        self.backend.begin_capture().await?;

        if let Some(previous) = self.asset.take() {
            self.backend.discard(&previous).await;
        }
        self.duration_secs = 0;
        self.elapsed.store(0, Ordering::SeqCst);

        let mut clock = Stage::new("recording");
        let elapsed = self.elapsed.clone();
        clock.every(TICK, move || {
            elapsed.fetch_add(1, Ordering::SeqCst);
            true
        });
        self.clock = Some(clock);
        self.state = RecorderState::Recording;
        tracing::info!("voice recording started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<VoiceRecording, RecorderError> {
        if self.state != RecorderState::Recording {
            return Err(self.invalid("stop recording"));
        }
        self.clock = None;
        let asset = match self.backend.finish_capture().await {
            Ok(asset) => asset,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        self.duration_secs = self.elapsed.load(Ordering::SeqCst);
        tracing::info!("voice recording stopped after {}s", self.duration_secs);
        self.asset = Some(asset.clone());
        self.state = RecorderState::Recorded;
        Ok(VoiceRecording {
            asset,
            duration_secs: self.duration_secs,
        })
    }

    /// Play, pause, or resume. Resuming restarts the clip from the top.
    pub async fn toggle_playback(&mut self) -> Result<(), RecorderError> {
        match self.state {
            RecorderState::Recorded | RecorderState::Paused => {
                let Some(asset) = self.asset.clone() else {
                    return Err(self.invalid("play"));
                };
                self.backend.play(&asset).await?;
                self.position.store(0, Ordering::SeqCst);
                let position = self.position.clone();
                let duration = self.duration_secs;
                let mut clock = Stage::new("playback");
                clock.every(TICK, move || position.fetch_add(1, Ordering::SeqCst) + 1 < duration);
                self.clock = Some(clock);
                self.state = RecorderState::Playing;
            }
            RecorderState::Playing => {
                self.clock = None;
                self.backend.pause().await;
                self.state = RecorderState::Paused;
            }
            RecorderState::Idle | RecorderState::Recording => return Err(self.invalid("play")),
        }
        Ok(())
    }

    /// Settle a playback that ran to the end. Returns true if it did.
    pub fn poll_playback(&mut self) -> bool {
        if self.state == RecorderState::Playing && self.position_secs() >= self.duration_secs {
            self.clock = None;
            self.position.store(0, Ordering::SeqCst);
            self.state = RecorderState::Recorded;
            return true;
        }
        false
    }

    /// Drop the capture and return to idle.
    pub async fn delete(&mut self) -> Result<(), RecorderError> {
        match self.state {
            RecorderState::Idle => return Err(self.invalid("delete")),
            RecorderState::Recording => {
                self.clock = None;
                self.backend.cancel_capture().await;
            }
            RecorderState::Playing | RecorderState::Paused => {
                self.clock = None;
                self.backend.stop_playback().await;
            }
            RecorderState::Recorded => {}
        }
        if let Some(asset) = self.asset.take() {
            self.backend.discard(&asset).await;
        }
        self.reset();
        tracing::info!("voice recording deleted");
        Ok(())
    }

    /// Release the device when the voice step goes away. A finished capture
    /// is kept; an unfinished one is thrown away.
    pub async fn release(&mut self) {
        match self.state {
            RecorderState::Recording => {
                self.backend.cancel_capture().await;
                self.reset();
            }
            RecorderState::Playing | RecorderState::Paused => {
                self.clock = None;
                self.backend.stop_playback().await;
                self.position.store(0, Ordering::SeqCst);
                self.state = RecorderState::Recorded;
            }
            RecorderState::Idle | RecorderState::Recorded => {}
        }
    }

    fn reset(&mut self) {
        self.clock = None;
        self.asset = None;
        self.duration_secs = 0;
        self.elapsed.store(0, Ordering::SeqCst);
        self.position.store(0, Ordering::SeqCst);
        self.state = RecorderState::Idle;
    }

    fn invalid(&self, op: &'static str) -> RecorderError {
        RecorderError::InvalidState {
            op,
            state: self.state,
        }
    }
}
