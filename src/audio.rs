//! Audio backend driving external record/play commands.

use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::{
    process::{Child, Command},
    sync::Mutex,
};
use uuid::Uuid;

use crate::{
    config::AudioCfg,
    diagnosis::recorder::{AudioBackend, RecorderError},
};

/// Capture in progress: the recorder process and its output file.
struct Capture {
    child: Child,
    path: PathBuf,
}

/// Runs `record_command <path>` to capture and `play_command <path>` to play.
pub struct CommandAudio {
    cfg: AudioCfg,
    capture: Mutex<Option<Capture>>,
    player: Mutex<Option<Child>>,
}

impl CommandAudio {
    pub fn new(cfg: AudioCfg) -> Self {
        Self {
            cfg,
            capture: Mutex::new(None),
            player: Mutex::new(None),
        }
    }

    fn spawn(argv: &[String], path: &Path) -> Result<Child, RecorderError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(RecorderError::Device("audio command is not configured".into()));
        };
        Command::new(program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecorderError::Device(format!("failed to start {program}: {e}")))
    }
}

/// How long a recorder gets to flush its file after SIGINT.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Kill a child process and reap it.
async fn terminate(mut child: Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!("failed to stop audio process: {e}");
    }
}

/// Send SIGINT so the recorder can finalize its header, then reap it.
/// Falls back to [`terminate`] when the signal fails or the grace runs out.
async fn interrupt(mut child: Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id().and_then(|id| libc::pid_t::try_from(id).ok()) {
        // SAFETY: `libc::kill` only takes plain integers; errno is read
        // immediately after the call on this thread.
        let rc = unsafe { libc::kill(pid, libc::SIGINT) };
        if rc == 0 {
            match tokio::time::timeout(STOP_GRACE, child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!("recorder exited after SIGINT: {status}");
                    return;
                }
                Ok(Err(e)) => tracing::warn!("waiting for recorder failed: {e}"),
                Err(_) => tracing::warn!("recorder ignored SIGINT for {STOP_GRACE:?}; killing"),
            }
        } else {
            let err = std::io::Error::last_os_error();
            tracing::warn!("SIGINT to recorder {pid} failed: {err}");
        }
    }
    terminate(child).await;
}

#[async_trait]
impl AudioBackend for CommandAudio {
    async fn request_permission(&self) -> bool {
        self.cfg.microphone_allowed && !self.cfg.record_command.is_empty()
    }

    async fn begin_capture(&self) -> Result<(), RecorderError> {
        let mut slot = self.capture.lock().await;
        if let Some(old) = slot.take() {
            terminate(old.child).await;
            let _ = tokio::fs::remove_file(&old.path).await;
        }
        tokio::fs::create_dir_all(&self.cfg.recordings_dir)
            .await
            .map_err(|e| RecorderError::Device(format!("recordings dir: {e}")))?;
        let path = Path::new(&self.cfg.recordings_dir).join(format!("voice-{}.wav", Uuid::new_v4()));
        let child = Self::spawn(&self.cfg.record_command, &path)?;
        tracing::info!("capture started: {}", path.display());
        *slot = Some(Capture { child, path });
        Ok(())
    }

    async fn finish_capture(&self) -> Result<PathBuf, RecorderError> {
        let Some(capture) = self.capture.lock().await.take() else {
            return Err(RecorderError::Device("no capture in progress".into()));
        };
        interrupt(capture.child).await;
        if tokio::fs::metadata(&capture.path).await.is_err() {
            return Err(RecorderError::Device(format!(
                "recorder produced no file at {}",
                capture.path.display()
            )));
        }
        tracing::info!("capture finished: {}", capture.path.display());
        Ok(capture.path)
    }

    async fn cancel_capture(&self) {
        if let Some(capture) = self.capture.lock().await.take() {
            terminate(capture.child).await;
            let _ = tokio::fs::remove_file(&capture.path).await;
        }
    }

    async fn play(&self, asset: &Path) -> Result<(), RecorderError> {
        let mut slot = self.player.lock().await;
        if let Some(old) = slot.take() {
            terminate(old).await;
        }
        *slot = Some(Self::spawn(&self.cfg.play_command, asset)?);
        Ok(())
    }

    // The player cannot seek, so pausing stops it and resume starts over.
    async fn pause(&self) {
        self.stop_playback().await;
    }

    async fn stop_playback(&self) {
        if let Some(child) = self.player.lock().await.take() {
            terminate(child).await;
        }
    }

    async fn discard(&self, asset: &Path) {
        if let Err(e) = tokio::fs::remove_file(asset).await {
            tracing::warn!("could not remove {}: {e}", asset.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(dir: &Path, record: &[&str]) -> AudioCfg {
        AudioCfg {
            microphone_allowed: true,
            recordings_dir: dir.to_string_lossy().into_owned(),
            record_command: record.iter().map(|s| s.to_string()).collect(),
            play_command: vec!["true".into()],
        }
    }

    #[tokio::test]
    async fn test_permission_needs_switch_and_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = cfg(dir.path(), &["arecord"]);
        assert!(CommandAudio::new(c.clone()).request_permission().await);
        c.microphone_allowed = false;
        assert!(!CommandAudio::new(c.clone()).request_permission().await);
        c.microphone_allowed = true;
        c.record_command.clear();
        assert!(!CommandAudio::new(c).request_permission().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_writes_voice_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio = CommandAudio::new(cfg(
            dir.path(),
            &["sh", "-c", "printf RIFF > \"$0\"; exec sleep 30"],
        ));
        audio.begin_capture().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let path = audio.finish_capture().await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("voice-") && name.ends_with(".wav"));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");

        audio.discard(&path).await;
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finish_lets_recorder_write_its_trailer() {
        let dir = tempfile::tempdir().unwrap();
        // Stands in for a recorder that patches its header on SIGINT.
        let script = "trap 'printf DONE >> \"$0\"; exit 0' INT; \
                      printf RIFF > \"$0\"; \
                      while :; do sleep 0.05; done";
        let audio = CommandAudio::new(cfg(dir.path(), &["sh", "-c", script]));
        audio.begin_capture().await.unwrap();

        // Wait for the script to install its trap and start writing.
        let wav = || {
            std::fs::read_dir(dir.path())
                .unwrap()
                .filter_map(Result::ok)
                .map(|e| e.path())
                .find(|p| p.extension().is_some_and(|x| x == "wav"))
        };
        for _ in 0..100 {
            if wav().is_some_and(|p| std::fs::read(p).unwrap_or_default() == b"RIFF") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let started = std::time::Instant::now();
        let path = audio.finish_capture().await.unwrap();
        assert!(started.elapsed() < STOP_GRACE);
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFFDONE");
    }

    #[tokio::test]
    async fn test_missing_program_is_device_error() {
        let dir = tempfile::tempdir().unwrap();
        let audio = CommandAudio::new(cfg(dir.path(), &["definitely-not-a-recorder-binary"]));
        let err = audio.begin_capture().await.unwrap_err();
        assert!(matches!(err, RecorderError::Device(_)));
        assert!(audio.finish_capture().await.is_err());
    }
}
