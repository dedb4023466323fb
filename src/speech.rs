//! Speech output.
//!
//! `speak` never waits for audio. The command sink hands text to a worker
//! thread over a bounded queue and returns; when the queue is full the new
//! utterance is rejected so narration never trails the scene.

use std::io::ErrorKind;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use thiserror::Error;

use crate::config::SpeechSettings;

/// Consecutive failed runs after which the synthesizer counts as gone.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpeechError {
    /// The synthesizer is gone; no later call can succeed.
    #[error("speech synthesizer unavailable: {0}")]
    Unavailable(String),

    /// This utterance was refused; the sink itself still works.
    #[error("utterance rejected: {0}")]
    Rejected(String),
}

/// Fire-and-forget speech output.
pub trait SpeechSink {
    /// Queue `text` for speaking.
    fn speak(&mut self, text: &str) -> Result<(), SpeechError>;

    /// Stop accepting text and release the synthesizer.
    fn shutdown(&mut self) {}
}

impl<S: SpeechSink + ?Sized> SpeechSink for Box<S> {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        (**self).speak(text)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

// ----------------------------------------------------------------------------
// CommandSpeechSink: external synthesizer process
// ----------------------------------------------------------------------------

/// Speaks by running an external program (`espeak` by default) once per
/// utterance on a background thread.
pub struct CommandSpeechSink {
    program: String,
    tx: Option<SyncSender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl CommandSpeechSink {
    pub fn spawn(settings: &SpeechSettings) -> Self {
        let (tx, rx) = mpsc::sync_channel::<String>(settings.queue_depth.max(1));
        let program = settings.command.clone();
        let args = command_args(settings);

        let worker_program = program.clone();
        let worker = std::thread::Builder::new()
            .name("speech".into())
            .spawn(move || {
                let mut failures = 0u32;
                for text in rx {
                    log::debug!("speech: speaking {:?}", text);
                    let status = Command::new(&worker_program)
                        .args(&args)
                        .arg(&text)
                        .stdin(Stdio::null())
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status();
                    match status {
                        Ok(status) if status.success() => {
                            failures = 0;
                            continue;
                        }
                        Ok(status) => {
                            log::warn!("speech: {} exited with {}", worker_program, status)
                        }
                        Err(err) if err.kind() == ErrorKind::NotFound => {
                            log::error!("speech: {} not found", worker_program);
                            break;
                        }
                        Err(err) => log::warn!("speech: failed to run {}: {}", worker_program, err),
                    }
                    failures += 1;
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        log::error!(
                            "speech: {} failed {} times in a row, giving up",
                            worker_program,
                            failures
                        );
                        break;
                    }
                }
            });

        match worker {
            Ok(worker) => Self {
                program,
                tx: Some(tx),
                worker: Some(worker),
            },
            Err(err) => {
                log::error!("speech: failed to start worker: {}", err);
                Self {
                    program,
                    tx: None,
                    worker: None,
                }
            }
        }
    }
}

fn command_args(settings: &SpeechSettings) -> Vec<String> {
    let mut args = settings.args.clone();
    if settings.rate_wpm > 0 {
        args.push("-s".to_string());
        args.push(settings.rate_wpm.to_string());
    }
    args
}

impl SpeechSink for CommandSpeechSink {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::Rejected("empty utterance".into()));
        }
        let Some(tx) = &self.tx else {
            return Err(SpeechError::Unavailable(self.program.clone()));
        };
        match tx.try_send(text.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(SpeechError::Rejected("speech queue full".into()))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.tx = None;
                Err(SpeechError::Unavailable(self.program.clone()))
            }
        }
    }

    fn shutdown(&mut self) {
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("speech: worker panicked");
            }
        }
    }
}

impl Drop for CommandSpeechSink {
    fn drop(&mut self) {
        // Let queued speech finish on its own; don't block the caller.
        self.tx = None;
    }
}

// ----------------------------------------------------------------------------
// Muted and recording sinks
// ----------------------------------------------------------------------------

/// Sink used when narration is muted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSpeechSink;

impl SpeechSink for NullSpeechSink {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        log::debug!("speech (muted): {}", text);
        Ok(())
    }
}

/// Sink that records utterances in memory. Clones share the record.
#[derive(Clone, Debug, Default)]
pub struct RecordingSpeechSink {
    spoken: Arc<Mutex<Vec<String>>>,
    fail_after: Option<usize>,
}

impl RecordingSpeechSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` utterances, then report the synthesizer unavailable.
    pub fn failing_after(count: usize) -> Self {
        Self {
            spoken: Arc::default(),
            fail_after: Some(count),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SpeechSink for RecordingSpeechSink {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        let mut spoken = self
            .spoken
            .lock()
            .map_err(|_| SpeechError::Unavailable("recording lock poisoned".into()))?;
        if self.fail_after.is_some_and(|limit| spoken.len() >= limit) {
            return Err(SpeechError::Unavailable("recording".into()));
        }
        spoken.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn rate_is_passed_as_flag() {
        let settings = SpeechSettings {
            args: vec!["-v".into(), "en".into()],
            rate_wpm: 150,
            ..SpeechSettings::default()
        };
        assert_eq!(command_args(&settings), vec!["-v", "en", "-s", "150"]);

        let settings = SpeechSettings {
            rate_wpm: 0,
            ..SpeechSettings::default()
        };
        assert!(command_args(&settings).is_empty());
    }

    #[test]
    fn missing_program_becomes_unavailable() {
        let settings = SpeechSettings {
            command: "definitely-not-a-speech-synthesizer".into(),
            ..SpeechSettings::default()
        };
        let mut sink = CommandSpeechSink::spawn(&settings);

        // The first utterance is accepted; the worker then finds no program.
        assert!(sink.speak("hello").is_ok());
        let result = speak_until_error(&mut sink, Duration::from_secs(5));
        assert!(matches!(result, Err(SpeechError::Unavailable(_))));
        sink.shutdown();
    }

    /// Call `speak` until the sink reports itself unavailable or `timeout` passes.
    fn speak_until_error(sink: &mut CommandSpeechSink, timeout: Duration) -> Result<(), SpeechError> {
        let deadline = Instant::now() + timeout;
        let mut result = Ok(());
        while Instant::now() < deadline {
            result = sink.speak("hello again");
            if matches!(result, Err(SpeechError::Unavailable(_))) {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        result
    }

    #[test]
    fn synthesizer_that_always_fails_becomes_unavailable() {
        let settings = SpeechSettings {
            command: "false".into(),
            rate_wpm: 0,
            ..SpeechSettings::default()
        };
        let mut sink = CommandSpeechSink::spawn(&settings);
        let result = speak_until_error(&mut sink, Duration::from_secs(5));
        assert!(matches!(result, Err(SpeechError::Unavailable(_))));
        sink.shutdown();
    }

    #[test]
    fn full_queue_rejects_without_disconnecting() {
        // Each utterance runs `sleep 0.3 0.3`, keeping the worker busy.
        let settings = SpeechSettings {
            command: "sleep".into(),
            args: vec!["0.3".into()],
            rate_wpm: 0,
            queue_depth: 1,
            ..SpeechSettings::default()
        };
        let mut sink = CommandSpeechSink::spawn(&settings);
        let results: Vec<_> = (0..3).map(|_| sink.speak("0.3")).collect();
        assert!(results[0].is_ok());
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(SpeechError::Rejected(_)))));
        assert!(!results
            .iter()
            .any(|r| matches!(r, Err(SpeechError::Unavailable(_)))));
        sink.shutdown();
    }

    #[test]
    fn blank_text_is_rejected() {
        let mut sink = CommandSpeechSink::spawn(&SpeechSettings::default());
        assert!(matches!(sink.speak("  "), Err(SpeechError::Rejected(_))));
        sink.shutdown();
    }

    #[test]
    fn recording_sink_can_fail_on_demand() {
        let mut sink = RecordingSpeechSink::failing_after(1);
        assert!(sink.speak("one").is_ok());
        assert!(sink.speak("two").is_err());
        assert_eq!(sink.spoken(), vec!["one"]);
    }
}
