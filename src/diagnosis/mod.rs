//! Diagnosis request lifecycle: input capture, guest gate, submission.

/// Text, voice and photo input.
pub mod aggregator;
/// Raw error message classification.
pub mod errors;
/// Shared value types and wire payloads.
pub mod model;
/// Dispatch and loading-stage state machine.
pub mod orchestrator;
/// Simulated progress and rotating texts.
pub mod progress;
/// Guest free-diagnosis gate.
pub mod quota;
/// Voice note capture and playback.
pub mod recorder;
/// Session aggregate and manager.
pub mod session;
/// Timer group torn down as one.
pub mod stage;
/// Saved or manual vehicle context.
pub mod vehicle;

#[cfg(test)]
pub(crate) mod test_support;
