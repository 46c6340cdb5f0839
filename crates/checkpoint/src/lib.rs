//! Checkpoint signaling between a supervised step and its supervisor
//!
//! The step process creates an empty signal file under the repository's
//! temp directory and blocks until the supervisor deletes it. The file's
//! existence is the whole protocol state.

pub mod monitor;
pub mod signal;

pub use monitor::{CheckpointMonitor, ShutdownReceiver, ShutdownSender};
pub use signal::{make_checkpoint, CheckpointSignal};
