//! Motion event recording.
//!
//! The detection loop only knows the [`Recorder`] contract: it reports
//! an event and gets back the identifiers of whatever artifacts were
//! produced. Persistence failures are handled inside the recorder and
//! show up as a shorter (possibly empty) list, never as an error.

mod recorder;
mod sequence;

pub use recorder::{ArtifactId, LogRecorder, Recorder, RecorderError};
pub use sequence::{SequenceRecorder, SnapshotSink};
