pub mod local;
pub mod remote;

use crate::models::{AttemptOutcome, RawFrame};
use crate::utils::ScanError;

pub use local::LocalOcrBackend;
pub use remote::{RemoteOcrBackend, RemoteOcrConfig};

/// One recognition strategy: everything between a captured frame and a
/// structured field set. The scan controller drives whichever backend it
/// was configured with and never learns how recognition happens.
pub trait RecognitionBackend {
    fn name(&self) -> &str;

    /// Run recognition on a single frame. Soft misses (nothing found,
    /// check digits failed) are [`AttemptOutcome`] values; errors are
    /// reserved for broken input and broken engines.
    fn recognize_frame(&mut self, frame: &RawFrame) -> Result<AttemptOutcome, ScanError>;
}
