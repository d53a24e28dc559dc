use anyhow::Result;

use crate::detect::result::RawCandidate;

/// A detector backend turns a packed RGB frame into raw candidates.
///
/// Backends report per-class scores and normalized boxes; class selection,
/// confidence filtering, and overlap suppression happen in
/// `detect::postprocess`, not here. `detect` takes `&mut self` so backends
/// may keep internal state (model sessions, scratch buffers).
pub trait DetectorBackend: Send {
    /// Stable backend name used for registry lookups.
    fn name(&self) -> &'static str;

    /// Run detection over the given RGB8 pixels.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawCandidate>>;

    /// Optional one-time preparation (model warm-up, session allocation).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
