//! Object detection: backend abstraction, raw-output post-processing,
//! and the backend registry.
//!
//! A backend turns pixels into `RawCandidate`s; post-processing turns
//! candidates into final `Detection`s (class selection, confidence
//! filtering, overlap suppression). The split keeps model-specific code
//! behind the `DetectorBackend` trait and the selection rules testable
//! without a model.

pub mod backend;
pub mod backends;
pub mod classes;
pub mod postprocess;
pub mod registry;
pub mod result;

pub use backend::DetectorBackend;
pub use backends::stub::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::tract::TractBackend;
pub use classes::{class_label, PERSON_CLASS_ID};
pub use postprocess::{
    select_candidates, suppress_overlaps, CONFIDENCE_THRESHOLD, SUPPRESSION_THRESHOLD,
};
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection, NormalizedBox, RawCandidate};
