pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;
