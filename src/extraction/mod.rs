//! # Extraction Subsystem
//!
//! Batched enrichment of stored messages: the inference client capability,
//! candidate normalization, and the recurring extraction job.

pub mod inference;
pub mod job;
pub mod normalize;

pub use inference::{HttpInferenceClient, InferenceClient, InferenceError, MessageInference};
pub use job::{ExtractionJob, JobStatus, PassSummary};
pub use normalize::{Furnishing, ListingType, NormalizedCandidate, PropertyType};
