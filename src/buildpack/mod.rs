//! Buildpack definitions, the registry that holds them, and the classifier
//! that picks one for a set of scanned signals.

mod classifier;
mod definition;
mod registry;

pub use classifier::{classify, classify_with_preference, Candidate, ClassificationResult};
pub use definition::{BuildpackDefinition, SignalPredicate, WeightedPredicate};
pub use registry::{BuildpackRegistry, ContentRule};
