//! Evaluation layer: batch runs, adversarial profile search, and gap
//! metrics.

pub mod adversarial;
pub mod batch;
pub mod gap;
