// Text extraction from pasted profiles: structured fields, the self-PR block,
// and the A/B template classification derived from it.
// Everything here is pure and synchronous.

pub mod fields;
pub mod pattern;
pub mod self_pr;

pub use fields::{extract_fields, ExtractedFields, Gender};
pub use pattern::{classify, Pattern};
pub use self_pr::{extract_self_pr, SelfPrCandidate};
