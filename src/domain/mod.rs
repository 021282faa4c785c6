//! Pure domain types and logic: configuration model, normalized feed items,
//! item identity, and retry backoff.
pub mod backoff;
pub mod identity;
pub mod model;
