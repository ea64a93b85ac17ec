//! Document-level data for Lottie compositions.
//!
//! [`document`] reads individual fields out of a parsed JSON tree with typed
//! failures; [`model`] is the serde schema of a single layer object.

pub mod document;
pub mod model;

pub use document::{Document, FieldError};
