//! # DocMod Testkit
//!
//! Test utilities for DocMod.
//!
//! This crate provides:
//! - Document and store fixtures with realistic version histories
//! - Instrumented transforms and selectors
//! - A store wrapper that rejects a chosen save
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docmod_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     let store = memory_store(vec![DocBuilder::new(1).version("a", true).build()]);
//!     let transform = CountingTransform::new(Replace::new("a", "b"));
//!     // ... run a job
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stores;
pub mod transforms;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stores::*;
    pub use crate::transforms::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stores::*;
pub use transforms::*;
