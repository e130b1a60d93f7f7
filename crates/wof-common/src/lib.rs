//! Who's On First Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, parsing and logging for the wof-pgis workspace.
//!
//! # Overview
//!
//! - **Features**: GeoJSON feature records with typed access to the
//!   `wof:*` property namespace
//! - **Placetypes**: the placetype vocabulary and its numeric codes
//! - **Error Handling**: error and result types shared by all members
//! - **Logging**: tracing subscriber setup for binaries
//!
//! # Example
//!
//! ```no_run
//! use wof_common::{Feature, Placetypes, Result};
//!
//! fn placetype_code(path: &str) -> Result<i64> {
//!     let feature = Feature::from_path(path)?;
//!     let placetypes = Placetypes::new();
//!     Ok(placetypes.by_name(feature.placetype())?.id)
//! }
//! ```

pub mod error;
pub mod feature;
pub mod logging;
pub mod placetypes;

// Re-export commonly used types
pub use error::{Result, WofError};
pub use feature::{Feature, Hierarchy, EARTH_ID};
pub use placetypes::{Placetype, Placetypes};
