//! Tubely-Common: IDs and errors shared by the tubely crates.
//!
//! # Examples
//!
//! ```
//! use tubely_common::{Error, Result, VideoId};
//!
//! let id: VideoId = "6f1c1f0e-6a43-4a38-9f6e-5b8e3c2f7d10".parse().unwrap();
//! assert_eq!(id.to_string(), "6f1c1f0e-6a43-4a38-9f6e-5b8e3c2f7d10");
//!
//! fn lookup() -> Result<()> {
//!     Err(Error::not_found("video"))
//! }
//! assert!(lookup().is_err());
//! ```

pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::*;
