//! Output generation: downloaded files, manifests, and the run index.
//!
//! # Submodules
//!
//! - [`files`]: Atomic, idempotent storage of downloaded assets
//! - [`manifest`]: Writes an [`EditionReport`](crate::models::EditionReport) per edition as JSON
//! - [`indexes`]: Maintains the Markdown index of every harvested date
//!
//! # Output Structure
//!
//! ```text
//! downloads/
//! ├── INDEX.md                               # date → publication / edition
//! └── sakal/
//!     └── mumbai/
//!         ├── sakal_20250530_01.jpg
//!         ├── sakal_20250530_02.jpg
//!         └── manifest_2025-05-30.json
//! ```

pub mod files;
pub mod indexes;
pub mod manifest;
