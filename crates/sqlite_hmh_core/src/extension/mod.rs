//! SQLite extension registration.
//!
//! This module resolves what the running host and this build support, turns
//! that into a fixed table of SQL function descriptors and installs the table
//! through an [`registrar::ExtensionHost`]. Sketch semantics live in
//! [`crate::engine`].

pub mod capability;
pub mod descriptor;
pub mod registrar;
