//! Storage building blocks for the service layer
//!
//! Low-level on-disk formats used by the file-backed stores.

pub mod datafile;
