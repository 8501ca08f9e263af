//! Service layer: durable storage of client-submitted records.
//! - `store` defines the store contract used by the HTTP layer.
//! - `file` holds the file-backed implementation.
//! - `storage` holds the on-disk datafile format.

pub mod errors;
pub mod storage;
pub mod store;
pub mod file;

pub use errors::ServiceError;
pub use file::record_store::FileRecordStore;
pub use store::RecordStore;
