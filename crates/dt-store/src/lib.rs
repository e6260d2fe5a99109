//! Blob Store Adapter (C1) and Record Store Adapter (C2).

pub mod blob;
pub mod error;
pub mod memory;
pub mod record;
pub mod surreal;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryRecordStore;
pub use record::RecordStore;
pub use surreal::SurrealStore;
