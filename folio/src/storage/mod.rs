//! Storage module
//!
//! Provides file storage for uploaded PDF bytes.

pub mod blob_store;

pub use blob_store::BlobStore;
