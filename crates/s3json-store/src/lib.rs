//! JSON objects in S3-compatible storage
//!
//! Two leaf utilities that share nothing but a bytes-in/bytes-out contract:
//!
//! - the local codec ([`to_json_pretty`], [`write_file`], [`save_local`]) turns
//!   records into indented JSON and writes it to disk;
//! - [`JsonStore`] lists, filters, reads and writes `.json` objects through an
//!   injected [`ObjectClient`], following listing continuation tokens to the end.
//!
//! [`S3Client`] backs the store with `aws-sdk-s3`; [`MemoryClient`] keeps
//! everything in process for tests and local runs.

mod client;
mod codec;
mod error;
mod listing;
mod memory;
mod s3;
mod store;

pub use client::{BoxError, ClientError, ObjectClient};
pub use codec::{save_local, to_json_pretty, write_file, write_file_atomic};
pub use error::{IoPhase, Result, StoreError};
pub use listing::{
    is_json_key, is_modified_after, ListPage, ListedObject, ObjectDescriptor, JSON_SUFFIX,
};
pub use memory::{MemoryClient, Operation};
pub use s3::{S3Client, S3Settings};
pub use store::{JsonStore, StoreOptions};
