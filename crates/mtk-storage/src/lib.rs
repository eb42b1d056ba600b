//! Storage adapters for job inputs and outputs.
//!
//! This crate provides:
//! - `ObjectStorage` and `DriveStorage` capability traits
//! - An S3-compatible client built on the AWS SDK
//! - A Google Drive REST client authenticated with a service account
//! - `StorageAdapters`, the bundle injected into the worker at startup

pub mod adapters;
pub mod drive;
pub mod error;
pub mod s3;
pub mod token_cache;

pub use adapters::{DriveFile, DriveStorage, ObjectStorage, StorageAdapters, UploadedObject};
pub use drive::{DriveClient, DriveConfig};
pub use error::{StorageError, StorageResult};
pub use s3::{S3Client, S3Config};
pub use token_cache::{AccessTokenSource, StaticToken, TokenCache, DRIVE_SCOPE};
