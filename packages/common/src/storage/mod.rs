mod error;
mod hash;
mod locator;
mod traits;

pub mod filesystem;
pub mod hasher;

pub use error::StorageError;
pub use hash::ContentHash;
pub use hasher::{HashError, StreamDigest, digest_stream};
pub use locator::BlobLocator;
pub use traits::{BlobStore, BoxReader};
