//! Core types and protocols for the UDF registry client.
//!
//! This crate holds everything that does not touch the network: the module
//! model, content fingerprinting and wire encoding, chunked transfer
//! bookkeeping, info framing and the mapping of node-reported failures.

#![warn(missing_docs)]

pub mod content;
pub mod error;
pub mod protocol;
pub mod status;
pub mod transfer;
pub mod udf;

pub use content::{fingerprint, hashes_match, HashAlgorithm};
pub use error::{Result, UdfError};
pub use protocol::{InfoCodec, InfoCommand, UdfListing};
pub use status::ServerReport;
pub use transfer::{Reassembler, TransferChunk, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
pub use udf::{validate_name, UdfDescriptor, UdfModule, UdfType, MAX_NAME_LEN};
