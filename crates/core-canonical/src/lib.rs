//! Canonical serialization and digest engine for Custodia
//!
//! This crate turns a structured field map into one deterministic byte
//! sequence and hashes it, so that every ledger in the system derives the
//! same digest from the same logical payload.
//!
//! # Key Concepts
//!
//! - **Payload**: a map of field names to JSON values
//! - **Canonical form**: compact JSON, keys sorted, explicit nulls
//! - **Digest**: SHA-256 over the canonical bytes, lowercase hex
//!
//! # Example
//!
//! ```
//! use custodia_core_canonical::{canonicalize, digest, payload_from};
//! use serde_json::json;
//!
//! let payload = payload_from([
//!     ("uuid", json!("U1")),
//!     ("amount", json!("100.00")),
//! ]);
//!
//! let bytes = canonicalize(&payload).unwrap();
//! let hash = digest::compute(&bytes);
//! assert_eq!(hash.len(), 64);
//! ```

pub mod canonical;
pub mod digest;
pub mod error;
pub mod value;

// Re-export main types
pub use canonical::{canonical_string, canonicalize};
pub use error::{Error, Result};
pub use value::{fixed_amount, number_from_f64, payload_from, Payload};
