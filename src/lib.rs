/*!
 * Custodia - Tamper-Evident Forensic Traceability Core
 *
 * An append-only audit mechanism for business-transaction systems:
 * - SHA-256 digests over canonically serialized payloads
 * - Two independent ledgers (event log + hash index) as dual witnesses
 * - Atomic dual-write recording for domain repositories
 * - Cross-verification and ground-truth re-verification
 * - Full-corpus integrity audits with cooperative cancellation
 * - Timeline reconstruction and ledger statistics
 *
 * Version: 0.3.0
 */

pub mod audit;
pub mod commands;
pub mod config;
pub mod error;
pub mod hash_index;
pub mod ledger;
pub mod logging;
pub mod recorder;
pub mod stats;
pub mod store;
pub mod timeline;
pub mod verify;

// Re-export commonly used types
pub use audit::{Auditor, CancelToken, IntegrityReport, MismatchDetail};
pub use config::{CoreConfig, LogLevel};
pub use error::{CustodiaError, Result, EXIT_FATAL, EXIT_INTEGRITY, EXIT_SUCCESS};
pub use hash_index::{HashIndex, HashRecord, HashSummary};
pub use ledger::{Action, AppendOutcome, Event, EventLedger, EventSummary, Mutation};
pub use recorder::{MutationRecorder, RecordedMutation};
pub use stats::{CountByKey, LedgerStats, Statistics};
pub use store::Store;
pub use timeline::{EventDetail, FieldChange, Timeline, TimelineEntry};
pub use verify::{CrossCheck, RecordCheck, Verdict, Verifier};

// Re-export the canonicalization crate for callers that compute digests
// themselves
pub use custodia_core_canonical as canonical;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
