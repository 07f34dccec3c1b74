//! # Request Tokens
//!
//! Latest-request-wins bookkeeping for fetches.
//!
//! ## Stale Response Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  t0  issue(Snapshot, A)  → token #1  ──────────────┐ (slow)            │
//! │  t1  issue(Snapshot, A)  → token #2  ──┐           │                    │
//! │  t2  response #2 arrives               │ is_latest(#2) ✅ apply          │
//! │  t3  response #1 arrives                           │ is_latest(#1) ❌    │
//! │                                                      discard           │
//! │                                                                         │
//! │  Tokens work like an election term: a strictly increasing sequence,   │
//! │  and only the highest issued value for a (scope, operation) counts.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check must happen while holding the state write lock, so that a newer
//! response cannot be applied between an older response's check and its write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

use tally_core::Warehouse;

/// What a request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Warehouse(Warehouse),
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Warehouse(w) => write!(f, "warehouse {}", w),
        }
    }
}

/// Which kind of fetch a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Catalog,
    Snapshot,
    Counts,
    Rounds,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Catalog => write!(f, "catalog"),
            Operation::Snapshot => write!(f, "snapshot"),
            Operation::Counts => write!(f, "counts"),
            Operation::Rounds => write!(f, "rounds"),
        }
    }
}

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    pub scope: Scope,
    pub operation: Operation,
    pub seq: u64,
}

/// Issues tokens and remembers the latest per (scope, operation).
#[derive(Debug, Default)]
pub struct RequestTracker {
    next_seq: AtomicU64,
    latest: Mutex<HashMap<(Scope, Operation), u64>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new token, superseding every earlier one for the same key.
    pub async fn issue(&self, scope: Scope, operation: Operation) -> RequestToken {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest.lock().await.insert((scope, operation), seq);
        debug!(%scope, %operation, seq, "Issued request token");
        RequestToken {
            scope,
            operation,
            seq,
        }
    }

    /// True if no newer token has been issued for the token's key.
    pub async fn is_latest(&self, token: &RequestToken) -> bool {
        self.latest
            .lock()
            .await
            .get(&(token.scope, token.operation))
            .is_some_and(|&seq| seq == token.seq)
    }

    /// Latest issued sequence number for a key.
    pub async fn latest(&self, scope: Scope, operation: Operation) -> Option<u64> {
        self.latest.lock().await.get(&(scope, operation)).copied()
    }
}
