//! # Inventory Session
//!
//! Drives an [`InventoryState`] against a [`CountingService`].
//!
//! ## Load Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Load (e.g. snapshot A)                      │
//! │                                                                         │
//! │  issue token ──► fetch (timeout) ──► take state write lock              │
//! │                                             │                           │
//! │                           still latest token for (scope, op)?           │
//! │                              │ no                      │ yes            │
//! │                              ▼                         ▼                │
//! │                     LoadOutcome::Superseded     ingest + replace        │
//! │                     (result discarded)               │                  │
//! │                                          ┌───────────┴──────────┐       │
//! │                                          ▼                      ▼       │
//! │                                       Applied            Load / Timeout │
//! │                                   (report counts)      previous data    │
//! │                                                        kept + warning   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two-Phase Operations
//! Anything that would have needed a blocking confirmation is split into a
//! `preview_*` call that returns warnings and a commit call that applies.
//! The session never waits on the operator.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use tally_core::ingest::{self, IngestReport};
use tally_core::validation::validate_round_number;
use tally_core::{
    AvailableRound, ConsolidatedLine, ConsolidatedReport, CoreError, CountOutcome, CountPreview,
    InventoryState, Page, PaginationCursor, Product, Quantity, Reconciliation, ReconciliationRow,
    Round, RoundMetadata, Warehouse,
};

use crate::config::TallyConfig;
use crate::dataset::DatasetDirectory;
use crate::error::{LoadTarget, SyncError, SyncResult};
use crate::service::{CountingService, SubmitReceipt};
use crate::tokens::{Operation, RequestTracker, Scope};

// =============================================================================
// Outcomes
// =============================================================================

/// What happened to a fetched payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The payload replaced the previous data.
    Applied { report: IngestReport },
    /// A newer request for the same data was issued; this result was dropped.
    Superseded,
}

impl LoadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, LoadOutcome::Applied { .. })
    }

    pub fn report(&self) -> Option<&IngestReport> {
        match self {
            LoadOutcome::Applied { report } => Some(report),
            LoadOutcome::Superseded => None,
        }
    }
}

/// Result of refreshing every warehouse snapshot for a round.
#[derive(Debug)]
pub struct SnapshotRefresh {
    pub outcomes: Vec<(Warehouse, SyncResult<LoadOutcome>)>,
    /// Rebuilt after every fetch finished, whatever their outcome.
    pub report: ConsolidatedReport,
}

/// What submitting a round would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPreview {
    pub warehouse: Warehouse,
    pub round_id: String,
    pub number: String,
    pub entry_count: usize,
    /// Catalog codes without a count (they will reconcile as zero).
    pub uncounted: Vec<String>,
    /// Counted codes missing from the catalog.
    pub unknown_codes: Vec<String>,
    pub already_closed: bool,
}

impl SubmitPreview {
    pub fn needs_confirmation(&self) -> bool {
        !self.uncounted.is_empty() || !self.unknown_codes.is_empty() || self.entry_count == 0
    }
}

/// A successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub receipt: SubmitReceipt,
    /// The round after its local close.
    pub round: Round,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Notifications for the presentation layer.
pub trait SessionEventEmitter: Send + Sync {
    /// A payload was applied.
    fn emit_loaded(&self, target: LoadTarget, report: &IngestReport);

    /// A non-fatal problem (failed load, timeout, dropped rows).
    fn emit_warning(&self, message: &str, is_timeout: bool);

    /// A round was opened, joined, hydrated or closed.
    fn emit_round_changed(&self, round: &Round);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SessionEventEmitter for NoOpEmitter {
    fn emit_loaded(&self, _target: LoadTarget, _report: &IngestReport) {}
    fn emit_warning(&self, _message: &str, _is_timeout: bool) {}
    fn emit_round_changed(&self, _round: &Round) {}
}

// =============================================================================
// Inventory Session
// =============================================================================

/// Async front of one inventory-counting session.
pub struct InventorySession {
    service: Arc<dyn CountingService>,
    config: Arc<TallyConfig>,
    state: RwLock<InventoryState>,
    /// Last known good list for the join flow.
    available: RwLock<Vec<AvailableRound>>,
    tracker: RequestTracker,
    emitter: Arc<dyn SessionEventEmitter>,
}

impl InventorySession {
    pub fn new(service: Arc<dyn CountingService>, config: TallyConfig) -> Self {
        Self::with_emitter(service, config, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        service: Arc<dyn CountingService>,
        config: TallyConfig,
        emitter: Arc<dyn SessionEventEmitter>,
    ) -> Self {
        InventorySession {
            service,
            config: Arc::new(config),
            state: RwLock::new(InventoryState::new()),
            available: RwLock::new(Vec::new()),
            tracker: RequestTracker::new(),
            emitter,
        }
    }

    /// Session over the configured dataset directory.
    pub fn from_config(config: TallyConfig) -> Self {
        let dataset = DatasetDirectory::new(config.service.dataset_dir.clone());
        Self::new(Arc::new(dataset), config)
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    /// Read access to every store.
    pub async fn state(&self) -> RwLockReadGuard<'_, InventoryState> {
        self.state.read().await
    }

    // =========================================================================
    // Loads
    // =========================================================================

    /// Reloads the catalog. On failure the previous catalog stays.
    pub async fn refresh_catalog(&self) -> SyncResult<LoadOutcome> {
        let target = LoadTarget::Catalog;
        self.load(
            target,
            Scope::Global,
            Operation::Catalog,
            self.service.fetch_catalog(),
            move |state, payload| state.load_catalog(payload).map_err(|e| load_error(target, e)),
        )
        .await
    }

    /// Reloads one warehouse snapshot for round `number`.
    pub async fn refresh_snapshot(
        &self,
        warehouse: Warehouse,
        number: &str,
    ) -> SyncResult<LoadOutcome> {
        let number = validate_round_number(number)?;
        let target = LoadTarget::Snapshot(warehouse);
        self.load(
            target,
            Scope::Warehouse(warehouse),
            Operation::Snapshot,
            self.service.fetch_system_snapshot(warehouse, &number),
            move |state, payload| {
                state
                    .load_snapshot(warehouse, payload)
                    .map_err(|e| load_error(target, e))
            },
        )
        .await
    }

    /// Fetches every warehouse snapshot concurrently, then consolidates.
    ///
    /// Consolidation waits for all fetches; a failed warehouse keeps its
    /// previous snapshot and its error is reported in `outcomes`.
    pub async fn refresh_all_snapshots(&self, number: &str) -> SyncResult<SnapshotRefresh> {
        let number = validate_round_number(number)?;
        let number_ref = number.as_str();
        let fetches = Warehouse::ALL
            .into_iter()
            .map(|w| async move { (w, self.refresh_snapshot(w, number_ref).await) });
        let outcomes = join_all(fetches).await;

        let report = self.consolidate(&number).await?;
        Ok(SnapshotRefresh { outcomes, report })
    }

    /// Loads a remotely known round, replacing its local entries.
    pub async fn hydrate_round(&self, warehouse: Warehouse, number: &str) -> SyncResult<LoadOutcome> {
        let number = validate_round_number(number)?;
        let target = LoadTarget::Counts(warehouse);
        let metadata = self.round_metadata();

        let round_number = number.clone();
        let outcome = self
            .load(
                target,
                Scope::Warehouse(warehouse),
                Operation::Counts,
                self.service.fetch_physical_counts(warehouse, &number),
                move |state, payload| {
                    let ingested =
                        ingest::count_entries(payload).map_err(|e| load_error(target, e))?;
                    if state.round(warehouse, &round_number).is_none() {
                        state.gate_mut().join(&round_number)?;
                    }
                    let round = state.open_or_join_round(warehouse, &round_number, metadata)?;
                    state.hydrate_round(warehouse, &round.id, ingested.records)?;
                    Ok(ingested.report)
                },
            )
            .await?;

        if outcome.is_applied() {
            if let Some(round) = self.round(warehouse, &number).await {
                info!(%warehouse, number = %number, entries = round.entries.len(), "Round hydrated");
                self.emitter.emit_round_changed(&round);
            }
        }
        Ok(outcome)
    }

    /// Reloads the round numbers offered for joining.
    pub async fn list_available_rounds(&self) -> SyncResult<LoadOutcome> {
        let target = LoadTarget::Rounds;
        let token = self.tracker.issue(Scope::Global, Operation::Rounds).await;
        let fetched = self
            .timed(target, self.service.list_available_round_numbers())
            .await;

        let mut available = self.available.write().await;
        if !self.tracker.is_latest(&token).await {
            warn!(%target, seq = token.seq, "Discarding superseded response");
            return Ok(LoadOutcome::Superseded);
        }
        let result = fetched.and_then(|payload| {
            ingest::available_rounds(&payload).map_err(|e| load_error(target, e))
        });
        match result {
            Ok(ingested) => {
                *available = ingested.records;
                drop(available);
                self.report_ingest(target, &ingested.report);
                Ok(LoadOutcome::Applied {
                    report: ingested.report,
                })
            }
            Err(err) => Err(self.surface(target, err)),
        }
    }

    /// Last successfully loaded list of joinable rounds.
    pub async fn available_rounds(&self) -> Vec<AvailableRound> {
        self.available.read().await.clone()
    }

    // =========================================================================
    // Rounds
    // =========================================================================

    /// Allocates the next round number and makes it active.
    pub async fn assign_round_number(&self) -> SyncResult<String> {
        let remote: Vec<String> = self
            .available
            .read()
            .await
            .iter()
            .map(|r| r.number.clone())
            .collect();
        let number = self
            .state
            .write()
            .await
            .assign_round_number(remote.iter().map(String::as_str))?;
        info!(number = %number, "Assigned round number");
        Ok(number)
    }

    /// Makes an existing round number the active one.
    pub async fn join_round_number(&self, number: &str) -> SyncResult<String> {
        let number = self.state.write().await.gate_mut().join(number)?;
        info!(number = %number, "Joined round number");
        Ok(number)
    }

    /// Enables or disables creation of new round numbers.
    pub async fn set_accepting_new_rounds(&self, accepting: bool) {
        self.state.write().await.gate_mut().set_accepting_new(accepting);
        debug!(accepting, "Round gate updated");
    }

    pub async fn open_or_join_round(&self, warehouse: Warehouse, number: &str) -> SyncResult<Round> {
        let round = self
            .state
            .write()
            .await
            .open_or_join_round(warehouse, number, self.round_metadata())?;
        info!(%warehouse, number = %round.number, round_id = %round.id, "Round opened");
        self.emitter.emit_round_changed(&round);
        Ok(round)
    }

    pub async fn round(&self, warehouse: Warehouse, round_ref: &str) -> Option<Round> {
        self.state.read().await.round(warehouse, round_ref).cloned()
    }

    // =========================================================================
    // Counts
    // =========================================================================

    pub async fn preview_count(
        &self,
        warehouse: Warehouse,
        round_ref: &str,
        product_code: &str,
        quantity: Quantity,
    ) -> SyncResult<CountPreview> {
        Ok(self
            .state
            .read()
            .await
            .preview_count(warehouse, round_ref, product_code, quantity)?)
    }

    /// Commits a count (last write wins).
    pub async fn record_count(
        &self,
        warehouse: Warehouse,
        round_ref: &str,
        product_code: &str,
        quantity: Quantity,
    ) -> SyncResult<CountOutcome> {
        let outcome = self
            .state
            .write()
            .await
            .record_count(warehouse, round_ref, product_code, quantity)?;
        debug!(%warehouse, round = %round_ref, code = %product_code, %quantity, "Count recorded");
        Ok(outcome)
    }

    // =========================================================================
    // Derived Views
    // =========================================================================

    pub async fn reconcile(&self, warehouse: Warehouse, round_ref: &str) -> SyncResult<Reconciliation> {
        Ok(self
            .state
            .write()
            .await
            .reconcile(warehouse, round_ref)?
            .clone())
    }

    pub async fn consolidate(&self, number: &str) -> SyncResult<ConsolidatedReport> {
        Ok(self.state.write().await.consolidate(number)?)
    }

    // =========================================================================
    // Submit and Close
    // =========================================================================

    /// Reports what submitting the round would do, without submitting.
    pub async fn preview_submit(
        &self,
        warehouse: Warehouse,
        round_ref: &str,
    ) -> SyncResult<SubmitPreview> {
        let state = self.state.read().await;
        let round = state
            .round(warehouse, round_ref)
            .ok_or_else(|| CoreError::RoundNotFound {
                warehouse,
                round: round_ref.to_string(),
            })?;

        let uncounted = state
            .catalog()
            .codes()
            .filter(|code| round.entry(code).is_none())
            .map(str::to_string)
            .collect();
        let unknown_codes = round
            .entries
            .iter()
            .filter(|e| !state.catalog().contains(&e.product_code))
            .map(|e| e.product_code.clone())
            .collect();

        Ok(SubmitPreview {
            warehouse,
            round_id: round.id.clone(),
            number: round.number.clone(),
            entry_count: round.entries.len(),
            uncounted,
            unknown_codes,
            already_closed: round.is_closed(),
        })
    }

    /// Submits the round remotely, then closes it locally.
    ///
    /// The local close only happens after the service accepted the round, and
    /// only if the entries are still the ones that were submitted. Otherwise
    /// the round stays open and [`CoreError::ChangedDuringSubmit`] is returned.
    pub async fn submit_round(
        &self,
        warehouse: Warehouse,
        round_ref: &str,
    ) -> SyncResult<SubmitOutcome> {
        let round = self
            .round(warehouse, round_ref)
            .await
            .ok_or_else(|| CoreError::RoundNotFound {
                warehouse,
                round: round_ref.to_string(),
            })?;
        if round.is_closed() {
            return Err(CoreError::AlreadyClosed {
                warehouse,
                number: round.number.clone(),
            }
            .into());
        }

        let secs = self.config.service.request_timeout_secs;
        let receipt = tokio::time::timeout(
            self.config.request_timeout(),
            self.service.submit_round(warehouse, &round, &round.entries),
        )
        .await
        .map_err(|_| SyncError::Remote(format!("submit timed out after {} seconds", secs)))??;

        // Counts recorded while the submit was pending never reached the service.
        let closed = {
            let mut state = self.state.write().await;
            let unchanged = state
                .round(warehouse, &round.id)
                .is_some_and(|current| current.entries == round.entries);
            if !unchanged {
                warn!(
                    %warehouse,
                    number = %round.number,
                    accepted_id = %receipt.accepted_id,
                    "Round changed during submit; left open"
                );
                return Err(CoreError::ChangedDuringSubmit {
                    warehouse,
                    number: round.number.clone(),
                }
                .into());
            }
            state.close_round(warehouse, &round.id, Utc::now())?
        };
        self.emitter.emit_round_changed(&closed);
        info!(
            %warehouse,
            number = %closed.number,
            accepted_id = %receipt.accepted_id,
            "Round submitted and closed"
        );
        Ok(SubmitOutcome {
            receipt,
            round: closed,
        })
    }

    /// Closes a round locally. One-way.
    pub async fn close_round(&self, warehouse: Warehouse, round_ref: &str) -> SyncResult<Round> {
        let round = self
            .state
            .write()
            .await
            .close_round(warehouse, round_ref, Utc::now())?;
        info!(%warehouse, number = %round.number, "Round closed");
        self.emitter.emit_round_changed(&round);
        Ok(round)
    }

    // =========================================================================
    // Paged Accessors
    // =========================================================================

    /// A cursor sized from the configuration.
    pub fn new_cursor(&self) -> PaginationCursor {
        PaginationCursor::new(self.config.page_size())
    }

    /// Catalog products matching `query`, one page at a time.
    pub async fn paged_products(&self, query: &str, cursor: &mut PaginationCursor) -> Page<Product> {
        let state = self.state.read().await;
        let matches: Vec<Product> = state.catalog().filter(query).into_iter().cloned().collect();
        cursor.window(&matches)
    }

    /// Rows of the latest reconciliation for a warehouse.
    pub async fn paged_reconciliation(
        &self,
        warehouse: Warehouse,
        cursor: &mut PaginationCursor,
    ) -> Option<Page<ReconciliationRow>> {
        let state = self.state.read().await;
        state
            .reconciliation(warehouse)
            .map(|r| cursor.window(&r.rows))
    }

    /// Consolidated lines for round `number`; the total is the last line.
    pub async fn paged_consolidated(
        &self,
        number: &str,
        cursor: &mut PaginationCursor,
    ) -> SyncResult<Page<ConsolidatedLine>> {
        let report = self.consolidate(number).await?;
        Ok(cursor.window(&report.lines()))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn round_metadata(&self) -> RoundMetadata {
        RoundMetadata {
            registered_by: self.config.registered_by().to_string(),
            store_id: self.config.store_id().map(str::to_string),
            started_at: None,
        }
    }

    /// Bounds a remote call by the configured request timeout.
    async fn timed<T>(
        &self,
        target: LoadTarget,
        fut: impl Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        match tokio::time::timeout(self.config.request_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                target,
                secs: self.config.service.request_timeout_secs,
            }),
        }
    }

    /// Fetch, check the token, apply. Shared by every state-backed load.
    async fn load<Fut, A>(
        &self,
        target: LoadTarget,
        scope: Scope,
        operation: Operation,
        fetch: Fut,
        apply: A,
    ) -> SyncResult<LoadOutcome>
    where
        Fut: Future<Output = SyncResult<Value>>,
        A: FnOnce(&mut InventoryState, &Value) -> SyncResult<IngestReport>,
    {
        let token = self.tracker.issue(scope, operation).await;
        let fetched = self.timed(target, fetch).await;

        let mut state = self.state.write().await;
        if !self.tracker.is_latest(&token).await {
            warn!(%target, seq = token.seq, "Discarding superseded response");
            return Ok(LoadOutcome::Superseded);
        }
        let result = fetched.and_then(|payload| apply(&mut *state, &payload));
        drop(state);

        match result {
            Ok(report) => {
                self.report_ingest(target, &report);
                Ok(LoadOutcome::Applied { report })
            }
            Err(err) => Err(self.surface(target, err)),
        }
    }

    fn report_ingest(&self, target: LoadTarget, report: &IngestReport) {
        info!(
            %target,
            accepted = report.accepted,
            dropped = report.dropped,
            duplicates = report.duplicates,
            "Payload applied"
        );
        if report.duplicates > 0 {
            warn!(%target, duplicates = report.duplicates, "Repeated codes collapsed (last row won)");
        }
        if let Some(dropped) = report.dropped_error(&target.to_string()) {
            let err = SyncError::from(dropped);
            warn!(%target, error = %err, "Malformed rows dropped");
            self.emitter.emit_warning(&err.to_string(), false);
        }
        self.emitter.emit_loaded(target, report);
    }

    /// Logs and emits load failures; passes every error through.
    fn surface(&self, target: LoadTarget, err: SyncError) -> SyncError {
        if err.is_warning() {
            warn!(%target, error = %err, "Load failed, keeping last known good data");
            self.emitter.emit_warning(&err.to_string(), err.is_timeout());
        }
        err
    }
}

fn load_error(target: LoadTarget, err: impl std::fmt::Display) -> SyncError {
    SyncError::Load {
        target,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tally_core::{CountEntry, DiscrepancyStatus};

    /// Serves fixed payloads; a `None` payload fails.
    struct FixedService {
        catalog: Option<Value>,
        snapshot_a: Option<Value>,
        snapshot_b: Option<Value>,
        counts: Option<Value>,
        rounds: Option<Value>,
        submitted: Mutex<Vec<(Warehouse, String, usize)>>,
    }

    impl FixedService {
        fn new() -> Self {
            FixedService {
                catalog: Some(json!([
                    { "code": "A", "name": "Arroz" },
                    { "code": "B", "name": "Frijol" },
                    { "code": "C", "name": "Azucar" }
                ])),
                snapshot_a: Some(json!([{ "code": "A", "qty": 10 }, { "code": "B", "qty": 5 }])),
                snapshot_b: Some(json!([{ "code": "A", "qty": 3 }])),
                counts: Some(json!([{ "code": "B", "qty": 5 }, { "code": "C", "qty": 2 }])),
                rounds: Some(json!([{ "number": "1", "id": "r1" }, { "number": "4" }])),
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn serve(value: &Option<Value>, target: LoadTarget) -> SyncResult<Value> {
            value.clone().ok_or(SyncError::Load {
                target,
                reason: "unavailable".into(),
            })
        }
    }

    #[async_trait]
    impl CountingService for FixedService {
        async fn fetch_catalog(&self) -> SyncResult<Value> {
            Self::serve(&self.catalog, LoadTarget::Catalog)
        }

        async fn fetch_system_snapshot(&self, w: Warehouse, _number: &str) -> SyncResult<Value> {
            match w {
                Warehouse::A => Self::serve(&self.snapshot_a, LoadTarget::Snapshot(w)),
                Warehouse::B => Self::serve(&self.snapshot_b, LoadTarget::Snapshot(w)),
            }
        }

        async fn fetch_physical_counts(&self, w: Warehouse, _number: &str) -> SyncResult<Value> {
            Self::serve(&self.counts, LoadTarget::Counts(w))
        }

        async fn submit_round(
            &self,
            warehouse: Warehouse,
            round: &Round,
            entries: &[CountEntry],
        ) -> SyncResult<SubmitReceipt> {
            self.submitted
                .lock()
                .unwrap()
                .push((warehouse, round.number.clone(), entries.len()));
            Ok(SubmitReceipt {
                accepted_id: format!("ok-{}", round.number),
            })
        }

        async fn list_available_round_numbers(&self) -> SyncResult<Value> {
            Self::serve(&self.rounds, LoadTarget::Rounds)
        }
    }

    fn session(service: FixedService) -> InventorySession {
        InventorySession::new(Arc::new(service), TallyConfig::default())
    }

    #[tokio::test]
    async fn test_hydrate_and_reconcile() {
        let session = session(FixedService::new());
        session.refresh_catalog().await.unwrap();
        session.refresh_snapshot(Warehouse::A, "1").await.unwrap();

        let outcome = session.hydrate_round(Warehouse::A, "1").await.unwrap();
        assert_eq!(outcome.report().unwrap().accepted, 2);

        let result = session.reconcile(Warehouse::A, "1").await.unwrap();
        assert_eq!(result.row("A").unwrap().status, DiscrepancyStatus::Faltante);
        assert_eq!(result.row("B").unwrap().status, DiscrepancyStatus::Conforme);
        assert_eq!(result.row("C").unwrap().status, DiscrepancyStatus::Sobrante);
    }

    #[tokio::test]
    async fn test_failed_catalog_keeps_previous() {
        let session = session(FixedService::new());
        session.refresh_catalog().await.unwrap();

        let err = session
            .load(
                LoadTarget::Catalog,
                Scope::Global,
                Operation::Catalog,
                async { Ok::<_, SyncError>(json!({ "error": "maintenance" })) },
                |state, payload| {
                    state
                        .load_catalog(payload)
                        .map_err(|e| load_error(LoadTarget::Catalog, e))
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_warning());
        assert_eq!(session.state().await.catalog().len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_all_snapshots_consolidates() {
        let session = session(FixedService::new());
        session.refresh_catalog().await.unwrap();
        session.hydrate_round(Warehouse::A, "1").await.unwrap();

        // Warehouse B has no round; its snapshot still counts as uncounted stock.
        let refresh = session.refresh_all_snapshots("1").await.unwrap();
        assert!(refresh.outcomes.iter().all(|(_, o)| o.is_ok()));
        assert_eq!(
            refresh.report.row("A").unwrap().diff_total,
            Quantity::from_units(-13)
        );
        assert!(matches!(
            refresh.report.lines().last(),
            Some(ConsolidatedLine::Total(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_all_tolerates_one_failed_warehouse() {
        let session = session(FixedService {
            snapshot_b: None,
            ..FixedService::new()
        });
        session.open_or_join_round(Warehouse::A, "1").await.unwrap();
        let refresh = session.refresh_all_snapshots("1").await.unwrap();

        let failed: Vec<_> = refresh
            .outcomes
            .iter()
            .filter(|(_, o)| o.is_err())
            .map(|(w, _)| *w)
            .collect();
        assert_eq!(failed, vec![Warehouse::B]);
        assert_eq!(refresh.report.row("A").unwrap().diff_total, Quantity::from_units(-10));
    }

    #[tokio::test]
    async fn test_preview_submit_and_submit() {
        let session = session(FixedService::new());
        session.refresh_catalog().await.unwrap();
        let round = session.open_or_join_round(Warehouse::A, "2").await.unwrap();
        session
            .record_count(Warehouse::A, &round.id, "A", Quantity::from_units(1))
            .await
            .unwrap();
        session
            .record_count(Warehouse::A, &round.id, "ZZ", Quantity::from_units(1))
            .await
            .unwrap();

        let preview = session.preview_submit(Warehouse::A, &round.id).await.unwrap();
        assert_eq!(preview.uncounted, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(preview.unknown_codes, vec!["ZZ".to_string()]);
        assert!(preview.needs_confirmation());
        assert!(!preview.already_closed);

        let outcome = session.submit_round(Warehouse::A, &round.id).await.unwrap();
        assert_eq!(outcome.receipt.accepted_id, "ok-2");
        assert!(outcome.round.is_closed());

        let err = session
            .record_count(Warehouse::A, &round.id, "A", Quantity::from_units(9))
            .await
            .unwrap_err();
        assert!(err.is_invariant_violation());

        let again = session.submit_round(Warehouse::A, &round.id).await.unwrap_err();
        assert!(matches!(again, SyncError::Core(CoreError::AlreadyClosed { .. })));
    }

    #[tokio::test]
    async fn test_assign_uses_available_rounds() {
        let session = session(FixedService::new());
        session.list_available_rounds().await.unwrap();
        assert_eq!(session.available_rounds().await.len(), 2);
        assert_eq!(session.assign_round_number().await.unwrap(), "5");

        // The active number must be closed out before another is opened.
        let err = session.open_or_join_round(Warehouse::A, "9").await.unwrap_err();
        assert!(err.is_invariant_violation());
        session.open_or_join_round(Warehouse::A, "5").await.unwrap();
    }

    #[tokio::test]
    async fn test_paged_accessors() {
        let session = session(FixedService::new());
        session.refresh_catalog().await.unwrap();

        let mut cursor = PaginationCursor::new(2);
        let first = session.paged_products("", &mut cursor).await;
        assert_eq!(first.total_pages, 2);
        cursor.next(first.total_items);
        let second = session.paged_products("", &mut cursor).await;
        assert_eq!(second.items.len(), 1);

        session.open_or_join_round(Warehouse::A, "1").await.unwrap();
        assert!(session
            .paged_reconciliation(Warehouse::A, &mut cursor)
            .await
            .is_none());
        session.reconcile(Warehouse::A, "1").await.unwrap();
        assert!(session
            .paged_reconciliation(Warehouse::A, &mut cursor)
            .await
            .is_some());

        let mut lines = session.new_cursor();
        let page = session.paged_consolidated("1", &mut lines).await.unwrap();
        assert!(matches!(page.items.last(), Some(ConsolidatedLine::Total(_))));
    }
}
