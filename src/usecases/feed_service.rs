//! Oracle Feed Service - Scheduled Fetch-then-Publish Cycles
//!
//! Keeps the oracle store current with external port performance data.
//!
//! Cycle flow (`Idle → Fetching → Publishing → Idle`):
//! 1. Acquire the run-lock (single-flight; a busy lock joins or rejects)
//! 2. Fetch a candidate index for every tracked port, sequentially
//! 3. Publish each fetched index to the store, sequentially
//! 4. Emit a `CycleReport` with per-port successes and failures
//!
//! Per-port failures never abort the cycle. A port whose fetch fails
//! is not written this cycle, so the store keeps its previous value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::oracle::{PerformanceIndex, PortCode};
use crate::ports::feed_observer::FeedObserver;
use crate::ports::oracle_writer::OracleWriter;
use crate::ports::performance_source::PerformanceSource;

// ── Types ───────────────────────────────────────────────────

/// Feed service failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
  /// The data source returned an error or an out-of-range index.
  #[error("fetch failed for {port}: {reason}")]
  Fetch { port: PortCode, reason: String },

  /// The store rejected or failed to confirm a write.
  #[error("publish failed for {port}: {reason}")]
  Publish { port: PortCode, reason: String },

  /// A cycle is already running and the trigger policy is `reject`.
  #[error("a feed cycle is already in progress")]
  CycleInProgress,

  /// The service is shutting down.
  #[error("feed service is stopping")]
  Stopped,
}

impl FeedError {
  /// Port the failure belongs to, for per-port errors.
  pub fn port(&self) -> Option<&PortCode> {
    match self {
      Self::Fetch { port, .. } | Self::Publish { port, .. } => Some(port),
      Self::CycleInProgress | Self::Stopped => None,
    }
  }

  /// Stage label used in logs and metrics.
  pub fn stage(&self) -> &'static str {
    match self {
      Self::Fetch { .. } => "fetch",
      Self::Publish { .. } => "publish",
      Self::CycleInProgress => "trigger",
      Self::Stopped => "stopped",
    }
  }
}

/// Cycle state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedPhase {
  Idle,
  Fetching,
  Publishing,
}

/// What an on-demand trigger does when a cycle is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPolicy {
  /// Wait for the running cycle and return its report.
  #[default]
  Join,
  /// Fail immediately with `CycleInProgress`.
  Reject,
}

/// Indices fetched in one cycle.
#[derive(Debug, Clone, Default)]
pub struct FeedData {
  /// Validated indices, in tracked-port order.
  pub values: Vec<(PortCode, PerformanceIndex)>,
  /// Ports whose fetch failed.
  pub failures: Vec<FeedError>,
  /// Ports not fetched because the service began stopping.
  pub skipped: Vec<PortCode>,
}

/// Result of publishing one cycle's data.
#[derive(Debug, Clone, Default)]
pub struct PublishOutcome {
  /// Ports the store confirmed.
  pub published: Vec<(PortCode, PerformanceIndex)>,
  /// Ports the store rejected.
  pub failures: Vec<FeedError>,
  /// Ports not submitted because the service began stopping.
  pub skipped: Vec<PortCode>,
}

/// Aggregated report from one feed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
  pub cycle_id: Uuid,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  /// Ports confirmed by the store.
  pub published: Vec<(PortCode, PerformanceIndex)>,
  /// Fetch and publish failures, in processing order.
  pub failures: Vec<FeedError>,
  /// Ports left unsubmitted by a stop request.
  pub skipped: Vec<PortCode>,
}

impl CycleReport {
  pub fn succeeded(&self) -> usize {
    self.published.len()
  }

  pub fn failed(&self) -> usize {
    self.failures.len()
  }

  /// Outcome label: `complete`, `partial` or `stopped`.
  pub fn outcome(&self) -> &'static str {
    if !self.skipped.is_empty() {
      "stopped"
    } else if self.failures.is_empty() {
      "complete"
    } else {
      "partial"
    }
  }
}

/// Reachability of the feed's collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DependencyHealth {
  pub source: bool,
  pub store: bool,
}

impl DependencyHealth {
  pub fn all_healthy(&self) -> bool {
    self.source && self.store
  }
}

// ── Service ─────────────────────────────────────────────────

/// Single-flight feed service over a data source and an oracle writer.
pub struct OracleFeedService {
  source: Arc<dyn PerformanceSource>,
  writer: Arc<dyn OracleWriter>,
  ports: Vec<PortCode>,
  policy: TriggerPolicy,
  observer: Option<Arc<dyn FeedObserver>>,
  /// Last successfully fetched index per port.
  last_known: RwLock<HashMap<PortCode, PerformanceIndex>>,
  /// Held for the whole duration of a cycle.
  cycle_lock: Mutex<()>,
  phase_tx: watch::Sender<FeedPhase>,
  /// Latest completed report; joiners wait on changes.
  report_tx: watch::Sender<Option<Arc<CycleReport>>>,
  stopping: AtomicBool,
}

impl OracleFeedService {
  /// Create a service tracking `ports` in the given order.
  pub fn new(
    source: Arc<dyn PerformanceSource>,
    writer: Arc<dyn OracleWriter>,
    ports: Vec<PortCode>,
    policy: TriggerPolicy,
  ) -> Self {
    let (phase_tx, _) = watch::channel(FeedPhase::Idle);
    let (report_tx, _) = watch::channel(None);
    Self {
      source,
      writer,
      ports,
      policy,
      observer: None,
      last_known: RwLock::new(HashMap::new()),
      cycle_lock: Mutex::new(()),
      phase_tx,
      report_tx,
      stopping: AtomicBool::new(false),
    }
  }

  /// Attach a telemetry observer.
  pub fn with_observer(mut self, observer: Arc<dyn FeedObserver>) -> Self {
    self.observer = Some(observer);
    self
  }

  pub fn tracked_ports(&self) -> &[PortCode] {
    &self.ports
  }

  pub fn policy(&self) -> TriggerPolicy {
    self.policy
  }

  pub fn phase(&self) -> FeedPhase {
    *self.phase_tx.borrow()
  }

  /// Watch phase transitions.
  pub fn subscribe_phase(&self) -> watch::Receiver<FeedPhase> {
    self.phase_tx.subscribe()
  }

  /// Report of the most recently completed cycle.
  pub fn latest_report(&self) -> Option<Arc<CycleReport>> {
    self.report_tx.borrow().clone()
  }

  /// Last index fetched for `port`, retained across failed fetches.
  pub async fn last_known(&self, port: &PortCode) -> Option<PerformanceIndex> {
    self.last_known.read().await.get(port).copied()
  }

  /// Whether the current cycle is running.
  pub fn is_cycle_in_progress(&self) -> bool {
    self.cycle_lock.try_lock().is_err()
  }

  pub fn is_stopping(&self) -> bool {
    self.stopping.load(Ordering::SeqCst)
  }

  /// Refuse new cycles and make a running cycle stop after the
  /// submission currently in flight.
  pub fn begin_stop(&self) {
    if !self.stopping.swap(true, Ordering::SeqCst) {
      info!("Feed service stopping");
    }
  }

  // ── Triggers ────────────────────────────────────────────

  /// On-demand cycle.
  ///
  /// If a cycle is already running, joins it or fails with
  /// `CycleInProgress` depending on the trigger policy. Never starts a
  /// second concurrent cycle.
  #[instrument(skip(self), fields(policy = ?self.policy))]
  pub async fn trigger(&self) -> Result<Arc<CycleReport>, FeedError> {
    if self.is_stopping() {
      return Err(FeedError::Stopped);
    }

    // Subscribe before trying the lock so a completion that lands
    // between the attempt and the wait is still observed.
    let mut completed = self.report_tx.subscribe();

    match self.cycle_lock.try_lock() {
      Ok(guard) => Ok(self.run_locked(guard).await),
      Err(_) => match self.policy {
        TriggerPolicy::Reject => {
          info!("Trigger rejected, cycle already in progress");
          Err(FeedError::CycleInProgress)
        }
        TriggerPolicy::Join => {
          info!("Trigger joining in-flight cycle");
          completed.changed().await.map_err(|_| FeedError::Stopped)?;
          let report = completed.borrow_and_update().clone();
          report.ok_or(FeedError::Stopped)
        }
      },
    }
  }

  /// Scheduled cycle. Returns `None` if a cycle was already running
  /// or the service is stopping.
  pub async fn run_scheduled(&self) -> Option<Arc<CycleReport>> {
    if self.is_stopping() {
      return None;
    }
    match self.cycle_lock.try_lock() {
      Ok(guard) => Some(self.run_locked(guard).await),
      Err(_) => {
        info!("Scheduled tick skipped, cycle already in progress");
        None
      }
    }
  }

  async fn run_locked(&self, guard: MutexGuard<'_, ()>) -> Arc<CycleReport> {
    let cycle_id = Uuid::new_v4();
    let started_at = Utc::now();
    let timer = Instant::now();
    if let Some(observer) = &self.observer {
      observer.cycle_started();
    }
    info!(%cycle_id, ports = self.ports.len(), source = self.source.name(), "Feed cycle started");

    self.phase_tx.send_replace(FeedPhase::Fetching);
    let data = self.fetch_performance_data().await;

    self.phase_tx.send_replace(FeedPhase::Publishing);
    let outcome = self.publish(&data.values).await;

    self.phase_tx.send_replace(FeedPhase::Idle);

    let mut failures = data.failures;
    failures.extend(outcome.failures);
    let mut skipped = outcome.skipped;
    skipped.extend(data.skipped);
    let report = Arc::new(CycleReport {
      cycle_id,
      started_at,
      finished_at: Utc::now(),
      published: outcome.published,
      failures,
      skipped,
    });

    if let Some(observer) = &self.observer {
      observer.cycle_finished(report.outcome(), timer.elapsed());
    }
    info!(
      %cycle_id,
      succeeded = report.succeeded(),
      failed = report.failed(),
      skipped = report.skipped.len(),
      outcome = report.outcome(),
      elapsed_ms = timer.elapsed().as_millis() as u64,
      "Feed cycle complete"
    );

    // A joiner that misses this report must find the lock free.
    drop(guard);
    self.report_tx.send_replace(Some(Arc::clone(&report)));
    report
  }

  // ── Stages ──────────────────────────────────────────────

  /// Fetch a candidate index for every tracked port.
  ///
  /// Failed or out-of-range fetches are logged and left out of the
  /// result; the port's last known value is kept. Once a stop is
  /// requested the remaining ports are skipped.
  pub async fn fetch_performance_data(&self) -> FeedData {
    let mut data = FeedData::default();

    for (position, port) in self.ports.iter().enumerate() {
      if self.is_stopping() {
        data.skipped = self.ports[position..].to_vec();
        warn!(skipped = data.skipped.len(), "Stop requested, skipping remaining fetches");
        if let Some(observer) = &self.observer {
          for port in &data.skipped {
            observer.port_failed(port, "skipped");
          }
        }
        break;
      }

      let fetched = self
        .source
        .fetch_index(port)
        .await
        .map_err(|e| format!("{e:#}"))
        .and_then(|raw| PerformanceIndex::new(raw).map_err(|e| e.to_string()));

      match fetched {
        Ok(index) => {
          debug!(port = %port, %index, "Performance fetched");
          self.last_known.write().await.insert(port.clone(), index);
          data.values.push((port.clone(), index));
        }
        Err(reason) => {
          let retained = self.last_known(port).await;
          warn!(
            port = %port,
            stage = "fetch",
            error = %reason,
            retained = ?retained.map(|i| i.value()),
            "Fetch failed, keeping previous value"
          );
          if let Some(observer) = &self.observer {
            observer.port_failed(port, "fetch");
          }
          data.failures.push(FeedError::Fetch {
            port: port.clone(),
            reason,
          });
        }
      }
    }

    data
  }

  /// Submit `values` to the store one port at a time.
  ///
  /// Each submission waits for the store's confirmation. A rejected
  /// port is logged and the loop continues. Once a stop is requested
  /// the remaining ports are skipped.
  pub async fn publish(&self, values: &[(PortCode, PerformanceIndex)]) -> PublishOutcome {
    let mut outcome = PublishOutcome::default();

    for (position, (port, index)) in values.iter().enumerate() {
      if self.is_stopping() {
        outcome.skipped = values[position..].iter().map(|(p, _)| p.clone()).collect();
        warn!(skipped = outcome.skipped.len(), "Stop requested, skipping remaining ports");
        if let Some(observer) = &self.observer {
          for port in &outcome.skipped {
            observer.port_failed(port, "skipped");
          }
        }
        break;
      }

      match self.writer.update_port_data(port, *index).await {
        Ok(()) => {
          info!(port = %port, %index, "Port data published");
          if let Some(observer) = &self.observer {
            observer.port_published(port, *index);
          }
          outcome.published.push((port.clone(), *index));
        }
        Err(e) => {
          error!(port = %port, stage = "publish", error = %e, "Publish failed");
          if let Some(observer) = &self.observer {
            observer.port_failed(port, "publish");
          }
          outcome.failures.push(FeedError::Publish {
            port: port.clone(),
            reason: format!("{e:#}"),
          });
        }
      }
    }

    outcome
  }

  /// Health of the source and the store, for readiness checks.
  pub async fn dependency_health(&self) -> DependencyHealth {
    DependencyHealth {
      source: self.source.is_healthy().await,
      store: self.writer.is_healthy().await,
    }
  }
}

// ── Scheduler ───────────────────────────────────────────────

/// Owns the recurring timer for an `OracleFeedService`.
///
/// `start` runs the first cycle immediately and then one per interval.
/// `stop` cancels the timer and waits for a running cycle to finish
/// its current submission.
pub struct FeedScheduler {
  service: Arc<OracleFeedService>,
  interval: Duration,
  shutdown_tx: broadcast::Sender<()>,
  handle: Option<JoinHandle<()>>,
}

impl FeedScheduler {
  pub fn new(service: Arc<OracleFeedService>, interval: Duration) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    Self {
      service,
      interval,
      shutdown_tx,
      handle: None,
    }
  }

  pub fn service(&self) -> &Arc<OracleFeedService> {
    &self.service
  }

  pub fn is_running(&self) -> bool {
    self.handle.as_ref().is_some_and(|h| !h.is_finished())
  }

  /// Spawn the timer task. Calling `start` twice is a no-op.
  pub fn start(&mut self) {
    if self.handle.is_some() {
      warn!("Feed scheduler already started");
      return;
    }

    let service = Arc::clone(&self.service);
    let interval = self.interval;
    let mut shutdown_rx = self.shutdown_tx.subscribe();

    self.handle = Some(tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
      info!(interval_secs = interval.as_secs(), "Feed scheduler started");

      loop {
        tokio::select! {
          biased;
          _ = shutdown_rx.recv() => {
            info!("Feed scheduler received shutdown signal");
            break;
          }
          _ = ticker.tick() => {
            if service.run_scheduled().await.is_none() && service.is_stopping() {
              break;
            }
          }
        }
      }

      info!("Feed scheduler stopped");
    }));
  }

  /// Cancel the timer and wait for the task to exit.
  pub async fn stop(&mut self) {
    self.service.begin_stop();
    let _ = self.shutdown_tx.send(());
    if let Some(handle) = self.handle.take() {
      if let Err(e) = handle.await {
        error!(error = %e, "Feed scheduler task failed");
      }
    }
    // Any on-demand cycle still running also honors the stop flag.
    let _guard = self.service.cycle_lock.lock().await;
  }
}
