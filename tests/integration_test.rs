//! Integration Tests - End-to-end Ledger and Feed Component Testing
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use mockall::mock;
use tokio::sync::{Notify, RwLock};

use port_exchange::adapters::api::admin::{self, AdminState};
use port_exchange::adapters::assets::InMemoryAssetBank;
use port_exchange::adapters::store::{FeederIdentity, LocalOracleWriter};
use port_exchange::domain::oracle::{PerformanceIndex, PortCode};
use port_exchange::domain::pool::LedgerEvent;
use port_exchange::domain::LedgerError;
use port_exchange::ports::fungible_asset::FungibleAssets;
use port_exchange::ports::oracle_writer::OracleWriter;
use port_exchange::ports::performance_source::PerformanceSource;
use port_exchange::usecases::feed_service::{
  FeedError, FeedPhase, FeedScheduler, OracleFeedService, TriggerPolicy,
};
use port_exchange::usecases::liquidity_ledger::{AddLiquidity, LiquidityPoolLedger, RemoveLiquidity};
use port_exchange::usecases::oracle_store::OracleStore;
use port_exchange::usecases::swap_engine::{SwapEngine, SwapRequest};

// ---- Mock Definitions ----

mock! {
  pub Writer {}

  #[async_trait::async_trait]
  impl OracleWriter for Writer {
    async fn update_port_data(&self, port: &PortCode, index: PerformanceIndex) -> anyhow::Result<()>;
    async fn is_healthy(&self) -> bool;
  }
}

mock! {
  pub Source {}

  #[async_trait::async_trait]
  impl PerformanceSource for Source {
    async fn fetch_index(&self, port: &PortCode) -> anyhow::Result<u32>;
    fn name(&self) -> &'static str;
    async fn is_healthy(&self) -> bool;
  }
}

// ---- Fixtures ----

const PORTS: [&str; 5] = ["SINGAPORE", "DUBAI", "ROTTERDAM", "SHANGHAI", "LOS_ANGELES"];

fn tracked_ports() -> Vec<PortCode> {
  PORTS.iter().map(|c| PortCode::new(*c).unwrap()).collect()
}

fn base_source() -> MockSource {
  let bases: HashMap<&str, u32> = PORTS.iter().copied().zip([7_500, 7_000, 6_800, 7_200, 6_500]).collect();
  let mut source = MockSource::new();
  source
    .expect_fetch_index()
    .returning(move |port| Ok(bases[port.as_str()]));
  source.expect_name().return_const("mock");
  source.expect_is_healthy().returning(|| true);
  source
}

/// Source whose first fetch waits until released.
struct GatedSource {
  gate: Arc<Notify>,
  first: AtomicBool,
}

impl GatedSource {
  fn new(gate: Arc<Notify>) -> Self {
    Self {
      gate,
      first: AtomicBool::new(true),
    }
  }
}

#[async_trait]
impl PerformanceSource for GatedSource {
  async fn fetch_index(&self, _port: &PortCode) -> anyhow::Result<u32> {
    if self.first.swap(false, Ordering::SeqCst) {
      self.gate.notified().await;
    }
    Ok(7_000)
  }

  fn name(&self) -> &'static str {
    "gated"
  }

  async fn is_healthy(&self) -> bool {
    true
  }
}

/// Writer whose first submission waits until released.
struct SlowWriter {
  gate: Arc<Notify>,
  entered: Arc<Notify>,
  calls: AtomicUsize,
}

#[async_trait]
impl OracleWriter for SlowWriter {
  async fn update_port_data(&self, _port: &PortCode, _index: PerformanceIndex) -> anyhow::Result<()> {
    if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
      self.entered.notify_one();
      self.gate.notified().await;
    }
    Ok(())
  }

  async fn is_healthy(&self) -> bool {
    true
  }
}

async fn wait_for_phase(service: &OracleFeedService, phase: FeedPhase) {
  let mut rx = service.subscribe_phase();
  tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|p| *p == phase))
    .await
    .expect("phase not reached")
    .expect("phase channel closed");
}

// ---- Feed Service ----

#[tokio::test]
async fn test_cycle_with_one_rejected_port_completes() {
  let mut writer = MockWriter::new();
  writer
    .expect_update_port_data()
    .times(5)
    .returning(|port, _| {
      if port.as_str() == "ROTTERDAM" {
        anyhow::bail!("store rejected ROTTERDAM")
      }
      Ok(())
    });

  let service = OracleFeedService::new(
    Arc::new(base_source()),
    Arc::new(writer),
    tracked_ports(),
    TriggerPolicy::Join,
  );

  let report = service.trigger().await.unwrap();

  assert_eq!(report.succeeded(), 4);
  assert_eq!(report.failed(), 1);
  assert_eq!(report.failures[0].port().map(PortCode::as_str), Some("ROTTERDAM"));
  assert_eq!(report.failures[0].stage(), "publish");
  assert_eq!(report.outcome(), "partial");
}

#[tokio::test]
async fn test_source_outage_writes_nothing_for_failed_ports() {
  let mut source = MockSource::new();
  source
    .expect_fetch_index()
    .returning(|port| match port.as_str() {
      "DUBAI" | "SHANGHAI" => anyhow::bail!("provider timeout"),
      _ => Ok(6_000),
    });
  source.expect_name().return_const("mock");

  let mut writer = MockWriter::new();
  writer
    .expect_update_port_data()
    .withf(|port, _| port.as_str() != "DUBAI" && port.as_str() != "SHANGHAI")
    .times(3)
    .returning(|_, _| Ok(()));

  let service = OracleFeedService::new(Arc::new(source), Arc::new(writer), tracked_ports(), TriggerPolicy::Join);
  let report = service.trigger().await.unwrap();

  assert_eq!(report.succeeded(), 3);
  assert_eq!(report.failed(), 2);
  assert!(report.failures.iter().all(|f| f.stage() == "fetch"));
}

#[tokio::test]
async fn test_fetch_failure_keeps_prior_store_value() {
  let owner = Address::repeat_byte(0xaa);
  let store = Arc::new(RwLock::new(OracleStore::new(owner)));
  let writer = LocalOracleWriter::new(Arc::clone(&store), Arc::new(FeederIdentity::new(owner)));

  let calls = Arc::new(AtomicUsize::new(0));
  let mut source = MockSource::new();
  let counter = Arc::clone(&calls);
  source.expect_fetch_index().returning(move |_| {
    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
      Ok(7_100)
    } else {
      anyhow::bail!("provider down")
    }
  });
  source.expect_name().return_const("mock");

  let dubai = PortCode::new("DUBAI").unwrap();
  let service = OracleFeedService::new(Arc::new(source), Arc::new(writer), vec![dubai.clone()], TriggerPolicy::Join);

  service.trigger().await.unwrap();
  let before = store.read().await.get_port_data(&dubai);

  let report = service.trigger().await.unwrap();

  assert_eq!(report.failed(), 1);
  assert_eq!(store.read().await.get_port_data(&dubai), before);
  assert_eq!(before.performance_index.value(), 7_100);
  assert_eq!(service.last_known(&dubai).await.map(|i| i.value()), Some(7_100));
}

#[tokio::test]
async fn test_concurrent_triggers_join_single_cycle() {
  let gate = Arc::new(Notify::new());
  let mut writer = MockWriter::new();
  writer.expect_update_port_data().times(5).returning(|_, _| Ok(()));

  let service = Arc::new(OracleFeedService::new(
    Arc::new(GatedSource::new(Arc::clone(&gate))),
    Arc::new(writer),
    tracked_ports(),
    TriggerPolicy::Join,
  ));

  let first = tokio::spawn({
    let service = Arc::clone(&service);
    async move { service.trigger().await }
  });
  wait_for_phase(&service, FeedPhase::Fetching).await;

  let second = tokio::spawn({
    let service = Arc::clone(&service);
    async move { service.trigger().await }
  });
  let third = tokio::spawn({
    let service = Arc::clone(&service);
    async move { service.trigger().await }
  });
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert!(service.is_cycle_in_progress());

  gate.notify_one();

  let a = first.await.unwrap().unwrap();
  let b = second.await.unwrap().unwrap();
  let c = third.await.unwrap().unwrap();
  assert_eq!(a.cycle_id, b.cycle_id);
  assert_eq!(a.cycle_id, c.cycle_id);
  assert_eq!(a.succeeded(), 5);
}

#[tokio::test]
async fn test_concurrent_trigger_rejected_over_http() {
  let gate = Arc::new(Notify::new());
  let mut writer = MockWriter::new();
  writer.expect_update_port_data().times(5).returning(|_, _| Ok(()));

  let service = Arc::new(OracleFeedService::new(
    Arc::new(GatedSource::new(Arc::clone(&gate))),
    Arc::new(writer),
    tracked_ports(),
    TriggerPolicy::Reject,
  ));
  let state = AdminState {
    service: Arc::clone(&service),
    store: Arc::new(RwLock::new(OracleStore::new(Address::repeat_byte(0xaa)))),
    metrics: None,
  };

  let first = tokio::spawn(admin::trigger_update(State(state.clone())));
  wait_for_phase(&service, FeedPhase::Fetching).await;

  let (status, axum::Json(body)) = admin::trigger_update(State(state.clone())).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(!body.success);
  assert_eq!(service.trigger().await.unwrap_err(), FeedError::CycleInProgress);

  gate.notify_one();
  let (status, axum::Json(body)) = first.await.unwrap();
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.succeeded, Some(5));
}

// ---- Scheduler ----

#[tokio::test]
async fn test_scheduler_runs_first_cycle_immediately_and_stops() {
  let mut writer = MockWriter::new();
  writer.expect_update_port_data().returning(|_, _| Ok(()));

  let service = Arc::new(OracleFeedService::new(
    Arc::new(base_source()),
    Arc::new(writer),
    tracked_ports(),
    TriggerPolicy::Join,
  ));
  let mut scheduler = FeedScheduler::new(Arc::clone(&service), Duration::from_secs(3_600));
  scheduler.start();
  assert!(scheduler.is_running());

  tokio::time::timeout(Duration::from_secs(5), async {
    while service.latest_report().is_none() {
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
  })
  .await
  .expect("first cycle did not run");

  scheduler.stop().await;

  assert!(!scheduler.is_running());
  assert_eq!(service.phase(), FeedPhase::Idle);
  assert_eq!(service.trigger().await.unwrap_err(), FeedError::Stopped);
}

#[tokio::test]
async fn test_stop_finishes_current_submission_and_skips_rest() {
  let gate = Arc::new(Notify::new());
  let entered = Arc::new(Notify::new());
  let writer = Arc::new(SlowWriter {
    gate: Arc::clone(&gate),
    entered: Arc::clone(&entered),
    calls: AtomicUsize::new(0),
  });

  let ports: Vec<PortCode> = ["A", "B", "C"].iter().map(|c| PortCode::new(*c).unwrap()).collect();
  let mut source = MockSource::new();
  source.expect_fetch_index().returning(|_| Ok(5_000));
  source.expect_name().return_const("mock");

  let service = Arc::new(OracleFeedService::new(
    Arc::new(source),
    writer.clone(),
    ports,
    TriggerPolicy::Join,
  ));
  let mut scheduler = FeedScheduler::new(Arc::clone(&service), Duration::from_secs(3_600));
  scheduler.start();

  tokio::time::timeout(Duration::from_secs(5), entered.notified())
    .await
    .expect("first submission not reached");

  let stopping = tokio::spawn(async move {
    scheduler.stop().await;
    scheduler
  });
  while !service.is_stopping() {
    tokio::task::yield_now().await;
  }
  gate.notify_one();

  let scheduler = stopping.await.unwrap();
  assert!(!scheduler.is_running());

  let report = service.latest_report().unwrap();
  assert_eq!(report.succeeded(), 1);
  assert_eq!(report.skipped.len(), 2);
  assert_eq!(report.outcome(), "stopped");
  assert_eq!(writer.calls.load(Ordering::SeqCst), 1);
}

// ---- Ledger End-to-End ----

fn ether(n: u128) -> U256 {
  U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

#[test]
fn test_ledger_lifecycle_with_oracle_link() {
  let weth = Address::repeat_byte(0xee);
  let port_token = Address::repeat_byte(0x51);
  let custody = Address::repeat_byte(0xdd);
  let lp = Address::repeat_byte(0x01);
  let trader = Address::repeat_byte(0x02);
  let owner = Address::repeat_byte(0xaa);

  let mut bank = InMemoryAssetBank::new();
  bank.issue(weth, lp, ether(1_000)).unwrap();
  bank.issue(port_token, lp, ether(1_000_000)).unwrap();
  bank.transfer(weth, lp, trader, ether(5));
  for who in [lp, trader] {
    bank.approve(weth, who, custody, U256::MAX);
    bank.approve(port_token, who, custody, U256::MAX);
  }

  let mut ledger = LiquidityPoolLedger::new(custody, weth, bank);
  let mut oracle = OracleStore::new(owner);
  let singapore = PortCode::new("SINGAPORE").unwrap();
  oracle.link_token_to_port(port_token, &singapore, owner).unwrap();

  // Scenario A: first deposit mints the reference-asset amount.
  let added = ledger
    .add_liquidity(AddLiquidity {
      asset_a: port_token,
      asset_b: weth,
      amount_a: ether(100_000),
      amount_b: ether(100),
      min_amount_a: U256::ZERO,
      min_amount_b: U256::ZERO,
      provider: lp,
    })
    .unwrap();
  assert_eq!(added.shares, ether(100));
  assert_eq!(ledger.get_reserves(port_token, weth).unwrap(), (ether(100_000), ether(100)));

  // Oracle updates never move swap pricing.
  let quote_before = ledger.get_amount_out_for(weth, port_token, ether(1)).unwrap();
  oracle.update_port_data(&singapore, 9_000, owner).unwrap();
  assert_eq!(ledger.get_amount_out_for(weth, port_token, ether(1)).unwrap(), quote_before);
  assert_eq!(oracle.port_for_token(port_token), Some(&singapore));

  let receipt = ledger
    .swap(SwapRequest {
      asset_in: weth,
      asset_out: port_token,
      amount_in: ether(1),
      min_amount_out: quote_before,
      trader,
    })
    .unwrap();
  assert_eq!(receipt.amount_out, quote_before);

  // Removing every share returns no more than the pool holds.
  let removed = ledger
    .remove_liquidity(RemoveLiquidity {
      asset_a: port_token,
      asset_b: weth,
      shares: ether(100),
      min_amount_a: U256::ZERO,
      min_amount_b: U256::ZERO,
      provider: lp,
    })
    .unwrap();
  assert_eq!(removed.amount_b, ether(101));
  assert_eq!(removed.amount_a, ether(100_000) - receipt.amount_out);
  assert_eq!(ledger.get_pool_info(port_token, weth).unwrap().total_shares, U256::ZERO);

  let events = ledger.drain_events();
  assert!(matches!(events[0], LedgerEvent::PoolCreated { .. }));
  assert!(matches!(events[1], LedgerEvent::LiquidityAdded(_)));
  assert!(matches!(events[2], LedgerEvent::Swap(_)));
  assert!(matches!(events[3], LedgerEvent::LiquidityRemoved(_)));
  assert_eq!(events.len(), 4);
  assert_eq!(ledger.assets().balance_of(port_token, trader), receipt.amount_out);
}

#[test]
fn test_identical_assets_rejected_everywhere() {
  let weth = Address::repeat_byte(0xee);
  let mut ledger = LiquidityPoolLedger::new(Address::repeat_byte(0xdd), weth, InMemoryAssetBank::new());

  assert!(matches!(ledger.create_pool(weth, weth), Err(LedgerError::Validation(_))));
  let err = ledger
    .swap(SwapRequest {
      asset_in: weth,
      asset_out: weth,
      amount_in: U256::from(1u64),
      min_amount_out: U256::ZERO,
      trader: Address::repeat_byte(0x02),
    })
    .unwrap_err();
  assert!(matches!(err, LedgerError::Validation(_)));
}

// ---- Readiness ----

fn readiness_state(source_up: bool, store_up: bool) -> AdminState {
  let mut source = MockSource::new();
  source.expect_is_healthy().times(1).returning(move || source_up);
  source.expect_name().return_const("mock");
  let mut writer = MockWriter::new();
  writer.expect_is_healthy().times(1).returning(move || store_up);

  AdminState {
    service: Arc::new(OracleFeedService::new(
      Arc::new(source),
      Arc::new(writer),
      tracked_ports(),
      TriggerPolicy::Join,
    )),
    store: Arc::new(RwLock::new(OracleStore::new(Address::repeat_byte(0xaa)))),
    metrics: None,
  }
}

#[tokio::test]
async fn test_ready_reports_source_outage() {
  let (status, axum::Json(body)) = admin::readiness(State(readiness_state(false, true))).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert!(!body.ready);
  assert!(!body.dependencies.source);
  assert!(body.dependencies.store);
}

#[tokio::test]
async fn test_ready_reports_store_outage() {
  let (status, axum::Json(body)) = admin::readiness(State(readiness_state(true, false))).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert!(body.dependencies.source);
  assert!(!body.dependencies.store);
}

#[tokio::test]
async fn test_ready_when_dependencies_healthy() {
  let (status, axum::Json(body)) = admin::readiness(State(readiness_state(true, true))).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body.ready);
  assert!(!body.stopping);
}
