//! Integration tests for the emission loop
//!
//! These tests verify the complete path of:
//! - Toggle gating of emission
//! - Store fetch, rotation stamping, stats update and broadcast
//! - Loop survival across empty stores, store failures and panics
//! - Graceful shutdown

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use common::{three_leads, Harness};
use leadpulse::broadcast::LeadEvent;
use leadpulse::models::{Lead, LeadPage, LeadQuery, LeadSource, LeadUpdate};
use leadpulse::scheduler::{SchedulerError, TickOutcome, ROTATION_ORDER};
use leadpulse::storage::{InMemoryLeadRepository, LeadRepository, StorageResult};

// ============================================================================
// Single Tick Scenarios
// ============================================================================

#[tokio::test]
async fn test_enabled_tick_with_three_leads() {
    let leads = three_leads();
    let ids: Vec<_> = leads.iter().map(|l| l.id.clone()).collect();
    let harness = Harness::new(leads, true);
    let mut rx = harness.hub.subscribe();
    let before = harness.context.stats_snapshot().await;

    let outcome = harness.scheduler.tick().await.unwrap();
    let TickOutcome::Emitted { lead_id, source, observers, .. } = outcome.clone() else {
        panic!("expected an emission, got {outcome:?}");
    };
    assert_eq!(source, LeadSource::Facebook);
    assert_eq!(observers, 1);
    assert!(ids.contains(&lead_id));

    // exactly one newLead followed by one updateStats
    match rx.recv().await.unwrap() {
        LeadEvent::NewLead(lead) => {
            assert_eq!(lead.id, lead_id);
            assert_eq!(lead.source, LeadSource::Facebook);
        }
        other => panic!("expected newLead, got {other:?}"),
    }
    match rx.recv().await.unwrap() {
        LeadEvent::UpdateStats(stats) => {
            assert_eq!(stats.daily_leads_count, before.daily_leads_count + 1);
        }
        other => panic!("expected updateStats, got {other:?}"),
    }
    assert!(rx.try_recv().is_err());

    assert_eq!(
        harness.context.next_source_preview().await,
        LeadSource::Instagram
    );
}

#[tokio::test]
async fn test_stored_source_is_not_modified() {
    let harness = Harness::new(three_leads(), true);
    harness.scheduler.tick().await.unwrap();

    let stored: Vec<_> = harness
        .repository
        .fetch_all()
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.source)
        .collect();
    assert!(!stored.contains(&LeadSource::Facebook));
}

#[tokio::test]
async fn test_empty_store_tick() {
    let harness = Harness::new(vec![], true);
    let mut rx = harness.hub.subscribe();

    assert_eq!(harness.scheduler.tick().await.unwrap(), TickOutcome::Empty);
    assert_eq!(harness.scheduler.tick().await.unwrap(), TickOutcome::Empty);

    assert!(rx.try_recv().is_err());
    assert_eq!(harness.context.tick_count(), 2);
    assert_eq!(harness.context.stats_snapshot().await.daily_leads_count, 0);
}

#[tokio::test]
async fn test_toggle_gates_emission() {
    let harness = Harness::new(three_leads(), false);
    let mut rx = harness.hub.subscribe();

    assert_eq!(harness.scheduler.tick().await.unwrap(), TickOutcome::Idle);
    assert!(rx.try_recv().is_err());

    harness.context.enable();
    assert!(matches!(
        harness.scheduler.tick().await.unwrap(),
        TickOutcome::Emitted { .. }
    ));
    assert!(rx.try_recv().is_ok());

    harness.context.disable();
    assert_eq!(harness.scheduler.tick().await.unwrap(), TickOutcome::Idle);
    assert_eq!(harness.context.emission_count(), 1);
}

#[tokio::test]
async fn test_rotation_over_consecutive_emissions() {
    let harness = Harness::new(three_leads(), true);

    let mut sources = Vec::new();
    for _ in 0..10 {
        if let TickOutcome::Emitted { source, .. } = harness.scheduler.tick().await.unwrap() {
            sources.push(source);
        }
    }

    let expected: Vec<_> = ROTATION_ORDER.iter().chain(ROTATION_ORDER.iter()).copied().collect();
    assert_eq!(sources, expected);
}

#[tokio::test]
async fn test_store_failure_surfaces_as_recoverable() {
    let repo = Arc::new(InMemoryLeadRepository::with_leads(three_leads()));
    let harness = Harness::with_repository(repo.clone(), true);
    let mut rx = harness.hub.subscribe();

    repo.set_unavailable(true);
    let err = harness.scheduler.tick().await.unwrap_err();
    assert!(matches!(err, SchedulerError::FetchFailed { .. }));
    assert!(err.is_recoverable());
    assert!(rx.try_recv().is_err());

    // rotation and stats did not advance on the failed tick
    repo.set_unavailable(false);
    let outcome = harness.scheduler.tick().await.unwrap();
    assert!(matches!(
        outcome,
        TickOutcome::Emitted { source: LeadSource::Facebook, .. }
    ));
}

// ============================================================================
// Loop Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_loop_keeps_ticking_and_stops_on_shutdown() {
    let harness = Harness::new(three_leads(), false);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = harness.scheduler.clone().spawn(stop_rx);

    // in-window delays are 48s..72s with this policy
    tokio::time::sleep(Duration::from_secs(600)).await;
    let idle_ticks = harness.context.tick_count();
    assert!(idle_ticks >= 8, "only {idle_ticks} ticks while idle");
    assert_eq!(harness.context.emission_count(), 0);

    harness.context.enable();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(harness.context.emission_count() >= 7);

    stop_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop did not stop")
        .unwrap();

    let final_ticks = harness.context.tick_count();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(harness.context.tick_count(), final_ticks);
}

#[tokio::test(start_paused = true)]
async fn test_loop_stops_when_sender_dropped() {
    let harness = Harness::new(vec![], true);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = harness.scheduler.clone().spawn(stop_rx);

    tokio::time::sleep(Duration::from_secs(120)).await;
    drop(stop_tx);

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop did not stop")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_store_outage() {
    let repo = Arc::new(InMemoryLeadRepository::with_leads(three_leads()));
    let harness = Harness::with_repository(repo.clone(), true);
    repo.set_unavailable(true);

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = harness.scheduler.clone().spawn(stop_rx);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(harness.context.tick_count() >= 4);
    assert_eq!(harness.context.emission_count(), 0);

    repo.set_unavailable(false);
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(harness.context.emission_count() >= 3);

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
}

/// Store whose reads panic until disarmed
struct PanickingRepository {
    armed: AtomicBool,
    inner: InMemoryLeadRepository,
}

#[async_trait]
impl LeadRepository for PanickingRepository {
    async fn fetch_all(&self) -> StorageResult<Vec<Lead>> {
        if self.armed.load(Ordering::SeqCst) {
            panic!("simulated driver crash");
        }
        self.inner.fetch_all().await
    }

    async fn count(&self) -> StorageResult<u64> {
        self.inner.count().await
    }

    async fn list(&self, query: &LeadQuery) -> StorageResult<LeadPage> {
        self.inner.list(query).await
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Lead>> {
        self.inner.get(id).await
    }

    async fn insert(&self, lead: &Lead) -> StorageResult<()> {
        self.inner.insert(lead).await
    }

    async fn update(&self, id: &str, update: LeadUpdate) -> StorageResult<Lead> {
        self.inner.update(id, update).await
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        self.inner.delete(id).await
    }

    async fn replace_all(&self, leads: &[Lead]) -> StorageResult<usize> {
        self.inner.replace_all(leads).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_panicking_tick() {
    let repo = Arc::new(PanickingRepository {
        armed: AtomicBool::new(true),
        inner: InMemoryLeadRepository::with_leads(three_leads()),
    });
    let harness = Harness::with_repository(repo.clone(), true);

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = harness.scheduler.clone().spawn(stop_rx);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(harness.context.tick_count() >= 4);
    assert_eq!(harness.context.emission_count(), 0);

    repo.armed.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(harness.context.emission_count() >= 3);

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
}
