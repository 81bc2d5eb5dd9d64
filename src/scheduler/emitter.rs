//! Perpetual emission loop
//!
//! One task runs for the life of the process. Each iteration runs a tick,
//! which only emits when the context is enabled, then sleeps for the delay
//! the working-hours policy picks. A failing or panicking tick is logged and
//! the next sleep is still scheduled. Only the shutdown signal ends the loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Local;
use futures::FutureExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::context::SchedulerContext;
use super::error::{SchedulerError, SchedulerResult};
use super::window::WorkingHoursPolicy;
use crate::broadcast::{EventPublisher, LeadEvent};
use crate::error::{Error, LeadPulseErrorTrait};
use crate::metrics;
use crate::models::LeadSource;
use crate::storage::SharedLeadRepository;

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Emission disabled, nothing fetched
    Idle,
    /// Enabled but the store had no leads
    Empty,
    /// One lead and one stats snapshot were published
    Emitted {
        lead_id: String,
        lead_name: String,
        source: LeadSource,
        observers: usize,
    },
}

impl TickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => metrics::OUTCOME_IDLE,
            Self::Empty => metrics::OUTCOME_EMPTY,
            Self::Emitted { .. } => metrics::OUTCOME_EMITTED,
        }
    }
}

/// Drives emission from the store through the publisher on a jittered cadence
pub struct EmissionScheduler {
    context: Arc<SchedulerContext>,
    repository: SharedLeadRepository,
    publisher: Arc<dyn EventPublisher>,
    policy: WorkingHoursPolicy,
    rng_seed: Option<u64>,
}

impl EmissionScheduler {
    pub fn new(
        context: Arc<SchedulerContext>,
        repository: SharedLeadRepository,
        publisher: Arc<dyn EventPublisher>,
        policy: WorkingHoursPolicy,
    ) -> Self {
        Self {
            context,
            repository,
            publisher,
            policy,
            rng_seed: None,
        }
    }

    /// Make the delay sequence reproducible
    pub fn with_rng_seed(mut self, seed: Option<u64>) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn context(&self) -> &Arc<SchedulerContext> {
        &self.context
    }

    pub fn policy(&self) -> &WorkingHoursPolicy {
        &self.policy
    }

    /// Run one tick: check the flag once, then fetch, pick and publish
    pub async fn tick(&self) -> SchedulerResult<TickOutcome> {
        let tick = self.context.record_tick();

        if !self.context.is_enabled() {
            debug!(tick, "emission disabled, skipping tick");
            metrics::record_tick(metrics::OUTCOME_IDLE);
            return Ok(TickOutcome::Idle);
        }

        let leads = match self.repository.fetch_all().await {
            Ok(leads) => leads,
            Err(e) => {
                metrics::record_tick(metrics::OUTCOME_FAILED);
                return Err(e.into());
            }
        };

        let Some(emission) = self.context.prepare_emission(&leads).await else {
            info!(tick, "no leads available to emit");
            metrics::record_tick(metrics::OUTCOME_EMPTY);
            return Ok(TickOutcome::Empty);
        };

        let lead_id = emission.lead.id.clone();
        let lead_name = emission.lead.name.clone();
        let source = emission.source;

        let observers = self.publisher.publish(LeadEvent::NewLead(emission.lead));
        self.publisher.publish(LeadEvent::UpdateStats(emission.stats));

        metrics::record_tick(metrics::OUTCOME_EMITTED);
        metrics::record_emission(source.as_str());
        info!(
            tick,
            lead = %lead_name,
            source = %source,
            observers,
            daily = emission.stats.daily_leads_count,
            "emitted lead"
        );

        Ok(TickOutcome::Emitted {
            lead_id,
            lead_name,
            source,
            observers,
        })
    }

    /// Tick with errors and panics contained
    async fn guarded_tick(&self) -> SchedulerResult<TickOutcome> {
        match AssertUnwindSafe(self.tick()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                metrics::record_tick(metrics::OUTCOME_PANICKED);
                Err(SchedulerError::EmissionPanicked {
                    reason: panic_message(payload.as_ref()),
                })
            }
        }
    }

    /// Loop until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut rng = match self.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
            None => ChaCha8Rng::from_entropy(),
        };

        info!(
            start_hour = self.policy.start_hour(),
            end_hour = self.policy.end_hour(),
            enabled = self.context.is_enabled(),
            "emission loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.guarded_tick().await {
                let err = Error::from(e);
                let category = err.category().as_str();
                if err.is_recoverable() {
                    warn!(category, error = %err, "emission tick failed");
                } else {
                    error!(category, error = %err, "emission tick failed");
                }
            }

            let delay = self.policy.next_delay(&Local::now(), &mut rng);
            debug!(delay_ms = delay.as_millis() as u64, "next tick scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        info!(ticks = self.context.tick_count(), "emission loop stopped");
    }

    /// Run the loop on its own task
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // a dropped sender also means shutdown
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastHub;
    use crate::models::Lead;
    use crate::scheduler::StatsSeed;
    use crate::storage::{create_memory_repository, InMemoryLeadRepository};

    fn scheduler_with(repository: SharedLeadRepository, enabled: bool) -> (EmissionScheduler, Arc<BroadcastHub>) {
        let context = Arc::new(SchedulerContext::new(StatsSeed::default(), Some(42), enabled).unwrap());
        let hub = Arc::new(BroadcastHub::new(16));
        let scheduler = EmissionScheduler::new(
            context,
            repository,
            hub.clone(),
            WorkingHoursPolicy::default(),
        );
        (scheduler, hub)
    }

    #[tokio::test]
    async fn test_idle_tick_does_not_fetch() {
        let repo = Arc::new(InMemoryLeadRepository::new());
        repo.set_unavailable(true);
        let (scheduler, _hub) = scheduler_with(repo, false);

        // an unavailable store would fail the tick if it were read
        assert_eq!(scheduler.tick().await.unwrap(), TickOutcome::Idle);
        assert_eq!(scheduler.context().tick_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_emits_nothing() {
        let (scheduler, hub) = scheduler_with(create_memory_repository(vec![]), true);
        let mut rx = hub.subscribe();

        assert_eq!(scheduler.tick().await.unwrap(), TickOutcome::Empty);
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.published_count(), 0);
    }

    #[tokio::test]
    async fn test_emitted_tick_publishes_lead_then_stats() {
        let leads = vec![Lead::new("Asha", "9876500001")];
        let (scheduler, hub) = scheduler_with(create_memory_repository(leads), true);
        let mut rx = hub.subscribe();

        let outcome = scheduler.tick().await.unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::Emitted { source: LeadSource::Facebook, observers: 1, .. }
        ));

        assert!(matches!(rx.recv().await.unwrap(), LeadEvent::NewLead(l) if l.name == "Asha"));
        assert!(matches!(rx.recv().await.unwrap(), LeadEvent::UpdateStats(s) if s.daily_leads_count == 1));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_recoverable_error() {
        let repo = Arc::new(InMemoryLeadRepository::new());
        repo.set_unavailable(true);
        let (scheduler, _hub) = scheduler_with(repo, true);

        let err = scheduler.tick().await.unwrap_err();
        assert!(matches!(err, SchedulerError::FetchFailed { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn std::any::Any + Send> = Box::new(17u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
