//! Common test utilities

use std::sync::Arc;

use leadpulse::broadcast::BroadcastHub;
use leadpulse::models::{Lead, LeadSource, Priority};
use leadpulse::scheduler::{EmissionScheduler, SchedulerContext, StatsSeed, WorkingHoursPolicy};
use leadpulse::server::{AppState, ServerConfig};
use leadpulse::storage::{create_memory_repository, SharedLeadRepository};

pub const TEST_RNG_SEED: u64 = 20_240_315;

/// Create a test lead with default values
pub fn create_test_lead(name: &str) -> Lead {
    let mut lead = Lead::new(name, "9876543210");
    lead.address = "14 Race Course Road".to_string();
    lead
}

/// Three leads with distinct stored sources and priorities
pub fn three_leads() -> Vec<Lead> {
    let mut a = create_test_lead("Asha Verma");
    a.source = LeadSource::Google;
    a.priority = Priority::High;

    let mut b = create_test_lead("Ravi Jain");
    b.source = LeadSource::Website;
    b.mobile = "9876500002".to_string();

    let mut c = create_test_lead("Meena Shah");
    c.source = LeadSource::LinkedIn;
    c.priority = Priority::Low;
    c.mobile = "9876500003".to_string();

    vec![a, b, c]
}

/// Policy whose window covers the whole day so every tick is in-window
pub fn all_day_policy(target: u32) -> WorkingHoursPolicy {
    WorkingHoursPolicy::new(0, 24, target, 0.2).unwrap()
}

/// Scheduler wired to an in-memory store and a fresh hub
pub struct Harness {
    pub context: Arc<SchedulerContext>,
    pub hub: Arc<BroadcastHub>,
    pub repository: SharedLeadRepository,
    pub scheduler: Arc<EmissionScheduler>,
}

impl Harness {
    pub fn new(leads: Vec<Lead>, enabled: bool) -> Self {
        Self::with_repository(create_memory_repository(leads), enabled)
    }

    pub fn with_repository(repository: SharedLeadRepository, enabled: bool) -> Self {
        let context = Arc::new(
            SchedulerContext::new(StatsSeed::default(), Some(TEST_RNG_SEED), enabled).unwrap(),
        );
        let hub = Arc::new(BroadcastHub::new(64));
        let scheduler = Arc::new(
            EmissionScheduler::new(
                context.clone(),
                repository.clone(),
                hub.clone(),
                all_day_policy(1_440),
            )
            .with_rng_seed(Some(TEST_RNG_SEED)),
        );

        Self {
            context,
            hub,
            repository,
            scheduler,
        }
    }

    /// Router state sharing this harness's context, hub and store
    #[allow(dead_code)]
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.repository.clone(),
            self.context.clone(),
            self.hub.clone(),
            ServerConfig::default(),
        )
    }
}
