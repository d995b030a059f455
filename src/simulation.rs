//! Authorization traffic simulation.
//!
//! Generates enforcement requests following RBAC, ABAC and ReBAC patterns,
//! plus occasional policy changes, so dashboards have something to show.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use casbin_metrics::config::Simulation;
use casbin_metrics::{Entry, EventKind, Recorder};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::time::sleep;

/// One enforcement request and its expected decision.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub subject: &'static str,
    pub object: &'static str,
    pub action: &'static str,
    pub domain: &'static str,
    pub allowed: bool,
}

const fn scenario(
    subject: &'static str,
    object: &'static str,
    action: &'static str,
    domain: &'static str,
    allowed: bool,
) -> Scenario {
    Scenario {
        subject,
        object,
        action,
        domain,
        allowed,
    }
}

const RBAC: &[Scenario] = &[
    scenario("alice", "document1", "read", "org1", true),
    scenario("alice", "document1", "write", "org1", true),
    scenario("alice", "document1", "delete", "org1", true),
    scenario("bob", "document2", "read", "org1", true),
    scenario("bob", "document2", "write", "org1", true),
    scenario("bob", "document2", "delete", "org1", false),
    scenario("charlie", "document3", "read", "org1", true),
    scenario("charlie", "document3", "write", "org1", false),
    scenario("charlie", "document3", "delete", "org1", false),
    scenario("dave", "document4", "read", "org2", true),
    scenario("eve", "document5", "read", "org2", true),
    // wrong domain.
    scenario("eve", "document6", "read", "org1", false),
];

const ABAC: &[Scenario] = &[
    scenario("alice", "confidential_doc", "read", "default", true),
    scenario("bob", "confidential_doc", "read", "default", false),
    scenario("charlie", "salary_data", "read", "default", true),
    scenario("dave", "salary_data", "read", "default", false),
    scenario("eve", "time_sensitive_data", "read", "default", true),
    scenario("frank", "time_sensitive_data", "read", "default", false),
    scenario("grace", "internal_tool", "use", "default", true),
    scenario("henry", "internal_tool", "use", "default", false),
];

const REBAC: &[Scenario] = &[
    scenario("alice", "project1", "delete", "", true),
    scenario("bob", "project1", "delete", "", false),
    scenario("bob", "project1", "read", "", true),
    scenario("manager_alice", "employee_bob", "view_profile", "", true),
    scenario("employee_bob", "manager_alice", "view_profile", "", false),
    scenario("charlie", "engineering_team", "access_repo", "", true),
    scenario("dave", "marketing_team", "access_repo", "", false),
    scenario("eve", "frank", "view_photos", "", true),
    scenario("grace", "frank", "view_photos", "", false),
    scenario("henry", "folder1", "read", "", true),
    scenario("henry", "folder1/subfolder/file", "read", "", true),
    scenario("iris", "folder1/subfolder/file", "write", "", false),
];

const COMPLEX: &[Scenario] = &[
    scenario("alice", "sensitive_project", "deploy", "production", true),
    scenario("junior_bob", "sensitive_project", "deploy", "production", false),
    scenario("admin_charlie", "global_config", "modify", "global", true),
    scenario("local_dave", "global_config", "modify", "org1", false),
    scenario("eve_with_mfa", "financial_data", "transfer", "default", true),
    scenario("frank_no_mfa", "financial_data", "transfer", "default", false),
    scenario("grace_contractor", "project_alpha", "read", "default", true),
    scenario("henry_ex_contractor", "project_alpha", "read", "default", false),
];

/// Access control model of a simulated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Rbac,
    Abac,
    Rebac,
    Complex,
}

impl Pattern {
    /// 40% RBAC, 30% ABAC, 20% ReBAC, 10% complex.
    pub fn for_iteration(iteration: u64) -> Self {
        match iteration % 10 {
            0..=3 => Pattern::Rbac,
            4..=6 => Pattern::Abac,
            7 | 8 => Pattern::Rebac,
            _ => Pattern::Complex,
        }
    }

    pub fn scenarios(&self) -> &'static [Scenario] {
        match self {
            Pattern::Rbac => RBAC,
            Pattern::Abac => ABAC,
            Pattern::Rebac => REBAC,
            Pattern::Complex => COMPLEX,
        }
    }

    /// Simulated evaluation time, in milliseconds.
    fn latency(&self) -> Range<u64> {
        match self {
            Pattern::Rbac => 1..6,
            Pattern::Abac => 2..10,
            Pattern::Rebac => 3..13,
            Pattern::Complex => 5..20,
        }
    }
}

/// Rule counts of the simulated policy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStore {
    pub policies: usize,
    pub groupings: usize,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self {
            policies: 100,
            groupings: 20,
        }
    }
}

impl PolicyStore {
    /// Apply a successful operation on `rule_count` rules.
    pub fn apply(&mut self, kind: EventKind, rule_count: usize) {
        match kind {
            EventKind::AddPolicy => self.policies += rule_count,
            EventKind::RemovePolicy => {
                self.policies = self.policies.saturating_sub(rule_count)
            },
            EventKind::LoadPolicy => self.policies = rule_count,
            EventKind::SavePolicy | EventKind::Enforce => {},
        }
    }

    /// Push current counts to the policy state gauge.
    pub fn sync(&self, recorder: &Recorder) {
        recorder.set_policy_state("p", self.policies);
        recorder.set_policy_state("g", self.groupings);
    }
}

fn finish(recorder: &Recorder, entry: &mut Entry) {
    if let Err(err) = recorder.on_after(entry) {
        tracing::warn!(error = %err, kind = %entry.kind(), "observer failed");
    }
}

/// Simulate one enforcement request.
pub async fn enforce(recorder: &Recorder, pattern: Pattern, rng: &mut StdRng) {
    let Some(scenario) = pattern.scenarios().choose(rng).copied() else {
        return;
    };

    let mut entry = Entry::enforce(
        scenario.subject,
        scenario.object,
        scenario.action,
        scenario.domain,
    );
    recorder.on_before(&mut entry);
    sleep(Duration::from_millis(rng.gen_range(pattern.latency()))).await;
    entry.allowed = scenario.allowed;
    finish(recorder, &mut entry);
}

/// Simulate one policy store operation.
pub async fn policy_change(
    recorder: &Recorder,
    store: &mut PolicyStore,
    rng: &mut StdRng,
) {
    let (kind, rule_count) = match rng.gen_range(0..4) {
        0 => (EventKind::AddPolicy, rng.gen_range(1..6)),
        1 => (EventKind::RemovePolicy, rng.gen_range(1..4)),
        2 => (EventKind::LoadPolicy, rng.gen_range(50..150)),
        _ => (EventKind::SavePolicy, store.policies + store.groupings),
    };

    let mut entry = Entry::new(kind).rules(rule_count);
    recorder.on_before(&mut entry);
    sleep(Duration::from_millis(rng.gen_range(10..40))).await;

    // adapters fail from time to time.
    if rng.gen_bool(0.05) {
        entry.fail("adapter unavailable");
    } else {
        store.apply(kind, rule_count);
    }
    finish(recorder, &mut entry);

    store.sync(recorder);
}

/// Run the simulation until the task is cancelled.
pub async fn run(recorder: Arc<Recorder>, config: Simulation, mut rng: StdRng) {
    let mut store = PolicyStore::default();
    store.sync(&recorder);

    let mut interval = tokio::time::interval(config.interval());
    let mut iteration: u64 = 0;

    loop {
        interval.tick().await;
        iteration += 1;

        enforce(&recorder, Pattern::for_iteration(iteration), &mut rng).await;

        if rng.gen_bool(config.policy_change_chance.clamp(0.0, 1.0)) {
            policy_change(&recorder, &mut store, &mut rng).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casbin_metrics::metrics::series_count;
    use prometheus::Registry;
    use prometheus::core::Collector;
    use rand::SeedableRng;

    #[test]
    fn test_pattern_mix() {
        let mut counts = [0; 4];
        for iteration in 0..100 {
            let index = match Pattern::for_iteration(iteration) {
                Pattern::Rbac => 0,
                Pattern::Abac => 1,
                Pattern::Rebac => 2,
                Pattern::Complex => 3,
            };
            counts[index] += 1;
        }

        assert_eq!(counts, [40, 30, 20, 10]);
    }

    #[test]
    fn test_policy_store() {
        let mut store = PolicyStore::default();

        store.apply(EventKind::AddPolicy, 5);
        assert_eq!(store.policies, 105);

        store.apply(EventKind::RemovePolicy, 200);
        assert_eq!(store.policies, 0);

        store.apply(EventKind::LoadPolicy, 80);
        store.apply(EventKind::SavePolicy, 80);
        assert_eq!(store.policies, 80);
        assert_eq!(store.groupings, 20);
    }

    #[tokio::test]
    async fn test_simulated_events_are_recorded() {
        let registry = Registry::new();
        let recorder = Recorder::with_registry(&registry).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut store = PolicyStore::default();

        for iteration in 0..10 {
            enforce(&recorder, Pattern::for_iteration(iteration), &mut rng)
                .await;
        }
        policy_change(&recorder, &mut store, &mut rng).await;

        let families = recorder.families();
        let enforced: f64 = families
            .enforce_total()
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .map(|metric| metric.get_counter().get_value())
            .sum();
        assert_eq!(enforced, 10.0);
        assert_eq!(series_count(families.policy_ops_total()), 1);
        assert_eq!(
            families.policy_state_count().with_label_values(&["g"]).get(),
            20.0
        );

        recorder.unregister();
    }
}
