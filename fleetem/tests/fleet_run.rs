//! End-to-end runs against a fake fleet that models the kernel's
//! add/delete semantics: duplicate creates fail, deletes of absent
//! structures fail (and must be absorbed as no-ops by the executor).

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use async_trait::async_trait;

use fleetem::{
    build_matrix, DevicePrep, FleetExecutor, HostJob, HostOutcome, HostRegistry, Output,
    PlanCompiler, PlanMode, Topology, TopologyConfig, Transport, TransportError,
};

/// Remembers which tc objects exist on which host.
#[derive(Default)]
struct FakeFleet {
    objects: Mutex<HashSet<(Ipv4Addr, String)>>,
}

#[async_trait]
impl Transport for FakeFleet {
    async fn run(&self, host: Ipv4Addr, argv: &[String]) -> Result<Output, TransportError> {
        // Only tc commands are stateful; modprobe and ip are always fine.
        if argv.get(1).map(String::as_str) != Some("tc") {
            return Ok(Output::ok());
        }

        let op = argv[3].clone();
        let mut key_words: Vec<&str> = argv.iter().map(String::as_str).collect();
        key_words.remove(3);
        let key = (host, key_words.join(" "));

        let mut objects = self.objects.lock().unwrap();
        match op.as_str() {
            "add" => {
                if !objects.insert(key) {
                    return Ok(Output::failed("RTNETLINK answers: File exists"));
                }
            }
            "del" => {
                if !objects.remove(&key) {
                    return Ok(Output::failed("RTNETLINK answers: No such file or directory"));
                }
            }
            _ => {}
        }
        Ok(Output::ok())
    }
}

fn jobs(mode: PlanMode) -> Vec<HostJob> {
    let inventory = "172.16.1.10\n172.16.2.10\n172.16.3.10\n172.16.4.10\n";
    let registry = HostRegistry::parse(inventory.as_bytes(), 4).unwrap();
    let matrix = build_matrix(Topology::Measured, 4, &TopologyConfig::default()).unwrap();
    let compiler = PlanCompiler::new("ifb1");

    registry
        .hosts()
        .iter()
        .map(|&host| {
            let plan = compiler.latency_plan(mode, matrix.row(host.region)).unwrap();
            let mut job = HostJob::new(host, plan);
            if matches!(mode, PlanMode::Apply) {
                job = job.with_prep(DevicePrep::new("lo", "ifb1").commands());
            }
            job
        })
        .collect()
}

#[tokio::test]
async fn apply_succeeds_once_then_fails_on_duplicate_creates() {
    let executor = FleetExecutor::new(FakeFleet::default());

    let first = executor.execute(jobs(PlanMode::Apply)).await;
    assert_eq!(first.len(), 4);
    assert!(first.iter().all(|r| r.outcome.is_success()));

    // Re-applying against already-configured hosts must surface the
    // duplicate-create failures, not hide or retry them.
    let second = executor.execute(jobs(PlanMode::Apply)).await;
    assert_eq!(second.len(), 4);
    for report in &second {
        match &report.outcome {
            HostOutcome::Failed { first, .. } => {
                assert_eq!(first.stderr, "RTNETLINK answers: File exists");
            }
            other => panic!("expected Failed on re-apply, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn remove_is_safely_reissuable() {
    let executor = FleetExecutor::new(FakeFleet::default());

    let applied = executor.execute(jobs(PlanMode::Apply)).await;
    assert!(applied.iter().all(|r| r.outcome.is_success()));

    let removed = executor.execute(jobs(PlanMode::Remove)).await;
    assert!(removed.iter().all(|r| r.outcome.is_success()));

    // Everything is already gone; deleting absent structures is a no-op.
    let removed_again = executor.execute(jobs(PlanMode::Remove)).await;
    assert!(removed_again.iter().all(|r| r.outcome.is_success()));
}
