//! Per-host shaping plan compilation.
//!
//! The compiler combines one host's latency row (or priority assignment)
//! with the address-block convention and produces an ordered [`ShapingPlan`].
//! On apply, creation order respects the dependency chain
//! root → class → qdisc → filter: no filter ever references a class id
//! before the command creating it. On remove, ordering is insignificant
//! because deleting the root cascades, and every delete is re-issuable.

use fleetem_topo::PriorityAssignment;

use crate::addr::AddressPlan;
use crate::command::{
    FilterMatch, MatchDirection, Op, Rate, RootKind, ShapingCommand, PRIO_PRIOMAP,
};
use crate::handle::Handle;

/// Netem queue limit. The limit must accommodate the full bandwidth-delay
/// product of a fast link with hundreds of milliseconds of added delay.
pub const NETEM_LIMIT: u32 = 100_000;

/// Uniform packet loss applied to every destination, as a percentage.
/// Matches the loss observed between real datacenters (1e-5 probability)
/// regardless of distance.
pub const LOSS_PERCENT: f64 = 0.001;

/// Default per-class ceiling, effectively unlimited: the leaf classes exist
/// for classification, not to cap throughput.
pub const DEFAULT_CEILING: Rate = Rate::mbyte_per_sec(10_000);

/// Whether a plan applies shaping state or removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    Apply,
    Remove,
}

impl PlanMode {
    fn op(self) -> Op {
        match self {
            Self::Apply => Op::Add,
            Self::Remove => Op::Del,
        }
    }
}

/// Errors from plan compilation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    /// The latency row or assignment is empty.
    #[error("cannot compile a plan for zero destination regions")]
    NoRegions,
    /// More regions than the address plan can encode.
    #[error("{plan:?} address plan supports at most {capacity} regions, got {regions}")]
    TooManyRegions { plan: AddressPlan, capacity: usize, regions: usize },
    /// A prio root can declare at most 16 bands.
    #[error("priority plan needs {needed} bands, prio qdiscs support at most 16")]
    TooManyBands { needed: u8 },
}

/// An ordered sequence of shaping commands for one host.
///
/// Ordering is significant on creation and insignificant on deletion;
/// the plan is immutable once compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapingPlan {
    commands: Vec<ShapingCommand>,
}

impl ShapingPlan {
    /// The commands in execution order.
    pub fn commands(&self) -> &[ShapingCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate over the commands in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &ShapingCommand> {
        self.commands.iter()
    }
}

/// Compiles per-host plans from the model artifacts.
#[derive(Debug, Clone)]
pub struct PlanCompiler {
    /// The device the shaping hierarchy is installed on.
    device: String,
    /// Ceiling installed on every leaf class of the latency path.
    ceiling: Rate,
}

impl PlanCompiler {
    pub fn new(device: impl Into<String>) -> Self {
        Self { device: device.into(), ceiling: DEFAULT_CEILING }
    }

    /// Override the per-class ceiling of the latency path.
    pub fn with_ceiling(mut self, ceiling: Rate) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Compile the HTB + netem plan realizing `row`, the host's latency row.
    ///
    /// Per destination region `k` (block `b = k+1`) with latency `v`:
    /// a leaf class, a netem qdisc adding `v/2` fixed delay and `v/8`
    /// pareto jitter (half the round trip on each side), and a u32 filter
    /// binding region `k`'s `/20` source block to the class. Filters match
    /// on source because the hierarchy sits on an ingress-mirrored IFB
    /// device.
    pub fn latency_plan(&self, mode: PlanMode, row: &[f64]) -> Result<ShapingPlan, PlanError> {
        let plan = AddressPlan::Slash20;
        check_capacity(plan, row.len())?;

        let op = mode.op();
        let mut commands = Vec::with_capacity(2 + row.len() * 3);

        commands.push(ShapingCommand::RootQdisc {
            op,
            device: self.device.clone(),
            handle: Handle::ROOT,
            kind: RootKind::Htb { default_class: None },
        });
        commands.push(ShapingCommand::Class {
            op,
            device: self.device.clone(),
            parent: Handle::ROOT,
            class_id: Handle::ROOT_CLASS,
            rate: self.ceiling,
        });

        for (region, &latency_ms) in row.iter().enumerate() {
            let class_id = Handle::leaf_class(region);
            commands.push(ShapingCommand::Class {
                op,
                device: self.device.clone(),
                parent: Handle::ROOT,
                class_id,
                rate: self.ceiling,
            });
            commands.push(ShapingCommand::NetemQdisc {
                op,
                device: self.device.clone(),
                parent: class_id,
                handle: Handle::netem(region),
                delay_ms: latency_ms / 2.0,
                jitter_ms: latency_ms / 8.0,
                loss_pct: LOSS_PERCENT,
                limit: NETEM_LIMIT,
            });
            commands.push(ShapingCommand::Filter {
                op,
                device: self.device.clone(),
                parent: Handle::ROOT,
                pref: region as u16 + 1,
                matches: FilterMatch { direction: MatchDirection::Src, block: plan.block(region) },
                flow_id: class_id,
            });
        }

        tracing::debug!(device = %self.device, regions = row.len(), ?mode, "compiled latency plan");
        Ok(ShapingPlan { commands })
    }

    /// Compile the strict-priority plan realizing `assignment`.
    ///
    /// One prio root with `base + n` bands, then one filter per destination
    /// binding its `/24` destination block directly to its band's class
    /// (`band b` is class `1:(b+1)` under tc-prio).
    pub fn priority_plan(
        &self,
        mode: PlanMode,
        assignment: &PriorityAssignment,
    ) -> Result<ShapingPlan, PlanError> {
        let plan = AddressPlan::Slash24;
        check_capacity(plan, assignment.len())?;
        let bands = assignment.band_count();
        if bands > 16 {
            return Err(PlanError::TooManyBands { needed: bands });
        }

        let op = mode.op();
        let mut commands = Vec::with_capacity(1 + assignment.len());

        commands.push(ShapingCommand::RootQdisc {
            op,
            device: self.device.clone(),
            handle: Handle::ROOT,
            kind: RootKind::Prio { bands, priomap: PRIO_PRIOMAP },
        });

        for (region, &band) in assignment.bands().iter().enumerate() {
            commands.push(ShapingCommand::Filter {
                op,
                device: self.device.clone(),
                parent: Handle::ROOT,
                pref: band as u16,
                matches: FilterMatch { direction: MatchDirection::Dst, block: plan.block(region) },
                flow_id: Handle::prio_band(band),
            });
        }

        tracing::debug!(device = %self.device, regions = assignment.len(), ?mode, "compiled priority plan");
        Ok(ShapingPlan { commands })
    }

    /// Compile the uniform bandwidth-cap plan: an HTB root whose default
    /// class carries the cap, so every flow on the device shares it.
    pub fn bandwidth_plan(&self, mode: PlanMode, cap: Rate) -> ShapingPlan {
        let op = mode.op();
        let commands = vec![
            ShapingCommand::RootQdisc {
                op,
                device: self.device.clone(),
                handle: Handle::BANDWIDTH_ROOT,
                kind: RootKind::Htb { default_class: Some(1) },
            },
            ShapingCommand::Class {
                op,
                device: self.device.clone(),
                parent: Handle::BANDWIDTH_ROOT,
                class_id: Handle::BANDWIDTH_CLASS,
                rate: cap,
            },
        ];

        tracing::debug!(device = %self.device, cap = %cap, ?mode, "compiled bandwidth plan");
        ShapingPlan { commands }
    }
}

fn check_capacity(plan: AddressPlan, regions: usize) -> Result<(), PlanError> {
    if regions == 0 {
        return Err(PlanError::NoRegions);
    }
    if regions > plan.capacity() {
        return Err(PlanError::TooManyRegions { plan, capacity: plan.capacity(), regions });
    }
    Ok(())
}

/// Device preparation for the ingress-shaped latency path.
///
/// Netem must sit on the receiver's ingress for TCP results to be realistic
/// (TSQ keeps egress queues shallow), so traffic arriving on the input
/// device is mirrored into an IFB device and shaped there. These commands
/// are idempotence-agnostic setup, emitted ahead of an apply plan only.
#[derive(Debug, Clone)]
pub struct DevicePrep {
    /// The device traffic actually arrives on.
    pub input_device: String,
    /// The IFB device the shaping hierarchy lives on.
    pub shaping_device: String,
}

impl DevicePrep {
    pub fn new(input_device: impl Into<String>, shaping_device: impl Into<String>) -> Self {
        Self { input_device: input_device.into(), shaping_device: shaping_device.into() }
    }

    /// The raw argv lines run before an apply plan.
    pub fn commands(&self) -> Vec<Vec<String>> {
        let input = &self.input_device;
        let shaping = &self.shaping_device;
        [
            vec!["sudo", "modprobe", "ifb"],
            vec!["sudo", "ip", "link", "set", "dev", shaping, "up"],
            vec!["sudo", "tc", "qdisc", "add", "dev", input, "ingress"],
            vec![
                "sudo", "tc", "filter", "add", "dev", input, "parent", "ffff:", "protocol", "ip",
                "u32", "match", "u32", "0", "0", "flowid", "1:1", "action", "mirred", "egress",
                "redirect", "dev", shaping,
            ],
        ]
        .into_iter()
        .map(|argv| argv.into_iter().map(str::to_string).collect())
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use fleetem_topo::BASE_BAND;

    use super::*;

    fn compiler() -> PlanCompiler {
        PlanCompiler::new("ifb1")
    }

    #[test]
    fn latency_plan_orders_class_creation_before_references() {
        let plan = compiler().latency_plan(PlanMode::Apply, &[32.0, 64.0, 100.0, 78.0]).unwrap();

        let mut created: HashSet<Handle> = HashSet::new();
        for cmd in plan.iter() {
            if let Some(class_id) = cmd.references_class() {
                assert!(
                    created.contains(&class_id),
                    "command references {class_id} before its creation: {cmd}"
                );
            }
            if let Some(class_id) = cmd.creates_class() {
                created.insert(class_id);
            }
        }
    }

    #[test]
    fn latency_plan_emits_the_expected_shell_lines() {
        let plan = compiler().latency_plan(PlanMode::Apply, &[100.0]).unwrap();
        let lines: Vec<String> = plan.iter().map(ToString::to_string).collect();

        assert_eq!(
            lines,
            [
                "sudo tc qdisc add dev ifb1 handle 1:0 root htb",
                "sudo tc class add dev ifb1 parent 1:0 classid 1:1 htb rate 10000Mbps",
                "sudo tc class add dev ifb1 parent 1:0 classid 1:11 htb rate 10000Mbps",
                "sudo tc qdisc add dev ifb1 parent 1:11 handle 10: netem delay 50ms 12.5ms \
                 distribution pareto loss 0.001% limit 100000",
                "sudo tc filter add dev ifb1 parent 1:0 protocol ip prio 1 u32 match ip src \
                 172.16.16.0/20 flowid 1:11",
            ]
        );
    }

    #[test]
    fn remove_mode_mirrors_the_apply_sequence_with_deletes() {
        let apply = compiler().latency_plan(PlanMode::Apply, &[2.0, 2.0]).unwrap();
        let remove = compiler().latency_plan(PlanMode::Remove, &[2.0, 2.0]).unwrap();

        assert_eq!(apply.len(), remove.len());
        assert!(remove.iter().all(ShapingCommand::is_delete));
        assert!(apply.iter().all(|c| !c.is_delete()));
    }

    #[test]
    fn latency_plan_rejects_too_many_regions() {
        let row = vec![2.0; 16];
        assert!(matches!(
            compiler().latency_plan(PlanMode::Apply, &row),
            Err(PlanError::TooManyRegions { regions: 16, .. })
        ));
        assert_eq!(
            compiler().latency_plan(PlanMode::Apply, &[]),
            Err(PlanError::NoRegions)
        );
    }

    #[test]
    fn priority_plan_binds_blocks_to_band_classes() {
        let assignment = PriorityAssignment::rank(&[40.0, 64.0, 100.0, 170.0], BASE_BAND).unwrap();
        let plan = compiler().priority_plan(PlanMode::Apply, &assignment).unwrap();
        let lines: Vec<String> = plan.iter().map(ToString::to_string).collect();

        assert_eq!(
            lines[0],
            "sudo tc qdisc add dev ifb1 handle 1:0 root prio bands 7 \
             priomap 1 2 2 2 1 2 0 0 1 1 1 1 1 1 1 1"
        );
        // Region 3 has the greatest latency: band 3, class 1:4.
        assert_eq!(
            lines[4],
            "sudo tc filter add dev ifb1 parent 1:0 protocol ip prio 3 u32 match ip dst \
             172.16.4.0/24 flowid 1:4"
        );
        // Region 0 has the smallest latency: band 6, class 1:7.
        assert_eq!(
            lines[1],
            "sudo tc filter add dev ifb1 parent 1:0 protocol ip prio 6 u32 match ip dst \
             172.16.1.0/24 flowid 1:7"
        );
    }

    #[test]
    fn priority_plan_rejects_band_overflow() {
        // Ten regions fit the /24 plan, but a base of 10 would need 20 bands.
        let row = vec![1.0; 10];
        let assignment = PriorityAssignment::rank(&row, 10).unwrap();
        assert_eq!(
            compiler().priority_plan(PlanMode::Apply, &assignment),
            Err(PlanError::TooManyBands { needed: 20 })
        );
    }

    #[test]
    fn bandwidth_plan_caps_the_default_class() {
        let plan = compiler().bandwidth_plan(PlanMode::Apply, Rate::mbit(50));
        let lines: Vec<String> = plan.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            [
                "sudo tc qdisc add dev ifb1 handle 2: root htb default 1",
                "sudo tc class add dev ifb1 parent 2:0 classid 2:1 htb rate 50mbit",
            ]
        );
    }

    #[test]
    fn device_prep_mirrors_ingress_into_the_ifb() {
        let prep = DevicePrep::new("lo", "ifb1");
        let lines: Vec<String> = prep.commands().iter().map(|argv| argv.join(" ")).collect();
        assert_eq!(lines[0], "sudo modprobe ifb");
        assert_eq!(lines[2], "sudo tc qdisc add dev lo ingress");
        assert!(lines[3].ends_with("action mirred egress redirect dev ifb1"));
    }
}
