//! Atomic shaping commands and their argv serializer.
//!
//! A [`ShapingCommand`] is a typed value describing one operation against
//! the host's traffic-control hierarchy. Keeping the value separate from its
//! rendered form lets plan construction be tested without any OS or network
//! access; [`ShapingCommand::render`] produces the exact argv handed to the
//! remote transport.

use std::fmt;

use crate::addr::CidrBlock;
use crate::handle::Handle;

/// The priomap installed on prio roots: best-effort TOS values land in the
/// reserved control bands 0-2, never in the per-destination bands.
pub const PRIO_PRIOMAP: [u8; 16] = [1, 2, 2, 2, 1, 2, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1];

/// Whether a command creates or deletes its object.
///
/// Creation is not safely re-appliable: the kernel rejects a duplicate
/// create and that failure must surface. Deletion is re-issuable; removing
/// an absent object is treated as a no-op by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Del,
}

impl Op {
    fn verb(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Del => "del",
        }
    }
}

/// A shaping rate with its explicit unit.
///
/// `tc` distinguishes `mbit` (megabit/s) from `Mbps` (megabyte/s); both
/// appear at the boundary, so the unit is carried, never assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub value: u64,
    pub unit: RateUnit,
}

impl Rate {
    pub const fn mbit(value: u64) -> Self {
        Self { value, unit: RateUnit::Mbit }
    }

    pub const fn mbyte_per_sec(value: u64) -> Self {
        Self { value, unit: RateUnit::MBps }
    }
}

/// Rate units as `tc` spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    /// Megabit per second (`mbit`).
    Mbit,
    /// Megabyte per second (`Mbps`).
    MBps,
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            RateUnit::Mbit => "mbit",
            RateUnit::MBps => "Mbps",
        };
        write!(f, "{}{}", self.value, unit)
    }
}

/// The discipline installed at the root of a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// Hierarchical token bucket; rate ceilings live on its classes.
    Htb {
        /// Minor of the class unclassified traffic falls into, if any.
        default_class: Option<u16>,
    },
    /// Fixed-band strict priority with an explicit TOS-to-band map.
    Prio { bands: u8, priomap: [u8; 16] },
}

/// Which packet field a classification filter matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDirection {
    /// Source address (ingress-mirrored traffic: match the sender's block).
    Src,
    /// Destination address (egress traffic).
    Dst,
}

impl MatchDirection {
    fn keyword(self) -> &'static str {
        match self {
            Self::Src => "src",
            Self::Dst => "dst",
        }
    }
}

/// An address-block match bound to a class or priority band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterMatch {
    pub direction: MatchDirection,
    pub block: CidrBlock,
}

/// One atomic, ordered traffic-control operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapingCommand {
    /// Install or remove the root classifier of a hierarchy.
    RootQdisc { op: Op, device: String, handle: Handle, kind: RootKind },
    /// Install or remove an HTB class carrying a rate ceiling.
    Class { op: Op, device: String, parent: Handle, class_id: Handle, rate: Rate },
    /// Install or remove a netem qdisc: fixed delay, pareto-distributed
    /// jitter modelling the rare large outliers seen on real inter-region
    /// links, and a uniform loss probability.
    NetemQdisc {
        op: Op,
        device: String,
        parent: Handle,
        handle: Handle,
        delay_ms: f64,
        jitter_ms: f64,
        loss_pct: f64,
        limit: u32,
    },
    /// Install or remove a u32 classification filter binding an address
    /// block to a class or priority band.
    Filter { op: Op, device: String, parent: Handle, pref: u16, matches: FilterMatch, flow_id: Handle },
}

impl ShapingCommand {
    /// The operation this command performs.
    pub fn op(&self) -> Op {
        match self {
            Self::RootQdisc { op, .. }
            | Self::Class { op, .. }
            | Self::NetemQdisc { op, .. }
            | Self::Filter { op, .. } => *op,
        }
    }

    /// Whether this command deletes its object (and is therefore safely
    /// re-issuable).
    pub fn is_delete(&self) -> bool {
        self.op() == Op::Del
    }

    /// The class id this command brings into existence, if any.
    pub fn creates_class(&self) -> Option<Handle> {
        match self {
            Self::Class { op: Op::Add, class_id, .. } => Some(*class_id),
            _ => None,
        }
    }

    /// The class id this command points packets or qdiscs at, if any.
    pub fn references_class(&self) -> Option<Handle> {
        match self {
            Self::Filter { flow_id, .. } => Some(*flow_id),
            Self::NetemQdisc { parent, .. } => Some(*parent),
            _ => None,
        }
    }

    /// Render the argv for the OS traffic-control boundary.
    pub fn render(&self) -> Vec<String> {
        let mut argv: Vec<String> = Vec::new();
        let mut push = |s: &str| argv.push(s.to_string());

        match self {
            Self::RootQdisc { op, device, handle, kind } => {
                for s in ["sudo", "tc", "qdisc", op.verb(), "dev", device] {
                    push(s);
                }
                match kind {
                    RootKind::Htb { default_class: None } => {
                        push("handle");
                        push(&handle.to_string());
                        push("root");
                        push("htb");
                    }
                    RootKind::Htb { default_class: Some(minor) } => {
                        push("handle");
                        push(&handle.qdisc_form());
                        push("root");
                        push("htb");
                        push("default");
                        push(&minor.to_string());
                    }
                    RootKind::Prio { bands, priomap } => {
                        push("handle");
                        push(&handle.to_string());
                        push("root");
                        push("prio");
                        push("bands");
                        push(&bands.to_string());
                        push("priomap");
                        for p in priomap {
                            push(&p.to_string());
                        }
                    }
                }
            }
            Self::Class { op, device, parent, class_id, rate } => {
                for s in ["sudo", "tc", "class", op.verb(), "dev", device] {
                    push(s);
                }
                push("parent");
                push(&parent.to_string());
                push("classid");
                push(&class_id.to_string());
                push("htb");
                push("rate");
                push(&rate.to_string());
            }
            Self::NetemQdisc { op, device, parent, handle, delay_ms, jitter_ms, loss_pct, limit } => {
                for s in ["sudo", "tc", "qdisc", op.verb(), "dev", device] {
                    push(s);
                }
                push("parent");
                push(&parent.to_string());
                push("handle");
                push(&handle.qdisc_form());
                push("netem");
                push("delay");
                push(&format!("{delay_ms}ms"));
                push(&format!("{jitter_ms}ms"));
                push("distribution");
                push("pareto");
                push("loss");
                push(&format!("{loss_pct}%"));
                push("limit");
                push(&limit.to_string());
            }
            Self::Filter { op, device, parent, pref, matches, flow_id } => {
                for s in ["sudo", "tc", "filter", op.verb(), "dev", device] {
                    push(s);
                }
                push("parent");
                push(&parent.to_string());
                push("protocol");
                push("ip");
                push("prio");
                push(&pref.to_string());
                push("u32");
                push("match");
                push("ip");
                push(matches.direction.keyword());
                push(&matches.block.to_string());
                push("flowid");
                push(&flow_id.to_string());
            }
        }

        argv
    }
}

impl fmt::Display for ShapingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render().join(" "))
    }
}
