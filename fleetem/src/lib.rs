//! WAN emulation for distributed-protocol benchmarks: derive a per-region
//! latency/bandwidth model from a topology mode, compile it into ordered
//! traffic-shaping plans, and apply those plans concurrently across a fleet
//! of test hosts with per-host failure isolation.

pub use fleetem_exec::*;
pub use fleetem_tc::*;
pub use fleetem_topo::*;
