//! Typed Linux traffic-control plans for fleet-wide WAN emulation.
//!
//! This crate turns a host's view of the latency model into an ordered
//! [`ShapingPlan`] of atomic [`ShapingCommand`] values. Plan construction is
//! pure and unit-testable; a separate serializer renders each command into
//! the argv understood by the `tc`/`ip` boundary on the target host.
//!
//! ## Qdisc hierarchy (latency path)
//!
//! ```text
//! ingress (input dev) ──mirred──▶ IFB device
//!                                   │
//!                       HTB root 1:0, root class 1:1
//!                                   │
//!              ┌────────────────────┼────────────────────┐
//!              ▼                    ▼                    ▼
//!         class 1:11           class 1:12           class 1:13
//!         (region 0)           (region 1)           (region 2)
//!              │                    │                    │
//!         netem 10:            netem 20:            netem 30:
//!         delay/jitter/loss    …                    …
//! ```
//!
//! One u32 filter per region binds its synthetic address block to its class;
//! the block convention is shared with [`classify`], the single source of
//! truth for address-to-region resolution.

pub mod addr;
pub mod command;
pub mod handle;
pub mod plan;

pub use addr::{classify, AddressPlan, CidrBlock, ClassifyError};
pub use command::{FilterMatch, MatchDirection, Op, Rate, RateUnit, RootKind, ShapingCommand};
pub use handle::Handle;
pub use plan::{DevicePrep, PlanCompiler, PlanError, PlanMode, ShapingPlan};
