//! Pure model layer for fleet network emulation.
//!
//! Everything in this crate is deterministic and free of I/O: region sets,
//! inter-region latency matrices built from a topology mode, the round-robin
//! tournament schedule used by the [`Topology::Tournament`] mode, and the
//! latency-to-priority-band ranking used by strict-priority plans.

pub mod matrix;
pub mod priority;
pub mod region;
pub mod schedule;
pub mod topology;

pub use matrix::LatencyMatrix;
pub use priority::{PriorityAssignment, RankError, BASE_BAND};
pub use region::RegionSet;
pub use schedule::{round_robin, RoundSchedule, ScheduleError};
pub use topology::{build_matrix, Topology, TopologyConfig, TopologyError};
