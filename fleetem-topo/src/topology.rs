//! Topology modes and matrix construction.
//!
//! Each [`Topology`] is a pure function of the region count and an immutable
//! [`TopologyConfig`]; there is no process-wide state. The measured tables
//! carry real-world values observed between the corresponding cloud regions
//! and are reproduced verbatim.

use crate::matrix::LatencyMatrix;
use crate::schedule::{round_robin, ScheduleError};

/// Hand-measured inter-region round-trip latencies (ms) for the four-region
/// layout of [`crate::region::RegionSet::aws_four`]. Not generated.
pub const MEASURED_FOUR_REGION: [[f64; 4]; 4] = [
    [32.0, 64.0, 100.0, 78.0],
    [64.0, 32.0, 150.0, 140.0],
    [100.0, 150.0, 13.0, 26.0],
    [78.0, 140.0, 26.0, 13.0],
];

/// Hand-measured latencies (ms) for the seven-region layout of
/// [`crate::region::RegionSet::aws_seven`]; 40 ms is used within a region.
pub const MEASURED_SEVEN_REGION: [[f64; 7]; 7] = [
    [40.0, 64.0, 100.0, 170.0, 78.0, 220.0, 118.0],
    [64.0, 40.0, 150.0, 85.0, 140.0, 146.0, 170.0],
    [100.0, 150.0, 40.0, 236.0, 26.0, 280.0, 230.0],
    [170.0, 85.0, 236.0, 40.0, 224.0, 232.0, 268.0],
    [78.0, 140.0, 26.0, 224.0, 40.0, 254.0, 200.0],
    [220.0, 146.0, 280.0, 232.0, 254.0, 40.0, 308.0],
    [118.0, 170.0, 230.0, 268.0, 200.0, 308.0, 40.0],
];

/// Selects how the latency matrix is derived from the region count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Uniform small intra/cross latency everywhere.
    Baseline,
    /// Baseline with the single pair `(0, 1)` overridden to the large value.
    SingleLink,
    /// The verbatim hand-measured table (four- or seven-region layout).
    Measured,
    /// Every entry, diagonal included, set to the large value.
    UniformHigh,
    /// Baseline with the last two indices overridden to the large value.
    EdgeLink,
    /// Round-robin tournament: each round of the schedule gets a distinct
    /// value from an ascending sequence spanning the latency budget.
    Tournament,
    /// Baseline with the entire last row and column overridden, simulating
    /// one geographically isolated host.
    IsolatedNode,
}

/// Immutable knobs for matrix construction, built once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologyConfig {
    /// Baseline intra/cross latency in ms.
    pub base_ms: f64,
    /// The "slow link" override value in ms.
    pub override_ms: f64,
    /// Maximum latency budget for the tournament mode in ms.
    pub budget_ms: f64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self { base_ms: 2.0, override_ms: 300.0, budget_ms: 300.0 }
    }
}

/// Errors from matrix construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopologyError {
    /// Measured tables exist only for the four- and seven-region layouts.
    #[error("measured topology is defined for 4 or 7 regions, got {0}")]
    MeasuredRegionCount(usize),
    /// Every mode needs at least two regions to be meaningful.
    #[error("topology requires at least 2 regions, got {0}")]
    TooFewRegions(usize),
    /// Tournament scheduling failed (even or tiny region count).
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Build the symmetric latency matrix for `topology` over `regions` regions.
pub fn build_matrix(
    topology: Topology,
    regions: usize,
    config: &TopologyConfig,
) -> Result<LatencyMatrix, TopologyError> {
    if regions < 2 {
        return Err(TopologyError::TooFewRegions(regions));
    }

    let matrix = match topology {
        Topology::Baseline => LatencyMatrix::filled(regions, config.base_ms),
        Topology::SingleLink => {
            let mut m = LatencyMatrix::filled(regions, config.base_ms);
            m.set_symmetric(0, 1, config.override_ms);
            m
        }
        Topology::Measured => {
            let rows: Vec<&[f64]> = match regions {
                4 => MEASURED_FOUR_REGION.iter().map(|r| r.as_slice()).collect(),
                7 => MEASURED_SEVEN_REGION.iter().map(|r| r.as_slice()).collect(),
                other => return Err(TopologyError::MeasuredRegionCount(other)),
            };
            LatencyMatrix::from_rows(&rows)
        }
        Topology::UniformHigh => LatencyMatrix::filled(regions, config.override_ms),
        Topology::EdgeLink => {
            let mut m = LatencyMatrix::filled(regions, config.base_ms);
            m.set_symmetric(regions - 2, regions - 1, config.override_ms);
            m
        }
        Topology::Tournament => tournament_matrix(regions, config)?,
        Topology::IsolatedNode => {
            let mut m = LatencyMatrix::filled(regions, config.base_ms);
            let last = regions - 1;
            for i in 0..regions {
                m.set_symmetric(i, last, config.override_ms);
            }
            m
        }
    };

    debug_assert!(matrix.is_symmetric());
    tracing::debug!(?topology, regions, "built latency matrix");
    Ok(matrix)
}

/// Tournament mode: the schedule's `n` rounds plus the diagonal need `n + 1`
/// distinct values, taken in equal steps up to the budget. The diagonal gets
/// the first (smallest) step, round `r` the `r + 1`-th.
fn tournament_matrix(regions: usize, config: &TopologyConfig) -> Result<LatencyMatrix, TopologyError> {
    let schedule = round_robin(regions)?;
    let step = config.budget_ms / (regions + 1) as f64;

    let mut m = LatencyMatrix::filled(regions, step);
    for (r, round) in schedule.rounds().iter().enumerate() {
        let value = step * (r + 2) as f64;
        for &(a, b) in round {
            m.set_symmetric(a, b, value);
        }
    }
    Ok(m)
}
