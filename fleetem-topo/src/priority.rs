//! Latency-to-priority-band ranking.
//!
//! Under strict-priority queuing, sending a high-path-latency flow first
//! keeps queuing delay from compounding with path latency and normalizes
//! cross-region arrival ordering. The ranker therefore gives the destination
//! with the greatest latency the smallest band number (highest priority).

/// The smallest band handed out to destination traffic. Bands below this are
/// reserved for control traffic, which must never be starved by the shaped
/// flows.
pub const BASE_BAND: u8 = 3;

/// Errors from ranking.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RankError {
    /// The band range `[base, base + n - 1]` would run past the 8-bit band
    /// space, breaking the bijection.
    #[error("{regions} regions starting at band {base} do not fit the 8-bit band space")]
    BandOverflow { base: u8, regions: usize },
}

/// A bijection from destination region index onto the contiguous band range
/// `[base, base + n - 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityAssignment {
    base: u8,
    bands: Vec<u8>,
}

impl PriorityAssignment {
    /// Rank one host's latency row into priority bands.
    ///
    /// The destination with the strictly greatest latency gets `base`; bands
    /// increase as latency decreases. Equal latencies are ordered by region
    /// index ascending, so the lower index gets the smaller band. Rows whose
    /// band range would not fit in eight bits are rejected.
    pub fn rank(latencies: &[f64], base: u8) -> Result<Self, RankError> {
        if latencies.len() > (u8::MAX - base) as usize {
            return Err(RankError::BandOverflow { base, regions: latencies.len() });
        }

        let mut order: Vec<usize> = (0..latencies.len()).collect();
        order.sort_by(|&a, &b| latencies[b].total_cmp(&latencies[a]).then(a.cmp(&b)));

        let mut bands = vec![0u8; latencies.len()];
        for (offset, &region) in order.iter().enumerate() {
            bands[region] = base + offset as u8;
        }
        Ok(Self { base, bands })
    }

    /// The band assigned to `region`.
    pub fn band(&self, region: usize) -> Option<u8> {
        self.bands.get(region).copied()
    }

    /// All bands, indexed by destination region.
    pub fn bands(&self) -> &[u8] {
        &self.bands
    }

    /// The smallest band in the assignment.
    pub fn base(&self) -> u8 {
        self.base
    }

    /// Number of destination regions covered.
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Whether the assignment covers no regions.
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// The number of bands a prio root qdisc must declare to address every
    /// assigned band: the reserved bands plus one per destination.
    pub fn band_count(&self) -> u8 {
        self.base + self.bands.len() as u8
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn highest_latency_gets_the_base_band() {
        let assignment = PriorityAssignment::rank(&[40.0, 64.0, 100.0, 170.0], BASE_BAND).unwrap();
        assert_eq!(assignment.band(3), Some(3));
        assert_eq!(assignment.band(2), Some(4));
        assert_eq!(assignment.band(1), Some(5));
        assert_eq!(assignment.band(0), Some(6));
        assert_eq!(assignment.band_count(), 7);
    }

    #[test]
    fn assignment_is_a_bijection_onto_the_band_range() {
        let row = &MEASURED[2];
        let assignment = PriorityAssignment::rank(row, BASE_BAND).unwrap();
        let bands: HashSet<u8> = assignment.bands().iter().copied().collect();
        assert_eq!(bands.len(), row.len());
        for b in &bands {
            assert!((BASE_BAND..BASE_BAND + row.len() as u8).contains(b));
        }
    }

    #[test]
    fn ties_break_by_region_index_ascending() {
        let assignment = PriorityAssignment::rank(&[50.0, 80.0, 50.0], BASE_BAND).unwrap();
        assert_eq!(assignment.band(1), Some(3));
        // Equal 50.0 entries: lower region index gets the smaller band.
        assert_eq!(assignment.band(0), Some(4));
        assert_eq!(assignment.band(2), Some(5));
    }

    #[test]
    fn rank_rejects_rows_overflowing_the_band_space() {
        let row = vec![1.0; 260];
        assert_eq!(
            PriorityAssignment::rank(&row, BASE_BAND),
            Err(RankError::BandOverflow { base: BASE_BAND, regions: 260 })
        );

        // The largest row that still fits must succeed and stay a bijection.
        let row = vec![1.0; (u8::MAX - BASE_BAND) as usize];
        let assignment = PriorityAssignment::rank(&row, BASE_BAND).unwrap();
        assert_eq!(assignment.band(row.len() - 1), Some(u8::MAX - 1));
    }

    const MEASURED: [[f64; 7]; 7] = crate::topology::MEASURED_SEVEN_REGION;
}
