//! Round-robin tournament scheduling over regions.
//!
//! A [`RoundSchedule`] is a 1-factorization of the complete graph over `n`
//! regions: `n` rounds (for odd `n`), each a matching of `(n-1)/2` disjoint
//! pairs, with every unordered pair appearing in exactly one round. The
//! tournament topology mode assigns each round a distinct latency value, so
//! no two region pairs are forced to share a simulated cross-region latency
//! within the same round.

/// Errors from schedule construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The circle construction used here is only defined for odd counts.
    #[error("round-robin schedule requires an odd region count, got {0}")]
    EvenRegionCount(usize),
    /// A schedule over fewer than three regions has no cross-region pairs.
    #[error("round-robin schedule requires at least 3 regions, got {0}")]
    TooFewRegions(usize),
}

/// An ordered sequence of rounds, each a matching of region pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSchedule {
    n: usize,
    rounds: Vec<Vec<(usize, usize)>>,
}

impl RoundSchedule {
    /// The region count the schedule was built for.
    pub fn region_count(&self) -> usize {
        self.n
    }

    /// The rounds, in order. Pairs are normalized to `(low, high)`.
    pub fn rounds(&self) -> &[Vec<(usize, usize)>] {
        &self.rounds
    }

    /// The region sitting out round `r` (the "bye" of the circle method).
    pub fn bye(&self, round: usize) -> usize {
        round
    }
}

/// Build the round-robin schedule for an odd number of regions.
///
/// Circle method: label regions `0..n-1` on a circle; round `r` pairs
/// `(r + k) mod n` with `(r - k) mod n` for `k = 1..=(n-1)/2`, leaving
/// region `r` out. Since `n` is odd, each unordered pair `{a, b}` lands in
/// exactly the round `r` with `2r ≡ a + b (mod n)`.
pub fn round_robin(n: usize) -> Result<RoundSchedule, ScheduleError> {
    if n < 3 {
        return Err(ScheduleError::TooFewRegions(n));
    }
    if n % 2 == 0 {
        return Err(ScheduleError::EvenRegionCount(n));
    }

    let mut rounds = Vec::with_capacity(n);
    for r in 0..n {
        let mut pairs = Vec::with_capacity((n - 1) / 2);
        for k in 1..=(n - 1) / 2 {
            let a = (r + k) % n;
            let b = (r + n - k) % n;
            pairs.push((a.min(b), a.max(b)));
        }
        rounds.push(pairs);
    }

    Ok(RoundSchedule { n, rounds })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn rejects_even_and_tiny_counts() {
        assert_eq!(round_robin(4), Err(ScheduleError::EvenRegionCount(4)));
        assert_eq!(round_robin(1), Err(ScheduleError::TooFewRegions(1)));
    }

    #[test]
    fn odd_counts_cover_every_pair_exactly_once() {
        for n in [3usize, 5, 7, 9, 11] {
            let schedule = round_robin(n).unwrap();
            assert_eq!(schedule.rounds().len(), n);

            let mut seen = HashSet::new();
            for round in schedule.rounds() {
                assert_eq!(round.len(), (n - 1) / 2);
                // Pairs within a round are vertex-disjoint.
                let mut vertices = HashSet::new();
                for &(a, b) in round {
                    assert!(a < b);
                    assert!(vertices.insert(a));
                    assert!(vertices.insert(b));
                    assert!(seen.insert((a, b)), "pair ({a}, {b}) repeated");
                }
            }
            assert_eq!(seen.len(), n * (n - 1) / 2);
        }
    }

    #[test]
    fn bye_region_never_appears_in_its_round() {
        let schedule = round_robin(7).unwrap();
        for (r, round) in schedule.rounds().iter().enumerate() {
            assert_eq!(schedule.bye(r), r);
            for &(a, b) in round {
                assert_ne!(a, r);
                assert_ne!(b, r);
            }
        }
    }
}
