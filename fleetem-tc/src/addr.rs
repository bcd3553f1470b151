//! Synthetic address blocks and address-to-region classification.
//!
//! Every host in the fleet lives in a `172.16.0.0/16` overlay where the
//! third dotted octet encodes its region. The inventory generator, the
//! classification rule here, and the filter blocks the plan compiler emits
//! must all agree on this encoding, since tc filters match on addresses,
//! not on logical region identifiers.

use std::fmt;
use std::net::Ipv4Addr;

/// How region address blocks are carved out of `172.16.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPlan {
    /// Region `k` owns `172.16.(16·(k+1)).0/20`; used by large experiments
    /// where one region spans many third-octet values.
    Slash20,
    /// Region `k` owns `172.16.(k+1).0/24`; the narrow variant for small
    /// experiments.
    Slash24,
}

impl AddressPlan {
    /// The address block assigned to `region`.
    ///
    /// `region` must be below [`Self::capacity`]; the compiler validates
    /// region counts before calling this.
    pub fn block(&self, region: usize) -> CidrBlock {
        debug_assert!(
            region < self.capacity(),
            "region {region} exceeds {self:?} capacity {}",
            self.capacity()
        );
        let b = region as u8 + 1;
        match self {
            Self::Slash20 => CidrBlock { network: Ipv4Addr::new(172, 16, 16 * b, 0), prefix: 20 },
            Self::Slash24 => CidrBlock { network: Ipv4Addr::new(172, 16, b, 0), prefix: 24 },
        }
    }

    /// The number of regions this plan can address while staying consistent
    /// with [`classify`].
    pub const fn capacity(&self) -> usize {
        match self {
            // Third octet 16·b must fit in u8: b ≤ 15.
            Self::Slash20 => 15,
            // Third octet b must stay at or below the classify threshold.
            Self::Slash24 => 10,
        }
    }
}

/// An IPv4 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBlock {
    pub network: Ipv4Addr,
    pub prefix: u8,
}

impl CidrBlock {
    /// Whether `addr` falls inside this block.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = u32::MAX << (32 - self.prefix as u32);
        u32::from(addr) & mask == u32::from(self.network) & mask
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Errors from address classification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClassifyError {
    /// The third octet is zero, which no region block ever produces.
    #[error("address {0} does not fall in any region block")]
    Unmapped(Ipv4Addr),
    /// The address encodes a region beyond the modeled count.
    #[error("address {addr} maps to region {region}, but only {count} regions are modeled")]
    OutOfRange { addr: Ipv4Addr, region: usize, count: usize },
}

/// Resolve the region index encoded in a host address.
///
/// The third dotted octet is the 1-indexed block number; values above 10
/// come from the `/20` plan and are divided by 16 first. This function is
/// the single source of truth shared with the filter compiler, so that
/// classification and filter address blocks can never drift apart.
pub fn classify(addr: Ipv4Addr, region_count: usize) -> Result<usize, ClassifyError> {
    let octet = addr.octets()[2] as usize;
    let block = if octet > 10 { octet / 16 } else { octet };
    if block == 0 {
        return Err(ClassifyError::Unmapped(addr));
    }

    let region = block - 1;
    if region >= region_count {
        return Err(ClassifyError::OutOfRange { addr, region, count: region_count });
    }
    Ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_reads_the_third_octet() {
        assert_eq!(classify(Ipv4Addr::new(172, 16, 1, 7), 4), Ok(0));
        assert_eq!(classify(Ipv4Addr::new(172, 16, 4, 200), 4), Ok(3));
    }

    #[test]
    fn classify_divides_large_octets_for_the_slash20_plan() {
        // 172.16.32.0/20 is region 1's block.
        assert_eq!(classify(Ipv4Addr::new(172, 16, 32, 5), 4), Ok(1));
        assert_eq!(classify(Ipv4Addr::new(172, 16, 47, 5), 4), Ok(1));
        assert_eq!(classify(Ipv4Addr::new(172, 16, 112, 1), 7), Ok(6));
    }

    #[test]
    fn classify_rejects_unmapped_and_out_of_range() {
        assert_eq!(
            classify(Ipv4Addr::new(172, 16, 0, 1), 4),
            Err(ClassifyError::Unmapped(Ipv4Addr::new(172, 16, 0, 1)))
        );
        assert!(matches!(
            classify(Ipv4Addr::new(172, 16, 5, 1), 4),
            Err(ClassifyError::OutOfRange { region: 4, .. })
        ));
    }

    #[test]
    fn blocks_render_in_cidr_notation() {
        assert_eq!(AddressPlan::Slash20.block(0).to_string(), "172.16.16.0/20");
        assert_eq!(AddressPlan::Slash20.block(2).to_string(), "172.16.48.0/20");
        assert_eq!(AddressPlan::Slash24.block(0).to_string(), "172.16.1.0/24");
    }

    #[test]
    fn classification_round_trips_through_the_blocks() {
        for plan in [AddressPlan::Slash20, AddressPlan::Slash24] {
            let regions = 7;
            for region in 0..regions {
                let block = plan.block(region);
                // Sample addresses across the block.
                for host in [1u8, 77, 254] {
                    let octets = block.network.octets();
                    let addr = Ipv4Addr::new(octets[0], octets[1], octets[2], host);
                    assert!(block.contains(addr));
                    assert_eq!(classify(addr, regions), Ok(region), "{plan:?} {addr}");
                }
            }
        }
    }

    #[test]
    #[should_panic(expected = "exceeds Slash20 capacity")]
    fn block_rejects_regions_beyond_capacity() {
        // 16 · (15 + 1) would wrap the third octet to zero.
        let _ = AddressPlan::Slash20.block(15);
    }

    #[test]
    fn slash20_blocks_contain_their_whole_octet_range() {
        let block = AddressPlan::Slash20.block(1); // 172.16.32.0/20
        assert!(block.contains(Ipv4Addr::new(172, 16, 39, 9)));
        assert!(!block.contains(Ipv4Addr::new(172, 16, 48, 9)));
    }
}
