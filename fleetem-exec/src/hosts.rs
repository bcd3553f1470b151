//! Host inventory parsing and region resolution.
//!
//! The inventory is a newline-delimited list of IPv4 literals; order has no
//! meaning beyond stable enumeration. Every address is resolved to a region
//! through [`fleetem_tc::classify`]; an address that resolves to no modeled
//! region is an error naming the host, never a silent skip, because an
//! unclassified host would otherwise receive an incomplete plan.

use std::io::{self, BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;

use fleetem_tc::{classify, ClassifyError};

/// One fleet host: its address and its resolved region index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Host {
    pub addr: Ipv4Addr,
    pub region: usize,
}

/// Errors from inventory loading.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read inventory: {0}")]
    Io(#[from] io::Error),
    #[error("inventory line {line}: {text:?} is not an IPv4 address")]
    BadAddress { line: usize, text: String },
    #[error("unclassifiable hosts in inventory: {}", format_unclassified(.0))]
    Unclassified(Vec<(Ipv4Addr, ClassifyError)>),
}

fn format_unclassified(hosts: &[(Ipv4Addr, ClassifyError)]) -> String {
    hosts.iter().map(|(_, e)| e.to_string()).collect::<Vec<_>>().join("; ")
}

/// The ordered host list with resolved regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRegistry {
    hosts: Vec<Host>,
}

impl HostRegistry {
    /// Parse an inventory, resolving each address against `region_count`
    /// modeled regions. Blank lines are ignored.
    pub fn parse<R: BufRead>(reader: R, region_count: usize) -> Result<Self, RegistryError> {
        let mut hosts = Vec::new();
        let mut unclassified = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }

            let addr: Ipv4Addr = text.parse().map_err(|_| RegistryError::BadAddress {
                line: idx + 1,
                text: text.to_string(),
            })?;

            match classify(addr, region_count) {
                Ok(region) => hosts.push(Host { addr, region }),
                Err(e) => unclassified.push((addr, e)),
            }
        }

        if !unclassified.is_empty() {
            return Err(RegistryError::Unclassified(unclassified));
        }

        tracing::debug!(hosts = hosts.len(), region_count, "loaded host inventory");
        Ok(Self { hosts })
    }

    /// Load an inventory file (the conventional `ip.list`).
    pub fn load(path: impl AsRef<Path>, region_count: usize) -> Result<Self, RegistryError> {
        let file = std::fs::File::open(path)?;
        Self::parse(BufReader::new(file), region_count)
    }

    /// The hosts in inventory order.
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_addresses_and_resolves_regions() {
        let inventory = "172.16.1.10\n172.16.2.10\n\n172.16.48.7\n";
        let registry = HostRegistry::parse(inventory.as_bytes(), 4).unwrap();

        assert_eq!(
            registry.hosts(),
            &[
                Host { addr: "172.16.1.10".parse().unwrap(), region: 0 },
                Host { addr: "172.16.2.10".parse().unwrap(), region: 1 },
                Host { addr: "172.16.48.7".parse().unwrap(), region: 2 },
            ]
        );
    }

    #[test]
    fn rejects_malformed_lines_with_position() {
        let err = HostRegistry::parse("172.16.1.10\nnot-an-ip\n".as_bytes(), 4).unwrap_err();
        assert!(matches!(err, RegistryError::BadAddress { line: 2, .. }));
    }

    #[test]
    fn surfaces_every_unclassifiable_host() {
        let inventory = "172.16.1.10\n172.16.9.1\n172.16.0.3\n";
        let err = HostRegistry::parse(inventory.as_bytes(), 4).unwrap_err();
        match err {
            RegistryError::Unclassified(hosts) => {
                assert_eq!(hosts.len(), 2);
                assert_eq!(hosts[0].0, "172.16.9.1".parse::<Ipv4Addr>().unwrap());
                assert_eq!(hosts[1].0, "172.16.0.3".parse::<Ipv4Addr>().unwrap());
            }
            other => panic!("expected Unclassified, got {other:?}"),
        }
    }
}
