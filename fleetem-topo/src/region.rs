//! Region identities.
//!
//! A region is an index into a [`RegionSet`] plus an opaque name that is only
//! used for diagnostics. The set is constructed once per run and never
//! mutated afterwards; every model artifact derived from it (latency matrix,
//! priority assignment, shaping plans) refers to regions by index.

/// An immutable, ordered set of region names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSet {
    names: Vec<String>,
}

impl RegionSet {
    /// Create a region set from an explicit list of names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    /// Create a region set of `n` synthetic regions named `region-0..n-1`.
    pub fn synthetic(n: usize) -> Self {
        Self { names: (0..n).map(|i| format!("region-{i}")).collect() }
    }

    /// The four-region layout used by the hand-measured latency table.
    pub fn aws_four() -> Self {
        Self::new(["us-east-1", "us-west-2", "eu-north-1", "eu-central-1"])
    }

    /// The seven-region layout used by the priority experiments.
    pub fn aws_seven() -> Self {
        Self::new([
            "us-east-1",
            "us-west-2",
            "eu-north-1",
            "ap-northeast-1",
            "eu-west-2",
            "ap-southeast-2",
            "sa-east-1",
        ])
    }

    /// The canonical set for `n` regions: the measured four- and
    /// seven-region layouts where they exist, synthetic names otherwise.
    pub fn for_count(n: usize) -> Self {
        match n {
            4 => Self::aws_four(),
            7 => Self::aws_seven(),
            _ => Self::synthetic(n),
        }
    }

    /// Number of regions in the set.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The diagnostic name of region `index`, if it exists.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Iterate over `(index, name)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }
}
