//! TC handle computation.
//!
//! TC handles are 32-bit values split into major:minor (16:16 bits) and
//! rendered in hexadecimal by the `tc` command line. Numbering scheme:
//!
//! | Component              | Handle       | Example (region 1) |
//! |------------------------|--------------|--------------------|
//! | HTB root               | `1:0`        |                    |
//! | HTB root class         | `1:1`        |                    |
//! | Per-region leaf class  | `1:(10+b)ₕ`  | `1:12`             |
//! | Per-region netem qdisc | `(10·b)ₕ:0`  | `20:`              |
//! | Bandwidth-cap root     | `2:0`        |                    |
//! | Bandwidth-cap class    | `2:1`        |                    |
//!
//! where `b = region + 1` is the 1-indexed block number shared with the
//! address-block convention in [`crate::addr`].

use std::fmt;

/// A qdisc/class handle, rendered as `major:minor` in hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub major: u16,
    pub minor: u16,
}

impl Handle {
    /// The root of the shaping hierarchy (`1:0`).
    pub const ROOT: Self = Self::new(1, 0);

    /// The root class carrying the aggregate ceiling (`1:1`).
    pub const ROOT_CLASS: Self = Self::new(1, 1);

    /// The root of the standalone bandwidth-cap hierarchy (`2:0`).
    pub const BANDWIDTH_ROOT: Self = Self::new(2, 0);

    /// The single class of the bandwidth-cap hierarchy (`2:1`).
    pub const BANDWIDTH_CLASS: Self = Self::new(2, 1);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// The leaf class for a destination region: `1:(0x10 + region + 1)`.
    pub fn leaf_class(region: usize) -> Self {
        Self::new(1, 0x10 + region as u16 + 1)
    }

    /// The netem qdisc for a destination region: `(0x10 · (region + 1)):0`.
    pub fn netem(region: usize) -> Self {
        Self::new(0x10 * (region as u16 + 1), 0)
    }

    /// The prio-qdisc class addressing `band`: band `b` is class `1:(b+1)`.
    pub fn prio_band(band: u8) -> Self {
        Self::new(1, band as u16 + 1)
    }

    /// Render in the major-only form used for qdisc handles (`"20:"`).
    pub fn qdisc_form(&self) -> String {
        format!("{:x}:", self.major)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{:x}", self.major, self.minor)
    }
}
