//! Fleet-wide execution of compiled shaping plans.
//!
//! [`hosts`] parses the newline-delimited host inventory and resolves every
//! address to its region; [`transport`] abstracts "run one command on one
//! host" (SSH in production, scripted transports in tests); [`executor`]
//! fans a per-host plan out across the fleet with bounded concurrency,
//! per-command timeouts, a cancellation token, and per-host failure
//! isolation.

pub mod executor;
pub mod hosts;
pub mod transport;

pub use executor::{CommandFailure, FleetExecutor, HostJob, HostOutcome, HostReport};
pub use hosts::{Host, HostRegistry, RegistryError};
pub use transport::{Output, SshTransport, Transport, TransportError};
