//! Test utilities and stub collaborators for spool development.
//!
//! - [`CountingEnvGroup`]: deterministic environment group whose
//!   observations and rewards encode `(env, step)`, so tests can check
//!   exactly which step produced a buffered value.
//! - [`NoisyEnvGroup`]: seeded random rewards and dones for soak tests.
//! - [`EchoPolicy`]: derives every output from the first observation
//!   element and counts its calls.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod policy;

pub use fixtures::{CountingEnvGroup, DonePolicy, InfoMode, NoisyEnvGroup};
pub use policy::EchoPolicy;
