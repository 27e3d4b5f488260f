//! Find out which DNS resolver served a hostname.
//!
//! A client is sent to a unique hostname. When resolvers look that name
//! up, their address and any EDNS client subnet they forwarded are
//! recorded. When the client then connects via HTTP using that very
//! hostname, the recorded information is looked up by the `Host` header
//! and returned as JSON.
//!
//! # Modules
//!
//! * [store] holds the per hostname resolver history shared by everything
//!   else,
//! * [ecs] extracts the client subnet from a query,
//! * [dns] answers queries and records the resolver,
//! * [http] serves lookups and the redirect to a unique hostname,
//! * [reaper] periodically removes stale hostnames, and
//! * [server] wires it all together based on the [config].

pub mod config;
pub mod dns;
pub mod ecs;
pub mod error;
pub mod http;
pub mod logging;
pub mod reaper;
pub mod server;
pub mod store;

pub use self::error::Error;
pub use self::store::{CorrelationStore, Observation, SweepStats};
