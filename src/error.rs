//! Error types.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

//------------ Error ---------------------------------------------------------

/// An error that prevents the service from starting or keeps it from
/// running.
///
/// Request processing never fails with one of these. Malformed queries and
/// unknown hostnames are dealt with where they are encountered.
#[derive(Debug, Error)]
pub enum Error {
    /// A listening socket could not be bound.
    #[error("failed to bind {proto} socket on {addr}: {source}")]
    Bind {
        proto: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A server stopped with an I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}
