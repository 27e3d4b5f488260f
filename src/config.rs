//! Command line and environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use domain::base::Ttl;

use crate::dns::AnswerAddrs;
use crate::error::Error;

//------------ Config --------------------------------------------------------

/// Reports which resolver looked up a hostname and what client subnet it
/// sent along.
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct Config {
    /// Address to receive DNS queries on, via both UDP and TCP.
    #[arg(long, env = "RESOLVERINFO_DNS_LISTEN", default_value = "0.0.0.0:53")]
    pub dns_listen: SocketAddr,

    /// Address to serve HTTP lookups on.
    #[arg(long, env = "RESOLVERINFO_HTTP_LISTEN", default_value = "0.0.0.0:80")]
    pub http_listen: SocketAddr,

    /// Address to hand out in A or AAAA answers. May be repeated.
    #[arg(
        long = "answer",
        env = "RESOLVERINFO_ANSWERS",
        value_delimiter = ',',
        required = true
    )]
    pub answers: Vec<IpAddr>,

    /// TTL of the answer records in seconds.
    #[arg(long, env = "RESOLVERINFO_TTL", default_value_t = 0)]
    pub ttl: u32,

    /// Seconds between two cleanup passes.
    #[arg(long, env = "RESOLVERINFO_SWEEP_INTERVAL", default_value_t = 1800)]
    pub sweep_interval: u64,

    /// Seconds a hostname is kept after it was last queried.
    #[arg(long, env = "RESOLVERINFO_RETENTION", default_value_t = 86400)]
    pub retention: u64,
}

impl Config {
    /// Checks values the argument parser cannot check by itself.
    pub fn validate(&self) -> Result<(), Error> {
        if self.answers.is_empty() {
            return Err(Error::Config("no answer addresses given".into()));
        }
        if self.sweep_interval == 0 {
            return Err(Error::Config("sweep interval must not be zero".into()));
        }
        if self.retention == 0 {
            return Err(Error::Config("retention must not be zero".into()));
        }
        Ok(())
    }

    pub fn answer_addrs(&self) -> AnswerAddrs {
        self.answers.iter().copied().collect()
    }

    pub fn ttl(&self) -> Ttl {
        Ttl::from_secs(self.ttl)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention)
    }
}

//============ Testing =======================================================
