//! Wiring everything together.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};
use tracing::{error, info};

use crate::config::Config;
use crate::dns::{self, DnsHandler};
use crate::error::Error;
use crate::http;
use crate::reaper::Reaper;
use crate::store::CorrelationStore;

//------------ Listeners -----------------------------------------------------

/// The sockets the service listens on.
///
/// Everything is bound before anything is served so that a port that is
/// already taken aborts startup.
#[derive(Debug)]
pub struct Listeners {
    pub dns_udp: UdpSocket,
    pub dns_tcp: TcpListener,
    pub http: TcpListener,
}

impl Listeners {
    pub async fn bind(
        dns_addr: SocketAddr,
        http_addr: SocketAddr,
    ) -> Result<Self, Error> {
        let dns_udp =
            UdpSocket::bind(dns_addr).await.map_err(|source| Error::Bind {
                proto: "DNS/UDP",
                addr: dns_addr,
                source,
            })?;
        // With port 0 the TCP listener has to follow the port picked for
        // UDP.
        let dns_addr = dns_udp.local_addr()?;
        let dns_tcp =
            TcpListener::bind(dns_addr).await.map_err(|source| Error::Bind {
                proto: "DNS/TCP",
                addr: dns_addr,
                source,
            })?;
        let http =
            TcpListener::bind(http_addr).await.map_err(|source| {
                Error::Bind {
                    proto: "HTTP",
                    addr: http_addr,
                    source,
                }
            })?;
        Ok(Listeners {
            dns_udp,
            dns_tcp,
            http,
        })
    }
}

//------------ run -----------------------------------------------------------

/// Binds all listeners and runs the service until one part of it stops.
pub async fn run(config: Config) -> Result<(), Error> {
    config.validate()?;
    let listeners =
        Listeners::bind(config.dns_listen, config.http_listen).await?;
    serve(&config, listeners).await
}

/// Runs the service on already bound listeners.
pub async fn serve(config: &Config, listeners: Listeners) -> Result<(), Error> {
    let store = Arc::new(CorrelationStore::new());
    let handler = Arc::new(DnsHandler::new(
        store.clone(),
        config.answer_addrs(),
        config.ttl(),
    ));
    let reaper = Reaper::new(
        store.clone(),
        config.sweep_interval(),
        config.retention(),
    );

    info!(
        "Serving DNS on {} and HTTP on {}",
        config.dns_listen, config.http_listen
    );
    tokio::select! {
        _ = dns::serve(listeners.dns_udp, listeners.dns_tcp, handler) => {
            error!("DNS servers stopped");
            Ok(())
        }
        res = http::serve(listeners.http, store) => {
            if let Err(err) = &res {
                error!("HTTP server failed: {}", err);
            }
            res.map_err(Into::into)
        }
        _ = reaper.run() => Ok(()),
    }
}
