//! The DNS side: answering queries and recording who asked.
//!
//! Every A or AAAA query is recorded in the [`CorrelationStore`] under its
//! query name before it is answered with the configured addresses. Other
//! query types get an empty authoritative answer.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use domain::base::iana::{Rcode, Rtype};
use domain::base::message_builder::AdditionalBuilder;
use domain::base::{Message, StreamTarget, Ttl};
use domain::net::server::buf::VecBufSource;
use domain::net::server::dgram::DgramServer;
use domain::net::server::message::Request;
use domain::net::server::middleware::edns::EdnsMiddlewareSvc;
use domain::net::server::middleware::mandatory::MandatoryMiddlewareSvc;
use domain::net::server::service::{CallResult, ServiceError, ServiceResult};
use domain::net::server::stream::StreamServer;
use domain::net::server::util::{mk_builder_for_target, service_fn};
use domain::rdata::{Aaaa, A};
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, info};

use crate::ecs::{extract_ecs, EcsDisplay};
use crate::store::CorrelationStore;

//------------ AnswerAddrs ---------------------------------------------------

/// The addresses handed out in answers.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AnswerAddrs {
    pub v4: Vec<Ipv4Addr>,
    pub v6: Vec<Ipv6Addr>,
}

impl AnswerAddrs {
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }
}

impl FromIterator<IpAddr> for AnswerAddrs {
    fn from_iter<I: IntoIterator<Item = IpAddr>>(iter: I) -> Self {
        let mut res = AnswerAddrs::default();
        for addr in iter {
            match addr {
                IpAddr::V4(addr) => res.v4.push(addr),
                IpAddr::V6(addr) => res.v6.push(addr),
            }
        }
        res
    }
}

//------------ DnsHandler ----------------------------------------------------

/// Answers queries and records the querying resolver.
#[derive(Debug)]
pub struct DnsHandler {
    store: Arc<CorrelationStore>,
    answers: AnswerAddrs,
    ttl: Ttl,
}

impl DnsHandler {
    pub fn new(
        store: Arc<CorrelationStore>,
        answers: AnswerAddrs,
        ttl: Ttl,
    ) -> Self {
        DnsHandler {
            store,
            answers,
            ttl,
        }
    }

    /// Builds the response to `msg` received from `client_addr`.
    ///
    /// A and AAAA queries are recorded exactly once, no matter how many
    /// records end up in the answer.
    pub fn respond(
        &self,
        client_addr: SocketAddr,
        msg: &Message<Vec<u8>>,
    ) -> Result<AdditionalBuilder<StreamTarget<Vec<u8>>>, ServiceError> {
        let question = msg.sole_question()?;
        let qname = question.qname();
        let qtype = question.qtype();
        let qclass = question.qclass();

        let mut answer =
            mk_builder_for_target().start_answer(msg, Rcode::NOERROR)?;
        answer.header_mut().set_aa(true);

        if qtype == Rtype::A || qtype == Rtype::AAAA {
            let hostname = qname.to_string();
            let resolver = client_addr.ip().to_canonical().to_string();
            let ecs = extract_ecs(msg);
            debug!(
                "Query {} {} from {} ecs {}",
                hostname,
                qtype,
                resolver,
                EcsDisplay(ecs.as_deref())
            );
            self.store.record(
                &fqdn(hostname),
                &resolver,
                ecs.as_deref().unwrap_or_default(),
                &qtype.to_string(),
            );

            if qtype == Rtype::A {
                for addr in &self.answers.v4 {
                    answer.push((qname, qclass, self.ttl, A::new(*addr)))?;
                }
            } else {
                for addr in &self.answers.v6 {
                    answer.push((qname, qclass, self.ttl, Aaaa::new(*addr)))?;
                }
            }
        }

        Ok(answer.additional())
    }

    /// A service function for use with [`service_fn`].
    pub fn service(
        request: Request<Vec<u8>>,
        handler: Arc<DnsHandler>,
    ) -> ServiceResult<Vec<u8>> {
        let response =
            handler.respond(request.client_addr(), request.message())?;
        Ok(CallResult::new(response))
    }
}

/// Returns the absolute form of a displayed domain name.
///
/// Names display without the trailing dot except for the root.
fn fqdn(mut name: String) -> String {
    if !name.ends_with('.') {
        name.push('.');
    }
    name
}

//------------ serve ---------------------------------------------------------

/// Runs the DNS servers on the given, already bound sockets.
///
/// Datagrams are served by one server per available core sharing the
/// socket. Returns when any of the servers stops.
pub async fn serve(
    udp: UdpSocket,
    tcp: TcpListener,
    handler: Arc<DnsHandler>,
) {
    let svc = service_fn(DnsHandler::service, handler);
    let svc = EdnsMiddlewareSvc::<Vec<u8>, _, _>::new(svc);
    let svc = MandatoryMiddlewareSvc::<Vec<u8>, _, _>::new(svc);
    let svc = Arc::new(svc);

    let num_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let udp = Arc::new(udp);
    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..num_cores {
        let srv = DgramServer::new(udp.clone(), VecBufSource, svc.clone());
        tasks.spawn(async move { srv.run().await });
    }
    let srv = StreamServer::new(tcp, VecBufSource, svc);
    tasks.spawn(async move { srv.run().await });

    info!("DNS servers running on {} UDP workers and TCP", num_cores);
    tasks.join_next().await;
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use core::str::FromStr;

    use domain::base::{MessageBuilder, Name};

    use super::*;
    use crate::store::Observation;

    fn handler(store: Arc<CorrelationStore>) -> DnsHandler {
        let answers = [
            IpAddr::from_str("192.0.2.1").unwrap(),
            IpAddr::from_str("192.0.2.2").unwrap(),
            IpAddr::from_str("2001:db8::1").unwrap(),
        ]
        .into_iter()
        .collect();
        DnsHandler::new(store, answers, Ttl::ZERO)
    }

    fn query(qname: &str, qtype: Rtype) -> Message<Vec<u8>> {
        let mut msg = MessageBuilder::new_vec().question();
        msg.push((Name::<Vec<u8>>::from_str(qname).unwrap(), qtype))
            .unwrap();
        msg.into_message()
    }

    fn finish(
        builder: AdditionalBuilder<StreamTarget<Vec<u8>>>,
    ) -> Message<Vec<u8>> {
        let target = builder.finish();
        Message::from_octets(target.as_dgram_slice().to_vec()).unwrap()
    }

    fn client() -> SocketAddr {
        SocketAddr::from_str("10.0.0.1:53535").unwrap()
    }

    #[test]
    fn answer_addrs_split_by_family() {
        let addrs: AnswerAddrs = [
            IpAddr::from_str("192.0.2.1").unwrap(),
            IpAddr::from_str("2001:db8::1").unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(addrs.v4, [Ipv4Addr::new(192, 0, 2, 1)]);
        assert_eq!(addrs.v6, [Ipv6Addr::from_str("2001:db8::1").unwrap()]);
        assert!(!addrs.is_empty());
        assert!(AnswerAddrs::default().is_empty());
    }

    #[test]
    fn a_query_is_answered_and_recorded_once() {
        let store = Arc::new(CorrelationStore::new());
        let handler = handler(store.clone());

        let resp = finish(
            handler.respond(client(), &query("x.example.", Rtype::A)).unwrap(),
        );
        assert!(resp.header().aa());
        assert_eq!(resp.header().rcode(), Rcode::NOERROR);
        assert_eq!(resp.header_counts().ancount(), 2);

        assert_eq!(
            store.lookup("x.example."),
            Some(vec![Observation::new("10.0.0.1", "", "A")])
        );
    }

    #[test]
    fn aaaa_query_is_answered_and_recorded() {
        let store = Arc::new(CorrelationStore::new());
        let handler = handler(store.clone());

        let resp = finish(
            handler
                .respond(client(), &query("x.example.", Rtype::AAAA))
                .unwrap(),
        );
        assert_eq!(resp.header_counts().ancount(), 1);
        assert_eq!(
            store.lookup("x.example."),
            Some(vec![Observation::new("10.0.0.1", "", "AAAA")])
        );
    }

    #[test]
    fn other_types_are_not_recorded() {
        let store = Arc::new(CorrelationStore::new());
        let handler = handler(store.clone());

        let resp = finish(
            handler
                .respond(client(), &query("x.example.", Rtype::TXT))
                .unwrap(),
        );
        assert!(resp.header().aa());
        assert_eq!(resp.header().rcode(), Rcode::NOERROR);
        assert_eq!(resp.header_counts().ancount(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn empty_answer_list_still_records() {
        let store = Arc::new(CorrelationStore::new());
        let handler =
            DnsHandler::new(store.clone(), AnswerAddrs::default(), Ttl::ZERO);

        let resp = finish(
            handler.respond(client(), &query("x.example.", Rtype::A)).unwrap(),
        );
        assert_eq!(resp.header_counts().ancount(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn query_without_question_is_rejected() {
        let store = Arc::new(CorrelationStore::new());
        let handler = handler(store.clone());
        let msg = MessageBuilder::new_vec().into_message();

        assert!(handler.respond(client(), &msg).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn mapped_ipv4_client_is_recorded_as_ipv4() {
        let store = Arc::new(CorrelationStore::new());
        let handler = handler(store.clone());
        let client = SocketAddr::from_str("[::ffff:10.0.0.1]:53535").unwrap();

        handler.respond(client, &query("x.example.", Rtype::A)).unwrap();
        handler
            .respond(
                SocketAddr::from_str("[2001:db8::53]:53535").unwrap(),
                &query("x.example.", Rtype::A),
            )
            .unwrap();
        assert_eq!(
            store.lookup("x.example."),
            Some(vec![
                Observation::new("10.0.0.1", "", "A"),
                Observation::new("2001:db8::53", "", "A"),
            ])
        );
    }

    #[test]
    fn fqdn_appends_dot() {
        assert_eq!(fqdn("x.example".into()), "x.example.");
        assert_eq!(fqdn(".".into()), ".");
    }
}
