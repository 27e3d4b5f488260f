//! The HTTP side: telling a client which resolvers looked up its hostname.
//!
//! Clients first hit `/redirect` and get sent to a freshly made up
//! hostname below the one they used. Resolving that name makes its
//! resolver show up in the [`CorrelationStore`]. The follow-up request for
//! that hostname then returns what was recorded for it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, State};
use axum::http::header::{HOST, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use rand::Rng;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::store::{CorrelationStore, Observation};

//------------ ResolverInfo --------------------------------------------------

/// The body returned for a lookup.
///
/// Serializes to `{}` if nothing is known about the hostname.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ResolverInfo {
    #[serde(rename = "Resolvers", skip_serializing_if = "Option::is_none")]
    pub resolvers: Option<Vec<Observation>>,
}

//------------ router --------------------------------------------------------

/// Creates the router serving lookups from `store`.
///
/// Any path other than `/redirect` is a lookup keyed by the `Host` header.
pub fn router(store: Arc<CorrelationStore>) -> Router {
    Router::new()
        .route("/redirect", get(redirect))
        .fallback(resolver_info)
        .with_state(store)
}

/// Serves `router` on an already bound listener until it fails.
pub async fn serve(
    listener: TcpListener,
    store: Arc<CorrelationStore>,
) -> std::io::Result<()> {
    let app = router(store)
        .into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await
}

async fn resolver_info(
    State(store): State<Arc<CorrelationStore>>,
    client: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Json<ResolverInfo> {
    let client = client
        .map(|ConnectInfo(addr)| addr.ip().to_canonical().to_string())
        .unwrap_or_default();
    let Some(host) = host_header(&headers) else {
        warn!("Lookup from {} without usable Host header", client);
        return Json(ResolverInfo::default());
    };

    let resolvers = store.lookup(&hostname_key(host));
    match &resolvers {
        Some(log) => info!("Lookup from {} for {}: {:?}", client, host, log),
        None => info!("Lookup from {} for {}: unknown", client, host),
    }
    Json(ResolverInfo { resolvers })
}

async fn redirect(headers: HeaderMap) -> impl IntoResponse {
    let host = host_header(&headers).unwrap_or_default();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let token: u32 = rand::thread_rng().gen();
    let target = redirect_target(host, now, token);
    (StatusCode::FOUND, [(LOCATION, target)])
}

//------------ Helpers -------------------------------------------------------

fn host_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|host| !host.is_empty())
}

/// Turns a `Host` header value into the key used by the store.
///
/// Strips a port if present and appends the trailing dot of the absolute
/// domain name form.
pub fn hostname_key(host: &str) -> String {
    let host = match host.rsplit_once(':') {
        Some((name, port))
            if (!name.contains(':') || is_bracketed(name))
                && !port.is_empty()
                && port.bytes().all(|c| c.is_ascii_digit()) =>
        {
            name
        }
        _ => host,
    };
    format!("{host}.")
}

fn is_bracketed(name: &str) -> bool {
    name.starts_with('[') && name.ends_with(']')
}

/// Returns the URL of a unique hostname below `host`.
pub fn redirect_target(host: &str, unix_secs: u64, token: u32) -> String {
    format!("http://ri-{unix_secs}-{token:08x}.{host}/resolverinfo")
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_str(host).unwrap());
        headers
    }

    #[test]
    fn hostname_keys() {
        assert_eq!(hostname_key("x.example"), "x.example.");
        assert_eq!(hostname_key("x.example:8080"), "x.example.");
        assert_eq!(hostname_key("X.Example"), "X.Example.");
        assert_eq!(hostname_key("x.example:"), "x.example:.");
        assert_eq!(hostname_key("::1"), "::1.");
        assert_eq!(hostname_key("[::1]:80"), "[::1].");
    }

    #[test]
    fn redirect_targets() {
        assert_eq!(
            redirect_target("ri.example", 1_700_000_000, 0xbeef),
            "http://ri-1700000000-0000beef.ri.example/resolverinfo"
        );
    }

    #[test]
    fn empty_info_serializes_to_empty_object() {
        assert_eq!(
            serde_json::to_string(&ResolverInfo::default()).unwrap(),
            "{}"
        );
    }

    #[tokio::test]
    async fn lookup_hit() {
        let store = Arc::new(CorrelationStore::new());
        store.record("x.example.", "10.0.0.1", "99.0.0.0/24", "A");
        store.record("x.example.", "10.0.0.2", "", "AAAA");

        let Json(info) =
            resolver_info(State(store), None, headers("x.example")).await;
        assert_eq!(
            serde_json::to_string(&info).unwrap(),
            r#"{"Resolvers":[{"Resolver":"10.0.0.1","EDNS0Subnet":"99.0.0.0/24"},{"Resolver":"10.0.0.2"}]}"#
        );
    }

    #[tokio::test]
    async fn lookup_miss() {
        let store = Arc::new(CorrelationStore::new());
        let Json(info) =
            resolver_info(State(store.clone()), None, headers("x.example"))
                .await;
        assert_eq!(info, ResolverInfo::default());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn lookup_without_host() {
        let store = Arc::new(CorrelationStore::new());
        let Json(info) =
            resolver_info(State(store), None, HeaderMap::new()).await;
        assert_eq!(info, ResolverInfo::default());
    }

    #[tokio::test]
    async fn redirect_to_unique_name() {
        let resp = redirect(headers("ri.example")).await.into_response();
        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("http://ri-"));
        assert!(location.ends_with(".ri.example/resolverinfo"));
    }
}
