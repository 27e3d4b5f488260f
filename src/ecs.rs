//! Extraction of the EDNS client subnet option from queries.

use core::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use domain::base::opt::UnknownOptData;
use domain::base::Message;
use octseq::Octets;

/// The option code of the client subnet option.
const CLIENT_SUBNET: u16 = 8;

//------------ extract_ecs ---------------------------------------------------

/// Returns the client subnet carried by a query as `"<addr>/<prefix>"`.
///
/// The address and source prefix length are rendered as sent by the
/// resolver. Returns `None` if the message has no OPT record, if the OPT
/// record has no client subnet option or if that option cannot be parsed.
pub fn extract_ecs<Octs: Octets>(msg: &Message<Octs>) -> Option<String> {
    let opt = msg.opt()?;
    let data = opt
        .opt()
        .iter::<UnknownOptData<_>>()
        .filter_map(Result::ok)
        .find(|data| data.code().to_int() == CLIENT_SUBNET)?;
    client_subnet(data.as_slice())
}

/// Renders the data of a client subnet option.
///
/// The parser in `domain` rejects addresses longer than the source prefix
/// requires or with bits set beyond it. Resolvers do send those, so the
/// address is taken byte for byte instead: missing bytes are zero and
/// bytes beyond the address length of the family are ignored.
fn client_subnet(data: &[u8]) -> Option<String> {
    let (head, addr) = data.split_first_chunk::<4>()?;
    let family = u16::from_be_bytes([head[0], head[1]]);
    let source_prefix_len = head[2];

    let addr = match family {
        1 if source_prefix_len <= 32 => {
            let mut buf = [0u8; 4];
            copy_prefix(&mut buf, addr);
            IpAddr::V4(Ipv4Addr::from(buf))
        }
        2 if source_prefix_len <= 128 => {
            let mut buf = [0u8; 16];
            copy_prefix(&mut buf, addr);
            IpAddr::V6(Ipv6Addr::from(buf))
        }
        _ => return None,
    };
    Some(format!("{addr}/{source_prefix_len}"))
}

fn copy_prefix(buf: &mut [u8], addr: &[u8]) {
    let len = addr.len().min(buf.len());
    buf[..len].copy_from_slice(&addr[..len]);
}

//------------ EcsDisplay ----------------------------------------------------

/// Formats an optional client subnet for log output.
///
/// An absent or empty subnet is shown as `-`.
#[derive(Clone, Copy, Debug)]
pub struct EcsDisplay<'a>(pub Option<&'a str>);

impl fmt::Display for EcsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ecs) if !ecs.is_empty() => f.write_str(ecs),
            _ => f.write_str("-"),
        }
    }
}

//============ Testing =======================================================
