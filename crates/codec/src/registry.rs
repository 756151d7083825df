use std::net::SocketAddr;

use crate::{Error, Netid, message::parse_addr};

/// A request datagram for the registration server.
///
/// Registry traffic is one datagram per message with no framing; a trailing
/// line feed is not required by the protocol and none is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryRequest {
    Register { net: Netid, addr: SocketAddr },
    Unregister { net: Netid, addr: SocketAddr },
    Nodes { net: Netid },
}

impl RegistryRequest {
    pub fn encode(&self) -> String {
        match self {
            Self::Register { net, addr } => {
                format!("REG {} {} {}", net, addr.ip(), addr.port())
            }
            Self::Unregister { net, addr } => {
                format!("UNREG {} {} {}", net, addr.ip(), addr.port())
            }
            Self::Nodes { net } => format!("NODES {}", net),
        }
    }
}

/// A reply datagram from the registration server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryResponse {
    RegisterOk,
    UnregisterOk,
    /// The node list for a network, one `<ip> <port>` entry per line after
    /// the header. Malformed entries are skipped rather than failing the
    /// whole reply.
    NodesList {
        net: Netid,
        nodes: Vec<SocketAddr>,
    },
}

impl RegistryResponse {
    pub fn parse(datagram: &str) -> Result<Self, Error> {
        let mut lines = datagram.lines();
        let header = lines.next().ok_or(Error::InvalidInput)?;

        let mut tokens = header.split_whitespace();
        match tokens.next().ok_or(Error::InvalidInput)? {
            "OKREG" => Ok(Self::RegisterOk),
            "OKUNREG" => Ok(Self::UnregisterOk),
            "NODESLIST" => {
                let net = Netid::new(tokens.next().ok_or(Error::InvalidInput)?)?;
                let mut nodes = Vec::new();
                for line in lines {
                    let mut tokens = line.split_whitespace();
                    if let (Some(ip), Some(port)) = (tokens.next(), tokens.next())
                        && let Ok(addr) = parse_addr(ip, port)
                    {
                        nodes.push(addr);
                    }
                }

                Ok(Self::NodesList { net, nodes })
            }
            _ => Err(Error::UnknownMessage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_requests() {
        let net = Netid::new("100").unwrap();
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(
            RegistryRequest::Register { net, addr }.encode(),
            "REG 100 127.0.0.1 5000"
        );
        assert_eq!(
            RegistryRequest::Unregister { net, addr }.encode(),
            "UNREG 100 127.0.0.1 5000"
        );
        assert_eq!(RegistryRequest::Nodes { net }.encode(), "NODES 100");
    }

    #[test]
    fn parse_acks() {
        assert_eq!(
            RegistryResponse::parse("OKREG"),
            Ok(RegistryResponse::RegisterOk)
        );
        assert_eq!(
            RegistryResponse::parse("OKUNREG"),
            Ok(RegistryResponse::UnregisterOk)
        );
        assert_eq!(
            RegistryResponse::parse("BADREPLY"),
            Err(Error::UnknownMessage)
        );
    }

    #[test]
    fn parse_nodeslist() {
        let reply = "NODESLIST 100\n127.0.0.1 5000\n127.0.0.1 5001\nnot an entry\n";
        let parsed = RegistryResponse::parse(reply).unwrap();

        assert_eq!(
            parsed,
            RegistryResponse::NodesList {
                net: Netid::new("100").unwrap(),
                nodes: vec![
                    "127.0.0.1:5000".parse().unwrap(),
                    "127.0.0.1:5001".parse().unwrap(),
                ],
            }
        );
    }

    #[test]
    fn parse_empty_nodeslist() {
        assert_eq!(
            RegistryResponse::parse("NODESLIST 033"),
            Ok(RegistryResponse::NodesList {
                net: Netid::new("033").unwrap(),
                nodes: vec![],
            })
        );
    }
}
