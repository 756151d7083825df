use std::net::{Ipv4Addr, SocketAddr};

use crate::{Error, Name};

/// A message on a TCP peer link.
///
/// All peer messages are one line of space-separated tokens terminated by a
/// line feed. `ENTRY` and `SAFE` carry a listening address (the advertised
/// one, never the accepted ephemeral port), the other three carry an object
/// name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The sender's listening address, announcing a new tree link.
    Entry(SocketAddr),
    /// The address the receiver should reconnect to if its external link
    /// fails.
    Safe(SocketAddr),
    Interest(Name),
    Object(Name),
    NoObject(Name),
}

impl Message {
    /// Parse one framed line, without its terminating line feed.
    pub fn parse(line: &str) -> Result<Self, Error> {
        let mut tokens = line.split_whitespace();
        let tag = tokens.next().ok_or(Error::InvalidInput)?;

        let message = match tag {
            "ENTRY" | "SAFE" => {
                let ip = tokens.next().ok_or(Error::InvalidInput)?;
                let port = tokens.next().ok_or(Error::InvalidInput)?;
                let addr = parse_addr(ip, port)?;
                if tag == "ENTRY" {
                    Self::Entry(addr)
                } else {
                    Self::Safe(addr)
                }
            }
            "INTEREST" | "OBJECT" | "NOOBJECT" => {
                let name = Name::new(tokens.next().ok_or(Error::InvalidInput)?)?;
                match tag {
                    "INTEREST" => Self::Interest(name),
                    "OBJECT" => Self::Object(name),
                    _ => Self::NoObject(name),
                }
            }
            _ => return Err(Error::UnknownMessage),
        };

        if tokens.next().is_some() {
            return Err(Error::InvalidInput);
        }

        Ok(message)
    }

    /// Encode as a wire line, including the terminating line feed.
    pub fn encode(&self) -> String {
        match self {
            Self::Entry(addr) => format!("ENTRY {} {}\n", addr.ip(), addr.port()),
            Self::Safe(addr) => format!("SAFE {} {}\n", addr.ip(), addr.port()),
            Self::Interest(name) => format!("INTEREST {}\n", name),
            Self::Object(name) => format!("OBJECT {}\n", name),
            Self::NoObject(name) => format!("NOOBJECT {}\n", name),
        }
    }
}

/// Parse an `<ip> <port>` token pair. The overlay is IPv4 only.
pub(crate) fn parse_addr(ip: &str, port: &str) -> Result<SocketAddr, Error> {
    let ip: Ipv4Addr = ip.parse().map_err(|_| Error::InvalidAddress)?;
    let port: u16 = port.parse().map_err(|_| Error::InvalidAddress)?;
    Ok(SocketAddr::from((ip, port)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_entry() {
        assert_eq!(
            Message::parse("ENTRY 127.0.0.1 5000"),
            Ok(Message::Entry("127.0.0.1:5000".parse().unwrap()))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Message::parse("ENTRY 127.0.0.1"), Err(Error::InvalidInput));
        assert_eq!(Message::parse("ENTRY ::1 5000"), Err(Error::InvalidAddress));
        assert_eq!(Message::parse("INTEREST a b"), Err(Error::InvalidInput));
        assert_eq!(Message::parse("HELLO world"), Err(Error::UnknownMessage));
        assert_eq!(Message::parse(""), Err(Error::InvalidInput));
    }

    #[test]
    fn encode_round_trip() {
        let messages = [
            Message::Safe("10.0.0.2:58001".parse().unwrap()),
            Message::Interest(Name::new("alpha").unwrap()),
            Message::Object(Name::new("alpha").unwrap()),
            Message::NoObject(Name::new("alpha").unwrap()),
        ];

        for message in messages {
            let line = message.encode();
            assert!(line.ends_with('\n'));
            assert_eq!(Message::parse(line.trim_end()), Ok(message));
        }
    }
}
