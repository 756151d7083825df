use std::{fmt, str::FromStr};

use crate::Error;

/// An object name.
///
/// Names are the sole identifier an object has on the overlay; equality is
/// byte-exact. A valid name is 1 to 100 alphanumeric ascii characters,
/// anything else is rejected before it reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(String);

impl Name {
    /// Maximum length of an object name in bytes.
    pub const MAX_LEN: usize = 100;

    pub fn new(value: &str) -> Result<Self, Error> {
        if value.is_empty() || value.len() > Self::MAX_LEN {
            return Err(Error::InvalidName);
        }

        if !value.bytes().all(|it| it.is_ascii_alphanumeric()) {
            return Err(Error::InvalidName);
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A network identifier known to the registry.
///
/// Exactly three decimal digits, kept as raw bytes so the constant for the
/// direct-join network can live in a `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Netid([u8; 3]);

impl Netid {
    /// The network a node creates when asked to direct-join `0.0.0.0`.
    pub const DIRECT_JOIN: Netid = Netid(*b"076");

    pub fn new(value: &str) -> Result<Self, Error> {
        let bytes = value.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|it| it.is_ascii_digit()) {
            return Err(Error::InvalidNetid);
        }

        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees ascii digits.
        std::str::from_utf8(&self.0).unwrap()
    }
}

impl FromStr for Netid {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl fmt::Display for Netid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
