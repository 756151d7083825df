//! ## NDN overlay wire grammar
//!
//! Both protocols spoken by a node are textual. The TCP peer link carries
//! line-terminated messages (`ENTRY`, `SAFE`, `INTEREST`, `OBJECT`,
//! `NOOBJECT`), the UDP registry exchange carries whole datagrams (`REG`,
//! `UNREG`, `NODES` and their replies). This crate owns the grammar for
//! both, the validation rules for object names and network identifiers,
//! and the per-connection line framing buffer used on the TCP side.

pub mod framing;
pub mod message;
pub mod name;
pub mod registry;

pub use self::{
    framing::LineBuffer,
    message::Message,
    name::{Name, Netid},
    registry::{RegistryRequest, RegistryResponse},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidName,
    InvalidNetid,
    InvalidAddress,
    InvalidInput,
    UnknownMessage,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
