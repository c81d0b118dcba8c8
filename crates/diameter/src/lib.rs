//! hsgw-diameter: Cx wire codec and transaction layer
//!
//! A small Diameter implementation covering the subset of 3GPP TS 29.229
//! the HSS gateway emits and consumes: base header and AVP codec, typed Cx
//! command construction and parsing, and a transaction layer that matches
//! answers to requests by session id under a per-request timer.

pub mod avp;
pub mod cx;
pub mod dictionary;
pub mod error;
pub mod message;
pub mod stack;
pub mod transport;

pub use avp::Avp;
pub use error::DiameterError;
pub use message::Message;
pub use stack::{DiameterStack, IncomingRequestHandler};
pub use transport::{ChannelTransport, DiameterTransport, TcpTransport};

pub type Result<T> = std::result::Result<T, DiameterError>;
