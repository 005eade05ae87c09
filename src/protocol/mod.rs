//! Protocol module for peer-coordinator communication
//!
//! Defines the message envelope and the wire framing. Every exchange is
//! one envelope sent, one envelope received; TCP exchanges use
//! length-prefixed JSON framing, UDP discovery carries one bare envelope
//! per datagram.

mod framing;
mod messages;

pub use framing::*;
pub use messages::*;
