//! Peer side: discovery, agent loops, task execution, file serving
//!
//! A peer finds the coordinator over UDP broadcast, registers its shared
//! files, then runs three concerns side by side: the heartbeat loop, the
//! task poll/execute/submit cycle, and a small TCP server answering
//! GET_FILE requests from other nodes.

mod agent;
mod discovery;
mod executor;
mod server;

pub use agent::PeerAgent;
pub use discovery::discover;
pub use executor::{TaskExecutor, TaskOutcome};
pub use server::FileServer;
