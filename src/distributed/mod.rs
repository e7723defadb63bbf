//! Network strategy
//!
//! Workers run as independent peers, possibly on other hosts, and talk to the
//! coordinator over TCP.
//!
//! # Architecture
//!
//! - **Coordinator** (`coordinator`): binds the listener, hands each accepted
//!   peer one slice and reads back its count
//! - **Peer** (`node_service`): connects, scans the slice it receives, replies
//! - **Protocol** (`protocol`): 8-byte decimal length/count fields
//!
//! One connection carries one slice. Peers retry their connect until the
//! listener is up, so start order between the two sides does not matter.

pub mod coordinator;
pub mod node_service;
pub mod protocol;

pub use coordinator::{NetworkHandle, NetworkTransport};
pub use node_service::{run_peer_blocking, ScanPeer};
pub use protocol::{read_reply, write_frame, FIELD_LEN, MAX_FIELD_VALUE};
