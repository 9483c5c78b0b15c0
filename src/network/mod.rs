//! Network subsystem: block transfer over TCP

pub mod pump;
pub mod server;
pub mod socket;
pub mod transfer;

pub use pump::{ConnectionState, NetworkPump, PumpSettings, PumpStats};
pub use server::{DspServer, ServerSession};
pub use transfer::BlockTransfer;
