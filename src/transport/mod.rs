//! Abstract transport contract.
//!
//! The engine never opens sockets. A [`Transport`] moves whole byte buffers
//! in both directions; how they travel (UDP datagram, TCP stream, test
//! script) is the caller's concern. Stream transports additionally get frame
//! reassembly from [`FrameBuffer`], driven by the session.

mod framing;
pub mod mock;

pub use framing::FrameBuffer;
pub use mock::MockTransport;

use crate::error::Result;
use bytes::Bytes;
use std::time::Duration;

/// Well-known management port (collaborator default, not engine state).
pub const SNMP_PORT: u16 = 161;
/// Well-known trap/notification port.
pub const SNMP_TRAP_PORT: u16 = 162;

/// Default ceiling for one message: 65535 minus IPv4 and UDP headers.
pub const DEFAULT_MAX_MSG_SIZE: usize = 65507;

/// Send-bytes / receive-bytes contract the engine drives.
pub trait Transport: Send {
    /// Ship one outgoing message. Errors surface to the caller of the send
    /// operation synchronously; the engine never retries on transport error.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for inbound bytes; `Ok(None)` on timeout.
    ///
    /// Only the bounded blocking paths (engine-ID discovery, the synchronous
    /// send helper) call this. Event-driven callers feed bytes through
    /// [`crate::session::Session::on_received`] instead and may leave this
    /// returning `Ok(None)`.
    fn recv(&mut self, timeout: Duration) -> Result<Option<Bytes>>;

    /// True for stream transports whose deliveries need reframing.
    fn is_stream(&self) -> bool {
        false
    }

    /// Largest message this transport can carry.
    fn max_msg_size(&self) -> usize {
        DEFAULT_MAX_MSG_SIZE
    }
}
