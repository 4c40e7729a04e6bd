//! # snmp-engine
//!
//! Sans-IO SNMP request/response protocol engine.
//!
//! The crate serializes management requests into the BER wire format, tracks
//! which requests are outstanding, matches asynchronous replies back to the
//! request that caused them, retries and times them out, and routes
//! secured-dialect messages through a pluggable security-model layer. It
//! opens no sockets and spawns no tasks: an external event loop asks a
//! [`Session`] what to wait for and feeds bytes and timer ticks back in.
//!
//! ## Quick start (v2c)
//!
//! ```rust,no_run
//! use snmp_engine::{EngineRegistry, Pdu, Session, oid};
//! # use snmp_engine::transport::MockTransport;
//!
//! # fn main() -> snmp_engine::Result<()> {
//! let registry = EngineRegistry::new();
//! # let transport = MockTransport::new();
//! let mut session = Session::builder()
//!     .community("public")
//!     .open(transport, registry);
//!
//! let response = session.send_sync(Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]))?;
//! println!("sysDescr: {}", response.varbinds[0]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Secured dialect (v3/USM)
//!
//! ```rust,no_run
//! use snmp_engine::security::auth::AuthProtocol;
//! use snmp_engine::security::usm::UsmUser;
//! use snmp_engine::{EngineRegistry, Pdu, SecurityLevel, Session, oid};
//! # use snmp_engine::transport::MockTransport;
//!
//! # fn main() -> snmp_engine::Result<()> {
//! let registry = EngineRegistry::new();
//! registry.add_usm_user(UsmUser::new(&b"admin"[..]).with_auth(AuthProtocol::Sha256, "authpass"));
//!
//! # let transport = MockTransport::new();
//! let mut session = Session::builder()
//!     .version(snmp_engine::Version::V3)
//!     .security_name(&b"admin"[..])
//!     .security_level(SecurityLevel::AuthNoPriv)
//!     .open(transport, registry);
//!
//! // first secured send probes for the remote engine identifier, then sends
//! let response = session.send_sync(Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)]))?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! ## Event-driven use
//!
//! ```rust,no_run
//! use snmp_engine::{EngineRegistry, Pdu, Session, SessionEvent, oid};
//! # use snmp_engine::transport::MockTransport;
//! # use bytes::Bytes;
//!
//! # fn main() -> snmp_engine::Result<()> {
//! # let registry = EngineRegistry::new();
//! # let transport = MockTransport::new();
//! let mut session = Session::builder().open(transport, registry);
//! session.set_handler(|event| {
//!     if let SessionEvent::Response { pdu, .. } = event {
//!         println!("reply: {} bindings", pdu.varbinds.len());
//!     }
//! });
//! session.send(Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)]))?;
//!
//! // caller's loop: wait until session.next_timeout(), then either
//! //   session.on_received(bytes)  -- bytes arrived on the transport
//! //   session.on_timer(now)       -- the deadline passed
//! # Ok(())
//! # }
//! ```

pub mod ber;
pub mod engine;
pub mod error;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod prelude;
pub mod security;
pub mod session;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

pub use engine::{EngineRegistry, EngineStats};
pub use error::{
    DecodeErrorKind, EncodeErrorKind, Error, ErrorStatus, OidErrorKind, ProtocolErrorKind, Result,
    SecurityErrorKind,
};
pub use message::{CommunityMessage, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message};
pub use oid::Oid;
pub use pdu::{Pdu, PduType, TrapInfo, V3Envelope};
pub use session::{Session, SessionBuilder, SessionConfig, SessionEvent};
pub use transport::Transport;
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
