//! Convenience re-exports.
//!
//! ```rust
//! use snmp_engine::prelude::*;
//! ```

pub use crate::engine::EngineRegistry;
pub use crate::error::{Error, ErrorStatus, Result};
pub use crate::message::SecurityLevel;
pub use crate::oid;
pub use crate::oid::Oid;
pub use crate::pdu::{Pdu, PduType};
pub use crate::session::{Session, SessionBuilder, SessionConfig, SessionEvent};
pub use crate::transport::Transport;
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;
