//! Pluggable security models.
//!
//! The secured dialect routes every message through a security model chosen
//! by the small integer in its header. Models are trait objects behind a
//! process-wide [`SecurityRegistry`]: populated once at startup, looked up
//! per message, never removed before shutdown. The numeric id survives only
//! at the wire boundary; everywhere else dispatch is a method call.
//!
//! The built-in model is USM (RFC 3414) in [`usm`]; anything implementing
//! [`SecurityModel`] can be registered alongside it.

pub mod auth;
pub mod privacy;
pub mod usm;

use crate::error::{Error, Result};
use crate::message::{ScopedPdu, SecurityLevel, V3Message};
use bytes::Bytes;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Opaque per-request state a model attaches to an inbound message.
///
/// Owned by the request entry that the message resolves to and released
/// through [`SecurityModel::release_state`] exactly once, when the entry
/// completes, exhausts its retries, or its session closes. Resends reuse the
/// same entry and therefore the same state; ownership is never duplicated.
pub type SecurityStateRef = Box<dyn Any + Send>;

/// Everything a model needs to turn a plaintext scoped PDU into wire bytes.
pub struct OutboundSecurity<'a> {
    pub msg_id: i32,
    /// Buffer ceiling negotiated from the transport.
    pub msg_max_size: i32,
    pub reportable: bool,
    pub security_engine_id: &'a [u8],
    pub security_name: &'a [u8],
    pub security_level: SecurityLevel,
    pub scoped_pdu: &'a ScopedPdu,
}

/// What a model hands back after verifying and decrypting an inbound message.
pub struct InboundSecurity {
    pub scoped_pdu: ScopedPdu,
    /// Engine identifier the model resolved (authoritative peer).
    pub security_engine_id: Bytes,
    pub security_name: Bytes,
    pub security_level: SecurityLevel,
    /// Model-specific state to attach to the matched request entry.
    pub state: Option<SecurityStateRef>,
}

/// A pluggable security model.
pub trait SecurityModel: Send + Sync {
    /// Wire identifier of this model.
    fn model_id(&self) -> i32;

    fn name(&self) -> &'static str;

    /// Build the complete wire message for an outgoing scoped PDU.
    ///
    /// The optional state rides on the request entry for the message's
    /// lifetime and comes back through [`release_state`](Self::release_state)
    /// exactly once.
    fn secure_outgoing(
        &self,
        out: &OutboundSecurity<'_>,
    ) -> Result<(Bytes, Option<SecurityStateRef>)>;

    /// Verify, decrypt and unwrap an inbound message.
    ///
    /// `whole_msg` is the exact byte image the transport delivered; digest
    /// verification runs over it, not over a re-encoding.
    fn process_incoming(&self, whole_msg: &Bytes, msg: &V3Message) -> Result<InboundSecurity>;

    /// Engine-identifier probe message, if the model supports discovery.
    fn probe_message(&self, _request_id: i32, _msg_id: i32, _msg_max_size: i32) -> Option<Bytes> {
        None
    }

    /// Release per-request state produced by [`process_incoming`](Self::process_incoming).
    fn release_state(&self, state: SecurityStateRef) {
        drop(state);
    }
}

/// Process-wide model registry.
///
/// Insert and lookup run under the lock; lookups hand out `Arc` clones so
/// callers never hold the lock across model invocations.
pub struct SecurityRegistry {
    models: RwLock<HashMap<i32, Arc<dyn SecurityModel>>>,
}

impl SecurityRegistry {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Register a model under its own id. Later registrations win, matching
    /// startup-population semantics where the last configured plugin is the
    /// effective one.
    pub fn register(&self, model: Arc<dyn SecurityModel>) {
        let id = model.model_id();
        tracing::debug!(target: "snmp_engine::security", model = id, name = model.name(), "registering security model");
        self.models
            .write()
            .expect("security registry poisoned")
            .insert(id, model);
    }

    /// Look up a model; absence is a processing error, not an
    /// authentication-class failure.
    pub fn lookup(&self, model: i32) -> Result<Arc<dyn SecurityModel>> {
        self.models
            .read()
            .expect("security registry poisoned")
            .get(&model)
            .cloned()
            .ok_or(Error::UnsupportedSecurityModel { model })
    }

    /// Snapshot of the registered models, safe to iterate without the lock.
    pub fn models(&self) -> Vec<Arc<dyn SecurityModel>> {
        self.models
            .read()
            .expect("security registry poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl Default for SecurityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullModel(i32);

    impl SecurityModel for NullModel {
        fn model_id(&self) -> i32 {
            self.0
        }
        fn name(&self) -> &'static str {
            "null"
        }
        fn secure_outgoing(
            &self,
            _out: &OutboundSecurity<'_>,
        ) -> Result<(Bytes, Option<SecurityStateRef>)> {
            Ok((Bytes::new(), None))
        }
        fn process_incoming(&self, _whole: &Bytes, _msg: &V3Message) -> Result<InboundSecurity> {
            unimplemented!()
        }
    }

    #[test]
    fn lookup_registered_model() {
        let registry = SecurityRegistry::new();
        registry.register(Arc::new(NullModel(7)));
        assert_eq!(registry.lookup(7).unwrap().model_id(), 7);
    }

    #[test]
    fn missing_model_is_processing_error() {
        let registry = SecurityRegistry::new();
        match registry.lookup(3) {
            Err(Error::UnsupportedSecurityModel { model: 3 }) => {}
            other => panic!("expected UnsupportedSecurityModel, got {:?}", other.err()),
        }
    }

    #[test]
    fn later_registration_wins() {
        let registry = SecurityRegistry::new();
        registry.register(Arc::new(NullModel(3)));
        registry.register(Arc::new(NullModel(3)));
        assert_eq!(registry.models().len(), 1);
    }
}
