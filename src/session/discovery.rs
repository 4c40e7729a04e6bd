//! Engine-ID discovery.
//!
//! A secured send needs the remote authoritative engine identifier before
//! its message can be fully built. When the identifier is unknown and
//! discovery is enabled, the session sends the security model's probe (an
//! empty request at the lowest security level whose empty engine identifier
//! means "tell me yours") and blocks the caller, looping through transport
//! waits, until the probe's tracker entry resolves or exhausts its retries.
//! This is the engine's only blocking path, scoped to session setup.

use crate::error::{EncodeErrorKind, Error, ProtocolErrorKind, Result};
use crate::message::SecurityLevel;
use crate::security::SecurityModel;
use crate::pdu::{Pdu, V3Envelope};
use crate::transport::Transport;
use crate::util::hex;
use crate::version::Version;
use bytes::Bytes;
use std::sync::atomic::Ordering;
use std::time::Instant;

use super::Session;
use super::tracker::RequestEntry;

impl<T: Transport> Session<T> {
    /// Make sure the remote engine identifier is known, probing if needed.
    ///
    /// Returns immediately when the identifier is already configured or
    /// learned. With discovery disabled, an unknown identifier is an error
    /// rather than a probe.
    pub fn discover_engine(&mut self) -> Result<()> {
        if !self.security_engine_id.is_empty() {
            return Ok(());
        }
        if !self.config.engine_discovery {
            return Err(Error::encode(EncodeErrorKind::EngineNotKnown));
        }
        if self.probing {
            return Err(Error::protocol(ProtocolErrorKind::AlreadyProbing));
        }

        let model = self.registry.security().lookup(self.config.security_model)?;
        let request_id = self.registry.next_request_id();
        let msg_id = self.registry.next_message_id();
        let max_size = self.transport.max_msg_size() as i32;
        let Some(wire) = model.probe_message(request_id, msg_id, max_size) else {
            // the model has no probing hook
            return Err(Error::encode(EncodeErrorKind::EngineNotKnown));
        };

        tracing::debug!(
            target: "snmp_engine::session",
            request_id,
            msg_id,
            "probing for remote engine identifier"
        );
        self.probing = true;
        let outcome = self.run_probe(request_id, msg_id, wire);
        self.probing = false;
        outcome
    }

    fn run_probe(&mut self, request_id: i32, msg_id: i32, wire: Bytes) -> Result<()> {
        self.transport.send(&wire)?;
        self.registry
            .stats()
            .packets_out
            .fetch_add(1, Ordering::Relaxed);

        let mut pdu = Pdu::get(&[]);
        pdu.request_id = request_id;
        pdu.version = Some(Version::V3);
        let mut env = V3Envelope::new(SecurityLevel::NoAuthNoPriv);
        env.msg_id = msg_id;
        env.msg_max_size = self.transport.max_msg_size() as i32;
        env.security_model = self.config.security_model;
        pdu.v3 = Some(env);
        let expires = Instant::now() + self.config.timeout;
        self.tracker.insert(RequestEntry::probe(pdu, expires));

        while self.tracker.contains(request_id) {
            let deadline = self
                .next_timeout()
                .unwrap_or_else(|| Instant::now() + self.config.timeout);
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.transport.recv(wait)? {
                Some(bytes) => {
                    if let Err(error) = self.on_received(bytes) {
                        tracing::debug!(
                            target: "snmp_engine::session",
                            %error,
                            "dropped packet during discovery"
                        );
                    }
                }
                None => self.on_timer(Instant::now()),
            }
        }

        if self.security_engine_id.is_empty() {
            tracing::debug!(target: "snmp_engine::session", request_id, "discovery probe exhausted");
            Err(Error::DiscoveryTimeout)
        } else {
            tracing::debug!(
                target: "snmp_engine::session",
                engine_id = %hex(&self.security_engine_id),
                "engine discovery complete"
            );
            Ok(())
        }
    }
}
