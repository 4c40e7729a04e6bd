//! Shared engine state.
//!
//! [`EngineRegistry`] is the explicitly owned value standing in for what the
//! original implementation kept in process globals: the security-model
//! registry, the statistics counters, and the identifier allocators.
//! Construct one at startup, share it with sessions via `Arc`, drop it at
//! shutdown. Allocators start at random points and stay monotonic, so
//! message identifiers strictly increase across resends.

use crate::error::SecurityErrorKind;
use crate::security::usm::{UsmModel, UsmUser};
use crate::security::{SecurityModel, SecurityRegistry};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};

/// Per-class statistics counters.
///
/// Incremented from whichever entry point observes the event; reads are
/// monotonic snapshots.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub packets_in: AtomicU64,
    pub packets_out: AtomicU64,
    pub malformed: AtomicU64,
    pub timeouts: AtomicU64,
    pub reports_received: AtomicU64,
    pub reports_sent: AtomicU64,
    pub unknown_security_models: AtomicU64,
    pub unsupported_sec_levels: AtomicU64,
    pub not_in_time_windows: AtomicU64,
    pub unknown_user_names: AtomicU64,
    pub unknown_engine_ids: AtomicU64,
    pub wrong_digests: AtomicU64,
    pub decryption_errors: AtomicU64,
}

impl EngineStats {
    /// Bump the counter for a classified security failure and return the new
    /// value (Report PDUs carry the counter value as their varbind).
    pub fn note_security_failure(&self, kind: SecurityErrorKind) -> u64 {
        let counter = match kind {
            SecurityErrorKind::UnsupportedSecurityLevel => &self.unsupported_sec_levels,
            SecurityErrorKind::AuthenticationFailure => &self.wrong_digests,
            SecurityErrorKind::NotInTimeWindow => &self.not_in_time_windows,
            SecurityErrorKind::UnknownEngineId => &self.unknown_engine_ids,
            SecurityErrorKind::UnknownUserName => &self.unknown_user_names,
            SecurityErrorKind::DecryptionError => &self.decryption_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn security_failure_count(&self, kind: SecurityErrorKind) -> u64 {
        let counter = match kind {
            SecurityErrorKind::UnsupportedSecurityLevel => &self.unsupported_sec_levels,
            SecurityErrorKind::AuthenticationFailure => &self.wrong_digests,
            SecurityErrorKind::NotInTimeWindow => &self.not_in_time_windows,
            SecurityErrorKind::UnknownEngineId => &self.unknown_engine_ids,
            SecurityErrorKind::UnknownUserName => &self.unknown_user_names,
            SecurityErrorKind::DecryptionError => &self.decryption_errors,
        };
        counter.load(Ordering::Relaxed)
    }
}

/// Shared state for a family of sessions.
pub struct EngineRegistry {
    security: SecurityRegistry,
    stats: EngineStats,
    request_id: AtomicU32,
    message_id: AtomicU32,
    transaction_id: AtomicI64,
    /// The built-in USM model, kept typed so users can be added after startup.
    usm: Arc<UsmModel>,
}

impl EngineRegistry {
    /// Registry with the built-in USM model already registered.
    pub fn new() -> Arc<Self> {
        let usm = Arc::new(UsmModel::new());
        let security = SecurityRegistry::new();
        security.register(usm.clone());

        let mut seed = [0u8; 8];
        getrandom::fill(&mut seed).expect("OS random source unavailable");
        let request_seed = u32::from_ne_bytes([seed[0], seed[1], seed[2], seed[3]]);
        let message_seed = u32::from_ne_bytes([seed[4], seed[5], seed[6], seed[7]]);

        Arc::new(Self {
            security,
            stats: EngineStats::default(),
            request_id: AtomicU32::new(request_seed),
            message_id: AtomicU32::new(message_seed),
            transaction_id: AtomicI64::new(1),
            usm,
        })
    }

    pub fn security(&self) -> &SecurityRegistry {
        &self.security
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// The built-in USM model.
    pub fn usm(&self) -> &Arc<UsmModel> {
        &self.usm
    }

    /// Convenience: install a USM user.
    pub fn add_usm_user(&self, user: UsmUser) {
        self.usm.add_user(user);
    }

    /// Register an additional security model.
    pub fn register_security_model(&self, model: Arc<dyn SecurityModel>) {
        self.security.register(model);
    }

    /// Next request identifier: positive, process-unique while outstanding.
    pub fn next_request_id(&self) -> i32 {
        loop {
            let id = (self.request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF) as i32;
            if id != 0 {
                return id;
            }
        }
    }

    /// Next message identifier. Strictly increasing between successive calls
    /// (modulo the 31-bit wrap), which gives resends their increasing msgIDs.
    pub fn next_message_id(&self) -> i32 {
        loop {
            let id = (self.message_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF) as i32;
            if id != 0 {
                return id;
            }
        }
    }

    /// Transaction identifier stamped on every inbound PDU.
    pub fn next_transaction_id(&self) -> i64 {
        self.transaction_id.fetch_add(1, Ordering::Relaxed)
    }
}
