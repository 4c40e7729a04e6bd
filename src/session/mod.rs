//! Sessions: one logical conversation with a remote engine.
//!
//! A session owns a transport handle and a request tracker, and is driven
//! from outside: an event loop asks [`Session::next_timeout`] what to wait
//! for, then re-enters through [`Session::on_received`] when bytes arrive or
//! [`Session::on_timer`] when the deadline passes. All decoding, matching
//! and callback invocation happens synchronously inside those two calls; the
//! engine spawns nothing.
//!
//! The one deliberate exception to the non-blocking shape is engine-ID
//! discovery (see [`Session::discover_engine`]), which loops the caller
//! through transport waits until the probe resolves, bounded by the session's
//! retry policy.

mod discovery;
mod tracker;

use crate::ber::Decoder;
use crate::engine::EngineRegistry;
use crate::error::{
    DecodeErrorKind, EncodeErrorKind, Error, ProtocolErrorKind, Result, SecurityErrorKind,
};
use crate::message::{CommunityMessage, ScopedPdu, SecurityLevel, V3Message};
use crate::pdu::{Pdu, PduType, V3Envelope};
use crate::security::usm;
use crate::security::{OutboundSecurity, SecurityModel, SecurityStateRef};
use crate::transport::{FrameBuffer, Transport};
use crate::util::hex;
use crate::version::Version;
use bytes::Bytes;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracker::{RequestEntry, RequestTracker};

/// Outcome delivered for a request or an unsolicited arrival.
#[derive(Debug)]
pub enum SessionEvent {
    /// A matched reply. The original request PDU has been released.
    Response { request_id: i32, pdu: Pdu },
    /// Retries exhausted without a matching reply.
    Timeout { request_id: i32 },
    /// The session was closed while the request was pending.
    Cancelled { request_id: i32 },
    /// A Report PDU closed the wait: the peer rejected or refused the
    /// request. `kind` is the classified failure when the report carried a
    /// recognizable usmStats binding.
    Rejected {
        request_id: i32,
        kind: Option<SecurityErrorKind>,
        report: Pdu,
    },
    /// Inbound PDU that is not a reply (trap, inform, or a command from the
    /// peer).
    Unsolicited { pdu: Pdu },
}

/// Per-request completion callback.
pub type RequestCallback = Box<dyn FnOnce(SessionEvent) + Send>;

/// Session-level handler for events without a per-request callback.
pub type EventHandler = Box<dyn FnMut(SessionEvent) + Send>;

/// Session policy and defaults.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pinned protocol version. `None` accepts any inbound version and
    /// requires outgoing PDUs to carry their own.
    pub version: Option<Version>,
    /// Community for the classic dialect.
    pub community: Bytes,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Resends after the initial transmission.
    pub retries: u32,
    /// Security model for the secured dialect.
    pub security_model: i32,
    pub security_level: SecurityLevel,
    pub security_name: Bytes,
    /// Known remote engine identifier; empty triggers discovery.
    pub security_engine_id: Bytes,
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    /// Probe for the engine identifier when it is unknown.
    pub engine_discovery: bool,
    /// Drop reports that close no time window instead of surfacing them;
    /// the pending request then runs out its normal timer.
    pub ignore_unauthenticated_reports: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: Some(Version::V2c),
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(1),
            retries: 5,
            security_model: usm::USM_SECURITY_MODEL,
            security_level: SecurityLevel::NoAuthNoPriv,
            security_name: Bytes::new(),
            security_engine_id: Bytes::new(),
            context_engine_id: Bytes::new(),
            context_name: Bytes::new(),
            engine_discovery: true,
            ignore_unauthenticated_reports: false,
        }
    }
}

/// Builder for [`Session`].
#[derive(Debug, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: Version) -> Self {
        self.config.version = Some(version);
        self
    }

    /// Accept any inbound version; outgoing PDUs must carry their own.
    pub fn unpinned(mut self) -> Self {
        self.config.version = None;
        self
    }

    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.config.community = community.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn security_name(mut self, name: impl Into<Bytes>) -> Self {
        self.config.security_name = name.into();
        self
    }

    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.config.security_level = level;
        self
    }

    pub fn security_model(mut self, model: i32) -> Self {
        self.config.security_model = model;
        self
    }

    /// Preset the remote engine identifier, skipping discovery.
    pub fn security_engine_id(mut self, engine_id: impl Into<Bytes>) -> Self {
        self.config.security_engine_id = engine_id.into();
        self
    }

    pub fn context_engine_id(mut self, engine_id: impl Into<Bytes>) -> Self {
        self.config.context_engine_id = engine_id.into();
        self
    }

    pub fn context_name(mut self, name: impl Into<Bytes>) -> Self {
        self.config.context_name = name.into();
        self
    }

    pub fn disable_engine_discovery(mut self) -> Self {
        self.config.engine_discovery = false;
        self
    }

    pub fn ignore_unauthenticated_reports(mut self) -> Self {
        self.config.ignore_unauthenticated_reports = true;
        self
    }

    pub fn open<T: Transport>(self, transport: T, registry: Arc<EngineRegistry>) -> Session<T> {
        Session::new(transport, registry, self.config)
    }
}

// `builder()` is anchored to a concrete `Session<..>` so the bare path
// `Session::builder()` resolves without an otherwise-unconstrained `T`. The
// builder is non-generic, so the anchor type never reaches the session that
// `.open(transport)` ultimately produces.
impl Session<crate::transport::MockTransport> {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }
}

/// A logical conversation with one remote entity.
pub struct Session<T: Transport> {
    config: SessionConfig,
    transport: T,
    registry: Arc<EngineRegistry>,
    tracker: RequestTracker,
    handler: Option<EventHandler>,
    /// Reassembly buffer, present for stream transports.
    frames: Option<FrameBuffer>,
    /// Remote engine identifier, configured or learned by discovery.
    security_engine_id: Bytes,
    context_engine_id: Bytes,
    pub(crate) probing: bool,
    closed: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, registry: Arc<EngineRegistry>, config: SessionConfig) -> Self {
        let frames = transport.is_stream().then(FrameBuffer::new);
        Self {
            security_engine_id: config.security_engine_id.clone(),
            context_engine_id: config.context_engine_id.clone(),
            config,
            transport,
            registry,
            tracker: RequestTracker::new(),
            handler: None,
            frames,
            probing: false,
            closed: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The remote engine identifier, empty until configured or discovered.
    pub fn engine_id(&self) -> &Bytes {
        &self.security_engine_id
    }

    /// Requests currently awaiting a reply.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Install the session-level event handler.
    pub fn set_handler(&mut self, handler: impl FnMut(SessionEvent) + Send + 'static) {
        self.handler = Some(Box::new(handler));
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send a PDU; replies go to the session handler.
    ///
    /// Returns the request identifier. PDUs that expect a reply enter the
    /// tracker; traps and responses are fire-and-forget.
    pub fn send(&mut self, pdu: Pdu) -> Result<i32> {
        self.submit(pdu, None)
    }

    /// Send with a per-request completion callback.
    pub fn send_with(
        &mut self,
        pdu: Pdu,
        callback: impl FnOnce(SessionEvent) + Send + 'static,
    ) -> Result<i32> {
        self.submit(pdu, Some(Box::new(callback)))
    }

    /// Send and block until the reply, a report, or retry exhaustion.
    ///
    /// Drives the transport's own wait loop; event-driven callers should use
    /// [`send`](Self::send) and feed the loop themselves.
    pub fn send_sync(&mut self, pdu: Pdu) -> Result<Pdu> {
        let started = Instant::now();
        let slot: Arc<Mutex<Option<SessionEvent>>> = Arc::new(Mutex::new(None));
        let cell = slot.clone();
        let request_id = self.send_with(pdu, move |event| {
            *cell.lock().expect("event slot poisoned") = Some(event);
        })?;

        loop {
            if let Some(event) = slot.lock().expect("event slot poisoned").take() {
                return match event {
                    SessionEvent::Response { pdu, .. } => Ok(pdu),
                    SessionEvent::Timeout { .. } => Err(Error::Timeout {
                        request_id,
                        retries: self.config.retries,
                        elapsed: started.elapsed(),
                    }),
                    SessionEvent::Rejected { kind, .. } => Err(match kind {
                        Some(kind) => Error::security(kind),
                        None => Error::protocol(ProtocolErrorKind::RequestClosedByReport),
                    }),
                    SessionEvent::Cancelled { .. } => {
                        Err(Error::protocol(ProtocolErrorKind::SessionClosed))
                    }
                    SessionEvent::Unsolicited { .. } => {
                        unreachable!("per-request callbacks never see unsolicited PDUs")
                    }
                };
            }

            let Some(deadline) = self.next_timeout() else {
                return Err(Error::Timeout {
                    request_id,
                    retries: self.config.retries,
                    elapsed: started.elapsed(),
                });
            };
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.transport.recv(wait)? {
                Some(bytes) => {
                    if let Err(error) = self.on_received(bytes) {
                        tracing::debug!(target: "snmp_engine::session", %error, "dropped inbound packet");
                    }
                }
                None => self.on_timer(Instant::now()),
            }
        }
    }

    fn submit(&mut self, mut pdu: Pdu, callback: Option<RequestCallback>) -> Result<i32> {
        if self.closed {
            return Err(Error::protocol(ProtocolErrorKind::SessionClosed));
        }

        let Some(version) = pdu.version.or(self.config.version) else {
            return Err(Error::protocol(ProtocolErrorKind::MissingVersion));
        };
        pdu.version = Some(version);
        pdu.validate(version)?;
        for vb in &pdu.varbinds {
            // exception markers travel peer-to-caller only, and every sent
            // binding names a real identifier
            if vb.value.is_exception() {
                return Err(Error::encode(EncodeErrorKind::ExceptionValueOutbound));
            }
            if vb.oid.is_empty() {
                return Err(Error::invalid_oid(crate::error::OidErrorKind::Empty));
            }
        }
        if pdu.request_id == 0 {
            pdu.request_id = self.registry.next_request_id();
        }

        if version.is_secured() {
            let pdu_has_engine = pdu
                .v3
                .as_ref()
                .is_some_and(|env| !env.security_engine_id.is_empty());
            if self.security_engine_id.is_empty() && !pdu_has_engine {
                // fails here, before any byte of this PDU goes out
                self.discover_engine()?;
            }
            self.fill_v3_defaults(&mut pdu)?;
            if let Some(env) = pdu.v3.as_mut() {
                env.msg_id = self.registry.next_message_id();
            }
        } else if pdu.community.is_empty() {
            pdu.community = self.config.community.clone();
        }

        let model_id = pdu.v3.as_ref().map(|env| env.security_model);
        let (wire, state) = self.encode_message(&pdu)?;
        if wire.len() > self.transport.max_msg_size() {
            if let Some(state) = state {
                self.release_state(model_id, state);
            }
            return Err(Error::MessageTooLarge {
                size: wire.len(),
                max: self.transport.max_msg_size(),
            });
        }
        if let Err(error) = self.transport.send(&wire) {
            // transport failures surface synchronously and leave the tracker
            // untouched; retries are purely timer-driven
            if let Some(state) = state {
                self.release_state(model_id, state);
            }
            return Err(error);
        }
        self.registry.stats().packets_out.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            target: "snmp_engine::session",
            pdu_type = %pdu.pdu_type,
            request_id = pdu.request_id,
            bytes = wire.len(),
            "sent"
        );

        let request_id = pdu.request_id;
        if pdu.expects_reply() {
            let mut entry =
                RequestEntry::new(pdu, Instant::now() + self.config.timeout, callback);
            entry.security_state = state;
            self.tracker.insert(entry);
        } else if let Some(state) = state {
            self.release_state(model_id, state);
        }
        Ok(request_id)
    }

    fn fill_v3_defaults(&mut self, pdu: &mut Pdu) -> Result<()> {
        let default_level = self.config.security_level;
        let env = pdu.v3.get_or_insert_with(|| V3Envelope::new(default_level));
        if env.security_name.is_empty() {
            env.security_name = self.config.security_name.clone();
        }
        if env.security_level.requires_auth() && env.security_name.is_empty() {
            return Err(Error::protocol(ProtocolErrorKind::MissingSecurityName));
        }
        if env.security_engine_id.is_empty() {
            env.security_engine_id = self.security_engine_id.clone();
        }
        if env.context_engine_id.is_empty() {
            env.context_engine_id = self.context_engine_id.clone();
        }
        if env.context_name.is_empty() {
            env.context_name = self.config.context_name.clone();
        }
        env.msg_max_size = self.transport.max_msg_size() as i32;
        Ok(())
    }

    fn encode_message(&self, pdu: &Pdu) -> Result<(Bytes, Option<SecurityStateRef>)> {
        let Some(version) = pdu.version else {
            return Err(Error::protocol(ProtocolErrorKind::MissingVersion));
        };
        match version {
            Version::V1 | Version::V2c => Ok((
                CommunityMessage::encode_parts(version, &pdu.community, pdu),
                None,
            )),
            Version::V3 => {
                let Some(env) = pdu.v3.as_ref() else {
                    return Err(Error::encode(EncodeErrorKind::EngineNotKnown));
                };
                let model = self.registry.security().lookup(env.security_model)?;
                let scoped = ScopedPdu::new(
                    env.context_engine_id.clone(),
                    env.context_name.clone(),
                    pdu.clone(),
                );
                model.secure_outgoing(&OutboundSecurity {
                    msg_id: env.msg_id,
                    msg_max_size: env.msg_max_size,
                    reportable: env.reportable,
                    security_engine_id: &env.security_engine_id,
                    security_name: &env.security_name,
                    security_level: env.security_level,
                    scoped_pdu: &scoped,
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Event-loop integration
    // ------------------------------------------------------------------

    /// Deadline an external event loop should wait until; `None` when no
    /// request is pending.
    pub fn next_timeout(&self) -> Option<Instant> {
        self.tracker.next_deadline()
    }

    /// Entry point: bytes arrived on the bound transport.
    ///
    /// Datagram transports deliver whole messages; stream deliveries are
    /// reassembled, each complete frame processed in arrival order, and any
    /// surplus held for the next delivery.
    pub fn on_received(&mut self, data: Bytes) -> Result<()> {
        if self.closed {
            return Err(Error::protocol(ProtocolErrorKind::SessionClosed));
        }
        if self.frames.is_some() {
            self.frames.as_mut().expect("frame buffer present").extend(&data);
            loop {
                let next = self
                    .frames
                    .as_mut()
                    .expect("frame buffer present")
                    .next_frame()?;
                match next {
                    Some(frame) => self.process_packet(frame)?,
                    None => break,
                }
            }
            Ok(())
        } else {
            self.process_packet(data)
        }
    }

    /// Entry point: the wait deadline passed.
    ///
    /// Expired entries with retries remaining are resent with a fresh
    /// message identifier; exhausted entries complete with a timeout.
    pub fn on_timer(&mut self, now: Instant) {
        while let Some(idx) = self.tracker.next_expired(now) {
            if self.tracker.get(idx).retries < self.config.retries {
                self.resend_entry(idx, now);
            } else {
                let entry = self.tracker.remove_at(idx);
                self.registry.stats().timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    target: "snmp_engine::session",
                    request_id = entry.request_id,
                    retries = entry.retries,
                    "request exhausted"
                );
                self.finish_entry(entry, |request_id| SessionEvent::Timeout { request_id });
            }
        }
    }

    /// Cancel everything and refuse further work.
    ///
    /// Every pending entry's callback is invoked with a cancelled outcome
    /// before its state is released. Closing is the only cancellation
    /// mechanism; there is no per-request token.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        tracing::debug!(target: "snmp_engine::session", pending = self.tracker.len(), "closing session");
        while let Some(entry) = self.tracker.pop() {
            self.finish_entry(entry, |request_id| SessionEvent::Cancelled { request_id });
        }
    }

    // ------------------------------------------------------------------
    // Inbound path
    // ------------------------------------------------------------------

    fn process_packet(&mut self, data: Bytes) -> Result<()> {
        self.registry.stats().packets_in.fetch_add(1, Ordering::Relaxed);
        let pdu = match self.parse_packet(data) {
            Ok(pdu) => pdu,
            Err(error) => {
                if matches!(error, Error::Decode { .. } | Error::Protocol { .. }) {
                    self.registry.stats().malformed.fetch_add(1, Ordering::Relaxed);
                }
                return Err(error);
            }
        };

        if pdu.pdu_type.is_reply() {
            self.match_reply(pdu);
        } else {
            tracing::debug!(
                target: "snmp_engine::session",
                pdu_type = %pdu.pdu_type,
                request_id = pdu.request_id,
                "unsolicited PDU"
            );
            self.deliver(SessionEvent::Unsolicited { pdu });
        }
        Ok(())
    }

    /// Decode one wire message into a PDU, stamping a fresh transaction id.
    fn parse_packet(&mut self, data: Bytes) -> Result<Pdu> {
        let mut outer = Decoder::new(data.clone());
        let mut seq = outer.read_sequence()?;
        let raw = seq.read_integer()?;
        let Some(version) = Version::from_i32(raw) else {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(raw),
            ));
        };
        if let Some(pinned) = self.config.version
            && version != pinned
        {
            tracing::debug!(
                target: "snmp_engine::session",
                pinned = %pinned,
                actual = %version,
                "inbound version does not match session"
            );
            return Err(Error::protocol(ProtocolErrorKind::BadVersion {
                pinned,
                actual: version,
            }));
        }

        let mut pdu = match version {
            Version::V1 | Version::V2c => {
                CommunityMessage::decode_after_version(&mut seq, version)?.pdu
            }
            Version::V3 => self.parse_secured(&data, &mut seq)?,
        };
        pdu.transaction_id = self.registry.next_transaction_id();
        Ok(pdu)
    }

    fn parse_secured(&mut self, whole: &Bytes, seq: &mut Decoder) -> Result<Pdu> {
        let msg = V3Message::decode_after_version(seq)?;
        let model_id = msg.global.msg_security_model;
        let model = match self.registry.security().lookup(model_id) {
            Ok(model) => model,
            Err(error) => {
                self.registry
                    .stats()
                    .unknown_security_models
                    .fetch_add(1, Ordering::Relaxed);
                return Err(error);
            }
        };

        match model.process_incoming(whole, &msg) {
            Ok(mut inbound) => {
                // Reply-class state is released right here, as the original
                // engine does; only outgoing entries keep state alive.
                if let Some(state) = inbound.state.take() {
                    model.release_state(state);
                }
                let scoped = inbound.scoped_pdu;
                let mut pdu = scoped.pdu;
                pdu.version = Some(Version::V3);
                pdu.v3 = Some(V3Envelope {
                    msg_id: msg.global.msg_id,
                    msg_max_size: msg.global.msg_max_size,
                    reportable: msg.global.msg_flags.reportable,
                    security_model: model_id,
                    security_level: inbound.security_level,
                    security_engine_id: inbound.security_engine_id,
                    security_name: inbound.security_name,
                    context_engine_id: scoped.context_engine_id,
                    context_name: scoped.context_name,
                });
                Ok(pdu)
            }
            Err(error) => {
                if let Some(kind) = error.security_kind() {
                    let count = self.registry.stats().note_security_failure(kind);
                    tracing::debug!(
                        target: "snmp_engine::session",
                        failure = %kind,
                        count,
                        "inbound message failed security processing"
                    );
                    if msg.global.msg_flags.reportable {
                        self.emit_report(&msg, kind, count);
                    }
                }
                Err(error)
            }
        }
    }

    /// Answer a reportable security failure with a Report PDU carrying the
    /// matching usmStats counter, so the peer gets actionable feedback.
    fn emit_report(&mut self, msg: &V3Message, kind: SecurityErrorKind, count: u64) {
        let Ok(model) = self.registry.security().lookup(msg.global.msg_security_model) else {
            return;
        };
        let mut report = Pdu::new(PduType::Report);
        report.version = Some(Version::V3);
        report.varbinds = vec![usm::report_varbind(kind, count)];
        let scoped = ScopedPdu::new(Bytes::new(), Bytes::new(), report);
        let built = model.secure_outgoing(&OutboundSecurity {
            msg_id: msg.global.msg_id,
            msg_max_size: self.transport.max_msg_size() as i32,
            reportable: false,
            security_engine_id: &self.security_engine_id,
            security_name: b"",
            security_level: SecurityLevel::NoAuthNoPriv,
            scoped_pdu: &scoped,
        });
        match built {
            Ok((wire, state)) => {
                if let Some(state) = state {
                    model.release_state(state);
                }
                if self.transport.send(&wire).is_ok() {
                    self.registry.stats().reports_sent.fetch_add(1, Ordering::Relaxed);
                    self.registry.stats().packets_out.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(target: "snmp_engine::session", failure = %kind, "report sent");
                }
            }
            Err(error) => {
                tracing::debug!(target: "snmp_engine::session", %error, "could not build report");
            }
        }
    }

    fn match_reply(&mut self, pdu: Pdu) {
        let Some(idx) = self.tracker.find_match(&pdu) else {
            tracing::debug!(
                target: "snmp_engine::session",
                pdu_type = %pdu.pdu_type,
                request_id = pdu.request_id,
                msg_id = pdu.msg_id(),
                "reply matches no pending request, dropped"
            );
            return;
        };

        if pdu.pdu_type == PduType::Report {
            self.handle_report(idx, pdu);
        } else {
            let entry = self.tracker.remove_at(idx);
            tracing::debug!(
                target: "snmp_engine::session",
                request_id = entry.request_id,
                "request completed"
            );
            self.finish_entry(entry, |request_id| SessionEvent::Response { request_id, pdu });
        }
    }

    fn handle_report(&mut self, idx: usize, report: Pdu) {
        self.registry
            .stats()
            .reports_received
            .fetch_add(1, Ordering::Relaxed);

        // A matched report from a fresh peer carries the engine identifier
        // this session is missing; adopt it, and the context engine id too
        // if nothing was configured.
        if self.security_engine_id.is_empty()
            && let Some(env) = &report.v3
            && !env.security_engine_id.is_empty()
        {
            tracing::debug!(
                target: "snmp_engine::session",
                engine_id = %hex(&env.security_engine_id),
                "learned remote engine identifier"
            );
            self.security_engine_id = env.security_engine_id.clone();
            if self.context_engine_id.is_empty() {
                self.context_engine_id = env.security_engine_id.clone();
            }
        }

        if self.tracker.get(idx).is_probe {
            let entry = self.tracker.remove_at(idx);
            self.finish_entry(entry, |request_id| SessionEvent::Cancelled { request_id });
            return;
        }

        let kind = usm::classify_report(&report);
        if kind == Some(SecurityErrorKind::NotInTimeWindow) {
            // Recoverable: the peer signalled resynchronizable clock skew.
            // Resend immediately, still against the shared retry budget.
            if self.tracker.get(idx).retries < self.config.retries {
                tracing::debug!(
                    target: "snmp_engine::session",
                    request_id = self.tracker.get(idx).request_id,
                    "time-window report, immediate resend"
                );
                self.resend_entry(idx, Instant::now());
            } else {
                let entry = self.tracker.remove_at(idx);
                self.finish_entry(entry, |request_id| SessionEvent::Rejected {
                    request_id,
                    kind,
                    report,
                });
            }
            return;
        }

        if self.config.ignore_unauthenticated_reports {
            tracing::debug!(
                target: "snmp_engine::session",
                request_id = self.tracker.get(idx).request_id,
                "report ignored by policy, request keeps waiting"
            );
            return;
        }

        let entry = self.tracker.remove_at(idx);
        self.finish_entry(entry, |request_id| SessionEvent::Rejected {
            request_id,
            kind,
            report,
        });
    }

    // ------------------------------------------------------------------
    // Retry machinery
    // ------------------------------------------------------------------

    /// Rebuild and resend one entry, regenerating its message identifier and
    /// recomputing its deadline. Counts against the retry budget. A resend
    /// that cannot be built or sent exhausts the entry.
    fn resend_entry(&mut self, idx: usize, now: Instant) {
        let mut entry = self.tracker.remove_at(idx);

        if let Some(env) = entry.pdu.v3.as_mut() {
            env.msg_id = self.registry.next_message_id();
            entry.message_id = env.msg_id;
        }

        let built = if entry.is_probe {
            let max = self.transport.max_msg_size() as i32;
            self.registry
                .security()
                .lookup(self.config.security_model)
                .and_then(|model| {
                    model
                        .probe_message(entry.request_id, entry.message_id, max)
                        .map(|wire| (wire, None))
                        .ok_or(Error::encode(EncodeErrorKind::EngineNotKnown))
                })
        } else {
            self.encode_message(&entry.pdu)
        };

        let sent = built.and_then(|(wire, state)| {
            self.transport.send(&wire)?;
            Ok(state)
        });

        match sent {
            Ok(state) => {
                let model_id = entry.pdu.v3.as_ref().map(|env| env.security_model);
                if let Some(old) = entry.security_state.take() {
                    self.release_state(model_id, old);
                }
                entry.security_state = state;
                entry.retries += 1;
                entry.expires = now + self.config.timeout;
                self.registry.stats().packets_out.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    target: "snmp_engine::session",
                    request_id = entry.request_id,
                    msg_id = entry.message_id,
                    retry = entry.retries,
                    "resent"
                );
                self.tracker.insert(entry);
            }
            Err(error) => {
                tracing::debug!(
                    target: "snmp_engine::session",
                    request_id = entry.request_id,
                    %error,
                    "resend failed, exhausting request"
                );
                self.registry.stats().timeouts.fetch_add(1, Ordering::Relaxed);
                self.finish_entry(entry, |request_id| SessionEvent::Timeout { request_id });
            }
        }
    }

    // ------------------------------------------------------------------
    // Completion plumbing
    // ------------------------------------------------------------------

    fn finish_entry(
        &mut self,
        mut entry: RequestEntry,
        event: impl FnOnce(i32) -> SessionEvent,
    ) {
        let model_id = entry.pdu.v3.as_ref().map(|env| env.security_model);
        if let Some(state) = entry.security_state.take() {
            self.release_state(model_id, state);
        }
        if entry.is_probe {
            return;
        }
        let event = event(entry.request_id);
        match entry.callback.take() {
            Some(callback) => callback(event),
            None => self.deliver(event),
        }
    }

    fn deliver(&mut self, event: SessionEvent) {
        if let Some(handler) = self.handler.as_mut() {
            handler(event);
        }
    }

    fn release_state(&self, model_id: Option<i32>, state: SecurityStateRef) {
        match model_id.map(|id| self.registry.security().lookup(id)) {
            Some(Ok(model)) => model.release_state(state),
            _ => drop(state),
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.close();
    }
}
