//! User-based Security Model (RFC 3414), the built-in plugin.
//!
//! USM owns three pieces of state keyed off the wire: a user table, a cache
//! of keys localized per engine identifier, and the boots/time notion for
//! every authoritative engine it has spoken to. The engine's anti-replay
//! window is 150 seconds.
//!
//! Security parameters ride in the message header as an OCTET STRING holding
//! this SEQUENCE:
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING,
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{
    DecodeErrorKind, EncodeErrorKind, Error, Result, SecurityErrorKind,
};
use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::util::hex;
use crate::value::Value;
use crate::varbind::VarBind;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::auth::{AuthProtocol, LocalizedKey, sign_in_place, verify_in_place};
use super::privacy::{PrivKey, PrivProtocol, SaltCounter};
use super::{InboundSecurity, OutboundSecurity, SecurityModel, SecurityStateRef};

/// USM's wire identifier.
pub const USM_SECURITY_MODEL: i32 = 3;

/// Anti-replay window, seconds (RFC 3414 Section 2.2.3).
pub const TIME_WINDOW: u32 = 150;

/// snmpEngineTime ceiling (31-bit value).
pub const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// usmStats OIDs carried by Report PDUs, one per failure class.
pub mod report_oids {
    use crate::oid::Oid;

    fn stat(leaf: u32) -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 15, 1, 1, leaf, 0)
    }

    pub fn unsupported_sec_levels() -> Oid {
        stat(1)
    }
    pub fn not_in_time_windows() -> Oid {
        stat(2)
    }
    pub fn unknown_user_names() -> Oid {
        stat(3)
    }
    pub fn unknown_engine_ids() -> Oid {
        stat(4)
    }
    pub fn wrong_digests() -> Oid {
        stat(5)
    }
    pub fn decryption_errors() -> Oid {
        stat(6)
    }
}

/// Map a security failure class to its usmStats report OID.
pub fn report_oid_for(kind: SecurityErrorKind) -> Oid {
    match kind {
        SecurityErrorKind::UnsupportedSecurityLevel => report_oids::unsupported_sec_levels(),
        SecurityErrorKind::NotInTimeWindow => report_oids::not_in_time_windows(),
        SecurityErrorKind::UnknownUserName => report_oids::unknown_user_names(),
        SecurityErrorKind::UnknownEngineId => report_oids::unknown_engine_ids(),
        SecurityErrorKind::AuthenticationFailure => report_oids::wrong_digests(),
        SecurityErrorKind::DecryptionError => report_oids::decryption_errors(),
    }
}

/// Classify a Report PDU by its usmStats varbind, if it carries one.
pub fn classify_report(pdu: &Pdu) -> Option<SecurityErrorKind> {
    if pdu.pdu_type != PduType::Report {
        return None;
    }
    for vb in &pdu.varbinds {
        let kind = if vb.oid == report_oids::not_in_time_windows() {
            SecurityErrorKind::NotInTimeWindow
        } else if vb.oid == report_oids::unknown_engine_ids() {
            SecurityErrorKind::UnknownEngineId
        } else if vb.oid == report_oids::unsupported_sec_levels() {
            SecurityErrorKind::UnsupportedSecurityLevel
        } else if vb.oid == report_oids::unknown_user_names() {
            SecurityErrorKind::UnknownUserName
        } else if vb.oid == report_oids::wrong_digests() {
            SecurityErrorKind::AuthenticationFailure
        } else if vb.oid == report_oids::decryption_errors() {
            SecurityErrorKind::DecryptionError
        } else {
            continue;
        };
        return Some(kind);
    }
    None
}

/// Build the single varbind a generated Report carries.
pub fn report_varbind(kind: SecurityErrorKind, counter: u64) -> VarBind {
    VarBind::new(report_oid_for(kind), Value::Counter32(counter as u32))
}

/// USM security parameters.
#[derive(Debug, Clone)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Bytes,
    pub auth_params: Bytes,
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// All-empty parameters, the discovery-probe form.
    pub fn empty() -> Self {
        Self::new(Bytes::new(), 0, 0, Bytes::new())
    }

    /// Zeroed digest placeholder for the sign-then-patch flow.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(crate::ber::tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(crate::ber::tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;
        let boots = seq.read_integer()?;
        if boots < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::EngineCounterOutOfRange(boots),
            ));
        }
        let time = seq.read_integer()?;
        if time < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::EngineCounterOutOfRange(time),
            ));
        }
        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots: boots as u32,
            engine_time: time as u32,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate the auth-parameters content inside an encoded message.
    ///
    /// Walks the fixed header shape: outer SEQUENCE, version, global-data
    /// SEQUENCE, security-parameters OCTET STRING, inner SEQUENCE, then four
    /// fields precede the digest.
    pub fn locate_auth_params(encoded: &[u8]) -> Option<(usize, usize)> {
        let mut pos = 0usize;

        let mut enter = |expect: u8, skip_content: bool, data: &[u8]| -> Option<usize> {
            if data.get(pos)? != &expect {
                return None;
            }
            pos += 1;
            let (len, consumed) = raw_length(&data[pos..])?;
            pos += consumed;
            if skip_content {
                pos += len;
            }
            Some(len)
        };

        enter(0x30, false, encoded)?; // message SEQUENCE
        enter(0x02, true, encoded)?; // version
        enter(0x30, true, encoded)?; // msgGlobalData
        enter(0x04, false, encoded)?; // msgSecurityParameters wrapper
        enter(0x30, false, encoded)?; // USM SEQUENCE
        enter(0x04, true, encoded)?; // engine id
        enter(0x02, true, encoded)?; // boots
        enter(0x02, true, encoded)?; // time
        enter(0x04, true, encoded)?; // username
        let len = enter(0x04, false, encoded)?; // auth params
        Some((pos, len))
    }
}

fn raw_length(data: &[u8]) -> Option<(usize, usize)> {
    let first = *data.first()?;
    if first < 0x80 {
        return Some((first as usize, 1));
    }
    if first == 0x80 {
        return None;
    }
    let octets = (first & 0x7F) as usize;
    if octets == 0 || octets > 4 || data.len() < 1 + octets {
        return None;
    }
    let mut len = 0usize;
    for &b in &data[1..=octets] {
        len = (len << 8) | b as usize;
    }
    Some((len, 1 + octets))
}

/// A configured USM user.
#[derive(Debug, Clone)]
pub struct UsmUser {
    pub name: Bytes,
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
}

impl UsmUser {
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            auth: None,
            privacy: None,
        }
    }

    pub fn with_auth(mut self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    pub fn with_privacy(mut self, protocol: PrivProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.privacy = Some((protocol, password.into()));
        self
    }

    /// Strongest level this user's credentials can provide.
    pub fn max_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }
}

/// Keys localized for one (user, engine) pair.
struct LocalizedUser {
    auth_key: Option<LocalizedKey>,
    priv_key: Option<PrivKey>,
}

/// Boots/time notion for one authoritative engine, non-authoritative side.
#[derive(Debug, Clone)]
struct EngineTime {
    boots: u32,
    time: u32,
    synced_at: Instant,
    latest_received: u32,
}

impl EngineTime {
    fn new(boots: u32, time: u32) -> Self {
        Self {
            boots,
            time,
            synced_at: Instant::now(),
            latest_received: time,
        }
    }

    /// Local estimate of the engine's current time.
    fn estimated(&self) -> u32 {
        let elapsed = self.synced_at.elapsed().as_secs();
        self.time
            .saturating_add(elapsed.min(u64::from(u32::MAX)) as u32)
            .min(MAX_ENGINE_TIME)
    }

    /// RFC 3414 Section 3.2 step 7b, non-authoritative update rule.
    fn update(&mut self, msg_boots: u32, msg_time: u32) -> bool {
        if msg_boots > self.boots
            || (msg_boots == self.boots && msg_time > self.latest_received)
        {
            self.boots = msg_boots;
            self.time = msg_time;
            self.synced_at = Instant::now();
            self.latest_received = msg_time;
            true
        } else {
            false
        }
    }

    /// RFC 3414 Section 3.2 step 7b, timeliness check against an
    /// authoritative peer.
    fn in_window(&self, msg_boots: u32, msg_time: u32) -> bool {
        if self.boots == MAX_ENGINE_TIME {
            return false;
        }
        if msg_boots < self.boots {
            return false;
        }
        if msg_boots == self.boots && msg_time + TIME_WINDOW < self.latest_received {
            return false;
        }
        true
    }
}

/// Per-request state USM attaches to inbound messages.
///
/// Released exactly once through [`SecurityModel::release_state`] when the
/// owning request entry completes, exhausts, or its session closes.
#[derive(Debug)]
pub struct UsmState {
    pub engine_id: Bytes,
    pub username: Bytes,
}

/// The built-in USM plugin.
pub struct UsmModel {
    users: RwLock<HashMap<Bytes, UsmUser>>,
    keys: RwLock<HashMap<(Bytes, Bytes), Arc<LocalizedUser>>>,
    timeline: RwLock<HashMap<Bytes, EngineTime>>,
    salt: SaltCounter,
}

impl UsmModel {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
            timeline: RwLock::new(HashMap::new()),
            salt: SaltCounter::new(),
        }
    }

    /// Install or replace a user. Cached keys for the old credentials are
    /// invalidated.
    pub fn add_user(&self, user: UsmUser) {
        let name = user.name.clone();
        self.keys
            .write()
            .expect("usm keys poisoned")
            .retain(|(user_name, _), _| user_name != &name);
        self.users
            .write()
            .expect("usm users poisoned")
            .insert(name, user);
    }

    /// Current boots/time notion for an engine, if any.
    pub fn engine_time(&self, engine_id: &[u8]) -> Option<(u32, u32)> {
        self.timeline
            .read()
            .expect("usm timeline poisoned")
            .get(engine_id)
            .map(|t| (t.boots, t.estimated()))
    }

    fn lookup_user(&self, name: &[u8]) -> Result<UsmUser> {
        self.users
            .read()
            .expect("usm users poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| {
                tracing::debug!(target: "snmp_engine::usm", user = %String::from_utf8_lossy(name), "unknown user name");
                Error::security(SecurityErrorKind::UnknownUserName)
            })
    }

    fn localized(&self, user: &UsmUser, engine_id: &Bytes) -> Result<Arc<LocalizedUser>> {
        let cache_key = (user.name.clone(), engine_id.clone());
        if let Some(found) = self
            .keys
            .read()
            .expect("usm keys poisoned")
            .get(&cache_key)
        {
            return Ok(found.clone());
        }

        let auth_key = user
            .auth
            .as_ref()
            .map(|(protocol, password)| LocalizedKey::from_password(*protocol, password, engine_id));
        let priv_key = match (&user.auth, &user.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, password))) => Some(
                PrivKey::from_password(*auth_protocol, *priv_protocol, password, engine_id)?,
            ),
            _ => None,
        };

        let localized = Arc::new(LocalizedUser { auth_key, priv_key });
        self.keys
            .write()
            .expect("usm keys poisoned")
            .insert(cache_key, localized.clone());
        Ok(localized)
    }

    fn note_engine_time(&self, engine_id: &Bytes, boots: u32, time: u32) {
        let mut timeline = self.timeline.write().expect("usm timeline poisoned");
        match timeline.get_mut(engine_id) {
            Some(entry) => {
                entry.update(boots, time);
            }
            None => {
                tracing::debug!(
                    target: "snmp_engine::usm",
                    engine_id = %hex(engine_id),
                    boots,
                    time,
                    "adopting engine clock"
                );
                timeline.insert(engine_id.clone(), EngineTime::new(boots, time));
            }
        }
    }

    fn check_timeliness(&self, engine_id: &Bytes, boots: u32, time: u32) -> Result<()> {
        let timeline = self.timeline.read().expect("usm timeline poisoned");
        if let Some(entry) = timeline.get(engine_id)
            && !entry.in_window(boots, time)
        {
            tracing::debug!(
                target: "snmp_engine::usm",
                engine_id = %hex(engine_id),
                msg_boots = boots,
                msg_time = time,
                local_boots = entry.boots,
                "message outside time window"
            );
            return Err(Error::security(SecurityErrorKind::NotInTimeWindow));
        }
        Ok(())
    }
}

impl Default for UsmModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityModel for UsmModel {
    fn model_id(&self) -> i32 {
        USM_SECURITY_MODEL
    }

    fn name(&self) -> &'static str {
        "usm"
    }

    fn secure_outgoing(
        &self,
        out: &OutboundSecurity<'_>,
    ) -> Result<(Bytes, Option<SecurityStateRef>)> {
        let level = out.security_level;
        let engine_id = Bytes::copy_from_slice(out.security_engine_id);

        if level.requires_auth() && engine_id.is_empty() {
            return Err(Error::encode(EncodeErrorKind::EngineNotKnown));
        }

        let keys = if level.requires_auth() {
            let user = self.lookup_user(out.security_name)?;
            if level > user.max_level() {
                return Err(Error::security(SecurityErrorKind::UnsupportedSecurityLevel));
            }
            Some(self.localized(&user, &engine_id)?)
        } else {
            None
        };

        let (boots, time) = self.engine_time(&engine_id).unwrap_or((0, 0));

        // body: plaintext scoped PDU, or its ciphertext
        let (data, priv_params) = if level.requires_priv() {
            let priv_key = keys
                .as_ref()
                .and_then(|k| k.priv_key.as_ref())
                .ok_or_else(|| Error::encode(EncodeErrorKind::MissingPrivKey))?;
            let plain = out.scoped_pdu.encode_to_bytes();
            let (ciphertext, salt) = priv_key.encrypt(&plain, boots, time, &self.salt)?;
            (V3MessageData::Encrypted(ciphertext), salt)
        } else {
            (V3MessageData::Plaintext(out.scoped_pdu.clone()), Bytes::new())
        };

        let mut params = UsmSecurityParams::new(
            engine_id,
            boots,
            time,
            Bytes::copy_from_slice(out.security_name),
        );
        let mac_len = keys
            .as_ref()
            .and_then(|k| k.auth_key.as_ref())
            .map(LocalizedKey::mac_len);
        if level.requires_auth() {
            let mac_len = mac_len.ok_or_else(|| Error::encode(EncodeErrorKind::MissingAuthKey))?;
            params = params.with_auth_placeholder(mac_len);
        }
        if level.requires_priv() {
            params = params.with_priv_params(priv_params);
        }

        let global = MsgGlobalData::new(
            out.msg_id,
            out.msg_max_size,
            MsgFlags::new(level, out.reportable),
            USM_SECURITY_MODEL,
        );
        let msg = V3Message {
            global,
            security_params: params.encode(),
            data,
        };

        let mut encoded = msg.encode().to_vec();
        if encoded.len() > out.msg_max_size as usize {
            return Err(Error::MessageTooLarge {
                size: encoded.len(),
                max: out.msg_max_size as usize,
            });
        }

        let state = if level.requires_auth() {
            let auth_key = keys
                .as_ref()
                .and_then(|k| k.auth_key.as_ref())
                .ok_or_else(|| Error::encode(EncodeErrorKind::MissingAuthKey))?;
            let (offset, len) = UsmSecurityParams::locate_auth_params(&encoded)
                .ok_or_else(|| Error::encode(EncodeErrorKind::AuthParamsNotLocated))?;
            sign_in_place(auth_key, &mut encoded, offset, len);
            Some(Box::new(UsmState {
                engine_id: Bytes::copy_from_slice(out.security_engine_id),
                username: Bytes::copy_from_slice(out.security_name),
            }) as SecurityStateRef)
        } else {
            None
        };

        Ok((Bytes::from(encoded), state))
    }

    fn process_incoming(&self, whole_msg: &Bytes, msg: &V3Message) -> Result<InboundSecurity> {
        let params = UsmSecurityParams::decode(msg.security_params.clone())?;
        let level = msg.security_level();

        let keys = if level.requires_auth() {
            let user = self.lookup_user(&params.username)?;
            if level > user.max_level() {
                return Err(Error::security(SecurityErrorKind::UnsupportedSecurityLevel));
            }
            let keys = self.localized(&user, &params.engine_id)?;

            let auth_key = keys
                .auth_key
                .as_ref()
                .ok_or_else(|| Error::security(SecurityErrorKind::AuthenticationFailure))?;
            let (offset, len) = UsmSecurityParams::locate_auth_params(whole_msg)
                .ok_or_else(|| Error::security(SecurityErrorKind::AuthenticationFailure))?;
            if !verify_in_place(auth_key, whole_msg, offset, len) {
                tracing::debug!(
                    target: "snmp_engine::usm",
                    user = %String::from_utf8_lossy(&params.username),
                    "digest verification failed"
                );
                return Err(Error::security(SecurityErrorKind::AuthenticationFailure));
            }

            self.check_timeliness(&params.engine_id, params.engine_boots, params.engine_time)?;
            Some(keys)
        } else {
            None
        };

        let scoped_pdu = match &msg.data {
            V3MessageData::Plaintext(scoped) => scoped.clone(),
            V3MessageData::Encrypted(ciphertext) => {
                let priv_key = keys
                    .as_ref()
                    .and_then(|k| k.priv_key.as_ref())
                    .ok_or_else(|| Error::security(SecurityErrorKind::DecryptionError))?;
                let plain = priv_key.decrypt(
                    ciphertext,
                    params.engine_boots,
                    params.engine_time,
                    &params.priv_params,
                )?;
                let mut decoder = Decoder::new(plain);
                ScopedPdu::decode(&mut decoder)
                    .map_err(|_| Error::security(SecurityErrorKind::DecryptionError))?
            }
        };

        // sync our clock notion with the authoritative peer
        if !params.engine_id.is_empty() {
            self.note_engine_time(&params.engine_id, params.engine_boots, params.engine_time);
        }

        Ok(InboundSecurity {
            security_engine_id: params.engine_id.clone(),
            security_name: params.username.clone(),
            security_level: level,
            scoped_pdu,
            state: Some(Box::new(UsmState {
                engine_id: params.engine_id,
                username: params.username,
            }) as SecurityStateRef),
        })
    }

    fn probe_message(&self, request_id: i32, msg_id: i32, msg_max_size: i32) -> Option<Bytes> {
        let global = MsgGlobalData::new(
            msg_id,
            msg_max_size,
            MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
            USM_SECURITY_MODEL,
        );
        let mut pdu = Pdu::get(&[]);
        pdu.request_id = request_id;
        // empty engine identifiers ask the peer for its authoritative id
        let scoped = ScopedPdu::new(Bytes::new(), Bytes::new(), pdu);
        let msg = V3Message::new(global, UsmSecurityParams::empty().encode(), scoped);
        Some(msg.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn params_roundtrip() {
        let params = UsmSecurityParams::new(&b"engine-1"[..], 12, 345, &b"admin"[..])
            .with_auth_placeholder(12)
            .with_priv_params(&b"saltsalt"[..]);
        let decoded = UsmSecurityParams::decode(params.encode()).unwrap();
        assert_eq!(&decoded.engine_id[..], b"engine-1");
        assert_eq!(decoded.engine_boots, 12);
        assert_eq!(decoded.engine_time, 345);
        assert_eq!(&decoded.username[..], b"admin");
        assert_eq!(decoded.auth_params.len(), 12);
        assert_eq!(&decoded.priv_params[..], b"saltsalt");
    }

    #[test]
    fn params_reject_negative_counters() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&[]);
            buf.push_octet_string(&[]);
            buf.push_octet_string(&[]);
            buf.push_integer(10);
            buf.push_integer(-1);
            buf.push_octet_string(&[]);
        });
        assert!(UsmSecurityParams::decode(buf.finish()).is_err());
    }

    #[test]
    fn locate_auth_params_finds_placeholder() {
        let model = UsmModel::new();
        model.add_user(UsmUser::new(&b"tester"[..]).with_auth(AuthProtocol::Sha1, "supersecret"));
        model.note_engine_time(&Bytes::from_static(b"engine-x"), 3, 60);

        let mut pdu = Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        pdu.request_id = 5;
        let scoped = ScopedPdu::new(&b"engine-x"[..], Bytes::new(), pdu);
        let (wire, _) = model
            .secure_outgoing(&OutboundSecurity {
                msg_id: 77,
                msg_max_size: 65507,
                reportable: true,
                security_engine_id: b"engine-x",
                security_name: b"tester",
                security_level: SecurityLevel::AuthNoPriv,
                scoped_pdu: &scoped,
            })
            .unwrap();

        let (offset, len) = UsmSecurityParams::locate_auth_params(&wire).unwrap();
        assert_eq!(len, 12);
        // the field was patched: it must no longer be all zeros
        assert!(wire[offset..offset + len].iter().any(|&b| b != 0));
    }

    #[test]
    fn auth_noauth_roundtrip_through_model() {
        let model = UsmModel::new();
        model.add_user(UsmUser::new(&b"tester"[..]).with_auth(AuthProtocol::Sha256, "supersecret"));
        model.note_engine_time(&Bytes::from_static(b"engine-x"), 1, 0);

        let mut pdu = Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)]);
        pdu.request_id = 9;
        let scoped = ScopedPdu::new(&b"engine-x"[..], Bytes::new(), pdu);
        let (wire, _) = model
            .secure_outgoing(&OutboundSecurity {
                msg_id: 1000,
                msg_max_size: 65507,
                reportable: true,
                security_engine_id: b"engine-x",
                security_name: b"tester",
                security_level: SecurityLevel::AuthNoPriv,
                scoped_pdu: &scoped,
            })
            .unwrap();

        let msg = V3Message::decode(wire.clone()).unwrap();
        let inbound = model.process_incoming(&wire, &msg).unwrap();
        assert_eq!(inbound.security_level, SecurityLevel::AuthNoPriv);
        assert_eq!(&inbound.security_name[..], b"tester");
        assert_eq!(inbound.scoped_pdu.pdu.request_id, 9);
    }

    #[test]
    fn tampered_digest_rejected() {
        let model = UsmModel::new();
        model.add_user(UsmUser::new(&b"tester"[..]).with_auth(AuthProtocol::Md5, "supersecret"));
        model.note_engine_time(&Bytes::from_static(b"engine-x"), 1, 0);

        let mut pdu = Pdu::get(&[oid!(1, 3, 6)]);
        pdu.request_id = 3;
        let scoped = ScopedPdu::new(&b"engine-x"[..], Bytes::new(), pdu);
        let (wire, _) = model
            .secure_outgoing(&OutboundSecurity {
                msg_id: 1,
                msg_max_size: 65507,
                reportable: true,
                security_engine_id: b"engine-x",
                security_name: b"tester",
                security_level: SecurityLevel::AuthNoPriv,
                scoped_pdu: &scoped,
            })
            .unwrap();

        let mut tampered = wire.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        let tampered = Bytes::from(tampered);
        let msg = V3Message::decode(tampered.clone()).unwrap();
        assert!(matches!(
            model.process_incoming(&tampered, &msg),
            Err(Error::Security {
                kind: SecurityErrorKind::AuthenticationFailure
            })
        ));
    }

    #[test]
    fn priv_roundtrip_through_model() {
        let model = UsmModel::new();
        model.add_user(
            UsmUser::new(&b"tester"[..])
                .with_auth(AuthProtocol::Sha256, "supersecret")
                .with_privacy(PrivProtocol::Aes128, "privsecret"),
        );
        model.note_engine_time(&Bytes::from_static(b"engine-x"), 4, 777);

        let mut pdu = Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)]);
        pdu.request_id = 21;
        let scoped = ScopedPdu::new(&b"engine-x"[..], Bytes::new(), pdu);
        let (wire, _) = model
            .secure_outgoing(&OutboundSecurity {
                msg_id: 2,
                msg_max_size: 65507,
                reportable: true,
                security_engine_id: b"engine-x",
                security_name: b"tester",
                security_level: SecurityLevel::AuthPriv,
                scoped_pdu: &scoped,
            })
            .unwrap();

        let msg = V3Message::decode(wire.clone()).unwrap();
        assert!(matches!(msg.data, V3MessageData::Encrypted(_)));
        let inbound = model.process_incoming(&wire, &msg).unwrap();
        assert_eq!(inbound.scoped_pdu.pdu.request_id, 21);
    }

    #[test]
    fn unknown_user_classified() {
        let model = UsmModel::new();
        model.note_engine_time(&Bytes::from_static(b"e"), 1, 0);
        let mut pdu = Pdu::get(&[]);
        pdu.request_id = 1;
        let scoped = ScopedPdu::new(&b"e"[..], Bytes::new(), pdu);
        assert!(matches!(
            model.secure_outgoing(&OutboundSecurity {
                msg_id: 1,
                msg_max_size: 65507,
                reportable: true,
                security_engine_id: b"e",
                security_name: b"nobody",
                security_level: SecurityLevel::AuthNoPriv,
                scoped_pdu: &scoped,
            }),
            Err(Error::Security {
                kind: SecurityErrorKind::UnknownUserName
            })
        ));
    }

    #[test]
    fn level_above_credentials_unsupported() {
        let model = UsmModel::new();
        model.add_user(UsmUser::new(&b"authonly"[..]).with_auth(AuthProtocol::Sha1, "supersecret"));
        let mut pdu = Pdu::get(&[]);
        pdu.request_id = 1;
        let scoped = ScopedPdu::new(&b"e"[..], Bytes::new(), pdu);
        assert!(matches!(
            model.secure_outgoing(&OutboundSecurity {
                msg_id: 1,
                msg_max_size: 65507,
                reportable: true,
                security_engine_id: b"e",
                security_name: b"authonly",
                security_level: SecurityLevel::AuthPriv,
                scoped_pdu: &scoped,
            }),
            Err(Error::Security {
                kind: SecurityErrorKind::UnsupportedSecurityLevel
            })
        ));
    }

    #[test]
    fn time_window_enforced() {
        let mut clock = EngineTime::new(10, 1000);
        // same boots, time within the window of latest received
        assert!(clock.in_window(10, 900));
        // older boots always outside
        assert!(!clock.in_window(9, 5000));
        // far-stale time outside
        assert!(!clock.in_window(10, 700));
        // newer time updates the notion
        assert!(clock.update(10, 2000));
        assert!(!clock.update(10, 1500));
        assert_eq!(clock.latest_received, 2000);
    }

    #[test]
    fn report_classification() {
        let mut report = Pdu::new(PduType::Report);
        report.varbinds = vec![report_varbind(SecurityErrorKind::NotInTimeWindow, 4)];
        assert_eq!(
            classify_report(&report),
            Some(SecurityErrorKind::NotInTimeWindow)
        );

        let mut response = Pdu::new(PduType::Response);
        response.varbinds = vec![report_varbind(SecurityErrorKind::NotInTimeWindow, 4)];
        assert_eq!(classify_report(&response), None);

        let mut other = Pdu::new(PduType::Report);
        other.varbinds = vec![VarBind::null(oid!(1, 3, 6, 1, 99))];
        assert_eq!(classify_report(&other), None);
    }

    #[test]
    fn probe_message_shape() {
        let model = UsmModel::new();
        let wire = model.probe_message(42, 1001, 65507).unwrap();
        let msg = V3Message::decode(wire).unwrap();
        assert_eq!(msg.msg_id(), 1001);
        assert_eq!(msg.security_level(), SecurityLevel::NoAuthNoPriv);
        assert!(msg.global.msg_flags.reportable);
        let params = UsmSecurityParams::decode(msg.security_params.clone()).unwrap();
        assert!(params.engine_id.is_empty());
        let scoped = msg.scoped_pdu().unwrap();
        assert!(scoped.context_engine_id.is_empty());
        assert_eq!(scoped.pdu.request_id, 42);
        assert!(scoped.pdu.varbinds.is_empty());
    }
}
