//! Outstanding-request bookkeeping.
//!
//! Each entry moves through a small cycle: sent, then on expiry either
//! resent (message identifier regenerated, request identifier kept) while
//! retries remain, or removed with a timeout indication. A matched reply
//! removes it; closing the session removes everything.

use crate::pdu::{Pdu, PduType};
use crate::security::SecurityStateRef;
use std::time::Instant;

use super::RequestCallback;

/// One in-flight request.
pub(crate) struct RequestEntry {
    /// Stable across resends.
    pub request_id: i32,
    /// Regenerated on every resend; equals `request_id` on the classic
    /// dialect, where the wire has no separate message identifier.
    pub message_id: i32,
    /// The original outgoing PDU, kept to rebuild the wire image on resend.
    pub pdu: Pdu,
    /// Resends performed so far.
    pub retries: u32,
    pub expires: Instant,
    /// Engine-ID discovery probe; resolves silently, never reaches the
    /// session handler.
    pub is_probe: bool,
    pub callback: Option<RequestCallback>,
    /// Model-specific state owned by this entry; released exactly once.
    pub security_state: Option<SecurityStateRef>,
}

impl RequestEntry {
    pub fn new(pdu: Pdu, expires: Instant, callback: Option<RequestCallback>) -> Self {
        Self {
            request_id: pdu.request_id,
            message_id: pdu.msg_id(),
            pdu,
            retries: 0,
            expires,
            is_probe: false,
            callback,
            security_state: None,
        }
    }

    pub fn probe(pdu: Pdu, expires: Instant) -> Self {
        let mut entry = Self::new(pdu, expires, None);
        entry.is_probe = true;
        entry
    }
}

/// Ordered collection of pending requests for one session.
#[derive(Default)]
pub(crate) struct RequestTracker {
    entries: Vec<RequestEntry>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, entry: RequestEntry) {
        self.entries.push(entry);
    }

    pub fn contains(&self, request_id: i32) -> bool {
        self.entries.iter().any(|e| e.request_id == request_id)
    }

    pub fn get(&self, idx: usize) -> &RequestEntry {
        &self.entries[idx]
    }

    pub fn remove_at(&mut self, idx: usize) -> RequestEntry {
        self.entries.remove(idx)
    }

    pub fn pop(&mut self) -> Option<RequestEntry> {
        self.entries.pop()
    }

    /// Earliest expiry across pending entries: what an external event loop
    /// should wait until.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.expires).min()
    }

    /// Index of some entry whose deadline has passed.
    pub fn next_expired(&self, now: Instant) -> Option<usize> {
        self.entries.iter().position(|e| e.expires <= now)
    }

    /// Match an inbound reply against the pending entries.
    ///
    /// Secured dialect: the candidate is chosen by message identifier;
    /// Reports then match unconditionally, anything else must reproduce the
    /// original request's identifiers and security fields byte-for-byte. A
    /// field mismatch on the candidate ends the scan, so two differently
    /// secured requests can never cross-talk through a shared identifier.
    /// Classic dialect: match on request identifier.
    pub fn find_match(&self, reply: &Pdu) -> Option<usize> {
        if let Some(env) = &reply.v3 {
            for (idx, entry) in self.entries.iter().enumerate() {
                if entry.message_id != env.msg_id {
                    continue;
                }
                if reply.pdu_type == PduType::Report {
                    return Some(idx);
                }
                if !secured_fields_match(entry, reply) {
                    return None;
                }
                return Some(idx);
            }
            None
        } else {
            self.entries
                .iter()
                .position(|e| e.request_id == reply.request_id)
        }
    }
}

/// The field-equality table a secured reply must satisfy.
fn secured_fields_match(entry: &RequestEntry, reply: &Pdu) -> bool {
    let Some(sent) = &entry.pdu.v3 else {
        return false;
    };
    let Some(got) = &reply.v3 else {
        return false;
    };
    entry.request_id == reply.request_id
        && entry.pdu.version == reply.version
        && sent.security_model == got.security_model
        && sent.security_level == got.security_level
        && sent.context_engine_id == got.context_engine_id
        && sent.context_name == got.context_name
        && sent.security_engine_id == got.security_engine_id
        && sent.security_name == got.security_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SecurityLevel;
    use crate::oid;
    use crate::pdu::V3Envelope;
    use crate::version::Version;
    use bytes::Bytes;
    use std::time::Duration;

    fn classic_entry(request_id: i32) -> RequestEntry {
        let mut pdu = Pdu::get(&[oid!(1, 3, 6, 1)]);
        pdu.request_id = request_id;
        pdu.version = Some(Version::V2c);
        RequestEntry::new(pdu, Instant::now() + Duration::from_secs(1), None)
    }

    fn secured_entry(request_id: i32, msg_id: i32) -> RequestEntry {
        let mut pdu = Pdu::get(&[oid!(1, 3, 6, 1)]);
        pdu.request_id = request_id;
        pdu.version = Some(Version::V3);
        let mut env = V3Envelope::new(SecurityLevel::AuthNoPriv);
        env.msg_id = msg_id;
        env.security_engine_id = Bytes::from_static(b"engine-a");
        env.security_name = Bytes::from_static(b"alice");
        pdu.v3 = Some(env);
        RequestEntry::new(pdu, Instant::now() + Duration::from_secs(1), None)
    }

    fn secured_reply(request_id: i32, msg_id: i32) -> Pdu {
        let mut reply = Pdu::new(PduType::Response);
        reply.request_id = request_id;
        reply.version = Some(Version::V3);
        let mut env = V3Envelope::new(SecurityLevel::AuthNoPriv);
        env.msg_id = msg_id;
        env.security_engine_id = Bytes::from_static(b"engine-a");
        env.security_name = Bytes::from_static(b"alice");
        reply.v3 = Some(env);
        reply
    }

    #[test]
    fn classic_matches_on_request_id() {
        let mut tracker = RequestTracker::new();
        tracker.insert(classic_entry(11));
        tracker.insert(classic_entry(22));

        let mut reply = Pdu::new(PduType::Response);
        reply.request_id = 22;
        reply.version = Some(Version::V2c);
        assert_eq!(tracker.find_match(&reply), Some(1));

        reply.request_id = 33;
        assert_eq!(tracker.find_match(&reply), None);
    }

    #[test]
    fn secured_matches_on_message_id_plus_fields() {
        let mut tracker = RequestTracker::new();
        tracker.insert(secured_entry(1, 100));
        tracker.insert(secured_entry(2, 200));

        assert_eq!(tracker.find_match(&secured_reply(2, 200)), Some(1));
        // right msg id, wrong request id: disqualified
        assert_eq!(tracker.find_match(&secured_reply(9, 200)), None);
    }

    #[test]
    fn secured_field_mismatch_disqualifies() {
        let mut tracker = RequestTracker::new();
        tracker.insert(secured_entry(1, 100));

        let mut reply = secured_reply(1, 100);
        reply.v3.as_mut().unwrap().security_name = Bytes::from_static(b"mallory");
        assert_eq!(tracker.find_match(&reply), None);

        let mut reply = secured_reply(1, 100);
        reply.v3.as_mut().unwrap().security_level = SecurityLevel::NoAuthNoPriv;
        assert_eq!(tracker.find_match(&reply), None);

        let mut reply = secured_reply(1, 100);
        reply.v3.as_mut().unwrap().security_engine_id = Bytes::from_static(b"engine-b");
        assert_eq!(tracker.find_match(&reply), None);
    }

    #[test]
    fn reports_match_on_message_id_alone() {
        let mut tracker = RequestTracker::new();
        tracker.insert(secured_entry(1, 100));

        let mut report = secured_reply(0, 100);
        report.pdu_type = PduType::Report;
        // nothing else matches the request, yet the report does
        report.v3.as_mut().unwrap().security_name = Bytes::new();
        report.v3.as_mut().unwrap().security_engine_id = Bytes::from_static(b"other");
        assert_eq!(tracker.find_match(&report), Some(0));
    }

    #[test]
    fn deadlines_track_the_earliest_entry() {
        let mut tracker = RequestTracker::new();
        assert!(tracker.next_deadline().is_none());

        let now = Instant::now();
        let mut early = classic_entry(1);
        early.expires = now + Duration::from_millis(50);
        let mut late = classic_entry(2);
        late.expires = now + Duration::from_secs(5);
        tracker.insert(late);
        tracker.insert(early);

        assert_eq!(tracker.next_deadline(), Some(now + Duration::from_millis(50)));
        assert!(tracker.next_expired(now).is_none());
        assert_eq!(tracker.next_expired(now + Duration::from_millis(60)), Some(1));
    }
}
