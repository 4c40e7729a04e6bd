//! Scripted transport for tests.
//!
//! Records every sent message and plays back a queue of scripted receive
//! events. Clones share state, so a test can keep a handle while the session
//! owns the transport.

use super::{DEFAULT_MAX_MSG_SIZE, Transport};
use crate::error::Result;
use bytes::Bytes;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted receive event.
#[derive(Debug, Clone)]
pub enum MockEvent {
    /// Hand these bytes to the caller.
    Deliver(Bytes),
    /// Let the wait time out (no bytes ever arrive).
    Silence,
    /// Fail the receive with an I/O error.
    RecvError(io::ErrorKind),
}

/// Computes a reply to an observed request (a scripted agent).
pub type Responder = Box<dyn FnMut(&[u8]) -> Option<Bytes> + Send>;

#[derive(Default)]
struct Inner {
    sent: Vec<Bytes>,
    script: VecDeque<MockEvent>,
    send_errors: VecDeque<io::ErrorKind>,
    responder: Option<Responder>,
    is_stream: bool,
}

/// Programmable in-memory transport.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that reports itself as stream-based.
    pub fn stream() -> Self {
        let mock = Self::new();
        mock.inner.lock().unwrap().is_stream = true;
        mock
    }

    /// Queue bytes for the next receive.
    pub fn queue_delivery(&self, data: impl Into<Bytes>) {
        self.inner
            .lock()
            .unwrap()
            .script
            .push_back(MockEvent::Deliver(data.into()));
    }

    /// Queue a timeout for the next receive.
    pub fn queue_silence(&self) {
        self.inner.lock().unwrap().script.push_back(MockEvent::Silence);
    }

    /// Queue a receive-side I/O error.
    pub fn queue_recv_error(&self, kind: io::ErrorKind) {
        self.inner
            .lock()
            .unwrap()
            .script
            .push_back(MockEvent::RecvError(kind));
    }

    /// Fail the next send with an I/O error.
    pub fn fail_next_send(&self, kind: io::ErrorKind) {
        self.inner.lock().unwrap().send_errors.push_back(kind);
    }

    /// Install a scripted agent: every sent request is offered to the
    /// responder, and its reply (if any) is queued for the next receive.
    ///
    /// Needed when the reply must echo identifiers the engine allocates at
    /// send time, which a pre-queued delivery cannot know.
    pub fn set_responder(&self, responder: impl FnMut(&[u8]) -> Option<Bytes> + Send + 'static) {
        self.inner.lock().unwrap().responder = Some(Box::new(responder));
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.inner.lock().unwrap().sent.len()
    }

    pub fn clear_sent(&self) {
        self.inner.lock().unwrap().sent.clear();
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut responder = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(kind) = inner.send_errors.pop_front() {
                return Err(io::Error::from(kind).into());
            }
            inner.sent.push(Bytes::copy_from_slice(data));
            inner.responder.take()
        };

        if let Some(r) = responder.as_mut() {
            let reply = r(data);
            let mut inner = self.inner.lock().unwrap();
            if let Some(reply) = reply {
                inner.script.push_back(MockEvent::Deliver(reply));
            }
            inner.responder = responder;
        }
        Ok(())
    }

    fn recv(&mut self, _timeout: Duration) -> Result<Option<Bytes>> {
        let event = self.inner.lock().unwrap().script.pop_front();
        match event {
            Some(MockEvent::Deliver(data)) => Ok(Some(data)),
            Some(MockEvent::RecvError(kind)) => Err(io::Error::from(kind).into()),
            Some(MockEvent::Silence) | None => Ok(None),
        }
    }

    fn is_stream(&self) -> bool {
        self.inner.lock().unwrap().is_stream
    }

    fn max_msg_size(&self) -> usize {
        DEFAULT_MAX_MSG_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_sends_and_plays_script() {
        let mut mock = MockTransport::new();
        let handle = mock.clone();
        handle.queue_delivery(Bytes::from_static(b"reply"));
        handle.queue_silence();

        mock.send(b"request").unwrap();
        assert_eq!(handle.sent_count(), 1);
        assert_eq!(&handle.sent()[0][..], b"request");

        let got = mock.recv(Duration::from_millis(10)).unwrap();
        assert_eq!(&got.unwrap()[..], b"reply");
        assert!(mock.recv(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn scripted_errors_surface() {
        let mut mock = MockTransport::new();
        mock.fail_next_send(io::ErrorKind::BrokenPipe);
        assert!(mock.send(b"x").is_err());
        // the failed send is not recorded
        assert_eq!(mock.sent_count(), 0);

        mock.queue_recv_error(io::ErrorKind::ConnectionReset);
        assert!(mock.recv(Duration::from_millis(1)).is_err());
    }
}
