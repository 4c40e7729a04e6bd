//! Authentication key derivation and digests (RFC 3414 Appendix A, RFC 7860).

use digest::KeyInit;
use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Authentication protocol identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    /// HMAC-MD5-96 (RFC 3414)
    Md5,
    /// HMAC-SHA-96 (RFC 3414)
    Sha1,
    /// HMAC-SHA-224 (RFC 7860)
    Sha224,
    /// HMAC-SHA-256 (RFC 7860)
    Sha256,
    /// HMAC-SHA-384 (RFC 7860)
    Sha384,
    /// HMAC-SHA-512 (RFC 7860)
    Sha512,
}

impl AuthProtocol {
    /// Digest output length, which is also the localized key length.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Truncated MAC length carried in the auth-parameters field.
    pub fn mac_len(self) -> usize {
        match self {
            Self::Md5 | Self::Sha1 => 12,
            Self::Sha224 => 16,
            Self::Sha256 => 24,
            Self::Sha384 => 32,
            Self::Sha512 => 48,
        }
    }
}

impl std::fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Md5 => write!(f, "MD5"),
            Self::Sha1 => write!(f, "SHA"),
            Self::Sha224 => write!(f, "SHA-224"),
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Sha384 => write!(f, "SHA-384"),
            Self::Sha512 => write!(f, "SHA-512"),
        }
    }
}

/// An authentication key localized to one engine identifier.
///
/// Key material zeroes itself on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    /// Derive from a password: 1 MB expansion, hash, then localization with
    /// the engine identifier (RFC 3414 A.2).
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        let mut master = password_to_key(protocol, password);
        let key = localize(protocol, &master, engine_id);
        master.zeroize();
        Self { key, protocol }
    }

    /// Wrap an already-localized key.
    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// Truncated MAC over `data`.
    pub fn compute_mac(&self, data: &[u8]) -> Vec<u8> {
        let full = hmac_digest(self.protocol, &self.key, data);
        full[..self.protocol.mac_len()].to_vec()
    }

    /// Constant-time MAC verification.
    pub fn verify_mac(&self, data: &[u8], expected: &[u8]) -> bool {
        if expected.len() != self.protocol.mac_len() {
            return false;
        }
        let computed = self.compute_mac(data);
        computed.ct_eq(expected).into()
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[redacted]")
            .finish()
    }
}

/// Sign a built message in place.
///
/// The auth-parameters field must hold `mac_len` zero bytes; the MAC runs
/// over the whole message with those zeros present, then replaces them.
pub fn sign_in_place(key: &LocalizedKey, message: &mut [u8], offset: usize, len: usize) {
    debug_assert!(message[offset..offset + len].iter().all(|&b| b == 0));
    let mac = key.compute_mac(message);
    message[offset..offset + len].copy_from_slice(&mac);
}

/// Verify a received message.
///
/// Extracts the digest, zeroes its field, recomputes over the image the
/// sender signed, and compares in constant time.
pub fn verify_in_place(key: &LocalizedKey, message: &[u8], offset: usize, len: usize) -> bool {
    if len != key.mac_len() || offset + len > message.len() {
        return false;
    }
    let mut image = message.to_vec();
    let received = message[offset..offset + len].to_vec();
    image[offset..offset + len].fill(0);
    key.verify_mac(&image, &received)
}

/// RFC 3414 A.2.1: repeat the password out to 1 MB and hash it.
fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    const EXPANSION: usize = 1_048_576;

    fn expand<D: digest::Digest>(password: &[u8]) -> Vec<u8> {
        if password.is_empty() {
            return vec![0u8; <D as digest::Digest>::output_size()];
        }
        let mut hasher = D::new();
        let mut block = [0u8; 64];
        let mut cursor = 0usize;
        let mut fed = 0usize;
        while fed < EXPANSION {
            for byte in &mut block {
                *byte = password[cursor];
                cursor = (cursor + 1) % password.len();
            }
            hasher.update(block);
            fed += block.len();
        }
        hasher.finalize().to_vec()
    }

    match protocol {
        AuthProtocol::Md5 => expand::<md5::Md5>(password),
        AuthProtocol::Sha1 => expand::<sha1::Sha1>(password),
        AuthProtocol::Sha224 => expand::<sha2::Sha224>(password),
        AuthProtocol::Sha256 => expand::<sha2::Sha256>(password),
        AuthProtocol::Sha384 => expand::<sha2::Sha384>(password),
        AuthProtocol::Sha512 => expand::<sha2::Sha512>(password),
    }
}

/// RFC 3414 A.2.2: `H(master || engine_id || master)`.
fn localize(protocol: AuthProtocol, master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    fn mix<D: digest::Digest>(master: &[u8], engine_id: &[u8]) -> Vec<u8> {
        let mut hasher = D::new();
        hasher.update(master);
        hasher.update(engine_id);
        hasher.update(master);
        hasher.finalize().to_vec()
    }

    match protocol {
        AuthProtocol::Md5 => mix::<md5::Md5>(master, engine_id),
        AuthProtocol::Sha1 => mix::<sha1::Sha1>(master, engine_id),
        AuthProtocol::Sha224 => mix::<sha2::Sha224>(master, engine_id),
        AuthProtocol::Sha256 => mix::<sha2::Sha256>(master, engine_id),
        AuthProtocol::Sha384 => mix::<sha2::Sha384>(master, engine_id),
        AuthProtocol::Sha512 => mix::<sha2::Sha512>(master, engine_id),
    }
}

fn hmac_digest(protocol: AuthProtocol, key: &[u8], data: &[u8]) -> Vec<u8> {
    macro_rules! run {
        ($hash:ty) => {{
            let mut mac =
                <Hmac<$hash> as KeyInit>::new_from_slice(key).expect("HMAC accepts any key length");
            Mac::update(&mut mac, data);
            mac.finalize().into_bytes().to_vec()
        }};
    }

    match protocol {
        AuthProtocol::Md5 => run!(md5::Md5),
        AuthProtocol::Sha1 => run!(sha1::Sha1),
        AuthProtocol::Sha224 => run!(sha2::Sha224),
        AuthProtocol::Sha256 => run!(sha2::Sha256),
        AuthProtocol::Sha384 => run!(sha2::Sha384),
        AuthProtocol::Sha512 => run!(sha2::Sha512),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 3414 A.3.1 test vector: password "maplesyrup", engine
    /// 00 00 00 00 00 00 00 00 00 00 00 02.
    #[test]
    fn rfc3414_md5_key_localization() {
        let engine = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2];
        let key = LocalizedKey::from_password(AuthProtocol::Md5, b"maplesyrup", &engine);
        assert_eq!(
            key.as_bytes(),
            &[
                0x52, 0x6f, 0x5e, 0xed, 0x9f, 0xcc, 0xe2, 0x6f, 0x89, 0x64, 0xc2, 0x93, 0x07,
                0x87, 0xd8, 0x2b
            ]
        );
    }

    /// RFC 3414 A.3.2 test vector, SHA-1 variant.
    #[test]
    fn rfc3414_sha1_key_localization() {
        let engine = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2];
        let key = LocalizedKey::from_password(AuthProtocol::Sha1, b"maplesyrup", &engine);
        assert_eq!(
            key.as_bytes(),
            &[
                0x66, 0x95, 0xfe, 0xbc, 0x92, 0x88, 0xe3, 0x62, 0x82, 0x23, 0x5f, 0xc7, 0x15,
                0x1f, 0x12, 0x84, 0x97, 0xb3, 0x8f, 0x3f
            ]
        );
    }

    #[test]
    fn mac_roundtrip_and_truncation() {
        let key = LocalizedKey::from_bytes(AuthProtocol::Sha1, vec![0xAB; 20]);
        let mac = key.compute_mac(b"message");
        assert_eq!(mac.len(), 12);
        assert!(key.verify_mac(b"message", &mac));
        assert!(!key.verify_mac(b"message!", &mac));
        assert!(!key.verify_mac(b"message", &mac[..11]));
    }

    #[test]
    fn sign_then_verify_in_place() {
        let key = LocalizedKey::from_bytes(AuthProtocol::Md5, vec![0x11; 16]);
        let mut msg = vec![0x30, 0x20];
        msg.extend_from_slice(&[0u8; 12]); // digest field at offset 2
        msg.extend_from_slice(b"payload");

        sign_in_place(&key, &mut msg, 2, 12);
        assert!(verify_in_place(&key, &msg, 2, 12));

        msg[20] ^= 0xFF;
        assert!(!verify_in_place(&key, &msg, 2, 12));
    }
}
