//! Privacy transforms (RFC 3414 Section 8, RFC 3826).
//!
//! DES-CBC derives its IV by XORing the pre-IV half of the key with the
//! salt; AES-CFB concatenates engineBoots, engineTime and the salt into the
//! IV. Both ship the salt to the peer in the privParameters field.

use crate::error::{EncodeErrorKind, Error, Result, SecurityErrorKind};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::auth::{AuthProtocol, LocalizedKey};

/// Privacy protocol identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    /// DES-CBC (RFC 3414)
    Des,
    /// AES-128-CFB (RFC 3826)
    Aes128,
    /// AES-192-CFB
    Aes192,
    /// AES-256-CFB
    Aes256,
}

impl PrivProtocol {
    /// Key material required, in bytes. DES counts its 8-byte pre-IV.
    pub fn key_len(self) -> usize {
        match self {
            Self::Des | Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// privParameters are 8 octets for every protocol.
    pub fn salt_len(self) -> usize {
        8
    }
}

impl std::fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Des => write!(f, "DES"),
            Self::Aes128 => write!(f, "AES"),
            Self::Aes192 => write!(f, "AES-192"),
            Self::Aes256 => write!(f, "AES-256"),
        }
    }
}

/// Monotonic salt source shared by every encryption on a session.
///
/// Seeded from OS randomness; zero is skipped on wraparound so an IV is
/// never reused at the seam, matching net-snmp.
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(random_nonzero_u64()))
    }

    /// Fixed starting point, for tests.
    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    pub fn next(&self) -> u64 {
        let v = self.0.fetch_add(1, Ordering::Relaxed);
        if v == 0 {
            self.0.fetch_add(1, Ordering::Relaxed)
        } else {
            v
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn random_nonzero_u64() -> u64 {
    let mut buf = [0u8; 8];
    loop {
        getrandom::fill(&mut buf).expect("OS random source unavailable");
        let v = u64::from_ne_bytes(buf);
        if v != 0 {
            return v;
        }
    }
}

/// A privacy key localized to one engine identifier.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Derive from a password via the auth-protocol key localization
    /// (RFC 3414 8.2 / RFC 3826 1.2), truncated to the cipher's need.
    ///
    /// The auth protocol must yield at least `protocol.key_len()` bytes;
    /// otherwise the derivation fails rather than produce a short key.
    pub fn from_password(
        auth_protocol: AuthProtocol,
        protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Result<Self> {
        if auth_protocol.digest_len() < protocol.key_len() {
            tracing::warn!(
                target: "snmp_engine::usm",
                auth = %auth_protocol,
                privacy = %protocol,
                "auth protocol yields too little key material for privacy protocol"
            );
            return Err(Error::encode(EncodeErrorKind::MissingPrivKey));
        }
        let localized = LocalizedKey::from_password(auth_protocol, password, engine_id);
        Ok(Self {
            key: localized.as_bytes()[..protocol.key_len()].to_vec(),
            protocol,
        })
    }

    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.len() < protocol.key_len() {
            return Err(Error::encode(EncodeErrorKind::MissingPrivKey));
        }
        Ok(Self { key, protocol })
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    /// Encrypt a scoped-PDU image, returning `(ciphertext, privParameters)`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt_counter: &SaltCounter,
    ) -> Result<(Bytes, Bytes)> {
        let salt = salt_counter.next();
        match self.protocol {
            PrivProtocol::Des => self.des_encrypt(plaintext, engine_boots, salt),
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                self.aes_encrypt(plaintext, engine_boots, engine_time, salt)
            }
        }
    }

    /// Decrypt using the peer's privParameters.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        if priv_params.len() != self.protocol.salt_len() {
            return Err(Error::security(SecurityErrorKind::DecryptionError));
        }
        match self.protocol {
            PrivProtocol::Des => self.des_decrypt(ciphertext, priv_params),
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                self.aes_decrypt(ciphertext, engine_boots, engine_time, priv_params)
            }
        }
    }

    fn des_iv(&self, salt: &[u8; 8]) -> [u8; 8] {
        let pre_iv = &self.key[8..16];
        let mut iv = [0u8; 8];
        for (i, b) in iv.iter_mut().enumerate() {
            *b = pre_iv[i] ^ salt[i];
        }
        iv
    }

    fn des_encrypt(&self, plaintext: &[u8], engine_boots: u32, salt: u64) -> Result<(Bytes, Bytes)> {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
        type DesCbcEnc = cbc::Encryptor<des::Des>;

        // salt = engineBoots || low 32 bits of the counter
        let mut salt_bytes = [0u8; 8];
        salt_bytes[..4].copy_from_slice(&engine_boots.to_be_bytes());
        salt_bytes[4..].copy_from_slice(&(salt as u32).to_be_bytes());
        let iv = self.des_iv(&salt_bytes);

        // zero-pad up to the block size
        let padded = plaintext.len().div_ceil(8) * 8;
        let mut buffer = vec![0u8; padded.max(8)];
        buffer[..plaintext.len()].copy_from_slice(plaintext);
        let msg_len = buffer.len();

        let cipher = DesCbcEnc::new_from_slices(&self.key[..8], &iv)
            .map_err(|_| Error::encode(EncodeErrorKind::PrivacyFailure))?;
        let ct = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buffer, msg_len)
            .map_err(|_| Error::encode(EncodeErrorKind::PrivacyFailure))?;

        Ok((
            Bytes::copy_from_slice(ct),
            Bytes::copy_from_slice(&salt_bytes),
        ))
    }

    fn des_decrypt(&self, ciphertext: &[u8], priv_params: &[u8]) -> Result<Bytes> {
        use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
        type DesCbcDec = cbc::Decryptor<des::Des>;

        if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(8) {
            return Err(Error::security(SecurityErrorKind::DecryptionError));
        }
        let mut salt = [0u8; 8];
        salt.copy_from_slice(priv_params);
        let iv = self.des_iv(&salt);

        let cipher = DesCbcDec::new_from_slices(&self.key[..8], &iv)
            .map_err(|_| Error::security(SecurityErrorKind::DecryptionError))?;
        let mut buffer = ciphertext.to_vec();
        let pt = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| Error::security(SecurityErrorKind::DecryptionError))?;
        Ok(Bytes::copy_from_slice(pt))
    }

    fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8; 8]) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
        iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
        iv[8..].copy_from_slice(salt);
        iv
    }

    fn aes_encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let salt_bytes = salt.to_be_bytes();
        let iv = Self::aes_iv(engine_boots, engine_time, &salt_bytes);
        let key = &self.key[..self.protocol.key_len()];
        let mut buffer = plaintext.to_vec();

        macro_rules! cfb {
            ($cipher:ty) => {
                cfb_mode::Encryptor::<$cipher>::new_from_slices(key, &iv)
                    .map_err(|_| Error::encode(EncodeErrorKind::PrivacyFailure))?
                    .encrypt(&mut buffer)
            };
        }
        match self.protocol {
            PrivProtocol::Aes128 => cfb!(aes::Aes128),
            PrivProtocol::Aes192 => cfb!(aes::Aes192),
            PrivProtocol::Aes256 => cfb!(aes::Aes256),
            PrivProtocol::Des => unreachable!(),
        }

        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt_bytes)))
    }

    fn aes_decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let mut salt = [0u8; 8];
        salt.copy_from_slice(priv_params);
        let iv = Self::aes_iv(engine_boots, engine_time, &salt);
        let key = &self.key[..self.protocol.key_len()];
        let mut buffer = ciphertext.to_vec();

        macro_rules! cfb {
            ($cipher:ty) => {
                cfb_mode::Decryptor::<$cipher>::new_from_slices(key, &iv)
                    .map_err(|_| Error::security(SecurityErrorKind::DecryptionError))?
                    .decrypt(&mut buffer)
            };
        }
        match self.protocol {
            PrivProtocol::Aes128 => cfb!(aes::Aes128),
            PrivProtocol::Aes192 => cfb!(aes::Aes192),
            PrivProtocol::Aes256 => cfb!(aes::Aes256),
            PrivProtocol::Des => unreachable!(),
        }

        Ok(Bytes::from(buffer))
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[redacted]")
            .finish()
    }
}
