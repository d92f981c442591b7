//! Flow channel encryption
//!
//! Each interactive-form request carries an RSA-wrapped AES session key, a
//! 16-byte IV and an AES-GCM sealed payload (tag appended). The response
//! must be sealed with the same key but the bitwise complement of the
//! request IV, so the two directions of one exchange can never share a
//! nonce.
//!
//! Wire format per request:
//! - `encrypted_aes_key`: base64, RSA-OAEP(SHA-256, MGF1-SHA-256, no label)
//! - `initial_vector`: base64, 16 bytes
//! - `encrypted_flow_data`: base64, ciphertext || 16-byte GCM tag

use aes_gcm::aead::Aead;
use aes_gcm::aead::consts::U16;
use aes_gcm::aes::{Aes128, Aes256};
use aes_gcm::{AesGcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha2::Sha256;
use thiserror::Error;

// The platform delivers a 16-byte IV, not the usual 12-byte GCM nonce.
type Aes128Gcm16 = AesGcm<Aes128, U16>;
type Aes256Gcm16 = AesGcm<Aes256, U16>;

const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum FlowCryptoError {
    #[error("Failed to load private key: {0}")]
    KeyLoad(String),

    #[error("Envelope field is not valid base64: {0}")]
    InvalidEnvelope(&'static str),

    #[error("Initial vector must be {IV_LEN} bytes, got {0}")]
    InvalidIv(usize),

    /// RSA unwrap failed. The client holds a stale public key and must
    /// re-fetch it, which the endpoint signals with a distinct status code.
    #[error("Failed to unwrap AES session key")]
    KeyUnwrap,

    #[error("Unsupported AES key length: {0} bytes")]
    UnsupportedKeyLength(usize),

    /// Authentication or decryption of the payload failed.
    #[error("Payload decryption failed")]
    PayloadAuth,

    #[error("Payload is not valid JSON: {0}")]
    PayloadJson(String),

    #[error("Failed to serialize response: {0}")]
    ResponseJson(String),
}

/// Holder of the business RSA private key; decrypts inbound envelopes.
#[derive(Clone)]
pub struct FlowCrypto {
    private_key: RsaPrivateKey,
}

impl FlowCrypto {
    /// Load the private key from PEM (PKCS#8 preferred, PKCS#1 accepted).
    /// Encrypted PKCS#8 keys require the passphrase.
    pub fn from_pem(pem: &str, passphrase: Option<&str>) -> Result<Self, FlowCryptoError> {
        let private_key = match passphrase {
            Some(pass) => RsaPrivateKey::from_pkcs8_encrypted_pem(pem, pass.as_bytes())
                .map_err(|e| FlowCryptoError::KeyLoad(e.to_string()))?,
            None => RsaPrivateKey::from_pkcs8_pem(pem)
                .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
                .map_err(|e| FlowCryptoError::KeyLoad(e.to_string()))?,
        };
        Ok(Self { private_key })
    }

    /// Decrypt one request envelope.
    ///
    /// Returns an exchange binding the plaintext to the session key and
    /// request IV, so the response is always sealed with exactly the
    /// material this request arrived with.
    pub fn open(
        &self,
        encrypted_flow_data_b64: &str,
        encrypted_aes_key_b64: &str,
        initial_vector_b64: &str,
    ) -> Result<FlowExchange, FlowCryptoError> {
        let sealed = B64
            .decode(encrypted_flow_data_b64)
            .map_err(|_| FlowCryptoError::InvalidEnvelope("encrypted_flow_data"))?;
        let wrapped_key = B64
            .decode(encrypted_aes_key_b64)
            .map_err(|_| FlowCryptoError::InvalidEnvelope("encrypted_aes_key"))?;
        let iv = B64
            .decode(initial_vector_b64)
            .map_err(|_| FlowCryptoError::InvalidEnvelope("initial_vector"))?;

        if iv.len() != IV_LEN {
            return Err(FlowCryptoError::InvalidIv(iv.len()));
        }
        if sealed.len() < TAG_LEN {
            return Err(FlowCryptoError::PayloadAuth);
        }

        let aes_key = self
            .private_key
            .decrypt(Oaep::new::<Sha256>(), &wrapped_key)
            .map_err(|_| FlowCryptoError::KeyUnwrap)?;

        // The aead crate expects ciphertext || tag, which is the wire layout.
        let plaintext_bytes = decrypt_payload(&aes_key, &iv, &sealed)?;
        let payload = serde_json::from_slice(&plaintext_bytes)
            .map_err(|e| FlowCryptoError::PayloadJson(e.to_string()))?;

        let mut request_iv = [0u8; IV_LEN];
        request_iv.copy_from_slice(&iv);

        Ok(FlowExchange {
            payload,
            aes_key,
            request_iv,
        })
    }
}

impl std::fmt::Debug for FlowCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs
        f.debug_struct("FlowCrypto").finish_non_exhaustive()
    }
}

/// One request/response pair. Consuming `seal` guarantees a single response
/// per request IV.
pub struct FlowExchange {
    /// Decrypted request body
    pub payload: serde_json::Value,
    aes_key: Vec<u8>,
    request_iv: [u8; IV_LEN],
}

impl FlowExchange {
    /// Encrypt the response with the retained session key and the bitwise
    /// complement of the request IV. Returns base64(ciphertext || tag).
    pub fn seal(self, response: &serde_json::Value) -> Result<String, FlowCryptoError> {
        let plaintext = serde_json::to_vec(response)
            .map_err(|e| FlowCryptoError::ResponseJson(e.to_string()))?;

        let mut response_iv = self.request_iv;
        for byte in &mut response_iv {
            *byte = !*byte;
        }

        let sealed = encrypt_payload(&self.aes_key, &response_iv, &plaintext)?;
        Ok(B64.encode(sealed))
    }
}

impl std::fmt::Debug for FlowExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowExchange")
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

fn decrypt_payload(key: &[u8], iv: &[u8], sealed: &[u8]) -> Result<Vec<u8>, FlowCryptoError> {
    let nonce = Nonce::<U16>::from_slice(iv);
    match key.len() {
        16 => {
            let cipher =
                Aes128Gcm16::new_from_slice(key).map_err(|_| FlowCryptoError::KeyUnwrap)?;
            cipher
                .decrypt(nonce, sealed)
                .map_err(|_| FlowCryptoError::PayloadAuth)
        }
        32 => {
            let cipher =
                Aes256Gcm16::new_from_slice(key).map_err(|_| FlowCryptoError::KeyUnwrap)?;
            cipher
                .decrypt(nonce, sealed)
                .map_err(|_| FlowCryptoError::PayloadAuth)
        }
        other => Err(FlowCryptoError::UnsupportedKeyLength(other)),
    }
}

fn encrypt_payload(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, FlowCryptoError> {
    let nonce = Nonce::<U16>::from_slice(iv);
    match key.len() {
        16 => {
            let cipher =
                Aes128Gcm16::new_from_slice(key).map_err(|_| FlowCryptoError::KeyUnwrap)?;
            cipher
                .encrypt(nonce, plaintext)
                .map_err(|_| FlowCryptoError::PayloadAuth)
        }
        32 => {
            let cipher =
                Aes256Gcm16::new_from_slice(key).map_err(|_| FlowCryptoError::KeyUnwrap)?;
            cipher
                .encrypt(nonce, plaintext)
                .map_err(|_| FlowCryptoError::PayloadAuth)
        }
        other => Err(FlowCryptoError::UnsupportedKeyLength(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::{Oaep, RsaPublicKey};
    use serde_json::json;

    fn make_crypto() -> (FlowCrypto, RsaPublicKey) {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        (FlowCrypto { private_key }, public_key)
    }

    fn client_envelope(
        public_key: &RsaPublicKey,
        key: &[u8],
        iv: &[u8; 16],
        payload: &serde_json::Value,
    ) -> (String, String, String) {
        let wrapped = public_key
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), key)
            .unwrap();
        let sealed = encrypt_payload(key, iv, &serde_json::to_vec(payload).unwrap()).unwrap();
        (B64.encode(sealed), B64.encode(wrapped), B64.encode(iv))
    }

    #[test]
    fn round_trip_with_128_bit_key() {
        let (crypto, public_key) = make_crypto();
        let key = [7u8; 16];
        let iv = [3u8; 16];
        let request = json!({"action": "ping", "version": "3.0"});

        let (data, wrapped, iv_b64) = client_envelope(&public_key, &key, &iv, &request);
        let exchange = crypto.open(&data, &wrapped, &iv_b64).unwrap();
        assert_eq!(exchange.payload, request);

        let response = json!({"data": {"status": "active"}});
        let sealed_b64 = exchange.seal(&response).unwrap();

        // The client decrypts with the complement of its own IV
        let flipped: Vec<u8> = iv.iter().map(|b| !b).collect();
        let sealed = B64.decode(sealed_b64).unwrap();
        let plain = decrypt_payload(&key, &flipped, &sealed).unwrap();
        assert_eq!(serde_json::from_slice::<serde_json::Value>(&plain).unwrap(), response);
    }

    #[test]
    fn round_trip_with_256_bit_key() {
        let (crypto, public_key) = make_crypto();
        let key = [9u8; 32];
        let iv = [0xA5u8; 16];
        let request = json!({"action": "INIT"});

        let (data, wrapped, iv_b64) = client_envelope(&public_key, &key, &iv, &request);
        let exchange = crypto.open(&data, &wrapped, &iv_b64).unwrap();
        assert_eq!(exchange.payload, request);
    }

    #[test]
    fn response_never_reuses_the_request_iv() {
        let (crypto, public_key) = make_crypto();
        let key = [7u8; 16];
        let iv = [3u8; 16];
        let request = json!({"action": "ping"});

        let (data, wrapped, iv_b64) = client_envelope(&public_key, &key, &iv, &request);
        let exchange = crypto.open(&data, &wrapped, &iv_b64).unwrap();
        let sealed = B64.decode(exchange.seal(&json!({"ok": true})).unwrap()).unwrap();

        // Decrypting with the unflipped request IV must fail authentication
        assert!(decrypt_payload(&key, &iv, &sealed).is_err());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let (crypto, public_key) = make_crypto();
        let key = [7u8; 16];
        let iv = [3u8; 16];
        let request = json!({"action": "ping"});

        let (data, wrapped, iv_b64) = client_envelope(&public_key, &key, &iv, &request);
        let mut sealed = B64.decode(&data).unwrap();
        sealed[0] ^= 0xFF;
        let tampered = B64.encode(sealed);

        assert!(matches!(
            crypto.open(&tampered, &wrapped, &iv_b64),
            Err(FlowCryptoError::PayloadAuth)
        ));
    }

    #[test]
    fn wrong_rsa_key_is_a_key_unwrap_error() {
        let (crypto, _) = make_crypto();
        let (_, other_public) = make_crypto();
        let key = [7u8; 16];
        let iv = [3u8; 16];

        let (data, wrapped, iv_b64) =
            client_envelope(&other_public, &key, &iv, &json!({"action": "ping"}));
        assert!(matches!(
            crypto.open(&data, &wrapped, &iv_b64),
            Err(FlowCryptoError::KeyUnwrap)
        ));
    }

    #[test]
    fn bad_base64_names_the_field() {
        let (crypto, _) = make_crypto();
        let err = crypto.open("%%%", "AAAA", "AAAA").unwrap_err();
        assert!(matches!(
            err,
            FlowCryptoError::InvalidEnvelope("encrypted_flow_data")
        ));
    }
}
