// Broker payload decoding
//
// Every publish carries a JSON envelope `{protocol, pv, t, data, sign}` whose
// `data` is base64 ciphertext. The AES-128 key is bytes 8..24 of the broker
// password. SmartHome accounts use ECB with a trailing pad-length byte;
// Custom accounts use GCM over `[u32 BE iv_len][iv][ciphertext][16-byte tag]`
// with the envelope `t` as associated data.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, KeyInit};
use aes_gcm::AesGcm;
use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::{Aead, Payload};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::mode::PayloadCipher;

const BLOCK_LEN: usize = 16;
const GCM_TAG_LEN: usize = 16;
const IV_LEN_PREFIX: usize = 4;

/// Why an inbound publish could not be turned into an [`MqMessage`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(String),

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("broker password too short to derive a 16-byte key")]
    KeyLength,

    #[error("ciphertext length {0} is not a positive multiple of 16")]
    BlockLength(usize),

    #[error("invalid padding byte {0}")]
    Padding(u8),

    #[error("GCM buffer truncated ({0} bytes)")]
    Truncated(usize),

    #[error("unsupported GCM IV length {0}")]
    UnsupportedIv(usize),

    #[error("GCM authentication failed")]
    Authentication,

    #[error("decrypted payload is not JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded broker message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqMessage {
    /// 4 = device status report, 20 = business event.
    pub protocol: i64,
    /// Payload version.
    pub pv: String,
    /// Envelope timestamp.
    pub t: i64,
    pub sign: String,
    /// Decrypted inner JSON.
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    protocol: i64,
    #[serde(default)]
    pv: String,
    #[serde(default)]
    t: Value,
    data: String,
    #[serde(default)]
    sign: String,
}

/// Decode one raw publish payload.
pub fn decode_message(payload: &[u8], password: &str, cipher: PayloadCipher) -> Result<MqMessage, DecodeError> {
    let envelope: Envelope =
        serde_json::from_slice(payload).map_err(|e| DecodeError::Envelope(e.to_string()))?;
    let key = derive_key(password)?;
    let aad = timestamp_text(&envelope.t);

    let plaintext = match cipher {
        PayloadCipher::AesEcb => decrypt_ecb(key, &envelope.data)?,
        PayloadCipher::AesGcm => decrypt_gcm(key, &envelope.data, aad.as_bytes())?,
    };
    let data: Value = serde_json::from_slice(&plaintext)?;

    Ok(MqMessage {
        protocol: envelope.protocol,
        pv: envelope.pv,
        t: timestamp_value(&envelope.t),
        sign: envelope.sign,
        data,
    })
}

/// Bytes 8..24 of the broker password.
pub(crate) fn derive_key(password: &str) -> Result<&[u8], DecodeError> {
    password
        .as_bytes()
        .get(8..24)
        .ok_or(DecodeError::KeyLength)
}

/// `t` exactly as it appeared on the wire, used as GCM associated data.
fn timestamp_text(t: &Value) -> String {
    match t {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn timestamp_value(t: &Value) -> i64 {
    match t {
        Value::Number(n) => n.as_i64().unwrap_or_default(),
        Value::String(s) => s.parse().unwrap_or_default(),
        _ => 0,
    }
}

pub(crate) fn decrypt_ecb(key: &[u8], data_b64: &str) -> Result<Vec<u8>, DecodeError> {
    let mut buf = STANDARD.decode(data_b64)?;
    if buf.is_empty() || buf.len() % BLOCK_LEN != 0 {
        return Err(DecodeError::BlockLength(buf.len()));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|_| DecodeError::KeyLength)?;
    for block in buf.chunks_exact_mut(BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    // Trailing byte is the number of pad bytes to trim.
    let pad = buf.last().copied().unwrap_or_default();
    if pad == 0 || usize::from(pad) > buf.len() {
        return Err(DecodeError::Padding(pad));
    }
    buf.truncate(buf.len() - usize::from(pad));
    Ok(buf)
}

fn decrypt_gcm(key: &[u8], data_b64: &str, aad: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let buf = STANDARD.decode(data_b64)?;
    let prefix: [u8; IV_LEN_PREFIX] = buf
        .get(..IV_LEN_PREFIX)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated(buf.len()))?;
    let iv_len = usize::try_from(u32::from_be_bytes(prefix)).map_err(|_| DecodeError::Truncated(buf.len()))?;

    let body_start = IV_LEN_PREFIX
        .checked_add(iv_len)
        .ok_or(DecodeError::Truncated(buf.len()))?;
    if buf.len() < body_start + GCM_TAG_LEN {
        return Err(DecodeError::Truncated(buf.len()));
    }
    let iv = &buf[IV_LEN_PREFIX..body_start];
    // aes-gcm expects ciphertext with the tag appended, which is the wire layout.
    let payload = Payload {
        msg: &buf[body_start..],
        aad,
    };

    match iv_len {
        12 => AesGcm::<Aes128, U12>::new_from_slice(key)
            .map_err(|_| DecodeError::KeyLength)?
            .decrypt(GenericArray::from_slice(iv), payload)
            .map_err(|_| DecodeError::Authentication),
        16 => AesGcm::<Aes128, U16>::new_from_slice(key)
            .map_err(|_| DecodeError::KeyLength)?
            .decrypt(GenericArray::from_slice(iv), payload)
            .map_err(|_| DecodeError::Authentication),
        other => Err(DecodeError::UnsupportedIv(other)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use aes::cipher::BlockEncrypt;
    use serde_json::json;

    use super::*;

    pub(crate) const PASSWORD: &str = "prefix__0123456789abcdef_suffix";

    /// ECB-encrypt `plain` with a trailing pad-length byte.
    pub(crate) fn encrypt_ecb(password: &str, plain: &[u8]) -> String {
        let key = derive_key(password).unwrap();
        let cipher = Aes128::new_from_slice(key).unwrap();
        let pad = BLOCK_LEN - plain.len() % BLOCK_LEN;
        let mut buf = plain.to_vec();
        buf.extend(std::iter::repeat_n(u8::try_from(pad).unwrap(), pad));
        for block in buf.chunks_exact_mut(BLOCK_LEN) {
            cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        STANDARD.encode(buf)
    }

    /// GCM-encrypt `plain` into the wire layout with a 12-byte IV.
    pub(crate) fn encrypt_gcm_raw(password: &str, plain: &[u8], aad: &[u8]) -> Vec<u8> {
        let key = derive_key(password).unwrap();
        let iv = [7u8; 12];
        let sealed = AesGcm::<Aes128, U12>::new_from_slice(key)
            .unwrap()
            .encrypt(GenericArray::from_slice(&iv), Payload { msg: plain, aad })
            .unwrap();
        let mut buf = Vec::new();
        buf.extend_from_slice(&12u32.to_be_bytes());
        buf.extend_from_slice(&iv);
        buf.extend_from_slice(&sealed);
        buf
    }

    pub(crate) fn envelope(protocol: i64, t: i64, data: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "protocol": protocol,
            "pv": "2.0",
            "t": t,
            "sign": "abc",
            "data": data,
        }))
        .unwrap()
    }

    #[test]
    fn ecb_round_trip() {
        let inner = json!({ "devId": "d1", "status": [{ "code": "switch_led", "value": true }] });
        let payload = envelope(4, 1_700_000_000, &encrypt_ecb(PASSWORD, inner.to_string().as_bytes()));

        let msg = decode_message(&payload, PASSWORD, PayloadCipher::AesEcb).unwrap();
        assert_eq!(msg.protocol, 4);
        assert_eq!(msg.t, 1_700_000_000);
        assert_eq!(msg.data, inner);
    }

    #[test]
    fn gcm_round_trip() {
        let inner = json!({ "bizCode": "online", "devId": "d1" });
        let raw = encrypt_gcm_raw(PASSWORD, inner.to_string().as_bytes(), b"1700000000");
        let payload = envelope(20, 1_700_000_000, &STANDARD.encode(raw));

        let msg = decode_message(&payload, PASSWORD, PayloadCipher::AesGcm).unwrap();
        assert_eq!(msg.protocol, 20);
        assert_eq!(msg.data, inner);
    }

    #[test]
    fn gcm_tamper_is_detected_at_every_byte() {
        let raw = encrypt_gcm_raw(PASSWORD, br#"{"a":1}"#, b"42");
        // Skip the length prefix; altering it changes the layout rather than the data.
        for i in IV_LEN_PREFIX..raw.len() {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x01;
            let payload = envelope(4, 42, &STANDARD.encode(&tampered));
            let err = decode_message(&payload, PASSWORD, PayloadCipher::AesGcm).unwrap_err();
            assert!(matches!(err, DecodeError::Authentication), "byte {i}: {err}");
        }
    }

    #[test]
    fn gcm_wrong_aad_fails() {
        let raw = encrypt_gcm_raw(PASSWORD, br#"{"a":1}"#, b"42");
        let payload = envelope(4, 43, &STANDARD.encode(raw));
        assert!(matches!(
            decode_message(&payload, PASSWORD, PayloadCipher::AesGcm),
            Err(DecodeError::Authentication)
        ));
    }

    #[test]
    fn gcm_truncated_buffer() {
        let payload = envelope(4, 1, &STANDARD.encode([0u8, 0, 0, 12, 1, 2]));
        assert!(matches!(
            decode_message(&payload, PASSWORD, PayloadCipher::AesGcm),
            Err(DecodeError::Truncated(6))
        ));
    }

    #[test]
    fn short_password_rejected() {
        let payload = envelope(4, 1, "AAAA");
        assert!(matches!(
            decode_message(&payload, "short", PayloadCipher::AesEcb),
            Err(DecodeError::KeyLength)
        ));
    }

    #[test]
    fn ecb_rejects_partial_block() {
        let payload = envelope(4, 1, &STANDARD.encode([0u8; 15]));
        assert!(matches!(
            decode_message(&payload, PASSWORD, PayloadCipher::AesEcb),
            Err(DecodeError::BlockLength(15))
        ));
    }

    #[test]
    fn envelope_without_data_is_rejected() {
        let payload = br#"{"protocol": 4, "t": 1}"#;
        assert!(matches!(
            decode_message(payload, PASSWORD, PayloadCipher::AesEcb),
            Err(DecodeError::Envelope(_))
        ));
    }

    #[test]
    fn string_timestamp_is_used_verbatim_as_aad() {
        let raw = encrypt_gcm_raw(PASSWORD, br#"{"a":1}"#, b"1700000000123");
        let payload = serde_json::to_vec(&json!({
            "protocol": 4, "t": "1700000000123", "data": STANDARD.encode(raw)
        }))
        .unwrap();
        let msg = decode_message(&payload, PASSWORD, PayloadCipher::AesGcm).unwrap();
        assert_eq!(msg.t, 1_700_000_000_123);
    }
}
