//! Codec for the fixed-layout records shared with the datapath.
//!
//! All integers are little-endian, matching the in-memory layout the
//! datapath reads on the supported targets.

use crate::record::{AuthInfo, AuthKey, SignalAuthKey};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use common::{AuthType, Identity, NodeId};

/// Error type for codec operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Insufficient data to decode
    #[error("Insufficient data")]
    InsufficientData,

    /// Invalid record format
    #[error("Invalid record format: {0}")]
    InvalidFormat(String),

    /// Invalid auth type
    #[error("Invalid auth type: {0}")]
    InvalidAuthType(u8),
}

/// Encode an auth map key into `buf`.
pub fn put_key(buf: &mut impl BufMut, key: &AuthKey) {
    // Local Identity (4 bytes)
    buf.put_u32_le(key.local_identity.get());

    // Remote Identity (4 bytes)
    buf.put_u32_le(key.remote_identity.get());

    // Remote Node ID (2 bytes)
    buf.put_u16_le(key.remote_node_id.get());

    // Reserved (2 bytes)
    buf.put_bytes(0, 2);
}

/// Encode an auth map value into `buf`.
///
/// Pre-epoch expirations are clamped to zero.
pub fn put_info(buf: &mut impl BufMut, info: &AuthInfo) {
    let seconds = u64::try_from(info.expiration().timestamp()).unwrap_or(0);
    buf.put_u64_le(seconds);
}

/// Encode an auth map key to bytes
#[must_use]
pub fn encode_key(key: &AuthKey) -> Bytes {
    let mut buf = BytesMut::with_capacity(AuthKey::SIZE);
    put_key(&mut buf, key);
    buf.freeze()
}

/// Encode an auth map value to bytes
#[must_use]
pub fn encode_info(info: &AuthInfo) -> Bytes {
    let mut buf = BytesMut::with_capacity(AuthInfo::SIZE);
    put_info(&mut buf, info);
    buf.freeze()
}

/// Decode an auth map key
///
/// # Errors
///
/// Returns an error if the input is short or the reserved bytes are not zero
pub fn decode_key(data: &mut impl Buf) -> Result<AuthKey, CodecError> {
    if data.remaining() < AuthKey::SIZE {
        return Err(CodecError::InsufficientData);
    }

    let local_identity = Identity(data.get_u32_le());
    let remote_identity = Identity(data.get_u32_le());
    let remote_node_id = NodeId(data.get_u16_le());

    let reserved = data.get_u16_le();
    if reserved != 0 {
        return Err(CodecError::InvalidFormat(format!(
            "reserved key bytes must be zero, got {reserved:#06x}"
        )));
    }

    Ok(AuthKey {
        local_identity,
        remote_identity,
        remote_node_id,
    })
}

/// Decode an auth map value
///
/// # Errors
///
/// Returns an error if the input is short or the expiration is out of range
pub fn decode_info(data: &mut impl Buf) -> Result<AuthInfo, CodecError> {
    if data.remaining() < AuthInfo::SIZE {
        return Err(CodecError::InsufficientData);
    }

    let seconds = data.get_u64_le();
    let expiration = i64::try_from(seconds)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .ok_or_else(|| CodecError::InvalidFormat(format!("expiration out of range: {seconds}")))?;

    Ok(AuthInfo::new(expiration))
}

/// Encode a datapath signal to bytes
#[must_use]
pub fn encode_signal(signal: &SignalAuthKey) -> Bytes {
    let mut buf = BytesMut::with_capacity(SignalAuthKey::SIZE);

    buf.put_u32_le(signal.key.local_identity.get());
    buf.put_u32_le(signal.key.remote_identity.get());
    buf.put_u16_le(signal.key.remote_node_id.get());
    buf.put_u8(signal.auth_type.code());

    // Pad (1 byte)
    buf.put_u8(0);

    buf.freeze()
}

/// Decode a datapath signal
///
/// The pad byte is ignored; the datapath does not guarantee it is zeroed.
///
/// # Errors
///
/// Returns an error if the input is short or the auth type is unknown
pub fn decode_signal(data: &mut impl Buf) -> Result<SignalAuthKey, CodecError> {
    if data.remaining() < SignalAuthKey::SIZE {
        return Err(CodecError::InsufficientData);
    }

    let key = AuthKey {
        local_identity: Identity(data.get_u32_le()),
        remote_identity: Identity(data.get_u32_le()),
        remote_node_id: NodeId(data.get_u16_le()),
    };

    let code = data.get_u8();
    let auth_type = AuthType::try_from(code).map_err(|_| CodecError::InvalidAuthType(code))?;

    // Pad (1 byte) - skip
    data.advance(1);

    Ok(SignalAuthKey { key, auth_type })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout_is_little_endian_with_zero_reserved() {
        let key = AuthKey::new(0x0102_0304, 200, 7);
        let bytes = encode_key(&key);

        assert_eq!(bytes.len(), AuthKey::SIZE);
        assert_eq!(
            &bytes[..],
            &[0x04, 0x03, 0x02, 0x01, 200, 0, 0, 0, 7, 0, 0, 0]
        );
    }

    #[test]
    fn test_info_layout_is_unix_seconds() {
        let expiration = DateTime::<Utc>::from_timestamp(1_700_000_000, 999_000_000).unwrap();
        let bytes = encode_info(&AuthInfo::new(expiration));

        assert_eq!(bytes.len(), AuthInfo::SIZE);
        assert_eq!(&bytes[..], &1_700_000_000u64.to_le_bytes());

        // Sub-second precision is truncated
        let decoded = decode_info(&mut bytes.clone()).unwrap();
        assert_eq!(decoded.expiration().timestamp(), 1_700_000_000);
        assert_eq!(decoded.expiration().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_decode_key_rejects_short_input() {
        let mut data: &[u8] = &[1, 2, 3];
        assert_eq!(decode_key(&mut data), Err(CodecError::InsufficientData));
    }

    #[test]
    fn test_decode_key_rejects_nonzero_reserved() {
        let mut data: &[u8] = &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0xff, 0];
        assert!(matches!(
            decode_key(&mut data),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_decode_info_rejects_out_of_range_expiration() {
        let mut data: &[u8] = &u64::MAX.to_le_bytes();
        assert!(matches!(
            decode_info(&mut data),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_signal_layout() {
        let signal = SignalAuthKey::new(AuthKey::new(100, 200, 7), AuthType::Mutual);
        let bytes = encode_signal(&signal);

        assert_eq!(&bytes[..], &[100, 0, 0, 0, 200, 0, 0, 0, 7, 0, 1, 0]);
        assert_eq!(decode_signal(&mut bytes.clone()).unwrap(), signal);
    }

    #[test]
    fn test_decode_signal_ignores_pad_byte() {
        let mut data: &[u8] = &[100, 0, 0, 0, 200, 0, 0, 0, 7, 0, 2, 0xaa];
        let signal = decode_signal(&mut data).unwrap();
        assert_eq!(signal.auth_type, AuthType::AlwaysFail);
        assert_eq!(signal.key, AuthKey::new(100, 200, 7));
    }

    #[test]
    fn test_decode_signal_rejects_unknown_auth_type() {
        let mut data: &[u8] = &[100, 0, 0, 0, 200, 0, 0, 0, 7, 0, 9, 0];
        assert_eq!(decode_signal(&mut data), Err(CodecError::InvalidAuthType(9)));
    }

    #[test]
    fn test_decode_consumes_exactly_one_record() {
        let mut buf = BytesMut::new();
        put_key(&mut buf, &AuthKey::new(1, 2, 3));
        put_key(&mut buf, &AuthKey::new(4, 5, 6));
        let mut data = buf.freeze();

        assert_eq!(decode_key(&mut data).unwrap(), AuthKey::new(1, 2, 3));
        assert_eq!(decode_key(&mut data).unwrap(), AuthKey::new(4, 5, 6));
        assert_eq!(data.remaining(), 0);
    }
}
