//! Key encoding for the requests column family.
//!
//! Keys are 16 bytes: an 8-byte big-endian delivery time followed by the
//! 8-byte request uid. Big-endian encoding makes byte-lexicographic order
//! equivalent to numeric time order; the uid suffix disambiguates ties.

use rowan_core::{RequestId, StoredRequest};

/// Length of an encoded request key in bytes.
pub const KEY_LEN: usize = 16;

/// Builds the storage key for a delivery time and uid.
pub fn request_key(delivery_time: i64, uid: &RequestId) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    #[allow(clippy::cast_sign_loss)]
    key[..8].copy_from_slice(&(delivery_time as u64).to_be_bytes());
    key[8..].copy_from_slice(uid.as_bytes());
    key
}

/// Builds the storage key of a request record.
pub fn key_of(request: &StoredRequest) -> [u8; KEY_LEN] {
    request_key(request.delivery_time, &request.uid)
}

/// Extracts the delivery time from an encoded key.
///
/// Returns `None` if the key is not exactly [`KEY_LEN`] bytes.
pub fn decode_delivery_time(key: &[u8]) -> Option<i64> {
    if key.len() != KEY_LEN {
        return None;
    }
    let bytes: [u8; 8] = key[..8].try_into().ok()?;
    #[allow(clippy::cast_possible_wrap)]
    let delivery_time = u64::from_be_bytes(bytes) as i64;
    Some(delivery_time)
}

/// Extracts the uid from an encoded key.
pub fn decode_uid(key: &[u8]) -> Option<RequestId> {
    if key.len() != KEY_LEN {
        return None;
    }
    let bytes: [u8; 8] = key[8..].try_into().ok()?;
    Some(RequestId(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_delivery_time_sorts_first() {
        let uid = RequestId([0xff; 8]);
        let early = request_key(1_000, &uid);
        let late = request_key(2_000, &uid);
        assert!(early < late);
    }

    #[test]
    fn uid_breaks_delivery_time_ties() {
        let a = request_key(1_000, &RequestId([1; 8]));
        let b = request_key(1_000, &RequestId([2; 8]));
        assert!(a < b);
        assert_ne!(a, b);
    }

    #[test]
    fn decode_round_trips() {
        let uid = RequestId([9, 8, 7, 6, 5, 4, 3, 2]);
        let key = request_key(1_700_000_000_000_000_000, &uid);
        assert_eq!(decode_delivery_time(&key), Some(1_700_000_000_000_000_000));
        assert_eq!(decode_uid(&key), Some(uid));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(decode_delivery_time(&[0; 8]), None);
        assert_eq!(decode_uid(&[0; 24]), None);
        assert_eq!(decode_delivery_time(&[]), None);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn keys_preserve_delivery_time_ordering(
                t1 in 0i64..,
                t2 in 0i64..,
                uid1 in any::<[u8; 8]>(),
                uid2 in any::<[u8; 8]>(),
            ) {
                let k1 = request_key(t1, &RequestId(uid1));
                let k2 = request_key(t2, &RequestId(uid2));
                if t1 < t2 {
                    prop_assert!(k1 < k2);
                } else if t1 > t2 {
                    prop_assert!(k1 > k2);
                }
                // Equal times fall back to uid order, not tested here.
            }

            #[test]
            fn key_round_trips(t in 0i64.., uid in any::<[u8; 8]>()) {
                let key = request_key(t, &RequestId(uid));
                prop_assert_eq!(decode_delivery_time(&key), Some(t));
                prop_assert_eq!(decode_uid(&key), Some(RequestId(uid)));
            }
        }
    }
}
