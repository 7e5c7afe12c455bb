//! Room id generation

use rand::rngs::OsRng;
use rand::RngCore;

/// Crockford-style alphabet, ambiguous characters I, L, O, U removed.
const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room id in characters.
pub const ROOM_ID_LEN: usize = 10;

/// Generate a fresh room id: 10 characters drawn uniformly from [`ALPHABET`]
/// via a cryptographic RNG.
pub fn generate_room_id() -> String {
    let mut bytes = [0u8; ROOM_ID_LEN];
    OsRng.fill_bytes(&mut bytes);

    bytes
        .iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect()
}

/// Check that a candidate id is well-formed (used to reject obviously bogus
/// room ids in the router before a registry lookup).
pub fn is_valid_room_id(id: &str) -> bool {
    id.len() == ROOM_ID_LEN && id.bytes().all(|b| ALPHABET.contains(&b))
}
