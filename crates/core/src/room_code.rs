//! Short human-enterable room codes

use rand::Rng;

/// Characters a room code is drawn from
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default room code length
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 6;

/// Attempts made to find a code no live room uses
const MAX_UNIQUE_ATTEMPTS: usize = 16;

/// Generate a random room code of the given length
pub fn generate(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generate a code for which `in_use` returns false.
///
/// Falls back to the last candidate after a bounded number of collisions;
/// with 36^6 codes this only matters for tiny configured lengths.
pub fn generate_unique(length: usize, in_use: impl Fn(&str) -> bool) -> String {
    let mut candidate = generate(length);
    for _ in 1..MAX_UNIQUE_ATTEMPTS {
        if !in_use(&candidate) {
            return candidate;
        }
        tracing::debug!(code = %candidate, "Room code collision, regenerating");
        candidate = generate(length);
    }
    candidate
}

/// Normalize a client-entered code for lookup
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_length_and_alphabet() {
        for _ in 0..200 {
            let code = generate(DEFAULT_ROOM_CODE_LENGTH);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_generate_unique_skips_taken_codes() {
        // Length 1 leaves 36 codes; reserve all but "Z"
        let code = generate_unique(1, |c| c != "Z");
        // Either found "Z" or gave up after the attempt budget
        assert_eq!(code.len(), 1);

        let code = generate_unique(6, |_| false);
        assert_eq!(code.len(), 6);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  k3f9qz \n"), "K3F9QZ");
    }
}
