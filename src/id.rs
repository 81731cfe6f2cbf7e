//! Identifier generation.

use rand::Rng;
use uuid::Uuid;

/// Symbols available to [`random_token`], in radix order.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Radix used when the caller has no preference.
pub const DEFAULT_RADIX: usize = 62;

/// Generate an RFC 4122 version 4 identifier.
///
/// Always 36 upper-case characters: hyphens at 8, 13, 18 and 23, the version
/// nibble `4` at 14 and one of `8`, `9`, `A`, `B` at 19.
pub fn uuid() -> String {
    let mut buf = Uuid::encode_buffer();
    Uuid::new_v4()
        .hyphenated()
        .encode_upper(&mut buf)
        .to_string()
}

/// Generate `len` characters drawn uniformly from the first `radix` symbols
/// of [`ALPHABET`].
///
/// Tokens carry no structure; they are for casual unique names, not for
/// record ids. Returns `None` if `radix` is not in `2..=62`.
pub fn random_token(len: usize, radix: usize) -> Option<String> {
    if !(2..=ALPHABET.len()).contains(&radix) {
        return None;
    }
    let mut rng = rand::thread_rng();
    let token = (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..radix)] as char)
        .collect();
    Some(token)
}
