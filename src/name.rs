//! Element names and the random name generator
//!
//! The driver identifies elements by short textual names. Callers that do
//! not care about the name ask the context for a random one; those come from
//! a xoshiro128** stream seeded once per context from the OS entropy pool
//! and are encoded with a URL-safe alphabet, so collisions across a
//! process's lifetime are a birthday-bound improbability rather than a
//! handled case.
use crate::{
    error::{ElementError, Result},
    util::MAX_NAME_LEN,
};
use rustix::rand::{getrandom, GetRandomFlags};
use std::io;

/// Checks element name syntax: 1-63 bytes, no `/`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('/') {
        return Err(ElementError::InvalidName(name.into()));
    }
    Ok(())
}

/// The xoshiro128** generator: 128 bits of state, 32-bit outputs.
#[derive(Debug, Clone)]
pub struct Xoshiro128StarStar {
    s: [u32; 4],
}

impl Xoshiro128StarStar {
    /// Seeds the generator from the OS entropy pool.
    ///
    /// # Errors
    ///
    /// If entropy cannot be read.
    pub fn from_entropy() -> io::Result<Self> {
        let mut buf = [0u8; 16];
        let mut filled = 0;
        while filled < buf.len() {
            let n = getrandom(&mut buf[filled..], GetRandomFlags::empty())?;
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            filled += n;
        }
        let mut s = [0u32; 4];
        for (word, chunk) in s.iter_mut().zip(buf.chunks_exact(4)) {
            *word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(Self { s })
    }

    /// Seeds the generator from explicit state words.
    ///
    /// The seed must not be all zeroes, or every output will be zero.
    pub fn from_seed(seed: [u32; 4]) -> Self {
        Self { s: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        let result = self.s[0].wrapping_mul(5).rotate_left(7).wrapping_mul(9);

        let t = self.s[1] << 9;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;

        self.s[3] = self.s[3].rotate_left(11);

        result
    }
}

const BASE64_TABLE: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// URL-safe base64, no padding.
pub(crate) fn base64_url(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 4 + 2) / 3);
    let mut chunks = data.chunks_exact(3);
    for c in &mut chunks {
        out.push(BASE64_TABLE[(c[0] >> 2) as usize] as char);
        out.push(BASE64_TABLE[(((c[0] & 0x03) << 4) | (c[1] >> 4)) as usize] as char);
        out.push(BASE64_TABLE[(((c[1] & 0x0f) << 2) | (c[2] >> 6)) as usize] as char);
        out.push(BASE64_TABLE[(c[2] & 0x3f) as usize] as char);
    }
    match *chunks.remainder() {
        [a] => {
            out.push(BASE64_TABLE[(a >> 2) as usize] as char);
            out.push(BASE64_TABLE[((a & 0x03) << 4) as usize] as char);
        }
        [a, b] => {
            out.push(BASE64_TABLE[(a >> 2) as usize] as char);
            out.push(BASE64_TABLE[(((a & 0x03) << 4) | (b >> 4)) as usize] as char);
            out.push(BASE64_TABLE[((b & 0x0f) << 2) as usize] as char);
        }
        _ => {}
    }
    out
}

/// Draws 16 bytes from `rng` and encodes them into a 22-character token.
/// A non-empty prefix is prepended with a separating hyphen, truncated so
/// the result never exceeds the maximum name length.
pub(crate) fn random_name(rng: &mut Xoshiro128StarStar, prefix: &str) -> String {
    let mut bytes = [0u8; 16];
    for chunk in bytes.chunks_exact_mut(4) {
        chunk.copy_from_slice(&rng.next_u32().to_ne_bytes());
    }
    let token = base64_url(&bytes);
    if prefix.is_empty() {
        return token;
    }
    let mut cut = (MAX_NAME_LEN - token.len() - 1).min(prefix.len());
    while !prefix.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}-{}", &prefix[..cut], token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn name_syntax() {
        assert!(validate_name("b03in").is_ok());
        assert!(validate_name(&"x".repeat(63)).is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(64)).is_err());
        assert!(validate_name("a/b").is_err());
    }

    #[test]
    fn xoshiro_reference_sequence() {
        let mut rng = Xoshiro128StarStar::from_seed([1, 2, 3, 4]);
        assert_eq!(rng.next_u32(), 5760);
        assert_eq!(rng.next_u32(), 40320);
    }

    #[test]
    fn base64_vectors() {
        assert_eq!(base64_url(b""), "");
        assert_eq!(base64_url(b"f"), "Zg");
        assert_eq!(base64_url(b"fo"), "Zm8");
        assert_eq!(base64_url(b"foo"), "Zm9v");
        assert_eq!(base64_url(b"foobar"), "Zm9vYmFy");
        assert_eq!(base64_url(&[0xff, 0xff, 0xff]), "____");
        assert_eq!(base64_url(&[0xfb, 0xef, 0xbe]), "----");
    }

    #[test]
    fn random_names_unique_and_valid() {
        let mut rng = Xoshiro128StarStar::from_entropy().unwrap();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let name = random_name(&mut rng, "");
            assert_eq!(name.len(), 22);
            validate_name(&name).unwrap();
            assert!(seen.insert(name), "duplicate name generated");
        }
    }

    #[test]
    fn random_name_prefix() {
        let mut rng = Xoshiro128StarStar::from_seed([1, 2, 3, 4]);
        let name = random_name(&mut rng, "enc");
        assert!(name.starts_with("enc-"));
        assert_eq!(name.len(), 26);
        validate_name(&name).unwrap();

        let long = "p".repeat(80);
        let name = random_name(&mut rng, &long);
        assert_eq!(name.len(), MAX_NAME_LEN);
        validate_name(&name).unwrap();
    }
}
