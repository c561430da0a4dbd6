//! Opaque external identifiers.
//!
//! Internal primary keys never leave the service. Each participant carries an
//! external identifier produced by a salted Hashids encoding of its key, which
//! keeps ids short, non-sequential and reversible without a lookup table.
//! The output matches the reference Hashids libraries for the same salt, so
//! identifiers issued by earlier deployments keep decoding.

use crate::errors::{DomainError, DomainResult};
use std::sync::Arc;

const DEFAULT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";
const DEFAULT_SEPARATORS: &[u8] = b"cfhistuCFHISTU";
const MIN_ALPHABET_LENGTH: usize = 16;
const SEPARATOR_DIV: f64 = 3.5;
const GUARD_DIV: f64 = 12.0;

/// Salt value shipped in early builds. Rejected at construction.
pub const PLACEHOLDER_SALT: &str = "TODO:salt_here";

#[derive(Debug)]
struct CodecTables {
    salt: Vec<u8>,
    min_length: usize,
    alphabet: Vec<u8>,
    separators: Vec<u8>,
    guards: Vec<u8>,
}

/// Bijective mapping between internal ids and external id strings.
#[derive(Debug, Clone)]
pub struct IdentifierCodec {
    tables: Arc<CodecTables>,
}

impl IdentifierCodec {
    /// Build a codec for `salt`, padding every identifier to at least
    /// `min_length` characters.
    pub fn new(salt: &str, min_length: usize) -> DomainResult<Self> {
        if salt.trim().is_empty() || salt == PLACEHOLDER_SALT {
            return Err(DomainError::Internal(
                "identifier salt must be configured with a private value".to_string(),
            ));
        }
        Ok(Self::build(salt.as_bytes(), min_length))
    }

    fn build(salt: &[u8], min_length: usize) -> Self {
        let mut alphabet: Vec<u8> = Vec::with_capacity(DEFAULT_ALPHABET.len());
        for &c in DEFAULT_ALPHABET {
            if !alphabet.contains(&c) {
                alphabet.push(c);
            }
        }
        debug_assert!(alphabet.len() >= MIN_ALPHABET_LENGTH);

        let mut separators: Vec<u8> = DEFAULT_SEPARATORS
            .iter()
            .copied()
            .filter(|c| alphabet.contains(c))
            .collect();
        alphabet.retain(|c| !separators.contains(c));
        consistent_shuffle(&mut separators, salt);

        if separators.is_empty() || (alphabet.len() as f64 / separators.len() as f64) > SEPARATOR_DIV {
            let mut wanted = (alphabet.len() as f64 / SEPARATOR_DIV).ceil() as usize;
            if wanted == 1 {
                wanted = 2;
            }
            if wanted > separators.len() {
                let diff = wanted - separators.len();
                separators.extend(alphabet.drain(..diff));
            } else {
                separators.truncate(wanted);
            }
        }

        consistent_shuffle(&mut alphabet, salt);

        let guard_count = (alphabet.len() as f64 / GUARD_DIV).ceil() as usize;
        let guards: Vec<u8> = if alphabet.len() < 3 {
            separators.drain(..guard_count).collect()
        } else {
            alphabet.drain(..guard_count).collect()
        };

        Self {
            tables: Arc::new(CodecTables {
                salt: salt.to_vec(),
                min_length,
                alphabet,
                separators,
                guards,
            }),
        }
    }

    /// Encode a positive internal id.
    pub fn encode(&self, id: i64) -> DomainResult<String> {
        if id <= 0 {
            return Err(DomainError::InvalidIdentifier(format!(
                "internal id must be positive, got {}",
                id
            )));
        }
        Ok(self.encode_numbers(&[id as u64]))
    }

    /// Decode an external id back into the internal id it was produced from.
    pub fn decode(&self, external_id: &str) -> DomainResult<i64> {
        let invalid = || DomainError::InvalidIdentifier(external_id.to_string());

        let numbers = self.decode_numbers(external_id).ok_or_else(invalid)?;
        match numbers.as_slice() {
            [n] if *n > 0 && *n <= i64::MAX as u64 => Ok(*n as i64),
            _ => Err(invalid()),
        }
    }

    /// True when `external_id` is a well-formed identifier for this salt.
    pub fn is_valid(&self, external_id: &str) -> bool {
        self.decode(external_id).is_ok()
    }

    fn encode_numbers(&self, numbers: &[u64]) -> String {
        let t = &*self.tables;
        let mut alphabet = t.alphabet.clone();

        let numbers_hash = numbers
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, n)| acc.wrapping_add(n % (i as u64 + 100)));

        let lottery = alphabet[(numbers_hash % alphabet.len() as u64) as usize];
        let mut ret: Vec<u8> = vec![lottery];

        for (i, &number) in numbers.iter().enumerate() {
            shuffle_with_lottery(&mut alphabet, lottery, &t.salt);
            let last = to_alphabet(number, &alphabet);
            let first = last[0];
            ret.extend_from_slice(&last);

            if i + 1 < numbers.len() {
                let reduced = number % (first as u64 + i as u64);
                ret.push(t.separators[(reduced % t.separators.len() as u64) as usize]);
            }
        }

        if ret.len() < t.min_length {
            let idx = (numbers_hash + ret[0] as u64) % t.guards.len() as u64;
            ret.insert(0, t.guards[idx as usize]);

            if ret.len() < t.min_length {
                let idx = (numbers_hash + ret[2] as u64) % t.guards.len() as u64;
                ret.push(t.guards[idx as usize]);
            }
        }

        let half = alphabet.len() / 2;
        while ret.len() < t.min_length {
            let key = alphabet.clone();
            consistent_shuffle(&mut alphabet, &key);

            let mut padded = Vec::with_capacity(ret.len() + alphabet.len());
            padded.extend_from_slice(&alphabet[half..]);
            padded.extend_from_slice(&ret);
            padded.extend_from_slice(&alphabet[..half]);
            ret = padded;

            let excess = ret.len().saturating_sub(t.min_length);
            if excess > 0 {
                let start = excess / 2;
                ret = ret[start..start + t.min_length].to_vec();
            }
        }

        // Every byte comes from the ASCII tables above.
        ret.into_iter().map(char::from).collect()
    }

    fn decode_numbers(&self, hash: &str) -> Option<Vec<u64>> {
        let t = &*self.tables;
        let bytes = hash.as_bytes();
        if bytes.is_empty() || !hash.is_ascii() {
            return None;
        }

        let parts: Vec<&[u8]> = bytes.split(|b| t.guards.contains(b)).collect();
        let index = if parts.len() == 2 || parts.len() == 3 { 1 } else { 0 };
        let breakdown = parts.get(index)?;
        let (&lottery, rest) = breakdown.split_first()?;

        let mut alphabet = t.alphabet.clone();
        let mut numbers = Vec::new();
        for chunk in rest.split(|b| t.separators.contains(b)) {
            shuffle_with_lottery(&mut alphabet, lottery, &t.salt);
            numbers.push(from_alphabet(chunk, &alphabet)?);
        }

        if numbers.is_empty() || self.encode_numbers(&numbers) != hash {
            return None;
        }
        Some(numbers)
    }
}

/// Reshuffle `alphabet` keyed by `lottery + salt + alphabet`, truncated to the
/// alphabet's length.
fn shuffle_with_lottery(alphabet: &mut [u8], lottery: u8, salt: &[u8]) {
    let mut buffer = Vec::with_capacity(1 + salt.len() + alphabet.len());
    buffer.push(lottery);
    buffer.extend_from_slice(salt);
    buffer.extend_from_slice(alphabet);
    buffer.truncate(alphabet.len());
    consistent_shuffle(alphabet, &buffer);
}

fn consistent_shuffle(alphabet: &mut [u8], salt: &[u8]) {
    if salt.is_empty() || alphabet.len() < 2 {
        return;
    }

    let mut v = 0usize;
    let mut p = 0usize;
    let mut i = alphabet.len() - 1;
    while i > 0 {
        v %= salt.len();
        let integer = salt[v] as usize;
        p += integer;
        let j = (integer + v + p) % i;
        alphabet.swap(i, j);
        i -= 1;
        v += 1;
    }
}

fn to_alphabet(mut input: u64, alphabet: &[u8]) -> Vec<u8> {
    let len = alphabet.len() as u64;
    let mut out = Vec::new();
    loop {
        out.push(alphabet[(input % len) as usize]);
        input /= len;
        if input == 0 {
            break;
        }
    }
    out.reverse();
    out
}

fn from_alphabet(input: &[u8], alphabet: &[u8]) -> Option<u64> {
    if input.is_empty() {
        return None;
    }
    let len = alphabet.len() as u64;
    input.iter().try_fold(0u64, |acc, c| {
        let pos = alphabet.iter().position(|a| a == c)? as u64;
        acc.checked_mul(len)?.checked_add(pos)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn codec(salt: &str, min_length: usize) -> IdentifierCodec {
        IdentifierCodec::build(salt.as_bytes(), min_length)
    }

    #[test]
    fn test_matches_reference_vectors() {
        let plain = codec("this is my salt", 0);
        assert_eq!(plain.encode_numbers(&[12345]), "NkK9");
        assert_eq!(plain.encode_numbers(&[1, 2, 3]), "o2fXhV");
        assert_eq!(plain.decode_numbers("o2fXhV"), Some(vec![1, 2, 3]));

        let padded = codec("this is my salt", 8);
        assert_eq!(padded.encode(1).unwrap(), "gB0NV05e");
        assert_eq!(padded.decode("gB0NV05e").unwrap(), 1);
    }

    #[test]
    fn test_round_trip_and_uniqueness() {
        let codec = IdentifierCodec::new("participants-test-salt", 8).unwrap();
        let mut seen = HashSet::new();
        for id in 1..=2_000i64 {
            let encoded = codec.encode(id).unwrap();
            assert!(encoded.len() >= 8, "{} too short", encoded);
            assert_eq!(codec.decode(&encoded).unwrap(), id);
            assert!(seen.insert(encoded), "collision at {}", id);
        }

        let big = i64::MAX;
        assert_eq!(codec.decode(&codec.encode(big).unwrap()).unwrap(), big);
    }

    #[test]
    fn test_adjacent_ids_do_not_look_sequential() {
        let codec = IdentifierCodec::new("participants-test-salt", 8).unwrap();
        let a = codec.encode(41).unwrap();
        let b = codec.encode(42).unwrap();
        let shared_prefix = a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count();
        assert!(shared_prefix < a.len() - 1);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let codec = IdentifierCodec::new("participants-test-salt", 8).unwrap();
        for bad in ["baz", "", "   ", "éééééééé", "!!!!!!!!", "abc def gh"] {
            assert!(
                matches!(codec.decode(bad), Err(DomainError::InvalidIdentifier(_))),
                "{:?} should not decode",
                bad
            );
        }

        // Tampering with a valid identifier must not yield some other id.
        let good = codec.encode(7).unwrap();
        let mut tampered = good.clone().into_bytes();
        tampered.swap(0, 1);
        let tampered = String::from_utf8(tampered).unwrap();
        if tampered != good {
            assert!(codec.decode(&tampered).map(|id| id != 7).unwrap_or(true));
        }
    }

    #[test]
    fn test_different_salts_disagree() {
        let a = IdentifierCodec::new("salt-a", 8).unwrap();
        let b = IdentifierCodec::new("salt-b", 8).unwrap();
        assert_ne!(a.encode(1).unwrap(), b.encode(1).unwrap());
    }

    #[test]
    fn test_refuses_missing_salt_and_non_positive_ids() {
        assert!(IdentifierCodec::new("", 8).is_err());
        assert!(IdentifierCodec::new(PLACEHOLDER_SALT, 8).is_err());

        let codec = IdentifierCodec::new("participants-test-salt", 8).unwrap();
        assert!(codec.encode(0).is_err());
        assert!(codec.encode(-5).is_err());
    }
}
