//! Turns sifted bits into session key bytes.
//!
//! Bits are packed eight per byte, most significant bit first. A trailing
//! partial byte is dropped rather than zero-padded.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, warn};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::bb84_states::Bit;
use crate::error::Bb84Error;

/// What to do when fewer key bits survive than the target asks for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShortKeyPolicy {
    /// Fail with `InsufficientKeyMaterial`.
    Abort,
    /// Repeat the surviving bits cyclically up to the target.
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDerivation {
    /// Required key length in bytes; `None` takes every whole byte available.
    pub target_bytes: Option<usize>,
    pub short_key_policy: ShortKeyPolicy,
    /// Keeps publicly compared bits in the key. This weakens the key: an
    /// observer of the classical channel learns those bits.
    pub reuse_sampled_bits: bool,
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self {
            target_bytes: Some(16),
            short_key_policy: ShortKeyPolicy::Abort,
            reuse_sampled_bits: false,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    bytes: Vec<u8>,
}

impl SessionKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex SHA-256 of the key, safe to display or log.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

pub fn pack_bits(bits: &[Bit]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | (bit & 1)))
        .collect()
}

/// Sifted bits that may become key material.
pub fn key_bits(sifted_bits: &[Bit], sampled_indices: &[usize], reuse_sampled: bool) -> Vec<Bit> {
    if reuse_sampled {
        return sifted_bits.to_vec();
    }
    let disclosed: BTreeSet<usize> = sampled_indices.iter().copied().collect();
    sifted_bits
        .iter()
        .enumerate()
        .filter(|(i, _)| !disclosed.contains(i))
        .map(|(_, &bit)| bit)
        .collect()
}

pub fn derive(
    sifted_bits: &[Bit],
    sampled_indices: &[usize],
    params: &KeyDerivation,
) -> Result<SessionKey, Bb84Error> {
    if params.reuse_sampled_bits {
        warn!("session key reuses publicly compared bits");
    }
    let mut bits = key_bits(sifted_bits, sampled_indices, params.reuse_sampled_bits);
    let available_bits = bits.len();

    let required_bits = match params.target_bytes {
        Some(target) => target * 8,
        None => (available_bits / 8).max(1) * 8,
    };

    if available_bits == 0 {
        return Err(Bb84Error::InsufficientKeyMaterial {
            available_bits,
            required_bits,
        });
    }

    if available_bits < required_bits {
        match params.short_key_policy {
            ShortKeyPolicy::Abort => {
                return Err(Bb84Error::InsufficientKeyMaterial {
                    available_bits,
                    required_bits,
                })
            }
            ShortKeyPolicy::Cycle => {
                debug!(
                    "cycling {} key bits to fill {} required",
                    available_bits, required_bits
                );
                bits = bits.iter().copied().cycle().take(required_bits).collect();
            }
        }
    }

    bits.truncate(required_bits);
    let key = SessionKey::from_bytes(pack_bits(&bits));
    bits.zeroize();
    Ok(key)
}
