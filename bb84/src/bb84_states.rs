use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::Bb84Error;

/// One bit value, always 0 or 1.
pub type Bit = u8;

/// One measurement setting, always 0 or 1.
pub type Basis = u8;

/// Seedable random source used for reproducible sessions.
pub type SeededSource = ChaCha8Rng;

/// Deterministic source for tests and replayable simulations.
pub fn seeded(seed: u64) -> SeededSource {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Source seeded from OS entropy for live sessions.
pub fn from_entropy() -> SeededSource {
    ChaCha8Rng::from_entropy()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PartyRole {
    Sender,
    Receiver,
    Eavesdropper,
}

/// A party's bit and basis sequences for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub role: PartyRole,
    pub bits: Vec<Bit>,
    pub bases: Vec<Basis>,
}

impl Party {
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

pub fn random_bit<R: Rng + ?Sized>(rng: &mut R) -> Bit {
    Bit::from(rng.gen::<bool>())
}

pub fn random_bits<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<Bit> {
    (0..n).map(|_| random_bit(rng)).collect()
}

pub fn random_bases<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<Basis> {
    random_bits(n, rng)
}

/// Draws `n` bits followed by `n` bases, each uniform over {0, 1}.
pub fn generate<R: Rng + ?Sized>(role: PartyRole, n: usize, rng: &mut R) -> Party {
    let bits = random_bits(n, rng);
    let bases = random_bases(n, rng);
    Party { role, bits, bases }
}

/// Rejects any value outside {0, 1}.
pub fn ensure_binary(field: &'static str, values: &[u8]) -> Result<(), Bb84Error> {
    match values.iter().position(|&v| v > 1) {
        Some(index) => Err(Bb84Error::NonBinaryValue {
            field,
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}

pub(crate) fn ensure_len(field: &'static str, expected: usize, actual: usize) -> Result<(), Bb84Error> {
    if expected != actual {
        return Err(Bb84Error::SizeMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}
