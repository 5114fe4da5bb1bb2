use crate::bb84_states::{ensure_len, Basis, Bit};
use crate::error::Bb84Error;

/// Sender and receiver bits restricted to positions where the bases agreed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiftedPair {
    /// Original transmission indices that survived, ascending.
    pub positions: Vec<usize>,
    pub sender: Vec<Bit>,
    pub receiver: Vec<Bit>,
}

impl SiftedPair {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Fails with `DegenerateSift` when nothing survived.
    pub fn require_non_empty(&self) -> Result<&Self, Bb84Error> {
        if self.is_empty() {
            return Err(Bb84Error::DegenerateSift);
        }
        Ok(self)
    }

    pub fn mismatches(&self) -> usize {
        self.sender
            .iter()
            .zip(&self.receiver)
            .filter(|(a, b)| a != b)
            .count()
    }
}

/// Positions where both parties chose the same basis, ascending.
pub fn matching_positions(sender_bases: &[Basis], receiver_bases: &[Basis]) -> Vec<usize> {
    sender_bases
        .iter()
        .zip(receiver_bases)
        .enumerate()
        .filter(|(_, (a, b))| a == b)
        .map(|(i, _)| i)
        .collect()
}

/// Projects one party's bits onto the matching positions.
pub fn project(bits: &[Bit], positions: &[usize]) -> Vec<Bit> {
    positions.iter().map(|&i| bits[i]).collect()
}

pub fn sift(
    sender_bases: &[Basis],
    receiver_bases: &[Basis],
    sender_bits: &[Bit],
    receiver_bits: &[Bit],
) -> Result<SiftedPair, Bb84Error> {
    let n = sender_bases.len();
    ensure_len("receiver bases", n, receiver_bases.len())?;
    ensure_len("sender bits", n, sender_bits.len())?;
    ensure_len("receiver bits", n, receiver_bits.len())?;

    let positions = matching_positions(sender_bases, receiver_bases);
    Ok(SiftedPair {
        sender: project(sender_bits, &positions),
        receiver: project(receiver_bits, &positions),
        positions,
    })
}
