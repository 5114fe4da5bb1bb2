//! Intercept-resend attack on the transmission channel.
//!
//! For every position the eavesdropper flips a biased coin with probability
//! `p`. On a hit she measures in her own random basis: a matching basis copies
//! the sender's bit, a wrong basis collapses it to a fresh random value that is
//! then relayed to the receiver.

use log::debug;
use rand::Rng;

use crate::bb84_states::{ensure_len, random_bases, random_bit, Basis, Bit};
use crate::error::Bb84Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interception {
    eve_bits: Vec<Bit>,
    eve_bases: Vec<Basis>,
    mask: Vec<bool>,
}

impl Interception {
    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    pub fn eve_bases(&self) -> &[Basis] {
        &self.eve_bases
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn is_intercepted(&self, i: usize) -> bool {
        self.mask.get(i).copied().unwrap_or(false)
    }

    /// The bit Eve relayed at `i`, or `None` when she left the position alone.
    pub fn relayed(&self, i: usize) -> Option<Bit> {
        if self.is_intercepted(i) {
            Some(self.eve_bits[i])
        } else {
            None
        }
    }

    pub fn intercepted_count(&self) -> usize {
        self.mask.iter().filter(|&&hit| hit).count()
    }
}

pub fn validate_probability(p: f64) -> Result<(), Bb84Error> {
    if !(0.0..=1.0).contains(&p) {
        return Err(Bb84Error::InvalidConfig(format!(
            "eavesdrop probability {} outside [0, 1]",
            p
        )));
    }
    Ok(())
}

pub fn intercept<R: Rng + ?Sized>(
    sender_bits: &[Bit],
    sender_bases: &[Basis],
    p: f64,
    rng: &mut R,
) -> Result<Interception, Bb84Error> {
    validate_probability(p)?;
    let n = sender_bits.len();
    ensure_len("sender bases", n, sender_bases.len())?;

    let eve_bases = random_bases(n, rng);
    let mask: Vec<bool> = (0..n).map(|_| rng.gen_bool(p)).collect();

    let mut eve_bits = vec![0; n];
    for i in 0..n {
        if !mask[i] {
            continue;
        }
        eve_bits[i] = if eve_bases[i] == sender_bases[i] {
            sender_bits[i]
        } else {
            random_bit(rng)
        };
    }

    let interception = Interception {
        eve_bits,
        eve_bases,
        mask,
    };
    debug!(
        "eavesdropper touched {} of {} positions (p = {})",
        interception.intercepted_count(),
        n,
        p
    );
    Ok(interception)
}
