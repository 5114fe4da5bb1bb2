use rand::Rng;

use crate::bb84_states::{ensure_len, random_bit, Basis, Bit};
use crate::eavesdropper::Interception;
use crate::error::Bb84Error;

/// Measures one incoming bit.
///
/// A basis matching the sender's reproduces the incoming value; a mismatch
/// yields a fresh random outcome independent of what was sent.
pub fn measure_bit<R: Rng + ?Sized>(
    incoming: Bit,
    sender_basis: Basis,
    receiver_basis: Basis,
    rng: &mut R,
) -> Bit {
    if receiver_basis == sender_basis {
        incoming
    } else {
        random_bit(rng)
    }
}

/// The receiver's measurement of a whole transmission.
///
/// Positions touched by the eavesdropper carry her relayed bit instead of the
/// sender's.
pub fn measure<R: Rng + ?Sized>(
    sender_bits: &[Bit],
    sender_bases: &[Basis],
    receiver_bases: &[Basis],
    interception: Option<&Interception>,
    rng: &mut R,
) -> Result<Vec<Bit>, Bb84Error> {
    let n = sender_bits.len();
    ensure_len("sender bases", n, sender_bases.len())?;
    ensure_len("receiver bases", n, receiver_bases.len())?;
    if let Some(eve) = interception {
        ensure_len("interception mask", n, eve.len())?;
    }

    let receiver_bits = (0..n)
        .map(|i| {
            let incoming = interception
                .and_then(|eve| eve.relayed(i))
                .unwrap_or(sender_bits[i]);
            measure_bit(incoming, sender_bases[i], receiver_bases[i], rng)
        })
        .collect();
    Ok(receiver_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84_states::{generate, random_bases, seeded, PartyRole};
    use crate::eavesdropper::intercept;

    #[test]
    fn matching_bases_reproduce_sender_bits_without_eve() {
        let mut rng = seeded(21);
        let alice = generate(PartyRole::Sender, 1000, &mut rng);
        let bob_bases = random_bases(1000, &mut rng);
        let bob_bits = measure(&alice.bits, &alice.bases, &bob_bases, None, &mut rng).unwrap();
        for i in 0..1000 {
            if bob_bases[i] == alice.bases[i] {
                assert_eq!(bob_bits[i], alice.bits[i]);
            }
        }
    }

    #[test]
    fn intercepted_positions_carry_relayed_bit() {
        let mut rng = seeded(22);
        let alice = generate(PartyRole::Sender, 1000, &mut rng);
        let eve = intercept(&alice.bits, &alice.bases, 1.0, &mut rng).unwrap();
        let bob_bases = alice.bases.clone();
        let bob_bits =
            measure(&alice.bits, &alice.bases, &bob_bases, Some(&eve), &mut rng).unwrap();
        for i in 0..1000 {
            assert_eq!(Some(bob_bits[i]), eve.relayed(i));
        }
    }

    #[test]
    fn mismatched_bases_are_uncorrelated() {
        let mut rng = seeded(23);
        let n = 20_000;
        let alice = generate(PartyRole::Sender, n, &mut rng);
        let bob_bases: Vec<Basis> = alice.bases.iter().map(|b| 1 - b).collect();
        let bob_bits = measure(&alice.bits, &alice.bases, &bob_bases, None, &mut rng).unwrap();
        let agree = (0..n).filter(|&i| bob_bits[i] == alice.bits[i]).count();
        let ratio = agree as f64 / n as f64;
        assert!((ratio - 0.5).abs() < 0.02, "ratio {}", ratio);
    }

    #[test]
    fn receiver_length_must_match() {
        let err = measure(&[0, 1], &[0, 1], &[0], None, &mut seeded(0)).unwrap_err();
        assert!(matches!(
            err,
            Bb84Error::SizeMismatch {
                field: "receiver bases",
                ..
            }
        ));
    }

    #[test]
    fn empty_transmission_measures_nothing() {
        let bits = measure(&[], &[], &[], None, &mut seeded(0)).unwrap();
        assert!(bits.is_empty());
    }
}
