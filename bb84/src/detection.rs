//! Error-rate estimation over a public sample of the sifted bits.
//!
//! Sampled positions are disclosed on the classical channel, so every caller
//! that derives key material must drop them (see [`crate::session_key`]).

use log::debug;
use rand::seq::index;
use rand::Rng;

use crate::bb84_states::Bit;
use crate::error::Bb84Error;
use crate::sifting::SiftedPair;

pub const DEFAULT_SAMPLE_FRACTION: f64 = 0.5;
pub const DEFAULT_THRESHOLD: f64 = 0.10;

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub error_rate: f64,
    /// Indices into the sifted sequence, ascending.
    pub sampled_indices: Vec<usize>,
    pub errors: usize,
}

impl Detection {
    pub fn sample_size(&self) -> usize {
        self.sampled_indices.len()
    }

    pub fn is_eavesdropping(&self, threshold: f64) -> bool {
        is_eavesdropping(self.error_rate, threshold)
    }
}

pub fn is_eavesdropping(error_rate: f64, threshold: f64) -> bool {
    error_rate > threshold
}

pub fn validate_fraction(name: &str, value: f64) -> Result<(), Bb84Error> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Bb84Error::InvalidConfig(format!(
            "{} {} outside [0, 1]",
            name, value
        )));
    }
    Ok(())
}

/// floor(len * fraction), clamped to `len`.
pub fn sample_size(sifted_len: usize, sample_fraction: f64) -> usize {
    ((sifted_len as f64 * sample_fraction).floor() as usize).min(sifted_len)
}

/// Picks a sample without replacement and estimates the error rate from it.
pub fn detect<R: Rng + ?Sized>(
    sifted: &SiftedPair,
    sample_fraction: f64,
    rng: &mut R,
) -> Result<Detection, Bb84Error> {
    validate_fraction("sample fraction", sample_fraction)?;
    let k = sample_size(sifted.len(), sample_fraction);
    let mut indices = index::sample(rng, sifted.len(), k).into_vec();
    indices.sort_unstable();
    estimate(sifted, indices)
}

/// Error rate over a caller-chosen sample; 0 for an empty sample.
pub fn estimate(sifted: &SiftedPair, sampled_indices: Vec<usize>) -> Result<Detection, Bb84Error> {
    if let Some(&bad) = sampled_indices.iter().find(|&&i| i >= sifted.len()) {
        return Err(Bb84Error::SizeMismatch {
            field: "sampled index",
            expected: sifted.len(),
            actual: bad,
        });
    }

    let receiver_sample: Vec<_> = sampled_indices.iter().map(|&i| sifted.receiver[i]).collect();
    let detection = compare(&sifted.sender, sampled_indices, &receiver_sample);
    debug!(
        "sampled {} of {} sifted bits, {} errors, rate {:.4}",
        detection.sample_size(),
        sifted.len(),
        detection.errors,
        detection.error_rate
    );
    Ok(detection)
}

/// Compares the sender's sifted bits at `sampled_indices` with the bits the
/// receiver reported for the same positions.
///
/// `receiver_sample` holds one entry per index; an index past the end of
/// `sender_sifted` counts as an error.
pub fn compare(sender_sifted: &[Bit], sampled_indices: Vec<usize>, receiver_sample: &[Bit]) -> Detection {
    let errors = sampled_indices
        .iter()
        .zip(receiver_sample)
        .filter(|(&i, &bit)| sender_sifted.get(i) != Some(&bit))
        .count();
    let error_rate = if sampled_indices.is_empty() {
        0.0
    } else {
        errors as f64 / sampled_indices.len() as f64
    };

    Detection {
        error_rate,
        sampled_indices,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84_states::seeded;

    fn pair(sender: Vec<u8>, receiver: Vec<u8>) -> SiftedPair {
        SiftedPair {
            positions: (0..sender.len()).collect(),
            sender,
            receiver,
        }
    }

    #[test]
    fn threshold_is_strict() {
        assert!(is_eavesdropping(0.15, 0.10));
        assert!(!is_eavesdropping(0.05, 0.10));
        assert!(!is_eavesdropping(0.10, 0.10));
    }

    #[test]
    fn half_the_sifted_bits_are_sampled_by_default() {
        let sifted = pair(vec![0; 101], vec![0; 101]);
        let detection = detect(&sifted, DEFAULT_SAMPLE_FRACTION, &mut seeded(4)).unwrap();
        assert_eq!(detection.sample_size(), 50);
        assert!(detection.sampled_indices.windows(2).all(|w| w[0] < w[1]));
        assert!(detection.sampled_indices.iter().all(|&i| i < 101));
    }

    #[test]
    fn empty_sift_gives_zero_rate() {
        let detection = detect(&SiftedPair::default(), 0.5, &mut seeded(0)).unwrap();
        assert_eq!(detection.error_rate, 0.0);
        assert!(detection.sampled_indices.is_empty());
    }

    #[test]
    fn zero_sample_gives_zero_rate_even_with_errors() {
        let sifted = pair(vec![0, 0, 0], vec![1, 1, 1]);
        let detection = detect(&sifted, 0.0, &mut seeded(0)).unwrap();
        assert_eq!(detection.sample_size(), 0);
        assert_eq!(detection.error_rate, 0.0);

        // floor(1 * 0.5) == 0
        let single = pair(vec![0], vec![1]);
        assert_eq!(detect(&single, 0.5, &mut seeded(0)).unwrap().error_rate, 0.0);
    }

    #[test]
    fn full_sample_counts_every_mismatch() {
        let sifted = pair(vec![0, 1, 0, 1], vec![0, 0, 0, 0]);
        let detection = detect(&sifted, 1.0, &mut seeded(0)).unwrap();
        assert_eq!(detection.sampled_indices, vec![0, 1, 2, 3]);
        assert_eq!(detection.errors, 2);
        assert_eq!(detection.error_rate, 0.5);
    }

    #[test]
    fn estimate_rejects_out_of_range_indices() {
        let sifted = pair(vec![0, 1], vec![0, 1]);
        assert!(estimate(&sifted, vec![0, 2]).is_err());
    }

    #[test]
    fn compare_matches_estimate_for_disclosed_sample() {
        let sifted = pair(vec![0, 1, 1, 0, 1], vec![0, 0, 1, 1, 1]);
        let local = estimate(&sifted, vec![1, 2, 3]).unwrap();
        let remote = compare(&sifted.sender, vec![1, 2, 3], &[0, 1, 1]);
        assert_eq!(local, remote);
        assert!((remote.error_rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_fraction() {
        let sifted = pair(vec![0, 1], vec![0, 1]);
        assert!(matches!(
            detect(&sifted, 1.2, &mut seeded(0)),
            Err(Bb84Error::InvalidConfig(_))
        ));
    }
}
