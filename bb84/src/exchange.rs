//! Per-role key-exchange state across the wire steps.
//!
//! ```text
//! SenderExchange                         ReceiverExchange
//!   new ── transmission ───────────────>   measure
//!   accept_bases <───────────── bases ──   (sift)
//!   finish <────────────── disclosure ──   disclose
//!                                          finish
//! ```
//!
//! Both sides sift on the same bases and compare the same sample, so they
//! reach the same verdict and drop the same bits from their keys. Neither
//! type performs I/O; [`blocking`] runs them over a `Read + Write` stream.

use log::{debug, info, warn};
use rand::Rng;

use crate::bb84::measure;
use crate::bb84_states::{ensure_len, generate, random_bases, Basis, Bit, Party, PartyRole};
use crate::config::ExchangeConfig;
use crate::detection::{compare, detect, Detection};
use crate::eavesdropper::{intercept, Interception};
use crate::error::Bb84Error;
use crate::session::SessionState;
use crate::session_key::{derive, SessionKey};
use crate::sifting::{matching_positions, project, sift, SiftedPair};
use crate::wire::{check_sequence, encode_transmission, SampleDisclosure};

/// One party's result of a completed exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub role: PartyRole,
    pub num_bits: usize,
    pub sifted_len: usize,
    pub detection: Detection,
    pub threshold: f64,
    /// Present only when the error rate passed the threshold.
    pub key: Option<SessionKey>,
}

impl ExchangeOutcome {
    pub fn error_rate(&self) -> f64 {
        self.detection.error_rate
    }

    pub fn eavesdropping_detected(&self) -> bool {
        self.detection.is_eavesdropping(self.threshold)
    }
}

/// Applies the threshold and, when it passes, derives this party's key.
fn conclude(
    role: PartyRole,
    config: &ExchangeConfig,
    own_sifted: &[Bit],
    detection: Detection,
) -> Result<ExchangeOutcome, Bb84Error> {
    let key = if detection.is_eavesdropping(config.threshold) {
        warn!(
            "{:?}: error rate {:.4} above threshold {:.4}, no key derived",
            role, detection.error_rate, config.threshold
        );
        None
    } else {
        let key = derive(own_sifted, &detection.sampled_indices, &config.key)?;
        info!(
            "{:?}: key established, {} bytes, fingerprint {}",
            role,
            key.len(),
            key.fingerprint()
        );
        Some(key)
    };
    Ok(ExchangeOutcome {
        role,
        num_bits: config.num_bits,
        sifted_len: own_sifted.len(),
        detection,
        threshold: config.threshold,
        key,
    })
}

#[derive(Debug)]
pub struct SenderExchange {
    config: ExchangeConfig,
    party: Party,
    sifted: Option<Vec<Bit>>,
}

impl SenderExchange {
    pub fn new<R: Rng + ?Sized>(config: ExchangeConfig, rng: &mut R) -> Result<Self, Bb84Error> {
        config.validate()?;
        let party = generate(PartyRole::Sender, config.num_bits, rng);
        Ok(Self {
            config,
            party,
            sifted: None,
        })
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn transmission(&self) -> Result<Vec<u8>, Bb84Error> {
        encode_transmission(&self.party.bits, &self.party.bases)
    }

    /// Sifts against the receiver's bases; returns the sifted length.
    pub fn accept_bases(&mut self, receiver_bases: &[Basis]) -> Result<usize, Bb84Error> {
        check_sequence("receiver bases", receiver_bases, self.party.len())?;
        let positions = matching_positions(&self.party.bases, receiver_bases);
        if positions.is_empty() {
            return Err(Bb84Error::DegenerateSift);
        }
        let sifted = project(&self.party.bits, &positions);
        debug!("sender sifted {} of {} bits", sifted.len(), self.party.len());
        let len = sifted.len();
        self.sifted = Some(sifted);
        Ok(len)
    }

    pub fn finish(self, disclosure: SampleDisclosure) -> Result<ExchangeOutcome, Bb84Error> {
        let sifted = self.sifted.ok_or(Bb84Error::InvalidState {
            state: SessionState::KeyExchangeInProgress,
            operation: "finish before receiving bases",
        })?;
        ensure_len("disclosed bits", disclosure.len(), disclosure.receiver_bits.len())?;
        let detection = compare(&sifted, disclosure.indices, &disclosure.receiver_bits);
        conclude(PartyRole::Sender, &self.config, &sifted, detection)
    }
}

#[derive(Debug)]
pub struct ReceiverExchange {
    config: ExchangeConfig,
    party: Party,
    interception: Option<Interception>,
    sifted: SiftedPair,
    detection: Option<Detection>,
}

impl ReceiverExchange {
    /// Runs the channel (with the configured eavesdropper) and measures.
    pub fn measure<R: Rng + ?Sized>(
        config: ExchangeConfig,
        sender_bits: &[Bit],
        sender_bases: &[Basis],
        rng: &mut R,
    ) -> Result<Self, Bb84Error> {
        config.validate()?;
        let n = sender_bits.len();
        check_sequence("sender bits", sender_bits, n)?;
        check_sequence("sender bases", sender_bases, n)?;

        let interception = if config.eavesdrop_probability > 0.0 {
            Some(intercept(sender_bits, sender_bases, config.eavesdrop_probability, rng)?)
        } else {
            None
        };
        let bases = random_bases(n, rng);
        let bits = measure(sender_bits, sender_bases, &bases, interception.as_ref(), rng)?;
        let sifted = sift(sender_bases, &bases, sender_bits, &bits)?;
        debug!("receiver sifted {} of {} bits", sifted.len(), n);

        let mut config = config;
        config.num_bits = n;
        Ok(Self {
            config,
            party: Party {
                role: PartyRole::Receiver,
                bits,
                bases,
            },
            interception,
            sifted,
            detection: None,
        })
    }

    pub fn bases(&self) -> &[Basis] {
        &self.party.bases
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn interception(&self) -> Option<&Interception> {
        self.interception.as_ref()
    }

    pub fn sifted(&self) -> &SiftedPair {
        &self.sifted
    }

    /// Picks the public sample. Fails with `DegenerateSift` on an empty sift.
    pub fn disclose<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<SampleDisclosure, Bb84Error> {
        self.sifted.require_non_empty()?;
        let detection = detect(&self.sifted, self.config.sample_fraction, rng)?;
        let disclosure = SampleDisclosure {
            receiver_bits: detection
                .sampled_indices
                .iter()
                .map(|&i| self.sifted.receiver[i])
                .collect(),
            indices: detection.sampled_indices.clone(),
        };
        self.detection = Some(detection);
        Ok(disclosure)
    }

    pub fn finish(self) -> Result<ExchangeOutcome, Bb84Error> {
        let detection = self.detection.ok_or(Bb84Error::InvalidState {
            state: SessionState::KeyExchangeInProgress,
            operation: "finish before disclosing a sample",
        })?;
        conclude(PartyRole::Receiver, &self.config, &self.sifted.receiver, detection)
    }
}

pub mod blocking {
    use std::io::{Read, Write};

    use super::*;
    use crate::wire::blocking::{
        read_bases, read_disclosure, read_transmission, write_bases, write_disclosure, write_transmission,
    };

    pub fn run_sender<S, R>(stream: &mut S, config: ExchangeConfig, rng: &mut R) -> Result<ExchangeOutcome, Bb84Error>
    where
        S: Read + Write + ?Sized,
        R: Rng + ?Sized,
    {
        let mut exchange = SenderExchange::new(config, rng)?;
        write_transmission(stream, &exchange.party().bits, &exchange.party().bases)?;
        let bases = read_bases(stream, exchange.party().len())?;
        let sifted_len = exchange.accept_bases(&bases)?;
        let disclosure = read_disclosure(stream, sifted_len)?;
        exchange.finish(disclosure)
    }

    pub fn run_receiver<S, R>(stream: &mut S, config: ExchangeConfig, rng: &mut R) -> Result<ExchangeOutcome, Bb84Error>
    where
        S: Read + Write + ?Sized,
        R: Rng + ?Sized,
    {
        let (bits, bases) = read_transmission(stream, config.max_num_bits)?;
        let mut exchange = ReceiverExchange::measure(config, &bits, &bases, rng)?;
        write_bases(stream, exchange.bases())?;
        let disclosure = exchange.disclose(rng)?;
        write_disclosure(stream, &disclosure)?;
        exchange.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84_states::seeded;

    fn run_in_memory(config: &ExchangeConfig, seed: u64) -> Result<(ExchangeOutcome, ExchangeOutcome), Bb84Error> {
        let mut alice_rng = seeded(seed);
        let mut bob_rng = seeded(seed.wrapping_add(1));
        let mut alice = SenderExchange::new(config.clone(), &mut alice_rng)?;
        let party = alice.party().clone();
        let mut bob = ReceiverExchange::measure(config.clone(), &party.bits, &party.bases, &mut bob_rng)?;
        alice.accept_bases(bob.bases())?;
        let disclosure = bob.disclose(&mut bob_rng)?;
        Ok((alice.finish(disclosure)?, bob.finish()?))
    }

    #[test]
    fn quiet_channel_gives_both_sides_the_same_key() {
        let config = ExchangeConfig::default();
        let (alice, bob) = run_in_memory(&config, 100).unwrap();
        assert_eq!(alice.error_rate(), 0.0);
        assert_eq!(bob.error_rate(), 0.0);
        assert_eq!(alice.detection.sampled_indices, bob.detection.sampled_indices);
        let (a, b) = (alice.key.unwrap(), bob.key.unwrap());
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn full_interception_is_detected_on_both_sides() {
        let config = ExchangeConfig::default().with_eavesdropper(1.0);
        let (alice, bob) = run_in_memory(&config, 200).unwrap();
        assert_eq!(alice.error_rate(), bob.error_rate());
        assert!(alice.eavesdropping_detected());
        assert!(bob.eavesdropping_detected());
        assert!(alice.key.is_none() && bob.key.is_none());
    }

    #[test]
    fn eavesdropper_runs_only_when_configured() {
        let alice = SenderExchange::new(ExchangeConfig::default().with_num_bits(64), &mut seeded(7)).unwrap();
        let party = alice.party();

        let quiet = ReceiverExchange::measure(ExchangeConfig::default(), &party.bits, &party.bases, &mut seeded(8)).unwrap();
        assert!(quiet.interception().is_none());

        let tapped_config = ExchangeConfig::default().with_eavesdropper(1.0);
        let tapped = ReceiverExchange::measure(tapped_config, &party.bits, &party.bases, &mut seeded(8)).unwrap();
        let eve = tapped.interception().unwrap();
        assert_eq!(eve.len(), 64);
        assert_eq!(eve.intercepted_count(), 64);
    }

    #[test]
    fn sender_rejects_wrong_length_bases() {
        let mut alice = SenderExchange::new(ExchangeConfig::default().with_num_bits(8), &mut seeded(1)).unwrap();
        let err = alice.accept_bases(&[0, 1, 0]).unwrap_err();
        assert!(matches!(err, Bb84Error::SizeMismatch { expected: 8, actual: 3, .. }));
    }

    #[test]
    fn opposite_bases_are_degenerate_on_both_sides() {
        let mut alice = SenderExchange::new(ExchangeConfig::default().with_num_bits(16), &mut seeded(2)).unwrap();
        let flipped: Vec<u8> = alice.party().bases.iter().map(|b| 1 - b).collect();
        assert_eq!(alice.accept_bases(&flipped), Err(Bb84Error::DegenerateSift));

        let mut bob = ReceiverExchange::measure(ExchangeConfig::default(), &[], &[], &mut seeded(3)).unwrap();
        assert_eq!(bob.disclose(&mut seeded(4)), Err(Bb84Error::DegenerateSift));
    }

    #[test]
    fn finishing_out_of_order_is_an_error() {
        let alice = SenderExchange::new(ExchangeConfig::default(), &mut seeded(5)).unwrap();
        assert!(matches!(
            alice.finish(SampleDisclosure::default()),
            Err(Bb84Error::InvalidState { .. })
        ));
    }

    #[test]
    fn short_material_aborts_under_default_policy() {
        let config = ExchangeConfig::default().with_num_bits(40).with_key_bytes(Some(32));
        let err = run_in_memory(&config, 6).unwrap_err();
        assert!(matches!(err, Bb84Error::InsufficientKeyMaterial { .. }));
        assert!(err.is_recoverable());
    }
}
