//! In-process run of the whole exchange, plus repeated trials for studying
//! how the error rate responds to the eavesdropper.

use log::info;
use rand::Rng;

use crate::bb84::measure;
use crate::bb84_states::{generate, random_bases, Party, PartyRole};
use crate::config::ExchangeConfig;
use crate::detection::{detect, Detection};
use crate::eavesdropper::{intercept, Interception};
use crate::error::Bb84Error;
use crate::exchange::ExchangeOutcome;
use crate::session_key::{derive, SessionKey};
use crate::sifting::{sift, SiftedPair};

/// Everything one pass through the channel produced, before any key work.
#[derive(Debug, Clone)]
pub struct ChannelRun {
    pub sender: Party,
    pub receiver: Party,
    pub interception: Option<Interception>,
    pub sifted: SiftedPair,
    pub detection: Detection,
}

/// Generator → interceptor → measurement → sifting → detection.
///
/// An empty sift is not an error here; the detection simply reports rate 0.
pub fn simulate_channel<R: Rng + ?Sized>(config: &ExchangeConfig, rng: &mut R) -> Result<ChannelRun, Bb84Error> {
    config.validate()?;
    let n = config.num_bits;

    let sender = generate(PartyRole::Sender, n, rng);
    let interception = if config.eavesdrop_probability > 0.0 {
        Some(intercept(&sender.bits, &sender.bases, config.eavesdrop_probability, rng)?)
    } else {
        None
    };
    let receiver_bases = random_bases(n, rng);
    let receiver_bits = measure(
        &sender.bits,
        &sender.bases,
        &receiver_bases,
        interception.as_ref(),
        rng,
    )?;
    let sifted = sift(&sender.bases, &receiver_bases, &sender.bits, &receiver_bits)?;
    let detection = detect(&sifted, config.sample_fraction, rng)?;

    Ok(ChannelRun {
        sender,
        receiver: Party {
            role: PartyRole::Receiver,
            bits: receiver_bits,
            bases: receiver_bases,
        },
        interception,
        sifted,
        detection,
    })
}

#[derive(Debug, Clone)]
pub struct ExchangeReport {
    pub run: ChannelRun,
    pub threshold: f64,
    pub num_bits: usize,
    pub sender_key: Option<SessionKey>,
    pub receiver_key: Option<SessionKey>,
}

impl ExchangeReport {
    pub fn error_rate(&self) -> f64 {
        self.run.detection.error_rate
    }

    pub fn eavesdropping_detected(&self) -> bool {
        self.run.detection.is_eavesdropping(self.threshold)
    }

    /// The receiver's view, as a session on that side would record it.
    pub fn into_receiver_outcome(self) -> ExchangeOutcome {
        ExchangeOutcome {
            role: PartyRole::Receiver,
            num_bits: self.num_bits,
            sifted_len: self.run.sifted.len(),
            detection: self.run.detection,
            threshold: self.threshold,
            key: self.receiver_key,
        }
    }
}

/// Full exchange with both parties in one process.
///
/// Keys are derived only when the error rate passes the threshold.
pub fn run_exchange<R: Rng + ?Sized>(config: &ExchangeConfig, rng: &mut R) -> Result<ExchangeReport, Bb84Error> {
    let run = simulate_channel(config, rng)?;
    run.sifted.require_non_empty()?;

    let (sender_key, receiver_key) = if run.detection.is_eavesdropping(config.threshold) {
        (None, None)
    } else {
        let sampled = &run.detection.sampled_indices;
        (
            Some(derive(&run.sifted.sender, sampled, &config.key)?),
            Some(derive(&run.sifted.receiver, sampled, &config.key)?),
        )
    };

    info!(
        "exchange: n = {}, sifted = {}, sampled = {}, error rate = {:.4}",
        config.num_bits,
        run.sifted.len(),
        run.detection.sample_size(),
        run.detection.error_rate
    );
    Ok(ExchangeReport {
        run,
        threshold: config.threshold,
        num_bits: config.num_bits,
        sender_key,
        receiver_key,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialSummary {
    pub eavesdrop_probability: f64,
    pub threshold: f64,
    pub error_rates: Vec<f64>,
}

impl TrialSummary {
    pub fn trials(&self) -> usize {
        self.error_rates.len()
    }

    pub fn mean_error_rate(&self) -> f64 {
        if self.error_rates.is_empty() {
            return 0.0;
        }
        self.error_rates.iter().sum::<f64>() / self.error_rates.len() as f64
    }

    pub fn detections(&self) -> usize {
        self.error_rates
            .iter()
            .filter(|&&rate| rate > self.threshold)
            .count()
    }
}

/// Repeats the channel `trials` times with fresh randomness each time.
pub fn run_trials<R: Rng + ?Sized>(config: &ExchangeConfig, trials: usize, rng: &mut R) -> Result<TrialSummary, Bb84Error> {
    let error_rates = (0..trials)
        .map(|_| simulate_channel(config, rng).map(|run| run.detection.error_rate))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TrialSummary {
        eavesdrop_probability: config.eavesdrop_probability,
        threshold: config.threshold,
        error_rates,
    })
}

/// `run_trials` for each eavesdrop probability in turn.
pub fn sweep<R: Rng + ?Sized>(
    config: &ExchangeConfig,
    probabilities: &[f64],
    trials: usize,
    rng: &mut R,
) -> Result<Vec<TrialSummary>, Bb84Error> {
    probabilities
        .iter()
        .map(|&p| run_trials(&config.clone().with_eavesdropper(p), trials, rng))
        .collect()
}
