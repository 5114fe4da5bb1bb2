//! Per-connection session state machine.
//!
//! ```text
//! ┌──────┐ begin_exchange ┌────────────────────────┐  rate <= threshold  ┌────────────────┐
//! │ Idle │───────────────>│ KeyExchangeInProgress  │────────────────────>│ KeyEstablished │
//! └──────┘                └────────────────────────┘                     └────────────────┘
//!    ^    recoverable failure │        │ rate > threshold
//!    └────────────────────────┘        ↓
//!                               ┌─────────────┐ begin_exchange (fresh run)
//!                               │ Compromised │──────────────> KeyExchangeInProgress
//!                               └─────────────┘
//!
//!                     close() from any state ──> Closed
//! ```
//!
//! The session key is written once, on entering `KeyEstablished`, and shared
//! read-only afterwards through [`KeystreamCipher`].

use std::sync::Arc;

use log::{info, warn};
use rand::Rng;

use crate::cipher::KeystreamCipher;
use crate::config::ExchangeConfig;
use crate::error::Bb84Error;
use crate::exchange::ExchangeOutcome;
use crate::transcript::{Direction, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    KeyExchangeInProgress,
    KeyEstablished,
    Compromised,
    Closed,
}

/// What the front end shows about the last completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityReport {
    pub error_rate: f64,
    pub threshold: f64,
    pub sample_size: usize,
    pub sifted_len: usize,
    pub eavesdropping_detected: bool,
    pub key_fingerprint: Option<String>,
}

#[derive(Debug)]
pub struct Session {
    id: u64,
    state: SessionState,
    config: ExchangeConfig,
    cipher: Option<KeystreamCipher>,
    report: Option<SecurityReport>,
    transcript: Transcript,
}

impl Session {
    pub fn new(id: u64, config: ExchangeConfig) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            config,
            cipher: None,
            report: None,
            transcript: Transcript::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn report(&self) -> Option<&SecurityReport> {
        self.report.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn invalid(&self, operation: &'static str) -> Bb84Error {
        Bb84Error::InvalidState {
            state: self.state,
            operation,
        }
    }

    /// `Idle` or `Compromised` → `KeyExchangeInProgress`.
    pub fn begin_exchange(&mut self) -> Result<(), Bb84Error> {
        match self.state {
            SessionState::Idle | SessionState::Compromised => {
                self.state = SessionState::KeyExchangeInProgress;
                self.report = None;
                Ok(())
            }
            _ => Err(self.invalid("begin key exchange")),
        }
    }

    /// Records a finished exchange and moves to `KeyEstablished` or `Compromised`.
    ///
    /// A secure outcome that carries no usable key is applied as a failed
    /// exchange, so the session never stays in `KeyExchangeInProgress`.
    pub fn complete_exchange(&mut self, outcome: ExchangeOutcome) -> Result<SessionState, Bb84Error> {
        if self.state != SessionState::KeyExchangeInProgress {
            return Err(self.invalid("complete key exchange"));
        }
        let detected = outcome.eavesdropping_detected();
        let mut report = SecurityReport {
            error_rate: outcome.error_rate(),
            threshold: outcome.threshold,
            sample_size: outcome.detection.sample_size(),
            sifted_len: outcome.sifted_len,
            eavesdropping_detected: detected,
            key_fingerprint: None,
        };

        match (detected, outcome.key) {
            (false, Some(key)) => {
                let cipher = match KeystreamCipher::new(Arc::new(key)) {
                    Ok(cipher) => cipher,
                    Err(err) => {
                        self.fail_exchange(&err);
                        return Err(err);
                    }
                };
                report.key_fingerprint = Some(cipher.fingerprint());
                self.cipher = Some(cipher);
                self.state = SessionState::KeyEstablished;
                info!("session {}: key established (error rate {:.4})", self.id, report.error_rate);
            }
            (false, None) => {
                let err = Bb84Error::InsufficientKeyMaterial {
                    available_bits: 0,
                    required_bits: self.config.key.target_bytes.unwrap_or(1) * 8,
                };
                self.fail_exchange(&err);
                return Err(err);
            }
            (true, _) => {
                self.state = SessionState::Compromised;
                warn!(
                    "session {}: eavesdropping detected (error rate {:.4} > {:.4})",
                    self.id, report.error_rate, report.threshold
                );
            }
        }
        self.report = Some(report);
        Ok(self.state)
    }

    /// Returns to `Idle` after a recoverable failure, or closes on a fatal one.
    ///
    /// Applying the same failure twice is harmless: an `Idle` session stays
    /// `Idle` for a recoverable error and a closed one stays closed.
    pub fn fail_exchange(&mut self, err: &Bb84Error) -> SessionState {
        match self.state {
            SessionState::Closed => {}
            SessionState::Idle if err.is_recoverable() => {}
            SessionState::KeyExchangeInProgress if err.is_recoverable() => {
                warn!("session {}: exchange failed ({}), ready to retry", self.id, err);
                self.state = SessionState::Idle;
            }
            _ => {
                warn!("session {}: exchange aborted ({})", self.id, err);
                self.close();
            }
        }
        self.state
    }

    /// Runs the whole exchange in-process and applies its outcome.
    ///
    /// A bad config is refused up front and leaves the session untouched.
    pub fn run_local_exchange<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<SessionState, Bb84Error> {
        self.config.validate()?;
        self.begin_exchange()?;
        match crate::bb84_protocol::run_exchange(&self.config, rng) {
            Ok(report) => self.complete_exchange(report.into_receiver_outcome()),
            Err(err) => {
                self.fail_exchange(&err);
                Err(err)
            }
        }
    }

    /// The shared cipher; only available once the key is established.
    pub fn cipher(&self) -> Result<KeystreamCipher, Bb84Error> {
        match (self.state, &self.cipher) {
            (SessionState::KeyEstablished, Some(cipher)) => Ok(cipher.clone()),
            (SessionState::Compromised, _) => {
                let report = self.report.as_ref();
                Err(Bb84Error::EavesdroppingDetected {
                    error_rate: report.map_or(f64::NAN, |r| r.error_rate),
                    threshold: report.map_or(self.config.threshold, |r| r.threshold),
                })
            }
            _ => Err(self.invalid("use the session key")),
        }
    }

    pub fn encrypt_outgoing(&self, plaintext: &[u8]) -> Result<Vec<u8>, Bb84Error> {
        let ciphertext = self.cipher()?.encrypt(plaintext)?;
        self.transcript.record(Direction::Outbound, plaintext, &ciphertext);
        Ok(ciphertext)
    }

    pub fn decrypt_incoming(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Bb84Error> {
        let plaintext = self.cipher()?.decrypt(ciphertext)?;
        self.transcript.record(Direction::Inbound, &plaintext, ciphertext);
        Ok(plaintext)
    }

    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!("session {}: closed from {:?}", self.id, self.state);
        }
        self.state = SessionState::Closed;
        self.cipher = None;
    }
}
