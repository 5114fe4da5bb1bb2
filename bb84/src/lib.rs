//! BB84 key exchange simulation.
//!
//! Bits and bases are plain `u8` values (0 or 1); there is no quantum-state
//! simulation beyond that pair. The pipeline runs strictly forward:
//!
//! ```text
//! generate → intercept → measure → sift → detect → derive → encrypt/decrypt
//! ```
//!
//! Every random draw goes through an injected `rand::Rng`, so a seeded source
//! (see [`bb84_states::seeded`]) replays a session exactly. All calls are
//! blocking; the `bb84_link` crate adapts them to tokio sockets.

pub mod bb84;
pub mod bb84_protocol;
pub mod bb84_states;
pub mod cipher;
pub mod config;
pub mod detection;
pub mod eavesdropper;
pub mod error;
pub mod exchange;
pub mod session;
pub mod session_key;
pub mod sifting;
pub mod transcript;
pub mod wire;


pub use crate::bb84_protocol::{run_exchange, run_trials, ExchangeReport, TrialSummary};
pub use crate::bb84_states::{Basis, Bit, Party, PartyRole};
pub use crate::cipher::{decrypt, encrypt, KeystreamCipher};
pub use crate::config::ExchangeConfig;
pub use crate::detection::{is_eavesdropping, Detection};
pub use crate::error::Bb84Error;
pub use crate::exchange::{ExchangeOutcome, ReceiverExchange, SenderExchange};
pub use crate::session::{SecurityReport, Session, SessionState};
pub use crate::session_key::{KeyDerivation, SessionKey, ShortKeyPolicy};
pub use crate::sifting::SiftedPair;
pub use crate::transcript::{Direction, Transcript};
