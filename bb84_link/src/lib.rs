//! Tokio transport for `bb84` sessions: async framing, the key-exchange
//! handshake, and [`SecureLink`] for encrypted messaging once a key exists.

pub mod error;
pub mod framing;
pub mod handshake;
pub mod link;

use std::env;

use bb84::{ExchangeConfig, SecurityReport};

pub use crate::error::LinkError;
pub use crate::link::SecureLink;

pub const DEFAULT_ADDR: &str = "127.0.0.1:65432";

/// Largest single read from the socket once messaging starts.
pub const RECV_BUFFER_LEN: usize = 1024;

pub const EAVESDROP_ENV: &str = "BB84_EAVESDROP_PROBABILITY";

/// Either side sending this ends the session.
pub const QUIT: &str = "quit";

pub fn is_quit(message: &[u8]) -> bool {
    String::from_utf8_lossy(message).trim() == QUIT
}

/// Default config with the eavesdrop probability taken from the environment.
pub fn exchange_config_from_env() -> Result<ExchangeConfig, LinkError> {
    let config = match env::var(EAVESDROP_ENV) {
        Ok(value) => {
            let p = value.trim().parse::<f64>().map_err(|_| LinkError::Config {
                name: EAVESDROP_ENV,
                value: value.clone(),
            })?;
            ExchangeConfig::default().with_eavesdropper(p)
        }
        Err(_) => ExchangeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

pub fn format_report(report: &SecurityReport) -> String {
    let verdict = if report.eavesdropping_detected {
        "EAVESDROPPING DETECTED"
    } else {
        "secure"
    };
    let mut out = format!(
        "error rate {:.4} (threshold {:.2}, {} of {} sifted bits sampled): {}",
        report.error_rate, report.threshold, report.sample_size, report.sifted_len, verdict
    );
    if let Some(fingerprint) = &report.key_fingerprint {
        out.push_str(&format!("\nkey fingerprint {}", fingerprint));
    }
    out
}
