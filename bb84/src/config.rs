use crate::detection::{validate_fraction, DEFAULT_SAMPLE_FRACTION, DEFAULT_THRESHOLD};
use crate::eavesdropper::validate_probability;
use crate::error::Bb84Error;
use crate::session_key::{KeyDerivation, ShortKeyPolicy};

/// Upper bound on the session length a peer may advertise.
pub const DEFAULT_MAX_NUM_BITS: usize = 1 << 20;

/// Parameters a front end supplies for one key exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeConfig {
    /// Session bit length `N`.
    pub num_bits: usize,
    /// Per-position interception probability `p`.
    pub eavesdrop_probability: f64,
    pub sample_fraction: f64,
    pub threshold: f64,
    pub key: KeyDerivation,
    /// Largest `N` accepted from the wire.
    pub max_num_bits: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            num_bits: 1000,
            eavesdrop_probability: 0.0,
            sample_fraction: DEFAULT_SAMPLE_FRACTION,
            threshold: DEFAULT_THRESHOLD,
            key: KeyDerivation::default(),
            max_num_bits: DEFAULT_MAX_NUM_BITS,
        }
    }
}

impl ExchangeConfig {
    pub fn with_num_bits(mut self, num_bits: usize) -> Self {
        self.num_bits = num_bits;
        self
    }

    pub fn with_eavesdropper(mut self, probability: f64) -> Self {
        self.eavesdrop_probability = probability;
        self
    }

    pub fn with_sample_fraction(mut self, fraction: f64) -> Self {
        self.sample_fraction = fraction;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_key_bytes(mut self, target_bytes: Option<usize>) -> Self {
        self.key.target_bytes = target_bytes;
        self
    }

    pub fn with_short_key_policy(mut self, policy: ShortKeyPolicy) -> Self {
        self.key.short_key_policy = policy;
        self
    }

    pub fn with_sampled_bit_reuse(mut self, reuse: bool) -> Self {
        self.key.reuse_sampled_bits = reuse;
        self
    }

    pub fn validate(&self) -> Result<(), Bb84Error> {
        validate_probability(self.eavesdrop_probability)?;
        validate_fraction("sample fraction", self.sample_fraction)?;
        validate_fraction("threshold", self.threshold)?;
        if self.key.target_bytes == Some(0) {
            return Err(Bb84Error::InvalidConfig(
                "key length must be at least one byte".to_string(),
            ));
        }
        if self.max_num_bits > u32::MAX as usize {
            return Err(Bb84Error::InvalidConfig(format!(
                "max_num_bits {} does not fit the 4-byte length prefix",
                self.max_num_bits
            )));
        }
        if self.num_bits > self.max_num_bits {
            return Err(Bb84Error::FrameTooLarge {
                advertised: self.num_bits,
                limit: self.max_num_bits,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ExchangeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_fraction, 0.5);
        assert_eq!(config.threshold, 0.10);
        assert_eq!(config.key.short_key_policy, ShortKeyPolicy::Abort);
        assert!(!config.key.reuse_sampled_bits);
    }

    #[test]
    fn builder_sets_fields() {
        let config = ExchangeConfig::default()
            .with_num_bits(64)
            .with_eavesdropper(0.7)
            .with_threshold(0.2)
            .with_key_bytes(None)
            .with_short_key_policy(ShortKeyPolicy::Cycle);
        assert_eq!(config.num_bits, 64);
        assert_eq!(config.eavesdrop_probability, 0.7);
        assert_eq!(config.threshold, 0.2);
        assert_eq!(config.key.target_bytes, None);
        assert_eq!(config.key.short_key_policy, ShortKeyPolicy::Cycle);
    }

    #[test]
    fn out_of_range_values_are_config_errors() {
        for config in [
            ExchangeConfig::default().with_eavesdropper(1.01),
            ExchangeConfig::default().with_sample_fraction(-0.5),
            ExchangeConfig::default().with_threshold(f64::NAN),
        ] {
            assert!(matches!(config.validate(), Err(Bb84Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn zero_byte_key_is_rejected() {
        let config = ExchangeConfig::default().with_key_bytes(Some(0));
        assert!(matches!(config.validate(), Err(Bb84Error::InvalidConfig(_))));
        assert!(ExchangeConfig::default().with_key_bytes(None).validate().is_ok());
    }

    #[test]
    fn oversized_session_is_rejected() {
        let config = ExchangeConfig::default().with_num_bits(DEFAULT_MAX_NUM_BITS + 1);
        assert!(matches!(config.validate(), Err(Bb84Error::FrameTooLarge { .. })));
    }
}
