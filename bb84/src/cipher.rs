use std::sync::Arc;

use crate::error::Bb84Error;
use crate::session_key::SessionKey;

/// `ciphertext[i] = message[i] ^ key[i mod key.len()]`.
pub fn encrypt(message: &[u8], key: &[u8]) -> Result<Vec<u8>, Bb84Error> {
    if key.is_empty() {
        return Err(Bb84Error::CipherContractViolation("empty key"));
    }
    let out: Vec<u8> = message
        .iter()
        .zip(key.iter().cycle())
        .map(|(m, k)| m ^ k)
        .collect();
    if out.len() != message.len() {
        return Err(Bb84Error::CipherContractViolation("output length differs from input"));
    }
    Ok(out)
}

/// XOR is its own inverse.
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, Bb84Error> {
    encrypt(ciphertext, key)
}

/// Read-only cipher handle shared between the inbound loop and senders.
#[derive(Debug, Clone)]
pub struct KeystreamCipher {
    key: Arc<SessionKey>,
}

impl KeystreamCipher {
    pub fn new(key: Arc<SessionKey>) -> Result<Self, Bb84Error> {
        if key.is_empty() {
            return Err(Bb84Error::CipherContractViolation("empty key"));
        }
        Ok(Self { key })
    }

    pub fn encrypt(&self, message: &[u8]) -> Result<Vec<u8>, Bb84Error> {
        encrypt(message, self.key.as_bytes())
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Bb84Error> {
        decrypt(ciphertext, self.key.as_bytes())
    }

    pub fn fingerprint(&self) -> String {
        self.key.fingerprint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_prefix_encrypts_to_zeros() {
        let ciphertext = encrypt(b"AB", b"ABC").unwrap();
        assert_eq!(ciphertext, vec![0, 0]);
        assert_eq!(decrypt(&[0, 0], b"ABC").unwrap(), vec![65, 66]);
    }

    #[test]
    fn key_repeats_over_long_messages() {
        let ciphertext = encrypt(&[0u8; 7], &[1, 2, 3]).unwrap();
        assert_eq!(ciphertext, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn empty_key_is_a_contract_violation() {
        assert_eq!(
            encrypt(b"hello", &[]),
            Err(Bb84Error::CipherContractViolation("empty key"))
        );
        assert!(decrypt(b"hello", &[]).is_err());
        assert!(KeystreamCipher::new(Arc::new(SessionKey::from_bytes(vec![]))).is_err());
    }

    #[test]
    fn empty_message_stays_empty() {
        assert!(encrypt(&[], b"k").unwrap().is_empty());
    }

    #[test]
    fn shared_handle_round_trips() {
        let cipher = KeystreamCipher::new(Arc::new(SessionKey::from_bytes(vec![0x5a, 0xa5]))).unwrap();
        let other = cipher.clone();
        let sealed = cipher.encrypt(b"quantum").unwrap();
        assert_ne!(sealed, b"quantum");
        assert_eq!(other.decrypt(&sealed).unwrap(), b"quantum");
    }
}
