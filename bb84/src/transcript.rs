use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub direction: Direction,
    pub plaintext: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl TranscriptEntry {
    pub fn ciphertext_hex(&self) -> String {
        hex::encode(&self.ciphertext)
    }

    pub fn plaintext_lossy(&self) -> String {
        String::from_utf8_lossy(&self.plaintext).into_owned()
    }
}

/// Message log shared by the inbound loop and the senders of one session.
/// Clones share the same log; one writer holds it at a time.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Arc<Mutex<Vec<TranscriptEntry>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TranscriptEntry>> {
        // A panicked writer leaves whole entries behind, so the log stays usable.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, direction: Direction, plaintext: &[u8], ciphertext: &[u8]) {
        self.lock().push(TranscriptEntry {
            direction,
            plaintext: plaintext.to_vec(),
            ciphertext: ciphertext.to_vec(),
        });
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn records_in_order_with_hex_ciphertext() {
        let transcript = Transcript::new();
        transcript.record(Direction::Outbound, b"hi", &[0xde, 0xad]);
        transcript.record(Direction::Inbound, b"yo", &[0x01]);
        let entries = transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].ciphertext_hex(), "dead");
        assert_eq!(entries[1].direction, Direction::Inbound);
        assert_eq!(entries[1].plaintext_lossy(), "yo");
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let transcript = Transcript::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = transcript.clone();
                thread::spawn(move || {
                    for i in 0..100u8 {
                        log.record(Direction::Outbound, &[t, i], &[i]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(transcript.len(), 800);
        transcript.clear();
        assert!(transcript.is_empty());
    }
}
