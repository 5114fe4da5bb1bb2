//! Key-exchange framing.
//!
//! ```text
//! sender   -> receiver : N (u32 BE) | N bit bytes | N basis bytes
//! receiver -> sender   : N basis bytes
//! receiver -> sender   : k (u32 BE) | k sifted indices (u32 BE) | k bit bytes
//! ```
//!
//! Every field is read with exact-count semantics: the peer closing before the
//! advertised count arrives is `TransportClosedPrematurely`, never a short read.
//! Encoding and validation are I/O free; [`blocking`] drives them over
//! `std::io` and the link crate drives them over tokio.

use crate::bb84_states::{ensure_binary, ensure_len, Basis, Bit};
use crate::error::Bb84Error;

pub const LENGTH_PREFIX_LEN: usize = 4;
pub const INDEX_LEN: usize = 4;

pub fn encode_length(n: usize) -> Result<[u8; LENGTH_PREFIX_LEN], Bb84Error> {
    let n = u32::try_from(n).map_err(|_| Bb84Error::FrameTooLarge {
        advertised: n,
        limit: u32::MAX as usize,
    })?;
    Ok(n.to_be_bytes())
}

pub fn decode_length(prefix: [u8; LENGTH_PREFIX_LEN]) -> usize {
    u32::from_be_bytes(prefix) as usize
}

pub fn check_advertised(advertised: usize, limit: usize) -> Result<(), Bb84Error> {
    if advertised > limit {
        return Err(Bb84Error::FrameTooLarge { advertised, limit });
    }
    Ok(())
}

/// Length prefix followed by the sender's bits and bases.
pub fn encode_transmission(bits: &[Bit], bases: &[Basis]) -> Result<Vec<u8>, Bb84Error> {
    ensure_len("sender bases", bits.len(), bases.len())?;
    ensure_binary("sender bits", bits)?;
    ensure_binary("sender bases", bases)?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + 2 * bits.len());
    frame.extend_from_slice(&encode_length(bits.len())?);
    frame.extend_from_slice(bits);
    frame.extend_from_slice(bases);
    Ok(frame)
}

/// Checks a received sequence against the advertised length and binary domain.
pub fn check_sequence(field: &'static str, bytes: &[u8], expected: usize) -> Result<(), Bb84Error> {
    ensure_len(field, expected, bytes.len())?;
    ensure_binary(field, bytes)
}

/// Sample the receiver discloses so the sender can compute the same error rate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleDisclosure {
    /// Ascending indices into the sifted sequence.
    pub indices: Vec<usize>,
    /// Receiver bits at those indices.
    pub receiver_bits: Vec<Bit>,
}

impl SampleDisclosure {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, Bb84Error> {
        ensure_len("disclosed bits", self.indices.len(), self.receiver_bits.len())?;
        let mut frame =
            Vec::with_capacity(LENGTH_PREFIX_LEN + self.len() * (INDEX_LEN + 1));
        frame.extend_from_slice(&encode_length(self.len())?);
        for &i in &self.indices {
            frame.extend_from_slice(&encode_length(i)?);
        }
        frame.extend_from_slice(&self.receiver_bits);
        Ok(frame)
    }

    /// Rebuilds a disclosure from its already-read index and bit sections.
    pub fn decode(index_bytes: &[u8], bit_bytes: &[u8], sifted_len: usize) -> Result<Self, Bb84Error> {
        if index_bytes.len() % INDEX_LEN != 0 {
            return Err(Bb84Error::SizeMismatch {
                field: "disclosed indices",
                expected: index_bytes.len() / INDEX_LEN * INDEX_LEN,
                actual: index_bytes.len(),
            });
        }
        let indices: Vec<usize> = index_bytes
            .chunks_exact(INDEX_LEN)
            .map(|chunk| decode_length([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        check_sequence("disclosed bits", bit_bytes, indices.len())?;

        if let Some(position) = indices.windows(2).position(|w| w[0] >= w[1]) {
            return Err(Bb84Error::UnorderedDisclosure {
                position: position + 1,
                index: indices[position + 1],
            });
        }
        if let Some(&beyond) = indices.iter().find(|&&i| i >= sifted_len) {
            return Err(Bb84Error::SizeMismatch {
                field: "disclosed index",
                expected: sifted_len,
                actual: beyond,
            });
        }
        Ok(Self {
            indices,
            receiver_bits: bit_bytes.to_vec(),
        })
    }
}

pub mod blocking {
    use std::io::{ErrorKind, Read, Write};

    use super::*;

    /// Accumulates reads until exactly `count` bytes have arrived.
    pub fn read_exact_bytes<R: Read + ?Sized>(reader: &mut R, count: usize) -> Result<Vec<u8>, Bb84Error> {
        let mut buf = vec![0u8; count];
        let mut received = 0;
        while received < count {
            match reader.read(&mut buf[received..]) {
                Ok(0) => {
                    return Err(Bb84Error::TransportClosedPrematurely {
                        expected: count,
                        received,
                    })
                }
                Ok(read) => received += read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(buf)
    }

    pub fn read_length<R: Read + ?Sized>(reader: &mut R) -> Result<usize, Bb84Error> {
        let bytes = read_exact_bytes(reader, LENGTH_PREFIX_LEN)?;
        Ok(decode_length([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_transmission<W: Write + ?Sized>(
        writer: &mut W,
        bits: &[Bit],
        bases: &[Basis],
    ) -> Result<(), Bb84Error> {
        writer.write_all(&encode_transmission(bits, bases)?)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_transmission<R: Read + ?Sized>(
        reader: &mut R,
        max_bits: usize,
    ) -> Result<(Vec<Bit>, Vec<Basis>), Bb84Error> {
        let n = read_length(reader)?;
        check_advertised(n, max_bits)?;
        let bits = read_exact_bytes(reader, n)?;
        check_sequence("sender bits", &bits, n)?;
        let bases = read_exact_bytes(reader, n)?;
        check_sequence("sender bases", &bases, n)?;
        Ok((bits, bases))
    }

    pub fn write_bases<W: Write + ?Sized>(writer: &mut W, bases: &[Basis]) -> Result<(), Bb84Error> {
        ensure_binary("receiver bases", bases)?;
        writer.write_all(bases)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_bases<R: Read + ?Sized>(reader: &mut R, n: usize) -> Result<Vec<Basis>, Bb84Error> {
        let bases = read_exact_bytes(reader, n)?;
        check_sequence("receiver bases", &bases, n)?;
        Ok(bases)
    }

    pub fn write_disclosure<W: Write + ?Sized>(
        writer: &mut W,
        disclosure: &SampleDisclosure,
    ) -> Result<(), Bb84Error> {
        writer.write_all(&disclosure.encode()?)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_disclosure<R: Read + ?Sized>(
        reader: &mut R,
        sifted_len: usize,
    ) -> Result<SampleDisclosure, Bb84Error> {
        let k = read_length(reader)?;
        check_advertised(k, sifted_len)?;
        let index_bytes = read_exact_bytes(reader, k * INDEX_LEN)?;
        let bit_bytes = read_exact_bytes(reader, k)?;
        SampleDisclosure::decode(&index_bytes, &bit_bytes, sifted_len)
    }
}
