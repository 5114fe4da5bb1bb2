//! Async counterparts of `bb84::wire::blocking`.
//!
//! Same frames, same exact-count reads: a peer that hangs up early yields
//! `TransportClosedPrematurely` with the number of bytes that did arrive.

use std::io::ErrorKind;

use bb84::wire::{check_advertised, check_sequence, decode_length, SampleDisclosure, INDEX_LEN, LENGTH_PREFIX_LEN};
use bb84::{Basis, Bb84Error, Bit};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub async fn read_exact_bytes<R>(reader: &mut R, count: usize) -> Result<Vec<u8>, Bb84Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; count];
    let mut received = 0;
    while received < count {
        match reader.read(&mut buf[received..]).await {
            Ok(0) => return Err(Bb84Error::TransportClosedPrematurely { expected: count, received }),
            Ok(read) => received += read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}

pub async fn read_length<R>(reader: &mut R) -> Result<usize, Bb84Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let bytes = read_exact_bytes(reader, LENGTH_PREFIX_LEN).await?;
    Ok(decode_length([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), Bb84Error>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_transmission<R>(reader: &mut R, max_bits: usize) -> Result<(Vec<Bit>, Vec<Basis>), Bb84Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let n = read_length(reader).await?;
    check_advertised(n, max_bits)?;
    let bits = read_exact_bytes(reader, n).await?;
    check_sequence("sender bits", &bits, n)?;
    let bases = read_exact_bytes(reader, n).await?;
    check_sequence("sender bases", &bases, n)?;
    Ok((bits, bases))
}

pub async fn read_bases<R>(reader: &mut R, n: usize) -> Result<Vec<Basis>, Bb84Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let bases = read_exact_bytes(reader, n).await?;
    check_sequence("receiver bases", &bases, n)?;
    Ok(bases)
}

pub async fn read_disclosure<R>(reader: &mut R, sifted_len: usize) -> Result<SampleDisclosure, Bb84Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let k = read_length(reader).await?;
    check_advertised(k, sifted_len)?;
    let index_bytes = read_exact_bytes(reader, k * INDEX_LEN).await?;
    let bit_bytes = read_exact_bytes(reader, k).await?;
    SampleDisclosure::decode(&index_bytes, &bit_bytes, sifted_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb84::wire::encode_transmission;
    use tokio::io::duplex;

    #[tokio::test]
    async fn exact_read_survives_one_byte_writes() {
        let (mut tx, mut rx) = duplex(1);
        let frame = encode_transmission(&[1, 0, 1], &[0, 0, 1]).unwrap();
        let writer = tokio::spawn(async move {
            for byte in frame {
                tx.write_all(&[byte]).await.unwrap();
            }
        });
        let (bits, bases) = read_transmission(&mut rx, 16).await.unwrap();
        writer.await.unwrap();
        assert_eq!(bits, vec![1, 0, 1]);
        assert_eq!(bases, vec![0, 0, 1]);
    }

    #[tokio::test]
    async fn early_hangup_reports_bytes_received() {
        let (mut tx, mut rx) = duplex(64);
        tx.write_all(&[0, 0, 0, 5, 1, 1]).await.unwrap();
        drop(tx);
        let err = read_transmission(&mut rx, 16).await.unwrap_err();
        assert_eq!(err, Bb84Error::TransportClosedPrematurely { expected: 5, received: 2 });
    }

    #[tokio::test]
    async fn oversized_advertisement_is_refused_before_reading() {
        let (mut tx, mut rx) = duplex(64);
        tx.write_all(&[0, 0, 1, 0]).await.unwrap();
        let err = read_transmission(&mut rx, 255).await.unwrap_err();
        assert_eq!(err, Bb84Error::FrameTooLarge { advertised: 256, limit: 255 });
    }

    #[tokio::test]
    async fn non_binary_basis_is_rejected() {
        let (mut tx, mut rx) = duplex(64);
        tx.write_all(&[0, 1, 2]).await.unwrap();
        let err = read_bases(&mut rx, 3).await.unwrap_err();
        assert!(matches!(err, Bb84Error::NonBinaryValue { index: 2, value: 2, .. }));
    }

    #[tokio::test]
    async fn disclosure_round_trips_through_the_stream() {
        let (mut tx, mut rx) = duplex(256);
        let disclosure = SampleDisclosure {
            indices: vec![0, 3, 7],
            receiver_bits: vec![1, 0, 1],
        };
        write_frame(&mut tx, &disclosure.encode().unwrap()).await.unwrap();
        assert_eq!(read_disclosure(&mut rx, 8).await.unwrap(), disclosure);
    }
}
