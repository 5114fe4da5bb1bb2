//! An established session over TCP.
//!
//! After the exchange the stream is split: a spawned inbound loop reads
//! whatever bytes are available (up to [`RECV_BUFFER_LEN`]), decrypts them and
//! queues them for [`SecureLink::recv`], while [`SecureLink::send`] may be
//! called from any number of tasks. Closing aborts the loop, which drops the
//! read half and wakes anyone waiting in `recv`.

use std::sync::Arc;

use bb84::bb84_states::from_entropy;
use bb84::transcript::TranscriptEntry;
use bb84::{Direction, ExchangeConfig, KeystreamCipher, PartyRole, SecurityReport, Session, SessionState, Transcript};
use log::{debug, info, warn};
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::LinkError;
use crate::handshake;
use crate::{is_quit, RECV_BUFFER_LEN};

const INBOUND_QUEUE: usize = 64;

pub struct SecureLink {
    id: u64,
    session: Arc<Mutex<Session>>,
    transcript: Transcript,
    writer: Mutex<OwnedWriteHalf>,
    inbound: Mutex<mpsc::Receiver<TranscriptEntry>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl SecureLink {
    /// Sender side of an accepted connection.
    pub async fn accept(stream: TcpStream, id: u64, config: ExchangeConfig) -> Result<Self, LinkError> {
        Self::establish(stream, Session::new(id, config), PartyRole::Sender, &mut from_entropy()).await
    }

    /// Receiver side; the configured eavesdropper sits on this end of the channel.
    pub async fn connect<A: ToSocketAddrs>(addr: A, id: u64, config: ExchangeConfig) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(addr).await?;
        Self::establish(stream, Session::new(id, config), PartyRole::Receiver, &mut from_entropy()).await
    }

    /// Runs the key exchange on `stream` and starts the inbound loop if a key
    /// was established. A compromised session is returned too, with sending
    /// disabled, so the caller can inspect its report.
    pub async fn establish<R: Rng + ?Sized>(
        mut stream: TcpStream,
        mut session: Session,
        role: PartyRole,
        rng: &mut R,
    ) -> Result<Self, LinkError> {
        stream.set_nodelay(true)?;
        let state = handshake::establish(&mut session, role, &mut stream, rng).await?;
        info!("session {}: exchange finished in state {:?}", session.id(), state);
        Ok(Self::start(stream, session))
    }

    fn start(stream: TcpStream, session: Session) -> Self {
        let id = session.id();
        let transcript = session.transcript().clone();
        let cipher = session.cipher().ok();
        let (read_half, write_half) = stream.into_split();
        let session = Arc::new(Mutex::new(session));
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE);

        let reader_task = match cipher {
            Some(cipher) => Some(tokio::spawn(inbound_loop(
                read_half,
                cipher,
                transcript.clone(),
                Arc::clone(&session),
                tx,
            ))),
            None => None,
        };

        Self {
            id,
            session,
            transcript,
            writer: Mutex::new(write_half),
            inbound: Mutex::new(rx),
            reader_task: Mutex::new(reader_task),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    pub async fn report(&self) -> Option<SecurityReport> {
        self.session.lock().await.report().cloned()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Encrypts and writes one message; returns the ciphertext that went out.
    ///
    /// Fails with `EavesdroppingDetected` on a compromised session and with
    /// `InvalidState` once closed.
    pub async fn send(&self, plaintext: &[u8]) -> Result<Vec<u8>, LinkError> {
        let ciphertext = self.session.lock().await.encrypt_outgoing(plaintext)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&ciphertext).await?;
        writer.flush().await?;
        debug!("session {}: sent {} bytes", self.id, ciphertext.len());
        Ok(ciphertext)
    }

    /// Next decrypted message, or `None` once the inbound side is finished.
    pub async fn recv(&self) -> Option<TranscriptEntry> {
        self.inbound.lock().await.recv().await
    }

    /// Stops the inbound loop, shuts the write half and marks the session closed.
    pub async fn close(&self) -> Result<(), LinkError> {
        if let Some(task) = self.reader_task.lock().await.take() {
            task.abort();
        }
        self.session.lock().await.close();
        match self.writer.lock().await.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn inbound_loop(
    mut reader: OwnedReadHalf,
    cipher: KeystreamCipher,
    transcript: Transcript,
    session: Arc<Mutex<Session>>,
    tx: mpsc::Sender<TranscriptEntry>,
) {
    let mut buf = [0u8; RECV_BUFFER_LEN];
    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) => {
                info!("peer closed the connection");
                break;
            }
            Ok(read) => read,
            Err(e) => {
                warn!("receive failed: {}", e);
                break;
            }
        };
        let ciphertext = &buf[..read];
        let plaintext = match cipher.decrypt(ciphertext) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!("decrypt failed: {}", e);
                break;
            }
        };
        transcript.record(Direction::Inbound, &plaintext, ciphertext);
        let quit = is_quit(&plaintext);
        let entry = TranscriptEntry {
            direction: Direction::Inbound,
            plaintext,
            ciphertext: ciphertext.to_vec(),
        };
        if tx.send(entry).await.is_err() || quit {
            break;
        }
    }
    session.lock().await.close();
}
