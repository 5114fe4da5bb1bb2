use std::env;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bb84::{ExchangeConfig, SessionState};
use bb84_link::{format_report, is_quit, LinkError, SecureLink, DEFAULT_ADDR};
use log::{error, info, warn};
use tokio::net::{TcpListener, TcpStream};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let addr = env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let config = ExchangeConfig::default();
    config.validate()?;

    let listener = TcpListener::bind(&addr).await?;
    println!("BB84 sender listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let config = config.clone();
        info!("session {}: connection from {}", id, peer);
        // A failed session never takes the listener down with it.
        tokio::spawn(async move {
            if let Err(e) = serve(stream, peer, id, config).await {
                error!("session {} with {}: {}", id, peer, e);
            }
        });
    }
}

async fn serve(stream: TcpStream, peer: SocketAddr, id: u64, config: ExchangeConfig) -> Result<(), LinkError> {
    let link = SecureLink::accept(stream, id, config).await?;
    if let Some(report) = link.report().await {
        println!("[session {} / {}] {}", id, peer, format_report(&report));
    }
    if link.state().await != SessionState::KeyEstablished {
        warn!("session {}: not sending anything on a compromised channel", id);
        return link.close().await;
    }

    while let Some(message) = link.recv().await {
        println!(
            "[session {}] {} -> {}",
            id,
            message.ciphertext_hex(),
            message.plaintext_lossy()
        );
        if is_quit(&message.plaintext) {
            break;
        }
        let reply = format!("ack: {}", message.plaintext_lossy().trim());
        link.send(reply.as_bytes()).await?;
    }
    link.close().await
}
