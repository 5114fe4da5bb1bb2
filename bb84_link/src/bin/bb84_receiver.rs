use std::env;
use std::sync::Arc;

use bb84::SessionState;
use bb84_link::{exchange_config_from_env, format_report, is_quit, SecureLink, DEFAULT_ADDR, EAVESDROP_ENV};
use log::error;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let addr = env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let config = exchange_config_from_env()?;
    println!(
        "Connecting to {} (eavesdrop probability {}, set {} to change)",
        addr, config.eavesdrop_probability, EAVESDROP_ENV
    );

    let link = Arc::new(SecureLink::connect(&addr, 1, config).await?);
    if let Some(report) = link.report().await {
        println!("{}", format_report(&report));
    }
    if link.state().await != SessionState::KeyEstablished {
        println!("Message sending is disabled for this session.");
        link.close().await?;
        return Ok(());
    }

    let printer = {
        let link = Arc::clone(&link);
        tokio::spawn(async move {
            while let Some(message) = link.recv().await {
                println!("< {} [{}]", message.plaintext_lossy(), message.ciphertext_hex());
            }
            println!("Connection closed.");
        })
    };

    println!("Type a message and press enter; '{}' ends the session.", bb84_link::QUIT);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match link.send(line.as_bytes()).await {
            Ok(ciphertext) => println!("> {} [{}]", line, hex::encode(&ciphertext)),
            Err(e) => {
                error!("send failed: {}", e);
                break;
            }
        }
        if is_quit(line.as_bytes()) {
            break;
        }
    }

    link.close().await?;
    printer.await?;
    Ok(())
}
