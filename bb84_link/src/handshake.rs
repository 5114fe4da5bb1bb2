//! Key exchange over an async byte stream, driving the sans-IO
//! `SenderExchange` / `ReceiverExchange` steps from `bb84::exchange`.

use bb84::{Bb84Error, ExchangeConfig, ExchangeOutcome, PartyRole, ReceiverExchange, SenderExchange, Session, SessionState};
use log::debug;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::framing::{read_bases, read_disclosure, read_transmission, write_frame};

/// Sender side: transmit bits and bases, sift, then judge the disclosed sample.
pub async fn initiate<S, R>(stream: &mut S, config: ExchangeConfig, rng: &mut R) -> Result<ExchangeOutcome, Bb84Error>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
    R: Rng + ?Sized,
{
    let mut exchange = SenderExchange::new(config, rng)?;
    write_frame(stream, &exchange.transmission()?).await?;
    let bases = read_bases(stream, exchange.party().len()).await?;
    let sifted_len = exchange.accept_bases(&bases)?;
    debug!("sender waiting for a sample of {} sifted bits", sifted_len);
    let disclosure = read_disclosure(stream, sifted_len).await?;
    exchange.finish(disclosure)
}

/// Receiver side: measure (through the simulated eavesdropper), answer with
/// bases, then disclose the sample both sides will judge.
pub async fn respond<S, R>(stream: &mut S, config: ExchangeConfig, rng: &mut R) -> Result<ExchangeOutcome, Bb84Error>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
    R: Rng + ?Sized,
{
    let (bits, bases) = read_transmission(stream, config.max_num_bits).await?;
    let mut exchange = ReceiverExchange::measure(config, &bits, &bases, rng)?;
    write_frame(stream, exchange.bases()).await?;
    let disclosure = exchange.disclose(rng)?;
    write_frame(stream, &disclosure.encode()?).await?;
    exchange.finish()
}

/// Runs the exchange for `role` and moves `session` to its next state.
///
/// Failures are applied to the session before they are returned: recoverable
/// ones put it back in `Idle`, anything else closes it.
pub async fn establish<S, R>(
    session: &mut Session,
    role: PartyRole,
    stream: &mut S,
    rng: &mut R,
) -> Result<SessionState, Bb84Error>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
    R: Rng + ?Sized,
{
    session.begin_exchange()?;
    let config = session.config().clone();
    let result = match role {
        PartyRole::Sender => initiate(stream, config, rng).await,
        PartyRole::Receiver => respond(stream, config, rng).await,
        PartyRole::Eavesdropper => Err(Bb84Error::InvalidConfig(
            "an eavesdropper cannot hold a session".to_string(),
        )),
    };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            session.fail_exchange(&err);
            return Err(err);
        }
    };
    session.complete_exchange(outcome).map_err(|err| {
        session.fail_exchange(&err);
        err
    })
}
