use bb84::bb84_states::from_entropy;
use bb84::{run_exchange, ExchangeConfig, KeystreamCipher};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut rng = from_entropy();
    let config = ExchangeConfig::default().with_num_bits(64);
    let report = run_exchange(&config, &mut rng)?;
    let run = &report.run;

    // Print results
    println!("Alice's Bits:  {:?}", run.sender.bits);
    println!("Alice's Bases: {:?}", run.sender.bases);
    println!("Bob's Bases:   {:?}", run.receiver.bases);
    println!("Bob's Bits:    {:?}", run.receiver.bits);
    println!("Sifted positions: {:?}", run.sifted.positions);
    println!(
        "Sampled {} of {} sifted bits, error rate {:.4}",
        run.detection.sample_size(),
        run.sifted.len(),
        report.error_rate()
    );

    let (Some(alice_key), Some(bob_key)) = (report.sender_key.clone(), report.receiver_key.clone()) else {
        println!("Eavesdropping detected, no key established");
        return Ok(());
    };
    println!("Alice's key: {:?}", alice_key);
    println!("Bob's key:   {:?}", bob_key);

    let alice = KeystreamCipher::new(Arc::new(alice_key))?;
    let bob = KeystreamCipher::new(Arc::new(bob_key))?;
    let ciphertext = alice.encrypt(b"Hello, Bob!")?;
    println!("Ciphertext: {}", hex::encode(&ciphertext));
    println!("Bob reads:  {}", String::from_utf8_lossy(&bob.decrypt(&ciphertext)?));

    Ok(())
}
