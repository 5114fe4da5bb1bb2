use bb84::bb84_protocol::sweep;
use bb84::bb84_states::from_entropy;
use bb84::ExchangeConfig;

const TRIALS: usize = 10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("BB84 Eavesdropping Simulation");

    let config = ExchangeConfig::default().with_num_bits(1000);
    let probabilities = [0.0, 0.1, 0.25, 0.5, 0.75, 1.0];
    let summaries = sweep(&config, &probabilities, TRIALS, &mut from_entropy())?;

    println!("{:>6} {:>10} {:>10}", "p", "mean QBER", "detected");
    for summary in &summaries {
        println!(
            "{:>6.2} {:>10.4} {:>7}/{}",
            summary.eavesdrop_probability,
            summary.mean_error_rate(),
            summary.detections(),
            summary.trials()
        );
    }
    Ok(())
}
