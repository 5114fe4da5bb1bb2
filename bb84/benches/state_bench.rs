// benches/state_bench.rs

use bb84::bb84::measure;
use bb84::bb84_protocol::{run_exchange, simulate_channel};
use bb84::bb84_states::{generate, random_bases, seeded, PartyRole};
use bb84::cipher::encrypt;
use bb84::eavesdropper::intercept;
use bb84::session_key::pack_bits;
use bb84::sifting::sift;
use bb84::ExchangeConfig;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn benchmark_channel_stages(c: &mut Criterion) {
    let n = 1000;
    let mut rng = seeded(7);
    let alice = generate(PartyRole::Sender, n, &mut rng);
    let bob_bases = random_bases(n, &mut rng);

    c.bench_function("generate_1000", |b| {
        b.iter(|| generate(PartyRole::Sender, black_box(n), &mut rng));
    });

    c.bench_function("intercept_1000", |b| {
        b.iter(|| intercept(black_box(&alice.bits), black_box(&alice.bases), 0.5, &mut rng).unwrap());
    });

    c.bench_function("measure_1000", |b| {
        b.iter(|| measure(&alice.bits, &alice.bases, black_box(&bob_bases), None, &mut rng).unwrap());
    });

    let bob_bits = measure(&alice.bits, &alice.bases, &bob_bases, None, &mut rng).unwrap();
    c.bench_function("sift_1000", |b| {
        b.iter(|| sift(&alice.bases, black_box(&bob_bases), &alice.bits, &bob_bits).unwrap());
    });

    c.bench_function("pack_bits_1000", |b| {
        b.iter(|| pack_bits(black_box(&alice.bits)));
    });
}

fn benchmark_exchange(c: &mut Criterion) {
    let config = ExchangeConfig::default();
    let tapped = ExchangeConfig::default().with_eavesdropper(1.0);
    let mut rng = seeded(11);

    c.bench_function("local_exchange_1000", |b| {
        b.iter(|| run_exchange(black_box(&config), &mut rng).unwrap());
    });

    c.bench_function("tapped_channel_1000", |b| {
        b.iter(|| simulate_channel(black_box(&tapped), &mut rng).unwrap());
    });

    let key = [0x5au8; 16];
    let message = vec![b'x'; 1024];
    c.bench_function("xor_encrypt_1k", |b| {
        b.iter(|| encrypt(black_box(&message), &key).unwrap());
    });
}

criterion_group!(benches, benchmark_channel_stages, benchmark_exchange);
criterion_main!(benches);
