use criterion::{black_box, criterion_group, criterion_main, Criterion};
use leveled_he_core::ntt::{ntt_forward, ntt_inverse, NttTables};
use leveled_he_core::params::{CoeffModulus, EncryptionParameters};
use leveled_he_core::{CkksEncoder, Context, Encryptor, Evaluator, KeyGenerator};

fn ntt_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("NTT");

    for n in [4096usize, 8192, 16384] {
        let modulus = CoeffModulus::create(n, &[50]).unwrap()[0];
        let tables = NttTables::new(n, modulus).unwrap();
        let data: Vec<u64> = (0..n as u64).map(|i| (i * 7919) % modulus.value).collect();

        group.bench_function(format!("forward {}", n), |b| {
            let mut a = data.clone();
            b.iter(|| ntt_forward(black_box(&mut a), &tables));
        });
        group.bench_function(format!("inverse {}", n), |b| {
            let mut a = data.clone();
            b.iter(|| ntt_inverse(black_box(&mut a), &tables));
        });
    }
    group.finish();
}

fn ciphertext_ops(c: &mut Criterion) {
    let ctx = Context::new(EncryptionParameters::ckks_n8192().unwrap()).unwrap();
    let mut keygen = KeyGenerator::with_seed(&ctx, 1);
    let pk = keygen.create_public_key();
    let relin_keys = keygen.create_relin_keys();
    let galois_keys = keygen.create_galois_keys_for_steps(&[1]).unwrap();
    let encoder = CkksEncoder::new(&ctx).unwrap();
    let mut encryptor = Encryptor::with_seed(&ctx, &pk, 2).unwrap();
    let evaluator = Evaluator::new(&ctx);

    let values: Vec<f64> = (0..encoder.slot_count()).map(|i| (i as f64 * 0.001).sin()).collect();
    let scale = 2f64.powi(40);
    let ct = encryptor.encrypt(&encoder.encode(&values, scale).unwrap()).unwrap();

    let mut group = c.benchmark_group("CKKS N=8192");
    group.sample_size(10);
    group.bench_function("multiply + relinearize", |b| {
        b.iter(|| {
            let prod = evaluator.multiply(&ct, &ct).unwrap();
            evaluator.relinearize(&prod, &relin_keys).unwrap()
        });
    });
    group.bench_function("rescale_to_next", |b| {
        let prod = evaluator.relinearize(&evaluator.square(&ct).unwrap(), &relin_keys).unwrap();
        b.iter(|| evaluator.rescale_to_next(&prod).unwrap());
    });
    group.bench_function("rotate_vector 1", |b| {
        b.iter(|| evaluator.rotate_vector(&ct, 1, &galois_keys).unwrap());
    });
    group.finish();
}

criterion_group!(benches, ntt_roundtrip, ciphertext_ops);
criterion_main!(benches);
