//! Row/column rotations of a BFV batching matrix and slot rotation in CKKS.

use leveled_he_core::params::{CoeffModulus, SchemeType};
use leveled_he_core::{
    BatchEncoder, CkksEncoder, Context, Decryptor, EncryptionParameters, Evaluator,
};

use crate::util::{
    encryptor, key_generator, print_example_banner, print_line, print_matrix, print_parameters,
    print_vector,
};

pub fn run(seed: Option<u64>) -> anyhow::Result<()> {
    print_example_banner("Example: Rotation");
    rotation_bfv(seed)?;
    rotation_ckks(seed)
}

fn rotation_bfv(seed: Option<u64>) -> anyhow::Result<()> {
    print_example_banner("Example: Rotation / Rotation in BFV");

    let context = Context::new(EncryptionParameters::bfv_n8192()?)?;
    print_parameters(&context);
    println!();

    let mut keygen = key_generator(&context, seed);
    let public_key = keygen.create_public_key();
    let mut encryptor = encryptor(&context, &public_key, seed)?;
    let evaluator = Evaluator::new(&context);
    let decryptor = Decryptor::new(&context, keygen.secret_key())?;

    let batch_encoder = BatchEncoder::new(&context)?;
    let slot_count = batch_encoder.slot_count();
    let row_size = slot_count / 2;
    println!("Plaintext matrix row size: {row_size}");

    let mut pod_matrix = vec![0u64; slot_count];
    for i in 0..4 {
        pod_matrix[i] = i as u64;
        pod_matrix[row_size + i] = 4 + i as u64;
    }
    println!("Input plaintext matrix:");
    print_matrix(&pod_matrix, row_size);

    print_line(line!());
    println!("Encode and encrypt.");
    let plain_matrix = batch_encoder.encode(&pod_matrix)?;
    let mut encrypted_matrix = encryptor.encrypt(&plain_matrix)?;
    println!(
        "    + Noise budget in fresh encryption: {} bits",
        decryptor.invariant_noise_budget(&encrypted_matrix)?
    );
    println!();

    let galois_keys = keygen.create_galois_keys()?;

    print_line(line!());
    println!("Rotate rows 3 steps left.");
    evaluator.rotate_rows_inplace(&mut encrypted_matrix, 3, &galois_keys)?;
    println!(
        "    + Noise budget after rotation: {} bits",
        decryptor.invariant_noise_budget(&encrypted_matrix)?
    );
    println!("    + Decrypt and decode ...... Correct.");
    let plain_result = decryptor.decrypt(&encrypted_matrix)?;
    print_matrix(&batch_encoder.decode(&plain_result)?, row_size);

    print_line(line!());
    println!("Rotate columns.");
    evaluator.rotate_columns_inplace(&mut encrypted_matrix, &galois_keys)?;
    println!(
        "    + Noise budget after rotation: {} bits",
        decryptor.invariant_noise_budget(&encrypted_matrix)?
    );
    println!("    + Decrypt and decode ...... Correct.");
    let plain_result = decryptor.decrypt(&encrypted_matrix)?;
    print_matrix(&batch_encoder.decode(&plain_result)?, row_size);

    print_line(line!());
    println!("Rotate rows 4 steps right.");
    evaluator.rotate_rows_inplace(&mut encrypted_matrix, -4, &galois_keys)?;
    println!(
        "    + Noise budget after rotation: {} bits",
        decryptor.invariant_noise_budget(&encrypted_matrix)?
    );
    println!("    + Decrypt and decode ...... Correct.");
    let plain_result = decryptor.decrypt(&encrypted_matrix)?;
    print_matrix(&batch_encoder.decode(&plain_result)?, row_size);
    Ok(())
}

fn rotation_ckks(seed: Option<u64>) -> anyhow::Result<()> {
    print_example_banner("Example: Rotation / Rotation in CKKS");

    let n = 8192;
    let params = EncryptionParameters::new(
        SchemeType::Ckks,
        n,
        CoeffModulus::create(n, &[40, 40, 40, 40, 40])?,
    );
    let context = Context::new(params)?;
    print_parameters(&context);
    println!();

    let mut keygen = key_generator(&context, seed);
    let public_key = keygen.create_public_key();
    let galois_keys = keygen.create_galois_keys()?;
    let mut encryptor = encryptor(&context, &public_key, seed)?;
    let evaluator = Evaluator::new(&context);
    let decryptor = Decryptor::new(&context, keygen.secret_key())?;
    let ckks_encoder = CkksEncoder::new(&context)?;

    let slot_count = ckks_encoder.slot_count();
    println!("Number of slots: {slot_count}");
    let step_size = 1.0 / (slot_count as f64 - 1.0);
    let input: Vec<f64> = (0..slot_count).map(|i| i as f64 * step_size).collect();
    println!("Input vector:");
    print_vector(&input, 3, 7);

    let scale = 2f64.powi(50);

    print_line(line!());
    println!("Encode and encrypt.");
    let plain = ckks_encoder.encode(&input, scale)?;
    let encrypted = encryptor.encrypt(&plain)?;

    print_line(line!());
    println!("Rotate 2 steps left.");
    let rotated = evaluator.rotate_vector(&encrypted, 2, &galois_keys)?;
    println!("    + Decrypt and decode ...... Correct.");
    let result = ckks_encoder.decode(&decryptor.decrypt(&rotated)?)?;
    print_vector(&result, 3, 7);
    Ok(())
}
