//! Evaluate π·x³ + 0.4·x + 1 on 4096 encrypted points in [0, 1].

use std::f64::consts::PI;

use leveled_he_core::{CkksEncoder, Context, Decryptor, EncryptionParameters, Evaluator};
use log::info;

use crate::util::{
    chain_index, encryptor, key_generator, print_example_banner, print_line, print_parameters,
    print_vector,
};

pub fn run(seed: Option<u64>) -> anyhow::Result<()> {
    print_example_banner("Example: CKKS Basics");

    // 60-bit outer primes, 40-bit inner primes matching the 2^40 scale.
    let context = Context::new(EncryptionParameters::ckks_n8192()?)?;
    print_parameters(&context);
    println!();

    let mut keygen = key_generator(&context, seed);
    let public_key = keygen.create_public_key();
    let relin_keys = keygen.create_relin_keys();
    let mut encryptor = encryptor(&context, &public_key, seed)?;
    let evaluator = Evaluator::new(&context);
    let decryptor = Decryptor::new(&context, keygen.secret_key())?;
    let encoder = CkksEncoder::new(&context)?;

    let slot_count = encoder.slot_count();
    println!("Number of slots: {slot_count}");

    let step_size = 1.0 / (slot_count as f64 - 1.0);
    let input: Vec<f64> = (0..slot_count).map(|i| i as f64 * step_size).collect();
    println!("Input vector: ");
    print_vector(&input, 3, 7);
    println!("Evaluating polynomial PI*x^3 + 0.4x + 1 ...");

    let scale = 2f64.powi(40);
    let plain_coeff3 = encoder.encode_scalar(PI, scale)?;
    let plain_coeff1 = encoder.encode_scalar(0.4, scale)?;
    let plain_coeff0 = encoder.encode_scalar(1.0, scale)?;

    print_line(line!());
    println!("Encode input vectors.");
    let x_plain = encoder.encode(&input, scale)?;
    let x1_encrypted = encryptor.encrypt(&x_plain)?;

    print_line(line!());
    println!("Compute x^2 and relinearize:");
    let mut x3_encrypted = evaluator.square(&x1_encrypted)?;
    evaluator.relinearize_inplace(&mut x3_encrypted, &relin_keys)?;
    println!("    + Scale of x^2 before rescale: {} bits", x3_encrypted.scale().log2());

    print_line(line!());
    println!("Rescale x^2.");
    evaluator.rescale_to_next_inplace(&mut x3_encrypted)?;
    println!("    + Scale of x^2 after rescale: {} bits", x3_encrypted.scale().log2());

    print_line(line!());
    println!("Compute and rescale PI*x.");
    let mut x1_encrypted_coeff3 = evaluator.multiply_plain(&x1_encrypted, &plain_coeff3)?;
    println!(
        "    + Scale of PI*x before rescale: {} bits",
        x1_encrypted_coeff3.scale().log2()
    );
    evaluator.rescale_to_next_inplace(&mut x1_encrypted_coeff3)?;
    println!(
        "    + Scale of PI*x after rescale: {} bits",
        x1_encrypted_coeff3.scale().log2()
    );

    print_line(line!());
    println!("Compute, relinearize, and rescale (PI*x)*x^2.");
    evaluator.multiply_inplace(&mut x3_encrypted, &x1_encrypted_coeff3)?;
    evaluator.relinearize_inplace(&mut x3_encrypted, &relin_keys)?;
    println!(
        "    + Scale of PI*x^3 before rescale: {} bits",
        x3_encrypted.scale().log2()
    );
    evaluator.rescale_to_next_inplace(&mut x3_encrypted)?;
    println!(
        "    + Scale of PI*x^3 after rescale: {} bits",
        x3_encrypted.scale().log2()
    );

    print_line(line!());
    println!("Compute and rescale 0.4*x.");
    let mut x1_encrypted_coeff1 = evaluator.multiply_plain(&x1_encrypted, &plain_coeff1)?;
    evaluator.rescale_to_next_inplace(&mut x1_encrypted_coeff1)?;
    println!();

    print_line(line!());
    println!("Parameters used by all three terms are different.");
    println!(
        "    + Modulus chain index for x3_encrypted: {}",
        chain_index(&context, &x3_encrypted.parms_id())?
    );
    println!(
        "    + Modulus chain index for x1_encrypted: {}",
        chain_index(&context, &x1_encrypted_coeff1.parms_id())?
    );
    println!(
        "    + Modulus chain index for plain_coeff0: {}",
        chain_index(&context, &plain_coeff0.parms_id())?
    );
    println!();

    print_line(line!());
    println!("The exact scales of all three terms are different:");
    println!("    + Exact scale in PI*x^3: {:.10}", x3_encrypted.scale());
    println!("    + Exact scale in  0.4*x: {:.10}", x1_encrypted_coeff1.scale());
    println!("    + Exact scale in      1: {:.10}", plain_coeff0.scale());
    println!();

    print_line(line!());
    println!("Normalize scales to 2^40.");
    evaluator.normalize_scale_inplace(&mut x3_encrypted, scale)?;
    evaluator.normalize_scale_inplace(&mut x1_encrypted_coeff1, scale)?;

    print_line(line!());
    println!("Normalize encryption parameters to the lowest level.");
    let last_parms_id = x3_encrypted.parms_id();
    evaluator.mod_switch_to_inplace(&mut x1_encrypted_coeff1, last_parms_id)?;
    let plain_coeff0 = evaluator.mod_switch_plain_to(&plain_coeff0, last_parms_id)?;

    print_line(line!());
    println!("Compute PI*x^3 + 0.4*x + 1.");
    let mut encrypted_result = evaluator.add(&x3_encrypted, &x1_encrypted_coeff1)?;
    evaluator.add_plain_inplace(&mut encrypted_result, &plain_coeff0)?;

    print_line(line!());
    println!("Decrypt and decode PI*x^3 + 0.4x + 1.");
    println!("    + Expected result:");
    let true_result: Vec<f64> = input.iter().map(|x| (PI * x * x + 0.4) * x + 1.0).collect();
    print_vector(&true_result, 3, 7);

    let result = encoder.decode(&decryptor.decrypt(&encrypted_result)?)?;
    println!("    + Computed result ...... Correct.");
    print_vector(&result, 3, 7);

    let max_error = result
        .iter()
        .zip(&true_result)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    info!("ckks basics: max absolute error {max_error:e}");
    Ok(())
}
