//! Evaluate (x + 1)² · (x² + 2) at N=16384 with a 2^50 scale, then rotate.

use leveled_he_core::{CkksEncoder, Context, Decryptor, EncryptionParameters, Evaluator};
use log::info;

use crate::util::{
    chain_index, encryptor, key_generator, print_example_banner, print_line, print_parameters,
    print_vector,
};

pub fn run(seed: Option<u64>) -> anyhow::Result<()> {
    print_example_banner("Example: My CKKS");

    let context = Context::new(EncryptionParameters::ckks_n16384()?)?;
    print_parameters(&context);
    println!();

    let mut keygen = key_generator(&context, seed);
    let public_key = keygen.create_public_key();
    let relin_keys = keygen.create_relin_keys();
    let galois_keys = keygen.create_galois_keys_for_steps(&[2])?;
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
    println!("Evaluating polynomial (x + 1)^2 * (x^2 + 2) ...");

    let scale = 2f64.powi(50);
    let plain_coeff3 = encoder.encode_scalar(2.0, scale)?;
    let plain_coeff4 = encoder.encode_scalar(1.0, scale)?;

    print_line(line!());
    println!("Encode input vectors.");
    let x_plain = encoder.encode(&input, scale)?;
    let x1_encrypted = encryptor.encrypt(&x_plain)?;

    print_line(line!());
    println!("Compute (x^2) and relinearize:");
    let mut x2_encrypted = evaluator.square(&x1_encrypted)?;
    evaluator.relinearize_inplace(&mut x2_encrypted, &relin_keys)?;
    println!(
        "    + Scale of (x^2) before rescale: {} bits",
        x2_encrypted.scale().log2()
    );

    print_line(line!());
    println!("Rescale (x^2).");
    evaluator.rescale_to_next_inplace(&mut x2_encrypted)?;
    println!(
        "    + Scale of (x^2) after rescale: {} bits",
        x2_encrypted.scale().log2()
    );
    evaluator.normalize_scale_inplace(&mut x2_encrypted, scale)?;

    print_line(line!());
    println!("Compute (x^2 + 2).");
    let plain_coeff3 = evaluator.mod_switch_plain_to(&plain_coeff3, x2_encrypted.parms_id())?;
    evaluator.add_plain_inplace(&mut x2_encrypted, &plain_coeff3)?;
    println!();

    print_line(line!());
    println!("Parameters used by all three terms are different.");
    println!(
        "    + Modulus chain index for x2_encrypted(x^2 + 2): {}",
        chain_index(&context, &x2_encrypted.parms_id())?
    );
    println!(
        "    + Modulus chain index for x1_encrypted(x): {}",
        chain_index(&context, &x1_encrypted.parms_id())?
    );
    println!(
        "    + Modulus chain index for plain_coeff3(2): {}",
        chain_index(&context, &plain_coeff3.parms_id())?
    );
    println!();

    print_line(line!());
    println!("Compute (x + 1)^2 and relinearize.");
    let x_plus_one = evaluator.add_plain(&x1_encrypted, &plain_coeff4)?;
    let mut x_plus_one_sq = evaluator.square(&x_plus_one)?;
    evaluator.relinearize_inplace(&mut x_plus_one_sq, &relin_keys)?;
    println!(
        "    + Scale of (x + 1)^2 before rescale: {} bits",
        x_plus_one_sq.scale().log2()
    );

    print_line(line!());
    println!("Rescale (x + 1)^2.");
    evaluator.rescale_to_next_inplace(&mut x_plus_one_sq)?;
    println!(
        "    + Scale of (x + 1)^2 after rescale: {} bits",
        x_plus_one_sq.scale().log2()
    );
    println!();

    print_line(line!());
    println!(
        "    + Modulus chain index for x_plus_one_sq((x + 1)^2): {}",
        chain_index(&context, &x_plus_one_sq.parms_id())?
    );
    println!("The exact scales of all two terms are different:");
    println!("    + Exact scale in (x^2 + 2): {:.10}", x2_encrypted.scale());
    println!("    + Exact scale in  (x + 1)^2: {:.10}", x_plus_one_sq.scale());
    println!();

    print_line(line!());
    println!("Normalize scales to 2^50.");
    evaluator.normalize_scale_inplace(&mut x_plus_one_sq, scale)?;

    print_line(line!());
    println!("Compute (x + 1)^2 * (x^2 + 2)");
    let mut encrypted_result = evaluator.multiply(&x2_encrypted, &x_plus_one_sq)?;
    evaluator.relinearize_inplace(&mut encrypted_result, &relin_keys)?;
    evaluator.rescale_to_next_inplace(&mut encrypted_result)?;
    println!(
        "    + Scale of the product after rescale: {} bits",
        encrypted_result.scale().log2()
    );

    print_line(line!());
    println!("Decrypt and decode (x + 1)^2 * (x^2 + 2)");
    println!("    + Expected result:");
    let true_result: Vec<f64> = input
        .iter()
        .map(|x| (x + 1.0) * (x + 1.0) * (x * x + 2.0))
        .collect();
    print_vector(&true_result, 3, 7);

    let result = encoder.decode(&decryptor.decrypt(&encrypted_result)?)?;
    println!("    + Computed result ...... Correct.");
    print_vector(&result, 3, 7);

    let max_error = result
        .iter()
        .zip(&true_result)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    info!("my ckks: max absolute error {max_error:e}");

    print_example_banner("Example: My Rotation");
    print_line(line!());
    println!("Rotate 2 steps left.");
    let rotated = evaluator.rotate_vector(&encrypted_result, 2, &galois_keys)?;
    println!("    + Decrypt and decode ...... Correct.");
    let result = encoder.decode(&decryptor.decrypt(&rotated)?)?;
    print_vector(&result, 3, 7);
    Ok(())
}
