//! Client/server exchange: the client keeps the secret key, the server only
//! sees bytes of public material and ciphertexts.

use leveled_he_core::params::{CoeffModulus, PlainModulus, SchemeType, SecurityLevel};
use leveled_he_core::serialize::{
    load_ciphertext, load_galois_keys, load_plaintext, load_public_key, load_relin_keys, to_bytes,
};
use leveled_he_core::{
    BatchEncoder, CkksEncoder, Context, Decryptor, EncryptionParameters, Encryptor, Evaluator,
    HeError, KeyGenerator,
};

#[test]
fn test_ckks_server_roundtrip() {
    let n = 1024;
    let params = EncryptionParameters::new(
        SchemeType::Ckks,
        n,
        CoeffModulus::create(n, &[50, 40, 50]).unwrap(),
    )
    .with_security_level(SecurityLevel::None);

    // Client side.
    let client_ctx = Context::new(params.clone()).unwrap();
    let mut keygen = KeyGenerator::with_seed(&client_ctx, 301);
    let pk_bytes = to_bytes(&keygen.create_public_key()).unwrap();
    let rk_bytes = to_bytes(&keygen.create_relin_keys()).unwrap();
    let gk_bytes = to_bytes(&keygen.create_galois_keys_for_steps(&[1]).unwrap()).unwrap();
    let encoder = CkksEncoder::new(&client_ctx).unwrap();
    let scale = 2f64.powi(30);
    let values = [0.5, 1.5, -2.0, 4.0];

    let server_pk = load_public_key(&client_ctx, &pk_bytes).unwrap();
    let mut encryptor = Encryptor::with_seed(&client_ctx, &server_pk, 302).unwrap();
    let ct_bytes = to_bytes(&encryptor.encrypt(&encoder.encode(&values, scale).unwrap()).unwrap()).unwrap();

    // Server side: a separately built context with identical parameters.
    let server_ctx = Context::new(params).unwrap();
    assert_eq!(server_ctx.first_parms_id(), client_ctx.first_parms_id());
    let relin_keys = load_relin_keys(&server_ctx, &rk_bytes).unwrap();
    let galois_keys = load_galois_keys(&server_ctx, &gk_bytes).unwrap();
    let ct = load_ciphertext(&server_ctx, &ct_bytes).unwrap();
    let evaluator = Evaluator::new(&server_ctx);
    let sq = evaluator.relinearize(&evaluator.square(&ct).unwrap(), &relin_keys).unwrap();
    let rotated = evaluator.rotate_vector(&sq, 1, &galois_keys).unwrap();
    let reply = to_bytes(&rotated).unwrap();

    // Back on the client.
    let result = load_ciphertext(&client_ctx, &reply).unwrap();
    assert_eq!(result.scale(), scale * scale);
    let decryptor = Decryptor::new(&client_ctx, keygen.secret_key()).unwrap();
    let decoded = encoder.decode(&decryptor.decrypt(&result).unwrap()).unwrap();
    for i in 0..3 {
        let expected = values[i + 1] * values[i + 1];
        assert!((decoded[i] - expected).abs() < 1e-3, "Slot {i}: {}", decoded[i]);
    }
}

#[test]
fn test_bfv_plaintext_and_ciphertext_roundtrip() {
    let n = 256;
    let t = PlainModulus::batching(n, 17).unwrap();
    let ctx = Context::new(
        EncryptionParameters::new(SchemeType::Bfv, n, CoeffModulus::create(n, &[50, 50, 50]).unwrap())
            .with_plain_modulus(t)
            .with_security_level(SecurityLevel::None),
    )
    .unwrap();
    let mut keygen = KeyGenerator::with_seed(&ctx, 303);
    let pk = keygen.create_public_key();
    let encoder = BatchEncoder::new(&ctx).unwrap();
    let mut encryptor = Encryptor::with_seed(&ctx, &pk, 304).unwrap();
    let decryptor = Decryptor::new(&ctx, keygen.secret_key()).unwrap();

    let values: Vec<u64> = (0..n as u64).map(|i| i * i % t.value).collect();
    let pt = encoder.encode(&values).unwrap();
    let pt2 = load_plaintext(&ctx, &to_bytes(&pt).unwrap()).unwrap();
    assert_eq!(pt2, pt);

    let ct = encryptor.encrypt(&pt2).unwrap();
    let ct2 = load_ciphertext(&ctx, &to_bytes(&ct).unwrap()).unwrap();
    assert_eq!(encoder.decode(&decryptor.decrypt(&ct2).unwrap()).unwrap(), values);

    // A CKKS context rejects BFV material.
    let ckks = Context::new(
        EncryptionParameters::new(SchemeType::Ckks, n, CoeffModulus::create(n, &[50, 50, 50]).unwrap())
            .with_security_level(SecurityLevel::None),
    )
    .unwrap();
    assert!(matches!(
        load_ciphertext(&ckks, &to_bytes(&ct).unwrap()),
        Err(HeError::ParameterMismatch(_))
    ));
    assert!(load_plaintext(&ckks, &to_bytes(&pt).unwrap()).is_err());
}
