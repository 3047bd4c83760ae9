//! Console helpers shared by the example programs.

use std::fmt::Display;
use std::sync::Arc;

use leveled_he_core::{Context, Encryptor, KeyGenerator, ParmsId, PublicKey, SchemeType};

pub fn print_example_banner(title: &str) {
    if title.is_empty() {
        return;
    }
    let stars = "*".repeat(title.len() + 2 * 11);
    println!();
    println!("{stars}");
    println!("{} {title} {}", "*".repeat(10), "*".repeat(10));
    println!("{stars}");
    println!();
}

/// Scheme, ring degree and modulus bit sizes of a context.
pub fn print_parameters(context: &Context) {
    let params = context.params();
    let scheme = match params.scheme {
        SchemeType::Ckks => "CKKS",
        SchemeType::Bfv => "BFV",
    };
    let bits: Vec<String> = params
        .coeff_modulus
        .iter()
        .map(|m| m.bits.to_string())
        .collect();

    println!("/");
    println!("| Encryption parameters :");
    println!("|   scheme: {scheme}");
    println!("|   poly_modulus_degree: {}", params.poly_modulus_degree);
    println!(
        "|   coeff_modulus size: {} ({}) bits",
        params.total_coeff_modulus_bits(),
        bits.join(" + ")
    );
    if let Some(t) = params.plain_modulus {
        println!("|   plain_modulus: {}", t.value);
    }
    println!("\\");
}

pub fn print_line(line: u32) {
    print!("Line {line:>3} --> ");
}

/// First and last `print_size` entries of a vector with `prec` decimals.
pub fn print_vector(values: &[f64], print_size: usize, prec: usize) {
    println!();
    println!("{}", format_vector(values, print_size, prec));
    println!();
}

fn format_vector(values: &[f64], print_size: usize, prec: usize) -> String {
    let len = values.len();
    let fmt = |v: &f64| format!("{v:.prec$}");
    let body = if 2 * print_size >= len {
        values.iter().map(fmt).collect::<Vec<_>>().join(", ")
    } else {
        let head: Vec<String> = values[..print_size].iter().map(fmt).collect();
        let tail: Vec<String> = values[len - print_size..].iter().map(fmt).collect();
        format!("{}, ..., {}", head.join(", "), tail.join(", "))
    };
    format!("    [ {body} ]")
}

/// The two rows of a batching matrix, first five and last two columns each.
pub fn print_matrix<T: Display>(matrix: &[T], row_size: usize) {
    println!();
    for line in format_matrix(matrix, row_size) {
        println!("{line}");
    }
    println!();
}

fn format_matrix<T: Display>(matrix: &[T], row_size: usize) -> Vec<String> {
    let print_size = 5;
    matrix
        .chunks(row_size)
        .take(2)
        .map(|row| {
            let head: Vec<String> = row.iter().take(print_size).map(|v| format!("{v:>3}")).collect();
            let tail: Vec<String> = row[row.len().saturating_sub(2)..]
                .iter()
                .map(|v| format!("{v:>3}"))
                .collect();
            format!("    [{}, ...,{} ]", head.join(","), tail.join(","))
        })
        .collect()
}

pub fn chain_index(context: &Context, parms_id: &ParmsId) -> anyhow::Result<usize> {
    Ok(context.context_data(parms_id)?.chain_index())
}

pub fn key_generator(context: &Arc<Context>, seed: Option<u64>) -> KeyGenerator {
    match seed {
        Some(seed) => KeyGenerator::with_seed(context, seed),
        None => KeyGenerator::new(context),
    }
}

pub fn encryptor(
    context: &Arc<Context>,
    public_key: &PublicKey,
    seed: Option<u64>,
) -> anyhow::Result<Encryptor> {
    Ok(match seed {
        Some(seed) => Encryptor::with_seed(context, public_key, seed.wrapping_add(1))?,
        None => Encryptor::new(context, public_key)?,
    })
}
