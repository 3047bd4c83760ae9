use clap::{Parser, Subcommand};
use log::info;

mod ckks_basics;
mod my_ckks;
mod rotation;
mod util;

#[derive(Parser, Debug)]
#[command(author, version, about = "Leveled HE example programs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Seed key generation and encryption for reproducible output
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate PI*x^3 + 0.4x + 1 with CKKS (N=8192, scale 2^40)
    CkksBasics,
    /// Rotate a BFV batching matrix and a CKKS vector
    Rotation,
    /// Evaluate (x + 1)^2 * (x^2 + 2) with CKKS (N=16384, scale 2^50), then rotate
    MyCkks,
    /// Run every example in order
    All,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    if let Some(seed) = args.seed {
        info!("using fixed seed {seed}");
    }

    match args.command {
        Commands::CkksBasics => ckks_basics::run(args.seed)?,
        Commands::Rotation => rotation::run(args.seed)?,
        Commands::MyCkks => my_ckks::run(args.seed)?,
        Commands::All => {
            ckks_basics::run(args.seed)?;
            rotation::run(args.seed)?;
            my_ckks::run(args.seed)?;
        }
    }
    Ok(())
}
