use clap::Parser;
use potato_ring::{chooser::Chooser, log, ringmaster, Ringmaster, RingmasterConfig};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ringmaster", about = "Assembles the players into a ring and throws the potato")]
struct Cli {
    /// Port to listen on for players.
    port: u16,

    /// Number of players in the ring (at least 2).
    num_players: usize,

    /// Number of hops before the potato comes back.
    #[arg(allow_negative_numbers = true)]
    num_hops: i32,

    /// Also print the game report as a JSON line.
    #[arg(long)]
    json: bool,

    /// Seed for choosing the first holder.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = RingmasterConfig::new(cli.port, cli.num_players, cli.num_hops);

    let chooser = match cli.seed {
        Some(seed) => Chooser::from_u64(seed),
        None => Chooser::for_process(),
    };

    let report = async {
        let mut ringmaster = Ringmaster::new(config.clone(), chooser)?;
        let listener = ringmaster::bind(&config)?;
        ringmaster.run(listener).await
    }
    .await;

    match report {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string(&report) {
                    Ok(line) => println!("{line}"),
                    Err(e) => {
                        log::error(&format!("Couldn't encode the game report: {e}"));
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error(&format!("{e}"));
            ExitCode::FAILURE
        }
    }
}
