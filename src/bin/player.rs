use clap::Parser;
use potato_ring::{chooser::Chooser, join_ring, log, Player, PlayerConfig};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "player", about = "Joins a ringmaster's ring and plays hot potato")]
struct Cli {
    /// Host name or address of the ringmaster.
    ringmaster_host: String,

    /// Port the ringmaster listens on.
    ringmaster_port: u16,

    /// Seed for the neighbor coin.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = PlayerConfig {
        host: cli.ringmaster_host,
        port: cli.ringmaster_port,
    };

    let chooser = match cli.seed {
        Some(seed) => Chooser::from_u64(seed),
        None => Chooser::for_process(),
    };
    let mut player = Player::new(chooser);

    let outcome = async {
        let mut ctx = join_ring(&config).await?;
        player.play(&mut ctx).await
    }
    .await;

    match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error(&format!("{e}"));
            ExitCode::FAILURE
        }
    }
}
