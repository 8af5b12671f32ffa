use clap::{Parser, Subcommand};
use git_ai_segments::commands::replay::{ReplayArgs, handle_replay};

#[derive(Parser)]
#[command(name = "git-ai-segments")]
#[command(about = "Track human editing sessions in a stream of document changes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON-lines log of change notifications and print closed segments
    Replay(ReplayArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Replay(args) => match handle_replay(&args) {
            Ok(summary) => {
                eprintln!(
                    "Replayed {} events, {} segments closed",
                    summary.events, summary.closed_segments
                );
            }
            Err(e) => {
                eprintln!("Replay failed: {}", e);
                std::process::exit(1);
            }
        },
    }
}
