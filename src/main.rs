use clap::Parser;
use dragen_aligner_core::{Cli, Commands, map_process};

fn main() {
    env_logger::init();
    let args = Cli::parse();

    let result = match args.command {
        Commands::Map(cmd_args) => map_process(cmd_args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
