mod args;
mod logging;
mod op;
mod ops;
mod state;
mod terminal;
mod version;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Connect, Forget, Init, Request, Version};
use state::{AppConfig, AppState};

command_enum! {
    (Connect, Connect),
    (Forget, Forget),
    (Init, Init),
    (Request, Request),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Log settings come from the config if one exists yet
    let config = AppState::load(args.config_path.clone())
        .map(|state| state.config)
        .unwrap_or_else(|_| AppConfig::default());
    let guards = logging::init_logging(
        logging::parse_level(&config.log_level),
        config.log_dir.as_deref(),
    );
    version::report_build_info();

    let ctx = op::OpContext::new(args.config_path);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    // Flush buffered log lines before exiting
    drop(guards);
    std::process::exit(code);
}
