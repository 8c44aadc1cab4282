//! veild daemon binary entry point.

use clap::Parser;
use color_eyre::Result;

use veild::cli::args::Args;
use veild::{cli, config, logger};

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse arguments
    let args = Args::parse();

    // Resolve config directory (CLI flag > VEILD_CONFIG_DIR > default)
    let config_dir = config::resolve_config_dir(args.config_dir.as_ref());
    config::set_config_dir(config_dir.clone());

    // Load config.toml (or use defaults)
    let daemon_config = match config::load_config(&config_dir) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            eprintln!("Fix the file or remove it to use defaults:");
            eprintln!("  {}/config.toml", config_dir.display());
            std::process::exit(1);
        }
    };

    logger::configure(&daemon_config.log_level, daemon_config.max_log_entries);

    cli::commands::handle_command(&args.command, &daemon_config, &config_dir)
}
