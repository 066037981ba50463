use packscout::cli::commands::{CliArgs, Commands};
use packscout::cli::handlers::{
    handle_checksum, handle_classify, handle_config, handle_regenerate, handle_render,
    handle_scan, handle_verify,
};
use packscout::util::logging::{init_logging, parse_level, LoggingConfig};
use packscout::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("packscout v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Render(render_args) => handle_render(render_args),
        Commands::Verify(verify_args) => handle_verify(verify_args),
        Commands::Regenerate(regenerate_args) => handle_regenerate(regenerate_args),
        Commands::Classify(classify_args) => handle_classify(classify_args),
        Commands::Scan(scan_args) => handle_scan(scan_args),
        Commands::Checksum(checksum_args) => handle_checksum(checksum_args),
        Commands::Config(config_args) => handle_config(config_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("PACKSCOUT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let use_json = env::var("PACKSCOUT_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level,
        use_json,
        ..LoggingConfig::default()
    });
}
