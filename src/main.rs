use clap::Parser;

use pixelrelay::cli::{Cli, Commands};
use pixelrelay::config::{get_config, init_config_from};
use pixelrelay::runtime::lifetime::install_crypto_provider;
use pixelrelay::runtime::modes;
use pixelrelay::storage::StorageFactory;
use pixelrelay::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.command == Some(Commands::GenerateConfig) {
        modes::print_sample_config();
        return Ok(());
    }

    dotenvy::dotenv().ok();
    init_config_from(&cli.config);
    let config = get_config();

    // guard 需存活到进程结束
    let _log_guard = init_logging(&config.logging)?;

    match cli.command {
        Some(Commands::Migrate) => {
            install_crypto_provider();
            let storage = StorageFactory::create().await.map_err(|e| {
                eprintln!("{}", e.format_colored());
                e
            })?;
            tracing::info!(
                "Migrations applied on {} backend",
                storage.info().storage_type
            );
            Ok(())
        }
        _ => modes::run_server().await,
    }
}
