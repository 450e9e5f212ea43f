use anyhow::Result;
use clap::Parser;
use oneapi_migrate::{Cli, Database, Migrator, Remapper, Settings, TABLES, logging};
use std::process::ExitCode;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match logging::init(&cli.log_level, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    };

    if cli.pause {
        println!("Press Enter to exit");
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    }
    code
}

async fn run(cli: &Cli) -> Result<bool> {
    let settings = Settings::from_cli(cli)?;
    info!(
        source = %settings.source.dialect,
        target = %settings.target.dialect,
        policy = ?settings.policy,
        "Resolved databases"
    );

    for (current, legacy) in settings.channel_types.ambiguous_targets() {
        debug!(current, ?legacy, "Several legacy channel types share one current type");
    }

    let source = Database::connect(&settings.source).await?;
    let target = Database::connect(&settings.target).await?;
    let migrator = Migrator::new(
        source,
        target,
        Remapper::with_channel_types(settings.channel_types),
    );

    let summary = migrator.run(&TABLES, settings.policy).await;

    if let Some(path) = &cli.report {
        summary.to_report().write_to(path).await?;
        info!(path = %path.display(), "Wrote run report");
    }

    Ok(summary.is_success())
}
