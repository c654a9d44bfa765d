use std::process::ExitCode;

use chrono::Local;
use clap::Parser;

use warehouse_generator::{app, Cli};
use warehouse_infra::GeneratorConfig;
use warehouse_inventory::WindowCatalog;
use warehouse_observability::LoggingContext;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match GeneratorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("warehouse-reports: {err}");
            return ExitCode::FAILURE;
        }
    };
    let catalog = match WindowCatalog::new(&config.trailing_days) {
        Ok(catalog) => catalog,
        Err(err) => {
            eprintln!("warehouse-reports: REPORT_TRAILING_DAYS: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = cli.validate(&catalog) {
        err.exit();
    }

    if let Err(err) = app::ensure_dir(&config.log_dir, config.dir_mode()) {
        eprintln!(
            "warehouse-reports: cannot create log directory {}: {err}",
            config.log_dir.display()
        );
        return ExitCode::FAILURE;
    }
    let _logging = match LoggingContext::init(&config.log_dir) {
        Ok(logging) => logging,
        Err(err) => {
            eprintln!("warehouse-reports: {err}");
            return ExitCode::FAILURE;
        }
    };

    let today = Local::now().date_naive();
    match app::generate(&config, &catalog, &cli.windows, today).await {
        Ok(summary) if summary.is_failure(config.failure_policy) => {
            tracing::error!(
                failed = summary.failed.len(),
                succeeded = summary.succeeded.len(),
                policy = ?config.failure_policy,
                "report generation failed"
            );
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "report generation aborted");
            ExitCode::FAILURE
        }
    }
}
