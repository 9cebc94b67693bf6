use clap::Parser;
use slot_transfer::domain::model::CommunityId;
use slot_transfer::utils::error::ErrorSeverity;
use slot_transfer::utils::{logger, validation::Validate};
use slot_transfer::{
    CliConfig, HttpRemoteClient, InMemoryRemote, Orchestrator, RemoteClient, RunOutcome,
    TransferError, TransferRequest, TransferSettings,
};
use std::sync::Arc;

const DRY_RUN_TARGET: &str = "dry-run-target";

async fn execute<C: RemoteClient + 'static>(
    client: Arc<C>,
    settings: TransferSettings,
    request: &TransferRequest,
) -> slot_transfer::Result<RunOutcome> {
    Orchestrator::new(client, settings).execute(request).await
}

fn report_failure(e: &TransferError) -> ! {
    tracing::error!(
        "❌ Transfer failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    if e.may_leave_partial_state() {
        tracing::warn!("⚠️ The community slot list may have been partially modified");
    }
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 4,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("Starting slot-transfer");

    if let Err(e) = cli.validate() {
        report_failure(&e);
    }
    let config = match cli.merged() {
        Ok(config) => config,
        Err(e) => report_failure(&e),
    };
    let settings = config.transfer_settings();
    let request = cli.request();

    let result = if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - transferring against an in-memory community");
        let remote = Arc::new(
            InMemoryRemote::new(settings.slot_capacity, i64::from(request.total_count))
                .with_link(&request.reference, DRY_RUN_TARGET, CommunityId(0)),
        );
        let result = execute(remote.clone(), settings, &request).await;
        for call in remote.calls() {
            println!("  {:?}", call);
        }
        result
    } else {
        let remote_settings = match config.remote_settings() {
            Ok(remote_settings) => remote_settings,
            Err(e) => report_failure(&e),
        };
        let client = Arc::new(HttpRemoteClient::new(remote_settings)?);
        execute(client, settings, &request).await
    };

    match result {
        Ok(outcome) => {
            println!("✅ Transfer completed, balance: {}", outcome.final_balance);
            if outcome.failed_units_after_retry > 0 {
                println!(
                    "⚠️ {} unit(s) could not be transferred",
                    outcome.failed_units_after_retry
                );
            }
            Ok(())
        }
        Err(e) => report_failure(&e),
    }
}
