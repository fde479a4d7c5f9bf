//! Sample process: creates one account and prints the account report.

use app::{AppError, Config};
use domain::CreateAccount;
use projections::{AccountReportView, ReadModel};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    app::init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the event store and wire the context
    let store = app::open_store(&config).await?;
    let report = AccountReportView::new();
    let context = app::build_context(store, &config, &report)?;

    // 4. Run the sample command
    let account_id = context
        .send(CreateAccount::new("Darren", "Cauthon"))
        .await?;
    tracing::info!(%account_id, "account created");

    for row in report.rows().await {
        tracing::info!(
            id = %row.id,
            name = row.name.as_deref().unwrap_or("<unnamed>"),
            "account report row"
        );
    }
    tracing::info!(rows = report.count(), "account report complete");

    tracing::info!("metrics snapshot:\n{}", metrics_handle.render());
    Ok(())
}
