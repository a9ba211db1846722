use anyhow::Context;

use stockflow_infra::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    stockflow_observability::init(&settings.log.filter, settings.log.json);

    let services = stockflow_api::app::services::build_services(&settings).await?;
    let app = stockflow_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
