use hostelhub::{config::Config, db, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    let db_pool = db::connect(&config.database_url).await?;

    let app = hostelhub::app(AppState { db_pool });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
