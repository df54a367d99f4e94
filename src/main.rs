use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studytrack::api::router;
use studytrack::build_state;
use studytrack::config::AppConfig;
use studytrack::services::AlertScheduler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "studytrack=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let pool = studytrack::db::connect(&config.database_url, 5).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = build_state(pool, config.thresholds);

    if config.alert_interval_secs > 0 {
        let scheduler = AlertScheduler::new(state.overview.clone(), config.alert_interval_secs);
        tokio::spawn(scheduler.start());
    }

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
