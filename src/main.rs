use app_autoscaler::{
    app::AppPlatformClient,
    config::Config,
    control::ControlLoop,
    metric::PrometheusSource,
    status::{ScalingStatus, spawn_status_server},
};
use tracing::{error, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("app_autoscaler", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init();

    // any configuration or runtime failure ends the process here
    if let Err(e) = run().await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    trace!("loaded config for app {}", config.app_id);

    let status = ScalingStatus::new();
    spawn_status_server(config.bind_port, status.clone()).await?;

    let metrics = PrometheusSource::new(
        config.prometheus_host.clone(),
        config.prometheus_metric.clone(),
    );
    let target = AppPlatformClient::new(config.api_token.clone(), config.app_id.clone(), status);

    ControlLoop::new(config, metrics, target).run().await
}
