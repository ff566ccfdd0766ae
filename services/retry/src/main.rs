use std::sync::Arc;

use sea_orm::Database;
use tracing::info;

use dunning_core::config::Config;
use dunning_core::tracing::init_tracing;

use dunning_retry::config::RetryConfig;
use dunning_retry::domain::port::NotifierRegistry;
use dunning_retry::infra::notifier::HttpNotifier;
use dunning_retry::infra::payment::HttpPaymentGateway;
use dunning_retry::router::build_router;
use dunning_retry::state::AppState;
use dunning_retry::worker::{daily_retry_driver, reminder_sweep_driver};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = RetryConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let gateway = HttpPaymentGateway::new(&config.payment_gateway_url, config.payment_timeout())
        .expect("failed to build payment gateway client");

    let mut notifiers = NotifierRegistry::new();
    for (channel, url) in config.notifier_urls() {
        let notifier = HttpNotifier::new(
            channel.as_str().to_ascii_lowercase(),
            url,
            config.notifier_timeout(),
        )
        .expect("failed to build notifier client");
        notifiers = notifiers.with(channel, Arc::new(notifier));
    }
    info!(channels = ?notifiers.channels(), "notifiers registered");

    let calendar = config.calendar().expect("invalid CALENDAR_HOLIDAYS");

    let state = AppState {
        db,
        gateway,
        notifiers,
        calendar: Arc::new(calendar),
        window: config.run_window(),
        payment_timeout: config.payment_timeout(),
        notifier_timeout: config.notifier_timeout(),
        reminder_batch_size: config.reminder_batch_size,
    };

    if config.workers_enabled {
        tokio::spawn(daily_retry_driver(state.clone()));
        tokio::spawn(reminder_sweep_driver(state.clone(), config.sweep_interval()));
        info!(
            run_time = %config.daily_run_time,
            timezone = %config.daily_run_timezone,
            "retry workers started"
        );
    }

    let router = build_router(state);
    let http_addr = format!("0.0.0.0:{}", config.retry_port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .expect("failed to bind");

    info!("retry service listening on {http_addr}");
    axum::serve(listener, router).await.expect("server error");
}
