use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use notify_relay::api::{self, api_routes};
use notify_relay::config::{AppConfig, NotifierKind};
use notify_relay::dispatch::{DispatchRegistry, NotificationHandler};
use notify_relay::lifecycle::{Lifecycle, wait_for_signal};
use notify_relay::log::{MemoryBroker, RequiredAcks};
use notify_relay::notify::{ConsoleNotifier, Notifier, TelegramNotifier};
use notify_relay::pipeline::{ConsumerLoop, ConsumerOptions, DeadLetterForwarder};
use notify_relay::publisher::Publisher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    // Flushes buffered log lines when dropped at the end of main.
    let _log_guard = init_tracing(config.is_production());

    eprintln!("📨 Notify Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Environment: {}", config.environment);
    eprintln!("   Topics: {} (dead-letter: {})", config.notifications_topic, config.dead_letter_topic);
    eprintln!("   HTTP: http://0.0.0.0:{}\n", config.port);

    for key in &config.ignored {
        warn!(key = *key, "Publish retries are not supported, ignoring");
    }

    // ── Log ─────────────────────────────────────────────────────────────
    let broker = MemoryBroker::new(config.partitions);
    info!(partitions = broker.partitions(), "In-process log ready");

    // ── Notifier ────────────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = match config.notifier {
        NotifierKind::Console => Arc::new(ConsoleNotifier::new()),
        NotifierKind::Telegram => {
            let token = config
                .telegram_bot_token
                .clone()
                .context("TELEGRAM_BOT_TOKEN is not set")?;
            let telegram = TelegramNotifier::new(token)?.with_api_base(&config.telegram_api_base);
            let username = telegram
                .verify()
                .await
                .context("Failed to create Telegram bot")?;
            info!(username = %username, "Authorized on Telegram account");
            Arc::new(telegram)
        }
    };

    // ── Producer side ───────────────────────────────────────────────────
    let publisher = Arc::new(Publisher::new(Box::new(
        broker.writer(&config.notifications_topic, RequiredAcks::One),
    )));

    // ── Consumer side ───────────────────────────────────────────────────
    let registry =
        DispatchRegistry::new().with_handler(Arc::new(NotificationHandler::new(notifier)));
    let dead_letter = DeadLetterForwarder::new(Box::new(
        broker.writer(&config.dead_letter_topic, RequiredAcks::One),
    ));
    let consumer = ConsumerLoop::new(
        Box::new(broker.reader(&config.notifications_topic, &config.group_id)),
        registry,
        dead_letter,
        ConsumerOptions {
            handler_timeout: config.handler_timeout,
            ..Default::default()
        },
    );

    // ── Tasks ───────────────────────────────────────────────────────────
    let lifecycle = Lifecycle::new();
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to listen on port {}", config.port))?;

    let consumer_task = tokio::spawn(consumer.run(lifecycle.token()));
    let server_task = tokio::spawn(api::serve(
        listener,
        api_routes(Arc::clone(&publisher)),
        lifecycle.token(),
    ));
    info!(port = config.port, "Server started");

    let report = lifecycle
        .shutdown(wait_for_signal(), server_task, consumer_task)
        .await
        .inspect_err(|e| error!(error = %e, "Shutdown failed"))?;

    publisher.close().await;
    broker.close();
    info!(summary = ?report.consumer, elapsed = ?report.elapsed, "Relay stopped");
    Ok(())
}

fn init_tracing(json: bool) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(writer);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    guard
}
