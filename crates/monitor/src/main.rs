use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use futures::FutureExt;
use monitor::alerts::{AlertClassifier, AlertDispatcher, Renderer, TestAlertSender};
use monitor::analytics::AnalyticsComputer;
use monitor::memory::MemoryStores;
use monitor::rate_limit::InMemoryRateLimiter;
use monitor::transports::{HttpWebhook, NoopEmail};

/// Monitor is a daemon which evaluates pipeline alerts and serves
/// pipeline analytics.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// The port to listen on for API requests.
    #[clap(long, default_value = "8675", env = "API_PORT")]
    api_port: u16,
    /// Shared key required of /alerts/evaluate callers. Unset disables the
    /// check.
    #[clap(long, env = "EVALUATE_API_KEY")]
    evaluate_api_key: Option<String>,
    /// Timeout for outbound webhook deliveries, in seconds.
    #[clap(long, default_value = "10", env = "WEBHOOK_TIMEOUT_SECONDS")]
    webhook_timeout_seconds: u64,
    /// Path to a JSON file of pipelines to register at startup.
    #[clap(long, env = "PIPELINES_FILE")]
    pipelines: Option<String>,
}

fn main() -> Result<(), anyhow::Error> {
    // Use reasonable defaults for printing structured logs to stderr.
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();
    tracing::info!(?args, "started!");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let task = runtime.spawn(async move { async_main(args).await });
    let result = runtime.block_on(task);

    tracing::info!(?result, "main function completed, shutting down runtime");
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result?
}

async fn async_main(args: Args) -> Result<(), anyhow::Error> {
    let stores = Arc::new(MemoryStores::default());
    if let Some(path) = &args.pipelines {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipelines file {path}"))?;
        let pipelines: Vec<models::Pipeline> =
            serde_json::from_str(&raw).context("parsing pipelines file")?;
        tracing::info!(count = pipelines.len(), "registering pipelines");
        for pipeline in pipelines {
            stores.insert_pipeline(pipeline);
        }
    }

    let email = Arc::new(NoopEmail);
    let webhook = Arc::new(
        HttpWebhook::new(std::time::Duration::from_secs(args.webhook_timeout_seconds))
            .context("building webhook transport")?,
    );

    let dispatcher = AlertDispatcher::new(
        stores.clone(),
        stores.clone(),
        stores.clone(),
        AlertClassifier::new(stores.clone(), stores.clone()),
        email.clone(),
        webhook.clone(),
        Renderer::try_new().context("building alert renderer")?,
    );
    let analytics = AnalyticsComputer::new(stores.clone(), stores.clone());
    let test_alerts = TestAlertSender::new(
        stores.clone(),
        stores.clone(),
        stores.clone(),
        email,
        webhook,
        Arc::new(InMemoryRateLimiter::default()),
    );

    let app = Arc::new(monitor::api::App {
        registry: stores.clone(),
        preferences: stores.clone(),
        history: stores.clone(),
        sla: stores.clone(),
        dispatcher,
        analytics,
        test_alerts,
        evaluate_api_key: args.evaluate_api_key,
    });

    // Share-able future which completes when the daemon should exit.
    let shutdown = tokio::signal::ctrl_c().map(|_| ()).shared();

    let listener = tokio::net::TcpListener::bind(format!("[::]:{}", args.api_port))
        .await
        .context("failed to bind server port")?;
    tracing::info!(port = args.api_port, "serving API");

    axum::serve(listener, monitor::api::build_router(app))
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving API")?;

    Ok(())
}
