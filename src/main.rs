mod config;
mod http;
mod links;
mod metrics;
mod models;
mod pipeline;
mod product;
mod publisher;
mod resolver;
mod scanner;
mod store;
mod telegram;

use config::RelayConfig;
use pipeline::Relay;
use product::ProductFetcher;
use resolver::HttpResolver;
use telegram::{BotClient, UserSession};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "relay", "run failed: {err}");
    }
}

async fn run() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            warn!(target = "relay", "missing secrets, nothing to do: {err}");
            return Ok(());
        }
    };

    let resolver = HttpResolver::new(config.http.resolve_timeout, &config.http.user_agent);
    let products = ProductFetcher::new(config.http.fetch_timeout, &config.http.user_agent);
    let bot = BotClient::new(&config.telegram, &config.http.user_agent);
    let relay = Relay::new(&config, resolver, products, bot);

    let session = UserSession::connect(&config.telegram).await?;
    let outcome = relay.run(&session).await;
    if let Err(err) = session.close() {
        warn!(target = "relay.telegram", error = %err, "session save failed");
    }
    if let Err(err) = &outcome {
        error!(target = "relay", stage = err.stage(), "relay aborted");
    }
    let report = outcome?;

    info!(
        target = "relay",
        run_id = %report.run_id,
        dry_run = report.dry_run,
        candidates = report.candidates,
        published = report.published.len(),
        skipped = report.skipped.len(),
        next_tag_index = report.next_tag_index,
        "run complete"
    );
    let rendered = serde_json::to_string_pretty(&report)?;
    debug!(target = "relay", "run report:\n{rendered}");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
