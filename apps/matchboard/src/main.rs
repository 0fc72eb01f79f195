use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use matchboard::models::Notification;
use matchboard::{seed, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Matchboard v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Data dir {}, strong match threshold {}, policy {:?}",
        config.data_dir.display(),
        config.strong_match_threshold,
        config.strong_match_policy
    );

    let state = AppState::from_config(config)?;

    let (jobs, candidates) = state.load_dataset(seed::demo_dataset()?);
    info!("Seeded {jobs} job postings and {candidates} candidates");

    // Initial cycle inline so the first page reflects the seed
    let initial = state.producer.clone();
    let report = tokio::task::spawn_blocking(move || initial.run_cycle()).await?;
    if report.persist_failures > 0 {
        warn!("{} notifications were not persisted", report.persist_failures);
    }
    let producer = state.spawn_producer();

    print_feed(&state).await;

    info!("Press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    producer.shutdown().await;
    if let Err(e) = state.notifications.flush() {
        warn!("Final flush of notification log failed: {e}");
    }
    Ok(())
}

async fn print_feed(state: &AppState) {
    let page = state.notifications.load_next_chunk();
    println!(
        "Notifications ({} of {}, {} unread)",
        page.items.len(),
        page.total,
        state.notifications.unread_count()
    );
    for notification in &page.items {
        println!("{}", format_notification(notification));
    }
    if page.has_more() {
        println!("  ... {} more", page.total - page.start - page.items.len());
    }

    for job in state.attributes.list_job_postings() {
        let top = match state.engine.top_matches(&job.id, 3) {
            Ok(top) => top,
            Err(e) => {
                warn!("Skipping job {}: {e}", job.id);
                continue;
            }
        };
        let ranked: Vec<String> = top.iter().map(|(id, score)| format!("{id} ({score}%)")).collect();
        println!("Top matches for {} [{}]: {}", job.title, job.id, ranked.join(", "));

        if let Some((candidate_id, _)) = top.first() {
            match state.detailed_match(&job.id, candidate_id).await {
                Ok(detail) => println!("  {}", detail.explanation),
                Err(e) => warn!("No detail for {}/{candidate_id}: {e}", job.id),
            }
        }
    }
}

fn format_notification(n: &Notification) -> String {
    let marker = if n.read { ' ' } else { '*' };
    format!(
        "{marker} [{}] {}: {}",
        n.timestamp.format("%Y-%m-%d %H:%M:%S"),
        n.title,
        n.message
    )
}
