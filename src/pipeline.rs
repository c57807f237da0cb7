use crate::config::RelayConfig;
use crate::links::extract_asin;
use crate::models::{PublishedLink, RunReport, SkipReason, SkippedLink, StageReport};
use crate::product::ProductLookup;
use crate::publisher::{MessageSink, Publisher, TagRotation};
use crate::resolver::LinkResolver;
use crate::scanner::{ConversationSource, DialogScanner, ScanError};
use crate::store::{RelayMemory, StoreError};
use serde_json::{Value, json};
use std::{future::Future, path::PathBuf, time::Instant};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("stage `scan_dialogs` failed: {0}")]
    Scan(#[from] ScanError),
    #[error("stage `save_memory` failed: {0}")]
    Persist(#[from] StoreError),
}

impl RelayError {
    pub fn stage(&self) -> &'static str {
        match self {
            RelayError::Scan(_) => "scan_dialogs",
            RelayError::Persist(_) => "save_memory",
        }
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}

/// One scan-and-republish pass: load memory, collect new links, post them,
/// then persist memory once at the end.
pub struct Relay<R, P, S> {
    scanner: DialogScanner,
    resolver: R,
    products: P,
    sink: S,
    affiliate_tags: Vec<String>,
    state_file: PathBuf,
    dry_run: bool,
}

impl<R, P, S> Relay<R, P, S>
where
    R: LinkResolver,
    P: ProductLookup,
    S: MessageSink,
{
    pub fn new(config: &RelayConfig, resolver: R, products: P, sink: S) -> Self {
        Self {
            scanner: DialogScanner::new(config.scan),
            resolver,
            products,
            sink,
            affiliate_tags: config.affiliate_tags.clone(),
            state_file: config.state_file.clone(),
            dry_run: config.dry_run,
        }
    }

    pub async fn run<C: ConversationSource>(&self, source: &C) -> Result<RunReport, RelayError> {
        let run_id = Uuid::new_v4().simple().to_string();
        let mut stages = Vec::new();

        let mut memory = capture_stage("load_memory", &mut stages, async {
            let memory = RelayMemory::load(&self.state_file);
            let output = json!({
                "links": memory.links.len(),
                "last_index": memory.last_index,
            });
            Ok::<_, RelayError>(StageOutcome::new(memory, output))
        })
        .await?;

        let candidates = capture_stage("scan_dialogs", &mut stages, async {
            let links = self.scanner.scan(source, &self.resolver, &memory).await?;
            let output = json!({ "candidates": links.len() });
            Ok::<_, RelayError>(StageOutcome::new(links, output))
        })
        .await?;

        let rotation = TagRotation::new(self.affiliate_tags.clone(), memory.last_index);
        let mut publisher = Publisher::new(&self.sink, rotation);
        let (published, skipped) = capture_stage("publish", &mut stages, async {
            let mut published = Vec::new();
            let mut skipped = Vec::new();
            for link in &candidates {
                let details = match self.products.fetch_details(link).await {
                    Ok(details) => details,
                    Err(err) => {
                        warn!(
                            target = "relay.pipeline",
                            url = %link,
                            error = %err,
                            "product fetch failed"
                        );
                        crate::metrics::inc_skipped("fetch_failed");
                        skipped.push(SkippedLink {
                            url: link.clone(),
                            reason: SkipReason::FetchFailed,
                            detail: err.to_string(),
                        });
                        continue;
                    }
                };

                if self.dry_run {
                    let tag = publisher.rotation().active().to_string();
                    info!(
                        target = "relay.pipeline",
                        url = %link,
                        tag = %tag,
                        title = %details.title,
                        "dry run, not posting"
                    );
                    published.push(PublishedLink {
                        url: link.clone(),
                        asin: extract_asin(link),
                        tag,
                        title: details.title,
                    });
                    continue;
                }

                match publisher.publish(&details).await {
                    Ok(tag) => {
                        crate::metrics::inc_published(&tag);
                        memory.record(link.clone());
                        published.push(PublishedLink {
                            url: link.clone(),
                            asin: extract_asin(link),
                            tag,
                            title: details.title,
                        });
                    }
                    Err(err) => {
                        warn!(
                            target = "relay.pipeline",
                            url = %link,
                            error = %err,
                            "send failed"
                        );
                        crate::metrics::inc_skipped("send_failed");
                        skipped.push(SkippedLink {
                            url: link.clone(),
                            reason: SkipReason::SendFailed,
                            detail: err.to_string(),
                        });
                    }
                }
            }
            let output = json!({
                "published": published.len(),
                "skipped": skipped.len(),
            });
            Ok::<_, RelayError>(StageOutcome::new((published, skipped), output))
        })
        .await?;

        memory.last_index = publisher.rotation().index();

        if !self.dry_run {
            capture_stage("save_memory", &mut stages, async {
                if self.affiliate_tags.len() > 1 {
                    memory.save(&self.state_file)?;
                } else {
                    memory.save_links(&self.state_file)?;
                }
                let output = json!({
                    "links": memory.links.len(),
                    "last_index": memory.last_index,
                    "path": self.state_file.display().to_string(),
                });
                Ok::<_, RelayError>(StageOutcome::new((), output))
            })
            .await?;
        }

        Ok(RunReport {
            run_id,
            dry_run: self.dry_run,
            candidates: candidates.len(),
            published,
            skipped,
            next_tag_index: memory.last_index,
            stages,
        })
    }
}

async fn capture_stage<T, Fut>(
    name: &'static str,
    stages: &mut Vec<StageReport>,
    fut: Fut,
) -> Result<T, RelayError>
where
    Fut: Future<Output = Result<StageOutcome<T>, RelayError>>,
{
    let started = Instant::now();
    let outcome = fut.await?;
    let elapsed_ms = started.elapsed().as_millis();
    crate::metrics::stage_elapsed(name, elapsed_ms);
    stages.push(StageReport::new(name, elapsed_ms, outcome.output));
    Ok(outcome.value)
}
