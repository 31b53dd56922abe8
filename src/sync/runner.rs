//! Sequential sync over a candidate list

use super::{EntitySynchronizer, SyncStats};
use crate::paapi::ApiClient;
use rusqlite::Connection;
use std::fmt;

/// One product to sync, as selected by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub product_id: i64,
    pub external_id: String,
}

impl Candidate {
    pub fn new(product_id: i64, external_id: impl Into<String>) -> Self {
        Self {
            product_id,
            external_id: external_id.into(),
        }
    }
}

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub processed: usize,
    pub updated: usize,
    /// Updated, but variations could not be refreshed
    pub partial: usize,
    pub skipped: usize,
    pub errored: usize,
    pub brands_created: usize,
    pub variations: usize,
    pub categories: usize,
    pub features: usize,
    pub images: usize,
    pub review_summaries: usize,
    /// `(product_id, error message)` for every errored candidate
    pub failures: Vec<(i64, String)>,
}

impl RunStats {
    fn record(&mut self, stats: &SyncStats) {
        self.updated += 1;
        if stats.is_partial() {
            self.partial += 1;
        }
        if stats.brand_created {
            self.brands_created += 1;
        }
        self.variations += stats.variations;
        self.categories += stats.categories;
        self.features += stats.features;
        self.images += stats.images;
        if stats.review_summary {
            self.review_summaries += 1;
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Products processed:  {}", self.processed)?;
        writeln!(
            f,
            "Products updated:    {} ({} partial)",
            self.updated, self.partial
        )?;
        writeln!(f, "Skipped:             {}", self.skipped)?;
        writeln!(f, "Errors:              {}", self.errored)?;
        writeln!(f, "Brands created:      {}", self.brands_created)?;
        writeln!(f, "Variations written:  {}", self.variations)?;
        writeln!(f, "Categories linked:   {}", self.categories)?;
        writeln!(f, "Features written:    {}", self.features)?;
        writeln!(f, "Images written:      {}", self.images)?;
        write!(f, "Review summaries:    {}", self.review_summaries)?;
        for (product_id, message) in &self.failures {
            write!(f, "\n  product {}: {}", product_id, message)?;
        }
        Ok(())
    }
}

/// Runs [`EntitySynchronizer`] over candidates, one at a time
pub struct SyncRunner<'a> {
    synchronizer: EntitySynchronizer<'a>,
}

impl<'a> SyncRunner<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            synchronizer: EntitySynchronizer::new(client),
        }
    }

    /// Sync candidates in order, stopping after `max_count` of them
    ///
    /// Per-product failures are counted and logged; they never stop the run.
    pub async fn run(
        &self,
        conn: &mut Connection,
        candidates: &[Candidate],
        max_count: Option<usize>,
    ) -> RunStats {
        let total = max_count
            .map(|max| max.min(candidates.len()))
            .unwrap_or(candidates.len());
        let mut stats = RunStats::default();

        log::info!("Starting sync of {} product(s)", total);

        for (i, candidate) in candidates.iter().take(total).enumerate() {
            stats.processed += 1;
            let external_id = candidate.external_id.trim();

            if external_id.is_empty() {
                log::warn!(
                    "[{}/{}] Product {} has no external id, skipping",
                    i + 1,
                    total,
                    candidate.product_id
                );
                stats.skipped += 1;
                continue;
            }

            log::debug!(
                "[{}/{}] Syncing product {} ({})",
                i + 1,
                total,
                candidate.product_id,
                external_id
            );

            match self
                .synchronizer
                .sync(conn, candidate.product_id, external_id)
                .await
            {
                Ok(product_stats) => stats.record(&product_stats),
                Err(e) if e.is_skip() => {
                    log::warn!("[{}/{}] Skipped: {}", i + 1, total, e);
                    stats.skipped += 1;
                }
                Err(e) => {
                    log::warn!(
                        "[{}/{}] Product {} failed: {}",
                        i + 1,
                        total,
                        candidate.product_id,
                        e
                    );
                    stats.errored += 1;
                    stats.failures.push((candidate.product_id, e.to_string()));
                }
            }
        }

        log::info!(
            "Sync finished: {} updated, {} skipped, {} errors",
            stats.updated,
            stats.skipped,
            stats.errored
        );
        stats
    }
}
