pub mod cursor;
pub mod retry;

use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::db::RecordSink;
use crate::document::Document;
use crate::report::{Locator, ReportLayout};
use cursor::TraversalCursor;
use retry::{LeafOutcome, LeafRetrier, RetryPolicy, SkipReason};

/// Everything a traversal run needs, handed over at construction.
pub struct RunContext<D, S> {
    pub document: D,
    pub sink: S,
    pub layout: ReportLayout,
    pub retry: RetryPolicy,
    pub settle_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLeaf {
    pub level1_order: usize,
    pub level2_order: usize,
    pub level3_order: usize,
    pub row: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub groups: usize,
    pub leaves: usize,
    pub persisted: usize,
    pub skipped: Vec<SkippedLeaf>,
}

/// Walks the three-level report top-down, one interaction at a time.
pub struct Traversal<D, S> {
    ctx: RunContext<D, S>,
    retrier: LeafRetrier,
    cursor: TraversalCursor,
    progress: ProgressBar,
}

impl<D: Document, S: RecordSink> Traversal<D, S> {
    pub fn new(ctx: RunContext<D, S>) -> Self {
        let retrier = LeafRetrier::new(ctx.retry);
        Self {
            ctx,
            retrier,
            cursor: TraversalCursor::default(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn cursor(&self) -> &TraversalCursor {
        &self.cursor
    }

    pub fn into_context(self) -> RunContext<D, S> {
        self.ctx
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let level1_count = self.ctx.document.count(Locator::GroupHeaders).await?;
        self.cursor = TraversalCursor::new(level1_count);
        info!("Report has {} level-1 groups", level1_count);

        let mut summary = RunSummary::default();
        for level1_order in 1..=level1_count {
            self.traverse_group(level1_order, &mut summary)
                .await
                .with_context(|| format!("Level-1 group {} of {}", level1_order, level1_count))?;
            summary.groups += 1;
        }

        self.ctx.sink.commit_all()?;
        self.progress.finish_and_clear();
        info!(
            "Traversal done: {} persisted, {} skipped across {} leaves",
            summary.persisted,
            summary.skipped.len(),
            summary.leaves
        );
        Ok(summary)
    }

    async fn traverse_group(&mut self, level1_order: usize, summary: &mut RunSummary) -> Result<()> {
        self.ctx.document.click(Locator::GroupToggle(level1_order)).await?;
        self.settle().await?;
        let total = self.ctx.document.count(Locator::Rows).await?;
        self.cursor.enter_group(level1_order, total, &self.ctx.layout);
        info!(
            "Group {}: {} level-2 rows ({} rows rendered)",
            level1_order, self.cursor.level2_count, total
        );

        for _ in 0..self.cursor.level2_count {
            let target = self.cursor.level2_target();
            debug!(
                "Expanding level-2 row {} of group {} at row {}",
                self.cursor.level2_order, level1_order, target
            );
            self.ctx.document.click(Locator::RowLink(target)).await?;
            self.settle().await?;
            let total = self.ctx.document.count(Locator::Rows).await?;
            self.cursor.enter_subgroup(total, &self.ctx.layout);
            debug!("{} leaves revealed ({} rows rendered)", self.cursor.level3_count, total);

            for _ in 0..self.cursor.level3_count {
                self.visit_leaf(summary).await?;
                self.cursor.level3_order += 1;
            }
            self.cursor.level2_order += 1;
        }
        Ok(())
    }

    async fn visit_leaf(&mut self, summary: &mut RunSummary) -> Result<()> {
        let target = self.cursor.level3_target();
        debug!("Opening leaf at row {}", target);
        summary.leaves += 1;

        match self.retrier.attempt_leaf(&mut self.ctx.document, target).await? {
            LeafOutcome::Extracted(record) => {
                self.ctx.sink.append(&record)?;
                summary.persisted += 1;
            }
            LeafOutcome::Skipped(reason) => summary.skipped.push(SkippedLeaf {
                level1_order: self.cursor.level1_order,
                level2_order: self.cursor.level2_order,
                level3_order: self.cursor.level3_order,
                row: target,
                reason,
            }),
        }
        self.progress.set_message(format!(
            "{} persisted, {} skipped",
            summary.persisted,
            summary.skipped.len()
        ));
        self.progress.tick();
        Ok(())
    }

    async fn settle(&mut self) -> Result<()> {
        self.ctx
            .document
            .wait_until_settled(self.ctx.settle_timeout)
            .await
            .context("Report did not settle after expanding a row; row counts would be unreliable")
    }
}

// ── Tests ──
