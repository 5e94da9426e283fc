//! Eager per-filter-option precomputation.
//!
//! Switching a discrete filter (typically the time-window axis) must be a
//! cache lookup, not a recomputation. The default option is computed
//! synchronously; every other option is queued as low-priority deferred work
//! the owner drains cooperatively between frames, so first paint never waits
//! on full warm-up. The whole cache invalidates when the upstream dataset
//! identity changes.

use crate::error::PipelineError;
use crate::models::SeriesView;
use ahash::AHashMap;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct PrecomputeCache {
    identity: Option<u64>,
    entries: AHashMap<String, SeriesView>,
    pending: VecDeque<String>,
}

impl PrecomputeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild for a new dataset identity. Computes `default_option` now and
    /// queues the remaining options for deferred warming.
    pub fn rebuild<F>(
        &mut self,
        identity: u64,
        options: &[String],
        default_option: &str,
        mut compute: F,
    ) -> Result<(), PipelineError>
    where
        F: FnMut(&str) -> Result<SeriesView, PipelineError>,
    {
        self.invalidate();
        self.identity = Some(identity);
        self.entries
            .insert(default_option.to_string(), compute(default_option)?);
        self.pending = options
            .iter()
            .filter(|o| o.as_str() != default_option)
            .cloned()
            .collect();
        log::debug!(
            "precompute rebuilt for dataset {identity}: 1 ready, {} queued",
            self.pending.len()
        );
        Ok(())
    }

    /// Compute one queued option. Returns whether work remains.
    pub fn warm_step<F>(&mut self, mut compute: F) -> Result<bool, PipelineError>
    where
        F: FnMut(&str) -> Result<SeriesView, PipelineError>,
    {
        if let Some(option) = self.pending.pop_front() {
            let view = compute(&option)?;
            self.entries.insert(option, view);
        }
        Ok(!self.pending.is_empty())
    }

    /// Drain the warm queue completely.
    pub fn warm_all<F>(&mut self, mut compute: F) -> Result<(), PipelineError>
    where
        F: FnMut(&str) -> Result<SeriesView, PipelineError>,
    {
        while self.warm_step(&mut compute)? {}
        Ok(())
    }

    pub fn get(&self, option: &str) -> Option<&SeriesView> {
        self.entries.get(option)
    }

    /// Cached view for an option, computing and storing it on miss. Lets a
    /// selection land on a not-yet-warmed option without waiting for the
    /// queue to reach it.
    pub fn ensure<F>(&mut self, option: &str, mut compute: F) -> Result<&SeriesView, PipelineError>
    where
        F: FnMut(&str) -> Result<SeriesView, PipelineError>,
    {
        if !self.entries.contains_key(option) {
            let view = compute(option)?;
            self.entries.insert(option.to_string(), view);
            self.pending.retain(|o| o != option);
        }
        Ok(&self.entries[option])
    }

    /// True when the cache was built against this dataset identity.
    pub fn matches(&self, identity: u64) -> bool {
        self.identity == Some(identity)
    }

    pub fn is_warm(&self) -> bool {
        self.pending.is_empty() && !self.entries.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop every entry and all queued work.
    pub fn invalidate(&mut self) {
        self.identity = None;
        self.entries.clear();
        self.pending.clear();
    }
}
