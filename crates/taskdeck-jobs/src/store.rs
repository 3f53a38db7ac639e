//! In-memory job registry keyed by job id.

use std::collections::{BTreeSet, HashMap, HashSet};

use taskdeck_types::Job;

/// Prefix of ids assigned to optimistic jobs before the server accepts them.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Whether `id` belongs to an optimistic, not yet accepted job.
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Result of merging one server record into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The id was unknown and the record was added.
    Inserted,
    /// The stored record moved forward or refreshed its progress.
    Updated { became_terminal: bool },
    /// The record matched what was already stored.
    Unchanged,
    /// The record would have moved the job backwards and was dropped.
    Stale,
}

/// Registry of jobs visible to callers.
///
/// Not synchronized on its own: the orchestrator owns it behind one mutex.
/// Every read hands out owned copies.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: HashMap<String, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job by id.
    pub fn add(&mut self, job: Job) {
        self.jobs.insert(job.id.clone(), job);
    }

    pub fn remove(&mut self, id: &str) -> Option<Job> {
        self.jobs.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// All jobs, oldest submission first.
    pub fn all(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        jobs
    }

    /// Jobs of one type, oldest submission first.
    pub fn by_type(&self, job_type: &str) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .values()
            .filter(|j| j.job_type == job_type)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        jobs
    }

    /// The job tracking `(job_type, dedup_key)`.
    ///
    /// A non-terminal match wins over finished ones; among equals the most
    /// recently submitted is returned.
    pub fn by_dedup_key(&self, job_type: &str, dedup_key: &str) -> Option<Job> {
        self.jobs
            .values()
            .filter(|j| j.job_type == job_type && j.dedup_key == dedup_key)
            .max_by(|a, b| {
                (!a.is_terminal(), a.submitted_at).cmp(&(!b.is_terminal(), b.submitted_at))
            })
            .cloned()
    }

    /// Types that still have at least one non-terminal job.
    pub fn pending_types(&self) -> BTreeSet<String> {
        self.jobs
            .values()
            .filter(|j| !j.is_terminal())
            .map(|j| j.job_type.clone())
            .collect()
    }

    pub fn has_pending(&self, job_type: &str) -> bool {
        self.jobs
            .values()
            .any(|j| j.job_type == job_type && !j.is_terminal())
    }

    /// Merge an authoritative record without letting the job move backwards.
    ///
    /// Status may only advance `Queued -> Processing|Active -> Completed|Failed`.
    /// A terminal status is final. Progress never decreases while the status
    /// stays the same.
    pub fn merge(&mut self, mut incoming: Job) -> MergeOutcome {
        let Some(existing) = self.jobs.get_mut(&incoming.id) else {
            self.jobs.insert(incoming.id.clone(), incoming);
            return MergeOutcome::Inserted;
        };

        if incoming.status.rank() < existing.status.rank()
            || (existing.is_terminal() && incoming.status != existing.status)
        {
            return MergeOutcome::Stale;
        }

        if incoming.dedup_key.is_empty() {
            incoming.dedup_key = existing.dedup_key.clone();
        }
        // Submission and completion times are fixed once recorded.
        incoming.submitted_at = existing.submitted_at;
        if existing.completed_at.is_some() {
            incoming.completed_at = existing.completed_at;
        }
        if incoming.status == existing.status && !incoming.is_terminal() {
            incoming.progress = incoming.progress.max(existing.progress);
        }
        if incoming == *existing {
            return MergeOutcome::Unchanged;
        }

        let became_terminal = !existing.is_terminal() && incoming.is_terminal();
        *existing = incoming;
        MergeOutcome::Updated { became_terminal }
    }

    /// Drop server-confirmed jobs missing from an authoritative snapshot.
    ///
    /// Limited to `job_type` when given. Optimistic jobs are kept because the
    /// server cannot know about them yet. Returns the number removed.
    pub fn prune_missing(&mut self, job_type: Option<&str>, keep: &HashSet<String>) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|id, job| {
            let in_scope = job_type.is_none_or(|t| job.job_type == t);
            !in_scope || is_temp_id(id) || keep.contains(id)
        });
        before - self.jobs.len()
    }

    /// Ids of confirmed jobs of `job_type` that are still pending.
    pub fn pending_ids(&self, job_type: &str) -> HashSet<String> {
        self.jobs
            .values()
            .filter(|j| j.job_type == job_type && !j.is_terminal() && !is_temp_id(&j.id))
            .map(|j| j.id.clone())
            .collect()
    }

    /// Drop pending jobs from `known` that a fresh snapshot no longer reports.
    ///
    /// Jobs outside `known` are never touched, so a job confirmed while the
    /// snapshot was in flight survives. Finished jobs are kept.
    pub fn drop_vanished(&mut self, known: &HashSet<String>, reported: &HashSet<String>) -> Vec<Job> {
        let vanished: Vec<String> = known
            .iter()
            .filter(|id| !reported.contains(*id))
            .filter(|id| self.jobs.get(*id).is_some_and(|j| !j.is_terminal()))
            .cloned()
            .collect();
        vanished.iter().filter_map(|id| self.jobs.remove(id)).collect()
    }

    /// Remove finished jobs of one type. Returns the number removed.
    pub fn clear_finished(&mut self, job_type: &str) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| job.job_type != job_type || !job.is_terminal());
        before - self.jobs.len()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}
