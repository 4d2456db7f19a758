//! Deferred job queue with a dirty flag.
//!
//! Handles never touch pixels when a job is requested. Jobs are recorded
//! here and replayed, in order, the first time pixels are needed after a
//! change.
//!
//! ## Keys
//!
//! Every job has a [`JobKey`]. Enqueueing under an existing key replaces the
//! payload but keeps the key's original position, so:
//!
//! - resizes share the fixed [`JobKey::Resize`]; the latest parameters win
//!   and run where the first resize was requested;
//! - text jobs are keyed by a SHA-256 of all their parameters, so distinct
//!   strings (or the same string in different places) never collide, while an
//!   identical repeated call collapses into one.

use super::params::{BlockWidth, ResizeSpec, TextJob};
use sha2::{Digest, Sha256};

/// Identity of a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKey {
    Resize,
    WriteText(String),
}

/// A deferred operation on a handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Resize(ResizeSpec),
    WriteText(TextJob),
}

impl Job {
    pub fn key(&self) -> JobKey {
        match self {
            Self::Resize(_) => JobKey::Resize,
            Self::WriteText(job) => JobKey::WriteText(hash_text_job(job)),
        }
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resize(_) => "resize",
            Self::WriteText(_) => "text",
        }
    }
}

/// SHA-256 over every parameter of a text job.
pub fn hash_text_job(job: &TextJob) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"text\0");
    hasher.update(job.content.as_bytes());
    hasher.update(b"\0");
    hasher.update(job.font.as_bytes());
    hasher.update(b"\0");
    hasher.update(job.font_size.to_le_bytes());
    hasher.update([job.color.r, job.color.g, job.color.b]);
    match job.line_height {
        Some(lh) => {
            hasher.update(b"\x01");
            hasher.update(lh.to_le_bytes());
        }
        None => hasher.update(b"\x00"),
    }
    match job.block_width {
        BlockWidth::Canvas => hasher.update(b"canvas"),
        BlockWidth::Fixed(px) => {
            hasher.update(b"fixed");
            hasher.update(px.to_le_bytes());
        }
        BlockWidth::Auto => hasher.update(b"auto"),
    }
    hasher.update(job.position_x.to_le_bytes());
    hasher.update(job.position_y.to_le_bytes());
    hasher.update([job.align as u8, job.vertical_align as u8]);
    format!("{:x}", hasher.finalize())
}

/// Ordered, keyed job list owned by one handle.
#[derive(Debug, Clone, Default)]
pub struct ChangeQueue {
    entries: Vec<(JobKey, Job)>,
    dirty: bool,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a job and mark the queue dirty.
    ///
    /// A new key is appended. An existing key keeps its position and takes
    /// the new payload.
    pub fn enqueue(&mut self, key: JobKey, job: Job) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = job,
            None => self.entries.push((key, job)),
        }
        self.dirty = true;
    }

    pub fn get(&self, key: &JobKey) -> Option<&Job> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, job)| job)
    }

    /// Whether jobs changed since the last successful replay.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Record a successful replay. Jobs stay queued.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Jobs in replay order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.entries.iter().map(|(_, job)| job)
    }

    /// The jobs to run now, or `None` when nothing changed.
    ///
    /// The queue stays dirty until [`mark_clean`](Self::mark_clean), so a
    /// failed replay is retried on the next access.
    pub fn pending(&self) -> Option<Vec<Job>> {
        self.dirty.then(|| self.jobs().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every job and reset the dirty flag.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{Align, ResizeMethod};

    fn resize(w: Option<u32>, h: Option<u32>) -> Job {
        Job::Resize(ResizeSpec::new(w, h))
    }

    fn text(content: &str) -> Job {
        Job::WriteText(TextJob::new(content))
    }

    fn enqueue(queue: &mut ChangeQueue, job: Job) {
        queue.enqueue(job.key(), job);
    }

    // =========================================================================
    // Ordering and de-duplication
    // =========================================================================

    #[test]
    fn new_keys_append_in_order() {
        let mut q = ChangeQueue::new();
        enqueue(&mut q, text("a"));
        enqueue(&mut q, resize(Some(10), None));
        enqueue(&mut q, text("b"));

        let labels: Vec<&str> = q.jobs().map(Job::label).collect();
        assert_eq!(labels, vec!["text", "resize", "text"]);
    }

    #[test]
    fn same_key_replaces_in_place() {
        let mut q = ChangeQueue::new();
        enqueue(&mut q, resize(Some(100), None));
        enqueue(&mut q, text("caption"));
        enqueue(&mut q, resize(Some(100), Some(200)));

        assert_eq!(q.len(), 2);
        let jobs: Vec<&Job> = q.jobs().collect();
        assert_eq!(jobs[0], &resize(Some(100), Some(200)));
        assert_eq!(jobs[1], &text("caption"));
    }

    #[test]
    fn identical_text_jobs_collapse() {
        let mut q = ChangeQueue::new();
        enqueue(&mut q, text("same"));
        enqueue(&mut q, text("same"));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn text_jobs_differing_in_any_field_do_not_collide() {
        let base = TextJob::new("same");
        let variants = [
            TextJob {
                position_x: 1,
                ..base.clone()
            },
            TextJob {
                font_size: 13,
                ..base.clone()
            },
            TextJob {
                block_width: BlockWidth::Auto,
                ..base.clone()
            },
            TextJob {
                align: Align::Right,
                ..base.clone()
            },
            TextJob {
                line_height: Some(4.0),
                ..base.clone()
            },
        ];
        let base_key = hash_text_job(&base);
        for v in &variants {
            assert_ne!(hash_text_job(v), base_key, "{v:?}");
        }
    }

    #[test]
    fn resize_key_is_fixed() {
        let a = Job::Resize(ResizeSpec::new(Some(1), None));
        let b = Job::Resize(ResizeSpec::new(None, Some(2)).with_method(ResizeMethod::Crop));
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), JobKey::Resize);
    }

    // =========================================================================
    // Dirty flag
    // =========================================================================

    #[test]
    fn pending_only_when_dirty() {
        let mut q = ChangeQueue::new();
        assert!(q.pending().is_none());

        enqueue(&mut q, text("x"));
        assert_eq!(q.pending().map(|jobs| jobs.len()), Some(1));

        q.mark_clean();
        assert!(q.pending().is_none());
        // Contents survive a replay
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn enqueue_redirties() {
        let mut q = ChangeQueue::new();
        enqueue(&mut q, text("x"));
        q.mark_clean();
        enqueue(&mut q, text("y"));
        assert!(q.is_dirty());
        assert_eq!(q.pending().unwrap().len(), 2);
    }

    #[test]
    fn clear_empties_and_cleans() {
        let mut q = ChangeQueue::new();
        enqueue(&mut q, text("x"));
        q.clear();
        assert!(q.is_empty());
        assert!(!q.is_dirty());
    }

    #[test]
    fn get_by_key() {
        let mut q = ChangeQueue::new();
        enqueue(&mut q, resize(Some(5), None));
        assert_eq!(q.get(&JobKey::Resize), Some(&resize(Some(5), None)));
        assert_eq!(q.get(&JobKey::WriteText("nope".into())), None);
    }
}
