//! AuditLog - persistent audit trail
//!
//! ## Responsibilities
//!
//! - Append one `events` row per status bit transition
//! - Append one `video_segments` row per completed extraction
//! - Decouple emitters from the database: appends go through a queue
//!   drained by a single writer task, so no control loop ever blocks on or
//!   fails because of the store

mod repository;

pub use repository::AuditRepository;

use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Write-side interface to the audit trail, injected at construction.
pub trait AuditSink: Send + Sync {
    /// Record one state transition.
    fn record_event(&self, description: &str, at: DateTime<Utc>);

    /// Record one completed segment extraction.
    fn record_segment(
        &self,
        camera_id: usize,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        filename: &str,
    );
}

#[derive(Debug)]
enum AuditEntry {
    Event {
        description: String,
        at: DateTime<Utc>,
    },
    Segment {
        camera_id: usize,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        filename: String,
    },
}

/// Queue-backed [`AuditSink`] writing to MySQL.
pub struct AuditLog {
    tx: mpsc::UnboundedSender<AuditEntry>,
}

impl AuditLog {
    /// Start the writer task. The task ends once every `AuditLog` clone is
    /// dropped and the queue is drained; await the handle during shutdown.
    pub fn start(pool: MySqlPool) -> (Arc<Self>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let repo = AuditRepository::new(pool);

        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                let result = match &entry {
                    AuditEntry::Event { description, at } => {
                        repo.insert_event(description, *at).await
                    }
                    AuditEntry::Segment {
                        camera_id,
                        start,
                        stop,
                        filename,
                    } => repo.insert_segment(*camera_id, *start, *stop, filename).await,
                };

                if let Err(e) = result {
                    tracing::error!(error = %e, ?entry, "Audit row append failed");
                }
            }
            tracing::info!("Audit writer stopped");
        });

        (Arc::new(Self { tx }), handle)
    }
}

impl AuditSink for AuditLog {
    fn record_event(&self, description: &str, at: DateTime<Utc>) {
        let entry = AuditEntry::Event {
            description: description.to_string(),
            at,
        };
        if self.tx.send(entry).is_err() {
            tracing::warn!(event = description, "Audit writer gone, event dropped");
        }
    }

    fn record_segment(
        &self,
        camera_id: usize,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        filename: &str,
    ) {
        let entry = AuditEntry::Segment {
            camera_id,
            start,
            stop,
            filename: filename.to_string(),
        };
        if self.tx.send(entry).is_err() {
            tracing::warn!(camera_id, "Audit writer gone, segment entry dropped");
        }
    }
}
