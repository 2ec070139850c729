//! Volatile mapping from job id to a live push-channel descriptor.
//!
//! The registry lives in the channel provider's process and does not
//! survive restarts; a missing entry is the normal state for any job whose
//! client has disconnected (or never attached).

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::store::JobStore;

/// Address of one live client connection: the channel endpoint plus the
/// session token identifying the connection on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub connection_id: String,
    pub channel_address: String,
}

/// In-process connection registry. One descriptor per job id; a later
/// attach for the same job replaces the earlier one (last writer wins —
/// rapid reconnects carry no ordering guarantee).
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, ConnectionDescriptor>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a job. The job must exist in the job
    /// registry; attaching to an unknown job is an error.
    pub fn attach(
        &self,
        jobs: &dyn JobStore,
        job_id: &str,
        descriptor: ConnectionDescriptor,
    ) -> Result<(), PipelineError> {
        if jobs.get(job_id)?.is_none() {
            return Err(PipelineError::JobNotFound(job_id.to_string()));
        }

        tracing::info!(
            job_id,
            connection_id = %descriptor.connection_id,
            "connection attached"
        );
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.to_string(), descriptor);
        Ok(())
    }

    /// Remove whichever mapping owns this connection id. Unknown ids are a
    /// no-op: disconnects race with job completion and the transport may
    /// deliver the same disconnect twice.
    pub fn detach(&self, connection_id: &str) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let job_id = connections
            .iter()
            .find(|(_, d)| d.connection_id == connection_id)
            .map(|(job_id, _)| job_id.clone());

        match job_id {
            Some(job_id) => {
                connections.remove(&job_id);
                tracing::info!(job_id, connection_id, "connection detached");
                true
            }
            None => {
                tracing::debug!(connection_id, "detach for unknown connection, ignoring");
                false
            }
        }
    }

    pub fn lookup(&self, job_id: &str) -> Option<ConnectionDescriptor> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    pub fn live_count(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InputLocation, Job};
    use crate::store::{open_memory_database, SqliteJobStore};

    fn job_store_with_job() -> (SqliteJobStore, String) {
        let store = SqliteJobStore::new(open_memory_database().unwrap());
        let job = Job::new(
            "r",
            "cfg-1",
            "st-marys",
            InputLocation {
                store_ref: "in".into(),
                key: "k.csv".into(),
            },
        );
        store.put(&job).unwrap();
        (store, job.id)
    }

    fn descriptor(id: &str) -> ConnectionDescriptor {
        ConnectionDescriptor {
            connection_id: id.into(),
            channel_address: "https://channel.example/prod".into(),
        }
    }

    #[test]
    fn attach_then_lookup() {
        let (jobs, job_id) = job_store_with_job();
        let registry = ConnectionRegistry::new();

        registry.attach(&jobs, &job_id, descriptor("c-1")).unwrap();
        assert_eq!(registry.lookup(&job_id).unwrap().connection_id, "c-1");
    }

    #[test]
    fn attach_requires_existing_job() {
        let (jobs, _) = job_store_with_job();
        let registry = ConnectionRegistry::new();

        let err = registry
            .attach(&jobs, "ghost-job", descriptor("c-1"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::JobNotFound(_)));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn last_attach_wins() {
        let (jobs, job_id) = job_store_with_job();
        let registry = ConnectionRegistry::new();

        registry.attach(&jobs, &job_id, descriptor("c-1")).unwrap();
        registry.attach(&jobs, &job_id, descriptor("c-2")).unwrap();
        assert_eq!(registry.lookup(&job_id).unwrap().connection_id, "c-2");
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn detach_removes_mapping() {
        let (jobs, job_id) = job_store_with_job();
        let registry = ConnectionRegistry::new();

        registry.attach(&jobs, &job_id, descriptor("c-1")).unwrap();
        assert!(registry.detach("c-1"));
        assert!(registry.lookup(&job_id).is_none());
    }

    #[test]
    fn detach_unknown_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.detach("never-attached"));
        // Delivered twice by the transport — second one is equally harmless
        assert!(!registry.detach("never-attached"));
    }

    #[test]
    fn detach_of_superseded_connection_leaves_newer_one() {
        let (jobs, job_id) = job_store_with_job();
        let registry = ConnectionRegistry::new();

        registry.attach(&jobs, &job_id, descriptor("c-1")).unwrap();
        registry.attach(&jobs, &job_id, descriptor("c-2")).unwrap();
        // The old connection's late disconnect must not tear down the new one
        assert!(!registry.detach("c-1"));
        assert_eq!(registry.lookup(&job_id).unwrap().connection_id, "c-2");
    }
}
