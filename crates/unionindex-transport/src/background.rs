//! Optional background transport (spec §4.5, §9): the original forks a
//! child process per HTTP request so enumeration isn't blocked on the
//! network. Per spec §9's explicit redesign guidance, this is rebuilt as a
//! single dedicated task behind a capacity-1 channel: at most one request
//! in flight, the driver awaits the previous reply before sending the
//! next, and a worker failure propagates as a fatal abort.

use crate::client::SearchBackend;
use crate::error::TransportError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

enum Operation {
    AddBatch(String),
    DeleteBatch(String),
    DeleteByQuery(String),
    Commit,
    CommitLong,
    Optimize,
}

struct Job {
    operation: Operation,
    reply: oneshot::Sender<Result<(), TransportError>>,
}

/// Wraps a [`SearchBackend`] so that every call is executed on a single
/// background task, one request at a time.
pub struct BackgroundTransport {
    sender: mpsc::Sender<Job>,
    task: tokio::task::JoinHandle<()>,
}

impl BackgroundTransport {
    pub fn spawn(backend: Arc<dyn SearchBackend>) -> Self {
        // Capacity 1: a second `send` blocks until the worker has taken the
        // first job, and `call` additionally awaits its reply before
        // returning, so at most one request is ever in flight.
        let (sender, mut receiver) = mpsc::channel::<Job>(1);

        let task = tokio::spawn(async move {
            while let Some(Job { operation, reply }) = receiver.recv().await {
                let result = match operation {
                    Operation::AddBatch(body) => backend.post_add_batch(body).await,
                    Operation::DeleteBatch(body) => backend.post_delete_batch(body).await,
                    Operation::DeleteByQuery(query) => backend.delete_by_query(query).await,
                    Operation::Commit => backend.commit().await,
                    Operation::CommitLong => backend.commit_long().await,
                    Operation::Optimize => backend.optimize().await,
                };
                if result.is_err() {
                    tracing::error!("background transport worker failed, signaling abort");
                }
                // The receiver may have been dropped if the caller gave up;
                // that's not itself a pipeline failure.
                let _ = reply.send(result);
            }
        });

        BackgroundTransport { sender, task }
    }

    async fn call(&self, operation: Operation) -> Result<(), TransportError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Job { operation, reply })
            .await
            .map_err(|_| TransportError::WorkerAborted("worker task is gone".to_string()))?;
        rx.await.map_err(|_| TransportError::WorkerAborted("worker dropped reply".to_string()))?
    }

    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.task.await;
    }
}

#[async_trait::async_trait]
impl SearchBackend for BackgroundTransport {
    async fn post_add_batch(&self, body: String) -> Result<(), TransportError> {
        self.call(Operation::AddBatch(body)).await
    }

    async fn post_delete_batch(&self, body: String) -> Result<(), TransportError> {
        self.call(Operation::DeleteBatch(body)).await
    }

    async fn delete_by_query(&self, query: String) -> Result<(), TransportError> {
        self.call(Operation::DeleteByQuery(query)).await
    }

    async fn commit(&self) -> Result<(), TransportError> {
        self.call(Operation::Commit).await
    }

    async fn commit_long(&self) -> Result<(), TransportError> {
        self.call(Operation::CommitLong).await
    }

    async fn optimize(&self) -> Result<(), TransportError> {
        self.call(Operation::Optimize).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        adds: AtomicUsize,
        fail_next: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl SearchBackend for CountingBackend {
        async fn post_add_batch(&self, _body: String) -> Result<(), TransportError> {
            self.adds.fetch_add(1, Ordering::SeqCst);
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(TransportError::Http { status: 500, body: "boom".into() });
            }
            Ok(())
        }
        async fn post_delete_batch(&self, _body: String) -> Result<(), TransportError> {
            Ok(())
        }
        async fn delete_by_query(&self, _query: String) -> Result<(), TransportError> {
            Ok(())
        }
        async fn commit(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn commit_long(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn optimize(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn serializes_requests_and_awaits_reply() {
        let backend = Arc::new(CountingBackend {
            adds: AtomicUsize::new(0),
            fail_next: std::sync::atomic::AtomicBool::new(false),
        });
        let transport = BackgroundTransport::spawn(backend.clone());

        transport.post_add_batch("[]".into()).await.unwrap();
        transport.post_add_batch("[]".into()).await.unwrap();
        assert_eq!(backend.adds.load(Ordering::SeqCst), 2);
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn propagates_worker_failure_to_caller() {
        let backend = Arc::new(CountingBackend {
            adds: AtomicUsize::new(0),
            fail_next: std::sync::atomic::AtomicBool::new(true),
        });
        let transport = BackgroundTransport::spawn(backend);
        let result = transport.post_add_batch("[]".into()).await;
        assert!(result.is_err());
        transport.shutdown().await;
    }
}
