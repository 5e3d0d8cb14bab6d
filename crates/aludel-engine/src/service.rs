// crates/aludel-engine/src/service.rs
//
// ChainService: a single-writer tokio task that owns the `Chain`.
//
// Callers hold a cloneable `ChainHandle` and submit closures over an mpsc
// queue. The task runs them one at a time, each inside `Chain::transact`,
// and replies on a oneshot channel. Readers get a cloned snapshot taken
// between transactions, so they never observe a half-applied operation.

use aludel_core::AludelError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::chain::Chain;

type Job = Box<dyn FnOnce(&mut Chain) + Send>;

/// Default depth of the job queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

pub struct ChainService {
    chain: Chain,
    rx: mpsc::Receiver<Job>,
}

impl ChainService {
    /// Spawn the service task. It runs until every handle is dropped and
    /// then returns the final chain state.
    pub fn spawn(chain: Chain, queue_depth: usize) -> (ChainHandle, JoinHandle<Chain>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let service = ChainService { chain, rx };
        let handle = tokio::spawn(service.run());
        (ChainHandle { tx }, handle)
    }

    async fn run(mut self) -> Chain {
        tracing::info!(chain_id = self.chain.chain_id(), "Chain service started");
        let mut processed: u64 = 0;
        while let Some(job) = self.rx.recv().await {
            job(&mut self.chain);
            processed += 1;
        }
        tracing::info!(processed, "Chain service stopped");
        self.chain
    }
}

#[derive(Clone)]
pub struct ChainHandle {
    tx: mpsc::Sender<Job>,
}

impl ChainHandle {
    /// Run `f` as one atomic transaction and return its result.
    pub async fn execute<T, F>(&self, f: F) -> Result<T, AludelError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Chain) -> Result<T, AludelError> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |chain| {
            // The caller may have gone away; the transaction stands regardless.
            let _ = reply_tx.send(chain.transact(f));
        });
        self.tx
            .send(job)
            .await
            .map_err(|_| AludelError::ServiceStopped)?;
        reply_rx.await.map_err(|_| AludelError::ServiceStopped)?
    }

    /// Run a read-only closure against the current committed state.
    pub async fn query<T, F>(&self, f: F) -> Result<T, AludelError>
    where
        T: Send + 'static,
        F: FnOnce(&Chain) -> Result<T, AludelError> + Send + 'static,
    {
        self.execute(move |chain| f(chain)).await
    }

    /// A full copy of the committed chain state.
    pub async fn snapshot(&self) -> Result<Chain, AludelError> {
        self.query(|chain| Ok(chain.clone())).await
    }
}
