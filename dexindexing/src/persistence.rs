//! Single-writer persistence stage.
//!
//! Every producer enqueues into one FIFO channel drained by one writer task,
//! which is the only owner of the store session. A commit request travels
//! through the same channel, so it is handled only after every merge that
//! was enqueued before it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ethers::types::{Address, TxHash};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::entities::{Block, Entity, Token, Trade, TradingPair, Transaction};
use crate::exchanges::Exchange;
use crate::repos::{RepoError, RepoSession};

#[derive(Debug, derive_more::Display)]
pub enum PersistenceError {
    #[display("Persistence writer has stopped")]
    WriterStopped,
    #[display("Commit failed: {_0}")]
    Commit(RepoError),
}

impl std::error::Error for PersistenceError {}

enum Message {
    Merge(Entity),
    Commit(oneshot::Sender<Result<(), RepoError>>),
}

pub struct PersistenceQueue<S> {
    sender: mpsc::UnboundedSender<Message>,
    session: Arc<Mutex<S>>,
    pending: Arc<AtomicUsize>,
    writer: JoinHandle<()>,
}

impl<S: RepoSession> PersistenceQueue<S> {
    /// Takes ownership of the session and spawns the writer
    pub fn start(session: S) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session = Arc::new(Mutex::new(session));
        let pending = Arc::new(AtomicUsize::new(0));

        let writer = tokio::spawn(write(receiver, session.clone(), pending.clone()));

        Self {
            sender,
            session,
            pending,
            writer,
        }
    }

    /// Never waits on the store
    pub fn enqueue(&self, entity: impl Into<Entity>) -> Result<(), PersistenceError> {
        self.pending.fetch_add(1, Ordering::SeqCst);

        self.sender.send(Message::Merge(entity.into())).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            PersistenceError::WriterStopped
        })
    }

    /// Returns once everything enqueued before the call is merged and committed
    pub async fn commit(&self) -> Result<(), PersistenceError> {
        let (reply, committed) = oneshot::channel();

        self.sender
            .send(Message::Commit(reply))
            .map_err(|_| PersistenceError::WriterStopped)?;

        committed
            .await
            .map_err(|_| PersistenceError::WriterStopped)?
            .map_err(PersistenceError::Commit)
    }

    /// Entities enqueued but not yet merged
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn reader(&self) -> SessionReader<S> {
        SessionReader {
            session: self.session.clone(),
        }
    }

    /// Drains what is still queued, then stops the writer. Nothing is committed.
    pub async fn shutdown(self) {
        let Self { sender, writer, .. } = self;
        drop(sender);

        if let Err(error) = writer.await {
            error!(%error, "Persistence writer panicked");
        }
    }
}

async fn write<S: RepoSession>(
    mut receiver: mpsc::UnboundedReceiver<Message>,
    session: Arc<Mutex<S>>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(message) = receiver.recv().await {
        match message {
            Message::Merge(entity) => {
                let merged = session.lock().await.merge(&entity).await;
                pending.fetch_sub(1, Ordering::SeqCst);

                if let Err(error) = merged {
                    error!(entity = %entity.key(), %error, "Failed to merge entity");
                }
            }
            Message::Commit(reply) => {
                let committed = session.lock().await.commit().await;

                match &committed {
                    Ok(()) => debug!("Committed store session"),
                    Err(error) => error!(%error, "Failed to commit store session"),
                }
                let _ = reply.send(committed);
            }
        }
    }
}

/// Read access to the writer's session. Reads take the same lock as merges,
/// so they never interleave with one on the connection.
pub struct SessionReader<S> {
    session: Arc<Mutex<S>>,
}

impl<S> Clone for SessionReader<S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<S: RepoSession> SessionReader<S> {
    pub async fn get_token(&self, address: &Address) -> Result<Option<Token>, RepoError> {
        self.session.lock().await.get_token(address).await
    }

    pub async fn get_block(&self, number: u64) -> Result<Option<Block>, RepoError> {
        self.session.lock().await.get_block(number).await
    }

    pub async fn get_transaction(&self, hash: &TxHash) -> Result<Option<Transaction>, RepoError> {
        self.session.lock().await.get_transaction(hash).await
    }

    pub async fn get_trading_pair(
        &self,
        address: &Address,
    ) -> Result<Option<TradingPair>, RepoError> {
        self.session.lock().await.get_trading_pair(address).await
    }

    pub async fn get_trading_pairs(
        &self,
        exchanges: &[Exchange],
    ) -> Result<Vec<TradingPair>, RepoError> {
        self.session.lock().await.get_trading_pairs(exchanges).await
    }

    pub async fn get_trade(
        &self,
        transaction_hash: &TxHash,
        log_index: u64,
    ) -> Result<Option<Trade>, RepoError> {
        self.session.lock().await.get_trade(transaction_hash, log_index).await
    }

    pub async fn get_trades_by_pair(
        &self,
        pair: &Arc<TradingPair>,
    ) -> Result<Vec<Trade>, RepoError> {
        self.session.lock().await.get_trades_by_pair(pair).await
    }

    pub async fn get_last_block_number(&self) -> Result<Option<u64>, RepoError> {
        self.session.lock().await.get_last_block_number().await
    }
}
