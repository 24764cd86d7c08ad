//! Fire-and-forget outcome logging
//!
//! Answers are queued to a background writer and the session moves on
//! immediately. A failed insert is reported with `warn!` and dropped; it
//! never reaches the session.

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::storage::{Outcome, OutcomeRecord, WordStore};

enum WriterMessage {
    Record(Box<OutcomeRecord>),
    /// Reply once everything queued before it has been written
    Flush(oneshot::Sender<()>),
}

pub struct OutcomeLogger {
    writer_tx: mpsc::UnboundedSender<WriterMessage>,
    handle: JoinHandle<()>,
}

impl OutcomeLogger {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn<S>(store: S) -> Self
    where
        S: WordStore + Clone + Send + Sync + 'static,
    {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::writer_task(store, writer_rx));
        Self { writer_tx, handle }
    }

    async fn writer_task<S>(store: S, mut rx: mpsc::UnboundedReceiver<WriterMessage>)
    where
        S: WordStore + Clone + Send + Sync + 'static,
    {
        debug!("Outcome writer started");

        while let Some(msg) = rx.recv().await {
            match msg {
                WriterMessage::Record(record) => {
                    let store = store.clone();
                    let word_id = record.word_id;
                    let written = tokio::task::spawn_blocking(move || store.append_outcome_record(&record)).await;
                    match written {
                        Ok(Ok(id)) => trace!("Logged outcome {} for word {}", id, word_id),
                        Ok(Err(e)) => warn!("Failed to log outcome for word {}: {}", word_id, e),
                        Err(e) => warn!("Outcome writer for word {} panicked: {}", word_id, e),
                    }
                }
                WriterMessage::Flush(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        debug!("Outcome writer stopped");
    }

    /// Handle for submitting outcomes on behalf of one learner and list
    pub fn sink(&self, learner_id: &str, device_id: &str, list_id: Option<i64>) -> OutcomeSink {
        OutcomeSink {
            writer_tx: self.writer_tx.clone(),
            learner_id: learner_id.to_string(),
            device_id: device_id.to_string(),
            list_id,
        }
    }

    /// Wait until every outcome queued so far has been written or dropped
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer_tx.send(WriterMessage::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Drain the queue and stop the writer.
    ///
    /// Sinks still alive elsewhere keep the channel open, so this flushes
    /// first and then aborts the task.
    pub async fn shutdown(self) {
        self.flush().await;
        self.handle.abort();
        debug!("Outcome logger shut down");
    }
}

#[derive(Clone)]
pub struct OutcomeSink {
    writer_tx: mpsc::UnboundedSender<WriterMessage>,
    learner_id: String,
    device_id: String,
    list_id: Option<i64>,
}

impl OutcomeSink {
    /// Queue an outcome stamped with the current time; never blocks or fails
    pub fn submit(&self, word_id: i64, outcome: Outcome, duration_ms: i64) {
        let record = OutcomeRecord {
            id: 0,
            learner_id: self.learner_id.clone(),
            word_id,
            list_id: self.list_id,
            outcome,
            duration_ms,
            reviewed_at: Utc::now(),
            device_id: self.device_id.clone(),
        };
        if self.writer_tx.send(WriterMessage::Record(Box::new(record))).is_err() {
            warn!("Outcome writer closed, dropping outcome for word {}", word_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::seeded_store;

    #[tokio::test]
    async fn test_submitted_outcomes_are_written() {
        let (store, list_id) = seeded_store(3);
        let word = store.fetch_ordered_words(list_id, 1, 0).unwrap().remove(0);

        let logger = OutcomeLogger::spawn(store.clone());
        let sink = logger.sink("learner", "device", Some(list_id));
        sink.submit(word.id, Outcome::Incorrect, 1500);
        sink.submit(word.id, Outcome::Correct, 900);
        logger.flush().await;

        let records = store.fetch_outcome_records_for_words_in_list("learner", list_id, None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].duration_ms, 1500);
        assert_eq!(records[1].outcome, Outcome::Correct);
        assert_eq!(records[1].device_id, "device");

        logger.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_insert_does_not_stop_the_writer() {
        let (store, list_id) = seeded_store(1);
        let word = store.fetch_ordered_words(list_id, 1, 0).unwrap().remove(0);
        store
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_skip BEFORE INSERT ON review_log
                     WHEN NEW.outcome = 'skip'
                     BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                )?;
                Ok(())
            })
            .unwrap();

        let logger = OutcomeLogger::spawn(store.clone());
        let sink = logger.sink("learner", "device", Some(list_id));
        sink.submit(word.id, Outcome::Skip, 0);
        sink.submit(word.id, Outcome::Correct, 0);
        logger.shutdown().await;

        let records = store.fetch_outcome_records_for_words_in_list("learner", list_id, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::Correct);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_dropped_quietly() {
        let (store, list_id) = seeded_store(1);
        let logger = OutcomeLogger::spawn(store.clone());
        let sink = logger.sink("learner", "device", Some(list_id));
        logger.shutdown().await;
        tokio::task::yield_now().await;

        sink.submit(1, Outcome::Correct, 0);
    }
}
