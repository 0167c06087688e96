use log::debug;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

/// Progress of a ledger operation, for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Searching { record_id: String },
    DetectingField { record_id: String },
    UpdatingField { record_id: String, field: String },
    Replacing { record_id: String },
    Appending { bytes: usize },
    Parsing,
    Exported { path: PathBuf, records: usize },
    Warning { message: String },
}

/// Queues an event without waiting.
///
/// Events are sent while the corpus lock is held, so a full channel drops the
/// event instead of blocking a consumer that reads the ledger.
pub(crate) fn send_event(sender: &Option<Sender<LedgerEvent>>, event: LedgerEvent) {
    if let Some(tx) = sender {
        if let Err(TrySendError::Full(event)) = tx.try_send(event) {
            debug!("Progress channel full, dropped {:?}", event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_full_channel_drops_events() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = Some(tx);
        send_event(&sender, LedgerEvent::Parsing);
        send_event(&sender, LedgerEvent::Appending { bytes: 3 });

        assert_eq!(rx.try_recv().unwrap(), LedgerEvent::Parsing);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        send_event(&Some(tx), LedgerEvent::Parsing);
        send_event(&None, LedgerEvent::Parsing);
    }
}
