//! One-slot handoff that keeps only the newest item.
//!
//! The producer never blocks: publishing into a full slot evicts the item
//! waiting there. Dropping the sender ends the stream for the receiver once
//! the slot is drained.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

/// Create a connected sender/receiver pair.
pub fn latest_slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let (tx, rx) = bounded(1);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        SlotSender {
            tx,
            evict: rx.clone(),
            dropped: Arc::clone(&dropped),
        },
        SlotReceiver { rx, dropped },
    )
}

/// Producing half of a [`latest_slot`].
pub struct SlotSender<T> {
    tx: Sender<T>,
    evict: Receiver<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> SlotSender<T> {
    /// Put `item` in the slot, replacing any unconsumed one.
    pub fn publish(&self, mut item: T) {
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if self.evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    item = back;
                }
                // The sender holds a receiver itself, so this is unreachable.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Consuming half of a [`latest_slot`].
pub struct SlotReceiver<T> {
    rx: Receiver<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> SlotReceiver<T> {
    /// Wait for the next item. `None` once the sender is gone and the slot is empty.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Wait for the next item for at most `timeout`.
    ///
    /// `Ok(None)` means the timeout elapsed; `Err(())` means the stream ended.
    #[allow(clippy::result_unit_err)]
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, ()> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Ok(Some(item)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(()),
        }
    }

    /// Items replaced before they were consumed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_newest_item_wins() {
        let (tx, rx) = latest_slot();
        tx.publish(1);
        tx.publish(2);
        tx.publish(3);
        assert_eq!(rx.recv(), Some(3));
        assert_eq!(rx.dropped(), 2);
    }

    #[test]
    fn test_drop_sender_ends_after_drain() {
        let (tx, rx) = latest_slot();
        tx.publish("last");
        drop(tx);
        assert_eq!(rx.recv(), Some("last"));
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn test_recv_timeout() {
        let (tx, rx) = latest_slot::<u8>();
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Ok(None));
        drop(tx);
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Err(()));
    }

    #[test]
    fn test_producer_never_blocks() {
        let (tx, rx) = latest_slot();
        let producer = thread::spawn(move || {
            for i in 0..10_000u32 {
                tx.publish(i);
            }
        });
        producer.join().unwrap();

        assert_eq!(rx.recv(), Some(9_999));
        assert_eq!(rx.recv(), None);
    }
}
