use std::sync::Arc;

use tokio::sync::watch;

/// Upload completion percentage shared with whoever renders it.
///
/// Values never go down while a transfer runs, stay below 100 until the
/// server has accepted the file, and only drop back to 0 via [`reset`].
///
/// [`reset`]: UploadProgress::reset
#[derive(Clone, Debug)]
pub struct UploadProgress {
    tx: Arc<watch::Sender<u8>>,
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadProgress {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }

    pub fn get(&self) -> u8 {
        *self.tx.borrow()
    }

    /// Record bytes handed to the transport so far.
    pub fn record_bytes(&self, sent: u64, total: u64) {
        let percent = if total == 0 {
            0
        } else {
            (sent.min(total) * 100 / total) as u8
        };
        self.advance(percent.min(99));
    }

    fn advance(&self, percent: u8) {
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    /// The server acknowledged the upload.
    pub fn complete(&self) {
        self.advance(100);
    }

    pub fn reset(&self) {
        self.tx.send_replace(0);
    }
}
