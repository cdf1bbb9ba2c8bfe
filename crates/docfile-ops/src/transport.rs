//! Upload transports: the per-file channel that carries bytes to the server.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A file captured by drag and drop, replayed when the upload starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Where the bytes of an upload come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// Picked through the file dialog; the transport holds the file.
    Selected,
    /// Captured from a drop; the payload travels with the upload.
    Dropped(DroppedFile),
}

/// A file the user chose to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub name: String,
    pub source: UploadSource,
}

impl FileSelection {
    pub fn selected(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: UploadSource::Selected,
        }
    }

    pub fn dropped(file: DroppedFile) -> Self {
        Self {
            name: file.name.clone(),
            source: UploadSource::Dropped(file),
        }
    }
}

/// Everything a transport needs to start sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub url: String,
    pub file_name: String,
    pub headers: Vec<(String, String)>,
    pub source: UploadSource,
}

impl UploadRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Lifecycle events of one transfer, delivered in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Progress { loaded: u64, total: u64 },
    Completed { status: u16 },
    Aborted,
}

impl TransportEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// A single-file upload channel.
///
/// `send` starts the transfer and returns the event stream. Cancelling the
/// token must end the stream with [`TransportEvent::Aborted`]; a stream that
/// closes without a terminal event is treated as aborted.
pub trait UploadTransport: Send {
    fn send(
        &mut self,
        request: UploadRequest,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<TransportEvent>;

    /// Free whatever the transport holds. Called once, when the upload leaves the ledger.
    fn release(&mut self) {}
}
