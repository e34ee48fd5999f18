//! Hopper worker handle for async requests.

use crate::error::ToolError;
use crate::hopper::callgraph::CallGraph;
use crate::hopper::request::HopperRequest;
use crate::hopper::types::*;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Bound of the request queue between the server and the worker loop.
pub const REQUEST_QUEUE_CAPACITY: usize = 64;
/// Default timeout for host operations (2 minutes)
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Maximum allowed timeout (10 minutes)
const MAX_TIMEOUT_SECS: u64 = 600;
/// Maximum time to retry enqueuing the shutdown request when the queue is full.
const SHUTDOWN_SEND_TIMEOUT_SECS: u64 = 5;
/// Backoff between control enqueue retries (milliseconds).
const CONTROL_SEND_BACKOFF_MS: u64 = 25;

/// Handle for sending requests to the worker loop that owns the session
#[derive(Clone)]
pub struct HopperWorker {
    tx: mpsc::SyncSender<HopperRequest>,
}

impl HopperWorker {
    pub fn new(tx: mpsc::SyncSender<HopperRequest>) -> Self {
        Self { tx }
    }

    /// Create a bounded request channel and a worker handle for it.
    pub fn channel() -> (Self, mpsc::Receiver<HopperRequest>) {
        let (tx, rx) = mpsc::sync_channel(REQUEST_QUEUE_CAPACITY);
        (Self::new(tx), rx)
    }

    fn try_send(&self, req: HopperRequest) -> Result<(), ToolError> {
        match self.tx.try_send(req) {
            Ok(()) => Ok(()),
            Err(mpsc::TrySendError::Full(_)) => Err(ToolError::Busy),
            Err(mpsc::TrySendError::Disconnected(_)) => Err(ToolError::WorkerClosed),
        }
    }

    async fn send_with_retry(
        &self,
        req: HopperRequest,
        max_wait: Option<Duration>,
    ) -> Result<(), ToolError> {
        let start = Instant::now();
        let mut pending = req;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return Ok(()),
                Err(mpsc::TrySendError::Full(req)) => {
                    if let Some(max_wait) = max_wait {
                        if Instant::now().duration_since(start) >= max_wait {
                            return Err(ToolError::Busy);
                        }
                    }
                    pending = req;
                    tokio::time::sleep(Duration::from_millis(CONTROL_SEND_BACKOFF_MS)).await;
                }
                Err(mpsc::TrySendError::Disconnected(_)) => return Err(ToolError::WorkerClosed),
            }
        }
    }

    /// Helper to receive with optional timeout
    async fn recv_with_timeout<T>(
        rx: oneshot::Receiver<Result<T, ToolError>>,
        timeout_secs: Option<u64>,
    ) -> Result<T, ToolError> {
        let timeout = Duration::from_secs(
            timeout_secs
                .unwrap_or(DEFAULT_TIMEOUT_SECS)
                .min(MAX_TIMEOUT_SECS),
        );
        match tokio::time::timeout(timeout, rx).await {
            Ok(result) => result?,
            Err(_) => Err(ToolError::Timeout(timeout.as_secs())),
        }
    }

    /// Shutdown the worker loop.
    pub async fn shutdown(&self) -> Result<(), ToolError> {
        self.send_with_retry(
            HopperRequest::Shutdown,
            Some(Duration::from_secs(SHUTDOWN_SEND_TIMEOUT_SECS)),
        )
        .await
    }

    pub async fn all_documents(&self) -> Result<DocumentList, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::AllDocuments { resp: tx })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn current_document(&self) -> Result<DocumentInfo, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::CurrentDocument { resp: tx })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn set_current_document(&self, doc_id: i64) -> Result<String, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::SetCurrentDocument { doc_id, resp: tx })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn rebase(&self, new_base_hex: String) -> Result<String, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::Rebase {
            new_base_hex,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn segments(&self) -> Result<SegmentList, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::Segments { resp: tx })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn search_names(
        &self,
        pattern: String,
        segment: String,
        search_type: String,
        max_results: usize,
    ) -> Result<NameSearchResult, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::SearchNames {
            pattern,
            segment,
            search_type,
            max_results,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, None).await
    }

    /// Search strings. A cold cache enumerates the whole segment, so the
    /// caller may extend the wait.
    pub async fn search_strings(
        &self,
        pattern: String,
        segment: String,
        max_results: usize,
        timeout_secs: Option<u64>,
    ) -> Result<StringSearchResult, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::SearchStrings {
            pattern,
            segment,
            max_results,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, timeout_secs).await
    }

    pub async fn string_at(
        &self,
        address_hex: String,
        timeout_secs: Option<u64>,
    ) -> Result<String, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::StringAt {
            address_hex,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, timeout_secs).await
    }

    pub async fn address_info(
        &self,
        inputs: Vec<String>,
    ) -> Result<BTreeMap<String, AddressLookup>, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::AddressInfo { inputs, resp: tx })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn call_graph(
        &self,
        start_hex: String,
        direction: String,
        max_depth: usize,
    ) -> Result<CallGraph, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::CallGraph {
            start_hex,
            direction,
            max_depth,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn decompile(&self, target: String) -> Result<String, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::Decompile { target, resp: tx })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn disassemble(&self, target: String) -> Result<String, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::Disassemble { target, resp: tx })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn demangled_name(&self, target: String) -> Result<DemangledNameInfo, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::DemangledName { target, resp: tx })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn comment_at(&self, address_hex: String) -> Result<String, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::CommentAt {
            address_hex,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn set_comment(
        &self,
        address_hex: String,
        comment: String,
    ) -> Result<String, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::SetComment {
            address_hex,
            comment,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn set_name(&self, address_hex: String, name: String) -> Result<String, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::SetName {
            address_hex,
            name,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn mark_data_type(
        &self,
        address_hex: String,
        data_type: String,
        length: u64,
    ) -> Result<String, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::MarkDataType {
            address_hex,
            data_type,
            length,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, None).await
    }

    pub async fn cache_strings(
        &self,
        all_documents: bool,
        timeout_secs: Option<u64>,
    ) -> Result<CacheWarmReport, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::CacheStrings {
            all_documents,
            resp: tx,
        })?;
        Self::recv_with_timeout(rx, timeout_secs).await
    }

    pub async fn cache_status(&self) -> Result<CacheStatusReport, ToolError> {
        let (tx, rx) = oneshot::channel();
        self.try_send(HopperRequest::CacheStatus { resp: tx })?;
        Self::recv_with_timeout(rx, None).await
    }
}
