//! Rendezvous coordinator: the upload/download handshake
//!
//! **Upload half:** publish a record and wait on its completion signal. There
//! is no timeout here; a waiting upload is released by a finished download,
//! by the reaper, by a newer upload taking its identifier, or by the caller
//! cancelling the wait.
//!
//! **Download half:** claim the record, read its source to the end into the
//! caller's sink, then signal the uploader and retire the record. A stream
//! failure leaves the record in the registry (as `Failed`) for the reaper.

use std::future::Future;
use std::io;
use std::sync::Arc;

use portal_common::RELAY_CHUNK_SIZE;
use portal_common::hash::StreamDigest;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::error::RelayError;
use super::record::{TransferMeta, TransferOutcome, TransferRecord, TransferSource, TransferState};
use super::registry::TransferRegistry;

/// Where a download's bytes go
///
/// Implemented by the transport: `send_head` emits the response metadata
/// (status, length, display name) and is called exactly once, after the
/// first chunk has been read from the source and before any body byte is
/// written.
pub trait DownloadSink: AsyncWrite + Unpin + Send {
    fn send_head(&mut self, meta: &TransferMeta) -> impl Future<Output = io::Result<()>> + Send;
}

/// Shared handle to the registry plus the handshake built on it
///
/// Cheap to clone; every clone sees the same registry.
#[derive(Clone)]
pub struct Rendezvous {
    registry: Arc<TransferRegistry>,
}

impl Rendezvous {
    pub fn new(registry: Arc<TransferRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TransferRegistry> {
        &self.registry
    }

    /// Publish an upload and return the ticket its uploader waits on
    ///
    /// An existing record under the same identifier is displaced. If nobody
    /// had started reading it, its uploader is released with
    /// `TransferOutcome::Replaced` and its source is dropped unread. A record
    /// that is mid-download keeps streaming to its downloader.
    pub fn begin_upload(
        &self,
        identifier: impl Into<String>,
        meta: TransferMeta,
        source: TransferSource,
    ) -> UploadTicket {
        let identifier = identifier.into();
        let (record, completion_rx) = TransferRecord::new(identifier.clone(), meta, source);

        info!(
            identifier = %identifier,
            display_name = ?record.meta.display_name,
            declared_length = record.meta.declared_length,
            "upload registered"
        );

        if let Some(previous) = self.registry.put(Arc::new(record)) {
            let displaced = previous.transition(TransferState::Pending, TransferState::Replaced)
                || previous.transition(TransferState::Failed, TransferState::Replaced);
            if displaced {
                warn!(
                    identifier = %identifier,
                    display_name = ?previous.meta.display_name,
                    "replaced an upload that was still waiting for its downloader"
                );
                previous.signal(TransferOutcome::Replaced);
            }
        }

        UploadTicket {
            identifier,
            completion_rx,
        }
    }

    /// Publish an upload and wait until it is released
    pub async fn register_and_wait(
        &self,
        identifier: impl Into<String>,
        meta: TransferMeta,
        source: TransferSource,
    ) -> TransferOutcome {
        self.begin_upload(identifier, meta, source).wait().await
    }

    /// Claim the record published under `identifier` for download
    ///
    /// Fails with `NotFound` if nothing is published, or if the record has
    /// already been claimed by another downloader or evicted.
    pub fn begin_download(&self, identifier: &str) -> Result<Download, RelayError> {
        let record = self
            .registry
            .get(identifier)
            .ok_or_else(|| RelayError::not_found(identifier))?;
        let record = self.claim(identifier, record)?;

        let Some(source) = record.take_source() else {
            return Err(RelayError::not_found(identifier));
        };

        info!(
            identifier,
            display_name = ?record.meta.display_name,
            declared_length = record.meta.declared_length,
            "download started"
        );

        Ok(Download {
            record,
            source,
            registry: Arc::clone(&self.registry),
            completed: false,
        })
    }

    /// Move a looked-up record to `Consumed`
    ///
    /// If the claim fails because a re-upload replaced the record after the
    /// lookup, the successor now published under `identifier` is tried once.
    fn claim(
        &self,
        identifier: &str,
        record: Arc<TransferRecord>,
    ) -> Result<Arc<TransferRecord>, RelayError> {
        if record.transition(TransferState::Pending, TransferState::Consumed) {
            return Ok(record);
        }

        match self.registry.get(identifier) {
            Some(current)
                if !Arc::ptr_eq(&current, &record)
                    && current.transition(TransferState::Pending, TransferState::Consumed) =>
            {
                debug!(identifier, "claimed the upload that replaced the looked-up one");
                Ok(current)
            }
            _ => {
                debug!(identifier, state = %record.state(), "transfer is not claimable");
                Err(RelayError::not_found(identifier))
            }
        }
    }
}

/// Held by a waiting uploader
#[derive(Debug)]
pub struct UploadTicket {
    identifier: String,
    completion_rx: oneshot::Receiver<TransferOutcome>,
}

impl UploadTicket {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Wait, without a timeout, until the upload is released
    pub async fn wait(self) -> TransferOutcome {
        self.completion_rx
            .await
            .unwrap_or(TransferOutcome::Abandoned)
    }

    /// Wait until released or until `cancel` completes
    ///
    /// Cancellation is silent: the outcome is `Abandoned` and the record stays
    /// published for a downloader or the reaper.
    pub async fn wait_or_cancel<F>(self, cancel: F) -> TransferOutcome
    where
        F: Future<Output = ()>,
    {
        let identifier = self.identifier.clone();
        tokio::select! {
            outcome = self.wait() => outcome,
            () = cancel => {
                debug!(identifier = %identifier, "upload wait cancelled");
                TransferOutcome::Abandoned
            }
        }
    }
}

/// Result of a completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub identifier: String,
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the relayed bytes
    pub sha256: String,
}

/// A claimed record, ready to stream
///
/// Dropping it without finishing (including cancelling `stream_to`) marks the
/// record `Failed` so the reaper can release its uploader.
pub struct Download {
    record: Arc<TransferRecord>,
    source: TransferSource,
    registry: Arc<TransferRegistry>,
    completed: bool,
}

impl Download {
    pub fn identifier(&self) -> &str {
        &self.record.identifier
    }

    pub fn meta(&self) -> &TransferMeta {
        &self.record.meta
    }

    /// Relay every byte of the source into `sink`
    ///
    /// On success the uploader is signalled and then the record is retired.
    /// On failure the record is left published in the `Failed` state and the
    /// uploader keeps waiting.
    pub async fn stream_to<S>(mut self, sink: &mut S) -> Result<DownloadReport, RelayError>
    where
        S: DownloadSink,
    {
        let mut digest = StreamDigest::new();

        if let Err(source) = relay_bytes(&mut self.source, sink, &self.record.meta, &mut digest).await
        {
            self.record
                .transition(TransferState::Consumed, TransferState::Failed);
            warn!(
                identifier = %self.record.identifier,
                bytes_relayed = digest.bytes(),
                error = %source,
                "transfer failed"
            );
            return Err(RelayError::TransferFailed {
                identifier: self.record.identifier.clone(),
                bytes_relayed: digest.bytes(),
                source,
            });
        }

        self.completed = true;
        let bytes = digest.bytes();
        let sha256 = digest.finalize_hex();

        self.record.signal(TransferOutcome::Consumed { bytes });
        self.registry.remove_if_same(&self.record);

        info!(
            identifier = %self.record.identifier,
            bytes,
            sha256 = %sha256,
            "download complete"
        );

        Ok(DownloadReport {
            identifier: self.record.identifier.clone(),
            bytes,
            sha256,
        })
    }
}

impl Drop for Download {
    fn drop(&mut self) {
        if !self.completed
            && self
                .record
                .transition(TransferState::Consumed, TransferState::Failed)
        {
            debug!(identifier = %self.record.identifier, "download dropped before completion");
        }
    }
}

/// Copy source to sink in bounded chunks, feeding the digest as bytes land
///
/// The first chunk is read before the head is sent, so a source that is
/// already broken is reported before the sink commits to a status.
async fn relay_bytes<S>(
    source: &mut TransferSource,
    sink: &mut S,
    meta: &TransferMeta,
    digest: &mut StreamDigest,
) -> io::Result<()>
where
    S: DownloadSink,
{
    let mut buf = vec![0u8; RELAY_CHUNK_SIZE];
    let mut read = source.read(&mut buf).await?;

    sink.send_head(meta).await?;

    while read > 0 {
        sink.write_all(&buf[..read]).await?;
        digest.update(&buf[..read]);
        read = source.read(&mut buf).await?;
    }

    sink.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_common::hash::sha256_hex;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, ReadBuf};

    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".into()),
            )
            .with_test_writer()
            .try_init();
    }

    fn rendezvous() -> Rendezvous {
        Rendezvous::new(Arc::new(TransferRegistry::new()))
    }

    fn meta(len: u64, name: &str) -> TransferMeta {
        TransferMeta {
            declared_length: len,
            display_name: Some(name.to_string()),
        }
    }

    /// In-memory sink that records the head and body, optionally failing writes
    #[derive(Default)]
    struct MemorySink {
        head: Option<TransferMeta>,
        body: Vec<u8>,
        fail_after: Option<usize>,
    }

    impl AsyncWrite for MemorySink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if let Some(limit) = self.fail_after
                && self.body.len() >= limit
            {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "downloader went away",
                )));
            }
            self.body.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    impl DownloadSink for MemorySink {
        async fn send_head(&mut self, meta: &TransferMeta) -> io::Result<()> {
            self.head = Some(meta.clone());
            Ok(())
        }
    }

    /// Source that replays a fixed script of chunks and errors
    struct ScriptedSource {
        steps: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedSource {
        fn boxed(steps: Vec<io::Result<Vec<u8>>>) -> TransferSource {
            Box::new(Self {
                steps: steps.into(),
            })
        }
    }

    impl AsyncRead for ScriptedSource {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.steps.pop_front() {
                Some(Ok(chunk)) => {
                    buf.put_slice(&chunk);
                    Poll::Ready(Ok(()))
                }
                Some(Err(e)) => Poll::Ready(Err(e)),
                None => Poll::Ready(Ok(())),
            }
        }
    }

    /// Source that records whether anyone ever tried to read it
    struct TrackingSource {
        touched: Arc<AtomicBool>,
    }

    impl AsyncRead for TrackingSource {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            self.touched.store(true, Ordering::SeqCst);
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_download_before_upload_is_not_found() {
        let rendezvous = rendezvous();
        for id in ["abc", "xyz", "never"] {
            let err = rendezvous.begin_download(id).err().unwrap();
            assert!(matches!(err, RelayError::NotFound { ref identifier } if identifier == id));
        }
    }

    #[tokio::test]
    async fn test_three_byte_transfer() {
        init_test_tracing();
        let rendezvous = rendezvous();
        let ticket = rendezvous.begin_upload("xyz", meta(3, "x.bin"), Box::new(&[0x01u8, 0x02, 0x03][..]));
        assert_eq!(ticket.identifier(), "xyz");

        let download = rendezvous.begin_download("xyz").unwrap();
        assert_eq!(download.identifier(), "xyz");
        assert_eq!(download.meta().declared_length, 3);

        let mut sink = MemorySink::default();
        let report = download.stream_to(&mut sink).await.unwrap();

        assert_eq!(sink.body, vec![0x01, 0x02, 0x03]);
        assert_eq!(sink.head.unwrap().declared_length, 3);
        assert_eq!(report.bytes, 3);
        assert_eq!(report.sha256, sha256_hex(&[0x01, 0x02, 0x03]));

        assert_eq!(ticket.wait().await, TransferOutcome::Consumed { bytes: 3 });
        assert!(!rendezvous.registry().contains("xyz"));
        assert!(matches!(
            rendezvous.begin_download("xyz"),
            Err(RelayError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_upload_released_only_after_last_byte() {
        let rendezvous = rendezvous();
        let (mut feed, source) = tokio::io::duplex(16);

        let upload = {
            let rendezvous = rendezvous.clone();
            tokio::spawn(async move {
                rendezvous
                    .register_and_wait("slow", meta(6, "slow.bin"), Box::new(source))
                    .await
            })
        };

        // Wait for the upload to be published
        while !rendezvous.registry().contains("slow") {
            tokio::task::yield_now().await;
        }

        let download = rendezvous.begin_download("slow").unwrap();
        let streaming = tokio::spawn(async move {
            let mut sink = MemorySink::default();
            let report = download.stream_to(&mut sink).await.unwrap();
            (report, sink.body)
        });

        feed.write_all(b"abc").await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!upload.is_finished());

        feed.write_all(b"def").await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!upload.is_finished());

        drop(feed);
        let (report, body) = streaming.await.unwrap();
        assert_eq!(body, b"abcdef");
        assert_eq!(report.bytes, 6);
        assert_eq!(
            upload.await.unwrap(),
            TransferOutcome::Consumed { bytes: 6 }
        );
    }

    #[tokio::test]
    async fn test_reupload_replaces_and_orphans_first_source() {
        let rendezvous = rendezvous();
        let touched = Arc::new(AtomicBool::new(false));

        let first = rendezvous.begin_upload(
            "dup",
            meta(4, "first.bin"),
            Box::new(TrackingSource {
                touched: Arc::clone(&touched),
            }),
        );
        let second = rendezvous.begin_upload("dup", meta(6, "second.bin"), Box::new(&b"second"[..]));

        assert_eq!(first.wait().await, TransferOutcome::Replaced);
        assert_eq!(rendezvous.registry().active_count(), 1);

        let download = rendezvous.begin_download("dup").unwrap();
        assert_eq!(download.meta().display_name.as_deref(), Some("second.bin"));
        let mut sink = MemorySink::default();
        download.stream_to(&mut sink).await.unwrap();

        assert_eq!(sink.body, b"second");
        assert_eq!(second.wait().await, TransferOutcome::Consumed { bytes: 6 });
        assert!(!touched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_second_downloader_sees_not_found() {
        let rendezvous = rendezvous();
        let _ticket = rendezvous.begin_upload("one", meta(3, "a"), Box::new(&b"abc"[..]));

        let first = rendezvous.begin_download("one").unwrap();
        assert!(matches!(
            rendezvous.begin_download("one"),
            Err(RelayError::NotFound { .. })
        ));

        let mut sink = MemorySink::default();
        first.stream_to(&mut sink).await.unwrap();
        assert_eq!(sink.body, b"abc");
    }

    #[tokio::test]
    async fn test_claim_follows_replacing_upload() {
        let rendezvous = rendezvous();
        let old_ticket = rendezvous.begin_upload("race", meta(1, "old"), Box::new(&b"o"[..]));
        let looked_up = rendezvous.registry().get("race").unwrap();

        // A re-upload lands between the lookup and the claim
        let _new_ticket = rendezvous.begin_upload("race", meta(1, "new"), Box::new(&b"n"[..]));
        assert_eq!(old_ticket.wait().await, TransferOutcome::Replaced);

        let claimed = rendezvous.claim("race", looked_up).unwrap();
        assert_eq!(claimed.meta.display_name.as_deref(), Some("new"));
        assert_eq!(claimed.state(), TransferState::Consumed);
        assert!(Arc::ptr_eq(&claimed, &rendezvous.registry().get("race").unwrap()));
    }

    #[tokio::test]
    async fn test_claim_gives_up_when_nothing_newer() {
        let rendezvous = rendezvous();
        let _ticket = rendezvous.begin_upload("once", meta(1, "o"), Box::new(&b"o"[..]));
        let looked_up = rendezvous.registry().get("once").unwrap();
        let _download = rendezvous.begin_download("once").unwrap();

        assert!(matches!(
            rendezvous.claim("once", looked_up),
            Err(RelayError::NotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_leaves_record_failed() {
        let rendezvous = rendezvous();
        let ticket = rendezvous.begin_upload(
            "broken",
            meta(10, "b.bin"),
            ScriptedSource::boxed(vec![
                Ok(b"hello".to_vec()),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "uploader vanished")),
            ]),
        );

        let mut sink = MemorySink::default();
        let err = rendezvous
            .begin_download("broken")
            .unwrap()
            .stream_to(&mut sink)
            .await
            .unwrap_err();

        match err {
            RelayError::TransferFailed {
                ref identifier,
                bytes_relayed,
                ref source,
            } => {
                assert_eq!(identifier, "broken");
                assert_eq!(bytes_relayed, 5);
                assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("expected TransferFailed, got {other:?}"),
        }
        assert!(sink.head.is_some());

        // Not retired, not claimable, uploader still waiting
        let record = rendezvous.registry().get("broken").unwrap();
        assert_eq!(record.state(), TransferState::Failed);
        assert!(matches!(
            rendezvous.begin_download("broken"),
            Err(RelayError::NotFound { .. })
        ));
        assert!(
            tokio::time::timeout(Duration::from_secs(3600), ticket.wait())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_failure_before_first_byte_sends_no_head() {
        let rendezvous = rendezvous();
        let _ticket = rendezvous.begin_upload(
            "dead",
            meta(10, "d.bin"),
            ScriptedSource::boxed(vec![Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "closed",
            ))]),
        );

        let mut sink = MemorySink::default();
        let err = rendezvous
            .begin_download("dead")
            .unwrap()
            .stream_to(&mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::TransferFailed { bytes_relayed: 0, .. }));
        assert!(sink.head.is_none());
        assert!(sink.body.is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_is_transfer_failed() {
        let rendezvous = rendezvous();
        let payload = vec![7u8; RELAY_CHUNK_SIZE * 3];
        let _ticket = rendezvous.begin_upload(
            "sinkfail",
            meta(payload.len() as u64, "s.bin"),
            Box::new(std::io::Cursor::new(payload)),
        );

        let mut sink = MemorySink {
            fail_after: Some(RELAY_CHUNK_SIZE),
            ..Default::default()
        };
        let err = rendezvous
            .begin_download("sinkfail")
            .unwrap()
            .stream_to(&mut sink)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RelayError::TransferFailed { bytes_relayed, .. } if bytes_relayed == RELAY_CHUNK_SIZE as u64
        ));
        assert_eq!(
            rendezvous.registry().get("sinkfail").unwrap().state(),
            TransferState::Failed
        );
    }

    #[tokio::test]
    async fn test_cancelled_wait_leaves_record_published() {
        let rendezvous = rendezvous();
        let ticket = rendezvous.begin_upload("gone", meta(1, "g"), Box::new(&b"g"[..]));

        let outcome = ticket.wait_or_cancel(std::future::ready(())).await;
        assert_eq!(outcome, TransferOutcome::Abandoned);

        let record = rendezvous.registry().get("gone").unwrap();
        assert_eq!(record.state(), TransferState::Pending);
    }

    #[tokio::test]
    async fn test_dropped_download_marks_failed() {
        let rendezvous = rendezvous();
        let _ticket = rendezvous.begin_upload("drop", meta(1, "d"), Box::new(&b"d"[..]));

        let download = rendezvous.begin_download("drop").unwrap();
        drop(download);

        assert_eq!(
            rendezvous.registry().get("drop").unwrap().state(),
            TransferState::Failed
        );
    }

    #[tokio::test]
    async fn test_registry_drop_abandons_waiter() {
        let rendezvous = rendezvous();
        let ticket = rendezvous.begin_upload("lost", meta(1, "l"), Box::new(&b"l"[..]));
        rendezvous.registry().remove("lost");
        assert_eq!(ticket.wait().await, TransferOutcome::Abandoned);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transfers_do_not_mix() {
        let rendezvous = rendezvous();
        let mut tasks = Vec::new();

        for n in 0..16u32 {
            let payload: Vec<u8> = (0..(RELAY_CHUNK_SIZE as u32 + n * 1013))
                .map(|i| ((i * 31 + n * 7) % 251) as u8)
                .collect();
            let expected = sha256_hex(&payload);
            let id = format!("t{n}");

            let ticket = rendezvous.begin_upload(
                id.clone(),
                meta(payload.len() as u64, "p.bin"),
                Box::new(std::io::Cursor::new(payload)),
            );

            let rendezvous = rendezvous.clone();
            tasks.push(tokio::spawn(async move {
                let mut sink = MemorySink::default();
                let report = rendezvous
                    .begin_download(&id)
                    .unwrap()
                    .stream_to(&mut sink)
                    .await
                    .unwrap();
                assert_eq!(report.sha256, expected);
                assert_eq!(sha256_hex(&sink.body), expected);
                ticket.wait().await
            }));
        }

        for task in tasks {
            assert!(matches!(
                task.await.unwrap(),
                TransferOutcome::Consumed { .. }
            ));
        }
        assert_eq!(rendezvous.registry().active_count(), 0);
    }
}
