//! An open MSRP session over a connected stream.
//!
//! [`MsrpSession`] pairs a byte stream with a [`ChunkDecoder`] and the two
//! negotiated paths. [`recv`](MsrpSession::recv) yields only SEND chunks:
//! responses and reports are protocol plumbing the layer above never sees,
//! and requests that ask for a failure report are answered here so the peer
//! does not retransmit.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::chunk::{ChunkDecoder, ChunkKind, MsrpChunk};
use crate::error::Result;
use crate::transport::MsrpStream;

/// One connected MSRP session.
pub struct MsrpSession {
    stream: Box<dyn MsrpStream>,
    decoder: ChunkDecoder,
    local_path: String,
    remote_path: String,
}

impl MsrpSession {
    /// Wrap a connected stream with its negotiated paths.
    pub fn new(
        stream: Box<dyn MsrpStream>,
        local_path: impl Into<String>,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            stream,
            decoder: ChunkDecoder::new(),
            local_path: local_path.into(),
            remote_path: remote_path.into(),
        }
    }

    /// Our path, as the peer addresses us.
    pub fn local_path(&self) -> &str {
        &self.local_path
    }

    /// The peer's path, as we address it.
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Send an empty SEND to exercise the freshly opened connection.
    pub async fn probe(&mut self) -> Result<()> {
        let chunk = MsrpChunk::probe(&self.remote_path, &self.local_path);
        self.send_chunk(&chunk).await
    }

    /// Send a complete message as a single chunk.
    pub async fn send_message(
        &mut self,
        message_id: &str,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Result<()> {
        let chunk = MsrpChunk::send(
            &self.remote_path,
            &self.local_path,
            message_id,
            content_type,
            body,
        );
        self.send_chunk(&chunk).await
    }

    /// Send an already built chunk.
    pub async fn send_chunk(&mut self, chunk: &MsrpChunk) -> Result<()> {
        trace!(
            transaction_id = %chunk.transaction_id,
            bytes = chunk.body.len(),
            "sending chunk"
        );
        self.stream.send(chunk.encode()).await
    }

    /// Receive the next SEND chunk, or `None` once the peer closes.
    ///
    /// Responses and REPORTs are logged and skipped. Requests carrying a
    /// `Failure-Report` other than `no` are answered with a 200 before being
    /// handed up; unrecognized methods are answered with 501 and skipped.
    pub async fn recv(&mut self) -> Result<Option<MsrpChunk>> {
        loop {
            if let Some(chunk) = self.decoder.decode()? {
                match &chunk.kind {
                    ChunkKind::Send => {
                        if chunk.wants_failure_report() {
                            let response = MsrpChunk::response(&chunk, 200, "OK");
                            self.send_chunk(&response).await?;
                        }
                        return Ok(Some(chunk));
                    }
                    ChunkKind::Report => {
                        trace!(
                            message_id = chunk.message_id.as_deref().unwrap_or("-"),
                            "ignoring REPORT chunk"
                        );
                    }
                    ChunkKind::Response { code, .. } => {
                        trace!(code, transaction_id = %chunk.transaction_id, "response chunk");
                    }
                    ChunkKind::Other(method) => {
                        debug!(method, "answering unknown chunk method with 501");
                        if chunk.failure_report.as_deref() != Some("no") {
                            let response = MsrpChunk::response(&chunk, 501, "Not Implemented");
                            self.send_chunk(&response).await?;
                        }
                    }
                }
                continue;
            }

            match self.stream.recv().await? {
                Some(bytes) => self.decoder.push(&bytes),
                None => return Ok(None),
            }
        }
    }

    /// Close the underlying stream.
    pub async fn close(&mut self) -> Result<()> {
        debug!(local_path = %self.local_path, "closing msrp session");
        self.stream.close().await
    }
}

impl std::fmt::Debug for MsrpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsrpSession")
            .field("local_path", &self.local_path)
            .field("remote_path", &self.remote_path)
            .field("buffered", &self.decoder.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{msrp_uri, ChunkDecoder};
    use crate::transport::ChannelMsrpStream;

    fn paths() -> (String, String) {
        (
            msrp_uri("10.0.0.1", 2855, "s1"),
            msrp_uri("10.0.0.2", 2855, "s2"),
        )
    }

    fn connected_pair() -> (MsrpSession, MsrpSession) {
        let (a, b) = ChannelMsrpStream::pair();
        let (alice_path, bob_path) = paths();
        (
            MsrpSession::new(Box::new(a), alice_path.clone(), bob_path.clone()),
            MsrpSession::new(Box::new(b), bob_path, alice_path),
        )
    }

    #[tokio::test]
    async fn test_send_message_delivers() {
        let (mut alice, mut bob) = connected_pair();

        alice
            .send_message("m-1", "message/cpim", "hello bob")
            .await
            .unwrap();

        let chunk = bob.recv().await.unwrap().unwrap();
        assert_eq!(chunk.message_id.as_deref(), Some("m-1"));
        assert_eq!(chunk.content_type.as_deref(), Some("message/cpim"));
        assert_eq!(chunk.body, Bytes::from_static(b"hello bob"));
        assert_eq!(chunk.to_path, bob.local_path());
    }

    #[tokio::test]
    async fn test_probe_is_delivered_as_empty_send() {
        let (mut alice, mut bob) = connected_pair();

        alice.probe().await.unwrap();

        let chunk = bob.recv().await.unwrap().unwrap();
        assert!(chunk.is_empty_payload());
        assert_eq!(chunk.failure_report.as_deref(), Some("no"));
    }

    #[tokio::test]
    async fn test_requested_failure_report_gets_200() {
        let (a, b) = ChannelMsrpStream::pair();
        let (alice_path, bob_path) = paths();
        let mut bob = MsrpSession::new(Box::new(b), bob_path.clone(), alice_path.clone());
        let mut raw_alice = a;

        let mut chunk = MsrpChunk::send(&bob_path, &alice_path, "m-9", "text/plain", "ping");
        chunk.failure_report = Some("yes".to_string());
        raw_alice.send(chunk.encode()).await.unwrap();

        // Bob hands the chunk up and answers it.
        let received = bob.recv().await.unwrap().unwrap();
        assert_eq!(received.message_id.as_deref(), Some("m-9"));

        let mut decoder = ChunkDecoder::new();
        let bytes = raw_alice.recv().await.unwrap().unwrap();
        decoder.push(&bytes);
        let response = decoder.decode().unwrap().unwrap();
        assert_eq!(response.transaction_id, chunk.transaction_id);
        assert!(matches!(response.kind, ChunkKind::Response { code: 200, .. }));
    }

    #[tokio::test]
    async fn test_reports_and_responses_skipped() {
        let (a, b) = ChannelMsrpStream::pair();
        let (alice_path, bob_path) = paths();
        let mut bob = MsrpSession::new(Box::new(b), bob_path.clone(), alice_path.clone());
        let mut raw_alice = a;

        let mut report = MsrpChunk::send(&bob_path, &alice_path, "m-1", "text/plain", "");
        report.kind = ChunkKind::Report;
        raw_alice.send(report.encode()).await.unwrap();

        let data = MsrpChunk::send(&bob_path, &alice_path, "m-2", "text/plain", "real");
        raw_alice.send(data.encode()).await.unwrap();

        let chunk = bob.recv().await.unwrap().unwrap();
        assert_eq!(chunk.message_id.as_deref(), Some("m-2"));
    }

    #[tokio::test]
    async fn test_peer_close_yields_none() {
        let (mut alice, mut bob) = connected_pair();
        alice.close().await.unwrap();
        assert!(bob.recv().await.unwrap().is_none());
    }
}
