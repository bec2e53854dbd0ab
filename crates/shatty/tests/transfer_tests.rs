//! Integration tests for endpoints backed by streamed transfers.

mod common;

use std::sync::Arc;

use common::MemoryTransfer;
use shatty::frame;
use shatty::{
    DecodeError, Endpoint, EndpointOptions, FrameReader, ShattyError, Sink, Source, TransferError,
};
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn streamed_sink_uploads_every_write_in_order() {
    let transfer = MemoryTransfer::default();
    let mut sink = Sink::streamed("memory://upload", Arc::new(transfer.clone()), 2);

    let mut expected = Vec::new();
    for i in 0..20u8 {
        let bytes = frame::encode(f64::from(i) * 0.1, &[i; 3]);
        expected.extend_from_slice(&bytes);
        sink.write(&bytes).await.unwrap();
    }
    sink.finish().await.unwrap();

    assert_eq!(transfer.uploaded(), expected);
}

#[tokio::test]
async fn failed_upload_surfaces_on_finish_or_write() {
    let transfer = MemoryTransfer {
        fail_upload: Some(503),
        ..MemoryTransfer::default()
    };
    let mut sink = Sink::streamed("memory://upload", Arc::new(transfer), 1);

    // Writes may be buffered before the failure is noticed; keep writing
    // until one fails or the sink is finished.
    let mut failure = None;
    for _ in 0..8 {
        if let Err(e) = sink.write(b"frame").await {
            failure = Some(e);
            break;
        }
    }
    let err = match failure {
        Some(e) => e,
        None => sink.finish().await.unwrap_err(),
    };

    assert!(
        matches!(err, ShattyError::Transfer(TransferError::Status { status: 503 })),
        "unexpected: {err:?}"
    );
}

#[tokio::test]
async fn streamed_source_reassembles_frames_across_chunks() {
    let mut recording = Vec::new();
    recording.extend_from_slice(&frame::encode(0.0, b"first"));
    recording.extend_from_slice(&frame::encode(0.3, b""));
    recording.extend_from_slice(&frame::encode(0.9, b"third frame"));

    // Chunk boundaries fall inside headers and payloads.
    let transfer = MemoryTransfer::serving(&recording, 5);
    let source = Source::streamed("memory://download", Arc::new(transfer), 2);

    let mut reader = FrameReader::new(source);
    let frames = reader.read_all().await.unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].payload.as_ref(), b"third frame");
    assert_eq!(frames[1].offset, 0.3);

    reader.into_inner().finish().await.unwrap();
}

#[tokio::test]
async fn download_failure_is_a_read_error() {
    let mut recording = frame::encode(0.0, b"ok").to_vec();
    recording.extend_from_slice(&frame::encode(0.1, b"lost"));

    let transfer = MemoryTransfer {
        fail_download_after_chunks: true,
        ..MemoryTransfer::serving(&recording[..recording.len() - 2], 4)
    };
    let source = Source::streamed("memory://download", Arc::new(transfer), 4);

    let mut reader = FrameReader::new(source);
    assert_eq!(
        reader.next_frame().await.unwrap().unwrap().payload.as_ref(),
        b"ok"
    );
    match reader.next_frame().await {
        Err(DecodeError::Io(e)) => assert!(e.to_string().contains("connection reset")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn dropping_a_source_early_does_not_hang_finish() {
    let recording: Vec<u8> = (0..64)
        .flat_map(|i| frame::encode(f64::from(i), b"chunk"))
        .collect();
    let transfer = MemoryTransfer::serving(&recording, 3);
    let mut source = Source::streamed("memory://download", Arc::new(transfer), 1);

    let mut first = [0u8; 4];
    source.read_exact(&mut first).await.unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), source.finish())
        .await
        .expect("finish should not block on a full channel")
        .unwrap();
}

#[tokio::test]
async fn file_endpoints_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = Endpoint::parse(dir.path().join("rec.shatty").to_str().unwrap()).unwrap();
    assert!(!endpoint.is_remote());

    let mut sink = Sink::open(&endpoint, EndpointOptions::default())
        .await
        .unwrap();
    sink.write(&frame::encode(0.0, b"abc")).await.unwrap();
    sink.finish().await.unwrap();

    let source = Source::open(&endpoint, EndpointOptions::default())
        .await
        .unwrap();
    let frames = FrameReader::new(source).read_all().await.unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload.as_ref(), b"abc");
}

#[tokio::test]
async fn unwritable_sink_fails_fast() {
    let endpoint = Endpoint::parse("/nonexistent-shatty-dir/rec.shatty").unwrap();
    let err = Sink::open(&endpoint, EndpointOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ShattyError::OpenSink { .. }));
}

#[tokio::test]
async fn missing_source_fails_to_open() {
    let endpoint = Endpoint::parse("/nonexistent-shatty-dir/rec.shatty").unwrap();
    let err = Source::open(&endpoint, EndpointOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ShattyError::OpenSource { .. }));
}
