use std::collections::HashMap;

use common::storage::ContentHash;
use server::ingest::IngestError;
use server::records::RecordFilter;

use crate::common::TestApp;

mod dedup {
    use super::*;

    #[tokio::test]
    async fn repeat_upload_increments_and_stores_once() {
        let app = TestApp::spawn().await;
        let ingest = &app.state.ingest;

        let first = ingest
            .ingest(&b"hello"[..], "a.txt", "text/plain")
            .await
            .unwrap();
        let second = ingest
            .ingest(&b"hello"[..], "b.txt", "application/json")
            .await
            .unwrap();
        let other = ingest
            .ingest(&b"world"[..], "c.txt", "text/plain")
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert!(other.created);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.upload_count, 2);
        assert_eq!(second.record.original_filename, "a.txt");
        assert_eq!(second.record.content_type, "text/plain");
        assert_eq!(other.record.upload_count, 1);
        assert_ne!(other.record.digest, first.record.digest);

        assert_eq!(app.blob_count(), 2);
        assert_eq!(app.spool_count(), 0);
    }

    #[tokio::test]
    async fn digest_matches_content() {
        let app = TestApp::spawn().await;

        let result = app
            .state
            .ingest
            .ingest(&b"hello"[..], "a.txt", "text/plain")
            .await
            .unwrap();

        assert_eq!(result.record.digest, ContentHash::compute(b"hello").to_hex());
        assert_eq!(result.record.size_bytes, 5);
    }

    #[tokio::test]
    async fn concurrent_identical_uploads_share_one_record() {
        const K: usize = 16;
        let app = TestApp::spawn().await;
        let payload = vec![42u8; 200_000];

        let handles: Vec<_> = (0..K)
            .map(|i| {
                let ingest = app.state.ingest.clone();
                let payload = payload.clone();
                tokio::spawn(async move {
                    ingest
                        .ingest(&payload[..], &format!("copy-{i}.bin"), "")
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            if result.created {
                created += 1;
            }
        }

        let records = app.state.records.query(&RecordFilter::new()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].upload_count, K as i64);
        assert_eq!(created, 1);
        assert_eq!(app.blob_count(), 1);
        assert_eq!(app.spool_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_mixed_uploads_keep_one_record_per_digest() {
        const DISTINCT: usize = 8;
        let app = TestApp::spawn().await;

        // Payload i is uploaded i % 3 + 1 times, all at once.
        let mut uploads = Vec::new();
        for i in 0..DISTINCT {
            let payload = format!("payload number {i}").repeat(500).into_bytes();
            for _ in 0..(i % 3 + 1) {
                uploads.push(payload.clone());
            }
        }
        let total = uploads.len();

        let handles: Vec<_> = uploads
            .into_iter()
            .enumerate()
            .map(|(n, payload)| {
                let ingest = app.state.ingest.clone();
                tokio::spawn(async move {
                    ingest
                        .ingest(&payload[..], &format!("upload-{n}.txt"), "text/plain")
                        .await
                })
            })
            .collect();

        let mut created: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            let entry = created.entry(result.record.digest.clone()).or_default();
            if result.created {
                *entry += 1;
            }
        }

        assert_eq!(created.len(), DISTINCT);
        assert!(created.values().all(|&n| n == 1), "{created:?}");

        let records = app.state.records.query(&RecordFilter::new()).await.unwrap();
        assert_eq!(records.len(), DISTINCT);
        for i in 0..DISTINCT {
            let payload = format!("payload number {i}").repeat(500).into_bytes();
            let digest = ContentHash::compute(&payload).to_hex();
            let record = records
                .iter()
                .find(|r| r.digest == digest)
                .expect("every distinct payload has a record");
            assert_eq!(record.upload_count, (i % 3 + 1) as i64, "payload {i}");
            assert_eq!(record.size_bytes, payload.len() as i64);
        }

        let uploads: i64 = records.iter().map(|r| r.upload_count).sum();
        assert_eq!(uploads, total as i64);
        assert_eq!(app.blob_count(), DISTINCT);
        assert_eq!(app.spool_count(), 0);
    }
}

mod rejection {
    use super::*;

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let app = TestApp::spawn().await;

        let err = app
            .state
            .ingest
            .ingest(&b""[..], "empty.txt", "text/plain")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::InvalidInput(_)));
        assert_eq!(app.blob_count(), 0);
        assert!(app.state.records.query(&RecordFilter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let app = TestApp::spawn_with_limit(1024).await;

        let err = app
            .state
            .ingest
            .ingest(&vec![1u8; 1025][..], "big.bin", "")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::InvalidInput(_)));
        assert_eq!(app.blob_count(), 0);
        assert_eq!(app.spool_count(), 0);
    }
}
