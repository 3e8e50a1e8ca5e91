mod common;

use std::io::{Cursor, SeekFrom};

use elliptics_protocol::{FailureKind, IOFLAGS_APPEND, Method, Phase};
use elliptics_storage::{
    Content, LazyRecord, SaveOptions, SessionState, StorageConfig, StorageError, UnknownLength,
    UploadMode,
};
use serde::{Deserialize, Serialize};

use common::{FakeStore, Logged, config, payload, storage};

fn joined(requests: &[Logged]) -> Vec<u8> {
    requests.iter().flat_map(|r| r.body.to_vec()).collect()
}

fn sequential(chunk_size: usize) -> StorageConfig {
    StorageConfig {
        upload_mode: UploadMode::Sequential,
        ..config(chunk_size)
    }
}

// ---------------------------------------------------------------------------
// Request series
// ---------------------------------------------------------------------------

#[tokio::test]
async fn small_content_is_one_plain_post() {
    let store = FakeStore::new();
    let storage = storage(&store, config(1024));

    let key = storage.save("test.xml", "<xml>test data</xml>").await.unwrap();
    assert_eq!(key, "test.xml");

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].method, Method::Post);
    assert!(uploads[0].params.is_empty(), "{:?}", uploads[0].params);
    assert_eq!(&uploads[0].body[..], b"<xml>test data</xml>");

    let mut file = storage.open("test.xml", "r").unwrap();
    let body = file.read(None).await.unwrap();
    assert_eq!(&body[..], b"<xml>test data</xml>");
    assert_eq!(body.len(), 20);
}

#[tokio::test]
async fn content_of_exactly_one_chunk_is_one_request() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));

    storage.save("k", "abcd").await.unwrap();

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].params.is_empty());
}

async fn check_known_length_series(config: StorageConfig) {
    let store = FakeStore::new();
    let storage = storage(&store, config);
    let data = payload(10);

    storage.save("k", data.clone()).await.unwrap();

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 3);

    let first = &uploads[0];
    assert_eq!(first.params.offset, Some(0));
    assert_eq!(first.params.size, Some(4));
    assert_eq!(first.params.prepare, Some(10));
    assert_eq!(first.params.commit, None);

    let last = uploads.last().unwrap();
    assert_eq!(last.params.offset, Some(8));
    assert_eq!(last.params.size, Some(2));
    assert_eq!(last.params.commit, Some(10));
    assert_eq!(last.params.prepare, None);

    assert_eq!(uploads.iter().filter(|r| r.params.prepare.is_some()).count(), 1);
    assert_eq!(uploads.iter().filter(|r| r.params.commit.is_some()).count(), 1);

    let mut ranges: Vec<_> = uploads
        .iter()
        .map(|r| (r.params.offset.unwrap(), r.params.size.unwrap()))
        .collect();
    ranges.sort();
    let mut expected = 0;
    for (offset, size) in &ranges {
        assert_eq!(*offset, expected);
        expected += size;
    }
    assert_eq!(expected, 10);

    assert_eq!(store.object("k").unwrap(), data);
}

#[tokio::test]
async fn known_length_prepares_and_commits_parallel() {
    check_known_length_series(config(4)).await;
}

#[tokio::test]
async fn known_length_prepares_and_commits_sequential() {
    check_known_length_series(sequential(4)).await;
}

#[tokio::test]
async fn two_chunks_have_no_middle() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));

    storage.save("k", payload(8)).await.unwrap();

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].params.prepare, Some(8));
    assert_eq!(uploads[1].params.commit, Some(8));
}

#[tokio::test]
async fn empty_content_writes_an_empty_object() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));

    let report = storage
        .save_with_report("empty", "", SaveOptions::default())
        .await
        .unwrap();
    assert_eq!(report.requests, 1);
    assert_eq!(report.state, SessionState::Done);

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].params.is_empty());
    assert!(uploads[0].body.is_empty());
    assert_eq!(store.object("empty"), Some(Vec::new()));
}

#[tokio::test]
async fn unknown_length_uploads_by_append() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));
    let data = payload(10);
    store.insert("k", b"stale content that must go");

    storage
        .save("k", Content::from_reader(Cursor::new(data.clone())))
        .await
        .unwrap();

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 3);
    assert!(uploads[0].params.is_empty());
    for request in &uploads[1..] {
        assert_eq!(request.params.ioflags, Some(IOFLAGS_APPEND));
    }
    assert!(uploads.iter().all(|r| r.params.prepare.is_none() && r.params.commit.is_none()));
    assert_eq!(joined(&uploads), data);
    assert_eq!(store.object("k").unwrap(), data);
}

#[tokio::test]
async fn unknown_length_reserve_policy() {
    let store = FakeStore::new();
    let storage = storage(
        &store,
        StorageConfig {
            unknown_length: UnknownLength::Reserve,
            average_object_size: 8,
            ..config(4)
        },
    );
    let data = payload(10);

    storage
        .save("k", Content::from_reader(Cursor::new(data.clone())))
        .await
        .unwrap();

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 3);
    assert_eq!(uploads[0].params.prepare, Some(16));
    assert_eq!(uploads[2].params.commit, Some(10));
    assert_eq!(store.object("k").unwrap(), data);
}

#[tokio::test]
async fn declared_size_shorter_than_stream_still_commits() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));
    let data = payload(7);

    storage
        .save("k", Content::from_reader_with_size(Cursor::new(data.clone()), 4))
        .await
        .unwrap();

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].params.prepare, None);
    assert_eq!(uploads[1].params.commit, Some(7));
    assert_eq!(store.object("k").unwrap(), data);
}

// ---------------------------------------------------------------------------
// Round trips and append
// ---------------------------------------------------------------------------

#[tokio::test]
async fn round_trip_sizes() {
    for config in [config(4), sequential(4)] {
        let store = FakeStore::new();
        let storage = storage(&store, config);

        for len in [0usize, 1, 4, 8, 23] {
            let key = format!("obj-{len}");
            let data = payload(len);
            storage.save(&key, data.clone()).await.unwrap();

            let mut file = storage.open(&key, "rb").unwrap();
            let body = file.read(None).await.unwrap();
            assert_eq!(body.to_vec(), data, "len {len}");
        }
    }
}

#[tokio::test]
async fn reads_are_idempotent() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));
    storage.save("k", payload(13)).await.unwrap();

    let once = storage.fetch("k").await.unwrap();
    let twice = storage.fetch("k").await.unwrap();
    assert_eq!(once, twice);
}

#[tokio::test]
async fn append_through_file_handle() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));
    storage.save("log.txt", "first part, ").await.unwrap();
    store.clear_log();

    let mut file = storage.open("log.txt", "a").unwrap();
    assert_eq!(file.write(b"second ").unwrap(), 7);
    assert_eq!(file.write(b"part").unwrap(), 4);
    file.close().await.unwrap();
    assert!(file.closed());

    let uploads = store.uploads();
    assert!(!uploads.is_empty());
    assert!(uploads.iter().all(|r| r.params.is_append()));
    assert_eq!(joined(&uploads), b"second part");

    let body = storage.fetch("log.txt").await.unwrap();
    assert_eq!(&body[..], b"first part, second part");
}

#[tokio::test]
async fn append_save_of_stream() {
    let store = FakeStore::new();
    let storage = storage(&store, config(3));
    store.insert("k", b"AB");

    let report = storage
        .save_with_report(
            "k",
            Content::from_reader(Cursor::new(b"CDEFGHI".to_vec())),
            SaveOptions::append(),
        )
        .await
        .unwrap();
    assert_eq!(report.requests, 3);
    assert_eq!(report.bytes, 7);

    assert!(store.uploads().iter().all(|r| r.params.is_append()));
    assert_eq!(store.object("k").unwrap(), b"ABCDEFGHI");
}

#[tokio::test]
async fn empty_append_sends_nothing() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));

    let report = storage
        .save_with_report("k", "", SaveOptions::append())
        .await
        .unwrap();
    assert_eq!(report.requests, 0);
    assert_eq!(report.state, SessionState::Done);
    assert!(store.log().is_empty());
}

#[tokio::test]
async fn write_handle_replaces_object() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));
    store.insert("k", b"old old old");

    let mut file = storage.open("k", "wb").unwrap();
    assert!(file.closed());
    file.write(b"new").unwrap();
    assert!(!file.closed());
    file.close().await.unwrap();

    assert_eq!(store.object("k").unwrap(), b"new");
}

#[tokio::test]
async fn untouched_handle_close_is_a_no_op() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));

    let mut file = storage.open("k", "w").unwrap();
    file.close().await.unwrap();
    assert!(store.log().is_empty());
}

#[tokio::test]
async fn partial_reads_and_seek() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));
    storage.save("k", "0123456789").await.unwrap();

    let mut file = storage.open("k", "r").unwrap();
    assert_eq!(&file.read(Some(3)).await.unwrap()[..], b"012");
    assert_eq!(&file.read(Some(3)).await.unwrap()[..], b"345");
    assert_eq!(file.seek(SeekFrom::Start(1)).await.unwrap(), 1);
    assert_eq!(&file.read(None).await.unwrap()[..], b"123456789");
    assert!(file.read(None).await.unwrap().is_empty());

    let gets = store.log().iter().filter(|r| r.method == Method::Get).count();
    assert_eq!(gets, 1);
}

#[tokio::test]
async fn mode_misuse() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));

    let mut reader = storage.open("k", "r").unwrap();
    let err = reader.write(b"x").unwrap_err();
    assert_eq!(err.kind(), FailureKind::ModeMisuse);

    let mut writer = storage.open("k", "w").unwrap();
    let err = writer.read(None).await.unwrap_err();
    assert!(matches!(err, StorageError::Mode(_)));

    assert!(matches!(
        storage.open("k", "a+"),
        Err(StorageError::InvalidMode(_))
    ));
    assert!(store.log().is_empty());
}

// ---------------------------------------------------------------------------
// Pool, failures and retries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pool_saturation_is_bounded() {
    let store = FakeStore::new();
    let storage = storage(
        &store,
        StorageConfig {
            max_sessions: 2,
            ..config(1)
        },
    );
    let data = payload(40);

    let report = storage
        .save_with_report("k", data.clone(), SaveOptions::default())
        .await
        .unwrap();

    assert_eq!(report.requests, 40);
    assert_eq!(report.bytes, 40);
    assert_eq!(report.state, SessionState::Done);
    assert!(store.peak_in_flight() <= 2, "peak {}", store.peak_in_flight());
    assert_eq!(store.object("k").unwrap(), data);
}

async fn check_interior_failure(config: StorageConfig) {
    let store = FakeStore::new();
    let storage = storage(&store, config);
    store.fail_at_offset(8);

    let err = storage.save("k", payload(40)).await.unwrap_err();
    assert!(err.is_save_error(), "{err}");
    assert_eq!(
        err.kind(),
        FailureKind::RemoteStatus {
            code: 500,
            phase: Phase::Write
        }
    );

    assert!(store.uploads().iter().all(|r| r.params.commit.is_none()));
    assert_eq!(store.object("k"), None);
}

#[tokio::test]
async fn interior_failure_never_commits_parallel() {
    check_interior_failure(config(4)).await;
}

#[tokio::test]
async fn interior_failure_never_commits_sequential() {
    check_interior_failure(sequential(4)).await;
}

#[tokio::test]
async fn first_chunk_failure_stops_the_upload() {
    let store = FakeStore::new();
    let storage = storage(&store, config(4));
    store.fail_at_offset(0);

    let err = storage.save("k", payload(40)).await.unwrap_err();
    assert!(err.is_save_error());
    assert_eq!(store.uploads().len(), 1);
}

#[tokio::test]
async fn write_retries_are_counted_exactly() {
    let store = FakeStore::new();
    let storage = storage(
        &store,
        StorageConfig {
            write_retries: 4,
            ..config(1024)
        },
    );
    store.time_out_always();

    let err = storage.save("k", "data").await.unwrap_err();
    assert_eq!(
        err.kind(),
        FailureKind::Timeout {
            phase: Phase::Write
        }
    );
    assert!(err.is_save_error() && err.is_read_error());
    assert!(err.to_string().starts_with("4 failed attempts of 4"), "{err}");
    assert_eq!(store.log().len(), 4);
}

#[tokio::test]
async fn transient_timeouts_are_absorbed() {
    let store = FakeStore::new();
    let storage = storage(&store, config(1024));
    store.time_out_next(2);

    storage.save("k", "data").await.unwrap();

    let log = store.log();
    assert_eq!(log.len(), 3);
    assert_eq!(log.iter().filter(|r| r.verb == "timeout").count(), 2);
    assert_eq!(store.object("k").unwrap(), b"data");
}

#[tokio::test]
async fn read_uses_read_budget() {
    let store = FakeStore::new();
    let storage = storage(
        &store,
        StorageConfig {
            read_retries: 2,
            ..config(1024)
        },
    );
    store.time_out_always();

    let err = storage.fetch("k").await.unwrap_err();
    assert!(err.is_read_error());
    assert_eq!(store.log().len(), 2);
}

#[tokio::test]
async fn missing_object_is_a_read_error() {
    let store = FakeStore::new();
    let storage = storage(&store, config(1024));

    let err = storage.fetch("nope").await.unwrap_err();
    assert!(err.is_read_error());
    assert!(!err.is_save_error());
    assert_eq!(
        err.kind(),
        FailureKind::RemoteStatus {
            code: 404,
            phase: Phase::Read
        }
    );
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn keys_are_prefixed_and_encoded() {
    let store = FakeStore::new();
    let storage = storage(
        &store,
        StorageConfig {
            prefix: "long/prefix".into(),
            ..config(1024)
        },
    );

    storage.save("a b.txt", "x").await.unwrap();
    assert_eq!(store.uploads()[0].key, "long/prefix/a%20b.txt");
    assert_eq!(
        storage.url("a b.txt"),
        "http://cdn.example/get/long/prefix/a%20b.txt"
    );
}

#[tokio::test]
async fn exists_and_delete() {
    let store = FakeStore::new();
    let storage = storage(&store, config(1024));

    assert!(!storage.exists("k").await.unwrap());
    storage.save("k", "x").await.unwrap();
    assert!(storage.exists("k").await.unwrap());

    storage.delete("k").await.unwrap();
    assert!(!storage.exists("k").await.unwrap());
    // Deleting again is not an error.
    storage.delete("k").await.unwrap();

    let heads = store.log().iter().filter(|r| r.method == Method::Head).count();
    assert_eq!(heads, 3);
}

// ---------------------------------------------------------------------------
// Lazy records
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    visits: u32,
}

#[tokio::test]
async fn lazy_record_round_trip() {
    let store = FakeStore::new();
    let storage = storage(&store, config(1024));

    let mut record: LazyRecord<Profile> = LazyRecord::new(None);
    assert_eq!(record.get(&storage).await.unwrap(), &Profile::default());
    record.get_mut(&storage).await.unwrap().name = "ada".into();
    assert!(record.is_modified());

    let key = record.save(&storage, "profiles/1.json").await.unwrap();
    assert_eq!(key.as_deref(), Some("profiles/1.json"));
    assert!(!record.is_modified());

    let mut again: LazyRecord<Profile> = LazyRecord::new(key);
    assert!(!again.is_loaded());
    let profile = again.load(&storage).await.unwrap();
    assert_eq!(profile.name, "ada");
    assert!(again.is_loaded());
}

#[tokio::test]
async fn lazy_record_missing_key_is_default() {
    let store = FakeStore::new();
    let storage = storage(&store, config(1024));

    let mut record: LazyRecord<Profile> = LazyRecord::new(Some("absent".into()));
    assert_eq!(record.get(&storage).await.unwrap(), &Profile::default());
}

#[tokio::test]
async fn unmodified_record_is_not_written() {
    let store = FakeStore::new();
    let storage = storage(&store, config(1024));
    store.insert("p", br#"{"name":"bob","visits":3}"#);

    let mut record: LazyRecord<Profile> = LazyRecord::new(Some("p".into()));
    assert_eq!(record.get(&storage).await.unwrap().visits, 3);
    store.clear_log();

    let key = record.save(&storage, "p").await.unwrap();
    assert_eq!(key.as_deref(), Some("p"));
    assert!(store.log().is_empty());
}
