//! Transaction log tests.

mod common;

use common::*;
use quorum_request::error::RequestError;
use quorum_request::records::{TxnBody, TxnHeader};
use quorum_request::txnlog::{TxnLogReader, TxnLogWriter, TXNLOG_MAGIC};
use quorum_request::{OpCode, Request};
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::TempDir;

fn delete_request(zxid: i64) -> Request {
    let header = TxnHeader::new(0x42, zxid as i32, zxid, 1_000 + zxid, OpCode::Delete.code());
    Request::from_persisted(
        header,
        Some(TxnBody::Delete {
            path: format!("/node-{}", zxid),
        }),
        None,
    )
}

#[test]
fn committed_requests_survive_a_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log.100");
    let (header, body, digest) = agreed_create(0x100, 5_000);
    let created = Request::from_persisted(header, Some(body.clone()), Some(digest));

    let mut writer = TxnLogWriter::create(&path, 11).unwrap();
    assert!(writer.append(&created).unwrap());
    assert!(writer.append(&delete_request(0x101)).unwrap());
    writer.commit().unwrap();
    assert_eq!(writer.entries_written(), 2);
    assert_eq!(writer.last_zxid(), Some(0x101));

    let mut reader = TxnLogReader::open(&path).unwrap();
    assert_eq!(reader.dbid(), 11);
    let requests = reader.read_requests().unwrap();
    assert_eq!(requests.len(), 2);

    let recovered = &requests[0];
    assert_eq!(recovered.session_id(), 0x42);
    assert_eq!(recovered.zxid(), Some(0x100));
    assert_eq!(recovered.txn_body(), Some(&body));
    assert_eq!(recovered.txn_digest(), Some(&digest));
    assert_eq!(
        recovered.serialize_for_persistence(),
        created.serialize_for_persistence()
    );
    assert_eq!(requests[1].op_code(), Some(OpCode::Delete));
}

#[test]
fn unagreed_requests_are_not_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log.1");
    let mut writer = TxnLogWriter::create(&path, 1).unwrap();

    assert!(!writer.append(&path_request(OpCode::Create, "/pending")).unwrap());
    writer.commit().unwrap();
    assert_eq!(writer.entries_written(), 0);

    let entries: Vec<_> = TxnLogReader::open(&path).unwrap().collect();
    assert!(entries.is_empty());
}

#[test]
fn zxids_must_not_go_backwards() {
    let dir = TempDir::new().unwrap();
    let mut writer = TxnLogWriter::create(dir.path().join("log.5"), 1).unwrap();

    writer.append(&delete_request(5)).unwrap();
    writer.append(&delete_request(5)).unwrap();
    let err = writer.append(&delete_request(4)).unwrap_err();
    assert!(matches!(err, RequestError::Encode { .. }));
    assert_eq!(writer.last_zxid(), Some(5));
}

#[test]
fn existing_log_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log.1");
    TxnLogWriter::create(&path, 1).unwrap();
    assert!(matches!(
        TxnLogWriter::create(&path, 1),
        Err(RequestError::Io(_))
    ));
}

#[test]
fn truncated_tail_ends_the_log() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log.1");
    let mut writer = TxnLogWriter::create(&path, 1).unwrap();
    writer.append(&delete_request(1)).unwrap();
    writer.append(&delete_request(2)).unwrap();
    writer.commit().unwrap();
    drop(writer);

    let len = std::fs::metadata(&path).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(len - 3)
        .unwrap();

    let requests = TxnLogReader::open(&path).unwrap().read_requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].zxid(), Some(1));
}

#[test]
fn flipped_byte_is_reported_as_corruption() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log.1");
    let mut writer = TxnLogWriter::create(&path, 1).unwrap();
    writer.append(&delete_request(1)).unwrap();
    writer.commit().unwrap();
    drop(writer);

    let mut data = std::fs::read(&path).unwrap();
    // file header (16) + frame prefix (12) lands inside the entry
    data[30] ^= 0xff;

    let mut reader = TxnLogReader::from_bytes(data).unwrap();
    assert!(matches!(
        reader.next_entry(),
        Some(Err(RequestError::CorruptEntry { offset: 16, .. }))
    ));
    assert!(reader.next_entry().is_none());
}

#[test]
fn foreign_files_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not-a-log");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"PK\x03\x04 definitely a zip file").unwrap();

    assert!(matches!(
        TxnLogReader::open(&path),
        Err(RequestError::CorruptEntry { offset: 0, .. })
    ));

    let mut header = TXNLOG_MAGIC.to_vec();
    header.extend_from_slice(&99u32.to_be_bytes());
    header.extend_from_slice(&0u64.to_be_bytes());
    assert!(matches!(
        TxnLogReader::from_bytes(header),
        Err(RequestError::CorruptEntry { offset: 4, .. })
    ));
}
