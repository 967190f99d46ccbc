//! Transaction log entry encoding and framing.
//!
//! A log entry is the marshalled `(header, body, digest)` triple of an agreed
//! transaction. On disk each entry is framed as:
//!
//! ```text
//! ┌──────────────────┬────────────┬──────────────┬──────┐
//! │ checksum u64 BE  │ len u32 BE │ entry bytes  │ 0x42 │
//! └──────────────────┴────────────┴──────────────┴──────┘
//! ```
//!
//! The checksum is XxHash64 over the entry bytes. A log file starts with a
//! fixed header carrying a magic value, format version and database id. A
//! frame with zero checksum and zero length marks the end of preallocated
//! space.

use crate::core::error::{RequestError, RequestResult};
use crate::request::Request;
use crate::storage::records::{TxnBody, TxnDigest, TxnHeader};
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::hash::Hasher;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use twox_hash::XxHash64;

/// Magic value at the start of every log file.
pub const TXNLOG_MAGIC: [u8; 4] = *b"QRLG";

/// Current log format version.
pub const TXNLOG_VERSION: u32 = 2;

/// End-of-record marker following each entry.
pub const END_OF_RECORD: u8 = 0x42;

/// Size of the file header: magic, version, database id.
const FILE_HEADER_LEN: usize = 4 + 4 + 8;

/// Size of the frame prefix: checksum and length.
const FRAME_PREFIX_LEN: usize = 8 + 4;

/// Seed for entry checksums.
const CHECKSUM_SEED: u64 = 0;

/// A decoded log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnEntry {
    pub header: TxnHeader,
    pub body: Option<TxnBody>,
    pub digest: Option<TxnDigest>,
}

#[derive(Serialize)]
struct TxnEntryRef<'a> {
    header: &'a TxnHeader,
    body: Option<&'a TxnBody>,
    digest: Option<&'a TxnDigest>,
}

/// Encode a transaction triple into an entry.
pub fn marshal_txn_entry(
    header: &TxnHeader,
    body: Option<&TxnBody>,
    digest: Option<&TxnDigest>,
) -> RequestResult<Vec<u8>> {
    let entry = TxnEntryRef {
        header,
        body,
        digest,
    };
    bincode::serialize(&entry).map_err(|e| RequestError::encode(e.to_string()))
}

/// Decode an entry produced by [`marshal_txn_entry`].
pub fn unmarshal_txn_entry(bytes: &[u8]) -> RequestResult<TxnEntry> {
    bincode::deserialize(bytes).map_err(|e| RequestError::decode(e.to_string()))
}

/// Checksum of an encoded entry.
pub fn entry_checksum(entry: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(CHECKSUM_SEED);
    hasher.write(entry);
    hasher.finish()
}

/// Frame an encoded entry for appending to a log.
pub fn frame_entry(entry: &[u8]) -> RequestResult<Vec<u8>> {
    let len = u32::try_from(entry.len())
        .map_err(|_| RequestError::encode(format!("entry of {} bytes too large", entry.len())))?;
    let mut buf = BytesMut::with_capacity(FRAME_PREFIX_LEN + entry.len() + 1);
    buf.put_u64(entry_checksum(entry));
    buf.put_u32(len);
    buf.put_slice(entry);
    buf.put_u8(END_OF_RECORD);
    Ok(buf.to_vec())
}

fn file_header(dbid: u64) -> [u8; FILE_HEADER_LEN] {
    let mut out = [0u8; FILE_HEADER_LEN];
    out[..4].copy_from_slice(&TXNLOG_MAGIC);
    out[4..8].copy_from_slice(&TXNLOG_VERSION.to_be_bytes());
    out[8..].copy_from_slice(&dbid.to_be_bytes());
    out
}

// ============================================================================
// Writer
// ============================================================================

/// Appends framed entries to a log file.
pub struct TxnLogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    entries_written: u64,
    last_zxid: Option<i64>,
}

impl TxnLogWriter {
    /// Create a new log file, failing if it already exists.
    pub fn create(path: impl AsRef<Path>, dbid: u64) -> RequestResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&file_header(dbid))?;
        tracing::debug!(path = %path.display(), dbid, "created transaction log");
        Ok(Self {
            path,
            writer,
            entries_written: 0,
            last_zxid: None,
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries appended through this writer.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Zxid of the last appended request, if any.
    pub fn last_zxid(&self) -> Option<i64> {
        self.last_zxid
    }

    /// Append an already-encoded entry.
    pub fn append_entry(&mut self, entry: &[u8]) -> RequestResult<()> {
        let frame = frame_entry(entry)?;
        self.writer.write_all(&frame)?;
        self.entries_written += 1;
        Ok(())
    }

    /// Append a committed request.
    ///
    /// Returns `false` without writing when the request never reached
    /// agreement. Zxids must not go backwards within a log.
    pub fn append(&mut self, request: &Request) -> RequestResult<bool> {
        let Some(header) = request.txn_header() else {
            return Ok(false);
        };
        if let Some(last) = self.last_zxid {
            if header.zxid < last {
                return Err(RequestError::encode(format!(
                    "zxid 0x{:x} precedes last appended 0x{:x}",
                    header.zxid, last
                )));
            }
        }
        let Some(entry) = request.serialize_for_persistence() else {
            return Ok(false);
        };
        self.append_entry(&entry)?;
        self.last_zxid = Some(header.zxid);
        Ok(true)
    }

    /// Flush buffered frames to the OS and sync them to disk.
    pub fn commit(&mut self) -> RequestResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Reads framed entries back from a log file.
pub struct TxnLogReader {
    dbid: u64,
    data: Vec<u8>,
    offset: usize,
    finished: bool,
}

impl TxnLogReader {
    /// Open and validate a log file.
    pub fn open(path: impl AsRef<Path>) -> RequestResult<Self> {
        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Read a log held in memory.
    pub fn from_bytes(data: Vec<u8>) -> RequestResult<Self> {
        if data.len() < FILE_HEADER_LEN {
            return Err(RequestError::corrupt(0, "file shorter than log header"));
        }
        let mut header = &data[..FILE_HEADER_LEN];
        let mut magic = [0u8; 4];
        header.copy_to_slice(&mut magic);
        if magic != TXNLOG_MAGIC {
            return Err(RequestError::corrupt(0, "bad magic"));
        }
        let version = header.get_u32();
        if version != TXNLOG_VERSION {
            return Err(RequestError::corrupt(
                4,
                format!("unsupported log version {}", version),
            ));
        }
        let dbid = header.get_u64();
        Ok(Self {
            dbid,
            data,
            offset: FILE_HEADER_LEN,
            finished: false,
        })
    }

    /// Database id recorded in the file header.
    pub fn dbid(&self) -> u64 {
        self.dbid
    }

    /// Read the next entry, `None` at end of log.
    pub fn next_entry(&mut self) -> Option<RequestResult<TxnEntry>> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    /// Read the remaining entries as recovered requests.
    pub fn read_requests(&mut self) -> RequestResult<Vec<Request>> {
        let mut requests = Vec::new();
        while let Some(entry) = self.next_entry() {
            requests.push(Request::from_txn_entry(entry?));
        }
        Ok(requests)
    }

    fn read_frame(&mut self) -> RequestResult<Option<TxnEntry>> {
        let start = self.offset;
        let mut buf = &self.data[start..];
        if buf.remaining() < FRAME_PREFIX_LEN {
            if buf.has_remaining() {
                tracing::warn!(offset = start, "truncated frame prefix at end of log");
            }
            return Ok(None);
        }
        let checksum = buf.get_u64();
        let len = buf.get_u32() as usize;
        if checksum == 0 && len == 0 {
            return Ok(None);
        }
        if buf.remaining() < len + 1 {
            tracing::warn!(offset = start, len, "truncated entry at end of log");
            return Ok(None);
        }
        let entry = &buf[..len];
        if entry_checksum(entry) != checksum {
            return Err(RequestError::corrupt(start as u64, "checksum mismatch"));
        }
        if buf[len] != END_OF_RECORD {
            return Err(RequestError::corrupt(
                (start + FRAME_PREFIX_LEN + len) as u64,
                "missing end-of-record marker",
            ));
        }
        let decoded = unmarshal_txn_entry(entry)
            .map_err(|e| RequestError::corrupt(start as u64, e.to_string()))?;
        self.offset = start + FRAME_PREFIX_LEN + len + 1;
        Ok(Some(decoded))
    }
}

impl Iterator for TxnLogReader {
    type Item = RequestResult<TxnEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::opcode::OpCode;

    fn sample_entry(zxid: i64) -> Vec<u8> {
        let header = TxnHeader::new(0x42, 1, zxid, 1_700_000_000_000, OpCode::Delete.code());
        let body = TxnBody::Delete {
            path: "/gone".to_string(),
        };
        marshal_txn_entry(&header, Some(&body), Some(&TxnDigest::new(2, 99))).unwrap()
    }

    fn log_with(entries: &[Vec<u8>]) -> Vec<u8> {
        let mut data = file_header(7).to_vec();
        for entry in entries {
            data.extend(frame_entry(entry).unwrap());
        }
        data
    }

    #[test]
    fn marshal_is_deterministic_and_decodes() {
        let a = sample_entry(0x100);
        let b = sample_entry(0x100);
        assert_eq!(a, b);

        let decoded = unmarshal_txn_entry(&a).unwrap();
        assert_eq!(decoded.header.zxid, 0x100);
        assert_eq!(decoded.digest, Some(TxnDigest::new(2, 99)));
    }

    #[test]
    fn reader_yields_entries_in_order() {
        let data = log_with(&[sample_entry(1), sample_entry(2)]);
        let mut reader = TxnLogReader::from_bytes(data).unwrap();
        assert_eq!(reader.dbid(), 7);
        let zxids: Vec<i64> = reader.by_ref().map(|e| e.unwrap().header.zxid).collect();
        assert_eq!(zxids, vec![1, 2]);
        assert!(reader.next_entry().is_none());
    }

    #[test]
    fn preallocated_padding_ends_log() {
        let mut data = log_with(&[sample_entry(1)]);
        data.extend(std::iter::repeat(0u8).take(64));
        let reader = TxnLogReader::from_bytes(data).unwrap();
        assert_eq!(reader.count(), 1);
    }

    #[test]
    fn checksum_mismatch_is_corruption() {
        let mut data = log_with(&[sample_entry(1)]);
        let last_payload_byte = data.len() - 2;
        data[last_payload_byte] ^= 0xff;
        let mut reader = TxnLogReader::from_bytes(data).unwrap();
        match reader.next_entry() {
            Some(Err(RequestError::CorruptEntry { offset, .. })) => {
                assert_eq!(offset, FILE_HEADER_LEN as u64)
            }
            other => panic!("expected corruption, got {:?}", other),
        }
        assert!(reader.next_entry().is_none());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut data = log_with(&[]);
        data[0] = b'X';
        assert!(TxnLogReader::from_bytes(data).is_err());
    }
}
