//! Append-only commit journal.
//!
//! Every commit becomes one frame:
//!
//! ```text
//! | magic "BBJ1" (4) | version (2) | length (4) | CBOR payload | CRC32 (4) |
//! ```
//!
//! Integers are little-endian and the CRC covers everything before it. A
//! commit is durable once its frame is fully written; on open, frames are
//! replayed in order and an incomplete or damaged tail is cut off.

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::storage::{read_all, StorageBackend};
use crate::types::{RowId, SequenceNumber};
use serde::{Deserialize, Serialize};

/// Magic bytes at the start of every frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"BBJ1";

/// Highest frame version this build can replay.
pub const JOURNAL_VERSION: u16 = 1;

const HEADER_SIZE: usize = 4 + 2 + 4;
const CRC_SIZE: usize = 4;

/// A single write recorded in a commit frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum JournalWrite {
    /// A full row image.
    Row {
        table: String,
        row_id: RowId,
        remote_id: i64,
        payload: Vec<u8>,
    },
    /// A preference value; `None` removes the key.
    Preference { key: String, value: Option<String> },
}

/// The payload of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CommitRecord {
    pub sequence: SequenceNumber,
    pub writes: Vec<JournalWrite>,
}

/// Result of decoding a frame at some offset.
enum Frame {
    Complete { record: CommitRecord, len: usize },
    Torn(String),
}

/// The journal writer and replayer over a storage backend.
pub(crate) struct Journal {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
    version: u16,
    frames: u64,
}

impl Journal {
    pub(crate) fn new(backend: Box<dyn StorageBackend>, config: &Config) -> Self {
        Self {
            backend,
            sync_on_commit: config.sync_on_commit,
            version: config.format_version,
            frames: 0,
        }
    }

    /// Replays all intact frames and truncates a torn tail.
    ///
    /// A frame whose checksum matches but whose payload cannot be decoded, or
    /// that was written by a newer format, is not a torn write and is
    /// reported as corruption instead.
    pub(crate) fn recover(&mut self) -> StoreResult<Vec<CommitRecord>> {
        let data = read_all(self.backend.as_ref())?;
        let mut records = Vec::new();
        let mut offset = 0usize;

        while offset < data.len() {
            match decode_frame(&data[offset..])? {
                Frame::Complete { record, len } => {
                    if let Some(last) = records.last().map(|r: &CommitRecord| r.sequence) {
                        if record.sequence <= last {
                            return Err(StoreError::journal_corruption(format!(
                                "sequence {} follows {} at offset {offset}",
                                record.sequence, last
                            )));
                        }
                    }
                    records.push(record);
                    offset += len;
                }
                Frame::Torn(reason) => {
                    tracing::warn!(
                        offset,
                        dropped = data.len() - offset,
                        reason = %reason,
                        "truncating torn journal tail"
                    );
                    self.backend.truncate(offset as u64)?;
                    break;
                }
            }
        }

        self.frames = records.len() as u64;
        tracing::debug!(frames = self.frames, bytes = offset, "journal replayed");
        Ok(records)
    }

    /// Appends one commit frame, syncing it when configured to.
    ///
    /// On failure the backend is cut back to its previous size so a later
    /// commit never lands after half a frame.
    pub(crate) fn append(&mut self, record: &CommitRecord) -> StoreResult<()> {
        let frame = encode_frame(self.version, record)?;
        let before = self.backend.size()?;

        let written = self.backend.append(&frame).and_then(|_| {
            if self.sync_on_commit {
                self.backend.sync()
            } else {
                Ok(())
            }
        });

        if let Err(err) = written {
            if let Err(cleanup) = self.backend.truncate(before) {
                tracing::error!(error = %cleanup, "failed to roll back partial journal frame");
            }
            return Err(err);
        }

        self.frames += 1;
        Ok(())
    }

    pub(crate) fn sync(&mut self) -> StoreResult<()> {
        self.backend.sync()
    }

    pub(crate) fn size(&self) -> StoreResult<u64> {
        self.backend.size()
    }

    pub(crate) fn frames(&self) -> u64 {
        self.frames
    }
}

fn encode_frame(version: u16, record: &CommitRecord) -> StoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(record, &mut payload).map_err(StoreError::codec)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::invalid_operation("commit too large for one frame"))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&JOURNAL_MAGIC);
    frame.extend_from_slice(&version.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    let crc = compute_crc32(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

fn decode_frame(data: &[u8]) -> StoreResult<Frame> {
    if data.len() < HEADER_SIZE {
        return Ok(Frame::Torn(format!("{} byte header fragment", data.len())));
    }
    if data[0..4] != JOURNAL_MAGIC {
        return Ok(Frame::Torn("bad magic".into()));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    let len = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
    let total = HEADER_SIZE + len + CRC_SIZE;
    if data.len() < total {
        return Ok(Frame::Torn(format!(
            "frame needs {total} bytes, {} present",
            data.len()
        )));
    }

    let body_end = HEADER_SIZE + len;
    let stored = u32::from_le_bytes([
        data[body_end],
        data[body_end + 1],
        data[body_end + 2],
        data[body_end + 3],
    ]);
    if compute_crc32(&data[..body_end]) != stored {
        return Ok(Frame::Torn("checksum mismatch".into()));
    }

    if version > JOURNAL_VERSION {
        return Err(StoreError::journal_corruption(format!(
            "frame version {version} is newer than supported {JOURNAL_VERSION}"
        )));
    }

    let record: CommitRecord = ciborium::from_reader(&data[HEADER_SIZE..body_end])
        .map_err(|e| StoreError::journal_corruption(format!("undecodable frame: {e}")))?;
    Ok(Frame::Complete { record, len: total })
}

/// CRC32 (IEEE) over `data`.
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut n = 0;
        while n < 256 {
            let mut c = n as u32;
            let mut k = 0;
            while k < 8 {
                c = if c & 1 != 0 {
                    0xEDB8_8320 ^ (c >> 1)
                } else {
                    c >> 1
                };
                k += 1;
            }
            table[n] = c;
            n += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFFu32, |crc, &byte| {
        TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBackend;

    fn record(seq: u64, table: &str, remote_id: i64) -> CommitRecord {
        CommitRecord {
            sequence: SequenceNumber::new(seq),
            writes: vec![JournalWrite::Row {
                table: table.into(),
                row_id: RowId::new(seq),
                remote_id,
                payload: vec![0xA1, 0x01, 0x02],
            }],
        }
    }

    fn journal(backend: &InMemoryBackend) -> Journal {
        Journal::new(Box::new(backend.clone()), &Config::default())
    }

    #[test]
    fn crc32_check_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn frames_replay_in_order() {
        let backend = InMemoryBackend::new();
        let mut writer = journal(&backend);
        writer.append(&record(1, "Exercise", 10)).unwrap();
        writer.append(&record(2, "Language", 2)).unwrap();
        assert_eq!(writer.frames(), 2);

        let mut reader = journal(&backend);
        let records = reader.recover().unwrap();
        assert_eq!(records, vec![record(1, "Exercise", 10), record(2, "Language", 2)]);
        assert_eq!(reader.frames(), 2);
    }

    #[test]
    fn frame_layout() {
        let frame = encode_frame(JOURNAL_VERSION, &record(1, "Exercise", 1)).unwrap();
        assert_eq!(&frame[0..4], b"BBJ1");
        assert_eq!(u16::from_le_bytes([frame[4], frame[5]]), 1);
        let len = u32::from_le_bytes([frame[6], frame[7], frame[8], frame[9]]) as usize;
        assert_eq!(frame.len(), HEADER_SIZE + len + CRC_SIZE);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let backend = InMemoryBackend::new();
        let mut writer = journal(&backend);
        writer.append(&record(1, "Exercise", 10)).unwrap();
        let intact = backend.data().len();
        writer.append(&record(2, "Exercise", 11)).unwrap();

        let mut bytes = backend.data();
        bytes.truncate(bytes.len() - 3);
        let damaged = InMemoryBackend::with_data(bytes);

        let mut reader = journal(&damaged);
        let records = reader.recover().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(damaged.data().len(), intact);
    }

    #[test]
    fn flipped_byte_drops_frame() {
        let backend = InMemoryBackend::new();
        journal(&backend).append(&record(1, "Exercise", 10)).unwrap();

        let mut bytes = backend.data();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xFF;
        let damaged = InMemoryBackend::with_data(bytes);

        assert!(journal(&damaged).recover().unwrap().is_empty());
        assert!(damaged.data().is_empty());
    }

    #[test]
    fn newer_version_is_corruption() {
        let frame = encode_frame(JOURNAL_VERSION + 1, &record(1, "Exercise", 1)).unwrap();
        let backend = InMemoryBackend::with_data(frame);
        assert!(matches!(
            journal(&backend).recover(),
            Err(StoreError::JournalCorruption { .. })
        ));
    }

    #[test]
    fn preference_writes_survive() {
        let backend = InMemoryBackend::new();
        let rec = CommitRecord {
            sequence: SequenceNumber::new(1),
            writes: vec![JournalWrite::Preference {
                key: "lang".into(),
                value: Some("de".into()),
            }],
        };
        journal(&backend).append(&rec).unwrap();
        assert_eq!(journal(&backend).recover().unwrap(), vec![rec]);
    }
}
