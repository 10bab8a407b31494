//! Archive file framing.
//!
//! The archival artifact is the encoded byte stream behind a small fixed
//! header carrying what the decoder needs: sample rate and true sample
//! count (the final byte may hold padding codes).

use crate::error::{ArchiveError, Result};

/// File magic: "ADPV".
pub const MAGIC: [u8; 4] = *b"ADPV";

/// Current container version.
pub const VERSION: u8 = 1;

/// Header length in bytes: magic + version + sample_rate(u32) +
/// sample_count(u64).
pub const HEADER_LEN: usize = 4 + 1 + 4 + 8;

/// Parsed archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub sample_rate: u32,
    pub sample_count: u64,
}

impl ArchiveHeader {
    /// Audio duration described by this header, in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f64 / f64::from(self.sample_rate)
    }
}

/// Frame an encoded payload into the archive format.
pub fn write_archive(sample_rate: u32, sample_count: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&sample_count.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Split an archive into its header and encoded payload.
pub fn read_archive(data: &[u8]) -> Result<(ArchiveHeader, &[u8])> {
    if data.len() < HEADER_LEN {
        return Err(ArchiveError::encode(format!(
            "archive truncated: {} bytes",
            data.len()
        )));
    }
    if data[0..4] != MAGIC {
        return Err(ArchiveError::encode("bad archive magic"));
    }
    if data[4] != VERSION {
        return Err(ArchiveError::encode(format!(
            "unsupported archive version {}",
            data[4]
        )));
    }

    let sample_rate = u32::from_le_bytes([data[5], data[6], data[7], data[8]]);
    let sample_count = u64::from_le_bytes([
        data[9], data[10], data[11], data[12], data[13], data[14], data[15], data[16],
    ]);

    Ok((
        ArchiveHeader {
            sample_rate,
            sample_count,
        },
        &data[HEADER_LEN..],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header_and_payload() {
        let framed = write_archive(8_000, 24_000, &[1, 2, 3, 4]);
        let (header, payload) = read_archive(&framed).unwrap();
        assert_eq!(header.sample_rate, 8_000);
        assert_eq!(header.sample_count, 24_000);
        assert_eq!(header.duration_seconds(), 3.0);
        assert_eq!(payload, &[1, 2, 3, 4]);
    }

    #[test]
    fn rejects_truncated_and_foreign_data() {
        assert!(read_archive(&[0u8; 4]).is_err());
        assert!(read_archive(b"RIFF0000000000000").is_err());
    }
}
