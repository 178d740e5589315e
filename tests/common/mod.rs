//! Shared test support: a minimal central-directory parser used to verify
//! archives produced by the writer.
#![allow(dead_code)]

use flate2::read::DeflateDecoder;
use std::io::Read;

pub struct ArchiveEntry {
    pub name: String,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub compression_method: u16,
    pub local_header_offset: u64,
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

fn find_eocd(bytes: &[u8]) -> usize {
    assert!(bytes.len() >= 22, "too short to be a ZIP archive");
    (0..=bytes.len() - 22)
        .rev()
        .find(|&i| u32_at(bytes, i) == 0x0605_4b50)
        .expect("no end-of-central-directory record")
}

/// Walk the central directory; entries come back in directory order.
pub fn list_entries(bytes: &[u8]) -> Vec<ArchiveEntry> {
    let eocd = find_eocd(bytes);
    let mut count = u16_at(bytes, eocd + 10) as u64;
    let mut cd_offset = u32_at(bytes, eocd + 16) as u64;

    // Spill markers mean the real values live in the ZIP64 EOCD record,
    // found through the locator that directly precedes the classic EOCD.
    if count == u16::MAX as u64 || cd_offset == u32::MAX as u64 {
        let locator = eocd - 20;
        assert_eq!(u32_at(bytes, locator), 0x0706_4b50, "ZIP64 EOCD locator");
        let z64 = u64_at(bytes, locator + 8) as usize;
        assert_eq!(u32_at(bytes, z64), 0x0606_4b50, "ZIP64 EOCD record");
        count = u64_at(bytes, z64 + 32);
        cd_offset = u64_at(bytes, z64 + 48);
    }

    let mut entries = Vec::new();
    let mut at = cd_offset as usize;
    for _ in 0..count {
        assert_eq!(u32_at(bytes, at), 0x0201_4b50, "central directory signature");
        let compression_method = u16_at(bytes, at + 10);
        let crc32 = u32_at(bytes, at + 16);
        let mut compressed_size = u32_at(bytes, at + 20) as u64;
        let mut uncompressed_size = u32_at(bytes, at + 24) as u64;
        let name_len = u16_at(bytes, at + 28) as usize;
        let extra_len = u16_at(bytes, at + 30) as usize;
        let comment_len = u16_at(bytes, at + 32) as usize;
        let mut local_header_offset = u32_at(bytes, at + 42) as u64;
        let name = String::from_utf8(bytes[at + 46..at + 46 + name_len].to_vec()).unwrap();

        // A ZIP64 extra field overrides spilled values, in fixed order
        let mut extra = &bytes[at + 46 + name_len..at + 46 + name_len + extra_len];
        while extra.len() >= 4 {
            let id = u16::from_le_bytes([extra[0], extra[1]]);
            let size = u16::from_le_bytes([extra[2], extra[3]]) as usize;
            let mut data = &extra[4..4 + size];
            if id == 0x0001 {
                if uncompressed_size == u32::MAX as u64 {
                    uncompressed_size = u64::from_le_bytes(data[..8].try_into().unwrap());
                    data = &data[8..];
                }
                if compressed_size == u32::MAX as u64 {
                    compressed_size = u64::from_le_bytes(data[..8].try_into().unwrap());
                    data = &data[8..];
                }
                if local_header_offset == u32::MAX as u64 {
                    local_header_offset = u64::from_le_bytes(data[..8].try_into().unwrap());
                }
            }
            extra = &extra[4 + size..];
        }

        entries.push(ArchiveEntry {
            name,
            crc32,
            compressed_size,
            uncompressed_size,
            compression_method,
            local_header_offset,
        });
        at += 46 + name_len + extra_len + comment_len;
    }
    entries
}

/// Decompress one entry's payload and check it against the recorded CRC.
pub fn read_entry(bytes: &[u8], entry: &ArchiveEntry) -> Vec<u8> {
    let at = entry.local_header_offset as usize;
    assert_eq!(u32_at(bytes, at), 0x0403_4b50, "local header signature");
    let name_len = u16_at(bytes, at + 26) as usize;
    let extra_len = u16_at(bytes, at + 28) as usize;
    let data_start = at + 30 + name_len + extra_len;
    let compressed = &bytes[data_start..data_start + entry.compressed_size as usize];

    let data = match entry.compression_method {
        0 => compressed.to_vec(),
        8 => {
            let mut decoder = DeflateDecoder::new(compressed);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).unwrap();
            out
        }
        other => panic!("unexpected compression method {}", other),
    };

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&data);
    assert_eq!(hasher.finalize(), entry.crc32, "CRC mismatch for {}", entry.name);
    data
}
