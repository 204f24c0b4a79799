//! WPK binary format implementation.
//!
//! Layout: magic, version, flags, entry count, payload length, then the
//! payload (length-prefixed named entries followed by the delegate
//! manifest), then a SHA-256 hash over everything before it.

use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};
use thiserror::Error;

use weft_ir::CompiledUnit;

/// Magic bytes identifying a WPK file: "WPK\0"
pub const MAGIC: [u8; 4] = [0x57, 0x50, 0x4B, 0x00];

/// Size of the fixed header.
/// 4 (magic) + 3 (version) + 1 (flags) + 8 (entry count) + 8 (payload length) = 24 bytes
const HEADER_SIZE: usize = 24;

/// Size of the trailing content hash.
const HASH_SIZE: usize = 32;

/// Name of the manifest pseudo-entry listing delegate templates.
const MANIFEST_ENTRY: &str = "!delegates";

/// Errors that can occur during WPK file operations.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid magic bytes: expected WPK\\0")]
    InvalidMagic,

    #[error("unsupported format version {major}.{minor}.{patch}")]
    UnsupportedVersion { major: u8, minor: u8, patch: u8 },

    #[error("content hash mismatch: file is corrupted")]
    HashMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("file too small to be a valid WPK file")]
    FileTooSmall,

    #[error("malformed entry at offset {offset}: {detail}")]
    MalformedEntry { offset: usize, detail: String },
}

/// WPK format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl PackVersion {
    /// The current format version.
    pub const CURRENT: PackVersion = PackVersion {
        major: 0,
        minor: 1,
        patch: 0,
    };

    /// Check if this version is compatible with the current
    /// implementation. Major 0 is pre-stable, so minor must not be
    /// newer than ours.
    pub fn is_compatible(&self) -> bool {
        self.major == Self::CURRENT.major && self.minor <= Self::CURRENT.minor
    }
}

impl std::fmt::Display for PackVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// WPK format flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackFlags {
    bits: u8,
}

impl PackFlags {
    /// No flags set.
    pub const NONE: PackFlags = PackFlags { bits: 0 };

    /// Payload is compressed (reserved for future use).
    pub const COMPRESSED: u8 = 0x01;

    /// File carries a delegate manifest entry.
    pub const HAS_MANIFEST: u8 = 0x02;

    pub fn new(bits: u8) -> Self {
        Self { bits }
    }

    pub fn has(&self, flag: u8) -> bool {
        self.bits & flag != 0
    }

    pub fn set(&mut self, flag: u8) {
        self.bits |= flag;
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }
}

/// One named binary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// A WPK file: header metadata, unit entries in compilation order, and
/// the delegate-template manifest.
#[derive(Debug)]
pub struct PackFile {
    pub version: PackVersion,
    pub flags: PackFlags,
    pub entries: Vec<PackEntry>,
    pub delegates: Vec<String>,
}

impl PackFile {
    pub fn new(entries: Vec<PackEntry>, delegates: Vec<String>) -> Self {
        let mut flags = PackFlags::NONE;
        flags.set(PackFlags::HAS_MANIFEST);
        Self {
            version: PackVersion::CURRENT,
            flags,
            entries,
            delegates,
        }
    }

    /// Serialize to a writer in WPK binary format.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), PackError> {
        let mut payload = Vec::new();
        for entry in &self.entries {
            write_entry(&mut payload, &entry.name, &entry.data);
        }
        let manifest = serde_json::to_vec(&self.delegates)
            .map_err(|e| PackError::Serialization(e.to_string()))?;
        write_entry(&mut payload, MANIFEST_ENTRY, &manifest);

        let entry_count = (self.entries.len() + 1) as u64;
        let payload_len = payload.len() as u64;

        let mut hasher = Sha256::new();

        writer.write_all(&MAGIC)?;
        hasher.update(MAGIC);

        let version_bytes = [self.version.major, self.version.minor, self.version.patch];
        writer.write_all(&version_bytes)?;
        hasher.update(version_bytes);

        writer.write_all(&[self.flags.bits()])?;
        hasher.update([self.flags.bits()]);

        for val in [entry_count, payload_len] {
            let bytes = val.to_le_bytes();
            writer.write_all(&bytes)?;
            hasher.update(bytes);
        }

        writer.write_all(&payload)?;
        hasher.update(&payload);

        let hash: [u8; 32] = hasher.finalize().into();
        writer.write_all(&hash)?;

        Ok(())
    }

    /// Serialize to a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PackError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Deserialize from a reader.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, PackError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Deserialize from a byte slice, verifying magic, version, and
    /// content hash.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PackError> {
        if data.len() < HEADER_SIZE + HASH_SIZE {
            return Err(PackError::FileTooSmall);
        }

        if data[0..4] != MAGIC {
            return Err(PackError::InvalidMagic);
        }

        let version = PackVersion {
            major: data[4],
            minor: data[5],
            patch: data[6],
        };
        if !version.is_compatible() {
            return Err(PackError::UnsupportedVersion {
                major: version.major,
                minor: version.minor,
                patch: version.patch,
            });
        }

        let flags = PackFlags::new(data[7]);

        let entry_count = u64::from_le_bytes(data[8..16].try_into().expect("sized slice"));
        let payload_len =
            u64::from_le_bytes(data[16..24].try_into().expect("sized slice")) as usize;

        let expected_size = HEADER_SIZE + payload_len + HASH_SIZE;
        if data.len() < expected_size {
            return Err(PackError::FileTooSmall);
        }

        let payload_end = HEADER_SIZE + payload_len;
        let stored_hash = &data[payload_end..payload_end + HASH_SIZE];

        let mut hasher = Sha256::new();
        hasher.update(&data[..payload_end]);
        let computed_hash: [u8; 32] = hasher.finalize().into();
        if computed_hash != stored_hash {
            return Err(PackError::HashMismatch);
        }

        let mut entries = Vec::new();
        let mut offset = HEADER_SIZE;
        for _ in 0..entry_count {
            let (entry, next) = read_entry(data, offset, payload_end)?;
            entries.push(entry);
            offset = next;
        }

        // The manifest, when present, is always the final entry.
        let mut delegates = Vec::new();
        if flags.has(PackFlags::HAS_MANIFEST) {
            match entries.pop() {
                Some(entry) if entry.name == MANIFEST_ENTRY => {
                    delegates = serde_json::from_slice(&entry.data)
                        .map_err(|e| PackError::Serialization(e.to_string()))?;
                }
                _ => {
                    return Err(PackError::MalformedEntry {
                        offset,
                        detail: "manifest entry missing despite flag".into(),
                    })
                }
            }
        }

        Ok(Self {
            version,
            flags,
            entries,
            delegates,
        })
    }

    /// Decode every unit entry back into a compiled unit, preserving
    /// archive order.
    pub fn decode_units(&self) -> Result<Vec<CompiledUnit>, PackError> {
        self.entries
            .iter()
            .map(|entry| {
                CompiledUnit::from_bytes(&entry.data)
                    .map_err(|e| PackError::Serialization(format!("{}: {e}", entry.name)))
            })
            .collect()
    }
}

fn write_entry(payload: &mut Vec<u8>, name: &str, data: &[u8]) {
    payload.extend_from_slice(&(name.len() as u32).to_le_bytes());
    payload.extend_from_slice(name.as_bytes());
    payload.extend_from_slice(&(data.len() as u64).to_le_bytes());
    payload.extend_from_slice(data);
}

fn read_entry(data: &[u8], offset: usize, end: usize) -> Result<(PackEntry, usize), PackError> {
    let malformed = |detail: &str| PackError::MalformedEntry {
        offset,
        detail: detail.into(),
    };
    if offset + 4 > end {
        return Err(malformed("truncated name length"));
    }
    let name_len =
        u32::from_le_bytes(data[offset..offset + 4].try_into().expect("sized slice")) as usize;
    let name_start = offset + 4;
    if name_start + name_len + 8 > end {
        return Err(malformed("truncated name or data length"));
    }
    let name = std::str::from_utf8(&data[name_start..name_start + name_len])
        .map_err(|_| malformed("entry name is not UTF-8"))?
        .to_string();
    let len_start = name_start + name_len;
    let data_len = u64::from_le_bytes(
        data[len_start..len_start + 8].try_into().expect("sized slice"),
    ) as usize;
    let data_start = len_start + 8;
    if data_start + data_len > end {
        return Err(malformed("truncated entry data"));
    }
    let entry = PackEntry {
        name,
        data: data[data_start..data_start + data_len].to_vec(),
    };
    Ok((entry, data_start + data_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::ast::TemplateVariant;
    use weft_core::ContentKind;
    use weft_ir::{Op, UnitKind, UnitName};

    fn sample_unit(name: &str) -> CompiledUnit {
        CompiledUnit {
            name: UnitName::parse(name),
            kind: UnitKind::Template,
            variant: TemplateVariant::Ordinary,
            content_kind: ContentKind::Html,
            params: vec![],
            fields: vec![],
            local_count: 0,
            consts: vec![weft_ir::ConstValue::Str("body".into())],
            ops: vec![Op::EmitConst(0), Op::Return],
            points: vec![],
            max_stack: 0,
        }
    }

    fn sample_pack() -> PackFile {
        let units = [sample_unit("a.main"), sample_unit("a.other")];
        let entries = units
            .iter()
            .map(|u| PackEntry {
                name: u.name.to_string(),
                data: u.to_bytes().unwrap(),
            })
            .collect();
        PackFile::new(entries, vec!["a.other".into()])
    }

    #[test]
    fn round_trip() {
        let pack = sample_pack();
        let bytes = pack.to_bytes().unwrap();
        let loaded = PackFile::from_bytes(&bytes).unwrap();

        assert_eq!(loaded.version, PackVersion::CURRENT);
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries[0].name, "a.main");
        assert_eq!(loaded.delegates, vec!["a.other".to_string()]);

        let units = loaded.decode_units().unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].name.to_string(), "a.main");
    }

    #[test]
    fn empty_pack_round_trip() {
        let pack = PackFile::new(vec![], vec![]);
        let bytes = pack.to_bytes().unwrap();
        let loaded = PackFile::from_bytes(&bytes).unwrap();
        assert!(loaded.entries.is_empty());
        assert!(loaded.delegates.is_empty());
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = sample_pack().to_bytes().unwrap();
        bytes[0] = 0xFF;
        assert!(matches!(
            PackFile::from_bytes(&bytes),
            Err(PackError::InvalidMagic)
        ));
    }

    #[test]
    fn corrupted_payload_rejected() {
        let mut bytes = sample_pack().to_bytes().unwrap();
        let mid = HEADER_SIZE + 10;
        bytes[mid] ^= 0xFF;
        assert!(matches!(
            PackFile::from_bytes(&bytes),
            Err(PackError::HashMismatch)
        ));
    }

    #[test]
    fn truncated_file_rejected() {
        assert!(matches!(
            PackFile::from_bytes(&MAGIC),
            Err(PackError::FileTooSmall)
        ));
    }

    #[test]
    fn newer_minor_version_rejected() {
        let mut bytes = sample_pack().to_bytes().unwrap();
        // Bump the minor version byte; hash no longer matters because
        // version is checked first.
        bytes[5] = PackVersion::CURRENT.minor + 1;
        assert!(matches!(
            PackFile::from_bytes(&bytes),
            Err(PackError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn serialization_is_deterministic() {
        let a = sample_pack().to_bytes().unwrap();
        let b = sample_pack().to_bytes().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn flags_operations() {
        let mut flags = PackFlags::NONE;
        assert!(!flags.has(PackFlags::COMPRESSED));
        flags.set(PackFlags::HAS_MANIFEST);
        assert!(flags.has(PackFlags::HAS_MANIFEST));
        assert!(!flags.has(PackFlags::COMPRESSED));
    }

    #[test]
    fn write_and_read_via_io() {
        let pack = sample_pack();
        let mut buf = Vec::new();
        pack.write_to(&mut buf).unwrap();
        let loaded = PackFile::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.entries.len(), 2);
    }
}
