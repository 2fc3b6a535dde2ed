use crate::error::EcompError;
use crate::prelude::*;
use crate::utils::token;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const CONTAINER_MAGIC: &[u8; 8] = b"ECOMP001";
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;
pub const VERSION_PATCH: u8 = 0;

/// Fixed archive preamble size: magic, three version bytes, payload length,
/// one reserved byte. The named fields sum to 19; the reserved byte pads the
/// header to 20 so the payload length sits at bytes 11..19 and the payload
/// itself starts at byte 20.
pub const HEADER_LENGTH: usize = 20;

const RESERVED: u8 = 0;

/// The 20-byte archive header. The major version gates decoding; minor and
/// patch are informational. The reserved trailing byte is written as zero
/// and ignored on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub payload_length: u64,
}

impl ContainerHeader {
    pub fn new(payload_length: u64) -> ContainerHeader {
        ContainerHeader {
            major: VERSION_MAJOR,
            minor: VERSION_MINOR,
            patch: VERSION_PATCH,
            payload_length,
        }
    }
}

impl Encode for ContainerHeader {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(CONTAINER_MAGIC)?;
        writer.write_u8(self.major)?;
        writer.write_u8(self.minor)?;
        writer.write_u8(self.patch)?;
        writer.write_u64::<BigEndian>(self.payload_length)?;
        writer.write_u8(RESERVED)?;
        Ok(())
    }
}

impl Decode for ContainerHeader {
    fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        token(reader, CONTAINER_MAGIC, "container")?;
        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        let patch = reader.read_u8()?;
        let payload_length = reader.read_u64::<BigEndian>()?;
        let _reserved = reader.read_u8()?;
        Ok(ContainerHeader {
            major,
            minor,
            patch,
            payload_length,
        })
    }
}

pub fn write_archive(payload: &[u8]) -> Result<Vec<u8>> {
    let mut archive = Vec::with_capacity(HEADER_LENGTH + payload.len());
    ContainerHeader::new(payload.len() as u64).write_to(&mut archive)?;
    archive.extend_from_slice(payload);
    Ok(archive)
}

/// Validate the framing and return the stored payload slice.
pub fn read_archive(archive: &[u8]) -> Result<&[u8]> {
    if archive.len() < HEADER_LENGTH {
        return Err(EcompError::Truncated("container header"));
    }
    let mut reader = archive;
    let header = ContainerHeader::from_reader(&mut reader)?;
    if header.major != VERSION_MAJOR {
        return Err(EcompError::UnsupportedVersion {
            what: "container",
            version: header.major,
        });
    }
    let stored = (archive.len() - HEADER_LENGTH) as u64;
    if header.payload_length != stored {
        return Err(EcompError::PayloadLengthMismatch {
            expected: header.payload_length,
            got: stored,
        });
    }
    Ok(&archive[HEADER_LENGTH..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_stable() {
        let archive = write_archive(b"payload").unwrap();
        assert_eq!(&archive[0..8], b"ECOMP001");
        assert_eq!(&archive[8..11], &[VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH]);
        assert_eq!(&archive[11..19], &7u64.to_be_bytes());
        assert_eq!(archive[19], 0);
        assert_eq!(archive.len(), HEADER_LENGTH + 7);
        assert_eq!(read_archive(&archive).unwrap(), b"payload");
    }

    #[test]
    fn rejects_bad_magic() {
        let mut archive = write_archive(b"x").unwrap();
        archive[0] = b'F';
        assert!(matches!(
            read_archive(&archive),
            Err(EcompError::InvalidMagic("container"))
        ));
    }

    #[test]
    fn rejects_major_version_mismatch() {
        let mut archive = write_archive(b"x").unwrap();
        archive[8] = 2;
        assert!(matches!(
            read_archive(&archive),
            Err(EcompError::UnsupportedVersion { version: 2, .. })
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut archive = write_archive(b"abc").unwrap();
        archive.pop();
        assert!(matches!(
            read_archive(&archive),
            Err(EcompError::PayloadLengthMismatch { .. })
        ));
    }
}
