//! UDP protocol - RFC 768

use crate::{Error, Result};

/// UDP header size (fixed)
pub const HEADER_SIZE: usize = 8;

/// Parsed UDP header (zero-copy reference)
#[derive(Debug)]
pub struct UdpHeader<'a> {
    buffer: &'a [u8],
}

impl<'a> UdpHeader<'a> {
    /// Parse UDP header from buffer
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(Error::Parse("UDP header too short".into()));
        }

        Ok(Self { buffer })
    }

    /// Source port (offset 0-1)
    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes([self.buffer[0], self.buffer[1]])
    }

    /// Destination port (offset 2-3)
    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes([self.buffer[2], self.buffer[3]])
    }

    /// Length (header + data) (offset 4-5)
    pub fn length(&self) -> u16 {
        u16::from_be_bytes([self.buffer[4], self.buffer[5]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ports() {
        let dgram = [
            0x30, 0x39, // src_port = 12345
            0x00, 0x35, // dst_port = 53
            0x00, 0x0c, // length = 12
            0x00, 0x00, // checksum
            b't', b'e', b's', b't',
        ];

        let hdr = UdpHeader::parse(&dgram).unwrap();
        assert_eq!(hdr.src_port(), 12345);
        assert_eq!(hdr.dst_port(), 53);
        assert_eq!(hdr.length(), 12);
    }

    #[test]
    fn test_parse_too_short() {
        let dgram = [0u8; 7];
        assert!(UdpHeader::parse(&dgram).is_err());
    }
}
