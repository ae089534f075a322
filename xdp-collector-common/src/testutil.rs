extern crate std;

use std::vec::Vec;

/// Hand-assembles Ethernet frames for parser tests. Checksums and lengths
/// are left zero since the parsers never look at them.
pub struct FrameBuilder {
    bytes: Vec<u8>,
}

impl FrameBuilder {
    pub fn ethernet(ether_type: u16) -> Self {
        let mut bytes = Vec::with_capacity(128);
        bytes.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        bytes.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
        bytes.extend_from_slice(&ether_type.to_be_bytes());
        Self { bytes }
    }

    pub fn ipv4(mut self, proto: u8, src: [u8; 4], dst: [u8; 4]) -> Self {
        self.bytes.extend_from_slice(&[0x45, 0, 0, 0, 0, 0, 0x40, 0, 64, proto, 0, 0]);
        self.bytes.extend_from_slice(&src);
        self.bytes.extend_from_slice(&dst);
        self
    }

    pub fn ipv6(mut self, next_hdr: u8, src: [u8; 16], dst: [u8; 16]) -> Self {
        self.bytes.extend_from_slice(&[0x60, 0, 0, 0, 0, 0, next_hdr, 64]);
        self.bytes.extend_from_slice(&src);
        self.bytes.extend_from_slice(&dst);
        self
    }

    pub fn icmp(mut self, icmp_type: u8, code: u8) -> Self {
        self.bytes.extend_from_slice(&[icmp_type, code, 0, 0, 0, 0, 0, 0]);
        self
    }

    pub fn tcp(mut self, src_port: u16, dst_port: u16) -> Self {
        self.bytes.extend_from_slice(&src_port.to_be_bytes());
        self.bytes.extend_from_slice(&dst_port.to_be_bytes());
        // seq, ack, data offset 5, flags SYN, window, checksum, urgent
        self.bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0x50, 0x02, 0xff, 0xff, 0, 0, 0, 0]);
        self
    }

    pub fn udp(mut self, src_port: u16, dst_port: u16) -> Self {
        self.bytes.extend_from_slice(&src_port.to_be_bytes());
        self.bytes.extend_from_slice(&dst_port.to_be_bytes());
        self.bytes.extend_from_slice(&[0, 8, 0, 0]);
        self
    }

    pub fn padding(mut self, len: usize) -> Self {
        self.bytes.resize(self.bytes.len() + len, 0);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// `[data, data_end)` addresses of a frame, the way `XdpContext` hands them out.
pub fn window(frame: &[u8]) -> (usize, usize) {
    let data = frame.as_ptr() as usize;
    (data, data + frame.len())
}
