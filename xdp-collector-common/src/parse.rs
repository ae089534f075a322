//! Bounds-checked header parsing over a raw `[data, data_end)` window.
//!
//! Addresses are plain integers as handed out by `XdpContext::data()` and
//! `XdpContext::data_end()`. Every read is preceded by a comparison against
//! `data_end` so the verifier can prove it in range. IPv4 options and IPv6
//! extension headers are not walked.

use core::ptr::read_unaligned;

use crate::{
    ADDR_LEN, ETHERTYPE_IPV4, ETHERTYPE_IPV6, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP,
    PacketAttrs,
};

pub const ETH_HDR_LEN: usize = 14;
const ETH_TYPE_OFFSET: usize = 12;

pub const IPV4_HDR_LEN: usize = 20;
const IPV4_PROTO_OFFSET: usize = 9;
const IPV4_SRC_OFFSET: usize = 12;
const IPV4_DST_OFFSET: usize = 16;

pub const IPV6_HDR_LEN: usize = 40;
const IPV6_NEXT_HDR_OFFSET: usize = 6;
const IPV6_SRC_OFFSET: usize = 8;
const IPV6_DST_OFFSET: usize = 24;

pub const ICMP_HDR_LEN: usize = 8;
pub const TCP_HDR_LEN: usize = 20;
pub const UDP_HDR_LEN: usize = 8;

#[inline(always)]
fn fits(data: usize, data_end: usize, offset: usize, len: usize) -> bool {
    data + offset + len <= data_end
}

// Callers must have checked `fits` for the bytes being read.
#[inline(always)]
unsafe fn read_u8(data: usize, offset: usize) -> u8 {
    unsafe { *((data + offset) as *const u8) }
}

#[inline(always)]
unsafe fn read_be16(data: usize, offset: usize) -> u16 {
    u16::from_be(unsafe { read_unaligned((data + offset) as *const u16) })
}

#[inline(always)]
unsafe fn read_ipv4_addr(data: usize, offset: usize) -> [u8; ADDR_LEN] {
    let octets = unsafe { read_unaligned((data + offset) as *const [u8; 4]) };
    let mut addr = [0u8; ADDR_LEN];
    addr[0] = octets[0];
    addr[1] = octets[1];
    addr[2] = octets[2];
    addr[3] = octets[3];
    addr
}

#[inline(always)]
unsafe fn read_ipv6_addr(data: usize, offset: usize) -> [u8; ADDR_LEN] {
    unsafe { read_unaligned((data + offset) as *const [u8; ADDR_LEN]) }
}

/// Returns the host-order ethertype, or `None` if the frame is shorter than
/// an Ethernet header.
#[inline(always)]
pub fn ether_type(data: usize, data_end: usize) -> Option<u16> {
    if !fits(data, data_end, 0, ETH_HDR_LEN) {
        return None;
    }
    Some(unsafe { read_be16(data, ETH_TYPE_OFFSET) })
}

/// Classifies an Ethernet + IPv4 + {ICMP, TCP, UDP} frame.
///
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |Version|  IHL  |Type of Service|          Total Length         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Identification        |Flags|      Fragment Offset    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Time to Live |    Protocol   |         Header Checksum       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Source Address                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                    Destination Address                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///
/// The transport header is assumed to follow the fixed 20-byte header.
#[inline(always)]
pub fn classify_ipv4(data: usize, data_end: usize) -> Option<PacketAttrs> {
    let ip = ETH_HDR_LEN;
    if !fits(data, data_end, ip, IPV4_HDR_LEN) {
        return None;
    }

    let proto = unsafe { read_u8(data, ip + IPV4_PROTO_OFFSET) };

    let mut attrs = PacketAttrs::empty();
    attrs.l2_proto = ETHERTYPE_IPV4;
    attrs.src_addr = unsafe { read_ipv4_addr(data, ip + IPV4_SRC_OFFSET) };
    attrs.dst_addr = unsafe { read_ipv4_addr(data, ip + IPV4_DST_OFFSET) };

    transport(data, data_end, ip + IPV4_HDR_LEN, proto, &mut attrs)?;
    Some(attrs)
}

/// Classifies an Ethernet + IPv6 + {ICMP, TCP, UDP} frame. Only the first
/// next-header value is inspected.
#[inline(always)]
pub fn classify_ipv6(data: usize, data_end: usize) -> Option<PacketAttrs> {
    let ip = ETH_HDR_LEN;
    if !fits(data, data_end, ip, IPV6_HDR_LEN) {
        return None;
    }

    let next_hdr = unsafe { read_u8(data, ip + IPV6_NEXT_HDR_OFFSET) };

    let mut attrs = PacketAttrs::empty();
    attrs.l2_proto = ETHERTYPE_IPV6;
    attrs.src_addr = unsafe { read_ipv6_addr(data, ip + IPV6_SRC_OFFSET) };
    attrs.dst_addr = unsafe { read_ipv6_addr(data, ip + IPV6_DST_OFFSET) };

    transport(data, data_end, ip + IPV6_HDR_LEN, next_hdr, &mut attrs)?;
    Some(attrs)
}

// Ordered chain: ICMP, TCP, UDP. A matched protocol whose header does not fit
// is a drop, same as an unknown protocol.
#[inline(always)]
fn transport(
    data: usize,
    data_end: usize,
    offset: usize,
    proto: u8,
    attrs: &mut PacketAttrs,
) -> Option<()> {
    match proto {
        IPPROTO_ICMP if fits(data, data_end, offset, ICMP_HDR_LEN) => {
            attrs.l4_proto = IPPROTO_ICMP;
            attrs.src_port = unsafe { read_u8(data, offset) } as u16;
            attrs.dst_port = unsafe { read_u8(data, offset + 1) } as u16;
        }
        IPPROTO_TCP if fits(data, data_end, offset, TCP_HDR_LEN) => {
            attrs.l4_proto = IPPROTO_TCP;
            attrs.src_port = unsafe { read_be16(data, offset) };
            attrs.dst_port = unsafe { read_be16(data, offset + 2) };
        }
        IPPROTO_UDP if fits(data, data_end, offset, UDP_HDR_LEN) => {
            attrs.l4_proto = IPPROTO_UDP;
            attrs.src_port = unsafe { read_be16(data, offset) };
            attrs.dst_port = unsafe { read_be16(data, offset + 2) };
        }
        _ => return None,
    }
    Some(())
}
