#![no_std]

// Types and parsing shared between the XDP programs and userspace.
// Everything here must stay `no_std` and verifier friendly: no loops over
// packet data, every read preceded by a bounds check against `data_end`.

pub mod parse;
pub mod pipeline;

#[cfg(test)]
mod testutil;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;
pub const ETHERTYPE_VLAN: u16 = 0x8100;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

pub const FLOWS_MAX_ENTRIES: u32 = 1024;
pub const LAYER3_SLOTS: u32 = 7;
pub const PARSE_IPV4_SLOT: u32 = 4;
pub const PARSE_IPV6_SLOT: u32 = 6;

/// Flow table key holding the most recently classified packet.
pub const FLOW_SLOT_LAST: u16 = 0;

pub const ADDR_LEN: usize = 16;

/// Attributes of one classified packet, as stored in the `flows` map.
///
/// `l2_proto` carries the ethertype in host order. `src_port`/`dst_port` are
/// host order; for ICMP they hold the message type and code. IPv4 addresses
/// occupy the first four bytes of the address buffers, the rest is zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct PacketAttrs {
    pub l2_proto: u16,
    pub l4_proto: u8,
    pub pad: u8,
    pub src_addr: [u8; ADDR_LEN],
    pub dst_addr: [u8; ADDR_LEN],
    pub src_port: u16,
    pub dst_port: u16,
}

impl PacketAttrs {
    /// Placeholder record written before a frame has been classified.
    pub const fn empty() -> Self {
        Self {
            l2_proto: 0,
            l4_proto: 0,
            pad: 0,
            src_addr: [0; ADDR_LEN],
            dst_addr: [0; ADDR_LEN],
            src_port: 0,
            dst_port: 0,
        }
    }

    /// A record is only usable once both protocol tags are recognized.
    pub fn is_complete(&self) -> bool {
        matches!(self.l2_proto, ETHERTYPE_IPV4 | ETHERTYPE_IPV6)
            && matches!(self.l4_proto, IPPROTO_ICMP | IPPROTO_TCP | IPPROTO_UDP)
    }
}

const _: () = assert!(core::mem::size_of::<PacketAttrs>() == 40);

#[cfg(feature = "user")]
unsafe impl aya::Pod for PacketAttrs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_is_incomplete() {
        let attrs = PacketAttrs::empty();
        assert_eq!(attrs, PacketAttrs::default());
        assert!(!attrs.is_complete());
    }

    #[test]
    fn record_needs_both_tags() {
        let mut attrs = PacketAttrs::empty();
        attrs.l2_proto = ETHERTYPE_IPV6;
        assert!(!attrs.is_complete());
        attrs.l4_proto = IPPROTO_TCP;
        assert!(attrs.is_complete());
        attrs.l2_proto = ETHERTYPE_VLAN;
        assert!(!attrs.is_complete());
    }
}
