//! Entry dispatcher and layer-3 entry points.
//!
//! The kernel side implements [`Datapath`] on top of the `flows` map, the
//! `parse_layer3` program array and aya-log; tests implement it in memory.

use crate::{
    ETHERTYPE_IPV4, ETHERTYPE_IPV6, ETHERTYPE_VLAN, FLOW_SLOT_LAST, PARSE_IPV4_SLOT,
    PARSE_IPV6_SLOT, PacketAttrs, parse,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    Pass,
    Drop,
}

/// Diagnostic events emitted by the entry dispatcher. Bounds failures and
/// unknown transport protocols are dropped silently and never show up here.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trace {
    Vlan,
    UnknownEtherType(u16),
    DispatchMiss(u32),
}

/// The dispatch table slot was not wired by the loader.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DispatchMiss;

pub trait Datapath {
    /// Writes `attrs` into the flow table. Concurrent writers of the same
    /// slot race; the last insert wins.
    fn record(&self, slot: u16, attrs: &PacketAttrs);

    /// Transfers control to the layer-3 parser at `slot`. In the kernel this
    /// only returns when the tail call failed.
    fn jump(&self, slot: u32) -> Result<Verdict, DispatchMiss>;

    fn trace(&self, trace: Trace);
}

/// Parses the Ethernet header and hands the frame to the matching layer-3
/// parser. IPv4 frames get a placeholder record before the hand-off.
#[inline(always)]
pub fn dispatch<D: Datapath>(dp: &D, data: usize, data_end: usize) -> Verdict {
    let Some(ether_type) = parse::ether_type(data, data_end) else {
        return Verdict::Drop;
    };

    let slot = match ether_type {
        ETHERTYPE_IPV4 => {
            dp.record(FLOW_SLOT_LAST, &PacketAttrs::empty());
            PARSE_IPV4_SLOT
        }
        ETHERTYPE_IPV6 => PARSE_IPV6_SLOT,
        ETHERTYPE_VLAN => {
            dp.trace(Trace::Vlan);
            return Verdict::Drop;
        }
        other => {
            dp.trace(Trace::UnknownEtherType(other));
            return Verdict::Drop;
        }
    };

    match dp.jump(slot) {
        Ok(verdict) => verdict,
        Err(DispatchMiss) => {
            dp.trace(Trace::DispatchMiss(slot));
            Verdict::Drop
        }
    }
}

#[inline(always)]
pub fn parse_ipv4<D: Datapath>(dp: &D, data: usize, data_end: usize) -> Verdict {
    persist(dp, parse::classify_ipv4(data, data_end))
}

#[inline(always)]
pub fn parse_ipv6<D: Datapath>(dp: &D, data: usize, data_end: usize) -> Verdict {
    persist(dp, parse::classify_ipv6(data, data_end))
}

#[inline(always)]
fn persist<D: Datapath>(dp: &D, attrs: Option<PacketAttrs>) -> Verdict {
    match attrs {
        Some(attrs) => {
            dp.record(FLOW_SLOT_LAST, &attrs);
            Verdict::Pass
        }
        None => Verdict::Drop,
    }
}
