#![no_std]
#![no_main]

mod maps;

use aya_ebpf::bindings::xdp_action;
use aya_ebpf::macros::xdp;
use aya_ebpf::programs::XdpContext;
use aya_log_ebpf::{error, info};
use xdp_collector_common::PacketAttrs;
use xdp_collector_common::pipeline::{self, Datapath, DispatchMiss, Trace, Verdict};

use crate::maps::{FLOWS, PARSE_LAYER3};

struct XdpPath<'a> {
    ctx: &'a XdpContext,
}

impl Datapath for XdpPath<'_> {
    #[inline(always)]
    fn record(&self, slot: u16, attrs: &PacketAttrs) {
        let _ = FLOWS.insert(&slot, attrs, 0);
    }

    #[inline(always)]
    fn jump(&self, slot: u32) -> Result<Verdict, DispatchMiss> {
        // Only returns if the slot is empty or the tail-call limit was hit.
        let _ = unsafe { PARSE_LAYER3.tail_call(self.ctx, slot) };
        Err(DispatchMiss)
    }

    #[inline(always)]
    fn trace(&self, trace: Trace) {
        match trace {
            Trace::Vlan => info!(self.ctx, "Receive Ethertype VLAN!"),
            Trace::UnknownEtherType(ether_type) => info!(
                self.ctx,
                "IPv4/IPv6/VLAN ethertypes were not hit: 0x{:x}", ether_type
            ),
            Trace::DispatchMiss(slot) => {
                error!(self.ctx, "parse_layer3 slot {} is not wired", slot)
            }
        }
    }
}

#[inline(always)]
fn xdp_verdict(verdict: Verdict) -> u32 {
    match verdict {
        Verdict::Pass => xdp_action::XDP_PASS,
        Verdict::Drop => xdp_action::XDP_DROP,
    }
}

#[xdp]
pub fn xdp_parser(ctx: XdpContext) -> u32 {
    let path = XdpPath { ctx: &ctx };
    xdp_verdict(pipeline::dispatch(&path, ctx.data(), ctx.data_end()))
}

#[xdp]
pub fn parse_ipv4(ctx: XdpContext) -> u32 {
    let path = XdpPath { ctx: &ctx };
    xdp_verdict(pipeline::parse_ipv4(&path, ctx.data(), ctx.data_end()))
}

#[xdp]
pub fn parse_ipv6(ctx: XdpContext) -> u32 {
    let path = XdpPath { ctx: &ctx };
    xdp_verdict(pipeline::parse_ipv6(&path, ctx.data(), ctx.data_end()))
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[unsafe(link_section = "license")]
#[unsafe(no_mangle)]
static LICENSE: [u8; 4] = *b"GPL\0";
