use aya_ebpf::macros::map;
use aya_ebpf::maps::{HashMap, ProgramArray};
use xdp_collector_common::{FLOWS_MAX_ENTRIES, LAYER3_SLOTS, PacketAttrs};

// Map names are what the loader and external readers look up.
// - "flows": slot id -> most recent PacketAttrs, read by the monitoring side
// - "parse_layer3": tail-call targets, slot 4 = parse_ipv4, slot 6 = parse_ipv6

/// Shared by every CPU; writers of the same slot race and the last insert wins.
#[map(name = "flows")]
pub static FLOWS: HashMap<u16, PacketAttrs> =
    HashMap::<u16, PacketAttrs>::with_max_entries(FLOWS_MAX_ENTRIES, 0);

#[map(name = "parse_layer3")]
pub static PARSE_LAYER3: ProgramArray = ProgramArray::with_max_entries(LAYER3_SLOTS, 0);
