use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow, ensure};
use aya::programs::xdp::XdpLinkId;
use aya::programs::{Xdp, XdpFlags};
use aya::{
    Ebpf, include_bytes_aligned,
    maps::{MapData, ProgramArray},
};
use clap::ValueEnum;
use log::{debug, info, warn};
use tokio::{signal, time};

use xdp_collector_common::{PARSE_IPV4_SLOT, PARSE_IPV6_SLOT};

const EBPF_BYTES: &[u8] = include_bytes_aligned!(concat!(env!("OUT_DIR"), "/xdp-collector"));
const MAP_FLOWS: &str = "flows";
const MAP_PARSE_LAYER3: &str = "parse_layer3";
const ENTRY_PROGRAM: &str = "xdp_parser";

/// Tail-call targets of the entry program, keyed by `parse_layer3` slot.
const LAYER3_PARSERS: [(u32, &str); 2] = [
    (PARSE_IPV4_SLOT, "parse_ipv4"),
    (PARSE_IPV6_SLOT, "parse_ipv6"),
];

pub const DEFAULT_FLOW_PIN: &str = "/sys/fs/bpf/xdp_collector/flows";

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum XdpMode {
    /// Let the kernel pick (native if the driver supports it)
    Auto,
    Skb,
    Driver,
    Hw,
}

#[derive(Clone, Debug)]
pub struct AttachOptions {
    pub iface: String,
    pub flow_pin_path: PathBuf,
    pub xdp_mode: XdpMode,
    pub run_time: Option<Duration>,
}

/// Loads the classifier, wires the layer-3 parsers, attaches the entry
/// program and keeps it attached until Ctrl-C or the run time elapses.
pub async fn run_collector(opts: AttachOptions) -> Result<()> {
    validate_attach_options(&opts)?;
    bump_memlock_rlimit();

    let mut bpf = Ebpf::load(EBPF_BYTES).context("failed to load eBPF object")?;
    if let Err(err) = aya_log::EbpfLogger::init(&mut bpf) {
        // Happens when the object carries no log statements.
        warn!("failed to initialize eBPF logger: {err}");
    }

    // Dropping the table clears its slots, so it lives until detach.
    let _layer3 = wire_dispatch_table(&mut bpf)?;
    pin_map(&mut bpf, MAP_FLOWS, &opts.flow_pin_path)?;
    let link = attach_xdp(&mut bpf, &opts.iface, opts.xdp_mode)?;

    info!(
        "Attached {ENTRY_PROGRAM} to {} ({:?} mode), flows pinned at {}",
        opts.iface,
        opts.xdp_mode,
        opts.flow_pin_path.display()
    );

    wait_for_shutdown(opts.run_time).await?;

    info!("Detaching {ENTRY_PROGRAM} from {}...", opts.iface);
    detach(&mut bpf, link)
}

fn validate_attach_options(opts: &AttachOptions) -> Result<()> {
    ensure!(!opts.iface.is_empty(), "interface name must not be empty");
    ensure!(
        opts.run_time.is_none_or(|t| !t.is_zero()),
        "run time must be greater than zero"
    );
    ensure!(
        opts.flow_pin_path.file_name().is_some(),
        "flow pin path {} has no file name",
        opts.flow_pin_path.display()
    );
    Ok(())
}

// Older kernels account BPF memory against RLIMIT_MEMLOCK.
fn bump_memlock_rlimit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {ret}");
    }
}

/// Loads every layer-3 parser and stores its fd in `parse_layer3`. Any
/// failure is fatal: an unwired slot would turn matching frames into drops.
fn wire_dispatch_table(bpf: &mut Ebpf) -> Result<ProgramArray<MapData>> {
    let map = bpf
        .take_map(MAP_PARSE_LAYER3)
        .with_context(|| format!("map {MAP_PARSE_LAYER3} not found"))?;
    let mut table =
        ProgramArray::try_from(map).context("dispatch table has unexpected type")?;

    for (slot, name) in LAYER3_PARSERS {
        let program: &mut Xdp = bpf
            .program_mut(name)
            .with_context(|| format!("program {name} not found"))?
            .try_into()
            .with_context(|| format!("{name} has wrong program type"))?;
        program
            .load()
            .with_context(|| format!("failed to load {name}"))?;
        let fd = program
            .fd()
            .with_context(|| format!("{name} has no program fd"))?;
        table
            .set(slot, fd, 0)
            .with_context(|| format!("failed to wire {name} into {MAP_PARSE_LAYER3}[{slot}]"))?;
        debug!("wired {name} into {MAP_PARSE_LAYER3}[{slot}]");
    }

    Ok(table)
}

/// Pins `map_name` at `path`. A pin left behind by an earlier run still holds
/// that run's map, so it is unlinked first and readers of the path always see
/// the map the attached programs write to.
fn pin_map(bpf: &mut Ebpf, map_name: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if remove_stale_pin(path)? {
        warn!("{} already existed, replacing the stale pin", path.display());
    }
    let map = bpf
        .map_mut(map_name)
        .with_context(|| format!("map {map_name} not found"))?;
    map.pin(path)
        .map_err(|err| anyhow!("failed to pin map {map_name} at {}: {err}", path.display()))
}

/// Unlinks whatever is pinned at `path`. Returns whether a pin was removed.
fn remove_stale_pin(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("failed to unpin {}", path.display())),
    }
}

fn attach_xdp(bpf: &mut Ebpf, iface: &str, mode: XdpMode) -> Result<XdpLinkId> {
    let program: &mut Xdp = bpf
        .program_mut(ENTRY_PROGRAM)
        .with_context(|| format!("program {ENTRY_PROGRAM} not found"))?
        .try_into()
        .context("xdp program has wrong type")?;
    program.load().context("failed to load xdp program")?;
    program
        .attach(iface, xdp_flags(mode))
        .with_context(|| format!("failed to attach xdp on {iface}"))
}

fn detach(bpf: &mut Ebpf, link: XdpLinkId) -> Result<()> {
    let program: &mut Xdp = bpf
        .program_mut(ENTRY_PROGRAM)
        .with_context(|| format!("program {ENTRY_PROGRAM} not found"))?
        .try_into()
        .context("xdp program has wrong type")?;
    program.detach(link).context("failed to detach xdp program")
}

async fn wait_for_shutdown(run_time: Option<Duration>) -> Result<()> {
    let Some(limit) = run_time else {
        return signal::ctrl_c()
            .await
            .context("failed to wait for shutdown signal");
    };

    info!("Collecting for {}s", limit.as_secs());
    tokio::select! {
        res = signal::ctrl_c() => {
            res.context("failed to wait for shutdown signal")?;
            info!("Caught Ctrl-C, finishing");
        }
        _ = time::sleep(limit) => {}
    }
    Ok(())
}

fn xdp_flags(mode: XdpMode) -> XdpFlags {
    match mode {
        XdpMode::Auto => XdpFlags::default(),
        XdpMode::Skb => XdpFlags::SKB_MODE,
        XdpMode::Driver => XdpFlags::DRV_MODE,
        XdpMode::Hw => XdpFlags::HW_MODE,
    }
}
