use std::{env, fs, path::PathBuf};

use anyhow::{Context as _, Result, anyhow};
use aya_build::{Package, Toolchain};

const EBPF_PACKAGE: &str = "xdp-collector-ebpf";
const EBPF_OBJECT: &str = "xdp-collector";
const SKIP_ENV: &str = "XDP_COLLECTOR_SKIP_EBPF";

fn main() -> Result<()> {
    println!("cargo:rerun-if-env-changed={SKIP_ENV}");
    if env::var_os(SKIP_ENV).is_some() {
        return write_placeholder();
    }

    let cargo_metadata::Metadata { packages, .. } = cargo_metadata::MetadataCommand::new()
        .no_deps()
        .exec()
        .context("MetadataCommand::exec")?;
    let ebpf_package = packages
        .into_iter()
        .find(|cargo_metadata::Package { name, .. }| name.as_str() == EBPF_PACKAGE)
        .ok_or_else(|| anyhow!("{EBPF_PACKAGE} package not found"))?;
    let cargo_metadata::Package {
        name,
        manifest_path,
        ..
    } = ebpf_package;
    let ebpf_package = Package {
        name: name.as_str(),
        root_dir: manifest_path
            .parent()
            .ok_or_else(|| anyhow!("no parent for {manifest_path}"))?
            .as_str(),
        ..Default::default()
    };
    aya_build::build_ebpf([ebpf_package], Toolchain::default())
}

// Host-only builds (unit tests, machines without bpf-linker) embed an empty
// object; loading it then fails at runtime instead of at compile time.
fn write_placeholder() -> Result<()> {
    let out_dir = env::var_os("OUT_DIR").ok_or(anyhow!("OUT_DIR not set"))?;
    let dst = PathBuf::from(out_dir).join(EBPF_OBJECT);
    fs::write(&dst, b"").with_context(|| format!("failed to write {}", dst.display()))?;
    println!("cargo:warning={SKIP_ENV} is set, embedding an empty eBPF object");
    Ok(())
}
