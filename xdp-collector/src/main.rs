use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use log::LevelFilter;

mod loader;

#[derive(Parser)]
#[command(name = "xdp-collector")]
#[command(about = "XDP packet classifier loader", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach the classifier to an interface and wire its parsers
    Run(RunCommand),
}

#[derive(Args)]
struct RunCommand {
    /// Interface to listen for packets on
    #[arg(short, long, value_name = "IFACE")]
    iface: String,
    /// XDP attach mode
    #[arg(long, value_enum, default_value_t = loader::XdpMode::Auto)]
    xdp_mode: loader::XdpMode,
    /// bpffs path where the flow table is pinned for readers
    #[arg(long, value_name = "PATH", default_value = loader::DEFAULT_FLOW_PIN)]
    flow_pin: PathBuf,
    /// Seconds to stay attached; runs until Ctrl-C when omitted
    #[arg(short, long, value_name = "SECS")]
    time: Option<u64>,
}

impl RunCommand {
    fn into_options(self) -> loader::AttachOptions {
        loader::AttachOptions {
            iface: self.iface,
            flow_pin_path: self.flow_pin,
            xdp_mode: self.xdp_mode,
            run_time: self.time.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("xdp-collector error: {err:?}");
        exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Some(Commands::Run(cmd)) => loader::run_collector(cmd.into_options()).await?,
        None => {
            Cli::command().print_help().ok();
            println!();
        }
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
