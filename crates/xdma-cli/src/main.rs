//! `xdmactl`: command-line control of an FPGA accelerator behind an XDMA user BAR.
//!
//! ```text
//! USAGE:
//!   xdmactl list                     List XDMA user nodes
//!   xdmactl status                   Read BUSY/DONE
//!   xdmactl dump [--count N]         Hex dump of the control window
//!   xdmactl regtest [--count N]      Write/read-back self-test
//!   xdmactl route <ports>            Write HBM routing selects (combined layout)
//!   xdmactl run [...]                Configure, pulse START, wait for DONE
//! ```
//!
//! Global options pick the node (`--device`), how it is reached
//! (`--access file|mmap|auto`) and the register layout
//! (`--layout combined|split`). `--simulate` runs against an in-process model.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use xdma_driver::regs::bar::DEFAULT_USER_NODE;
use xdma_driver::{
    AcceleratorController, AccessMethod, ControllerConfig, DeviceManager, RegisterLayout,
    RegisterWindow, RoutingMask, SimulatedDevice, WindowOptions,
};

#[derive(Parser)]
#[command(name = "xdmactl", about = "XDMA accelerator control-window CLI", version)]
struct Cli {
    /// XDMA user node.
    #[arg(long, global = true, default_value = DEFAULT_USER_NODE)]
    device: PathBuf,

    /// How registers are accessed.
    #[arg(long, global = true, value_enum, default_value_t = Access::File)]
    access: Access,

    /// Register layout of the loaded bitstream.
    #[arg(long, global = true, value_enum, default_value_t = Layout::Combined)]
    layout: Layout,

    /// Use a simulated accelerator instead of the device node.
    #[arg(long, global = true)]
    simulate: bool,

    /// More logging (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum Access {
    /// pread/pwrite at the register offset
    File,
    /// mmap of the node; fails if mapping is unavailable
    Mmap,
    /// mmap, falling back to pread/pwrite
    Auto,
}

impl From<Access> for AccessMethod {
    fn from(access: Access) -> Self {
        match access {
            Access::File => Self::FileOffset,
            Access::Mmap => Self::Mapped,
            Access::Auto => Self::Auto,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Layout {
    /// Single CTRL/STATUS word with HBM routing bits
    Combined,
    /// CTRL, STATUS and transfer descriptor registers
    Split,
}

impl From<Layout> for RegisterLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Combined => Self::Combined,
            Layout::Split => Self::Split,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// List XDMA user nodes under /dev.
    List,
    /// Read BUSY/DONE without writing anything.
    Status,
    /// Print consecutive registers starting at an offset.
    Dump {
        /// First offset (decimal or 0x-prefixed hex).
        #[arg(long, default_value = "0", value_parser = parse_u32)]
        offset: u32,
        /// Number of registers.
        #[arg(long, default_value_t = 8)]
        count: usize,
    },
    /// Write a distinct pattern to each register and read it back.
    ///
    /// Control, status and transfer registers of the layout are skipped.
    Regtest {
        /// Number of registers, counted from offset 0.
        #[arg(long, default_value_t = 16)]
        count: usize,
    },
    /// Write HBM routing selects (combined layout only).
    Route {
        /// Ports: comma list of wr0,rd0,wr1,rd1,stack0,stack1,all,host or a hex mask.
        ports: String,
    },
    /// Configure, pulse START and wait for DONE.
    Run {
        /// Routing selects for the combined layout (see `route`).
        #[arg(long)]
        route: Option<String>,
        /// Transfer write address for the split layout.
        #[arg(long, value_parser = parse_u32)]
        addr: Option<u32>,
        /// Transfer write length for the split layout.
        #[arg(long, value_parser = parse_u32)]
        len: Option<u32>,
        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 1)]
        interval_ms: u64,
        /// Give up after this many milliseconds.
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
        /// Leave START asserted instead of writing it back to 0.
        #[arg(long)]
        no_deassert: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .init();

    match &cli.command {
        Cmd::List => cmd_list()?,
        Cmd::Status => cmd_status(&cli)?,
        Cmd::Dump { offset, count } => cmd_dump(&cli, *offset as usize, *count)?,
        Cmd::Regtest { count } => cmd_regtest(&cli, *count)?,
        Cmd::Route { ports } => cmd_route(&cli, ports)?,
        Cmd::Run {
            route,
            addr,
            len,
            interval_ms,
            timeout_ms,
            no_deassert,
        } => {
            let config = ControllerConfig {
                deassert_start: !no_deassert,
                ..ControllerConfig::default()
            };
            let mut ctrl = controller(&cli, config)?;
            if let Some(ports) = route {
                let select = parse_routing(ports)?;
                let routed = ctrl.configure_routing(select)?;
                println!("Routing : {routed}");
            }
            match (addr, len) {
                (Some(addr), Some(len)) => ctrl.arm_transfer(*addr, *len)?,
                (None, None) => {}
                _ => bail!("--addr and --len must be given together"),
            }
            cmd_run(ctrl, *interval_ms, *timeout_ms)?;
        }
    }

    Ok(())
}

fn open_window(cli: &Cli) -> Result<RegisterWindow> {
    if cli.simulate {
        tracing::debug!("Using simulated {} device", RegisterLayout::from(cli.layout));
        return Ok(SimulatedDevice::with_layout(cli.layout.into()).window());
    }
    let options = WindowOptions {
        access: cli.access.into(),
        ..WindowOptions::new(&cli.device)
    };
    RegisterWindow::open(&options)
        .with_context(|| format!("opening {}", cli.device.display()))
}

fn controller(cli: &Cli, config: ControllerConfig) -> Result<AcceleratorController> {
    let layout = RegisterLayout::from(cli.layout);
    let window = open_window(cli)?;
    let config = if cli.simulate {
        ControllerConfig {
            min_poll_interval: Duration::ZERO,
            ..config
        }
    } else {
        config
    };
    Ok(AcceleratorController::with_config(
        window,
        layout.register_map(),
        config,
    )?)
}

fn cmd_list() -> Result<()> {
    let mgr = DeviceManager::discover()?;
    println!("XDMA user nodes: {}", mgr.device_count());
    for info in mgr.devices() {
        println!("[{}] {}", info.index, info.path.display());
    }
    Ok(())
}

fn cmd_status(cli: &Cli) -> Result<()> {
    let mut ctrl = controller(cli, ControllerConfig::default())?;
    let status = ctrl.poll_status()?;
    println!("Layout  : {}", RegisterLayout::from(cli.layout));
    println!("Status  : {status}");
    if ctrl.register_map().routing.is_some() {
        let word = ctrl.control_word()?;
        println!("Control : {word}");
        println!("Routing : {}", word.routing());
    }
    Ok(())
}

fn cmd_dump(cli: &Cli, offset: usize, count: usize) -> Result<()> {
    let mut window = open_window(cli)?;
    for (off, value) in window.dump(offset, count)? {
        println!("{off:#06x}: {value:#010x}");
    }
    Ok(())
}

fn cmd_regtest(cli: &Cli, count: usize) -> Result<()> {
    let map = RegisterLayout::from(cli.layout).register_map();
    let mut window = open_window(cli)?;
    let results = window.loopback_test(&map.scratch_offsets(count))?;

    let mut failures = 0;
    for r in &results {
        let verdict = if r.matches() { "ok" } else { "MISMATCH" };
        println!(
            "{:#06x}: wrote {:#010x} read {:#010x}  {verdict}",
            r.offset, r.wrote, r.read
        );
        if !r.matches() {
            failures += 1;
        }
    }
    println!();
    println!("{} of {} registers read back", results.len() - failures, results.len());
    if failures > 0 {
        bail!("{failures} register(s) did not read back");
    }
    Ok(())
}

fn cmd_route(cli: &Cli, ports: &str) -> Result<()> {
    let select = parse_routing(ports)?;
    let mut ctrl = controller(cli, ControllerConfig::default())?;
    let routed = ctrl.configure_routing(select)?;
    let readback = ctrl.control_word()?;
    println!("Wrote    : {routed}");
    println!("Readback : {}", readback.routing());
    if readback.routing() != routed {
        bail!("routing readback {readback} does not match {routed}");
    }
    Ok(())
}

fn cmd_run(mut ctrl: AcceleratorController, interval_ms: u64, timeout_ms: u64) -> Result<()> {
    ctrl.trigger()?;
    let outcome = ctrl
        .wait_until_done(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
        .context("waiting for DONE")?;
    println!(
        "DONE    : {} polls in {:.3} ms",
        outcome.polls,
        outcome.elapsed.as_secs_f64() * 1000.0
    );
    if ctrl.register_map().transfer.is_some() {
        if let Some(r) = ctrl.read_result()?.result {
            println!("Result  : addr={:#010x} len={}", r.read_addr, r.read_len);
        }
    }
    ctrl.close();
    Ok(())
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("{s}: {e}"))
}

fn parse_routing(s: &str) -> Result<RoutingMask> {
    if s.starts_with("0x") || s.starts_with("0X") {
        let raw = parse_u32(s).map_err(anyhow::Error::msg)?;
        return RoutingMask::from_bits(raw)
            .with_context(|| format!("{raw:#x} sets bits outside the routing field"));
    }

    let mut mask = RoutingMask::empty();
    for port in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        mask |= match port.to_ascii_lowercase().as_str() {
            "wr0" => RoutingMask::HBM_WR0,
            "rd0" => RoutingMask::HBM_RD0,
            "wr1" => RoutingMask::HBM_WR1,
            "rd1" => RoutingMask::HBM_RD1,
            "stack0" => RoutingMask::STACK0,
            "stack1" => RoutingMask::STACK1,
            "all" => RoutingMask::all(),
            "host" | "none" => RoutingMask::empty(),
            other => bail!("unknown port '{other}'"),
        };
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_names_and_hex() {
        assert_eq!(parse_routing("wr1,rd1").unwrap(), RoutingMask::STACK1);
        assert_eq!(parse_routing("Stack0, wr1").unwrap().bits(), 0x70);
        assert_eq!(parse_routing("host").unwrap(), RoutingMask::empty());
        assert_eq!(parse_routing("0xF0").unwrap(), RoutingMask::all());
        assert!(parse_routing("0x08").is_err());
        assert!(parse_routing("wr2").is_err());
    }

    #[test]
    fn numbers_accept_hex_and_decimal() {
        assert_eq!(parse_u32("0x80000000").unwrap(), 0x8000_0000);
        assert_eq!(parse_u32("4096").unwrap(), 4096);
        assert!(parse_u32("0xZZ").is_err());
    }

    #[test]
    fn simulated_run_completes() {
        let cli = Cli::parse_from(["xdmactl", "--simulate", "--layout", "split", "status"]);
        let mut ctrl = controller(&cli, ControllerConfig::default()).unwrap();
        ctrl.arm_transfer(0x8000_0000, 4096).unwrap();
        cmd_run(ctrl, 1, 1000).unwrap();
    }

    #[test]
    fn simulated_regtest_passes_on_both_layouts() {
        for layout in ["combined", "split"] {
            let cli = Cli::parse_from(["xdmactl", "--simulate", "--layout", layout, "regtest"]);
            cmd_regtest(&cli, 16).unwrap();
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
