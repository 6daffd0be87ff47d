//! Load a raw binary image into RAM and run it on the m68k engine.
//!
//! Usage: m68k-runner IMAGE [--model 68010] [--load-addr 0x400] [--max-steps N]
//!
//! Exit status: 0 when the program stops or finishes, 1 when the processor
//! halts, 2 at a breakpoint, 3 when the step limit is reached.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail, ensure};
use clap::Parser;
use log::{info, warn};

use m68k_engine::{
    Condition, FaultPolicy, MemoryRegion, Model, Observable, Processor, ProcessorConfig,
    QUERY_PATHS,
};

/// Bytes reserved for the reset vectors (initial SSP and PC).
const RESET_VECTORS_LEN: usize = 8;

#[derive(Parser, Debug)]
#[command(
    name = "m68k-runner",
    version,
    about = "Run a raw 68000-family binary image until it halts, stops or hits a breakpoint."
)]
struct Args {
    /// Raw big-endian program image
    image: PathBuf,

    /// Processor model (68000, 68010, 68020, 68030, 68040); overrides --config
    #[arg(long)]
    model: Option<Model>,

    /// JSON processor configuration
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address the image is loaded at. When non-zero, reset vectors are
    /// generated: SSP at the top of RAM, PC at the load address.
    #[arg(long, value_name = "ADDR", default_value = "0x400", value_parser = parse_u32)]
    load_addr: u32,

    /// RAM size in bytes
    #[arg(long, value_name = "BYTES", default_value = "0x100000", value_parser = parse_u32)]
    ram_size: u32,

    /// Stop after this many instructions
    #[arg(long, value_name = "N", default_value_t = 10_000_000)]
    max_steps: u64,

    /// Take bus and address errors through their vectors instead of halting
    #[arg(long, action = clap::ArgAction::SetTrue)]
    vector_faults: bool,

    /// Print the register file when the run ends
    #[arg(long, action = clap::ArgAction::SetTrue)]
    dump: bool,
}

/// Decimal or `0x`-prefixed hexadecimal.
fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid number `{s}`: {e}"))
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    run(&args)
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    let mut ram = build_ram(args)?;

    let mut cpu = Processor::with_config(&config, MemoryRegion::low_memory(&mut ram));
    info!(
        "{} with {:#x} bytes of RAM, image loaded at {:#010x}",
        config.model, args.ram_size, args.load_addr
    );

    let steps = cpu.run(args.max_steps);
    let condition = cpu.condition();

    if args.dump {
        dump(&cpu);
    }

    let code = match condition {
        Condition::Finished | Condition::Stopped => {
            info!("{condition:?} after {steps} instructions");
            0
        }
        Condition::Halted => {
            warn!(
                "halted after {steps} instructions at {:#010x} (opcode {:#06x})",
                cpu.instruction_address(),
                cpu.opcode()
            );
            1
        }
        Condition::Breakpoint(n) => {
            info!(
                "breakpoint {n} at {:#010x} after {steps} instructions",
                cpu.instruction_address()
            );
            2
        }
        Condition::Normal | Condition::Startup => {
            warn!("step limit of {} reached at {:#010x}", args.max_steps, cpu.regs.pc);
            3
        }
    };
    Ok(ExitCode::from(code))
}

fn load_config(args: &Args) -> anyhow::Result<ProcessorConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parse config {}", path.display()))?
        }
        None => ProcessorConfig::default(),
    };
    if let Some(model) = args.model {
        config.model = model;
    }
    if args.vector_faults {
        config.fault_policy = FaultPolicy::Vector;
    }
    Ok(config)
}

/// RAM with the image copied in and, if the image is not loaded at zero,
/// reset vectors pointing at it.
fn build_ram(args: &Args) -> anyhow::Result<Vec<u8>> {
    let image = fs::read(&args.image)
        .with_context(|| format!("read image {}", args.image.display()))?;

    let ram_size = args.ram_size as usize;
    let load = args.load_addr as usize;
    ensure!(ram_size >= RESET_VECTORS_LEN, "RAM size {ram_size:#x} is too small");
    let end = load
        .checked_add(image.len())
        .filter(|&end| end <= ram_size)
        .with_context(|| {
            format!(
                "image of {:#x} bytes at {load:#x} does not fit in {ram_size:#x} bytes of RAM",
                image.len()
            )
        })?;

    let mut ram = vec![0u8; ram_size];
    ram[load..end].copy_from_slice(&image);

    if load != 0 {
        if load < RESET_VECTORS_LEN {
            bail!("load address {load:#x} overlaps the reset vectors");
        }
        ram[0..4].copy_from_slice(&args.ram_size.to_be_bytes());
        ram[4..8].copy_from_slice(&args.load_addr.to_be_bytes());
    }
    Ok(ram)
}

fn dump(cpu: &impl Observable) {
    for path in QUERY_PATHS {
        if let Some(value) = cpu.query(path) {
            println!("{path:>10} = {value}");
        }
    }
}
