//! Snapshot harness for the qspect decoders.
//!
//! Loads a raw byte image of a frozen process region, maps it at a base
//! address, and decodes one typed value the way an inspection host would —
//! useful for building fixtures and for poking at layout changes without a
//! live debugger attached.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use qspect_core::{Catalogue, DecodeError, MemoryAccess, SnapshotMemory, TypeDesc, TypedRef};
use qspect_utils::{info, init_logging};

/// Decode Qt6 values out of frozen memory snapshots.
#[derive(Parser, Debug)]
#[command(name = "qspect")]
#[command(version)]
#[command(about = "Decode Qt6 values out of frozen memory snapshots", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Decode one typed value from a snapshot image
    Decode
    {
        /// Path to the raw snapshot image
        #[arg(long)]
        image: PathBuf,
        /// Address the image is mapped at (hex 0x... or decimal)
        #[arg(long)]
        base: String,
        /// Address of the value to decode
        #[arg(long)]
        addr: String,
        /// Declared type name, e.g. 'QHash<int,QString>'
        #[arg(long = "type")]
        type_name: String,
        /// Resolved template arguments as name:size:align triples, in
        /// declaration order (e.g. --targ int:4:4 --targ QString:24:8)
        #[arg(long = "targ")]
        targs: Vec<String>,
        /// How many container levels to expand
        #[arg(long, default_value_t = 1)]
        depth: usize,
    },
    /// List the registered catalogue entries
    Types,
}

/// Parse a hex (`0x...`) or decimal address string.
fn parse_address(text: &str) -> Result<u64, String>
{
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("invalid hex address '{text}': {e}"))
    } else {
        text.parse::<u64>().map_err(|e| format!("invalid address '{text}': {e}"))
    }
}

/// Parse a `name:size:align` template-argument triple.
fn parse_targ(text: &str) -> Result<TypeDesc, String>
{
    let mut parts = text.rsplitn(3, ':');
    let align = parts.next().ok_or_else(|| format!("invalid --targ '{text}'"))?;
    let size = parts.next().ok_or_else(|| format!("invalid --targ '{text}'"))?;
    let name = parts.next().ok_or_else(|| format!("invalid --targ '{text}'"))?;
    let size: u64 = size.parse().map_err(|e| format!("invalid size in --targ '{text}': {e}"))?;
    let align: u64 = align.parse().map_err(|e| format!("invalid align in --targ '{text}': {e}"))?;
    Ok(TypeDesc::new(name, size, align))
}

/// Host-side fallback for values the catalogue has no decoder for —
/// primitive scalars come out as numbers, everything else as a byte dump.
fn fallback_render(mem: &dyn MemoryAccess, value: &TypedRef) -> String
{
    let read = || -> Result<String, DecodeError> {
        Ok(match (value.ty.name.as_str(), value.ty.size) {
            ("bool", _) => if mem.read_u8(value.addr)? != 0 { "true" } else { "false" }.to_string(),
            ("float", _) => f32::from_bits(mem.read_u32(value.addr)?).to_string(),
            ("double", _) => f64::from_bits(mem.read_u64(value.addr)?).to_string(),
            ("char", _) => (mem.read_u8(value.addr)? as i8).to_string(),
            (_, 1) => (mem.read_u8(value.addr)? as i8).to_string(),
            (_, 2) => (mem.read_u16(value.addr)? as i16).to_string(),
            (_, 4) => mem.read_i32(value.addr)?.to_string(),
            (_, 8) => mem.read_i64(value.addr)?.to_string(),
            (_, size) => {
                let bytes = mem.read_bytes(value.addr, size.min(16) as usize)?;
                let hex = bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ");
                format!("<{hex}>")
            }
        })
    };
    read().unwrap_or_else(|_| "<unreadable>".to_string())
}

/// Decode `value` and print it with `indent` levels of children expanded.
fn print_value(catalogue: &Catalogue, mem: &SnapshotMemory, value: &TypedRef, label: &str, indent: usize, depth: usize)
{
    let pad = "  ".repeat(indent);
    match catalogue.decode(mem, value) {
        Ok(rendered) => {
            println!("{pad}{label} = {}", rendered.display);
            if depth == 0 {
                return;
            }
            if let Some(children) = rendered.children {
                for child in children {
                    print_value(catalogue, mem, &child.value, &child.label, indent + 1, depth - 1);
                }
            }
        }
        Err(DecodeError::UnknownType(_)) => {
            println!("{pad}{label} = {}", fallback_render(mem, value));
        }
        Err(err) => {
            println!("{pad}{label} = <error: {err}>");
        }
    }
}

fn run(cli: Cli) -> Result<(), String>
{
    match cli.command {
        Commands::Decode {
            image,
            base,
            addr,
            type_name,
            targs,
            depth,
        } => {
            let base = parse_address(&base)?;
            if base == 0 {
                return Err("snapshot base must be non-zero; the null page stays unreadable".to_string());
            }
            let addr = parse_address(&addr)?;
            let bytes = std::fs::read(&image).map_err(|e| format!("cannot read {}: {e}", image.display()))?;
            info!(image = %image.display(), base = format_args!("{base:#x}"), len = bytes.len(), "snapshot loaded");

            let snapshot = SnapshotMemory::from_bytes(base, bytes);
            let args = targs.iter().map(|t| parse_targ(t)).collect::<Result<Vec<_>, _>>()?;
            let ty = TypeDesc::with_args(type_name, 0, 8, args);

            let catalogue = Catalogue::qt6();
            print_value(&catalogue, &snapshot, &TypedRef::new(addr, ty), "value", 0, depth);
            Ok(())
        }
        Commands::Types => {
            let catalogue = Catalogue::qt6();
            for label in catalogue.labels() {
                println!("{label}");
            }
            Ok(())
        }
    }
}

fn main()
{
    if let Err(err) = init_logging() {
        eprintln!("warning: logging not initialized: {err}");
    }

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_address_accepts_hex_and_decimal()
    {
        assert_eq!(parse_address("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert!(parse_address("zzz").is_err());
    }

    #[test]
    fn test_parse_targ_triple()
    {
        let ty = parse_targ("QHash<int,int>:8:8").unwrap();
        assert_eq!(ty.name, "QHash<int,int>");
        assert_eq!(ty.size, 8);
        assert_eq!(ty.align, 8);
    }
}
