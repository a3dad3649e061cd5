//! C3D CLI - Tool for inspecting and converting C3D files.

use c3d::prelude::*;
use c3d::core::{EntryId, MetaDataEntry};
use std::env;
use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

/// Log filter for the verbosity flags, unless `RUST_LOG` is set.
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }

    if filtered_args.is_empty() {
        print_help();
        return ExitCode::SUCCESS;
    }

    // JSON goes to stdout alone
    if filtered_args.iter().any(|&s| s == "--json" || s == "-j") {
        level = "error";
    }
    init_logging(level);

    let result = match filtered_args[0] {
        // Info command - show acquisition summary
        "info" | "i" => {
            if filtered_args.len() < 2 {
                return usage("missing file argument", "c3d-cli info <file.c3d>");
            }
            cmd_info(filtered_args[1])
        }

        // Meta command - dump the parameter tree
        "meta" | "m" => {
            if filtered_args.len() < 2 {
                return usage("missing file argument", "c3d-cli meta <file.c3d> [group] [--json]");
            }
            let json_mode = filtered_args.iter().any(|&s| s == "--json" || s == "-j");
            let pattern = filtered_args.get(2).filter(|&&s| s != "--json" && s != "-j").copied();
            cmd_meta(filtered_args[1], pattern, json_mode)
        }

        // Copy command - re-encode with optional layout changes
        "copy" | "c" => {
            if filtered_args.len() < 3 {
                return usage("missing arguments", "c3d-cli copy <in.c3d> <out.c3d> [options]");
            }
            match CopyOptions::parse(&filtered_args[3..]) {
                Ok(opts) => cmd_copy(filtered_args[1], filtered_args[2], &opts),
                Err(e) => return usage(&e, "c3d-cli copy <in.c3d> <out.c3d> [options]"),
            }
        }

        // Help
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        // Default: if file exists, show info; otherwise error
        _ => {
            if Path::new(filtered_args[0]).exists() {
                cmd_info(filtered_args[0])
            } else {
                eprintln!("Unknown command: {}", filtered_args[0]);
                eprintln!();
                print_help();
                return ExitCode::FAILURE;
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn usage(message: &str, usage: &str) -> ExitCode {
    eprintln!("Error: {}", message);
    eprintln!("Usage: {}", usage);
    ExitCode::FAILURE
}

fn print_help() {
    println!("c3d-cli - C3D motion capture file toolkit");
    println!();
    println!("USAGE:");
    println!("    c3d-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info   <file>              Show header, frame range and channels");
    println!("    m, meta   <file> [group]      Show the parameter tree (--json for JSON)");
    println!("    c, copy   <in> <out>          Re-encode a file");
    println!("    h, help                       Show this help");
    println!();
    println!("COPY OPTIONS:");
    println!("    --byte-order <vax|ieee-le|ieee-be>   Output byte order (default: as read)");
    println!("    --storage <int|float>                Output sample storage (default: as read)");
    println!("    --keep-metadata                      Do not rebuild POINT/ANALOG/EVENT groups");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Suppress all output");
    println!();
    println!("EXAMPLES:");
    println!("    c3d-cli info gait.c3d");
    println!("    c3d-cli meta gait.c3d POINT");
    println!("    c3d-cli meta gait.c3d --json");
    println!("    c3d-cli copy gait.c3d gait_vax.c3d --byte-order vax --storage float");
    println!();
    println!("NOTES:");
    println!("    - Passing a .c3d file directly is equivalent to 'info'");
    println!("    - RUST_LOG overrides the verbosity flags");
}

fn open(path: &str) -> Result<AcquisitionReader> {
    let mut reader = AcquisitionReader::new();
    reader.set_filename(path);
    reader.update()?;
    Ok(reader)
}

fn cmd_info(path: &str) -> Result<()> {
    let reader = open(path)?;
    let output = reader.output();
    let acq = output.read();

    println!("File: {}", path);
    if let Some(codec) = reader.codec() {
        let codec = codec.read();
        println!("Format: {} ({}, {} storage)", codec.name(), codec.byte_order(), codec.storage_format());
        if let Some(c3d) = codec.downcast_ref::<C3dCodec>() {
            println!("Point scale: {}", c3d.point_scale());
        }
    }
    println!();
    println!("Frames: {} .. {} ({} frames)", acq.first_frame(), acq.last_frame(), acq.point_frame_number());
    println!("Point rate: {} Hz", acq.point_frequency());
    println!(
        "Analog rate: {} Hz ({} samples per frame)",
        acq.analog_frequency(),
        acq.analog_samples_per_frame()
    );
    println!("Max interpolation gap: {}", acq.max_interpolation_gap());

    println!();
    println!("Points: {}", acq.point_number());
    for kind in PointType::ALL {
        let n = acq.points().iter().filter(|p| p.kind() == kind).count();
        if n > 0 {
            println!("  {:<10} {:>5}  [{}]", format!("{:?}", kind), n, acq.point_unit(kind));
        }
    }
    for p in acq.points() {
        let valid = (0..p.frame_number()).filter(|&f| p.is_valid(f)).count();
        println!("    {:<16} {:>6}/{} valid  {}", p.label(), valid, p.frame_number(), p.description());
    }

    println!();
    println!("Analogs: {}", acq.analog_number());
    for a in acq.analogs() {
        println!(
            "    {:<16} {:<6} scale={} offset={} gain={:?}",
            a.label(),
            a.unit(),
            a.scale(),
            a.offset(),
            a.gain()
        );
    }

    println!();
    println!("Events: {}", acq.event_number());
    for e in acq.events() {
        println!("    {}", e);
    }
    Ok(())
}

fn cmd_meta(path: &str, pattern: Option<&str>, json_mode: bool) -> Result<()> {
    let reader = open(path)?;
    let output = reader.output();
    let acq = output.read();
    let md = acq.metadata();

    let groups: Vec<EntryId> = md
        .groups()
        .iter()
        .copied()
        .filter(|&g| match (pattern, md.get(g)) {
            (Some(p), Some(e)) => e.name().eq_ignore_ascii_case(p),
            _ => true,
        })
        .collect();

    if json_mode {
        let out: Vec<serde_json::Value> = groups.iter().map(|&g| group_json(md, g)).collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "file": path,
            "groups": out,
        })).map_err(|e| Error::other(e.to_string()))?);
        return Ok(());
    }

    for g in groups {
        let Some(group) = md.get(g) else { continue };
        println!("{}{}  {}", lock_mark(group), group.name(), group.description());
        for &p in md.children(g) {
            let Some(param) = md.get(p) else { continue };
            match param.info() {
                Some(value) => println!("  {}{:<16} {}", lock_mark(param), param.name(), value),
                None => println!("  {}{:<16} -", lock_mark(param), param.name()),
            }
        }
    }
    Ok(())
}

fn lock_mark(entry: &MetaDataEntry) -> &'static str {
    if entry.is_unlocked() { "" } else { "*" }
}

fn group_json(md: &MetaData, group: EntryId) -> serde_json::Value {
    let Some(entry) = md.get(group) else {
        return serde_json::Value::Null;
    };
    let params: Vec<serde_json::Value> = md
        .children(group)
        .iter()
        .filter_map(|&p| md.get(p))
        .map(|param| {
            let mut obj = serde_json::json!({
                "name": param.name(),
                "description": param.description(),
                "locked": !param.is_unlocked(),
            });
            if let Some(value) = param.info() {
                obj["format"] = serde_json::json!(value.format().name());
                obj["dims"] = serde_json::json!(value.dimensions().sizes());
                obj["values"] = value_json(value);
            }
            obj
        })
        .collect();
    serde_json::json!({
        "name": entry.name(),
        "description": entry.description(),
        "locked": !entry.is_unlocked(),
        "parameters": params,
    })
}

fn value_json(value: &TypedValue) -> serde_json::Value {
    match value.format() {
        Format::Char => serde_json::json!(value.to_trimmed_strings()),
        Format::Real => serde_json::json!(value.to_f32()),
        Format::Byte | Format::Integer => serde_json::json!(value.to_i32()),
    }
}

/// Layout overrides for `copy`.
#[derive(Debug, Default)]
struct CopyOptions {
    byte_order: Option<ByteOrder>,
    storage: Option<StorageFormat>,
    keep_metadata: bool,
}

impl CopyOptions {
    fn parse(args: &[&str]) -> std::result::Result<Self, String> {
        let mut opts = Self::default();
        let mut it = args.iter();
        while let Some(&arg) = it.next() {
            match arg {
                "--byte-order" => {
                    opts.byte_order = Some(match it.next().copied() {
                        Some("vax") | Some("dec") => ByteOrder::VaxLittleEndian,
                        Some("ieee-le") | Some("intel") => ByteOrder::IeeeLittleEndian,
                        Some("ieee-be") | Some("mips") => ByteOrder::IeeeBigEndian,
                        other => return Err(format!("invalid byte order: {:?}", other)),
                    });
                }
                "--storage" => {
                    opts.storage = Some(match it.next().copied() {
                        Some("int") | Some("integer") => StorageFormat::Integer,
                        Some("float") | Some("real") => StorageFormat::Float,
                        other => return Err(format!("invalid storage: {:?}", other)),
                    });
                }
                "--keep-metadata" => opts.keep_metadata = true,
                other => return Err(format!("unknown option: {}", other)),
            }
        }
        Ok(opts)
    }
}

fn cmd_copy(input: &str, output: &str, opts: &CopyOptions) -> Result<()> {
    let reader = open(input)?;
    let codec = reader
        .codec()
        .ok_or_else(|| Error::other("reader produced no codec"))?;

    {
        let mut guard = codec.write();
        let c3d = guard
            .downcast_mut::<C3dCodec>()
            .ok_or_else(|| Error::UnsupportedFormat(input.to_string()))?;
        if let Some(order) = opts.byte_order {
            c3d.set_byte_order(order);
        }
        if let Some(storage) = opts.storage {
            c3d.set_storage_format(storage);
        }
        if opts.keep_metadata {
            c3d.set_write_flags(WriteFlags::SCALES_FROM_DATA);
        }
        tracing::debug!(
            byte_order = %c3d.byte_order(),
            storage = %c3d.storage_format(),
            flags = ?c3d.write_flags(),
            "output layout"
        );
    }

    let mut writer = AcquisitionWriter::new();
    writer.set_input(reader.output());
    writer.set_codec(codec);
    writer.set_filename(output);
    writer.update()?;
    println!("Copied {} -> {}", input, output);
    Ok(())
}
