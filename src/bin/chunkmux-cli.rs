use std::io::Write as _;
use std::process::ExitCode;

use ffmpeg_next::util::log::Level as LogLevel;

use chunkmux::{
    ChunkPlan, ChunkPlanner, ContainerFormat, OutputOptions, PacketProbe, PlanConfig, Splitter,
    Stitcher,
};

fn print_usage() {
    println!("chunkmux-cli");
    println!();
    println!("Usage:");
    println!("  chunkmux-cli probe <input>");
    println!("  chunkmux-cli packets <input> [count]");
    println!("  chunkmux-cli digest <input>");
    println!("  chunkmux-cli plan [options] <input>");
    println!("  chunkmux-cli run [options] <input> <chunks_dir> [final_output]");
    println!();
    println!("Options:");
    println!("  --target <sec>         Target chunk duration (default 60)");
    println!("  --min <sec>            Minimum chunk duration");
    println!("  --max <sec>            Maximum chunk duration");
    println!("  --ideal-par <n>        Ideal parallel workers (overrides target)");
    println!("  --min-chunks <n>       Minimum number of chunks");
    println!("  --max-chunks <n>       Maximum number of chunks");
    println!("  --allow-tiny-last      Keep very small tail chunks");
    println!("  --scene                Enable scene-cut scoring");
    println!("  --scene-threshold <x>  Scene-cut sensitivity (default 0.35)");
    println!("  --complexity           Enable complexity weighting");
    println!("  --no-split             Skip chunk extraction (stitch only)");
    println!("  --no-stitch            Skip stitching");
    println!("  --frag                 Fragmented MP4 outputs");
    println!("  --faststart            MP4 faststart layout for the final output");
    println!("  --force-format <fmt>   Force muxer (mp4/mov/matroska/webm)");
    println!("  --plan-json <path>     Write the plan as a JSON array");
}

#[derive(Default)]
struct CliConfig {
    input: Option<String>,
    chunks_dir: Option<String>,
    final_out: Option<String>,
    plan_json: Option<String>,
    target: f64,
    min_dur: f64,
    max_dur: f64,
    ideal_parallel: usize,
    min_chunks: usize,
    max_chunks: usize,
    allow_tiny_last: bool,
    scene: bool,
    scene_threshold: f64,
    complexity: bool,
    frag: bool,
    faststart: bool,
    force_format: Option<ContainerFormat>,
    skip_split: bool,
    skip_stitch: bool,
}

fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let mut config = CliConfig {
        target: 60.0,
        scene_threshold: 0.35,
        ..CliConfig::default()
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str| {
            iter.next()
                .map(String::as_str)
                .ok_or_else(|| format!("{flag} requires a value"))
        };

        match arg.as_str() {
            "--target" => config.target = parse_number(value_for("--target")?)?,
            "--min" => config.min_dur = parse_number(value_for("--min")?)?,
            "--max" => config.max_dur = parse_number(value_for("--max")?)?,
            "--ideal-par" => config.ideal_parallel = parse_count(value_for("--ideal-par")?)?,
            "--min-chunks" => config.min_chunks = parse_count(value_for("--min-chunks")?)?,
            "--max-chunks" => config.max_chunks = parse_count(value_for("--max-chunks")?)?,
            "--allow-tiny-last" => config.allow_tiny_last = true,
            "--scene" => config.scene = true,
            "--scene-threshold" => {
                config.scene_threshold = parse_number(value_for("--scene-threshold")?)?;
            }
            "--complexity" => config.complexity = true,
            "--no-split" => config.skip_split = true,
            "--no-stitch" => config.skip_stitch = true,
            "--frag" => config.frag = true,
            "--faststart" => config.faststart = true,
            "--force-format" => {
                let name = value_for("--force-format")?;
                config.force_format = Some(
                    ContainerFormat::from_name(name)
                        .ok_or_else(|| format!("unknown format: {name}"))?,
                );
            }
            "--plan-json" => config.plan_json = Some(value_for("--plan-json")?.to_string()),
            flag if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            positional => {
                if config.input.is_none() {
                    config.input = Some(positional.to_string());
                } else if config.chunks_dir.is_none() {
                    config.chunks_dir = Some(positional.to_string());
                } else if config.final_out.is_none() {
                    config.final_out = Some(positional.to_string());
                } else {
                    return Err(format!("unexpected argument: {positional}"));
                }
            }
        }
    }

    Ok(config)
}

fn parse_number(value: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .map_err(|_| format!("not a number: {value}"))
}

fn parse_count(value: &str) -> Result<usize, String> {
    value
        .parse::<usize>()
        .map_err(|_| format!("not a count: {value}"))
}

fn plan_config(config: &CliConfig) -> PlanConfig {
    PlanConfig::new()
        .with_target_duration(config.target)
        .with_min_duration(config.min_dur)
        .with_max_duration(config.max_dur)
        .with_avoid_tiny_last(!config.allow_tiny_last)
        .with_min_chunks(config.min_chunks)
        .with_max_chunks(config.max_chunks)
        .with_ideal_parallel(config.ideal_parallel)
        .with_scene_detection(config.scene)
        .with_scene_threshold(config.scene_threshold)
        .with_complexity_adapt(config.complexity)
}

fn output_options(config: &CliConfig, faststart: bool) -> OutputOptions {
    let mut options = OutputOptions::new()
        .with_fragmented(config.frag)
        .with_faststart(faststart && config.faststart);
    if let Some(format) = config.force_format {
        options = options.with_format(format);
    }
    options
}

fn dump_plan(plan: &ChunkPlan) {
    println!("Chunk plan ({} chunks):", plan.len());
    for chunk in &plan.chunks {
        println!(
            "  #{:03}  {:.3} -> {:.3}  ({:.3} s)",
            chunk.index,
            chunk.start,
            chunk.end,
            chunk.length(),
        );
    }
}

fn write_plan_json(path: &str, plan: &ChunkPlan) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "[")?;
    for (i, chunk) in plan.chunks.iter().enumerate() {
        let comma = if i + 1 == plan.len() { "" } else { "," };
        writeln!(
            file,
            "  {{\"index\": {}, \"start\": {:.3}, \"end\": {:.3}}}{comma}",
            chunk.index, chunk.start, chunk.end,
        )?;
    }
    writeln!(file, "]")?;
    Ok(())
}

fn cmd_probe(input: &str) -> ExitCode {
    match PacketProbe::scan(input) {
        Ok(probe) => {
            let keyframes = probe.keyframe_times();
            println!("Duration: {:.3} s", probe.duration);
            println!("Video packets: {}", probe.frames.len());
            println!("Keyframes: {}", keyframes.len());
            if let (Some(first), Some(last)) = (keyframes.first(), keyframes.last()) {
                println!("Keyframe span: {first:.3} s -> {last:.3} s");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("probe failed for {input}: {error}");
            ExitCode::from(2)
        }
    }
}

fn cmd_packets(input: &str, count: usize) -> ExitCode {
    let mut context = match ffmpeg_next::format::input(&input) {
        Ok(context) => context,
        Err(error) => {
            eprintln!("failed to open {input}: {error}");
            return ExitCode::from(2);
        }
    };

    let mut packet = ffmpeg_next::Packet::empty();
    let mut printed = 0usize;
    while printed < count {
        match packet.read(&mut context) {
            Ok(()) => {
                println!(
                    "stream={} pts={} dts={} dur={} size={} flags={}",
                    packet.stream(),
                    packet.pts().map_or("n/a".to_string(), |v| v.to_string()),
                    packet.dts().map_or("n/a".to_string(), |v| v.to_string()),
                    packet.duration(),
                    packet.size(),
                    if packet.is_key() { "K" } else { "_" },
                );
                printed += 1;
            }
            Err(ffmpeg_next::Error::Eof) => break,
            Err(error) => {
                eprintln!("packet read failed: {error}");
                return ExitCode::from(2);
            }
        }
    }

    ExitCode::SUCCESS
}

fn cmd_digest(input: &str) -> ExitCode {
    match chunkmux::verify::stream_digests(input) {
        Ok(digests) => {
            for digest in &digests {
                println!(
                    "stream {} ({:?}): {} packets, {} bytes, sha256={}",
                    digest.stream_index,
                    digest.media_type,
                    digest.packets,
                    digest.bytes,
                    digest.hex(),
                );
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("digest failed for {input}: {error}");
            ExitCode::from(2)
        }
    }
}

fn cmd_plan(config: &CliConfig) -> ExitCode {
    let Some(input) = config.input.as_deref() else {
        print_usage();
        return ExitCode::from(1);
    };

    let probe = match PacketProbe::scan(input) {
        Ok(probe) => probe,
        Err(error) => {
            eprintln!("probe failed for {input}: {error}");
            return ExitCode::from(2);
        }
    };

    let plan = match ChunkPlanner::new(plan_config(config)).plan(&probe) {
        Ok(plan) => plan,
        Err(error) => {
            eprintln!("planning failed: {error}");
            return ExitCode::from(3);
        }
    };

    dump_plan(&plan);

    if let Some(path) = config.plan_json.as_deref() {
        if let Err(error) = write_plan_json(path, &plan) {
            eprintln!("failed to write {path}: {error}");
            return ExitCode::from(3);
        }
    }

    ExitCode::SUCCESS
}

fn cmd_run(config: &CliConfig) -> ExitCode {
    let (Some(input), Some(chunks_dir)) = (config.input.as_deref(), config.chunks_dir.as_deref())
    else {
        eprintln!("Input file and chunks directory are required.");
        print_usage();
        return ExitCode::from(1);
    };

    let skip_stitch = config.skip_stitch || config.final_out.is_none();

    let probe = match PacketProbe::scan(input) {
        Ok(probe) => probe,
        Err(error) => {
            eprintln!("probe failed for {input}: {error}");
            return ExitCode::from(2);
        }
    };

    let plan = match ChunkPlanner::new(plan_config(config)).plan(&probe) {
        Ok(plan) => plan,
        Err(error) => {
            eprintln!("planning failed: {error}");
            return ExitCode::from(3);
        }
    };

    dump_plan(&plan);

    if let Some(path) = config.plan_json.as_deref() {
        if let Err(error) = write_plan_json(path, &plan) {
            eprintln!("failed to write {path}: {error}");
            return ExitCode::from(3);
        }
    }

    if !config.skip_split {
        let splitter = match Splitter::new(input) {
            Ok(splitter) => splitter,
            Err(error) => {
                eprintln!("split failed: {error}");
                return ExitCode::from(4);
            }
        };
        if let Err(error) = splitter
            .with_options(output_options(config, false))
            .split_all(&plan, chunks_dir)
        {
            eprintln!("split failed: {error}");
            return ExitCode::from(4);
        }
    }

    if !skip_stitch {
        let final_out = config.final_out.as_deref().unwrap_or_default();
        let stitcher = match Stitcher::new(final_out) {
            Ok(stitcher) => stitcher,
            Err(error) => {
                eprintln!("stitch failed: {error}");
                return ExitCode::from(5);
            }
        };
        if let Err(error) = stitcher
            .with_options(output_options(config, true))
            .stitch(&plan, chunks_dir)
        {
            eprintln!("stitch failed: {error}");
            return ExitCode::from(5);
        }
    }

    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    if let Err(error) = ffmpeg_next::init() {
        eprintln!("FFmpeg initialisation failed: {error}");
        return ExitCode::from(1);
    }
    ffmpeg_next::util::log::set_level(LogLevel::Info);

    match args[1].as_str() {
        "probe" => {
            if args.len() != 3 {
                print_usage();
                return ExitCode::from(1);
            }
            cmd_probe(&args[2])
        }
        "packets" => {
            if args.len() < 3 || args.len() > 4 {
                print_usage();
                return ExitCode::from(1);
            }
            let count = args
                .get(3)
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(20);
            cmd_packets(&args[2], count)
        }
        "digest" => {
            if args.len() != 3 {
                print_usage();
                return ExitCode::from(1);
            }
            cmd_digest(&args[2])
        }
        "plan" => match parse_args(&args[2..]) {
            Ok(config) => cmd_plan(&config),
            Err(error) => {
                eprintln!("{error}");
                print_usage();
                ExitCode::from(1)
            }
        },
        "run" => match parse_args(&args[2..]) {
            Ok(config) => cmd_run(&config),
            Err(error) => {
                eprintln!("{error}");
                print_usage();
                ExitCode::from(1)
            }
        },
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        other => {
            eprintln!("unknown command: {other}");
            print_usage();
            ExitCode::from(1)
        }
    }
}
