use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use skelxfl::{
    AliasTable, ConvertOptions, MissingPolicy, StageSize, piece_usage, resolve_timeline,
    timeline_to_doc_json, unused_pieces,
};

#[derive(Parser, Debug)]
#[command(name = "skelxfl", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a bundle into an XFL document directory.
    Convert(ConvertArgs),
    /// Print atlas pieces, per-piece usage, and resolution diagnostics.
    Info(InfoArgs),
    /// Export every atlas piece as an individual PNG.
    ExportImages(ExportImagesArgs),
    /// Dump the bundle's timeline as the external JSON form.
    DumpTimeline(DumpTimelineArgs),
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input bundle file.
    bundle: PathBuf,

    /// Output directory; the document lands at <out>/<name>.xfl/.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Resolution-correction scale for translations and stage size.
    #[arg(long, default_value_t = skelxfl::DEFAULT_STAGE_SCALE)]
    scale: f64,

    /// Map a timeline name to an atlas name, e.g. --alias arm_left=arm_l
    /// (repeatable; later entries win).
    #[arg(long = "alias")]
    aliases: Vec<String>,

    /// External timeline JSON consumed instead of the binary timeline.
    #[arg(long)]
    timeline_json: Option<PathBuf>,

    /// Directory of pre-split piece PNGs (bypasses atlas cropping).
    #[arg(long)]
    media_dir: Option<PathBuf>,

    /// Also create library items for pieces no layer references.
    #[arg(long)]
    include_unused: bool,

    /// What to do with layers whose names do not resolve.
    #[arg(long, value_enum, default_value_t = MissingChoice::Drop)]
    missing: MissingChoice,

    /// Comma-separated piece names; build layers only for these.
    #[arg(long)]
    only: Option<String>,

    /// Preview: single-frame document with every piece at its registration
    /// point (ignores the timeline).
    #[arg(long, conflicts_with = "debug_piece")]
    identity_sprite: bool,

    /// Preview: place image/<NAME> directly on stage, bypassing sprites.
    #[arg(long, value_name = "NAME")]
    debug_piece: Option<String>,

    /// Override the timeline frame rate.
    #[arg(long)]
    fps: Option<u16>,

    /// Override the stage width (source pixels, pre scale).
    #[arg(long)]
    width: Option<f64>,

    /// Override the stage height (source pixels, pre scale).
    #[arg(long)]
    height: Option<f64>,

    /// Write the resolution report as JSON to this path.
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Print the resolution report and unused-piece list.
    #[arg(long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Input bundle file.
    bundle: PathBuf,

    /// Map a timeline name to an atlas name (repeatable).
    #[arg(long = "alias")]
    aliases: Vec<String>,

    /// Print per-piece usage counts instead of just names.
    #[arg(long)]
    trace: bool,
}

#[derive(Parser, Debug)]
struct ExportImagesArgs {
    /// Input bundle file.
    bundle: PathBuf,

    /// Output directory for piece PNGs.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct DumpTimelineArgs {
    /// Input bundle file.
    bundle: PathBuf,

    /// Output JSON path (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MissingChoice {
    Drop,
    Empty,
    Placeholder,
}

impl From<MissingChoice> for MissingPolicy {
    fn from(c: MissingChoice) -> Self {
        match c {
            MissingChoice::Drop => MissingPolicy::Drop,
            MissingChoice::Empty => MissingPolicy::EmptyLayer,
            MissingChoice::Placeholder => MissingPolicy::Placeholder,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Convert(args) => cmd_convert(args),
        Command::Info(args) => cmd_info(args),
        Command::ExportImages(args) => cmd_export_images(args),
        Command::DumpTimeline(args) => cmd_dump_timeline(args),
    }
}

fn alias_table(directives: &[String]) -> anyhow::Result<AliasTable> {
    let mut table = AliasTable::new();
    for directive in directives {
        table
            .insert_directive(directive)
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(table)
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let stage_override = match (args.width, args.height) {
        (None, None) => None,
        (w, h) => {
            let w = w.ok_or_else(|| anyhow::anyhow!("--width is required with --height"))?;
            let h = h.ok_or_else(|| anyhow::anyhow!("--height is required with --width"))?;
            Some(StageSize::new(w, h)?)
        }
    };

    let opts = ConvertOptions {
        scale: args.scale,
        fps_override: args.fps,
        stage_override,
        aliases: alias_table(&args.aliases)?,
        missing: args.missing.into(),
        include_unused: args.include_unused,
        only: args
            .only
            .map(|s| s.split(',').map(str::to_owned).collect()),
        identity_sprite: args.identity_sprite,
        debug_piece: args.debug_piece,
        timeline_json: args.timeline_json,
        media_dir: args.media_dir,
    };

    let outcome = skelxfl::convert(&args.bundle, &args.out, &opts)
        .with_context(|| format!("convert '{}'", args.bundle.display()))?;

    if args.verbose {
        eprintln!(
            "layers: {} total, {} resolved, {} missing",
            outcome.report.total_layers,
            outcome.report.resolved,
            outcome.report.missing_count()
        );
        for m in &outcome.report.missing {
            eprintln!("  missing {:30} used in {} frames", m.name, m.usage);
        }
        if !outcome.unused.is_empty() {
            eprintln!("unused pieces: {}", outcome.unused.join(", "));
        }
    }
    if let Some(path) = &args.report_json {
        let json = serde_json::to_string_pretty(&outcome.report)?;
        fs::write(path, json).with_context(|| format!("write report '{}'", path.display()))?;
    }

    eprintln!(
        "wrote {} ({} library items)",
        outcome.document_dir.display(),
        outcome.items_written
    );
    Ok(())
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let decoded = skelxfl::load_bundle(&args.bundle, None)?;
    let aliases = alias_table(&args.aliases)?;
    let (resolved, report) = resolve_timeline(&decoded.timeline, &decoded.atlas, &aliases);

    println!(
        "{}: {} pieces, {} layers, {} frames @ {} fps",
        decoded.name,
        decoded.atlas.pieces.len(),
        decoded.timeline.layers.len(),
        decoded.timeline.frame_count,
        decoded.timeline.fps.0
    );

    if args.trace {
        for (name, usage) in piece_usage(&decoded.atlas, &resolved) {
            println!("  {name:35} {usage:5} frames");
        }
    } else {
        for piece in &decoded.atlas.pieces {
            println!("  {}", piece.name);
        }
    }

    for m in &report.missing {
        println!("missing: {:30} used in {} frames", m.name, m.usage);
    }
    let unused = unused_pieces(&decoded.atlas, &resolved);
    if !unused.is_empty() {
        println!("unused: {}", unused.join(", "));
    }
    Ok(())
}

fn cmd_export_images(args: ExportImagesArgs) -> anyhow::Result<()> {
    let count = skelxfl::export_images(&args.bundle, &args.out)?;
    eprintln!("exported {count} piece(s) to {}", args.out.display());
    Ok(())
}

fn cmd_dump_timeline(args: DumpTimelineArgs) -> anyhow::Result<()> {
    let decoded = skelxfl::load_bundle(&args.bundle, None)?;
    let json = timeline_to_doc_json(&decoded.timeline)?;
    match args.out {
        Some(path) => {
            fs::write(&path, json)
                .with_context(|| format!("write timeline json '{}'", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
