use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use postera::{Compositor, Config, FfmpegSource, FrameCache, FrameSource as _, PosterScene};

#[derive(Parser, Debug)]
#[command(name = "postera", version)]
struct Cli {
    /// Optional config JSON; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print video metadata as JSON (requires `ffprobe` on PATH).
    Probe(ProbeArgs),
    /// Extract one still frame to a file.
    Frame(FrameArgs),
    /// Extract evenly spaced thumbnails into a directory.
    Thumbs(ThumbsArgs),
    /// Render a poster from a scene JSON and store it in the output dir.
    Poster(PosterArgs),
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Input video path.
    #[arg(long)]
    video: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input video path.
    #[arg(long)]
    video: PathBuf,

    /// Timestamp in seconds.
    #[arg(long)]
    timestamp: f64,

    /// Full-quality lossless frame (bypasses the cache).
    #[arg(long)]
    full: bool,

    /// Output file path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ThumbsArgs {
    /// Input video path.
    #[arg(long)]
    video: PathBuf,

    /// Number of thumbnails to sample over the duration.
    #[arg(long, default_value_t = 20)]
    count: usize,

    /// Directory thumbnails are written into.
    #[arg(long)]
    out_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct PosterArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    match cli.cmd {
        Command::Probe(args) => cmd_probe(&cfg, args),
        Command::Frame(args) => cmd_frame(&cfg, args),
        Command::Thumbs(args) => cmd_thumbs(&cfg, args),
        Command::Poster(args) => cmd_poster(&cfg, args),
    }
}

fn cmd_probe(cfg: &Config, args: ProbeArgs) -> anyhow::Result<()> {
    let source = FfmpegSource::new(cfg);
    let meta = source
        .probe(&args.video)
        .with_context(|| format!("could not determine metadata for '{}'", args.video.display()))?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

fn cmd_frame(cfg: &Config, args: FrameArgs) -> anyhow::Result<()> {
    let source = Arc::new(FfmpegSource::new(cfg));
    let cache = FrameCache::new(cfg, source)?;

    let bytes = if args.full {
        cache.get_full_quality(&args.video, args.timestamp)
    } else {
        cache.preview(&args.video, args.timestamp)
    }
    .with_context(|| format!("frame extraction failed for '{}'", args.video.display()))?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &bytes)
        .with_context(|| format!("write frame '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_thumbs(cfg: &Config, args: ThumbsArgs) -> anyhow::Result<()> {
    let source = Arc::new(FfmpegSource::new(cfg));
    let meta = source
        .probe(&args.video)
        .with_context(|| format!("could not determine duration for '{}'", args.video.display()))?;
    let cache = FrameCache::new(cfg, source)?;

    let thumbs = cache.get_thumbnails(&args.video, meta.duration, args.count);
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    for (i, bytes) in thumbs.iter().enumerate() {
        let path = args.out_dir.join(format!("thumb_{i:03}.jpg"));
        std::fs::write(&path, bytes)
            .with_context(|| format!("write thumbnail '{}'", path.display()))?;
    }

    eprintln!("wrote {} thumbnails to {}", thumbs.len(), args.out_dir.display());
    Ok(())
}

fn cmd_poster(cfg: &Config, args: PosterArgs) -> anyhow::Result<()> {
    let scene = read_scene_json(&args.in_path)?;
    if let Some(path) = scene.video_path.as_deref()
        && !path.is_file()
    {
        anyhow::bail!("source not found: '{}'", path.display());
    }

    let source = Arc::new(FfmpegSource::new(cfg));
    let compositor = Compositor::new(cfg, source)?;
    let name = compositor.generate(&scene)?;

    println!("{name}");
    eprintln!("wrote {}", cfg.output_dir.join(&name).display());
    Ok(())
}

fn read_scene_json(path: &Path) -> anyhow::Result<PosterScene> {
    let f = File::open(path).with_context(|| format!("open scene '{}'", path.display()))?;
    let r = BufReader::new(f);
    let scene: PosterScene = serde_json::from_reader(r).with_context(|| "parse scene JSON")?;
    Ok(scene)
}
