//! Run both parent photos through the page pipeline and write the face crops
//! and feature overlays next to them.
//!
//! Usage:
//!   cargo run --example preview_features -- --mom mom.jpg --dad dad.jpg --assets public

use std::path::{Path, PathBuf};
use std::time::Duration;

use babyvision::{
    FsAssetSource, GenerationState, LibraryLoader, PageConfig, Parent, Session,
    SimulatedGenerator, TokioTimer,
};
use clap::Parser;

#[derive(Parser)]
#[command(about = "Preview face crops and facial feature overlays")]
struct Args {
    /// Mom's photo.
    #[arg(long)]
    mom: PathBuf,

    /// Dad's photo.
    #[arg(long)]
    dad: PathBuf,

    /// Directory the classifier path is resolved against.
    #[arg(long, default_value = "public")]
    assets: PathBuf,

    /// Page configuration as a JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the previews. Defaults to each photo's directory.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also run the simulated generation step.
    #[arg(long)]
    generate: bool,
}

fn output_path(args: &Args, photo: &Path, parent: Parent, suffix: &str) -> PathBuf {
    let dir = match &args.out {
        Some(dir) => dir.clone(),
        None => photo.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    dir.join(format!("{parent}_{suffix}.png"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PageConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => PageConfig::default(),
    };

    let loader = LibraryLoader::builtin();
    let assets = FsAssetSource::new(&args.assets);
    let mut session = Session::boot(config, &loader, &assets).await;
    if let Some(banner) = session.error() {
        println!("banner: {banner}");
    }

    for (parent, photo) in [(Parent::Mom, &args.mom), (Parent::Dad, &args.dad)] {
        let bytes = std::fs::read(photo)?;
        let stage = session.upload(parent, &bytes);
        println!("=== {parent} ({}) -> {} ===", photo.display(), stage.as_str());

        let slot = session.slot(parent);
        if let Some(face) = &slot.face {
            println!(
                "  {:?} face at ({}, {}) {}x{}",
                face.source, face.region.x, face.region.y, face.region.width, face.region.height
            );
            let path = output_path(&args, photo, parent, "face");
            std::fs::write(&path, &face.encoded.data)?;
            println!("  wrote {}", path.display());
        }
        if let Some(features) = &slot.features {
            println!("  features: {}", serde_json::to_string(features)?);
        }
        if let Some(visualization) = &slot.visualization {
            let path = output_path(&args, photo, parent, "features");
            std::fs::write(&path, &visualization.data)?;
            println!("  wrote {}", path.display());
        }
        if let Some(banner) = session.error() {
            println!("  banner: {banner}");
            session.dismiss_error();
        }
    }

    if args.generate {
        let delay = Duration::from_millis(session.config().generation_delay_ms);
        let generator = SimulatedGenerator::new(TokioTimer, delay);
        session.generate(&generator).await?;
        if let GenerationState::Done { message: Some(message), .. } = session.generation() {
            println!("{message}");
        }
    }

    Ok(())
}
