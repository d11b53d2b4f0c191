use burn::backend::NdArray;
use burn::config::Config;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use weightport::cache::disk::DiskCacheConfig;
use weightport::cache::load_checkpoint;
use weightport::cache::weights::WeightSource;
use weightport::import::TranslatedCheckpoint;
use weightport::models::resnet::{PREFAB_RESNET_MAP, resnet_torchvision_importer};
use weightport::{ImportConfig, ImportError, ModelConfig, WeightImporter};

/// List the tensors of a checkpoint, and dry-run an import recipe over it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Checkpoint URL or local path.
    location: String,

    /// A JSON ``ImportConfig`` to translate the keys with.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validate against a `ResNet` prefab (e.g. ``resnet50``).
    ///
    /// Without ``--config``, the `torchvision` recipe is used.
    #[arg(long)]
    resnet: Option<String>,

    /// Cache directory; defaults to ``~/.cache/weightport``.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let disk_cache = DiskCacheConfig::new().with_cache_dir(args.cache_dir.clone());
    let checkpoint = load_checkpoint(&WeightSource::parse(&args.location), &disk_cache)?;

    for (key, data) in checkpoint.iter() {
        println!("{key}\t{:?}\t{:?}", data.dtype, data.shape);
    }
    println!("{} tensors", checkpoint.len());

    let importer = match (&args.config, &args.resnet) {
        (Some(path), _) => WeightImporter::from_config(&ImportConfig::load(path)?)?,
        (None, Some(_)) => resnet_torchvision_importer(),
        (None, None) => return Ok(()),
    };

    let result = match &args.resnet {
        Some(name) => {
            let device = Default::default();
            let expected = PREFAB_RESNET_MAP
                .lookup_prefab(name)?
                .new_config()
                .structure::<NdArray>(&device);
            importer.check(checkpoint, &expected)
        }
        None => importer.translate(checkpoint),
    };

    match result {
        Ok(translated) => {
            print_translation(&translated);
            Ok(())
        }
        Err(ImportError::UnmappedKeys { keys }) => {
            for key in &keys {
                eprintln!("unmapped: {key}");
            }
            anyhow::bail!("{} keys matched no rule", keys.len())
        }
        Err(ImportError::StructuralMismatch(report)) => {
            eprintln!("{report}");
            anyhow::bail!("checkpoint does not fit the model")
        }
        Err(err) => Err(err.into()),
    }
}

fn print_translation(translated: &TranslatedCheckpoint) {
    println!();
    for (key, entry) in translated.iter() {
        match &entry.transform {
            Some(transform) => println!(
                "{} -> {key}\t{:?}\t{transform:?}",
                entry.source_key, entry.shape
            ),
            None => println!("{} -> {key}\t{:?}", entry.source_key, entry.shape),
        }
    }
}
