#![recursion_limit = "256"]

use burn::backend::NdArray;
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::softmax;
use burn::tensor::{Distribution, ElementConversion};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use weightport::ModelConfig;
use weightport::cache::disk::DiskCacheConfig;
use weightport::cache::load_checkpoint;
use weightport::cache::weights::WeightSource;
use weightport::models::resnet::{PREFAB_RESNET_MAP, ResNet, load_pretrained, resnet_torchvision_importer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Pretrained model, as ``{prefab}.{weights}``.
    #[arg(long, default_value = "resnet18.tv_in1k")]
    pretrained: String,

    /// Override the weights location; a URL or a local path.
    ///
    /// The architecture is still taken from the ``--pretrained`` prefab.
    #[arg(long)]
    weights: Option<String>,

    /// Cache directory; defaults to ``~/.cache/weightport``.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// List the known pretrained names, and exit.
    #[arg(long, default_value = "false")]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.list {
        for name in PREFAB_RESNET_MAP.pretrained_names() {
            println!("{name}");
        }
        return Ok(());
    }

    type B = NdArray;
    let device = Default::default();
    let disk_cache = DiskCacheConfig::new().with_cache_dir(args.cache_dir.clone());

    let model: ResNet<B> = match &args.weights {
        None => load_pretrained::<B>(&args.pretrained, &disk_cache, &device)?,
        Some(location) => {
            let prefab_name = args
                .pretrained
                .split_once('.')
                .map_or(args.pretrained.as_str(), |(prefab, _)| prefab);
            let config = PREFAB_RESNET_MAP.lookup_prefab(prefab_name)?.new_config();

            let checkpoint = load_checkpoint(&WeightSource::parse(location), &disk_cache)?;
            config.import::<B>(&resnet_torchvision_importer(), checkpoint, &device)?
        }
    };

    classify_noise(&model, &device);
    Ok(())
}

/// Push a noise image through the model; report the top class.
fn classify_noise<B: Backend>(
    model: &ResNet<B>,
    device: &B::Device,
) {
    let input = Tensor::<B, 4>::random([1, 3, 224, 224], Distribution::Normal(0.0, 1.0), device);
    let probs = softmax(model.forward(input), 1);

    let class = probs.clone().argmax(1).into_scalar().elem::<i64>();
    let prob = probs.max().into_scalar().elem::<f32>();
    tracing::info!(class, prob, "classified noise");
    println!("top class: {class} (p={prob:.4})");
}
