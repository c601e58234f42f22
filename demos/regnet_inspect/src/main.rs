use anyhow::bail;
use bimm_regnet::models::regnet::{
    PREFAB_REGNETX_MAP, PREFAB_REGNETY_MAP, RegNetBackbone, RegNetBackboneConfig, RegNetStageMeta,
};
use burn::backend::NdArray;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use burn::tensor::Distribution;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

// $ cargo run -p regnet_inspect -- --preset=regnety008 --layers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Preset name, e.g. `regnetx002` or `regnety320`.
    #[arg(short, long, default_value = "regnetx002")]
    preset: String,

    /// Load the backbone config from a JSON file instead of a preset.
    #[arg(long)]
    config: Option<String>,

    /// List the known presets and exit.
    #[arg(long, default_value_t = false)]
    list: bool,

    /// Input height.
    #[arg(long, default_value_t = 224)]
    height: usize,

    /// Input width.
    #[arg(long, default_value_t = 224)]
    width: usize,

    /// Disable the input rescaling unit.
    #[arg(long, default_value_t = false)]
    no_rescaling: bool,

    /// Override the model name.
    #[arg(long)]
    model_name: Option<String>,

    /// Print every registered layer name.
    #[arg(long, default_value_t = false)]
    layers: bool,

    /// Run a forward pass on a random batch of this size.
    #[arg(long)]
    forward_batch: Option<usize>,

    /// Save the backbone config as JSON.
    #[arg(long)]
    save_config: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer())
        .init();

    let args = Args::parse();
    type B = NdArray;

    let device = Default::default();
    backend_main::<B>(&args, &device)
}

/// Print the known presets.
fn list_presets() {
    for table in [&PREFAB_REGNETX_MAP, &PREFAB_REGNETY_MAP] {
        println!("{}: {}", table.name, table.description);
        for item in table.items {
            let config = item.new_config();
            println!(
                "  {:<12} {:<14} depths={:?} widths={:?} group_width={}",
                item.name, item.description, config.depths, config.widths, config.group_width,
            );
        }
    }
}

/// Resolve the backbone config from the arguments.
fn load_config(args: &Args) -> anyhow::Result<RegNetBackboneConfig> {
    let mut config = match &args.config {
        Some(path) => RegNetBackboneConfig::load(path)?,
        None => RegNetBackboneConfig::from_preset(&args.preset)?,
    };

    if args.no_rescaling {
        config = config.with_include_rescaling(false);
    }
    if let Some(name) = &args.model_name {
        config = config.with_model_name(name.clone());
    }
    if args.height == 0 || args.width == 0 {
        bail!("input resolution must be non-zero: {}x{}", args.height, args.width);
    }
    config = config.with_input_shape([Some(args.height), Some(args.width), Some(3)]);

    Ok(config)
}

/// Build the selected backbone and report on it.
pub fn backend_main<B: Backend>(
    args: &Args,
    device: &B::Device,
) -> anyhow::Result<()> {
    if args.list {
        list_presets();
        return Ok(());
    }

    let config = load_config(args)?;
    tracing::info!(
        model = %config.model_name,
        block_type = %config.block_type,
        "building backbone",
    );

    if let Some(path) = &args.save_config {
        config.save(path)?;
        tracing::info!(path = %path, "saved config");
    }

    let model: RegNetBackbone<B> = config.clone().try_init(device)?;

    let resolution = [args.height, args.width];
    let [out_height, out_width] = model.output_resolution(resolution);

    println!("model:        {}", config.model_name);
    println!("block type:   {}", config.block_type);
    println!("depths:       {:?}", config.depths);
    println!("widths:       {:?}", config.widths);
    println!("group width:  {}", config.group_width);
    println!("rescaling:    {}", model.rescaling.is_some());
    println!("parameters:   {}", model.num_params());
    println!("layers:       {}", model.layer_names().len());
    println!(
        "output:       [{}, {out_height}, {out_width}] for [3, {}, {}]",
        model.out_channels(),
        args.height,
        args.width,
    );

    let mut res = model.stem.output_resolution(resolution);
    println!("stem:         [{}, {}, {}]", model.stem.out_channels(), res[0], res[1]);
    for stage in &model.stages {
        res = stage.output_resolution(res);
        println!(
            "  {:<20} depth={:<3} [{}, {}, {}]",
            stage.name(),
            stage.len(),
            stage.filters_out(),
            res[0],
            res[1],
        );
    }

    if args.layers {
        for name in model.layer_names() {
            println!("{name}");
        }
    }

    if let Some(batch) = args.forward_batch {
        let input: Tensor<B, 4> = Tensor::random(
            [batch, 3, args.height, args.width],
            Distribution::Uniform(0.0, 255.0),
            device,
        );
        let output = model.forward(input);
        println!("forward:      {:?}", output.dims());
    }

    Ok(())
}
