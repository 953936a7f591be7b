use argh::FromArgs;
use geoaug::{imgproc::warp::FillMode, AugmentConfig, AugmentRequest, Augmentor};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Augment a georeferenced image and its label with the same random transforms.
struct Args {
    /// path to the input image
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// path to the input label
    #[argh(option, short = 'l')]
    label_path: PathBuf,

    /// number of augmented pairs
    #[argh(option, short = 'n', default = "10")]
    count: usize,

    /// seed of the transforms, drawn from the clock if not set
    #[argh(option, short = 's')]
    seed: Option<u64>,

    /// directory to write the GeoTIFFs to
    #[argh(option, short = 'o')]
    output_dir: Option<PathBuf>,

    /// sub directory grouping the outputs
    #[argh(option, default = "String::from(geoaug::DEFAULT_DATASET_ID)")]
    dataset_id: String,

    /// maximum rotation in degrees
    #[argh(option, default = "0.0")]
    rotation: f32,

    /// maximum shift as a fraction of the image size
    #[argh(option, default = "0.0")]
    shift: f32,

    /// fill pixels moved in from outside with the border instead of a constant
    #[argh(switch)]
    fill_nearest: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Args = argh::from_env();

    let mut config = AugmentConfig::default()
        .with_rotation_range(args.rotation)
        .with_shift_range(args.shift, args.shift);
    if args.fill_nearest {
        config = config.with_fill_mode(FillMode::Nearest);
    }

    let augmentor = Augmentor::new(config)?;

    let mut request = AugmentRequest::new(args.image_path, args.label_path, args.count)
        .with_dataset_id(args.dataset_id);
    request.seed = args.seed;
    request.output_dir = args.output_dir;

    let output = augmentor.augment(&request)?;

    log::info!("replay with --seed {}", output.seed);
    println!(
        "Generated {} image/label pairs with seed {}",
        output.images.len(),
        output.seed
    );

    Ok(())
}
