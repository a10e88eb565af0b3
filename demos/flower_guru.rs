use argh::FromArgs;
use flower_guru::{
    ColorHistogramModel, DEFAULT_ENDPOINT, DEFAULT_THUMBNAIL_SIZE, EnrichmentClient,
    EnrichmentConfig, FileImageSource, HttpThumbnailLoader, PipelineConfig, PipelineController,
    SourceKind,
};
use std::{path::PathBuf, str::FromStr, time::Duration};

// defaults for the demo
const DEFAULT_MODEL: &str = "assets/flowers.json";

#[derive(Clone, Copy)]
struct Source(SourceKind);

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "camera" => Ok(Source(SourceKind::Camera)),
            "library" => Ok(Source(SourceKind::PhotoLibrary)),
            "album" => Ok(Source(SourceKind::SavedPhotosAlbum)),
            other => Err(format!("unknown source {other:?}, expected camera, library or album")),
        }
    }
}

#[derive(FromArgs)]
/// Recognise flowers in photos and look them up in the encyclopedia.
struct FlowerGuruArgs {
    /// the model asset to load
    #[argh(option, short = 'm', default = "PathBuf::from(DEFAULT_MODEL)")]
    model: PathBuf,

    /// the encyclopedia action API endpoint
    #[argh(option, short = 'e', default = "DEFAULT_ENDPOINT.to_string()")]
    endpoint: String,

    /// thumbnail width in pixels, 0 to skip thumbnails
    #[argh(option, short = 't', default = "DEFAULT_THUMBNAIL_SIZE")]
    thumbnail_size: u32,

    /// request timeout in seconds, transport default when omitted
    #[argh(option)]
    timeout: Option<u64>,

    /// where photos come from: camera, library or album
    #[argh(option, short = 's', default = "Source(SourceKind::PhotoLibrary)")]
    source: Source,

    /// the photos to pick, in order; later picks supersede earlier ones
    #[argh(positional)]
    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: FlowerGuruArgs = argh::from_env();

    // a missing or corrupt model stops here
    let model = ColorHistogramModel::load(&args.model)?;
    log::info!("Model {} ready with {} labels", model.name(), model.labels().len());

    let enricher = EnrichmentClient::new(EnrichmentConfig {
        endpoint: args.endpoint,
        thumbnail_size: (args.thumbnail_size > 0).then_some(args.thumbnail_size),
        timeout: args.timeout.map(Duration::from_secs),
        ..EnrichmentConfig::default()
    })?;
    let loader = HttpThumbnailLoader::new(reqwest::Client::new());

    let mut controller =
        PipelineController::new(model, enricher, loader.clone(), PipelineConfig::default());
    let mut source = FileImageSource::new(args.images);

    while source.remaining() > 0 {
        match controller.pick_and_submit(&mut source, args.source.0) {
            Ok(Some(id)) => log::info!("Picked image #{id}"),
            Ok(None) => break,
            Err(e) => log::warn!("Skipping photo: {e}"),
        }
    }

    controller.settle().await;

    let display = controller.display();
    println!("{}", display.title.as_deref().unwrap_or("(no match)"));
    if !display.summary.is_empty() {
        println!();
        println!("{}", display.summary);
    }
    if let Some(url) = &display.thumbnail_url {
        // give the loader a moment to finish
        tokio::time::sleep(Duration::from_secs(2)).await;
        match loader.get(url) {
            Some(image) => println!("\nThumbnail: {url} ({}x{})", image.width(), image.height()),
            None => println!("\nThumbnail: {url}"),
        }
    }

    Ok(())
}
