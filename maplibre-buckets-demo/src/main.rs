use std::{fs, path::PathBuf};

use clap::Parser;
use maplibre_buckets::{
    bucket::{Bucket, TileBucket, UploadContext},
    coords::OverscaledTileId,
    error::BucketError,
    struct_array::StructArrayMember,
    style::{granularity::SubdivisionGranularitySetting, StyleLayer},
    vector_tile::decode_tile,
    worker::WorkerTile,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
enum DemoError {
    #[error("reading {path} failed")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing style failed")]
    Style(#[from] serde_json::Error),
    #[error("building buckets failed")]
    Build(#[from] BucketError),
}

/// Tessellates a vector tile with the layers of a style and prints what each bucket would
/// upload.
#[derive(Parser, Debug)]
#[command(name = "maplibre-buckets-demo", version)]
struct Args {
    /// Path to an uncompressed Mapbox Vector Tile
    tile: PathBuf,

    /// Path to a style JSON with a `layers` array
    style: PathBuf,

    #[arg(short, long, default_value_t = 14)]
    z: u8,

    #[arg(short, long, default_value_t = 0)]
    x: u32,

    #[arg(short, long, default_value_t = 0)]
    y: u32,

    /// Zoom level the tile is displayed at. Defaults to `z`.
    #[arg(long)]
    overscaled_z: Option<u8>,

    /// Subdivide geometry like it is done for the globe projection
    #[arg(long, default_value_t = false)]
    globe: bool,
}

#[derive(Deserialize)]
struct StyleDocument {
    layers: Vec<StyleLayer>,
}

/// Counts the bytes a bucket uploads.
#[derive(Default)]
struct ByteCounter {
    vertex_buffers: Vec<(usize, usize)>,
    index_buffers: Vec<usize>,
}

impl UploadContext for ByteCounter {
    fn create_vertex_buffer(&mut self, members: &'static [StructArrayMember], bytes: &[u8]) {
        self.vertex_buffers.push((members.len(), bytes.len()));
    }

    fn create_index_buffer(&mut self, bytes: &[u8]) {
        self.index_buffers.push(bytes.len());
    }
}

fn read(path: &PathBuf) -> Result<Vec<u8>, DemoError> {
    fs::read(path).map_err(|source| DemoError::Io {
        path: path.clone(),
        source,
    })
}

fn segment_count(bucket: &TileBucket) -> usize {
    match bucket {
        TileBucket::Circle(bucket) => bucket.segments.len(),
        TileBucket::Fill(bucket) => bucket.segments.len() + bucket.segments2.len(),
        TileBucket::FillExtrusion(bucket) => bucket.segments.len(),
        TileBucket::Line(bucket) => bucket.segments.len(),
    }
}

fn run(args: Args) -> Result<(), DemoError> {
    let tile = decode_tile(&read(&args.tile)?)?;
    let style: StyleDocument = serde_json::from_slice(&read(&args.style)?)?;

    let tile_id = OverscaledTileId::new(
        args.overscaled_z.unwrap_or(args.z).max(args.z),
        0,
        args.z,
        args.x,
        args.y,
    );
    let granularity = if args.globe {
        SubdivisionGranularitySetting::globe()
    } else {
        SubdivisionGranularitySetting::none()
    };

    let worker = WorkerTile::new(tile_id).with_subdivision_granularity(granularity);
    let mut built = worker.parse(&tile, &style.layers, &Default::default())?;

    let mut stats = Vec::new();
    for bucket in &mut built.buckets {
        let segments = segment_count(bucket);
        let mut counter = ByteCounter::default();
        bucket.upload(&mut counter);

        stats.push(json!({
            "layers": bucket.layer_ids(),
            "segments": segments,
            "vertex_buffers": counter.vertex_buffers,
            "index_buffers": counter.index_buffers,
        }));
    }

    log::info!("{} buckets built for {}", stats.len(), tile_id);
    println!(
        "{}",
        json!({
            "tile": tile_id.to_string(),
            "pattern_dependencies": built.pattern_dependencies,
            "buckets": stats,
        })
    );

    Ok(())
}

fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    if let Err(e) = run(Args::parse()) {
        log::error!("{e}");
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            log::error!("caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}
