//! # maplibre-buckets
//!
//! Turns decoded vector tile features into packed vertex and index buffers which can be handed
//! to a GPU upload stage.
//!
//! Every style layer family gets its own bucket ([`bucket::CircleBucket`],
//! [`bucket::FillBucket`], [`bucket::FillExtrusionBucket`] and [`bucket::LineBucket`]). Buckets
//! write into [`struct_array`] buffers and split their draw calls into [`segment::Segment`]s so
//! that no draw call addresses more vertices than a 16-bit index can reach.
//!
//! ### Example
//!
//! ```no_run
//! use maplibre_buckets::{
//!     bucket::Bucket,
//!     coords::OverscaledTileId,
//!     style::StyleLayer,
//!     vector_tile::decode_tile,
//!     worker::WorkerTile,
//! };
//!
//! # fn run(data: &[u8], layers: Vec<StyleLayer>) -> Result<(), Box<dyn std::error::Error>> {
//! let tile = decode_tile(data)?;
//! let worker = WorkerTile::new(OverscaledTileId::new(14, 0, 14, 8800, 5373));
//! let built = worker.parse(&tile, &layers, &Default::default())?;
//! for bucket in &built.buckets {
//!     println!("{:?} is empty: {}", bucket.layer_ids(), bucket.is_empty());
//! }
//! # Ok(())
//! # }
//! ```

pub mod bucket;
pub mod coords;
pub mod error;
pub mod geometry;
pub mod segment;
pub mod struct_array;
pub mod style;
pub mod tessellation;
pub mod vector_tile;
pub mod worker;

pub(crate) mod util;
