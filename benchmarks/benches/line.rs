use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use maplibre_buckets::{
    bucket::{Bucket, BucketParameters, IndexedFeature, LineBucket, PopulateParameters},
    coords::{CanonicalTileId, EXTENT},
    geometry::{FeatureType, GeometryCoordinate, GeometryCoordinates, VectorTileFeature},
    style::{LayerProperties, LineJoin, LineLayout, LinePaint, PropertyValue, StyleLayer},
};

/// A zig zag line across the tile with `vertices` vertices.
fn zig_zag(vertices: i32) -> IndexedFeature {
    let step = EXTENT / vertices;
    let line: GeometryCoordinates = (0..vertices)
        .map(|i| GeometryCoordinate::new(i * step, if i % 2 == 0 { 100 } else { 400 }))
        .collect();

    IndexedFeature::new(
        VectorTileFeature::new(FeatureType::LineString, vec![line]),
        0,
    )
}

fn layer(join: LineJoin) -> StyleLayer {
    StyleLayer::new(
        "road",
        "transportation",
        LayerProperties::Line {
            layout: LineLayout {
                line_join: PropertyValue::Constant(join),
                ..LineLayout::default()
            },
            paint: LinePaint::default(),
        },
    )
}

fn bench_line_joins(c: &mut Criterion) {
    let features = [zig_zag(2000)];
    let canonical = CanonicalTileId::new(14, 8800, 5373);

    let mut group = c.benchmark_group("line");
    for (name, join) in [
        ("miter", LineJoin::Miter),
        ("bevel", LineJoin::Bevel),
        ("round", LineJoin::Round),
    ] {
        let parameters = BucketParameters::new(vec![layer(join)], 14);
        group.bench_with_input(BenchmarkId::from_parameter(name), &parameters, |b, parameters| {
            b.iter(|| {
                let mut bucket = LineBucket::new(parameters);
                bucket
                    .populate(&features, &mut PopulateParameters::default(), &canonical)
                    .expect("line features are supported");
                bucket
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_line_joins);
criterion_main!(benches);
