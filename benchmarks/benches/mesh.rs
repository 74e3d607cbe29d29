use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use maplibre_buckets::{
    coords::EXTENT,
    geometry::{GeometryCoordinate, GeometryCoordinates},
    segment::SegmentVector,
    struct_array::{FillLayoutArray, LineIndexArray, TriangleIndexArray},
    tessellation::{
        classify_rings::classify_rings,
        fill_large_mesh_arrays::{fill_large_mesh_arrays, LineListMesh},
        subdivision::subdivide_fill,
        EARCUT_MAX_RINGS,
    },
};

fn ring(points: &[(i32, i32)]) -> GeometryCoordinates {
    points
        .iter()
        .map(|(x, y)| GeometryCoordinate::new(*x, *y))
        .collect()
}

/// A square covering the tile with a grid of square holes.
fn perforated_square(holes_per_axis: i32) -> Vec<GeometryCoordinates> {
    let mut rings = vec![ring(&[
        (0, 0),
        (EXTENT, 0),
        (EXTENT, EXTENT),
        (0, EXTENT),
        (0, 0),
    ])];

    let cell = EXTENT / (holes_per_axis + 1);
    let size = cell / 4;
    for i in 1..=holes_per_axis {
        for j in 1..=holes_per_axis {
            let (x, y) = (i * cell, j * cell);
            rings.push(ring(&[
                (x, y),
                (x, y + size),
                (x + size, y + size),
                (x + size, y),
                (x, y),
            ]));
        }
    }
    rings
}

fn fill(rings: &[GeometryCoordinates], granularity: u32) {
    let mut segments = SegmentVector::new();
    let mut segments2 = SegmentVector::new();
    let mut vertices = FillLayoutArray::new();
    let mut triangles = TriangleIndexArray::new();
    let mut lines = LineIndexArray::new();

    for polygon in classify_rings(rings, Some(EARCUT_MAX_RINGS)) {
        let polygon: Vec<GeometryCoordinates> =
            polygon.into_iter().map(|classified| classified.ring).collect();
        let subdivided = subdivide_fill(&polygon, granularity, true);

        fill_large_mesh_arrays(
            |array: &mut FillLayoutArray, x, y| {
                array.emplace_back(x as i16, y as i16);
            },
            &mut segments,
            &mut vertices,
            &mut triangles,
            &subdivided.vertices_flattened,
            &subdivided.indices_triangles,
            Some(LineListMesh {
                segments: &mut segments2,
                index_array: &mut lines,
                line_list: &subdivided.indices_line_list,
            }),
        );
    }
}

fn bench_fill(c: &mut Criterion) {
    let rings = perforated_square(8);

    let mut group = c.benchmark_group("fill");
    for granularity in [1, 16, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(granularity),
            &granularity,
            |b, granularity| b.iter(|| fill(&rings, *granularity)),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_fill);
criterion_main!(benches);
