use criterion::{black_box, criterion_group, criterion_main, Criterion};
use monocal_core::{
    build_undistort_map, camera_matrix, remap_gray, Distortion, DistortionKind, GrayImage,
    ImageSize,
};

fn checker(width: usize, height: usize) -> GrayImage {
    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            img.data[y * width + x] = if ((x / 32) + (y / 32)) % 2 == 0 { 230 } else { 25 };
        }
    }
    img
}

fn bench_undistort(c: &mut Criterion) {
    let size = ImageSize::new(640, 480);
    let k = camera_matrix(520.0, 518.0, 320.0, 240.0);
    let d = Distortion {
        k1: -0.28,
        k2: 0.07,
        p1: 0.0008,
        p2: -0.0004,
        ..Distortion::zero(DistortionKind::RadialTangential)
    };

    c.bench_function("build_undistort_map_640x480", |b| {
        b.iter(|| build_undistort_map(black_box(&k), black_box(&d), size))
    });

    let map = build_undistort_map(&k, &d, size);
    let img = checker(640, 480);
    c.bench_function("remap_gray_640x480", |b| {
        b.iter(|| remap_gray(black_box(&img.view()), black_box(&map)))
    });
}

criterion_group!(benches, bench_undistort);
criterion_main!(benches);
