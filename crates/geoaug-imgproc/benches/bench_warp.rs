use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

use geoaug_image::Image;
use geoaug_imgproc::{
    interpolation::InterpolationMode,
    warp::{get_rotation_shift_matrix2d, warp_affine, FillMode},
};

fn bench_warp_affine(c: &mut Criterion) {
    let mut group = c.benchmark_group("WarpAffine");
    let mut rng = rand::rng();

    for (width, height) in [(256, 224), (512, 448), (1024, 896)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{}x{}", width, height);

        let image_size = [*width, *height].into();
        let data = (0..width * height * 3).map(|_| rng.random::<f32>()).collect();
        let image = Image::<f32, 3>::new(image_size, data).unwrap();
        let output = Image::<f32, 3>::from_size_val(image_size, 0.0).unwrap();

        let center = (*width as f32 / 2.0, *height as f32 / 2.0);
        let m = get_rotation_shift_matrix2d(center, 30.0, 10.0, -5.0);

        for (name, mode) in [
            ("bilinear", InterpolationMode::Bilinear),
            ("nearest", InterpolationMode::Nearest),
        ] {
            group.bench_with_input(
                BenchmarkId::new(name, &parameter_string),
                &(&image, &output),
                |b, i| {
                    let (src, mut dst) = (i.0, i.1.clone());
                    b.iter(|| {
                        warp_affine(
                            black_box(src),
                            black_box(&mut dst),
                            &m,
                            mode,
                            FillMode::Constant(120.0),
                        )
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_warp_affine);
criterion_main!(benches);
