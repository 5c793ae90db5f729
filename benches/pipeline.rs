use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mjpeg_server::camera::{yuyv_to_rgb, RawFrame};
use mjpeg_server::encoder::JpegEncoder;
use mjpeg_server::multipart::MultipartFramer;

fn create_test_rgb(width: u32, height: u32) -> Vec<u8> {
    (0..width * height * 3).map(|i| (i % 251) as u8).collect()
}

fn benchmark_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_rgb");

    // Typical webcam resolutions
    for (width, height) in [(320u32, 240u32), (640, 480), (1280, 720)] {
        let data = create_test_rgb(width, height);
        let encoder = JpegEncoder::default();

        group.bench_with_input(
            BenchmarkId::new("resolution", format!("{}x{}", width, height)),
            &data,
            |b, data| {
                b.iter(|| {
                    let frame = RawFrame::new(data, width, height, 3, width as usize * 3);
                    encoder.encode(black_box(&frame))
                });
            },
        );
    }

    group.finish();
}

fn benchmark_yuyv_convert(c: &mut Criterion) {
    let (width, height) = (640u32, 480u32);
    let yuyv: Vec<u8> = (0..width * height * 2).map(|i| (i % 256) as u8).collect();
    let mut rgb = Vec::new();

    c.bench_function("yuyv_to_rgb_640x480", |b| {
        b.iter(|| yuyv_to_rgb(black_box(&yuyv), width, height, width as usize * 2, &mut rgb));
    });
}

fn benchmark_envelope(c: &mut Criterion) {
    let framer = MultipartFramer::default();
    let data = create_test_rgb(640, 480);
    let frame = RawFrame::new(&data, 640, 480, 3, 640 * 3);
    let image = JpegEncoder::default().encode(&frame).unwrap();

    c.bench_function("envelope_head", |b| {
        b.iter(|| framer.frame_envelope_head(black_box(&image)));
    });

    c.bench_function("envelope_full", |b| {
        b.iter(|| framer.envelope(black_box(&image)));
    });
}

criterion_group!(
    benches,
    benchmark_encode,
    benchmark_yuyv_convert,
    benchmark_envelope
);
criterion_main!(benches);
