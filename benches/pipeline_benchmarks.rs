use bgremove_api::{
    backends::{MockBackend, MockBackendFactory, MockBehavior},
    processor::ImageProcessor,
    InferenceBackend, ImagePreprocessor, SegmentationMask,
};
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tokio::runtime::Runtime;

const SIZES: &[(u32, u32)] = &[(320, 320), (1024, 768), (2048, 1536)];

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn bench_preprocessing(c: &mut Criterion) {
    let backend = MockBackend::new();
    let mut group = c.benchmark_group("preprocessing");

    for &(width, height) in SIZES {
        let image = gradient(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| {
                    ImagePreprocessor::preprocess_for_inference(
                        black_box(image),
                        backend.preprocessing_config(),
                    )
                    .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_mask(c: &mut Criterion) {
    let backend = MockBackend::new();
    let input = ImagePreprocessor::preprocess_for_inference(
        &gradient(320, 320),
        backend.preprocessing_config(),
    )
    .unwrap();
    let prediction = backend.infer(&input).unwrap();
    let mut group = c.benchmark_group("mask");

    for &(width, height) in SIZES {
        let source = gradient(width, height).to_rgba8();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &source,
            |b, source| {
                b.iter(|| {
                    let mask = SegmentationMask::from_prediction(black_box(&prediction))
                        .unwrap()
                        .resize(width, height);
                    mask.apply(source).unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_remove_background(c: &mut Criterion) {
    let backend = MockBackend::new();
    let mut group = c.benchmark_group("remove_background");
    group.sample_size(20);

    for &(width, height) in SIZES {
        let image = gradient(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| ImageProcessor::remove_background(&backend, black_box(image)).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_process_bytes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let processor = ImageProcessor::new(Arc::new(MockBackendFactory::new(MockBehavior::Circle)));

    let mut encoded = Cursor::new(Vec::new());
    gradient(1024, 768)
        .write_to(&mut encoded, ImageFormat::Png)
        .unwrap();
    let bytes = Bytes::from(encoded.into_inner());

    c.bench_function("process_png_1024x768", |b| {
        b.to_async(&rt)
            .iter(|| async { processor.process(black_box(bytes.clone())).await.unwrap() });
    });
}

criterion_group!(
    benches,
    bench_preprocessing,
    bench_mask,
    bench_remove_background,
    bench_process_bytes
);
criterion_main!(benches);
