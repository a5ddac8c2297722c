//! Shared model lifecycle tests

use bgremove_api::backends::{MockBackendFactory, MockBehavior};
use bgremove_api::processor::ImageProcessor;
use bgremove_api::BgRemovalError;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

fn png(width: u32, height: u32) -> Bytes {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])));
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png).unwrap();
    Bytes::from(cursor.into_inner())
}

#[tokio::test]
async fn test_model_loaded_once_under_concurrency() {
    let factory = Arc::new(
        MockBackendFactory::new(MockBehavior::Circle).with_delay(Duration::from_millis(100)),
    );
    let processor = Arc::new(ImageProcessor::new(factory.clone()));
    assert!(!processor.is_model_loaded());

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let processor = processor.clone();
            tokio::spawn(async move { processor.process(png(20 + i, 10 + i)).await })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let processed = task.await.unwrap().unwrap();
        assert_eq!((processed.width, processed.height), (20 + i as u32, 10 + i as u32));
    }

    assert_eq!(factory.calls(), 1);
    assert!(processor.is_model_loaded());
}

#[tokio::test]
async fn test_failed_load_is_retried() {
    let factory = Arc::new(MockBackendFactory::new(MockBehavior::Circle).failing_first(1));
    let processor = ImageProcessor::new(factory.clone());

    let err = processor.process(png(8, 8)).await.unwrap_err();
    assert!(matches!(err, BgRemovalError::Model(_)));
    assert!(!processor.is_model_loaded());

    let processed = processor.process(png(8, 8)).await.unwrap();
    assert_eq!((processed.width, processed.height), (8, 8));
    assert_eq!(factory.calls(), 2);
}

#[tokio::test]
async fn test_backend_is_shared() {
    let factory = Arc::new(MockBackendFactory::new(MockBehavior::Circle));
    let processor = ImageProcessor::new(factory.clone());

    let first = processor.backend().await.unwrap();
    let second = processor.backend().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.calls(), 1);
}

#[tokio::test]
async fn test_undecodable_input_skips_model_load() {
    let factory = Arc::new(MockBackendFactory::new(MockBehavior::Circle));
    let processor = ImageProcessor::new(factory.clone());

    let err = processor
        .process(Bytes::from_static(b"\x89PNG\r\n\x1a\ngarbage"))
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    assert_eq!(factory.calls(), 0);
}

#[tokio::test]
async fn test_flat_prediction_yields_transparent_cutout() {
    let factory = Arc::new(MockBackendFactory::new(MockBehavior::Flat));
    let processor = ImageProcessor::new(factory);

    let processed = processor.process(png(30, 20)).await.unwrap();
    let cutout = image::load_from_memory(&processed.png).unwrap().to_rgba8();

    assert_eq!(cutout.dimensions(), (30, 20));
    assert!(cutout.pixels().all(|p| p[3] == 0));
}
