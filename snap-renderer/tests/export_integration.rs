//! Integration tests for the export pipeline (snap-renderer).
//!
//! Tests output dimensions across scales and formats, scale downgrades,
//! cancellation, and the single-export guard.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use snap_core::{EditorDocument, ExportFormat, ExportScale, FrameKind, ImageRef, RenderSnapshot};
use snap_renderer::{
    create_export_canvas, CanvasPool, DeliveryAdapter, DeliveryError, DeliveryReceipt,
    DeliveryRoute, ExportAction, ExportArtifact, ExportError, ExportLimits, ExportOutcome,
    ExportPhase, ExportPipeline, ExportRequest, Platform, Renderer, SourceImage, Tier,
};
use tokio::sync::Notify;

/// Adapter that records what it was given.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(ExportScale, u32, u32)>>,
}

#[async_trait]
impl DeliveryAdapter for Recorder {
    async fn deliver(
        &self,
        _action: ExportAction,
        artifact: &ExportArtifact,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.seen
            .lock()
            .expect("lock")
            .push((artifact.scale, artifact.width, artifact.height));
        Ok(DeliveryReceipt {
            route: DeliveryRoute::NativeBridge,
            location: None,
        })
    }
}

/// Adapter whose user always dismisses the dialog.
struct Dismiss;

#[async_trait]
impl DeliveryAdapter for Dismiss {
    async fn deliver(
        &self,
        _action: ExportAction,
        _artifact: &ExportArtifact,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        Err(DeliveryError::Cancelled)
    }
}

/// Adapter that waits until released.
struct Gate(Arc<Notify>);

#[async_trait]
impl DeliveryAdapter for Gate {
    async fn deliver(
        &self,
        _action: ExportAction,
        _artifact: &ExportArtifact,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.0.notified().await;
        Ok(DeliveryReceipt {
            route: DeliveryRoute::Clipboard,
            location: None,
        })
    }
}

fn snapshot(width: u32, height: u32, padding: u32, frame: FrameKind) -> RenderSnapshot {
    let mut document = EditorDocument::new();
    document.image = Some(ImageRef::new(width, height));
    document.geometry.padding = padding;
    document.frame = frame;
    RenderSnapshot::from_document(document).expect("snapshot")
}

fn source(width: u32, height: u32) -> Arc<SourceImage> {
    let rgba = [40, 90, 200, 255].repeat((width * height) as usize);
    Arc::new(SourceImage::from_rgba(width, height, rgba).expect("source"))
}

fn request(action: ExportAction, format: ExportFormat, scale: ExportScale) -> ExportRequest {
    ExportRequest {
        action,
        format,
        scale,
        jpeg_quality: 92,
        tier: Tier::Pro,
    }
}

fn native(adapter: Arc<dyn DeliveryAdapter>) -> Platform {
    Platform {
        native_bridge: Some(adapter),
        ..Platform::default()
    }
}

// ==========================================================================
// Dimensions
// ==========================================================================

#[tokio::test]
async fn test_every_scale_and_format_has_exact_dimensions() {
    let recorder = Arc::new(Recorder::default());
    let pipeline = ExportPipeline::new(Renderer::new(), native(recorder.clone()));
    let snap = snapshot(30, 20, 5, FrameKind::None);

    for format in ExportFormat::ALL {
        for scale in ExportScale::ALL {
            let outcome = pipeline
                .export(&snap, source(30, 20), request(ExportAction::Download, format, scale))
                .await
                .expect("export");
            let ExportOutcome::Delivered(report) = outcome else {
                panic!("expected delivery");
            };
            let factor = u32::from(scale.get());
            assert_eq!((report.artifact.width, report.artifact.height), (40 * factor, 30 * factor));
            assert!(!report.downgraded());

            let decoded = image::load_from_memory(&report.artifact.bytes).expect("decode");
            assert_eq!((decoded.width(), decoded.height()), (40 * factor, 30 * factor));
        }
    }
    assert_eq!(recorder.seen.lock().expect("lock").len(), 12);
    assert_eq!(pipeline.phase(), ExportPhase::Success);
}

#[test]
fn test_browser_screenshot_at_2x() {
    let snap = snapshot(2000, 1500, 100, FrameKind::Browser);
    assert_eq!((snap.canvas().width, snap.canvas().height), (2200, 1740));

    let mut pool = CanvasPool::new();
    let surface = create_export_canvas(
        &Renderer::new(),
        &snap,
        &source(2000, 1500),
        ExportScale::X2,
        &mut pool,
        ExportLimits::default(),
    )
    .expect("render");
    assert_eq!((surface.width(), surface.height()), (4400, 3480));

    pool.release(surface);
    assert_eq!(pool.len(), 1);
    pool.clear();
    assert!(pool.is_empty());
}

#[tokio::test]
async fn test_pool_reuses_surfaces_between_exports() {
    let pipeline = ExportPipeline::new(Renderer::new(), native(Arc::new(Recorder::default())));
    let snap = snapshot(16, 16, 4, FrameKind::MacOs);
    for _ in 0..3 {
        pipeline
            .export(
                &snap,
                source(16, 16),
                request(ExportAction::Share, ExportFormat::Png, ExportScale::X2),
            )
            .await
            .expect("export");
    }
    let stats = pipeline.pool_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}

// ==========================================================================
// Fallbacks and failures
// ==========================================================================

#[tokio::test]
async fn test_downgrades_scale_when_surface_too_large() {
    let recorder = Arc::new(Recorder::default());
    let pipeline = ExportPipeline::new(Renderer::new(), native(recorder.clone()))
        .with_limits(ExportLimits { max_pixels: 5_000 });
    let snap = snapshot(10, 10, 5, FrameKind::None);

    let outcome = pipeline
        .export(
            &snap,
            source(10, 10),
            request(ExportAction::Download, ExportFormat::Png, ExportScale::X4),
        )
        .await
        .expect("export");
    let ExportOutcome::Delivered(report) = outcome else {
        panic!("expected delivery");
    };
    assert_eq!(report.artifact.scale, ExportScale::X3);
    assert_eq!(report.requested_scale, ExportScale::X4);
    assert!(report.downgraded());
    assert_eq!(
        recorder.seen.lock().expect("lock").as_slice(),
        &[(ExportScale::X3, 60, 60)]
    );
}

#[tokio::test]
async fn test_fails_after_1x() {
    let pipeline = ExportPipeline::new(Renderer::new(), native(Arc::new(Recorder::default())))
        .with_limits(ExportLimits { max_pixels: 10 });
    let err = pipeline
        .export(
            &snapshot(10, 10, 5, FrameKind::None),
            source(10, 10),
            request(ExportAction::Download, ExportFormat::Png, ExportScale::X2),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Render(_)));
    assert_eq!(pipeline.phase(), ExportPhase::Failed);
    assert!(!pipeline.is_busy());
}

#[tokio::test]
async fn test_cancel_does_not_retry_smaller_scale() {
    let pipeline = ExportPipeline::new(Renderer::new(), native(Arc::new(Dismiss)));
    let outcome = pipeline
        .export(
            &snapshot(10, 10, 5, FrameKind::None),
            source(10, 10),
            request(ExportAction::Share, ExportFormat::Png, ExportScale::X3),
        )
        .await
        .expect("cancel is not an error");
    assert!(matches!(outcome, ExportOutcome::Cancelled { scale: ExportScale::X3 }));
    assert_eq!(pipeline.phase(), ExportPhase::Idle);
}

#[tokio::test]
async fn test_unsupported_action_before_render() {
    let pipeline = ExportPipeline::new(Renderer::new(), Platform::default());
    let mut phases = pipeline.subscribe();
    let err = pipeline
        .export(
            &snapshot(10, 10, 5, FrameKind::None),
            source(10, 10),
            request(ExportAction::Copy, ExportFormat::Png, ExportScale::X1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Unsupported("Copy")));
    assert!(!phases.has_changed().expect("sender alive"));
    assert_eq!(pipeline.pool_stats().misses, 0);
}

#[tokio::test]
async fn test_free_tier_cannot_export_jpeg() {
    let pipeline = ExportPipeline::new(Renderer::new(), native(Arc::new(Recorder::default())));
    let mut req = request(ExportAction::Download, ExportFormat::Jpeg, ExportScale::X1);
    req.tier = Tier::Free;
    let err = pipeline
        .export(&snapshot(10, 10, 5, FrameKind::None), source(10, 10), req)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::FormatNotAllowed { .. }));
}

#[tokio::test]
async fn test_second_export_while_running_is_busy() {
    let gate = Arc::new(Notify::new());
    let platform = Platform {
        clipboard: Some(Arc::new(Gate(gate.clone()))),
        ..Platform::default()
    };
    let pipeline = Arc::new(ExportPipeline::new(Renderer::new(), platform));
    let snap = snapshot(10, 10, 5, FrameKind::None);
    let mut phases = pipeline.subscribe();

    let first = {
        let pipeline = Arc::clone(&pipeline);
        let snap = snap.clone();
        tokio::spawn(async move {
            pipeline
                .export(
                    &snap,
                    source(10, 10),
                    request(ExportAction::Copy, ExportFormat::Png, ExportScale::X1),
                )
                .await
        })
    };

    phases
        .wait_for(|phase| *phase == ExportPhase::Delivering)
        .await
        .expect("delivering");
    assert!(pipeline.is_busy());
    let err = pipeline
        .export(
            &snap,
            source(10, 10),
            request(ExportAction::Copy, ExportFormat::Png, ExportScale::X1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Busy));

    gate.notify_one();
    let outcome = first.await.expect("join").expect("first export");
    assert!(matches!(outcome, ExportOutcome::Delivered(_)));
    assert!(!pipeline.is_busy());
}

#[tokio::test]
async fn test_file_download_platform() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = ExportPipeline::new(Renderer::new(), Platform::downloads_only(dir.path()));
    assert!(pipeline.capabilities().download);

    let outcome = pipeline
        .export(
            &snapshot(12, 8, 2, FrameKind::Windows),
            source(12, 8),
            request(ExportAction::Download, ExportFormat::Webp, ExportScale::X1),
        )
        .await
        .expect("export");
    let ExportOutcome::Delivered(report) = outcome else {
        panic!("expected delivery");
    };
    let path = report.receipt.location.expect("path");
    assert!(path.ends_with("@1x.webp"));
    let bytes = std::fs::read(path).expect("read");
    assert_eq!(&bytes[0..4], b"RIFF");
}
