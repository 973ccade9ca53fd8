//! End-to-end editing flow: load, style, drag an overlay, snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use snap_core::{
    ApproximateMetrics, CanvasRect, DragController, DragState, EditorAction, EditorStore,
    FrameKind, HitTestCache, TextOverlay,
};

#[test]
fn test_drag_overlay_to_center_dispatches_once() {
    let mut store = EditorStore::new();
    let dispatched = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&dispatched);
    store.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store
        .dispatch(EditorAction::LoadImage {
            width: 800,
            height: 600,
        })
        .expect("load");
    store
        .dispatch(EditorAction::SetFrame(FrameKind::Browser))
        .expect("frame");
    let overlay = TextOverlay::new("Title").at(20.0, 20.0);
    let id = overlay.id;
    store
        .dispatch(EditorAction::AddTextOverlay(overlay))
        .expect("add");
    assert_eq!(dispatched.load(Ordering::SeqCst), 3);

    let canvas = store.document().canvas_size().expect("canvas");
    #[allow(clippy::cast_precision_loss)]
    let rect = CanvasRect {
        left: 10.0,
        top: 10.0,
        width: canvas.width as f32 / 2.0,
        height: canvas.height as f32 / 2.0,
    };
    let screen = |px: f32, py: f32| {
        (
            rect.left + px / 100.0 * rect.width,
            rect.top + py / 100.0 * rect.height,
        )
    };

    let mut cache = HitTestCache::new();
    assert!(cache.refresh(store.document(), &ApproximateMetrics));

    let mut drag = DragController::new();
    let (sx, sy) = screen(20.0, 20.0);
    assert!(drag.pointer_down(&cache, store.document(), &rect, sx, sy));

    // Many moves, one frame: only the last position matters.
    for step in 1..=10 {
        #[allow(clippy::cast_precision_loss)]
        let t = step as f32 / 10.0;
        let (mx, my) = screen(20.0 + 29.0 * t, 20.0 + 31.0 * t);
        drag.pointer_move(&cache, &rect, mx, my);
    }
    let preview = drag.on_frame().expect("preview");
    assert!(preview.guides.vertical && preview.guides.horizontal);
    assert_eq!(dispatched.load(Ordering::SeqCst), 3, "drag does not touch the store");

    let action = drag.pointer_up().expect("moved");
    assert_eq!(drag.state(), DragState::Idle);
    store.dispatch(action).expect("move");
    assert_eq!(dispatched.load(Ordering::SeqCst), 4);

    let moved = store.document().overlay(id).expect("overlay");
    assert!((moved.x() - 50.0).abs() < f32::EPSILON);
    assert!((moved.y() - 50.0).abs() < f32::EPSILON);

    // The overlay list changed, so the cache rebuilds; a second refresh is free.
    assert!(cache.refresh(store.document(), &ApproximateMetrics));
    assert!(!cache.refresh(store.document(), &ApproximateMetrics));

    let snapshot = store.snapshot().expect("snapshot");
    assert_eq!(snapshot.revision(), 4);
    assert_eq!(snapshot.canvas(), canvas);
}

#[test]
fn test_rejected_action_leaves_store_untouched() {
    let mut store = EditorStore::new();
    store
        .dispatch(EditorAction::LoadImage {
            width: 100,
            height: 100,
        })
        .expect("load");
    let before = store.document().clone();

    assert!(store.dispatch(EditorAction::ApplyCrop).is_err());
    assert!(store
        .dispatch(EditorAction::LoadImage {
            width: 0,
            height: 10
        })
        .is_err());

    assert_eq!(store.document(), &before);
    assert_eq!(store.revision(), 1);
}
