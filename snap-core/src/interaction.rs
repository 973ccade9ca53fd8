//! Pointer interaction with text overlays: hit-testing and drag-to-reposition.
//!
//! ## Drag lifecycle
//!
//! ```text
//!   Idle ──hover──▶ Hovering ──press──▶ Dragging ──release──▶ Idle
//!    ▲                 │                    │
//!    └────leave────────┘                    └─ one MoveTextOverlay action
//! ```
//!
//! While dragging, pointer moves only touch a transient [`DragPreview`],
//! flushed at most once per frame through a [`FrameScheduler`]. The store
//! sees a single action when the drag ends.

use crate::document::{CanvasSize, EditorDocument, Rect};
use crate::overlay::{clamp_percent, FontSpec, OverlayId};
use crate::schedule::FrameScheduler;
use crate::store::EditorAction;

/// Distance from the center line, in percentage points, that snaps to it.
pub const CENTER_SNAP_THRESHOLD: f32 = 3.0;

/// Measures text in canvas pixels at 1x.
pub trait TextMeasurer {
    /// Width and height of `text` set in `font`.
    fn measure(&self, text: &str, font: &FontSpec) -> (f32, f32);
}

/// Average-advance estimate, good enough for hit boxes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateMetrics;

impl TextMeasurer for ApproximateMetrics {
    #[allow(clippy::cast_precision_loss)]
    fn measure(&self, text: &str, font: &FontSpec) -> (f32, f32) {
        let bold = if font.weight >= 600 { 1.05 } else { 1.0 };
        let longest = text
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        let lines = text.lines().count().max(1);
        (
            longest as f32 * font.size * 0.6 * bold,
            lines as f32 * font.size * 1.2,
        )
    }
}

/// Where the canvas is drawn on screen, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasRect {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Displayed width.
    pub width: f32,
    /// Displayed height.
    pub height: f32,
}

impl CanvasRect {
    /// Convert a screen point to clamped canvas percentages.
    ///
    /// Points outside the rect clamp to the nearest edge.
    #[must_use]
    pub fn to_percent(&self, screen_x: f32, screen_y: f32) -> (f32, f32) {
        let pct = |offset: f32, extent: f32| {
            if extent > 0.0 {
                clamp_percent(offset / extent * 100.0)
            } else {
                0.0
            }
        };
        (
            pct(screen_x - self.left, self.width),
            pct(screen_y - self.top, self.height),
        )
    }
}

/// Which center guides are active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapGuides {
    /// Snapped to the vertical center line (x = 50).
    pub vertical: bool,
    /// Snapped to the horizontal center line (y = 50).
    pub horizontal: bool,
}

/// Snap each axis to 50 when within [`CENTER_SNAP_THRESHOLD`].
#[must_use]
pub fn apply_center_snap(x: f32, y: f32) -> (f32, f32, SnapGuides) {
    let snap = |v: f32| {
        if (v - 50.0).abs() <= CENTER_SNAP_THRESHOLD {
            (50.0, true)
        } else {
            (v, false)
        }
    };
    let (x, vertical) = snap(x);
    let (y, horizontal) = snap(y);
    (
        x,
        y,
        SnapGuides {
            vertical,
            horizontal,
        },
    )
}

/// Overlay bounding boxes in percent space, rebuilt only when overlays or
/// canvas dimensions change.
#[derive(Debug, Clone, Default)]
pub struct HitTestCache {
    key: Option<(u64, CanvasSize)>,
    boxes: Vec<(OverlayId, Rect)>,
    rebuilds: u64,
}

impl HitTestCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the cache in line with `doc`. Returns `true` if it rebuilt.
    pub fn refresh<M: TextMeasurer>(&mut self, doc: &EditorDocument, measurer: &M) -> bool {
        let Some(canvas) = doc.canvas_size() else {
            let had_boxes = !self.boxes.is_empty();
            self.key = None;
            self.boxes.clear();
            return had_boxes;
        };
        let key = (doc.overlay_revision(), canvas);
        if self.key == Some(key) {
            return false;
        }

        #[allow(clippy::cast_precision_loss)]
        let (cw, ch) = (canvas.width.max(1) as f32, canvas.height.max(1) as f32);
        self.boxes = doc
            .overlays
            .iter()
            .map(|overlay| {
                let (w, h) = measurer.measure(&overlay.text, &overlay.font);
                let (w_pct, h_pct) = (w / cw * 100.0, h / ch * 100.0);
                (
                    overlay.id,
                    Rect::new(
                        overlay.x() - w_pct / 2.0,
                        overlay.y() - h_pct / 2.0,
                        w_pct,
                        h_pct,
                    ),
                )
            })
            .collect();
        self.key = Some(key);
        self.rebuilds += 1;
        tracing::trace!(boxes = self.boxes.len(), "Rebuilt overlay hit boxes");
        true
    }

    /// Topmost overlay under a percent-space point.
    #[must_use]
    pub fn hit(&self, x: f32, y: f32) -> Option<OverlayId> {
        self.boxes
            .iter()
            .rev()
            .find(|(_, rect)| rect.contains(x, y))
            .map(|(id, _)| *id)
    }

    /// Cached box for an overlay.
    #[must_use]
    pub fn bounds(&self, id: OverlayId) -> Option<Rect> {
        self.boxes.iter().find(|(oid, _)| *oid == id).map(|(_, r)| *r)
    }

    /// Number of rebuilds so far.
    #[must_use]
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

/// Interaction state for one pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    /// Pointer is not over any overlay.
    Idle,
    /// Pointer is over an overlay.
    Hovering(OverlayId),
    /// An overlay is being dragged.
    Dragging {
        /// The dragged overlay.
        id: OverlayId,
        /// Pointer minus overlay center at press time, in percent.
        grab_offset: (f32, f32),
        /// Overlay position at press time.
        origin: (f32, f32),
    },
}

/// Visual-only position of the dragged overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragPreview {
    /// The dragged overlay.
    pub id: OverlayId,
    /// Horizontal center in percent.
    pub x: f32,
    /// Vertical center in percent.
    pub y: f32,
    /// Center guides to show.
    pub guides: SnapGuides,
}

/// Drives drag-to-reposition for text overlays.
#[derive(Debug, Clone)]
pub struct DragController {
    state: DragState,
    scheduler: FrameScheduler<(f32, f32)>,
    preview: Option<DragPreview>,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    /// Create an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
            scheduler: FrameScheduler::new(),
            preview: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DragState {
        self.state
    }

    /// Current drag preview, if dragging.
    #[must_use]
    pub fn preview(&self) -> Option<DragPreview> {
        self.preview
    }

    /// Cursor hint for the host.
    #[must_use]
    pub fn cursor(&self) -> &'static str {
        match self.state {
            DragState::Idle => "default",
            DragState::Hovering(_) => "grab",
            DragState::Dragging { .. } => "grabbing",
        }
    }

    /// Handle a pointer press. Returns `true` if a drag started.
    pub fn pointer_down(
        &mut self,
        cache: &HitTestCache,
        doc: &EditorDocument,
        rect: &CanvasRect,
        screen_x: f32,
        screen_y: f32,
    ) -> bool {
        let (px, py) = rect.to_percent(screen_x, screen_y);
        let Some(overlay) = cache.hit(px, py).and_then(|id| doc.overlay(id)) else {
            self.state = DragState::Idle;
            return false;
        };

        let origin = (overlay.x(), overlay.y());
        self.state = DragState::Dragging {
            id: overlay.id,
            grab_offset: (px - origin.0, py - origin.1),
            origin,
        };
        self.preview = Some(DragPreview {
            id: overlay.id,
            x: origin.0,
            y: origin.1,
            guides: SnapGuides::default(),
        });
        self.scheduler.cancel();
        tracing::debug!(overlay = %overlay.id, "Drag started");
        true
    }

    /// Handle a pointer move.
    ///
    /// Returns `true` if the host should request an animation frame and call
    /// [`DragController::on_frame`].
    pub fn pointer_move(
        &mut self,
        cache: &HitTestCache,
        rect: &CanvasRect,
        screen_x: f32,
        screen_y: f32,
    ) -> bool {
        let (px, py) = rect.to_percent(screen_x, screen_y);
        match self.state {
            DragState::Dragging { .. } => self.scheduler.schedule((px, py)),
            DragState::Idle | DragState::Hovering(_) => {
                self.state = cache
                    .hit(px, py)
                    .map_or(DragState::Idle, DragState::Hovering);
                false
            }
        }
    }

    /// Apply the latest pending pointer position to the preview.
    pub fn on_frame(&mut self) -> Option<DragPreview> {
        let DragState::Dragging { id, grab_offset, .. } = self.state else {
            self.scheduler.cancel();
            return None;
        };
        let (px, py) = self.scheduler.take()?;
        let (x, y, guides) = apply_center_snap(
            clamp_percent(px - grab_offset.0),
            clamp_percent(py - grab_offset.1),
        );
        let preview = DragPreview { id, x, y, guides };
        self.preview = Some(preview);
        Some(preview)
    }

    /// Handle a pointer release.
    ///
    /// Returns the single action to dispatch if the overlay moved.
    pub fn pointer_up(&mut self) -> Option<EditorAction> {
        let DragState::Dragging { id, origin, .. } = self.state else {
            return None;
        };
        self.on_frame();
        let preview = self.preview.take();
        self.state = DragState::Idle;

        let preview = preview?;
        if (preview.x, preview.y) == origin {
            return None;
        }
        tracing::debug!(overlay = %id, x = preview.x, y = preview.y, "Drag finished");
        Some(EditorAction::MoveTextOverlay {
            id,
            x: preview.x,
            y: preview.y,
        })
    }

    /// Abort the drag; the overlay stays where it was.
    pub fn cancel(&mut self) {
        self.scheduler.cancel();
        self.preview = None;
        self.state = DragState::Idle;
    }

    /// Pointer coalescing statistics.
    #[must_use]
    pub fn coalesced_moves(&self) -> u64 {
        self.scheduler.coalesced()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::document::ImageRef;
    use crate::overlay::TextOverlay;
    use crate::store::EditorStore;

    const RECT: CanvasRect = CanvasRect {
        left: 100.0,
        top: 50.0,
        width: 1000.0,
        height: 500.0,
    };

    fn setup() -> (EditorStore, OverlayId) {
        let mut doc = EditorDocument::new();
        doc.image = Some(ImageRef::new(800, 400));
        doc.geometry.padding = 100;
        let mut store = EditorStore::with_document(doc);
        let overlay = TextOverlay::new("Drag me").at(20.0, 20.0);
        let id = overlay.id;
        store
            .dispatch(EditorAction::AddTextOverlay(overlay))
            .expect("add overlay");
        (store, id)
    }

    fn screen(x_pct: f32, y_pct: f32) -> (f32, f32) {
        (
            RECT.left + RECT.width * x_pct / 100.0,
            RECT.top + RECT.height * y_pct / 100.0,
        )
    }

    #[test]
    fn test_cache_rebuilds_only_on_relevant_change() {
        let (mut store, id) = setup();
        let mut cache = HitTestCache::new();
        assert!(cache.refresh(store.document(), &ApproximateMetrics));
        assert!(!cache.refresh(store.document(), &ApproximateMetrics));

        store
            .dispatch(EditorAction::SetShadow(crate::document::Shadow::default()))
            .expect("shadow");
        assert!(!cache.refresh(store.document(), &ApproximateMetrics));

        store.dispatch(EditorAction::SetPadding(10)).expect("pad");
        assert!(cache.refresh(store.document(), &ApproximateMetrics));

        store
            .dispatch(EditorAction::MoveTextOverlay { id, x: 70.0, y: 70.0 })
            .expect("move");
        assert!(cache.refresh(store.document(), &ApproximateMetrics));
        assert_eq!(cache.rebuilds(), 3);
    }

    #[test]
    fn test_hover_then_drag_commits_once() {
        let (mut store, id) = setup();
        let mut cache = HitTestCache::new();
        cache.refresh(store.document(), &ApproximateMetrics);
        let mut drag = DragController::new();

        let (sx, sy) = screen(20.0, 20.0);
        drag.pointer_move(&cache, &RECT, sx, sy);
        assert_eq!(drag.state(), DragState::Hovering(id));
        assert_eq!(drag.cursor(), "grab");

        assert!(drag.pointer_down(&cache, store.document(), &RECT, sx, sy));

        let mut frames_requested = 0;
        for step in 1..=10 {
            #[allow(clippy::cast_precision_loss)]
            let (mx, my) = screen(20.0 + step as f32, 20.0 + step as f32);
            if drag.pointer_move(&cache, &RECT, mx, my) {
                frames_requested += 1;
            }
        }
        assert_eq!(frames_requested, 1);
        assert_eq!(drag.coalesced_moves(), 9);

        let preview = drag.on_frame().expect("preview");
        assert!((preview.x - 30.0).abs() < 1e-3);
        assert!((store.document().overlay(id).expect("overlay").x() - 20.0).abs() < f32::EPSILON);

        let revision = store.revision();
        let action = drag.pointer_up().expect("moved");
        store.dispatch(action).expect("commit");
        assert_eq!(store.revision(), revision + 1);
        assert!((store.document().overlay(id).expect("overlay").x() - 30.0).abs() < 1e-3);
        assert_eq!(drag.state(), DragState::Idle);
    }

    #[test]
    fn test_release_without_movement_dispatches_nothing() {
        let (store, _) = setup();
        let mut cache = HitTestCache::new();
        cache.refresh(store.document(), &ApproximateMetrics);
        let mut drag = DragController::new();

        let (sx, sy) = screen(20.0, 20.0);
        assert!(drag.pointer_down(&cache, store.document(), &RECT, sx, sy));
        assert!(drag.pointer_up().is_none());
    }

    #[test]
    fn test_center_snap() {
        let (x, y, guides) = apply_center_snap(52.5, 40.0);
        assert!((x - 50.0).abs() < f32::EPSILON);
        assert!((y - 40.0).abs() < f32::EPSILON);
        assert!(guides.vertical && !guides.horizontal);

        let (_, y, guides) = apply_center_snap(10.0, 46.9);
        assert!((y - 46.9).abs() < f32::EPSILON);
        assert!(!guides.horizontal);
    }

    #[test]
    fn test_pointer_outside_rect_clamps_to_edge() {
        assert_eq!(RECT.to_percent(-500.0, 10_000.0), (0.0, 100.0));
        assert_eq!(RECT.to_percent(5000.0, -3.0), (100.0, 0.0));
    }

    #[test]
    fn test_cancel_restores_idle() {
        let (store, _) = setup();
        let mut cache = HitTestCache::new();
        cache.refresh(store.document(), &ApproximateMetrics);
        let mut drag = DragController::new();
        let (sx, sy) = screen(20.0, 20.0);
        drag.pointer_down(&cache, store.document(), &RECT, sx, sy);
        drag.pointer_move(&cache, &RECT, sx + 100.0, sy);
        drag.cancel();
        assert_eq!(drag.state(), DragState::Idle);
        assert!(drag.pointer_up().is_none());
    }

    proptest! {
        #[test]
        fn prop_drag_result_always_in_range(
            moves in prop::collection::vec((-5000.0f32..5000.0, -5000.0f32..5000.0), 1..20)
        ) {
            let (store, _) = setup();
            let mut cache = HitTestCache::new();
            cache.refresh(store.document(), &ApproximateMetrics);
            let mut drag = DragController::new();
            let (sx, sy) = screen(20.0, 20.0);
            prop_assert!(drag.pointer_down(&cache, store.document(), &RECT, sx, sy));

            for (mx, my) in moves {
                drag.pointer_move(&cache, &RECT, mx, my);
                if let Some(preview) = drag.on_frame() {
                    prop_assert!((0.0..=100.0).contains(&preview.x));
                    prop_assert!((0.0..=100.0).contains(&preview.y));
                }
            }
            if let Some(EditorAction::MoveTextOverlay { x, y, .. }) = drag.pointer_up() {
                prop_assert!((0.0..=100.0).contains(&x));
                prop_assert!((0.0..=100.0).contains(&y));
            }
        }
    }
}
