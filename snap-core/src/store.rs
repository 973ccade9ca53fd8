//! The editor store: one owned document, one reducer, explicit subscribers.
//!
//! Every change to the [`EditorDocument`] goes through [`EditorStore::dispatch`].
//! After a successful mutation each subscriber is called with the new
//! document and the action that produced it. A rejected action leaves the
//! document untouched and notifies nobody.

use serde::{Deserialize, Serialize};

use crate::document::{
    CanvasSize, CropArea, EditorDocument, ExportSettings, Geometry, ImageRef, PixelRect, Shadow,
};
use crate::frame::FrameKind;
use crate::overlay::{FontSpec, OverlayId, TextFill, TextOverlay};
use crate::style::Background;
use crate::{EditorError, EditorResult};

/// Largest allowed padding in pixels.
pub const MAX_PADDING: u32 = 1000;
/// Smallest image zoom.
pub const MIN_IMAGE_SCALE: f32 = 0.1;
/// Largest image zoom.
pub const MAX_IMAGE_SCALE: f32 = 3.0;

/// A change request for the editor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EditorAction {
    /// A new image was decoded.
    LoadImage {
        /// Source width in pixels.
        width: u32,
        /// Source height in pixels.
        height: u32,
    },
    /// Remove the image.
    ClearImage,
    /// Replace the background.
    SetBackground(Background),
    /// Set padding in pixels.
    SetPadding(u32),
    /// Set corner radius in pixels.
    SetBorderRadius(f32),
    /// Set image zoom.
    SetImageScale(f32),
    /// Set rotation in degrees.
    SetRotation(f32),
    /// Replace the shadow.
    SetShadow(Shadow),
    /// Replace the frame.
    SetFrame(FrameKind),
    /// Append a text overlay.
    AddTextOverlay(TextOverlay),
    /// Edit content or style of an overlay. `None` fields are kept.
    UpdateTextOverlay {
        /// Overlay to edit.
        id: OverlayId,
        /// New text.
        text: Option<String>,
        /// New font.
        font: Option<FontSpec>,
        /// New fill.
        fill: Option<TextFill>,
    },
    /// Move an overlay to a percent position (clamped).
    MoveTextOverlay {
        /// Overlay to move.
        id: OverlayId,
        /// Horizontal center in percent.
        x: f32,
        /// Vertical center in percent.
        y: f32,
    },
    /// Delete an overlay.
    RemoveTextOverlay {
        /// Overlay to delete.
        id: OverlayId,
    },
    /// Enter crop mode with the full image selected.
    StartCrop,
    /// Change the crop selection.
    UpdateCrop(CropArea),
    /// Commit the crop, replacing the effective image.
    ApplyCrop,
    /// Leave crop mode without changes.
    CancelCrop,
    /// Replace export preferences.
    SetExportSettings(ExportSettings),
    /// Start over with an empty document.
    Reset,
}

impl EditorAction {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LoadImage { .. } => "load_image",
            Self::ClearImage => "clear_image",
            Self::SetBackground(_) => "set_background",
            Self::SetPadding(_) => "set_padding",
            Self::SetBorderRadius(_) => "set_border_radius",
            Self::SetImageScale(_) => "set_image_scale",
            Self::SetRotation(_) => "set_rotation",
            Self::SetShadow(_) => "set_shadow",
            Self::SetFrame(_) => "set_frame",
            Self::AddTextOverlay(_) => "add_text_overlay",
            Self::UpdateTextOverlay { .. } => "update_text_overlay",
            Self::MoveTextOverlay { .. } => "move_text_overlay",
            Self::RemoveTextOverlay { .. } => "remove_text_overlay",
            Self::StartCrop => "start_crop",
            Self::UpdateCrop(_) => "update_crop",
            Self::ApplyCrop => "apply_crop",
            Self::CancelCrop => "cancel_crop",
            Self::SetExportSettings(_) => "set_export_settings",
            Self::Reset => "reset",
        }
    }

    /// Whether this action can change what the renderer draws.
    #[must_use]
    pub const fn affects_render(&self) -> bool {
        !matches!(
            self,
            Self::SetExportSettings(_) | Self::StartCrop | Self::UpdateCrop(_) | Self::CancelCrop
        )
    }
}

/// Notification passed to subscribers after a successful dispatch.
#[derive(Debug)]
pub struct StoreEvent<'a> {
    /// The document after the change.
    pub document: &'a EditorDocument,
    /// The action that was applied.
    pub action: &'a EditorAction,
    /// Store revision after the change.
    pub revision: u64,
}

/// Handle returned by [`EditorStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Subscriber = Box<dyn FnMut(&StoreEvent<'_>) + Send>;

/// An immutable view of the document for one render pass.
///
/// The canvas size is resolved when the snapshot is taken and always
/// matches the document it was taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSnapshot {
    document: EditorDocument,
    canvas: CanvasSize,
    revision: u64,
}

impl RenderSnapshot {
    /// Build a snapshot straight from a document, outside any store.
    ///
    /// Returns `None` if the document has no image.
    #[must_use]
    pub fn from_document(document: EditorDocument) -> Option<Self> {
        let canvas = document.canvas_size()?;
        Some(Self {
            document,
            canvas,
            revision: 0,
        })
    }

    /// The document at snapshot time.
    #[must_use]
    pub fn document(&self) -> &EditorDocument {
        &self.document
    }

    /// Canvas size at 1x.
    #[must_use]
    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    /// Store revision the snapshot was taken at.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Owns the editor document and applies actions to it.
pub struct EditorStore {
    document: EditorDocument,
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_subscriber: u64,
    revision: u64,
}

impl std::fmt::Debug for EditorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorStore")
            .field("document", &self.document)
            .field("subscribers", &self.subscribers.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl Default for EditorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorStore {
    /// Create a store with an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::with_document(EditorDocument::default())
    }

    /// Create a store around an existing document.
    #[must_use]
    pub fn with_document(document: EditorDocument) -> Self {
        Self {
            document,
            subscribers: Vec::new(),
            next_subscriber: 0,
            revision: 0,
        }
    }

    /// The current document.
    #[must_use]
    pub fn document(&self) -> &EditorDocument {
        &self.document
    }

    /// Number of successful dispatches so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Take an immutable snapshot for rendering.
    ///
    /// Returns `None` while no image is loaded.
    #[must_use]
    pub fn snapshot(&self) -> Option<RenderSnapshot> {
        let canvas = self.document.canvas_size()?;
        Some(RenderSnapshot {
            document: self.document.clone(),
            canvas,
            revision: self.revision,
        })
    }

    /// Register a callback invoked after every successful dispatch.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriberId
    where
        F: FnMut(&StoreEvent<'_>) + Send + 'static,
    {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Apply an action.
    ///
    /// # Errors
    ///
    /// Returns an [`EditorError`] if the action does not apply to the
    /// current document. The document is unchanged in that case.
    pub fn dispatch(&mut self, action: EditorAction) -> EditorResult<()> {
        let mut next = self.document.clone();
        if let Err(err) = reduce(&mut next, &action) {
            tracing::debug!(action = action.name(), error = %err, "Rejected editor action");
            return Err(err);
        }
        self.document = next;
        self.revision += 1;
        tracing::debug!(
            action = action.name(),
            revision = self.revision,
            "Applied editor action"
        );

        let event = StoreEvent {
            document: &self.document,
            action: &action,
            revision: self.revision,
        };
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&event);
        }
        Ok(())
    }
}

/// The reducer. Mutates `doc` in place; on error the caller discards it.
fn reduce(doc: &mut EditorDocument, action: &EditorAction) -> EditorResult<()> {
    match action {
        EditorAction::LoadImage { width, height } => {
            if *width == 0 || *height == 0 {
                return Err(EditorError::InvalidValue(format!(
                    "image dimensions must be non-zero, got {width}x{height}"
                )));
            }
            doc.image = Some(ImageRef::new(*width, *height));
            doc.crop = None;
        }
        EditorAction::ClearImage => {
            doc.image = None;
            doc.crop = None;
        }
        EditorAction::SetBackground(background) => doc.background = background.clone(),
        EditorAction::SetPadding(padding) => doc.geometry.padding = check_padding(*padding)?,
        EditorAction::SetBorderRadius(radius) => {
            doc.geometry.border_radius = border_radius(*radius)?;
        }
        EditorAction::SetImageScale(scale) => doc.geometry.image_scale = image_scale(*scale)?,
        EditorAction::SetRotation(degrees) => {
            doc.geometry.rotation_deg = normalize_degrees(finite(*degrees, "rotation")?);
        }
        EditorAction::SetShadow(shadow) => doc.shadow = sanitize_shadow(shadow)?,
        EditorAction::SetFrame(frame) => doc.frame = *frame,
        EditorAction::AddTextOverlay(overlay) => {
            if doc.overlay(overlay.id).is_some() {
                return Err(EditorError::DuplicateOverlay(overlay.id));
            }
            let mut overlay = overlay.clone();
            overlay.normalize();
            doc.overlays.push(overlay);
            doc.overlay_revision += 1;
        }
        EditorAction::UpdateTextOverlay {
            id,
            text,
            font,
            fill,
        } => {
            let overlay = doc
                .overlay_mut(*id)
                .ok_or(EditorError::OverlayNotFound(*id))?;
            if let Some(text) = text {
                overlay.text.clone_from(text);
            }
            if let Some(font) = font {
                overlay.font = font.clone();
            }
            if let Some(fill) = fill {
                overlay.fill = fill.clone();
            }
            doc.overlay_revision += 1;
        }
        EditorAction::MoveTextOverlay { id, x, y } => {
            let overlay = doc
                .overlay_mut(*id)
                .ok_or(EditorError::OverlayNotFound(*id))?;
            overlay.set_position(*x, *y);
            doc.overlay_revision += 1;
        }
        EditorAction::RemoveTextOverlay { id } => {
            let before = doc.overlays.len();
            doc.overlays.retain(|o| o.id != *id);
            if doc.overlays.len() == before {
                return Err(EditorError::OverlayNotFound(*id));
            }
            doc.overlay_revision += 1;
        }
        EditorAction::StartCrop => {
            if doc.image.is_none() {
                return Err(EditorError::NoImage);
            }
            doc.crop = Some(CropArea::FULL);
        }
        EditorAction::UpdateCrop(area) => {
            if doc.crop.is_none() {
                return Err(EditorError::NotCropping);
            }
            doc.crop = Some(CropArea::new(area.x(), area.y(), area.width(), area.height()));
        }
        EditorAction::ApplyCrop => {
            let area = doc.crop.take().ok_or(EditorError::NotCropping)?;
            let image = doc.image.as_mut().ok_or(EditorError::NoImage)?;
            let visible = image.visible_rect();
            let local = area.to_pixels(visible.width, visible.height);
            image.source_crop = Some(PixelRect {
                x: visible.x + local.x,
                y: visible.y + local.y,
                width: local.width,
                height: local.height,
            });
        }
        EditorAction::CancelCrop => {
            doc.crop.take().ok_or(EditorError::NotCropping)?;
        }
        EditorAction::SetExportSettings(settings) => {
            check_jpeg_quality(settings.jpeg_quality)?;
            doc.export = *settings;
        }
        EditorAction::Reset => {
            let revision = doc.overlay_revision + 1;
            *doc = EditorDocument::default();
            doc.overlay_revision = revision;
        }
    }
    Ok(())
}

fn finite(value: f32, what: &str) -> EditorResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EditorError::InvalidValue(format!("{what} must be finite")))
    }
}

pub(crate) fn check_padding(padding: u32) -> EditorResult<u32> {
    if padding > MAX_PADDING {
        return Err(EditorError::InvalidValue(format!(
            "padding must be at most {MAX_PADDING}, got {padding}"
        )));
    }
    Ok(padding)
}

fn border_radius(radius: f32) -> EditorResult<f32> {
    Ok(finite(radius, "border radius")?.max(0.0))
}

fn image_scale(scale: f32) -> EditorResult<f32> {
    Ok(finite(scale, "image scale")?.clamp(MIN_IMAGE_SCALE, MAX_IMAGE_SCALE))
}

/// The geometry the reducer would accept, field by field.
pub(crate) fn sanitize_geometry(geometry: Geometry) -> EditorResult<Geometry> {
    Ok(Geometry {
        padding: check_padding(geometry.padding)?,
        border_radius: border_radius(geometry.border_radius)?,
        image_scale: image_scale(geometry.image_scale)?,
        rotation_deg: normalize_degrees(finite(geometry.rotation_deg, "rotation")?),
    })
}

pub(crate) fn sanitize_shadow(shadow: &Shadow) -> EditorResult<Shadow> {
    Ok(Shadow {
        blur: finite(shadow.blur, "shadow blur")?.max(0.0),
        opacity: finite(shadow.opacity, "shadow opacity")?.clamp(0.0, 1.0),
        offset_x: finite(shadow.offset_x, "shadow offset")?,
        offset_y: finite(shadow.offset_y, "shadow offset")?,
        color: shadow.color,
    })
}

pub(crate) fn check_jpeg_quality(quality: u8) -> EditorResult<u8> {
    if !(1..=100).contains(&quality) {
        return Err(EditorError::InvalidValue(format!(
            "jpeg quality must be 1-100, got {quality}"
        )));
    }
    Ok(quality)
}

/// Map any angle into `(-180, 180]`.
fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
