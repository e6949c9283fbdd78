//! Video Geometry
//!
//! Tracks where the video surface sits on screen and decides when the
//! remote side needs to hear about it. While the surface moves (scrolling,
//! animations) the rectangle is re-sampled on a fixed interval and each
//! change is reported once; two equal samples in a row end the sampling.

use std::time::{Duration, Instant};

use crate::timer::RepeatingTimer;

/// Integer pixel size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Integer pixel rectangle, as reported by the compositor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn to_rect_f(&self) -> RectF {
        RectF::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeF {
    pub width: f32,
    pub height: f32,
}

impl SizeF {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Floating-point rectangle in page pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_size(size: SizeF) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn offset(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Scale origin and size uniformly
    pub fn scale(&mut self, factor: f32) {
        self.x *= factor;
        self.y *= factor;
        self.width *= factor;
        self.height *= factor;
    }
}

/// Compositor layer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

/// Placement of one layer relative to its parent
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayerGeometry {
    pub bounds: SizeF,
    pub position: PointF,
    pub scroll_offset: PointF,
}

/// Read access to the layer hierarchy the video layer lives in
pub trait LayerTree {
    /// Geometry of `layer` followed by each ancestor up to the root.
    /// Empty if the layer is unknown.
    fn containment_chain(&self, layer: LayerId) -> Vec<LayerGeometry>;

    /// Page zoom applied on top of layer coordinates
    fn page_scale_factor(&self) -> f32;
}

/// Accumulate positions and scroll compensation up the chain, then apply
/// the page scale
pub fn compute_layer_rect<T: LayerTree + ?Sized>(tree: &T, layer: LayerId) -> Option<RectF> {
    let chain = tree.containment_chain(layer);
    let first = chain.first()?;

    let mut rect = RectF::from_size(first.bounds);
    for node in &chain {
        rect.offset(node.position.x, node.position.y);
        rect.offset(-node.scroll_offset.x, -node.scroll_offset.y);
    }
    rect.scale(tree.page_scale_factor());
    Some(rect)
}

/// Debounces on-screen rectangle changes of the video layer
#[derive(Debug, Clone)]
pub struct GeometryTracker {
    layer: Option<LayerId>,
    last_reported: RectF,
    timer: RepeatingTimer,
}

impl GeometryTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            layer: None,
            last_reported: RectF::default(),
            timer: RepeatingTimer::new(interval),
        }
    }

    pub fn attach_layer(&mut self, layer: LayerId) {
        self.layer = Some(layer);
    }

    pub fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    pub fn last_reported(&self) -> RectF {
        self.last_reported
    }

    /// Whether the re-sampling timer is running
    pub fn is_sampling(&self) -> bool {
        self.timer.is_running()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Begin re-sampling unless already doing so
    pub fn start(&mut self, now: Instant) {
        self.timer.start(now);
    }

    pub fn stop(&mut self) {
        self.timer.stop();
    }

    /// A rectangle was sent through another path
    pub fn record_reported(&mut self, rect: RectF) {
        self.last_reported = rect;
    }

    fn sample<T: LayerTree + ?Sized>(&mut self, tree: &T) -> Option<RectF> {
        let rect = compute_layer_rect(tree, self.layer?)?;
        if rect == self.last_reported {
            return None;
        }
        self.last_reported = rect;
        Some(rect)
    }

    /// Layout pass. Returns the rectangle to send if it changed, and
    /// (re)arms sampling so the rest of the movement is followed.
    pub fn on_layout<T: LayerTree + ?Sized>(&mut self, now: Instant, tree: &T) -> Option<RectF> {
        let changed = self.sample(tree)?;
        self.timer.restart(now);
        Some(changed)
    }

    /// Timer poll. Returns the rectangle to send if a due sample differs
    /// from the last report; an unchanged sample stops the timer.
    pub fn on_timer<T: LayerTree + ?Sized>(&mut self, now: Instant, tree: &T) -> Option<RectF> {
        if !self.timer.fire_if_due(now) {
            return None;
        }
        let changed = self.sample(tree);
        if changed.is_none() {
            tracing::debug!("Video geometry settled at {:?}", self.last_reported);
            self.timer.stop();
        }
        changed
    }
}
