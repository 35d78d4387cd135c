//! Drawing surface abstraction.
//!
//! The interpreter never rasterizes anything itself. It builds paths in user
//! space and hands them to a [`Device`] together with the transform into
//! device space and the pen or brush to use. [`RecordingDevice`] keeps every
//! call in device space, which is what the tests and the inspection binary
//! look at.

use std::sync::Arc;

use crate::content::operators::FillRule;
use crate::geometry::{Matrix, Point, Rect};
use crate::resources::{Gradient, ImageData};

/// One path segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    /// Start a subpath
    MoveTo(Point),
    /// Straight line
    LineTo(Point),
    /// Cubic Bézier with two control points
    CurveTo(Point, Point, Point),
    /// Close the current subpath
    Close,
}

/// A path under construction or ready to paint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    segments: Vec<PathSegment>,
    current: Option<Point>,
    start: Option<Point>,
}

impl Path {
    /// Empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments in order.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True when nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Current point, if a subpath is open.
    pub fn current_point(&self) -> Option<Point> {
        self.current
    }

    /// Number of subpaths.
    pub fn subpath_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PathSegment::MoveTo(_)))
            .count()
    }

    /// `m`
    pub fn move_to(&mut self, p: Point) {
        self.segments.push(PathSegment::MoveTo(p));
        self.current = Some(p);
        self.start = Some(p);
    }

    /// `l`; without a current point this starts a subpath instead.
    pub fn line_to(&mut self, p: Point) {
        if self.current.is_none() {
            log::debug!("lineto without a current point");
            self.move_to(p);
            return;
        }
        self.segments.push(PathSegment::LineTo(p));
        self.current = Some(p);
    }

    /// `c`
    pub fn curve_to(&mut self, c1: Point, c2: Point, end: Point) {
        if self.current.is_none() {
            self.move_to(c1);
        }
        self.segments.push(PathSegment::CurveTo(c1, c2, end));
        self.current = Some(end);
    }

    /// `v`: first control point is the current point.
    pub fn curve_to_v(&mut self, c2: Point, end: Point) {
        let c1 = self.current.unwrap_or(c2);
        self.curve_to(c1, c2, end);
    }

    /// `y`: second control point is the end point.
    pub fn curve_to_y(&mut self, c1: Point, end: Point) {
        self.curve_to(c1, end, end);
    }

    /// `h`
    pub fn close(&mut self) {
        if self.current.is_some() {
            self.segments.push(PathSegment::Close);
            self.current = self.start;
        }
    }

    /// `re`: a closed subpath of four corners.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.move_to(Point::new(x, y));
        self.line_to(Point::new(x + width, y));
        self.line_to(Point::new(x + width, y + height));
        self.line_to(Point::new(x, y + height));
        self.close();
    }

    /// Bounding box of every point, control points included.
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = self.segments.iter().flat_map(|s| match *s {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => vec![p],
            PathSegment::CurveTo(a, b, c) => vec![a, b, c],
            PathSegment::Close => vec![],
        });
        let first = points.next()?;
        let mut r = Rect::new(first.x, first.y, first.x, first.y);
        for p in points {
            r = Rect::new(r.x0.min(p.x), r.y0.min(p.y), r.x1.max(p.x), r.y1.max(p.y));
        }
        Some(r)
    }

    /// Copy with every point mapped through `m`.
    pub fn transform(&self, m: &Matrix) -> Path {
        let map = |p: Point| m.transform_point(p.x, p.y);
        Path {
            segments: self
                .segments
                .iter()
                .map(|s| match *s {
                    PathSegment::MoveTo(p) => PathSegment::MoveTo(map(p)),
                    PathSegment::LineTo(p) => PathSegment::LineTo(map(p)),
                    PathSegment::CurveTo(a, b, c) => PathSegment::CurveTo(map(a), map(b), map(c)),
                    PathSegment::Close => PathSegment::Close,
                })
                .collect(),
            current: self.current.map(map),
            start: self.start.map(map),
        }
    }
}

/// What a brush paints with.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    /// Flat color
    Solid([u8; 3]),
    /// Gradient, with the matrix from shading space to user space
    Gradient(Arc<Gradient>, Matrix),
}

/// Fill descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    /// Color or gradient
    pub paint: Paint,
    /// Constant opacity (`ca`)
    pub alpha: f32,
}

impl Brush {
    /// Solid RGB color, if this is a flat brush.
    pub fn solid_color(&self) -> Option<[u8; 3]> {
        match self.paint {
            Paint::Solid(rgb) => Some(rgb),
            Paint::Gradient(..) => None,
        }
    }
}

/// Stroke descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Pen {
    /// Stroke color
    pub color: [u8; 3],
    /// Constant opacity (`CA`)
    pub alpha: f32,
    /// Width in user space
    pub width: f32,
    /// 0 butt, 1 round, 2 square
    pub cap: u8,
    /// 0 miter, 1 round, 2 bevel
    pub join: u8,
    /// Miter limit
    pub miter_limit: f32,
    /// Dash lengths, empty for solid
    pub dash: Vec<f32>,
    /// Dash phase
    pub dash_phase: f32,
}

/// A glyph to draw: the surface owns outlines and rasterization.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// `/BaseFont` of the font in use
    pub font: String,
    /// Character code from the string operand
    pub code: u32,
    /// Horizontal advance in text space
    pub advance: f32,
}

/// Drawing surface driven by the content interpreter.
///
/// Transforms map user space (or glyph/image space) to device space. Clips
/// are pushed and popped in a strict stack order that mirrors `q`/`Q`.
pub trait Device {
    /// Fill `path` with `brush`.
    fn fill_path(&mut self, path: &Path, transform: &Matrix, brush: &Brush, rule: FillRule);

    /// Stroke `path` with `pen`.
    fn stroke_path(&mut self, path: &Path, transform: &Matrix, pen: &Pen);

    /// Intersect the clip region with `path`.
    fn push_clip(&mut self, path: &Path, transform: &Matrix, rule: FillRule);

    /// Undo the most recent [`Device::push_clip`].
    fn pop_clip(&mut self);

    /// Draw `image` into the unit square mapped by `transform`.
    fn draw_image(&mut self, image: &ImageData, transform: &Matrix);

    /// Fill a glyph; `transform` is the text rendering matrix.
    fn draw_glyph(&mut self, glyph: &Glyph, transform: &Matrix, brush: &Brush);

    /// Paint `gradient` over the whole clip region.
    fn paint_shading(&mut self, gradient: &Gradient, transform: &Matrix);
}

/// A call captured by [`RecordingDevice`], in device space.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// `fill_path`
    Fill {
        /// Path in device space
        path: Path,
        /// Brush used
        brush: Brush,
        /// Winding rule
        rule: FillRule,
    },
    /// `stroke_path`
    Stroke {
        /// Path in device space
        path: Path,
        /// Pen used
        pen: Pen,
    },
    /// `push_clip`
    PushClip {
        /// Clip bounds in device space
        bounds: Option<Rect>,
    },
    /// `pop_clip`
    PopClip,
    /// `draw_image`
    Image {
        /// Pixel width
        width: u32,
        /// Pixel height
        height: u32,
        /// Where the unit square lands
        bounds: Rect,
    },
    /// `draw_glyph`
    Glyph {
        /// Glyph drawn
        glyph: Glyph,
        /// Glyph origin in device space
        origin: Point,
    },
    /// `paint_shading`
    Shading {
        /// Number of gradient stops
        stops: usize,
        /// Shading-to-device transform
        transform: Matrix,
    },
}

/// Device that records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingDevice {
    /// Calls in order
    pub commands: Vec<DrawCommand>,
}

impl RecordingDevice {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the fill commands.
    pub fn fills(&self) -> Vec<&DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Fill { .. }))
            .collect()
    }

    /// Current clip nesting.
    pub fn clip_depth(&self) -> usize {
        self.commands.iter().fold(0usize, |depth, c| match c {
            DrawCommand::PushClip { .. } => depth + 1,
            DrawCommand::PopClip => depth.saturating_sub(1),
            _ => depth,
        })
    }
}

impl Device for RecordingDevice {
    fn fill_path(&mut self, path: &Path, transform: &Matrix, brush: &Brush, rule: FillRule) {
        self.commands.push(DrawCommand::Fill {
            path: path.transform(transform),
            brush: brush.clone(),
            rule,
        });
    }

    fn stroke_path(&mut self, path: &Path, transform: &Matrix, pen: &Pen) {
        self.commands.push(DrawCommand::Stroke {
            path: path.transform(transform),
            pen: pen.clone(),
        });
    }

    fn push_clip(&mut self, path: &Path, transform: &Matrix, _rule: FillRule) {
        self.commands.push(DrawCommand::PushClip {
            bounds: path.transform(transform).bounds(),
        });
    }

    fn pop_clip(&mut self) {
        self.commands.push(DrawCommand::PopClip);
    }

    fn draw_image(&mut self, image: &ImageData, transform: &Matrix) {
        self.commands.push(DrawCommand::Image {
            width: image.width,
            height: image.height,
            bounds: transform.transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0)),
        });
    }

    fn draw_glyph(&mut self, glyph: &Glyph, transform: &Matrix, _brush: &Brush) {
        self.commands.push(DrawCommand::Glyph {
            glyph: glyph.clone(),
            origin: transform.transform_point(0.0, 0.0),
        });
    }

    fn paint_shading(&mut self, gradient: &Gradient, transform: &Matrix) {
        self.commands.push(DrawCommand::Shading {
            stops: gradient.stops.len(),
            transform: *transform,
        });
    }
}
