//! Graphics state for content stream execution.
//!
//! `q` clones the whole state onto a stack and `Q` drops back to the saved
//! copy, so every field is a plain value. The pen and brush handed to the
//! device are derived from several fields; they are built on first use and
//! kept until one of their inputs actually changes, which means a `q`/`Q`
//! pair around unchanged colors never rebuilds them.

use std::sync::Arc;

use crate::content::device::{Brush, Paint, Pen};
use crate::geometry::Matrix;
use crate::resources::{ColorSpace, Font, Gradient};

/// Current color in one color space.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorState {
    /// Active color space
    pub space: ColorSpace,
    /// Components in `space`
    pub components: Vec<f32>,
    /// Shading pattern with its pattern matrix, when painting with `/Pattern`
    pub pattern: Option<(Arc<Gradient>, Matrix)>,
}

impl ColorState {
    /// Black in DeviceGray.
    pub fn new() -> Self {
        Self::in_space(ColorSpace::Gray)
    }

    /// Initial color of `space`.
    pub fn in_space(space: ColorSpace) -> Self {
        Self {
            components: space.initial_color(),
            space,
            pattern: None,
        }
    }

    /// The color as 8-bit RGB.
    pub fn rgb(&self) -> [u8; 3] {
        self.space.to_rgb8(&self.components)
    }
}

impl Default for ColorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Text state parameters (`Tc Tw Tz TL Tf Tr Ts`).
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    /// Character spacing
    pub char_space: f32,
    /// Word spacing
    pub word_space: f32,
    /// Horizontal scaling, percent
    pub horizontal_scaling: f32,
    /// Leading
    pub leading: f32,
    /// Selected font
    pub font: Option<Arc<Font>>,
    /// Font size
    pub font_size: f32,
    /// Rise
    pub rise: f32,
    /// Rendering mode
    pub render_mode: u8,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_space: 0.0,
            word_space: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

/// Graphics state parameters.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    /// Current transformation matrix (user space to device space)
    pub ctm: Matrix,
    /// Text parameters
    pub text: TextState,
    /// Device clips pushed while this state (or an ancestor) was current
    pub clip_depth: usize,

    fill: ColorState,
    stroke: ColorState,
    fill_alpha: f32,
    stroke_alpha: f32,
    line_width: f32,
    line_cap: u8,
    line_join: u8,
    miter_limit: f32,
    dash: (Vec<f32>, f32),

    brush: Option<Brush>,
    pen: Option<Pen>,
}

/// Assign `value` to `field`, dropping `cache` if it changed.
macro_rules! set_invalidating {
    ($self:ident . $field:ident = $value:expr, $cache:ident) => {{
        let value = $value;
        if $self.$field != value {
            $self.$field = value;
            $self.$cache = None;
        }
    }};
}

impl GraphicsState {
    /// Initial state for a page whose user space maps through `ctm`.
    pub fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            text: TextState::default(),
            clip_depth: 0,
            fill: ColorState::new(),
            stroke: ColorState::new(),
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: 0,
            line_join: 0,
            miter_limit: 10.0,
            dash: (Vec::new(), 0.0),
            brush: None,
            pen: None,
        }
    }

    /// Fill color.
    pub fn fill(&self) -> &ColorState {
        &self.fill
    }

    /// Stroke color.
    pub fn stroke(&self) -> &ColorState {
        &self.stroke
    }

    /// Line width.
    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    /// Replace the fill color state.
    pub fn set_fill(&mut self, color: ColorState) {
        set_invalidating!(self.fill = color, brush);
    }

    /// Replace the stroke color state.
    pub fn set_stroke(&mut self, color: ColorState) {
        set_invalidating!(self.stroke = color, pen);
    }

    /// Set fill components in the current fill space, clearing any pattern.
    pub fn set_fill_components(&mut self, components: Vec<f32>) {
        let color = ColorState {
            space: self.fill.space.clone(),
            components,
            pattern: None,
        };
        self.set_fill(color);
    }

    /// Set stroke components in the current stroke space.
    pub fn set_stroke_components(&mut self, components: Vec<f32>) {
        let color = ColorState {
            space: self.stroke.space.clone(),
            components,
            pattern: None,
        };
        self.set_stroke(color);
    }

    /// `ca`
    pub fn set_fill_alpha(&mut self, alpha: f32) {
        set_invalidating!(self.fill_alpha = alpha.clamp(0.0, 1.0), brush);
    }

    /// `CA`
    pub fn set_stroke_alpha(&mut self, alpha: f32) {
        set_invalidating!(self.stroke_alpha = alpha.clamp(0.0, 1.0), pen);
    }

    /// `w`
    pub fn set_line_width(&mut self, width: f32) {
        set_invalidating!(self.line_width = width.max(0.0), pen);
    }

    /// `J`
    pub fn set_line_cap(&mut self, cap: u8) {
        set_invalidating!(self.line_cap = cap.min(2), pen);
    }

    /// `j`
    pub fn set_line_join(&mut self, join: u8) {
        set_invalidating!(self.line_join = join.min(2), pen);
    }

    /// `M`
    pub fn set_miter_limit(&mut self, limit: f32) {
        set_invalidating!(self.miter_limit = limit.max(1.0), pen);
    }

    /// `d`
    pub fn set_dash(&mut self, array: Vec<f32>, phase: f32) {
        // An all-zero pattern draws nothing useful; treat it as solid
        let array = if array.iter().all(|&v| v == 0.0) { Vec::new() } else { array };
        set_invalidating!(self.dash = (array, phase), pen);
    }

    /// Brush for fills and glyphs, rebuilt only after a fill change.
    pub fn brush(&mut self) -> &Brush {
        let fill = &self.fill;
        let alpha = self.fill_alpha;
        self.brush.get_or_insert_with(|| Brush {
            paint: match &fill.pattern {
                Some((gradient, matrix)) => Paint::Gradient(Arc::clone(gradient), *matrix),
                None => Paint::Solid(fill.rgb()),
            },
            alpha,
        })
    }

    /// Pen for strokes, rebuilt only after a stroke parameter change.
    pub fn pen(&mut self) -> &Pen {
        let stroke = &self.stroke;
        let (width, cap, join, miter_limit, alpha) = (
            self.line_width,
            self.line_cap,
            self.line_join,
            self.miter_limit,
            self.stroke_alpha,
        );
        let dash = &self.dash;
        self.pen.get_or_insert_with(|| Pen {
            color: stroke.rgb(),
            alpha,
            width,
            cap,
            join,
            miter_limit,
            dash: dash.0.clone(),
            dash_phase: dash.1,
        })
    }

    /// True while a built brush is cached.
    pub fn has_cached_brush(&self) -> bool {
        self.brush.is_some()
    }

    /// True while a built pen is cached.
    pub fn has_cached_pen(&self) -> bool {
        self.pen.is_some()
    }
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self::new(Matrix::identity())
    }
}

/// Stack of graphics states for `q`/`Q`.
///
/// The base state is never popped; an unbalanced `Q` is ignored.
#[derive(Debug, Clone, Default)]
pub struct GraphicsStateStack {
    current: GraphicsState,
    saved: Vec<GraphicsState>,
}

impl GraphicsStateStack {
    /// Stack holding only `initial`.
    pub fn new(initial: GraphicsState) -> Self {
        Self {
            current: initial,
            saved: Vec::new(),
        }
    }

    /// Current state.
    pub fn current(&self) -> &GraphicsState {
        &self.current
    }

    /// Current state, mutably.
    pub fn current_mut(&mut self) -> &mut GraphicsState {
        &mut self.current
    }

    /// `q`
    pub fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// `Q`. Returns false when there was nothing to restore.
    pub fn restore(&mut self) -> bool {
        match self.saved.pop() {
            Some(state) => {
                self.current = state;
                true
            },
            None => false,
        }
    }

    /// Number of states, the current one included.
    pub fn depth(&self) -> usize {
        self.saved.len() + 1
    }
}
