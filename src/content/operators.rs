//! Content stream operators.
//!
//! One variant per operator the interpreter acts on. Operators that only
//! carry structure (marked content, compatibility sections, Type 3 glyph
//! metrics) are kept as variants so callers can see them, even though
//! rendering treats them as no-ops.

use crate::object::{Dictionary, Object};

/// Winding rule used by fill and clip operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    /// `f`, `B`, `b`, `W`
    NonZero,
    /// `f*`, `B*`, `b*`, `W*`
    EvenOdd,
}

/// A content stream operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    // Text positioning
    /// Move text position (Td)
    Td {
        /// Horizontal offset
        tx: f32,
        /// Vertical offset
        ty: f32,
    },
    /// Move text position and set leading (TD)
    TD {
        /// Horizontal offset
        tx: f32,
        /// Vertical offset
        ty: f32,
    },
    /// Set text matrix and line matrix (Tm)
    Tm {
        /// Matrix element a
        a: f32,
        /// Matrix element b
        b: f32,
        /// Matrix element c
        c: f32,
        /// Matrix element d
        d: f32,
        /// Matrix element e
        e: f32,
        /// Matrix element f
        f: f32,
    },
    /// Move to start of next line (T*)
    TStar,

    // Text showing
    /// Show text (Tj)
    Tj {
        /// String bytes
        text: Vec<u8>,
    },
    /// Show text with positioning (TJ)
    TJ {
        /// Strings and adjustments
        array: Vec<TextElement>,
    },
    /// Next line, then show text (')
    Quote {
        /// String bytes
        text: Vec<u8>,
    },
    /// Set spacing, next line, show text (")
    DoubleQuote {
        /// Word spacing
        word_space: f32,
        /// Character spacing
        char_space: f32,
        /// String bytes
        text: Vec<u8>,
    },

    // Text state
    /// Character spacing (Tc)
    Tc {
        /// Spacing in unscaled text space units
        char_space: f32,
    },
    /// Word spacing (Tw)
    Tw {
        /// Spacing in unscaled text space units
        word_space: f32,
    },
    /// Horizontal scaling (Tz)
    Tz {
        /// Percentage
        scale: f32,
    },
    /// Leading (TL)
    TL {
        /// Leading
        leading: f32,
    },
    /// Font and size (Tf)
    Tf {
        /// Resource name
        font: String,
        /// Size
        size: f32,
    },
    /// Rendering mode (Tr)
    Tr {
        /// Mode 0..=7
        render: u8,
    },
    /// Rise (Ts)
    Ts {
        /// Rise
        rise: f32,
    },
    /// Type 3 glyph width (d0)
    SetGlyphWidth {
        /// Horizontal advance
        wx: f32,
        /// Vertical advance
        wy: f32,
    },
    /// Type 3 glyph width and bounding box (d1)
    SetGlyphWidthAndBounds {
        /// Horizontal advance
        wx: f32,
        /// Vertical advance
        wy: f32,
        /// `[llx lly urx ury]`
        bbox: [f32; 4],
    },

    // Graphics state
    /// Push the graphics state (q)
    SaveState,
    /// Pop the graphics state (Q)
    RestoreState,
    /// Concatenate to the CTM (cm)
    Cm {
        /// Matrix element a
        a: f32,
        /// Matrix element b
        b: f32,
        /// Matrix element c
        c: f32,
        /// Matrix element d
        d: f32,
        /// Matrix element e
        e: f32,
        /// Matrix element f
        f: f32,
    },
    /// Line width (w)
    SetLineWidth {
        /// Width in user space
        width: f32,
    },
    /// Dash pattern (d)
    SetDash {
        /// Dash lengths
        array: Vec<f32>,
        /// Phase
        phase: f32,
    },
    /// Line cap (J)
    SetLineCap {
        /// 0 butt, 1 round, 2 square
        cap_style: u8,
    },
    /// Line join (j)
    SetLineJoin {
        /// 0 miter, 1 round, 2 bevel
        join_style: u8,
    },
    /// Miter limit (M)
    SetMiterLimit {
        /// Limit
        limit: f32,
    },
    /// Rendering intent (ri)
    SetRenderingIntent {
        /// Intent name
        intent: String,
    },
    /// Flatness (i)
    SetFlatness {
        /// Tolerance
        tolerance: f32,
    },
    /// Named ExtGState (gs)
    SetExtGState {
        /// Resource name
        dict_name: String,
    },

    // Color
    /// Fill RGB (rg)
    SetFillRgb {
        /// Red
        r: f32,
        /// Green
        g: f32,
        /// Blue
        b: f32,
    },
    /// Stroke RGB (RG)
    SetStrokeRgb {
        /// Red
        r: f32,
        /// Green
        g: f32,
        /// Blue
        b: f32,
    },
    /// Fill gray (g)
    SetFillGray {
        /// Gray level
        gray: f32,
    },
    /// Stroke gray (G)
    SetStrokeGray {
        /// Gray level
        gray: f32,
    },
    /// Fill CMYK (k)
    SetFillCmyk {
        /// Cyan
        c: f32,
        /// Magenta
        m: f32,
        /// Yellow
        y: f32,
        /// Black
        k: f32,
    },
    /// Stroke CMYK (K)
    SetStrokeCmyk {
        /// Cyan
        c: f32,
        /// Magenta
        m: f32,
        /// Yellow
        y: f32,
        /// Black
        k: f32,
    },
    /// Fill color space (cs)
    SetFillColorSpace {
        /// Space name or resource name
        name: String,
    },
    /// Stroke color space (CS)
    SetStrokeColorSpace {
        /// Space name or resource name
        name: String,
    },
    /// Fill color (sc, scn)
    SetFillColor {
        /// Components in the current fill space
        components: Vec<f32>,
        /// Pattern resource name (scn only)
        pattern: Option<String>,
    },
    /// Stroke color (SC, SCN)
    SetStrokeColor {
        /// Components in the current stroke space
        components: Vec<f32>,
        /// Pattern resource name (SCN only)
        pattern: Option<String>,
    },

    // Text objects
    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,

    // Path construction
    /// Begin a subpath (m)
    MoveTo {
        /// X
        x: f32,
        /// Y
        y: f32,
    },
    /// Straight segment (l)
    LineTo {
        /// X
        x: f32,
        /// Y
        y: f32,
    },
    /// Cubic Bézier (c)
    CurveTo {
        /// First control point x
        x1: f32,
        /// First control point y
        y1: f32,
        /// Second control point x
        x2: f32,
        /// Second control point y
        y2: f32,
        /// End point x
        x3: f32,
        /// End point y
        y3: f32,
    },
    /// Cubic Bézier whose first control point is the current point (v)
    CurveToV {
        /// Second control point x
        x2: f32,
        /// Second control point y
        y2: f32,
        /// End point x
        x3: f32,
        /// End point y
        y3: f32,
    },
    /// Cubic Bézier whose second control point is the end point (y)
    CurveToY {
        /// First control point x
        x1: f32,
        /// First control point y
        y1: f32,
        /// End point x
        x3: f32,
        /// End point y
        y3: f32,
    },
    /// Close the subpath (h)
    ClosePath,
    /// Rectangle subpath (re)
    Rectangle {
        /// Lower-left x
        x: f32,
        /// Lower-left y
        y: f32,
        /// Width
        width: f32,
        /// Height
        height: f32,
    },

    // Path painting
    /// Stroke (S)
    Stroke,
    /// Close and stroke (s)
    CloseStroke,
    /// Fill (f, F, f*)
    Fill {
        /// Winding rule
        rule: FillRule,
    },
    /// Fill then stroke (B, B*)
    FillStroke {
        /// Winding rule
        rule: FillRule,
    },
    /// Close, fill, stroke (b, b*)
    CloseFillStroke {
        /// Winding rule
        rule: FillRule,
    },
    /// End the path without painting (n)
    EndPath,
    /// Intersect the clip with the current path (W, W*)
    Clip {
        /// Winding rule
        rule: FillRule,
    },

    // Shading, XObjects, inline images
    /// Paint a shading over the clip region (sh)
    PaintShading {
        /// Shading resource name
        name: String,
    },
    /// Paint an XObject (Do)
    Do {
        /// XObject resource name
        name: String,
    },
    /// `BI ... ID ... EI`
    InlineImage {
        /// Image dictionary with abbreviations expanded
        dict: Dictionary,
        /// Raw, still filtered, image bytes
        data: Vec<u8>,
    },

    // Marked content and compatibility
    /// Marked-content point (MP)
    MarkPoint {
        /// Tag
        tag: String,
    },
    /// Marked-content point with properties (DP)
    MarkPointDict {
        /// Tag
        tag: String,
        /// Inline dictionary or resource name
        properties: Object,
    },
    /// Begin marked content (BMC)
    BeginMarkedContent {
        /// Tag
        tag: String,
    },
    /// Begin marked content with properties (BDC)
    BeginMarkedContentDict {
        /// Tag
        tag: String,
        /// Inline dictionary or resource name
        properties: Object,
    },
    /// End marked content (EMC)
    EndMarkedContent,
    /// Begin compatibility section (BX)
    BeginCompatibility,
    /// End compatibility section (EX)
    EndCompatibility,

    /// Any other operator, with its operands
    Other {
        /// Operator name
        name: String,
        /// Operands
        operands: Vec<Object>,
    },
}

/// Element in a TJ array.
#[derive(Debug, Clone, PartialEq)]
pub enum TextElement {
    /// String to show
    String(Vec<u8>),
    /// Adjustment in thousandths of text space; positive moves left
    Offset(f32),
}

impl Operator {
    /// True for the operators that consume the current path.
    pub fn paints_path(&self) -> bool {
        matches!(
            self,
            Operator::Stroke
                | Operator::CloseStroke
                | Operator::Fill { .. }
                | Operator::FillStroke { .. }
                | Operator::CloseFillStroke { .. }
                | Operator::EndPath
        )
    }

    /// True for path construction operators.
    pub fn builds_path(&self) -> bool {
        matches!(
            self,
            Operator::MoveTo { .. }
                | Operator::LineTo { .. }
                | Operator::CurveTo { .. }
                | Operator::CurveToV { .. }
                | Operator::CurveToY { .. }
                | Operator::ClosePath
                | Operator::Rectangle { .. }
        )
    }

    /// Operators with no effect on rendered output.
    pub fn is_no_op(&self) -> bool {
        matches!(
            self,
            Operator::SetGlyphWidth { .. }
                | Operator::SetGlyphWidthAndBounds { .. }
                | Operator::SetRenderingIntent { .. }
                | Operator::SetFlatness { .. }
                | Operator::MarkPoint { .. }
                | Operator::MarkPointDict { .. }
                | Operator::BeginMarkedContent { .. }
                | Operator::BeginMarkedContentDict { .. }
                | Operator::EndMarkedContent
                | Operator::BeginCompatibility
                | Operator::EndCompatibility
        )
    }
}
