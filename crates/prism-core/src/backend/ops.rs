//! Backend call convention: the typed operations a handler can request.

use std::fmt;

/// Resampling filter used when an operation changes image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    /// Parse a filter name (case-insensitive), accepting common aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "nearest" | "point" => Some(Self::Nearest),
            "triangle" | "linear" | "bilinear" => Some(Self::Triangle),
            "catmullrom" | "catmull-rom" | "cubic" | "catrom" => Some(Self::CatmullRom),
            "gaussian" => Some(Self::Gaussian),
            "lanczos" | "lanczos3" => Some(Self::Lanczos3),
            _ => None,
        }
    }
}

/// Colour/convolution filters for the convert effect.
///
/// Numeric codes follow the GD `imagefilter` constants so existing batch
/// files keep working.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvertFilter {
    Negate,
    Grayscale,
    /// Additive brightness, -255..=255
    Brightness(i32),
    /// Contrast adjustment in percent; negative lowers contrast
    Contrast(f32),
    EdgeDetect,
    Emboss,
    GaussianBlur,
    MeanRemoval,
    /// Smoothing with the given centre weight
    Smooth(f32),
    /// Block size in pixels
    Pixelate(u32),
}

impl ConvertFilter {
    /// Canonical name of the filter.
    pub fn name(&self) -> &'static str {
        match self {
            ConvertFilter::Negate => "negate",
            ConvertFilter::Grayscale => "grayscale",
            ConvertFilter::Brightness(_) => "brightness",
            ConvertFilter::Contrast(_) => "contrast",
            ConvertFilter::EdgeDetect => "edge_detect",
            ConvertFilter::Emboss => "emboss",
            ConvertFilter::GaussianBlur => "gaussian_blur",
            ConvertFilter::MeanRemoval => "mean_removal",
            ConvertFilter::Smooth(_) => "smooth",
            ConvertFilter::Pixelate(_) => "pixelate",
        }
    }
}

/// Target size for a resample.
///
/// A zero on one axis keeps the aspect ratio from the other axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub cols: u32,
    pub rows: u32,
}

impl Dimensions {
    /// Resolve against the current image size.
    pub fn resolve(&self, width: u32, height: u32) -> (u32, u32) {
        match (self.cols, self.rows) {
            (0, 0) => (width, height),
            (0, rows) => (scale_axis(width, rows, height), rows),
            (cols, 0) => (cols, scale_axis(height, cols, width)),
            (cols, rows) => (cols, rows),
        }
    }
}

/// `value * target / reference`, rounded, never below one pixel.
fn scale_axis(value: u32, target: u32, reference: u32) -> u32 {
    if reference == 0 {
        return 1;
    }
    let scaled = (value as f64 * target as f64 / reference as f64).round();
    (scaled as u32).max(1)
}

/// How the resize effect determines its output size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeTarget {
    /// Explicit dimensions
    Exact(Dimensions),
    /// Percentage of the current size (50.0 halves each axis)
    Percent(f32),
}

impl ResizeTarget {
    /// Resolve against the current image size.
    pub fn resolve(&self, width: u32, height: u32) -> (u32, u32) {
        match self {
            ResizeTarget::Exact(dims) => dims.resolve(width, height),
            ResizeTarget::Percent(pct) => {
                let factor = *pct as f64 / 100.0;
                let w = ((width as f64 * factor).round() as u32).max(1);
                let h = ((height as f64 * factor).round() as u32).max(1);
                (w, h)
            }
        }
    }
}

/// A single image operation requested by an effect handler.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOp {
    /// Optional resample, then Gaussian blur
    Blur {
        sigma: f32,
        resample: Option<(Dimensions, ResampleFilter)>,
    },
    /// Apply a colour/convolution filter
    Convert(ConvertFilter),
    /// Resample to a new size
    Resize {
        target: ResizeTarget,
        filter: ResampleFilter,
    },
}

impl BackendOp {
    /// Short operation label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            BackendOp::Blur { .. } => "blur",
            BackendOp::Convert(_) => "convert",
            BackendOp::Resize { .. } => "resize",
        }
    }
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendOp::Blur { sigma, .. } => write!(f, "blur(sigma={sigma})"),
            BackendOp::Convert(filter) => write!(f, "convert({})", filter.name()),
            BackendOp::Resize {
                target: ResizeTarget::Percent(pct),
                ..
            } => write!(f, "resize({pct}%)"),
            BackendOp::Resize {
                target: ResizeTarget::Exact(d),
                ..
            } => write!(f, "resize({}x{})", d.cols, d.rows),
        }
    }
}
