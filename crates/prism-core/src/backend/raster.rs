//! Backend built on the `image` crate.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;

use super::{BackendOp, BackendRequest, ConvertFilter, ImageBackend, ResampleFilter};
use crate::config::LimitsConfig;
use crate::error::{BackendError, BackendResult};

const EDGE_DETECT: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];
const EMBOSS: [f32; 9] = [-2.0, -1.0, 0.0, -1.0, 1.0, 1.0, 0.0, 1.0, 2.0];
const GAUSSIAN_3X3: [f32; 9] = [1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0];
const MEAN_REMOVAL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// Reads an image file, applies one operation and writes the result.
///
/// Stateless apart from its limits, so one instance can serve concurrent
/// records.
pub struct RasterBackend {
    limits: LimitsConfig,
}

impl RasterBackend {
    /// Create a backend enforcing the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check size limits, then decode with content-based format detection.
    fn load(&self, path: &Path) -> BackendResult<(DynamicImage, Option<ImageFormat>)> {
        if !path.exists() {
            return Err(BackendError::FileNotFound(path.to_path_buf()));
        }

        let metadata = std::fs::metadata(path).map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read metadata: {}", e),
        })?;
        let max_bytes = self.limits.max_file_size_mb.saturating_mul(1024 * 1024);
        if metadata.len() > max_bytes {
            return Err(BackendError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let reader = image::ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| BackendError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = reader.format();
        let image = reader.decode().map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        self.check_dimensions(path, width, height)?;
        Ok((image, format))
    }

    fn check_dimensions(&self, path: &Path, width: u32, height: u32) -> BackendResult<()> {
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(BackendError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim,
            });
        }
        Ok(())
    }

    /// Write using the output extension's format, falling back to the
    /// format the input was decoded from.
    fn save(
        image: &DynamicImage,
        path: &Path,
        source_format: Option<ImageFormat>,
    ) -> BackendResult<()> {
        let format = ImageFormat::from_path(path)
            .ok()
            .or(source_format)
            .ok_or_else(|| BackendError::Encode {
                path: path.to_path_buf(),
                message: "Cannot determine output format".to_string(),
            })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BackendError::Encode {
                path: path.to_path_buf(),
                message: format!("Cannot create output directory: {}", e),
            })?;
        }

        image
            .save_with_format(path, format)
            .map_err(|e| BackendError::Encode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Apply an operation in memory.
    fn transform(&self, image: DynamicImage, request: &BackendRequest) -> BackendResult<DynamicImage> {
        let (width, height) = image.dimensions();
        let image = match &request.op {
            BackendOp::Blur { sigma, resample } => {
                let resized = match resample {
                    Some((dims, filter)) => {
                        let (w, h) = dims.resolve(width, height);
                        self.check_dimensions(&request.output, w, h)?;
                        image.resize_exact(w, h, filter_type(*filter))
                    }
                    None => image,
                };
                if *sigma > 0.0 {
                    resized.blur(*sigma)
                } else {
                    resized
                }
            }
            BackendOp::Convert(filter) => apply_convert(image, *filter),
            BackendOp::Resize { target, filter } => {
                let (w, h) = target.resolve(width, height);
                self.check_dimensions(&request.output, w, h)?;
                image.resize_exact(w, h, filter_type(*filter))
            }
        };
        Ok(image)
    }
}

impl ImageBackend for RasterBackend {
    fn name(&self) -> &str {
        "raster"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn execute(&self, request: &BackendRequest) -> BackendResult<()> {
        let start = std::time::Instant::now();
        let (image, format) = self.load(&request.input)?;
        let result = self.transform(image, request)?;
        Self::save(&result, &request.output, format)?;
        tracing::trace!(
            "  {} on image {}: {:?}",
            request.op,
            request.image_id,
            start.elapsed()
        );
        Ok(())
    }
}

fn apply_convert(mut image: DynamicImage, filter: ConvertFilter) -> DynamicImage {
    match filter {
        ConvertFilter::Negate => {
            image.invert();
            image
        }
        ConvertFilter::Grayscale => image.grayscale(),
        ConvertFilter::Brightness(value) => image.brighten(value),
        ConvertFilter::Contrast(value) => image.adjust_contrast(value),
        ConvertFilter::EdgeDetect => image.filter3x3(&EDGE_DETECT),
        ConvertFilter::Emboss => image.filter3x3(&EMBOSS),
        ConvertFilter::GaussianBlur => image.filter3x3(&GAUSSIAN_3X3),
        ConvertFilter::MeanRemoval => image.filter3x3(&MEAN_REMOVAL),
        ConvertFilter::Smooth(weight) => {
            let kernel = [1.0, 1.0, 1.0, 1.0, weight, 1.0, 1.0, 1.0, 1.0];
            image.filter3x3(&kernel)
        }
        ConvertFilter::Pixelate(block) if block > 1 => {
            let (w, h) = image.dimensions();
            let small = image.resize_exact(w.div_ceil(block), h.div_ceil(block), FilterType::Nearest);
            small.resize_exact(w, h, FilterType::Nearest)
        }
        ConvertFilter::Pixelate(_) => image,
    }
}

fn filter_type(filter: ResampleFilter) -> FilterType {
    match filter {
        ResampleFilter::Nearest => FilterType::Nearest,
        ResampleFilter::Triangle => FilterType::Triangle,
        ResampleFilter::CatmullRom => FilterType::CatmullRom,
        ResampleFilter::Gaussian => FilterType::Gaussian,
        ResampleFilter::Lanczos3 => FilterType::Lanczos3,
    }
}
