//! Translation from stored effect values to backend operations.
//!
//! Values come straight from batch JSON, so numbers may arrive as strings
//! and objects may carry legacy field names (`blur`, `filter_type`).

use serde_json::{Map, Value};

use crate::backend::{BackendOp, ConvertFilter, Dimensions, ResampleFilter, ResizeTarget};
use crate::error::{BackendError, BackendResult};

use super::registry::{BLUR, CONVERT, RESIZE};

/// Blur: a number is the Gaussian sigma; an object may add a resample.
///
/// `{ "sigma": 2.0 }`, `{ "blur": 2.0, "cols": 100, "rows": 0, "filter": "lanczos" }`
pub fn blur_op(value: &Value) -> BackendResult<BackendOp> {
    let (sigma, resample) = match value {
        Value::Object(obj) => {
            let sigma = match obj.get("sigma").or_else(|| obj.get("blur")) {
                Some(v) => Some(number(v).ok_or_else(|| invalid(BLUR, "sigma must be a number"))?),
                None => None,
            };
            let resample = match dimensions(BLUR, obj)? {
                Some(dims) => Some((dims, filter(BLUR, obj)?)),
                None => None,
            };
            // A zero sigma is a no-op, same as the scalar form
            if sigma.is_none() && resample.is_none() {
                return Err(invalid(BLUR, "expected sigma or cols/rows"));
            }
            (sigma.unwrap_or(0.0), resample)
        }
        other => {
            let sigma = number(other).ok_or_else(|| invalid(BLUR, "expected a number or object"))?;
            (sigma, None)
        }
    };

    if !sigma.is_finite() || sigma < 0.0 {
        return Err(invalid(BLUR, "sigma must be finite and >= 0"));
    }
    Ok(BackendOp::Blur {
        sigma: sigma as f32,
        resample,
    })
}

/// Convert: a GD filter code, a filter name, or `{ "filter_type", "arg" }`.
pub fn convert_op(value: &Value) -> BackendResult<BackendOp> {
    let (selector, arg) = match value {
        Value::Object(obj) => {
            let selector = obj
                .get("filter_type")
                .or_else(|| obj.get("filter"))
                .ok_or_else(|| invalid(CONVERT, "missing filter_type"))?;
            (selector, obj.get("arg").and_then(number))
        }
        other => (other, None),
    };

    let filter = match selector {
        Value::String(name) => match name.trim().parse::<i64>() {
            Ok(code) => filter_from_code(code, arg)?,
            Err(_) => filter_from_name(name, arg)?,
        },
        other => {
            let code = integer(other).ok_or_else(|| {
                invalid(CONVERT, "filter_type must be an integer code or a name")
            })?;
            filter_from_code(code, arg)?
        }
    };
    Ok(BackendOp::Convert(filter))
}

/// Resize: a number is a percentage; an object gives `cols`/`rows` (or
/// `percent`) plus an optional `filter`.
pub fn resize_op(value: &Value) -> BackendResult<BackendOp> {
    let (target, filter) = match value {
        Value::Object(obj) => {
            let target = match obj.get("percent") {
                Some(v) => ResizeTarget::Percent(percent(v)?),
                None => ResizeTarget::Exact(
                    dimensions(RESIZE, obj)?
                        .ok_or_else(|| invalid(RESIZE, "expected cols/rows or percent"))?,
                ),
            };
            (target, filter(RESIZE, obj)?)
        }
        other => (ResizeTarget::Percent(percent(other)?), ResampleFilter::default()),
    };

    if let ResizeTarget::Exact(Dimensions { cols: 0, rows: 0 }) = target {
        return Err(invalid(RESIZE, "cols and rows cannot both be 0"));
    }
    Ok(BackendOp::Resize { target, filter })
}

fn filter_from_code(code: i64, arg: Option<f64>) -> BackendResult<ConvertFilter> {
    let filter = match code {
        0 => ConvertFilter::Negate,
        1 => ConvertFilter::Grayscale,
        2 => ConvertFilter::Brightness(require_arg(arg, "brightness")?.clamp(-255.0, 255.0) as i32),
        3 => ConvertFilter::Contrast(require_arg(arg, "contrast")? as f32),
        5 => ConvertFilter::EdgeDetect,
        6 => ConvertFilter::Emboss,
        7 => ConvertFilter::GaussianBlur,
        9 => ConvertFilter::MeanRemoval,
        10 => ConvertFilter::Smooth(require_arg(arg, "smooth")? as f32),
        11 => {
            let block = require_arg(arg, "pixelate")?;
            if block < 1.0 {
                return Err(invalid(CONVERT, "pixelate block size must be >= 1"));
            }
            ConvertFilter::Pixelate(block as u32)
        }
        other => return Err(BackendError::UnsupportedFilter(other.to_string())),
    };
    Ok(filter)
}

fn filter_from_name(name: &str, arg: Option<f64>) -> BackendResult<ConvertFilter> {
    let code = match name.trim().to_lowercase().replace('-', "_").as_str() {
        "negate" | "invert" => 0,
        "grayscale" | "greyscale" => 1,
        "brightness" => 2,
        "contrast" => 3,
        "edge_detect" | "edgedetect" => 5,
        "emboss" => 6,
        "gaussian_blur" => 7,
        "mean_removal" => 9,
        "smooth" => 10,
        "pixelate" => 11,
        _ => return Err(BackendError::UnsupportedFilter(name.to_string())),
    };
    filter_from_code(code, arg)
}

fn require_arg(arg: Option<f64>, filter: &str) -> BackendResult<f64> {
    match arg {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(CONVERT, &format!("{filter} requires a numeric arg"))),
    }
}

/// `cols`/`rows` as a target size, or `None` when neither is present.
fn dimensions(effect: &str, obj: &Map<String, Value>) -> BackendResult<Option<Dimensions>> {
    let cols = obj.get("cols");
    let rows = obj.get("rows");
    if cols.is_none() && rows.is_none() {
        return Ok(None);
    }
    let axis = |v: Option<&Value>, field: &str| -> BackendResult<u32> {
        match v {
            None => Ok(0),
            Some(v) => integer(v)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| invalid(effect, &format!("{field} must be a non-negative integer"))),
        }
    };
    Ok(Some(Dimensions {
        cols: axis(cols, "cols")?,
        rows: axis(rows, "rows")?,
    }))
}

fn filter(effect: &str, obj: &Map<String, Value>) -> BackendResult<ResampleFilter> {
    match obj.get("filter") {
        None | Some(Value::Null) => Ok(ResampleFilter::default()),
        Some(Value::String(s)) => ResampleFilter::parse(s)
            .ok_or_else(|| invalid(effect, &format!("unknown resample filter {s:?}"))),
        Some(_) => Err(invalid(effect, "filter must be a name")),
    }
}

fn percent(value: &Value) -> BackendResult<f32> {
    match number(value) {
        Some(p) if p.is_finite() && p > 0.0 => Ok(p as f32),
        _ => Err(invalid(RESIZE, "percent must be a number > 0")),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn invalid(effect: &str, message: &str) -> BackendError {
    BackendError::InvalidParams {
        effect: effect.to_string(),
        message: message.to_string(),
    }
}
