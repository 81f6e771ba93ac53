//! Element types and the pure numeric helpers (cast admissibility,
//! promotion, quantize/dequantize) that operate over them.
//!
//! Nothing in this module holds state; every function here is a free
//! function over `DType` or plain numeric arguments.

use crate::error::{GPError, GPResult};

/// The closed set of element types a `Tensor` can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Unknown,
    F32,
    F16,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
}

impl DType {
    /// Size of one element in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            DType::Unknown => 0,
            DType::F16 | DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::I64 | DType::U64 => 8,
            DType::I8 | DType::U8 | DType::Bool => 1,
        }
    }

    pub fn is_floating(self) -> bool {
        matches!(self, DType::F32 | DType::F16)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DType::I8 | DType::I16 | DType::I32 | DType::I64 | DType::U8 | DType::U16 | DType::U32 | DType::U64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32 | DType::I64 | DType::F32 | DType::F16)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, DType::U8 | DType::U16 | DType::U32 | DType::U64)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, DType::Bool)
    }

    /// True only for the two types this core treats as quantized.
    pub fn is_quantized(self) -> bool {
        matches!(self, DType::I8 | DType::U8)
    }

    /// Fixed promotion precedence: `F32 > F16 > I64 > U64 > I32 > U32 > I16
    /// > U16 > I8 > U8 > Bool`. Promoting with `Unknown` always yields
    /// `Unknown`.
    pub fn promote(self, other: DType) -> DType {
        if self == DType::Unknown || other == DType::Unknown {
            return DType::Unknown;
        }
        if precedence(self) <= precedence(other) {
            self
        } else {
            other
        }
    }

    /// Whether a value of this dtype can be cast to `target` by this core's
    /// rules: identity, float<->float, int<->int, float<->int, and
    /// Bool<->any-non-Unknown.
    pub fn can_cast_to(self, target: DType) -> bool {
        if self == DType::Unknown || target == DType::Unknown {
            return false;
        }
        if self == target {
            return true;
        }
        if self == DType::Bool || target == DType::Bool {
            return true;
        }
        let self_numeric = self.is_floating() || self.is_integer();
        let target_numeric = target.is_floating() || target.is_integer();
        self_numeric && target_numeric
    }
}

/// Lower value sorts first in the promotion ordering: `F32` is rank 0 (most
/// preferred), `Bool` is rank 10 (least preferred).
fn precedence(dt: DType) -> u8 {
    match dt {
        DType::F32 => 0,
        DType::F16 => 1,
        DType::I64 => 2,
        DType::U64 => 3,
        DType::I32 => 4,
        DType::U32 => 5,
        DType::I16 => 6,
        DType::U16 => 7,
        DType::I8 => 8,
        DType::U8 => 9,
        DType::Bool => 10,
        DType::Unknown => 11,
    }
}

// --- Quantization helpers -------------------------------------------------

/// `round(x / scale)` clamped to `[-128, 127]`.
pub fn quantize_symmetric_i8(x: f32, scale: f32) -> GPResult<i8> {
    if scale <= 0.0 {
        return Err(GPError::invalid_argument(format!(
            "quantize_symmetric_i8: scale must be > 0, got {scale}"
        )));
    }
    let v = (x / scale).round().clamp(-128.0, 127.0);
    Ok(v as i8)
}

/// Linear inverse of [`quantize_symmetric_i8`]; never fails.
pub fn dequantize_symmetric_i8(q: i8, scale: f32) -> f32 {
    q as f32 * scale
}

/// `round(x / scale) + zero_point` clamped to `[0, 255]`.
pub fn quantize_asymmetric_u8(x: f32, scale: f32, zero_point: i32) -> GPResult<u8> {
    if scale <= 0.0 {
        return Err(GPError::invalid_argument(format!(
            "quantize_asymmetric_u8: scale must be > 0, got {scale}"
        )));
    }
    let v = ((x / scale).round() as i32 + zero_point).clamp(0, 255);
    Ok(v as u8)
}

/// Linear inverse of [`quantize_asymmetric_u8`]; never fails.
pub fn dequantize_asymmetric_u8(q: u8, scale: f32, zero_point: i32) -> f32 {
    (q as i32 - zero_point) as f32 * scale
}

/// Derive a symmetric `(scale, zero_point=0)` pair for `target` (I8 or U8)
/// from an observed `[min, max]` range.
///
/// `abs_max = max(|min|, |max|)`; if `abs_max < 1e-8` the scale is pinned to
/// `1.0` to avoid division by a near-zero range.
pub fn calculate_symmetric_quant_params(min: f32, max: f32, target: DType) -> GPResult<(f32, i32)> {
    let abs_max = min.abs().max(max.abs());
    let scale = if abs_max < 1e-8 {
        1.0
    } else {
        match target {
            DType::I8 => abs_max / 127.0,
            DType::U8 => abs_max / 255.0,
            _ => {
                return Err(GPError::invalid_argument(format!(
                    "calculate_symmetric_quant_params: unsupported target dtype {target:?}"
                )))
            }
        }
    };
    Ok((scale, 0))
}

/// Derive an asymmetric `(scale, zero_point)` pair for `U8` from an observed
/// `[min, max]` range. Requires `min < max`.
pub fn calculate_asymmetric_quant_params(min: f32, max: f32, target: DType) -> GPResult<(f32, i32)> {
    if target != DType::U8 {
        return Err(GPError::invalid_argument(format!(
            "calculate_asymmetric_quant_params: target must be U8, got {target:?}"
        )));
    }
    if !(min < max) {
        return Err(GPError::invalid_argument(format!(
            "calculate_asymmetric_quant_params: require min < max, got min={min}, max={max}"
        )));
    }
    let scale = (max - min) / 255.0;
    let zero_point = ((-min / scale).round() as i32).clamp(0, 255);
    Ok((scale, zero_point))
}

/// Apply [`calculate_symmetric_quant_params`] or
/// [`calculate_asymmetric_quant_params`] independently over parallel
/// per-channel `[min, max]` observations.
///
/// `zero_points` is only populated when `symmetric` is false; a symmetric
/// per-channel result carries an empty zero-point vector (all channels share
/// the implicit zero point of zero).
pub fn calculate_per_channel(
    mins: &[f32],
    maxs: &[f32],
    target: DType,
    symmetric: bool,
) -> GPResult<(Vec<f32>, Vec<i32>)> {
    if mins.len() != maxs.len() {
        return Err(GPError::invalid_argument(format!(
            "calculate_per_channel: mins.len()={} != maxs.len()={}",
            mins.len(),
            maxs.len()
        )));
    }
    let mut scales = Vec::with_capacity(mins.len());
    let mut zero_points = Vec::with_capacity(mins.len());
    for (&min, &max) in mins.iter().zip(maxs.iter()) {
        let (scale, zp) = if symmetric {
            calculate_symmetric_quant_params(min, max, target)?
        } else {
            calculate_asymmetric_quant_params(min, max, target)?
        };
        scales.push(scale);
        if !symmetric {
            zero_points.push(zp);
        }
    }
    Ok((scales, zero_points))
}
