//! Quantization parameters attached to a [`crate::tensor::Tensor`]: either a
//! single per-tensor `(scale, zero_point)` pair or parallel per-channel
//! vectors keyed by an axis.

use crate::error::{GPError, GPResult};

/// Either a per-tensor or a per-channel quantization scheme.
///
/// The two shapes are mutually exclusive in practice (a tensor is either
/// uniformly quantized or quantized along one axis), but both live behind
/// the same struct rather than an enum so that call sites built against the
/// source's tagged-union layout (and its `is_per_channel` predicate) port
/// over directly.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizationParams {
    pub scale: f32,
    pub zero_point: i32,
    pub per_channel_scales: Vec<f32>,
    pub per_channel_zero_points: Vec<i32>,
    pub axis: i64,
    pub symmetric: bool,
}

impl QuantizationParams {
    /// Per-tensor scheme: a single `scale > 0` and `zero_point`.
    pub fn per_tensor(scale: f32, zero_point: i32) -> GPResult<Self> {
        if !(scale > 0.0) {
            return Err(GPError::invalid_argument(format!(
                "QuantizationParams::per_tensor: scale must be > 0, got {scale}"
            )));
        }
        Ok(QuantizationParams {
            scale,
            zero_point,
            per_channel_scales: Vec::new(),
            per_channel_zero_points: Vec::new(),
            axis: 0,
            symmetric: zero_point == 0,
        })
    }

    /// Per-tensor symmetric scheme (`zero_point` pinned to 0).
    pub fn per_tensor_symmetric(scale: f32) -> GPResult<Self> {
        Self::per_tensor(scale, 0)
    }

    /// Per-channel scheme along `axis`. When `symmetric` is true,
    /// `zero_points` may be empty (all channels share the implicit zero
    /// point of zero); otherwise it must be the same length as `scales`.
    pub fn per_channel(scales: Vec<f32>, zero_points: Vec<i32>, axis: i64, symmetric: bool) -> GPResult<Self> {
        if scales.is_empty() {
            return Err(GPError::invalid_argument(
                "QuantizationParams::per_channel: scales must be non-empty",
            ));
        }
        if let Some(&bad) = scales.iter().find(|&&s| !(s > 0.0)) {
            return Err(GPError::invalid_argument(format!(
                "QuantizationParams::per_channel: every scale must be > 0, found {bad}"
            )));
        }
        if symmetric {
            if !zero_points.is_empty() && zero_points.iter().any(|&z| z != 0) {
                return Err(GPError::invalid_argument(
                    "QuantizationParams::per_channel: symmetric scheme requires zero_point == 0",
                ));
            }
        } else if zero_points.len() != scales.len() {
            return Err(GPError::invalid_argument(format!(
                "QuantizationParams::per_channel: zero_points.len()={} must equal scales.len()={} when non-symmetric",
                zero_points.len(),
                scales.len()
            )));
        }
        Ok(QuantizationParams {
            scale: scales[0],
            zero_point: zero_points.first().copied().unwrap_or(0),
            per_channel_scales: scales,
            per_channel_zero_points: zero_points,
            axis,
            symmetric,
        })
    }

    pub fn is_per_channel(&self) -> bool {
        !self.per_channel_scales.is_empty()
    }

    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }
}
