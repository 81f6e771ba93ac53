//! Shape + dtype + stride + storage, and the non-owning view operations
//! (slice/reshape/transpose) that share a parent's data.

use std::ptr::NonNull;
use std::sync::Arc;

use crate::alloc::Allocator;
use crate::buffer::Buffer;
use crate::dtype::DType;
use crate::error::{GPError, GPResult};
use crate::quant::QuantizationParams;
use crate::shape::Shape;

/// A typed, strided view over a (possibly shared) region of memory.
///
/// Copy semantics are deliberately **shallow**: cloning a `Tensor` produces
/// a second non-owning handle over the same bytes (see
/// [`Tensor::shallow_copy`]). Callers who need an independent copy call
/// [`Tensor::deep_clone`] explicitly.
#[derive(Debug)]
pub struct Tensor {
    shape: Shape,
    dtype: DType,
    /// Byte strides, one per axis, `strides.len() == shape.rank()`.
    strides: Vec<i64>,
    data: Option<Buffer>,
    /// Raw pointer for non-owning views that don't hold a `Buffer`
    /// themselves (e.g. `slice`/`transpose`, which share a parent's
    /// allocation): the parent must outlive any such view.
    view_ptr: Option<NonNull<u8>>,
    owns_data: bool,
    quant_params: Option<QuantizationParams>,
}

// SAFETY: Tensor's raw pointers reference either an owned `Buffer` (already
// `Send`) or caller-managed memory whose lifetime is the caller's
// responsibility; no interior aliasing is introduced by sending a Tensor.
unsafe impl Send for Tensor {}

impl Tensor {
    /// Allocate a new, owning tensor of `shape`/`dtype` with contiguous
    /// row-major byte strides. `dtype` must not be `Unknown` if the tensor
    /// has any elements. Fails with `OutOfMemory` if the backing allocation
    /// fails.
    pub fn new(shape: Shape, dtype: DType, allocator: Option<Arc<dyn Allocator>>) -> GPResult<Self> {
        let num_elements = shape.num_elements();
        if num_elements > 0 && dtype == DType::Unknown {
            return Err(GPError::invalid_argument(
                "Tensor::new: dtype must not be Unknown for a non-empty tensor",
            ));
        }
        let byte_size = (num_elements as usize) * dtype.byte_size();
        let strides = contiguous_byte_strides(&shape, dtype);

        if byte_size == 0 {
            return Ok(Tensor {
                shape,
                dtype,
                strides,
                data: None,
                view_ptr: None,
                owns_data: false,
                quant_params: None,
            });
        }

        let alignment = dtype.byte_size().max(1);
        let buffer = Buffer::allocate(byte_size, alignment, allocator, false).ok_or_else(|| {
            GPError::out_of_memory(format!("Tensor::new: failed to allocate {byte_size} bytes"))
        })?;
        let view_ptr = buffer.data_ptr();
        Ok(Tensor {
            shape,
            dtype,
            strides,
            data: Some(buffer),
            view_ptr,
            owns_data: true,
            quant_params: None,
        })
    }

    /// Wrap externally-owned memory as a non-owning tensor (the typical
    /// shape of a caller-provided graph input).
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes covering
    /// `shape.num_elements() * dtype.byte_size()` bytes, for at least as
    /// long as this `Tensor` (and any views derived from it) are used.
    pub unsafe fn from_raw_parts(shape: Shape, dtype: DType, ptr: NonNull<u8>) -> Self {
        let strides = contiguous_byte_strides(&shape, dtype);
        Tensor {
            shape,
            dtype,
            strides,
            data: None,
            view_ptr: Some(ptr),
            owns_data: false,
            quant_params: None,
        }
    }

    /// A shallow, non-owning copy that shares the same data pointer and
    /// strides. This is the core's "copy constructor": it never allocates
    /// and the copy never owns data, matching §4.6's ownership contract.
    pub fn shallow_copy(&self) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            dtype: self.dtype,
            strides: self.strides.clone(),
            data: None,
            view_ptr: self.view_ptr,
            owns_data: false,
            quant_params: self.quant_params.clone(),
        }
    }

    /// An independent copy with freshly allocated, owned storage
    /// containing the same bytes. Must be called explicitly — it is never
    /// invoked implicitly by this core.
    pub fn deep_clone(&self, allocator: Option<Arc<dyn Allocator>>) -> GPResult<Tensor> {
        let mut out = Tensor::new(self.shape.clone(), self.dtype, allocator)?;
        out.quant_params = self.quant_params.clone();
        if let (Some(src), Some(dst)) = (self.data_ptr(), out.data_ptr()) {
            let len = self.byte_len();
            // SAFETY: `out` was just allocated with exactly `len` bytes for
            // the same shape/dtype; `src` is valid for `len` bytes by this
            // tensor's own invariant.
            unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), len) };
        }
        Ok(out)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    pub fn owns_data(&self) -> bool {
        self.owns_data
    }

    pub fn data_ptr(&self) -> Option<NonNull<u8>> {
        self.view_ptr
    }

    pub fn quant_params(&self) -> Option<&QuantizationParams> {
        self.quant_params.as_ref()
    }

    pub fn set_quant_params(&mut self, params: Option<QuantizationParams>) {
        self.quant_params = params;
    }

    fn byte_len(&self) -> usize {
        self.shape.num_elements() as usize * self.dtype.byte_size()
    }

    /// Recompute `strides` as the contiguous row-major byte strides for
    /// this tensor's current shape/dtype.
    pub fn compute_strides(&mut self) {
        self.strides = contiguous_byte_strides(&self.shape, self.dtype);
    }

    /// Whether traversing axes right-to-left and accumulating the expected
    /// byte stride from `element_size` matches the stored strides exactly.
    /// Rank 0 and zero-element tensors are vacuously contiguous.
    pub fn is_contiguous(&self) -> bool {
        if self.shape.rank() == 0 || self.shape.num_elements() == 0 {
            return true;
        }
        let mut expected = self.dtype.byte_size() as i64;
        for axis in (0..self.shape.rank()).rev() {
            if self.strides[axis] != expected {
                return false;
            }
            expected *= self.shape.dims()[axis];
        }
        true
    }

    /// Structural self-check: non-empty tensors must have non-null data,
    /// a concrete dtype, one stride per axis, and (if quantized) a
    /// positive scale.
    pub fn validate(&self) -> GPResult<()> {
        if self.shape.num_elements() > 0 && self.view_ptr.is_none() {
            return Err(GPError::runtime("Tensor::validate: non-empty tensor has null data"));
        }
        if self.dtype == DType::Unknown && self.shape.num_elements() > 0 {
            return Err(GPError::runtime("Tensor::validate: dtype must not be Unknown"));
        }
        if self.strides.len() != self.shape.rank() {
            return Err(GPError::runtime(format!(
                "Tensor::validate: strides.len()={} != rank()={}",
                self.strides.len(),
                self.shape.rank()
            )));
        }
        if self.dtype.is_quantized() {
            let scale_ok = match &self.quant_params {
                Some(q) if q.is_per_channel() => q.per_channel_scales.iter().all(|&s| s > 0.0),
                Some(q) => q.scale > 0.0,
                None => false,
            };
            if !scale_ok {
                return Err(GPError::runtime(
                    "Tensor::validate: quantized tensor requires quant_params with scale > 0",
                ));
            }
        }
        Ok(())
    }

    /// A non-owning view selecting `[start, end)` (half-open, negative
    /// indices resolved against the axis size) along each axis. The result
    /// keeps the parent's strides, so it is generally non-contiguous.
    pub fn slice(&self, ranges: &[(i64, i64)]) -> GPResult<Tensor> {
        if ranges.len() != self.shape.rank() {
            return Err(GPError::invalid_argument(format!(
                "Tensor::slice: expected {} ranges, got {}",
                self.shape.rank(),
                ranges.len()
            )));
        }
        let mut new_dims = Vec::with_capacity(ranges.len());
        let mut byte_offset: i64 = 0;
        for (axis, &(start, end)) in ranges.iter().enumerate() {
            let dim_size = self.shape.dims()[axis];
            let resolve = |v: i64| if v < 0 { v + dim_size } else { v };
            let start = resolve(start);
            let end = resolve(end);
            if start < 0 || end < start || end > dim_size {
                return Err(GPError::invalid_argument(format!(
                    "Tensor::slice: axis {axis} range ({start}, {end}) out of bounds for dim {dim_size}"
                )));
            }
            new_dims.push(end - start);
            byte_offset += start * self.strides[axis];
        }
        let new_shape = Shape::new(new_dims)?;
        let base = self
            .view_ptr
            .ok_or_else(|| GPError::runtime("Tensor::slice: cannot slice a tensor with no data"))?;
        // SAFETY: `byte_offset` is within the bounds implied by the
        // per-axis ranges, each bounded by its dim size and the tensor's
        // own stride invariants.
        let offset_ptr = unsafe { NonNull::new_unchecked(base.as_ptr().offset(byte_offset as isize)) };
        Ok(Tensor {
            shape: new_shape,
            dtype: self.dtype,
            strides: self.strides.clone(),
            data: None,
            view_ptr: Some(offset_ptr),
            owns_data: false,
            quant_params: self.quant_params.clone(),
        })
    }

    /// A non-owning view with a new shape and freshly computed contiguous
    /// strides. Requires equal element counts and that `self` is currently
    /// contiguous (a reshape of a strided view is a `RuntimeError`: the
    /// data is not laid out the way the new shape would imply).
    pub fn reshape(&self, new_shape: Shape) -> GPResult<Tensor> {
        if !Shape::can_reshape(&self.shape, &new_shape) {
            return Err(GPError::invalid_argument(format!(
                "Tensor::reshape: element count mismatch ({} vs {})",
                self.shape.num_elements(),
                new_shape.num_elements()
            )));
        }
        if !self.is_contiguous() {
            return Err(GPError::runtime("Tensor::reshape: source tensor is not contiguous"));
        }
        let strides = contiguous_byte_strides(&new_shape, self.dtype);
        Ok(Tensor {
            shape: new_shape,
            dtype: self.dtype,
            strides,
            data: None,
            view_ptr: self.view_ptr,
            owns_data: false,
            quant_params: self.quant_params.clone(),
        })
    }

    /// A non-owning view permuting both dims and strides by `axes`, a
    /// permutation of `[0, rank)`.
    pub fn transpose(&self, axes: &[usize]) -> GPResult<Tensor> {
        let rank = self.shape.rank();
        if axes.len() != rank {
            return Err(GPError::invalid_argument(format!(
                "Tensor::transpose: expected {rank} axes, got {}",
                axes.len()
            )));
        }
        let mut seen = vec![false; rank];
        for &a in axes {
            if a >= rank || seen[a] {
                return Err(GPError::invalid_argument(format!(
                    "Tensor::transpose: {axes:?} is not a permutation of [0, {rank})"
                )));
            }
            seen[a] = true;
        }
        let new_dims: Vec<i64> = axes.iter().map(|&a| self.shape.dims()[a]).collect();
        let new_strides: Vec<i64> = axes.iter().map(|&a| self.strides[a]).collect();
        Ok(Tensor {
            shape: Shape::new(new_dims)?,
            dtype: self.dtype,
            strides: new_strides,
            data: None,
            view_ptr: self.view_ptr,
            owns_data: false,
            quant_params: self.quant_params.clone(),
        })
    }
}

/// Contiguous row-major byte strides for `shape` at `dtype`'s element size.
fn contiguous_byte_strides(shape: &Shape, dtype: DType) -> Vec<i64> {
    let elem = dtype.byte_size() as i64;
    let mut strides = vec![elem; shape.rank()];
    let mut acc = elem;
    for i in (0..shape.rank()).rev() {
        strides[i] = acc;
        acc *= shape.dims()[i];
    }
    strides
}
