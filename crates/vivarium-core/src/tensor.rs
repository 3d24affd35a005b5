//! Non-owning typed tensor views over backend-owned export buffers.
//!
//! A [`Tensor`] never owns memory. The active backend's arena owns every
//! exported buffer for the life of the backend; the manager hands out views
//! carrying a base address, an element type, and shape metadata. Host views
//! can be reinterpreted as typed slices without copying; device views expose
//! only the raw device address plus the owning device ordinal.

use std::marker::PhantomData;

use bytemuck::Pod;

/// Element type of an exported tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    I32,
    F32,
    U8,
}

impl ElementType {
    /// Size of one element in bytes.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            ElementType::I32 | ElementType::F32 => 4,
            ElementType::U8 => 1,
        }
    }
}

/// Multiply out a shape, checking for overflow.
pub fn shape_elems(dims: &[i64]) -> usize {
    dims.iter().fold(1usize, |acc, &d| {
        debug_assert!(d >= 0, "negative tensor dimension");
        acc.checked_mul(d as usize).expect("tensor shape overflow")
    })
}

/// A fixed-shape numeric view over a buffer owned by the active backend.
///
/// The lifetime parameter ties the view to the borrow of the backend that
/// produced it, so a tensor can never outlive the memory it points into.
pub struct Tensor<'a> {
    ptr: *const u8,
    elem: ElementType,
    dims: Vec<i64>,
    device: Option<i32>,
    _borrow: PhantomData<&'a [u8]>,
}

impl<'a> Tensor<'a> {
    /// View over a host-memory slice.
    ///
    /// The slice's byte length must match the shape exactly.
    pub fn from_host_slice<T: Pod>(data: &'a [T], elem: ElementType, dims: Vec<i64>) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        assert_eq!(
            bytes.len(),
            shape_elems(&dims) * elem.size(),
            "tensor shape does not cover the backing buffer"
        );
        Self {
            ptr: bytes.as_ptr(),
            elem,
            dims,
            device: None,
            _borrow: PhantomData,
        }
    }

    /// View over device memory identified by a raw device address.
    ///
    /// The caller asserts that `addr` points at `shape_elems(dims)` elements
    /// of `elem` in memory owned by device `device`, valid for `'a`.
    pub fn from_device_ptr(addr: u64, elem: ElementType, dims: Vec<i64>, device: i32) -> Self {
        Self {
            ptr: addr as *const u8,
            elem,
            dims,
            device: Some(device),
            _borrow: PhantomData,
        }
    }

    /// Shape of the tensor, outermost dimension first.
    #[inline]
    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    /// Element type of the tensor.
    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.elem
    }

    /// Device ordinal for device-resident tensors, `None` for host memory.
    #[inline]
    pub fn device(&self) -> Option<i32> {
        self.device
    }

    /// Total number of elements.
    #[inline]
    pub fn num_elements(&self) -> usize {
        shape_elems(&self.dims)
    }

    /// Total size in bytes.
    #[inline]
    pub fn num_bytes(&self) -> usize {
        self.num_elements() * self.elem.size()
    }

    /// Reinterpret a host tensor as a typed slice. Zero-copy.
    ///
    /// Panics if the tensor lives in device memory or `T` does not match
    /// the declared element type; both are caller contract violations, not
    /// runtime conditions.
    pub fn as_slice<T: Pod>(&self) -> &'a [T] {
        assert!(
            self.device.is_none(),
            "as_slice called on a device-resident tensor"
        );
        assert_eq!(
            std::mem::size_of::<T>(),
            self.elem.size(),
            "element type mismatch in tensor view"
        );
        // Host tensors are always constructed from a live slice with a
        // checked length, so the reconstruction cannot go out of bounds.
        unsafe { std::slice::from_raw_parts(self.ptr as *const T, self.num_elements()) }
    }

    /// Raw device address of a device-resident tensor.
    ///
    /// Panics on host tensors.
    pub fn device_ptr(&self) -> u64 {
        assert!(
            self.device.is_some(),
            "device_ptr called on a host-resident tensor"
        );
        self.ptr as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_view_roundtrip() {
        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let t = Tensor::from_host_slice(&data, ElementType::F32, vec![2, 3]);
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(t.num_elements(), 6);
        assert_eq!(t.num_bytes(), 24);
        assert_eq!(t.device(), None);
        assert_eq!(t.as_slice::<f32>(), &data[..]);
    }

    #[test]
    fn test_i32_view() {
        let data: Vec<i32> = vec![0, 1, 0, 1];
        let t = Tensor::from_host_slice(&data, ElementType::I32, vec![4, 1]);
        assert_eq!(t.as_slice::<i32>(), &[0, 1, 0, 1]);
    }

    #[test]
    #[should_panic(expected = "shape does not cover")]
    fn test_shape_mismatch_panics() {
        let data: Vec<f32> = vec![0.0; 5];
        let _ = Tensor::from_host_slice(&data, ElementType::F32, vec![2, 3]);
    }

    #[test]
    fn test_device_view_metadata() {
        let t = Tensor::from_device_ptr(0xdead_0000, ElementType::U8, vec![4, 2, 8, 8, 4], 0);
        assert_eq!(t.device(), Some(0));
        assert_eq!(t.num_elements(), 4 * 2 * 8 * 8 * 4);
        assert_eq!(t.device_ptr(), 0xdead_0000);
    }

    #[test]
    fn test_shape_elems_empty_is_scalar() {
        assert_eq!(shape_elems(&[]), 1);
    }
}
