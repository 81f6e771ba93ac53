//! Black-box tests that cross the allocator/buffer/tensor boundary:
//! tensors served from an arena-backed allocator, reset between runs, and
//! tracked system allocations that must balance out.

use std::sync::Arc;

use tensor_graph_core::{Allocator, Arena, ArenaAllocator, DType, Shape, SystemAllocator, Tensor};

#[test]
fn tensors_can_be_served_from_an_arena_backed_allocator() {
    let arena = Arena::new(4096, 64);
    let backend: Arc<dyn Allocator> = Arc::new(ArenaAllocator::new(arena, true));

    let a = Tensor::new(Shape::from_dims([8, 8]), DType::F32, Some(backend.clone())).unwrap();
    let b = Tensor::new(Shape::from_dims([4]), DType::I32, Some(backend.clone())).unwrap();

    assert!(a.data_ptr().is_some());
    assert!(b.data_ptr().is_some());
    assert_eq!(backend.stats().live_allocations, 2);
}

#[test]
fn resetting_the_arena_allocator_reclaims_space_for_the_next_run() {
    let arena = Arena::new(256, 16);
    let concrete = Arc::new(ArenaAllocator::new(arena, true));
    let backend: Arc<dyn Allocator> = concrete.clone();
    let shape = Shape::from_dims([4, 4]);

    let _t1 = Tensor::new(shape.clone(), DType::F32, Some(backend.clone())).unwrap();
    let _t2 = Tensor::new(shape.clone(), DType::F32, Some(backend.clone())).unwrap();
    assert_eq!(concrete.stats().live_allocations, 2);
    let used_before_reset = concrete.arena_used();
    assert!(used_before_reset > 0);

    concrete.reset();
    assert_eq!(concrete.arena_used(), 0);
    assert_eq!(concrete.stats().live_allocations, 0);

    // The same backend, now empty, serves a fresh run.
    let _t3 = Tensor::new(shape, DType::F32, Some(backend)).unwrap();
    assert_eq!(concrete.stats().live_allocations, 1);
}

#[test]
fn oversized_tensor_allocation_from_an_exhausted_arena_is_out_of_memory() {
    let arena = Arena::new(16, 16);
    let backend: Arc<dyn Allocator> = Arc::new(ArenaAllocator::new(arena, false));
    let result = Tensor::new(Shape::from_dims([64, 64]), DType::F32, Some(backend));
    assert!(result.is_err());
}

#[test]
fn system_allocator_tracking_balances_across_many_tensor_constructions() {
    let backend: Arc<dyn Allocator> = Arc::new(SystemAllocator::tracked());
    {
        let mut tensors = Vec::new();
        for i in 1..=16usize {
            tensors.push(Tensor::new(Shape::from_dims([i as i64]), DType::F32, Some(backend.clone())).unwrap());
        }
        assert_eq!(backend.stats().live_allocations, 16);
    }
    // All tensors dropped: every allocation should have been freed.
    assert_eq!(backend.stats().live_allocations, 0);
    assert_eq!(backend.stats().live_bytes, 0);
}

#[test]
fn deep_clone_across_allocators_is_independent_storage() {
    let src_backend: Arc<dyn Allocator> = Arc::new(SystemAllocator::tracked());
    let dst_backend: Arc<dyn Allocator> = Arc::new(SystemAllocator::tracked());

    let t = Tensor::new(Shape::from_dims([4]), DType::F32, Some(src_backend.clone())).unwrap();
    let clone = t.deep_clone(Some(dst_backend.clone())).unwrap();

    assert_ne!(t.data_ptr(), clone.data_ptr());
    assert_eq!(src_backend.stats().live_allocations, 1);
    assert_eq!(dst_backend.stats().live_allocations, 1);
}
