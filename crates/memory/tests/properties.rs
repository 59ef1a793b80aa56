//! Property tests shared by every allocator

use std::ptr::NonNull;

use proptest::prelude::*;
use strata_memory::allocator::{
    Allocator, BlockAllocator, Deallocator, MemoryUsage, MonotonicAllocator, MultipoolAllocator,
    PoolAllocator, Resettable, StackAllocator,
};

#[derive(Debug, Clone)]
enum Op {
    Alloc { size: usize, align_shift: u32 },
    Free { pick: usize },
}

fn ops(max_size: usize) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => (1..=max_size, 0u32..=4).prop_map(|(size, align_shift)| Op::Alloc { size, align_shift }),
        2 => any::<usize>().prop_map(|pick| Op::Free { pick }),
    ];
    prop::collection::vec(op, 0..64)
}

/// Runs `ops` against an allocator that frees in any order, checking the
/// usage invariants after every step
fn run_unordered<A>(allocator: &A, ops: &[Op]) -> Vec<NonNull<u8>>
where
    A: Deallocator + MemoryUsage,
{
    let mut live = Vec::new();
    for op in ops {
        match *op {
            Op::Alloc { size, align_shift } => {
                let alignment = 1usize << align_shift;
                if let Some(ptr) = allocator.allocate(size, alignment) {
                    assert_eq!(ptr.as_ptr() as usize % alignment, 0);
                    live.push(ptr);
                }
            }
            Op::Free { pick } => {
                if !live.is_empty() {
                    let ptr = live.swap_remove(pick % live.len());
                    // SAFETY: ptr is live, owned here and never dereferenced.
                    unsafe { allocator.free(ptr) };
                }
            }
        }
        assert!(allocator.memory_usage() <= allocator.max_size());
        assert_eq!(allocator.allocation_count(), live.len());
    }
    live
}

proptest! {
    #[test]
    fn pool_counters_stay_consistent(block_count in 1usize..16, ops in ops(64)) {
        let mut pool = PoolAllocator::new(block_count, 64).unwrap();
        let live = run_unordered(&pool, &ops);
        prop_assert_eq!(pool.memory_usage(), live.len() * 64);
        prop_assert_eq!(pool.free_blocks(), block_count - live.len());

        pool.clear();
        prop_assert_eq!(pool.memory_usage(), 0);
        prop_assert_eq!(pool.allocation_count(), 0);
    }

    #[test]
    fn multipool_counters_stay_consistent(
        block_count in 1usize..4,
        pool_depth in 0usize..4,
        ops in ops(128),
    ) {
        let mut pool = MultipoolAllocator::new(block_count, 128, pool_depth).unwrap();
        let live = run_unordered(&pool, &ops);
        let expected: usize = live
            .iter()
            .map(|&ptr| pool.allocation_capacity(Some(ptr)))
            .sum();
        prop_assert_eq!(pool.memory_usage(), expected);

        pool.clear();
        prop_assert_eq!(pool.memory_usage(), 0);
        prop_assert_eq!(pool.allocation_count(), 0);
    }

    #[test]
    fn pool_reuses_freed_block(block_count in 1usize..8, size in 1usize..=32) {
        let pool = PoolAllocator::new(block_count, 32).unwrap();
        let ptr = pool.allocate(32, 8).unwrap();
        unsafe { pool.free(ptr) };
        prop_assert_eq!(pool.allocate(size, 1), Some(ptr));
    }

    #[test]
    fn stack_lifo_sequences_unwind_to_zero(
        requests in prop::collection::vec((1usize..64, 0u32..=5), 0..32),
    ) {
        let mut stack = StackAllocator::new(4096).unwrap();
        let mut live = Vec::new();
        for &(size, shift) in &requests {
            let alignment = 1usize << shift;
            if let Some(ptr) = stack.allocate(size, alignment) {
                prop_assert_eq!(ptr.as_ptr() as usize % alignment, 0);
                if let Some(&previous) = live.last() {
                    prop_assert!(previous < ptr);
                }
                live.push(ptr);
            }
            prop_assert!(stack.memory_usage() <= stack.max_size());
            prop_assert_eq!(stack.allocation_count(), live.len());
        }

        while let Some(ptr) = live.pop() {
            unsafe { stack.free(ptr) };
        }
        prop_assert_eq!(stack.memory_usage(), 0);

        stack.clear();
        prop_assert_eq!(stack.memory_usage(), 0);
        prop_assert_eq!(stack.allocation_count(), 0);
    }

    #[test]
    fn monotonic_respects_capacity_and_alignment(
        capacity in 1usize..1024,
        requests in prop::collection::vec((1usize..128, 0u32..=6), 0..48),
    ) {
        let mut arena = MonotonicAllocator::new(capacity).unwrap();
        let mut count = 0;
        for &(size, shift) in &requests {
            let alignment = 1usize << shift;
            let predicted = arena.can_allocate(size, alignment);
            let result = arena.allocate(size, alignment);
            prop_assert_eq!(predicted, result.is_some());
            if let Some(ptr) = result {
                prop_assert_eq!(ptr.as_ptr() as usize % alignment, 0);
                count += 1;
            }
            prop_assert!(arena.memory_usage() <= arena.max_size());
            prop_assert_eq!(arena.allocation_count(), count);
        }

        arena.clear();
        prop_assert_eq!(arena.memory_usage(), 0);
        prop_assert_eq!(arena.allocation_count(), 0);
    }
}
