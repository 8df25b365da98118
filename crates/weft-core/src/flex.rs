//! Flex: the dynamic-content discipline shared by Binary/String/Symbol/Array
//! (spec.md §3.3, §4.C).
//!
//! A `Flex<T>` is either inline (0 or 1 element, stored without a heap
//! allocation) or dynamic (a growable buffer with `used <= rest`, plus a
//! `bias` of consumed leading slack). Array/Binary/String/Symbol are thin
//! typed wrappers over this one storage discipline so the used/rest/bias
//! invariants are enforced in exactly one place, per SPEC_FULL.md's
//! supplemented detail for [MODULE D].

use crate::error::{CoreError, CoreResult};
use crate::pool::{Lease, PooledAllocator};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Content<T> {
    /// Represents both the empty array (no cell at all) and the one-element
    /// array (a single inline cell) from spec.md §4.C.
    Inline(Option<T>),
    Dynamic {
        buf: Vec<T>,
        /// Leading slack already consumed by a left-trim (`bias`).
        bias: usize,
        lease: Option<Lease>,
    },
}

/// A contiguous sequence of same-width elements with pool-backed growth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flex<T> {
    content: Content<T>,
}

impl<T: Clone + Default> Flex<T> {
    pub fn new_inline_empty() -> Self {
        Flex {
            content: Content::Inline(None),
        }
    }

    pub fn new_inline_one(value: T) -> Self {
        Flex {
            content: Content::Inline(Some(value)),
        }
    }

    /// Allocates dynamic storage for at least `capacity` elements, rounding
    /// up through the pool's size classes (spec.md §4.A: "the caller
    /// receives `actual_capacity` so no space is wasted").
    pub fn new_dynamic(capacity: usize, element_width: usize, pool: &mut PooledAllocator) -> CoreResult<Self> {
        let lease = pool.alloc_buffer(capacity * element_width)?;
        let actual_elems = if element_width == 0 {
            capacity
        } else {
            lease.actual_capacity / element_width
        };
        Ok(Flex {
            content: Content::Dynamic {
                buf: Vec::with_capacity(actual_elems),
                bias: 0,
                lease: Some(lease),
            },
        })
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.content, Content::Dynamic { .. })
    }

    pub fn used(&self) -> usize {
        match &self.content {
            Content::Inline(None) => 0,
            Content::Inline(Some(_)) => 1,
            Content::Dynamic { buf, .. } => buf.len(),
        }
    }

    /// Capacity guaranteed by the allocator at creation time; for inline
    /// content this is just the inline slot count (spec.md §3.1).
    pub fn rest(&self) -> usize {
        match &self.content {
            Content::Inline(None) => 0,
            Content::Inline(Some(_)) => 1,
            Content::Dynamic { lease: Some(l), .. } => {
                let w = std::mem::size_of::<T>().max(1);
                l.actual_capacity / w
            }
            Content::Dynamic { lease: None, buf, .. } => buf.capacity(),
        }
    }

    pub fn bias(&self) -> usize {
        match &self.content {
            Content::Dynamic { bias, .. } => *bias,
            Content::Inline(_) => 0,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.content {
            Content::Inline(None) => &[],
            Content::Inline(Some(v)) => std::slice::from_ref(v),
            Content::Dynamic { buf, .. } => buf.as_slice(),
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.content {
            Content::Inline(None) => &mut [],
            Content::Inline(Some(v)) => std::slice::from_mut(v),
            Content::Dynamic { buf, .. } => buf.as_mut_slice(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// Grows `used` by pushing `extra` new elements, reallocating through
    /// the pool if `rest` is insufficient. Per spec.md §4.B, this may move
    /// the buffer: callers must treat any borrowed slice/pointer into this
    /// Flex as invalidated across a call to `expand`.
    pub fn expand(&mut self, extra: Vec<T>, pool: &mut PooledAllocator) -> CoreResult<()> {
        if extra.is_empty() {
            return Ok(());
        }
        match &mut self.content {
            Content::Inline(slot) => {
                let mut buf: Vec<T> = Vec::new();
                if let Some(v) = slot.take() {
                    buf.push(v);
                }
                buf.extend(extra);
                let element_width = std::mem::size_of::<T>().max(1);
                let lease = pool.alloc_buffer(buf.len() * element_width)?;
                self.content = Content::Dynamic {
                    buf,
                    bias: 0,
                    lease: Some(lease),
                };
                Ok(())
            }
            Content::Dynamic { buf, lease, .. } => {
                let needed = buf.len() + extra.len();
                let have = lease
                    .map(|l| l.actual_capacity / std::mem::size_of::<T>().max(1))
                    .unwrap_or(buf.capacity());
                if needed > have {
                    let element_width = std::mem::size_of::<T>().max(1);
                    if let Some(old) = lease.take() {
                        pool.free_buffer(old);
                    }
                    let new_lease = pool.alloc_buffer(needed * element_width)?;
                    *lease = Some(new_lease);
                }
                buf.extend(extra);
                Ok(())
            }
        }
    }

    pub fn push(&mut self, value: T, pool: &mut PooledAllocator) -> CoreResult<()> {
        self.expand(vec![value], pool)
    }

    /// Left-trims `count` leading elements by bumping `bias` instead of
    /// copying, per spec.md §3.1's "efficient left-trimming".
    pub fn trim_left(&mut self, count: usize) {
        if let Content::Dynamic { buf, bias, .. } = &mut self.content {
            let n = count.min(buf.len());
            buf.drain(0..n);
            *bias += n;
        } else if count >= 1 {
            if let Content::Inline(slot) = &mut self.content {
                *slot = None;
            }
        }
    }

    pub fn truncate(&mut self, len: usize) {
        match &mut self.content {
            Content::Inline(slot) => {
                if len == 0 {
                    *slot = None;
                }
            }
            Content::Dynamic { buf, .. } => buf.truncate(len),
        }
    }

    pub fn release(self, pool: &mut PooledAllocator) {
        if let Content::Dynamic {
            lease: Some(lease), ..
        } = self.content
        {
            pool.free_buffer(lease);
        }
    }
}

/// Invariant check matching spec.md §3.1: `used <= rest`.
pub fn check_used_le_rest<T: Clone + Default>(flex: &Flex<T>) -> CoreResult<()> {
    if flex.used() <= flex.rest() {
        Ok(())
    } else {
        Err(CoreError::TypeMismatch {
            expected: "used <= rest",
            found: "used > rest",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;

    #[test]
    fn empty_and_singular_arrays_stay_inline() {
        let empty: Flex<u8> = Flex::new_inline_empty();
        assert_eq!(empty.used(), 0);
        assert!(!empty.is_dynamic());

        let one = Flex::new_inline_one(7u8);
        assert_eq!(one.used(), 1);
        assert_eq!(one.as_slice(), &[7]);
    }

    #[test]
    fn expand_moves_inline_to_dynamic() {
        let mut pool = PooledAllocator::new(PoolConfig::default());
        let mut flex = Flex::new_inline_one(1u8);
        flex.expand(vec![2, 3], &mut pool).unwrap();
        assert!(flex.is_dynamic());
        assert_eq!(flex.as_slice(), &[1, 2, 3]);
        check_used_le_rest(&flex).unwrap();
    }

    #[test]
    fn expand_reallocates_when_rest_insufficient() {
        let mut pool = PooledAllocator::new(PoolConfig::default());
        let mut flex: Flex<u8> = Flex::new_dynamic(4, 1, &mut pool).unwrap();
        flex.expand(vec![1, 2, 3, 4], &mut pool).unwrap();
        flex.expand(vec![5, 6, 7, 8, 9], &mut pool).unwrap();
        assert_eq!(flex.used(), 9);
        check_used_le_rest(&flex).unwrap();
    }

    #[test]
    fn trim_left_bumps_bias_without_copy_semantics_change() {
        let mut pool = PooledAllocator::new(PoolConfig::default());
        let mut flex: Flex<u8> = Flex::new_dynamic(4, 1, &mut pool).unwrap();
        flex.expand(vec![10, 20, 30], &mut pool).unwrap();
        flex.trim_left(1);
        assert_eq!(flex.as_slice(), &[20, 30]);
        assert_eq!(flex.bias(), 1);
    }
}
