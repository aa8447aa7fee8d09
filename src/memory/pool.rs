//! Size-class pools backing series storage
//!
//! Every series buffer is drawn from a [`Pool`] chosen by rounding the
//! requested byte size (`width * capacity`) up to the nearest size class.
//! Requests above the largest class get dedicated storage that is handed back
//! to the system allocator as soon as it is freed.
//!
//! Freed buffers are not released: they are pushed onto their pool's
//! free-list as a [`Segment`] and recycled by the next request of the same
//! class and element width. Contents are only cleared at reuse time. A pool
//! whose segments are all on the free-list is idle and may be trimmed with
//! [`Pools::release_idle`].

use super::value::Value;
use crate::interpreter::constants::{POOL_CLASS_COUNT, POOL_MIN_CLASS_BYTES};

/// Element width of a series buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Cell,
    Char,
    Byte,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::Cell => std::mem::size_of::<Value>(),
            Width::Char => std::mem::size_of::<char>(),
            Width::Byte => 1,
        }
    }
}

/// Which pool a series buffer belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolClass {
    Sized(u8),
    Oversized,
    /// Node-only series (actions, ports): header slot, no pooled buffer
    Unpooled,
}

/// A retired buffer waiting on a free-list
#[derive(Debug)]
pub enum Segment {
    Cells(Vec<Value>),
    Chars(Vec<char>),
    Bytes(Vec<u8>),
}

impl Segment {
    fn width(&self) -> Width {
        match self {
            Segment::Cells(_) => Width::Cell,
            Segment::Chars(_) => Width::Char,
            Segment::Bytes(_) => Width::Byte,
        }
    }
}

/// Element types that can live in a pooled buffer
pub trait Element: Sized {
    const WIDTH: Width;
    fn into_segment(buf: Vec<Self>) -> Segment;
    fn from_segment(segment: Segment) -> Option<Vec<Self>>;
}

impl Element for Value {
    const WIDTH: Width = Width::Cell;
    fn into_segment(buf: Vec<Self>) -> Segment {
        Segment::Cells(buf)
    }
    fn from_segment(segment: Segment) -> Option<Vec<Self>> {
        match segment {
            Segment::Cells(buf) => Some(buf),
            _ => None,
        }
    }
}

impl Element for char {
    const WIDTH: Width = Width::Char;
    fn into_segment(buf: Vec<Self>) -> Segment {
        Segment::Chars(buf)
    }
    fn from_segment(segment: Segment) -> Option<Vec<Self>> {
        match segment {
            Segment::Chars(buf) => Some(buf),
            _ => None,
        }
    }
}

impl Element for u8 {
    const WIDTH: Width = Width::Byte;
    fn into_segment(buf: Vec<Self>) -> Segment {
        Segment::Bytes(buf)
    }
    fn from_segment(segment: Segment) -> Option<Vec<Self>> {
        match segment {
            Segment::Bytes(buf) => Some(buf),
            _ => None,
        }
    }
}

/// One size class
#[derive(Debug)]
pub struct Pool {
    pub size: usize,
    in_use: usize,
    free: Vec<Segment>,
}

/// Occupancy report for one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub in_use: usize,
    pub free: usize,
}

/// All pools of one heap
#[derive(Debug)]
pub struct Pools {
    pools: Vec<Pool>,
    oversized_in_use: usize,
}

impl Pools {
    pub fn new() -> Self {
        let pools = (0..POOL_CLASS_COUNT)
            .map(|i| Pool {
                size: POOL_MIN_CLASS_BYTES << i,
                in_use: 0,
                free: Vec::new(),
            })
            .collect();
        Pools {
            pools,
            oversized_in_use: 0,
        }
    }

    /// Round a byte request up to its size class
    pub fn class_for(&self, bytes: usize) -> PoolClass {
        self.pools
            .iter()
            .position(|p| p.size >= bytes)
            .map(|i| PoolClass::Sized(i as u8))
            .unwrap_or(PoolClass::Oversized)
    }

    /// Byte size granted for a class (requested bytes for oversized storage)
    pub fn class_bytes(&self, class: PoolClass, requested: usize) -> usize {
        match class {
            PoolClass::Sized(i) => self.pools[i as usize].size,
            PoolClass::Oversized => requested,
            PoolClass::Unpooled => 0,
        }
    }

    /// Take an empty buffer able to hold at least `capacity` elements.
    ///
    /// Returns the buffer, its class and the element capacity it was granted.
    pub fn take<T: Element>(&mut self, capacity: usize) -> (Vec<T>, PoolClass, usize) {
        let width = T::WIDTH.bytes();
        let requested = capacity.max(1).saturating_mul(width);
        let class = self.class_for(requested);
        match class {
            PoolClass::Sized(i) => {
                let pool = &mut self.pools[i as usize];
                let granted = pool.size / width;
                pool.in_use += 1;
                let recycled = pool
                    .free
                    .iter()
                    .rposition(|s| s.width() == T::WIDTH)
                    .map(|pos| pool.free.swap_remove(pos))
                    .and_then(T::from_segment);
                let buf = match recycled {
                    Some(mut buf) => {
                        buf.clear();
                        if buf.capacity() < granted {
                            buf.reserve_exact(granted);
                        }
                        buf
                    }
                    None => Vec::with_capacity(granted),
                };
                (buf, class, granted)
            }
            PoolClass::Oversized | PoolClass::Unpooled => {
                self.oversized_in_use += 1;
                (Vec::with_capacity(capacity), PoolClass::Oversized, capacity)
            }
        }
    }

    /// Return a buffer to the pool it came from
    pub fn give<T: Element>(&mut self, class: PoolClass, buf: Vec<T>) {
        match class {
            PoolClass::Sized(i) => {
                let pool = &mut self.pools[i as usize];
                debug_assert!(pool.in_use > 0, "pool underflow");
                pool.in_use = pool.in_use.saturating_sub(1);
                pool.free.push(T::into_segment(buf));
            }
            PoolClass::Oversized => {
                self.oversized_in_use = self.oversized_in_use.saturating_sub(1);
            }
            PoolClass::Unpooled => {}
        }
    }

    /// Drop the free-lists of pools with no segment in use.
    ///
    /// Returns the number of segments released.
    pub fn release_idle(&mut self) -> usize {
        let mut released = 0;
        for pool in &mut self.pools {
            if pool.in_use == 0 && !pool.free.is_empty() {
                released += pool.free.len();
                pool.free.clear();
                pool.free.shrink_to_fit();
            }
        }
        released
    }

    pub fn stats(&self) -> Vec<PoolStats> {
        self.pools
            .iter()
            .map(|p| PoolStats {
                size: p.size,
                in_use: p.in_use,
                free: p.free.len(),
            })
            .collect()
    }

    pub fn oversized_in_use(&self) -> usize {
        self.oversized_in_use
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_round_up_to_class() {
        let pools = Pools::new();
        assert_eq!(pools.class_for(1), PoolClass::Sized(0));
        assert_eq!(pools.class_for(POOL_MIN_CLASS_BYTES), PoolClass::Sized(0));
        assert_eq!(pools.class_for(POOL_MIN_CLASS_BYTES + 1), PoolClass::Sized(1));
        assert_eq!(pools.class_for(usize::MAX / 2), PoolClass::Oversized);
    }

    #[test]
    fn test_freed_segment_is_recycled() {
        let mut pools = Pools::new();
        let (mut buf, class, granted) = pools.take::<u8>(10);
        assert!(granted >= 10);
        buf.extend_from_slice(b"abc");
        let addr = buf.as_ptr() as usize;
        pools.give(class, buf);
        assert_eq!(pools.stats()[0].free, 1);

        let (again, class2, _) = pools.take::<u8>(5);
        assert_eq!(class, class2);
        assert_eq!(again.as_ptr() as usize, addr);
        assert!(again.is_empty(), "reused segment must come back cleared");
    }

    #[test]
    fn test_width_mismatch_is_not_recycled() {
        let mut pools = Pools::new();
        let (buf, class, _) = pools.take::<u8>(4);
        pools.give(class, buf);
        let (chars, _, _) = pools.take::<char>(1);
        assert!(chars.is_empty());
        assert_eq!(pools.stats()[0].free, 1);
    }

    #[test]
    fn test_release_idle_pools() {
        let mut pools = Pools::new();
        let (a, class_a, _) = pools.take::<u8>(4);
        let (b, class_b, _) = pools.take::<u8>(4);
        pools.give(class_a, a);
        assert_eq!(pools.release_idle(), 0, "pool still has a segment in use");
        pools.give(class_b, b);
        assert_eq!(pools.release_idle(), 2);
    }
}
