//! Series heap
//!
//! The heap is an arena of generation-checked slots, one per live series,
//! with the pooled allocator underneath. It offers:
//! - Allocation of arrays, strings, binaries, contexts, actions and ports
//! - Typed access to series payloads (panics on a stale handle)
//! - Mutation that honors the `protected` flag and grows storage through
//!   [`Heap::expand`], the only operation that relocates a buffer
//! - The registered root set and allocation-pressure accounting used by the
//!   collector in [`super::gc`]
//!
//! There is no public free. A series is released only by the sweep phase of a
//! collection, once it is proven unreachable.

use super::pool::{PoolStats, Pools, Width};
use super::series::{ActionData, PortData, Series, SeriesData, SeriesFlags, SeriesId, Stored};
use super::value::Value;
use crate::interpreter::constants::{DEFAULT_GC_BALLAST, MAX_SERIES_BYTES};
use crate::interpreter::context::ContextData;
use crate::interpreter::symbols::SymId;
use crate::memory::pool::PoolClass;
use thiserror::Error;

/// Errors raised by heap mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("series is protected")]
    Protected,
    #[error("index {index} is out of range for length {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("expected a {expected} series, found {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },
    #[error("series of {requested} elements is too large")]
    TooLarge { requested: usize },
}

/// Handle to a registered root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootId(usize);

#[derive(Debug)]
pub(super) struct Slot {
    pub(super) generation: u32,
    pub(super) series: Option<Series>,
}

/// Heap occupancy report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    pub live: usize,
    pub bytes: usize,
    pub collections: usize,
    pub last_freed: usize,
    pub total_freed: usize,
    pub pools: Vec<PoolStats>,
    pub oversized: usize,
}

/// The series heap
#[derive(Debug)]
pub struct Heap {
    pub(super) slots: Vec<Slot>,
    pub(super) free_slots: Vec<u32>,
    pub(super) pools: Pools,
    pub(super) roots: Vec<Option<Value>>,
    free_roots: Vec<usize>,
    pub(super) live: usize,
    pub(super) bytes: usize,
    pub(super) pressure: usize,
    ballast: usize,
    pub(super) collections: usize,
    pub(super) last_freed: usize,
    pub(super) total_freed: usize,
    pub(super) collecting: bool,
    /// Swept ports that still held a device handle
    pub(super) orphaned_ports: Vec<PortData>,
}

impl Heap {
    /// Create a heap that asks for a collection every `ballast` bytes
    pub fn new(ballast: usize) -> Self {
        Heap {
            slots: Vec::new(),
            free_slots: Vec::new(),
            pools: Pools::new(),
            roots: Vec::new(),
            free_roots: Vec::new(),
            live: 0,
            bytes: 0,
            pressure: 0,
            ballast,
            collections: 0,
            last_freed: 0,
            total_freed: 0,
            collecting: false,
            orphaned_ports: Vec::new(),
        }
    }

    /// Ports freed by the last collections with their handles still open;
    /// the owner of the devices closes them
    pub fn take_orphaned_ports(&mut self) -> Vec<PortData> {
        std::mem::take(&mut self.orphaned_ports)
    }

    // ---- allocation ----

    /// Allocate an empty series of the given element width
    pub fn allocate(&mut self, width: Width, capacity: usize) -> Result<SeriesId, HeapError> {
        match capacity.checked_mul(width.bytes()) {
            Some(bytes) if bytes <= MAX_SERIES_BYTES => {}
            _ => return Err(HeapError::TooLarge { requested: capacity }),
        }
        Ok(match width {
            Width::Cell => self.alloc_buffer::<Value>(capacity, &[]),
            Width::Char => self.alloc_buffer::<char>(capacity, &[]),
            Width::Byte => self.alloc_buffer::<u8>(capacity, &[]),
        })
    }

    pub fn alloc_array(&mut self, values: &[Value]) -> SeriesId {
        self.alloc_buffer(values.len(), values)
    }

    pub fn alloc_text(&mut self, text: &str) -> SeriesId {
        let chars: Vec<char> = text.chars().collect();
        self.alloc_buffer(chars.len(), &chars)
    }

    pub fn alloc_chars(&mut self, chars: &[char]) -> SeriesId {
        self.alloc_buffer(chars.len(), chars)
    }

    pub fn alloc_binary(&mut self, bytes: &[u8]) -> SeriesId {
        self.alloc_buffer(bytes.len(), bytes)
    }

    /// Allocate a context; its variables move into pooled storage
    pub fn alloc_context(&mut self, mut context: ContextData) -> SeriesId {
        let (mut vars, class, capacity) = self.pools.take::<Value>(context.vars.len());
        vars.append(&mut context.vars);
        context.vars = vars;
        self.install(Series {
            data: SeriesData::Context(context),
            class,
            capacity,
            flags: SeriesFlags::default(),
        })
    }

    pub fn alloc_action(&mut self, action: ActionData) -> SeriesId {
        self.install_node(SeriesData::Action(action))
    }

    pub fn alloc_port(&mut self, port: PortData) -> SeriesId {
        self.install_node(SeriesData::Port(port))
    }

    fn alloc_buffer<T: Stored>(&mut self, capacity: usize, items: &[T]) -> SeriesId {
        let (mut buf, class, granted) = self.pools.take::<T>(capacity.max(items.len()));
        buf.extend_from_slice(items);
        self.install(Series {
            data: T::wrap(buf),
            class,
            capacity: granted,
            flags: SeriesFlags::default(),
        })
    }

    fn install_node(&mut self, data: SeriesData) -> SeriesId {
        self.install(Series {
            data,
            class: PoolClass::Unpooled,
            capacity: 0,
            flags: SeriesFlags::default(),
        })
    }

    fn install(&mut self, series: Series) -> SeriesId {
        let footprint = series.footprint();
        self.bytes += footprint;
        self.pressure += footprint.max(std::mem::size_of::<Series>());
        self.live += 1;
        match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.series = Some(series);
                SeriesId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    series: Some(series),
                });
                SeriesId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    // ---- access ----

    pub fn try_series(&self, id: SeriesId) -> Option<&Series> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.series.as_ref())
    }

    pub fn is_live(&self, id: SeriesId) -> bool {
        self.try_series(id).is_some()
    }

    /// Header and payload of a live series
    ///
    /// # Panics
    ///
    /// A stale handle means a live cell outlived its series, which only a
    /// collector bug can cause.
    pub fn series(&self, id: SeriesId) -> &Series {
        match self.try_series(id) {
            Some(series) => series,
            None => panic!("stale series handle {:?}", id),
        }
    }

    pub(crate) fn series_mut(&mut self, id: SeriesId) -> &mut Series {
        node_mut(&mut self.slots, id)
    }

    pub fn len(&self, id: SeriesId) -> usize {
        self.series(id).len()
    }

    pub fn array(&self, id: SeriesId) -> &[Value] {
        match &self.series(id).data {
            SeriesData::Array(values) => values,
            other => panic!("expected array series, found {}", other.describe()),
        }
    }

    /// Cells of an array for rebinding. Binding rewrites word metadata only,
    /// so it is not subject to protection.
    pub(crate) fn array_cells_mut(&mut self, id: SeriesId) -> &mut [Value] {
        match &mut self.series_mut(id).data {
            SeriesData::Array(values) => values,
            other => panic!("expected array series, found {}", other.describe()),
        }
    }

    pub fn chars(&self, id: SeriesId) -> &[char] {
        match &self.series(id).data {
            SeriesData::Text(chars) => chars,
            other => panic!("expected text series, found {}", other.describe()),
        }
    }

    pub fn bytes(&self, id: SeriesId) -> &[u8] {
        match &self.series(id).data {
            SeriesData::Binary(bytes) => bytes,
            other => panic!("expected binary series, found {}", other.describe()),
        }
    }

    pub fn text_string(&self, id: SeriesId, from: usize) -> String {
        self.chars(id).iter().skip(from).collect()
    }

    pub fn context(&self, id: SeriesId) -> &ContextData {
        match &self.series(id).data {
            SeriesData::Context(context) => context,
            other => panic!("expected context series, found {}", other.describe()),
        }
    }

    pub fn action(&self, id: SeriesId) -> &ActionData {
        match &self.series(id).data {
            SeriesData::Action(action) => action,
            other => panic!("expected action series, found {}", other.describe()),
        }
    }

    pub(crate) fn action_mut(&mut self, id: SeriesId) -> &mut ActionData {
        match &mut self.series_mut(id).data {
            SeriesData::Action(action) => action,
            other => panic!("expected action series, found {}", other.describe()),
        }
    }

    pub fn port(&self, id: SeriesId) -> &PortData {
        match &self.series(id).data {
            SeriesData::Port(port) => port,
            other => panic!("expected port series, found {}", other.describe()),
        }
    }

    pub fn port_mut(&mut self, id: SeriesId) -> &mut PortData {
        match &mut self.series_mut(id).data {
            SeriesData::Port(port) => port,
            other => panic!("expected port series, found {}", other.describe()),
        }
    }

    /// Address of the backing buffer. Only [`Heap::expand`] changes it.
    pub fn data_address(&self, id: SeriesId) -> usize {
        match &self.series(id).data {
            SeriesData::Array(v) => v.as_ptr() as usize,
            SeriesData::Text(v) => v.as_ptr() as usize,
            SeriesData::Binary(v) => v.as_ptr() as usize,
            SeriesData::Context(c) => c.vars.as_ptr() as usize,
            SeriesData::Action(_) | SeriesData::Port(_) => 0,
        }
    }

    // ---- flags ----

    pub fn is_protected(&self, id: SeriesId) -> bool {
        self.series(id).flags.protected
    }

    pub fn set_protected(&mut self, id: SeriesId, protected: bool) {
        self.series_mut(id).flags.protected = protected;
    }

    /// Exempt a series from sweeping; it is traced as a root
    pub fn fix(&mut self, id: SeriesId) {
        self.series_mut(id).flags.fixed = true;
    }

    // ---- mutation ----

    fn writable<T: Stored>(&mut self, id: SeriesId) -> Result<&mut Vec<T>, HeapError> {
        let series = node_mut(&mut self.slots, id);
        if series.flags.protected {
            return Err(HeapError::Protected);
        }
        let found = series.data.describe();
        T::buffer_mut(&mut series.data).ok_or(HeapError::WrongKind {
            expected: std::any::type_name::<T>(),
            found,
        })
    }

    /// Grow a series so it can hold `additional` more elements
    fn reserve<T: Stored>(&mut self, id: SeriesId, additional: usize) {
        let series = self.series(id);
        let needed = series.len() + additional;
        if needed > series.capacity {
            let doubled = series.capacity.saturating_mul(2);
            self.expand(id, needed.max(doubled));
        }
    }

    /// Insert `items` at `at`, growing the series first when it is full
    pub fn insert<T: Stored>(&mut self, id: SeriesId, at: usize, items: &[T]) -> Result<(), HeapError> {
        let len = self.writable::<T>(id)?.len();
        if at > len {
            return Err(HeapError::OutOfRange { index: at, len });
        }
        self.reserve::<T>(id, items.len());
        let buf = self.writable::<T>(id)?;
        buf.splice(at..at, items.iter().copied());
        Ok(())
    }

    pub fn push<T: Stored>(&mut self, id: SeriesId, item: T) -> Result<(), HeapError> {
        let len = self.writable::<T>(id)?.len();
        self.insert(id, len, &[item])
    }

    pub fn set<T: Stored>(&mut self, id: SeriesId, at: usize, item: T) -> Result<(), HeapError> {
        let buf = self.writable::<T>(id)?;
        let len = buf.len();
        match buf.get_mut(at) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(HeapError::OutOfRange { index: at, len }),
        }
    }

    /// Remove up to `count` elements starting at `at`
    pub fn remove<T: Stored>(&mut self, id: SeriesId, at: usize, count: usize) -> Result<(), HeapError> {
        let buf = self.writable::<T>(id)?;
        let len = buf.len();
        if at > len {
            return Err(HeapError::OutOfRange { index: at, len });
        }
        let end = at.saturating_add(count).min(len);
        buf.drain(at..end);
        Ok(())
    }

    /// Drop everything from `from` to the tail, whatever the element type
    pub fn truncate(&mut self, id: SeriesId, from: usize) -> Result<(), HeapError> {
        let series = node_mut(&mut self.slots, id);
        if series.flags.protected {
            return Err(HeapError::Protected);
        }
        match &mut series.data {
            SeriesData::Array(v) => v.truncate(from),
            SeriesData::Text(v) => v.truncate(from),
            SeriesData::Binary(v) => v.truncate(from),
            other => {
                return Err(HeapError::WrongKind {
                    expected: "series",
                    found: other.describe(),
                })
            }
        }
        Ok(())
    }

    /// Relocate a series into storage of at least `new_capacity` elements.
    ///
    /// Takes a segment from the new size class, moves the contents across and
    /// hands the old segment back to its pool. Any address previously read
    /// with [`Heap::data_address`] is invalid afterwards.
    pub fn expand(&mut self, id: SeriesId, new_capacity: usize) {
        match &self.series(id).data {
            SeriesData::Array(_) | SeriesData::Context(_) => self.expand_buffer::<Value>(id, new_capacity),
            SeriesData::Text(_) => self.expand_buffer::<char>(id, new_capacity),
            SeriesData::Binary(_) => self.expand_buffer::<u8>(id, new_capacity),
            SeriesData::Action(_) | SeriesData::Port(_) => {}
        }
    }

    fn expand_buffer<T: Stored>(&mut self, id: SeriesId, new_capacity: usize) {
        let (old_class, old_capacity) = {
            let series = self.series(id);
            (series.class, series.capacity)
        };
        if new_capacity <= old_capacity {
            return;
        }
        let (mut fresh, class, granted) = self.pools.take::<T>(new_capacity);
        let series = node_mut(&mut self.slots, id);
        let old = match T::buffer_mut(&mut series.data) {
            Some(buf) => {
                fresh.append(buf);
                std::mem::replace(buf, fresh)
            }
            None => return,
        };
        let old_bytes = series.footprint();
        series.class = class;
        series.capacity = granted;
        let new_bytes = series.footprint();
        self.pools.give(old_class, old);
        self.bytes = self.bytes + new_bytes - old_bytes;
        self.pressure += new_bytes;
        log::trace!("expanded {:?} to {} elements", id, granted);
    }

    /// Overwrite variable `index` of a context
    pub fn context_set(&mut self, id: SeriesId, index: usize, value: Value) -> Result<(), HeapError> {
        self.set(id, index, value)
    }

    /// Append a key to a context, returning its slot index
    pub fn context_append(
        &mut self,
        id: SeriesId,
        sym: SymId,
        canon: SymId,
        value: Value,
    ) -> Result<usize, HeapError> {
        if let Some(index) = self.context(id).find(canon) {
            return Ok(index);
        }
        if self.is_protected(id) {
            return Err(HeapError::Protected);
        }
        self.reserve::<Value>(id, 1);
        match &mut self.series_mut(id).data {
            SeriesData::Context(context) => Ok(context.push(sym, canon, value)),
            other => Err(HeapError::WrongKind {
                expected: "context",
                found: other.describe(),
            }),
        }
    }

    // ---- roots and accounting ----

    /// Keep `value` (and everything it references) alive until removed
    pub fn add_root(&mut self, value: Value) -> RootId {
        match self.free_roots.pop() {
            Some(index) => {
                self.roots[index] = Some(value);
                RootId(index)
            }
            None => {
                self.roots.push(Some(value));
                RootId(self.roots.len() - 1)
            }
        }
    }

    pub fn remove_root(&mut self, id: RootId) -> Option<Value> {
        let value = self.roots.get_mut(id.0).and_then(Option::take);
        if value.is_some() {
            self.free_roots.push(id.0);
        }
        value
    }

    pub fn root(&self, id: RootId) -> Option<Value> {
        self.roots.get(id.0).copied().flatten()
    }

    /// Allocation pressure has passed the ballast
    pub fn wants_collection(&self) -> bool {
        self.pressure >= self.ballast
    }

    pub fn set_ballast(&mut self, ballast: usize) {
        self.ballast = ballast;
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn bytes_in_use(&self) -> usize {
        self.bytes
    }

    /// Return the free-lists of idle pools to the system allocator
    pub fn release_idle_pools(&mut self) -> usize {
        let released = self.pools.release_idle();
        if released > 0 {
            log::warn!("released {} idle pool segments", released);
        }
        released
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live: self.live,
            bytes: self.bytes,
            collections: self.collections,
            last_freed: self.last_freed,
            total_freed: self.total_freed,
            pools: self.pools.stats(),
            oversized: self.pools.oversized_in_use(),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(DEFAULT_GC_BALLAST)
    }
}

pub(super) fn node_mut(slots: &mut [Slot], id: SeriesId) -> &mut Series {
    match slots
        .get_mut(id.index as usize)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.series.as_mut())
    {
        Some(series) => series,
        None => panic!("stale series handle {:?}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_read() {
        let mut heap = Heap::default();
        let id = heap.alloc_array(&[Value::Integer(1), Value::Integer(2)]);
        assert_eq!(heap.array(id), &[Value::Integer(1), Value::Integer(2)]);
        assert_eq!(heap.live_count(), 1);

        let text = heap.alloc_text("héllo");
        assert_eq!(heap.len(text), 5);
        assert_eq!(heap.text_string(text, 1), "éllo");
    }

    #[test]
    fn test_allocate_is_empty_with_capacity() {
        let mut heap = Heap::default();
        let id = heap.allocate(Width::Byte, 100).unwrap();
        assert_eq!(heap.len(id), 0);
        assert!(heap.series(id).capacity >= 100);
    }

    #[test]
    fn test_push_grows_through_expand() {
        let mut heap = Heap::default();
        let id = heap.allocate(Width::Cell, 1).unwrap();
        let first_capacity = heap.series(id).capacity;
        let before = heap.data_address(id);
        for i in 0..first_capacity as i64 {
            heap.push(id, Value::Integer(i)).unwrap();
        }
        assert_eq!(heap.data_address(id), before, "no growth while under capacity");

        heap.push(id, Value::Integer(-1)).unwrap();
        assert!(heap.series(id).capacity > first_capacity);
        assert_eq!(heap.len(id), first_capacity + 1);
        assert_eq!(heap.array(id)[0], Value::Integer(0));
    }

    #[test]
    fn test_protected_series_rejects_mutation() {
        let mut heap = Heap::default();
        let id = heap.alloc_text("abc");
        heap.set_protected(id, true);
        assert_eq!(heap.push(id, 'd'), Err(HeapError::Protected));
        assert_eq!(heap.truncate(id, 0), Err(HeapError::Protected));
        heap.set_protected(id, false);
        assert!(heap.push(id, 'd').is_ok());
        assert_eq!(heap.text_string(id, 0), "abcd");
    }

    #[test]
    fn test_wrong_element_type() {
        let mut heap = Heap::default();
        let id = heap.alloc_binary(&[1, 2]);
        assert!(matches!(
            heap.push(id, 'x'),
            Err(HeapError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_insert_out_of_range() {
        let mut heap = Heap::default();
        let id = heap.alloc_binary(&[1]);
        assert_eq!(
            heap.insert(id, 3, &[9u8]),
            Err(HeapError::OutOfRange { index: 3, len: 1 })
        );
    }

    #[test]
    fn test_roots_register_and_release() {
        let mut heap = Heap::default();
        let a = heap.add_root(Value::Integer(1));
        let b = heap.add_root(Value::Integer(2));
        assert_eq!(heap.remove_root(a), Some(Value::Integer(1)));
        assert_eq!(heap.remove_root(a), None);
        let c = heap.add_root(Value::Integer(3));
        assert_eq!(heap.root(c), Some(Value::Integer(3)));
        assert_eq!(heap.root(b), Some(Value::Integer(2)));
    }

    #[test]
    #[should_panic(expected = "stale series handle")]
    fn test_stale_handle_panics() {
        let mut heap = Heap::default();
        let id = heap.alloc_binary(&[1]);
        heap.slots[id.index as usize].generation += 1;
        heap.bytes(id);
    }
}
