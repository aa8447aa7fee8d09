//! Mark-and-sweep collector
//!
//! Marking starts from the heap's registered roots, every `fixed` series and
//! whatever the caller's [`Roots`] reports (the frame arena, data stack and
//! guards), then follows cells into series and series into cells with an
//! explicit worklist, so nesting depth never touches the native stack.
//!
//! Sweeping frees every unmarked slot: its buffer goes back on the owning
//! pool's free-list and the slot generation is bumped so outstanding handles
//! become detectably stale. Collection never moves storage.

use super::heap::Heap;
use super::series::{ActionBody, SeriesData, SeriesId};
use super::value::Value;
use std::time::{Duration, Instant};

/// Anything that holds cells the collector must treat as live
pub trait Roots {
    fn visit_roots(&self, marker: &mut Marker);
}

/// No extra roots beyond the heap's own
pub struct NoRoots;

impl Roots for NoRoots {
    fn visit_roots(&self, _marker: &mut Marker) {}
}

/// Worklist of series waiting to be traced
#[derive(Debug, Default)]
pub struct Marker {
    pending: Vec<SeriesId>,
}

impl Marker {
    pub fn mark_value(&mut self, value: &Value) {
        value.for_each_reference(|id| self.pending.push(id));
    }

    pub fn mark_values(&mut self, values: &[Value]) {
        for value in values {
            self.mark_value(value);
        }
    }

    pub fn mark_series(&mut self, id: SeriesId) {
        self.pending.push(id);
    }
}

/// Result of one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectReport {
    pub marked: usize,
    pub freed: usize,
    pub live: usize,
    pub elapsed: Duration,
}

impl Heap {
    /// Run a full collection.
    ///
    /// # Panics
    ///
    /// Re-entering the collector, or finding a root that refers to a freed
    /// series, is an internal invariant violation.
    pub fn collect(&mut self, roots: &dyn Roots) -> CollectReport {
        assert!(!self.collecting, "garbage collector re-entered");
        self.collecting = true;
        let start = Instant::now();

        let mut marker = Marker::default();
        for value in self.roots.iter().flatten() {
            marker.mark_value(value);
        }
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.series.as_ref().is_some_and(|s| s.flags.fixed) {
                marker.mark_series(SeriesId {
                    index: index as u32,
                    generation: slot.generation,
                });
            }
        }
        roots.visit_roots(&mut marker);

        let marked = self.propagate(&mut marker);
        let freed = self.sweep();

        self.collections += 1;
        self.last_freed = freed;
        self.total_freed += freed;
        self.pressure = 0;
        self.collecting = false;

        let report = CollectReport {
            marked,
            freed,
            live: self.live,
            elapsed: start.elapsed(),
        };
        log::debug!(
            "gc #{}: marked {}, freed {}, live {} in {:?}",
            self.collections,
            report.marked,
            report.freed,
            report.live,
            report.elapsed
        );
        report
    }

    fn propagate(&mut self, marker: &mut Marker) -> usize {
        let mut marked = 0;
        while let Some(id) = marker.pending.pop() {
            let series = match self
                .slots
                .get_mut(id.index as usize)
                .filter(|slot| slot.generation == id.generation)
                .and_then(|slot| slot.series.as_mut())
            {
                Some(series) => series,
                None => panic!("live cell refers to freed series {:?}", id),
            };
            if series.flags.marked {
                continue;
            }
            series.flags.marked = true;
            marked += 1;

            match &series.data {
                SeriesData::Array(values) => marker.mark_values(values),
                SeriesData::Context(context) => marker.mark_values(&context.vars),
                SeriesData::Action(action) => {
                    if let ActionBody::User { body } = action.body {
                        marker.mark_series(body);
                    }
                    if let Some(spec) = action.spec {
                        marker.mark_series(spec);
                    }
                }
                SeriesData::Text(_) | SeriesData::Binary(_) | SeriesData::Port(_) => {}
            }
        }
        marked
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let keep = match &mut slot.series {
                Some(series) if series.flags.marked => {
                    series.flags.marked = false;
                    true
                }
                Some(_) => false,
                None => continue,
            };
            if keep {
                continue;
            }
            let Some(series) = slot.series.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(index as u32);
            self.bytes -= series.footprint();
            self.live -= 1;
            freed += 1;
            match series.data {
                SeriesData::Array(values) => self.pools.give(series.class, values),
                SeriesData::Context(context) => self.pools.give(series.class, context.vars),
                SeriesData::Text(chars) => self.pools.give(series.class, chars),
                SeriesData::Binary(bytes) => self.pools.give(series.class, bytes),
                SeriesData::Port(port) if port.handle.is_some() => self.orphaned_ports.push(port),
                SeriesData::Action(_) | SeriesData::Port(_) => {}
            }
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::pool::Width;
    use crate::memory::value::SeriesRef;

    struct Held(Vec<Value>);

    impl Roots for Held {
        fn visit_roots(&self, marker: &mut Marker) {
            marker.mark_values(&self.0);
        }
    }

    #[test]
    fn test_unreachable_series_are_freed() {
        let mut heap = Heap::default();
        let kept = heap.alloc_text("kept");
        heap.alloc_text("garbage");
        heap.allocate(Width::Cell, 8).unwrap();

        let report = heap.collect(&Held(vec![Value::Text(SeriesRef::head(kept))]));
        assert_eq!(report.freed, 2);
        assert_eq!(report.live, 1);
        assert_eq!(heap.text_string(kept, 0), "kept");
    }

    #[test]
    fn test_exactly_retained_series_survive() {
        let mut heap = Heap::default();
        let n = 50;
        let roots: Vec<_> = (0..n)
            .map(|i| {
                let id = heap.alloc_array(&[Value::Integer(i)]);
                heap.add_root(Value::Block(SeriesRef::head(id)))
            })
            .collect();
        for _ in 0..20 {
            heap.alloc_text("temporary");
        }
        heap.collect(&NoRoots);
        assert_eq!(heap.live_count(), n as usize);
        assert_eq!(roots.len(), n as usize);
    }

    #[test]
    fn test_nested_series_traced_to_full_depth() {
        let mut heap = Heap::default();
        let mut inner = heap.alloc_array(&[Value::Integer(0)]);
        for _ in 0..1000 {
            inner = heap.alloc_array(&[Value::Block(SeriesRef::head(inner))]);
        }
        heap.add_root(Value::Block(SeriesRef::head(inner)));
        let report = heap.collect(&NoRoots);
        assert_eq!(report.freed, 0);
        assert_eq!(report.live, 1001);
    }

    #[test]
    fn test_collection_keeps_addresses_and_content() {
        let mut heap = Heap::default();
        let id = heap.alloc_binary(&[1, 2, 3]);
        heap.add_root(Value::Binary(SeriesRef::head(id)));
        let before = heap.data_address(id);
        for _ in 0..10 {
            heap.alloc_binary(&[0; 40]);
            heap.collect(&NoRoots);
        }
        assert_eq!(heap.data_address(id), before);
        assert_eq!(heap.bytes(id), &[1, 2, 3]);
    }

    #[test]
    fn test_swept_handle_becomes_stale() {
        let mut heap = Heap::default();
        let id = heap.alloc_text("gone");
        heap.collect(&NoRoots);
        assert!(!heap.is_live(id));
        let reused = heap.alloc_text("new");
        assert_eq!(reused.index, id.index);
        assert_ne!(reused.generation, id.generation);
    }

    #[test]
    fn test_fixed_series_survive_without_roots() {
        let mut heap = Heap::default();
        let id = heap.alloc_text("pinned");
        heap.fix(id);
        heap.collect(&NoRoots);
        assert!(heap.is_live(id));
    }

    #[test]
    fn test_swept_buffers_return_to_pool() {
        let mut heap = Heap::default();
        heap.alloc_binary(&[7; 10]);
        heap.collect(&NoRoots);
        let stats = heap.stats();
        assert_eq!(stats.pools[0].in_use, 0);
        assert_eq!(stats.pools[0].free, 1);
        assert_eq!(heap.release_idle_pools(), 1);
    }

    #[test]
    fn test_collection_resets_pressure() {
        let mut heap = Heap::new(64);
        heap.alloc_binary(&[0; 100]);
        assert!(heap.wants_collection());
        heap.collect(&NoRoots);
        assert!(!heap.wants_collection());
    }
}
