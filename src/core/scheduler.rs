use crate::error::{Error, Result};
use ordered_float::NotNan;

/// Indexed binary min-heap of particles keyed on their next event time.
///
/// Every particle handle appears at most once. A handle -> heap position map
/// allows removing or re-keying any particle in O(log n), which gate
/// explosions need to reschedule evicted residents.
///
/// Ties on time are broken by the smaller particle handle so the event order
/// is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    heap: Vec<(NotNan<f64>, usize)>,
    slots: Vec<Option<usize>>,
}

fn validate_time(time: f64) -> Result<NotNan<f64>> {
    if !time.is_finite() {
        return Err(Error::MathError(format!(
            "event time must be finite, got {time}"
        )));
    }
    NotNan::new(time).map_err(|_| Error::MathError("event time cannot be NaN".into()))
}

impl Scheduler {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            heap: Vec::with_capacity(n),
            slots: vec![None; n],
        }
    }

    /// Number of scheduled particles.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn slot(&self, particle: usize) -> Option<usize> {
        self.slots.get(particle).copied().flatten()
    }

    pub fn contains(&self, particle: usize) -> bool {
        self.slot(particle).is_some()
    }

    /// Scheduled time of `particle`, if present.
    pub fn time_of(&self, particle: usize) -> Option<f64> {
        self.slot(particle).map(|pos| self.heap[pos].0.into_inner())
    }

    /// Particle with the earliest event and its time.
    pub fn peek_min(&self) -> Option<(usize, f64)> {
        self.heap.first().map(|&(t, p)| (p, t.into_inner()))
    }

    /// Remove and return the particle with the earliest event.
    pub fn pop_min(&mut self) -> Option<usize> {
        let &(_, particle) = self.heap.first()?;
        self.remove(particle);
        Some(particle)
    }

    /// Schedule `particle` at `time`; an existing entry is re-keyed.
    ///
    /// Errors: `Error::MathError` if `time` is NaN or infinite.
    pub fn insert(&mut self, particle: usize, time: f64) -> Result<()> {
        let time = validate_time(time)?;
        if let Some(pos) = self.slot(particle) {
            self.heap[pos].0 = time;
            self.restore(pos);
            return Ok(());
        }
        if particle >= self.slots.len() {
            self.slots.resize(particle + 1, None);
        }
        let pos = self.heap.len();
        self.heap.push((time, particle));
        self.slots[particle] = Some(pos);
        self.sift_up(pos);
        Ok(())
    }

    /// Remove an arbitrary particle. Returns `false` if it was not scheduled.
    pub fn remove(&mut self, particle: usize) -> bool {
        let Some(pos) = self.slot(particle) else {
            return false;
        };
        let last = self.heap.len() - 1;
        self.swap(pos, last);
        self.heap.pop();
        self.slots[particle] = None;
        if pos < self.heap.len() {
            self.restore(pos);
        }
        true
    }

    /// Move `particle` to a new time, inserting it if absent.
    pub fn reschedule(&mut self, particle: usize, time: f64) -> Result<()> {
        self.insert(particle, time)
    }

    /// Replace the whole content with one entry per particle, `times[i]` being
    /// the event time of particle `i`, then heapify.
    pub fn rebuild(&mut self, times: &[f64]) -> Result<()> {
        let keys = times
            .iter()
            .map(|&t| validate_time(t))
            .collect::<Result<Vec<_>>>()?;
        self.heap = keys.into_iter().zip(0..).collect();
        self.slots = (0..self.heap.len()).map(Some).collect();
        for pos in (0..self.heap.len() / 2).rev() {
            self.sift_down(pos);
        }
        Ok(())
    }

    // ============ Internal helpers ============

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.slots[self.heap[a].1] = Some(a);
        self.slots[self.heap[b].1] = Some(b);
    }

    fn restore(&mut self, pos: usize) {
        let pos = self.sift_up(pos);
        self.sift_down(pos);
    }

    fn sift_up(&mut self, mut pos: usize) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.heap[pos] >= self.heap[parent] {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
        pos
    }

    fn sift_down(&mut self, mut pos: usize) {
        let n = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let child = if right < n && self.heap[right] < self.heap[left] {
                right
            } else {
                left
            };
            if self.heap[child] >= self.heap[pos] {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
    }
}
