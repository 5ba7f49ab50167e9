/// Occupancy of one capacity-limited gate.
///
/// Occupants are particle handles in admission order. A gate with capacity 0
/// is closed: every arrival triggers an explosion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gate {
    capacity: usize,
    occupants: Vec<usize>,
}

/// Result of a particle arriving at a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// The gate was full; the arrival and every resident must retract.
    Refused,
}

impl Gate {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            occupants: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.capacity
    }

    /// Handles of the particles currently admitted.
    pub fn occupants(&self) -> &[usize] {
        &self.occupants
    }

    pub fn contains(&self, particle: usize) -> bool {
        self.occupants.contains(&particle)
    }

    /// Admit `particle` if there is room. A refused particle is not recorded.
    pub fn admit(&mut self, particle: usize) -> Admission {
        if self.is_full() {
            return Admission::Refused;
        }
        if !self.contains(particle) {
            self.occupants.push(particle);
        }
        Admission::Admitted
    }

    /// Remove `particle`; returns whether it was an occupant.
    pub fn depart(&mut self, particle: usize) -> bool {
        match self.occupants.iter().position(|&p| p == particle) {
            Some(i) => {
                self.occupants.remove(i);
                true
            }
            None => false,
        }
    }

    /// Empty the gate, returning the evicted handles.
    pub fn evict_all(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.occupants)
    }
}
