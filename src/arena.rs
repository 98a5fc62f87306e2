//! Per-step bump allocator backing the constraint arrays (spec §3/§4.2, "Arena").
//!
//! Mirrors `mjData`'s `arena` buffer: a single fixed-capacity byte region carved into a
//! contact-array *prefix* (grows forward from the start, one slot per detected contact) and a
//! constraint-region *suffix* (grows forward from just after the last contact, one region per
//! instantiated row group). Both regions are reset every step; the split exists so that
//! appending a contact never has to relocate already-instantiated constraint data, matching
//! `mj_addContact`'s behavior of rewinding the constraint-region stack pointer whenever the
//! contact array grows.

use crate::error::Warning;

/// A fixed-capacity bump region. `capacity` is chosen once at `Model`-build time; every step
/// calls [`Arena::reset`] and then bumps `contact_high`/`constraint_high` back up from zero.
#[derive(Debug, Clone)]
pub struct Arena {
    capacity: usize,
    contact_high: usize,
    constraint_high: usize,
}

/// Returned by [`Arena::reserve_contact`]/[`Arena::reserve_constraint`] on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaFull;

impl Arena {
    pub fn new(capacity: usize) -> Self {
        Arena {
            capacity,
            contact_high: 0,
            constraint_high: 0,
        }
    }

    /// Rewinds both regions to empty. Called once at the start of every step, before contact
    /// detection and before `mj_makeConstraint`'s equivalent driver runs.
    pub fn reset(&mut self) {
        self.contact_high = 0;
        self.constraint_high = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still available to either region (they share the same backing capacity).
    pub fn free(&self) -> usize {
        self.capacity.saturating_sub(self.contact_high + self.constraint_high)
    }

    /// Grows the contact-array prefix by `len` slots. Per `mj_addContact`, growing the contact
    /// prefix always rewinds the constraint-region suffix, since the suffix's start address is
    /// defined relative to the end of the contact prefix.
    pub fn reserve_contact(&mut self, len: usize) -> Result<usize, ArenaFull> {
        if self.contact_high + len + self.constraint_high > self.capacity {
            return Err(ArenaFull);
        }
        let addr = self.contact_high;
        self.contact_high += len;
        self.constraint_high = 0;
        Ok(addr)
    }

    /// Grows the constraint-region suffix by `len` slots, returning the address relative to
    /// the start of the suffix (i.e. relative to `contact_high`).
    pub fn reserve_constraint(&mut self, len: usize) -> Result<usize, ArenaFull> {
        if self.contact_high + self.constraint_high + len > self.capacity {
            return Err(ArenaFull);
        }
        let addr = self.constraint_high;
        self.constraint_high += len;
        Ok(addr)
    }

    pub fn contact_used(&self) -> usize {
        self.contact_high
    }

    pub fn constraint_used(&self) -> usize {
        self.constraint_high
    }
}

/// Attempts the reservation, converting overflow into the matching step [`Warning`] instead
/// of propagating a fatal error — capacity exhaustion is recoverable (spec §7).
pub fn reserve_contact_or_warn(arena: &mut Arena, len: usize, dropped: usize) -> Result<usize, Warning> {
    arena.reserve_contact(len).map_err(|_| Warning::ContactFull(dropped))
}

/// Attempts the reservation, converting overflow into [`Warning::ConstraintFull`].
pub fn reserve_constraint_or_warn(arena: &mut Arena, len: usize) -> Result<usize, Warning> {
    arena.reserve_constraint(len).map_err(|_| Warning::ConstraintFull)
}
