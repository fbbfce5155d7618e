//! Structure-of-Arrays person storage.
//!
//! Every `Vec` field has exactly `count` elements; the `PersonId` value is
//! the index into all of them:
//!
//! ```ignore
//! let hh = store.household[person.index()];  // O(1), cache-friendly
//! ```
//!
//! Membership fields (household, place, group, patch) are immutable after
//! world construction — a person is never relocated, only status-mutated
//! through its [`StatusCell`].

use ep_core::{GroupId, HouseholdId, PatchId, PersonId, PlaceId};

use crate::status::StatusCell;

/// SoA storage for every person owned by this rank.
pub struct PersonStore {
    /// Number of persons.  Equals the length of every SoA `Vec`.
    pub count: usize,

    /// Owning household.  Always valid: every person has a household.
    pub household: Vec<HouseholdId>,

    /// School/workplace membership; `PlaceId::INVALID` for people without one.
    pub place: Vec<PlaceId>,

    /// Group within `place`; meaningless when `place` is invalid.
    pub group: Vec<GroupId>,

    /// The patch that owns this person.
    pub patch: Vec<PatchId>,

    /// Age in whole years.
    pub age: Vec<u8>,

    /// Relative susceptibility multiplier; 1.0 is baseline.
    pub susceptibility: Vec<f32>,

    /// Shared, claimable infection status.
    pub status: Vec<StatusCell>,
}

impl PersonStore {
    /// All persons susceptible, unplaced, susceptibility 1.0.  The world
    /// builder fills the membership arrays afterwards.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            household: vec![HouseholdId::INVALID; count],
            place: vec![PlaceId::INVALID; count],
            group: vec![GroupId::INVALID; count],
            patch: vec![PatchId::INVALID; count],
            age: vec![0; count],
            susceptibility: vec![1.0; count],
            status: (0..count).map(|_| StatusCell::susceptible()).collect(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterator over all `PersonId`s in ascending index order.
    pub fn person_ids(&self) -> impl Iterator<Item = PersonId> + '_ {
        (0..self.count as u32).map(PersonId)
    }

    /// The status cell of one person.
    #[inline]
    pub fn status(&self, person: PersonId) -> &StatusCell {
        &self.status[person.index()]
    }

    /// `true` if `person` has a school/workplace.
    #[inline]
    pub fn has_place(&self, person: PersonId) -> bool {
        self.place[person.index()] != PlaceId::INVALID
    }
}
