//! Strongly typed, zero-cost identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can be used as map keys and sorted
//! collection elements without ceremony.  The inner integer is `pub` to allow
//! direct indexing into SoA `Vec`s via `id.0 as usize`, but callers should
//! prefer the `.index()` helpers for clarity.
//!
//! Person, household, place, and patch IDs are indices into the *owning
//! rank's* dense arrays; they are meaningless on another rank unless paired
//! with a `RankId` (see `ep-pop`'s `CaseHandle`).

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID" — the type's maximum value.
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            /// Returns the `INVALID` sentinel so uninitialized IDs are visibly invalid.
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Index of a person in this rank's SoA storage.
    pub struct PersonId(u32);
}

typed_id! {
    /// Index of a household in this rank's dense household array.
    pub struct HouseholdId(u32);
}

typed_id! {
    /// Index of a school/workplace.  The place itself may have members on
    /// several ranks; the ID is global and identical on all of them.
    pub struct PlaceId(u32);
}

typed_id! {
    /// Index of a geographic grid patch.  Global — every rank holds geometry
    /// stubs for all patches, and full state only for the ones it owns.
    pub struct PatchId(u32);
}

typed_id! {
    /// Index of an administrative unit in the policy/reporting tree.
    pub struct UnitId(u16);
}

typed_id! {
    /// Slot of an infected case in the owning rank's `CaseRegistry`.
    /// Only valid on that rank; pair with `RankId` to cross ranks.
    pub struct CaseId(u32);
}

typed_id! {
    /// Index of a group (classroom, office floor) within a place.
    pub struct GroupId(u16);
}

typed_id! {
    /// Compute-node rank in the distributed run.  `u16` keeps wire fragments
    /// compact (a run never spans more than 65,534 ranks).
    pub struct RankId(u16);
}
