//! Schools and workplaces.

use std::ops::Range;

use ep_core::{GroupId, PersonId, Step};

use crate::household::{TimeWindow, window_active};

/// The kind of a place, which selects its transmission coefficient.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlaceKind {
    School,
    Workplace,
}

impl PlaceKind {
    pub const COUNT: usize = 2;

    /// Decode a place-type code from initialization data.  Unknown codes are
    /// a data inconsistency the caller logs and clamps (§ error policy).
    pub fn from_code(code: u8) -> Option<PlaceKind> {
        match code {
            0 => Some(PlaceKind::School),
            1 => Some(PlaceKind::Workplace),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One group (classroom, office floor) within a place.
///
/// `hosts_total` counts members on *all* ranks and is invariant after
/// initialization, as is `rank_counts` (members per rank) — remote place
/// contacts are routed by mapping a group-wide ordinal through it.
/// `local_members` indexes this rank's slice of [`Place::local_members`].
#[derive(Clone, Debug)]
pub struct PlaceGroup {
    pub hosts_total: u32,
    /// Members of this group hosted on each rank; sums to `hosts_total`.
    pub rank_counts: Vec<u32>,
    pub local_members: Range<u32>,
}

impl PlaceGroup {
    /// Map a group-wide member ordinal to `(rank, ordinal within rank)`.
    pub fn locate(&self, ordinal: u32) -> Option<(usize, u32)> {
        let mut rest = ordinal;
        for (rank, &count) in self.rank_counts.iter().enumerate() {
            if rest < count {
                return Some((rank, rest));
            }
            rest -= count;
        }
        None
    }
}

/// A school or workplace.
///
/// Members may live on multiple ranks; `local_members` holds only this
/// rank's persons.  `total_hosts` and the per-group totals never change
/// after initialization — only the case counter and the two intervention
/// windows are mutated, and only in single-threaded phases.
#[derive(Debug)]
pub struct Place {
    pub kind: PlaceKind,

    /// Members across all ranks.  Invariant after initialization.
    pub total_hosts: u32,

    pub groups: Vec<PlaceGroup>,

    /// This rank's members, grouped contiguously per `PlaceGroup`.
    pub local_members: Vec<PersonId>,

    /// Accumulated case count, fed to closure triggers.
    pub case_count: u32,

    pub closure: Option<TimeWindow>,
    pub prophylaxis: Option<TimeWindow>,
}

impl Place {
    pub fn new(kind: PlaceKind, total_hosts: u32) -> Self {
        Self {
            kind,
            total_hosts,
            groups: Vec::new(),
            local_members: Vec::new(),
            case_count: 0,
            closure: None,
            prophylaxis: None,
        }
    }

    #[inline]
    pub fn is_closed(&self, step: Step) -> bool {
        window_active(&self.closure, step)
    }

    #[inline]
    pub fn is_prophylaxed(&self, step: Step) -> bool {
        window_active(&self.prophylaxis, step)
    }

    /// This rank's members of one group.
    pub fn local_in_group(&self, group: GroupId) -> &[PersonId] {
        match self.groups.get(group.index()) {
            Some(g) => &self.local_members[g.local_members.start as usize..g.local_members.end as usize],
            None => &[],
        }
    }
}
