//! Filter → sort → (group) pipeline shared by every listing view.

use crate::filter::{CommunityFilter, EventFilter, FilterState, OpportunityFilter, Predicate, apply};
use crate::group::{Group, YearMonth, group_by_month};
use crate::models::Event;
use crate::sort::{
    CommunitySort, Comparator, EventSort, OpportunitySort, SortDirection, SortSpec, sort_refs,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery<F, S> {
    pub filter: F,
    pub sort: SortSpec<S>,
}

pub type CommunityQuery = ListingQuery<CommunityFilter, CommunitySort>;
pub type EventQuery = ListingQuery<EventFilter, EventSort>;
pub type OpportunityQuery = ListingQuery<OpportunityFilter, OpportunitySort>;

impl<F, S> ListingQuery<F, S>
where
    F: FilterState,
    S: Copy + PartialEq,
    SortSpec<S>: Default,
{
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            sort: SortSpec::default(),
        }
    }

    /// Filtered and sorted view over `items`.
    pub fn run<'a, T>(&self, items: &'a [T]) -> Vec<&'a T>
    where
        F: Predicate<T>,
        SortSpec<S>: Comparator<T>,
    {
        let mut results = apply(items, &self.filter);
        sort_refs(&mut results, &self.sort);
        tracing::debug!(total = items.len(), shown = results.len(), "listing query");
        results
    }

    /// Clear all filters and restore the default sort.
    pub fn reset(&mut self) {
        self.filter.clear();
        self.sort = SortSpec::default();
    }

    pub fn toggle_direction(&mut self) {
        self.sort.direction = self.sort.direction.toggle();
    }

    /// Choosing the active field flips direction; a new field starts ascending.
    pub fn sort_by(&mut self, field: S) {
        if self.sort.field == field {
            self.toggle_direction();
        } else {
            self.sort = SortSpec::new(field, SortDirection::Ascending);
        }
    }
}

impl EventQuery {
    /// Month sections for the calendar view.
    pub fn calendar<'a>(&self, events: &'a [Event]) -> Vec<Group<YearMonth, &'a Event>> {
        group_by_month(&self.run(events))
    }
}

impl Default for CommunityQuery {
    fn default() -> Self {
        Self::new(CommunityFilter::default())
    }
}
