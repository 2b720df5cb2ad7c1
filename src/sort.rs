//! Listing comparators.

use std::cmp::Ordering;

use crate::models::{Community, Event, Opportunity, slug_enum};

pub trait Comparator<T: ?Sized> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

slug_enum! {
    SortDirection {
        Ascending => "asc" | "ascending",
        Descending => "desc" | "descending",
    }
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

slug_enum! {
    CommunitySort {
        Name => "name",
        Location => "location",
        Members => "members",
        Frequency => "frequency",
        Activity => "activity",
    }
}

slug_enum! {
    EventSort {
        Date => "date",
        Title => "title",
        Location => "location",
    }
}

slug_enum! {
    OpportunitySort {
        Posted => "posted",
        Deadline => "deadline",
        Reward => "reward",
        Title => "title",
        Company => "company",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F> SortSpec<F> {
    pub fn new(field: F, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

impl Default for SortSpec<CommunitySort> {
    fn default() -> Self {
        Self::new(CommunitySort::Name, SortDirection::Ascending)
    }
}

impl Default for SortSpec<EventSort> {
    fn default() -> Self {
        Self::new(EventSort::Date, SortDirection::Ascending)
    }
}

impl Default for SortSpec<OpportunitySort> {
    fn default() -> Self {
        Self::new(OpportunitySort::Posted, SortDirection::Descending)
    }
}

/// Case-insensitive comparison, falling back to the raw text.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Present values first; `None` sorts after every value.
fn compare_present_first<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Missing amounts rank below every amount.
fn compare_amount(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

impl Comparator<Community> for SortSpec<CommunitySort> {
    fn compare(&self, a: &Community, b: &Community) -> Ordering {
        let ordering = match self.field {
            CommunitySort::Name => compare_text(&a.name, &b.name),
            CommunitySort::Location => {
                compare_text(&a.city, &b.city).then_with(|| compare_text(&a.country, &b.country))
            }
            CommunitySort::Members => a.member_count.cmp(&b.member_count),
            CommunitySort::Frequency => a.meeting_frequency.rank().cmp(&b.meeting_frequency.rank()),
            CommunitySort::Activity => a.activity_level.rank().cmp(&b.activity_level.rank()),
        };
        self.direction.apply(ordering)
    }
}

impl Comparator<Event> for SortSpec<EventSort> {
    fn compare(&self, a: &Event, b: &Event) -> Ordering {
        let ordering = match self.field {
            EventSort::Date => a.date.cmp(&b.date),
            EventSort::Title => compare_text(&a.title, &b.title),
            EventSort::Location => compare_text(&a.location, &b.location),
        };
        self.direction.apply(ordering)
    }
}

impl Comparator<Opportunity> for SortSpec<OpportunitySort> {
    fn compare(&self, a: &Opportunity, b: &Opportunity) -> Ordering {
        let ordering = match self.field {
            OpportunitySort::Posted => a.posted_at.cmp(&b.posted_at),
            OpportunitySort::Deadline => compare_present_first(a.deadline, b.deadline),
            OpportunitySort::Reward => {
                compare_amount(a.compensation.magnitude(), b.compensation.magnitude())
            }
            OpportunitySort::Title => compare_text(&a.title, &b.title),
            OpportunitySort::Company => compare_text(&a.company, &b.company),
        };
        self.direction.apply(ordering)
    }
}

/// Stable sort of borrowed items; equal elements keep their input order.
pub fn sort_refs<T, C>(items: &mut [&T], comparator: &C)
where
    C: Comparator<T> + ?Sized,
{
    items.sort_by(|a, b| comparator.compare(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityStore;

    #[test]
    fn test_compare_text_ignores_case_first() {
        assert_eq!(compare_text("berlin", "Lisbon"), Ordering::Less);
        assert_eq!(compare_text("ETH", "eth"), Ordering::Less);
        assert_eq!(compare_text("eth", "eth"), Ordering::Equal);
    }

    #[test]
    fn test_members_descending() {
        let store = EntityStore::bundled().unwrap();
        let mut items: Vec<&Community> = store.communities().iter().collect();
        sort_refs(&mut items, &SortSpec::new(CommunitySort::Members, SortDirection::Descending));
        assert_eq!(items[0].id, "eth-bangalore");
        assert!(items.windows(2).all(|w| w[0].member_count >= w[1].member_count));
    }

    #[test]
    fn test_frequency_rank_sort() {
        let store = EntityStore::bundled().unwrap();
        let mut items: Vec<&Community> = store.communities().iter().collect();
        sort_refs(&mut items, &SortSpec::new(CommunitySort::Frequency, SortDirection::Descending));
        assert_eq!(items[0].meeting_frequency.slug(), "weekly");
        assert_eq!(items.last().unwrap().meeting_frequency.slug(), "quarterly");
    }

    #[test]
    fn test_reward_sort_uses_structured_amount() {
        let store = EntityStore::bundled().unwrap();
        let mut items: Vec<&Opportunity> = store.opportunities().iter().collect();
        sort_refs(&mut items, &SortSpec::new(OpportunitySort::Reward, SortDirection::Descending));
        assert_eq!(items[0].id, "uniswap-senior-solidity");
        // "Competitive" carries no amount and ranks last.
        assert_eq!(items.last().unwrap().id, "walletconnect-sdk");
    }

    #[test]
    fn test_deadline_missing_last_ascending() {
        let store = EntityStore::bundled().unwrap();
        let mut items: Vec<&Opportunity> = store.opportunities().iter().collect();
        sort_refs(&mut items, &SortSpec::new(OpportunitySort::Deadline, SortDirection::Ascending));
        assert_eq!(items[0].id, "optimism-retro-funding");
        assert!(items.last().unwrap().deadline.is_none());
    }

    #[test]
    fn test_direction_toggle() {
        assert_eq!(SortDirection::Ascending.toggle().toggle(), SortDirection::Ascending);
        assert_eq!(SortDirection::Descending.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(SortDirection::Descending.apply(Ordering::Equal), Ordering::Equal);
    }
}
