//! Sectioning of sorted listings (calendar view).

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// "November 2026"
    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| self.to_string())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group<K, T> {
    pub key: K,
    pub items: Vec<T>,
}

/// Partition `items` by `key`. Groups come out in ascending key order;
/// items keep their relative input order within a group.
pub fn group_by_key<K, T, I, F>(items: I, key: F) -> Vec<Group<K, T>>
where
    K: Ord,
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
        .into_iter()
        .map(|(key, items)| Group { key, items })
        .collect()
}

pub fn group_by_month<'a>(events: &[&'a Event]) -> Vec<Group<YearMonth, &'a Event>> {
    group_by_key(events.iter().copied(), |event| YearMonth::of(event.date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::{EventSort, SortDirection, SortSpec, sort_refs};
    use crate::store::EntityStore;

    #[test]
    fn test_groups_ascending_even_when_sorted_descending() {
        let store = EntityStore::bundled().unwrap();
        let mut events: Vec<&Event> = store.events().iter().collect();
        sort_refs(&mut events, &SortSpec::new(EventSort::Date, SortDirection::Descending));

        let groups = group_by_month(&events);
        assert!(groups.windows(2).all(|w| w[0].key < w[1].key));

        let total: usize = groups.iter().map(|g| g.items.len()).sum();
        assert_eq!(total, events.len());

        // Within a month the descending order survives.
        for group in &groups {
            assert!(group.items.windows(2).all(|w| w[0].date >= w[1].date));
        }
    }

    #[test]
    fn test_year_month_label() {
        let ym = YearMonth::of(NaiveDate::from_ymd_opt(2026, 11, 14).unwrap());
        assert_eq!(ym.to_string(), "2026-11");
        assert_eq!(ym.label(), "November 2026");
    }

    #[test]
    fn test_group_empty_input() {
        let groups: Vec<Group<u8, u8>> = group_by_key(Vec::<u8>::new(), |v| *v);
        assert!(groups.is_empty());
    }
}
