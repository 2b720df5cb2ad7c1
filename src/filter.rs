//! Listing filters.
//!
//! Every filter is an immutable snapshot implementing [`Predicate`]; an
//! entity passes when every active condition passes (AND across
//! categories, OR within a multi-select tag set).

use chrono::NaiveDate;
use std::str::FromStr;

use crate::error::Error;
use crate::geo::GeoLocation;
use crate::models::{
    ActivityLevel, Community, Event, FocusArea, LocationType, MeetingFormat, Opportunity,
    OpportunityType, SkillLevel, slug_enum,
};

pub trait Predicate<T: ?Sized> {
    fn matches(&self, item: &T) -> bool;
}

/// Filter state that can be cleared back to "show everything".
pub trait FilterState {
    fn clear(&mut self);
    fn is_active(&self) -> bool;
}

/// Keep the items passing `predicate`, preserving input order.
pub fn apply<'a, T, P>(items: impl IntoIterator<Item = &'a T>, predicate: &P) -> Vec<&'a T>
where
    T: 'a,
    P: Predicate<T> + ?Sized,
{
    items.into_iter().filter(|item| predicate.matches(item)).collect()
}

/// A single-choice category filter; `All` bypasses the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Selection<T> {
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(expected) => expected == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

impl<T: FromStr<Err = Error>> FromStr for Selection<T> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Selection::All)
        } else {
            s.parse().map(Selection::Only)
        }
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Selection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::Only(value) => value.fmt(f),
        }
    }
}

/// Case-insensitive substring search; an empty query matches anything.
pub fn text_matches<'a>(query: &str, fields: impl IntoIterator<Item = &'a str>) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    fields.into_iter().any(|field| field.to_lowercase().contains(&query))
}

/// Passes when any selected tag is present; no selection passes everything.
pub fn tags_intersect(selected: &[String], tags: &[String]) -> bool {
    selected.is_empty()
        || selected
            .iter()
            .any(|want| tags.iter().any(|tag| tag.eq_ignore_ascii_case(want)))
}

/// Resolution state of the visitor's location for the "near me" filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LocationStatus {
    #[default]
    Pending,
    Resolved(GeoLocation),
    Failed,
}

impl LocationStatus {
    pub fn country(&self) -> Option<&str> {
        match self {
            LocationStatus::Resolved(location) => Some(location.country.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusSelection {
    #[default]
    All,
    NearMe,
    Area(FocusArea),
}

impl FromStr for FocusSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(FocusSelection::All),
            "near-me" | "nearme" => Ok(FocusSelection::NearMe),
            other => other.parse().map(FocusSelection::Area),
        }
    }
}

impl std::fmt::Display for FocusSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusSelection::All => f.write_str("all"),
            FocusSelection::NearMe => f.write_str("near-me"),
            FocusSelection::Area(area) => area.fmt(f),
        }
    }
}

impl FocusSelection {
    /// The next option in the cycle All → near-me → each area → All.
    pub fn cycle(self) -> Self {
        match self {
            FocusSelection::All => FocusSelection::NearMe,
            FocusSelection::NearMe => FocusSelection::Area(FocusArea::ALL[0]),
            FocusSelection::Area(area) => {
                let idx = FocusArea::ALL.iter().position(|a| *a == area).unwrap_or(0);
                FocusArea::ALL
                    .get(idx + 1)
                    .map(|next| FocusSelection::Area(*next))
                    .unwrap_or(FocusSelection::All)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommunityFilter {
    pub search: String,
    pub focus: FocusSelection,
    pub location: LocationStatus,
    pub activity: Selection<ActivityLevel>,
    pub skill: Selection<SkillLevel>,
    pub format: Selection<MeetingFormat>,
    pub featured_only: bool,
}

impl Predicate<Community> for CommunityFilter {
    fn matches(&self, c: &Community) -> bool {
        let focus_ok = match self.focus {
            FocusSelection::All => true,
            // Unresolved location shows everything instead of an empty list.
            FocusSelection::NearMe => match self.location.country() {
                Some(country) => c.country.eq_ignore_ascii_case(country),
                None => true,
            },
            FocusSelection::Area(area) => c.focus_areas.contains(&area),
        };

        focus_ok
            && self.activity.admits(&c.activity_level)
            && self.skill.admits(&c.skill_level)
            && self.format.admits(&c.meeting_format)
            && (!self.featured_only || c.featured)
            && text_matches(
                &self.search,
                [c.name.as_str(), c.description.as_str(), c.city.as_str(), c.country.as_str()]
                    .into_iter()
                    .chain(c.long_description.as_deref())
                    .chain(c.organizer.as_deref())
                    .chain(c.focus_areas.iter().map(|a| a.slug())),
            )
    }
}

impl FilterState for CommunityFilter {
    /// Clears every condition but keeps the resolved location.
    fn clear(&mut self) {
        *self = CommunityFilter {
            location: std::mem::take(&mut self.location),
            ..Default::default()
        };
    }

    fn is_active(&self) -> bool {
        !self.search.trim().is_empty()
            || self.focus != FocusSelection::All
            || !self.activity.is_all()
            || !self.skill.is_all()
            || !self.format.is_all()
            || self.featured_only
    }
}

slug_enum! {
    /// Event date buckets relative to today.
    EventWindow {
        All => "all",
        ThisWeek => "this-week" | "week",
        ThisMonth => "this-month" | "month",
        Next3Months => "next-3-months" | "quarter",
        Past => "past",
    }
}

impl EventWindow {
    pub fn admits(self, days_until: i64) -> bool {
        match self {
            EventWindow::All => true,
            EventWindow::ThisWeek => (0..=7).contains(&days_until),
            EventWindow::ThisMonth => (0..=30).contains(&days_until),
            EventWindow::Next3Months => (0..=90).contains(&days_until),
            EventWindow::Past => days_until < 0,
        }
    }
}

impl Default for EventWindow {
    fn default() -> Self {
        EventWindow::All
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventFilter {
    pub search: String,
    pub location_type: Selection<LocationType>,
    pub window: EventWindow,
    pub tags: Vec<String>,
    pub featured_only: bool,
    pub today: NaiveDate,
}

impl EventFilter {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            search: String::new(),
            location_type: Selection::All,
            window: EventWindow::All,
            tags: Vec::new(),
            featured_only: false,
            today,
        }
    }
}

impl Predicate<Event> for EventFilter {
    fn matches(&self, e: &Event) -> bool {
        self.location_type.admits(&e.location_type)
            && self.window.admits(e.days_until(self.today))
            && tags_intersect(&self.tags, &e.tags)
            && (!self.featured_only || e.featured)
            && text_matches(
                &self.search,
                [e.title.as_str(), e.description.as_str(), e.location.as_str()]
                    .into_iter()
                    .chain(e.organizer.as_deref())
                    .chain(e.tags.iter().map(String::as_str)),
            )
    }
}

impl FilterState for EventFilter {
    fn clear(&mut self) {
        *self = EventFilter::new(self.today);
    }

    fn is_active(&self) -> bool {
        *self != EventFilter::new(self.today)
    }
}

slug_enum! {
    /// How recently an opportunity was posted.
    PostedWindow {
        All => "all",
        Week => "week",
        Month => "month",
        Quarter => "quarter",
    }
}

impl PostedWindow {
    pub fn admits(self, days_since: i64) -> bool {
        match self {
            PostedWindow::All => true,
            PostedWindow::Week => days_since <= 7,
            PostedWindow::Month => days_since <= 30,
            PostedWindow::Quarter => days_since <= 90,
        }
    }
}

impl Default for PostedWindow {
    fn default() -> Self {
        PostedWindow::All
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityFilter {
    pub search: String,
    pub kind: Selection<OpportunityType>,
    pub posted: PostedWindow,
    pub tags: Vec<String>,
    pub featured_only: bool,
    pub today: NaiveDate,
}

impl OpportunityFilter {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            search: String::new(),
            kind: Selection::All,
            posted: PostedWindow::All,
            tags: Vec::new(),
            featured_only: false,
            today,
        }
    }
}

impl Predicate<Opportunity> for OpportunityFilter {
    fn matches(&self, o: &Opportunity) -> bool {
        self.kind.admits(&o.kind)
            && self.posted.admits((self.today - o.posted_at).num_days())
            && tags_intersect(&self.tags, &o.tags)
            && (!self.featured_only || o.featured)
            && text_matches(
                &self.search,
                [o.title.as_str(), o.company.as_str(), o.description.as_str(), o.location.as_str()]
                    .into_iter()
                    .chain(o.tags.iter().map(String::as_str)),
            )
    }
}

impl FilterState for OpportunityFilter {
    fn clear(&mut self) {
        *self = OpportunityFilter::new(self.today);
    }

    fn is_active(&self) -> bool {
        *self != OpportunityFilter::new(self.today)
    }
}
