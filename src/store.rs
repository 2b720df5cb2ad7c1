//! In-memory entity store backed by the bundled datasets.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Community, Event, Opportunity, Organization};

const COMMUNITIES_JSON: &str = include_str!("../data/communities.json");
const EVENTS_JSON: &str = include_str!("../data/events.json");
const OPPORTUNITIES_JSON: &str = include_str!("../data/opportunities.json");
const ORGANIZATIONS_JSON: &str = include_str!("../data/organizations.json");

/// Minimum Jaro-Winkler similarity for a fuzzy organization hit.
const ORG_SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct EntityStore {
    communities: Vec<Community>,
    events: Vec<Event>,
    opportunities: Vec<Opportunity>,
    organizations: Vec<Organization>,
}

impl EntityStore {
    /// Datasets compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(
            COMMUNITIES_JSON,
            EVENTS_JSON,
            OPPORTUNITIES_JSON,
            ORGANIZATIONS_JSON,
        )
    }

    /// Datasets from a directory with the same four file names.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read = |name: &str| -> Result<String> {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|e| Error::read(path, e))
        };
        Self::from_json(
            &read("communities.json")?,
            &read("events.json")?,
            &read("opportunities.json")?,
            &read("organizations.json")?,
        )
    }

    pub fn load(config: &Config) -> Result<Self> {
        let store = match &config.data_dir {
            Some(dir) => Self::from_dir(dir)?,
            None => Self::bundled()?,
        };
        tracing::debug!(
            communities = store.communities.len(),
            events = store.events.len(),
            opportunities = store.opportunities.len(),
            organizations = store.organizations.len(),
            "entity store loaded"
        );
        Ok(store)
    }

    fn from_json(communities: &str, events: &str, opportunities: &str, organizations: &str) -> Result<Self> {
        Self::from_parts(
            serde_json::from_str(communities)?,
            serde_json::from_str(events)?,
            serde_json::from_str(opportunities)?,
            serde_json::from_str(organizations)?,
        )
    }

    pub fn from_parts(
        communities: Vec<Community>,
        events: Vec<Event>,
        opportunities: Vec<Opportunity>,
        organizations: Vec<Organization>,
    ) -> Result<Self> {
        let store = Self {
            communities,
            events,
            opportunities,
            organizations,
        };
        store.validate()?;
        Ok(store)
    }

    fn validate(&self) -> Result<()> {
        ensure_unique("community", self.communities.iter().map(|c| c.id.as_str()))?;
        ensure_unique("event", self.events.iter().map(|e| e.id.as_str()))?;
        ensure_unique("opportunity", self.opportunities.iter().map(|o| o.id.as_str()))?;
        ensure_unique("organization", self.organizations.iter().map(|o| o.id.as_str()))?;

        for community in &self.communities {
            if community.focus_areas.is_empty() {
                return Err(Error::invalid_data(format!(
                    "community '{}' has no focus areas",
                    community.id
                )));
            }
            let c = community.coordinates;
            if !(-90.0..=90.0).contains(&c.lat) || !(-180.0..=180.0).contains(&c.lng) {
                return Err(Error::invalid_data(format!(
                    "community '{}' has out-of-range coordinates ({}, {})",
                    community.id, c.lat, c.lng
                )));
            }
        }

        for event in &self.events {
            if let Some(end) = event.end_date {
                if end < event.date {
                    return Err(Error::invalid_data(format!(
                        "event '{}' ends ({}) before it starts ({})",
                        event.id, end, event.date
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn opportunities(&self) -> &[Opportunity] {
        &self.opportunities
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn community(&self, id: &str) -> Result<&Community> {
        self.communities
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found("community", id))
    }

    pub fn organization(&self, id: &str) -> Option<&Organization> {
        self.organizations.iter().find(|o| o.id == id)
    }

    pub fn search_organizations(&self, query: &str) -> Vec<&Organization> {
        search_organizations(&self.organizations, query)
    }

    /// Events associated with a community by text overlap, in date order.
    pub fn events_for_community(&self, community: &Community) -> Vec<&Event> {
        let mut matched: Vec<&Event> = self
            .events
            .iter()
            .filter(|event| event_matches_community(event, community))
            .collect();
        matched.sort_by_key(|e| e.date);
        matched
    }

    /// Earliest associated event that has not finished by `today`.
    pub fn next_event_for_community(&self, community: &Community, today: NaiveDate) -> Option<&Event> {
        self.events_for_community(community)
            .into_iter()
            .find(|event| event.last_day() >= today)
    }

    /// Distinct tags across all events, sorted.
    pub fn event_tags(&self) -> Vec<String> {
        distinct_tags(self.events.iter().flat_map(|e| e.tags.iter()))
    }

    pub fn opportunity_tags(&self) -> Vec<String> {
        distinct_tags(self.opportunities.iter().flat_map(|o| o.tags.iter()))
    }
}

fn ensure_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::invalid_data(format!("duplicate {} id '{}'", kind, id)));
        }
    }
    Ok(())
}

fn distinct_tags<'a>(tags: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = tags
        .map(|t| t.to_lowercase())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    out.sort();
    out
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Text-overlap association between an event and a community.
///
/// Matches when the event title mentions the community name, the organizers
/// overlap, or the event location mentions the community's city. One event
/// may attach to several communities.
pub fn event_matches_community(event: &Event, community: &Community) -> bool {
    if contains_ci(&event.title, &community.name) {
        return true;
    }

    if let Some(organizer) = event.organizer.as_deref() {
        if contains_ci(organizer, &community.name) || contains_ci(&community.name, organizer) {
            return true;
        }
        if let Some(community_organizer) = community.organizer.as_deref() {
            if contains_ci(organizer, community_organizer) || contains_ci(community_organizer, organizer) {
                return true;
            }
        }
    }

    contains_ci(&event.location, &community.city)
}

/// Organizations ranked for the wizard lookup: substring hits first, then
/// names within Jaro-Winkler distance of the query. Empty query lists all
/// organizations by name.
pub fn search_organizations<'a>(organizations: &'a [Organization], query: &str) -> Vec<&'a Organization> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        let mut all: Vec<&Organization> = organizations.iter().collect();
        all.sort_by_key(|o| o.name.to_lowercase());
        return all;
    }

    let mut scored: Vec<(f64, &Organization)> = organizations
        .iter()
        .filter_map(|org| {
            let name = org.name.to_lowercase();
            if name.contains(&query) || org.id.contains(&query) {
                Some((2.0, org))
            } else {
                let similarity = strsim::jaro_winkler(&name, &query);
                (similarity >= ORG_SIMILARITY_THRESHOLD).then_some((similarity, org))
            }
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, org)| org).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> EntityStore {
        EntityStore::bundled().unwrap()
    }

    #[test]
    fn test_bundled_datasets_load() {
        let store = store();
        assert!(!store.communities().is_empty());
        assert!(!store.events().is_empty());
        assert!(!store.opportunities().is_empty());
        assert!(!store.organizations().is_empty());
    }

    #[test]
    fn test_community_lookup() {
        let store = store();
        assert_eq!(store.community("eth-nyc").unwrap().name, "Ethereum NYC");
        assert!(matches!(
            store.community("nope"),
            Err(Error::NotFound { kind: "community", .. })
        ));
    }

    #[test]
    fn test_event_matches_by_organizer() {
        let store = store();
        let nyc = store.community("eth-nyc").unwrap();
        let ids: Vec<&str> = store.events_for_community(nyc).iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains(&"eth-nyc-december"));
    }

    #[test]
    fn test_next_event_skips_finished() {
        let store = store();
        let berlin = store.community("berlin-ethereum").unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 6, 13).unwrap();
        let next = store.next_event_for_community(berlin, today).unwrap();
        assert_eq!(next.id, "berlin-blockchain-week");

        let after = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        assert!(store.next_event_for_community(berlin, after).is_none());
    }

    #[test]
    fn test_rejects_event_ending_before_start() {
        let mut events: Vec<Event> = serde_json::from_str(EVENTS_JSON).unwrap();
        events[0].end_date = Some(events[0].date - chrono::Duration::days(1));
        let err = EntityStore::from_parts(vec![], events, vec![], vec![]).unwrap_err();
        assert!(err.to_string().contains("ends"));
    }

    #[test]
    fn test_rejects_community_without_focus() {
        let mut communities: Vec<Community> = serde_json::from_str(COMMUNITIES_JSON).unwrap();
        communities[0].focus_areas.clear();
        assert!(EntityStore::from_parts(communities, vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut orgs: Vec<Organization> = serde_json::from_str(ORGANIZATIONS_JSON).unwrap();
        orgs.push(orgs[0].clone());
        assert!(EntityStore::from_parts(vec![], vec![], vec![], orgs).is_err());
    }

    #[test]
    fn test_organization_search_substring_then_fuzzy() {
        let store = store();
        let hits = store.search_organizations("optim");
        assert_eq!(hits[0].id, "optimism");

        let typo = store.search_organizations("Etherum Foundation");
        assert_eq!(typo.first().map(|o| o.id.as_str()), Some("ethereum-foundation"));

        assert_eq!(store.search_organizations("").len(), store.organizations().len());
        assert!(store.search_organizations("zzzzqqq").is_empty());
    }

    #[test]
    fn test_from_dir_reports_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("communities.json"), COMMUNITIES_JSON).unwrap();

        let err = EntityStore::from_dir(dir.path()).unwrap_err();
        match &err {
            Error::Read { path, source } => {
                assert_eq!(path, &dir.path().join("events.json"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected read error, got {other:?}"),
        }
        assert!(err.to_string().contains("events.json"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_dir_loads_copied_datasets() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [
            ("communities.json", COMMUNITIES_JSON),
            ("events.json", EVENTS_JSON),
            ("opportunities.json", OPPORTUNITIES_JSON),
            ("organizations.json", ORGANIZATIONS_JSON),
        ] {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let store = EntityStore::from_dir(dir.path()).unwrap();
        assert_eq!(store.communities().len(), EntityStore::bundled().unwrap().communities().len());
    }

    #[test]
    fn test_event_tags_are_distinct() {
        let tags = store().event_tags();
        let mut sorted = tags.clone();
        sorted.dedup();
        assert_eq!(tags, sorted);
        assert!(tags.contains(&"hackathon".to_string()));
    }

    #[test]
    fn test_opportunity_tags_are_lowercase_and_sorted() {
        let tags = store().opportunity_tags();
        assert!(!tags.is_empty());
        assert!(tags.windows(2).all(|w| w[0] < w[1]));
        assert!(tags.iter().all(|t| *t == t.to_lowercase()));
    }
}
