use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::reward::Compensation;

/// Declares a closed, slug-named enumeration: serde names, `Display`,
/// `FromStr` (case-insensitive, with aliases) and an `ALL` table.
macro_rules! slug_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $slug:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $(
                #[serde(rename = $slug $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn slug(self) -> &'static str {
                match self {
                    $($name::$variant => $slug,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.slug())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let lower = s.trim().to_lowercase();
                match lower.as_str() {
                    $($slug $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(crate::error::Error::parse(format!(
                        "unknown {} '{}' (expected one of: {})",
                        stringify!($name),
                        s,
                        [$($slug),+].join(", ")
                    ))),
                }
            }
        }
    };
}

pub(crate) use slug_enum;

slug_enum! {
    FocusArea {
        Defi => "defi",
        Nft => "nft" | "nfts",
        Dao => "dao" | "daos",
        Infrastructure => "infrastructure" | "infra",
        Education => "education",
        Research => "research",
        Gaming => "gaming",
        SocialImpact => "social-impact",
        Privacy => "privacy",
        Zk => "zk" | "zero-knowledge",
    }
}

slug_enum! {
    ActivityLevel {
        VeryActive => "very-active",
        Active => "active",
        Moderate => "moderate",
        Emerging => "emerging",
    }
}

impl ActivityLevel {
    pub fn rank(self) -> u8 {
        match self {
            ActivityLevel::VeryActive => 4,
            ActivityLevel::Active => 3,
            ActivityLevel::Moderate => 2,
            ActivityLevel::Emerging => 1,
        }
    }
}

slug_enum! {
    SkillLevel {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        AllLevels => "all-levels" | "all levels",
    }
}

slug_enum! {
    MeetingFormat {
        InPerson => "in-person",
        Online => "online",
        Hybrid => "hybrid",
    }
}

slug_enum! {
    MeetingFrequency {
        Weekly => "weekly",
        BiWeekly => "bi-weekly" | "biweekly",
        Monthly => "monthly",
        Quarterly => "quarterly",
    }
}

impl MeetingFrequency {
    /// Weekly > Bi-weekly > Monthly > Quarterly
    pub fn rank(self) -> u8 {
        match self {
            MeetingFrequency::Weekly => 4,
            MeetingFrequency::BiWeekly => 3,
            MeetingFrequency::Monthly => 2,
            MeetingFrequency::Quarterly => 1,
        }
    }
}

slug_enum! {
    LocationType {
        Online => "online",
        InPerson => "in-person",
        Hybrid => "hybrid",
    }
}

slug_enum! {
    OpportunityType {
        Job => "job" | "jobs",
        Grant => "grant" | "grants",
        Bounty => "bounty" | "bounties",
        Project => "project" | "projects",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Socials {
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default)]
    pub discord: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

impl Socials {
    /// Present links as (label, url) pairs, in display order.
    pub fn links(&self) -> Vec<(&'static str, &str)> {
        [
            ("Website", &self.website),
            ("Twitter", &self.twitter),
            ("Telegram", &self.telegram),
            ("Discord", &self.discord),
            ("GitHub", &self.github),
            ("LinkedIn", &self.linkedin),
        ]
        .into_iter()
        .filter_map(|(label, url)| url.as_deref().map(|u| (label, u)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub name: String,
    pub city: String,
    pub country: String,
    pub coordinates: Coordinates,
    pub focus_areas: Vec<FocusArea>,
    pub activity_level: ActivityLevel,
    pub skill_level: SkillLevel,
    pub meeting_format: MeetingFormat,
    pub meeting_frequency: MeetingFrequency,
    pub member_count: u32,
    pub description: String,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub socials: Socials,
    #[serde(default)]
    pub featured: bool,
}

impl Community {
    pub fn location_label(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<String>,
    pub location: String,
    pub location_type: LocationType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub registration_url: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub featured: bool,
}

impl Event {
    pub fn last_day(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.date)
    }

    /// Days from `today` until the event starts; 0 while it is running.
    pub fn days_until(&self, today: NaiveDate) -> i64 {
        let days = (self.date - today).num_days();
        if days < 0 && self.last_day() >= today {
            0
        } else {
            days
        }
    }

    pub fn date_label(&self) -> String {
        match self.end_date {
            Some(end) if end != self.date => format!("{} - {}", self.date, end),
            _ => self.date.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(rename = "type")]
    pub kind: OpportunityType,
    pub compensation: Compensation,
    pub posted_at: NaiveDate,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default = "default_remote")]
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub apply_url: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub socials: Socials,
    #[serde(default)]
    pub featured: bool,
}

fn default_remote() -> String {
    "Remote".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}
