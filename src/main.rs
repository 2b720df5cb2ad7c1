use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::BufWriter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ethdir::config::Config;
use ethdir::filter::{
    CommunityFilter, EventFilter, EventWindow, FilterState, FocusSelection, LocationStatus,
    OpportunityFilter, PostedWindow, Selection,
};
use ethdir::geo::GeoLocator;
use ethdir::models::{ActivityLevel, LocationType, MeetingFormat, OpportunityType, SkillLevel};
use ethdir::pipeline::{CommunityQuery, EventQuery, OpportunityQuery};
use ethdir::sort::{CommunitySort, EventSort, OpportunitySort, SortDirection, SortSpec};
use ethdir::store::EntityStore;
use ethdir::wizard::{JsonSink, Wizard};
use ethdir::{prompt, topo, tui};

#[derive(Parser)]
#[command(name = "ethdir")]
#[command(about = "Browse Ethereum communities, events and opportunities")]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluate date filters as of this day (YYYY-MM-DD)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List communities
    Communities {
        /// Free-text search
        #[arg(short, long, default_value = "")]
        search: String,

        /// Focus area, "near-me" or "all"
        #[arg(short, long, default_value = "all")]
        focus: FocusSelection,

        /// Activity level (very-active, active, moderate, emerging, all)
        #[arg(short, long, default_value = "all")]
        activity: Selection<ActivityLevel>,

        /// Skill level (beginner, intermediate, advanced, all-levels, all)
        #[arg(long, default_value = "all")]
        skill: Selection<SkillLevel>,

        /// Meeting format (in-person, online, hybrid, all)
        #[arg(long, default_value = "all")]
        format: Selection<MeetingFormat>,

        /// Only featured communities
        #[arg(long)]
        featured: bool,

        /// Sort field (name, location, members, frequency, activity)
        #[arg(long, default_value = "name")]
        sort: CommunitySort,

        /// Sort descending
        #[arg(long)]
        desc: bool,
    },

    /// Show community details
    Community {
        /// Community ID
        id: String,
    },

    /// List events
    Events {
        /// Free-text search
        #[arg(short, long, default_value = "")]
        search: String,

        /// Location type (online, in-person, hybrid, all)
        #[arg(short = 't', long = "type", default_value = "all")]
        location_type: Selection<LocationType>,

        /// Date window (all, this-week, this-month, next-3-months, past)
        #[arg(short, long, default_value = "all")]
        when: EventWindow,

        /// Require one of these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only featured events
        #[arg(long)]
        featured: bool,

        /// Sort field (date, title, location)
        #[arg(long, default_value = "date")]
        sort: EventSort,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Group by month
        #[arg(long)]
        calendar: bool,

        /// Print the known event tags and exit
        #[arg(long)]
        list_tags: bool,
    },

    /// List opportunities
    Opportunities {
        /// Free-text search
        #[arg(short, long, default_value = "")]
        search: String,

        /// Opportunity type (job, grant, bounty, project, all)
        #[arg(short = 't', long = "type", default_value = "all")]
        kind: Selection<OpportunityType>,

        /// Posted within (all, week, month, quarter)
        #[arg(short, long, default_value = "all")]
        posted: PostedWindow,

        /// Require one of these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only featured opportunities
        #[arg(long)]
        featured: bool,

        /// Sort field (posted, deadline, reward, title, company)
        #[arg(long, default_value = "posted")]
        sort: OpportunitySort,

        /// Sort ascending (default for posted is newest first)
        #[arg(long, conflicts_with = "desc")]
        asc: bool,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Print the known opportunity tags and exit
        #[arg(long)]
        list_tags: bool,
    },

    /// Interactive community browser
    Browse {
        /// Skip the geolocation lookup
        #[arg(long)]
        offline: bool,
    },

    /// Submit an opportunity
    Add {
        /// Write the submission JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve your location and its country shape
    Locate,

    /// Show the effective configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ethdir=debug" } else { "ethdir=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &Config) -> Result<EntityStore> {
    EntityStore::load(config).context("Failed to load directory data")
}

/// Print the tag vocabulary, or warn about requested tags nothing carries.
/// Returns true when the tags were listed.
fn handle_tags(known: &[String], requested: &[String], list: bool) -> bool {
    if list {
        for tag in known {
            println!("{}", tag);
        }
        return true;
    }
    for tag in requested {
        if !known.iter().any(|k| k.eq_ignore_ascii_case(tag)) {
            eprintln!("Warning: no entries are tagged '{}'", tag);
        }
    }
    false
}

fn print_empty(what: &str, filtered: bool) {
    if filtered {
        println!("No {} match the current filters.", what);
    } else {
        println!("No {} found.", what);
    }
}

fn direction(desc: bool) -> SortDirection {
    if desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (config, config_path) = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let today = cli.today.unwrap_or_else(|| chrono::Local::now().date_naive());

    match cli.command {
        Commands::Communities {
            search,
            focus,
            activity,
            skill,
            format,
            featured,
            sort,
            desc,
        } => {
            let store = open_store(&config)?;
            let location = if focus == FocusSelection::NearMe {
                match GeoLocator::new(&config)?.locate() {
                    Some(location) => LocationStatus::Resolved(location),
                    None => {
                        eprintln!("Location unavailable; showing all communities.");
                        LocationStatus::Failed
                    }
                }
            } else {
                LocationStatus::Pending
            };

            let mut query = CommunityQuery::new(CommunityFilter {
                search,
                focus,
                location,
                activity,
                skill,
                format,
                featured_only: featured,
            });
            query.sort = SortSpec::new(sort, direction(desc));

            let communities = query.run(store.communities());
            if communities.is_empty() {
                print_empty("communities", query.filter.is_active());
            } else {
                println!("{:<24} {:<28} {:<24} {:>8} {:<12}", "ID", "NAME", "LOCATION", "MEMBERS", "ACTIVITY");
                println!("{}", "-".repeat(100));
                for c in communities {
                    println!(
                        "{:<24} {:<28} {:<24} {:>8} {:<12}",
                        truncate(&c.id, 22),
                        truncate(&c.name, 26),
                        truncate(&c.location_label(), 22),
                        c.member_count,
                        c.activity_level
                    );
                }
            }
        }

        Commands::Community { id } => {
            let store = open_store(&config)?;
            let c = store.community(&id)?;
            println!("{}", c.name);
            println!("Location: {}", c.location_label());
            if let Some(organizer) = &c.organizer {
                println!("Organizer: {}", organizer);
            }
            let areas: Vec<&str> = c.focus_areas.iter().map(|a| a.slug()).collect();
            println!("Focus: {}", areas.join(", "));
            println!("Activity: {}", c.activity_level);
            println!("Skill level: {}", c.skill_level);
            println!("Meets: {} ({})", c.meeting_frequency, c.meeting_format);
            println!("Members: {}", c.member_count);
            for (label, url) in c.socials.links() {
                println!("{}: {}", label, url);
            }
            let about = c.long_description.as_deref().unwrap_or(&c.description);
            println!("\n{}", textwrap::fill(about, 80));

            match store.next_event_for_community(c, today) {
                Some(next) => println!("\nNext event: {} ({}, {})", next.title, next.date_label(), next.location),
                None => println!("\nNext event: -"),
            }
            let events = store.events_for_community(c);
            if !events.is_empty() {
                println!("\nEvents ({}):", events.len());
                for event in events {
                    println!("  {} - {}", event.date_label(), event.title);
                }
            }
        }

        Commands::Events {
            search,
            location_type,
            when,
            tags,
            featured,
            sort,
            desc,
            calendar,
            list_tags,
        } => {
            let store = open_store(&config)?;
            if handle_tags(&store.event_tags(), &tags, list_tags) {
                return Ok(());
            }
            let mut query = EventQuery::new(EventFilter {
                search,
                location_type,
                window: when,
                tags,
                featured_only: featured,
                today,
            });
            query.sort = SortSpec::new(sort, direction(desc));

            if calendar {
                let sections = query.calendar(store.events());
                if sections.is_empty() {
                    print_empty("events", query.filter.is_active());
                }
                for section in sections {
                    println!("\n{} ({})", section.key.label(), section.items.len());
                    println!("{}", "-".repeat(60));
                    for event in section.items {
                        println!("  {:<24} {:<34}", event.date_label(), truncate(&event.title, 32));
                    }
                }
            } else {
                let events = query.run(store.events());
                if events.is_empty() {
                    print_empty("events", query.filter.is_active());
                } else {
                    println!("{:<24} {:<34} {:<24} {:<10}", "DATE", "TITLE", "LOCATION", "TYPE");
                    println!("{}", "-".repeat(95));
                    for event in events {
                        println!(
                            "{:<24} {:<34} {:<24} {:<10}",
                            event.date_label(),
                            truncate(&event.title, 32),
                            truncate(&event.location, 22),
                            event.location_type
                        );
                    }
                }
            }
        }

        Commands::Opportunities {
            search,
            kind,
            posted,
            tags,
            featured,
            sort,
            asc,
            desc,
            list_tags,
        } => {
            let store = open_store(&config)?;
            if handle_tags(&store.opportunity_tags(), &tags, list_tags) {
                return Ok(());
            }
            let mut query = OpportunityQuery::new(OpportunityFilter {
                search,
                kind,
                posted,
                tags,
                featured_only: featured,
                today,
            });
            if asc || desc || sort != query.sort.field {
                query.sort = SortSpec::new(sort, direction(desc));
            }

            let opportunities = query.run(store.opportunities());
            if opportunities.is_empty() {
                print_empty("opportunities", query.filter.is_active());
            } else {
                println!(
                    "{:<8} {:<32} {:<20} {:>22} {:<11} {:<11}",
                    "TYPE", "TITLE", "COMPANY", "REWARD", "POSTED", "DEADLINE"
                );
                println!("{}", "-".repeat(108));
                for o in opportunities {
                    println!(
                        "{:<8} {:<32} {:<20} {:>22} {:<11} {:<11}",
                        o.kind,
                        truncate(&o.title, 30),
                        truncate(&o.company, 18),
                        truncate(&o.compensation.to_string(), 22),
                        o.posted_at,
                        o.deadline.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
                    );
                }
            }
        }

        Commands::Browse { offline } => {
            let store = open_store(&config)?;
            let location = if offline {
                None
            } else {
                Some(GeoLocator::new(&config)?.spawn())
            };
            tui::run_browse(&store, today, config.near_me_radius_km, location)?;
        }

        Commands::Add { output } => {
            let store = open_store(&config)?;
            let mut wizard = Wizard::new(store.organizations(), config.wizard_reset_delay());
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut out = std::io::stdout();
            let submission = match &output {
                Some(path) => {
                    let file = std::fs::File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    let mut sink = JsonSink::new(BufWriter::new(file));
                    prompt::run_wizard(&mut wizard, &mut input, &mut out, &mut sink)?
                }
                None => {
                    let mut sink = JsonSink::new(std::io::stdout());
                    prompt::run_wizard(&mut wizard, &mut input, &mut out, &mut sink)?
                }
            };
            if let Some(path) = output {
                println!("Saved {} submission to {}", submission.kind.label(), path.display());
            }
        }

        Commands::Locate => {
            let store = open_store(&config)?;
            let Some(location) = GeoLocator::new(&config)?.locate() else {
                println!("Location unavailable.");
                return Ok(());
            };
            println!("Country: {}", location.country);
            println!("Coordinates: {:.4}, {:.4}", location.latitude, location.longitude);

            let shapes = topo::load_world(&config);
            match topo::find_country(&shapes, &location.country)
                .or_else(|| topo::country_at(&shapes, location.longitude, location.latitude))
            {
                Some(shape) => println!("Map highlight: {} (id {})", shape.name, shape.id),
                None => println!("Map highlight: -"),
            }

            let mut query = CommunityQuery::new(CommunityFilter {
                focus: FocusSelection::NearMe,
                location: LocationStatus::Resolved(location),
                ..Default::default()
            });
            query.sort = SortSpec::new(CommunitySort::Members, SortDirection::Descending);
            let nearby = query.run(store.communities());
            if nearby.is_empty() {
                println!("\nNo communities in your country yet.");
            } else {
                println!("\nCommunities near you ({}):", nearby.len());
                for c in nearby {
                    println!("  {} - {}", c.name, c.city);
                }
            }
        }

        Commands::Config => {
            match &config_path {
                Some(path) => println!("# {}", path.display()),
                None => println!("# defaults (no config file)"),
            }
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
