use anyhow::Result;
use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use crate::filter::{FilterState, FocusSelection, LocationStatus, Selection};
use crate::map::MapView;
use crate::models::{ActivityLevel, Community};
use crate::pipeline::CommunityQuery;
use crate::sort::{CommunitySort, SortDirection};
use crate::store::EntityStore;

enum Mode {
    Normal,
    Search(String),
}

struct AppState<'a> {
    store: &'a EntityStore,
    today: NaiveDate,
    radius_km: f64,
    query: CommunityQuery,
    results: Vec<&'a Community>,
    selected: usize,
    scroll_offset: u16,
    map: MapView,
    location: Option<Receiver<LocationStatus>>,
    mode: Mode,
}

impl<'a> AppState<'a> {
    fn new(store: &'a EntityStore, today: NaiveDate, radius_km: f64, location: Option<Receiver<LocationStatus>>) -> Self {
        let mut state = Self {
            store,
            today,
            radius_km,
            query: CommunityQuery::default(),
            results: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            map: MapView::new(None),
            location,
            mode: Mode::Normal,
        };
        state.refresh();
        state
    }

    fn current(&self) -> Option<&'a Community> {
        self.results.get(self.selected).copied()
    }

    /// Re-run the query, keeping the cursor on its community when it survives.
    /// The map refocuses only when its community was filtered out.
    fn refresh(&mut self) {
        let keep = self.current().map(|c| c.id.clone());
        self.results = self.query.run(self.store.communities());
        self.selected = keep
            .and_then(|id| self.results.iter().position(|c| c.id == id))
            .unwrap_or(0);
        self.scroll_offset = 0;
        self.hover_current();

        let focus_listed = self
            .map
            .selected()
            .is_some_and(|id| self.results.iter().any(|c| c.id == id));
        if !focus_listed {
            self.focus_map();
        }
    }

    fn hover_current(&mut self) {
        let id = self.current().map(|c| c.id.clone());
        self.map.hover(id.as_deref());
    }

    fn focus_map(&mut self) {
        match self.current() {
            Some(community) => self.map.select(community),
            None => self.map.clear_selection(),
        }
        // Terminal rendering has no animation; settle immediately.
        self.map.move_ended();
    }

    fn poll_location(&mut self) {
        let Some(rx) = &self.location else { return };
        let status = match rx.try_recv() {
            Ok(status) => status,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => LocationStatus::Failed,
        };
        self.location = None;
        if let LocationStatus::Resolved(location) = &status {
            self.map.locate(location);
            self.map.move_ended();
        }
        self.query.filter.location = status;
        self.refresh();
    }

    fn next(&mut self) {
        if !self.results.is_empty() && self.selected < self.results.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
            self.hover_current();
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
            self.hover_current();
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn cycle_sort(&mut self) {
        let fields = CommunitySort::ALL;
        let idx = fields.iter().position(|f| *f == self.query.sort.field).unwrap_or(0);
        self.query.sort_by(fields[(idx + 1) % fields.len()]);
        self.refresh();
    }

    fn cycle_activity(&mut self) {
        self.query.filter.activity = match self.query.filter.activity {
            Selection::All => Selection::Only(ActivityLevel::ALL[0]),
            Selection::Only(level) => {
                let idx = ActivityLevel::ALL.iter().position(|l| *l == level).unwrap_or(0);
                ActivityLevel::ALL
                    .get(idx + 1)
                    .map(|next| Selection::Only(*next))
                    .unwrap_or(Selection::All)
            }
        };
        self.refresh();
    }

    fn location_label(&self) -> &str {
        if let Some(country) = self.map.highlighted_country() {
            return country;
        }
        match &self.query.filter.location {
            LocationStatus::Pending => "locating...",
            LocationStatus::Resolved(location) => &location.country,
            LocationStatus::Failed => "unknown",
        }
    }
}

pub fn run_browse(store: &EntityStore, today: NaiveDate, radius_km: f64, location: Option<Receiver<LocationStatus>>) -> Result<()> {
    if store.communities().is_empty() {
        println!("No communities found.");
        return Ok(());
    }

    let mut state = AppState::new(store, today, radius_km, location);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, state: &mut AppState<'_>) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        list_state.select((!state.results.is_empty()).then_some(state.selected));
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        state.poll_location();
        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            if let Mode::Search(buffer) = &mut state.mode {
                let edited = match key.code {
                    KeyCode::Enter | KeyCode::Esc => None,
                    KeyCode::Backspace => {
                        buffer.pop();
                        Some(buffer.clone())
                    }
                    KeyCode::Char(c) => {
                        buffer.push(c);
                        Some(buffer.clone())
                    }
                    _ => continue,
                };
                match edited {
                    Some(search) => {
                        state.query.filter.search = search;
                        state.refresh();
                    }
                    None => state.mode = Mode::Normal,
                }
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Enter => state.focus_map(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('/') => state.mode = Mode::Search(state.query.filter.search.clone()),
                KeyCode::Char('f') => {
                    state.query.filter.focus = state.query.filter.focus.cycle();
                    state.refresh();
                }
                KeyCode::Char('a') => state.cycle_activity(),
                KeyCode::Char('F') => {
                    state.query.filter.featured_only = !state.query.filter.featured_only;
                    state.refresh();
                }
                KeyCode::Char('s') => state.cycle_sort(),
                KeyCode::Char('d') => {
                    state.query.toggle_direction();
                    state.refresh();
                }
                KeyCode::Char('x') => {
                    state.query.reset();
                    state.refresh();
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState<'_>, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(60),
        ])
        .split(rows[1]);

    // Header: active query
    let filter = &state.query.filter;
    let direction = match state.query.sort.direction {
        SortDirection::Ascending => "asc",
        SortDirection::Descending => "desc",
    };
    let header = match &state.mode {
        Mode::Search(buffer) => format!(" search: {}_", buffer),
        Mode::Normal => format!(
            "{}focus:{}  activity:{}  featured:{}  sort:{} {}  location:{}  search:\"{}\"",
            if filter.is_active() { " [filtered] " } else { " " },
            filter.focus,
            filter.activity,
            if filter.featured_only { "yes" } else { "no" },
            state.query.sort.field,
            direction,
            state.location_label(),
            filter.search,
        ),
    };
    frame.render_widget(
        Paragraph::new(header).style(Style::default().fg(Color::Cyan)),
        rows[0],
    );

    // Left panel: community list
    let items: Vec<ListItem> = state
        .results
        .iter()
        .map(|c| {
            let featured = if c.featured { "*" } else { " " };
            let on_map = if state.map.selected() == Some(c.id.as_str()) { "@" } else { " " };
            ListItem::new(format!("{}{} {} | {}", featured, on_map, truncate(&c.name, 28), c.city))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Communities ({}/{}) ",
            state.results.len(),
            state.store.communities().len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: community detail
    let detail = build_detail(state, chunks[1].width.saturating_sub(4) as usize);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer help
    let help = Paragraph::new(
        " j/k:navigate  enter:focus map  J/K:scroll  /:search f:focus a:activity F:featured s:sort d:direction x:clear  q:quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[2]);
}

fn build_detail<'a>(state: &AppState<'a>, width: usize) -> Text<'a> {
    let Some(c) = state.current() else {
        return Text::raw("No communities match the current filters");
    };
    let width = width.max(20);

    let mut lines: Vec<Line> = Vec::new();

    // Header
    lines.push(Line::from(Span::styled(
        c.name.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(c.location_label()));
    if let Some(organizer) = &c.organizer {
        lines.push(Line::from(format!("Organized by {}", organizer)));
    }

    let activity_style = match c.activity_level {
        ActivityLevel::VeryActive => Style::default().fg(Color::Green),
        ActivityLevel::Active => Style::default().fg(Color::Cyan),
        ActivityLevel::Moderate => Style::default().fg(Color::Yellow),
        ActivityLevel::Emerging => Style::default().fg(Color::DarkGray),
    };
    lines.push(Line::from(Span::styled(
        format!("Activity: {}", c.activity_level),
        activity_style,
    )));
    lines.push(Line::from(format!(
        "Members: {}  Meets: {} ({})  Level: {}",
        c.member_count, c.meeting_frequency, c.meeting_format, c.skill_level
    )));
    let areas: Vec<&str> = c.focus_areas.iter().map(|a| a.slug()).collect();
    lines.push(Line::from(format!("Focus: {}", areas.join(", "))));
    lines.push(Line::from(""));

    let about = c.long_description.as_deref().unwrap_or(&c.description);
    for line in textwrap::fill(about, width).lines() {
        lines.push(Line::from(line.to_string()));
    }
    lines.push(Line::from(""));

    let links = c.socials.links();
    if !links.is_empty() {
        for (label, url) in links {
            lines.push(Line::from(format!("{}: {}", label, url)));
        }
        lines.push(Line::from(""));
    }

    // Events
    lines.push(Line::from(Span::styled(
        "EVENTS",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    match state.store.next_event_for_community(c, state.today) {
        Some(next) => lines.push(Line::from(Span::styled(
            format!("  Next: {} ({})", next.title, next.date_label()),
            Style::default().fg(Color::Green),
        ))),
        None => lines.push(Line::from(Span::styled(
            "  No upcoming events",
            Style::default().fg(Color::DarkGray),
        ))),
    }
    for event in state.store.events_for_community(c) {
        lines.push(Line::from(format!("  {}  {}", event.date, truncate(&event.title, 40))));
    }
    lines.push(Line::from(""));

    // Nearby the map focus
    let focus = state.map.selected().and_then(|id| state.store.community(id).ok());
    let all: Vec<&Community> = state.store.communities().iter().collect();
    let nearby: Vec<String> = state
        .map
        .visible(&all, state.radius_km)
        .into_iter()
        .filter(|other| state.map.selected() != Some(other.id.as_str()))
        .map(|other| other.name.clone())
        .collect();
    if !nearby.is_empty() {
        lines.push(Line::from(Span::styled(
            match focus {
                Some(focus) => format!("NEARBY {} (within {:.0} km)", focus.name.to_uppercase(), state.radius_km),
                None => format!("NEARBY (within {:.0} km)", state.radius_km),
            },
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for name in nearby {
            lines.push(Line::from(format!("  {}", name)));
        }
    }

    if state.query.filter.focus == FocusSelection::NearMe && state.query.filter.location.country().is_none() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "(near-me shows everything until your location is known)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    Text::from(lines)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoLocation;
    use std::sync::mpsc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_cursor_hovers_without_moving_map() {
        let store = EntityStore::bundled().unwrap();
        let mut state = AppState::new(&store, today(), 500.0, None);
        let first = state.current().unwrap().id.clone();
        assert_eq!(state.map.selected(), Some(first.as_str()));
        assert_eq!(state.map.hovered(), Some(first.as_str()));

        state.next();
        let second = state.current().unwrap().id.clone();
        assert_eq!(state.map.hovered(), Some(second.as_str()));
        assert_eq!(state.map.selected(), Some(first.as_str()));

        state.focus_map();
        assert_eq!(state.map.selected(), Some(second.as_str()));
    }

    #[test]
    fn test_map_refocuses_when_focus_is_filtered_out() {
        let store = EntityStore::bundled().unwrap();
        let mut state = AppState::new(&store, today(), 500.0, None);
        state.query.filter.search = "Berlin".into();
        state.refresh();
        assert_eq!(state.map.selected(), Some("berlin-ethereum"));
        assert!(state.query.filter.is_active());

        state.query.reset();
        state.refresh();
        assert!(!state.query.filter.is_active());
        assert_eq!(state.map.selected(), Some("berlin-ethereum"));
    }

    #[test]
    fn test_resolved_location_highlights_country() {
        let store = EntityStore::bundled().unwrap();
        let (tx, rx) = mpsc::channel();
        let mut state = AppState::new(&store, today(), 500.0, Some(rx));
        assert_eq!(state.location_label(), "locating...");

        tx.send(LocationStatus::Resolved(GeoLocation {
            latitude: 52.52,
            longitude: 13.40,
            country: "Germany".into(),
        }))
        .unwrap();
        state.poll_location();
        assert_eq!(state.map.highlighted_country(), Some("Germany"));
        assert_eq!(state.location_label(), "Germany");
    }

    #[test]
    fn test_closed_location_channel_fails_quietly() {
        let store = EntityStore::bundled().unwrap();
        let (tx, rx) = mpsc::channel::<LocationStatus>();
        drop(tx);
        let mut state = AppState::new(&store, today(), 500.0, Some(rx));
        state.poll_location();
        assert_eq!(state.query.filter.location, LocationStatus::Failed);
        assert_eq!(state.location_label(), "unknown");
        assert_eq!(state.results.len(), store.communities().len());
    }
}
