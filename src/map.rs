//! Map/globe view model.
//!
//! Camera moves are tagged with their origin. A move started by the user
//! (drag, zoom) reports the new viewport when it settles so the listing can
//! follow; a move started by the application (selecting a community in the
//! list, centring on the visitor) settles silently, which keeps list → map →
//! list updates from looping.

use crate::geo::{GeoLocation, haversine_km};
use crate::models::{Community, Coordinates};

pub const WORLD_ALTITUDE: f64 = 2.5;
pub const REGION_ALTITUDE: f64 = 1.5;
pub const FOCUS_ALTITUDE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub center: Coordinates,
    pub altitude: f64,
}

impl Camera {
    pub fn world() -> Self {
        Self {
            center: Coordinates { lat: 0.0, lng: 0.0 },
            altitude: WORLD_ALTITUDE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraPhase {
    Idle,
    Moving { target: Camera, origin: Origin },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapEvent {
    /// A user-driven move settled on this camera.
    ViewportChanged(Camera),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    camera: Camera,
    phase: CameraPhase,
    selected: Option<String>,
    hovered: Option<String>,
    highlighted_country: Option<String>,
}

impl MapView {
    /// Centre on the visitor when their location is known, else the world.
    pub fn new(location: Option<&GeoLocation>) -> Self {
        let mut view = Self {
            camera: Camera::world(),
            phase: CameraPhase::Idle,
            selected: None,
            hovered: None,
            highlighted_country: None,
        };
        if let Some(location) = location {
            view.locate(location);
            view.move_ended();
        }
        view
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn phase(&self) -> CameraPhase {
        self.phase
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn highlighted_country(&self) -> Option<&str> {
        self.highlighted_country.as_deref()
    }

    /// Start a camera move. A new move replaces one in flight.
    pub fn fly_to(&mut self, target: Camera, origin: Origin) {
        self.phase = CameraPhase::Moving { target, origin };
    }

    /// The renderer reports the current move finished.
    pub fn move_ended(&mut self) -> Option<MapEvent> {
        match std::mem::replace(&mut self.phase, CameraPhase::Idle) {
            CameraPhase::Idle => None,
            CameraPhase::Moving { target, origin } => {
                self.camera = target;
                match origin {
                    Origin::User => Some(MapEvent::ViewportChanged(target)),
                    Origin::System => None,
                }
            }
        }
    }

    /// User panned/zoomed the globe.
    pub fn user_moved(&mut self, center: Coordinates, altitude: f64) {
        self.fly_to(Camera { center, altitude }, Origin::User);
    }

    /// Centre on the visitor's location and highlight their country.
    pub fn locate(&mut self, location: &GeoLocation) {
        self.highlighted_country = Some(location.country.clone());
        self.fly_to(
            Camera {
                center: location.coordinates(),
                altitude: REGION_ALTITUDE,
            },
            Origin::System,
        );
    }

    /// Select a community (from the list or a marker) and bring it into view.
    pub fn select(&mut self, community: &Community) {
        if self.selected.as_deref() == Some(community.id.as_str()) {
            return;
        }
        self.selected = Some(community.id.clone());
        self.fly_to(
            Camera {
                center: community.coordinates,
                altitude: FOCUS_ALTITUDE,
            },
            Origin::System,
        );
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn hover(&mut self, id: Option<&str>) {
        self.hovered = id.map(str::to_string);
    }

    /// Communities within `radius_km` of the camera centre, nearest first.
    pub fn visible<'a>(&self, communities: &[&'a Community], radius_km: f64) -> Vec<&'a Community> {
        let mut nearby: Vec<(f64, &'a Community)> = communities
            .iter()
            .map(|c| (haversine_km(self.camera.center, c.coordinates), *c))
            .filter(|(distance, _)| *distance <= radius_km)
            .collect();
        nearby.sort_by(|a, b| a.0.total_cmp(&b.0));
        nearby.into_iter().map(|(_, c)| c).collect()
    }
}
