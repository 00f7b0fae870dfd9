//! Navigation state machine.
//!
//! A [`NavigationSession`] owns the active route, the current instruction
//! pointer and the rider's last position. It never performs I/O: every
//! route computation leaves the session as a [`RouteRequest`] and comes
//! back through [`NavigationSession::complete`], tagged with the request
//! generation. A completion whose generation is not the one in flight
//! (stopped, superseded, already arrived) is dropped.
//!
//! ```text
//! Idle -> Computing -> Ready -> Navigating -> Arrived
//!            ^   |       |          |
//!            |   +-> Idle (initial failure)
//!            +-----------+----------+  (reroute)
//! any --stop()--> Stopped
//! ```

use std::sync::mpsc::{channel, Receiver, Sender};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::SessionConfig;
use crate::error::{NavError, Result};
use crate::geo::{distance_m, Coordinate, Ring};
use crate::hazard::HazardModel;
use crate::instructions::SimplifiedInstruction;
use crate::route::{validate_endpoints, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Computing,
    Ready,
    Navigating,
    Arrived,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// First computation for an origin/destination pair.
    Initial,
    /// Recomputation of a live route after hazards changed.
    Reroute,
}

/// A computation the owner must run and report back with `complete`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub generation: u64,
    pub kind: RequestKind,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub avoidance: Vec<Ring>,
}

/// Notifications delivered to subscribers, in transition order.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    RouteReady { generation: u64 },
    RouteFailed { error: NavError },
    InstructionAdvanced { index: usize, instruction: SimplifiedInstruction },
    Arrived,
    Rerouted { generation: u64 },
    /// The session keeps riding its previous route.
    RerouteFailed { error: NavError },
    Stopped,
}

/// What the UI shows while riding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub current_index: Option<usize>,
    pub instruction: Option<SimplifiedInstruction>,
    pub distance_to_instruction_m: Option<f64>,
    pub last_position: Option<Coordinate>,
}

pub struct NavigationSession {
    config: SessionConfig,
    state: SessionState,
    route: Option<Route>,
    current_index: usize,
    last_position: Option<Coordinate>,
    origin: Option<Coordinate>,
    destination: Option<Coordinate>,
    /// Avoidance geometry of the latest hazard snapshot.
    avoidance: Vec<Ring>,
    generation: u64,
    in_flight: Option<(u64, RequestKind)>,
    /// Hazards changed while a computation was running.
    reroute_pending: bool,
    /// State a reroute returns to, `Ready` or `Navigating`.
    resume: SessionState,
    subscribers: Vec<Sender<NavigationEvent>>,
}

impl Default for NavigationSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl NavigationSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            route: None,
            current_index: 0,
            last_position: None,
            origin: None,
            destination: None,
            avoidance: Vec::new(),
            generation: 0,
            in_flight: None,
            reroute_pending: false,
            resume: SessionState::Ready,
            subscribers: Vec::new(),
        }
    }

    /// Register a new event receiver.
    pub fn subscribe(&mut self) -> Receiver<NavigationEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: NavigationEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.route.as_ref().map(|_| self.current_index)
    }

    pub fn current_instruction(&self) -> Option<&SimplifiedInstruction> {
        self.route.as_ref()?.instructions.get(self.current_index)
    }

    pub fn last_position(&self) -> Option<Coordinate> {
        self.last_position
    }

    pub fn destination(&self) -> Option<Coordinate> {
        self.destination
    }

    pub fn is_computing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Distance from the last position to the current instruction anchor.
    pub fn distance_to_instruction_m(&self) -> Option<f64> {
        let position = self.last_position?;
        Some(distance_m(&position, &self.current_instruction()?.anchor))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            current_index: self.current_index(),
            instruction: self.current_instruction().cloned(),
            distance_to_instruction_m: self.distance_to_instruction_m(),
            last_position: self.last_position,
        }
    }

    /// Whether position updates move the instruction pointer.
    fn is_riding(&self) -> bool {
        self.state == SessionState::Navigating
            || (self.state == SessionState::Computing
                && self.route.is_some()
                && self.resume == SessionState::Navigating)
    }

    fn issue(&mut self, kind: RequestKind) -> Option<RouteRequest> {
        let destination = self.destination?;
        let origin = match kind {
            RequestKind::Initial => self.origin?,
            RequestKind::Reroute => self.last_position.or(self.origin)?,
        };

        self.generation += 1;
        self.in_flight = Some((self.generation, kind));
        Some(RouteRequest {
            generation: self.generation,
            kind,
            origin,
            destination,
            avoidance: self.avoidance.clone(),
        })
    }

    /// Ask for a route from `origin` to `destination`.
    ///
    /// Accepted in any state; a computation already in flight is
    /// superseded. Invalid endpoints are rejected and leave the session
    /// untouched.
    pub fn request_route(
        &mut self,
        origin: Coordinate,
        destination: Coordinate,
        hazards: &HazardModel,
    ) -> Result<RouteRequest> {
        validate_endpoints(&origin, &destination)?;

        self.origin = Some(origin);
        self.destination = Some(destination);
        self.route = None;
        self.current_index = 0;
        self.reroute_pending = false;
        self.resume = SessionState::Ready;
        self.avoidance =
            hazards.avoidance_geometry_with(self.config.hazard_radius_m, self.config.hazard_segments);
        self.state = SessionState::Computing;

        let request = self.issue(RequestKind::Initial).ok_or(NavError::NoActiveRoute)?;
        info!(
            "route request #{} avoiding {} hazard(s)",
            request.generation,
            request.avoidance.len()
        );
        Ok(request)
    }

    /// Begin turn-by-turn guidance on the computed route.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Ready => {
                let empty = self.route.as_ref().map_or(true, |r| r.instructions.is_empty());
                if empty {
                    return Err(NavError::EmptyRoute);
                }
                self.state = SessionState::Navigating;
                info!("navigation started");
                Ok(())
            }
            SessionState::Navigating => Ok(()),
            SessionState::Computing if self.route.is_some() => {
                // Rerouting from Ready: ride on once the new route lands.
                self.resume = SessionState::Navigating;
                Ok(())
            }
            _ => Err(NavError::NoActiveRoute),
        }
    }

    /// Feed a live position.
    ///
    /// While riding, reaching the current instruction anchor advances the
    /// pointer by one; reaching the last one arrives. Updates after arrival
    /// or stop are ignored.
    pub fn position_update(&mut self, position: Coordinate) -> Result<()> {
        if !position.is_valid() {
            return Err(NavError::InvalidInput(format!(
                "position out of range: ({}, {})",
                position.latitude, position.longitude
            )));
        }

        match self.state {
            SessionState::Arrived | SessionState::Stopped => return Ok(()),
            SessionState::Idle => return Err(NavError::NoActiveRoute),
            SessionState::Computing if self.route.is_none() => return Err(NavError::NoActiveRoute),
            _ => {}
        }

        self.last_position = Some(position);
        if self.is_riding() {
            self.check_progress(position);
        }
        Ok(())
    }

    fn check_progress(&mut self, position: Coordinate) {
        let Some(route) = &self.route else {
            return;
        };
        let Some(instruction) = route.instructions.get(self.current_index) else {
            return;
        };
        if distance_m(&position, &instruction.anchor) >= self.config.advance_radius_m {
            return;
        }

        if self.current_index + 1 < route.instructions.len() {
            self.current_index += 1;
            let next = route.instructions[self.current_index].clone();
            debug!("instruction {} reached, next: {}", self.current_index - 1, next.short_label);
            self.emit(NavigationEvent::InstructionAdvanced {
                index: self.current_index,
                instruction: next,
            });
        } else {
            self.arrive();
        }
    }

    fn arrive(&mut self) {
        info!("arrived at destination");
        self.state = SessionState::Arrived;
        self.in_flight = None;
        self.reroute_pending = false;
        self.emit(NavigationEvent::Arrived);
    }

    /// Hazards changed: recompute the live route around them.
    ///
    /// Returns the reroute to run, or `None` when there is no live route or
    /// a computation is already running; in the latter case a single
    /// follow-up is issued when it completes.
    pub fn hazards_changed(&mut self, hazards: &HazardModel) -> Option<RouteRequest> {
        self.avoidance =
            hazards.avoidance_geometry_with(self.config.hazard_radius_m, self.config.hazard_segments);

        match self.state {
            SessionState::Ready | SessionState::Navigating => {
                self.resume = self.state;
                self.state = SessionState::Computing;
                let request = self.issue(RequestKind::Reroute)?;
                info!(
                    "rerouting (request #{}) around {} hazard(s)",
                    request.generation,
                    request.avoidance.len()
                );
                Some(request)
            }
            SessionState::Computing if self.in_flight.is_some() => {
                debug!("hazards changed during computation, coalescing");
                self.reroute_pending = true;
                None
            }
            _ => None,
        }
    }

    /// Report the outcome of a request.
    ///
    /// Returns the coalesced follow-up reroute, if hazards changed while
    /// the request was running.
    pub fn complete(&mut self, generation: u64, result: Result<Route>) -> Option<RouteRequest> {
        let kind = match self.in_flight {
            Some((g, kind)) if g == generation => kind,
            _ => {
                debug!("discarding stale route result #{generation}");
                return None;
            }
        };
        self.in_flight = None;

        match (kind, result) {
            (RequestKind::Initial, Ok(route)) => {
                info!("route #{generation} ready: {} instructions", route.instructions.len());
                self.route = Some(route);
                self.current_index = 0;
                self.state = SessionState::Ready;
                self.emit(NavigationEvent::RouteReady { generation });
            }
            (RequestKind::Initial, Err(error)) => {
                warn!("route #{generation} failed: {error}");
                self.route = None;
                self.state = SessionState::Idle;
                self.reroute_pending = false;
                self.emit(NavigationEvent::RouteFailed { error });
                return None;
            }
            (RequestKind::Reroute, Ok(route)) if route.instructions.is_empty() => {
                warn!("reroute #{generation} has no instructions, keeping current route");
                self.state = self.resume;
                self.emit(NavigationEvent::RerouteFailed { error: NavError::EmptyRoute });
            }
            (RequestKind::Reroute, Ok(route)) => {
                info!("rerouted #{generation}: {} instructions", route.instructions.len());
                self.route = Some(route);
                self.current_index = 0;
                self.state = self.resume;
                self.emit(NavigationEvent::Rerouted { generation });
            }
            (RequestKind::Reroute, Err(error)) => {
                warn!("reroute #{generation} failed, keeping current route: {error}");
                self.state = self.resume;
                self.emit(NavigationEvent::RerouteFailed { error });
            }
        }

        if self.reroute_pending {
            self.reroute_pending = false;
            return self.hazards_follow_up();
        }
        None
    }

    fn hazards_follow_up(&mut self) -> Option<RouteRequest> {
        match self.state {
            SessionState::Ready | SessionState::Navigating => {
                self.resume = self.state;
                self.state = SessionState::Computing;
                let request = self.issue(RequestKind::Reroute)?;
                info!("follow-up reroute #{}", request.generation);
                Some(request)
            }
            _ => None,
        }
    }

    /// Cancel the session. Safe in any state; results still in flight are
    /// dropped when they arrive.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        info!("navigation stopped");
        self.state = SessionState::Stopped;
        self.route = None;
        self.current_index = 0;
        self.in_flight = None;
        self.reroute_pending = false;
        self.emit(NavigationEvent::Stopped);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hazard::{HazardKind, HazardReport, HazardStatus};
    use crate::route::RouteStep;

    pub(crate) fn pt(lat: f64, lon: f64) -> Coordinate {
        Coordinate { latitude: lat, longitude: lon }
    }

    pub(crate) const A: Coordinate = Coordinate { latitude: 44.8370, longitude: -0.5800 };
    pub(crate) const B: Coordinate = Coordinate { latitude: 44.8385, longitude: -0.5750 };
    pub(crate) const C: Coordinate = Coordinate { latitude: 44.8400, longitude: -0.5700 };

    /// Route through `points` with one instruction anchored on each.
    pub(crate) fn route_through(points: &[Coordinate]) -> Route {
        let steps = points
            .iter()
            .enumerate()
            .map(|(i, _)| RouteStep {
                instruction: if i + 1 == points.len() {
                    "Arrive at destination".to_string()
                } else {
                    "Turn left".to_string()
                },
                distance_m: 100.0,
                step_type: 0,
                way_point_index: i,
                name: None,
                exit_number: None,
            })
            .collect();
        Route::new(points.to_vec(), 850.0, 180.0, steps).unwrap()
    }

    pub(crate) fn hazard_at(id: &str, c: Coordinate) -> HazardReport {
        HazardReport {
            id: id.to_string(),
            kind: HazardKind::BlockedRoad,
            latitude: c.latitude,
            longitude: c.longitude,
            status: HazardStatus::Active,
            created_at_ms: 0,
        }
    }

    fn drain(rx: &Receiver<NavigationEvent>) -> Vec<NavigationEvent> {
        rx.try_iter().collect()
    }

    /// Session in `Navigating` on A -> B -> C.
    fn navigating() -> (NavigationSession, Receiver<NavigationEvent>) {
        let mut session = NavigationSession::default();
        let rx = session.subscribe();
        let req = session.request_route(A, C, &HazardModel::default()).unwrap();
        session.complete(req.generation, Ok(route_through(&[A, B, C])));
        session.start().unwrap();
        drain(&rx);
        (session, rx)
    }

    #[test]
    fn request_without_hazards_has_no_avoidance() {
        let mut session = NavigationSession::default();
        let req = session.request_route(A, C, &HazardModel::default()).unwrap();

        assert_eq!(session.state(), SessionState::Computing);
        assert_eq!(req.kind, RequestKind::Initial);
        assert_eq!(req.origin, A);
        assert_eq!(req.destination, C);
        assert!(req.avoidance.is_empty());
    }

    #[test]
    fn request_carries_one_ring_per_hazard() {
        let mut session = NavigationSession::default();
        let hazards = HazardModel::new(vec![hazard_at("h", B)]);
        let req = session.request_route(A, C, &hazards).unwrap();

        assert_eq!(req.avoidance.len(), 1);
        assert_eq!(req.avoidance[0].len(), 13);
    }

    #[test]
    fn invalid_endpoints_leave_session_idle() {
        let mut session = NavigationSession::default();
        assert!(matches!(
            session.request_route(A, A, &HazardModel::default()),
            Err(NavError::InvalidInput(_))
        ));
        assert!(matches!(
            session.request_route(A, pt(91.0, 0.0), &HazardModel::default()),
            Err(NavError::InvalidInput(_))
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_computing());
    }

    #[test]
    fn full_ride_visits_every_instruction_then_arrives() {
        let mut session = NavigationSession::default();
        let rx = session.subscribe();

        let req = session.request_route(A, C, &HazardModel::default()).unwrap();
        assert_eq!(session.complete(req.generation, Ok(route_through(&[A, B, C]))), None);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.current_index(), Some(0));

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Navigating);

        let mut visited = vec![session.current_index().unwrap()];
        let ride = [
            pt(44.8361, -0.5800), // 100 m south of A
            pt(44.83691, -0.5800), // 10 m from A
            pt(44.8384, -0.5750),
            pt(44.8400, -0.5701),
        ];
        for p in ride {
            session.position_update(p).unwrap();
            if let Some(i) = session.current_index() {
                if visited.last() != Some(&i) {
                    visited.push(i);
                }
            }
        }

        assert_eq!(visited, vec![0, 1, 2]);
        assert_eq!(session.state(), SessionState::Arrived);
        assert_eq!(session.current_index(), Some(2));

        let events = drain(&rx);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], NavigationEvent::RouteReady { generation: req.generation });
        assert!(matches!(events[1], NavigationEvent::InstructionAdvanced { index: 1, .. }));
        assert!(matches!(events[2], NavigationEvent::InstructionAdvanced { index: 2, .. }));
        assert_eq!(events[3], NavigationEvent::Arrived);

        // terminal
        session.position_update(A).unwrap();
        assert_eq!(session.state(), SessionState::Arrived);
        assert!(drain(&rx).is_empty());
        assert_eq!(session.start(), Err(NavError::NoActiveRoute));
    }

    #[test]
    fn far_positions_do_not_advance() {
        let (mut session, rx) = navigating();
        session.position_update(pt(44.8361, -0.5800)).unwrap();
        session.position_update(pt(44.8390, -0.5800)).unwrap();

        assert_eq!(session.current_index(), Some(0));
        assert!(drain(&rx).is_empty());
        let d = session.distance_to_instruction_m().unwrap();
        assert!(d > 200.0 && d < 250.0, "distance {d}");
    }

    #[test]
    fn initial_failure_returns_to_idle() {
        let mut session = NavigationSession::default();
        let rx = session.subscribe();
        let req = session.request_route(A, C, &HazardModel::default()).unwrap();

        let error = NavError::Network("unreachable".to_string());
        assert_eq!(session.complete(req.generation, Err(error.clone())), None);

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.route().is_none());
        assert_eq!(drain(&rx), vec![NavigationEvent::RouteFailed { error }]);
    }

    #[test]
    fn start_needs_a_route() {
        let mut session = NavigationSession::default();
        assert_eq!(session.start(), Err(NavError::NoActiveRoute));
        assert_eq!(session.position_update(A), Err(NavError::NoActiveRoute));

        let req = session.request_route(A, C, &HazardModel::default()).unwrap();
        assert_eq!(session.start(), Err(NavError::NoActiveRoute));

        let empty = Route::new(vec![A, C], 850.0, 180.0, Vec::new()).unwrap();
        session.complete(req.generation, Ok(empty));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.start(), Err(NavError::EmptyRoute));
    }

    #[test]
    fn reroute_replaces_route_from_last_position() {
        let (mut session, rx) = navigating();
        let here = pt(44.8361, -0.5800);
        session.position_update(here).unwrap();

        let hazards = HazardModel::new(vec![hazard_at("h", B)]);
        let req = session.hazards_changed(&hazards).unwrap();
        assert_eq!(req.kind, RequestKind::Reroute);
        assert_eq!(req.origin, here);
        assert_eq!(req.destination, C);
        assert_eq!(req.avoidance.len(), 1);
        assert_eq!(session.state(), SessionState::Computing);

        let detour = pt(44.8380, -0.5780);
        assert_eq!(session.complete(req.generation, Ok(route_through(&[here, detour, C]))), None);

        assert_eq!(session.state(), SessionState::Navigating);
        assert_eq!(session.current_index(), Some(0));
        assert_eq!(session.route().unwrap().coordinates[1], detour);
        assert_eq!(drain(&rx), vec![NavigationEvent::Rerouted { generation: req.generation }]);
    }

    #[test]
    fn failed_reroute_keeps_route_and_navigating() {
        let (mut session, rx) = navigating();
        session.position_update(pt(44.83691, -0.5800)).unwrap();
        let before = session.route().cloned();
        drain(&rx);

        let req = session.hazards_changed(&HazardModel::new(vec![hazard_at("h", B)])).unwrap();
        let error = NavError::Provider { status: 500, message: "boom".to_string() };
        session.complete(req.generation, Err(error.clone()));

        assert_eq!(session.state(), SessionState::Navigating);
        assert_eq!(session.route().cloned(), before);
        assert_eq!(session.current_index(), Some(1));
        assert_eq!(drain(&rx), vec![NavigationEvent::RerouteFailed { error }]);
    }

    #[test]
    fn empty_reroute_keeps_current_route() {
        let (mut session, rx) = navigating();
        let before = session.route().cloned();

        let req = session.hazards_changed(&HazardModel::new(vec![hazard_at("h", B)])).unwrap();
        let empty = Route::new(vec![A, C], 850.0, 180.0, Vec::new()).unwrap();
        assert_eq!(session.complete(req.generation, Ok(empty)), None);

        assert_eq!(session.state(), SessionState::Navigating);
        assert_eq!(session.route().cloned(), before);
        assert_eq!(session.current_index(), Some(0));
        assert!(session.current_instruction().is_some());
        assert_eq!(
            drain(&rx),
            vec![NavigationEvent::RerouteFailed { error: NavError::EmptyRoute }]
        );

        for p in [A, B, C] {
            session.position_update(p).unwrap();
        }
        assert_eq!(session.state(), SessionState::Arrived);
    }

    #[test]
    fn reroute_from_ready_returns_to_ready() {
        let mut session = NavigationSession::default();
        let req = session.request_route(A, C, &HazardModel::default()).unwrap();
        session.complete(req.generation, Ok(route_through(&[A, B, C])));
        assert_eq!(session.state(), SessionState::Ready);

        let reroute = session.hazards_changed(&HazardModel::new(vec![hazard_at("h", B)])).unwrap();
        assert_eq!(reroute.origin, A);
        assert_eq!(session.state(), SessionState::Computing);

        session.complete(reroute.generation, Ok(route_through(&[A, pt(44.8380, -0.5780), C])));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.current_index(), Some(0));
    }

    #[test]
    fn start_during_reroute_from_ready_resumes_navigating() {
        let mut session = NavigationSession::default();
        let req = session.request_route(A, C, &HazardModel::default()).unwrap();
        session.complete(req.generation, Ok(route_through(&[A, B, C])));

        let reroute = session.hazards_changed(&HazardModel::new(vec![hazard_at("h", B)])).unwrap();
        assert_eq!(session.start(), Ok(()));
        assert_eq!(session.state(), SessionState::Computing);

        session.complete(reroute.generation, Ok(route_through(&[A, pt(44.8380, -0.5780), C])));
        assert_eq!(session.state(), SessionState::Navigating);
    }

    #[test]
    fn position_during_initial_computation_has_no_route() {
        let mut session = NavigationSession::default();
        session.request_route(A, C, &HazardModel::default()).unwrap();

        assert_eq!(session.position_update(B), Err(NavError::NoActiveRoute));
        assert_eq!(session.last_position(), None);
        assert_eq!(session.state(), SessionState::Computing);
    }

    #[test]
    fn riding_continues_while_rerouting() {
        let (mut session, rx) = navigating();
        let req = session.hazards_changed(&HazardModel::new(vec![hazard_at("h", B)])).unwrap();

        session.position_update(A).unwrap();
        assert_eq!(session.current_index(), Some(1));
        let events = drain(&rx);
        assert!(matches!(events.as_slice(), [NavigationEvent::InstructionAdvanced { index: 1, .. }]));

        session.position_update(B).unwrap();
        session.position_update(C).unwrap();
        assert_eq!(session.state(), SessionState::Arrived);

        // the reroute lands after arrival and is dropped
        assert_eq!(session.complete(req.generation, Ok(route_through(&[B, C]))), None);
        assert_eq!(session.state(), SessionState::Arrived);
        assert_eq!(session.route().unwrap().coordinates[0], A);
    }

    #[test]
    fn hazard_changes_during_computation_coalesce() {
        let mut session = NavigationSession::default();
        let req = session.request_route(A, C, &HazardModel::default()).unwrap();

        assert_eq!(session.hazards_changed(&HazardModel::new(vec![hazard_at("1", B)])), None);
        let two = HazardModel::new(vec![hazard_at("1", B), hazard_at("2", pt(44.839, -0.572))]);
        assert_eq!(session.hazards_changed(&two), None);

        let follow_up = session
            .complete(req.generation, Ok(route_through(&[A, B, C])))
            .expect("coalesced reroute");
        assert_eq!(follow_up.kind, RequestKind::Reroute);
        assert_eq!(follow_up.avoidance.len(), 2);
        assert_eq!(session.state(), SessionState::Computing);

        assert_eq!(session.complete(follow_up.generation, Ok(route_through(&[A, C]))), None);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn stop_discards_in_flight_result() {
        let mut session = NavigationSession::default();
        let rx = session.subscribe();
        let req = session.request_route(A, C, &HazardModel::default()).unwrap();

        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.complete(req.generation, Ok(route_through(&[A, C]))), None);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.route().is_none());
        assert_eq!(drain(&rx), vec![NavigationEvent::Stopped]);

        session.stop();
        assert!(drain(&rx).is_empty());
        assert_eq!(session.position_update(A), Ok(()));
    }

    #[test]
    fn newer_request_supersedes_older() {
        let mut session = NavigationSession::default();
        let first = session.request_route(A, C, &HazardModel::default()).unwrap();
        let second = session.request_route(A, B, &HazardModel::default()).unwrap();
        assert!(second.generation > first.generation);

        session.complete(first.generation, Ok(route_through(&[A, C])));
        assert_eq!(session.state(), SessionState::Computing);

        session.complete(second.generation, Ok(route_through(&[A, B])));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.route().unwrap().destination(), B);
    }

    #[test]
    fn snapshot_reports_current_instruction() {
        let (mut session, _rx) = navigating();
        session.position_update(pt(44.8361, -0.5800)).unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.state, SessionState::Navigating);
        assert_eq!(snap.current_index, Some(0));
        assert_eq!(snap.instruction.unwrap().anchor, A);
        assert!((snap.distance_to_instruction_m.unwrap() - 100.0).abs() < 1.0);
    }
}
