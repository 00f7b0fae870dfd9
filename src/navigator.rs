//! Threaded driver around [`NavigationSession`].
//!
//! The session and the hazard snapshot sit behind one mutex; every
//! transition is a single critical section. Route computations run on a
//! worker thread with the lock released, so position updates are never
//! blocked by the provider. The session allows one computation in flight;
//! the worker chains the coalesced follow-up reroute, if any, itself.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use log::error;

use crate::config::SessionConfig;
use crate::error::{NavError, Result};
use crate::geo::Coordinate;
use crate::hazard::{HazardModel, HazardReport};
use crate::route::{Route, RouteProvider};
use crate::session::{NavigationEvent, NavigationSession, RouteRequest, SessionSnapshot, SessionState};

struct Inner {
    session: NavigationSession,
    hazards: HazardModel,
}

struct Shared<P> {
    provider: P,
    inner: Mutex<Inner>,
}

impl<P: RouteProvider> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `request` and any follow-ups it produces.
    fn run(&self, mut request: RouteRequest) {
        loop {
            let result =
                self.provider
                    .compute_route(&request.origin, &request.destination, &request.avoidance);
            let next = self.lock().session.complete(request.generation, result);
            match next {
                Some(next) => request = next,
                None => break,
            }
        }
    }
}

/// Owns one navigation session and drives its route computations.
pub struct Navigator<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for Navigator<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: RouteProvider + Send + Sync + 'static> Navigator<P> {
    pub fn new(provider: P, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                provider,
                inner: Mutex::new(Inner {
                    session: NavigationSession::new(config),
                    hazards: HazardModel::default(),
                }),
            }),
        }
    }

    pub fn subscribe(&self) -> Receiver<NavigationEvent> {
        self.shared.lock().session.subscribe()
    }

    fn dispatch(&self, request: RouteRequest) {
        let generation = request.generation;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("velonav-route".to_string())
            .spawn(move || shared.run(request));

        if let Err(e) = spawned {
            error!("cannot spawn route worker: {e}");
            let failure = Err(NavError::Network(format!("cannot spawn route worker: {e}")));
            let follow_up = self.shared.lock().session.complete(generation, failure);
            if let Some(next) = follow_up {
                self.dispatch(next);
            }
        }
    }

    /// Compute a route with the current hazards avoided. Returns as soon
    /// as the computation is scheduled; the outcome arrives as an event.
    pub fn request_route(&self, origin: Coordinate, destination: Coordinate) -> Result<()> {
        let request = {
            let mut inner = self.shared.lock();
            let Inner { session, hazards } = &mut *inner;
            session.request_route(origin, destination, hazards)?
        };
        self.dispatch(request);
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        self.shared.lock().session.start()
    }

    pub fn position_update(&self, position: Coordinate) -> Result<()> {
        self.shared.lock().session.position_update(position)
    }

    /// Replace the hazard snapshot, rerouting when the active set changed.
    pub fn update_hazards(&self, reports: Vec<HazardReport>) {
        let request = {
            let mut inner = self.shared.lock();
            let Inner { session, hazards } = &mut *inner;
            if !hazards.on_reports_changed(reports) {
                return;
            }
            session.hazards_changed(hazards)
        };
        if let Some(request) = request {
            self.dispatch(request);
        }
    }

    pub fn stop(&self) {
        self.shared.lock().session.stop();
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().session.state()
    }

    pub fn route(&self) -> Option<Route> {
        self.shared.lock().session.route().cloned()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().session.snapshot()
    }

    pub fn active_hazard_count(&self) -> usize {
        self.shared.lock().hazards.active_hazards().len()
    }
}
