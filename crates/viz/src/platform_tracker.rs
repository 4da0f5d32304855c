//! Platform list: which platforms exist and where they are.
//!
//! Lifecycle changes arrive as discrete events, kinematics as one recurring
//! map update per wall-clock tick. A deleted platform stays listed, marked
//! deleted, until it has been gone for the configured linger time.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use bevy::prelude::*;
use serde::Serialize;
use sim_bridge::{ClockLane, Interface, InterfaceBase, SimEvent, SimInterface};
use sim_host::{Platform, Simulation, SpatialDomain};

use crate::bridge::{Attached, ShutdownSet, SimBridge};
use crate::config::VizConfig;

pub struct PlatformTrackerPlugin;

impl Plugin for PlatformTrackerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlatformList>()
            .add_systems(Startup, attach_platform_tracker)
            .add_systems(Update, process_platform_events)
            .add_systems(
                Last,
                teardown_platform_tracker
                    .in_set(ShutdownSet::Teardown)
                    .run_if(on_event::<AppExit>()),
            );
    }
}

/// One row of the platform list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformEntry {
    pub index: usize,
    pub name: String,
    pub side: String,
    pub domain: SpatialDomain,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub initialized: bool,
    /// Simulation time of deletion.
    pub deleted_at: Option<f64>,
}

impl PlatformEntry {
    fn from_platform(platform: &Platform) -> Self {
        Self {
            index: platform.index,
            name: platform.name.clone(),
            side: platform.side.clone(),
            domain: platform.domain,
            position: platform.position,
            velocity: platform.velocity,
            initialized: false,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// UI-side platform list.
#[derive(Resource, Debug, Clone, PartialEq, Serialize)]
pub struct PlatformList {
    pub platforms: BTreeMap<usize, PlatformEntry>,
    /// Simulation time of the latest kinematics update.
    pub sim_time: f64,
    /// Simulated seconds a deleted platform stays listed.
    pub deleted_linger: f64,
}

impl Default for PlatformList {
    fn default() -> Self {
        Self {
            platforms: BTreeMap::new(),
            sim_time: 0.0,
            deleted_linger: 5.0,
        }
    }
}

impl PlatformList {
    pub fn with_linger(deleted_linger: f64) -> Self {
        Self {
            deleted_linger,
            ..Self::default()
        }
    }

    pub fn get(&self, index: usize) -> Option<&PlatformEntry> {
        self.platforms.get(&index)
    }

    /// Platforms not marked deleted.
    pub fn active(&self) -> impl Iterator<Item = &PlatformEntry> {
        self.platforms.values().filter(|p| !p.is_deleted())
    }

    fn prune_deleted(&mut self) {
        let cutoff = self.sim_time - self.deleted_linger;
        self.platforms
            .retain(|_, p| p.deleted_at.map_or(true, |at| at > cutoff));
    }
}

struct PlatformAdded(PlatformEntry);

impl SimEvent<PlatformList> for PlatformAdded {
    fn process(self: Box<Self>, list: &mut PlatformList) {
        list.platforms.insert(self.0.index, self.0);
    }
}

struct PlatformInitialized(usize);

impl SimEvent<PlatformList> for PlatformInitialized {
    fn process(self: Box<Self>, list: &mut PlatformList) {
        if let Some(entry) = list.platforms.get_mut(&self.0) {
            entry.initialized = true;
        }
    }
}

struct PlatformDeleted {
    index: usize,
    sim_time: f64,
}

impl SimEvent<PlatformList> for PlatformDeleted {
    fn process(self: Box<Self>, list: &mut PlatformList) {
        if let Some(entry) = list.platforms.get_mut(&self.index) {
            entry.deleted_at = Some(self.sim_time);
        }
    }
}

/// Kinematics of every live platform; recurring.
struct PlatformUpdate {
    sim_time: f64,
    kinematics: BTreeMap<usize, ([f64; 3], [f64; 3])>,
}

impl SimEvent<PlatformList> for PlatformUpdate {
    fn is_recurring(&self) -> bool {
        true
    }

    fn process(self: Box<Self>, list: &mut PlatformList) {
        list.sim_time = self.sim_time;
        for (index, (position, velocity)) in self.kinematics {
            if let Some(entry) = list.platforms.get_mut(&index) {
                entry.position = position;
                entry.velocity = velocity;
            }
        }
        list.prune_deleted();
    }
}

/// Full list rebuild, sent after the interface is re-enabled.
struct PlatformResync {
    sim_time: f64,
    entries: Vec<PlatformEntry>,
}

impl SimEvent<PlatformList> for PlatformResync {
    fn process(self: Box<Self>, list: &mut PlatformList) {
        list.platforms.retain(|_, p| p.is_deleted());
        for entry in self.entries {
            list.platforms.insert(entry.index, entry);
        }
        list.sim_time = self.sim_time;
    }
}

/// Interface feeding the platform list.
pub struct PlatformTrackerInterface {
    inner: SimInterface<Simulation, PlatformList>,
    this: Weak<PlatformTrackerInterface>,
}

impl PlatformTrackerInterface {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            inner: SimInterface::new("platform_tracker"),
            this: this.clone(),
        })
    }

    /// Applies pending events to `list`. UI thread.
    pub fn process_events(&self, list: &mut PlatformList) -> usize {
        self.inner.process_events(list)
    }

    pub fn pending_events(&self) -> usize {
        self.inner.pending_events()
    }
}

impl Interface<Simulation> for PlatformTrackerInterface {
    fn base(&self) -> &InterfaceBase<Simulation> {
        self.inner.base()
    }

    /// Lifecycle events produced while disabled are lost, so re-enabling
    /// asks the simulation for the whole list.
    fn on_enabled_changed(&self, enabled: bool) {
        if !enabled {
            return;
        }
        let this = self.this.clone();
        self.inner
            .add_command(ClockLane::WallClock, move |sim: &mut Simulation| {
                let Some(tracker) = this.upgrade() else {
                    return;
                };
                let entries = sim
                    .platforms()
                    .map(|p| PlatformEntry {
                        initialized: true,
                        ..PlatformEntry::from_platform(p)
                    })
                    .collect();
                tracker.inner.add_event(PlatformResync {
                    sim_time: sim.sim_time(),
                    entries,
                });
            });
    }

    fn on_platform_added(&self, _sim_time: f64, platform: &Platform) {
        if !self.is_enabled() {
            return;
        }
        self.inner
            .add_event(PlatformAdded(PlatformEntry::from_platform(platform)));
    }

    fn on_platform_initialized(&self, _sim_time: f64, platform: &Platform) {
        if !self.is_enabled() {
            return;
        }
        self.inner.add_event(PlatformInitialized(platform.index));
    }

    fn on_platform_deleted(&self, sim_time: f64, platform: &Platform) {
        if !self.is_enabled() {
            return;
        }
        self.inner.add_event(PlatformDeleted {
            index: platform.index,
            sim_time,
        });
    }

    fn on_wall_clock_tick(&self, sim: &Simulation) {
        let kinematics = sim
            .platforms()
            .map(|p| (p.index, (p.position, p.velocity)))
            .collect();
        self.inner.add_event(PlatformUpdate {
            sim_time: sim.sim_time(),
            kinematics,
        });
    }
}

/// The attached tracker; `None` once torn down.
#[derive(Resource)]
pub struct PlatformTracker(Option<Attached<PlatformTrackerInterface>>);

fn attach_platform_tracker(
    mut commands: Commands,
    bridge: Res<SimBridge>,
    config: Res<VizConfig>,
) {
    let tracker = bridge.attach(PlatformTrackerInterface::new());
    // Enabling before the thread starts queues a resync of the empty list.
    tracker.set_enabled(config.plugins.platform_tracker);
    commands.insert_resource(PlatformList::with_linger(config.display.deleted_linger));
    commands.insert_resource(PlatformTracker(Some(tracker)));
}

fn process_platform_events(
    tracker: Option<Res<PlatformTracker>>,
    mut list: ResMut<PlatformList>,
) {
    let Some(attached) = tracker.as_ref().and_then(|t| t.0.as_ref()) else {
        return;
    };
    let processed = attached.process_events(&mut list);
    if processed > 0 {
        tracing::trace!("Platform tracker processed {} events", processed);
    }
}

fn teardown_platform_tracker(
    bridge: Res<SimBridge>,
    tracker: Option<ResMut<PlatformTracker>>,
    mut list: ResMut<PlatformList>,
) {
    let Some(attached) = tracker.and_then(|mut t| t.0.take()) else {
        return;
    };
    attached.process_events(&mut list);
    let interface = attached.teardown(bridge.env());
    tracing::info!(
        "Platform tracker torn down with {} platforms listed",
        list.platforms.len()
    );
    drop(interface);
}
