//! Platform-of-interest readout.
//!
//! The UI names a platform of interest; on every wall-clock tick the
//! simulation thread peeks at that name without blocking and publishes the
//! platform's details.

use bevy::prelude::*;
use serde::Serialize;
use sim_bridge::{Interface, InterfaceBase, SimEvent, SimInterface};
use sim_host::{Platform, Simulation, SpatialDomain};

use crate::bridge::{Attached, ShutdownSet, SimBridge};
use crate::config::VizConfig;

pub struct PlatformDataPlugin;

impl Plugin for PlatformDataPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlatformReadout>()
            .init_resource::<PlatformOfInterest>()
            .add_systems(Startup, attach_platform_data)
            .add_systems(
                Update,
                (sync_platform_of_interest, process_platform_data_events).chain(),
            )
            .add_systems(
                Last,
                teardown_platform_data
                    .in_set(ShutdownSet::Teardown)
                    .run_if(on_event::<AppExit>()),
            );
    }
}

/// Name of the platform the UI is interested in.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct PlatformOfInterest(pub Option<String>);

/// Details shown for the platform of interest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformDetails {
    pub index: usize,
    pub name: String,
    pub side: String,
    pub domain: SpatialDomain,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub speed: f64,
    pub broken: bool,
    pub last_update_time: f64,
}

impl From<&Platform> for PlatformDetails {
    fn from(platform: &Platform) -> Self {
        Self {
            index: platform.index,
            name: platform.name.clone(),
            side: platform.side.clone(),
            domain: platform.domain,
            position: platform.position,
            velocity: platform.velocity,
            speed: platform.speed(),
            broken: platform.broken,
            last_update_time: platform.last_update_time,
        }
    }
}

/// UI-side readout.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlatformReadout {
    /// Name the readout was produced for.
    pub focus: Option<String>,
    /// `None` when the platform does not exist (any more).
    pub details: Option<PlatformDetails>,
    /// Simulation time of the readout.
    pub sim_time: f64,
}

/// Latest readout; recurring.
struct ReadoutUpdate(PlatformReadout);

impl SimEvent<PlatformReadout> for ReadoutUpdate {
    fn is_recurring(&self) -> bool {
        true
    }

    fn process(self: Box<Self>, readout: &mut PlatformReadout) {
        *readout = self.0;
    }
}

/// Interface publishing the readout. Its shared state is the platform of
/// interest.
pub struct PlatformDataInterface {
    inner: SimInterface<Simulation, PlatformReadout, Option<String>>,
}

impl Default for PlatformDataInterface {
    fn default() -> Self {
        Self {
            inner: SimInterface::new("platform_data"),
        }
    }
}

impl PlatformDataInterface {
    /// Sets the platform of interest. UI thread.
    pub fn set_platform_of_interest(&self, name: Option<String>) {
        *self.inner.shared().lock() = name;
    }

    pub fn platform_of_interest(&self) -> Option<String> {
        self.inner.shared().lock().clone()
    }

    pub fn process_events(&self, readout: &mut PlatformReadout) -> usize {
        self.inner.process_events(readout)
    }

    pub fn pending_events(&self) -> usize {
        self.inner.pending_events()
    }

    fn publish(&self, sim: &Simulation, focus: Option<String>) {
        let details = focus
            .as_deref()
            .and_then(|name| sim.platform_by_name(name))
            .map(PlatformDetails::from);
        self.inner.add_event(ReadoutUpdate(PlatformReadout {
            focus,
            details,
            sim_time: sim.sim_time(),
        }));
    }
}

impl Interface<Simulation> for PlatformDataInterface {
    fn base(&self) -> &InterfaceBase<Simulation> {
        self.inner.base()
    }

    fn on_wall_clock_tick(&self, sim: &Simulation) {
        // Skip the tick rather than wait for the UI.
        match self.inner.shared().try_snapshot() {
            Some(focus) => self.publish(sim, focus),
            None => tracing::trace!("Platform of interest busy, skipping readout"),
        }
    }
}

#[derive(Resource)]
pub struct PlatformData(Option<Attached<PlatformDataInterface>>);

fn attach_platform_data(
    mut commands: Commands,
    bridge: Res<SimBridge>,
    config: Res<VizConfig>,
    mut focus: ResMut<PlatformOfInterest>,
) {
    let data = bridge.attach(std::sync::Arc::new(PlatformDataInterface::default()));
    data.set_enabled(config.plugins.platform_data);
    if focus.0.is_none() {
        focus.0 = config.display.focus.clone();
    }
    commands.insert_resource(PlatformData(Some(data)));
}

fn sync_platform_of_interest(
    focus: Res<PlatformOfInterest>,
    data: Option<Res<PlatformData>>,
) {
    if !focus.is_changed() {
        return;
    }
    if let Some(attached) = data.as_ref().and_then(|d| d.0.as_ref()) {
        tracing::debug!("Platform of interest: {:?}", focus.0);
        attached.set_platform_of_interest(focus.0.clone());
    }
}

fn process_platform_data_events(
    data: Option<Res<PlatformData>>,
    mut readout: ResMut<PlatformReadout>,
) {
    if let Some(attached) = data.as_ref().and_then(|d| d.0.as_ref()) {
        attached.process_events(&mut readout);
    }
}

fn teardown_platform_data(
    bridge: Res<SimBridge>,
    data: Option<ResMut<PlatformData>>,
    mut readout: ResMut<PlatformReadout>,
) {
    let Some(attached) = data.and_then(|mut d| d.0.take()) else {
        return;
    };
    attached.process_events(&mut readout);
    let focus = attached.teardown(bridge.env()).inner.into_shared();
    tracing::info!("Platform data torn down (platform of interest {:?})", focus);
}
