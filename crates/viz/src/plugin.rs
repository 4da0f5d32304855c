//! Main viewer plugin that ties all systems together.

use std::path::PathBuf;

use bevy::core::FrameCount;
use bevy::prelude::*;
use serde::Serialize;

use crate::bridge::{BridgePlugin, ShutdownSet, SimBridge};
use crate::platform_data::{PlatformDataPlugin, PlatformReadout};
use crate::platform_tracker::{PlatformList, PlatformTrackerPlugin};
use crate::sim_controller::{SimControllerPlugin, SimStatus};

/// Main plugin for the headless viewer.
///
/// Adds the bridge and every interface plugin. The host app supplies the
/// scheduler and logging.
pub struct SimVizPlugin;

impl Plugin for SimVizPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<RunLimits>() {
            app.init_resource::<RunLimits>();
        }

        app.add_plugins((
            BridgePlugin,
            PlatformTrackerPlugin,
            PlatformDataPlugin,
            SimControllerPlugin,
        ))
        .add_systems(Update, exit_when_done)
        .add_systems(
            Last,
            report_display_state
                .in_set(ShutdownSet::Report)
                .run_if(on_event::<AppExit>()),
        );
    }
}

/// When the viewer exits and where its final state goes.
#[derive(Resource, Debug, Clone, Default)]
pub struct RunLimits {
    /// Frames to run; 0 runs until the simulation finishes.
    pub max_frames: u32,
    /// Write the final display state here as JSON.
    pub dump_path: Option<PathBuf>,
}

/// Everything the viewer displays.
#[derive(Debug, Serialize)]
pub struct DisplayState<'a> {
    pub status: &'a SimStatus,
    pub platforms: &'a PlatformList,
    pub readout: &'a PlatformReadout,
}

impl DisplayState<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn exit_when_done(
    frame: Res<FrameCount>,
    limits: Res<RunLimits>,
    bridge: Res<SimBridge>,
    mut exit: EventWriter<AppExit>,
) {
    if limits.max_frames > 0 && frame.0 >= limits.max_frames {
        tracing::info!("Reached frame limit ({})", limits.max_frames);
        exit.send(AppExit::Success);
    } else if bridge.is_finished() {
        tracing::info!("Simulation finished after {} frames", frame.0);
        exit.send(AppExit::Success);
    }
}

fn report_display_state(
    limits: Res<RunLimits>,
    status: Res<SimStatus>,
    platforms: Res<PlatformList>,
    readout: Res<PlatformReadout>,
) {
    let state = DisplayState {
        status: &status,
        platforms: &platforms,
        readout: &readout,
    };
    tracing::info!(
        "Final display: t={:.2}, {} platforms listed, {} active",
        status.sim_time,
        platforms.platforms.len(),
        platforms.active().count()
    );

    let Some(path) = &limits.dump_path else {
        return;
    };
    let json = match state.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize display state: {}", e);
            return;
        }
    };
    match std::fs::write(path, json) {
        Ok(()) => tracing::info!("Wrote display state to {:?}", path),
        Err(e) => tracing::error!("Failed to write {:?}: {}", path, e),
    }
}
