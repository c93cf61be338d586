//! Follow the live fleet from the terminal
//!
//! ```text
//! FLEET_SYNC_URL=ws://localhost:3000/realtime \
//! FLEET_SYNC_TOKEN=... \
//! FLEET_LOG_MODE=development \
//! cargo run -p fleet-sync --example live_fleet -- 7
//! ```
//!
//! Prints every cache change on the fleet channel and, when a vehicle id is
//! given, that vehicle's merged snapshot.

use std::time::Duration;

use fleet_sync::{ConnectionState, ErrorPayload, FleetSync, SyncSettings, VehicleId};

fn main() -> fleet_sync::Result<()> {
    fleet_sync::logging::init_logging_from_env()?;

    let detail_id = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<VehicleId>().ok());

    let sync = FleetSync::start(SyncSettings::from_env()?)?;

    let _status = sync
        .binding()
        .on_connection_change(|state| match state {
            ConnectionState::Connected => println!("● live"),
            ConnectionState::Connecting => println!("○ connecting..."),
            ConnectionState::Error => println!("✕ connection problem, retrying"),
            ConnectionState::Disconnected => println!("○ offline"),
        })
        .on::<ErrorPayload, _>(|payload| {
            println!("  {}", payload.error)
        })
        .activate();

    let fleet = sync.track_fleet();
    let detail = detail_id.map(|id| sync.watch_vehicle(id));
    let changes = fleet.cache().changes();

    loop {
        for change in changes.timeout_iter(Duration::from_secs(5)) {
            println!("{} ({} vehicles)", change, fleet.len());
        }

        if let Some(vehicle) = detail.as_ref().and_then(|watcher| watcher.current()) {
            println!(
                "#{} status={:?} position={:?} speed={:?}",
                vehicle.id,
                vehicle.status,
                vehicle.position(),
                vehicle.speed
            );
        }

        let diagnostics = sync.diagnostics();
        if diagnostics.retries_exhausted() {
            println!("Gave up reconnecting:\n{}", diagnostics);
            return Ok(());
        }
    }
}
