use anyhow::Result;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::state::{seed_fleet, FleetState};

const STATE_FILE: &str = "fleet.json";

/// Load persisted state from disk. Missing or corrupt files fall back to a
/// freshly seeded default fleet.
pub async fn load_state() -> FleetState {
    if !Path::new(STATE_FILE).exists() {
        info!("No fleet.json found, seeding default fleet");
        return seeded_default();
    }

    match fs::read_to_string(STATE_FILE).await {
        Ok(data) => match serde_json::from_str::<FleetState>(&data) {
            Ok(mut state) => {
                // Live locations are runtime-only; drop any stale leftovers
                state.live_locations.clear();
                if state.is_empty() {
                    seed_fleet(&mut state);
                }
                info!(
                    "Loaded fleet from disk ({} buses, {} routes, {} drivers, {} alerts)",
                    state.buses.len(),
                    state.routes.len(),
                    state.drivers.len(),
                    state.alerts.len()
                );
                state
            }
            Err(e) => {
                warn!("Failed to parse fleet.json: {e}, seeding default fleet");
                seeded_default()
            }
        },
        Err(e) => {
            warn!("Failed to read fleet.json: {e}, seeding default fleet");
            seeded_default()
        }
    }
}

fn seeded_default() -> FleetState {
    let mut state = FleetState::default();
    seed_fleet(&mut state);
    state
}

/// Save the durable collections to disk. Live locations are stripped.
pub async fn save_state(state: &FleetState) -> Result<()> {
    let save = FleetState {
        live_locations: std::collections::HashMap::new(),
        ..state.clone()
    };

    let json = serde_json::to_string_pretty(&save)?;
    fs::write(STATE_FILE, json).await?;
    Ok(())
}
