use anyhow::{Context, Result};

use crate::AutopilotConfig;

/// Pre-flight sanity checks on top of [`AutopilotConfig::validate`].
pub fn check_config(cfg: &AutopilotConfig) -> Result<()> {
    cfg.validate().context("autopilot config")?;

    anyhow::ensure!(
        cfg.altitude.hover_ff > 0.0 && cfg.altitude.hover_ff < 1.0,
        "altitude.hover_ff should be in (0, 1)"
    );
    anyhow::ensure!(cfg.altitude.authority > 0.0, "altitude.authority must be > 0");
    anyhow::ensure!(cfg.airspeed.target_ms >= 0.0, "airspeed.target_ms must be >= 0");
    anyhow::ensure!(cfg.safety.min_battery_v > 0.0, "safety.min_battery_v must be > 0");
    anyhow::ensure!(
        cfg.safety.link_timeout_s >= 0.2 && cfg.safety.link_timeout_s <= 30.0,
        "safety.link_timeout_s should be 0.2..30"
    );
    anyhow::ensure!(
        cfg.land.descent_rate_mps > 0.0 && cfg.land.descent_rate_mps <= 10.0,
        "land.descent_rate_mps should be (0, 10]"
    );
    let unit = 0.0..=1.0;
    anyhow::ensure!(
        unit.contains(&cfg.land.min_thrust) && unit.contains(&cfg.land.low_battery_thrust),
        "land thrust values must be within 0..1"
    );
    let signed = -1.0..=1.0;
    anyhow::ensure!(
        signed.contains(&cfg.rtl.pitch) && signed.contains(&cfg.land.pitch),
        "rtl/land pitch must be within -1..1"
    );
    if cfg.terrain.enabled {
        anyhow::ensure!(
            cfg.terrain.agl_offset_m >= 10.0,
            "terrain.agl_offset_m too low for terrain follow"
        );
    }

    if let Some(home) = &cfg.home {
        anyhow::ensure!(
            home.lat.abs() <= 90.0 && home.lon.abs() <= 180.0,
            "home coordinates invalid"
        );
    }
    if let Some(zone) = &cfg.geofence {
        anyhow::ensure!(
            zone.lat0.abs() <= 90.0 && zone.lon0.abs() <= 180.0,
            "geofence center invalid"
        );
        anyhow::ensure!(zone.radius_m >= 50.0, "geofence.radius_m too small");
        // flat-earth projection only holds for local missions
        anyhow::ensure!(
            zone.radius_m <= 5_000.0,
            "geofence.radius_m too large for the local projection"
        );
        if let Some(home) = &cfg.home {
            anyhow::ensure!(zone.contains(home.lat, home.lon), "home is outside the keep-in zone");
        }
    }
    Ok(())
}
