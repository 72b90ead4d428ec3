//! Subscribe to the live feed for a while and replay one vehicle's trip.
//! Run with: cargo run --example live_feed -- <host> [seconds]

use std::time::Duration;
use transit_live::projection::unproject;
use transit_live::{Endpoints, FeatureId, HistoryConfig, MapSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let endpoints = match args.next() {
        Some(host) => Endpoints::new(host),
        None => Endpoints::from_build_env().ok_or("usage: live_feed <host> [seconds]")?,
    };
    let seconds: u64 = args.next().map(|s| s.parse::<u64>()).transpose()?.unwrap_or(10);

    println!("Live feed from {}", endpoints.live_locations_url());

    let mut session = MapSession::connect(&endpoints, &HistoryConfig::default())?;
    session.toggle_live().await?;

    for _ in 0..seconds {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let store = session.live_store().lock().await;
        println!("{} vehicles (revision {})", store.len(), store.revision());
    }

    session.toggle_live().await?;

    let first: Option<(FeatureId, f64, f64)> = {
        let store = session.live_store().lock().await;
        let hit = store.iter().find_map(|f| {
            let (lon, lat) = unproject(f.geometry().0);
            f.id().map(|id| (id.clone(), lon, lat))
        });
        hit
    };

    if let Some((id, lon, lat)) = first {
        println!("Last seen {} at ({:.5}, {:.5})", id, lon, lat);
        match session.select(&id).await {
            Ok(count) => println!("Trip of {}: {} points", id, count),
            Err(e) => println!("Trip of {} unavailable: {}", id, e),
        }
    }

    let stats = session.stream().reconciler().stats();
    println!("Applied {} frames, dropped {}", stats.applied(), stats.dropped());
    Ok(())
}
