//! `sprinklr status`, `sprinklr zones` and `sprinklr last-run`.

use anyhow::bail;
use sprinklr::clock::{Clock, SystemClock};
use sprinklr::{ControllerHandle, Snapshot};
use sprinklr_gateway::HttpGateway;

use crate::render;

pub async fn status(handle: &ControllerHandle) -> anyhow::Result<()> {
    let snapshot = handle.wait_for(Snapshot::is_settled).await?;
    println!("{}", render::status_line(&snapshot, SystemClock.now_millis()));
    Ok(())
}

pub async fn zones(handle: &ControllerHandle) -> anyhow::Result<()> {
    let snapshot = handle.wait_for(Snapshot::is_settled).await?;
    match &snapshot.zones {
        Some(zones) if zones.is_empty() => println!("  No zones configured."),
        Some(zones) => println!("{}", render::zones_table(zones)),
        None => bail!("Zone list unavailable: {}", snapshot.session.message),
    }
    Ok(())
}

pub async fn last_run(gateway: &HttpGateway) -> anyhow::Result<()> {
    let sprinkler = gateway.last_sprinkler_run().await?;
    let schedule = gateway.last_schedule_run().await?;

    println!();
    match sprinkler {
        Some(run) => println!(
            "  Last zone run:     zone {} at {}",
            run.zone,
            render::format_timestamp(run.timestamp)
        ),
        None => println!("  Last zone run:     none recorded"),
    }
    match schedule {
        Some(run) => {
            println!(
                "  Last schedule run: {} at {}",
                run.name,
                render::format_timestamp(run.timestamp)
            );
            if let Some(message) = run.message {
                println!("                     {message}");
            }
        }
        None => println!("  Last schedule run: none recorded"),
    }
    println!();
    Ok(())
}
