use chrono::{NaiveDateTime, Timelike};
use tokio::runtime::Handle;

use coursedrill_core::SimError;
use coursedrill_registration::{surface_pair, ClockSurface, SurfaceLauncher};

/// Prints the virtual clock to stdout. Every tick would drown the prompt,
/// so only the first instant and every fifth second are shown.
pub struct TerminalLauncher;

impl SurfaceLauncher for TerminalLauncher {
    fn open(&self) -> Result<ClockSurface, SimError> {
        let handle = Handle::try_current()
            .map_err(|e| SimError::SurfaceUnavailable(format!("no runtime for clock display: {}", e)))?;

        let (surface, mut subscriber) = surface_pair();
        handle.spawn(async move {
            let mut first = true;
            while let Some(now) = subscriber.next().await {
                if first || now.second() % 5 == 0 {
                    println!("  🕗 {}", render(now));
                    first = false;
                }
            }
            println!("  🕗 clock closed");
        });

        Ok(surface)
    }
}

fn render(now: NaiveDateTime) -> String {
    now.format("%H:%M:%S").to_string()
}
