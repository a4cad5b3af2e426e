use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::sync::Counters;

/// Periodic `in=.. out=.. repeated=..` stats line on the control thread's
/// main loop, same cadence style as the render loop's own stats log but
/// driven independently so it keeps ticking even if the render loop stalls.
/// `interval_s == 0` disables it entirely.
pub fn install(counters: Arc<Counters>, interval_s: u32) -> Option<glib::SourceId> {
    if interval_s == 0 {
        return None;
    }
    let id = glib::timeout_add(Duration::from_secs(interval_s as u64), move || {
        let (frames_in, frames_out, frames_repeated) = counters.snapshot();
        info!(frames_in, frames_out, frames_repeated, "stats");
        glib::ControlFlow::Continue
    });
    Some(id)
}
