pub mod counters;
pub mod fallback_frame;
pub mod frame_slot;
pub mod render;

use std::sync::Arc;

use gst::prelude::*;
use gst_app::AppSinkCallbacks;
use gstreamer as gst;
use gstreamer_app as gst_app;
use tracing::warn;

pub use counters::Counters;
pub use frame_slot::FrameSlot;
pub use render::RenderLoop;

/// Wire the selector's output appsink into the frame slot: every sample that
/// arrives overwrites the slot, never blocks, never queues.
pub fn wire_appsink(appsink: &gst_app::AppSink, frame_slot: Arc<FrameSlot>) {
    appsink.set_callbacks(
        AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                let buffer = sample.buffer_owned().ok_or(gst::FlowError::Error)?;
                frame_slot.write(buffer);
                Ok(gst::FlowSuccess::Ok)
            })
            .eos(|_| {
                warn!("frame-slot appsink reached end-of-stream");
            })
            .build(),
    );
}
