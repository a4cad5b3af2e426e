use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use gst::prelude::*;
use gst_app::AppSrc;
use gstreamer as gst;
use gstreamer_app as gst_app;
use tracing::{info, warn};

use super::counters::Counters;
use super::frame_slot::FrameSlot;

/// Drives the output pipeline at a fixed rate, independent of whatever is
/// happening on the ingest side. Reads the frame slot once per tick; repeats
/// the last frame (or the fallback frame, before anything has ever arrived)
/// when nothing new has been written since the previous tick.
pub struct RenderLoop {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RenderLoop {
    pub fn start(
        appsrc: AppSrc,
        output_pipeline: gst::Pipeline,
        frame_slot: Arc<FrameSlot>,
        fallback_frame: gst::Buffer,
        counters: Arc<Counters>,
        fps: u32,
        no_signal_timeout: Duration,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("render-loop".into())
            .spawn(move || {
                render_loop_body(
                    appsrc,
                    output_pipeline,
                    frame_slot,
                    fallback_frame,
                    counters,
                    fps,
                    no_signal_timeout,
                    running_thread,
                )
            })
            .expect("failed to spawn render-loop thread");

        RenderLoop {
            running,
            handle: Some(handle),
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn render_loop_body(
    appsrc: AppSrc,
    output_pipeline: gst::Pipeline,
    frame_slot: Arc<FrameSlot>,
    fallback_frame: gst::Buffer,
    counters: Arc<Counters>,
    fps: u32,
    no_signal_timeout: Duration,
    running: Arc<AtomicBool>,
) {
    let frame_duration = gst::ClockTime::SECOND / fps.max(1) as u64;
    let clock = output_pipeline.clock();
    let base_time = output_pipeline.base_time().unwrap_or(gst::ClockTime::ZERO);

    let mut frame_count: u64 = 0;
    let mut last_pushed_seq: Option<u64> = None;
    let stats_every = fps.max(1) as u64 * 5;

    while running.load(Ordering::Relaxed) {
        // A frame older than `no_signal_timeout` is no longer trusted even
        // if routing is nominally on ingest -- fall back to the
        // pre-allocated neutral frame rather than repeat stale content
        // forever.
        let (mut buffer, seq, is_repeat) = match frame_slot.read_fresh(no_signal_timeout) {
            Some((buf, seq)) => {
                let repeat = last_pushed_seq == Some(seq);
                (buf, Some(seq), repeat)
            }
            None => (fallback_frame.clone(), None, true),
        };
        if let Some(seq) = seq {
            last_pushed_seq = Some(seq);
        }

        let pts = frame_duration * frame_count;
        {
            let buf_mut = buffer.make_mut();
            buf_mut.set_pts(pts);
            buf_mut.set_dts(pts);
            buf_mut.set_duration(frame_duration);
        }

        if is_repeat {
            counters.record_repeated();
        }

        if appsrc.push_buffer(buffer).is_err() {
            warn!("appsrc push_buffer failed, stopping render loop");
            break;
        }
        counters.record_out();
        frame_count += 1;

        if frame_count % stats_every == 0 {
            let (frames_in, frames_out, frames_repeated) = counters.snapshot();
            info!(frames_in, frames_out, frames_repeated, "render loop stats");
        }

        match &clock {
            Some(clock) => {
                let wake_time = base_time + frame_duration * frame_count;
                let clock_id = clock.new_single_shot_id(wake_time);
                let _ = clock_id.wait();
            }
            None => std::thread::sleep(Duration::from(frame_duration)),
        }
    }
}
