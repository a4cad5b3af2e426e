use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use gst::prelude::*;
use gstreamer as gst;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::decode::{build_decode_chain, configure_decoder_threads, detect_codec_kind, DecodeChain};
use super::ingest::{add_and_link_static, build_ingest_static, IngestStatic};
use super::normalize::{build_normalize_chain, NormalizeChain};
use super::selector::Selector;
use crate::config::Config;
use crate::watchdog::{Watchdog, WatchdogEvent};

/// Idempotence guard for the rebuild composite: two ingest-error bus messages
/// arriving back to back, or a bus error racing a watchdog stall, must not
/// trigger two concurrent teardown/rebuild sequences.
pub struct RebuildGate(AtomicBool);

impl RebuildGate {
    pub fn new() -> Self {
        RebuildGate(AtomicBool::new(false))
    }

    /// Returns `true` if this call acquired the gate (no rebuild was already
    /// in flight). The caller must call `finish()` exactly once afterwards.
    pub fn try_begin(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn finish(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for RebuildGate {
    fn default() -> Self {
        Self::new()
    }
}

struct DecodeState {
    decode: DecodeChain,
    normalize: NormalizeChain,
}

struct MutatorState {
    ingest: Option<IngestStatic>,
    decode_state: Option<DecodeState>,
    /// `fakesink`s soaking up non-video demux pads (PMT/PAT/audio/etc.) so
    /// they never back-pressure `tsdemux`. Torn down alongside the static
    /// ingest chain on every rebuild.
    discard_sinks: Vec<gst::Element>,
}

/// Owns every primitive that changes ingest-branch topology: quiesce (switch
/// to fallback), unlink, remove, release sink pad, and the composite rebuild
/// that chains all four plus reconstruction. Every mutation runs on the
/// control thread; bus/watchdog callbacks that want a rebuild only flip a
/// flag and defer the actual work via `glib::idle_add_once`, because tearing
/// a pipeline down from inside its own bus callback can deadlock.
pub struct GraphMutator {
    pipeline: gst::Pipeline,
    selector: Arc<Selector>,
    watchdog: Arc<Watchdog>,
    config: Config,
    canonical_caps: gst::Caps,
    state: Mutex<MutatorState>,
    rebuild_gate: Arc<RebuildGate>,
}

impl GraphMutator {
    pub fn new(pipeline: gst::Pipeline, selector: Arc<Selector>, watchdog: Arc<Watchdog>, config: Config) -> Arc<Self> {
        let canonical_caps = selector.canonical_caps().clone();
        Arc::new(GraphMutator {
            pipeline,
            selector,
            watchdog,
            config,
            canonical_caps,
            state: Mutex::new(MutatorState {
                ingest: None,
                decode_state: None,
                discard_sinks: Vec::new(),
            }),
            rebuild_gate: Arc::new(RebuildGate::new()),
        })
    }

    pub fn rebuild_gate(&self) -> Arc<RebuildGate> {
        Arc::clone(&self.rebuild_gate)
    }

    /// Schedule a rebuild on the control thread's main loop. Safe to call
    /// from any context (bus watch, watchdog timer, pad-added callback).
    pub fn request_rebuild(self: &Arc<Self>) {
        let this = Arc::clone(self);
        glib::idle_add_once(move || {
            if let Err(e) = this.rebuild_ingest() {
                error!(error = %e, "deferred ingest rebuild failed");
            }
        });
    }

    /// Build the ingest branch for the first time. Shares the rebuild
    /// composite's logic: tearing down "nothing" is simply a no-op.
    pub fn initial_build(self: &Arc<Self>) -> Result<()> {
        self.rebuild_ingest()
    }

    pub fn rebuild_ingest(self: &Arc<Self>) -> Result<()> {
        if !self.rebuild_gate.try_begin() {
            debug!("ingest rebuild already in progress, dropping duplicate request");
            return Ok(());
        }
        let result = self.rebuild_ingest_inner();
        self.rebuild_gate.finish();
        if let Err(e) = &result {
            error!(error = %e, "ingest rebuild failed");
        }
        result
    }

    fn rebuild_ingest_inner(self: &Arc<Self>) -> Result<()> {
        // 1. quiesce: make sure nothing downstream is watching the branch we're about to tear down.
        // Seed the watchdog to match: routing is now on fallback even though the watchdog itself
        // never timed out, so the next ingest buffer must still be able to confirm a resume.
        self.selector.activate_fallback();
        self.watchdog.mark_fallback_active();

        let mut state = self.state.lock();

        // 2. unlink + remove the dynamic decode/normalize chain, if one exists
        if let Some(decode_state) = state.decode_state.take() {
            teardown_decode_state(&self.pipeline, &decode_state)?;
        }

        // 3. unlink + remove the static receive/parse chain, if one exists,
        // along with any discard sinks still soaking up non-video demux pads
        if let Some(old_ingest) = state.ingest.take() {
            teardown_ingest_static(&self.pipeline, &old_ingest)?;
        }
        let discard_sinks = std::mem::take(&mut state.discard_sinks);
        if !discard_sinks.is_empty() {
            teardown_discard_sinks(&self.pipeline, &discard_sinks)?;
        }

        // 4. release the selector's ingest sink pad so a fresh one can be acquired
        if self.selector.ingest_pad().is_some() {
            self.selector.release_ingest_sink()?;
        }

        // 5. construct and add a fresh static chain
        let new_ingest = build_ingest_static(&self.config)?;
        add_and_link_static(&self.pipeline, &new_ingest)?;

        // 6. wire pad-added -> dynamic decode chain for whatever arrives next
        self.connect_pad_added(&new_ingest.tsdemux);

        // 7. bring the new elements up to the pipeline's current state
        for element in new_ingest.elements() {
            element
                .sync_state_with_parent()
                .context("failed to sync new ingest element state")?;
        }

        state.ingest = Some(new_ingest);
        Ok(())
    }

    fn connect_pad_added(self: &Arc<Self>, tsdemux: &gst::Element) {
        let this = Arc::clone(self);
        tsdemux.connect_pad_added(move |_demux, pad| {
            if let Err(e) = this.on_demux_pad_added(pad) {
                error!(error = %e, "failed to attach decode chain to new demux pad");
            }
        });
    }

    fn on_demux_pad_added(self: &Arc<Self>, pad: &gst::Pad) -> Result<()> {
        let caps = pad.current_caps().or_else(|| pad.query_caps(None));
        let Some(caps) = caps else {
            warn!("demux pad-added fired with no negotiated caps, ignoring");
            return Ok(());
        };
        if !caps
            .structure(0)
            .map(|s| s.name().starts_with("video/"))
            .unwrap_or(false)
        {
            // Audio/PMT/other elementary streams: sink them into a discard
            // element so tsdemux never back-pressures waiting for a consumer
            // that will never arrive.
            self.attach_discard_sink(pad)?;
            return Ok(());
        }

        let mut state = self.state.lock();
        if state.decode_state.is_some() {
            // Open question (i), resolved: a second video pad on the same demux
            // instance means the source shape changed underneath us. Rather
            // than risk wiring a second decode chain into one selector sink,
            // request a full rebuild instead of silently ignoring it.
            warn!("second video pad on active demux instance, requesting full rebuild");
            drop(state);
            self.request_rebuild();
            return Ok(());
        }

        let kind = detect_codec_kind(&caps);
        let decode = build_decode_chain(kind)?;
        configure_decoder_threads(&decode.decoder);
        let normalize = build_normalize_chain(&self.canonical_caps, "ing_")?;

        let mut elements = decode.elements();
        elements.extend(normalize.elements());
        self.pipeline
            .add_many(elements.iter().copied())
            .context("failed to add decode chain elements")?;

        if decode.has_dynamic_src() {
            // decodebin's src pad is a "sometimes" pad that only appears once
            // it has identified the stream; it can't be statically linked
            // into the normalize chain like the named-codec decoders below.
            gst::Element::link_many(normalize.elements())
                .context("failed to link normalize chain elements")?;

            let normalize_sink = normalize
                .sink_element()
                .static_pad("sink")
                .ok_or_else(|| anyhow::anyhow!("normalize chain has no sink pad"))?;
            decode.decoder.connect_pad_added(move |_decodebin, src_pad| {
                let is_video = src_pad
                    .current_caps()
                    .or_else(|| src_pad.query_caps(None))
                    .and_then(|c| c.structure(0).map(|s| s.name().starts_with("video/")))
                    .unwrap_or(false);
                if !is_video {
                    return;
                }
                if normalize_sink.is_linked() {
                    warn!("decodebin exposed a second video pad, ignoring");
                    return;
                }
                if let Err(e) = src_pad.link(&normalize_sink) {
                    warn!(error = ?e, "failed to link decodebin pad to normalize chain");
                }
            });
        } else {
            gst::Element::link_many(elements.iter().copied())
                .context("failed to link decode chain elements")?;
        }

        let decode_sink_pad = decode
            .sink_element()
            .static_pad("sink")
            .ok_or_else(|| anyhow::anyhow!("decode chain has no sink pad"))?;
        pad.link(&decode_sink_pad)
            .map_err(|e| anyhow::anyhow!("failed to link demux pad to decode chain: {e:?}"))?;

        let ingest_sink = self.selector.acquire_ingest_sink()?;
        let normalize_src = normalize
            .src_element()
            .static_pad("src")
            .ok_or_else(|| anyhow::anyhow!("normalize chain has no src pad"))?;
        normalize_src
            .link(&ingest_sink)
            .map_err(|e| anyhow::anyhow!("failed to link normalize chain to selector: {e:?}"))?;

        self.attach_watchdog_probe(&ingest_sink);

        for element in elements {
            element
                .sync_state_with_parent()
                .context("failed to sync decode chain element state")?;
        }

        state.decode_state = Some(DecodeState { decode, normalize });
        Ok(())
    }

    fn attach_discard_sink(&self, pad: &gst::Pad) -> Result<()> {
        let fakesink = gst::ElementFactory::make("fakesink")
            .property("sync", false)
            .property("async", false)
            .build()
            .context("failed to build discard fakesink")?;
        self.pipeline
            .add(&fakesink)
            .context("failed to add discard fakesink to pipeline")?;
        let sink_pad = fakesink
            .static_pad("sink")
            .ok_or_else(|| anyhow::anyhow!("fakesink has no sink pad"))?;
        pad.link(&sink_pad)
            .map_err(|e| anyhow::anyhow!("failed to link non-video demux pad to discard sink: {e:?}"))?;
        fakesink
            .sync_state_with_parent()
            .context("failed to sync discard fakesink state")?;
        self.state.lock().discard_sinks.push(fakesink);
        Ok(())
    }

    /// Every buffer reaching the selector's ingest sink feeds the watchdog;
    /// a confirmed resume is a simple property set on the selector, cheap and
    /// safe to do directly from the streaming thread the probe runs on.
    fn attach_watchdog_probe(&self, pad: &gst::Pad) {
        let watchdog = Arc::clone(&self.watchdog);
        let selector = Arc::clone(&self.selector);
        pad.add_probe(gst::PadProbeType::BUFFER, move |_pad, _info| {
            if watchdog.on_buffer() == WatchdogEvent::SwitchToIngest {
                let _ = selector.activate_ingest();
            }
            gst::PadProbeReturn::Ok
        });
    }
}

fn teardown_decode_state(pipeline: &gst::Pipeline, decode_state: &DecodeState) -> Result<()> {
    if let Some(src_pad) = decode_state.normalize.src_element().static_pad("src") {
        if let Some(peer) = src_pad.peer() {
            let _ = src_pad.unlink(&peer);
        }
    }
    let mut elements = decode_state.decode.elements();
    elements.extend(decode_state.normalize.elements());
    for element in &elements {
        let _ = element.set_state(gst::State::Null);
    }
    pipeline
        .remove_many(elements.iter().copied())
        .context("failed to remove decode chain elements")?;
    Ok(())
}

fn teardown_ingest_static(pipeline: &gst::Pipeline, ingest: &IngestStatic) -> Result<()> {
    for element in ingest.elements() {
        let _ = element.set_state(gst::State::Null);
    }
    pipeline
        .remove_many(ingest.elements())
        .context("failed to remove ingest receive/parse elements")?;
    Ok(())
}

fn teardown_discard_sinks(pipeline: &gst::Pipeline, discard_sinks: &[gst::Element]) -> Result<()> {
    for sink in discard_sinks {
        let _ = sink.set_state(gst::State::Null);
    }
    pipeline
        .remove_many(discard_sinks.iter())
        .context("failed to remove discard sink elements")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_gate_is_exclusive() {
        let gate = RebuildGate::new();
        assert!(gate.try_begin());
        assert!(!gate.try_begin(), "second concurrent rebuild must be rejected");
        gate.finish();
        assert!(gate.try_begin(), "gate must be reusable after finish()");
    }

    #[test]
    fn test_rebuild_gate_default_is_open() {
        let gate = RebuildGate::default();
        assert!(!gate.is_pending());
    }
}
