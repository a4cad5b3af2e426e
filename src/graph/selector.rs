use anyhow::{Context, Result};
use gst::prelude::*;
use gstreamer as gst;
use parking_lot::Mutex;

/// Wraps the `input-selector` A/B switch element: one fallback sink acquired
/// for the lifetime of the process, one ingest sink acquired/released as the
/// ingest chain is torn down and rebuilt.
///
/// `sync-streams=false` + `cache-buffers=true` let the selector hold the last
/// buffer on an inactive pad so switching never produces a black frame, and
/// let the two sinks run on independent clocks (the fallback branch is a
/// free-running `videotestsrc`, the ingest branch follows network timing).
pub struct Selector {
    element: gst::Element,
    canonical_caps: gst::Caps,
    fallback_pad: gst::Pad,
    ingest_pad: Mutex<Option<gst::Pad>>,
}

impl Selector {
    pub fn new(canonical_caps: gst::Caps) -> Result<Self> {
        let element = gst::ElementFactory::make("input-selector")
            .name("selector")
            .property("sync-streams", false)
            .property("cache-buffers", true)
            .build()
            .context("failed to build input-selector")?;

        let fallback_pad = element
            .request_pad_simple("sink_%u")
            .ok_or_else(|| anyhow::anyhow!("input-selector refused fallback sink pad"))?;

        Ok(Selector {
            element,
            canonical_caps,
            fallback_pad,
            ingest_pad: Mutex::new(None),
        })
    }

    pub fn element(&self) -> &gst::Element {
        &self.element
    }

    pub fn canonical_caps(&self) -> &gst::Caps {
        &self.canonical_caps
    }

    pub fn fallback_pad(&self) -> &gst::Pad {
        &self.fallback_pad
    }

    /// Acquire a fresh sink pad for the ingest branch. Fails if one is
    /// already held (the mutator must release the previous pad first).
    pub fn acquire_ingest_sink(&self) -> Result<gst::Pad> {
        let mut guard = self.ingest_pad.lock();
        if guard.is_some() {
            anyhow::bail!("ingest sink pad already acquired; release it before reacquiring");
        }
        let pad = self
            .element
            .request_pad_simple("sink_%u")
            .ok_or_else(|| anyhow::anyhow!("input-selector refused ingest sink pad"))?;
        *guard = Some(pad.clone());
        Ok(pad)
    }

    /// Release the current ingest sink pad. Refuses to release the active pad
    /// — callers must switch to fallback first.
    pub fn release_ingest_sink(&self) -> Result<()> {
        let mut guard = self.ingest_pad.lock();
        let pad = guard
            .take()
            .ok_or_else(|| anyhow::anyhow!("no ingest sink pad to release"))?;
        if self.active_pad().as_ref() == Some(&pad) {
            *guard = Some(pad);
            anyhow::bail!("refusing to release the active ingest sink pad");
        }
        self.element.release_request_pad(&pad);
        Ok(())
    }

    pub fn ingest_pad(&self) -> Option<gst::Pad> {
        self.ingest_pad.lock().clone()
    }

    pub fn active_pad(&self) -> Option<gst::Pad> {
        self.element.property::<Option<gst::Pad>>("active-pad")
    }

    pub fn activate_fallback(&self) {
        self.element.set_property("active-pad", &self.fallback_pad);
    }

    /// Switch to the ingest sink, if one is currently acquired. A no-op (not
    /// an error) when no ingest pad exists yet — the rebuild sequence always
    /// acquires the pad before calling this.
    pub fn activate_ingest(&self) -> Result<()> {
        let pad = self
            .ingest_pad()
            .ok_or_else(|| anyhow::anyhow!("cannot activate ingest: no ingest sink pad acquired"))?;
        self.element.set_property("active-pad", &pad);
        Ok(())
    }

    pub fn is_ingest_active(&self) -> bool {
        match (self.active_pad(), self.ingest_pad()) {
            (Some(active), Some(ingest)) => active == ingest,
            _ => false,
        }
    }
}
