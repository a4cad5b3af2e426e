use anyhow::{Context, Result};
use gst::prelude::*;
use gstreamer as gst;

use crate::config::Config;

/// The one set of caps every branch feeding the selector must converge on.
/// Built once from config and shared by the fallback branch and every decode
/// chain the mutator ever builds, which is what makes `sync-streams=false`
/// safe on the selector: whichever sink is inactive is holding buffers in the
/// exact same format, so there is never a renegotiation glitch on switch.
pub fn canonical_caps(config: &Config) -> gst::Caps {
    gst::Caps::builder("video/x-raw")
        .field("format", "NV12")
        .field("width", config.output.width as i32)
        .field("height", config.output.height as i32)
        .field("framerate", gst::Fraction::new(config.output.fps as i32, 1))
        .field("colorimetry", "bt709")
        .build()
}

/// A normalize chain: videoconvert -> videoscale -> videorate -> capsfilter ->
/// queue. The leaky queue is deliberately last: its source endpoint is the
/// one linked to a selector sink pad, so an input stall never back-pressures
/// the decoder feeding this chain, only the (already-disposable) last couple
/// of normalized buffers. Owns the elements so the mutator can unlink/remove
/// them as a unit during rebuild.
pub struct NormalizeChain {
    pub videoconvert: gst::Element,
    pub videoscale: gst::Element,
    pub videorate: gst::Element,
    pub capsfilter: gst::Element,
    pub queue: gst::Element,
}

impl NormalizeChain {
    /// First element of the chain (link decoder output here).
    pub fn sink_element(&self) -> &gst::Element {
        &self.videoconvert
    }

    /// Last element of the chain (link to the selector sink pad here).
    pub fn src_element(&self) -> &gst::Element {
        &self.queue
    }

    pub fn elements(&self) -> [&gst::Element; 5] {
        [
            &self.videoconvert,
            &self.videoscale,
            &self.videorate,
            &self.capsfilter,
            &self.queue,
        ]
    }
}

/// `name_prefix` distinguishes the ingest normalize chain from the fallback
/// branch's own copy of this same chain: both are built from this one
/// function so their output caps match byte-for-byte, but they need distinct
/// element names so the supervisor's bus-error classification can tell an
/// ingest-branch error from a fallback-branch (fatal) one.
pub fn build_normalize_chain(caps: &gst::Caps, name_prefix: &str) -> Result<NormalizeChain> {
    let videoconvert = gst::ElementFactory::make("videoconvert")
        .name(format!("{name_prefix}videoconvert"))
        .build()
        .context("failed to build videoconvert")?;
    if videoconvert.has_property("n-threads", None) {
        videoconvert.set_property("n-threads", 4u32);
    }

    let videoscale = gst::ElementFactory::make("videoscale")
        .name(format!("{name_prefix}videoscale"))
        .property_from_str("method", "nearest-neighbour")
        .build()
        .context("failed to build videoscale")?;
    if videoscale.has_property("n-threads", None) {
        videoscale.set_property("n-threads", 4u32);
    }

    let videorate = gst::ElementFactory::make("videorate")
        .name(format!("{name_prefix}videorate"))
        .property("skip-to-first", true)
        .property("drop-only", true)
        .build()
        .context("failed to build videorate")?;

    let capsfilter = gst::ElementFactory::make("capsfilter")
        .name(format!("{name_prefix}capsfilter"))
        .property("caps", caps)
        .build()
        .context("failed to build normalize capsfilter")?;

    let queue = gst::ElementFactory::make("queue")
        .name(format!("{name_prefix}queue"))
        .property("max-size-buffers", 2u32)
        .property_from_str("leaky", "downstream")
        .build()
        .context("failed to build normalize queue")?;

    Ok(NormalizeChain {
        videoconvert,
        videoscale,
        videorate,
        capsfilter,
        queue,
    })
}
