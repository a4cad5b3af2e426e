use anyhow::{Context, Result};
use gst::prelude::*;
use gstreamer as gst;

use super::normalize::{build_normalize_chain, NormalizeChain};
use super::selector::Selector;

/// `videotestsrc` (SMPTE bars) + "NO SIGNAL" overlay, normalized to the
/// canonical caps and linked directly into the selector's fallback sink. This
/// branch is built once at startup and lives for the whole process; it is
/// never touched by the graph mutator.
pub struct FallbackBranch {
    pub source: gst::Element,
    pub overlay: gst::Element,
    pub normalize: NormalizeChain,
}

impl FallbackBranch {
    pub fn elements(&self) -> Vec<&gst::Element> {
        let mut v = vec![&self.source, &self.overlay];
        v.extend(self.normalize.elements());
        v
    }
}

pub fn build_fallback_branch(pipeline: &gst::Pipeline, selector: &Selector) -> Result<FallbackBranch> {
    let source = gst::ElementFactory::make("videotestsrc")
        .property("is-live", true)
        .property_from_str("pattern", "smpte")
        .build()
        .context("failed to build fallback videotestsrc")?;

    let overlay = gst::ElementFactory::make("textoverlay")
        .property("text", "NO SIGNAL")
        .property_from_str("valignment", "center")
        .property_from_str("halignment", "center")
        .property("font-desc", "Sans Bold 72")
        .build()
        .context("failed to build fallback textoverlay")?;

    let normalize = build_normalize_chain(selector.canonical_caps(), "fb_")?;

    let branch = FallbackBranch {
        source,
        overlay,
        normalize,
    };

    let elements = branch.elements();
    pipeline
        .add_many(elements.iter().copied())
        .context("failed to add fallback branch elements to pipeline")?;
    gst::Element::link_many(elements.iter().copied())
        .context("failed to link fallback branch elements")?;

    let src_pad = branch
        .normalize
        .src_element()
        .static_pad("src")
        .ok_or_else(|| anyhow::anyhow!("fallback normalize chain has no src pad"))?;
    src_pad
        .link(selector.fallback_pad())
        .map_err(|e| anyhow::anyhow!("failed to link fallback branch to selector: {e:?}"))?;

    Ok(branch)
}
