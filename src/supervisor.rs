use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gst::prelude::*;
use gstreamer as gst;
use tracing::{debug, error, info, warn};

use crate::graph::mutator::GraphMutator;
use crate::graph::selector::Selector;

/// Element name prefixes that belong to the ingest branch. A bus error whose
/// source name starts with one of these is recoverable: fall back and
/// request a rebuild. Anything else (selector, fallback branch, output
/// pipeline elements) is fatal — there is no way to route around it.
///
/// The normalize chain (videoconvert/videoscale/videorate/capsfilter/queue)
/// is shared code between the ingest and fallback branches, so those
/// elements are named with an `ing_`/`fb_` prefix specifically so this list
/// can tell them apart: a fallback-branch element error is a CORE/fatal
/// case, not a recoverable ingest one.
const INGEST_ELEMENT_PREFIXES: &[&str] = &[
    "udpin",
    "inqueue",
    "tsparse",
    "demux",
    "h264parse",
    "h265parse",
    "avdec",
    "mpegvideoparse",
    "mpeg4videoparse",
    "decodebin",
    "ing_",
];

/// Classifies bus messages into "ingest recoverable" vs "fatal" and drives
/// the matching response: switch to fallback + request a rebuild, or quit
/// the main loop with a non-zero exit recorded.
pub struct Supervisor {
    mutator: Arc<GraphMutator>,
    selector: Arc<Selector>,
    main_loop: glib::MainLoop,
    fatal: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(mutator: Arc<GraphMutator>, selector: Arc<Selector>, main_loop: glib::MainLoop, fatal: Arc<AtomicBool>) -> Self {
        Supervisor {
            mutator,
            selector,
            main_loop,
            fatal,
        }
    }

    /// Watch the ingest pipeline's bus: ingest-branch errors recover via
    /// fallback + rebuild, everything else is fatal.
    pub fn watch_ingest(&self, pipeline: &gst::Pipeline) -> Result<gst::bus::BusWatchGuard, glib::BoolError> {
        let mutator = Arc::clone(&self.mutator);
        let selector = Arc::clone(&self.selector);
        let main_loop = self.main_loop.clone();
        let fatal = Arc::clone(&self.fatal);

        let bus = pipeline.bus().expect("pipeline has no bus");
        bus.add_watch(move |_bus, msg| {
            use gst::MessageView;
            match msg.view() {
                MessageView::Error(err) => {
                    let source_name = err
                        .src()
                        .map(|s| s.name().to_string())
                        .unwrap_or_else(|| "<unknown>".to_string());

                    if is_ingest_element(&source_name) {
                        warn!(source = %source_name, error = %err.error(), "ingest error, falling back and requesting rebuild");
                        selector.activate_fallback();
                        mutator.request_rebuild();
                    } else {
                        error!(source = %source_name, error = %err.error(), "fatal pipeline error");
                        fatal.store(true, Ordering::SeqCst);
                        main_loop.quit();
                    }
                }
                MessageView::Warning(warning) => {
                    debug!(error = %warning.error(), "pipeline warning");
                }
                MessageView::Eos(_) => {
                    // EOS on the ingest pipeline means the source deliberately
                    // closed the connection; treat exactly like an ingest error.
                    warn!("ingest pipeline reached end-of-stream, falling back and requesting rebuild");
                    selector.activate_fallback();
                    mutator.request_rebuild();
                }
                MessageView::StateChanged(sc) => {
                    if msg.src().map(|s| s == *pipeline.upcast_ref::<gst::Object>()).unwrap_or(false) {
                        debug!(old = ?sc.old(), new = ?sc.current(), "ingest pipeline state changed");
                    }
                }
                _ => {}
            }
            glib::ControlFlow::Continue
        })
    }

    /// Watch the output pipeline's bus: there is no fallback branch here, so
    /// every error is fatal.
    pub fn watch_output(&self, pipeline: &gst::Pipeline) -> Result<gst::bus::BusWatchGuard, glib::BoolError> {
        let main_loop = self.main_loop.clone();
        let fatal = Arc::clone(&self.fatal);

        let bus = pipeline.bus().expect("pipeline has no bus");
        bus.add_watch(move |_bus, msg| {
            use gst::MessageView;
            match msg.view() {
                MessageView::Error(err) => {
                    error!(error = %err.error(), debug = ?err.debug(), "fatal output pipeline error");
                    fatal.store(true, Ordering::SeqCst);
                    main_loop.quit();
                }
                MessageView::Eos(_) => {
                    info!("output pipeline reached end-of-stream");
                    main_loop.quit();
                }
                MessageView::Warning(warning) => {
                    debug!(error = %warning.error(), "output pipeline warning");
                }
                _ => {}
            }
            glib::ControlFlow::Continue
        })
    }
}

fn is_ingest_element(name: &str) -> bool {
    INGEST_ELEMENT_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_element_classification() {
        assert!(is_ingest_element("udpin"));
        assert!(is_ingest_element("demux"));
        assert!(is_ingest_element("h264parse0"));
        assert!(!is_ingest_element("selector"));
        assert!(!is_ingest_element("udpsink0"));
    }

    #[test]
    fn test_shared_normalize_chain_disambiguated_by_branch_prefix() {
        assert!(is_ingest_element("ing_videoconvert0"), "ingest normalize elements are recoverable");
        assert!(is_ingest_element("ing_queue0"));
        assert!(
            !is_ingest_element("fb_videoconvert0"),
            "fallback-branch element errors are core/fatal, not recoverable via rebuild"
        );
        assert!(!is_ingest_element("fb_queue0"));
    }
}
