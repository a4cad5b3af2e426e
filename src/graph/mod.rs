pub mod decode;
pub mod fallback;
pub mod ingest;
pub mod mutator;
pub mod normalize;
pub mod output;
pub mod selector;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gst::prelude::*;
use gst_app::AppSrc;
use gstreamer as gst;
use gstreamer_app as gst_app;

use crate::config::Config;
use crate::watchdog::Watchdog;
use fallback::{build_fallback_branch, FallbackBranch};
use mutator::GraphMutator;
use normalize::canonical_caps;
use output::{build_appsrc, build_output_branch, OutputBranch};
use selector::Selector;

/// The full graph: two pipelines (ingest and output) bridged by the frame
/// synchronizer's appsink/appsrc pair, plus everything that can mutate the
/// ingest side at runtime.
pub struct Graph {
    pub ingest_pipeline: gst::Pipeline,
    pub output_pipeline: gst::Pipeline,
    pub selector: Arc<Selector>,
    pub mutator: Arc<GraphMutator>,
    pub watchdog: Arc<Watchdog>,
    pub appsink: gst_app::AppSink,
    pub appsrc: AppSrc,
    // kept alive for the process lifetime; never touched by the mutator
    _fallback: FallbackBranch,
    _output_branch: OutputBranch,
}

impl Graph {
    pub fn new(config: &Config) -> Result<Self> {
        let caps = canonical_caps(config);

        let ingest_pipeline = gst::Pipeline::builder().name("ingest").build();
        let selector = Arc::new(Selector::new(caps.clone())?);
        ingest_pipeline
            .add(selector.element())
            .context("failed to add selector to ingest pipeline")?;

        let fallback = build_fallback_branch(&ingest_pipeline, &selector)?;

        let appsink = gst_app::AppSink::builder()
            .caps(&caps)
            .sync(false)
            .max_buffers(1u32)
            .drop(true)
            .build();
        let appsink_element: gst::Element = appsink.clone().upcast();
        ingest_pipeline
            .add(&appsink_element)
            .context("failed to add frame-slot appsink to ingest pipeline")?;
        selector
            .element()
            .link(&appsink_element)
            .context("failed to link selector to frame-slot appsink")?;

        let watchdog = Arc::new(Watchdog::new(
            Duration::from_millis(config.thresholds.watchdog_timeout_ms),
            Duration::from_millis(config.thresholds.resume_threshold_ms),
        ));

        let mutator = GraphMutator::new(
            ingest_pipeline.clone(),
            Arc::clone(&selector),
            Arc::clone(&watchdog),
            config.clone(),
        );
        mutator.initial_build().context("failed to build initial ingest chain")?;
        selector.activate_fallback();

        let output_pipeline = gst::Pipeline::builder().name("output").build();
        let appsrc = build_appsrc(&caps)?;
        let output_branch = build_output_branch(&output_pipeline, &appsrc, config)?;

        Ok(Graph {
            ingest_pipeline,
            output_pipeline,
            selector,
            mutator,
            watchdog,
            appsink,
            appsrc,
            _fallback: fallback,
            _output_branch: output_branch,
        })
    }

    pub fn set_playing(&self) -> Result<()> {
        self.ingest_pipeline
            .set_state(gst::State::Playing)
            .context("failed to set ingest pipeline to Playing")?;
        self.output_pipeline
            .set_state(gst::State::Playing)
            .context("failed to set output pipeline to Playing")?;
        Ok(())
    }

    pub fn set_null(&self) {
        let _ = self.ingest_pipeline.set_state(gst::State::Null);
        let _ = self.output_pipeline.set_state(gst::State::Null);
    }
}
