use anyhow::{Context, Result};
use gst::prelude::*;
use gstreamer as gst;

use crate::config::Config;

/// The static (non-dynamic) half of the ingest chain: UDP receive, an
/// elastic jitter buffer, MPEG-TS parse, and the demuxer whose `pad-added`
/// signal is where the dynamic decode chain gets attached. These four
/// elements are rebuilt as a unit every time the mutator tears down and
/// reconstructs the ingest branch.
pub struct IngestStatic {
    pub udpsrc: gst::Element,
    pub queue2: gst::Element,
    pub tsparse: gst::Element,
    pub tsdemux: gst::Element,
}

impl IngestStatic {
    pub fn elements(&self) -> [&gst::Element; 4] {
        [&self.udpsrc, &self.queue2, &self.tsparse, &self.tsdemux]
    }
}

pub fn build_ingest_static(config: &Config) -> Result<IngestStatic> {
    let udpsrc = gst::ElementFactory::make("udpsrc")
        .name("udpin")
        .property("port", config.input.port as i32)
        .property("buffer-size", config.input.recv_buffer_size as i32)
        .build()
        .context("failed to build udpsrc")?;

    // Elastic, jitter-absorbing buffer between the socket and the parser:
    // `min-threshold-time` delays start-up until `jitter_buffer_ms` worth of
    // data has accumulated (riding out typical network bursts), byte/buffer
    // caps are disabled so only time bounds the queue, and `max-size-time`
    // is the outer hold limit before the queue starts dropping.
    let queue2 = gst::ElementFactory::make("queue2")
        .name("inqueue")
        .property("use-buffering", true)
        .property("max-size-bytes", 0u32)
        .property("max-size-buffers", 0u32)
        .property(
            "min-threshold-time",
            gst::ClockTime::from_mseconds(config.input.jitter_buffer_ms as u64),
        )
        .property(
            "max-size-time",
            gst::ClockTime::from_mseconds(config.input.max_queue_ms as u64),
        )
        .build()
        .context("failed to build queue2")?;

    let tsparse = gst::ElementFactory::make("tsparse")
        .name("tsparse")
        .property("set-timestamps", true)
        .build()
        .context("failed to build tsparse")?;

    let tsdemux = gst::ElementFactory::make("tsdemux")
        .name("demux")
        .property("program-number", -1i32)
        .build()
        .context("failed to build tsdemux")?;

    Ok(IngestStatic {
        udpsrc,
        queue2,
        tsparse,
        tsdemux,
    })
}

/// Add and statically link `udpsrc ! queue2 ! tsparse ! tsdemux`. The
/// `tsdemux` -> decode-chain link is dynamic and handled by the mutator's
/// `pad-added` callback.
pub fn add_and_link_static(pipeline: &gst::Pipeline, ingest: &IngestStatic) -> Result<()> {
    pipeline
        .add_many(ingest.elements())
        .context("failed to add ingest elements to pipeline")?;
    gst::Element::link_many([&ingest.udpsrc, &ingest.queue2, &ingest.tsparse, &ingest.tsdemux])
        .context("failed to link ingest receive/parse chain")?;
    Ok(())
}
