use anyhow::{Context, Result};
use gst::prelude::*;
use gst_app::AppSrc;
use gstreamer as gst;
use gstreamer_app as gst_app;

use crate::config::{Config, OutputCodec, OutputContainer};

/// The output pipeline's source end: the render loop pushes timestamped
/// frames here at the configured fixed rate. Caps match the selector's
/// canonical caps exactly, since the frame slot never holds anything else.
pub fn build_appsrc(canonical_caps: &gst::Caps) -> Result<AppSrc> {
    gst_app::AppSrc::builder()
        .caps(canonical_caps)
        .format(gst::Format::Time)
        .is_live(true)
        .do_timestamp(false) // the render loop stamps PTS/DTS/DURATION itself
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build output appsrc: {e}"))
}

/// Everything downstream of the appsrc: encoder (absent for raw), payloader
/// or muxer, and the final sink, chosen from `Config.output`.
pub struct OutputBranch {
    pub elements: Vec<gst::Element>,
}

pub fn build_output_branch(pipeline: &gst::Pipeline, appsrc: &AppSrc, config: &Config) -> Result<OutputBranch> {
    let out = &config.output;
    let mut elements: Vec<gst::Element> = Vec::new();

    let encoder = build_encoder(out.codec, config)?;
    if let Some(encoder) = &encoder {
        elements.push(encoder.clone());
    }

    match out.container {
        OutputContainer::Rtp => {
            let payloader = build_rtp_payloader(out.codec)?;
            let sink = build_udpsink(&out.host, out.port)?;
            elements.push(payloader);
            elements.push(sink);
        }
        OutputContainer::MpegTs => {
            let mux = gst::ElementFactory::make("mpegtsmux")
                .build()
                .context("failed to build mpegtsmux")?;
            let sink = build_udpsink(&out.host, out.port)?;
            elements.push(mux);
            elements.push(sink);
        }
        OutputContainer::SharedMemory => {
            // Raw frames only: no encoder, just the canonical caps straight to shmsink.
            elements.clear();
            let shmsink = gst::ElementFactory::make("shmsink")
                .property("socket-path", &out.shm_path)
                .property("shm-size", out.shm_size as u64)
                .property("wait-for-connection", false)
                .property("sync", false)
                .build()
                .context("failed to build shmsink")?;
            elements.push(shmsink);
        }
        OutputContainer::RawUdp => {
            let sink = build_udpsink(&out.host, out.port)?;
            elements.push(sink);
        }
        OutputContainer::File => {
            let mux = build_file_mux(out.codec)?;
            let path = out
                .file_path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("output.container = file requires output.file-path"))?;
            let sink = gst::ElementFactory::make("filesink")
                .property("location", &path)
                .build()
                .context("failed to build filesink")?;
            elements.push(mux);
            elements.push(sink);
        }
    }

    let appsrc_element: gst::Element = appsrc.clone().upcast();
    pipeline
        .add(&appsrc_element)
        .context("failed to add appsrc to output pipeline")?;
    pipeline
        .add_many(elements.iter())
        .context("failed to add output branch elements to pipeline")?;

    let mut chain: Vec<&gst::Element> = vec![&appsrc_element];
    chain.extend(elements.iter());
    gst::Element::link_many(chain).context("failed to link output branch")?;

    Ok(OutputBranch { elements })
}

fn build_encoder(codec: OutputCodec, config: &Config) -> Result<Option<gst::Element>> {
    let out = &config.output;
    match codec {
        OutputCodec::Raw => Ok(None),
        OutputCodec::H264 => {
            let enc = gst::ElementFactory::make("x264enc")
                .property_from_str("speed-preset", "ultrafast")
                .property_from_str("tune", "zerolatency")
                .property("bitrate", out.bitrate_kbps)
                .property("key-int-max", out.keyframe_interval)
                .build()
                .context("failed to build x264enc")?;
            Ok(Some(enc))
        }
        OutputCodec::H265 => {
            let enc = gst::ElementFactory::make("x265enc")
                .property_from_str("speed-preset", "ultrafast")
                .property_from_str("tune", "zerolatency")
                .property("bitrate", out.bitrate_kbps)
                .property("key-int-max", out.keyframe_interval)
                .build()
                .context("failed to build x265enc")?;
            Ok(Some(enc))
        }
        OutputCodec::Vp8 => {
            let enc = gst::ElementFactory::make("vp8enc")
                .property("deadline", 1i64)
                .property("cpu-used", -5i32)
                .property("target-bitrate", (out.bitrate_kbps * 1000) as i32)
                .property("keyframe-max-dist", out.keyframe_interval as i32)
                .property("threads", 1i32)
                .build()
                .context("failed to build vp8enc")?;
            Ok(Some(enc))
        }
        OutputCodec::Vp9 => {
            let enc = gst::ElementFactory::make("vp9enc")
                .property("deadline", 1i64)
                .property("cpu-used", -5i32)
                .property("target-bitrate", (out.bitrate_kbps * 1000) as i32)
                .property("keyframe-max-dist", out.keyframe_interval as i32)
                .build()
                .context("failed to build vp9enc")?;
            Ok(Some(enc))
        }
    }
}

fn build_rtp_payloader(codec: OutputCodec) -> Result<gst::Element> {
    match codec {
        OutputCodec::H264 => gst::ElementFactory::make("rtph264pay")
            .property("mtu", 1400u32)
            .property("config-interval", -1i32)
            .property("pt", 96u32)
            .build()
            .context("failed to build rtph264pay"),
        OutputCodec::H265 => gst::ElementFactory::make("rtph265pay")
            .property("mtu", 1400u32)
            .property("config-interval", -1i32)
            .property("pt", 96u32)
            .build()
            .context("failed to build rtph265pay"),
        OutputCodec::Vp8 => gst::ElementFactory::make("rtpvp8pay")
            .property("mtu", 1400u32)
            .property("pt", 96u32)
            .build()
            .context("failed to build rtpvp8pay"),
        OutputCodec::Vp9 => gst::ElementFactory::make("rtpvp9pay")
            .property("mtu", 1400u32)
            .property("pt", 96u32)
            .build()
            .context("failed to build rtpvp9pay"),
        OutputCodec::Raw => gst::ElementFactory::make("rtpvrawpay")
            .property("mtu", 1400u32)
            .property("pt", 96u32)
            .build()
            .context("failed to build rtpvrawpay"),
    }
}

fn build_file_mux(codec: OutputCodec) -> Result<gst::Element> {
    match codec {
        OutputCodec::H264 | OutputCodec::H265 => {
            gst::ElementFactory::make("mp4mux").build().context("failed to build mp4mux")
        }
        OutputCodec::Vp8 | OutputCodec::Vp9 => gst::ElementFactory::make("matroskamux")
            .build()
            .context("failed to build matroskamux"),
        OutputCodec::Raw => gst::ElementFactory::make("avimux").build().context("failed to build avimux"),
    }
}

fn build_udpsink(host: &str, port: u16) -> Result<gst::Element> {
    gst::ElementFactory::make("udpsink")
        .property("host", host)
        .property("port", port as i32)
        .property("sync", false)
        .property("async", false)
        .build()
        .context("failed to build udpsink")
}
