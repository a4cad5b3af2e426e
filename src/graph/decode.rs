use anyhow::{Context, Result};
use gst::prelude::*;
use gstreamer as gst;

/// Codec family carried by the MPEG-TS elementary stream, as seen on the
/// dynamic pad `tsdemux` exposes once it identifies a program. Anything not
/// explicitly recognized falls back to `decodebin`, same as the upstream
/// prototype this chain is modeled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    H264,
    H265,
    Mpeg2,
    Mpeg4,
    Generic,
}

pub fn detect_codec_kind(caps: &gst::Caps) -> CodecKind {
    let Some(s) = caps.structure(0) else {
        return CodecKind::Generic;
    };
    match s.name().as_str() {
        "video/x-h264" => CodecKind::H264,
        "video/x-h265" => CodecKind::H265,
        "video/mpeg" => {
            let version = s.get::<i32>("mpegversion").unwrap_or(2);
            if version == 4 {
                CodecKind::Mpeg4
            } else {
                CodecKind::Mpeg2
            }
        }
        _ => CodecKind::Generic,
    }
}

/// A freshly built parser+decoder chain for one dynamic pad. `parser` is
/// absent when the chain is a single `decodebin` element standing in for an
/// unrecognized codec.
pub struct DecodeChain {
    pub parser: Option<gst::Element>,
    pub decoder: gst::Element,
}

impl DecodeChain {
    pub fn elements(&self) -> Vec<&gst::Element> {
        match &self.parser {
            Some(parser) => vec![parser, &self.decoder],
            None => vec![&self.decoder],
        }
    }

    pub fn sink_element(&self) -> &gst::Element {
        self.parser.as_ref().unwrap_or(&self.decoder)
    }

    pub fn src_element(&self) -> &gst::Element {
        &self.decoder
    }

    /// `true` for the `decodebin` fallback chain, whose src pad is a
    /// "sometimes" pad that only appears once `decodebin` has identified the
    /// stream -- it cannot be statically linked like the named-codec chains.
    pub fn has_dynamic_src(&self) -> bool {
        self.parser.is_none()
    }
}

pub fn build_decode_chain(kind: CodecKind) -> Result<DecodeChain> {
    match kind {
        CodecKind::H264 => {
            let parser = gst::ElementFactory::make("h264parse")
                .build()
                .context("failed to build h264parse")?;
            let decoder = gst::ElementFactory::make("avdec_h264")
                .build()
                .context("failed to build avdec_h264")?;
            Ok(DecodeChain {
                parser: Some(parser),
                decoder,
            })
        }
        CodecKind::H265 => {
            let parser = gst::ElementFactory::make("h265parse")
                .build()
                .context("failed to build h265parse")?;
            let decoder = gst::ElementFactory::make("avdec_h265")
                .build()
                .context("failed to build avdec_h265")?;
            Ok(DecodeChain {
                parser: Some(parser),
                decoder,
            })
        }
        CodecKind::Mpeg2 => {
            let parser = gst::ElementFactory::make("mpegvideoparse")
                .build()
                .context("failed to build mpegvideoparse")?;
            let decoder = gst::ElementFactory::make("avdec_mpeg2video")
                .build()
                .context("failed to build avdec_mpeg2video")?;
            Ok(DecodeChain {
                parser: Some(parser),
                decoder,
            })
        }
        CodecKind::Mpeg4 => {
            let parser = gst::ElementFactory::make("mpeg4videoparse")
                .build()
                .context("failed to build mpeg4videoparse")?;
            let decoder = gst::ElementFactory::make("avdec_mpeg4")
                .build()
                .context("failed to build avdec_mpeg4")?;
            Ok(DecodeChain {
                parser: Some(parser),
                decoder,
            })
        }
        CodecKind::Generic => {
            let decoder = gst::ElementFactory::make("decodebin")
                .build()
                .context("failed to build decodebin")?;
            Ok(DecodeChain {
                parser: None,
                decoder,
            })
        }
    }
}

/// Configure a software decoder for unbounded thread use when the property
/// exists; hardware decoders and `decodebin` itself don't expose it.
pub fn configure_decoder_threads(decoder: &gst::Element) {
    if decoder.has_property("max-threads", None) {
        decoder.set_property("max-threads", 0i32);
    }
}
