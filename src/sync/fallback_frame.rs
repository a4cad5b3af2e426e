use anyhow::{Context, Result};
use gst::prelude::*;
use gstreamer as gst;

/// A single fixed NV12 frame (neutral gray: Y=128, UV=128) used by the render
/// loop whenever the frame slot has never received a buffer at all — distinct
/// from "repeating the last frame", which is what happens once at least one
/// real frame has arrived.
pub fn build_fallback_frame(width: u32, height: u32) -> Result<gst::Buffer> {
    let y_size = (width * height) as usize;
    let uv_size = y_size / 2;
    let total = y_size + uv_size;

    let mut buffer = gst::Buffer::with_size(total).context("failed to allocate fallback frame buffer")?;
    {
        let buffer_mut = buffer.get_mut().expect("fallback frame buffer is uniquely owned");
        let mut map = buffer_mut
            .map_writable()
            .context("failed to map fallback frame buffer writable")?;
        map.as_mut_slice().fill(128);
    }
    Ok(buffer)
}
