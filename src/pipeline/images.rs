// src/pipeline/images.rs

//! Standalone image optimization.
//!
//! Lossless, in-place-style optimization from the image source directory to
//! its destination: PNG and JPEG files lose their metadata sections, SVG
//! files go through the icon optimizer, anything else is copied unchanged.
//! This task never participates in the live-reload loop.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use crate::pipeline::sprite::optimize_icon;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Ancillary PNG chunks that carry metadata only.
const DROPPED_PNG_CHUNKS: &[&[u8; 4]] =
    &[b"tEXt", b"zTXt", b"iTXt", b"tIME", b"eXIf"];

/// Optimize every file in `img_dir` into `dest_dir`. Returns the number of
/// files written.
pub fn build(img_dir: &Path, dest_dir: &Path) -> Result<usize> {
    let entries: Vec<PathBuf> = fs::read_dir(img_dir)
        .with_context(|| format!("reading image directory {:?}", img_dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating image dest {:?}", dest_dir))?;

    let mut written = 0;
    for path in entries {
        let name = path
            .file_name()
            .ok_or_else(|| anyhow!("image path {:?} has no file name", path))?;
        let dest = dest_dir.join(name);

        optimize_file(&path, &dest)
            .with_context(|| format!("optimizing image {:?}", path))?;
        written += 1;
    }

    info!(count = written, src = ?img_dir, "optimized images");
    Ok(written)
}

fn optimize_file(src: &Path, dest: &Path) -> Result<()> {
    let ext = src
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => {
            let data = fs::read(src)?;
            let out = strip_png_metadata(&data)?;
            debug!(path = ?src, before = data.len(), after = out.len(), "png rewritten");
            fs::write(dest, out)?;
        }
        "jpg" | "jpeg" => {
            let data = fs::read(src)?;
            let out = strip_jpeg_metadata(&data)?;
            debug!(path = ?src, before = data.len(), after = out.len(), "jpeg rewritten");
            fs::write(dest, out)?;
        }
        "svg" => {
            let data = fs::read_to_string(src)?;
            fs::write(dest, optimize_icon(&data)?)?;
        }
        _ => {
            fs::copy(src, dest)?;
        }
    }
    Ok(())
}

/// Drop ancillary metadata chunks from a PNG stream. Kept chunks are copied
/// verbatim, stored CRCs included, so no re-checksumming is needed.
pub fn strip_png_metadata(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 || data[..8] != PNG_SIGNATURE {
        return Err(anyhow!("not a png file"));
    }

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&PNG_SIGNATURE);

    let mut i = 8;
    while i + 8 <= data.len() {
        let len = u32::from_be_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]) as usize;
        let chunk_end = i
            .checked_add(12 + len)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| anyhow!("truncated png chunk"))?;

        let chunk_type = &data[i + 4..i + 8];
        let dropped = DROPPED_PNG_CHUNKS.iter().any(|t| *t == chunk_type);
        if !dropped {
            out.extend_from_slice(&data[i..chunk_end]);
        }

        if chunk_type == b"IEND" {
            return Ok(out);
        }
        i = chunk_end;
    }

    Err(anyhow!("png stream ended before IEND"))
}

/// Drop EXIF (APP1 and above) and comment segments from a JPEG stream.
/// The JFIF APP0 segment and all image data are kept verbatim; from the
/// start-of-scan marker onward everything passes through untouched.
pub fn strip_jpeg_metadata(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(anyhow!("not a jpeg file"));
    }

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..2]);

    let mut i = 2;
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            return Err(anyhow!("malformed jpeg segment marker"));
        }
        let marker = data[i + 1];

        // Start of scan: entropy-coded data follows, copy the rest.
        if marker == 0xDA {
            out.extend_from_slice(&data[i..]);
            return Ok(out);
        }

        if marker == 0xC2 {
            debug!("jpeg is already progressive");
        }

        let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        let seg_end = i
            .checked_add(2 + len)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| anyhow!("truncated jpeg segment"))?;

        let dropped = matches!(marker, 0xE1..=0xEF | 0xFE);
        if !dropped {
            out.extend_from_slice(&data[i..seg_end]);
        }
        i = seg_end;
    }

    Err(anyhow!("jpeg stream ended before start of scan"))
}
