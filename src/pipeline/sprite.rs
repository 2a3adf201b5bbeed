// src/pipeline/sprite.rs

//! SVG icon optimization and sprite merging.
//!
//! Each icon is run through a conservative optimization pass, then all
//! icons are merged into one inline sprite of `<symbol>` elements. The
//! merge output keeps its working name until the write completes, then is
//! renamed to the conventional `sprite.svg` that downstream markup
//! references.
//!
//! The optimizer deliberately preserves IDs, empty attributes, empty
//! namespace declarations and unknown attributes/content: the merge step
//! and consuming markup depend on them staying stable. Titles,
//! descriptions, doctypes and comments are removed; they are
//! presentation-irrelevant and can conflict across merged files.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

/// Working name of the merge output before finalization.
const MERGE_OUTPUT_NAME: &str = "svg.svg";
/// Conventional sprite name referenced by theme markup.
pub const SPRITE_NAME: &str = "sprite.svg";

/// Optimize one icon document.
///
/// The reader tokenizes sloppy markup without complaint, so tag balance is
/// checked here: every start tag must see its matching end tag before the
/// document ends, otherwise the icon is rejected and nothing downstream
/// (the sprite merge, the final rename) ever sees it.
pub fn optimize_icon(svg: &str) -> Result<String> {
    let mut reader = Reader::from_str(svg);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut open: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => {
                if let Some(name) = open.pop() {
                    return Err(anyhow!(
                        "malformed svg: <{}> is never closed",
                        String::from_utf8_lossy(&name)
                    ));
                }
                break;
            }
            Ok(Event::Decl(_) | Event::DocType(_) | Event::PI(_) | Event::Comment(_)) => {}
            Ok(Event::Start(e)) if is_stripped_element(e.name().as_ref()) => {
                skip_element(&mut reader, e.name().as_ref())?;
            }
            Ok(Event::Empty(e)) if is_stripped_element(e.name().as_ref()) => {}
            Ok(Event::Text(t)) if t.iter().all(u8::is_ascii_whitespace) => {}
            Ok(Event::Start(e)) => {
                open.push(e.name().as_ref().to_vec());
                writer
                    .write_event(Event::Start(e))
                    .context("writing optimized svg event")?;
            }
            Ok(Event::End(e)) => {
                match open.pop() {
                    Some(name) if name == e.name().as_ref() => {}
                    _ => {
                        return Err(anyhow!(
                            "malformed svg: unexpected </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        ));
                    }
                }
                writer
                    .write_event(Event::End(e))
                    .context("writing optimized svg event")?;
            }
            Ok(event) => writer
                .write_event(event)
                .context("writing optimized svg event")?,
            Err(e) => return Err(anyhow!("malformed svg: {e}")),
        }
    }

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).context("optimized svg is not valid utf-8")
}

fn is_stripped_element(name: &[u8]) -> bool {
    matches!(name, b"title" | b"desc")
}

/// Consume events until the end tag matching `name`, honoring nesting.
fn skip_element(reader: &mut Reader<&[u8]>, name: &[u8]) -> Result<()> {
    let mut depth = 1usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == name => depth += 1,
            Ok(Event::End(e)) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Ok(Event::Eof) => {
                return Err(anyhow!(
                    "unterminated <{}> element",
                    String::from_utf8_lossy(name)
                ));
            }
            Ok(_) => {}
            Err(e) => return Err(anyhow!("malformed svg: {e}")),
        }
    }
}

/// Merge optimized icons into one inline sprite document.
///
/// Each `(stem, svg)` pair becomes `<symbol id="<stem>">` carrying over the
/// icon's `viewBox`/`preserveAspectRatio` and its content verbatim.
pub fn merge_sprite(icons: &[(String, String)]) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut root = BytesStart::new("svg");
    root.push_attribute(("xmlns", "http://www.w3.org/2000/svg"));
    writer.write_event(Event::Start(root))?;

    for (stem, svg) in icons {
        write_symbol(&mut writer, stem, svg)
            .with_context(|| format!("merging icon '{stem}'"))?;
    }

    writer.write_event(Event::End(BytesEnd::new("svg")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).context("sprite is not valid utf-8")
}

fn write_symbol(writer: &mut Writer<Cursor<Vec<u8>>>, stem: &str, svg: &str) -> Result<()> {
    let mut reader = Reader::from_str(svg);

    // Locate the root <svg> element and lift selected attributes.
    let root = loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"svg" => break Some(e.into_owned()),
            Ok(Event::Empty(e)) if e.name().as_ref() == b"svg" => break Some(e.into_owned()),
            Ok(Event::Eof) => break None,
            Ok(_) => {}
            Err(e) => return Err(anyhow!("malformed svg: {e}")),
        }
    };
    let root = root.ok_or_else(|| anyhow!("icon has no root <svg> element"))?;

    let mut symbol = BytesStart::new("symbol");
    symbol.push_attribute(("id", stem));
    for attr in root.attributes().flatten() {
        if matches!(attr.key.as_ref(), b"viewBox" | b"preserveAspectRatio") {
            let value = attr.unescape_value().context("reading svg attribute")?;
            symbol.push_attribute((
                String::from_utf8_lossy(attr.key.as_ref()).to_string().as_str(),
                value.as_ref(),
            ));
        }
    }
    writer.write_event(Event::Start(symbol))?;

    // Copy the icon body verbatim, honoring nested <svg> elements.
    let mut depth = 1usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"svg" {
                    depth += 1;
                }
                writer.write_event(Event::Start(e.into_owned()))?;
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"svg" {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Ok(Event::Eof) => break,
            Ok(event) => writer.write_event(event.into_owned())?,
            Err(e) => return Err(anyhow!("malformed svg: {e}")),
        }
    }

    writer.write_event(Event::End(BytesEnd::new("symbol")))?;
    Ok(())
}

/// Optimize every icon in `svg_dir` and write the merged sprite into
/// `dest_dir`.
///
/// The rename to [`SPRITE_NAME`] happens only after the merge output is
/// fully written; a failed optimization never reaches it.
pub fn build(svg_dir: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let mut icons = Vec::new();

    let mut entries: Vec<PathBuf> = fs::read_dir(svg_dir)
        .with_context(|| format!("reading icon directory {:?}", svg_dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "svg"))
        .collect();
    entries.sort();

    if entries.is_empty() {
        return Err(anyhow!("no icons found in {:?}", svg_dir));
    }

    for path in entries {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading icon {:?}", path))?;
        let optimized =
            optimize_icon(&raw).with_context(|| format!("optimizing icon {:?}", path))?;
        icons.push((stem, optimized));
    }

    let sprite = merge_sprite(&icons)?;

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating sprite dest {:?}", dest_dir))?;

    let working = dest_dir.join(MERGE_OUTPUT_NAME);
    let final_path = dest_dir.join(SPRITE_NAME);

    fs::write(&working, sprite).with_context(|| format!("writing {:?}", working))?;
    fs::rename(&working, &final_path)
        .with_context(|| format!("finalizing sprite as {:?}", final_path))?;

    Ok(final_path)
}
