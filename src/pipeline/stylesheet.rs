// src/pipeline/stylesheet.rs

//! Stylesheet compilation.
//!
//! One entry stylesheet (an aggregator importing everything else) flows
//! through an ordered transform chain and is written out together with a
//! source map. Later stages assume earlier ones already ran: mixins are
//! expanded before syntax lowering, and minification runs last.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::warn;

use crate::pipeline::{run_stages, Document, Stage};

/// Options threaded into the stylesheet chain.
#[derive(Debug, Clone, Default)]
pub struct StylesheetOptions {
    /// When set, every class selector is prefixed with `<namespace>-`.
    pub namespace: Option<String>,
}

/// Compile the entry stylesheet through the full transform chain.
pub fn compile(entry: &Path, options: &StylesheetOptions) -> Result<Document> {
    let content = fs::read_to_string(entry)
        .with_context(|| format!("reading stylesheet entry {:?}", entry))?;

    let base_dir = entry
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut doc = Document::new(content);
    doc.sources.push(entry.to_path_buf());

    let ns = options.namespace.clone();
    let stages = [
        Stage::new("resolve_imports", move |d| resolve_imports(d, &base_dir)),
        Stage::new("normalize_urls", |d| Ok(normalize_urls(d))),
        Stage::new("expand_utilities", expand_utilities),
        Stage::new("expand_mixins", expand_mixins),
        Stage::new("lower_syntax", |d| Ok(lower_syntax(d))),
        Stage::new("merge_media_queries", |d| Ok(merge_media_queries(d))),
        Stage::new("apply_namespace", move |d| {
            Ok(apply_namespace(d, ns.as_deref()))
        }),
        Stage::new("minify", |d| Ok(minify(d))),
        Stage::new("report_diagnostics", |d| Ok(report_diagnostics(d))),
    ];

    run_stages(doc, &stages)
}

/// Compile and write `base.css` plus `base.css.map` into `dest_dir`.
pub fn build(entry: &Path, dest_dir: &Path, options: &StylesheetOptions) -> Result<PathBuf> {
    let doc = compile(entry, options)?;

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating stylesheet dest {:?}", dest_dir))?;

    let out_name = "base.css";
    let map_name = "base.css.map";
    let out_path = dest_dir.join(out_name);

    let map = source_map(&doc, out_name)?;
    fs::write(dest_dir.join(map_name), map)
        .with_context(|| format!("writing source map in {:?}", dest_dir))?;

    let mut css = doc.content;
    css.push_str(&format!("\n/*# sourceMappingURL={map_name} */\n"));
    fs::write(&out_path, css).with_context(|| format!("writing {:?}", out_path))?;

    Ok(out_path)
}

/// Minimal version-3 source map: all contributing sources are listed, but
/// mappings are not tracked through the text transforms.
fn source_map(doc: &Document, file: &str) -> Result<String> {
    let sources: Vec<String> = doc
        .sources
        .iter()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect();

    let map = serde_json::json!({
        "version": 3,
        "file": file,
        "sources": sources,
        "names": [],
        "mappings": "",
    });
    Ok(serde_json::to_string(&map)?)
}

/// Stage 1: inline `@import` statements into a single document.
///
/// Imports resolve relative to the importing file. Cycles are broken by a
/// visited set; a missing import fails the stage.
fn resolve_imports(mut doc: Document, base_dir: &Path) -> Result<Document> {
    let mut visited: Vec<PathBuf> = doc.sources.clone();
    let content = std::mem::take(&mut doc.content);
    doc.content = inline_imports(&content, base_dir, &mut visited, &mut doc.sources)?;
    Ok(doc)
}

fn inline_imports(
    content: &str,
    dir: &Path,
    visited: &mut Vec<PathBuf>,
    sources: &mut Vec<PathBuf>,
) -> Result<String> {
    // Matches `@import "x.css";` and `@import url("x.css");` (quotes optional).
    let import_re =
        Regex::new(r#"@import\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?\s*\)?\s*;"#).expect("static regex");

    let mut out = String::with_capacity(content.len());
    let mut last = 0;

    for caps in import_re.captures_iter(content) {
        let whole = caps.get(0).expect("group 0");
        let target = &caps[1];

        out.push_str(&content[last..whole.start()]);
        last = whole.end();

        let path = dir.join(target);
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());

        if visited.contains(&canonical) {
            // Import cycle; the first inclusion already carries the content.
            continue;
        }
        visited.push(canonical.clone());

        let imported = fs::read_to_string(&path)
            .with_context(|| format!("resolving @import {:?}", path))?;
        if !sources.contains(&path) {
            sources.push(path.clone());
        }

        let child_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let inlined = inline_imports(&imported, &child_dir, visited, sources)?;
        out.push_str(&inlined);
    }

    out.push_str(&content[last..]);
    Ok(out)
}

/// Stage 2: normalize `url(...)` tokens: strip redundant `./` segments and
/// canonicalize quoting (unquoted unless the target needs quotes).
fn normalize_urls(mut doc: Document) -> Document {
    let url_re = Regex::new(r#"url\(\s*(['"]?)([^'")]*)['"]?\s*\)"#).expect("static regex");

    doc.content = url_re
        .replace_all(&doc.content, |caps: &regex::Captures<'_>| {
            let mut target = caps[2].trim().to_string();
            while let Some(rest) = target.strip_prefix("./") {
                target = rest.to_string();
            }
            if target.chars().any(|c| c.is_whitespace() || c == '(' || c == ')') {
                format!("url(\"{target}\")")
            } else {
                format!("url({target})")
            }
        })
        .into_owned();
    doc
}

/// Stage 3: expand `@util <name>;` at-rules from the built-in utility
/// library. An unknown utility fails the stage.
fn expand_utilities(mut doc: Document) -> Result<Document> {
    let util_re = Regex::new(r"@util\s+([A-Za-z-]+)\s*;").expect("static regex");

    let mut error: Option<String> = None;
    doc.content = util_re
        .replace_all(&doc.content, |caps: &regex::Captures<'_>| {
            match utility_body(&caps[1]) {
                Some(body) => body.to_string(),
                None => {
                    error.get_or_insert_with(|| caps[1].to_string());
                    caps[0].to_string()
                }
            }
        })
        .into_owned();

    match error {
        Some(name) => Err(anyhow!("unknown utility '@util {name}'")),
        None => Ok(doc),
    }
}

fn utility_body(name: &str) -> Option<&'static str> {
    match name {
        "clearfix" => Some("display: flow-root;"),
        "hide-visually" => Some(
            "border: 0; clip: rect(0 0 0 0); height: 1px; margin: -1px; \
             overflow: hidden; padding: 0; position: absolute; width: 1px;",
        ),
        "truncate" => Some("overflow: hidden; text-overflow: ellipsis; white-space: nowrap;"),
        _ => None,
    }
}

/// Stage 4: expand `@define-mixin` / `@mixin` macro pairs.
///
/// ```css
/// @define-mixin button $color {
///     color: $(color);
/// }
/// .cta { @mixin button red; }
/// ```
fn expand_mixins(mut doc: Document) -> Result<Document> {
    let content = std::mem::take(&mut doc.content);
    let (without_defs, mixins) = collect_mixin_definitions(&content)?;
    doc.content = apply_mixin_calls(&without_defs, &mixins)?;
    Ok(doc)
}

#[derive(Debug, Clone)]
struct MixinDef {
    params: Vec<String>,
    body: String,
}

fn collect_mixin_definitions(content: &str) -> Result<(String, HashMap<String, MixinDef>)> {
    let def_re = Regex::new(r"@define-mixin\s+([\w-]+)([^{]*)\{").expect("static regex");

    let mut mixins = HashMap::new();
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    while let Some(caps) = def_re.captures(&content[cursor..]) {
        let whole = caps.get(0).expect("group 0");
        let abs_start = cursor + whole.start();
        let brace_open = cursor + whole.end() - 1;

        let brace_close = matching_brace(content, brace_open)
            .ok_or_else(|| anyhow!("unterminated @define-mixin '{}'", &caps[1]))?;

        let params: Vec<String> = caps[2]
            .split(',')
            .map(|p| p.trim().trim_start_matches('$').to_string())
            .filter(|p| !p.is_empty())
            .collect();

        mixins.insert(
            caps[1].to_string(),
            MixinDef {
                params,
                body: content[brace_open + 1..brace_close].trim().to_string(),
            },
        );

        out.push_str(&content[cursor..abs_start]);
        cursor = brace_close + 1;
    }
    out.push_str(&content[cursor..]);

    Ok((out, mixins))
}

fn apply_mixin_calls(content: &str, mixins: &HashMap<String, MixinDef>) -> Result<String> {
    let call_re = Regex::new(r"@mixin\s+([\w-]+)([^;{]*);").expect("static regex");

    let mut error: Option<String> = None;
    let out = call_re
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let Some(def) = mixins.get(name) else {
                error.get_or_insert_with(|| name.to_string());
                return caps[0].to_string();
            };

            let args: Vec<&str> = caps[2]
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .collect();

            let mut body = def.body.clone();
            for (i, param) in def.params.iter().enumerate() {
                let value = args.get(i).copied().unwrap_or("");
                body = body.replace(&format!("$({param})"), value);
            }
            body
        })
        .into_owned();

    match error {
        Some(name) => Err(anyhow!("call to undefined mixin '{name}'")),
        None => Ok(out),
    }
}

/// Stage 5: lower modern syntax for broader support.
///
/// - `var(--x)` references are substituted from `:root` declarations; the
///   declarations themselves are preserved, not inlined away.
/// - `var(--x, fallback)` falls back when the property is undefined.
/// - A small allow-list of properties gets vendor-prefixed copies.
fn lower_syntax(mut doc: Document) -> Document {
    let root_props = collect_root_custom_properties(&doc.content);

    let var_re =
        Regex::new(r"var\(\s*(--[\w-]+)\s*(?:,\s*([^)]+))?\)").expect("static regex");
    let mut unresolved: Vec<String> = Vec::new();

    doc.content = var_re
        .replace_all(&doc.content, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            if let Some(value) = root_props.get(name) {
                value.clone()
            } else if let Some(fallback) = caps.get(2) {
                fallback.as_str().trim().to_string()
            } else {
                unresolved.push(name.to_string());
                caps[0].to_string()
            }
        })
        .into_owned();

    for name in unresolved {
        doc.push_diagnostic(
            "lower_syntax",
            format!("custom property '{name}' has no :root definition and no fallback"),
        );
    }

    doc.content = vendor_prefix(&doc.content);
    doc
}

fn collect_root_custom_properties(content: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    let root_re = Regex::new(r":root\s*\{").expect("static regex");
    let decl_re = Regex::new(r"(--[\w-]+)\s*:\s*([^;}]+)").expect("static regex");

    for m in root_re.find_iter(content) {
        let open = m.end() - 1;
        if let Some(close) = matching_brace(content, open) {
            for caps in decl_re.captures_iter(&content[open + 1..close]) {
                props.insert(caps[1].to_string(), caps[2].trim().to_string());
            }
        }
    }
    props
}

const PREFIXED_PROPERTIES: &[(&str, &[&str])] = &[
    ("appearance", &["-webkit-", "-moz-"]),
    ("user-select", &["-webkit-", "-moz-"]),
    ("backdrop-filter", &["-webkit-"]),
];

fn vendor_prefix(content: &str) -> String {
    let decl_re =
        Regex::new(r"(?m)(^|[{;\s])(appearance|user-select|backdrop-filter)\s*:\s*([^;}]+)(;?)")
            .expect("static regex");

    decl_re
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let lead = &caps[1];
            let prop = &caps[2];
            let value = caps[3].trim();

            let prefixes = PREFIXED_PROPERTIES
                .iter()
                .find(|(p, _)| *p == prop)
                .map(|(_, v)| *v)
                .unwrap_or(&[]);

            let mut expanded = lead.to_string();
            for prefix in prefixes {
                expanded.push_str(&format!("{prefix}{prop}: {value}; "));
            }
            expanded.push_str(&format!("{prop}: {value};"));
            expanded
        })
        .into_owned()
}

/// Stage 6: merge duplicate `@media` blocks.
///
/// All top-level media blocks are removed and re-emitted at the end of the
/// document, one block per distinct (whitespace-normalized) condition, in
/// first-seen order.
fn merge_media_queries(mut doc: Document) -> Document {
    let media_re = Regex::new(r"@media([^{]+)\{").expect("static regex");

    let content = std::mem::take(&mut doc.content);
    let mut remaining = String::with_capacity(content.len());
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, String> = HashMap::new();
    let mut cursor = 0;

    while let Some(caps) = media_re.captures(&content[cursor..]) {
        let whole = caps.get(0).expect("group 0");
        let abs_start = cursor + whole.start();
        let brace_open = cursor + whole.end() - 1;

        let Some(brace_close) = matching_brace(&content, brace_open) else {
            // Unbalanced braces; leave the rest untouched and let later
            // stages surface whatever the author wrote.
            break;
        };

        let condition = normalize_ws(caps[1].trim());
        let body = content[brace_open + 1..brace_close].trim().to_string();

        remaining.push_str(&content[cursor..abs_start]);
        cursor = brace_close + 1;

        if !merged.contains_key(&condition) {
            order.push(condition.clone());
        }
        let entry = merged.entry(condition).or_default();
        if !entry.is_empty() {
            entry.push('\n');
        }
        entry.push_str(&body);
    }
    remaining.push_str(&content[cursor..]);

    let mut out = remaining.trim_end().to_string();
    for condition in order {
        let body = &merged[&condition];
        out.push_str(&format!("\n@media {condition} {{\n{body}\n}}"));
    }
    doc.content = out;
    doc
}

/// Stage 7: prefix class selectors with the configured namespace.
///
/// Identity when no namespace is configured. Only selector positions are
/// rewritten; declaration values (including dotted numbers) are left alone.
fn apply_namespace(mut doc: Document, namespace: Option<&str>) -> Document {
    let Some(ns) = namespace else {
        return doc;
    };

    let content = std::mem::take(&mut doc.content);
    let class_re = Regex::new(r"\.([A-Za-z_][\w-]*)").expect("static regex");
    let prefix = format!(".{ns}-");

    doc.content = namespace_blocks(&content, &class_re, &prefix);
    doc
}

/// Rewrite class selectors in rule preludes; at-rule bodies (media blocks)
/// are processed recursively so their selectors are namespaced too.
fn namespace_blocks(content: &str, class_re: &Regex, prefix: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    while let Some(rel) = content[cursor..].find('{') {
        let open = cursor + rel;
        let selector = &content[cursor..open];
        let Some(close) = matching_brace(content, open) else {
            break;
        };
        let body = &content[open + 1..close];

        if selector.trim_start().starts_with('@') {
            out.push_str(selector);
            out.push('{');
            out.push_str(&namespace_blocks(body, class_re, prefix));
        } else {
            out.push_str(&class_re.replace_all(selector, |c: &regex::Captures<'_>| {
                format!("{prefix}{}", &c[1])
            }));
            out.push('{');
            out.push_str(body);
        }
        out.push('}');
        cursor = close + 1;
    }
    out.push_str(&content[cursor..]);
    out
}

/// Stage 8: minify.
///
/// Strips all comments and collapses whitespace. Empty rules are kept, and
/// no vendor prefixing happens here (already handled upstream).
fn minify(mut doc: Document) -> Document {
    let stripped = strip_css_comments(&doc.content);

    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;
    let mut in_string: Option<char> = None;

    for ch in stripped.chars() {
        if let Some(quote) = in_string {
            out.push(ch);
            if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                in_string = Some(ch);
                out.push(ch);
            }
            c if c.is_whitespace() => {
                pending_space = !out.is_empty();
            }
            '{' | '}' | ';' | ':' | ',' | '>' => {
                // Punctuators absorb surrounding whitespace.
                while out.ends_with(' ') {
                    out.pop();
                }
                if ch == '}' && out.ends_with(';') {
                    out.pop();
                }
                out.push(ch);
                pending_space = false;
            }
            c => {
                if pending_space {
                    let prev = out.chars().last();
                    if !matches!(prev, Some('{' | '}' | ';' | ':' | ',' | '>') | None) {
                        out.push(' ');
                    }
                    pending_space = false;
                }
                out.push(c);
            }
        }
    }

    doc.content = out;
    doc
}

fn strip_css_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(quote) = in_string {
            out.push(ch);
            if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                in_string = Some(ch);
                out.push(ch);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Stage 9: surface collected diagnostics on the console, then clear them
/// so repeated runs under the watcher don't accumulate stale messages.
fn report_diagnostics(mut doc: Document) -> Document {
    for diag in doc.diagnostics.drain(..) {
        warn!(stage = diag.stage, "{}", diag.message);
    }
    doc
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Index of the `}` matching the `{` at `open`, honoring nesting. Braces
/// inside quoted values (`content: "}"`) do not count.
fn matching_brace(content: &str, open: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    debug_assert_eq!(bytes.get(open), Some(&b'{'));

    let mut depth = 0usize;
    let mut in_string: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(quote) = in_string {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => in_string = Some(b),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn doc(content: &str) -> Document {
        Document::new(content)
    }

    #[test]
    fn imports_are_inlined_recursively() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("base.css"), "@import \"a.css\";\nbody { margin: 0; }").unwrap();
        fs::write(dir.path().join("a.css"), "@import \"b.css\";\n.a { color: red; }").unwrap();
        fs::write(dir.path().join("b.css"), ".b { color: blue; }").unwrap();

        let out = compile(&dir.path().join("base.css"), &StylesheetOptions::default()).unwrap();
        assert!(out.content.contains(".b{color:blue}"));
        assert!(out.content.contains(".a{color:red}"));
        assert!(out.content.contains("body{margin:0}"));
        assert_eq!(out.sources.len(), 3);
    }

    #[test]
    fn missing_import_fails_the_stage() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("base.css"), "@import \"gone.css\";").unwrap();
        let err =
            compile(&dir.path().join("base.css"), &StylesheetOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("resolve_imports"));
    }

    #[test]
    fn import_cycles_do_not_loop() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("base.css"), "@import \"a.css\";").unwrap();
        fs::write(dir.path().join("a.css"), "@import \"base.css\";\n.a{}").unwrap();

        let out = compile(&dir.path().join("base.css"), &StylesheetOptions::default()).unwrap();
        assert!(out.content.contains(".a{}"));
    }

    #[test]
    fn urls_are_normalized() {
        let out = normalize_urls(doc("a { background: url( './img/x.png' ); }"));
        assert!(out.content.contains("url(img/x.png)"));
    }

    #[test]
    fn utilities_expand() {
        let out = expand_utilities(doc(".t { @util truncate; }")).unwrap();
        assert!(out.content.contains("text-overflow: ellipsis"));
        assert!(expand_utilities(doc(".t { @util nonsense; }")).is_err());
    }

    #[test]
    fn mixins_expand_with_arguments() {
        let css = "@define-mixin button $color {\n  color: $(color);\n}\n.cta { @mixin button red; }";
        let out = expand_mixins(doc(css)).unwrap();
        assert!(out.content.contains("color: red"));
        assert!(!out.content.contains("@define-mixin"));
    }

    #[test]
    fn undefined_mixin_fails() {
        assert!(expand_mixins(doc(".x { @mixin missing; }")).is_err());
    }

    #[test]
    fn custom_properties_are_substituted_but_preserved() {
        let css = ":root { --brand: #f00; }\n.a { color: var(--brand); }";
        let out = lower_syntax(doc(css));
        assert!(out.content.contains("color: #f00"));
        assert!(out.content.contains("--brand: #f00"));
    }

    #[test]
    fn var_fallback_is_used_when_undefined() {
        let out = lower_syntax(doc(".a { color: var(--nope, green); }"));
        assert!(out.content.contains("color: green"));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn unresolved_var_without_fallback_is_a_diagnostic() {
        let out = lower_syntax(doc(".a { color: var(--nope); }"));
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.content.contains("var(--nope)"));
    }

    #[test]
    fn allow_listed_properties_get_prefixes() {
        let out = lower_syntax(doc(".a { user-select: none; }"));
        assert!(out.content.contains("-webkit-user-select: none"));
        assert!(out.content.contains("-moz-user-select: none"));
        // Only one unprefixed declaration remains.
        assert_eq!(out.content.matches("user-select").count(), 3);
    }

    #[test]
    fn duplicate_media_blocks_merge_in_first_seen_order() {
        let css = "@media (min-width: 600px) { .early { color: red; } }\n\
                   .keep { margin: 0; }\n\
                   @media (min-width: 600px) { .late { color: blue; } }";
        let out = merge_media_queries(doc(css));
        assert_eq!(out.content.matches("@media").count(), 1);
        let early = out.content.find(".early").unwrap();
        let late = out.content.find(".late").unwrap();
        assert!(early < late, "merged bodies out of order: {}", out.content);
        assert!(out.content.find(".keep").unwrap() < out.content.find("@media").unwrap());
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_block_scoping() {
        let css = "@media (min-width: 600px) { .quote { content: \"}\"; } }\n\
                   @media (min-width: 600px) { .plain { color: red; } }";
        let out = merge_media_queries(doc(css));
        assert_eq!(out.content.matches("@media").count(), 1);
        assert!(out.content.contains("content: \"}\""));
        assert!(out.content.contains(".plain"));
    }

    #[test]
    fn namespace_prefixes_class_selectors_only() {
        let css = ".btn { background: url(x.png); margin: .5em; }";
        let out = apply_namespace(doc(css), Some("theme"));
        assert!(out.content.contains(".theme-btn"));
        assert!(out.content.contains(".5em"));
        assert!(!out.content.contains("theme-5em"));
    }

    #[test]
    fn namespace_is_identity_when_unset() {
        let css = ".btn { color: red; }";
        let out = apply_namespace(doc(css), None);
        assert_eq!(out.content, css);
    }

    #[test]
    fn minify_strips_comments_but_keeps_empty_rules() {
        let css = "/* banner */\n.a {\n}\n.b { color: red; /* inline */ }";
        let out = minify(doc(css));
        assert_eq!(out.content, ".a{}.b{color:red}");
    }

    #[test]
    fn minify_preserves_string_contents() {
        let css = ".a { content: \"a  b /* no */\"; }";
        let out = minify(doc(css));
        assert!(out.content.contains("\"a  b /* no */\""));
    }

    #[test]
    fn diagnostics_are_cleared_after_reporting() {
        let mut d = doc("");
        d.push_diagnostic("test", "message");
        let out = report_diagnostics(d);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn build_writes_css_and_source_map() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("assets");
        let dest = dir.path().join("library");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("base.css"), "@import \"part.css\";").unwrap();
        fs::write(src.join("part.css"), ".p { color: red; }").unwrap();

        build(&src.join("base.css"), &dest, &StylesheetOptions::default()).unwrap();

        let css = fs::read_to_string(dest.join("base.css")).unwrap();
        assert!(css.contains("sourceMappingURL=base.css.map"));

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dest.join("base.css.map")).unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["sources"].as_array().unwrap().len(), 2);
    }
}
