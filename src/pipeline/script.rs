// src/pipeline/script.rs

//! Script bundling.
//!
//! Three ordered source groups (vendored libraries, project modules, one
//! application entry file) are lowered per file, concatenated with a
//! semicolon join token, minified and written as a single bundle. Library
//! code must land before application code that depends on it, so group
//! order is fixed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use globset::Glob;
use walkdir::WalkDir;

use crate::config::ThemePaths;
use crate::pipeline::{run_stages, Document, Stage};

/// Collect bundle inputs in load order: every file matching the library
/// glob, then the project-source glob (each group sorted for determinism),
/// then the single entry file.
pub fn collect_sources(paths: &ThemePaths) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    files.extend(glob_files(&paths.theme_root, &paths.script_lib_glob)?);
    files.extend(glob_files(&paths.theme_root, &paths.script_src_glob)?);

    if !paths.script_entry.is_file() {
        return Err(anyhow!(
            "script entry file {:?} does not exist",
            paths.script_entry
        ));
    }
    files.push(paths.script_entry.clone());
    Ok(files)
}

fn glob_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = Glob::new(pattern)
        .with_context(|| format!("invalid glob pattern: {pattern}"))?
        .compile_matcher();

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .strip_prefix(root)
                .map(|rel| matcher.is_match(rel))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();

    files.sort();
    Ok(files)
}

/// Bundle the given files: lower each, concatenate, minify.
pub fn bundle(files: &[PathBuf]) -> Result<Document> {
    let mut parts = Vec::with_capacity(files.len());
    let mut doc = Document::default();

    for path in files {
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading script source {:?}", path))?;
        parts.push(lower(&source));
        doc.sources.push(path.clone());
    }

    // Semicolon join guards against a missing statement terminator at the
    // end of any one file.
    doc.content = parts.join(";\n");

    let stages = [Stage::new("minify", |d: Document| Ok(minify(d)))];
    run_stages(doc, &stages)
}

/// Bundle and write `application.js` into `dest_dir`.
pub fn build(paths: &ThemePaths, dest_dir: &Path) -> Result<PathBuf> {
    let files = collect_sources(paths)?;
    let doc = bundle(&files)?;

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating script dest {:?}", dest_dir))?;
    let out_path = dest_dir.join("application.js");
    fs::write(&out_path, doc.content).with_context(|| format!("writing {:?}", out_path))?;
    Ok(out_path)
}

/// Lower modern declaration syntax for broad support: `const`/`let`
/// become `var` outside strings, templates, comments and regex literals.
pub fn lower(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for token in lex(source) {
        match token.kind {
            TokenKind::Code => out.push_str(&lower_code(token.text)),
            _ => out.push_str(token.text),
        }
    }
    out
}

fn lower_code(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut word = String::new();

    let flush = |word: &mut String, out: &mut String| {
        match word.as_str() {
            "const" | "let" => out.push_str("var"),
            other => out.push_str(other),
        }
        word.clear();
    };

    for ch in code.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
            word.push(ch);
        } else {
            flush(&mut word, &mut out);
            out.push(ch);
        }
    }
    flush(&mut word, &mut out);
    out
}

/// Minify the bundled document: comments dropped, indentation and blank
/// lines collapsed, spaces around punctuators removed where safe.
/// Newlines are preserved as statement boundaries; string, template and
/// regex contents pass through byte-for-byte.
pub fn minify(mut doc: Document) -> Document {
    let content = std::mem::take(&mut doc.content);
    let mut m = CodeMinifier::with_capacity(content.len());

    for token in lex(&content) {
        match token.kind {
            TokenKind::LineComment | TokenKind::BlockComment => m.note_space(),
            TokenKind::Code => m.push_code(token.text),
            _ => m.push_verbatim(token.text),
        }
    }

    doc.content = m.finish();
    doc
}

const PUNCTUATORS: &str = "(){}[];,=<>!?:&|%^~*/+-.";

/// Whitespace-collapsing writer shared by all code segments of a bundle,
/// so separators survive across comment and literal boundaries.
struct CodeMinifier {
    out: String,
    /// Collapsed separator not yet emitted: `' '` or `'\n'`.
    pending: Option<char>,
}

impl CodeMinifier {
    fn with_capacity(cap: usize) -> Self {
        Self {
            out: String::with_capacity(cap),
            pending: None,
        }
    }

    fn note_space(&mut self) {
        if self.pending != Some('\n') {
            self.pending = Some(' ');
        }
    }

    fn push_verbatim(&mut self, text: &str) {
        // A space between an identifier and a literal is droppable; a
        // newline stays as a statement boundary.
        if self.pending.take() == Some('\n') && !self.out.is_empty() {
            self.out.push('\n');
        }
        self.out.push_str(text);
    }

    fn push_code(&mut self, code: &str) {
        for ch in code.chars() {
            if ch.is_whitespace() {
                let sep = if ch == '\n' || self.pending == Some('\n') {
                    '\n'
                } else {
                    ' '
                };
                self.pending = Some(sep);
                continue;
            }

            if let Some(sep) = self.pending.take() {
                let prev = self.out.chars().last();
                let keep = match prev {
                    None => false,
                    Some(p) => {
                        if PUNCTUATORS.contains(p) || PUNCTUATORS.contains(ch) {
                            // `a + +b` must not become `a++b`.
                            matches!((p, ch), ('+', '+') | ('-', '-'))
                        } else {
                            true
                        }
                    }
                };
                if keep {
                    self.out.push(if sep == '\n' { '\n' } else { ' ' });
                } else if sep == '\n'
                    && !matches!(prev, None | Some(';' | '{' | '}' | ',' | '('))
                {
                    // Keep the statement boundary unless the previous
                    // token already terminates one.
                    self.out.push('\n');
                }
            }
            self.out.push(ch);
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Code,
    Str,
    Template,
    Regex,
    LineComment,
    BlockComment,
}

#[derive(Debug)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
}

/// Minimal JavaScript lexer: splits source into code, string/template/regex
/// literals and comments, so transforms never touch literal contents. Regex
/// detection uses the usual heuristic: a `/` can only start a literal when
/// the last significant character cannot end an expression.
fn lex(source: &str) -> Vec<Token<'_>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut last_significant: Option<char> = None;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' => {
                push(&mut tokens, TokenKind::Code, start, i, source);
                let end = scan_quoted(bytes, i, b);
                push(&mut tokens, TokenKind::Str, i, end, source);
                last_significant = Some('"');
                i = end;
                start = i;
            }
            b'`' => {
                push(&mut tokens, TokenKind::Code, start, i, source);
                let end = scan_quoted(bytes, i, b'`');
                push(&mut tokens, TokenKind::Template, i, end, source);
                last_significant = Some('`');
                i = end;
                start = i;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                push(&mut tokens, TokenKind::Code, start, i, source);
                let mut j = i + 2;
                while j < bytes.len() && bytes[j] != b'\n' {
                    j += 1;
                }
                push(&mut tokens, TokenKind::LineComment, i, j, source);
                i = j;
                start = i;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                push(&mut tokens, TokenKind::Code, start, i, source);
                let mut j = i + 2;
                while j + 1 < bytes.len() && !(bytes[j] == b'*' && bytes[j + 1] == b'/') {
                    j += 1;
                }
                let end = (j + 2).min(bytes.len());
                push(&mut tokens, TokenKind::BlockComment, i, end, source);
                i = end;
                start = i;
            }
            b'/' if regex_can_start(last_significant) => {
                push(&mut tokens, TokenKind::Code, start, i, source);
                let end = scan_regex(bytes, i);
                push(&mut tokens, TokenKind::Regex, i, end, source);
                last_significant = Some('/');
                i = end;
                start = i;
            }
            _ => {
                if !(b as char).is_whitespace() {
                    last_significant = Some(b as char);
                }
                i += 1;
            }
        }
    }
    push(&mut tokens, TokenKind::Code, start, bytes.len(), source);
    tokens
}

/// Token boundaries are always ASCII delimiters, so slicing is safe.
fn push<'a>(tokens: &mut Vec<Token<'a>>, kind: TokenKind, start: usize, end: usize, src: &'a str) {
    if end > start {
        tokens.push(Token {
            kind,
            text: &src[start..end],
        });
    }
}

fn regex_can_start(last: Option<char>) -> bool {
    match last {
        None => true,
        Some(c) => "=(,[!&|?{};:+-*%<>~^".contains(c),
    }
}

fn scan_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn scan_regex(bytes: &[u8], open: usize) -> usize {
    let mut i = open + 1;
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                // Trailing flags.
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return i;
            }
            b'\n' => return i, // not a regex after all; bail at the line end
            _ => i += 1,
        }
    }
    bytes.len()
}
