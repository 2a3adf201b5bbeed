// src/config/paths.rs

//! Source and destination paths under the theme root.
//!
//! Every task and watch binding resolves its files through this one struct
//! so the directory conventions live in a single place.

use std::path::PathBuf;

use crate::config::Settings;

/// Resolved path templates for one theme.
#[derive(Debug, Clone)]
pub struct ThemePaths {
    /// `<theme_base>/<theme_name>`
    pub theme_root: PathBuf,

    /// Entry stylesheet (an aggregator importing all other stylesheets).
    pub style_entry: PathBuf,
    /// Glob for stylesheet change detection, relative to the theme root.
    pub style_watch: String,
    pub style_dest: PathBuf,

    /// Ordered script source groups: library code, project source, then the
    /// single application entry file. Load order is semantically relevant.
    pub script_lib_glob: String,
    pub script_src_glob: String,
    pub script_entry: PathBuf,
    /// Glob for script change detection, relative to the theme root.
    pub script_watch: String,
    pub script_dest: PathBuf,

    /// Flat icon directory.
    pub svg_dir: PathBuf,
    pub svg_watch: String,
    pub svg_dest: PathBuf,

    /// Flat image directory.
    pub img_dir: PathBuf,
    pub img_watch: String,
    pub img_dest: PathBuf,

    /// Server-rendered templates; changes trigger a full reload only.
    pub template_watch: String,
}

impl ThemePaths {
    pub fn from_settings(settings: &Settings) -> Self {
        let theme_root = PathBuf::from(&settings.theme_base).join(&settings.theme_name);

        Self {
            style_entry: theme_root.join("assets/css/base.css"),
            style_watch: "assets/css/**/*.css".to_string(),
            style_dest: theme_root.join("library/css"),

            script_lib_glob: "assets/js/_lib/**/*.js".to_string(),
            script_src_glob: "assets/js/_src/**/*.js".to_string(),
            script_entry: theme_root.join("assets/js/application.js"),
            script_watch: "assets/js/**/*.js".to_string(),
            script_dest: theme_root.join("library/js"),

            svg_dir: theme_root.join("assets/svg"),
            svg_watch: "assets/svg/*.svg".to_string(),
            svg_dest: theme_root.join("library/svg"),

            img_dir: theme_root.join("assets/img"),
            img_watch: "assets/img/*".to_string(),
            img_dest: theme_root.join("library/img"),

            template_watch: "**/*.php".to_string(),

            theme_root,
        }
    }
}
