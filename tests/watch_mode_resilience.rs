use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::tempdir;

use themepipe::cli::CliArgs;

type TestResult = Result<(), Box<dyn Error>>;

/// A theme root with no asset sources at all: every content task fails.
fn broken_theme_settings(root: &Path) -> Result<String, Box<dyn Error>> {
    let theme_base = root.join("wp-content/themes");
    fs::create_dir_all(theme_base.join("base"))?;

    let settings_path = root.join("settings.json");
    let json = serde_json::json!({
        "devUrl": "http://127.0.0.1:9",
        "proxyPort": 0,
        "themeBase": theme_base.to_string_lossy(),
        "themeName": "base",
    });
    fs::write(&settings_path, json.to_string())?;
    Ok(settings_path.to_string_lossy().into_owned())
}

fn args(task: &str, settings: String) -> CliArgs {
    CliArgs {
        task: task.into(),
        settings,
        production: false,
        log_level: None,
    }
}

#[tokio::test]
async fn serve_starts_even_when_the_initial_build_fails() -> TestResult {
    let dir = tempdir()?;
    let settings = broken_theme_settings(dir.path())?;

    // Every content task fails here; the watch loop must come up anyway
    // so the next save can retry.
    let handle = tokio::spawn(themepipe::run(args("serve", settings)));
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(
        !handle.is_finished(),
        "watch mode must survive a failing initial build"
    );
    handle.abort();
    Ok(())
}

#[tokio::test]
async fn one_shot_build_fails_fast() -> TestResult {
    let dir = tempdir()?;
    let settings = broken_theme_settings(dir.path())?;

    let result = themepipe::run(args("build", settings)).await;
    assert!(result.is_err(), "build must propagate content failures");
    Ok(())
}
