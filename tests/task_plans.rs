use std::error::Error;

use themepipe::errors::ThemepipeError;
use themepipe::registry::{standard_registry, TaskAction};

type TestResult = Result<(), Box<dyn Error>>;

fn plan_names(task: &str) -> Vec<String> {
    standard_registry()
        .execution_plan(task)
        .unwrap()
        .iter()
        .map(|d| d.name.clone())
        .collect()
}

#[test]
fn serve_runs_after_all_content_tasks() -> TestResult {
    let names = plan_names("serve");
    assert_eq!(names.len(), 4);
    assert_eq!(names.last().map(String::as_str), Some("serve"));

    let serve = names.len() - 1;
    for task in ["stylesheets", "scripts", "svgs"] {
        let pos = names.iter().position(|n| n == task).expect(task);
        assert!(pos < serve, "{task} must precede serve: {names:?}");
    }
    Ok(())
}

#[test]
fn default_covers_content_and_both_services() -> TestResult {
    let names = plan_names("default");
    for task in [
        "stylesheets",
        "scripts",
        "svgs",
        "watch-images",
        "serve",
        "default",
    ] {
        assert!(names.contains(&task.to_string()), "missing {task}: {names:?}");
    }
    // Image optimization is opt-in, not part of the default run.
    assert!(!names.contains(&"img-opt".to_string()));
    Ok(())
}

#[test]
fn build_is_a_one_shot_plan() -> TestResult {
    let registry = standard_registry();
    let plan = registry.execution_plan("build")?;

    assert!(
        plan.iter().all(|d| !d.action.is_long_lived()),
        "build must not start services"
    );
    assert_eq!(plan.last().map(|d| d.name.as_str()), Some("build"));
    assert!(matches!(
        plan.last().map(|d| d.action),
        Some(TaskAction::Aggregate)
    ));
    Ok(())
}

#[test]
fn images_aliases_the_optimizer() -> TestResult {
    let names = plan_names("images");
    assert_eq!(names, ["img-opt", "images"]);
    Ok(())
}

#[test]
fn unknown_task_is_a_structured_error() -> TestResult {
    let err = standard_registry().execution_plan("deploy").unwrap_err();
    assert!(matches!(err, ThemepipeError::UnknownTask(name) if name == "deploy"));
    Ok(())
}
