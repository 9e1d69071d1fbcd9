use std::fs::File;
use std::io::Write;
use std::process::{Command as Process, Stdio};
use std::sync::Arc;
use vizbind::dispatch::RenderOutcome;
use vizbind::parser::parse_script;
use vizbind::scene::DrawCommand;
use vizbind::surface::RecordingSurface;
use vizbind::{
    ComponentCatalog, Dataset, DatasetId, Introspector, Session, SessionState, SurfaceAdapter, Value, VizError,
};

fn fixture(name: &str) -> String {
    format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn load(name: &str) -> Dataset {
    let file = File::open(fixture(name)).expect("Failed to open fixture");
    Dataset::from_csv(DatasetId::new(name), file).unwrap()
}

fn session_with(name: &str) -> Session {
    let mut session = Session::new(Arc::new(ComponentCatalog::builtin()), Introspector::default());
    session.upload(load(name)).unwrap();
    session
}

/// Helper function to run the vizbind binary with optional stdin
fn run_vizbind(args: &[&str], stdin: Option<&str>) -> Result<Vec<u8>, String> {
    let mut child = Process::new(env!("CARGO_BIN_EXE_vizbind"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    if let Some(mut pipe) = child.stdin.take() {
        if let Some(content) = stdin {
            pipe.write_all(content.as_bytes())
                .map_err(|e| format!("Failed to write to stdin: {}", e))?;
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for process: {}", e))?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

// =============================================================================
// Library scenarios
// =============================================================================

#[test]
fn test_catalog_lists_builtin_components() {
    let catalog = ComponentCatalog::builtin();
    let names = catalog.list();
    assert!(names.len() >= 19, "only {} components", names.len());
    assert!(names.contains(&"BarChart"));
    assert!(names.contains(&"TreeHeatmap"));
}

#[test]
fn test_bar_chart_form() {
    let mut session = session_with("sales.csv");
    let form = session.select_component("BarChart").unwrap();
    assert_eq!(form.labels(), vec!["Width", "Height", "x", "y", "color", "hover"]);
    assert_eq!(form.inputs[3].options(), &["sales", "units"]);
    assert_eq!(form.inputs[4].options()[0], "(none)");
}

#[test]
fn test_tree_heatmap_form() {
    let mut session = session_with("expression.csv");
    let form = session.select_component("TreeHeatmap").unwrap();
    assert_eq!(form.inputs.len(), 9);
    assert_eq!(form.inputs[2].label, "Identifier column");
    assert_eq!(form.inputs[3].label, "Color scale");
    assert_eq!(form.inputs[3].options()[0], "row");
}

#[test]
fn test_component_switch_rebuilds_form() {
    let mut session = session_with("sales.csv");
    assert_eq!(session.select_component("BarChart").unwrap().inputs.len(), 6);
    session.set_value("x", Some(Value::from("region"))).unwrap();

    assert_eq!(session.select_component("TreeHeatmap").unwrap().inputs.len(), 9);
    assert!(session.binder().unwrap().value("x").is_none());

    assert_eq!(session.select_component("BarChart").unwrap().inputs.len(), 6);
    assert!(session.binder().unwrap().value("x").is_none());
}

#[test]
fn test_optional_dimension_options_sorted() {
    let mut session = session_with("columns.csv");
    let form = session.select_component("BarChart").unwrap();
    let color = form.input("color").unwrap();
    assert_eq!(color.options(), &["(none)", "a_b", "c", "id"]);
}

#[test]
fn test_submit_twice_keeps_one_output() {
    let mut session = session_with("sales.csv");
    let mut surface = RecordingSurface::new();
    session.select_component("BarChart").unwrap();
    session.set_value("x", Some(Value::from("region"))).unwrap();
    session.set_value("y", Some(Value::from("sales"))).unwrap();

    session.submit(&mut surface).unwrap();
    session.set_value("color", Some(Value::from("quarter"))).unwrap();
    session.submit(&mut surface).unwrap();

    assert_eq!(surface.output_count(), 1);
    assert_eq!(session.state(), SessionState::Rendered);
    let scene = surface.scenes()[0];
    assert_eq!(scene.x_axis.categories, vec!["North", "South", "East", "West"]);
    assert_eq!(scene.legend_entries(), vec!["Q1", "Q2"]);
}

#[test]
fn test_incomplete_submit_lists_missing() {
    let mut session = session_with("sales.csv");
    let mut surface = RecordingSurface::new();
    session.select_component("BarChart").unwrap();
    match session.submit(&mut surface) {
        Err(VizError::IncompleteForm { missing }) => assert_eq!(missing, vec!["x", "y"]),
        other => panic!("expected IncompleteForm, got {:?}", other),
    }
    assert_eq!(surface.output_count(), 0);
    assert_eq!(session.notifications().errors().count(), 1);
}

#[test]
fn test_required_none_rejected() {
    let mut session = session_with("sales.csv");
    session.select_component("BarChart").unwrap();
    session.set_value("x", Some(Value::from("region"))).unwrap();
    let result = session.set_value("x", Some(Value::from("(none)")));
    assert!(matches!(result, Err(VizError::Validation { .. })));
    assert_eq!(session.binder().unwrap().value("x"), Some(&Value::from("region")));
}

#[test]
fn test_tree_heatmap_renders_matrix() {
    let mut session = session_with("expression.csv");
    let mut surface = RecordingSurface::new();
    session.select_component("TreeHeatmap").unwrap();
    session.set_value("idColumn", Some(Value::from("gene"))).unwrap();
    assert!(session.submit(&mut surface).unwrap().is_rendered());

    let scene = surface.scenes()[0];
    assert_eq!(scene.y_axis.categories.len(), 5);
    assert_eq!(scene.x_axis.categories.len(), 4);
    let cells = scene
        .commands
        .iter()
        .filter(|c| matches!(c, DrawCommand::Rect { .. }))
        .count();
    assert_eq!(cells, 20);
}

#[test]
fn test_stale_render_does_not_clobber() {
    let mut session = session_with("sales.csv");
    let mut surface = RecordingSurface::new();
    session.select_component("BarChart").unwrap();
    session.set_value("x", Some(Value::from("region"))).unwrap();
    session.set_value("y", Some(Value::from("sales"))).unwrap();

    let slow = session.begin_submit(&mut surface).unwrap();
    session.set_value("y", Some(Value::from("units"))).unwrap();
    let fast = session.begin_submit(&mut surface).unwrap();

    let data = Arc::clone(session.dataset().unwrap());
    let fast_result = fast.run(&data);
    session.complete(fast, fast_result, &mut surface).unwrap();
    let slow_result = slow.run(&data);
    let outcome = session.complete(slow, slow_result, &mut surface).unwrap();

    assert!(matches!(outcome, RenderOutcome::Stale { .. }));
    assert_eq!(surface.output_count(), 1);
    assert_eq!(surface.scenes()[0].y_axis.label.as_deref(), Some("units"));
}

#[test]
fn test_script_drives_session() {
    let mut session = session_with("sales.csv");
    let mut surface = RecordingSurface::new();
    let commands =
        parse_script("select(BarChart) | set(x: region) | set(y: sales) | set(width: 640) | set(color: none) | submit()")
            .unwrap();
    session.apply_all(commands, &mut surface).unwrap();
    assert_eq!(surface.scenes()[0].width, 640);
    assert_eq!(surface.owners(), vec!["BarChart"]);
}

#[test]
fn test_script_sets_every_threshold_choice() {
    let mut session = session_with("expression.csv");
    let mut surface = RecordingSurface::new();
    let form = session.select_component("TreeHeatmap").unwrap();
    let choices = form.input("threshold").unwrap().options().to_vec();
    assert!(!choices.iter().any(|c| c == "none"));

    for choice in &choices {
        let script = format!("set(idColumn: gene) | set(threshold: {}) | submit()", choice);
        session.apply_all(parse_script(&script).unwrap(), &mut surface).unwrap();
        assert_eq!(session.binder().unwrap().value("threshold"), Some(&Value::from(choice.as_str())));
    }

    let cleared = session.apply_all(parse_script("set(threshold: none)").unwrap(), &mut surface);
    assert!(matches!(cleared, Err(VizError::Validation { .. })));
}

#[test]
fn test_script_selects_numeric_looking_column() {
    let mut session = Session::new(Arc::new(ComponentCatalog::builtin()), Introspector::default());
    let data = Dataset::new(
        DatasetId::new("years"),
        vec!["region".to_string(), "2019.50".to_string()],
        vec![
            vec!["North".to_string(), "3".to_string()],
            vec!["South".to_string(), "4".to_string()],
        ],
    );
    session.upload(data).unwrap();
    let mut surface = RecordingSurface::new();
    let commands = parse_script("select(BarChart) | set(x: region) | set(y: 2019.50) | submit()").unwrap();
    session.apply_all(commands, &mut surface).unwrap();
    assert_eq!(surface.scenes()[0].y_axis.label.as_deref(), Some("2019.50"));
}

#[test]
fn test_introspection_error_is_notified() {
    let mut session = Session::new(Arc::new(ComponentCatalog::builtin()), Introspector::default());
    let empty = Dataset::new(DatasetId::new("empty"), vec!["a".to_string()], Vec::new());
    let result = session.upload(empty);
    assert!(matches!(result, Err(VizError::Introspection { .. })));
    assert_eq!(session.notifications().errors().count(), 1);
}

// =============================================================================
// CLI
// =============================================================================

#[test]
fn test_cli_list() {
    let stdout = run_vizbind(&["list"], None).unwrap();
    let text = String::from_utf8(stdout).unwrap();
    let names: Vec<&str> = text.lines().collect();
    assert_eq!(names[0], "BarChart");
    assert!(names.len() >= 19);
}

#[test]
fn test_cli_describe() {
    let data = fixture("sales.csv");
    let stdout = run_vizbind(&["describe", "BarChart", "--data", &data], None).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&stdout).unwrap();
    let labels: Vec<&str> = json["inputs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["Width", "Height", "x", "y", "color", "hover"]);
    assert_eq!(json["inputs"][2]["control"], "select");
}

#[test]
fn test_cli_manifest() {
    let data = fixture("sales.csv");
    let stdout = run_vizbind(&["manifest", "--data", &data], None).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&stdout).unwrap();
    assert_eq!(json["rowCount"], 7);
    assert_eq!(json["columns"][3]["name"], "sales");
    assert_eq!(json["columns"][3]["inferredType"], "numeric");
}

#[test]
fn test_cli_run_scene_from_stdin() {
    let csv = std::fs::read_to_string(fixture("sales.csv")).unwrap();
    let stdout = run_vizbind(
        &["run", "select(BarChart) | set(x: region) | set(y: sales) | submit()", "--format", "scene"],
        Some(&csv),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&stdout).unwrap();
    assert_eq!(json["width"], 800);
    assert_eq!(json["x_axis"]["categories"][0], "North");
}

#[test]
fn test_cli_run_png() {
    let data = fixture("sales.csv");
    let stdout = run_vizbind(
        &["run", "select(Sparkline) | set(x: units) | set(y: sales) | submit()", "--data", &data],
        None,
    )
    .unwrap();
    assert!(is_valid_png(&stdout), "Output is not a valid PNG");
}

#[test]
fn test_cli_unknown_component() {
    let data = fixture("sales.csv");
    let result = run_vizbind(&["run", "select(PieChart) | submit()", "--data", &data], None);
    assert!(result.unwrap_err().contains("not found"));
}

#[test]
fn test_cli_parse_error() {
    let data = fixture("sales.csv");
    let result = run_vizbind(&["run", "select(BarChart) | explode()", "--data", &data], None);
    assert!(result.unwrap_err().contains("parse error"));
}

#[test]
fn test_cli_script_without_submit() {
    let data = fixture("sales.csv");
    let result = run_vizbind(&["run", "select(BarChart)", "--data", &data], None);
    assert!(result.unwrap_err().contains("Nothing was rendered"));
}
