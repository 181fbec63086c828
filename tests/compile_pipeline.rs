//! End-to-end pipeline tests through the public API, with the type table
//! loaded from disk the way the command line does it.

use fxc::oracle::StaticOracle;
use fxc::{Compiler, CompilerOptions, DiagnosticKind, DocumentInput};
use std::io::Write;

const TYPE_TABLE: &str = r#"{
    "types": [
        {
            "qualified_name": "demo.widgets.Pane",
            "simple_name": "Pane",
            "default_property": "children",
            "properties": [
                {
                    "name": "children",
                    "value_type": {
                        "kind": "sequence",
                        "element": {"kind": "object", "type_name": "demo.widgets.Node"}
                    },
                    "read_only": true
                },
                {"name": "title", "value_type": {"kind": "string"}}
            ]
        },
        {
            "qualified_name": "demo.widgets.Label",
            "simple_name": "Label",
            "default_property": "text",
            "properties": [
                {"name": "text", "value_type": {"kind": "string"}},
                {"name": "width", "value_type": {"kind": "float"}}
            ],
            "handlers": [
                {"name": "onAction", "event_type": "demo.events.ActionEvent"}
            ]
        }
    ],
    "controllers": [
        {
            "qualified_name": "demo.MainController",
            "fields": [{"name": "lbl", "type_name": "demo.widgets.Label"}],
            "methods": [
                {"name": "handleAction", "event_type": "demo.events.ActionEvent"}
            ],
            "has_initialize": true
        }
    ]
}"#;

fn oracle_from_disk() -> StaticOracle {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(TYPE_TABLE.as_bytes()).expect("write table");
    StaticOracle::load(file.path()).expect("load table")
}

fn document(file: &str, body: &str) -> DocumentInput {
    DocumentInput {
        file: file.to_string(),
        source: format!("<?import demo.widgets.*?>\n{}", body),
    }
}

#[test]
fn compiles_labeled_pane_with_id_map() {
    let oracle = oracle_from_disk();
    let compiler = Compiler::new(&oracle);

    let output = compiler.compile_document(&document(
        "main_view.fxml",
        r#"<Pane><Label fx:id="lbl" text="Hello"/></Pane>"#,
    ));

    assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
    let unit = output.unit.expect("unit emitted");
    assert_eq!(unit.id_map, vec![("lbl".to_string(), "lbl".to_string())]);
    assert_eq!(unit.root_type, "demo.widgets.Pane");
    assert!(unit.source.contains("lbl.set_text(\"Hello\");"));
}

#[test]
fn controller_wiring_and_hook_order() {
    let oracle = oracle_from_disk();
    let compiler = Compiler::new(&oracle);

    let output = compiler.compile_document(&document(
        "main_view.fxml",
        r##"<Pane fx:controller="demo.MainController">
             <Label fx:id="lbl" onAction="#handleAction"/>
           </Pane>"##,
    ));

    assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
    let source = output.unit.expect("unit emitted").source;
    let wiring = source.find("lbl.set_on_action(").expect("handler wired");
    let injection = source.find("controller.set_lbl(").expect("field injected");
    let hook = source.find("controller.initialize();").expect("hook invoked");
    assert!(wiring < hook && injection < hook);
}

#[test]
fn batch_isolates_failing_document() {
    let oracle = oracle_from_disk();
    let compiler = Compiler::new(&oracle);

    let batch = compiler.compile_batch(&[
        document("bad.fxml", r#"<Nope/>"#),
        document("good.fxml", r#"<Label text="fine"/>"#),
    ]);

    assert!(batch.outputs[0].unit.is_none());
    assert_eq!(
        batch.outputs[0]
            .diagnostics
            .of_kind(DiagnosticKind::UnknownType)
            .len(),
        1
    );
    assert!(batch.outputs[1].unit.is_some());
}

#[test]
fn deny_warnings_suppresses_unit() {
    let oracle = oracle_from_disk();
    let compiler = Compiler::with_options(
        &oracle,
        CompilerOptions {
            deny_warnings: true,
            ..CompilerOptions::default()
        },
    );

    // The id matches a controller field of a different type, which is a
    // warning: the injection is skipped but compilation succeeds.
    let output = compiler.compile_document(&document(
        "main_view.fxml",
        r#"<Pane fx:controller="demo.MainController">
             <Pane fx:id="lbl"/>
           </Pane>"#,
    ));

    assert!(!output.diagnostics.has_errors());
    assert_eq!(output.diagnostics.warning_count(), 1);
    assert!(output.unit.is_none());
}
