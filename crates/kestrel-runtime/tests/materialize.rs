//! Materialization of stored traces: elements, printing, redefinition

mod common;

use common::{App, MAIN};
use kestrel_config::RuntimeConfig;
use kestrel_runtime::backtrace::{
    fill_in_stack_trace, get_stack_trace_elements, get_top_method_and_bci, print_stack_element,
    stack_trace, stack_trace_string, FrameStatus, StackTraceElement, TraceError,
};
use kestrel_runtime::oops::MethodSpec;
use kestrel_runtime::thread::ManagedThread;
use kestrel_runtime::Throwable;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn thrown(app: &App, message: Option<&str>) -> Throwable {
    let mut error = Throwable::new(&app.error, message);
    fill_in_stack_trace(&app.universe, &mut error, &app.throwing_thread(), None).unwrap();
    error
}

/// `Worker.work -> Main.run -> Main.parse`, exception on top
fn thrown_through_worker(app: &App) -> Throwable {
    let mut thread = ManagedThread::new("worker-1");
    thread
        .enter()
        .interpreted(&app.work(), 2)
        .interpreted(&app.method("run"), 6)
        .interpreted(&app.method("parse"), 3);
    app.push_exception_frames(&mut thread);

    let mut error = Throwable::new(&app.error, None);
    fill_in_stack_trace(&app.universe, &mut error, &thread, None).unwrap();
    error
}

// ============================================================================
// Elements
// ============================================================================

#[test]
fn test_elements_resolve_lines_and_files() {
    let app = App::new();
    let error = thrown(&app, None);

    let elements = stack_trace(&error);
    let rendered: Vec<String> = elements.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "app.Main.parse(Main.kst:31)",
            "app.Main.run(Main.kst:21)",
            "app.Main.main(Main.kst:7)",
        ]
    );
    assert!(elements.iter().all(|e| e.status == FrameStatus::Live));
}

#[test]
fn test_materialization_is_repeatable() {
    let app = App::new();
    let error = thrown_through_worker(&app);

    assert_eq!(stack_trace(&error), stack_trace(&error));
}

#[test]
fn test_element_json() {
    let app = App::new();
    let error = thrown(&app, None);
    let top = stack_trace(&error).remove(0);

    insta::assert_json_snapshot!(top, @r###"
    {
      "declaring_class": "app.Main",
      "class_loader_name": "app",
      "module_name": null,
      "module_version": null,
      "method_name": "parse",
      "file_name": "Main.kst",
      "line_number": 31,
      "status": "live"
    }
    "###);
}

#[test]
fn test_element_json_string_round_trips_through_serde_json() {
    let app = App::new();
    let error = thrown_through_worker(&app);
    let bottom = stack_trace(&error).pop().unwrap();

    let value: serde_json::Value = serde_json::from_str(&bottom.to_json_string().unwrap()).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "declaring_class": "app.Worker",
            "class_loader_name": null,
            "module_name": "app.jobs",
            "module_version": "1.4",
            "method_name": "work",
            "file_name": "Worker.kst",
            "line_number": 51,
            "status": "live"
        })
    );
}

#[test]
fn test_get_stack_trace_elements_fills_caller_buffer() {
    let app = App::new();
    let error = thrown(&app, None);

    let mut elements = vec![StackTraceElement::default(); error.depth()];
    get_stack_trace_elements(&error, &mut elements).unwrap();

    assert_eq!(elements, stack_trace(&error));
}

#[test]
fn test_get_stack_trace_elements_rejects_wrong_length() {
    let app = App::new();
    let error = thrown(&app, None);

    let mut elements = vec![StackTraceElement::default(); 2];
    assert_eq!(
        get_stack_trace_elements(&error, &mut elements),
        Err(TraceError::DepthMismatch {
            depth: 3,
            length: 2
        })
    );
}

#[test]
fn test_get_stack_trace_elements_without_trace() {
    let app = App::new();
    let error = Throwable::new(&app.error, None);

    assert_eq!(
        get_stack_trace_elements(&error, &mut []),
        Err(TraceError::MissingBacktrace)
    );
    assert!(stack_trace(&error).is_empty());
}

// ============================================================================
// Redefinition
// ============================================================================

#[test]
fn test_redefined_frame_goes_stale_others_unaffected() {
    let app = App::new();
    let error = thrown_through_worker(&app);

    app.redefine_parse();
    app.main.purge_previous_versions();

    let elements = stack_trace(&error);
    let statuses: Vec<_> = elements
        .iter()
        .map(|e| (e.method_name.to_string(), e.status, e.line_number))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("parse".to_string(), FrameStatus::Redefined, -1),
            ("run".to_string(), FrameStatus::Redefined, -1),
            ("work".to_string(), FrameStatus::Live, 51),
        ]
    );
    assert_eq!(elements[0].to_string(), "app.Main.parse(Redefined)");
    assert_eq!(elements[0].file_name, None);
}

#[test]
fn test_retained_previous_version_resolves_without_file() {
    let app = App::new();
    let error = thrown(&app, None);

    app.redefine_parse();

    let top = stack_trace(&error).remove(0);
    assert_eq!(top.status, FrameStatus::Live);
    assert_eq!(top.line_number, 31);
    assert_eq!(top.file_name, None);
    assert_eq!(top.to_string(), "app.Main.parse(Unknown Source)");
}

#[test]
fn test_top_method_and_bci() {
    let app = App::new();
    let error = thrown(&app, None);

    let (method, bci) = get_top_method_and_bci(&error).unwrap();
    assert!(Arc::ptr_eq(&method, &app.method("parse")));
    assert_eq!(bci, 3);

    app.redefine_parse();
    app.main.purge_previous_versions();
    assert!(get_top_method_and_bci(&error).is_none());
}

#[test]
fn test_trace_pins_unloaded_class() {
    let app = App::new();
    let error = thrown_through_worker(&app);

    app.universe.classes().unload(MAIN).unwrap();
    assert!(app.universe.classes().lookup(MAIN).is_none());

    let top = stack_trace(&error).remove(0);
    assert_eq!(top.declaring_class.as_str(), "app.Main");
    assert_eq!(top.status, FrameStatus::Live);
}

#[test]
fn test_saturated_version_never_matches() {
    let app = App::new();
    for _ in 0..u16::MAX {
        app.main.redefine(
            &[MethodSpec::new("main").line(0, 5)],
            Some("Main.kst"),
            app.universe.symbols(),
        );
        app.main.purge_previous_versions();
    }
    assert_eq!(app.main.current_generation(), u32::from(u16::MAX));

    let mut thread = ManagedThread::new("main");
    thread.enter().interpreted(&app.method("main"), 0);
    let mut error = Throwable::new(&app.error, None);
    fill_in_stack_trace(&app.universe, &mut error, &thread, None).unwrap();

    assert_eq!(stack_trace(&error)[0].status, FrameStatus::Redefined);
}

// ============================================================================
// Printing
// ============================================================================

#[test]
fn test_print_stack_trace() {
    let app = App::new();
    let error = thrown(&app, Some("boom"));

    assert_eq!(
        stack_trace_string(&error),
        "app.AppError: boom\n\
         \tat app.Main.parse(Main.kst:31)\n\
         \tat app.Main.run(Main.kst:21)\n\
         \tat app.Main.main(Main.kst:7)\n"
    );
}

#[test]
fn test_print_cause_chain() {
    let app = App::new();
    let cause = thrown_through_worker(&app);
    let mut error = Throwable::new(&app.error, Some("request failed")).with_cause(cause);
    let mut thread = ManagedThread::new("main");
    thread.enter().interpreted(&app.method("main"), 4);
    fill_in_stack_trace(&app.universe, &mut error, &thread, None).unwrap();

    assert_eq!(
        stack_trace_string(&error),
        "app.AppError: request failed\n\
         \tat app.Main.main(Main.kst:6)\n\
         Caused by: app.AppError\n\
         \tat app.Main.parse(Main.kst:31)\n\
         \tat app.Main.run(Main.kst:21)\n\
         \tat app.Worker.work(app.jobs@1.4/Worker.kst:51)\n"
    );
}

#[test]
fn test_print_without_trace() {
    let mut config = RuntimeConfig::for_testing();
    config.backtrace.preallocated_errors = 0;
    let app = App::with_config(config);
    let error = app
        .universe
        .gen_out_of_memory_error(&ManagedThread::new("main"), Some("heap space"));

    assert_eq!(
        stack_trace_string(&error),
        "kestrel.lang.OutOfMemoryError: heap space\n\t<<no stack trace available>>\n"
    );
}

#[test]
fn test_print_stops_at_cause_without_trace() {
    let app = App::new();
    let cause = Throwable::new(&app.error, Some("lost"));
    let mut error = Throwable::new(&app.error, None).with_cause(cause);
    let mut thread = ManagedThread::new("main");
    thread.enter().interpreted(&app.method("main"), 0);
    fill_in_stack_trace(&app.universe, &mut error, &thread, None).unwrap();

    assert_eq!(
        stack_trace_string(&error),
        "app.AppError\n\
         \tat app.Main.main(Main.kst:5)\n\
         Caused by: app.AppError: lost\n\
         \t<<no stack trace available>>\n"
    );
}

#[test]
fn test_print_stack_element() {
    let app = App::new();
    let mut out = Vec::new();
    print_stack_element(&mut out, &app.method("hash"), 0).unwrap();
    print_stack_element(&mut out, &app.work(), 0).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "\tat app.Main.hash(Native Method)\n\
         \tat app.Worker.work(app.jobs@1.4/Worker.kst:50)\n"
    );
}
