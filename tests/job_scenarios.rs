mod common;
use crate::common::builders::RunnerConfigBuilder;
use crate::common::init_tracing;
use crate::common::scripted_backend::{exited, ScriptedBackend};
use crate::common::stub_tool::{StubBehaviour, StubTool};
use crate::common::{expect_failure, expect_success, with_timeout};

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hercules_runner::fs::mock::MockFileSystem;

use hercules_runner::{
    FailureKind, JobRequest, JobResult, JobRunner, Module, ScanPolicy, Selection,
};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn min_preset_on_print_succeeds() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::SiblingOutput)?;
    let runner = JobRunner::new(stub.config());

    let result = with_timeout(runner.submit(JobRequest::new("print(1)", Selection::preset("min")))).await;

    let (text, original, transformed) = expect_success(&result);
    assert_eq!(original, 8);
    assert!(transformed > 0);
    assert_eq!(transformed, text.len());
    assert!(text.contains("print(1)"));
    assert!(text.contains("[--min]"), "native flag should be tried first: {text}");
    assert_eq!(result.attempts(), 1);
    assert!(stub.leftover_files().is_empty(), "{:?}", stub.leftover_files());
    Ok(())
}

#[tokio::test]
async fn empty_source_is_a_tool_failure_not_a_workspace_error() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::SiblingOutput)?;
    let runner = JobRunner::new(stub.config());

    let result = with_timeout(runner.submit(JobRequest::new("", Selection::preset("min")))).await;

    let (kind, message) = expect_failure(&result);
    assert_eq!(kind, FailureKind::ToolFailure);
    assert!(message.contains("input file is empty"), "{message}");
    // --min, module expansion, bare.
    assert_eq!(result.attempts(), 3);
    assert!(stub.leftover_files().is_empty());
    Ok(())
}

#[tokio::test]
async fn unsupported_native_flag_falls_back_to_module_flags() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::FailOnFlag("--mid".to_string()))?;
    let runner = JobRunner::new(stub.config());

    let result =
        with_timeout(runner.submit(JobRequest::new("local a = 1", Selection::preset("mid")))).await;

    let (text, _, _) = expect_success(&result);
    assert_eq!(result.attempts(), 2);
    assert!(
        text.contains("[--varrenaming --garbagecode --compressor --wrapaliases]"),
        "{text}"
    );
    assert!(stub.leftover_files().is_empty());
    Ok(())
}

#[tokio::test]
async fn module_selection_emits_flags_in_catalog_order() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::SiblingOutput)?;
    let runner = JobRunner::new(stub.config());

    let selection = Selection::modules([Module::Vm, Module::VarRenaming]);
    let result = with_timeout(runner.submit(JobRequest::new("return 42", selection))).await;

    let (text, _, _) = expect_success(&result);
    assert!(text.contains("[--varrenaming --vm]"), "{text}");
    Ok(())
}

#[tokio::test]
async fn output_in_tool_directory_is_found_and_removed() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::CwdOutput)?;
    let runner = JobRunner::new(stub.config());

    let request = JobRequest::new("print('cwd')", Selection::preset("safe")).with_diagnostics(true);
    let result = with_timeout(runner.submit(request)).await;

    expect_success(&result);
    let diagnostics = result.diagnostics().unwrap_or_default();
    assert!(diagnostics.contains("IdentityName"), "{diagnostics}");
    assert!(stub.leftover_files().is_empty(), "{:?}", stub.leftover_files());
    Ok(())
}

#[tokio::test]
async fn tool_errors_are_stripped_of_escape_sequences() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::AnsiError)?;
    let runner = JobRunner::new(stub.config());

    let request = JobRequest::new("print(1)", Selection::preset("safe")).with_diagnostics(true);
    let result = with_timeout(runner.submit(request)).await;

    let (kind, message) = expect_failure(&result);
    assert_eq!(kind, FailureKind::ToolFailure);
    assert_eq!(message, "error: cannot parse input");
    let diagnostics = result.diagnostics().unwrap_or_default();
    assert!(!diagnostics.contains('\u{1b}'));
    assert!(diagnostics.contains("cannot parse input"));
    assert!(stub.leftover_files().is_empty());
    Ok(())
}

#[tokio::test]
async fn error_message_is_bounded() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::AnsiError)?;
    let runner = JobRunner::new(stub.config_builder().max_error_chars(10).build());

    let result = with_timeout(runner.submit(JobRequest::new("x", Selection::preset("safe")))).await;

    let (_, message) = expect_failure(&result);
    assert!(message.chars().count() <= 10, "{message}");
    Ok(())
}

#[tokio::test]
async fn oversized_source_is_rejected_before_allocation() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::SiblingOutput)?;
    let runner = JobRunner::new(stub.config_builder().max_source_bytes(4).build());

    let result = with_timeout(runner.submit(JobRequest::new("print(1)", Selection::preset("min")))).await;

    match &result {
        JobResult::Failure {
            kind,
            identity,
            attempts,
            ..
        } => {
            assert_eq!(*kind, FailureKind::SourceTooLarge);
            assert!(identity.is_none());
            assert_eq!(*attempts, 0);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(std::fs::read_dir(stub.upload_dir())?.next().is_none());
    Ok(())
}

#[tokio::test]
async fn unwritable_upload_dir_is_a_workspace_failure() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::SiblingOutput)?;
    // A directory below a regular file can never be created.
    let bad_upload = stub.script().join("uploads");
    let runner = JobRunner::new(stub.config_builder().upload_dir(bad_upload).build());

    let result = with_timeout(runner.submit(JobRequest::new("print(1)", Selection::preset("min")))).await;

    let (kind, message) = expect_failure(&result);
    assert_eq!(kind, FailureKind::Workspace);
    assert!(message.contains("upload dir"), "{message}");
    Ok(())
}

#[tokio::test]
async fn identity_agnostic_output_needs_unanchored_policy() -> TestResult {
    init_tracing();

    // Anchored scanning never attributes a foreign-looking name.
    let stub = StubTool::new(StubBehaviour::AgnosticOutput)?;
    let runner = JobRunner::new(stub.config_builder().bare_fallback(false).build());
    let result = with_timeout(runner.submit(JobRequest::new("print(1)", Selection::preset("safe")))).await;
    assert_eq!(expect_failure(&result).0, FailureKind::ToolFailure);
    assert!(stub.tool_dir().join("script_obfuscated.lua").is_file());

    // The delay keeps the output's mtime clearly after the job start.
    let stub = StubTool::with_delay(StubBehaviour::AgnosticOutput, Duration::from_millis(100))?;
    let runner = JobRunner::new(
        stub.config_builder()
            .scan(ScanPolicy::AllowUnanchored)
            .build(),
    );
    let result = with_timeout(runner.submit(JobRequest::new("print(1)", Selection::preset("safe")))).await;
    match &result {
        JobResult::Success {
            ambiguous,
            transformed_text,
            ..
        } => {
            assert!(*ambiguous);
            assert!(transformed_text.contains("print(1)"));
        }
        other => panic!("expected ambiguous success, got {other:?}"),
    }
    assert!(stub.leftover_files().is_empty(), "{:?}", stub.leftover_files());
    Ok(())
}

#[tokio::test]
async fn missing_launcher_falls_through_to_next_launcher() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::SiblingOutput)?;
    let runner = JobRunner::new(
        stub.config_builder()
            .launchers(&["no-such-launcher-4c1e", "sh"])
            .build(),
    );

    let result = with_timeout(runner.submit(JobRequest::new("print(2)", Selection::preset("min")))).await;

    expect_success(&result);
    assert_eq!(result.attempts(), 2);
    Ok(())
}

#[tokio::test]
async fn success_serialises_to_json() -> TestResult {
    init_tracing();
    let stub = StubTool::new(StubBehaviour::SiblingOutput)?;
    let runner = JobRunner::new(stub.config());

    let result = with_timeout(runner.submit(JobRequest::new("print(1)", Selection::preset("min")))).await;
    let json = serde_json::to_value(&result)?;

    assert_eq!(json["status"], "success");
    assert_eq!(json["original_size"], 8);
    assert_eq!(json["ambiguous"], false);
    assert!(json["elapsed_secs"].as_f64().is_some());
    assert!(json["diagnostics"].is_null());
    Ok(())
}

#[tokio::test]
async fn non_utf8_output_is_replaced_and_reported() -> TestResult {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    fs.add_dir("/tool");
    let writer_fs = fs.clone();
    let backend = Arc::new(ScriptedBackend::new(move |variant, _cwd| {
        let input = Path::new(&variant.tokens()[2]);
        let stem = input.file_stem().unwrap().to_string_lossy();
        let sibling = input.with_file_name(format!("{stem}_obfuscated.lua"));
        writer_fs.add_file(&sibling, b"print(\"\xff\")".to_vec());
        Ok(exited(0))
    }));
    let config = RunnerConfigBuilder::new()
        .working_dir("/tool")
        .upload_dir("/uploads")
        .search_roots(vec![])
        .build();
    let runner = JobRunner::with_backends(config, fs, backend);

    let request = JobRequest::new("print(1)", Selection::preset("safe")).with_diagnostics(true);
    let result = with_timeout(runner.submit(request)).await;

    let (text, _, transformed) = expect_success(&result);
    assert_eq!(text, "print(\"\u{FFFD}\")");
    assert_eq!(transformed, text.len());
    let diagnostics = result.diagnostics().unwrap_or_default();
    assert!(diagnostics.contains("not valid UTF-8"), "{diagnostics}");
    Ok(())
}
