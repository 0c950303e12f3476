#![cfg(unix)]

mod common;

use simdeck::{
    Error,
    betting::BettingStrategy,
    codec::RangeChart,
    config::Config,
    engine::{Engine, EngineRequest, PlayerSpec, ResultDocument, process::ProcessEngine},
};
use std::path::Path;
use std::time::{Duration, Instant};

fn shell_engine(script: &str, timeout_seconds: u64) -> Config {
    let mut cfg = Config::default();
    cfg.engine.program = "sh".into();
    cfg.engine.args = vec!["-c".into(), script.into()];
    cfg.engine.timeout_seconds = timeout_seconds;
    cfg
}

fn request(dir: &Path) -> EngineRequest {
    EngineRequest {
        job_id: "job-under-test".into(),
        player: PlayerSpec {
            name: "Alice".into(),
            bankroll: 1000,
        },
        num_hands: 10,
        casino: serde_json::json!({"deck_count": 6}),
        playing_strategy: RangeChart::default(),
        betting_strategy: BettingStrategy::Flat { unit: 10.0 },
        results_path: dir.join("results.json"),
    }
}

#[test]
fn progress_and_result_round_trip_through_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = shell_engine(
        r#"cat > "$REQUEST_COPY"
echo PROGRESS:10
echo "shuffling shoe"
echo "PROGRESS: 55"
echo PROGRESS:250
printf '%s' "$DOC" > "$SIMDECK_RESULTS_PATH"
echo PROGRESS:100"#,
        30,
    );
    let copy = dir.path().join("request_copy.json");
    cfg.engine
        .env
        .insert("REQUEST_COPY".into(), copy.display().to_string());
    cfg.engine
        .env
        .insert("DOC".into(), common::result_doc("Alice", 42.0));

    let engine = ProcessEngine::new(&cfg);
    let req = request(dir.path());
    let mut seen = Vec::new();
    let exit = engine.run(&req, &mut |p| seen.push(p)).unwrap();

    assert!(exit.success, "{}", exit.diagnostics);
    assert_eq!(exit.code, Some(0));
    assert_eq!(seen, vec![10, 55, 100]);

    let (_, doc) = ResultDocument::read(&req.results_path).unwrap();
    assert_eq!(doc.players["Alice"].net_gain_loss, 42.0);

    let sent: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&copy).unwrap()).unwrap();
    assert_eq!(sent["job_id"], "job-under-test");
    assert_eq!(sent["player"]["name"], "Alice");
    assert_eq!(sent["betting_strategy"]["type"], "flat");
}

#[test]
fn nonzero_exit_reports_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = shell_engine(
        "cat >/dev/null; echo PROGRESS:5; echo 'unknown casino rule' >&2; exit 4",
        30,
    );
    let mut seen = Vec::new();
    let exit = ProcessEngine::new(&cfg)
        .run(&request(dir.path()), &mut |p| seen.push(p))
        .unwrap();
    assert!(!exit.success);
    assert_eq!(exit.code, Some(4));
    assert_eq!(exit.diagnostics, "unknown casino rule");
    assert_eq!(seen, vec![5]);
}

#[test]
fn engine_that_ignores_stdin_still_runs() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = shell_engine("echo PROGRESS:1", 30);
    let exit = ProcessEngine::new(&cfg)
        .run(&request(dir.path()), &mut |_| {})
        .unwrap();
    assert!(exit.success);
}

#[test]
fn hung_engine_is_killed_at_the_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = shell_engine("cat >/dev/null; echo PROGRESS:3; exec sleep 30", 1);
    let started = Instant::now();
    let mut seen = Vec::new();
    let err = ProcessEngine::new(&cfg)
        .run(&request(dir.path()), &mut |p| seen.push(p))
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(
        matches!(&err, Error::EngineFailure(msg) if msg.contains("timed out")),
        "{err:?}"
    );
    assert_eq!(seen, vec![3]);
}

#[test]
fn missing_program_fails_to_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    cfg.engine.program = dir.path().join("no-such-engine").display().to_string();
    let engine = ProcessEngine::new(&cfg);
    assert!(!engine.doctor().ok);
    assert!(matches!(
        engine.run(&request(dir.path()), &mut |_| {}),
        Err(Error::EngineFailure(_))
    ));
}

#[test]
fn non_utf8_output_does_not_stop_the_reader() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = shell_engine(
        r#"cat >/dev/null
printf 'dealer: \377\n'
i=0
while [ $i -lt 2000 ]; do echo "filler line $i"; i=$((i+1)); done
echo PROGRESS:50
printf '%s' "$DOC" > "$SIMDECK_RESULTS_PATH"
echo PROGRESS:90"#,
        30,
    );
    cfg.engine
        .env
        .insert("DOC".into(), common::result_doc("Alice", 1.0));

    let req = request(dir.path());
    let mut seen = Vec::new();
    let exit = ProcessEngine::new(&cfg)
        .run(&req, &mut |p| seen.push(p))
        .unwrap();
    assert!(exit.success, "code {:?}: {}", exit.code, exit.diagnostics);
    assert_eq!(seen, vec![50, 90]);
    assert!(req.results_path.exists());
}

#[test]
fn large_request_with_chatty_engine_does_not_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    // Fills the stdout pipe before it reads a request bigger than the stdin pipe.
    let cfg = shell_engine(
        r#"i=0
while [ $i -lt 20000 ]; do echo "warming shoe $i"; i=$((i+1)); done
wc -c >/dev/null
echo PROGRESS:10"#,
        30,
    );
    let mut req = request(dir.path());
    req.casino = serde_json::json!({"deck_count": 6, "notes": "x".repeat(512 * 1024)});

    let started = Instant::now();
    let mut seen = Vec::new();
    let exit = ProcessEngine::new(&cfg)
        .run(&req, &mut |p| seen.push(p))
        .unwrap();
    assert!(exit.success, "{}", exit.diagnostics);
    assert_eq!(seen, vec![10]);
    assert!(started.elapsed() < Duration::from_secs(30));
}
