use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const GUEST_INFO: &str = "RETURN = r'''\nguests:\n  type: list\n  elements: dict\n  sample: [{moid: vm-1}]\n'''\n";

/// Creates a minimal local collection with one documented module.
fn create_collection(dir: &Path) {
    let modules = dir.join("plugins").join("modules");
    fs::create_dir_all(&modules).expect("Creating modules dir failed");
    fs::write(dir.join("galaxy.yml"), "namespace: vmware\nname: vmware\n").unwrap();
    fs::write(modules.join("guest_info.py"), GUEST_INFO).unwrap();
}

fn query_gen(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("query-gen").expect("Binary exists");
    cmd.current_dir(workdir)
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("GITHUB_TOKEN");
    cmd
}

#[test]
fn generate_cli_happy_flow_writes_query_file_and_summary() {
    let collection = tempdir().unwrap();
    create_collection(collection.path());
    let out = tempdir().unwrap();
    let output = out.path().join("event_query.yml");

    query_gen(out.path())
        .arg("generate")
        .arg("--source")
        .arg(collection.path())
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"queries_generated\": 1")
                .and(predicate::str::contains("\"analyzer\": \"rule_based\""))
                .and(predicate::str::contains("\"name\": \"vmware.vmware\"")),
        );

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("---\n"));
    assert!(text.contains(".guests[] | {moid: .moid} // empty"));
    assert!(out.path().join("event_query.review.txt").exists());
}

#[test]
fn generate_cli_reads_config_file_and_honours_check_mode() {
    let collection = tempdir().unwrap();
    create_collection(collection.path());
    let out = tempdir().unwrap();
    let output = out.path().join("event_query.yml");
    let config = out.path().join("query-gen.yml");
    fs::write(
        &config,
        format!(
            "collection_source: {}\noutput_path: {}\nextension_version: 2.0.0\n",
            collection.path().display(),
            output.display()
        ),
    )
    .unwrap();

    query_gen(out.path())
        .arg("generate")
        .arg("--config")
        .arg(&config)
        .arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"changed\": false"));
    assert!(!output.exists());
}

#[test]
fn generate_cli_fails_on_invalid_source() {
    let out = tempdir().unwrap();
    query_gen(out.path())
        .arg("generate")
        .arg("--source")
        .arg("https://gitlab.com/foo/bar")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid collection source"));
    assert!(!out.path().join("event_query.yml").exists());
}

#[test]
fn generate_cli_requires_a_source() {
    let out = tempdir().unwrap();
    query_gen(out.path())
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No collection source"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use query_gen::cli::{run, Cli, Commands, GenerateArgs};

    let cli = Cli {
        command: Commands::Generate(GenerateArgs {
            source: Some("/definitely/not/a/collection".into()),
            ..Default::default()
        }),
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
