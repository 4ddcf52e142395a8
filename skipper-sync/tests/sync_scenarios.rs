//! End-to-end scenarios over an on-disk repository and the in-memory server.

use std::fs;
use std::path::Path;

use skipper_core::{Context, LinkType, PipelineInfo};
use skipper_remote::fakes::{FakeServer, QueueStep, FAKE_ORIGIN};
use skipper_remote::{BuildInfo, BuildLocation, BuildStatus, Outcome};
use skipper_sync::{
    build::describe,
    drift::job_status,
    fingerprint::{embed_hash, extract_hash, fingerprint},
    pipeline::{extract_pipeline, merge_pipeline},
    BuildOrchestrator, BuildOutcome, Document, HashScope, JobRenderer, JobStatus, LogPolicy,
    ManualScheduler, NeverReplace, PollPolicy, PushOutcome, PushPolicy, PushReconciler,
};
use tempfile::TempDir;

const JOB_WITHOUT_PIPELINE: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<project>
  <actions/>
  <description/>
  <keepDependencies>false</keepDependencies>
  <properties>
    <jenkins.plugins.slack.SlackNotifier_-SlackJobProperty plugin="slack@1.8">
      <teamDomain/>
      <token/>
      <room/>
      <startNotification>false</startNotification>
      <notifySuccess>false</notifySuccess>
      <notifyFailure>false</notifyFailure>
      <customMessage/>
    </jenkins.plugins.slack.SlackNotifier_-SlackJobProperty>
    <hudson.plugins.throttleconcurrents.ThrottleJobProperty plugin="throttle-concurrents@1.8.4">
      <maxConcurrentPerNode>0</maxConcurrentPerNode>
      <maxConcurrentTotal>0</maxConcurrentTotal>
      <throttleEnabled>false</throttleEnabled>
      <throttleOption>project</throttleOption>
    </hudson.plugins.throttleconcurrents.ThrottleJobProperty>
  </properties>
  <scm class="hudson.scm.NullSCM"/>
  <canRoam>true</canRoam>
  <disabled>false</disabled>
  <blockBuildWhenDownstreamBuilding>false</blockBuildWhenDownstreamBuilding>
  <blockBuildWhenUpstreamBuilding>false</blockBuildWhenUpstreamBuilding>
  <triggers>
    </triggers>
  <concurrentBuild>false</concurrentBuild>
  <builders/>
  <publishers/>
  <buildWrappers/>
</project>"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, contents).expect("write");
}

fn repository() -> TempDir {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();
    write(root, "skipper.yaml", "server:\n  location: http://ci.example.com/\n");
    write(
        root,
        "jobs.yaml",
        "basic:\n  template: basic.txt\n\
         deploy:\n  template: basic.txt\n  context:\n    description: Deploys the site\n",
    );
    write(
        root,
        "pipelines.yaml",
        "deploy:\n  parents: [basic]\n  link_type: UNSTABLE\n",
    );
    write(
        root,
        "templates/basic.txt",
        &JOB_WITHOUT_PIPELINE.replace(
            "<description/>",
            "<description>{{ description | default(value='') }}</description>",
        ),
    );
    tmp
}

#[test]
fn rendered_job_without_pipeline_extracts_nothing() {
    init_logging();
    let repo = repository();
    let renderer = JobRenderer::from_root(repo.path(), Context::new()).expect("renderer");
    let doc = renderer.render("basic").expect("render");

    let (info, pruned) = extract_pipeline(&doc).expect("extract");
    assert!(info.is_none());
    assert_eq!(pruned, doc);
    assert_eq!(pruned, Document::parse(JOB_WITHOUT_PIPELINE).expect("parse"));
}

#[test]
fn merged_pipeline_extracts_to_original() {
    let doc = Document::parse(JOB_WITHOUT_PIPELINE).expect("parse");
    let merged = merge_pipeline(&doc, &["stupeflix".to_string()], LinkType::Success).expect("merge");

    let xml = merged.to_xml();
    assert!(xml.contains("<upstreamProjects>stupeflix</upstreamProjects>"));
    assert!(xml.contains("<color>BLUE</color>"));

    let reparsed = Document::parse(&xml).expect("reparse");
    let (info, pruned) = extract_pipeline(&reparsed).expect("extract");
    assert_eq!(
        info,
        Some(PipelineInfo::new(vec!["stupeflix".to_string()], LinkType::Success))
    );
    assert_eq!(pruned, doc);
}

#[test]
fn serialization_is_byte_stable() {
    let doc = Document::parse(JOB_WITHOUT_PIPELINE).expect("parse");
    let hashed = embed_hash(&doc, &fingerprint(&doc, HashScope::Full));
    let once = hashed.to_xml();
    let twice = Document::parse(&once).expect("reparse").to_xml();
    assert_eq!(once, twice);
    assert_eq!(extract_hash(&Document::parse(&twice).expect("parse")).1, doc);
}

#[test]
fn push_then_status_is_current() {
    init_logging();
    let repo = repository();
    let renderer = JobRenderer::from_root(repo.path(), Context::new()).expect("renderer");
    let server = FakeServer::new();
    let jobs = renderer.jobs().select(&[]).expect("select");

    let report = PushReconciler::new(&server, &renderer, PushPolicy::default())
        .push(&jobs, &mut NeverReplace)
        .expect("push");
    assert_eq!(report.pushed(), vec!["basic", "deploy"]);

    for job in &jobs {
        let status = job_status(&server, &renderer, job, HashScope::Full).expect("status");
        assert_eq!(status, JobStatus::Current, "{job}");
    }

    let deploy = Document::parse(&server.job_config("deploy").expect("deploy")).expect("parse");
    let (info, _) = extract_pipeline(&deploy).expect("extract");
    assert_eq!(info.map(|i| i.link_type), Some(LinkType::Unstable));
    assert_eq!(
        extract_hash(&deploy).1.root().child_text("description").as_deref(),
        Some("Deploys the site")
    );
}

#[test]
fn context_overrides_make_jobs_outdated() {
    let repo = repository();
    let server = FakeServer::new();
    let renderer = JobRenderer::from_root(repo.path(), Context::new()).expect("renderer");
    PushReconciler::new(&server, &renderer, PushPolicy::default())
        .push(&["basic".to_string()], &mut NeverReplace)
        .expect("push");

    let overrides = skipper_core::context::parse_context_vars(&["description=hotfix"]).expect("vars");
    let overridden = JobRenderer::from_root(repo.path(), overrides).expect("renderer");
    assert_eq!(
        job_status(&server, &overridden, "basic", HashScope::Full).expect("status"),
        JobStatus::Outdated
    );
}

#[test]
fn push_then_build_reports_results() {
    let repo = repository();
    let renderer = JobRenderer::from_root(repo.path(), Context::new()).expect("renderer");
    let server = FakeServer::new();
    let report = PushReconciler::new(&server, &renderer, PushPolicy::default())
        .push(&["basic".to_string(), "deploy".to_string()], &mut NeverReplace)
        .expect("push");
    assert!(report.outcomes.iter().all(|(_, o)| *o == PushOutcome::Pushed));

    let deploy_build = format!("{FAKE_ORIGIN}/job/deploy/1/");
    server.script_build(&deploy_build, vec![BuildInfo::finished(Outcome::Unstable)]);
    server.set_log(&deploy_build, "2 tests failed\n");

    let builds = BuildOrchestrator::new(&server, PollPolicy::default())
        .run(&report.pushed(), &[], &mut ManualScheduler::new())
        .expect("build");
    assert!(builds[0].outcome.is_success());
    let BuildOutcome::Finished(result) = &builds[1].outcome else {
        panic!("deploy did not finish: {:?}", builds[1].outcome);
    };
    assert_eq!(result.status, BuildStatus::Terminal(Outcome::Unstable));

    let node = skipper_sync::build::describe_result(&server, "deploy", result, LogPolicy::FailuresOnly)
        .expect("describe");
    assert_eq!(node.status_label(), "unstable");
    assert_eq!(node.log.as_deref(), Some("2 tests failed\n"));
}

#[test]
fn vanished_queue_item_is_unknown_not_an_error() {
    let server = FakeServer::new();
    server.script_queue("a", vec![QueueStep::Ready(format!("{FAKE_ORIGIN}/job/a/5/"))]);
    server.script_queue("b", vec![QueueStep::NotFound]);

    let builds = BuildOrchestrator::new(&server, PollPolicy::default())
        .run(&["a".to_string(), "b".to_string()], &[], &mut ManualScheduler::new())
        .expect("build");

    match &builds[0].outcome {
        BuildOutcome::Finished(result) => {
            assert_eq!(result.location, BuildLocation(format!("{FAKE_ORIGIN}/job/a/5/")));
        }
        other => panic!("expected a finished build, got {other:?}"),
    }
    assert_eq!(builds[1].outcome, BuildOutcome::Unknown);
}

#[test]
fn in_progress_matrix_build_lists_sub_runs() {
    let server = FakeServer::new();
    let parent = BuildLocation(format!("{FAKE_ORIGIN}/job/m/7/"));
    let runs = vec![
        BuildLocation(format!("{FAKE_ORIGIN}/job/m/label=a/7/")),
        BuildLocation(format!("{FAKE_ORIGIN}/job/m/label=b/7/")),
    ];
    server.script_build(&parent.0, vec![BuildInfo::pending().with_runs(runs.clone())]);
    for run in &runs {
        server.script_build(&run.0, vec![BuildInfo::pending()]);
    }

    let node = describe(&server, Some("m"), &parent, LogPolicy::FailuresOnly).expect("describe");
    assert_eq!(node.status_label(), "in progress");
    assert_eq!(node.children.len(), 2);
    assert_eq!(node.children[0].name, runs[0].0);
    assert!(node.children.iter().all(|c| c.status == BuildStatus::Pending));
}
