//! Dump mode prints equivalent command lines and never needs an
//! engine.

use clap::Parser;
use stevedore::{Dispatcher, Invocation, Project, ResolveSettings};

fn project(dir: &std::path::Path) -> Project {
    let controlfile = dir.join("Controlfile");
    std::fs::write(
        &controlfile,
        r#"{
            "services": {
                "api": {
                    "image": "registry.example.com/team/api:dev",
                    "dockerfile": "Dockerfile",
                    "container": {
                        "name": "api",
                        "ports": ["8080:8080"],
                        "volumes": ["apidata:/var/lib/api"]
                    },
                    "commands": {"migrate": "/bin/sh -c migrate"},
                    "open": "/bin/sh -l"
                }
            }
        }"#,
    )
    .unwrap();
    std::fs::write(dir.join("Dockerfile"), "FROM busybox\n").unwrap();
    Project::load(&controlfile, &ResolveSettings::default()).unwrap()
}

#[test]
fn every_verb_dispatches_without_an_engine() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(dir.path());
    for verb in ["build", "build-prod", "start", "stop", "restart", "open", "migrate", "default"] {
        let invocation = Invocation::parse_from(["stevedore", verb, "api", "--dump"]);
        let dispatcher = Dispatcher::new(None, &project, &invocation);
        let code = tokio_test::block_on(dispatcher.dispatch())
            .unwrap_or_else(|e| panic!("{verb} touched the engine: {e}"));
        assert_eq!(code, 0, "{verb} should succeed in dump mode");
    }
}

#[test]
fn unknown_services_fail_the_pre_check() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(dir.path());
    let invocation = Invocation::parse_from(["stevedore", "start", "ghost", "--dump"]);
    let dispatcher = Dispatcher::new(None, &project, &invocation);
    let err = tokio_test::block_on(dispatcher.dispatch()).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}
