//! Binary entry point: parse the invocation, resolve the project,
//! connect the engine (unless dump mode makes it pointless), dispatch,
//! and map the outcome onto the documented exit codes.

use clap::Parser;
use stevedore::{Dispatcher, Engine, Invocation, Project, ResolveSettings};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let invocation = Invocation::parse();

    let default_filter = if invocation.debug {
        "stevedore=debug"
    } else {
        "stevedore=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted");
            std::process::exit(130);
        }
    });

    std::process::exit(run(&invocation).await);
}

async fn run(invocation: &Invocation) -> i32 {
    let settings = ResolveSettings {
        as_me: invocation.as_me,
        ..ResolveSettings::default()
    };
    let project = match Project::load(&invocation.controlfile, &settings) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("{e}");
            return e.exit_code();
        }
    };

    let engine = if invocation.dump {
        None
    } else {
        match Engine::connect(invocation.dry_run).await {
            Ok(engine) => Some(engine),
            Err(e) => {
                eprintln!("{e}");
                return e.exit_code();
            }
        }
    };

    match Dispatcher::new(engine.as_ref(), &project, invocation)
        .dispatch()
        .await
    {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            e.exit_code()
        }
    }
}
