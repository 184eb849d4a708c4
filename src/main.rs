//! Process bootstrap: CLI parsing, configuration load, logging init, AOF
//! boot replay, and handing off to the accept loop (`server::Server::run`).
//! Grounded on the teacher's `main.rs` sequence (config load -> init server
//! -> load persisted state -> log "ready" -> accept), with the optional
//! config path promoted to a `clap`-derived CLI the way
//! `apollographql-router`'s `cli/src/main.rs` structures its entry point.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use ferrite::aof::{self, AofSink};
use ferrite::cluster::Router;
use ferrite::cmd::Engine;
use ferrite::config::Config;
use ferrite::server::{Backend, Server};

/// `ferrite-server [/path/to/redis.conf]`; an absent path falls back to
/// every default in `Config::default()` (spec.md §6).
#[derive(Parser)]
#[command(name = "ferrite-server", about = "A Redis-compatible in-memory key/value server")]
struct Args {
    /// Path to a `redis.conf`-style configuration file.
    config_path: Option<String>,
}

fn main() -> ExitCode {
    ferrite::log::init();

    let args = Args::parse();
    let config = match &args.config_path {
        Some(path) => match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                ferrite::log::error!("failed to read config file {path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            ferrite::log::warning!("no config file specified, using the default config");
            Config::default()
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            ferrite::log::error!("failed to start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ferrite::log::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> std::io::Result<()> {
    let aof_path = Path::new(&config.dir).join(&config.appendfilename);

    let backend = if config.cluster_enabled() {
        let mut router = Router::new(config.clone(), None);
        if config.appendonly {
            // Replay happens through the local engine directly: AOF
            // records are per-node, never relayed, so boot replay must
            // not go through the router's cluster dispatch.
            aof::replay(&aof_path, router.engine()).await?;
            let sink = AofSink::open(&config.dir, &config.appendfilename, config.appendfsync).await?;
            router.attach_aof(sink);
        }
        Backend::Cluster(router)
    } else {
        let mut engine = Engine::new(config.clone(), None);
        if config.appendonly {
            aof::replay(&aof_path, &engine).await?;
            let sink = AofSink::open(&config.dir, &config.appendfilename, config.appendfsync).await?;
            engine.attach_aof(sink);
        }
        Backend::Standalone(engine)
    };

    ferrite::log::notice!(
        "ferrite ready: {} database(s), appendonly={}, cluster={}",
        config.databases,
        config.appendonly,
        config.cluster_enabled(),
    );

    Server::new(backend, &config).run().await
}
