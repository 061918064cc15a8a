//! # Dispatch Demo
//!
//! Runs one request through a small in-process registry and prints the reply
//! as JSON. Useful for watching the deadline, abort and fault paths without a
//! network front end.
//!
//! ```text
//! dispatch-demo user profile get --params '{"token":"t","user_id":1}'
//! dispatch-demo user profile slow --params '{"token":"t"}'   # times out
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use catuan_core::{Reply, RouteLabels};
use catuan_server::service::{
    build_dispatch_pipeline, handler_fn, single_flight, DispatchConfig, DispatchRequest,
    Dispatcher, Flow, KeyedLimiter, Registry, RegistryBuilder,
};
use clap::Parser;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dispatch-demo")]
#[command(about = "Dispatch a single role/group/action request")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Role label
    role: String,

    /// Group label
    group: String,

    /// Action label
    action: String,

    /// Request parameters as a JSON document
    #[arg(short, long)]
    params: Option<String>,

    /// Path to a JSON dispatch configuration file
    #[arg(short, long, env = "CATUAN_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<DispatchConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => DispatchConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn demo_registry() -> anyhow::Result<Registry> {
    let mut builder = RegistryBuilder::new();

    builder.register_role("user")?.use_before(handler_fn(|ctx| {
        let has_token = ctx.params()["token"].as_str().is_some_and(|t| !t.is_empty());
        if !has_token {
            ctx.reply(Reply::denied("login required"));
            return Ok(Flow::Abort);
        }
        Ok(Flow::Next)
    }));

    let updates = KeyedLimiter::new();
    let profile = builder.register_group("user", "profile")?;
    profile
        .use_before(
            single_flight(updates, |ctx| ctx.params()["user_id"].as_u64()),
            &["update"],
        )
        .bind_action(
            "get",
            handler_fn(|ctx| {
                let user_id = ctx.params()["user_id"].clone();
                ctx.result(0, "", vec![json!({ "user_id": user_id, "name": "demo" })]);
                Ok(Flow::Next)
            }),
        )
        .bind_action(
            "update",
            handler_fn(|ctx| {
                ctx.result(0, "updated", vec![]);
                Ok(Flow::Next)
            }),
        )
        .bind_action("slow", SlowAction)
        .bind_action(
            "broken",
            handler_fn(|_ctx| Err(anyhow::anyhow!("storage unavailable").into())),
        );

    Ok(builder.build())
}

/// Sleeps well past any sensible deadline.
struct SlowAction;

#[async_trait::async_trait]
impl catuan_server::Handler for SlowAction {
    async fn call(
        &self,
        ctx: &mut catuan_server::DispatchContext,
    ) -> catuan_server::HandlerResult {
        tokio::time::sleep(Duration::from_secs(60)).await;
        ctx.result(0, "", vec![json!("too late")]);
        Ok(Flow::Next)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = load_config(cli.config.as_ref())?;
    let params = match &cli.params {
        Some(raw) => serde_json::from_str(raw).context("parsing --params")?,
        None => serde_json::Value::Null,
    };

    let dispatcher = Dispatcher::new(demo_registry()?, &config);
    let pipeline = build_dispatch_pipeline(dispatcher, &config);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling request");
                cancel.cancel();
            }
        }
    });

    let request = DispatchRequest::new(RouteLabels::new(cli.role, cli.group, cli.action))
        .with_params(params)
        .with_cancellation(cancel);

    let outcome = match pipeline.oneshot(request).await {
        Ok(outcome) => outcome,
        Err(never) => match never {},
    };

    match outcome.into_reply() {
        Some(reply) => println!("{}", serde_json::to_string_pretty(&reply)?),
        None => info!("request cancelled, no reply"),
    }
    Ok(())
}
