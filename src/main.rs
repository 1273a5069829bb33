//! `verirl-client` -- submit an RTL optimization job, or attach to one, and follow it.
//!
//! Configuration comes from the environment (see [`ClientConfig::from_env`]),
//! optionally seeded from a `.env` file. Ctrl-C stops the running job.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verirl_client::result::{export_file_name, export_text};
use verirl_client::{
    BackendKind, ClientConfig, JobController, JobHandle, JobRequest, JobView, MetricsRecord,
    StaticToken, SubmitGate, Targets, selector,
};

#[derive(Parser)]
#[command(name = "verirl-client")]
#[command(about = "Submit an RTL optimization job and follow its progress", long_about = None)]
struct Args {
    /// Top-level module name
    #[arg(long, required_unless_present = "job")]
    top: Option<String>,

    /// Verilog source file
    #[arg(long, required_unless_present = "job")]
    rtl: Option<PathBuf>,

    /// Follow an existing job instead of submitting a new one
    #[arg(long, conflicts_with = "rtl")]
    job: Option<String>,

    /// Upper bound on area (equivalent gates)
    #[arg(long)]
    max_area: Option<f64>,

    /// Lower bound on fmax (MHz)
    #[arg(long)]
    min_fmax_mhz: Option<f64>,

    /// Upper bound on power (mW)
    #[arg(long)]
    max_power_mw: Option<f64>,

    /// Iteration budget
    #[arg(long, default_value = "3")]
    max_iters: u32,

    /// Use the simulated backend regardless of configuration
    #[arg(long)]
    simulated: bool,

    /// Write the optimized candidate here (a directory gets `<top>_optimized.v`)
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verirl_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env()?;
    if args.simulated {
        config.backend = BackendKind::Simulated;
    }

    let credentials = Arc::new(StaticToken::new(config.auth_token.clone()));
    let selector = selector::init(&config, credentials.clone())?;
    let controller = JobController::with_auth(
        selector.backend(),
        credentials,
        SubmitGate::new(config.auth_required),
    );

    let mut views = controller.subscribe();
    let handle = match args.job.as_deref() {
        Some(id) => {
            let handle = JobHandle::new(id.trim());
            controller.attach(handle.clone());
            println!("Following job {handle}");
            handle
        }
        None => {
            let (Some(rtl), Some(top)) = (&args.rtl, &args.top) else {
                anyhow::bail!("--rtl and --top are required unless --job is given");
            };
            let source = tokio::fs::read_to_string(rtl)
                .await
                .with_context(|| format!("reading {}", rtl.display()))?;
            let request = JobRequest::new(source, top.clone())
                .with_targets(Targets {
                    max_area: args.max_area,
                    min_fmax_mhz: args.min_fmax_mhz,
                    max_power_mw: args.max_power_mw,
                })
                .with_max_iters(args.max_iters);
            let handle = controller.submit(request).await?;
            println!("Submitted job {handle}");
            handle
        }
    };

    let mut last_line = String::new();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                let line = render(&view);
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
                if !view.polling {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping job {handle}");
                controller.stop().await?;
            }
        }
    }

    let view = controller.view();
    if let Some(err) = &view.error {
        anyhow::bail!("job {handle} ended with an error: {err}");
    }

    if let Some(target) = args.export {
        let path = if target.is_dir() {
            target.join(export_file_name(args.top.as_deref().unwrap_or_default()))
        } else {
            target
        };
        tokio::fs::write(&path, export_text(view.snapshot.as_deref()))
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

fn render(view: &JobView) -> String {
    format!(
        "[{:>3}%] {:<9} {}",
        view.progress(),
        view.status_label(),
        render_metrics(&view.metrics)
    )
}

fn render_metrics(metrics: &MetricsRecord) -> String {
    let power = metrics.power_savings_pct.map_or("—".to_string(), |p| {
        format!("{}{}%", if p > 0.0 { "-" } else { "" }, p.abs())
    });
    let timing = metrics.timing_improvement_pct.map_or("—".to_string(), |t| {
        format!("{}{t}%", if t >= 0.0 { "+" } else { "" })
    });
    let gates = metrics
        .area_eq_gates
        .map_or("—".to_string(), |g| g.to_string());
    format!("power {power}  timing {timing}  gates {gates}")
}
