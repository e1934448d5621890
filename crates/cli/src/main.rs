use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use livefeed_core::{Action, BootstrapFields, Direction, PageVariant, ViewState};
use livefeed_store::{spawn_feed, BatchedReducer, FeedConfig, ListStore};
use livefeed_transport::script::{read_script, ScriptLine};
use livefeed_transport::{LocalHub, Transport};
use livefeed_view::{connect, Binder, ElementSnapshot, RecordingSurface, SurfaceOp};
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "livefeedctl", version, about = "livefeed CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(clap::Args, Debug)]
struct PageArgs {
    /// Page variant, e.g. "fee-payments" or "address-forward-transfers"
    #[arg(long = "page", value_parser = PageVariant::from_str)]
    page: PageVariant,
    /// Subject address for address-scoped pages
    #[arg(long = "address")]
    address: Option<String>,
    /// Direction filter for address-scoped pages ("to" or "from")
    #[arg(long = "filter", value_parser = Direction::from_str)]
    filter: Option<Direction>,
    /// Batching threshold (default: LIVEFEED_BATCH_THRESHOLD or 10)
    #[arg(long = "threshold")]
    threshold: Option<usize>,
    /// Server-rendered count text seeding the running total, e.g. "1,024"
    #[arg(long = "count-text")]
    count_text: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List page variants with their topics and action tags
    Variants,
    /// Replay a recorded session script through the store and binder
    Replay {
        /// JSONL script (see livefeed_transport::script)
        script: PathBuf,
        #[command(flatten)]
        page: PageArgs,
        /// Include every render op, not only the final state
        #[arg(long = "ops", action = ArgAction::SetTrue)]
        ops: bool,
    },
    /// Publish synthetic messages through an in-process hub and a live feed
    Simulate {
        #[command(flatten)]
        page: PageArgs,
        /// Total messages to publish
        #[arg(long = "count", default_value_t = 25)]
        count: usize,
        /// Messages per publish
        #[arg(long = "burst", default_value_t = 1)]
        burst: usize,
        /// Pause between publishes
        #[arg(long = "gap-ms", default_value_t = 0)]
        gap_ms: u64,
        /// Fail the channel after publishing
        #[arg(long = "fail", action = ArgAction::SetTrue)]
        fail: bool,
    },
}

fn init_tracing() {
    let env = std::env::var("LIVEFEED_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("LIVEFEED_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid LIVEFEED_METRICS_ADDR; expected host:port");
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    page: PageVariant,
    epoch: u64,
    state: &'a ViewState,
    #[serde(skip_serializing_if = "Option::is_none")]
    ops: Option<&'a [SurfaceOp]>,
}

/// Build the page's store, seed it with PAGE_LOAD, and connect the binder.
fn build_page(args: &PageArgs, cfg: &FeedConfig) -> Result<(ListStore, std::sync::Arc<std::sync::Mutex<RecordingSurface>>)> {
    let variant = args.page;
    // Fails early for address pages without an address.
    variant.topic(args.address.as_deref())?;
    let config = variant.config().with_threshold(args.threshold.unwrap_or(cfg.threshold));
    let reducer = BatchedReducer::new(config);
    let mut store = ListStore::new(reducer, reducer.initial_state(), variant.identifier_path());
    if args.address.is_some() || args.filter.is_some() {
        store.dispatch(Action::PageLoad(BootstrapFields {
            address_hash: args.address.clone(),
            filter: args.filter,
            running_count: None,
        }));
    }
    let mut page = ElementSnapshot::default();
    if let Some(text) = &args.count_text {
        page = page.with_text(livefeed_view::bindings::count_selector(variant.entity()), text);
    }
    let surface = connect(&mut store, Binder::for_variant(variant), &page, RecordingSurface::default());
    Ok((store, surface))
}

fn print_report(output: Output, report: &Report<'_>) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(report)?),
        Output::Human => {
            let s = report.state;
            println!("page:          {}", report.page);
            println!("epoch:         {}", report.epoch);
            println!("disconnected:  {}", s.channel_disconnected);
            println!("items:         {}", s.items.len());
            println!("pending batch: {}", s.pending_batch.len());
            if let Some(c) = s.running_count {
                println!("running count: {}", livefeed_view::format_count(c));
            }
            if let Some(f) = s.filter {
                println!("filter:        {} {}", f, s.address_hash.as_deref().unwrap_or("-"));
            }
            for frag in s.items.iter().take(10) {
                println!("  {}", frag.as_str());
            }
            if let Some(ops) = report.ops {
                println!("render ops:    {}", ops.len());
                for op in ops {
                    println!("  {:?}", op);
                }
            }
        }
    }
    Ok(())
}

fn synthetic_message(i: usize, address: Option<&str>) -> serde_json::Value {
    let subject = address.unwrap_or("0x0000000000000000000000000000000000000001");
    let other = format!("0x{:040x}", i + 2);
    let (to, from) = if i % 2 == 0 { (subject.to_string(), other) } else { (other, subject.to_string()) };
    let row = format!("<tr data-identifier=\"{}\"><td>#{}</td></tr>", i, i);
    serde_json::json!({
        "to_address_hash": to,
        "from_address_hash": from,
        "transaction_html": row,
        "fee_payment_html": row,
        "forward_transfer_html": row,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let cfg = FeedConfig::from_env();

    match cli.command {
        Commands::Variants => {
            let rows: Vec<serde_json::Value> = PageVariant::ALL
                .iter()
                .map(|v| {
                    serde_json::json!({
                        "page": v.name(),
                        "marker": v.page_marker(),
                        "topic": v.topic(Some("<address>")).unwrap_or_default(),
                        "event": v.entity().event_name(),
                        "action": v.entity().batch_action_tag(),
                    })
                })
                .collect();
            match cli.output {
                Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
                Output::Human => {
                    for v in PageVariant::ALL {
                        println!(
                            "{:<26} {:<36} {:<17} {}",
                            v.name(),
                            v.topic(Some("<address>")).unwrap_or_default(),
                            v.entity().event_name(),
                            v.entity().batch_action_tag()
                        );
                    }
                }
            }
        }
        Commands::Replay { script, page, ops } => {
            info!(script = %script.display(), page = %page.page, "replay invoked");
            let file = File::open(&script).with_context(|| format!("opening {}", script.display()))?;
            let lines = read_script(BufReader::new(file)).with_context(|| format!("reading {}", script.display()))?;
            let (mut store, surface) = build_page(&page, &cfg)?;
            let entity = page.page.entity();
            for line in lines {
                match line {
                    ScriptLine::Deliver(msgs) => {
                        store.dispatch(Action::received_batch(entity, msgs));
                    }
                    ScriptLine::Page(meta) => {
                        store.load_page(meta);
                    }
                    ScriptLine::Disconnect => {
                        store.dispatch(Action::ChannelDisconnected);
                    }
                    ScriptLine::NavigateAway => {
                        store.dispatch(Action::NavigatingAway);
                    }
                    ScriptLine::Action(action) => {
                        store.dispatch(action);
                    }
                }
            }
            let state = store.state();
            let recorded = surface.lock().map(|s| s.ops.clone()).unwrap_or_default();
            let report = Report {
                page: page.page,
                epoch: store.epoch(),
                state: state.as_ref(),
                ops: if ops { Some(recorded.as_slice()) } else { None },
            };
            print_report(cli.output, &report)?;
        }
        Commands::Simulate { page, count, burst, gap_ms, fail } => {
            info!(page = %page.page, count, burst, "simulate invoked");
            let topic = page.page.topic(page.address.as_deref())?;
            let (store, _surface) = build_page(&page, &cfg)?;
            let hub = LocalHub::new(cfg.queue_cap);
            let sub = hub.subscribe(&topic).await?;
            let feed = spawn_feed(store, sub, &cfg);
            let event = page.page.entity().event_name();

            let mut sent = 0usize;
            while sent < count {
                let n = burst.max(1).min(count - sent);
                let group: Vec<serde_json::Value> =
                    (sent..sent + n).map(|i| synthetic_message(i, page.address.as_deref())).collect();
                hub.publish(&topic, event, serde_json::Value::Array(group)).await?;
                sent += n;
                if gap_ms > 0 {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(gap_ms)) => {}
                        _ = signal::ctrl_c() => {
                            warn!("Ctrl-C received; stopping publisher");
                            break;
                        }
                    }
                }
            }
            // Let the batcher's last group settle before tearing down.
            tokio::time::sleep(cfg.debounce + Duration::from_millis(50)).await;
            if fail {
                hub.fail(&topic, "simulated socket error").await?;
            }
            hub.close(&topic);
            let store = feed.join().await.context("feed task failed")?;
            let state = store.state();
            let report = Report { page: page.page, epoch: store.epoch(), state: state.as_ref(), ops: None };
            print_report(cli.output, &report)?;
        }
    }
    Ok(())
}
