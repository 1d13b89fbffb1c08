mod logging;
mod report;
mod settings;
mod ui;

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use runlens_core::config::ReviewConfig;
use runlens_core::proposal::ChangeSummary;
use runlens_core::records::JobStatus;
use runlens_core::records::Trace;
use runlens_core::risk::RiskAssessment;
use runlens_core::state::RunDetail;
use runlens_core::tree::EntryKind;
use runlens_core::tree::TreeResult;
use runlens_core::tree::TreeWalker;
use runlens_feed::load_bundle;
use runlens_feed::FeedClient;
use runlens_feed::HttpFeedClient;
use runlens_feed::PollingController;
use runlens_feed::SimulatedFeedClient;
use serde::Serialize;

use crate::settings::parse_common;
use crate::settings::parse_run;
use crate::settings::parse_tree;
use crate::settings::CommonArgs;
use crate::settings::RunArgs;
use crate::settings::Settings;
use crate::settings::TreeArgs;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        return run_console(&CommonArgs::default());
    };
    let rest = &args[1..];

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("runlens {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "console" => run_console(&parse_common(rest)?),
        "tree" => run_tree(parse_tree(rest)?),
        "review" => run_review(parse_run("review", rest)?),
        "watch" => run_watch(parse_run("watch", rest)?),
        "config" => print_config(&parse_common(rest)?),
        flag if flag.starts_with("--") => run_console(&parse_common(&args)?),
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

fn init_logging(settings: &Settings) {
    if let Err(err) = logging::init_tracing(&settings.log_directory()) {
        eprintln!("warning: file logging disabled: {err}");
    }
}

fn open_feed(settings: &Settings) -> Result<Arc<dyn FeedClient>, Box<dyn std::error::Error>> {
    if settings.simulate {
        return Ok(Arc::new(SimulatedFeedClient::demo()));
    }
    let client = HttpFeedClient::new(
        &settings.config.server.base_url,
        settings.config.request_timeout(),
    )?;
    Ok(Arc::new(client))
}

fn run_console(common: &CommonArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(common)?;
    init_logging(&settings);
    let client = open_feed(&settings)?;
    let source = settings.source_label();
    ui::run(settings.config, client, source)
}

fn run_tree(args: TreeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(&args.common)?;
    let mut limits = settings.config.tree_limits();
    if let Some(depth) = args.depth {
        limits.max_depth = depth;
    }
    if let Some(max_entries) = args.max_entries {
        limits.max_entries = max_entries;
    }

    let walker = TreeWalker::new(&args.base)?;
    let result = walker.walk(&args.path, limits);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in tree_lines(&result, limits.max_entries) {
            println!("{line}");
        }
    }
    match result.error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn tree_lines(result: &TreeResult, max_entries: usize) -> Vec<String> {
    let mut lines: Vec<String> = result
        .entries
        .iter()
        .map(|entry| match (entry.kind, entry.size) {
            (EntryKind::Directory, _) => format!("d {}/", entry.path),
            (EntryKind::File, Some(size)) => format!("f {} ({size} bytes)", entry.path),
            (EntryKind::File, None) => format!("f {}", entry.path),
        })
        .collect();
    if result.truncated {
        lines.push(format!("(listing truncated at {max_entries} entries)"));
    }
    lines
}

#[derive(Debug, Serialize)]
struct ReviewReport<'a> {
    run_id: &'a str,
    review_state: Option<&'a str>,
    can_execute: bool,
    risk: &'a RiskAssessment,
    summary: &'a ChangeSummary,
    diff: &'a str,
}

impl<'a> ReviewReport<'a> {
    fn new(detail: &'a RunDetail) -> Self {
        Self {
            run_id: &detail.run_id,
            review_state: detail.review.available().and_then(|review| review.state_label()),
            can_execute: detail.can_execute(),
            risk: &detail.risk,
            summary: &detail.summary,
            diff: &detail.diff,
        }
    }
}

fn run_review(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(&args.common)?;
    init_logging(&settings);
    let client = open_feed(&settings)?;
    let bundle = load_bundle(client.as_ref(), &args.run_id)?;
    let detail = RunDetail::from_bundle(bundle, &settings.config.review);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ReviewReport::new(&detail))?);
    } else {
        for line in review_lines(&detail, &settings.config.review) {
            println!("{line}");
        }
    }
    Ok(())
}

fn review_lines(detail: &RunDetail, config: &ReviewConfig) -> Vec<String> {
    let mut lines = vec![format!("Run {}", detail.run_id)];
    let review = match detail.review.available() {
        Some(review) => review.state_label().unwrap_or("—").to_string(),
        None if detail.can_review() => "unavailable".to_string(),
        None => "no review endpoint".to_string(),
    };
    lines.push(format!("Review: {review}"));
    lines.push(format!("[{} RISK]", detail.risk.level.label()));

    if !detail.risk.reasons.is_empty() {
        lines.push("Risk factors:".to_string());
        let (shown, _) = report::limited(&detail.risk.reasons, config.max_reasons_shown);
        lines.extend(shown.iter().map(|reason| format!("  • {reason}")));
    }
    lines.push(report::metrics_line(&detail.summary));

    let files = &detail.summary.affected_files;
    if !files.is_empty() {
        lines.push("Affected files:".to_string());
        let (shown, remaining) = report::limited(files, config.max_files_shown);
        lines.extend(shown.iter().map(|path| format!("  • {path}")));
        if remaining > 0 {
            lines.push(format!("  ... and {remaining} more"));
        }
    }

    lines.push(String::new());
    if detail.diff.is_empty() {
        lines.push("(no changes to preview)".to_string());
    } else {
        lines.extend(detail.diff.lines().map(str::to_string));
    }
    lines
}

fn trace_lines(trace: &Trace) -> Vec<String> {
    let (headline, _) = report::trace_headline(trace);
    let mut lines = vec![format!("  {headline}")];
    lines.extend(
        report::trace_details(trace)
            .into_iter()
            .map(|(text, _)| format!("      {text}")),
    );
    lines
}

fn run_watch(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(&args.common)?;
    init_logging(&settings);
    let client = open_feed(&settings)?;
    let run_id = args.run_id.as_str();

    if args.execute {
        let accepted = client.execute_run(run_id)?;
        println!("Execution queued as {}", accepted.job_id);
    } else if let Err(err) = client.execute_status(run_id) {
        if err.is_missing() {
            return Err(format!("no execution recorded for {run_id}").into());
        }
        return Err(err.into());
    }

    let mut controller = PollingController::new(run_id, settings.config.backoff_schedule());
    controller.start();
    let tick = settings.config.tick();
    let mut last_status: Option<JobStatus> = None;

    loop {
        if let Some(update) = controller.tick(client.as_ref(), Instant::now()) {
            if let Some(job_id) = &update.job_id {
                println!("Job {job_id}");
            }
            if last_status.as_ref() != Some(&update.status) {
                println!("Status: {}", update.status.label());
                last_status = Some(update.status.clone());
            }
            for trace in &update.new_traces {
                for line in trace_lines(trace) {
                    println!("{line}");
                }
            }
            if update.terminal {
                return finish_watch(client.as_ref(), &controller, &update.status);
            }
        }
        thread::sleep(tick);
    }
}

fn finish_watch(
    client: &dyn FeedClient,
    controller: &PollingController,
    status: &JobStatus,
) -> Result<(), Box<dyn std::error::Error>> {
    let traces = controller.state().known_trace_count();
    if *status != JobStatus::Failed {
        println!("Job {} with {traces} traces", status.label());
        return Ok(());
    }
    let reason = controller
        .state()
        .job_id()
        .and_then(|job_id| client.job_get(job_id).ok())
        .and_then(|job| job.error)
        .unwrap_or_else(|| "unknown".to_string());
    Err(format!("job failed after {traces} traces: {reason}").into())
}

fn print_config(common: &CommonArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(common)?;
    println!("# {}", settings.config_path.display());
    print!("{}", toml::to_string_pretty(&settings.config)?);
    Ok(())
}

fn print_help() {
    println!("runlens {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  runlens [console] [--url URL] [--config PATH] [--simulate]");
    println!("  runlens tree [PATH] [--base DIR] [--depth N] [--max-entries N] [--json]");
    println!("  runlens review RUN_ID [--json]");
    println!("  runlens watch RUN_ID [--execute]");
    println!("  runlens config");
    println!("  runlens --help");
    println!("  runlens --version");
}
