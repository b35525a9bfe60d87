//! CLI for siemfold.
//!
//! `group` folds one local event file and prints the forward records.
//! `run` polls every configured tenant on a fixed interval, one worker
//! thread per tenant, until the cycle limit or Ctrl-C.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use siemfold_core::{EventFields, Labels};
use siemfold_grouper::{CountPolicy, GroupingConfig, DEFAULT_GAP_SECS};
use siemfold_pipeline::{
    run_tenants, CycleReport, FileSource, JsonLinesForwarder, RetryPolicy, SiemfoldConfig,
    SourceSpec, TenantPipeline,
};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

type Sink = Box<dyn Write + Send>;
type Pipeline = TenantPipeline<FileSource, JsonLinesForwarder<Sink>>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group the events of one file and print one record per run
    Group {
        /// Event file (JSON array, envelope object or JSON lines)
        #[arg(long)]
        input: PathBuf,

        /// Tenant label stamped on every record
        #[arg(long)]
        tenant: String,

        /// Tool label stamped on every record
        #[arg(long)]
        tool: String,

        /// Key of the event array inside an envelope object
        #[arg(long)]
        records_key: Option<String>,

        /// Field holding the signature (leading '/' for a JSON pointer)
        #[arg(long, default_value = "signature")]
        signature_field: String,

        /// Field holding the message (leading '/' for a JSON pointer)
        #[arg(long, default_value = "message")]
        message_field: String,

        /// Field holding the timestamp (leading '/' for a JSON pointer)
        #[arg(long, default_value = "ts")]
        timestamp_field: String,

        /// Seconds below which same-key events extend the open run
        #[arg(long, default_value_t = DEFAULT_GAP_SECS)]
        gap_secs: u64,

        /// How counts behave when a new run opens
        #[arg(long, value_enum, default_value = "cumulative")]
        count_policy: CountPolicyArg,

        /// Append records to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Poll every configured tenant on a fixed interval
    Run {
        /// Path to the JSON config
        #[arg(long)]
        config: PathBuf,

        /// Stop after this many cycles (default: run until Ctrl-C)
        #[arg(long)]
        cycles: Option<u64>,

        /// Append records to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CountPolicyArg {
    Cumulative,
    PerRun,
}

impl From<CountPolicyArg> for CountPolicy {
    fn from(arg: CountPolicyArg) -> Self {
        match arg {
            CountPolicyArg::Cumulative => CountPolicy::Cumulative,
            CountPolicyArg::PerRun => CountPolicy::PerRun,
        }
    }
}

fn open_sink(output: Option<&Path>) -> Result<Sink> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create output directory {:?}", parent))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open output {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

fn build_pipelines(config: &SiemfoldConfig, output: Option<&Path>) -> Result<Vec<Pipeline>> {
    config
        .tenants
        .iter()
        .map(|tenant| {
            let source = FileSource::new(tenant.source.clone(), tenant.fields.clone());
            let forwarder = JsonLinesForwarder::new(open_sink(output)?);
            TenantPipeline::new(
                tenant.labels(),
                source,
                forwarder,
                config.grouping_for(tenant),
                config.retry,
            )
            .with_context(|| format!("Failed to set up tenant '{}'", tenant.name))
        })
        .collect()
}

fn log_report(cycle: u64, report: &CycleReport) {
    for failed in report.failed() {
        tracing::warn!(
            cycle,
            tenant = %failed.tenant,
            error = failed.error.as_deref().unwrap_or_default(),
            "tenant failed"
        );
    }
    tracing::info!(
        cycle,
        fetched = report.total_fetched(),
        groups = report.total_groups(),
        ungrouped = report.total_ungrouped(),
        sent = report.total_sent(),
        "cycle finished"
    );
}

async fn poll(
    config: SiemfoldConfig,
    mut pipelines: Vec<Pipeline>,
    cycles: Option<u64>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut completed = 0;

    // Polled for the whole loop: once installed, the handler replaces the
    // default SIGINT action.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                tracing::info!("interrupted, stopping");
                break;
            }
            _ = ticker.tick() => {}
        }

        let mut batch = std::mem::take(&mut pipelines);
        let mut cycle = tokio::task::spawn_blocking(move || {
            let report = run_tenants(&mut batch);
            (batch, report)
        });

        // Tenant threads cannot be cancelled; an interrupt waits for the cycle.
        let finished = tokio::select! {
            joined = &mut cycle => Some(joined),
            _ = &mut ctrl_c => None,
        };
        let interrupted = finished.is_none();
        let joined = match finished {
            Some(joined) => joined,
            None => {
                tracing::info!("interrupted, stopping after the current cycle");
                cycle.await
            }
        };
        let (batch, report) = joined.context("Cycle worker failed")?;
        pipelines = batch;

        completed += 1;
        log_report(completed, &report);

        if interrupted || cycles.is_some_and(|n| completed >= n) {
            break;
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Group {
            input,
            tenant,
            tool,
            records_key,
            signature_field,
            message_field,
            timestamp_field,
            gap_secs,
            count_policy,
            output,
        } => {
            let fields = EventFields {
                signature: signature_field,
                message: message_field,
                timestamp: timestamp_field,
            };
            let source = FileSource::new(
                SourceSpec {
                    path: input,
                    records_key,
                },
                fields,
            );
            let grouping = GroupingConfig {
                gap_secs,
                count_policy: count_policy.into(),
            };
            let retry = RetryPolicy {
                attempts: 1,
                delay_ms: 0,
            };

            let mut pipeline = TenantPipeline::new(
                Labels::new(tenant, tool),
                source,
                JsonLinesForwarder::new(open_sink(output.as_deref())?),
                grouping,
                retry,
            )
            .context("Invalid grouping options")?;

            let outcome = pipeline.run_cycle();
            if let Some(err) = outcome.error {
                anyhow::bail!("Grouping failed: {}", err);
            }
        }
        Commands::Run {
            config,
            cycles,
            output,
        } => {
            let config = SiemfoldConfig::load(&config)
                .with_context(|| format!("Failed to load config {:?}", config))?;
            let pipelines = build_pipelines(&config, output.as_deref())?;
            tracing::info!(
                tenants = pipelines.len(),
                interval_secs = config.interval_secs,
                "starting polling"
            );

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start runtime")?;
            runtime.block_on(poll(config, pipelines, cycles))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_policy_arg_maps_to_policy() {
        assert_eq!(
            CountPolicy::from(CountPolicyArg::Cumulative),
            CountPolicy::Cumulative
        );
        assert_eq!(CountPolicy::from(CountPolicyArg::PerRun), CountPolicy::PerRun);
    }

    #[test]
    fn build_pipelines_labels_each_tenant() {
        let config: SiemfoldConfig = r#"{
            "tenants": [
                {"name": "acme", "tool": "MER", "source": {"path": "a.json"}},
                {"name": "globex", "tool": "EDR", "source": {"path": "b.json"}}
            ]
        }"#
        .parse()
        .unwrap();

        let dir = std::env::temp_dir().join(format!("siemfold_cli_build_{}", std::process::id()));
        let pipelines = build_pipelines(&config, Some(&dir.join("out.jsonl"))).unwrap();

        let labels: Vec<_> = pipelines.iter().map(|p| p.labels().clone()).collect();
        assert_eq!(
            labels,
            vec![Labels::new("acme", "MER"), Labels::new("globex", "EDR")]
        );
    }

    #[test]
    fn open_sink_creates_missing_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("siemfold_cli_sink_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested/deeper/out.jsonl");

        let mut sink = open_sink(Some(&path)).unwrap();
        sink.write_all(b"{}\n").unwrap();

        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_sink_names_directory_it_cannot_create() {
        let dir = std::env::temp_dir().join(format!("siemfold_cli_blocked_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not_a_dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = open_sink(Some(&blocker.join("out.jsonl")))
            .err()
            .expect("parent is a regular file");
        let message = format!("{:#}", err);

        assert!(message.contains("Failed to create output directory"), "{message}");
        assert!(message.contains("not_a_dir"), "{message}");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn cli_parses_group_defaults() {
        let cli = Cli::try_parse_from([
            "siemfold", "group", "--input", "e.json", "--tenant", "acme", "--tool", "MER",
        ])
        .unwrap();

        match cli.command {
            Commands::Group {
                gap_secs,
                count_policy,
                timestamp_field,
                ..
            } => {
                assert_eq!(gap_secs, 60);
                assert!(matches!(count_policy, CountPolicyArg::Cumulative));
                assert_eq!(timestamp_field, "ts");
            }
            Commands::Run { .. } => panic!("expected group"),
        }
    }
}
