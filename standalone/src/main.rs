use anyhow::{anyhow, Context};
use itertools::Itertools;
use tracing::info;

use pmr_engine::{run, FailurePolicy, JobConfig, PartitionFn, VecSource};
use workload::Workload;

mod args;
use args::parse_args;

const SAMPLE_CORPUS: &[&str] = &[
    "you load sixteen tons",
    "what do you get",
    "a day older",
    "and deeper in debt",
    "and sixteen tons",
    "well thats quite something",
    "something feels fishy",
];

fn read_lines(input: Option<&str>) -> anyhow::Result<Vec<String>> {
    match input {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading input file {path}"))?;
            Ok(text.lines().map(str::to_string).collect())
        }
        None => Ok(SAMPLE_CORPUS.iter().map(|line| line.to_string()).collect()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = parse_args();

    let workload = Workload::try_named(&args.workload)
        .ok_or_else(|| anyhow!("unknown workload: {}", args.workload))?;
    let lines = read_lines(args.input.as_deref())?;
    info!(
        "running {} over {} lines with {} mappers and {} reducers",
        workload.name,
        lines.len(),
        args.mappers,
        args.reducers
    );

    let latency = (args.latency_ms > 0)
        .then(|| std::time::Duration::from_millis(args.latency_ms));
    let partition: PartitionFn<String> =
        std::sync::Arc::new(|key, n| common::hash_partition(key, n));
    let policy = if args.abort_on_failure {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Ignore
    };

    let config = JobConfig::new(
        workload.mappers(args.mappers, latency),
        workload.reducers(args.reducers),
        partition,
        Box::new(VecSource::new(lines)),
    )
    .with_failure_policy(policy);

    let table = run(config)
        .settled()
        .await
        .map_err(|err| anyhow!(err.to_string()))?;

    if args.json {
        let table: serde_json::Map<String, serde_json::Value> = table
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(key, count)| (key.clone(), serde_json::Value::from(*count)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        let width = table.keys().map(String::len).max().unwrap_or(0);
        for (key, count) in table.iter().sorted_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0))) {
            println!("{key:width$}  {count}");
        }
    }

    Ok(())
}
