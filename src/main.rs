use anyhow::Context;
use gumdrop::Options;
use sandwich_inspect::{
    addresses::lookup,
    aggregator::{AttackQuery, SortKey, SortOrder},
    config::{BlockRange, Config},
    types::{Protocol, Valuation},
    CachedSource, MemorySource, Pipeline, ReferenceCurrency, SwapSource,
};
use std::path::PathBuf;

#[derive(Debug, Options)]
struct Opts {
    help: bool,

    #[options(required, help = "swap export, one JSON row per line")]
    input: PathBuf,

    #[options(help = "JSON config file")]
    config: Option<PathBuf>,

    #[options(help = "first block to scan")]
    from: Option<u64>,

    #[options(help = "last block to scan")]
    to: Option<u64>,

    #[options(help = "comma separated protocols, e.g. uniswapv2,sushiswapv2")]
    protocols: Option<String>,

    #[options(help = "`native` or `<token address>:<decimals>`")]
    reference: Option<ReferenceCurrency>,

    #[options(no_short, help = "blocks around a victim to search for the attacker")]
    radius: Option<u64>,

    #[options(no_short, help = "directory to cache fetched swaps in")]
    cache: Option<PathBuf>,

    #[options(help = "sort attacks by timestamp, revenue, profit or harm")]
    sort: Option<SortKey>,

    #[options(help = "sort in ascending order")]
    ascending: bool,

    #[options(help = "print at most this many attacks")]
    limit: Option<usize>,

    #[options(help = "print monthly totals")]
    monthly: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let opts = Opts::parse_args_default_or_exit();

    let source = MemorySource::from_file(&opts.input)
        .with_context(|| format!("could not read {}", opts.input.display()))?;

    let mut config = match &opts.config {
        Some(path) => Config::from_file(path)?,
        None => Config {
            block_range: source.block_bounds().unwrap_or_default(),
            ..Config::default()
        },
    };
    if opts.from.is_some() || opts.to.is_some() {
        config.block_range = BlockRange::new(
            opts.from.unwrap_or(config.block_range.start),
            opts.to.unwrap_or(config.block_range.end),
        );
    }
    if let Some(protocols) = &opts.protocols {
        config.pool_protocols = protocols
            .split(',')
            .map(|protocol| protocol.trim().parse::<Protocol>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(anyhow::Error::msg)?;
    }
    if let Some(reference) = opts.reference {
        config.reference_currency = reference;
    }
    if let Some(radius) = opts.radius {
        config.window_radius = radius;
    }

    match &opts.cache {
        Some(dir) => run(CachedSource::new(source, dir), config, &opts).await,
        None => run(source, config, &opts).await,
    }
}

async fn run<S: SwapSource + 'static>(source: S, config: Config, opts: &Opts) -> anyhow::Result<()> {
    let unit = config.reference_currency;
    let pipeline = Pipeline::new(source, config)?;
    let report = pipeline.run().await?;

    let order = if opts.ascending {
        SortOrder::Ascending
    } else {
        SortOrder::Descending
    };
    let mut query = AttackQuery::new().sort_by(opts.sort.unwrap_or_default(), order);
    if let Some(limit) = opts.limit {
        query = query.page(0, limit);
    }
    for attack in report.aggregator.query(&query) {
        println!("{}", serde_json::to_string(attack)?);
    }

    let value = |value: &num_bigint::BigInt| Valuation::new(value.clone(), unit, Vec::new());
    println!("\nattackers");
    for (attacker, totals) in report.aggregator.attackers() {
        println!(
            "{} attacks: {} revenue: {} profit: {}",
            lookup(*attacker),
            totals.attacks,
            value(&totals.revenue),
            value(&totals.profit)
        );
    }
    println!("\nvictims");
    for (victim, totals) in report.aggregator.victims() {
        println!(
            "{} attacks: {} harm: {}",
            lookup(*victim),
            totals.attacks,
            value(&totals.harm)
        );
    }
    if opts.monthly {
        println!("\nmonths");
        for (month, totals) in report.aggregator.monthly() {
            println!(
                "{} attacks: {} revenue: {} profit: {} harm: {}",
                month,
                totals.attacks,
                value(&totals.revenue),
                value(&totals.profit),
                value(&totals.harm)
            );
        }
    }

    println!(
        "\nscanned {} pools, {} malformed rows ({} undecodable), {} attacks withheld",
        report.pools.len(),
        report.malformed(),
        report.undecodable,
        report.withheld()
    );
    for (pool, err) in &report.failed {
        println!("failed {}: {}", pool, err);
    }
    println!(
        "next run resumes from block {}",
        pipeline.config().resume_from(report.high_water_mark)
    );
    Ok(())
}
