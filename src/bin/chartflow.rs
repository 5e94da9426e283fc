use anyhow::{Context, Result};
use chartflow::{Chart, ChartConfig, ChartKind, FetchRequest, FieldSpec, MergePolicy, storage};
use clap::{Args, Parser, Subcommand, ValueEnum};
use num_format::{Locale, ToFormattedString};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chartflow",
    version,
    about = "Fetch a tabular dataset and materialize an aggregated chart view"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch data, aggregate it, and print (or export) the series view.
    Get(GetArgs),
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(ValueEnum, Clone, Debug)]
enum Merge {
    Sum,
    Max,
}

#[derive(ValueEnum, Clone, Debug)]
enum Kind {
    Bar,
    Line,
    Area,
    Pie,
    Table,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// Source endpoint URL.
    #[arg(short, long)]
    endpoint: String,
    /// X-axis field name.
    #[arg(short, long)]
    x: String,
    /// Y field names, separated by comma (e.g. revenue_usd,fees_usd).
    #[arg(short, long)]
    y: String,
    /// Optional group-by field; distinct values become their own series.
    #[arg(short, long)]
    group: Option<String>,
    /// Selectable time-window options, separated by comma.
    #[arg(long, default_value = "7D,30D,90D,ALL")]
    windows: String,
    /// Initially selected time window.
    #[arg(short, long, default_value = "ALL")]
    window: String,
    /// Duplicate-x reconciliation policy.
    #[arg(long, value_enum, default_value_t = Merge::Sum)]
    merge: Merge,
    /// Chart kind; selects the fallback dataset if the fetch fails.
    #[arg(long, value_enum, default_value_t = Kind::Line)]
    kind: Kind,
    /// Normalize each x to percent-of-total.
    #[arg(long, default_value_t = false)]
    percent: bool,
    /// Bearer token for the endpoint.
    #[arg(long)]
    token: Option<String>,
    /// Save the view to a file (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Get(args) => run_get(args),
    }
}

fn run_get(args: GetArgs) -> Result<()> {
    let mut fields = vec![FieldSpec::x(&args.x)];
    for y in args.y.split([',', ';']).filter(|s| !s.trim().is_empty()) {
        fields.push(FieldSpec::y(y.trim()));
    }
    if let Some(g) = &args.group {
        fields.push(FieldSpec::group(g));
    }

    let mut request = FetchRequest::new(&args.endpoint);
    if let Some(t) = &args.token {
        request = request.with_token(t);
    }

    let windows: Vec<&str> = args
        .windows
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let kind = match args.kind {
        Kind::Bar => ChartKind::Bar,
        Kind::Line => ChartKind::Line,
        Kind::Area => ChartKind::Area,
        Kind::Pie => ChartKind::Pie,
        Kind::Table => ChartKind::Table,
    };
    let merge = match args.merge {
        Merge::Sum => MergePolicy::Sum,
        Merge::Max => MergePolicy::Max,
    };
    let config = ChartConfig::new(request, fields, kind)
        .with_merge(merge)
        .with_windows(&windows, &args.window);

    let mut chart = Chart::new(config)?;
    chart.load()?;
    if args.percent {
        chart.set_filter(chartflow::pipeline::DISPLAY_AXIS, "percent")?;
    }
    chart.warm_all()?;
    let view = chart.view()?;

    if let Some(notice) = &view.notice {
        eprintln!("note: {notice}");
    }
    print_table(&view.series);
    for (key, color) in &view.colors {
        println!("# {key}: {}", color.hex());
    }

    if let Some(out) = &args.out {
        let format = match (&args.format, out.extension().and_then(|s| s.to_str())) {
            (Some(OutFormat::Csv), _) | (None, Some("csv")) => OutFormat::Csv,
            (Some(OutFormat::Json), _) | (None, Some("json")) => OutFormat::Json,
            _ => OutFormat::Csv,
        };
        match format {
            OutFormat::Csv => storage::save_csv(&view.series, out)
                .with_context(|| format!("write {}", out.display()))?,
            OutFormat::Json => storage::save_json(&view.series, out)
                .with_context(|| format!("write {}", out.display()))?,
        }
        println!("saved {}", out.display());
    }
    Ok(())
}

fn print_table(view: &chartflow::SeriesView) {
    if view.is_empty() {
        println!("(no data)");
        return;
    }
    let header: Vec<&str> = std::iter::once("x")
        .chain(view.series_keys.iter().map(String::as_str))
        .collect();
    println!("{}", header.join("\t"));
    for row in &view.rows {
        let mut cells = vec![row.x.canonical()];
        for key in &view.series_keys {
            cells.push(match row.value(key) {
                Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                    (v as i64).to_formatted_string(&Locale::en)
                }
                Some(v) => format!("{v:.2}"),
                None => String::from("-"),
            });
        }
        println!("{}", cells.join("\t"));
    }
}
