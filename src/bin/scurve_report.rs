use anyhow::Context;
use clap::{Parser, ValueEnum};
use patent_scurve::core::aggregate::{records_from_hits, yearly_cumulative};
use patent_scurve::core::forecast::{SCurveForecaster, DEFAULT_FUTURE_YEARS};
use patent_scurve::core::ranker::{top_codes, TOP_CODE_LIMIT};
use patent_scurve::domain::model::{Forecast, SearchHit};
use patent_scurve::utils::logger;
use patent_scurve::ScurveError;
use std::io::Write;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Parser)]
#[command(name = "scurve-report")]
#[command(about = "Offline S-curve forecast from a saved /search response")]
struct Args {
    /// JSON file holding the hits returned by /search
    #[arg(long)]
    hits: String,

    /// CPC code to forecast; the top codes are used when omitted
    #[arg(long)]
    code: Option<String>,

    #[arg(long, default_value_t = DEFAULT_FUTURE_YEARS)]
    future_years: usize,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn write_csv<W: Write>(out: W, forecasts: &[Forecast]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["cpc_code", "year", "kind", "count"])?;

    for forecast in forecasts {
        for (year, count) in forecast.historical.points() {
            writer.write_record([
                forecast.code.as_str(),
                &year.to_string(),
                "historical",
                &count.to_string(),
            ])?;
        }
        for (year, predicted) in &forecast.future {
            writer.write_record([
                forecast.code.as_str(),
                &year.to_string(),
                "predicted",
                &format!("{:.3}", predicted),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let content = std::fs::read_to_string(&args.hits)
        .with_context(|| format!("failed to read {}", args.hits))?;
    let hits: Vec<SearchHit> =
        serde_json::from_str(&content).context("hits file is not a list of search hits")?;
    let records = records_from_hits(&hits);
    tracing::info!("Loaded {} hits ({} dated)", hits.len(), records.len());

    let codes: Vec<String> = match &args.code {
        Some(code) => vec![code.clone()],
        None => top_codes(&hits, TOP_CODE_LIMIT)
            .into_iter()
            .map(|entry| entry.0)
            .collect(),
    };

    let forecaster = SCurveForecaster::default();
    let mut forecasts = Vec::new();
    for code in &codes {
        let result = yearly_cumulative(&records, code)
            .and_then(|series| forecaster.forecast(code, &series, args.future_years));
        match result {
            Ok(forecast) => forecasts.push(forecast),
            // a single requested code must succeed; top codes are best-effort
            Err(e) if args.code.is_some() => return Err(e.into()),
            Err(e @ (ScurveError::NotFound { .. } | ScurveError::InsufficientData { .. })) => {
                tracing::warn!("Skipping {}: {}", code, e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let stdout = std::io::stdout();
    match args.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(stdout.lock(), &forecasts)?;
            println!();
        }
        OutputFormat::Csv => write_csv(stdout.lock(), &forecasts)?,
    }

    Ok(())
}
