mod input;
mod options;

use anyhow::{Error as AnyError, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use options::{Cli, Command as CliCmd, Link, LinkOutput, Matrix, Plan};
use propah::{
    fresnel::fresnel_corridor,
    planner::{fetch_profiles, greedy_cover, grid_targets, CoverageGraph},
    run_matrix_with, Cancel, LinkConfig, LinkReport, MatrixConfig, ReportRow,
};
use serde::Serialize;
use serde_json::json;
use std::{
    fs::File,
    io::{BufWriter, Write},
    time::Duration,
};
use terrain::OpenTopoData;
use textplots::{Chart, Plot, Shape};

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let Cli { radio, cmd } = Cli::parse();

    env_logger::init();

    let link = radio.link_config()?;
    let source = OpenTopoData::from_env().with_timeout(Duration::from_secs(30))?;
    info!("terrain from {}", source.url());

    match cmd {
        CliCmd::Link(args) => run_link(args, link, &source).await,
        CliCmd::Matrix(args) => run_batch(args, link, &source).await,
        CliCmd::Plan(args) => run_plan(args, link, &source).await,
    }
}

/// Stops issuing terrain requests on ^C.
fn cancel_on_ctrl_c() -> Cancel {
    let cancel = Cancel::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });
    cancel
}

async fn run_link(args: Link, link: LinkConfig, source: &OpenTopoData) -> Result<()> {
    let Link {
        start,
        dest,
        samples,
        output,
    } = args;
    let link = LinkConfig {
        tx_alt_m: start.1,
        rx_alt_m: dest.1,
        ..link
    };
    let (_, report) = link.fetch_and_evaluate(source, start.0, dest.0, samples).await?;

    match output {
        LinkOutput::Summary => print_summary(&report)?,
        LinkOutput::Csv => print_csv(&report)?,
        LinkOutput::Json => print_json(&report)?,
        LinkOutput::Plot => plot_ascii(&report),
        LinkOutput::Corridor { steps } => {
            let freq_mhz = link.radio.freq_mhz;
            let corridor = fresnel_corridor(start.0.into(), dest.0.into(), freq_mhz, steps);
            let ring: Vec<[f64; 2]> = corridor.exterior().coords().map(|c| [c.x, c.y]).collect();
            println!(
                "{}",
                json!({ "type": "Polygon", "coordinates": [ring] })
            );
        }
    };
    Ok(())
}

fn print_summary(report: &LinkReport) -> Result<()> {
    let verdict = &report.analysis.verdict;
    let budget = &report.budget;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "status:          {}", report.status)?;
    writeln!(stdout, "distance:        {:.3} km", report.distance_km)?;
    writeln!(stdout, "quality:         {}", verdict.quality)?;
    writeln!(stdout, "obstructed:      {}", verdict.is_obstructed)?;
    writeln!(stdout, "min clearance:   {:.2} m", verdict.min_clearance_m)?;
    writeln!(stdout, "fresnel ratio:   {:.2}", verdict.worst_fresnel_ratio)?;
    writeln!(stdout, "path loss:       {:.2} dB", budget.fspl_db)?;
    writeln!(stdout, "rx signal:       {:.2} dBm", budget.rx_signal_dbm)?;
    writeln!(stdout, "sensitivity:     {:.2} dBm", budget.sensitivity_dbm)?;
    writeln!(stdout, "margin:          {:.2} dB", budget.margin_db)?;
    Ok(())
}

/// # Example with gnuplot
///
/// ```sh
/// cargo run -- link --start=44.283,-71.308,10 --dest=44.256,-71.297,10 csv \
///     | tr ',' ' ' > ~/.tmp/plot
/// gnuplot -p -e "plot for [col=4:5] '~/.tmp/plot' using 1:col with lines"
/// ```
fn print_csv(report: &LinkReport) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "Distance,Elevation,Bulge,Terrain,LOS,Fresnel,Clearance,Ratio"
    )?;
    for s in &report.analysis.samples {
        writeln!(
            stdout,
            "{},{},{},{},{},{},{},{}",
            s.distance_km,
            s.elevation_m,
            s.earth_bulge_m,
            s.effective_terrain_m,
            s.los_m,
            s.fresnel_radius_m,
            s.clearance_m,
            s.fresnel_ratio,
        )?;
    }
    Ok(())
}

fn print_json(report: &LinkReport) -> Result<()> {
    #[derive(Serialize)]
    struct JsonReport<'a> {
        status: propah::LinkStatus,
        distance_km: f64,
        verdict: &'a propah::LinkVerdict,
        budget: &'a propah::LinkBudget,
        samples: &'a [propah::p2p::AnnotatedSample],
    }

    let json = serde_json::to_string(&JsonReport {
        status: report.status,
        distance_km: report.distance_km,
        verdict: &report.analysis.verdict,
        budget: &report.budget,
        samples: &report.analysis.samples,
    })?;
    println!("{json}");
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn plot_ascii(report: &LinkReport) {
    let series = |f: fn(&propah::p2p::AnnotatedSample) -> f64| -> Vec<(f32, f32)> {
        report
            .analysis
            .samples
            .iter()
            .map(|s| (s.distance_km as f32, f(s) as f32))
            .collect()
    };
    let terrain = series(|s| s.effective_terrain_m);
    let los = series(|s| s.los_m);
    let fresnel = series(|s| s.los_m - s.fresnel_radius_m);
    Chart::new(300, 150, 0.0, report.distance_km.max(f64::EPSILON) as f32)
        .lineplot(&Shape::Lines(&terrain))
        .lineplot(&Shape::Lines(&los))
        .lineplot(&Shape::Lines(&fresnel))
        .display();
}

async fn run_batch(args: Matrix, link: LinkConfig, source: &OpenTopoData) -> Result<()> {
    let nodes = input::read_nodes(&args.nodes)?;
    let cfg = MatrixConfig {
        link: LinkConfig {
            tx_alt_m: args.height.unwrap_or(link.tx_alt_m),
            ..link
        },
        samples: args.samples,
        min_request_interval_ms: args.interval_ms,
        fetch_timeout_ms: args.timeout_ms,
    };

    let cancel = cancel_on_ctrl_c();

    let total = nodes.len() * nodes.len().saturating_sub(1) / 2;
    let pb = ProgressBar::new(total as u64);
    pb.set_prefix("Evaluating links");
    pb.set_style(
        ProgressStyle::with_template("{prefix}... {pos}/{len}\n[{wide_bar:.cyan/blue}]")?
            .progress_chars("#>-"),
    );
    let rows = run_matrix_with(&nodes, &cfg, source, &cancel, |_| pb.inc(1)).await;
    pb.finish();

    let mut out: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    writeln!(out, "{}", ReportRow::CSV_HEADER)?;
    for row in &rows {
        writeln!(out, "{}", row.to_csv_record())?;
    }
    out.flush()?;

    if rows.len() < total {
        eprintln!("cancelled: {} of {total} pairs written", rows.len());
    }
    Ok(())
}

async fn run_plan(args: Plan, link: LinkConfig, source: &OpenTopoData) -> Result<()> {
    let sites = input::read_sites(&args.sites)?;
    let area = input::read_area(&args.area)?;
    let targets = grid_targets(&area, args.spacing);
    info!("plan; sites: {}, targets: {}", sites.len(), targets.len());

    let cancel = cancel_on_ctrl_c();
    let profiles = fetch_profiles(
        &sites,
        &targets,
        args.samples,
        Duration::from_millis(args.interval_ms),
        Duration::from_millis(args.timeout_ms),
        source,
        &cancel,
    )
    .await;
    let link = LinkConfig {
        rx_alt_m: args.target_height,
        ..link
    };
    let graph = CoverageGraph::build(&sites, targets.len(), &link, &profiles);
    let cover = greedy_cover(&graph);

    let selected: Vec<_> = cover.selected.iter().map(|&idx| &sites[idx]).collect();
    println!(
        "{}",
        json!({
            "selected": selected,
            "targets": targets.len(),
            "covered_fraction": cover.covered_fraction,
        })
    );
    Ok(())
}
