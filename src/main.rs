use clap::Parser;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rfm::fm::fmatch;
use rfm::fm::model;
use rfm::fm::traj;
use rfm::store;
use rfm::store::PairSink;
use rfm::utils;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use wkt;

#[derive(Parser, Debug)]
#[command(name = "RFM")]
#[command(version = "0.1")]
#[command(about = "formation flight pair matching using rust", long_about = None)]
struct Args {
    /// spatial bucket size in degrees
    #[arg(long, default_value_t = 4.5)]
    grid_deg: f64,
    /// temporal bucket size in hours
    #[arg(long, default_value_t = 6.0)]
    time_bin: f64,
    /// max overall heading difference in degrees
    #[arg(long, default_value_t = 15.0)]
    tolerance: f64,
    /// max time apart at the crossing point in minutes
    #[arg(long, default_value_t = 360.0)]
    max_time_apart: f64,
    /// max formation detour in km
    #[arg(long, default_value_t = 100.0)]
    max_detour: f64,
    /// min formation duration in minutes
    #[arg(long, default_value_t = 0.0)]
    min_duration: f64,
    /// max enriched pairs to emit
    #[arg(long, default_value_t = 1000)]
    limit: usize,
    /// global candidate pair cap
    #[arg(long, default_value_t = 50000)]
    max_pairs: usize,
    /// rng seed for leader assignment
    #[arg(long)]
    seed: Option<u64>,
    /// output directory for jsonl results
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// input trajectories
    #[arg(value_name = "TRAJ_FILE")]
    input_file: PathBuf,
}

fn main() {
    utils::log::log_init();
    let args = Args::parse();
    debug!("{:?}", args);

    let config = model::Config {
        grid_deg: args.grid_deg,
        time_bin_hrs: args.time_bin,
        angle_tolerance: args.tolerance,
        max_time_gap_min: args.max_time_apart,
        max_detour_km: args.max_detour,
        min_duration_min: args.min_duration,
        limit: args.limit,
        max_pairs: args.max_pairs,
    };
    let mut engine = fmatch::FMatch::new(&config);

    // 检查文件后缀
    let ext = args.input_file.extension().unwrap();

    if ext == "csv" {
        info!("read csv file {} ", args.input_file.display());
        let file = File::open(&args.input_file).expect("open csv file failed: ");
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(BufReader::new(file));
        let records = reader
            .into_deserialize::<traj::TrackRecord>()
            .map(|rec| rec.map_err(anyhow::Error::from));
        engine.load(traj::TrajStream::new(records));
    } else if ext == "geojson" {
        info!("read geojson file {} ", args.input_file.display());
        let file = File::open(&args.input_file).expect("open geojson file failed: ");
        let reader = BufReader::new(file);
        let geojson = geojson::GeoJson::from_reader(reader).expect("read geojson failed: ");
        let trajs = traj::MultiTrajectory::try_from(geojson).expect("read trajectories failed: ");
        engine.load(trajs.trajs);
    } else if ext == "wkt" {
        info!("read wkt file {} ", args.input_file.display());
        let content = fs::read_to_string(&args.input_file).expect("read wkt file failed: ");
        let wkt: wkt::Wkt<f64> = content.as_str().parse().expect("read trajectories failed: ");
        let trajs: traj::MultiTrajectory = wkt.try_into().expect("read trajectories failed: ");
        engine.load(trajs.trajs);
    } else {
        panic!("trajectory file format not support");
    }

    let report = engine.match_all(&config);
    info!(
        "matched pairs: {} candidates: {} truncated: {}",
        report.pairs.len(),
        report.candidates_seen,
        report.truncated
    );

    let mut sink = store::JsonlSink::create(&args.output).expect("create sink failed: ");
    let written = store::write_batched(&report.pairs, |batch| sink.write_pairs(batch));
    info!("persisted {} matched pairs", written);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let enriched = engine.enrich(&report.pairs, &config, &mut rng);
    let written = store::write_batched(&enriched, |batch| sink.write_enriched(batch));
    info!("persisted {} enriched pairs", written);
}
