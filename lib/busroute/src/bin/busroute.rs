use json::JsonValue;
use rayon::ThreadPoolBuilder;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};
use tracing::*;

use busroute::*;
use busroute::config::{PlanConfig, ClassifierKind, SplitPolicy, InputPolicy, CLASSIFIER_STRINGS, SPLIT_POLICY_STRINGS};
use busroute::data::{get_school_instance_by_index, get_school_instance_by_name, get_school_instance_from_files};
use busroute::data::school::{Coord, SchoolInstance};
use busroute::pipeline::{self, PlanInput, PlanOutcome};
use busroute::report::{MetricValue, RouteDetail};

mod common;
use common::*;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct ClArgs {
    /// Dataset instance under $DATA_ROOT/SCHOOL, by index or name
    #[structopt(required_unless="roster")]
    instance: Option<String>,
    /// Roster file to plan for instead of a dataset instance
    #[structopt(long, requires="graph", conflicts_with="instance")]
    roster: Option<PathBuf>,
    /// Road graph file that goes with --roster
    #[structopt(long, requires="roster")]
    graph: Option<PathBuf>,
    #[structopt(long, short="c", default_value="1", validator=clap_range_validator(Some(1), None))]
    cpus: usize,
    #[structopt(long, short="q", default_value="40", validator=clap_range_validator(Some(1), None))]
    capacity: u32,
    #[structopt(long="max-fleet", short="n", default_value="60", validator=clap_range_validator(Some(1), None))]
    max_fleet: u32,
    #[structopt(long="min-fleet", validator=clap_range_validator(Some(1), None))]
    min_fleet: Option<u32>,
    #[structopt(long, parse(try_from_str), possible_values=CLASSIFIER_STRINGS, default_value="geodesic")]
    classifier: ClassifierKind,
    #[structopt(long, parse(try_from_str), possible_values=SPLIT_POLICY_STRINGS, default_value="even")]
    split: SplitPolicy,
    /// Drop invalid roster rows instead of rejecting the roster
    #[structopt(long)]
    lenient: bool,
    /// Maximum walk from home to stop, km
    #[structopt(long="max-walk", default_value="1.0", validator=clap_range_validator(Some(0.01), None))]
    max_walk: f64,
    #[structopt(long="k-max", default_value="30", validator=clap_range_validator(Some(1), None))]
    k_max: usize,
    #[structopt(long, default_value="42")]
    seed: u64,
    /// Solver time limit per fleet size, seconds
    #[structopt(long, default_value="30", validator=clap_range_validator(Some(1), None))]
    budget: u64,
    /// Try all fleet sizes at once
    #[structopt(long)]
    parallel: bool,
    #[structopt(flatten)]
    output: OutputOptions,
}

impl ClArgs {
    fn plan_config(&self) -> PlanConfig {
        PlanConfig {
            capacity: self.capacity,
            max_fleet: self.max_fleet,
            min_fleet: self.min_fleet,
            classifier: self.classifier,
            split_policy: self.split,
            input_policy: if self.lenient { InputPolicy::Lenient } else { InputPolicy::Strict },
            max_stop_distance_km: self.max_walk,
            k_max: self.k_max,
            seed: self.seed,
            solver_budget: Duration::from_secs(self.budget),
            parallel_attempts: self.parallel,
            ..PlanConfig::default()
        }
    }

    fn load_instance(&self) -> Result<SchoolInstance> {
        if let (Some(roster), Some(graph)) = (&self.roster, &self.graph) {
            return get_school_instance_from_files(roster, graph)
        }
        let name = self.instance.as_deref().context("no instance given")?;
        match name.parse::<usize>() {
            Ok(idx) => get_school_instance_by_index(idx),
            Err(_) => get_school_instance_by_name(name),
        }
    }
}


fn coord(c: Coord) -> JsonValue {
    json::array![c.lat, c.lon]
}

fn metric_value(v: &MetricValue) -> JsonValue {
    match v {
        MetricValue::Count(n) => (*n).into(),
        MetricValue::Number(x) => (*x).into(),
        MetricValue::Text(s) => s.as_str().into(),
        MetricValue::Buses(b) => json::object! {
            count: b.len(),
            bus_ids: JsonValue::from(b.clone()),
        },
    }
}

fn route_record(r: &RouteDetail) -> JsonValue {
    let stops: Vec<JsonValue> = r.stops.iter()
        .map(|v| {
            let students: Vec<JsonValue> = v.students.iter()
                .map(|s| json::object! {
                    student_id: s.id.as_str(),
                    name: s.name.as_str(),
                    latitude: s.home.lat,
                    longitude: s.home.lon,
                })
                .collect();
            json::object! {
                sequence_number: v.seq,
                stop_id: v.stop.to_string(),
                latitude: v.centroid.lat,
                longitude: v.centroid.lon,
                snapped: coord(v.snapped),
                students: students,
            }
        })
        .collect();
    let polyline: Vec<JsonValue> = r.polyline.iter().map(|&c| coord(c)).collect();
    json::object! {
        bus_number: r.bus,
        total_students: r.total_students,
        total_distance_km: r.distance_km,
        estimated_duration_hr: r.duration_hours,
        stops: stops,
        polyline: polyline,
    }
}

fn overview(outcome: &PlanOutcome) -> JsonValue {
    let records: Vec<JsonValue> = outcome.report.overview.iter()
        .map(|m| json::object! { metric: m.name, value: metric_value(&m.value) })
        .collect();
    records.into()
}

fn warnings(outcome: &PlanOutcome) -> JsonValue {
    let w: Vec<String> = outcome.warnings.iter().map(|w| w.to_string()).collect();
    w.into()
}

impl PlanOutput for PlanOutcome {
    fn write_json(&self, mut buf: impl Write) -> Result<()> {
        let walkers: Vec<JsonValue> = self.students.iter()
            .filter(|s| !s.is_rider())
            .map(|s| json::object! { student_id: s.id.as_str(), name: s.name.as_str(), distance_km: s.distance_to_depot_km })
            .collect();
        let routes: Vec<JsonValue> = self.report.routes.iter().map(route_record).collect();
        let root = json::object! {
            overview: overview(self),
            routes: routes,
            walkers: walkers,
            warnings: warnings(self),
        };
        root.write_pretty(&mut buf, 2)?;
        return Ok(())
    }

    fn write_json_summary(&self, mut buf: impl Write) -> Result<()> {
        let attempts: Vec<JsonValue> = self.plan.attempts.iter()
            .map(|&(k, used)| json::object! { vehicles: k, used: used })
            .collect();
        let root = json::object! {
            overview: overview(self),
            theoretical_min: self.plan.theoretical_min,
            buses_used: self.plan.used(),
            chosen_k: self.clusters.chosen_k,
            repair_passes: self.clusters.repair.passes,
            attempts: attempts,
            warnings: warnings(self),
        };
        root.write_pretty(&mut buf, 2)?;
        return Ok(())
    }
}


fn main() -> Result<()> {
    let args : ClArgs = StructOpt::from_args();
    let _g = init_logging(args.output.log.clone())?;
    debug!(?args);
    ThreadPoolBuilder::new().num_threads(args.cpus).build_global().context("failed to construct thread pool")?;

    let instance = args.load_instance()?;
    let config = args.plan_config();
    info!(instance=%instance.id, students=instance.roster.len(), nodes=instance.road.num_nodes(), "loaded instance");

    let outcome = pipeline::plan(&PlanInput::from_instance(&instance), &config)
        .with_context(|| format!("no plan for instance {}", instance.id))?;
    output_plan(&args.output, &outcome)?;
    Ok(())
}
