use clap::{Args, Parser, Subcommand};
use httptraffic_core::{Experiment, RuntimeVariable, TrafficSummary, VariableKind};
use log::info;
use std::path::PathBuf;

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one experiment and print its traffic summary
    Run(RunArgs),
    /// Print the reference mean of every traffic variable
    Means(MeansArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Experiment file (JSON); omitted fields keep their defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the run number that seeds every random stream
    #[arg(long)]
    pub run_no: Option<u64>,
    /// Override the number of clients
    #[arg(long)]
    pub clients: Option<u32>,
    /// Override the stop time, in seconds
    #[arg(long)]
    pub stop: Option<f64>,
    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MeansArgs {
    /// Flow arrival rate (sessions per second)
    #[arg(long, default_value_t = 1.0)]
    pub rate: f64,
}

const ALL_KINDS: [VariableKind; 11] = [
    VariableKind::FlowArrive,
    VariableKind::NumPages,
    VariableKind::ObjsPerPage,
    VariableKind::SingleObj,
    VariableKind::PersistRspSize,
    VariableKind::NonPersistRspSize,
    VariableKind::ReqSize,
    VariableKind::TimeBtwnPages,
    VariableKind::TimeBtwnObjs,
    VariableKind::ServerDelay,
    VariableKind::Persistent,
];

pub fn run_experiment(args: RunArgs) -> CliResult {
    let mut exp = match &args.config {
        Some(path) => Experiment::load(path)?,
        None => Experiment::default(),
    };
    if let Some(run_no) = args.run_no {
        exp.run_no = run_no;
    }
    if let Some(clients) = args.clients {
        exp.clients = clients;
    }
    if let Some(stop) = args.stop {
        exp.stop = stop;
    }
    info!("run {}: {} clients until {}s", exp.run_no, exp.clients, exp.stop);

    let mut bed = exp.build()?;
    let summary = bed.run();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(s: &TrafficSummary) {
    println!("sessions completed   {}", s.sessions_completed);
    println!("pages completed      {}", s.pages_completed);
    println!("objects received     {}", s.objects_received);
    println!("requests served      {}", s.requests_served);
    println!("connections opened   {}", s.connections_opened);
    println!("bytes requested      {}", s.bytes_requested);
    println!("bytes received       {}", s.bytes_received);
    println!("delivery failures    {}", s.delivery_failures);
    let rt = &s.response_times;
    println!(
        "response time (ms)   mean {:.3}  p50 {:.3}  p99 {:.3}  max {:.3}",
        rt.mean_ms, rt.p50_ms, rt.p99_ms, rt.max_ms
    );
}

pub fn print_means(args: MeansArgs) -> CliResult {
    let rv = RuntimeVariable::with_rate(1, args.rate)?;
    for kind in ALL_KINDS {
        println!("{:<18} {:>14.4}", format!("{kind:?}"), rv.average(kind));
    }
    let flow = rv.model().variable(VariableKind::FlowArrive);
    println!("{:<18} {:>14.4}", "FlowArrive[burst]", flow.average_of(0));
    println!("{:<18} {:>14.4}", "FlowArrive[idle]", flow.average_of(1));
    Ok(())
}
