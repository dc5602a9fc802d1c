//! Command-line driver: runs a generated workload through the simulator

use std::process::ExitCode;
use os_sched::config::{CommandLine, USAGE};
use os_sched::simulator::{Simulator, SimulatorConfig, Workload};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match CommandLine::parse(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{}\n", err);
            eprint!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    println!("running with {}", cli.scheduler.policy);
    let workload = Workload::random(cli.jobs, cli.seed);
    let simulator = Simulator::new(SimulatorConfig::new(cli.scheduler));

    match simulator.run(workload) {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            if err.is_usage() {
                eprint!("{}", USAGE);
                return ExitCode::from(2);
            }
            ExitCode::FAILURE
        }
    }
}
