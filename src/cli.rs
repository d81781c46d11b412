use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate the appliance configuration and list its schedules.
    #[clap(name = "check")]
    Check(ConfigArgs),

    /// Replay a scenario of sensor readings and print the queue after each tick.
    #[clap(name = "simulate")]
    Simulate(SimulateArgs),
}

#[derive(Parser)]
pub struct ConfigArgs {
    /// Appliance configuration file.
    #[clap(env = "APPLIANCE_CONFIG")]
    pub path: PathBuf,
}

#[derive(Parser)]
pub struct SimulateArgs {
    #[clap(flatten)]
    pub config: ConfigArgs,

    /// Scenario file with the ticks to replay.
    #[clap(env = "APPLIANCE_SCENARIO")]
    pub scenario_path: PathBuf,

    /// Print the queue only for ticks that produced events.
    #[clap(long, env = "APPLIANCE_QUIET")]
    pub quiet: bool,
}
