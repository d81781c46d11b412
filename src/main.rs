mod cli;

use appliance_scheduler::{
    clock::{Clock, SystemClock},
    config::ApplianceConfig,
    event::EventBus,
    prelude::*,
    simulation::{Scenario, Simulation},
    tables::build_queue_table,
};
use clap::{Parser, crate_version};
use itertools::Itertools;

use crate::cli::{Args, Command, ConfigArgs, SimulateArgs};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();

    match args.command {
        Command::Check(args) => check(&args)?,
        Command::Simulate(args) => simulate(&args)?,
    }

    info!("done!");
    Ok(())
}

fn check(args: &ConfigArgs) -> Result {
    let config = ApplianceConfig::read(&args.path)?;
    let appliance = config.build(EventBus::default())?;
    info!(
        id = appliance.id(),
        control = ?appliance.control(),
        horizon = %appliance.handler().horizon(),
        "configuration is valid",
    );
    let vehicle = config.electric_vehicle()?;
    if let Some(vehicle) = vehicle {
        info!(
            id = %vehicle.id,
            battery_capacity = %vehicle.battery_capacity,
            charge_loss = %vehicle.charge_loss,
            optional_energy_target = %vehicle.optional_energy_target,
            "vehicle",
        );
    }
    for (index, schedule) in appliance.handler().schedules().iter().enumerate() {
        let current_window = schedule
            .timeframe
            .window_at(SystemClock.now())
            .map_or_else(|| "none".to_owned(), |window| format!("{:?}", window.interval()));
        info!(
            index,
            timeframe = ?schedule.timeframe,
            demand = ?schedule.demand,
            target = ?schedule.target,
            %current_window,
            "schedule",
        );
    }
    Ok(())
}

fn simulate(args: &SimulateArgs) -> Result {
    let config = ApplianceConfig::read(&args.config.path)?;
    let scenario = Scenario::read(&args.scenario_path)?;
    let mut simulation = Simulation::new(&config)?;

    for tick in &scenario.ticks {
        let step = simulation.step(tick)?;
        info!(
            at = %step.at,
            on = step.on,
            metered_energy = %step.metered_energy,
            completed = %step.update.completed.iter().join(", "),
            expired = %step.update.expired.iter().join(", "),
            remaining_min_running_time = %step.remaining_min_running_time,
            charging_state = ?simulation.appliance().charging_state(),
            "ticked",
        );
        for event in &step.events {
            info!(?event, "event");
        }
        if !args.quiet || !step.events.is_empty() {
            println!("{}", build_queue_table(step.at, simulation.appliance().queue_snapshot()));
        }
    }
    Ok(())
}
