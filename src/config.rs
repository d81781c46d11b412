//! TOML appliance configuration.
//!
//! Everything here is plain deserialized data, [`ApplianceConfig::build`] validates it into the
//! engine types.

use std::{fs, path::Path};

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};

use crate::{
    appliance::Appliance,
    charger::{ElectricVehicle, VehicleId},
    control::{Control, MeterReportingSwitch, StartingCurrentDetector},
    event::EventBus,
    prelude::*,
    quantity::{energy::WattHours, percent::Percent, power::Watts},
    schedule::{DayTimeframe, Demand, DemandRequest, Origin, Schedule, TimeWindow, Timeframe},
};

#[must_use]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplianceConfig {
    /// Appliance identifier, for example `F-00000001-000000000001-00`.
    pub id: String,

    /// Consideration horizon in days.
    #[serde(default = "ApplianceConfig::default_horizon_days")]
    pub horizon_days: u32,

    #[serde(default)]
    pub control: ControlConfig,

    /// Running detection from the metered power.
    pub meter: Option<MeterConfig>,

    pub vehicle: Option<VehicleConfig>,

    #[serde(default, rename = "schedule")]
    pub schedules: Vec<ScheduleConfig>,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ControlConfig {
    #[default]
    Switch,

    AlwaysOn,

    StartingCurrent {
        power_threshold: Watts,

        #[serde_as(as = "DurationSeconds<i64>")]
        detection_duration: TimeDelta,
    },
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeterConfig {
    pub power_threshold: Option<Watts>,

    #[serde_as(as = "Option<DurationSeconds<i64>>")]
    pub off_detection_delay: Option<TimeDelta>,
}

#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VehicleConfig {
    pub id: VehicleId,
    pub battery_capacity: WattHours,
    pub charge_loss: Option<Percent>,
    pub initial_state_of_charge: Option<Percent>,
    pub optional_energy_target: Option<Percent>,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    pub daily: Option<DailyConfig>,
    pub once: Option<OnceConfig>,

    #[serde_as(as = "Option<DurationSeconds<i64>>")]
    pub min_running_time: Option<TimeDelta>,

    #[serde_as(as = "Option<DurationSeconds<i64>>")]
    pub max_running_time: Option<TimeDelta>,

    pub demand: DemandConfig,

    /// Restrict the schedule to a single vehicle.
    pub vehicle: Option<VehicleId>,
}

#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DailyConfig {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnceConfig {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[serde_as]
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum DemandConfig {
    /// Running time, taken from the schedule when not given here.
    Runtime {
        #[serde_as(as = "Option<DurationSeconds<i64>>")]
        #[serde(default)]
        min: Option<TimeDelta>,

        #[serde_as(as = "Option<DurationSeconds<i64>>")]
        #[serde(default)]
        max: Option<TimeDelta>,
    },

    Energy {
        required: WattHours,
    },

    StateOfCharge {
        target: Percent,
    },
}

/// Manual request issued from a scenario.
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    pub demand: DemandConfig,
    pub end: Option<NaiveDateTime>,
}

impl ApplianceConfig {
    const fn default_horizon_days() -> u32 {
        2
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read(path: &Path) -> Result<Self> {
        info!("reading the configuration…");
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to load `{}`", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse the configuration")
    }

    pub fn electric_vehicle(&self) -> Result<Option<ElectricVehicle>> {
        self.vehicle
            .map(|vehicle| {
                ElectricVehicle::builder()
                    .id(vehicle.id)
                    .battery_capacity(vehicle.battery_capacity)
                    .maybe_charge_loss(vehicle.charge_loss)
                    .maybe_initial_state_of_charge(vehicle.initial_state_of_charge)
                    .maybe_optional_energy_target(vehicle.optional_energy_target)
                    .build()
                    .context("invalid vehicle")
            })
            .transpose()
    }

    pub fn build_schedules(&self, vehicle: Option<&ElectricVehicle>) -> Result<Vec<Schedule>> {
        self.schedules
            .iter()
            .enumerate()
            .map(|(index, schedule)| {
                schedule.build(vehicle).with_context(|| format!("invalid schedule #{}", index + 1))
            })
            .collect()
    }

    pub fn build_control(&self) -> Result<Control> {
        Ok(match self.control {
            ControlConfig::Switch => Control::switch(),
            ControlConfig::AlwaysOn => Control::AlwaysOn,
            ControlConfig::StartingCurrent { power_threshold, detection_duration } => {
                Control::starting_current(
                    StartingCurrentDetector::builder()
                        .power_threshold(power_threshold)
                        .detection_duration(detection_duration)
                        .build()
                        .context("invalid starting current detection")?,
                )
            }
        })
    }

    /// Validate the configuration into an appliance.
    pub fn build(&self, events: EventBus) -> Result<Appliance> {
        let vehicle = self.electric_vehicle()?;
        let running_detector = self
            .meter
            .as_ref()
            .map(|meter| {
                MeterReportingSwitch::builder()
                    .maybe_power_threshold(meter.power_threshold)
                    .maybe_off_detection_delay(meter.off_detection_delay)
                    .build()
                    .context("invalid meter")
            })
            .transpose()?;
        Appliance::builder()
            .id(self.id.clone())
            .control(self.build_control()?)
            .schedules(self.build_schedules(vehicle.as_ref())?)
            .horizon_days(self.horizon_days)
            .maybe_running_detector(running_detector)
            .maybe_vehicle(vehicle)
            .events(events)
            .build()
            .context("invalid appliance")
    }
}

impl ScheduleConfig {
    fn build(&self, vehicle: Option<&ElectricVehicle>) -> Result<Schedule> {
        let timeframe = match (self.daily, self.once) {
            (Some(daily), None) => Timeframe::Daily(
                DayTimeframe::builder()
                    .start(daily.start)
                    .end(daily.end)
                    .maybe_min_running_time(self.min_running_time)
                    .maybe_max_running_time(self.max_running_time)
                    .build()?,
            ),
            (None, Some(once)) => Timeframe::Once(
                TimeWindow::builder()
                    .start(to_local(once.start)?)
                    .end(to_local(once.end)?)
                    .maybe_min_running_time(self.min_running_time)
                    .maybe_max_running_time(self.max_running_time)
                    .build()?,
            ),
            _ => bail!("exactly one of `daily` and `once` must be set"),
        };
        let demand = self.demand.build(vehicle, self.min_running_time, self.max_running_time)?;
        Ok(Schedule { timeframe, demand, target: self.vehicle })
    }
}

impl DemandConfig {
    /// Build the demand, runtime limits fall back to the given ones.
    pub fn build(
        self,
        vehicle: Option<&ElectricVehicle>,
        min_running_time: Option<TimeDelta>,
        max_running_time: Option<TimeDelta>,
    ) -> Result<Demand> {
        Ok(match self {
            Self::Runtime { min, max } => {
                let min = min.or(min_running_time);
                let Some(max) = max.or(max_running_time).or(min) else {
                    bail!("runtime demand needs a minimum or a maximum running time");
                };
                Demand::runtime(min, max)?
            }
            Self::Energy { required } => Demand::energy(required)?,
            Self::StateOfCharge { target } => {
                let vehicle = vehicle.context("state of charge demand needs a vehicle")?;
                Demand::state_of_charge(target, vehicle.battery_capacity)?
            }
        })
    }
}

impl RequestConfig {
    pub fn build(self, vehicle: Option<&ElectricVehicle>) -> Result<DemandRequest> {
        Ok(DemandRequest::builder()
            .demand(self.demand.build(vehicle, None, None)?)
            .origin(Origin::Manual)
            .maybe_target(vehicle.map(|vehicle| vehicle.id))
            .maybe_end(self.end.map(to_local).transpose()?)
            .build())
    }
}

/// Interpret a naive timestamp in the local timezone.
pub fn to_local(timestamp: NaiveDateTime) -> Result<DateTime<Local>> {
    timestamp
        .and_local_timezone(Local)
        .earliest()
        .with_context(|| format!("`{timestamp}` does not exist in the local timezone"))
}
