use chrono::{DateTime, Local, TimeDelta};
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::schedule::{Demand, IntervalState, Origin, TimeframeInterval};

pub fn build_queue_table(now: DateTime<Local>, intervals: &[TimeframeInterval]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec![
        "Interval", "Origin", "Date", "Start", "End", "Demand", "State", "Progress", "Remaining",
    ]);
    for interval in intervals {
        table.add_row(vec![
            Cell::new(interval.id).add_attribute(Attribute::Dim),
            Cell::new(interval.origin).fg(match interval.origin {
                Origin::Manual => Color::Magenta,
                Origin::Schedule => Color::Reset,
                Origin::Optional => Color::DarkYellow,
            }),
            Cell::new(interval.window.start().format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(interval.window.start().format("%H:%M")),
            Cell::new(interval.window.end().format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(format_demand(&interval.demand)),
            match interval.state {
                IntervalState::Active { since } => {
                    Cell::new(format!("active since {}", since.format("%H:%M"))).fg(Color::Green)
                }
                IntervalState::Queued if interval.window.contains(now) => {
                    Cell::new("queued").fg(Color::DarkYellow)
                }
                IntervalState::Queued => Cell::new("queued").add_attribute(Attribute::Dim),
                IntervalState::Expired => Cell::new("expired").fg(Color::Red),
            },
            Cell::new(format_progress(interval)).set_alignment(CellAlignment::Right),
            Cell::new(format_remaining(interval)).set_alignment(CellAlignment::Right).fg(
                if interval.is_satisfied() { Color::Green } else { Color::Reset },
            ),
        ]);
    }
    table
}

fn format_demand(demand: &Demand) -> String {
    match demand {
        Demand::Runtime { min: Some(min), max } => {
            format!("run {}..{}", format_duration(*min), format_duration(*max))
        }
        Demand::Runtime { min: None, max } => format!("run ≤{}", format_duration(*max)),
        Demand::Energy { required } => format!("{required}"),
        Demand::StateOfCharge { target, .. } => format!("charge to {target}"),
    }
}

fn format_progress(interval: &TimeframeInterval) -> String {
    if interval.demand.runtime_target().is_some() {
        format_duration(interval.consumed_runtime)
    } else {
        format!("{:.0}", interval.consumed_energy)
    }
}

fn format_remaining(interval: &TimeframeInterval) -> String {
    if let Some(remaining) = interval.remaining_runtime() {
        format_duration(remaining)
    } else if let Some(remaining) = interval.remaining_energy() {
        format!("{remaining:.0}")
    } else {
        "unresolved".to_owned()
    }
}

fn format_duration(duration: TimeDelta) -> String {
    format!("{}:{:02}", duration.num_hours(), duration.num_minutes() % 60)
}
