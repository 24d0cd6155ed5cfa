/*!

Reports the size and shape of every foreground zone, and how many units are in it.

For a zone named `High` the variables are `zonesAreaHigh`, `zonesPerimeterHigh`,
`zonesFragmentsHigh` and `unitsInZoneHigh`.

*/

use crate::{
    context::Context,
    event::{Event, EventKind, EventQueue},
    module::{SimModule, unexpected_event},
    reporting::{ContextReportingExt, Frequency},
    zone::ZoneId,
};
use std::fmt::{self, Display, Formatter};

const EVENTS: &[EventKind] = &[EventKind::BeforeAnySimulations, EventKind::EndOfDay2];

struct ZoneOutputs {
    zone: ZoneId,
    area: String,
    perimeter: String,
    fragments: String,
    units: String,
}

#[derive(Default)]
pub struct ZoneMonitor {
    outputs: Vec<ZoneOutputs>,
}

impl ZoneMonitor {
    #[must_use]
    pub fn new() -> Self {
        ZoneMonitor::default()
    }

    fn declare(&mut self, context: &mut Context) {
        self.outputs = context
            .zones()
            .iter()
            .filter(|zone| !zone.is_background())
            .map(|zone| ZoneOutputs {
                zone: zone.id(),
                area: format!("zonesArea{}", zone.name()),
                perimeter: format!("zonesPerimeter{}", zone.name()),
                fragments: format!("zonesFragments{}", zone.name()),
                units: format!("unitsInZone{}", zone.name()),
            })
            .collect();
        for outputs in &self.outputs {
            for name in [&outputs.area, &outputs.perimeter, &outputs.fragments, &outputs.units] {
                context.declare_output(name, Frequency::Daily);
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn update(&self, context: &mut Context) {
        for outputs in &self.outputs {
            let zones = context.zones();
            let Some(zone) = zones.get(outputs.zone) else {
                continue;
            };
            let area = zone.area();
            let perimeter = zone.perimeter();
            let fragments = zone.contour_count() as f64;
            let units = zones.membership().iter().filter(|f| f.zone == outputs.zone).count() as f64;

            context.set_output(&outputs.area, area);
            context.set_output(&outputs.perimeter, perimeter);
            context.set_output(&outputs.fragments, fragments);
            context.set_output(&outputs.units, units);
        }
    }
}

impl SimModule for ZoneMonitor {
    fn name(&self) -> &'static str {
        "zone-monitor"
    }

    fn events_listened_for(&self) -> &'static [EventKind] {
        EVENTS
    }

    fn run(&mut self, context: &mut Context, event: &Event, _queue: &mut EventQueue) {
        match *event {
            Event::BeforeAnySimulations => self.declare(context),
            Event::EndOfDay2 { .. } => self.update(context),
            _ => unexpected_event(self, event),
        }
    }
}

impl Display for ZoneMonitor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} watching {} zone(s)>", self.name(), self.outputs.len())
    }
}
