/*!

A discrete-event engine for simulating the spread and control of animal disease between
production units (farms, herds, premises).

Each unit follows a validated disease state machine driven by countdowns. Independent
sub-models (`modules`) talk to each other only through a shared, day-scoped event queue, and
every change they want to make to a unit is registered as a request that takes effect when the
unit steps at the end of the day. Surveillance zones grow incrementally as circular foci are
added around units, with stable fragment identities as separate areas merge.

```rust,no_run
use ixa_herd::{Context, IdentityTransform, Scenario, Scheduler, UnitList};

let scenario = Scenario::from_json_file("scenario.json")?;
let units = UnitList::load_population_csv("population.csv".as_ref(), &IdentityTransform)?;
let mut context = Context::with_units(units);
let mut scheduler = Scheduler::from_scenario(scenario, &mut context)?;
for summary in scheduler.run(&mut context) {
    println!("iteration {} ended on day {}", summary.number, summary.day);
}
# Ok::<(), ixa_herd::SimError>(())
```

*/

pub mod context;
pub mod delay_queue;
pub mod error;
pub mod event;
pub mod hashing;
pub mod log;
pub mod module;
pub mod module_loader;
pub mod modules;
pub mod notify;
pub mod parameters;
pub mod random;
pub mod rel_chart;
pub mod reporting;
pub mod scheduler;
pub mod unit;
pub mod zone;

pub use context::{Context, DataPlugin, IterationData};
pub use error::SimError;
pub use event::{Event, EventKind, EventQueue};
pub use hashing::{HashMap, HashSet};
pub use module::SimModule;
pub use notify::{Notification, NotificationSink};
pub use parameters::Scenario;
pub use random::ContextRandomExt;
pub use reporting::ContextReportingExt;
pub use scheduler::Scheduler;
pub use unit::{IdentityTransform, UnitId, UnitList, UnitState};
pub use zone::{FragmentId, ZoneId, ZoneList};

// Used by `define_rng!`.
pub use rand;
