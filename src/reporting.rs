/*!

Named output variables.

Modules declare variables in response to `BeforeAnySimulations` and update them as the
simulation runs. The scheduler then announces the full list in a `DeclarationOfOutputs` event,
so writers never need to know variable names in advance.

```rust
use ixa_herd::context::Context;
use ixa_herd::reporting::{ContextReportingExt, Frequency};

let mut context = Context::new();
context.declare_output("tsdUSusc", Frequency::Daily);
context.set_output("tsdUSusc", 120.0);
assert_eq!(context.output_value("tsdUSusc"), Some(120.0));
```

*/

use crate::context::{Context, DataPlugin};
use crate::log::debug;
use serde::{Deserialize, Serialize};

/// How often a variable is reported.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Never,
    /// At the end of each iteration.
    Once,
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Whether a variable with this frequency is reported on `day`. `last_day` marks the final
    /// day of an iteration, when every non-`Never` variable is reported.
    #[must_use]
    pub fn is_due(self, day: u32, last_day: bool) -> bool {
        match self {
            Frequency::Never => false,
            Frequency::Once => last_day,
            Frequency::Daily => true,
            Frequency::Weekly => last_day || day % 7 == 0,
            Frequency::Monthly => last_day || day % 30 == 0,
            Frequency::Yearly => last_day || day % 365 == 0,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub struct OutputDeclaration {
    pub name: String,
    pub frequency: Frequency,
}

#[derive(Clone, Debug)]
struct OutputVariable {
    declaration: OutputDeclaration,
    value: f64,
}

/// All declared variables in declaration order.
#[derive(Default, Debug)]
pub struct OutputRegistry {
    variables: Vec<OutputVariable>,
}

impl DataPlugin for OutputRegistry {
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self = &OutputRegistry::default;
}

impl OutputRegistry {
    fn position(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.declaration.name == name)
    }

    fn declare(&mut self, name: &str, frequency: Frequency) {
        match self.position(name) {
            Some(position) => self.variables[position].declaration.frequency = frequency,
            None => self.variables.push(OutputVariable {
                declaration: OutputDeclaration {
                    name: name.to_string(),
                    frequency,
                },
                value: 0.0,
            }),
        }
    }

    fn set(&mut self, name: &str, value: f64) {
        match self.position(name) {
            Some(position) => self.variables[position].value = value,
            None => debug!("output \"{name}\" set before it was declared; ignoring"),
        }
    }

    fn declarations(&self) -> Vec<OutputDeclaration> {
        self.variables.iter().map(|v| v.declaration.clone()).collect()
    }

    fn due(&self, day: u32, last_day: bool) -> Vec<(String, f64)> {
        self.variables
            .iter()
            .filter(|v| v.declaration.frequency.is_due(day, last_day))
            .map(|v| (v.declaration.name.clone(), v.value))
            .collect()
    }

    fn reset_values(&mut self) {
        for variable in &mut self.variables {
            variable.value = 0.0;
        }
    }
}

pub trait ContextReportingExt {
    /// Declares a variable. Declaring an existing name updates its frequency.
    fn declare_output(&mut self, name: &str, frequency: Frequency);

    /// Sets a declared variable. Undeclared names are ignored.
    fn set_output(&mut self, name: &str, value: f64);

    /// Adds to a declared variable.
    fn add_to_output(&mut self, name: &str, delta: f64);

    fn output_value(&self, name: &str) -> Option<f64>;

    fn output_declarations(&self) -> Vec<OutputDeclaration>;

    /// The variables to report on `day`, with their current values.
    fn outputs_due(&self, day: u32, last_day: bool) -> Vec<(String, f64)>;

    /// Zeroes every variable, keeping the declarations.
    fn reset_outputs(&mut self);
}

impl ContextReportingExt for Context {
    fn declare_output(&mut self, name: &str, frequency: Frequency) {
        self.get_data_container_mut::<OutputRegistry>()
            .declare(name, frequency);
    }

    fn set_output(&mut self, name: &str, value: f64) {
        self.get_data_container_mut::<OutputRegistry>().set(name, value);
    }

    fn add_to_output(&mut self, name: &str, delta: f64) {
        let current = self.output_value(name).unwrap_or(0.0);
        self.set_output(name, current + delta);
    }

    fn output_value(&self, name: &str) -> Option<f64> {
        let registry = self.get_data_container::<OutputRegistry>()?;
        registry.position(name).map(|position| registry.variables[position].value)
    }

    fn output_declarations(&self) -> Vec<OutputDeclaration> {
        self.get_data_container::<OutputRegistry>()
            .map(OutputRegistry::declarations)
            .unwrap_or_default()
    }

    fn outputs_due(&self, day: u32, last_day: bool) -> Vec<(String, f64)> {
        self.get_data_container::<OutputRegistry>()
            .map(|registry| registry.due(day, last_day))
            .unwrap_or_default()
    }

    fn reset_outputs(&mut self) {
        self.get_data_container_mut::<OutputRegistry>().reset_values();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_schedule() {
        assert!(!Frequency::Never.is_due(7, true));
        assert!(Frequency::Daily.is_due(3, false));
        assert!(Frequency::Weekly.is_due(14, false));
        assert!(!Frequency::Weekly.is_due(15, false));
        assert!(Frequency::Weekly.is_due(15, true));
        assert!(!Frequency::Once.is_due(30, false));
        assert!(Frequency::Monthly.is_due(30, false));
    }

    #[test]
    fn declare_set_and_report() {
        let mut context = Context::new();
        context.declare_output("a", Frequency::Daily);
        context.declare_output("b", Frequency::Once);
        context.set_output("a", 2.0);
        context.add_to_output("a", 3.0);
        context.set_output("undeclared", 1.0);
        assert_eq!(context.output_value("a"), Some(5.0));
        assert_eq!(context.output_value("undeclared"), None);
        assert_eq!(context.outputs_due(1, false), vec![("a".to_string(), 5.0)]);
        assert_eq!(context.outputs_due(1, true).len(), 2);

        let names: Vec<String> = context.output_declarations().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        context.reset_outputs();
        assert_eq!(context.output_value("a"), Some(0.0));
    }

    #[test]
    fn frequency_deserializes_lowercase() {
        let frequency: Frequency = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(frequency, Frequency::Weekly);
    }
}
