/*!

Push notifications about individual units for observers outside the simulation, such as a GUI
or a database writer. Sinks cannot fail and cannot affect the run.

*/

use crate::{
    event::{ContactType, Event, TraceDirection},
    unit::{UnitId, UnitState},
    zone::FragmentId,
};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Notification {
    StateChange {
        unit: UnitId,
        state: UnitState,
        day: u32,
    },
    Exposure {
        unit: UnitId,
        source: Option<UnitId>,
        day: u32,
    },
    Infection {
        unit: UnitId,
        source: Option<UnitId>,
        contact_type: ContactType,
        day: u32,
    },
    Detection {
        unit: UnitId,
        day: u32,
    },
    /// A trace found `unit` through its contact with `contact`.
    Trace {
        unit: UnitId,
        contact: UnitId,
        contact_type: ContactType,
        day: u32,
    },
    Vaccination {
        unit: UnitId,
        day: u32,
    },
    Destruction {
        unit: UnitId,
        day: u32,
    },
    ZoneChange {
        unit: UnitId,
        fragment: FragmentId,
        day: u32,
    },
}

impl Notification {
    /// The notification an event produces, for the kinds observers care about.
    #[must_use]
    pub fn from_event(event: &Event) -> Option<Notification> {
        match *event {
            Event::Exposure {
                exposing,
                exposed,
                day,
                adequate: true,
                ..
            } => Some(Notification::Exposure {
                unit: exposed,
                source: exposing,
                day,
            }),
            Event::Infection {
                infecting,
                infected,
                day,
                contact_type,
                ..
            } => Some(Notification::Infection {
                unit: infected,
                source: infecting,
                contact_type,
                day,
            }),
            Event::Detection { unit, day } => Some(Notification::Detection { unit, day }),
            Event::TraceResult {
                exposing,
                exposed,
                contact_type,
                direction,
                day,
                traced: true,
                ..
            } => {
                let (unit, contact) = match direction {
                    TraceDirection::Forward => (exposed, exposing),
                    TraceDirection::Back => (exposing, exposed),
                };
                Some(Notification::Trace {
                    unit,
                    contact,
                    contact_type,
                    day,
                })
            }
            Event::Vaccination { unit, day, .. } => Some(Notification::Vaccination { unit, day }),
            Event::Destruction { unit, day, .. } => Some(Notification::Destruction { unit, day }),
            Event::UnitZoneChange {
                unit,
                new_fragment,
                day,
                ..
            } => Some(Notification::ZoneChange {
                unit,
                fragment: new_fragment,
                day,
            }),
            Event::UnitStateChange {
                unit, new_state, day, ..
            } => Some(Notification::StateChange {
                unit,
                state: new_state,
                day,
            }),
            _ => None,
        }
    }
}

pub trait NotificationSink {
    fn notify(&mut self, notification: Notification);
}

/// Discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&mut self, _notification: Notification) {}
}

/// Keeps every notification, in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub notifications: Vec<Notification>,
}

impl NotificationSink for RecordingSink {
    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

impl<F: FnMut(Notification)> NotificationSink for F {
    fn notify(&mut self, notification: Notification) {
        self(notification);
    }
}
