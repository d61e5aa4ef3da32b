//! The set of synchronized entity kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every row type that takes part in the push/pull cycle.
///
/// Each kind maps to one local table and one remote table of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Workout,
    Exercise,
    Cycle,
    Goal,
    BodyMeasurement,
    StrengthTest,
    ScheduledTraining,
    Profile,
}

impl EntityKind {
    /// All kinds, in the order reports list them.
    pub const ALL: [Self; 8] = [
        Self::Workout,
        Self::Exercise,
        Self::Cycle,
        Self::Goal,
        Self::BodyMeasurement,
        Self::StrengthTest,
        Self::ScheduledTraining,
        Self::Profile,
    ];

    /// Stable snake_case name used in reports and the sync state table.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Workout => "workout",
            Self::Exercise => "exercise",
            Self::Cycle => "cycle",
            Self::Goal => "goal",
            Self::BodyMeasurement => "body_measurement",
            Self::StrengthTest => "strength_test",
            Self::ScheduledTraining => "scheduled_training",
            Self::Profile => "profile",
        }
    }

    /// Table name, identical locally and remotely.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Workout => "workouts",
            Self::Exercise => "exercises",
            Self::Cycle => "cycles",
            Self::Goal => "goals",
            Self::BodyMeasurement => "body_measurements",
            Self::StrengthTest => "strength_tests",
            Self::ScheduledTraining => "scheduled_trainings",
            Self::Profile => "profiles",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == needle || kind.table() == needle)
            .ok_or_else(|| format!("unknown entity kind '{needle}'"))
    }
}
