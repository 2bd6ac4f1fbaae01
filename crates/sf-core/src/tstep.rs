//! The four-level adaptive timestep hierarchy.
//!
//! Simulation time is organized in four nested resolutions, coarsest to
//! finest: DATA (the forcing interval), NORMAL, MEDIUM and SMALL. A step at
//! any level below DATA may be subdivided into `intervals` steps of the next
//! level down when the snowpack's mass change exceeds that level's
//! threshold. SMALL is the floor: it carries no threshold and is never
//! subdivided.

use serde::Deserialize;

use crate::config::TimeSteps;
use crate::consts::min_to_sec;
use crate::error::{ConfigError, CoreResult};

/// One of the four nested step resolutions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimestepLevel {
    Data,
    Normal,
    Medium,
    Small,
}

impl TimestepLevel {
    pub const ALL: [TimestepLevel; 4] = [Self::Data, Self::Normal, Self::Medium, Self::Small];

    pub fn index(self) -> usize {
        match self {
            Self::Data => 0,
            Self::Normal => 1,
            Self::Medium => 2,
            Self::Small => 3,
        }
    }

    /// The next-finer level, or `None` at the floor.
    pub fn child(self) -> Option<TimestepLevel> {
        match self {
            Self::Data => Some(Self::Normal),
            Self::Normal => Some(Self::Medium),
            Self::Medium => Some(Self::Small),
            Self::Small => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Normal => "normal",
            Self::Medium => "medium",
            Self::Small => "small",
        }
    }
}

/// When results for a completed step at a level should be emitted.
///
/// `whole` marks emission when the step completes undivided; `divided`
/// marks emission when the step is part of a subdivided parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputFlags {
    pub whole: bool,
    pub divided: bool,
}

/// How often output records are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Emit once per data timestep.
    #[default]
    Data,
    /// Emit at normal-step resolution, divided or not.
    Normal,
    /// Emit whenever any run step completes undivided.
    All,
}

/// Maximum tolerable mass change (kg/m^2) per step at each run level,
/// before the controller must subdivide further.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct MassThresholds {
    pub normal: f64,
    pub medium: f64,
    pub small: f64,
}

impl Default for MassThresholds {
    fn default() -> Self {
        Self {
            normal: 60.0,
            medium: 10.0,
            small: 1.0,
        }
    }
}

/// One rung of the timestep ladder.
///
/// `intervals` is the number of steps at this level that cover one step of
/// the parent level (1 for DATA itself).
#[derive(Clone, Copy, Debug)]
pub struct LevelInfo {
    pub level: TimestepLevel,
    pub duration_s: f64,
    pub intervals: u32,
    pub threshold: Option<f64>,
    pub output: OutputFlags,
}

/// The validated four-level ladder.
#[derive(Clone, Debug)]
pub struct TstepHierarchy {
    levels: [LevelInfo; 4],
}

impl TstepHierarchy {
    /// Build and validate the ladder from step durations, the requested
    /// output mode, and the mass thresholds.
    ///
    /// The data timestep must be between 1 minute and 6 hours; if longer
    /// than 1 hour it must be a whole number of hours. Every boundary of
    /// the ladder must divide exactly, with at least one child step per
    /// parent step.
    pub fn build(
        steps: &TimeSteps,
        mode: OutputMode,
        thresholds: &MassThresholds,
    ) -> CoreResult<Self> {
        let data_min = steps.data_min;
        if !(1..=360).contains(&data_min) {
            return Err(ConfigError::OutOfRange {
                what: "input data's timestep",
                value: data_min as f64,
                min: 1.0,
                max: 360.0,
            });
        }
        if data_min > 60 && data_min % 60 != 0 {
            return Err(ConfigError::NotWholeHours { minutes: data_min });
        }

        let ladder: [(&'static str, u32); 4] = [
            ("data", data_min),
            ("normal", steps.normal_min),
            ("medium", steps.medium_min),
            ("small", steps.small_min),
        ];
        for (what, minutes) in ladder {
            if minutes == 0 {
                return Err(ConfigError::ZeroDuration { what });
            }
        }
        for w in ladder.windows(2) {
            let (parent, parent_min) = w[0];
            let (child, child_min) = w[1];
            if parent_min % child_min != 0 || parent_min < child_min {
                return Err(ConfigError::NonIntegralSubdivision {
                    parent,
                    parent_min,
                    child,
                    child_min,
                });
            }
        }

        for (level, value) in [
            ("normal", thresholds.normal),
            ("medium", thresholds.medium),
            ("small", thresholds.small),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::BadThreshold { level, value });
            }
        }

        let mut levels = [
            LevelInfo {
                level: TimestepLevel::Data,
                duration_s: min_to_sec(data_min as f64),
                intervals: 1,
                threshold: None,
                output: OutputFlags::default(),
            },
            LevelInfo {
                level: TimestepLevel::Normal,
                duration_s: min_to_sec(steps.normal_min as f64),
                intervals: data_min / steps.normal_min,
                threshold: Some(thresholds.normal),
                output: OutputFlags::default(),
            },
            LevelInfo {
                level: TimestepLevel::Medium,
                duration_s: min_to_sec(steps.medium_min as f64),
                intervals: steps.normal_min / steps.medium_min,
                threshold: Some(thresholds.medium),
                output: OutputFlags::default(),
            },
            LevelInfo {
                level: TimestepLevel::Small,
                duration_s: min_to_sec(steps.small_min as f64),
                intervals: steps.medium_min / steps.small_min,
                // SMALL is the floor: accepted even over threshold, so the
                // threshold lives with the controller's non-convergence
                // check rather than forcing further subdivision.
                threshold: Some(thresholds.small),
                output: OutputFlags::default(),
            },
        ];

        match mode {
            OutputMode::Data => {
                levels[TimestepLevel::Data.index()].output.divided = true;
            }
            OutputMode::Normal => {
                levels[TimestepLevel::Normal.index()].output = OutputFlags {
                    whole: true,
                    divided: true,
                };
            }
            OutputMode::All => {
                for l in [
                    TimestepLevel::Normal,
                    TimestepLevel::Medium,
                    TimestepLevel::Small,
                ] {
                    levels[l.index()].output.whole = true;
                }
            }
        }

        Ok(Self { levels })
    }

    pub fn level(&self, level: TimestepLevel) -> &LevelInfo {
        &self.levels[level.index()]
    }

    /// Duration of one data timestep in seconds.
    pub fn data_duration_s(&self) -> f64 {
        self.levels[TimestepLevel::Data.index()].duration_s
    }

    /// Number of elementary SMALL steps that fully subdivide one data
    /// timestep. Subdivision can never execute more physics calls than
    /// this per data step.
    pub fn elementary_capacity(&self) -> u32 {
        self.levels[TimestepLevel::Normal.index()].intervals
            * self.levels[TimestepLevel::Medium.index()].intervals
            * self.levels[TimestepLevel::Small.index()].intervals
    }
}
