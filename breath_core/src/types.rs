//! Core domain types for the breathwork system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Breath phases and the timed cycles built from them
//! - Pattern definitions and their categories
//! - Session run states

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Phase Types
// ============================================================================

/// A named stage of a breath
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Inhale,
    Hold,
    Exhale,
    HoldExhale,
    Pause,
}

impl Phase {
    /// Short label shown to the user. Both holds read "Hold".
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Inhale => "Inhale",
            Phase::Hold => "Hold",
            Phase::Exhale => "Exhale",
            Phase::HoldExhale => "Hold",
            Phase::Pause => "Pause",
        }
    }

    /// Display colour name used by renderers
    pub fn color(&self) -> &'static str {
        match self {
            Phase::Inhale => "blue",
            Phase::Hold => "purple",
            Phase::Exhale => "green",
            Phase::HoldExhale => "orange",
            Phase::Pause => "gray",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Cycle Types
// ============================================================================

/// One timed step within a pattern
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Cycle {
    pub phase: Phase,
    /// Length of the step in seconds
    pub duration: f64,
    /// Feedback intensity, 0.0 to 1.0
    pub intensity: f64,
}

impl Cycle {
    /// Create a cycle, rejecting non-positive durations and out-of-range intensities
    pub fn new(phase: Phase, duration: f64, intensity: f64) -> Result<Self> {
        let cycle = Self {
            phase,
            duration,
            intensity,
        };
        cycle.validate()?;
        Ok(cycle)
    }

    /// Check the cycle invariants
    pub fn validate(&self) -> Result<()> {
        if !(self.duration > 0.0) {
            return Err(Error::InvalidPatternDefinition(format!(
                "{} cycle has non-positive duration {}",
                self.phase, self.duration
            )));
        }
        match Duration::try_from_secs_f64(self.duration) {
            Ok(length) if !length.is_zero() => {}
            _ => {
                return Err(Error::InvalidPatternDefinition(format!(
                    "{} cycle duration {} is not representable",
                    self.phase, self.duration
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.intensity) {
            return Err(Error::InvalidPatternDefinition(format!(
                "{} cycle intensity {} outside [0.0, 1.0]",
                self.phase, self.intensity
            )));
        }
        Ok(())
    }

    /// Cycle length as a `Duration`.
    ///
    /// Only meaningful for validated cycles; invalid durations map to zero.
    pub fn length(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration).unwrap_or(Duration::ZERO)
    }
}

// ============================================================================
// Pattern Types
// ============================================================================

/// Category of breathing pattern
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Meditation,
    Kundalini,
    Calming,
    Energizing,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Meditation,
        Category::Kundalini,
        Category::Calming,
        Category::Energizing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Meditation => "meditation",
            Category::Kundalini => "kundalini",
            Category::Calming => "calming",
            Category::Energizing => "energizing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "meditation" => Some(Category::Meditation),
            "kundalini" => Some(Category::Kundalini),
            "calming" => Some(Category::Calming),
            "energizing" => Some(Category::Energizing),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Meditation => "Meditation",
            Category::Kundalini => "Kundalini",
            Category::Calming => "Calming",
            Category::Energizing => "Energizing",
        };
        f.write_str(name)
    }
}

/// A complete breathing pattern definition
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub cycles: Vec<Cycle>,
    /// Number of passes through `cycles`; `None` repeats indefinitely
    pub repetitions: Option<u32>,
}

impl Pattern {
    /// Build a validated pattern
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        category: Category,
        cycles: Vec<Cycle>,
        repetitions: Option<u32>,
    ) -> Result<Self> {
        let pattern = Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            category,
            cycles,
            repetitions,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    /// Check the pattern invariants: non-empty cycles, every cycle valid,
    /// and a positive repetition count when one is given.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidPatternDefinition(format!(
                "pattern '{}' has an empty id",
                self.name
            )));
        }
        if self.cycles.is_empty() {
            return Err(Error::InvalidPatternDefinition(format!(
                "pattern '{}' has no cycles",
                self.id
            )));
        }
        for (index, cycle) in self.cycles.iter().enumerate() {
            cycle.validate().map_err(|e| match e {
                Error::InvalidPatternDefinition(msg) => Error::InvalidPatternDefinition(format!(
                    "pattern '{}' cycle {}: {}",
                    self.id, index, msg
                )),
                other => other,
            })?;
        }
        if self.repetitions == Some(0) {
            return Err(Error::InvalidPatternDefinition(format!(
                "pattern '{}' has zero repetitions",
                self.id
            )));
        }
        Ok(())
    }

    /// Length of one pass through all cycles, saturating at `Duration::MAX`
    pub fn cycle_duration(&self) -> Duration {
        self.cycles
            .iter()
            .map(Cycle::length)
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Informational total: one pass times the repetition count (or once
    /// for continuous patterns), saturating at `Duration::MAX`
    pub fn total_duration(&self) -> Duration {
        self.cycle_duration()
            .saturating_mul(self.repetitions.unwrap_or(1))
    }

    /// True when the pattern repeats until stopped
    pub fn is_continuous(&self) -> bool {
        self.repetitions.is_none()
    }
}

/// Derive a stable pattern id from a display name ("4-7-8 Breathing" -> "4_7_8_breathing")
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

// ============================================================================
// Session Types
// ============================================================================

/// Lifecycle state of the session engine
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_cycles() -> Vec<Cycle> {
        vec![
            Cycle::new(Phase::Inhale, 4.0, 0.6).unwrap(),
            Cycle::new(Phase::Hold, 4.0, 0.3).unwrap(),
            Cycle::new(Phase::Exhale, 4.0, 0.6).unwrap(),
            Cycle::new(Phase::HoldExhale, 4.0, 0.3).unwrap(),
        ]
    }

    #[test]
    fn test_cycle_rejects_bad_values() {
        assert!(matches!(
            Cycle::new(Phase::Inhale, 0.0, 0.5),
            Err(Error::InvalidPatternDefinition(_))
        ));
        assert!(Cycle::new(Phase::Inhale, -1.0, 0.5).is_err());
        assert!(Cycle::new(Phase::Inhale, f64::NAN, 0.5).is_err());
        assert!(Cycle::new(Phase::Inhale, f64::INFINITY, 0.5).is_err());
        assert!(Cycle::new(Phase::Exhale, 1.0, 1.01).is_err());
        assert!(Cycle::new(Phase::Exhale, 1.0, -0.1).is_err());
        assert!(Cycle::new(Phase::Pause, 1.0, 0.0).is_ok());
        assert!(Cycle::new(Phase::Pause, 1.0, 1.0).is_ok());
    }

    #[test]
    fn test_pattern_requires_cycles() {
        let result = Pattern::new("empty", "Empty", "", Category::Calming, vec![], None);
        assert!(matches!(result, Err(Error::InvalidPatternDefinition(_))));
    }

    #[test]
    fn test_pattern_requires_positive_repetitions() {
        let result = Pattern::new("box", "Box", "", Category::Meditation, box_cycles(), Some(0));
        assert!(matches!(result, Err(Error::InvalidPatternDefinition(_))));
    }

    #[test]
    fn test_validate_catches_mutated_cycle() {
        let mut pattern =
            Pattern::new("box", "Box", "", Category::Meditation, box_cycles(), None).unwrap();
        pattern.cycles[2].duration = 0.0;

        let err = pattern.validate().unwrap_err().to_string();
        assert!(err.contains("cycle 2"), "unexpected message: {}", err);
    }

    #[test]
    fn test_total_duration() {
        let continuous =
            Pattern::new("box", "Box", "", Category::Meditation, box_cycles(), None).unwrap();
        assert_eq!(continuous.cycle_duration(), Duration::from_secs(16));
        assert_eq!(continuous.total_duration(), Duration::from_secs(16));
        assert!(continuous.is_continuous());

        let fire = Pattern::new(
            "fire",
            "Fire",
            "",
            Category::Kundalini,
            vec![
                Cycle::new(Phase::Inhale, 0.5, 0.4).unwrap(),
                Cycle::new(Phase::Exhale, 0.5, 0.6).unwrap(),
            ],
            Some(60),
        )
        .unwrap();
        assert_eq!(fire.total_duration(), Duration::from_secs(60));
        assert!(!fire.is_continuous());
    }

    #[test]
    fn test_total_duration_saturates_for_huge_patterns() {
        let long = Pattern::new(
            "long",
            "Long",
            "",
            Category::Calming,
            vec![Cycle::new(Phase::Inhale, 1e10, 0.5).unwrap()],
            Some(4_000_000_000),
        )
        .unwrap();
        assert_eq!(long.total_duration(), Duration::MAX);

        let wide = Pattern::new(
            "wide",
            "Wide",
            "",
            Category::Calming,
            vec![
                Cycle::new(Phase::Inhale, 1.5e19, 0.5).unwrap(),
                Cycle::new(Phase::Exhale, 1.5e19, 0.5).unwrap(),
            ],
            None,
        )
        .unwrap();
        assert_eq!(wide.cycle_duration(), Duration::MAX);
        assert_eq!(wide.total_duration(), Duration::MAX);
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::HoldExhale.label(), "Hold");
        assert_eq!(Phase::HoldExhale.color(), "orange");
        assert_eq!(Phase::Inhale.to_string(), "Inhale");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Box Breathing"), "box_breathing");
        assert_eq!(slugify("4-7-8 Breathing"), "4_7_8_breathing");
        assert_eq!(slugify("  Cannon   Breath! "), "cannon_breath");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::from_str("Kundalini"), Some(Category::Kundalini));
        assert_eq!(Category::from_str("nope"), None);
        for category in Category::ALL {
            assert_eq!(Category::from_str(category.as_str()), Some(category));
        }
    }
}
