//! Pattern catalog: the built-in breathing patterns plus any loaded from
//! external pattern files.
//!
//! The catalog is read-only once built. Every pattern is validated before it
//! is admitted, so consumers can rely on non-empty cycles, positive
//! durations and intensities in range.

use crate::types::*;
use crate::{Config, Error, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<PatternCatalog> = Lazy::new(build_default_catalog_internal);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static PatternCatalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog of built-in patterns
///
/// **Note**: prefer `get_default_catalog()` which returns a cached reference.
/// This function is retained for tests and for building extended catalogs.
pub fn build_default_catalog() -> PatternCatalog {
    build_default_catalog_internal()
}

fn build_default_catalog_internal() -> PatternCatalog {
    let mut patterns = Vec::new();
    for pattern in builtin_patterns() {
        match pattern.validate() {
            Ok(()) => patterns.push(Arc::new(pattern)),
            Err(e) => tracing::error!("Dropping built-in pattern '{}': {}", pattern.id, e),
        }
    }
    PatternCatalog { patterns }
}

/// Ordered, immutable set of validated patterns
#[derive(Clone, Debug, Default)]
pub struct PatternCatalog {
    patterns: Vec<Arc<Pattern>>,
}

impl PatternCatalog {
    /// Build a catalog, rejecting the whole set if any pattern is invalid or
    /// two patterns share an id
    pub fn new(patterns: Vec<Pattern>) -> Result<Self> {
        PatternCatalog::default().with_patterns(patterns)
    }

    /// Return a new catalog with `extra` appended after the existing patterns
    pub fn with_patterns(&self, extra: Vec<Pattern>) -> Result<Self> {
        let mut errors = Vec::new();
        let mut seen: HashSet<String> = self.patterns.iter().map(|p| p.id.clone()).collect();

        for pattern in &extra {
            if let Err(e) = pattern.validate() {
                errors.push(e.to_string());
            }
            if !seen.insert(pattern.id.clone()) {
                errors.push(format!("duplicate pattern id '{}'", pattern.id));
            }
        }

        if !errors.is_empty() {
            return Err(Error::InvalidPatternDefinition(errors.join("; ")));
        }

        let mut patterns = self.patterns.clone();
        patterns.extend(extra.into_iter().map(Arc::new));
        Ok(Self { patterns })
    }

    /// Built-in patterns followed by those in the configured and extra pattern files
    pub fn from_config(config: &Config, extra_files: &[PathBuf]) -> Result<Self> {
        let mut catalog = build_default_catalog();
        for path in config.patterns.files.iter().chain(extra_files) {
            let loaded = load_patterns_from(path)?;
            tracing::info!("Loaded {} patterns from {:?}", loaded.len(), path);
            catalog = catalog.with_patterns(loaded)?;
        }
        Ok(catalog)
    }

    /// All patterns in insertion order
    pub fn list(&self) -> &[Arc<Pattern>] {
        &self.patterns
    }

    /// Patterns in `category`, preserving catalog order
    pub fn by_category(&self, category: Category) -> Vec<Arc<Pattern>> {
        self.patterns
            .iter()
            .filter(|p| p.category == category)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Pattern>> {
        self.patterns.iter().find(|p| p.id == id).cloned()
    }

    /// Like `get`, but an unknown id is an error
    pub fn require(&self, id: &str) -> Result<Arc<Pattern>> {
        self.get(id)
            .ok_or_else(|| Error::UnknownPattern(id.to_string()))
    }

    /// Categories that have at least one pattern, in first-seen order
    pub fn categories(&self) -> Vec<Category> {
        let mut categories = Vec::new();
        for pattern in &self.patterns {
            if !categories.contains(&pattern.category) {
                categories.push(pattern.category);
            }
        }
        categories
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

// ============================================================================
// External pattern files
// ============================================================================

/// Pattern entry as written in a pattern file
#[derive(Debug, Deserialize)]
struct PatternEntry {
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
    category: String,
    #[serde(default)]
    cycles: Vec<CycleEntry>,
    repetitions: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CycleEntry {
    phase: String,
    duration: f64,
    intensity: f64,
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    #[serde(default)]
    patterns: Vec<PatternEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonPatternFile {
    List(Vec<PatternEntry>),
    Wrapped(PatternFile),
}

/// Load and validate patterns from a TOML or JSON file.
///
/// The format is chosen by extension (`.json` is JSON, anything else TOML).
/// A single invalid entry rejects the whole file. Malformed or missing
/// fields are reported as `InvalidPatternDefinition`; only an unreadable
/// file gives `Io`. `id` falls back to a slug of `name`, and a missing
/// `description` is read as empty.
pub fn load_patterns_from(path: &Path) -> Result<Vec<Pattern>> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        parse_json_patterns(&contents)
    } else {
        parse_toml_patterns(&contents)
    }
}

/// Parse patterns from TOML text (`[[patterns]]` tables)
pub fn parse_toml_patterns(contents: &str) -> Result<Vec<Pattern>> {
    let file: PatternFile = toml::from_str(contents).map_err(malformed)?;
    convert_entries(file.patterns)
}

/// Parse patterns from JSON text (a bare array or `{"patterns": [...]}`)
pub fn parse_json_patterns(contents: &str) -> Result<Vec<Pattern>> {
    let file = serde_json::from_str::<JsonPatternFile>(contents).map_err(malformed)?;
    let entries = match file {
        JsonPatternFile::List(entries) => entries,
        JsonPatternFile::Wrapped(file) => file.patterns,
    };
    convert_entries(entries)
}

fn malformed(e: impl std::fmt::Display) -> Error {
    Error::InvalidPatternDefinition(format!("malformed pattern file: {}", e))
}

fn convert_entries(entries: Vec<PatternEntry>) -> Result<Vec<Pattern>> {
    entries.into_iter().map(convert_entry).collect()
}

fn convert_entry(entry: PatternEntry) -> Result<Pattern> {
    let invalid = |msg: String| Error::InvalidPatternDefinition(format!("'{}': {}", entry.name, msg));

    let category = Category::from_str(&entry.category)
        .ok_or_else(|| invalid(format!("unknown category '{}'", entry.category)))?;

    let mut cycles = Vec::with_capacity(entry.cycles.len());
    for cycle in &entry.cycles {
        let phase = parse_phase(&cycle.phase)
            .ok_or_else(|| invalid(format!("unknown phase '{}'", cycle.phase)))?;
        cycles.push(Cycle {
            phase,
            duration: cycle.duration,
            intensity: cycle.intensity,
        });
    }

    let repetitions = match entry.repetitions {
        None => None,
        Some(n) if n >= 1 => Some(
            u32::try_from(n).map_err(|_| invalid(format!("repetitions {} too large", n)))?,
        ),
        Some(n) => return Err(invalid(format!("repetitions must be at least 1, got {}", n))),
    };

    let id = entry
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| slugify(&entry.name));

    Pattern::new(
        id,
        entry.name.clone(),
        entry.description.clone(),
        category,
        cycles,
        repetitions,
    )
}

fn parse_phase(s: &str) -> Option<Phase> {
    match s.to_lowercase().replace(['-', ' '], "_").as_str() {
        "inhale" => Some(Phase::Inhale),
        "hold" => Some(Phase::Hold),
        "exhale" => Some(Phase::Exhale),
        "hold_exhale" | "holdexhale" => Some(Phase::HoldExhale),
        "pause" => Some(Phase::Pause),
        _ => None,
    }
}

// ============================================================================
// Built-in patterns
// ============================================================================

fn pattern(
    id: &str,
    name: &str,
    description: &str,
    category: Category,
    steps: &[(Phase, f64, f64)],
    repetitions: Option<u32>,
) -> Pattern {
    Pattern {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        category,
        cycles: steps
            .iter()
            .map(|&(phase, duration, intensity)| Cycle {
                phase,
                duration,
                intensity,
            })
            .collect(),
        repetitions,
    }
}

fn builtin_patterns() -> Vec<Pattern> {
    use Category::*;
    use Phase::*;

    vec![
        // ====================================================================
        // Meditation and calming
        // ====================================================================
        pattern(
            "box_breathing",
            "Box Breathing",
            "Equal 4-count breath for focus and calm",
            Meditation,
            &[(Inhale, 4.0, 0.6), (Hold, 4.0, 0.3), (Exhale, 4.0, 0.6), (HoldExhale, 4.0, 0.3)],
            None,
        ),
        pattern(
            "four_seven_eight",
            "4-7-8 Breathing",
            "Dr. Weil's relaxing breath technique",
            Calming,
            &[(Inhale, 4.0, 0.5), (Hold, 7.0, 0.2), (Exhale, 8.0, 0.7)],
            None,
        ),
        pattern(
            "coherent_breathing",
            "Coherent Breathing",
            "5-second inhale and exhale for balance",
            Meditation,
            &[(Inhale, 5.0, 0.5), (Exhale, 5.0, 0.5)],
            None,
        ),
        pattern(
            "deep_breathing",
            "Deep Breathing",
            "Slow, deep breaths for relaxation",
            Calming,
            &[(Inhale, 6.0, 0.6), (Hold, 2.0, 0.2), (Exhale, 6.0, 0.6), (Pause, 2.0, 0.1)],
            None,
        ),
        pattern(
            "resonant_breathing",
            "Resonant Breathing",
            "6-second cycles for optimal heart rate variability",
            Meditation,
            &[(Inhale, 6.0, 0.5), (Exhale, 6.0, 0.5)],
            None,
        ),
        pattern(
            "triangle_breathing",
            "Triangle Breathing",
            "Three-part breath for centering",
            Meditation,
            &[(Inhale, 4.0, 0.6), (Hold, 4.0, 0.3), (Exhale, 4.0, 0.6)],
            None,
        ),
        pattern(
            "relaxing_breath",
            "Relaxing Breath",
            "Extended exhale for relaxation",
            Calming,
            &[(Inhale, 4.0, 0.5), (Hold, 2.0, 0.2), (Exhale, 6.0, 0.7), (Pause, 2.0, 0.1)],
            None,
        ),
        // ====================================================================
        // Kundalini
        // ====================================================================
        pattern(
            "breath_of_fire",
            "Breath of Fire",
            "Rapid, rhythmic breathing to energize",
            Kundalini,
            &[(Inhale, 0.5, 0.4), (Exhale, 0.5, 0.6)],
            Some(60),
        ),
        pattern(
            "long_deep_breathing",
            "Long Deep Breathing",
            "Full yogic breath for grounding",
            Kundalini,
            &[(Inhale, 8.0, 0.5), (Exhale, 8.0, 0.5)],
            None,
        ),
        pattern(
            "alternate_nostril",
            "Alternate Nostril",
            "Balanced breathing for clarity",
            Kundalini,
            &[(Inhale, 4.0, 0.4), (Hold, 4.0, 0.2), (Exhale, 4.0, 0.6), (Hold, 4.0, 0.2)],
            None,
        ),
        pattern(
            "sitali_breath",
            "Sitali Breath",
            "Cooling breath for temperature regulation",
            Kundalini,
            &[(Inhale, 4.0, 0.3), (Hold, 2.0, 0.2), (Exhale, 6.0, 0.5)],
            None,
        ),
        pattern(
            "suspending_breath",
            "Suspending Breath",
            "Extended holds for meditation depth",
            Kundalini,
            &[(Inhale, 5.0, 0.5), (Hold, 10.0, 0.2), (Exhale, 5.0, 0.5), (HoldExhale, 10.0, 0.1)],
            None,
        ),
        pattern(
            "segmented_breathing",
            "Segmented Breathing",
            "4 inhales, 1 exhale for vitality",
            Kundalini,
            &[
                (Inhale, 0.75, 0.4),
                (Inhale, 0.75, 0.4),
                (Inhale, 0.75, 0.4),
                (Inhale, 0.75, 0.4),
                (Exhale, 3.0, 0.7),
            ],
            None,
        ),
        pattern(
            "cannon_breath",
            "Cannon Breath",
            "Powerful exhales for energy release",
            Kundalini,
            &[(Inhale, 3.0, 0.5), (Exhale, 1.0, 0.9), (Pause, 1.0, 0.1)],
            None,
        ),
        pattern(
            "whistle_breath",
            "Whistle Breath",
            "Quick inhale, slow exhale for focus",
            Kundalini,
            &[(Inhale, 1.0, 0.6), (Exhale, 5.0, 0.5)],
            None,
        ),
    ]
}
