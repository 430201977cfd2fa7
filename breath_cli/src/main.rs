use breath_core::feedback::classify;
use breath_core::*;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "breathe")]
#[command(about = "Guided breathwork sessions in the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra pattern file (TOML or JSON), may be repeated
    #[arg(long = "patterns", global = true)]
    pattern_files: Vec<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available patterns (default)
    List {
        /// Only show one category (meditation, kundalini, calming, energizing)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show the cycles of a pattern
    Show {
        /// Pattern id, as printed by `list`
        id: String,
    },

    /// Check a pattern file without running anything
    Validate {
        file: PathBuf,
    },

    /// Run a guided session
    Run {
        /// Pattern id, as printed by `list`
        id: String,

        /// Speed up (or slow down) session time
        #[arg(long)]
        time_scale: Option<f64>,

        /// Disable haptic pulses
        #[arg(long)]
        no_feedback: bool,

        /// Stop after this many seconds of session time
        #[arg(long)]
        max_seconds: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        breath_core::logging::init_with_level("debug");
    } else {
        breath_core::logging::init_with_level("warn");
    }

    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Some(Commands::List { category }) => {
            let catalog = PatternCatalog::from_config(&config, &cli.pattern_files)?;
            cmd_list(&catalog, category)
        }
        Some(Commands::Show { id }) => {
            let catalog = PatternCatalog::from_config(&config, &cli.pattern_files)?;
            cmd_show(&catalog, &id)
        }
        Some(Commands::Validate { file }) => cmd_validate(&file),
        Some(Commands::Run {
            id,
            time_scale,
            no_feedback,
            max_seconds,
        }) => {
            let catalog = PatternCatalog::from_config(&config, &cli.pattern_files)?;
            let pattern = catalog.require(&id)?;
            cmd_run(pattern, &config, time_scale, no_feedback, max_seconds)
        }
        None => {
            // Default to "list" command
            let catalog = PatternCatalog::from_config(&config, &cli.pattern_files)?;
            cmd_list(&catalog, None)
        }
    }
}

fn cmd_list(catalog: &PatternCatalog, category: Option<String>) -> Result<()> {
    let filter = category.as_ref().and_then(|c| match Category::from_str(c) {
        Some(category) => Some(category),
        None => {
            eprintln!("Unknown category: {}. Showing all patterns.", c);
            None
        }
    });

    let categories: Vec<Category> = match filter {
        Some(category) => vec![category],
        None => catalog.categories(),
    };

    for category in categories {
        let patterns = catalog.by_category(category);
        println!("\n{}", category);
        if patterns.is_empty() {
            println!("  (no patterns)");
        }
        for pattern in patterns {
            println!(
                "  {:<22} {:<22} {}",
                pattern.id,
                pattern.name,
                format_length(&pattern)
            );
        }
    }
    println!();
    Ok(())
}

fn cmd_show(catalog: &PatternCatalog, id: &str) -> Result<()> {
    let pattern = catalog.require(id)?;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", pattern.name);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  {}", pattern.description);
    println!("  Category: {}", pattern.category);
    println!("  Length: {}", format_length(&pattern));
    println!();

    for (index, cycle) in pattern.cycles.iter().enumerate() {
        let pulse = classify(cycle.phase, cycle.intensity)
            .map(|p| format!("{:?}", p))
            .unwrap_or_else(|| "none".into());
        println!(
            "  {}. {:<7} {:>5.2}s  intensity {:.1}  pulse {}",
            index + 1,
            cycle.phase.label(),
            cycle.duration,
            cycle.intensity,
            pulse
        );
    }
    println!();
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let patterns = load_patterns_from(file)?;
    // Also catches duplicate ids against the built-ins
    build_default_catalog().with_patterns(patterns.clone())?;

    println!("✓ {} patterns valid in {}", patterns.len(), file.display());
    for pattern in &patterns {
        println!("  {} ({})", pattern.id, pattern.name);
    }
    Ok(())
}

fn cmd_run(
    pattern: Arc<Pattern>,
    config: &Config,
    time_scale: Option<f64>,
    no_feedback: bool,
    max_seconds: Option<f64>,
) -> Result<()> {
    let scale = time_scale.unwrap_or(config.session.time_scale);
    breath_core::config::check_time_scale(scale)?;

    println!("\n  {} ({})", pattern.name, pattern.category);
    match pattern.repetitions {
        Some(reps) => println!("  {} rounds, {}\n", reps, format_length(&pattern)),
        None => println!("  Continuous, Ctrl-C to end\n"),
    }

    let clock: Arc<dyn Clock> = Arc::new(ScaledClock::new(scale));
    let engine = SessionEngine::new(clock).with_observer(PhasePrinter::new(Arc::clone(&pattern)));
    let engine = if no_feedback || !config.feedback.enabled {
        engine
    } else {
        engine.with_feedback(
            HapticSink::new(TerminalPulses).with_min_intensity(config.feedback.min_intensity),
        )
    };

    let runner = SessionRunner::spawn(engine, config.session.tick_interval())?;
    runner.start(pattern)?;

    let state = match max_seconds {
        Some(limit) => {
            let real = Duration::try_from_secs_f64(limit / scale).map_err(|_| {
                Error::Config(format!("max seconds must be non-negative, got {}", limit))
            })?;
            runner.wait_until_settled(real)
        }
        None => loop {
            let state = runner.wait_until_settled(Duration::from_secs(3600));
            if !matches!(state, RunState::Running | RunState::Paused) {
                break state;
            }
        },
    };

    match state {
        RunState::Completed => println!("\n✓ Session complete"),
        _ => {
            runner.stop()?;
            println!("\n■ Session stopped");
        }
    }

    runner.shutdown()
}

fn format_length(pattern: &Pattern) -> String {
    let secs = pattern.total_duration().as_secs_f64();
    if pattern.is_continuous() {
        format!("{:.1}s per round, continuous", secs)
    } else if secs >= 60.0 {
        format!("{:.1} min", secs / 60.0)
    } else {
        format!("{:.1}s", secs)
    }
}

/// Prints a line each time a new cycle begins
struct PhasePrinter {
    pattern: Arc<Pattern>,
    last: Option<(u32, usize)>,
}

impl PhasePrinter {
    fn new(pattern: Arc<Pattern>) -> Self {
        Self {
            pattern,
            last: None,
        }
    }
}

impl ProgressObserver for PhasePrinter {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        if update.run_state != RunState::Running {
            return;
        }
        let key = (update.repetition, update.cycle_index);
        if self.last == Some(key) {
            return;
        }
        self.last = Some(key);

        if let Some(cycle) = self.pattern.cycles.get(update.cycle_index) {
            println!(
                "  [{:>3}] {:<7} {:>5.2}s",
                update.repetition + 1,
                cycle.phase.label(),
                cycle.duration
            );
        }
    }
}

/// Stand-in pulse driver for terminals without haptics
struct TerminalPulses;

impl PulseDriver for TerminalPulses {
    fn play(&mut self, pulse: Pulse) -> Result<()> {
        tracing::debug!("pulse {:?}", pulse);
        Ok(())
    }
}
