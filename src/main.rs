//! Gene Flow CLI - Run evolutions from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use gene_flow::{
    EvolutionEngine, HistogramSink, RunConfig,
    metrics::exporter,
    schema::GenerationProgress,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        eprintln!();
        eprintln!("Evolve a population toward a target gene sum.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to run configuration file");
        eprintln!();
        eprintln!("Example configuration is printed with the --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let config = RunConfig::from_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading {}: {}", config_path.display(), e);
        std::process::exit(1);
    });
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let mut engine = EvolutionEngine::new(config);
    let config = engine.config().clone();

    println!("Gene Flow Evolution");
    println!("===================");
    println!("PARAMS:");
    println!("  Individuals: {}", config.num_individuals);
    println!("  Genes: {}", config.size);
    println!("  Target: {}", config.target);
    println!("  Lifecycles: {}", config.lifecycles);
    println!("  Seed: {}", config.seed);
    println!(
        "  Rates: retain={}, random_select={}, mutate={}",
        config.evolution.retain, config.evolution.random_select, config.evolution.mutate_rate
    );
    println!();

    let mut exporter_handle = None;

    if config.metrics.enabled {
        let sink = HistogramSink::from_config(&config.metrics).unwrap_or_else(|e| {
            eprintln!("Error starting metrics sink: {}", e);
            std::process::exit(1);
        });
        let sink = Arc::new(sink);
        match exporter::spawn(config.metrics.clone(), Arc::clone(&sink)) {
            Ok(handle) => exporter_handle = Some(handle),
            Err(e) => log::warn!("Metrics exporter not started: {}", e),
        }
        engine = engine.with_sink(sink);
    }

    println!("Running evolution...");
    let start = Instant::now();

    let result = engine
        .run_with_callback(|progress: &GenerationProgress| {
            println!(
                "  Generation {}/{}: {:.6}s, best fitness {}",
                progress.generation + 1,
                progress.total_generations,
                progress.elapsed_seconds,
                progress.best_fitness
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution failed: {}", e);
            std::process::exit(1);
        });

    let elapsed = start.elapsed();

    println!();
    println!("Final population:");
    for (i, individual) in result.population.iter().enumerate() {
        println!("  {:>4}: {:?}", i, individual.genes());
    }
    println!();
    if let Some(history) = &result.fitness_history {
        println!("Fitness history:");
        for (i, grade) in history.iter().enumerate() {
            println!("  {:>4}: {:.4}", i, grade);
        }
        println!();
    }
    println!("Best fitness: {}", result.stats.best_fitness);
    println!("Tasks submitted: {}", result.stats.tasks_submitted);
    println!(
        "Time: {:.3}s (init {:.6}s, evolution {:.3}s)",
        elapsed.as_secs_f64(),
        result.stats.init_seconds,
        result.stats.evolve_seconds
    );

    if config.metrics.serve_after_run
        && let Some(handle) = exporter_handle
    {
        println!();
        println!(
            "Serving metrics on {}:{}{} (Ctrl-C to stop)",
            config.metrics.bind, config.metrics.port, config.metrics.path
        );
        if handle.join().is_err() {
            log::error!("metrics exporter panicked");
        }
    }
}

fn print_example_config() {
    let config = RunConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example config: {}", e),
    }
}
