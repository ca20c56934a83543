//! `ghost-bench`: the CLI driver for the LMD-GHOST fork-choice workbench
//! (SPEC_FULL.md §2 component H, §6). Parses the configuration surface,
//! validates it, runs the deterministic simulation, and writes the CSV
//! visualization pair. Grounded in `validator_client/src/main.rs`'s
//! `clap`/`slog` wiring and `lmd_ghost_experiment.go`'s top-level driver.

use clap::{App, Arg};
use ghost_chain::visualize;
use ghost_sim::{SimConfig, Simulation};
use slog::{crit, info, o, Drain, Level};
use std::process;

fn main() {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    let matches = App::new("ghost-bench")
        .version("0.1.0")
        .author("Sigma Prime <contact@sigmaprime.io>")
        .about("Experimental workbench for the LMD-GHOST fork-choice rule")
        .arg(
            Arg::with_name("validator-count")
                .long("validator-count")
                .value_name("N")
                .help("Size of the simulated validator population. Must be divisible by EPOCH_LENGTH (64).")
                .takes_value(true)
                .default_value("256"),
        )
        .arg(
            Arg::with_name("latency-factor")
                .long("latency-factor")
                .value_name("0..1")
                .help("Probability to step one more ancestor-up when choosing a non-head target.")
                .takes_value(true)
                .default_value("0.9"),
        )
        .arg(
            Arg::with_name("slot-skip-chance")
                .long("slot-skip-chance")
                .value_name("0..1")
                .help("Per-iteration probability of skipping a slot when proposing (capped at 10 iterations).")
                .takes_value(true)
                .default_value("0.4"),
        )
        .arg(
            Arg::with_name("base-attest-weight")
                .long("base-attest-weight")
                .value_name("N")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::with_name("max-extra-attest-weight")
                .long("max-extra-attest-weight")
                .value_name("N")
                .takes_value(true)
                .default_value("9"),
        )
        .arg(
            Arg::with_name("blocks")
                .long("blocks")
                .value_name("N")
                .help("Total blocks to simulate.")
                .takes_value(true)
                .default_value("1000"),
        )
        .arg(
            Arg::with_name("attestations-per-block")
                .long("attestations-per-block")
                .value_name("N")
                .takes_value(true)
                .default_value("4"),
        )
        .arg(
            Arg::with_name("justify-epochs-ago")
                .long("justify-epochs-ago")
                .value_name("N")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::with_name("finalize-epochs-ago")
                .long("finalize-epochs-ago")
                .value_name("N")
                .takes_value(true)
                .default_value("2"),
        )
        .arg(
            Arg::with_name("fork-choice-rule")
                .long("fork-choice-rule")
                .value_name("RULE")
                .help("Which of the six fork-choice engines to run.")
                .takes_value(true)
                .possible_values(&["spec", "cached", "vitalik", "simple_back_prop", "stateful", "proto_array"])
                .default_value("proto_array"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .value_name("N")
                .help("Seed for the deterministic RNG.")
                .takes_value(true)
                .default_value("1234"),
        )
        .arg(
            Arg::with_name("output")
                .long("output")
                .short("o")
                .value_name("PATH")
                .help("Path prefix for the CSV visualization pair (<PATH>.nodes.csv, <PATH>.edges.csv). Omit to skip writing."),
        )
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Minimum slog level to emit.")
                .takes_value(true)
                .possible_values(&["trace", "debug", "info", "warn", "error", "crit"])
                .default_value("info"),
        )
        .get_matches();

    let level = match matches.value_of("log-level") {
        Some("trace") => Level::Trace,
        Some("debug") => Level::Debug,
        Some("info") => Level::Info,
        Some("warn") => Level::Warning,
        Some("error") => Level::Error,
        Some("crit") => Level::Critical,
        _ => unreachable!("guarded by clap possible_values"),
    };
    let log = slog::Logger::root(drain.filter_level(level).fuse(), o!());

    macro_rules! required {
        ($name:expr) => {
            match matches.value_of($name).unwrap().parse() {
                Ok(v) => v,
                Err(e) => {
                    crit!(log, "invalid argument"; "argument" => $name, "error" => format!("{}", e));
                    process::exit(1);
                }
            }
        };
    }

    let config = SimConfig {
        validator_count: required!("validator-count"),
        latency_factor: required!("latency-factor"),
        slot_skip_chance: required!("slot-skip-chance"),
        base_attest_weight: required!("base-attest-weight"),
        max_extra_attest_weight: required!("max-extra-attest-weight"),
        blocks: required!("blocks"),
        attestations_per_block: required!("attestations-per-block"),
        justify_epochs_ago: required!("justify-epochs-ago"),
        finalize_epochs_ago: required!("finalize-epochs-ago"),
        fork_choice_rule: matches.value_of("fork-choice-rule").unwrap().to_string(),
        seed: required!("seed"),
    };

    let mut simulation = match Simulation::new(config) {
        Ok(s) => s,
        Err(e) => {
            crit!(log, "invalid configuration"; "error" => format!("{}", e));
            process::exit(1);
        }
    };

    info!(log, "starting simulation";
        "fork_choice_rule" => &simulation.config().fork_choice_rule,
        "blocks" => simulation.config().blocks,
        "validator_count" => simulation.config().validator_count,
    );

    let head = simulation.run(&log);

    info!(log, "simulation complete"; "head" => %head);

    if let Some(output) = matches.value_of("output") {
        if let Err(e) = visualize::write_csv(output, simulation.chain()) {
            crit!(log, "failed to write visualization output"; "error" => format!("{}", e));
            process::exit(1);
        }
        info!(log, "wrote visualization output"; "path" => output);
    }
}
