use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "pstd-par workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark suite once per thread count and compare scaling.
    Scaling {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,
    },
}

/// Thread counts swept by the `scaling` command, via `PSTD_PAR_MAX_THREADS`.
const THREAD_COUNTS: &[usize] = &[1, 2, 4, 8];

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scaling { quick, report_only } => {
            if !report_only {
                run_benchmarks(quick)?;
            }
            generate_report()?;
        }
    }

    Ok(())
}

fn run_benchmarks(quick: bool) -> Result<()> {
    println!("Running the benchmark suite once per thread count...");

    println!("Compiling benchmarks...");
    let status = Command::new("cargo").args(["build", "--benches", "--release"]).status()?;
    if !status.success() {
        anyhow::bail!("failed to compile benchmarks");
    }

    for threads in THREAD_COUNTS {
        println!("\n>>> PSTD_PAR_MAX_THREADS={threads}");
        let start = Instant::now();
        let baseline_name = format!("threads-{threads}");

        let mut cmd = Command::new("cargo");
        cmd.env("PSTD_PAR_MAX_THREADS", threads.to_string());
        cmd.arg("bench");
        cmd.arg("--");
        cmd.arg("--save-baseline").arg(&baseline_name);

        if quick {
            cmd.arg("--measurement-time").arg("0.1");
            cmd.arg("--noplot");
            cmd.arg("--sample-size").arg("10");
        }

        let status = cmd.status().context(format!("failed to run benchmarks at {threads} threads"))?;
        if !status.success() {
            eprintln!("warning: benchmark run failed for {threads} threads");
        } else {
            println!("finished threads={threads} in {:.2?}", start.elapsed());
        }
    }

    Ok(())
}

fn generate_report() -> Result<()> {
    println!("\n>>> Generating scaling report...");
    let mut results: HashMap<String, HashMap<usize, f64>> = HashMap::new();

    let criterion_dir = Path::new("target/criterion");
    if !criterion_dir.exists() {
        eprintln!("no criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    collect_results(criterion_dir, &mut results);

    let report_path = Path::new("benchmark_results/scaling.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }

    use std::io::Write;
    let mut file = fs::File::create(report_path)?;
    writeln!(file, "# Thread Scaling Report")?;

    write!(file, "| Benchmark |")?;
    for threads in THREAD_COUNTS {
        write!(file, " {threads} threads (ops/s) | speedup vs 1 |")?;
    }
    writeln!(file)?;
    write!(file, "|---|")?;
    for _ in THREAD_COUNTS {
        write!(file, "---|---|")?;
    }
    writeln!(file)?;

    let mut benchmarks: Vec<_> = results.keys().cloned().collect();
    benchmarks.sort();

    for name in benchmarks {
        write!(file, "| {name} |")?;
        let per_thread = &results[&name];
        let baseline = per_thread.get(&1).copied().unwrap_or(0.0);
        for threads in THREAD_COUNTS {
            match per_thread.get(threads) {
                Some(ops) => {
                    let speedup = if baseline > 0.0 { ops / baseline } else { 0.0 };
                    write!(file, " {ops:.0} | {speedup:.2}x |")?;
                }
                None => write!(file, " N/A | - |")?,
            }
        }
        writeln!(file)?;
    }

    println!("report written to {}", report_path.display());
    Ok(())
}

fn collect_results(dir: &Path, results: &mut HashMap<String, HashMap<usize, f64>>) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_results(&path, results);
        } else if path.file_name().and_then(|s| s.to_str()) == Some("estimates.json") {
            let Some(baseline_dir) = path.parent() else { continue };
            let Some(baseline_name) = baseline_dir.file_name().and_then(|s| s.to_str()) else { continue };
            let Some(threads) = baseline_name.strip_prefix("threads-").and_then(|s| s.parse::<usize>().ok()) else {
                continue;
            };
            let Some(workload_dir) = baseline_dir.parent() else { continue };
            let Some(workload_name) = workload_dir.file_name().and_then(|s| s.to_str()) else { continue };
            if workload_name == "report" {
                continue;
            }

            let mut elements = 1.0;
            let mut is_throughput = false;
            if let Ok(content) = fs::read_to_string(workload_dir.join("benchmark.json")) {
                if let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) {
                    if let Some(t) = json.get("throughput").and_then(|t| t.get("Elements")) {
                        elements = t.as_f64().unwrap_or(1.0);
                        is_throughput = true;
                    }
                }
            }

            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) {
                    if let Some(mean) = json.get("mean").and_then(|m| m.get("point_estimate")) {
                        let time_ns = mean.as_f64().unwrap_or(0.0);
                        if time_ns > 0.0 {
                            let metric = if is_throughput { (elements * 1e9) / time_ns } else { 1e9 / time_ns };
                            results.entry(workload_name.to_string()).or_default().insert(threads, metric);
                        }
                    }
                }
            }
        }
    }
}
