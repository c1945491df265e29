use still_merge::pipeline::load_options;
use still_merge::sim::{SimOptions, SyntheticStream};
use still_merge::stream::collect_crystals;
use still_merge::{
    CancelToken, CellParameters, Centering, MergeOptions, MergePipeline, SymOpList, UnitCell,
};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let program = env::args()
        .next()
        .unwrap_or_else(|| "still_merge".to_string());
    let cli = parse_args(&program)?;

    let options = match &cli.config {
        Some(path) => load_options(path)?,
        None => MergeOptions {
            point_group: cli.point_group.clone(),
            ..Default::default()
        },
    };

    let cell = UnitCell::from_parameters(
        CellParameters {
            a: 50e-10,
            b: 50e-10,
            c: 50e-10,
            alpha: std::f64::consts::FRAC_PI_2,
            beta: std::f64::consts::FRAC_PI_2,
            gamma: std::f64::consts::FRAC_PI_2,
        },
        Centering::P,
    )
    .map_err(|e| e.to_string())?;
    let sym = SymOpList::from_name(&options.point_group).map_err(|e| e.to_string())?;

    let mut stream = SyntheticStream::new(
        cell,
        sym,
        SimOptions {
            n_patterns: cli.patterns,
            cell_noise_percent: 0.5,
            intensity_noise: 10.0,
            seed: cli.seed,
            ..Default::default()
        },
    );
    let mut crystals = collect_crystals(&mut stream).map_err(|e| e.to_string())?;
    println!(
        "simulated {} patterns, {} observations total",
        crystals.len(),
        crystals.iter().map(|c| c.observations.len()).sum::<usize>()
    );

    let pipeline = MergePipeline::new(options).map_err(|e| e.to_string())?;
    let outcome = pipeline
        .run(&mut crystals, &CancelToken::new())
        .map_err(|e| e.to_string())?;

    let r = &outcome.report;
    println!(
        "merged {} reflections from {} crystals ({} flagged) in {:.1} ms, converged: {}",
        r.n_reflections, r.n_crystals, r.n_flagged_final, r.total_ms, r.converged
    );
    for mc in &r.macrocycles {
        println!(
            "  macrocycle {}: {} scale cycles, mean dG = {:.5}, scale {:.1} ms, refine {:.1} ms, merge {:.1} ms",
            mc.index, mc.scale_cycles, mc.mean_scale_change, mc.scale_ms, mc.refine_ms, mc.merge_ms
        );
    }

    write_hkl(&cli.output, &outcome.reflections)?;
    println!("reflections written to {}", cli.output.display());

    if let Some(path) = &cli.json_out {
        let json = serde_json::to_string_pretty(&outcome.reflections)
            .map_err(|e| format!("Failed to serialize JSON: {e}"))?;
        fs::write(path, json)
            .map_err(|e| format!("Failed to write JSON report to {}: {e}", path.display()))?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}

fn write_hkl(
    path: &PathBuf,
    reflections: &[still_merge::MergedReflection],
) -> Result<(), String> {
    let mut out = fs::File::create(path)
        .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
    writeln!(out, "  h   k   l          I       sigma(I)    nmeas")
        .map_err(|e| e.to_string())?;
    for r in reflections {
        if r.suppressed {
            continue;
        }
        writeln!(
            out,
            "{:3} {:3} {:3} {:12.2} {:12.2} {:8}",
            r.hkl.h, r.hkl.k, r.hkl.l, r.i_full, r.sigma, r.redundancy
        )
        .map_err(|e| e.to_string())?;
    }
    Ok(())
}

struct CliConfig {
    patterns: usize,
    seed: u64,
    point_group: String,
    config: Option<PathBuf>,
    output: PathBuf,
    json_out: Option<PathBuf>,
}

fn parse_args(program: &str) -> Result<CliConfig, String> {
    let mut args = env::args().skip(1);
    let mut cli = CliConfig {
        patterns: 50,
        seed: 1,
        point_group: "m-3m".to_string(),
        config: None,
        output: PathBuf::from("merged.hkl"),
        json_out: None,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("{}", usage(program));
                std::process::exit(0);
            }
            "--patterns" | "-n" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("--patterns expects a value\n{}", usage(program)))?;
                cli.patterns = value
                    .parse()
                    .map_err(|_| format!("Invalid pattern count '{value}'"))?;
            }
            "--seed" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("--seed expects a value\n{}", usage(program)))?;
                cli.seed = value.parse().map_err(|_| format!("Invalid seed '{value}'"))?;
            }
            "--point-group" | "-y" => {
                cli.point_group = args
                    .next()
                    .ok_or_else(|| format!("--point-group expects a value\n{}", usage(program)))?;
            }
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("--config expects a path\n{}", usage(program)))?;
                cli.config = Some(PathBuf::from(value));
            }
            "--output" | "-o" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("--output expects a path\n{}", usage(program)))?;
                cli.output = PathBuf::from(value);
            }
            "--json-out" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("--json-out expects a path\n{}", usage(program)))?;
                cli.json_out = Some(PathBuf::from(value));
            }
            other => {
                return Err(format!("Unknown option '{other}'\n{}", usage(program)));
            }
        }
    }
    Ok(cli)
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [--patterns n] [--seed s] [--point-group pg] [--config opts.json] \\\n         [--output merged.hkl] [--json-out merged.json]\n\n\
Simulates still diffraction patterns, then scales, post-refines and merges\n\
them into a reflection list.\n\
Examples:\n  {program} --patterns 200 --point-group m-3m -o merged.hkl\n  {program} --config engine.json --json-out merged.json\n"
    )
}
