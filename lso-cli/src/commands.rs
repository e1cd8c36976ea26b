//! CLI command implementations.

use std::fs;
use std::path::Path;
use std::time::Duration;

use lso_common::{BytecodeImage, EventKind, Value};
use lso_vm::{Delivery, EventRecord, ObjectId, Scheduler, VmConfig};
use tracing::{debug, info};

use crate::host;

/// Simulated time per `run` tick.
const TICK: Duration = Duration::from_millis(100);

/// Ticks `run` performs when `--ticks` is not given.
const DEFAULT_TICKS: u32 = 10;

/// Assemble a text file to an image.
pub fn assemble(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: assemble requires an input file");
        eprintln!("Usage: lso assemble <input.lsl.s> [-o output.lsob]");
        return Err(1);
    }

    let input = &args[0];
    let output = match &args[1..] {
        [] => default_output(input),
        [flag, path] if flag == "-o" => path.clone(),
        _ => {
            eprintln!("Usage: lso assemble <input.lsl.s> [-o output.lsob]");
            return Err(1);
        }
    };

    let text = fs::read_to_string(input).map_err(|e| {
        eprintln!("error: cannot read '{input}': {e}");
        1
    })?;

    let image = lso_assembler::assemble(&text).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    let bytes = image.encode();
    fs::write(&output, &bytes).map_err(|e| {
        eprintln!("error: cannot write '{output}': {e}");
        1
    })?;

    eprintln!(
        "assembled {} function(s), {} state(s) ({} bytes) -> {output}",
        image.functions.len(),
        image.states.len(),
        bytes.len()
    );
    Ok(())
}

/// `foo.lsl.s` and `foo.s` become `foo.lsob`; anything else gets the
/// extension appended.
fn default_output(input: &str) -> String {
    let stem = input
        .strip_suffix(".lsl.s")
        .or_else(|| input.strip_suffix(".s"))
        .unwrap_or(input);
    format!("{stem}.lsob")
}

/// Verify an image.
pub fn verify(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: verify requires an input file");
        eprintln!("Usage: lso verify <input.lsob>");
        return Err(1);
    }

    let input = &args[0];
    let image = read_image(input)?;
    check(&image)?;
    println!(
        "OK: {input} ({} function(s), {} state(s), digest {})",
        image.functions.len(),
        image.states.len(),
        image.digest()
    );
    Ok(())
}

/// Disassemble an image to text.
pub fn disassemble(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: disassemble requires an input file");
        eprintln!("Usage: lso disassemble <input.lsob>");
        return Err(1);
    }

    let input = &args[0];
    let image = read_image(input)?;
    let text = lso_assembler::disassemble(&image).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    print!("{text}");
    Ok(())
}

/// Options of `lso run`.
#[derive(Debug, PartialEq)]
struct RunOptions {
    input: String,
    ticks: u32,
    config: Option<String>,
    touches: u32,
}

fn parse_run_args(args: &[String]) -> Result<RunOptions, String> {
    let mut iter = args.iter();
    let input = iter.next().ok_or("run requires an input file")?.clone();
    let mut options = RunOptions {
        input,
        ticks: DEFAULT_TICKS,
        config: None,
        touches: 0,
    };

    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match flag.as_str() {
            "--ticks" => {
                let v = value()?;
                options.ticks = v.parse().map_err(|_| format!("invalid tick count '{v}'"))?;
            }
            "--touch" => {
                let v = value()?;
                options.touches = v.parse().map_err(|_| format!("invalid touch count '{v}'"))?;
            }
            "--config" => options.config = Some(value()?.clone()),
            other => return Err(format!("unknown option '{other}'")),
        }
    }
    Ok(options)
}

fn load_config(path: Option<&str>) -> Result<VmConfig, String> {
    let Some(path) = path else {
        return Ok(VmConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("cannot read '{path}': {e}"))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid config '{path}': {e}"))
}

/// Verify an image and run one instance of it.
///
/// The instance is created before the first tick, so its `state_entry`
/// runs first. Touch `k` is posted before tick `k + 1`; the tick count is
/// raised if needed to deliver every touch.
pub fn run(args: &[String]) -> Result<(), i32> {
    let options = parse_run_args(args).map_err(|e| {
        eprintln!("error: {e}");
        eprintln!("Usage: lso run <input.lsob> [--ticks N] [--config file.json] [--touch N]");
        1
    })?;

    let image = read_image(&options.input)?;
    check(&image)?;
    let image = lso_vm::load(image).map_err(|e| {
        eprintln!("error: {e}");
        2
    })?;

    let config = load_config(options.config.as_deref()).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let builtins = host::builtins().map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let mut scheduler = Scheduler::new(config, builtins).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    let name = Path::new(&options.input)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("script")
        .to_string();
    let id = scheduler.create(image, ObjectId::default(), &name);

    let ticks = options.ticks.max(options.touches.saturating_add(1));
    let mut instructions = 0;
    for tick in 0..ticks {
        if (1..=options.touches).contains(&tick) {
            let touch = EventRecord::new(EventKind::TouchStart, vec![Value::Integer(1)])
                .map_err(|e| {
                    eprintln!("error: {e}");
                    1
                })?;
            if scheduler.post(id, touch) == Some(Delivery::NotInMask) {
                debug!(tick, "touch_start not handled in the current state");
            }
        }

        let report = scheduler.tick(TICK);
        instructions += report.instructions;
        if let Some(instance) = scheduler.instance_mut(id) {
            for line in instance.take_output() {
                println!("{line}");
            }
        }
        if let Some((_, fault)) = report.faults.first() {
            eprintln!("runtime fault: {fault}");
            return Err(3);
        }
    }

    info!(ticks, instructions, "run finished");
    Ok(())
}

fn check(image: &BytecodeImage) -> Result<(), i32> {
    lso_verifier::verify(image).map_err(|errors| {
        for e in &errors {
            eprintln!("error: {e}");
        }
        2
    })
}

fn read_image(path: &str) -> Result<BytecodeImage, i32> {
    let bytes = fs::read(path).map_err(|e| {
        eprintln!("error: cannot read '{path}': {e}");
        1
    })?;
    BytecodeImage::decode(&bytes).map_err(|e| {
        eprintln!("error: {e}");
        1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_output_names() {
        assert_eq!(default_output("door.lsl.s"), "door.lsob");
        assert_eq!(default_output("door.s"), "door.lsob");
        assert_eq!(default_output("door"), "door.lsob");
    }

    #[test]
    fn run_defaults() {
        assert_eq!(
            parse_run_args(&args(&["a.lsob"])).unwrap(),
            RunOptions {
                input: "a.lsob".into(),
                ticks: DEFAULT_TICKS,
                config: None,
                touches: 0,
            }
        );
    }

    #[test]
    fn run_flags_in_any_order() {
        let options =
            parse_run_args(&args(&["a.lsob", "--touch", "2", "--config", "c.json", "--ticks", "5"]))
                .unwrap();
        assert_eq!(options.ticks, 5);
        assert_eq!(options.touches, 2);
        assert_eq!(options.config.as_deref(), Some("c.json"));
    }

    #[test]
    fn run_flag_errors() {
        assert!(parse_run_args(&[]).is_err());
        assert!(parse_run_args(&args(&["a.lsob", "--ticks"])).is_err());
        assert!(parse_run_args(&args(&["a.lsob", "--ticks", "many"])).is_err());
        assert!(parse_run_args(&args(&["a.lsob", "--fast"])).is_err());
    }

    #[test]
    fn config_file_is_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "budget_per_slice": 50 }"#).unwrap();
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.budget_per_slice, 50);
        assert_eq!(config.heap_limit, VmConfig::default().heap_limit);

        fs::write(&path, r#"{ "budget": 50 }"#).unwrap();
        assert!(load_config(path.to_str()).is_err());
    }
}
