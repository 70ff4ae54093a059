//! body-player - replay a recorded whole-body motion on a robot.
//!
//! Loads the recording, reads the robot's current posture, asks before moving
//! to the starting pose and again before playing, then streams one clamped
//! pose per tick to all five limb groups.
//!
//! Usage:
//!   body-player [options]
//!
//! Options:
//!   --robot <name>            Robot name (default: icubGazeboSim)
//!   --file <path>             Human recording (default: jointAngles_noheader.txt)
//!   --robot-file <path>       Play a robot-space recording instead of --file
//!   --start <tick>            First tick to play (default: 0)
//!   --verbosity <n>           0 warn, 1 info, 2 debug, 3+ trace (default: 2)
//!   --tick-ms <ms>            Tick period in milliseconds (default: 100)
//!   --encoder-attempts <n>    Encoder read attempts per limb (default: 20)
//!   --yes                     Confirm both gates without asking

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use body_player::{
    AutoConfirm, Confirmation, ConsolePrompt, MotionSource, PlaybackConfig, PlaybackController,
    SessionOutcome, SessionRequest, SimulatedRobot,
};

const EXIT_INTERRUPTED: i32 = 130;

struct Args {
    robot: String,
    file: PathBuf,
    robot_file: Option<PathBuf>,
    start: usize,
    verbosity: u32,
    tick_ms: u64,
    encoder_attempts: u32,
    yes: bool,
}

/// Parse the value following flag `i`, or report why it is unusable.
fn flag_value<T: std::str::FromStr>(args: &[String], i: usize) -> Option<T> {
    let flag = &args[i];
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {} requires a value", flag);
        return None;
    };
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            eprintln!("Error: invalid value `{}` for {}", raw, flag);
            None
        }
    }
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = std::env::args().collect();
    parse_from(&args)
}

fn parse_from(args: &[String]) -> Option<Args> {
    let mut robot = "icubGazeboSim".to_string();
    let mut file = PathBuf::from("jointAngles_noheader.txt");
    let mut robot_file = None;
    let mut start: i64 = 0;
    let mut verbosity = 2;
    let mut tick_ms = 100;
    let mut encoder_attempts = 20;
    let mut yes = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--robot" => {
                robot = flag_value(args, i)?;
                i += 2;
            }
            "--file" => {
                file = flag_value(args, i)?;
                i += 2;
            }
            "--robot-file" => {
                robot_file = Some(flag_value(args, i)?);
                i += 2;
            }
            "--start" => {
                start = flag_value(args, i)?;
                i += 2;
            }
            "--verbosity" => {
                verbosity = flag_value(args, i)?;
                i += 2;
            }
            "--tick-ms" => {
                tick_ms = flag_value(args, i)?;
                i += 2;
            }
            "--encoder-attempts" => {
                encoder_attempts = flag_value(args, i)?;
                i += 2;
            }
            "--yes" | "-y" => {
                yes = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Error: unknown argument {}", other);
                return None;
            }
        }
    }

    if start < 0 {
        // subscriber is not installed yet
        eprintln!("Warning: negative starting tick {}, starting from 0", start);
        start = 0;
    }

    Some(Args {
        robot,
        file,
        robot_file,
        start: start as usize,
        verbosity,
        tick_ms,
        encoder_attempts,
        yes,
    })
}

fn print_usage() {
    println!("body-player - replay a recorded whole-body motion");
    println!();
    println!("Usage: body-player [options]");
    println!();
    println!("Options:");
    println!("  --robot <name>            Robot name (default: icubGazeboSim)");
    println!("  --file <path>             Human recording (default: jointAngles_noheader.txt)");
    println!("  --robot-file <path>       Play a robot-space recording instead of --file");
    println!("  --start <tick>            First tick to play (default: 0)");
    println!("  --verbosity <n>           0 warn, 1 info, 2 debug, 3+ trace (default: 2)");
    println!("  --tick-ms <ms>            Tick period in milliseconds (default: 100)");
    println!("  --encoder-attempts <n>    Encoder read attempts per limb (default: 20)");
    println!("  --yes                     Confirm both gates without asking");
    println!();
    println!("Examples:");
    println!("  body-player --file jointAngles_noheader.txt --start 120");
    println!("  body-player --robot icubSim --robot-file getup_robot.txt --yes");
}

fn level(verbosity: u32) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

async fn play<C: Confirmation>(
    args: &Args,
    confirm: C,
    cancel: CancellationToken,
) -> Result<SessionOutcome> {
    let robot = SimulatedRobot::new(&args.robot);
    let config = PlaybackConfig::new()
        .tick_period(Duration::from_millis(args.tick_ms))
        .encoder_attempts(args.encoder_attempts);

    let source = match &args.robot_file {
        Some(path) => MotionSource::Robot(path.clone()),
        None => MotionSource::Human(args.file.clone()),
    };
    let request = SessionRequest::new(source).start_tick(args.start);

    let mut controller =
        PlaybackController::new(robot.driver(), confirm, config).with_cancellation(cancel);
    controller
        .run(&request)
        .await
        .with_context(|| format!("playback of {} failed", request.source.path().display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(args) = parse_args() else {
        eprintln!();
        print_usage();
        std::process::exit(2);
    };

    let directive = format!("body_player={}", level(args.verbosity));
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse()?)
                .add_directive("warn".parse()?),
        )
        .init();

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received, stopping...");
        cancel_clone.cancel();
    });

    println!();
    println!("========================================");
    println!("Body Player");
    println!("========================================");
    println!("Robot:      {}", args.robot);
    match &args.robot_file {
        Some(path) => println!("Recording:  {} (robot space)", path.display()),
        None => println!("Recording:  {} (human)", args.file.display()),
    }
    println!("Start tick: {}", args.start);
    println!("Tick:       {}ms", args.tick_ms);
    println!("========================================");
    println!();

    let outcome = if args.yes {
        play(&args, AutoConfirm, cancel).await
    } else {
        play(&args, ConsolePrompt::stdio(), cancel).await
    };

    match outcome {
        Ok(SessionOutcome::Finished(report)) => {
            println!(
                "Finished: {} ticks played, joint limits violated x{} times",
                report.ticks_played, report.total_violations
            );
            Ok(())
        }
        Ok(SessionOutcome::Declined(gate)) => {
            println!("{:?} declined, nothing more sent to the robot", gate);
            Ok(())
        }
        Ok(SessionOutcome::Interrupted(report)) => {
            println!(
                "Interrupted after {} ticks, joint limits violated x{} times",
                report.ticks_played, report.total_violations
            );
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
