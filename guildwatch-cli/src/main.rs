//! guildwatch CLI binary.

use std::io::BufReader;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use guildwatch_cli::commands::{
    describe_outcome, execute_check, execute_replay, execute_watch, CommandError,
};
use guildwatch_cli::exit::{codes, exit_code};
use guildwatch_cli::{CheckArgs, Cli, Command, ReplayArgs, ShutdownFlag, WatchArgs};
use guildwatch_clock::SystemClock;
use guildwatch_core::{Logger, StderrLogger, Verbosity};
use guildwatch_fs::RealFilesystem;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logger: Arc<dyn Logger> = Arc::new(StderrLogger::new(Verbosity::from_count(cli.verbose)));

    let result = match cli.command {
        Command::Replay(args) => run_replay(args, logger),
        Command::Watch(args) => run_watch(args, logger),
        Command::Check(args) => run_check(args),
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}

fn run_replay(args: ReplayArgs, logger: Arc<dyn Logger>) -> Result<i32, CommandError> {
    let summary = execute_replay(&args, &RealFilesystem, logger)?;

    println!("Replayed {} events and {} commands", summary.events, summary.commands);
    println!("  Timers drained: {}", summary.timers_drained);
    println!(
        "  Effects: {} applied, {} refused",
        summary.effects, summary.refused
    );
    println!("  Audit records: {}", summary.audit_records);
    for (title, count) in &summary.audit_titles {
        println!("    {:>4}  {}", count, title);
    }
    for outcome in &summary.outcomes {
        println!("  > {}", describe_outcome(outcome));
    }
    if let Some(path) = &summary.summary_path {
        println!("Summary: {}", path.display());
    }

    Ok(codes::SUCCESS)
}

fn run_watch(args: WatchArgs, logger: Arc<dyn Logger>) -> Result<i32, CommandError> {
    let shutdown = ShutdownFlag::on_ctrl_c().unwrap_or_else(|e| {
        logger.info("watch", &format!("Ctrl+C handler not installed: {e}"));
        ShutdownFlag::default()
    });
    let stdin = BufReader::new(std::io::stdin());

    let summary = execute_watch(&args, stdin, SystemClock, &RealFilesystem, &shutdown, logger)?;

    println!(
        "Processed {} records ({} commands, {} rejected), {} audit records",
        summary.records, summary.commands, summary.rejected, summary.audit_records
    );
    println!(
        "  Effects: {} applied, {} refused",
        summary.effects, summary.refused
    );

    if summary.interrupted {
        Ok(codes::SIGINT)
    } else {
        Ok(codes::SUCCESS)
    }
}

fn run_check(args: CheckArgs) -> Result<i32, CommandError> {
    let report = execute_check(&args, &RealFilesystem)?;
    for line in report.lines() {
        println!("{}", line);
    }
    Ok(codes::SUCCESS)
}
