// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Verdict Control CLI
//!
//! Run code interactively and submit it for judging from a terminal.
//!
//! Usage:
//!   verdict-ctl <command> [options]
//!
//! Commands:
//!   run --problem <id> --language <lang> --file <path>
//!   submit --problem <id> [--contest <id>] --language <lang> --file <path>
//!   watch                         Print every submissions feed event
//!   languages                     List supported languages

use std::fs;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;
use verdict_client::{
    BusEvent, ClientConfig, HttpSubmissionApi, JudgePhase, LineKind, Phase, RunPhase,
    SubmissionBus, Workspace, WorkspaceConfig,
};
use verdict_protocol::{ContestId, Language, ProblemId, SubmissionEvent, Transport, WsTransport};

fn print_usage() {
    eprintln!(
        r#"Usage: verdict-ctl <command> [options]

Run and judge code against a verdict server.

COMMANDS:
    run                             Run code interactively
    submit                          Submit code and wait for the verdict
    watch                           Print submissions feed events
    languages                       List supported languages

RUN OPTIONS:
    --problem <id>                  Problem ID (required)
    --language <lang>               Language (required)
    --file <path>                   Source file (required)

SUBMIT OPTIONS:
    --problem <id>                  Problem ID (required)
    --contest <id>                  Contest ID
    --language <lang>               Language (required)
    --file <path>                   Source file (required)

While a run is active, lines typed on stdin are sent to the program and
Ctrl-C asks the server to kill it.

ENVIRONMENT:
    VERDICT_API_URL                 API base URL (default: http://127.0.0.1:8080/api)
    VERDICT_WS_URL                  Channel base URL (default: ws://127.0.0.1:8080/ws)
    VERDICT_TOKEN                   Access token
    VERDICT_RUN_WATCHDOG_MS         End silent runs after this long (default: off)
    RUST_LOG                        Log filter (default: verdict_client=info)

EXAMPLES:
    # Run a Python solution and type its input
    verdict-ctl run --problem 1 --language python --file main.py

    # Submit a C++ solution inside a contest
    verdict-ctl submit --problem 7 --contest 3 --language cpp --file main.cpp
"#
    );
}

#[derive(Debug)]
enum Command {
    Run {
        problem_id: i64,
        language: Language,
        file: String,
    },
    Submit {
        problem_id: i64,
        contest_id: Option<i64>,
        language: Language,
        file: String,
    },
    Watch,
    Languages,
}

fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from_vec(&args)
}

fn parse_args_from_vec(args: &[String]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("No command specified".to_string());
    }

    match args[1].as_str() {
        "help" | "--help" | "-h" => {
            print_usage();
            std::process::exit(0);
        }
        "languages" => Ok(Command::Languages),
        "watch" => match args.get(2) {
            Some(arg) => Err(format!("Unknown argument: {}", arg)),
            None => Ok(Command::Watch),
        },
        cmd @ ("run" | "submit") => {
            let mut problem_id: Option<i64> = None;
            let mut contest_id: Option<i64> = None;
            let mut language: Option<Language> = None;
            let mut file: Option<String> = None;

            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--problem" => {
                        i += 1;
                        problem_id = Some(
                            args.get(i)
                                .ok_or("--problem requires an ID")?
                                .parse()
                                .map_err(|_| "Invalid problem ID")?,
                        );
                    }
                    "--contest" if cmd == "submit" => {
                        i += 1;
                        contest_id = Some(
                            args.get(i)
                                .ok_or("--contest requires an ID")?
                                .parse()
                                .map_err(|_| "Invalid contest ID")?,
                        );
                    }
                    "--language" => {
                        i += 1;
                        language = Some(args.get(i).ok_or("--language requires a value")?.parse()?);
                    }
                    "--file" => {
                        i += 1;
                        file = Some(args.get(i).ok_or("--file requires a path")?.clone());
                    }
                    arg => return Err(format!("Unknown argument: {}", arg)),
                }
                i += 1;
            }

            let problem_id = problem_id.ok_or("--problem is required")?;
            let language = language.ok_or("--language is required")?;
            let file = file.ok_or("--file is required")?;

            if cmd == "run" {
                Ok(Command::Run {
                    problem_id,
                    language,
                    file,
                })
            } else {
                Ok(Command::Submit {
                    problem_id,
                    contest_id,
                    language,
                    file,
                })
            }
        }
        cmd => Err(format!("Unknown command: {}", cmd)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("verdict_client=info".parse().expect("valid directive")),
        )
        .init();

    let cmd = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let config = match ClientConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match execute_command(&config, cmd).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute_command(config: &ClientConfig, cmd: Command) -> Result<ExitCode, String> {
    match cmd {
        Command::Languages => {
            for language in Language::ALL {
                println!(
                    "{:<12} {:<22} {}",
                    language.wire_name(),
                    language.display_name(),
                    language.run_command()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            problem_id,
            language,
            file,
        } => {
            let code = fs::read_to_string(&file).map_err(|e| format!("{}: {}", file, e))?;
            let workspace_config = WorkspaceConfig::new(ProblemId(problem_id), language)
                .with_client_config(config);
            run_interactive(config, workspace_config, code).await
        }
        Command::Submit {
            problem_id,
            contest_id,
            language,
            file,
        } => {
            let code = fs::read_to_string(&file).map_err(|e| format!("{}: {}", file, e))?;
            let mut workspace_config = WorkspaceConfig::new(ProblemId(problem_id), language)
                .with_client_config(config);
            if let Some(contest_id) = contest_id {
                workspace_config = workspace_config.with_contest(ContestId(contest_id));
            }
            submit_and_wait(config, workspace_config, code).await
        }
        Command::Watch => watch_feed(config).await,
    }
}

fn open_workspace(
    config: &ClientConfig,
    workspace_config: WorkspaceConfig,
    transport: Arc<dyn Transport>,
    bus: SubmissionBus,
) -> Result<(Workspace, verdict_client::EventStream), String> {
    let api = HttpSubmissionApi::from_config(config).map_err(|e| e.to_string())?;
    Ok(Workspace::new(
        workspace_config,
        transport,
        Arc::new(api),
        bus,
    ))
}

fn transport(config: &ClientConfig) -> Arc<dyn Transport> {
    Arc::new(WsTransport::new(
        config.transport_config(),
        config.token_provider(),
    ))
}

async fn run_interactive(
    config: &ClientConfig,
    workspace_config: WorkspaceConfig,
    code: String,
) -> Result<ExitCode, String> {
    let (mut workspace, mut events) = open_workspace(
        config,
        workspace_config,
        transport(config),
        SubmissionBus::new(),
    )?;
    workspace.set_code(code);
    workspace.run().map_err(|e| e.to_string())?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut cursor = 0;

    loop {
        cursor = print_terminal(&workspace, cursor);
        if !workspace.execution().is_running() {
            break;
        }

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => workspace.handle(event),
                None => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = workspace.send_stdin(&line) {
                        eprintln!("[input not sent: {}]", e);
                    }
                }
                Ok(None) | Err(_) => {
                    debug!("stdin closed");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                if workspace.kill() {
                    eprintln!("[kill requested]");
                }
            }
        }
    }

    let _ = std::io::stdout().flush();
    if let Some(exit) = workspace.exit_summary() {
        eprintln!("[{}]", exit);
    }
    eprintln!("[{}]", workspace.run_phase().name());

    let success = workspace.run_phase() == RunPhase::Completed
        && workspace.exit_summary().is_some_and(|e| e.exit_code == 0);
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Print lines appended since `cursor`; returns the new cursor.
fn print_terminal(workspace: &Workspace, cursor: usize) -> usize {
    let terminal = workspace.terminal();
    for line in terminal.since(cursor) {
        match line.kind {
            LineKind::Cmd => println!("{}", line),
            LineKind::Stdout => print!("{}", line),
            LineKind::Stderr if line.text.ends_with('\n') => eprint!("{}", line),
            LineKind::Stderr => eprintln!("{}", line),
            // already on screen as typed
            LineKind::Stdin => {}
        }
    }
    terminal.len()
}

async fn submit_and_wait(
    config: &ClientConfig,
    workspace_config: WorkspaceConfig,
    code: String,
) -> Result<ExitCode, String> {
    let transport = transport(config);
    let bus = SubmissionBus::new();
    let _feed = bus.connect(transport.as_ref());

    let (mut workspace, mut events) =
        open_workspace(config, workspace_config, transport, bus)?;
    workspace.set_code(code);
    workspace.submit().map_err(|e| e.to_string())?;
    println!("Submitting...");

    let mut shown_score: Option<f64> = None;
    while workspace.step(&mut events).await {
        let status = workspace.judge_status();
        match status.phase {
            JudgePhase::Judging => {
                if shown_score != Some(status.score) {
                    if let Some(id) = status.submission_id {
                        println!("Submission {}: judging, score {}", id, status.score);
                    }
                    shown_score = Some(status.score);
                }
            }
            JudgePhase::Success | JudgePhase::Failed => break,
            JudgePhase::Idle | JudgePhase::Submitting => {}
        }
    }

    let status = workspace.judge_status();
    println!(
        "{} (score {})",
        status.message.as_deref().unwrap_or("No verdict"),
        status.score
    );
    if let Some(detail) = status.detail {
        println!("{}", detail);
    }

    Ok(if status.phase == JudgePhase::Success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn watch_feed(config: &ClientConfig) -> Result<ExitCode, String> {
    let transport = transport(config);
    let bus = SubmissionBus::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = bus.subscribe(move |event: &BusEvent| {
        tx.send(event.clone())
            .map_err(|_| verdict_client::DeliveryError::Disconnected)
    });
    let _feed = bus.connect(transport.as_ref());

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(BusEvent::Submission(event)) => {
                    let kind = match event {
                        SubmissionEvent::New(_) => "NEW",
                        SubmissionEvent::Update(_) => "UPDATE",
                    };
                    let record = event.record();
                    println!(
                        "{:<6} #{} {:?} result={} score={}",
                        kind,
                        record.id,
                        record.status,
                        record.result.map(|r| r.label()).unwrap_or("-"),
                        record.score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                    );
                }
                Some(BusEvent::ConnectionLost(reason)) => {
                    return Err(format!("feed lost: {}", reason));
                }
                None => return Ok(ExitCode::FAILURE),
            },
            _ = tokio::signal::ctrl_c() => return Ok(ExitCode::SUCCESS),
        }
    }
}
