use a0::diagnostic::Diagnostic;
use a0::eval::run_program;
use a0::formatter;
use a0::parser::parse_program;
use a0::policy::Policy;
use a0::stdlib::StdlibRegistry;
use a0::tools::ToolRegistry;
use a0::trace::{NullSink, TraceEvent, TraceSink};
use a0::validator::validate;
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// A0 program runner and tooling
#[derive(Parser, Debug)]
#[command(name = "a0")]
#[command(version)]
#[command(about = "Runs, checks, formats, and traces A0 scripts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an A0 program
    Run {
        /// Script file, or `-` to read from stdin
        file: String,
        /// Bypass policy files entirely and allow every known capability
        #[arg(long)]
        unsafe_allow_all: bool,
        /// Render diagnostics as colored multi-line text instead of JSON
        #[arg(long)]
        pretty: bool,
        /// Append NDJSON trace events to this file
        #[arg(long, value_name = "PATH")]
        trace: Option<PathBuf>,
        /// Write accumulated assert/check evidence as JSON to this file
        #[arg(long, value_name = "PATH")]
        evidence: Option<PathBuf>,
    },
    /// Parse and validate an A0 program without running it
    Check {
        /// Script file, or `-` to read from stdin
        file: String,
        /// Render diagnostics as colored multi-line text instead of JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Print the canonical formatting of an A0 program
    Fmt {
        /// Script file, or `-` to read from stdin
        file: String,
        /// Overwrite the file instead of printing to stdout
        #[arg(long)]
        write: bool,
    },
    /// Summarize a recorded NDJSON trace file
    Trace {
        /// Path to a `.jsonl` trace file
        file: PathBuf,
        /// Print the summary as JSON (default)
        #[arg(long)]
        json: bool,
        /// Print the summary as human-readable text
        #[arg(long)]
        text: bool,
    },
    /// Describe the language, a stdlib function, or a tool
    Help {
        /// Name of a stdlib function, tool, or language keyword
        topic: Option<String>,
        /// List every known topic instead of describing one
        #[arg(long)]
        index: bool,
    },
    /// Show the resolved capability policy for the current directory
    Policy {
        #[arg(long)]
        unsafe_allow_all: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { file, unsafe_allow_all, pretty, trace, evidence } => {
            cmd_run(&file, unsafe_allow_all, pretty, trace, evidence)
        }
        Command::Check { file, pretty } => cmd_check(&file, pretty),
        Command::Fmt { file, write } => cmd_fmt(&file, write),
        Command::Trace { file, json, text } => cmd_trace(&file, json, text),
        Command::Help { topic, index } => cmd_help(topic.as_deref(), index),
        Command::Policy { unsafe_allow_all } => cmd_policy(unsafe_allow_all),
    }
}

/// Reads `path`'s contents, or stdin when `path` is `-`.
fn read_source(path: &str) -> Result<String, String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map_err(|e| format!("failed to read stdin: {e}"))?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))
    }
}

/// The file name recorded in spans: `-` reads as stdin, but a span naming
/// `-` is still useful for diagnostics, so it passes through unchanged.
fn source_name(path: &str) -> &str {
    if path == "-" {
        "<stdin>"
    } else {
        path
    }
}

fn print_diagnostic(diag: &Diagnostic, pretty: bool) {
    if pretty {
        eprintln!("error[{}]: {}", diag.code(), diag);
        if let Some(span) = diag.span() {
            eprintln!("  --> {span}");
        }
    } else {
        let json = serde_json::to_string(diag).unwrap_or_else(|_| "{}".to_string());
        eprintln!("{json}");
    }
}

fn reserved_names(stdlib: &StdlibRegistry) -> std::collections::HashSet<String> {
    let mut names = stdlib.names();
    names.insert("map".to_string());
    names.insert("reduce".to_string());
    names
}

/// Parses and validates `src`, returning the AST on success. Shared by
/// `run`/`check` so both subcommands reject the same programs the same way.
fn parse_and_validate(file: &str, src: &str) -> Result<a0::ast::Program, Diagnostic> {
    let program = parse_program(file, src)?;
    let stdlib = StdlibRegistry::new();
    let errs = validate(&program, &reserved_names(&stdlib));
    if let Some(first) = errs.into_iter().next() {
        return Err(first);
    }
    Ok(program)
}

fn cmd_check(file: &str, pretty: bool) -> ExitCode {
    let src = match read_source(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };
    match parse_and_validate(source_name(file), &src) {
        Ok(_) => {
            println!("ok");
            ExitCode::from(0)
        }
        Err(diag) => {
            print_diagnostic(&diag, pretty);
            ExitCode::from(diag.exit_code() as u8)
        }
    }
}

struct FileTraceSink(std::fs::File);

impl TraceSink for FileTraceSink {
    fn emit(&mut self, event: TraceEvent) {
        let _ = self.0.write_all(event.to_ndjson_line().as_bytes());
    }
}

fn cmd_run(
    file: &str,
    unsafe_allow_all: bool,
    pretty: bool,
    trace_path: Option<PathBuf>,
    evidence_path: Option<PathBuf>,
) -> ExitCode {
    let src = match read_source(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };
    let program = match parse_and_validate(source_name(file), &src) {
        Ok(p) => p,
        Err(diag) => {
            print_diagnostic(&diag, pretty);
            return ExitCode::from(diag.exit_code() as u8);
        }
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let policy = Policy::resolve(&cwd, unsafe_allow_all);
    let stdlib = StdlibRegistry::new();
    let tools = ToolRegistry::with_defaults(cwd.join(".a0-sandbox"));
    let run_id = uuid::Uuid::new_v4().to_string();

    let mut file_sink;
    let mut null_sink = NullSink;
    let sink: &mut dyn TraceSink = if let Some(path) = &trace_path {
        match std::fs::File::create(path) {
            Ok(f) => {
                file_sink = FileTraceSink(f);
                &mut file_sink
            }
            Err(e) => {
                eprintln!("failed to open trace file {}: {e}", path.display());
                return ExitCode::from(1);
            }
        }
    } else {
        &mut null_sink
    };

    match run_program(&program, &stdlib, &tools, &policy, sink, run_id) {
        Ok(outcome) => {
            let json = serde_json::to_string(&outcome.value).unwrap_or_else(|_| "null".to_string());
            println!("{json}");
            if let Some(path) = &evidence_path {
                let evidence_json = serde_json::to_string_pretty(&outcome.evidence.to_json()).unwrap_or_default();
                if let Err(e) = std::fs::write(path, evidence_json) {
                    eprintln!("failed to write evidence file {}: {e}", path.display());
                    return ExitCode::from(1);
                }
            }
            ExitCode::from(0)
        }
        Err(diag) => {
            print_diagnostic(&diag, pretty);
            ExitCode::from(diag.exit_code() as u8)
        }
    }
}

fn cmd_fmt(file: &str, write: bool) -> ExitCode {
    let src = match read_source(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };
    if formatter::contains_comment(&src) {
        eprintln!("warning: {file} contains '#' comments, which are not preserved by the formatter");
    }
    match formatter::format_source(source_name(file), &src) {
        Ok(formatted) => {
            if write && file != "-" {
                if let Err(e) = std::fs::write(file, &formatted) {
                    eprintln!("failed to write {file}: {e}");
                    return ExitCode::from(1);
                }
            } else {
                print!("{formatted}");
            }
            ExitCode::from(0)
        }
        Err(diag) => {
            print_diagnostic(&diag, false);
            ExitCode::from(diag.exit_code() as u8)
        }
    }
}

fn cmd_trace(file: &std::path::Path, json: bool, text: bool) -> ExitCode {
    let contents = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to read {}: {e}", file.display());
            return ExitCode::from(1);
        }
    };
    let events: Vec<serde_json::Value> = contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();
    let summary = a0::trace::summarize(&events);
    if text && !json {
        println!("run:        {}", summary.run_id);
        println!("events:     {}", summary.total_events);
        println!("tools:      {} ({:?})", summary.tool_invocations, summary.tools_by_name);
        println!("evidence:   {} ({} failed)", summary.evidence_count, summary.failures);
        println!("budget hit: {}", summary.budget_exceeded);
        if let (Some(start), Some(end)) = (&summary.start_time, &summary.end_time) {
            println!("span:       {start} .. {end}");
        }
        if let Some(ms) = summary.duration_ms {
            println!("duration:   {ms}ms");
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
    }
    ExitCode::from(0)
}

fn cmd_policy(unsafe_allow_all: bool) -> ExitCode {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let policy = Policy::resolve(&cwd, unsafe_allow_all);
    println!("source: {:?}", policy.source());
    println!("effective capabilities: {:?}", policy.effective_capabilities());
    if !policy.limits().is_empty() {
        println!("limits (informational only): {:?}", policy.limits());
    }
    ExitCode::from(0)
}

const HELP_TOPICS: &[(&str, &str)] = &[
    ("cap", "`cap { capability: true, ... }` declares the capabilities a program needs; checked against policy at entry and at every tool call."),
    ("budget", "`budget { timeMs, maxToolCalls, maxBytesWritten, maxIterations }` declares runtime resource ceilings."),
    ("fn", "`fn name(params) { ... }` declares a top-level function; it runs against the program's top-level scope, never the caller's."),
    ("for", "`for { in: list, as: \"name\" } { body }` iterates a list, yielding the list of the body's per-element results."),
    ("loop", "`loop { in: init, times: N, as: \"name\" } { body }` threads state through N iterations, yielding the final value."),
    ("match", "`match subject { ok name { ... } err name { ... } }` inspects a record with exactly one of `ok`/`err`."),
    ("try", "`try { body } catch name { body }` runs body, binding `name` to `{code, message}` on a recoverable error."),
    ("filter", "`filter { in: list, as: \"name\" } { body }` (or `fn:`/`by:` forms) keeps elements whose evaluated result is truthy."),
    ("assert", "`assert { that, msg }` raises `E_ASSERT` (exit 5) when `that` is falsy."),
    ("check", "`check { that, msg }` records an evidence entry but never halts execution."),
];

fn cmd_help(topic: Option<&str>, index: bool) -> ExitCode {
    if index || topic.is_none() {
        println!("Language keywords:");
        for (name, _) in HELP_TOPICS {
            println!("  {name}");
        }
        println!("Run `a0 help <topic>` for details.");
        return ExitCode::from(0);
    }
    let topic = topic.unwrap();
    match HELP_TOPICS.iter().find(|(name, _)| *name == topic) {
        Some((_, text)) => {
            println!("{text}");
            ExitCode::from(0)
        }
        None => {
            eprintln!("no help topic named '{topic}'; try `a0 help --index`");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_name_maps_stdin_marker() {
        assert_eq!(source_name("-"), "<stdin>");
        assert_eq!(source_name("script.a0"), "script.a0");
    }

    #[test]
    fn reserved_names_include_special_forms_not_in_the_registry() {
        let stdlib = StdlibRegistry::new();
        let names = reserved_names(&stdlib);
        assert!(names.contains("map"));
        assert!(names.contains("reduce"));
        assert!(names.contains("len"));
    }

    #[test]
    fn parse_and_validate_rejects_unbound_identifiers() {
        let err = parse_and_validate("t.a0", "return x").unwrap_err();
        assert_eq!(err.code(), "E_UNBOUND");
    }

    #[test]
    fn parse_and_validate_accepts_hello_program() {
        assert!(parse_and_validate("t.a0", "let x = 42\nreturn { value: x }").is_ok());
    }

    #[test]
    fn help_index_lists_known_topics() {
        assert!(HELP_TOPICS.iter().any(|(name, _)| *name == "assert"));
    }

    #[test]
    fn buffer_sink_default_is_empty() {
        let sink = a0::trace::BufferSink::default();
        assert!(sink.events.is_empty());
    }
}
