//! Command-line interface for the POR task analysis.

use clap::{Parser, Subcommand};
use miette::{Diagnostic, NamedSource, SourceSpan};
use ntspor_nts::{Nts, NtsError, StateId};
use ntspor_tasks::analyze::{analyze, format_transition_info, TasksProfile};
use ntspor_tasks::{
    EveryTaskActivatesEvery, Globals, NodeRecords, StatementEffects, Task, TaskId, Tasks,
    TasksConfig, TasksError,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI error with source context for pretty printing.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to read file: {message}")]
    IoError { message: String },

    #[error("parse error: {message}")]
    #[diagnostic(code(ntspor::parse_error))]
    ParseError {
        message: String,
        #[source_code]
        src: NamedSource<Arc<String>>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("invalid program: {message}")]
    #[diagnostic(code(ntspor::invalid_program))]
    InvalidProgram { message: String },

    #[error("task analysis failed: {message}")]
    #[diagnostic(
        code(ntspor::task_error),
        help("every state of a non-main unit needs an 'origin' annotation")
    )]
    TaskError { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl CliError {
    fn from_nts_error(e: NtsError, source: Arc<String>, filename: &str) -> Self {
        match e {
            NtsError::Json(json) => {
                let offset = byte_offset(&source, json.line(), json.column());
                CliError::ParseError {
                    message: json.to_string(),
                    src: NamedSource::new(filename, source),
                    span: (offset, 0).into(),
                }
            }
            other => CliError::InvalidProgram {
                message: other.to_string(),
            },
        }
    }

    fn from_tasks_error(e: TasksError) -> Self {
        match e {
            TasksError::InvalidProgram(inner) => CliError::InvalidProgram {
                message: inner.to_string(),
            },
            other => CliError::TaskError {
                message: other.to_string(),
            },
        }
    }
}

type CliResult<T> = Result<T, CliError>;

/// Byte offset of a 1-based line/column position.
fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}

#[derive(Parser)]
#[command(name = "ntspor", version)]
#[command(about = "Task partitioning and global effect summaries for partial order reduction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct AnalysisArgs {
    /// Input file (flattened system as JSON)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Unit treated as a single task named after itself
    #[arg(short, long, default_value = "main")]
    main: String,

    /// Separator between the task name and the rest of an origin string
    #[arg(long, default_value_t = ':')]
    separator: char,

    /// Name of the state annotation holding the origin string
    #[arg(long, default_value = "origin")]
    origin_annotation: String,

    /// Print machine-readable JSON instead of text
    #[arg(long)]
    json: bool,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl AnalysisArgs {
    fn config(&self) -> TasksConfig {
        TasksConfig {
            origin_annotation: self.origin_annotation.clone(),
            separator: self.separator,
            ..TasksConfig::with_main(self.main.as_str())
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load a system and check its structure
    Validate {
        /// Input file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Partition a system into tasks and show their global effects
    Tasks {
        #[command(flatten)]
        args: AnalysisArgs,

        /// Also list the effect of every transition
        #[arg(long)]
        transitions: bool,
    },

    /// Show which tasks may interfere and through which globals
    Conflicts {
        #[command(flatten)]
        args: AnalysisArgs,
    },
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Tasks { args, .. } | Commands::Conflicts { args } => args.verbose,
        Commands::Validate { .. } => false,
    };
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Tasks { args, transitions } => cmd_tasks(&args, transitions),
        Commands::Conflicts { args } => cmd_conflicts(&args),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}

fn load(file: &PathBuf) -> CliResult<Nts> {
    let filename = file.display().to_string();
    let source = Arc::new(fs::read_to_string(file).map_err(|e| CliError::IoError {
        message: e.to_string(),
    })?);
    Nts::from_json(&source).map_err(|e| CliError::from_nts_error(e, source.clone(), &filename))
}

fn run_tasks(nts: &Nts, args: &AnalysisArgs) -> CliResult<Tasks> {
    info!("computing tasks...");
    let start = Instant::now();
    let tasks = Tasks::compute_with(
        nts,
        &args.config(),
        &StatementEffects,
        &EveryTaskActivatesEvery,
        NodeRecords::new(),
    )
    .map_err(CliError::from_tasks_error)?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "done");
    Ok(tasks)
}

fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Other {
        message: e.to_string(),
    })
}

fn cmd_validate(file: &PathBuf) -> CliResult<()> {
    let nts = load(file)?;
    nts.validate().map_err(|e| CliError::InvalidProgram {
        message: e.to_string(),
    })?;

    let states: usize = nts.basic_nts.iter().map(|bn| bn.states.len()).sum();
    let transitions: usize = nts.basic_nts.iter().map(|bn| bn.transitions.len()).sum();
    println!("system {}", nts.name);
    println!("  {} globals", nts.globals.len());
    println!(
        "  {} units ({} states, {} transitions)",
        nts.basic_nts.len(),
        states,
        transitions
    );
    for inst in &nts.instances {
        println!("    instance {} x{}", inst.basic_nts, inst.count);
    }
    println!("validate: ok");
    Ok(())
}

#[derive(Serialize)]
struct TaskReport<'a> {
    id: TaskId,
    name: &'a str,
    number: Option<u32>,
    states: Vec<String>,
    initial_states: Vec<String>,
    final_states: Vec<String>,
    direct: &'a Globals,
    transitive: &'a Globals,
}

#[derive(Serialize)]
struct TasksReport<'a> {
    main_task: Option<&'a str>,
    tasks: Vec<TaskReport<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transitions: Option<Vec<String>>,
}

fn state_label(nts: &Nts, st: StateId) -> String {
    match (nts.basic_nts.get(st.unit), nts.state(st)) {
        (Some(bn), Some(s)) => format!("{}/{}", bn.name, s.name),
        _ => st.to_string(),
    }
}

fn task_report<'a>(nts: &Nts, id: TaskId, task: &'a Task) -> TaskReport<'a> {
    let labels = |states: &[StateId]| -> Vec<String> {
        states.iter().map(|&st| state_label(nts, st)).collect()
    };
    TaskReport {
        id,
        name: &task.name,
        number: task.number,
        states: labels(&task.states),
        initial_states: labels(&task.initial_states),
        final_states: labels(&task.final_states),
        direct: &task.direct_global,
        transitive: &task.transitive_global,
    }
}

fn cmd_tasks(args: &AnalysisArgs, transitions: bool) -> CliResult<()> {
    let nts = load(&args.file)?;
    let tasks = run_tasks(&nts, args)?;
    let transition_text = transitions.then(|| format_transition_info(&tasks, &nts));

    if args.json {
        let report = TasksReport {
            main_task: tasks.main().map(|t| t.name.as_str()),
            tasks: tasks
                .iter()
                .map(|(id, task)| task_report(&nts, id, task))
                .collect(),
            transitions: transition_text
                .as_ref()
                .map(|text| text.lines().map(str::to_string).collect()),
        };
        println!("{}", to_json(&report)?);
        return Ok(());
    }

    for (id, task) in tasks.iter() {
        let main_mark = if Some(id) == tasks.main_task {
            " (main)"
        } else {
            ""
        };
        println!("task {} {}{}", id, task.name, main_mark);
        println!("  states: {}", task.states.len());
        if args.verbose {
            for &st in &task.states {
                println!("    {}", state_label(&nts, st));
            }
        }
        let entry: Vec<String> = task
            .initial_states
            .iter()
            .map(|&st| state_label(&nts, st))
            .collect();
        println!("  initial: {}", entry.join(", "));
        println!("  direct:     {}", task.direct_global.display(&nts));
        println!("  transitive: {}", task.transitive_global.display(&nts));
    }

    if let Some(text) = transition_text {
        println!();
        println!("transitions:");
        for line in text.lines() {
            println!("  {}", line);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct VariableReport<'a> {
    var: &'a str,
    read_by: Vec<&'a str>,
    written_by: Vec<&'a str>,
}

#[derive(Serialize)]
struct ConflictsReport<'a> {
    profile: &'a TasksProfile,
    variables: Vec<VariableReport<'a>>,
}

fn print_matrix(title: &str, names: &[String], matrix: &[Vec<bool>]) {
    println!("{}:", title);
    let width = names.iter().map(String::len).max().unwrap_or(0);
    for (name, row) in names.iter().zip(matrix) {
        let cells: String = row.iter().map(|&c| if c { 'x' } else { '.' }).collect();
        println!("  {:width$}  {}", name, cells, width = width);
    }
}

fn cmd_conflicts(args: &AnalysisArgs) -> CliResult<()> {
    let nts = load(&args.file)?;
    let tasks = run_tasks(&nts, args)?;
    let profile = analyze(&tasks, &nts);
    let index = tasks.global_variable_info(&nts);

    let names_of = |ids: &std::collections::BTreeSet<TaskId>| -> Vec<&str> {
        ids.iter().map(|&id| tasks.task(id).name.as_str()).collect()
    };
    let variables: Vec<VariableReport<'_>> = index
        .iter()
        .filter_map(|info| {
            let var = nts.global(info.var)?;
            Some(VariableReport {
                var: &var.name,
                read_by: names_of(&info.read_users),
                written_by: names_of(&info.write_users),
            })
        })
        .collect();

    if args.json {
        let report = ConflictsReport {
            profile: &profile,
            variables,
        };
        println!("{}", to_json(&report)?);
        return Ok(());
    }

    println!(
        "{} tasks, {} states ({} idle), {} transitions",
        profile.num_tasks, profile.num_states, profile.idle_states, profile.num_transitions
    );
    print_matrix("direct", &profile.task_names, &profile.direct_conflicts);
    print_matrix("transitive", &profile.task_names, &profile.transitive_conflicts);
    println!(
        "direct independence: {:.0}% of task pairs",
        profile.direct_independence_ratio * 100.0
    );

    println!();
    println!("globals:");
    for v in &variables {
        println!(
            "  {}: read by [{}], written by [{}]",
            v.var,
            v.read_by.join(", "),
            v.written_by.join(", ")
        );
    }

    if !profile.warnings.is_empty() {
        println!();
        println!("warnings:");
        for w in &profile.warnings {
            println!("  {}", w);
            println!("    hint: {}", w.fix_hint());
        }
    }
    for r in &profile.recommendations {
        println!();
        println!("recommendation: {}", r);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_offset() {
        let source = "{\n  \"name\": 1,\n}";
        assert_eq!(byte_offset(source, 1, 1), 0);
        assert_eq!(byte_offset(source, 2, 3), 4);
        assert_eq!(byte_offset(source, 9, 9), source.len());
    }

    #[test]
    fn test_cli_parses_analysis_flags() {
        let cli = Cli::try_parse_from([
            "ntspor",
            "tasks",
            "sys.json",
            "--main",
            "entry",
            "--separator",
            "#",
            "--transitions",
        ])
        .unwrap();
        match cli.command {
            Commands::Tasks { args, transitions } => {
                assert!(transitions);
                let config = args.config();
                assert_eq!(config.main_nts, "entry");
                assert_eq!(config.separator, '#');
                assert_eq!(config.origin_annotation, "origin");
            }
            _ => panic!("expected tasks subcommand"),
        }
    }

    #[test]
    fn test_json_error_points_into_source() {
        let source = Arc::new("{\n  \"name\": }".to_string());
        let err = Nts::from_json(&source).unwrap_err();
        match CliError::from_nts_error(err, source.clone(), "bad.json") {
            CliError::ParseError { span, .. } => assert!(span.offset() <= source.len()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
