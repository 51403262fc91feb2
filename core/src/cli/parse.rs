use std::str::FromStr;

use crate::command::Command;


/// Parse CLI arguments into a typed Command.
///
/// Arguments are expected WITHOUT the program name (`["job", "list"]`, not
/// `["jobrig", "job", "list"]`). Commands that take a free-form shell
/// command accept their flags first; every word after the first non-flag
/// word (or after `--`) belongs to the shell command.
pub fn parse_args(args: &[&str]) -> Result<Command, String> {
    if args.is_empty() {
        return Err("No command specified. Run 'jobrig help' for usage.".into());
    }

    match args[0] {
        "job" => parse_job(args),
        "queue" => parse_queue(args),
        "template" => parse_template(args),
        "gpu" => no_args(&args[1..], "gpu").map(|_| Command::Gpu),
        "dash" => no_args(&args[1..], "dash").map(|_| Command::Dash),
        "help" | "--help" | "-h" => Ok(Command::Help {
            topic: if args.len() > 1 { Some(args[1..].join(" ")) } else { None },
        }),
        _ => Err(format!("Unknown command: '{}'", args[0])),
    }
}


// ---------------------------------------------------------------------------
// job
// ---------------------------------------------------------------------------

/// `jobrig job <subcommand> ...`
fn parse_job(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err(
            "Usage: jobrig job <start|list|log|kill|retry|clean|watch|compare|stats>".into(),
        );
    }
    let rest = &args[2..];
    match args[1] {
        "start" => parse_job_start(rest),
        "list" => {
            let f = flags_only(rest, &["--container", "--limit"], "job list")?;
            Ok(Command::JobList {
                container: f.get("--container"),
                limit: f.num("--limit")?,
            })
        }
        "log" => {
            let (id, f) = one_positional(
                rest,
                &["--container", "--lines"],
                "Usage: jobrig job log <id> [--lines <n>] [--container <c>]",
            )?;
            Ok(Command::JobLog {
                id,
                container: f.get("--container"),
                lines: f.num("--lines")?,
            })
        }
        "kill" => {
            let (id, f) = one_positional(rest, &["--container"], "Usage: jobrig job kill <id>")?;
            Ok(Command::JobKill { id, container: f.get("--container") })
        }
        "retry" => {
            let (id, f) = one_positional(rest, &["--container"], "Usage: jobrig job retry <id>")?;
            Ok(Command::JobRetry { id, container: f.get("--container") })
        }
        "watch" => {
            let (id, f) = one_positional(rest, &["--container"], "Usage: jobrig job watch <id>")?;
            Ok(Command::JobWatch { id, container: f.get("--container") })
        }
        "clean" => {
            let f = flags_only(rest, &["--hours", "--keep", "--container"], "job clean")?;
            Ok(Command::JobClean {
                hours: f.num("--hours")?,
                keep: f.num("--keep")?,
                container: f.get("--container"),
            })
        }
        "compare" => {
            let (words, f) = split_flags(rest, &["--container"], "job compare")?;
            if words.len() != 2 {
                return Err("Usage: jobrig job compare <id1> <id2> [--container <c>]".into());
            }
            Ok(Command::JobCompare {
                a: words[0].clone(),
                b: words[1].clone(),
                container: f.get("--container"),
            })
        }
        "stats" => {
            let f = flags_only(rest, &["--count", "--container"], "job stats")?;
            Ok(Command::JobStats {
                container: f.get("--container"),
                count: f.num("--count")?,
            })
        }
        _ => Err(format!("Unknown job subcommand: '{}'", args[1])),
    }
}

/// `jobrig job start [--name n] [--container c] [--workdir w] <command...>`
fn parse_job_start(rest: &[&str]) -> Result<Command, String> {
    let (f, words) = leading_flags(rest, &["--name", "--container", "--workdir"], "job start")?;
    if words.is_empty() {
        return Err(
            "Usage: jobrig job start [--name <n>] [--container <c>] [--workdir <w>] <command...>"
                .into(),
        );
    }
    Ok(Command::JobStart {
        cmd: words.join(" "),
        name: f.get("--name"),
        container: f.get("--container"),
        workdir: f.get("--workdir"),
    })
}


// ---------------------------------------------------------------------------
// queue
// ---------------------------------------------------------------------------

/// `jobrig queue <add|list|clear|start> ...`
fn parse_queue(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: jobrig queue <add|list|clear|start>".into());
    }
    let rest = &args[2..];
    match args[1] {
        "add" => {
            let (f, words) = leading_flags(
                rest,
                &["--template", "--workdir", "--container"],
                "queue add",
            )?;
            let template = f.get("--template");
            let usage = "Usage: jobrig queue add [--workdir <w>] [--container <c>] (<command...> | --template <name>)";
            match (template.is_some(), words.is_empty()) {
                (true, false) | (false, true) => Err(usage.into()),
                _ => Ok(Command::QueueAdd {
                    cmd: if words.is_empty() { None } else { Some(words.join(" ")) },
                    template,
                    workdir: f.get("--workdir"),
                    container: f.get("--container"),
                }),
            }
        }
        "list" => {
            let f = flags_only(rest, &["--container"], "queue list")?;
            Ok(Command::QueueList { container: f.get("--container") })
        }
        "clear" => {
            let f = flags_only(rest, &["--container"], "queue clear")?;
            Ok(Command::QueueClear { container: f.get("--container") })
        }
        "start" => {
            let f = flags_only(rest, &["--container"], "queue start")?;
            Ok(Command::QueueStart { container: f.get("--container") })
        }
        _ => Err(format!("Unknown queue subcommand: '{}'", args[1])),
    }
}


// ---------------------------------------------------------------------------
// template
// ---------------------------------------------------------------------------

/// `jobrig template <save|list|delete|run> ...`
fn parse_template(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: jobrig template <save|list|delete|run>".into());
    }
    let rest = &args[2..];
    match args[1] {
        "save" => {
            let usage = "Usage: jobrig template save [--description <d>] [--project <p>] <name> <command...>";
            let (f, words) = leading_flags(rest, &["--description", "--project"], "template save")?;
            if words.len() < 2 {
                return Err(usage.into());
            }
            Ok(Command::TemplateSave {
                name: words[0].to_string(),
                cmd: words[1..].join(" "),
                description: f.get("--description"),
                project: f.get("--project"),
            })
        }
        "list" => no_args(rest, "template list").map(|_| Command::TemplateList),
        "delete" => {
            let (name, _) = one_positional(rest, &[], "Usage: jobrig template delete <name>")?;
            Ok(Command::TemplateDelete { name })
        }
        "run" => {
            let (name, f) = one_positional(
                rest,
                &["--container", "--workdir"],
                "Usage: jobrig template run <name> [--container <c>] [--workdir <w>]",
            )?;
            Ok(Command::TemplateRun {
                name,
                container: f.get("--container"),
                workdir: f.get("--workdir"),
            })
        }
        _ => Err(format!("Unknown template subcommand: '{}'", args[1])),
    }
}


// ---------------------------------------------------------------------------
// Flag helpers
// ---------------------------------------------------------------------------

/// Flag values collected from one argument list.
#[derive(Debug, Default)]
struct Flags {
    values: Vec<(String, String)>,
}

impl Flags {
    fn get(&self, flag: &str) -> Option<String> {
        self.values
            .iter()
            .rev()
            .find(|(f, _)| f == flag)
            .map(|(_, v)| v.clone())
    }

    fn num<T: FromStr>(&self, flag: &str) -> Result<Option<T>, String> {
        match self.get(flag) {
            None => Ok(None),
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| format!("{} expects a number, got '{}'", flag, v)),
        }
    }
}

/// Take the value following the flag at `index - 1`.
fn take_arg(args: &[&str], index: usize, flag: &str) -> Result<String, String> {
    if index >= args.len() {
        return Err(format!("{} requires a value", flag));
    }
    Ok(args[index].into())
}

/// Flags up to the first non-flag word (or `--`); the rest verbatim.
fn leading_flags<'a>(
    args: &'a [&'a str],
    allowed: &[&str],
    context: &str,
) -> Result<(Flags, &'a [&'a str]), String> {
    let mut flags = Flags::default();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i];
        if arg == "--" {
            return Ok((flags, &args[i + 1..]));
        }
        if !arg.starts_with("--") {
            break;
        }
        if !allowed.contains(&arg) {
            return Err(format!("Unknown flag for {}: '{}'", context, arg));
        }
        i += 1;
        flags.values.push((arg.to_string(), take_arg(args, i, arg)?));
        i += 1;
    }
    Ok((flags, &args[i..]))
}

/// Flags anywhere; non-flag words are collected in order.
fn split_flags(args: &[&str], allowed: &[&str], context: &str) -> Result<(Vec<String>, Flags), String> {
    let mut flags = Flags::default();
    let mut words = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i];
        if arg.starts_with("--") {
            if !allowed.contains(&arg) {
                return Err(format!("Unknown flag for {}: '{}'", context, arg));
            }
            i += 1;
            flags.values.push((arg.to_string(), take_arg(args, i, arg)?));
        } else {
            words.push(arg.to_string());
        }
        i += 1;
    }
    Ok((words, flags))
}

fn flags_only(args: &[&str], allowed: &[&str], context: &str) -> Result<Flags, String> {
    let (words, flags) = split_flags(args, allowed, context)?;
    match words.first() {
        Some(w) => Err(format!("Unexpected argument for {}: '{}'", context, w)),
        None => Ok(flags),
    }
}

fn one_positional(args: &[&str], allowed: &[&str], usage: &str) -> Result<(String, Flags), String> {
    let context = usage
        .trim_start_matches("Usage: jobrig ")
        .split(" <")
        .next()
        .unwrap_or(usage);
    let (words, flags) = split_flags(args, allowed, context)?;
    if words.len() != 1 {
        return Err(usage.into());
    }
    Ok((words[0].clone(), flags))
}

fn no_args(args: &[&str], context: &str) -> Result<(), String> {
    match args.first() {
        Some(a) => Err(format!("Unexpected argument for {}: '{}'", context, a)),
        None => Ok(()),
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
