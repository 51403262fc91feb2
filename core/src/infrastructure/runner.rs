//! Executor abstraction for running commands against the compute host.
//!
//! `Executor` is the request/response contract: run a command, get back the
//! merged output and the exit code. `Dispatcher` is the one-way capability
//! used for detached work; its result only says whether the launch itself
//! was accepted. `ShellRunner` runs locally through `sh -c`. `MockRunner` is
//! the test double that records calls and answers from rules or a queue.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{Command, Stdio};

use tracing::debug;

/// Merged output and exit status of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub output: String,
    pub code: i32,
}

impl ExecOutput {
    pub fn new(output: &str, code: i32) -> Self {
        ExecOutput { output: output.to_string(), code }
    }

    pub fn ok(output: &str) -> Self {
        Self::new(output, 0)
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Output with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.output.trim()
    }
}

/// Request/response execution of a command string.
///
/// Unreachable hosts and missing binaries are reported as a non-zero code
/// with a descriptive `output`, never as a panic.
pub trait Executor {
    fn execute(&self, command: &str) -> ExecOutput;
}

/// Fire-and-forget launch of a command that keeps running after return.
pub trait Dispatcher {
    fn dispatch(&self, command: &str) -> ExecOutput;
}

/// Both capabilities, as needed by the job manager.
pub trait Remote: Executor + Dispatcher {}

impl<T: Executor + Dispatcher + ?Sized> Remote for T {}

impl<T: Executor + ?Sized> Executor for Box<T> {
    fn execute(&self, command: &str) -> ExecOutput {
        (**self).execute(command)
    }
}

impl<T: Dispatcher + ?Sized> Dispatcher for Box<T> {
    fn dispatch(&self, command: &str) -> ExecOutput {
        (**self).dispatch(command)
    }
}

/// Run a program and merge stdout and stderr into one string.
///
/// Spawn failures surface as code -1.
pub fn run_program(program: &str, args: &[String]) -> ExecOutput {
    let result = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output();
    match result {
        Ok(output) => {
            let mut text = String::from_utf8_lossy(&output.stdout).to_string();
            let err = String::from_utf8_lossy(&output.stderr);
            if !err.is_empty() {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&err);
            }
            ExecOutput {
                output: text,
                code: output.status.code().unwrap_or(-1),
            }
        }
        Err(e) => ExecOutput {
            output: format!("Failed to execute {}: {}", program, e),
            code: -1,
        },
    }
}

/// Runner that executes on the local machine through `sh -c`.
pub struct ShellRunner;

impl Executor for ShellRunner {
    fn execute(&self, command: &str) -> ExecOutput {
        debug!(command, "sh -c");
        run_program("sh", &["-c".to_string(), command.to_string()])
    }
}

impl Dispatcher for ShellRunner {
    fn dispatch(&self, command: &str) -> ExecOutput {
        debug!(command, "sh -c (detached)");
        let detached = format!("nohup sh -c {} >/dev/null 2>&1 &", crate::rig::remote::sh_quote(command));
        run_program("sh", &["-c".to_string(), detached])
    }
}

/// Test-double runner.
///
/// Each executed command is answered by the first rule whose pattern is a
/// substring of the command, else by the next queued response, else by an
/// empty success. Dispatched commands are recorded separately and answered
/// by `dispatch_result`.
pub struct MockRunner {
    rules: RefCell<Vec<(String, ExecOutput)>>,
    responses: RefCell<VecDeque<ExecOutput>>,
    commands: RefCell<Vec<String>>,
    dispatched: RefCell<Vec<String>>,
    dispatch_result: RefCell<ExecOutput>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner {
            rules: RefCell::new(Vec::new()),
            responses: RefCell::new(VecDeque::new()),
            commands: RefCell::new(Vec::new()),
            dispatched: RefCell::new(Vec::new()),
            dispatch_result: RefCell::new(ExecOutput::ok("")),
        }
    }

    pub fn with_responses(responses: Vec<ExecOutput>) -> Self {
        let mock = Self::new();
        mock.responses.borrow_mut().extend(responses);
        mock
    }

    /// Answer every command containing `pattern` with `output`/`code`.
    /// Earlier rules take precedence.
    pub fn on(self, pattern: &str, output: &str, code: i32) -> Self {
        self.rules
            .borrow_mut()
            .push((pattern.to_string(), ExecOutput::new(output, code)));
        self
    }

    /// Replace the answer of an existing rule, or add it.
    pub fn set(&self, pattern: &str, output: &str, code: i32) {
        let mut rules = self.rules.borrow_mut();
        match rules.iter_mut().find(|(p, _)| p == pattern) {
            Some((_, out)) => *out = ExecOutput::new(output, code),
            None => rules.push((pattern.to_string(), ExecOutput::new(output, code))),
        }
    }

    pub fn fail_dispatch(&self, output: &str, code: i32) {
        *self.dispatch_result.borrow_mut() = ExecOutput::new(output, code);
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn dispatched_commands(&self) -> Vec<String> {
        self.dispatched.borrow().clone()
    }

    /// Commands (executed or dispatched) containing `needle`.
    pub fn commands_containing(&self, needle: &str) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .chain(self.dispatched.borrow().iter())
            .filter(|c| c.contains(needle))
            .cloned()
            .collect()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for MockRunner {
    fn execute(&self, command: &str) -> ExecOutput {
        self.commands.borrow_mut().push(command.to_string());
        if let Some((_, out)) = self
            .rules
            .borrow()
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
        {
            return out.clone();
        }
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| ExecOutput::ok(""))
    }
}

impl Dispatcher for MockRunner {
    fn dispatch(&self, command: &str) -> ExecOutput {
        self.dispatched.borrow_mut().push(command.to_string());
        self.dispatch_result.borrow().clone()
    }
}
