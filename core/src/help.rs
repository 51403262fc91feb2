//! Help system: usage text for every jobrig command.
//!
//! Three levels of detail:
//!
//! 1. **Overview** (`jobrig help`): every command with a one-line summary
//! 2. **Group help** (`jobrig help queue`): the commands of one group
//! 3. **Command help** (`jobrig help job.watch`): detailed usage for one command


/// Help text for `topic`; `None` is the overview.
pub fn help_text(topic: Option<&str>) -> String {
    match topic {
        None => overview(),
        Some(t) => {
            let t = t.trim().replace(' ', ".");
            if let Some(text) = command_help(&t) {
                return text.into();
            }
            if let Some(text) = group_help(&t) {
                return text.into();
            }
            format!("Unknown help topic: '{}'. Run 'jobrig help' for a list of commands.", t)
        }
    }
}


fn overview() -> String {
    "\
jobrig — run and track GPU jobs on a remote host

Usage: jobrig <command> [args...]

Job commands:
  job start [flags] <command...>   Start a detached job
  job list [--limit <n>]           List recent jobs (refreshes the job cache)
  job log <id> [--lines <n>]       Show a job's log with detected issues
  job kill <id>                    Terminate a job
  job retry <id>                   Start a job's command again
  job clean [--hours h] [--keep k] Delete artifacts of old jobs
  job watch <id>                   Show output since the last watch
  job compare <id1> <id2>          Compare metrics of two jobs
  job stats [--count <n>]          Success rate, runtimes and headline metric

Queue commands:
  queue add <command...>           Append a command to the queue
  queue add --template <name>      Append a template's command
  queue list                       Show the running entry and pending ones
  queue clear                      Drop pending entries
  queue start                      Launch the queue processor

Template commands:
  template save <name> <command...>  Save a named command
  template list                      List templates
  template delete <name>             Delete a template
  template run <name>                Start a job from a template

Other:
  gpu                              One-line GPU snapshot
  dash                             Terminal dashboard over the job cache
  help [topic]                     This message, or help on a topic

Every job and queue command accepts --container <name>.
Run 'jobrig help <group>' or 'jobrig help <group>.<command>' for details."
        .into()
}


fn group_help(group: &str) -> Option<&'static str> {
    let text = match group {
        "job" => "\
Job commands — ad-hoc jobs on the compute host

  job start [--name <n>] [--container <c>] [--workdir <w>] <command...>
  job list [--limit <n>] [--container <c>]
  job log <id> [--lines <n>] [--container <c>]
  job kill <id> [--container <c>]
  job retry <id> [--container <c>]
  job clean [--hours <h>] [--keep <k>] [--container <c>]
  job watch <id> [--container <c>]
  job compare <id1> <id2> [--container <c>]
  job stats [--count <n>] [--container <c>]",

        "queue" => "\
Queue commands — run commands one after another

  queue add [--workdir <w>] [--container <c>] <command...>
  queue add [--workdir <w>] [--container <c>] --template <name>
  queue list [--container <c>]
  queue clear [--container <c>]
  queue start [--container <c>]

Queued commands become ordinary jobs, visible in 'job list'.",

        "template" => "\
Template commands — named command presets stored locally

  template save [--description <d>] [--project <p>] <name> <command...>
  template list
  template delete <name>
  template run <name> [--container <c>] [--workdir <w>]",

        _ => return None,
    };
    Some(text)
}


fn command_help(command: &str) -> Option<&'static str> {
    let text = match command {
        "job.start" => "\
jobrig job start — start a detached job

Usage: jobrig job start [--name <n>] [--container <c>] [--workdir <w>] <command...>

Flags must come before the command; use '--' if the command itself starts
with '--'. Output is unbuffered and combined into the job log. GPU load and
already-running jobs produce warnings but never block the start.

Examples:
  jobrig job start python train.py --epochs 10
  jobrig job start --name baseline --workdir /workspace/exp python a.py",

        "job.log" => "\
jobrig job log — show a job's log

Usage: jobrig job log <id> [--lines <n>] [--container <c>]

Shows the last <n> lines (default 50, 0 for the whole log) with detected
issues on top. Finished jobs also get extracted metrics.",

        "job.kill" => "\
jobrig job kill — terminate a job

Usage: jobrig job kill <id> [--container <c>]

Sends SIGTERM to the job's children and to the job shell, then marks the
job killed. The signal is not verified.",

        "job.clean" => "\
jobrig job clean — delete artifacts of old jobs

Usage: jobrig job clean [--hours <h>] [--keep <k>] [--container <c>]

Removes jobs started more than <h> hours ago (default 24), always keeping
the newest <k> (default 5). Deletion cannot be undone.",

        "job.watch" => "\
jobrig job watch — incremental log view

Usage: jobrig job watch <id> [--container <c>]

The first watch shows the last 20 lines; later watches show only output
written since the previous watch. Running jobs include a GPU snapshot,
finished jobs their metrics.",

        "job.compare" => "\
jobrig job compare — compare metrics of two jobs

Usage: jobrig job compare <id1> <id2> [--container <c>]

Extracts metrics from the last 100 lines of each log and shows a table
of values and changes. The headline metric gets a one-line verdict.",

        "job.stats" => "\
jobrig job stats — aggregate over recent jobs

Usage: jobrig job stats [--count <n>] [--container <c>]

Success rate, runtime distribution and the headline metric's
distribution over the <n> most recent jobs (default 20).",

        "queue.start" => "\
jobrig queue start — launch the queue processor

Usage: jobrig queue start [--container <c>]

Does nothing if a processor is already running. The processor runs each
queued command to completion before starting the next and exits when the
queue is empty.",

        "dash" => "\
jobrig dash — terminal dashboard

Usage: jobrig dash

Renders the local job cache (refreshed by 'job list', 'job start' and
'job kill') once per second. No remote connection is made.
Press q, Esc or Ctrl-C to quit.",

        "help" => "\
jobrig help — show help information

Usage: jobrig help [topic]

  jobrig help              # overview
  jobrig help queue        # all queue commands
  jobrig help job.watch    # detailed help for one command",

        _ => return None,
    };
    Some(text)
}
