//! Generated remote shell scripts.
//!
//! These scripts are the only writers of the sidecar artifacts; the engine
//! reads them back through the batched queries below. Record formats are
//! pipe-delimited, one job per line, and `-` marks an absent field.

use crate::jobs::artifacts::{Artifact, JobPaths};
use crate::rig::remote::sh_quote;


/// Substrings that mark a failed job's log as "errors detected" in list
/// output. A cheap remote pre-filter, independent of the local scanner.
pub const REMOTE_ERROR_GREP: &str = "Traceback|Error|OOM|Killed|CUDA";

/// Max command bytes carried in list records.
pub const LIST_COMMAND_BYTES: usize = 60;

/// Exit status of the probe script when the log artifact is missing.
pub const PROBE_MISSING: i32 = 3;


/// The detached runner for one ad-hoc job.
///
/// Records command, `running`, start time and its own pid, runs the command
/// unbuffered with combined output into the log, then records exit code, end
/// time and `completed`. Failure is never written to the status artifact;
/// readers infer it from the exit code.
pub fn runner_script(paths: &JobPaths, id: &str, command: &str, workdir: &str) -> String {
    let quoted = sh_quote(command);
    format!(
        "mkdir -p {dir} && \
         printf '%s\\n' {cmd} > {cmd_file} && \
         echo running > {status} && \
         date +%s > {start} && \
         echo $$ > {pid} && \
         (cd {workdir} && PYTHONUNBUFFERED=1 bash -c {cmd}) > {log} 2>&1; \
         echo $? > {exit}; \
         date +%s > {end}; \
         echo completed > {status}",
        dir = paths.dir(),
        cmd = quoted,
        cmd_file = paths.artifact(id, Artifact::Command),
        status = paths.artifact(id, Artifact::Status),
        start = paths.artifact(id, Artifact::Start),
        pid = paths.artifact(id, Artifact::Pid),
        workdir = sh_quote(workdir),
        log = paths.artifact(id, Artifact::Log),
        exit = paths.artifact(id, Artifact::Exit),
        end = paths.artifact(id, Artifact::End),
    )
}


/// Batched list query over the `limit` most recently modified jobs.
///
/// Record: `id|exit|status|cmd|start|end|duration|now|has_err|alive`.
/// Duration is computed remotely (end-start, else now-start, else 0) so the
/// local clock never enters it. `alive` is checked only for jobs without an
/// exit code that recorded a pid.
pub fn list_query(paths: &JobPaths, limit: usize) -> String {
    format!(
        r#"J={dir}
now=$(date +%s)
for f in $(ls -t {glob} 2>/dev/null | head -n {limit}); do
  job=$(basename "$f" .status)
  exit_code=$(cat "$J/$job.exit" 2>/dev/null || echo -)
  [ -z "$exit_code" ] && exit_code=-
  status=$(cat "$J/$job.status" 2>/dev/null || echo unknown)
  cmd=$(head -c {cmd_bytes} "$J/$job.cmd" 2>/dev/null | tr '|\n' '  ')
  start=$(cat "$J/$job.start" 2>/dev/null || echo 0)
  end=$(cat "$J/$job.end" 2>/dev/null || echo 0)
  if [ "$start" != 0 ] && [ "$end" != 0 ]; then
    duration=$((end - start))
  elif [ "$start" != 0 ]; then
    duration=$((now - start))
  else
    duration=0
  fi
  has_err=-
  if [ "$exit_code" != - ] && [ "$exit_code" != 0 ] && grep -qE '{grep}' "$J/$job.log" 2>/dev/null; then
    has_err=1
  fi
  alive=-
  if [ "$exit_code" = - ] && [ -f "$J/$job.pid" ]; then
    if kill -0 "$(cat "$J/$job.pid")" 2>/dev/null; then alive=1; else alive=0; fi
  fi
  echo "$job|$exit_code|$status|$cmd|$start|$end|$duration|$now|$has_err|$alive"
done"#,
        dir = paths.dir(),
        glob = paths.status_glob(),
        limit = limit,
        cmd_bytes = LIST_COMMAND_BYTES,
        grep = REMOTE_ERROR_GREP,
    )
}


/// Batched stats query. Record: `id|exit|start|end|metric_match`.
///
/// The metric is a best-effort grep of `<name>: <number>` in the last 200
/// log lines; the last occurrence wins.
pub fn stats_query(paths: &JobPaths, limit: usize, metric_name: &str) -> String {
    format!(
        r#"J={dir}
for f in $(ls -t {glob} 2>/dev/null | head -n {limit}); do
  job=$(basename "$f" .status)
  exit_code=$(cat "$J/$job.exit" 2>/dev/null || echo -)
  start=$(cat "$J/$job.start" 2>/dev/null || echo -)
  end=$(cat "$J/$job.end" 2>/dev/null || echo -)
  metric=$(tail -n 200 "$J/$job.log" 2>/dev/null | grep -oE {pattern} | tail -n 1)
  [ -z "$metric" ] && metric=-
  echo "$job|$exit_code|$start|$end|$metric"
done"#,
        dir = paths.dir(),
        glob = paths.status_glob(),
        limit = limit,
        pattern = sh_quote(&format!("{}: *[0-9][0-9.,]*", ere_escape(metric_name))),
    )
}


/// Probe one job: `size|exit|start|end|now|status`, or exit
/// `PROBE_MISSING` when the log artifact does not exist.
pub fn probe_script(paths: &JobPaths, id: &str) -> String {
    format!(
        r#"test -f {log} || exit {missing}
size=$(stat -c%s {log} 2>/dev/null || echo 0)
exit_code=$(cat {exit} 2>/dev/null || echo -)
[ -z "$exit_code" ] && exit_code=-
start=$(cat {start} 2>/dev/null || echo 0)
end=$(cat {end} 2>/dev/null || echo 0)
status=$(cat {status} 2>/dev/null || echo unknown)
echo "$size|$exit_code|$start|$end|$(date +%s)|$status""#,
        log = paths.artifact(id, Artifact::Log),
        missing = PROBE_MISSING,
        exit = paths.artifact(id, Artifact::Exit),
        start = paths.artifact(id, Artifact::Start),
        end = paths.artifact(id, Artifact::End),
        status = paths.artifact(id, Artifact::Status),
    )
}


/// Last `lines` lines of a job's log; `0` means the whole log.
pub fn tail_script(paths: &JobPaths, id: &str, lines: usize) -> String {
    let log = paths.artifact(id, Artifact::Log);
    if lines == 0 {
        format!("cat {}", log)
    } else {
        format!("tail -n {} {}", lines, log)
    }
}


/// Exactly the byte range `[from, from + len)` of a job's log.
pub fn byte_range_script(paths: &JobPaths, id: &str, from: u64, len: u64) -> String {
    format!(
        "tail -c +{} {} | head -c {}",
        from + 1,
        paths.artifact(id, Artifact::Log),
        len
    )
}


/// Mark a job `killed`, then terminate its children and the job shell
/// itself. The mark comes first so a queue processor waking from `wait`
/// already sees it. Exit status is that of the final `kill`.
pub fn kill_script(paths: &JobPaths, id: &str, pid: u32) -> String {
    format!(
        "echo killed > {status}; pkill -TERM -P {pid} 2>/dev/null; kill -TERM {pid} 2>/dev/null",
        status = paths.artifact(id, Artifact::Status),
        pid = pid
    )
}


/// Most `_<n>` suffixes tried before reservation gives up.
pub const RESERVE_ATTEMPTS: u32 = 1000;

/// Atomically claim `base` (or the first free `base_<n>`) by creating its
/// status artifact with noclobber, and echo the claimed id.
pub fn reserve_id_script(paths: &JobPaths, base: &str) -> String {
    format!(
        r#"J={dir}
mkdir -p "$J" || exit 1
id={base}
n=0
until (set -C; : > "$J/$id.status") 2>/dev/null; do
  n=$((n + 1))
  [ "$n" -gt {attempts} ] && exit 1
  id="{base}_$n"
done
echo "$id""#,
        dir = paths.dir(),
        base = base,
        attempts = RESERVE_ATTEMPTS,
    )
}


/// Count of status artifacts currently saying `running`.
pub fn running_count_script(paths: &JobPaths) -> String {
    format!("grep -l '^running' {} 2>/dev/null | wc -l", paths.status_glob())
}


/// The detached queue processor.
///
/// Drains the queue file one entry at a time: publishes the entry as
/// current, runs it as a job with the shared artifact convention and waits
/// for it before removing the consumed line. A job whose status was set to
/// `killed` while it ran gets no exit artifact. Clears the marker when the
/// queue is empty or gone.
pub fn queue_processor_script(paths: &JobPaths) -> String {
    format!(
        r#"#!/bin/bash
J={dir}
Q={queue}
CUR={current}
while [ -s "$Q" ]; do
  entry=$(head -n 1 "$Q")
  if [ -n "$entry" ]; then
    workdir=${{entry%%|*}}
    cmd=${{entry#*|}}
    printf '%s\n' "$cmd" > "$CUR"
    base="job_$(date +%s)"
    job_id=$base
    n=0
    while [ -e "$J/$job_id.status" ]; do
      n=$((n + 1))
      job_id="${{base}}_$n"
    done
    printf '%s\n' "$cmd" > "$J/$job_id.cmd"
    echo running > "$J/$job_id.status"
    date +%s > "$J/$job_id.start"
    ( cd "$workdir" && PYTHONUNBUFFERED=1 bash -c "$cmd" ) > "$J/$job_id.log" 2>&1 &
    child=$!
    echo "$child" > "$J/$job_id.pid"
    wait "$child"
    code=$?
    if [ "$(cat "$J/$job_id.status" 2>/dev/null)" != killed ]; then
      echo "$code" > "$J/$job_id.exit"
      date +%s > "$J/$job_id.end"
      echo completed > "$J/$job_id.status"
    else
      date +%s > "$J/$job_id.end"
    fi
  fi
  sed -i '1d' "$Q"
done
rm -f "$CUR"
"#,
        dir = paths.dir(),
        queue = paths.queue_file(),
        current = paths.queue_current(),
    )
}


/// Escape POSIX ERE metacharacters.
fn ere_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runner::{Executor, ShellRunner};

    fn paths() -> JobPaths {
        JobPaths::new("/workspace/.jobs")
    }

    #[test]
    fn runner_records_every_artifact() {
        let s = runner_script(&paths(), "job_1", "python a.py", "/workspace");
        for ext in ["cmd", "status", "start", "pid", "log", "exit", "end"] {
            assert!(s.contains(&format!("/workspace/.jobs/job_1.{}", ext)), "missing .{}", ext);
        }
        assert!(s.contains("PYTHONUNBUFFERED=1"));
        assert!(s.contains("echo $$ >"));
        assert!(s.trim_end().ends_with("echo completed > /workspace/.jobs/job_1.status"));
        assert!(!s.contains("failed"));
    }

    #[test]
    fn runner_quotes_command() {
        let s = runner_script(&paths(), "job_1", "echo 'x'", "/w");
        assert!(s.contains(r#"'echo '\''x'\'''"#));
    }

    #[test]
    fn list_query_embeds_limit_and_fields() {
        let q = list_query(&paths(), 7);
        assert!(q.contains("head -n 7"));
        assert!(q.contains("ls -t /workspace/.jobs/*.status"));
        assert!(q.contains(r#"echo "$job|$exit_code|$status|$cmd|$start|$end|$duration|$now|$has_err|$alive""#));
    }

    #[test]
    fn stats_query_escapes_metric_name() {
        let q = stats_query(&paths(), 20, "Loss (val)");
        assert!(q.contains(r"Loss \(val\): *[0-9][0-9.,]*"));
        assert!(q.contains("head -n 20"));
    }

    #[test]
    fn byte_range_is_one_based_tail() {
        assert_eq!(
            byte_range_script(&paths(), "job_1", 100, 50),
            "tail -c +101 /workspace/.jobs/job_1.log | head -c 50"
        );
    }

    #[test]
    fn tail_zero_is_full_log() {
        assert_eq!(tail_script(&paths(), "job_1", 0), "cat /workspace/.jobs/job_1.log");
        assert_eq!(tail_script(&paths(), "job_1", 50), "tail -n 50 /workspace/.jobs/job_1.log");
    }

    #[test]
    fn kill_marks_before_signalling() {
        assert_eq!(
            kill_script(&paths(), "job_1", 4242),
            "echo killed > /workspace/.jobs/job_1.status; \
             pkill -TERM -P 4242 2>/dev/null; kill -TERM 4242 2>/dev/null"
        );
    }

    #[test]
    fn reservation_suffixes_taken_ids() {
        let dir = tempfile::tempdir().unwrap();
        let p = JobPaths::new(dir.path().join("jobs").to_str().unwrap());
        let reserve = || ShellRunner.execute(&reserve_id_script(&p, "job_1700000000"));

        let first = reserve();
        assert!(first.success(), "{}", first.output);
        assert_eq!(first.trimmed(), "job_1700000000");
        assert_eq!(reserve().trimmed(), "job_1700000000_1");

        // A queue job that took _2 in the meantime is skipped too.
        std::fs::write(p.artifact("job_1700000000_2", Artifact::Status), "running\n").unwrap();
        assert_eq!(reserve().trimmed(), "job_1700000000_3");
        assert!(std::path::Path::new(&p.artifact("job_1700000000_3", Artifact::Status)).exists());
    }

    fn wait_for(what: &str, mut ready: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while !ready() {
            assert!(std::time::Instant::now() < deadline, "timed out waiting for {}", what);
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
    }

    #[test]
    fn killed_queue_job_keeps_killed_status() {
        let dir = tempfile::tempdir().unwrap();
        let p = JobPaths::new(dir.path().to_str().unwrap());
        std::fs::write(
            p.queue_file(),
            format!("{}|sleep 30\n", dir.path().display()),
        )
        .unwrap();
        std::fs::write(p.queue_processor(), queue_processor_script(&p)).unwrap();
        let mut processor = std::process::Command::new("bash")
            .arg(p.queue_processor())
            .spawn()
            .unwrap();

        let pid_file = || {
            std::fs::read_dir(dir.path())
                .unwrap()
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .find(|path| path.extension().map(|x| x == "pid").unwrap_or(false))
        };
        wait_for("pid artifact", || {
            pid_file()
                .and_then(|f| std::fs::read_to_string(f).ok())
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false)
        });
        let pid_path = pid_file().unwrap();
        let id = pid_path.file_stem().unwrap().to_str().unwrap().to_string();
        let pid: u32 = std::fs::read_to_string(&pid_path).unwrap().trim().parse().unwrap();

        ShellRunner.execute(&kill_script(&p, &id, pid));
        let status = processor.wait().unwrap();
        assert!(status.success());

        let read = |a: Artifact| std::fs::read_to_string(p.artifact(&id, a)).ok();
        assert_eq!(read(Artifact::Exit), None);
        assert_eq!(read(Artifact::Status).as_deref(), Some("killed\n"));
        assert!(read(Artifact::End).is_some());
        assert!(!std::path::Path::new(&p.queue_current()).exists());
    }

    #[test]
    fn queue_processor_pops_after_job() {
        let s = queue_processor_script(&paths());
        let wait = s.find("wait \"$child\"").unwrap();
        let pop = s.find("sed -i '1d' \"$Q\"").unwrap();
        assert!(wait < pop);
        assert!(s.contains("Q=/workspace/.jobs/queue.txt"));
        assert!(s.trim_end().ends_with("rm -f \"$CUR\""));
    }

    #[test]
    fn byte_range_extracts_exact_slice() {
        let dir = tempfile::tempdir().unwrap();
        let p = JobPaths::new(dir.path().to_str().unwrap());
        std::fs::write(p.artifact("job_1", Artifact::Log), "0123456789").unwrap();
        let out = ShellRunner.execute(&byte_range_script(&p, "job_1", 3, 4));
        assert_eq!(out.output, "3456");
    }

    #[test]
    fn list_query_runs_against_real_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let p = JobPaths::new(dir.path().to_str().unwrap());
        let w = |id: &str, a: Artifact, v: &str| std::fs::write(p.artifact(id, a), v).unwrap();
        w("job_100", Artifact::Status, "completed\n");
        w("job_100", Artifact::Exit, "1\n");
        w("job_100", Artifact::Command, "python a|b.py\n");
        w("job_100", Artifact::Start, "100\n");
        w("job_100", Artifact::End, "160\n");
        w("job_100", Artifact::Log, "Traceback (most recent call last)\n");
        let out = ShellRunner.execute(&list_query(&p, 5));
        assert!(out.success(), "{}", out.output);
        let fields: Vec<&str> = out.output.trim().split('|').collect();
        assert_eq!(fields.len(), 10);
        assert_eq!(fields[0], "job_100");
        assert_eq!(fields[1], "1");
        assert_eq!(fields[2], "completed");
        assert_eq!(fields[3].trim(), "python a b.py");
        assert_eq!(fields[6], "60");
        assert_eq!(fields[8], "1");
        assert_eq!(fields[9], "-");
    }

    #[test]
    fn probe_reports_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let p = JobPaths::new(dir.path().to_str().unwrap());
        let out = ShellRunner.execute(&probe_script(&p, "job_1"));
        assert_eq!(out.code, PROBE_MISSING);
    }
}
