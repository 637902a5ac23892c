//! Runs embedded `PostgreSQL` lifecycle steps in a separate, unprivileged
//! process.
//!
//! `initdb` refuses to run as root, so the `PostgreSQL` integration tests
//! delegate cluster setup to this helper whenever the test runner is root.
//!
//! ```text
//! pg_worker <setup|start|stop> <config-path>
//! ```
//!
//! `config-path` names a JSON [`WorkerPayload`] holding the cluster settings
//! and the environment overrides to apply before the step runs.

#[cfg(unix)]
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use nix::unistd::{Uid, User, initgroups, setgid, setuid};
#[cfg(unix)]
use pg_embedded_setup_unpriv::ambient_dir_and_path;
#[cfg(unix)]
use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
#[cfg(unix)]
use postgresql_embedded::{PostgreSQL, Status};
#[cfg(unix)]
use std::env;
#[cfg(unix)]
use std::ffi::CString;
#[cfg(unix)]
use std::io::{self, Read};
#[cfg(unix)]
use std::process::{Command, ExitStatus};
#[cfg(unix)]
use thiserror::Error;
#[cfg(unix)]
use tokio::runtime::{Builder, Runtime};

#[cfg(unix)]
const REEXEC_MARKER: &str = "PG_WORKER_REEXEC";
#[cfg(unix)]
const TRUSTED_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";
#[cfg(unix)]
const UNPRIVILEGED_USER: &str = "nobody";

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of a lifecycle step.
#[cfg(unix)]
#[derive(Debug, Error)]
enum WorkerError {
    #[error("usage: pg_worker <setup|start|stop> <config-path>: {0}")]
    Usage(String),
    #[error("failed to read worker config: {0}")]
    ConfigRead(#[source] BoxError),
    #[error("failed to parse worker config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("invalid cluster settings: {0}")]
    Settings(String),
    #[error("failed to build the runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to drop privileges: {0}")]
    PrivilegeDrop(String),
    #[error("postgres {step} failed: {message}")]
    Postgres { step: &'static str, message: String },
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Setup,
    Start,
    Stop,
}

#[cfg(unix)]
impl Step {
    fn parse(arg: &str) -> Result<Self, WorkerError> {
        match arg {
            "setup" => Ok(Self::Setup),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(WorkerError::Usage(format!("unknown step '{other}'"))),
        }
    }
}

#[cfg(unix)]
fn main() -> Result<(), BoxError> {
    let args = collect_args()?;
    reexec_unprivileged_if_root(&args)?;
    let (step, config_path) = parse_args(&args)?;
    run_step(step, &config_path).map_err(Into::into)
}

#[cfg(unix)]
fn collect_args() -> Result<Vec<Utf8PathBuf>, WorkerError> {
    env::args_os()
        .map(|arg| {
            arg.into_string()
                .map(Utf8PathBuf::from)
                .map_err(|_| WorkerError::Usage(String::from("arguments must be UTF-8")))
        })
        .collect()
}

#[cfg(unix)]
fn parse_args(args: &[Utf8PathBuf]) -> Result<(Step, Utf8PathBuf), WorkerError> {
    match args {
        [_, step, config] => Ok((Step::parse(step.as_str())?, config.clone())),
        [_] | [_, _] => Err(WorkerError::Usage(String::from("missing argument"))),
        _ => Err(WorkerError::Usage(String::from("too many arguments"))),
    }
}

#[cfg(unix)]
fn run_step(step: Step, config_path: &Utf8Path) -> Result<(), WorkerError> {
    let payload = load_payload(config_path)?;
    drop_privileges_if_root(UNPRIVILEGED_USER)?;
    let settings = payload
        .settings
        .into_settings()
        .map_err(|err| WorkerError::Settings(err.to_string()))?;
    let runtime = build_runtime()?;
    apply_environment(&payload.environment);
    let mut postgres = PostgreSQL::new(settings);
    runtime.block_on(async {
        match step {
            Step::Setup => {
                postgres
                    .setup()
                    .await
                    .map_err(|err| postgres_failure("setup", &err))?;
                ensure_started(&mut postgres).await
            }
            Step::Start => {
                ensure_started(&mut postgres).await?;
                // Dropping the handle would stop the server this step started.
                let _running = std::mem::ManuallyDrop::new(postgres);
                Ok(())
            }
            Step::Stop => postgres
                .stop()
                .await
                .map_err(|err| postgres_failure("stop", &err)),
        }
    })
}

#[cfg(unix)]
async fn ensure_started(postgres: &mut PostgreSQL) -> Result<(), WorkerError> {
    if matches!(postgres.status(), Status::Started) {
        return Ok(());
    }
    postgres
        .start()
        .await
        .map_err(|err| postgres_failure("start", &err))
}

#[cfg(unix)]
fn postgres_failure(step: &'static str, err: &impl std::fmt::Display) -> WorkerError {
    WorkerError::Postgres {
        step,
        message: err.to_string(),
    }
}

#[cfg(unix)]
fn load_payload(config_path: &Utf8Path) -> Result<WorkerPayload, WorkerError> {
    let bytes = read_config(config_path).map_err(WorkerError::ConfigRead)?;
    serde_json::from_slice(&bytes).map_err(WorkerError::ConfigParse)
}

#[cfg(unix)]
fn read_config(path: &Utf8Path) -> Result<Vec<u8>, BoxError> {
    let (dir, relative) = ambient_dir_and_path(path)?;
    let mut file = dir.open(relative.as_std_path())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(unix)]
fn build_runtime() -> Result<Runtime, WorkerError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(WorkerError::Runtime)
}

/// Re-runs this binary as the unprivileged user and exits with its status.
#[cfg(unix)]
fn reexec_unprivileged_if_root(args: &[Utf8PathBuf]) -> Result<(), WorkerError> {
    if !Uid::effective().is_root() || env::var_os(REEXEC_MARKER).is_some() {
        return Ok(());
    }
    let exe = env::current_exe()
        .map_err(WorkerError::Runtime)?
        .into_os_string()
        .into_string()
        .map(Utf8PathBuf::from)
        .map_err(|_| WorkerError::Usage(String::from("executable path must be UTF-8")))?;
    let forwarded = args.get(1..).unwrap_or_default();
    let status = match Command::new("runuser")
        .args(["-u", UNPRIVILEGED_USER, "--"])
        .arg(exe.as_std_path())
        .args(forwarded.iter().map(|arg| arg.as_std_path()))
        .env(REEXEC_MARKER, "1")
        .env("PATH", TRUSTED_PATH)
        .status()
    {
        Ok(status) => status,
        Err(err) if err.kind() == io::ErrorKind::NotFound => reexec_via_su(&exe, forwarded)?,
        Err(err) => return Err(WorkerError::PrivilegeDrop(err.to_string())),
    };
    std::process::exit(status.code().unwrap_or(1));
}

#[cfg(unix)]
fn reexec_via_su(exe: &Utf8Path, forwarded: &[Utf8PathBuf]) -> Result<ExitStatus, WorkerError> {
    let command = std::iter::once(exe.as_str())
        .chain(forwarded.iter().map(|arg| arg.as_str()))
        .map(shell_quote)
        .fold(format!("{REEXEC_MARKER}=1 exec"), |command, word| {
            format!("{command} {word}")
        });
    Command::new("/bin/su")
        .args(["-s", "/bin/sh", UNPRIVILEGED_USER, "-c"])
        .arg(command)
        .env("PATH", TRUSTED_PATH)
        .status()
        .map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))
}

/// Wraps a word in single quotes for `/bin/sh`.
#[cfg(unix)]
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', "'\\''"))
}

#[cfg(unix)]
fn drop_privileges_if_root(username: &str) -> Result<(), WorkerError> {
    if !Uid::effective().is_root() {
        return Ok(());
    }
    let user = User::from_name(username)
        .map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?
        .ok_or_else(|| WorkerError::PrivilegeDrop(format!("user '{username}' not found")))?;
    let name = CString::new(user.name.clone())
        .map_err(|err| WorkerError::PrivilegeDrop(format!("invalid user name: {err}")))?;
    initgroups(&name, user.gid).map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?;
    setgid(user.gid).map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?;
    setuid(user.uid).map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?;

    // SAFETY: no other thread exists yet; the runtime is built afterwards.
    unsafe {
        env::set_var("HOME", user.dir);
        env::set_var("USER", &user.name);
        env::set_var("LOGNAME", &user.name);
    }
    Ok(())
}

#[cfg(unix)]
fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
    for (key, value) in environment {
        // SAFETY: the current-thread runtime has not started any task yet,
        // so nothing else reads or writes the environment concurrently.
        unsafe {
            match value {
                Some(secret) => env::set_var(key, secret.expose()),
                None => env::remove_var(key),
            }
        }
    }
}

#[cfg(not(unix))]
fn main() -> Result<(), BoxError> {
    Err("pg_worker is only supported on Unix platforms".into())
}

#[cfg(all(test, unix))]
mod tests {
    use super::{Step, WorkerError, parse_args, shell_quote};
    use camino::Utf8PathBuf;
    use rstest::rstest;

    fn args(words: &[&str]) -> Vec<Utf8PathBuf> {
        words.iter().copied().map(Utf8PathBuf::from).collect()
    }

    #[rstest]
    #[case("setup", Step::Setup)]
    #[case("start", Step::Start)]
    #[case("stop", Step::Stop)]
    fn steps_parse_with_their_config_path(#[case] word: &str, #[case] expected: Step) {
        let (step, config) =
            parse_args(&args(&["pg_worker", word, "/tmp/cluster.json"])).expect("valid args");

        assert_eq!(step, expected);
        assert_eq!(config.as_str(), "/tmp/cluster.json");
    }

    #[rstest]
    #[case(&["pg_worker"])]
    #[case(&["pg_worker", "start"])]
    #[case(&["pg_worker", "start", "a.json", "extra"])]
    #[case(&["pg_worker", "restart", "a.json"])]
    fn malformed_invocations_are_usage_errors(#[case] words: &[&str]) {
        assert!(matches!(parse_args(&args(words)), Err(WorkerError::Usage(_))));
    }

    #[rstest]
    #[case("", "''")]
    #[case("a b", "'a b'")]
    #[case("it's", "'it'\\''s'")]
    fn words_are_single_quoted_for_the_shell(#[case] word: &str, #[case] quoted: &str) {
        assert_eq!(shell_quote(word), quoted);
    }
}
