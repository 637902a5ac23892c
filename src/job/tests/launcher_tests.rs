//! Rebinding task launchers after a restart.

use super::fixtures::script_task;
use crate::job::domain::InternalJob;
use crate::job::ports::{LauncherError, TaskLauncherHandle, TaskLauncherResolver};
use crate::job::services::LauncherRebinder;
use mockall::{Sequence, mock};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

mock! {
    Resolver {}

    impl TaskLauncherResolver for Resolver {
        fn lookup(&self, url: &str) -> Result<TaskLauncherHandle, LauncherError>;
        fn ping(&self, handle: &TaskLauncherHandle) -> bool;
    }
}

const URL: &str = "pamr://4097/launcher";

fn rebinder(resolver: MockResolver) -> LauncherRebinder<MockResolver> {
    LauncherRebinder::new(
        Arc::new(resolver),
        Duration::from_millis(200),
        Duration::from_millis(1),
    )
}

fn not_bound(url: &str) -> Result<TaskLauncherHandle, LauncherError> {
    Err(LauncherError::NotBound(url.to_owned()))
}

#[rstest]
fn reachable_launchers_resolve_on_the_first_lookup() {
    let mut resolver = MockResolver::new();
    resolver
        .expect_lookup()
        .withf(|url| url == URL)
        .times(1)
        .returning(|url| Ok(TaskLauncherHandle::connected(url)));
    resolver.expect_ping().times(1).return_const(true);

    let handle = rebinder(resolver).resolve(URL, false);

    assert_eq!(handle, TaskLauncherHandle::connected(URL));
}

#[rstest]
fn unreachable_launchers_become_placeholders_without_rebind() {
    let mut resolver = MockResolver::new();
    resolver.expect_lookup().times(1).returning(not_bound);
    resolver.expect_ping().never();

    let handle = rebinder(resolver).resolve(URL, false);

    assert!(handle.is_placeholder());
    assert_eq!(handle.url(), URL);
}

#[rstest]
fn rebinding_retries_until_the_launcher_answers() {
    let mut resolver = MockResolver::new();
    let mut sequence = Sequence::new();
    resolver
        .expect_lookup()
        .times(2)
        .in_sequence(&mut sequence)
        .returning(not_bound);
    resolver
        .expect_lookup()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|url| Ok(TaskLauncherHandle::connected(url)));
    resolver.expect_ping().times(1).return_const(true);

    let handle = rebinder(resolver).resolve(URL, true);

    assert!(!handle.is_placeholder());
}

#[rstest]
fn rebinding_gives_up_after_the_reconnection_timeout() {
    let mut resolver = MockResolver::new();
    resolver.expect_lookup().returning(not_bound);
    let rebinder = LauncherRebinder::new(
        Arc::new(resolver),
        Duration::from_millis(5),
        Duration::from_millis(2),
    );

    let handle = rebinder.resolve(URL, true);

    assert!(handle.is_placeholder());
}

#[rstest]
fn launchers_that_do_not_answer_pings_are_placeholders() {
    let mut resolver = MockResolver::new();
    resolver
        .expect_lookup()
        .returning(|url| Ok(TaskLauncherHandle::connected(url)));
    resolver.expect_ping().return_const(false);

    let handle = rebinder(resolver).resolve(URL, false);

    assert_eq!(handle, TaskLauncherHandle::placeholder(URL));
}

#[rstest]
fn each_launcher_of_a_job_is_resolved_once() {
    let mut job = InternalJob::new("distributed", "alice");
    for (index, url) in [URL, URL, "pamr://5001/launcher"].into_iter().enumerate() {
        let id = job.add_task(script_task(&format!("t{index}")));
        let task = job.task_entry(id).expect("task was just added");
        task.task_launcher_node_url = Some(url.to_owned());
    }
    job.add_task(script_task("never-dispatched"));
    let mut resolver = MockResolver::new();
    resolver
        .expect_lookup()
        .times(2)
        .returning(|url| Ok(TaskLauncherHandle::connected(url)));
    resolver
        .expect_ping()
        .returning(|handle| handle.url() == URL);

    let handles = rebinder(resolver).resolve_job(&job, false);

    assert_eq!(handles.len(), 2);
    assert_eq!(handles.get(URL).map(TaskLauncherHandle::is_placeholder), Some(false));
    assert_eq!(
        handles
            .get("pamr://5001/launcher")
            .map(TaskLauncherHandle::is_placeholder),
        Some(true)
    );
}
