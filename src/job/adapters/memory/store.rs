//! In-memory record store for tests and database-less deployments.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::job::{
    domain::{JobId, JobPriority, TaskKey, UNSET_TIME},
    ports::{
        JobQuery, JobScope, JobSortField, JobTable, RecordStore, ResultOrder, ResultPage,
        SessionMode, StoreError, StoreResult, StoreSession, TaskDetail, TaskQuery,
    },
    records::{
        JobContentRecord, JobRecord, JobStateRecord, TaskEdges, TaskRecord, TaskResultRecord,
        TaskStateRecord, ThirdPartyCredentialRecord,
    },
};

/// Thread-safe in-memory record store.
///
/// Read-write sessions work on a copy of the tables that replaces the shared
/// state only when the work succeeds, which gives commit and rollback
/// semantics.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    state: Arc<RwLock<MemoryTables>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryTables {
    last_job_id: i64,
    jobs: BTreeMap<JobId, JobRecord>,
    contents: BTreeMap<JobId, JobContentRecord>,
    tasks: BTreeMap<TaskKey, TaskRecord>,
    results: Vec<TaskResultRecord>,
    credentials: BTreeMap<(String, String), ThirdPartyCredentialRecord>,
}

impl InMemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored job rows, removed jobs included.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .len()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn with_session<T, E, F>(&self, mode: SessionMode, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, E>,
        E: From<StoreError>,
    {
        match mode {
            SessionMode::ReadOnly => {
                let mut snapshot = self
                    .state
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                let mut session = MemorySession {
                    tables: &mut snapshot,
                    writable: false,
                };
                work(&mut session)
            }
            SessionMode::ReadWrite => {
                // Work only ever mutates a copy, so a panic cannot leave the
                // committed tables half written.
                let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                let mut working = state.clone();
                let mut session = MemorySession {
                    tables: &mut working,
                    writable: true,
                };
                let value = work(&mut session)?;
                *state = working;
                Ok(value)
            }
        }
    }
}

struct MemorySession<'a> {
    tables: &'a mut MemoryTables,
    writable: bool,
}

impl MemorySession<'_> {
    const fn ensure_writable(&self) -> StoreResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(StoreError::ReadOnlySession)
        }
    }

    fn job_mut(&mut self, id: JobId) -> StoreResult<&mut JobRecord> {
        self.ensure_writable()?;
        self.tables
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::MissingRow(format!("job {id}")))
    }

    fn task_mut(&mut self, key: TaskKey) -> StoreResult<&mut TaskRecord> {
        self.ensure_writable()?;
        self.tables
            .tasks
            .get_mut(&key)
            .ok_or_else(|| StoreError::MissingRow(format!("task {key}")))
    }

    fn tasks_of_mut<'s>(
        &'s mut self,
        ids: &'s [JobId],
    ) -> impl Iterator<Item = &'s mut TaskRecord> + 's {
        self.tables
            .tasks
            .values_mut()
            .filter(move |task| ids.contains(&task.key.job_id))
    }

    fn matching_jobs(&self, query: &JobQuery) -> Vec<&JobRecord> {
        self.tables
            .jobs
            .values()
            .filter(|job| job_matches(query, job))
            .collect()
    }

    fn matching_tasks(&self, query: &TaskQuery) -> Vec<&TaskRecord> {
        self.tables
            .tasks
            .values()
            .filter(|task| {
                self.tables.jobs.get(&task.key.job_id).is_some_and(|job| {
                    job.removed_time == UNSET_TIME
                        && query.owner.as_ref().is_none_or(|owner| *owner == job.owner)
                })
            })
            .filter(|task| task_matches(query, task))
            .collect()
    }
}

fn job_matches(query: &JobQuery, job: &JobRecord) -> bool {
    query
        .statuses
        .as_ref()
        .is_none_or(|statuses| statuses.contains(&job.status))
        && query.owner.as_ref().is_none_or(|owner| *owner == job.owner)
        && query
            .submitted_since
            .is_none_or(|since| job.submitted_time >= since)
        && (query.include_removed || job.removed_time == UNSET_TIME)
}

fn task_matches(query: &TaskQuery, task: &TaskRecord) -> bool {
    query
        .statuses
        .as_ref()
        .is_none_or(|statuses| statuses.contains(&task.status))
        && query
            .tag
            .as_ref()
            .is_none_or(|tag| task.tag.as_ref() == Some(tag))
        && query
            .started_since
            .is_none_or(|since| task.start_time >= since)
        && query.finished_before.is_none_or(|before| {
            task.finished_time != UNSET_TIME && task.finished_time <= before
        })
}

fn compare_jobs(query: &JobQuery, left: &JobRecord, right: &JobRecord) -> Ordering {
    let keyed = query.sort.iter().fold(Ordering::Equal, |ordering, sort| {
        ordering.then_with(|| {
            let natural = match sort.field {
                JobSortField::Id => left.id.cmp(&right.id),
                JobSortField::Name => left.name.cmp(&right.name),
                JobSortField::Owner => left.owner.cmp(&right.owner),
                JobSortField::Priority => left.priority.cmp(&right.priority),
                JobSortField::SubmittedTime => left.submitted_time.cmp(&right.submitted_time),
            };
            if sort.descending {
                natural.reverse()
            } else {
                natural
            }
        })
    });
    keyed.then_with(|| left.id.cmp(&right.id))
}

fn paginate<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    items
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

fn with_detail(task: &TaskRecord, detail: TaskDetail) -> TaskRecord {
    match detail {
        TaskDetail::Full => task.clone(),
        TaskDetail::Light => TaskRecord {
            variables: Vec::new(),
            scripts: Vec::new(),
            selectors: Vec::new(),
            payload: None,
            ..task.clone()
        },
    }
}

fn count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

impl StoreSession for MemorySession<'_> {
    fn insert_job(&mut self, job: &JobRecord) -> StoreResult<JobId> {
        self.ensure_writable()?;
        self.tables.last_job_id += 1;
        let id = JobId::new(self.tables.last_job_id);
        let mut stored = job.clone();
        stored.id = Some(id);
        self.tables.jobs.insert(id, stored);
        Ok(id)
    }

    fn insert_job_content(&mut self, content: &JobContentRecord) -> StoreResult<()> {
        self.job_mut(content.job_id)?;
        if self.tables.contents.contains_key(&content.job_id) {
            return Err(StoreError::Conflict(format!("job content {}", content.job_id)));
        }
        self.tables.contents.insert(content.job_id, content.clone());
        Ok(())
    }

    fn load_job_content(&mut self, id: JobId) -> StoreResult<Option<JobContentRecord>> {
        Ok(self.tables.contents.get(&id).cloned())
    }

    fn load_jobs(&mut self, ids: &[JobId], scope: JobScope) -> StoreResult<Vec<JobRecord>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.tables.jobs.get(id))
            .filter(|job| scope == JobScope::Any || job.removed_time == UNSET_TIME)
            .cloned()
            .collect())
    }

    fn find_job_ids(&mut self, query: &JobQuery) -> StoreResult<Vec<JobId>> {
        let mut jobs = self.matching_jobs(query);
        jobs.sort_by(|left, right| compare_jobs(query, left, right));
        let ids = jobs.into_iter().filter_map(|job| job.id).collect();
        Ok(paginate(ids, query.offset, query.limit))
    }

    fn count_jobs(&mut self, query: &JobQuery) -> StoreResult<u64> {
        Ok(count(self.matching_jobs(query).len()))
    }

    fn update_job_state(&mut self, state: &JobStateRecord) -> StoreResult<()> {
        let job = self.job_mut(state.id)?;
        job.status = state.status;
        job.start_time = state.start_time;
        job.in_error_time = state.in_error_time;
        job.finished_time = state.finished_time;
        job.last_updated_time = state.last_updated_time;
        job.counters = state.counters;
        job.result_map.clone_from(&state.result_map);
        Ok(())
    }

    fn update_job_priority(
        &mut self,
        id: JobId,
        priority: JobPriority,
        updated_at: i64,
    ) -> StoreResult<()> {
        let job = self.job_mut(id)?;
        job.priority = priority;
        job.last_updated_time = updated_at;
        Ok(())
    }

    fn mark_job_to_be_removed(&mut self, id: JobId, updated_at: i64) -> StoreResult<()> {
        let job = self.job_mut(id)?;
        job.to_be_removed = true;
        job.last_updated_time = updated_at;
        Ok(())
    }

    fn mark_jobs_removed(&mut self, ids: &[JobId], removed_time: i64) -> StoreResult<usize> {
        self.ensure_writable()?;
        let mut updated = 0;
        for id in ids {
            if let Some(job) = self.tables.jobs.get_mut(id) {
                if job.removed_time == UNSET_TIME {
                    job.removed_time = removed_time;
                    job.last_updated_time = removed_time;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    fn schedule_job_removal(&mut self, id: JobId, removal_time: i64) -> StoreResult<()> {
        self.job_mut(id)?.scheduled_time_for_removal = removal_time;
        Ok(())
    }

    fn find_jobs_scheduled_for_removal(&mut self, now: i64) -> StoreResult<Vec<(JobId, String)>> {
        Ok(self
            .tables
            .jobs
            .values()
            .filter(|job| job.scheduled_time_for_removal > 0 && job.scheduled_time_for_removal <= now)
            .filter(|job| job.removed_time == UNSET_TIME)
            .filter_map(|job| job.id.map(|id| (id, job.owner.clone())))
            .collect())
    }

    fn find_parent_ids(&mut self, ids: &[JobId]) -> StoreResult<Vec<JobId>> {
        Ok(self
            .tables
            .jobs
            .iter()
            .filter(|(id, job)| ids.contains(id) && job.removed_time == UNSET_TIME)
            .filter_map(|(_, job)| job.parent_id)
            .collect())
    }

    fn adjust_children_count(&mut self, parent: JobId, delta: i64) -> StoreResult<()> {
        self.ensure_writable()?;
        if let Some(job) = self.tables.jobs.get_mut(&parent) {
            let adjusted = i64::from(job.children_count).saturating_add(delta).max(0);
            job.children_count = u32::try_from(adjusted).unwrap_or(u32::MAX);
        }
        Ok(())
    }

    fn delete_job_rows(&mut self, table: JobTable, ids: &[JobId]) -> StoreResult<usize> {
        self.ensure_writable()?;
        let affected = match table {
            JobTable::TaskEdges => self
                .tasks_of_mut(ids)
                .map(|task| task.edges = TaskEdges::empty(task.key))
                .count(),
            JobTable::Scripts => self
                .tasks_of_mut(ids)
                .map(|task| std::mem::take(&mut task.scripts).len())
                .sum(),
            JobTable::Selectors => self
                .tasks_of_mut(ids)
                .map(|task| std::mem::take(&mut task.selectors).len())
                .sum(),
            JobTable::TaskPayloads => self
                .tasks_of_mut(ids)
                .filter_map(|task| task.payload.take())
                .count(),
            JobTable::TaskVariables => self
                .tasks_of_mut(ids)
                .map(|task| std::mem::take(&mut task.variables).len())
                .sum(),
            JobTable::TaskResults => {
                let before = self.tables.results.len();
                self.tables
                    .results
                    .retain(|result| !ids.contains(&result.task.job_id));
                before - self.tables.results.len()
            }
            JobTable::Tasks => {
                let before = self.tables.tasks.len();
                self.tables
                    .tasks
                    .retain(|key, _| !ids.contains(&key.job_id));
                before - self.tables.tasks.len()
            }
            JobTable::JobContent => ids
                .iter()
                .filter_map(|id| self.tables.contents.remove(id))
                .count(),
            JobTable::JobVariables => self
                .tables
                .jobs
                .iter_mut()
                .filter(|(id, _)| ids.contains(id))
                .map(|(_, job)| std::mem::take(&mut job.variables).len())
                .sum(),
            JobTable::Jobs => ids
                .iter()
                .filter_map(|id| self.tables.jobs.remove(id))
                .count(),
        };
        Ok(affected)
    }

    fn insert_task(&mut self, task: &TaskRecord) -> StoreResult<()> {
        self.job_mut(task.key.job_id)?;
        if self.tables.tasks.contains_key(&task.key) {
            return Err(StoreError::Conflict(format!("task {}", task.key)));
        }
        let mut stored = task.clone();
        stored.edges = TaskEdges::empty(task.key);
        self.tables.tasks.insert(task.key, stored);
        Ok(())
    }

    fn replace_task_edges(&mut self, edges: &TaskEdges) -> StoreResult<()> {
        self.ensure_writable()?;
        let referenced: Vec<TaskKey> = edges
            .dependencies
            .iter()
            .chain(edges.if_branch.iter())
            .chain(edges.joined_branches.iter())
            .copied()
            .collect();
        if let Some(missing) = referenced
            .iter()
            .find(|key| !self.tables.tasks.contains_key(key))
        {
            return Err(StoreError::MissingRow(format!("task {missing}")));
        }
        self.task_mut(edges.task)?.edges = edges.clone();
        Ok(())
    }

    fn load_tasks(&mut self, job_ids: &[JobId], detail: TaskDetail) -> StoreResult<Vec<TaskRecord>> {
        Ok(self
            .tables
            .tasks
            .values()
            .filter(|task| job_ids.contains(&task.key.job_id))
            .map(|task| with_detail(task, detail))
            .collect())
    }

    fn find_task(&mut self, key: TaskKey, detail: TaskDetail) -> StoreResult<Option<TaskRecord>> {
        Ok(self
            .tables
            .tasks
            .get(&key)
            .map(|task| with_detail(task, detail)))
    }

    fn find_task_key_by_name(
        &mut self,
        job_id: JobId,
        name: &str,
    ) -> StoreResult<Option<TaskKey>> {
        Ok(self
            .tables
            .tasks
            .values()
            .find(|task| task.key.job_id == job_id && task.name == name)
            .map(|task| task.key))
    }

    fn find_tasks(&mut self, query: &TaskQuery) -> StoreResult<Vec<TaskRecord>> {
        let tasks = self
            .matching_tasks(query)
            .into_iter()
            .map(|task| with_detail(task, TaskDetail::Light))
            .collect();
        Ok(paginate(tasks, query.offset, query.limit))
    }

    fn count_tasks(&mut self, query: &TaskQuery) -> StoreResult<u64> {
        Ok(count(self.matching_tasks(query).len()))
    }

    fn update_task_state(&mut self, state: &TaskStateRecord) -> StoreResult<()> {
        let task = self.task_mut(state.key)?;
        task.status = state.status;
        task.start_time = state.start_time;
        task.finished_time = state.finished_time;
        task.scheduled_time = state.scheduled_time;
        task.in_error_time = state.in_error_time;
        task.execution_duration = state.execution_duration;
        task.execution_host_name.clone_from(&state.execution_host_name);
        task.number_of_execution_left = state.number_of_execution_left;
        task.number_of_execution_on_failure_left = state.number_of_execution_on_failure_left;
        task.iteration = state.iteration;
        task.replication = state.replication;
        task.task_launcher_node_url
            .clone_from(&state.task_launcher_node_url);
        Ok(())
    }

    fn insert_task_result(&mut self, result: &TaskResultRecord) -> StoreResult<()> {
        self.task_mut(result.task)?;
        self.tables.results.push(result.clone());
        Ok(())
    }

    fn load_task_results(
        &mut self,
        task: TaskKey,
        page: ResultPage,
    ) -> StoreResult<Vec<TaskResultRecord>> {
        let mut history: Vec<(usize, &TaskResultRecord)> = self
            .tables
            .results
            .iter()
            .enumerate()
            .filter(|(_, result)| result.task == task)
            .collect();
        history.sort_by(|(left_seq, left), (right_seq, right)| {
            left.result_time
                .cmp(&right.result_time)
                .then(left_seq.cmp(right_seq))
        });
        if page.order == ResultOrder::NewestFirst {
            history.reverse();
        }
        let ordered = history.into_iter().map(|(_, result)| result.clone()).collect();
        Ok(paginate(ordered, page.offset, page.limit))
    }

    fn load_latest_task_results(
        &mut self,
        tasks: &[TaskKey],
    ) -> StoreResult<Vec<TaskResultRecord>> {
        let mut latest = Vec::new();
        for task in tasks {
            latest.extend(self.load_task_results(*task, ResultPage::nth_latest(0))?);
        }
        Ok(latest)
    }

    fn put_credential(&mut self, credential: &ThirdPartyCredentialRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        self.tables.credentials.insert(
            (credential.username.clone(), credential.key.clone()),
            credential.clone(),
        );
        Ok(())
    }

    fn remove_credential(&mut self, username: &str, key: &str) -> StoreResult<()> {
        self.ensure_writable()?;
        self.tables
            .credentials
            .remove(&(username.to_owned(), key.to_owned()));
        Ok(())
    }

    fn load_credentials(&mut self, username: &str) -> StoreResult<Vec<ThirdPartyCredentialRecord>> {
        Ok(self
            .tables
            .credentials
            .values()
            .filter(|credential| credential.username == username)
            .cloned()
            .collect())
    }
}
