//! Record-level operations over one `PostgreSQL` transaction.

use super::conversion::{
    CounterColumns, LoadedChildren, corrupt, credential_record, credential_row, edge_rows,
    group_by_task, job_record, job_variable_rows, new_job_row, new_result_row, raw_job_ids,
    result_record, task_child_rows, task_id_column, task_key, task_record, task_row, to_int,
};
use super::models::{
    CredentialRow, EdgeRow, EnvironmentModifierRow, JobContentRow, JobRow, JobVariableRow,
    PayloadRow, ScriptRow, SelectorRow, TaskResultRow, TaskRow, TaskVariableRow,
};
use super::schema::{
    environment_modifier, job_content, job_data, job_data_variable, script_data, selector_data,
    task_data, task_data_edge, task_data_variable, task_payload, task_result_data,
    third_party_credential,
};
use super::store::store_error;
use crate::job::domain::{JobId, JobPriority, TaskKey, UNSET_TIME};
use crate::job::ports::{
    JobQuery, JobScope, JobSortField, JobTable, ResultOrder, ResultPage, StoreError, StoreResult,
    StoreSession, TaskDetail, TaskQuery,
};
use crate::job::records::{
    JobContentRecord, JobRecord, JobStateRecord, RecordError, TaskEdges, TaskRecord,
    TaskResultRecord, TaskStateRecord, ThirdPartyCredentialRecord,
};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::upsert::excluded;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Session bound to a connection that is already inside a transaction.
pub(super) struct PgSession<'c> {
    conn: &'c mut PgConnection,
    writable: bool,
}

/// Sort columns of a job listing, ordered in memory so priorities compare by
/// rank rather than by their stored text.
struct JobSortKey {
    id: i64,
    name: String,
    owner: String,
    priority: JobPriority,
    submitted_time: i64,
}

impl<'c> PgSession<'c> {
    pub(super) const fn new(conn: &'c mut PgConnection, writable: bool) -> Self {
        Self { conn, writable }
    }

    const fn ensure_writable(&self) -> StoreResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(StoreError::ReadOnlySession)
        }
    }

    fn load_children(&mut self, job_ids: &[i64], detail: TaskDetail) -> StoreResult<LoadedChildren> {
        let edges = task_data_edge::table
            .filter(task_data_edge::job_id.eq_any(job_ids))
            .select(EdgeRow::as_select())
            .load::<EdgeRow>(self.conn)
            .map_err(store_error)?;
        let mut children = LoadedChildren {
            edges: group_by_task(edges, |row| (row.job_id, row.task_id))?,
            ..LoadedChildren::default()
        };
        if detail == TaskDetail::Light {
            return Ok(children);
        }
        let variables = task_data_variable::table
            .filter(task_data_variable::job_id.eq_any(job_ids))
            .select(TaskVariableRow::as_select())
            .load::<TaskVariableRow>(self.conn)
            .map_err(store_error)?;
        let payloads = task_payload::table
            .filter(task_payload::job_id.eq_any(job_ids))
            .select(PayloadRow::as_select())
            .load::<PayloadRow>(self.conn)
            .map_err(store_error)?;
        let modifiers = environment_modifier::table
            .filter(environment_modifier::job_id.eq_any(job_ids))
            .select(EnvironmentModifierRow::as_select())
            .load::<EnvironmentModifierRow>(self.conn)
            .map_err(store_error)?;
        let scripts = script_data::table
            .filter(script_data::job_id.eq_any(job_ids))
            .select(ScriptRow::as_select())
            .load::<ScriptRow>(self.conn)
            .map_err(store_error)?;
        let selectors = selector_data::table
            .filter(selector_data::job_id.eq_any(job_ids))
            .select(SelectorRow::as_select())
            .load::<SelectorRow>(self.conn)
            .map_err(store_error)?;

        children.variables = group_by_task(variables, |row| (row.job_id, row.task_id))?;
        children.env_modifiers = group_by_task(modifiers, |row| (row.job_id, row.task_id))?;
        children.scripts = group_by_task(scripts, |row| (row.job_id, row.task_id))?;
        children.selectors = group_by_task(selectors, |row| (row.job_id, row.task_id))?;
        children.payloads = group_by_task(payloads, |row| (row.job_id, row.task_id))?
            .into_iter()
            .filter_map(|(key, mut rows)| rows.pop().map(|row| (key, row)))
            .collect();
        Ok(children)
    }

    fn assemble_tasks(&mut self, rows: Vec<TaskRow>, detail: TaskDetail) -> StoreResult<Vec<TaskRecord>> {
        let job_ids: Vec<i64> = rows
            .iter()
            .map(|row| row.job_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut children = self.load_children(&job_ids, detail)?;
        rows.into_iter()
            .map(|row| task_record(row, &mut children))
            .collect()
    }

    fn matching_job_keys(&mut self, query: &JobQuery) -> StoreResult<Vec<JobSortKey>> {
        let rows = filtered_jobs(query)
            .select((
                job_data::id,
                job_data::name,
                job_data::owner,
                job_data::priority,
                job_data::submitted_time,
            ))
            .load::<(i64, String, String, String, i64)>(self.conn)
            .map_err(store_error)?;
        rows.into_iter()
            .map(|(id, name, owner, priority, submitted_time)| {
                Ok(JobSortKey {
                    id,
                    name,
                    owner,
                    priority: JobPriority::try_from(priority.as_str()).map_err(corrupt)?,
                    submitted_time,
                })
            })
            .collect()
    }

    fn update_exactly_one(affected: usize, what: impl FnOnce() -> String) -> StoreResult<()> {
        if affected == 0 {
            Err(StoreError::MissingRow(what()))
        } else {
            Ok(())
        }
    }
}

fn filtered_jobs(query: &JobQuery) -> job_data::BoxedQuery<'_, Pg> {
    let mut select = job_data::table.into_boxed();
    if let Some(statuses) = &query.statuses {
        let names: Vec<&'static str> = statuses.iter().map(|status| status.as_str()).collect();
        select = select.filter(job_data::status.eq_any(names));
    }
    if let Some(owner) = &query.owner {
        select = select.filter(job_data::owner.eq(owner.as_str()));
    }
    if let Some(since) = query.submitted_since {
        select = select.filter(job_data::submitted_time.ge(since));
    }
    if !query.include_removed {
        select = select.filter(job_data::removed_time.eq(UNSET_TIME));
    }
    select
}

fn filtered_tasks(query: &TaskQuery) -> task_data::BoxedQuery<'_, Pg> {
    let mut active_jobs = job_data::table
        .filter(job_data::removed_time.eq(UNSET_TIME))
        .select(job_data::id)
        .into_boxed();
    if let Some(owner) = &query.owner {
        active_jobs = active_jobs.filter(job_data::owner.eq(owner.as_str()));
    }
    let mut select = task_data::table
        .filter(task_data::job_id.eq_any(active_jobs))
        .into_boxed();
    if let Some(statuses) = &query.statuses {
        let names: Vec<&'static str> = statuses.iter().map(|status| status.as_str()).collect();
        select = select.filter(task_data::status.eq_any(names));
    }
    if let Some(tag) = &query.tag {
        select = select.filter(task_data::tag.eq(tag.as_str()));
    }
    if let Some(since) = query.started_since {
        select = select.filter(task_data::start_time.ge(since));
    }
    if let Some(before) = query.finished_before {
        select = select
            .filter(task_data::finished_time.ne(UNSET_TIME))
            .filter(task_data::finished_time.le(before));
    }
    select
}

fn compare_keys(query: &JobQuery, left: &JobSortKey, right: &JobSortKey) -> Ordering {
    query
        .sort
        .iter()
        .fold(Ordering::Equal, |ordering, sort| {
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
        })
        .then_with(|| left.id.cmp(&right.id))
}

fn sql_offset(offset: usize) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

fn row_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

impl StoreSession for PgSession<'_> {
    fn insert_job(&mut self, job: &JobRecord) -> StoreResult<JobId> {
        self.ensure_writable()?;
        let row = new_job_row(job)?;
        let id = diesel::insert_into(job_data::table)
            .values(&row)
            .returning(job_data::id)
            .get_result::<i64>(self.conn)
            .map_err(store_error)?;
        let id = JobId::new(id);
        let variables = job_variable_rows(id, job);
        if !variables.is_empty() {
            diesel::insert_into(job_data_variable::table)
                .values(&variables)
                .execute(self.conn)
                .map_err(store_error)?;
        }
        Ok(id)
    }

    fn insert_job_content(&mut self, content: &JobContentRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        let row = JobContentRow {
            job_id: content.job_id.into_inner(),
            content: content.content.clone(),
        };
        diesel::insert_into(job_content::table)
            .values(&row)
            .execute(self.conn)
            .map_err(store_error)?;
        Ok(())
    }

    fn load_job_content(&mut self, id: JobId) -> StoreResult<Option<JobContentRecord>> {
        let row = job_content::table
            .find(id.into_inner())
            .select(JobContentRow::as_select())
            .first::<JobContentRow>(self.conn)
            .optional()
            .map_err(store_error)?;
        Ok(row.map(|stored| JobContentRecord {
            job_id: JobId::new(stored.job_id),
            content: stored.content,
        }))
    }

    fn load_jobs(&mut self, ids: &[JobId], scope: JobScope) -> StoreResult<Vec<JobRecord>> {
        let raw = raw_job_ids(ids);
        let mut select = job_data::table
            .filter(job_data::id.eq_any(&raw))
            .into_boxed();
        if scope == JobScope::NotRemoved {
            select = select.filter(job_data::removed_time.eq(UNSET_TIME));
        }
        let rows = select
            .select(JobRow::as_select())
            .load::<JobRow>(self.conn)
            .map_err(store_error)?;
        let mut variables: BTreeMap<i64, Vec<JobVariableRow>> = BTreeMap::new();
        for variable in job_data_variable::table
            .filter(job_data_variable::job_id.eq_any(&raw))
            .select(JobVariableRow::as_select())
            .load::<JobVariableRow>(self.conn)
            .map_err(store_error)?
        {
            variables.entry(variable.job_id).or_default().push(variable);
        }
        let mut by_id: BTreeMap<i64, JobRow> = rows.into_iter().map(|row| (row.id, row)).collect();
        raw.iter()
            .filter_map(|id| by_id.remove(id))
            .map(|row| {
                let owned = variables.remove(&row.id).unwrap_or_default();
                job_record(row, owned)
            })
            .collect()
    }

    fn find_job_ids(&mut self, query: &JobQuery) -> StoreResult<Vec<JobId>> {
        let mut keys = self.matching_job_keys(query)?;
        keys.sort_by(|left, right| compare_keys(query, left, right));
        Ok(keys
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|key| JobId::new(key.id))
            .collect())
    }

    fn count_jobs(&mut self, query: &JobQuery) -> StoreResult<u64> {
        filtered_jobs(query)
            .count()
            .get_result::<i64>(self.conn)
            .map(row_count)
            .map_err(store_error)
    }

    fn update_job_state(&mut self, state: &JobStateRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        let counters = CounterColumns::from_counters(&state.counters)?;
        let affected = diesel::update(job_data::table.find(state.id.into_inner()))
            .set((
                job_data::status.eq(state.status.as_str()),
                job_data::start_time.eq(state.start_time),
                job_data::in_error_time.eq(state.in_error_time),
                job_data::finished_time.eq(state.finished_time),
                job_data::last_updated_time.eq(state.last_updated_time),
                job_data::total_tasks.eq(counters.total),
                job_data::pending_tasks.eq(counters.pending),
                job_data::running_tasks.eq(counters.running),
                job_data::finished_tasks.eq(counters.finished),
                job_data::failed_tasks.eq(counters.failed),
                job_data::faulty_tasks.eq(counters.faulty),
                job_data::in_error_tasks.eq(counters.in_error),
                job_data::result_map.eq(state.result_map.as_deref()),
            ))
            .execute(self.conn)
            .map_err(store_error)?;
        Self::update_exactly_one(affected, || format!("job {}", state.id))
    }

    fn update_job_priority(
        &mut self,
        id: JobId,
        priority: JobPriority,
        updated_at: i64,
    ) -> StoreResult<()> {
        self.ensure_writable()?;
        let affected = diesel::update(job_data::table.find(id.into_inner()))
            .set((
                job_data::priority.eq(priority.as_str()),
                job_data::last_updated_time.eq(updated_at),
            ))
            .execute(self.conn)
            .map_err(store_error)?;
        Self::update_exactly_one(affected, || format!("job {id}"))
    }

    fn mark_job_to_be_removed(&mut self, id: JobId, updated_at: i64) -> StoreResult<()> {
        self.ensure_writable()?;
        let affected = diesel::update(job_data::table.find(id.into_inner()))
            .set((
                job_data::to_be_removed.eq(true),
                job_data::last_updated_time.eq(updated_at),
            ))
            .execute(self.conn)
            .map_err(store_error)?;
        Self::update_exactly_one(affected, || format!("job {id}"))
    }

    fn mark_jobs_removed(&mut self, ids: &[JobId], removed_time: i64) -> StoreResult<usize> {
        self.ensure_writable()?;
        diesel::update(
            job_data::table
                .filter(job_data::id.eq_any(raw_job_ids(ids)))
                .filter(job_data::removed_time.eq(UNSET_TIME)),
        )
        .set((
            job_data::removed_time.eq(removed_time),
            job_data::last_updated_time.eq(removed_time),
        ))
        .execute(self.conn)
        .map_err(store_error)
    }

    fn schedule_job_removal(&mut self, id: JobId, removal_time: i64) -> StoreResult<()> {
        self.ensure_writable()?;
        let affected = diesel::update(job_data::table.find(id.into_inner()))
            .set(job_data::scheduled_time_for_removal.eq(removal_time))
            .execute(self.conn)
            .map_err(store_error)?;
        Self::update_exactly_one(affected, || format!("job {id}"))
    }

    fn find_jobs_scheduled_for_removal(&mut self, now: i64) -> StoreResult<Vec<(JobId, String)>> {
        let rows = job_data::table
            .filter(job_data::scheduled_time_for_removal.gt(0))
            .filter(job_data::scheduled_time_for_removal.le(now))
            .filter(job_data::removed_time.eq(UNSET_TIME))
            .order(job_data::id.asc())
            .select((job_data::id, job_data::owner))
            .load::<(i64, String)>(self.conn)
            .map_err(store_error)?;
        Ok(rows
            .into_iter()
            .map(|(id, owner)| (JobId::new(id), owner))
            .collect())
    }

    fn find_parent_ids(&mut self, ids: &[JobId]) -> StoreResult<Vec<JobId>> {
        let parents = job_data::table
            .filter(job_data::id.eq_any(raw_job_ids(ids)))
            .filter(job_data::parent_id.is_not_null())
            .filter(job_data::removed_time.eq(UNSET_TIME))
            .select(job_data::parent_id)
            .load::<Option<i64>>(self.conn)
            .map_err(store_error)?;
        Ok(parents.into_iter().flatten().map(JobId::new).collect())
    }

    fn adjust_children_count(&mut self, parent: JobId, delta: i64) -> StoreResult<()> {
        self.ensure_writable()?;
        let current = job_data::table
            .find(parent.into_inner())
            .select(job_data::children_count)
            .for_update()
            .first::<i32>(self.conn)
            .optional()
            .map_err(store_error)?;
        let Some(count) = current else {
            return Ok(());
        };
        let adjusted = i64::from(count).saturating_add(delta).max(0);
        let stored = i32::try_from(adjusted)
            .map_err(|_| corrupt(RecordError::OutOfRange("children_count")))?;
        diesel::update(job_data::table.find(parent.into_inner()))
            .set(job_data::children_count.eq(stored))
            .execute(self.conn)
            .map_err(store_error)?;
        Ok(())
    }

    fn delete_job_rows(&mut self, table: JobTable, ids: &[JobId]) -> StoreResult<usize> {
        self.ensure_writable()?;
        let raw = raw_job_ids(ids);
        let deleted = match table {
            JobTable::TaskEdges => diesel::delete(
                task_data_edge::table.filter(
                    task_data_edge::job_id
                        .eq_any(&raw)
                        .or(task_data_edge::target_job_id.eq_any(&raw)),
                ),
            )
            .execute(self.conn),
            JobTable::Scripts => {
                diesel::delete(script_data::table.filter(script_data::job_id.eq_any(&raw)))
                    .execute(self.conn)
            }
            JobTable::Selectors => {
                diesel::delete(selector_data::table.filter(selector_data::job_id.eq_any(&raw)))
                    .execute(self.conn)
            }
            JobTable::TaskPayloads => diesel::delete(
                environment_modifier::table.filter(environment_modifier::job_id.eq_any(&raw)),
            )
            .execute(self.conn)
            .and_then(|_| {
                diesel::delete(task_payload::table.filter(task_payload::job_id.eq_any(&raw)))
                    .execute(self.conn)
            }),
            JobTable::TaskVariables => diesel::delete(
                task_data_variable::table.filter(task_data_variable::job_id.eq_any(&raw)),
            )
            .execute(self.conn),
            JobTable::TaskResults => diesel::delete(
                task_result_data::table.filter(task_result_data::job_id.eq_any(&raw)),
            )
            .execute(self.conn),
            JobTable::Tasks => {
                diesel::delete(task_data::table.filter(task_data::job_id.eq_any(&raw)))
                    .execute(self.conn)
            }
            JobTable::JobContent => {
                diesel::delete(job_content::table.filter(job_content::job_id.eq_any(&raw)))
                    .execute(self.conn)
            }
            JobTable::JobVariables => diesel::delete(
                job_data_variable::table.filter(job_data_variable::job_id.eq_any(&raw)),
            )
            .execute(self.conn),
            JobTable::Jobs => {
                diesel::delete(job_data::table.filter(job_data::id.eq_any(&raw))).execute(self.conn)
            }
        };
        deleted.map_err(store_error)
    }

    fn insert_task(&mut self, task: &TaskRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        let row = task_row(task)?;
        let children = task_child_rows(task)?;
        diesel::insert_into(task_data::table)
            .values(&row)
            .execute(self.conn)
            .map_err(|err| match store_error(err) {
                StoreError::Conflict(_) => StoreError::Conflict(format!("task {}", task.key)),
                StoreError::MissingRow(_) => {
                    StoreError::MissingRow(format!("job {}", task.key.job_id))
                }
                other => other,
            })?;
        if !children.variables.is_empty() {
            diesel::insert_into(task_data_variable::table)
                .values(&children.variables)
                .execute(self.conn)
                .map_err(store_error)?;
        }
        if let Some(payload) = &children.payload {
            diesel::insert_into(task_payload::table)
                .values(payload)
                .execute(self.conn)
                .map_err(store_error)?;
        }
        if !children.env_modifiers.is_empty() {
            diesel::insert_into(environment_modifier::table)
                .values(&children.env_modifiers)
                .execute(self.conn)
                .map_err(store_error)?;
        }
        if !children.scripts.is_empty() {
            diesel::insert_into(script_data::table)
                .values(&children.scripts)
                .execute(self.conn)
                .map_err(store_error)?;
        }
        if !children.selectors.is_empty() {
            diesel::insert_into(selector_data::table)
                .values(&children.selectors)
                .execute(self.conn)
                .map_err(store_error)?;
        }
        Ok(())
    }

    fn replace_task_edges(&mut self, edges: &TaskEdges) -> StoreResult<()> {
        self.ensure_writable()?;
        let job_id = edges.task.job_id.into_inner();
        let task_id = task_id_column(edges.task.task_id)?;
        let exists = task_data::table
            .find((job_id, task_id))
            .count()
            .get_result::<i64>(self.conn)
            .map_err(store_error)?;
        if exists == 0 {
            return Err(StoreError::MissingRow(format!("task {}", edges.task)));
        }
        diesel::delete(
            task_data_edge::table
                .filter(task_data_edge::job_id.eq(job_id))
                .filter(task_data_edge::task_id.eq(task_id)),
        )
        .execute(self.conn)
        .map_err(store_error)?;
        let rows = edge_rows(edges)?;
        if !rows.is_empty() {
            diesel::insert_into(task_data_edge::table)
                .values(&rows)
                .execute(self.conn)
                .map_err(store_error)?;
        }
        Ok(())
    }

    fn load_tasks(&mut self, job_ids: &[JobId], detail: TaskDetail) -> StoreResult<Vec<TaskRecord>> {
        let rows = task_data::table
            .filter(task_data::job_id.eq_any(raw_job_ids(job_ids)))
            .order((task_data::job_id.asc(), task_data::task_id.asc()))
            .select(TaskRow::as_select())
            .load::<TaskRow>(self.conn)
            .map_err(store_error)?;
        self.assemble_tasks(rows, detail)
    }

    fn find_task(&mut self, key: TaskKey, detail: TaskDetail) -> StoreResult<Option<TaskRecord>> {
        let row = task_data::table
            .find((key.job_id.into_inner(), task_id_column(key.task_id)?))
            .select(TaskRow::as_select())
            .first::<TaskRow>(self.conn)
            .optional()
            .map_err(store_error)?;
        let Some(found) = row else {
            return Ok(None);
        };
        Ok(self.assemble_tasks(vec![found], detail)?.pop())
    }

    fn find_task_key_by_name(
        &mut self,
        job_id: JobId,
        name: &str,
    ) -> StoreResult<Option<TaskKey>> {
        let task_id = task_data::table
            .filter(task_data::job_id.eq(job_id.into_inner()))
            .filter(task_data::name.eq(name))
            .order(task_data::task_id.asc())
            .select(task_data::task_id)
            .first::<i32>(self.conn)
            .optional()
            .map_err(store_error)?;
        task_id
            .map(|id| task_key(job_id.into_inner(), id))
            .transpose()
    }

    fn find_tasks(&mut self, query: &TaskQuery) -> StoreResult<Vec<TaskRecord>> {
        let mut select = filtered_tasks(query)
            .order((task_data::job_id.asc(), task_data::task_id.asc()))
            .offset(sql_offset(query.offset));
        if let Some(limit) = query.limit {
            select = select.limit(sql_offset(limit));
        }
        let rows = select
            .select(TaskRow::as_select())
            .load::<TaskRow>(self.conn)
            .map_err(store_error)?;
        self.assemble_tasks(rows, TaskDetail::Light)
    }

    fn count_tasks(&mut self, query: &TaskQuery) -> StoreResult<u64> {
        filtered_tasks(query)
            .count()
            .get_result::<i64>(self.conn)
            .map(row_count)
            .map_err(store_error)
    }

    fn update_task_state(&mut self, state: &TaskStateRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        let key = (state.key.job_id.into_inner(), task_id_column(state.key.task_id)?);
        let affected = diesel::update(task_data::table.find(key))
            .set((
                task_data::status.eq(state.status.as_str()),
                task_data::start_time.eq(state.start_time),
                task_data::finished_time.eq(state.finished_time),
                task_data::scheduled_time.eq(state.scheduled_time),
                task_data::in_error_time.eq(state.in_error_time),
                task_data::execution_duration.eq(state.execution_duration),
                task_data::execution_host_name.eq(state.execution_host_name.as_deref()),
                task_data::number_of_execution_left.eq(to_int(
                    state.number_of_execution_left,
                    "number_of_execution_left",
                )?),
                task_data::number_of_execution_on_failure_left.eq(to_int(
                    state.number_of_execution_on_failure_left,
                    "number_of_execution_on_failure_left",
                )?),
                task_data::iteration.eq(to_int(state.iteration, "iteration")?),
                task_data::replication.eq(to_int(state.replication, "replication")?),
                task_data::task_launcher_node_url.eq(state.task_launcher_node_url.as_deref()),
            ))
            .execute(self.conn)
            .map_err(store_error)?;
        Self::update_exactly_one(affected, || format!("task {}", state.key))
    }

    fn insert_task_result(&mut self, result: &TaskResultRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        let row = new_result_row(result)?;
        diesel::insert_into(task_result_data::table)
            .values(&row)
            .execute(self.conn)
            .map_err(|err| match store_error(err) {
                StoreError::MissingRow(_) => StoreError::MissingRow(format!("task {}", result.task)),
                other => other,
            })?;
        Ok(())
    }

    fn load_task_results(
        &mut self,
        task: TaskKey,
        page: ResultPage,
    ) -> StoreResult<Vec<TaskResultRecord>> {
        let mut select = task_result_data::table
            .filter(task_result_data::job_id.eq(task.job_id.into_inner()))
            .filter(task_result_data::task_id.eq(task_id_column(task.task_id)?))
            .into_boxed();
        select = match page.order {
            ResultOrder::NewestFirst => select.order((
                task_result_data::result_time.desc(),
                task_result_data::id.desc(),
            )),
            ResultOrder::OldestFirst => select.order((
                task_result_data::result_time.asc(),
                task_result_data::id.asc(),
            )),
        };
        select = select.offset(sql_offset(page.offset));
        if let Some(limit) = page.limit {
            select = select.limit(sql_offset(limit));
        }
        select
            .select(TaskResultRow::as_select())
            .load::<TaskResultRow>(self.conn)
            .map_err(store_error)?
            .into_iter()
            .map(result_record)
            .collect()
    }

    fn load_latest_task_results(
        &mut self,
        tasks: &[TaskKey],
    ) -> StoreResult<Vec<TaskResultRecord>> {
        let mut latest = Vec::with_capacity(tasks.len());
        for task in tasks {
            latest.extend(self.load_task_results(*task, ResultPage::nth_latest(0))?);
        }
        Ok(latest)
    }

    fn put_credential(&mut self, credential: &ThirdPartyCredentialRecord) -> StoreResult<()> {
        self.ensure_writable()?;
        let row = credential_row(credential);
        diesel::insert_into(third_party_credential::table)
            .values(&row)
            .on_conflict((
                third_party_credential::username,
                third_party_credential::credential_key,
            ))
            .do_update()
            .set((
                third_party_credential::encrypted_symmetric_key
                    .eq(excluded(third_party_credential::encrypted_symmetric_key)),
                third_party_credential::encrypted_value
                    .eq(excluded(third_party_credential::encrypted_value)),
            ))
            .execute(self.conn)
            .map_err(store_error)?;
        Ok(())
    }

    fn remove_credential(&mut self, username: &str, key: &str) -> StoreResult<()> {
        self.ensure_writable()?;
        diesel::delete(third_party_credential::table.find((username, key)))
            .execute(self.conn)
            .map_err(store_error)?;
        Ok(())
    }

    fn load_credentials(&mut self, username: &str) -> StoreResult<Vec<ThirdPartyCredentialRecord>> {
        let rows = third_party_credential::table
            .filter(third_party_credential::username.eq(username))
            .order(third_party_credential::credential_key.asc())
            .select(CredentialRow::as_select())
            .load::<CredentialRow>(self.conn)
            .map_err(store_error)?;
        Ok(rows.into_iter().map(credential_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ports::JobSort;
    use rstest::rstest;

    fn key(id: i64, priority: JobPriority, submitted_time: i64) -> JobSortKey {
        JobSortKey {
            id,
            name: format!("job-{id}"),
            owner: "alice".to_owned(),
            priority,
            submitted_time,
        }
    }

    #[rstest]
    #[case(false, vec![3, 1, 2])]
    #[case(true, vec![2, 1, 3])]
    fn priority_sort_follows_rank(#[case] descending: bool, #[case] expected: Vec<i64>) {
        let query = JobQuery {
            sort: vec![JobSort {
                field: JobSortField::Priority,
                descending,
            }],
            ..JobQuery::default()
        };
        let mut keys = vec![
            key(1, JobPriority::Normal, 10),
            key(2, JobPriority::Highest, 20),
            key(3, JobPriority::Idle, 30),
        ];
        keys.sort_by(|left, right| compare_keys(&query, left, right));
        let ids: Vec<i64> = keys.iter().map(|sorted| sorted.id).collect();
        assert_eq!(ids, expected);
    }

    #[rstest]
    fn unsorted_listing_falls_back_to_identifier_order() {
        let query = JobQuery::default();
        let mut keys = vec![key(9, JobPriority::Normal, 1), key(4, JobPriority::Normal, 2)];
        keys.sort_by(|left, right| compare_keys(&query, left, right));
        assert_eq!(keys.first().map(|first| first.id), Some(4));
    }
}
