//! The durable task queue backing `pdp-tasks`: row-level leasing via
//! `SELECT ... FOR UPDATE SKIP LOCKED`, heartbeats, retry-with-backoff, and
//! dead-letter on exhausted retries.

use crate::models::*;
use crate::schema::{dead_letter_tasks, task_history, tasks};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;

pub fn enqueue_task(conn: &mut PgConnection, new: NewTask) -> QueryResult<Task> {
    diesel::insert_into(tasks::table).values(&new).get_result(conn)
}

/// Claims the oldest unleased (or lease-expired) task for `queue_name`,
/// skipping rows another worker already has locked, and stamps it with the
/// new lease. Returns `None` if nothing is claimable.
pub fn lease_next_task(
    conn: &mut PgConnection,
    queue_name: &str,
    session_id: &str,
    lease_duration: Duration,
) -> QueryResult<Option<Task>> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let candidate: Option<Task> = tasks::table
            .filter(tasks::name.eq(queue_name))
            .filter(
                tasks::lease_expires_at
                    .is_null()
                    .or(tasks::lease_expires_at.lt(now)),
            )
            .order(tasks::posted_at.asc())
            .for_update()
            .skip_locked()
            .first(conn)
            .optional()?;

        let Some(task) = candidate else {
            return Ok(None);
        };

        diesel::update(tasks::table.find(task.id))
            .set((
                tasks::leased_by_session.eq(session_id),
                tasks::lease_expires_at.eq(now + lease_duration),
                tasks::update_time.eq(now),
            ))
            .execute(conn)?;

        if task.initiated_at.is_none() {
            diesel::update(tasks::table.find(task.id))
                .set(tasks::initiated_at.eq(now))
                .execute(conn)?;
        }

        tasks::table.find(task.id).first(conn).optional()
    })
}

/// Extends a held lease; fails silently (0 rows) if the session no longer
/// owns it, which the caller should treat as "lease lost, stop working".
pub fn heartbeat_task(
    conn: &mut PgConnection,
    task_id: i64,
    session_id: &str,
    lease_duration: Duration,
) -> QueryResult<usize> {
    let now = Utc::now();
    diesel::update(
        tasks::table
            .filter(tasks::id.eq(task_id))
            .filter(tasks::leased_by_session.eq(session_id)),
    )
    .set((tasks::lease_expires_at.eq(now + lease_duration), tasks::update_time.eq(now)))
    .execute(conn)
}

pub fn complete_task(conn: &mut PgConnection, task_id: i64) -> QueryResult<usize> {
    diesel::delete(tasks::table.find(task_id)).execute(conn)
}

/// The base delay of the retry backoff: doubled per retry, so the Nth
/// retry is held back `5min * 2^N` before `lease_next_task` can claim it
/// again.
const RETRY_BACKOFF_BASE: Duration = Duration::minutes(5);

/// On failure: either re-queues with `retries` incremented, holding the row
/// back behind an exponential-backoff lease so another worker can't pick it
/// straight back up, or, once the retry budget is exhausted, moves the row
/// to `dead_letter_tasks` and removes it from the live queue.
pub fn fail_or_deadletter(
    conn: &mut PgConnection,
    task_id: i64,
    max_retries: i32,
    err: &str,
) -> QueryResult<bool> {
    conn.transaction(|conn| {
        let task: Task = tasks::table.find(task_id).first(conn)?;
        if task.retries + 1 >= max_retries {
            diesel::insert_into(dead_letter_tasks::table)
                .values(NewDeadLetterTask {
                    id: task.id,
                    name: task.name.clone(),
                    payload: task.payload.clone(),
                    retries: task.retries + 1,
                    last_err: Some(err.to_string()),
                })
                .execute(conn)?;
            diesel::delete(tasks::table.find(task_id)).execute(conn)?;
            Ok(true)
        } else {
            let retries = task.retries + 1;
            let backoff = RETRY_BACKOFF_BASE * 2i32.pow(retries.max(0) as u32);
            diesel::update(tasks::table.find(task_id))
                .set((
                    tasks::retries.eq(retries),
                    tasks::leased_by_session.eq(None::<String>),
                    tasks::lease_expires_at.eq(Some(Utc::now() + backoff)),
                    tasks::update_time.eq(Utc::now()),
                ))
                .execute(conn)?;
            Ok(false)
        }
    })
}

pub fn insert_task_history(
    conn: &mut PgConnection,
    new: NewTaskHistory,
) -> QueryResult<TaskHistory> {
    diesel::insert_into(task_history::table)
        .values(&new)
        .get_result(conn)
}

pub fn list_task_history(conn: &mut PgConnection, task_id: i64) -> QueryResult<Vec<TaskHistory>> {
    task_history::table
        .filter(task_history::task_id.eq(task_id))
        .order(task_history::posted.asc())
        .load(conn)
}
