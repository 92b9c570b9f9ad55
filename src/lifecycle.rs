//! Job lifecycle operations: post, accept, finish, cancel, delete.
//!
//! Every mutating operation takes the acting user's id explicitly and runs
//! inside a single IMMEDIATE transaction, so the accept/reject
//! read-modify-write cannot interleave with a concurrent writer.

use rusqlite::{params, TransactionBehavior};

use crate::db::{fetch_application, fetch_job, Database};
use crate::error::{MarketError, Result};
use crate::models::{Application, ApplicationStatus, Job, JobStatus, NewJob};

impl Database {
    /// Post a new job. It starts out open for applications.
    pub fn create_job(&self, poster_id: i64, new: &NewJob) -> Result<Job> {
        self.conn.execute(
            "INSERT INTO jobs (poster_id, title, description, profession, location,
                               budget, expected_duration, required_skills)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                poster_id,
                new.title,
                new.description,
                new.profession,
                new.location,
                new.budget,
                new.expected_duration,
                new.required_skills
            ],
        )?;
        fetch_job(&self.conn, self.conn.last_insert_rowid())
    }

    /// Accept one application: the application becomes accepted, the job
    /// moves to in_progress, and every sibling application is rejected in
    /// the same transaction. While the job is in_progress the poster may
    /// re-arbitrate: accepting a different application demotes the previous
    /// winner through the same cascade.
    pub fn accept_application(
        &mut self,
        job_id: i64,
        application_id: i64,
        actor_id: i64,
    ) -> Result<Application> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = fetch_job(&tx, job_id)?;
        let application = fetch_application(&tx, application_id)?;

        require_poster(&job, actor_id)?;
        if application.job_id != job_id {
            return Err(MarketError::MismatchedJob);
        }
        if application.status == ApplicationStatus::Accepted {
            return Err(MarketError::InvalidTransition(
                "this application has already been accepted".to_string(),
            ));
        }
        // Completed and canceled jobs cannot move back to in_progress.
        if matches!(job.status, JobStatus::Completed | JobStatus::Canceled) {
            return Err(MarketError::InvalidTransition(format!(
                "job is {}, arbitration is closed",
                job.status
            )));
        }

        tx.execute(
            "UPDATE applications SET status = ?1 WHERE id = ?2",
            params![ApplicationStatus::Accepted, application_id],
        )?;
        tx.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2",
            params![JobStatus::InProgress, job_id],
        )?;
        tx.execute(
            "UPDATE applications SET status = ?1 WHERE job_id = ?2 AND id != ?3",
            params![ApplicationStatus::Rejected, job_id, application_id],
        )?;

        let accepted = fetch_application(&tx, application_id)?;
        tx.commit()?;
        Ok(accepted)
    }

    /// Mark an in_progress job as completed.
    pub fn finish_job(&mut self, job_id: i64, actor_id: i64) -> Result<Job> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = fetch_job(&tx, job_id)?;
        require_poster(&job, actor_id)?;
        require_status(&job, JobStatus::InProgress)?;

        tx.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2",
            params![JobStatus::Completed, job_id],
        )?;

        let finished = fetch_job(&tx, job_id)?;
        tx.commit()?;
        Ok(finished)
    }

    /// Cancel a job that never got under way. Legal from open only; any
    /// pending applications are rejected alongside.
    pub fn cancel_job(&mut self, job_id: i64, actor_id: i64) -> Result<Job> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = fetch_job(&tx, job_id)?;
        require_poster(&job, actor_id)?;
        require_status(&job, JobStatus::Open)?;

        tx.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2",
            params![JobStatus::Canceled, job_id],
        )?;
        tx.execute(
            "UPDATE applications SET status = ?1 WHERE job_id = ?2 AND status = ?3",
            params![
                ApplicationStatus::Rejected,
                job_id,
                ApplicationStatus::Pending
            ],
        )?;

        let canceled = fetch_job(&tx, job_id)?;
        tx.commit()?;
        Ok(canceled)
    }

    /// Delete a job along with its reviews and applications. Children go
    /// first so the foreign keys hold at every point; one transaction, so
    /// either everything is gone or nothing is.
    pub fn delete_job(&mut self, job_id: i64, actor_id: i64) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = fetch_job(&tx, job_id)?;
        require_poster(&job, actor_id)?;

        tx.execute("DELETE FROM reviews WHERE job_id = ?1", [job_id])?;
        tx.execute("DELETE FROM applications WHERE job_id = ?1", [job_id])?;
        tx.execute("DELETE FROM jobs WHERE id = ?1", [job_id])?;

        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn require_poster(job: &Job, actor_id: i64) -> Result<()> {
    if job.poster_id != actor_id {
        return Err(MarketError::NotAuthorized);
    }
    Ok(())
}

pub(crate) fn require_status(job: &Job, required: JobStatus) -> Result<()> {
    if job.status != required {
        return Err(MarketError::InvalidTransition(format!(
            "job is {}, this operation requires {}",
            job.status, required
        )));
    }
    Ok(())
}
