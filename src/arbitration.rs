//! Application arbitration: workers apply, the poster rejects or, once the
//! job is done, rates the accepted worker.

use chrono::Utc;
use rusqlite::{params, TransactionBehavior};

use crate::db::{
    fetch_accepted_application, fetch_application, fetch_job, fetch_review, fetch_user, Database,
};
use crate::error::{MarketError, Result};
use crate::lifecycle::{require_poster, require_status};
use crate::models::{Application, ApplicationStatus, JobStatus, Review};

impl Database {
    /// Apply to an open job. One application per (job, worker); posters
    /// cannot apply to their own listing.
    pub fn apply_to_job(&mut self, job_id: i64, worker_id: i64) -> Result<Application> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = fetch_job(&tx, job_id)?;
        fetch_user(&tx, worker_id)?;

        if job.poster_id == worker_id {
            return Err(MarketError::OwnJob);
        }
        if job.status != JobStatus::Open {
            return Err(MarketError::JobNotOpen);
        }

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM applications WHERE job_id = ?1 AND worker_id = ?2",
            params![job_id, worker_id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(MarketError::AlreadyApplied);
        }

        tx.execute(
            "INSERT INTO applications (job_id, worker_id, date_applied) VALUES (?1, ?2, ?3)",
            params![job_id, worker_id, Utc::now().to_rfc3339()],
        )?;

        let application = fetch_application(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(application)
    }

    /// Reject a single application. The job's own status is untouched.
    pub fn reject_application(
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

        tx.execute(
            "UPDATE applications SET status = ?1 WHERE id = ?2",
            params![ApplicationStatus::Rejected, application_id],
        )?;

        let rejected = fetch_application(&tx, application_id)?;
        tx.commit()?;
        Ok(rejected)
    }

    /// Rate the accepted worker of a completed job.
    pub fn rate_job(
        &mut self,
        job_id: i64,
        rater_id: i64,
        rating: u8,
        comment: Option<&str>,
    ) -> Result<Review> {
        if !(1..=5).contains(&rating) {
            return Err(MarketError::RatingOutOfRange(rating));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = fetch_job(&tx, job_id)?;
        fetch_user(&tx, rater_id)?;
        require_status(&job, JobStatus::Completed)?;

        let accepted =
            fetch_accepted_application(&tx, job_id)?.ok_or(MarketError::NoAcceptedApplicant)?;

        tx.execute(
            "INSERT INTO reviews (job_id, reviewer_id, reviewee_id, rating, comment, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job_id,
                rater_id,
                accepted.worker_id,
                rating,
                comment,
                Utc::now().to_rfc3339()
            ],
        )?;
        let review = fetch_review(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, NewJob, NewUser};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn add_user(db: &Database, name: &str) -> i64 {
        db.create_user(&NewUser {
            email: format!("{name}@example.com"),
            username: name.to_string(),
            ..Default::default()
        })
        .unwrap()
        .id
    }

    fn post_job(db: &Database, poster_id: i64) -> Job {
        db.create_job(
            poster_id,
            &NewJob {
                title: "Prune the orchard".to_string(),
                description: "A dozen apple trees".to_string(),
                profession: "Gardener".to_string(),
                location: "Fes".to_string(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn apply_creates_pending_application() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let worker = add_user(&db, "worker");
        let job = post_job(&db, poster);

        let app = db.apply_to_job(job.id, worker).unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert_eq!(app.job_id, job.id);
        assert_eq!(app.worker_username, "worker");
    }

    #[test]
    fn cannot_apply_twice() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let worker = add_user(&db, "worker");
        let job = post_job(&db, poster);

        db.apply_to_job(job.id, worker).unwrap();
        assert!(matches!(
            db.apply_to_job(job.id, worker),
            Err(MarketError::AlreadyApplied)
        ));
        assert_eq!(db.list_applications_for_job(job.id).unwrap().len(), 1);
    }

    #[test]
    fn cannot_apply_to_own_job() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let job = post_job(&db, poster);

        assert!(matches!(
            db.apply_to_job(job.id, poster),
            Err(MarketError::OwnJob)
        ));
    }

    #[test]
    fn cannot_apply_once_job_left_open() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let w1 = add_user(&db, "w1");
        let w2 = add_user(&db, "w2");
        let job = post_job(&db, poster);

        let a1 = db.apply_to_job(job.id, w1).unwrap();
        db.accept_application(job.id, a1.id, poster).unwrap();

        assert!(matches!(
            db.apply_to_job(job.id, w2),
            Err(MarketError::JobNotOpen)
        ));
    }

    #[test]
    fn reject_leaves_job_status_alone() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let worker = add_user(&db, "worker");
        let job = post_job(&db, poster);
        let app = db.apply_to_job(job.id, worker).unwrap();

        let rejected = db.reject_application(job.id, app.id, poster).unwrap();
        assert_eq!(rejected.status, ApplicationStatus::Rejected);

        let job = db.get_job(job.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Open);
    }

    #[test]
    fn reject_requires_poster_and_matching_job() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let worker = add_user(&db, "worker");
        let stranger = add_user(&db, "stranger");
        let job = post_job(&db, poster);
        let other_job = post_job(&db, poster);
        let app = db.apply_to_job(job.id, worker).unwrap();

        assert!(matches!(
            db.reject_application(job.id, app.id, stranger),
            Err(MarketError::NotAuthorized)
        ));
        assert!(matches!(
            db.reject_application(other_job.id, app.id, poster),
            Err(MarketError::MismatchedJob)
        ));

        let app = db.get_application(app.id).unwrap().unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);
    }

    #[test]
    fn rate_only_after_completion() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let worker = add_user(&db, "worker");
        let job = post_job(&db, poster);
        let app = db.apply_to_job(job.id, worker).unwrap();

        assert!(matches!(
            db.rate_job(job.id, poster, 4, None),
            Err(MarketError::InvalidTransition(_))
        ));

        db.accept_application(job.id, app.id, poster).unwrap();
        db.finish_job(job.id, poster).unwrap();

        let review = db.rate_job(job.id, poster, 4, Some("Solid work")).unwrap();
        assert_eq!(review.reviewee_id, worker);
        assert_eq!(review.reviewer_id, poster);
        assert_eq!(review.rating, 4);
        assert_eq!(review.comment.as_deref(), Some("Solid work"));
    }

    #[test]
    fn rate_fails_without_accepted_applicant() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let worker = add_user(&db, "worker");
        let job = post_job(&db, poster);
        let app = db.apply_to_job(job.id, worker).unwrap();
        db.accept_application(job.id, app.id, poster).unwrap();
        db.finish_job(job.id, poster).unwrap();
        // The poster rejected the winner after the fact.
        db.reject_application(job.id, app.id, poster).unwrap();

        assert!(matches!(
            db.rate_job(job.id, poster, 3, None),
            Err(MarketError::NoAcceptedApplicant)
        ));
    }

    #[test]
    fn rating_is_bounded() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let worker = add_user(&db, "worker");
        let job = post_job(&db, poster);
        let app = db.apply_to_job(job.id, worker).unwrap();
        db.accept_application(job.id, app.id, poster).unwrap();
        db.finish_job(job.id, poster).unwrap();

        assert!(matches!(
            db.rate_job(job.id, poster, 0, None),
            Err(MarketError::RatingOutOfRange(0))
        ));
        assert!(matches!(
            db.rate_job(job.id, poster, 6, None),
            Err(MarketError::RatingOutOfRange(6))
        ));
        assert!(db.rate_job(job.id, poster, 1, None).is_ok());
    }

    #[test]
    fn average_rating_reflects_reviews() {
        let mut db = test_db();
        let poster = add_user(&db, "poster");
        let worker = add_user(&db, "worker");

        assert_eq!(db.average_rating(worker).unwrap(), None);

        for rating in [5, 3] {
            let job = post_job(&db, poster);
            let app = db.apply_to_job(job.id, worker).unwrap();
            db.accept_application(job.id, app.id, poster).unwrap();
            db.finish_job(job.id, poster).unwrap();
            db.rate_job(job.id, poster, rating, None).unwrap();
        }

        assert_eq!(db.average_rating(worker).unwrap(), Some(4.0));
        assert_eq!(db.reviews_for_user(worker).unwrap().len(), 2);
    }
}
