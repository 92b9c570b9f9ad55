use std::path::PathBuf;

use rusqlite::{params, params_from_iter, Connection};

use crate::error::{MarketError, Result};
use crate::models::{Application, ApplicationStatus, Job, JobStatus, NewUser, Review, User};

pub struct Database {
    pub(crate) conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open() -> Result<Self> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open_at(path)
    }

    pub fn open_at(path: PathBuf) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn, path })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "khidma") {
            proj_dirs.data_dir().join("khidma.db")
        } else {
            PathBuf::from("khidma.db")
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE,
                first_name TEXT,
                last_name TEXT,
                location TEXT,
                profession TEXT,
                about_me TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                poster_id INTEGER NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                profession TEXT NOT NULL,
                location TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'in_progress', 'completed', 'canceled')),
                budget REAL,
                expected_duration TEXT,
                required_skills TEXT,
                date_posted TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id),
                worker_id INTEGER NOT NULL REFERENCES users(id),
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'accepted', 'rejected')),
                date_applied TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (job_id, worker_id)
            );

            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id),
                reviewer_id INTEGER NOT NULL REFERENCES users(id),
                reviewee_id INTEGER NOT NULL REFERENCES users(id),
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment TEXT,
                date TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_poster ON jobs(poster_id);
            CREATE INDEX IF NOT EXISTS idx_applications_job ON applications(job_id);
            CREATE INDEX IF NOT EXISTS idx_applications_worker ON applications(worker_id);
            CREATE INDEX IF NOT EXISTS idx_reviews_reviewee ON reviews(reviewee_id);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(MarketError::NotInitialized);
        }
        Ok(())
    }

    // --- User operations ---

    pub fn create_user(&self, new: &NewUser) -> Result<User> {
        self.conn.execute(
            "INSERT INTO users (email, username, first_name, last_name, location, profession, about_me)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.email,
                new.username,
                new.first_name,
                new.last_name,
                new.location,
                new.profession,
                new.about_me
            ],
        )?;
        fetch_user(&self.conn, self.conn.last_insert_rowid())
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        optional(fetch_user(&self.conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let result = self.conn.query_row(
            &format!("{USER_SELECT} WHERE LOWER(username) = LOWER(?1)"),
            [username],
            row_to_user,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a CLI-style user reference: a numeric id, or a username.
    pub fn resolve_user(&self, name_or_id: &str) -> Result<User> {
        let user = if let Ok(id) = name_or_id.parse::<i64>() {
            self.get_user(id)?
        } else {
            self.get_user_by_username(name_or_id)?
        };
        user.ok_or_else(|| MarketError::UserNotFound(name_or_id.to_string()))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT} ORDER BY username"))?;
        let rows = stmt.query_map([], row_to_user)?;
        collect(rows)
    }

    pub fn search_workers(
        &self,
        location: Option<&str>,
        profession: Option<&str>,
    ) -> Result<Vec<User>> {
        let mut sql = format!("{USER_SELECT} WHERE 1=1");
        let mut params: Vec<String> = vec![];

        if let Some(loc) = location {
            sql.push_str(&format!(" AND location = ?{}", params.len() + 1));
            params.push(loc.to_string());
        }
        if let Some(prof) = profession {
            sql.push_str(&format!(" AND profession = ?{}", params.len() + 1));
            params.push(prof.to_string());
        }
        sql.push_str(" ORDER BY username");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), row_to_user)?;
        collect(rows)
    }

    // --- Job queries ---

    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        optional(fetch_job(&self.conn, id))
    }

    pub fn list_open_jobs(
        &self,
        location: Option<&str>,
        profession: Option<&str>,
    ) -> Result<Vec<Job>> {
        let mut sql = format!("{JOB_SELECT} WHERE j.status = 'open'");
        let mut params: Vec<String> = vec![];

        if let Some(loc) = location {
            sql.push_str(&format!(" AND j.location = ?{}", params.len() + 1));
            params.push(loc.to_string());
        }
        if let Some(prof) = profession {
            sql.push_str(&format!(" AND j.profession = ?{}", params.len() + 1));
            params.push(prof.to_string());
        }
        sql.push_str(" ORDER BY j.date_posted DESC, j.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), row_to_job)?;
        collect(rows)
    }

    pub fn list_jobs_by_poster(&self, poster_id: i64) -> Result<Vec<Job>> {
        let mut stmt = self.conn.prepare(&format!(
            "{JOB_SELECT} WHERE j.poster_id = ?1 ORDER BY j.date_posted DESC, j.id DESC"
        ))?;
        let rows = stmt.query_map([poster_id], row_to_job)?;
        collect(rows)
    }

    // --- Application queries ---

    pub fn get_application(&self, id: i64) -> Result<Option<Application>> {
        optional(fetch_application(&self.conn, id))
    }

    pub fn list_applications_for_job(&self, job_id: i64) -> Result<Vec<Application>> {
        let mut stmt = self.conn.prepare(&format!(
            "{APPLICATION_SELECT} WHERE a.job_id = ?1 ORDER BY a.date_applied DESC, a.id DESC"
        ))?;
        let rows = stmt.query_map([job_id], row_to_application)?;
        collect(rows)
    }

    pub fn list_applications_for_worker(&self, worker_id: i64) -> Result<Vec<Application>> {
        let mut stmt = self.conn.prepare(&format!(
            "{APPLICATION_SELECT} WHERE a.worker_id = ?1 ORDER BY a.date_applied DESC, a.id DESC"
        ))?;
        let rows = stmt.query_map([worker_id], row_to_application)?;
        collect(rows)
    }

    pub fn accepted_application(&self, job_id: i64) -> Result<Option<Application>> {
        fetch_accepted_application(&self.conn, job_id)
    }

    // --- Review queries ---

    pub fn reviews_for_user(&self, user_id: i64) -> Result<Vec<Review>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVIEW_SELECT} WHERE reviewee_id = ?1 ORDER BY date DESC, id DESC"
        ))?;
        let rows = stmt.query_map([user_id], row_to_review)?;
        collect(rows)
    }

    pub fn reviews_for_job(&self, job_id: i64) -> Result<Vec<Review>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{REVIEW_SELECT} WHERE job_id = ?1 ORDER BY id"))?;
        let rows = stmt.query_map([job_id], row_to_review)?;
        collect(rows)
    }

    pub fn average_rating(&self, user_id: i64) -> Result<Option<f64>> {
        let avg: Option<f64> = self.conn.query_row(
            "SELECT AVG(rating) FROM reviews WHERE reviewee_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(avg)
    }
}

// --- Row fetchers shared with the transactional operations ---

const USER_SELECT: &str = "SELECT id, email, username, first_name, last_name, location, \
     profession, about_me, created_at FROM users";

const JOB_SELECT: &str = "SELECT j.id, j.poster_id, u.username, j.title, j.description, \
     j.profession, j.location, j.status, j.budget, j.expected_duration, j.required_skills, \
     j.date_posted FROM jobs j JOIN users u ON j.poster_id = u.id";

const APPLICATION_SELECT: &str = "SELECT a.id, a.job_id, j.title, a.worker_id, u.username, \
     a.status, a.date_applied FROM applications a \
     JOIN jobs j ON a.job_id = j.id JOIN users u ON a.worker_id = u.id";

const REVIEW_SELECT: &str =
    "SELECT id, job_id, reviewer_id, reviewee_id, rating, comment, date FROM reviews";

pub(crate) fn fetch_user(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(&format!("{USER_SELECT} WHERE id = ?1"), [id], row_to_user)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => MarketError::UserNotFound(id.to_string()),
            other => other.into(),
        })
}

pub(crate) fn fetch_job(conn: &Connection, id: i64) -> Result<Job> {
    conn.query_row(&format!("{JOB_SELECT} WHERE j.id = ?1"), [id], row_to_job)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => MarketError::JobNotFound(id),
            other => other.into(),
        })
}

pub(crate) fn fetch_application(conn: &Connection, id: i64) -> Result<Application> {
    conn.query_row(
        &format!("{APPLICATION_SELECT} WHERE a.id = ?1"),
        [id],
        row_to_application,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => MarketError::ApplicationNotFound(id),
        other => other.into(),
    })
}

pub(crate) fn fetch_review(conn: &Connection, id: i64) -> Result<Review> {
    conn.query_row(&format!("{REVIEW_SELECT} WHERE id = ?1"), [id], row_to_review)
        .map_err(Into::into)
}

pub(crate) fn fetch_accepted_application(
    conn: &Connection,
    job_id: i64,
) -> Result<Option<Application>> {
    let result = conn.query_row(
        &format!("{APPLICATION_SELECT} WHERE a.job_id = ?1 AND a.status = ?2"),
        params![job_id, ApplicationStatus::Accepted],
        row_to_application,
    );
    match result {
        Ok(app) => Ok(Some(app)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        location: row.get(5)?,
        profession: row.get(6)?,
        about_me: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        poster_id: row.get(1)?,
        poster_username: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        profession: row.get(5)?,
        location: row.get(6)?,
        status: row.get::<_, JobStatus>(7)?,
        budget: row.get(8)?,
        expected_duration: row.get(9)?,
        required_skills: row.get(10)?,
        date_posted: row.get(11)?,
    })
}

fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        job_id: row.get(1)?,
        job_title: row.get(2)?,
        worker_id: row.get(3)?,
        worker_username: row.get(4)?,
        status: row.get::<_, ApplicationStatus>(5)?,
        date_applied: row.get(6)?,
    })
}

fn row_to_review(row: &rusqlite::Row) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        job_id: row.get(1)?,
        reviewer_id: row.get(2)?,
        reviewee_id: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        date: row.get(6)?,
    })
}

fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(MarketError::UserNotFound(_))
        | Err(MarketError::JobNotFound(_))
        | Err(MarketError::ApplicationNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn collect<T>(
    rows: impl Iterator<Item = std::result::Result<T, rusqlite::Error>>,
) -> Result<Vec<T>> {
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewJob;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn add_user(db: &Database, name: &str, location: &str, profession: &str) -> User {
        db.create_user(&NewUser {
            email: format!("{name}@example.com"),
            username: name.to_string(),
            location: Some(location.to_string()),
            profession: Some(profession.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn create_and_resolve_user() {
        let db = test_db();
        let user = add_user(&db, "yassine", "Rabat", "Plumber");

        let by_id = db.resolve_user(&user.id.to_string()).unwrap();
        assert_eq!(by_id.username, "yassine");

        let by_name = db.resolve_user("Yassine").unwrap();
        assert_eq!(by_name.id, user.id);

        assert!(matches!(
            db.resolve_user("nobody"),
            Err(MarketError::UserNotFound(_))
        ));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = test_db();
        add_user(&db, "amine", "Fes", "Barber");
        let dup = db.create_user(&NewUser {
            email: "other@example.com".to_string(),
            username: "amine".to_string(),
            ..Default::default()
        });
        assert!(matches!(dup, Err(MarketError::Storage(_))));
    }

    #[test]
    fn ensure_initialized_requires_schema() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.ensure_initialized(),
            Err(MarketError::NotInitialized)
        ));
        db.init().unwrap();
        db.ensure_initialized().unwrap();
    }

    #[test]
    fn open_jobs_filters_by_location_and_profession() {
        let db = test_db();
        let poster = add_user(&db, "poster", "Casablanca", "Electrician");
        for (title, location, profession) in [
            ("Rewire kitchen", "Casablanca", "Electrician"),
            ("Fix leak", "Casablanca", "Plumber"),
            ("Paint fence", "Rabat", "Painter"),
        ] {
            db.create_job(
                poster.id,
                &NewJob {
                    title: title.to_string(),
                    description: "details".to_string(),
                    profession: profession.to_string(),
                    location: location.to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        assert_eq!(db.list_open_jobs(None, None).unwrap().len(), 3);
        assert_eq!(
            db.list_open_jobs(Some("Casablanca"), None).unwrap().len(),
            2
        );
        let filtered = db
            .list_open_jobs(Some("Casablanca"), Some("Plumber"))
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Fix leak");
    }

    #[test]
    fn search_workers_matches_both_filters() {
        let db = test_db();
        add_user(&db, "w1", "Tangier", "Gardener");
        add_user(&db, "w2", "Tangier", "Painter");
        add_user(&db, "w3", "Safi", "Gardener");

        let both = db
            .search_workers(Some("Tangier"), Some("Gardener"))
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].username, "w1");

        assert_eq!(db.search_workers(Some("Tangier"), None).unwrap().len(), 2);
        assert_eq!(db.search_workers(None, None).unwrap().len(), 3);
    }

    #[test]
    fn database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("khidma.db");
        {
            let db = Database::open_at(path.clone()).unwrap();
            db.init().unwrap();
            add_user(&db, "persisted", "Oujda", "Driver");
        }
        let db = Database::open_at(path).unwrap();
        let user = db.resolve_user("persisted").unwrap();
        assert_eq!(user.location.as_deref(), Some("Oujda"));
    }
}
