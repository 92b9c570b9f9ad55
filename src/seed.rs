//! Deterministic demo data for a fresh database: a handful of users, a few
//! open jobs, and one job taken through its whole lifecycle.

use crate::db::Database;
use crate::error::Result;
use crate::models::{NewJob, NewUser};

pub struct SeedSummary {
    pub users: usize,
    pub jobs: usize,
    pub applications: usize,
    pub reviews: usize,
}

const USERS: &[(&str, &str, &str, &str, &str)] = &[
    ("amina", "Amina", "Bennani", "Casablanca", "Electrician"),
    ("youssef", "Youssef", "El Amrani", "Casablanca", "Plumber"),
    ("fatima", "Fatima", "Zahra", "Rabat", "Cleaner"),
    ("karim", "Karim", "Tazi", "Marrakech", "Painter"),
    ("salma", "Salma", "Idrissi", "Fes", "Tailor"),
    ("omar", "Omar", "Berrada", "Tangier", "Carpenter"),
    ("nadia", "Nadia", "Alaoui", "Agadir", "Gardener"),
    ("hamid", "Hamid", "Chraibi", "Oujda", "Mechanic"),
];

const JOBS: &[(&str, &str, &str, &str, &str, f64)] = &[
    (
        "amina",
        "Fix a leaking bathroom pipe",
        "The pipe under the sink drips steadily. Parts provided.",
        "Plumber",
        "Casablanca",
        250.0,
    ),
    (
        "karim",
        "Repaint two bedrooms",
        "Walls and ceilings, white. Roughly 40 square meters.",
        "Painter",
        "Marrakech",
        1200.0,
    ),
    (
        "fatima",
        "Deep clean after renovation",
        "Three-room apartment, dust everywhere.",
        "Cleaner",
        "Rabat",
        400.0,
    ),
    (
        "omar",
        "Build a bookshelf wall",
        "Floor to ceiling, oak veneer, alcove of 2.4m.",
        "Carpenter",
        "Tangier",
        3000.0,
    ),
];

pub fn run(db: &mut Database) -> Result<SeedSummary> {
    let mut summary = SeedSummary {
        users: 0,
        jobs: 0,
        applications: 0,
        reviews: 0,
    };

    for (username, first, last, location, profession) in USERS {
        db.create_user(&NewUser {
            email: format!("{username}@khidma.example"),
            username: username.to_string(),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            location: Some(location.to_string()),
            profession: Some(profession.to_string()),
            about_me: Some(format!("{profession} based in {location}.")),
        })?;
        summary.users += 1;
    }

    let mut job_ids = Vec::new();
    for (poster, title, description, profession, location, budget) in JOBS {
        let poster = db.resolve_user(poster)?;
        let job = db.create_job(
            poster.id,
            &NewJob {
                title: title.to_string(),
                description: description.to_string(),
                profession: profession.to_string(),
                location: location.to_string(),
                budget: Some(*budget),
                ..Default::default()
            },
        )?;
        job_ids.push(job.id);
        summary.jobs += 1;
    }

    // Two workers compete for the plumbing job.
    let amina = db.resolve_user("amina")?;
    let youssef = db.resolve_user("youssef")?;
    let hamid = db.resolve_user("hamid")?;
    let plumbing = job_ids[0];
    let winner = db.apply_to_job(plumbing, youssef.id)?;
    db.apply_to_job(plumbing, hamid.id)?;
    summary.applications += 2;

    // One job runs all the way through so the demo shows a review.
    db.accept_application(plumbing, winner.id, amina.id)?;
    db.finish_job(plumbing, amina.id)?;
    db.rate_job(
        plumbing,
        amina.id,
        5,
        Some("Fast, tidy, and the leak is gone."),
    )?;
    summary.reviews += 1;

    // A pending application on an open job.
    let nadia = db.resolve_user("nadia")?;
    db.apply_to_job(job_ids[2], nadia.id)?;
    summary.applications += 1;

    Ok(summary)
}
