mod arbitration;
mod db;
mod error;
mod lifecycle;
mod models;
mod seed;

use anyhow::Result;
use clap::{Parser, Subcommand};
use db::Database;
use models::{NewJob, NewUser};

#[derive(Parser)]
#[command(name = "khidma")]
#[command(about = "Local-services job marketplace - post jobs, apply, hire, and rate")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Populate the database with demo users and jobs
    Seed,

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Post a new job
    Post {
        /// Poster username or id
        #[arg(short, long)]
        poster: String,

        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: String,

        /// Trade required (e.g. Electrician, Plumber)
        #[arg(long)]
        profession: String,

        #[arg(short, long)]
        location: String,

        /// Budget in dirhams
        #[arg(short, long)]
        budget: Option<f64>,

        /// Expected duration (e.g. "2 days")
        #[arg(long)]
        duration: Option<String>,

        /// Comma-separated required skills
        #[arg(long)]
        skills: Option<String>,
    },

    /// List open jobs
    Jobs {
        /// Filter by location
        #[arg(short, long)]
        location: Option<String>,

        /// Filter by profession
        #[arg(short, long)]
        profession: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a job and its applications
    Show {
        /// Job ID
        job_id: i64,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply to a job
    Apply {
        /// Job ID
        job_id: i64,

        /// Worker username or id
        #[arg(short, long)]
        worker: String,
    },

    /// Accept an application (rejects all others on the job)
    Accept {
        /// Job ID
        job_id: i64,

        /// Application ID
        application_id: i64,

        /// Acting user (must be the poster)
        #[arg(short, long)]
        actor: String,
    },

    /// Reject an application
    Reject {
        /// Job ID
        job_id: i64,

        /// Application ID
        application_id: i64,

        /// Acting user (must be the poster)
        #[arg(short, long)]
        actor: String,
    },

    /// Mark an in-progress job as completed
    Finish {
        /// Job ID
        job_id: i64,

        /// Acting user (must be the poster)
        #[arg(short, long)]
        actor: String,
    },

    /// Cancel an open job
    Cancel {
        /// Job ID
        job_id: i64,

        /// Acting user (must be the poster)
        #[arg(short, long)]
        actor: String,
    },

    /// Rate the accepted worker of a completed job
    Rate {
        /// Job ID
        job_id: i64,

        /// Acting user
        #[arg(short, long)]
        actor: String,

        /// Rating from 1 to 5
        #[arg(short, long)]
        rating: u8,

        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Delete a job and everything attached to it
    Delete {
        /// Job ID
        job_id: i64,

        /// Acting user (must be the poster)
        #[arg(short, long)]
        actor: String,
    },

    /// List a worker's applications
    Applications {
        /// Worker username or id
        worker: String,
    },

    /// Show a user's profile and reviews
    Profile {
        /// Username or id
        user: String,
    },

    /// Search workers by location and profession
    Workers {
        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        profession: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user
    Add {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        username: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        profession: Option<String>,

        #[arg(long)]
        about: Option<String>,
    },

    /// List all users
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut db = Database::open()?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Seed => {
            db.ensure_initialized()?;
            let summary = seed::run(&mut db)?;
            println!(
                "Seeded {} users, {} jobs, {} applications, {} review(s).",
                summary.users, summary.jobs, summary.applications, summary.reviews
            );
        }

        Commands::User { command } => {
            db.ensure_initialized()?;
            match command {
                UserCommands::Add {
                    email,
                    username,
                    first_name,
                    last_name,
                    location,
                    profession,
                    about,
                } => {
                    let user = db.create_user(&NewUser {
                        email,
                        username,
                        first_name,
                        last_name,
                        location,
                        profession,
                        about_me: about,
                    })?;
                    println!("Registered '{}' (ID: {})", user.username, user.id);
                }

                UserCommands::List => {
                    let users = db.list_users()?;
                    if users.is_empty() {
                        println!("No users found.");
                    } else {
                        println!(
                            "{:<6} {:<16} {:<16} {:<16}",
                            "ID", "USERNAME", "LOCATION", "PROFESSION"
                        );
                        println!("{}", "-".repeat(56));
                        for user in users {
                            println!(
                                "{:<6} {:<16} {:<16} {:<16}",
                                user.id,
                                truncate(&user.username, 14),
                                truncate(&user.location.unwrap_or_default(), 14),
                                truncate(&user.profession.unwrap_or_default(), 14)
                            );
                        }
                    }
                }
            }
        }

        Commands::Post {
            poster,
            title,
            description,
            profession,
            location,
            budget,
            duration,
            skills,
        } => {
            db.ensure_initialized()?;
            let poster = db.resolve_user(&poster)?;
            let job = db.create_job(
                poster.id,
                &NewJob {
                    title,
                    description,
                    profession,
                    location,
                    budget,
                    expected_duration: duration,
                    required_skills: skills,
                },
            )?;
            println!("Posted job #{}: {}", job.id, job.title);
        }

        Commands::Jobs {
            location,
            profession,
            json,
        } => {
            db.ensure_initialized()?;
            let jobs = db.list_open_jobs(location.as_deref(), profession.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else if jobs.is_empty() {
                println!("No open jobs found.");
            } else {
                println!(
                    "{:<6} {:<28} {:<14} {:<14} {:<14} {:>10}",
                    "ID", "TITLE", "PROFESSION", "LOCATION", "POSTER", "BUDGET"
                );
                println!("{}", "-".repeat(90));
                for job in jobs {
                    let budget = match job.budget {
                        Some(b) => format!("{b:.0} MAD"),
                        None => "-".to_string(),
                    };
                    println!(
                        "{:<6} {:<28} {:<14} {:<14} {:<14} {:>10}",
                        job.id,
                        truncate(&job.title, 26),
                        truncate(&job.profession, 12),
                        truncate(&job.location, 12),
                        truncate(&job.poster_username, 12),
                        budget
                    );
                }
            }
        }

        Commands::Show { job_id, json } => {
            db.ensure_initialized()?;
            match db.get_job(job_id)? {
                Some(job) => {
                    let applications = db.list_applications_for_job(job_id)?;
                    if json {
                        let detail = serde_json::json!({
                            "job": job,
                            "applications": applications,
                        });
                        println!("{}", serde_json::to_string_pretty(&detail)?);
                    } else {
                        println!("Job #{}", job.id);
                        println!("Title: {}", job.title);
                        println!("Status: {}", job.status);
                        println!("Posted by: {}", job.poster_username);
                        println!("Profession: {}", job.profession);
                        println!("Location: {}", job.location);
                        if let Some(budget) = job.budget {
                            println!("Budget: {budget:.0} MAD");
                        }
                        if let Some(duration) = &job.expected_duration {
                            println!("Expected duration: {duration}");
                        }
                        if let Some(skills) = &job.required_skills {
                            println!("Required skills: {skills}");
                        }
                        println!("Posted: {}", job.date_posted);
                        println!("\n{}", job.description);

                        if applications.is_empty() {
                            println!("\nNo applications yet.");
                        } else {
                            println!("\nApplications ({}):", applications.len());
                            for app in applications {
                                println!(
                                    "  #{} - {} ({}) applied {}",
                                    app.id, app.worker_username, app.status, app.date_applied
                                );
                            }
                        }
                    }
                }
                None => {
                    println!("Job #{job_id} not found.");
                }
            }
        }

        Commands::Apply { job_id, worker } => {
            db.ensure_initialized()?;
            let worker = db.resolve_user(&worker)?;
            let app = db.apply_to_job(job_id, worker.id)?;
            println!(
                "{} applied to job #{} (application #{})",
                app.worker_username, app.job_id, app.id
            );
        }

        Commands::Accept {
            job_id,
            application_id,
            actor,
        } => {
            db.ensure_initialized()?;
            let actor = db.resolve_user(&actor)?;
            let app = db.accept_application(job_id, application_id, actor.id)?;
            println!(
                "Accepted {} for job #{}. All other applications were rejected.",
                app.worker_username, job_id
            );
        }

        Commands::Reject {
            job_id,
            application_id,
            actor,
        } => {
            db.ensure_initialized()?;
            let actor = db.resolve_user(&actor)?;
            let app = db.reject_application(job_id, application_id, actor.id)?;
            println!(
                "Rejected application #{} ({}) on job #{}.",
                app.id, app.worker_username, job_id
            );
        }

        Commands::Finish { job_id, actor } => {
            db.ensure_initialized()?;
            let actor = db.resolve_user(&actor)?;
            let job = db.finish_job(job_id, actor.id)?;
            println!(
                "Job #{} marked as {}. You can now rate the worker.",
                job.id, job.status
            );
        }

        Commands::Cancel { job_id, actor } => {
            db.ensure_initialized()?;
            let actor = db.resolve_user(&actor)?;
            let job = db.cancel_job(job_id, actor.id)?;
            println!("Job #{} canceled.", job.id);
        }

        Commands::Rate {
            job_id,
            actor,
            rating,
            comment,
        } => {
            db.ensure_initialized()?;
            let actor = db.resolve_user(&actor)?;
            let review = db.rate_job(job_id, actor.id, rating, comment.as_deref())?;
            println!(
                "Review #{} recorded: {}/5 for user #{}.",
                review.id, review.rating, review.reviewee_id
            );
        }

        Commands::Delete { job_id, actor } => {
            db.ensure_initialized()?;
            let actor = db.resolve_user(&actor)?;
            db.delete_job(job_id, actor.id)?;
            println!("Job #{job_id} deleted along with its applications and reviews.");
        }

        Commands::Applications { worker } => {
            db.ensure_initialized()?;
            let worker = db.resolve_user(&worker)?;
            let applications = db.list_applications_for_worker(worker.id)?;
            if applications.is_empty() {
                println!("{} has no applications.", worker.username);
            } else {
                println!("{:<6} {:<6} {:<28} {:<10}", "ID", "JOB", "TITLE", "STATUS");
                println!("{}", "-".repeat(52));
                for app in applications {
                    println!(
                        "{:<6} {:<6} {:<28} {:<10}",
                        app.id,
                        app.job_id,
                        truncate(&app.job_title, 26),
                        app.status.to_string()
                    );
                }
            }
        }

        Commands::Profile { user } => {
            db.ensure_initialized()?;
            let user = db.resolve_user(&user)?;
            println!("User #{} - {}", user.id, user.username);
            match (&user.first_name, &user.last_name) {
                (Some(first), Some(last)) => println!("Name: {first} {last}"),
                (Some(first), None) => println!("Name: {first}"),
                _ => {}
            }
            if let Some(location) = &user.location {
                println!("Location: {location}");
            }
            if let Some(profession) = &user.profession {
                println!("Profession: {profession}");
            }
            if let Some(about) = &user.about_me {
                println!("About: {about}");
            }

            match db.average_rating(user.id)? {
                Some(avg) => println!("Average rating: {avg:.1}/5"),
                None => println!("No ratings yet."),
            }

            let reviews = db.reviews_for_user(user.id)?;
            if !reviews.is_empty() {
                println!("\nReviews ({}):", reviews.len());
                for review in reviews {
                    match &review.comment {
                        Some(comment) => {
                            println!("  {}/5 on job #{}: {}", review.rating, review.job_id, comment)
                        }
                        None => println!("  {}/5 on job #{}", review.rating, review.job_id),
                    }
                }
            }

            let posted = db.list_jobs_by_poster(user.id)?;
            if !posted.is_empty() {
                println!("\nPosted jobs ({}):", posted.len());
                for job in posted {
                    println!("  #{} - {} ({})", job.id, job.title, job.status);
                }
            }
        }

        Commands::Workers {
            location,
            profession,
        } => {
            db.ensure_initialized()?;
            let workers = db.search_workers(location.as_deref(), profession.as_deref())?;
            if workers.is_empty() {
                println!("No workers found.");
            } else {
                println!(
                    "{:<6} {:<16} {:<16} {:<16} {:>8}",
                    "ID", "USERNAME", "LOCATION", "PROFESSION", "RATING"
                );
                println!("{}", "-".repeat(66));
                for worker in workers {
                    let rating = match db.average_rating(worker.id)? {
                        Some(avg) => format!("{avg:.1}"),
                        None => "-".to_string(),
                    };
                    println!(
                        "{:<6} {:<16} {:<16} {:<16} {:>8}",
                        worker.id,
                        truncate(&worker.username, 14),
                        truncate(&worker.location.unwrap_or_default(), 14),
                        truncate(&worker.profession.unwrap_or_default(), 14),
                        rating
                    );
                }
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly-ten", 11), "exactly-ten");
    }

    #[test]
    fn truncate_cuts_long_strings_with_ellipsis() {
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn truncate_handles_multibyte_names() {
        // Accented usernames must not split a UTF-8 sequence.
        assert_eq!(truncate("Mélissa-Anaïs Benabdellah", 8), "Mélis...");
        assert_eq!(truncate("Aït Benhaddou travaux électriques", 10), "Aït Ben...");
    }
}
