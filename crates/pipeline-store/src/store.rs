use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use crate::migrations::run_migrations;
use crate::models::{
    ApplicantSnapshot, AvailabilitySnapshot, ChatRole, EducationSnapshot, EmployerSnapshot,
    InternshipSnapshot, MessageRecord, ProfileSnapshot, UserRecord, UserRole,
};
use crate::payload::{CompanyPatch, ListingPatch, ProfilePatch};

/// SQLite-backed persistence for accounts, conversation history, and the
/// domain entities the agent tools mutate.
///
/// Every public method hops to a blocking thread; callers stay on the async
/// runtime. Tool-facing writes each run inside one transaction.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    // ------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------

    pub async fn create_user(&self, email: &str, role: UserRole) -> Result<UserRecord> {
        let db = Arc::clone(&self.db);
        let email = email.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                "INSERT INTO users (email, role, created_at) VALUES (?1, ?2, ?3)",
                params![email, role.as_str(), Utc::now().to_rfc3339()],
            )?;
            let id = conn.last_insert_rowid();
            Ok(UserRecord { id, email, role })
        })
        .await?
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let db = Arc::clone(&self.db);
        let email = email.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let record = conn
                .query_row(
                    "SELECT id, email, role FROM users WHERE email = ?1",
                    params![email],
                    row_to_user,
                )
                .optional()?;
            Ok(record)
        })
        .await?
    }

    // ------------------------------------------------------------
    // Conversation log (append-only)
    // ------------------------------------------------------------

    pub async fn append_message(&self, user_id: i64, role: ChatRole, content: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let content = content.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                "INSERT INTO agent_messages (user_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, role.as_str(), content, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await?
    }

    /// Full ordered transcript for a user. Insertion id breaks timestamp ties
    /// so the order is total.
    pub async fn list_messages(&self, user_id: i64) -> Result<Vec<MessageRecord>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(
                "SELECT role, content, created_at FROM agent_messages WHERE user_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            let mut messages = Vec::new();
            for row in rows {
                let (role, content, created_at) = row?;
                messages.push(MessageRecord {
                    role,
                    content,
                    created_at: parse_ts(&created_at)?,
                });
            }
            Ok(messages)
        })
        .await?
    }

    // ------------------------------------------------------------
    // Intern profiles
    // ------------------------------------------------------------

    pub async fn profile_snapshot(&self, user_id: i64) -> Result<ProfileSnapshot> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let profile_id = get_or_create_profile(&conn, user_id)?;
            read_profile_snapshot(&conn, profile_id)
        })
        .await?
    }

    /// Apply a validated partial profile update in one transaction.
    pub async fn apply_profile_patch(&self, user_id: i64, patch: ProfilePatch) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let mut conn = lock(&db)?;
            let tx = conn.transaction()?;
            let profile_id = get_or_create_profile(&tx, user_id)?;

            let mut sets: Vec<(&str, String)> = Vec::new();
            if let Some(v) = &patch.headline {
                sets.push(("headline", v.clone()));
            }
            if let Some(v) = &patch.bio {
                sets.push(("bio", v.clone()));
            }
            if let Some(v) = &patch.city {
                sets.push(("city", v.clone()));
            }
            if let Some(v) = &patch.state {
                sets.push(("state", v.clone()));
            }
            if let Some(v) = &patch.country {
                sets.push(("country", v.clone()));
            }
            for (column, value) in &sets {
                tx.execute(
                    &format!("UPDATE profiles SET {column} = ?1 WHERE id = ?2"),
                    params![value, profile_id],
                )?;
            }

            if let Some(availability) = &patch.availability {
                tx.execute(
                    r#"
                    INSERT INTO availability (profile_id, status, earliest_start, hours_per_week, remote_ok, onsite_ok)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(profile_id) DO UPDATE SET
                        status = excluded.status,
                        earliest_start = excluded.earliest_start,
                        hours_per_week = excluded.hours_per_week,
                        remote_ok = excluded.remote_ok,
                        onsite_ok = excluded.onsite_ok
                    "#,
                    params![
                        profile_id,
                        availability.status.as_str(),
                        availability.earliest_start.map(|d| d.to_string()),
                        availability.hours_per_week,
                        availability.remote_ok,
                        availability.onsite_ok,
                    ],
                )?;
            }

            if let Some(skills) = &patch.skills {
                tx.execute(
                    "DELETE FROM profile_skills WHERE profile_id = ?1",
                    params![profile_id],
                )?;
                for name in skills {
                    let name = name.trim();
                    if name.is_empty() {
                        continue;
                    }
                    tx.execute(
                        "INSERT INTO skills (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                        params![name],
                    )?;
                    tx.execute(
                        r#"
                        INSERT INTO profile_skills (profile_id, skill_id)
                        SELECT ?1, id FROM skills WHERE name = ?2
                        ON CONFLICT DO NOTHING
                        "#,
                        params![profile_id, name],
                    )?;
                }
            }

            if let Some(educations) = &patch.educations {
                // wipe & recreate, matching the reference serializer
                tx.execute(
                    "DELETE FROM educations WHERE profile_id = ?1",
                    params![profile_id],
                )?;
                for education in educations {
                    tx.execute(
                        r#"
                        INSERT INTO educations
                            (profile_id, institution, degree, field_of_study, start_date, end_date, gpa, description)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        "#,
                        params![
                            profile_id,
                            education.institution,
                            education.degree.clone().unwrap_or_default(),
                            education.field_of_study.clone().unwrap_or_default(),
                            education.start_date.to_string(),
                            education.end_date.map(|d| d.to_string()),
                            education.gpa,
                            education.description.clone().unwrap_or_default(),
                        ],
                    )?;
                }
            }

            tx.execute(
                "UPDATE profiles SET updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), profile_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?
    }

    // ------------------------------------------------------------
    // Employers and listings
    // ------------------------------------------------------------

    pub async fn employer_snapshot(&self, user_id: i64) -> Result<EmployerSnapshot> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let employer_id = get_or_create_employer(&conn, user_id)?;
            read_employer_snapshot(&conn, employer_id)
        })
        .await?
    }

    pub async fn apply_company_patch(&self, user_id: i64, patch: CompanyPatch) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let mut conn = lock(&db)?;
            let tx = conn.transaction()?;
            let employer_id = get_or_create_employer(&tx, user_id)?;
            let mut sets: Vec<(&str, String)> = Vec::new();
            if let Some(v) = &patch.company_name {
                sets.push(("company_name", v.clone()));
            }
            if let Some(v) = &patch.mission {
                sets.push(("mission", v.clone()));
            }
            if let Some(v) = &patch.location {
                sets.push(("location", v.clone()));
            }
            if let Some(v) = &patch.website {
                sets.push(("website", v.clone()));
            }
            for (column, value) in &sets {
                tx.execute(
                    &format!("UPDATE employers SET {column} = ?1 WHERE id = ?2"),
                    params![value, employer_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?
    }

    /// Create a listing (no id) or update one owned by this employer (id
    /// present). Returns `(listing_id, created)`.
    pub async fn upsert_listing(&self, user_id: i64, patch: ListingPatch) -> Result<(i64, bool)> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let mut conn = lock(&db)?;
            let tx = conn.transaction()?;
            let employer_id = get_or_create_employer(&tx, user_id)?;
            let now = Utc::now().to_rfc3339();

            let result = if let Some(listing_id) = patch.id {
                let owned: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM internships WHERE id = ?1 AND employer_id = ?2",
                        params![listing_id, employer_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if owned.is_none() {
                    bail!("No internship found with id {listing_id} for this employer.");
                }
                let mut sets: Vec<(&str, rusqlite::types::Value)> = Vec::new();
                if let Some(v) = &patch.title {
                    sets.push(("title", v.clone().into()));
                }
                if let Some(v) = &patch.description {
                    sets.push(("description", v.clone().into()));
                }
                if let Some(v) = &patch.location {
                    sets.push(("location", v.clone().into()));
                }
                if let Some(v) = patch.is_remote {
                    sets.push(("is_remote", (v as i64).into()));
                }
                if let Some(v) = &patch.requirements {
                    sets.push(("requirements", v.clone().into()));
                }
                for (column, value) in &sets {
                    tx.execute(
                        &format!("UPDATE internships SET {column} = ?1 WHERE id = ?2"),
                        params![value, listing_id],
                    )?;
                }
                tx.execute(
                    "UPDATE internships SET updated_at = ?1 WHERE id = ?2",
                    params![now, listing_id],
                )?;
                (listing_id, false)
            } else {
                patch.validate_create().map_err(|e| anyhow!("{e}"))?;
                tx.execute(
                    r#"
                    INSERT INTO internships
                        (employer_id, title, description, location, is_remote, requirements, posted_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                    "#,
                    params![
                        employer_id,
                        patch.title.clone().unwrap_or_default(),
                        patch.description.clone().unwrap_or_default(),
                        patch.location.clone().unwrap_or_default(),
                        patch.is_remote.unwrap_or(false),
                        patch.requirements.clone().unwrap_or_default(),
                        now,
                    ],
                )?;
                (tx.last_insert_rowid(), true)
            };

            tx.commit()?;
            Ok(result)
        })
        .await?
    }

    /// Delete a listing owned by this employer; returns its id and title.
    pub async fn delete_listing(&self, user_id: i64, listing_id: i64) -> Result<(i64, String)> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let mut conn = lock(&db)?;
            let tx = conn.transaction()?;
            let employer_id = get_or_create_employer(&tx, user_id)?;
            let title: Option<String> = tx
                .query_row(
                    "SELECT title FROM internships WHERE id = ?1 AND employer_id = ?2",
                    params![listing_id, employer_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(title) = title else {
                bail!("No internship found with id {listing_id} for this employer.");
            };
            tx.execute("DELETE FROM internships WHERE id = ?1", params![listing_id])?;
            tx.commit()?;
            Ok((listing_id, title))
        })
        .await?
    }

    pub async fn list_applicants(
        &self,
        user_id: i64,
        listing_id: i64,
    ) -> Result<Vec<ApplicantSnapshot>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let employer_id = get_or_create_employer(&conn, user_id)?;
            let owned: Option<i64> = conn
                .query_row(
                    "SELECT id FROM internships WHERE id = ?1 AND employer_id = ?2",
                    params![listing_id, employer_id],
                    |row| row.get(0),
                )
                .optional()?;
            if owned.is_none() {
                bail!("No internship found with id {listing_id} for this employer.");
            }
            let mut stmt = conn.prepare(
                r#"
                SELECT u.email, a.status, a.created_at
                FROM applications a JOIN users u ON u.id = a.intern_user_id
                WHERE a.internship_id = ?1
                ORDER BY a.created_at
                "#,
            )?;
            let rows = stmt.query_map(params![listing_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            let mut applicants = Vec::new();
            for row in rows {
                let (intern_email, status, submitted) = row?;
                applicants.push(ApplicantSnapshot {
                    intern_email,
                    status,
                    submitted: parse_ts(&submitted)?,
                });
            }
            Ok(applicants)
        })
        .await?
    }

    /// Record an intern's application to a listing (used by seeds and tests;
    /// the application workflow itself lives outside the agent core).
    pub async fn add_application(&self, internship_id: i64, intern_user_id: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                "INSERT INTO applications (internship_id, intern_user_id, status, created_at) VALUES (?1, ?2, 'PENDING', ?3)",
                params![internship_id, intern_user_id, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await?
    }
}

fn lock(db: &Arc<Mutex<Connection>>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    db.lock().map_err(|_| anyhow!("failed to lock sqlite connection"))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let role_raw: String = row.get(2)?;
    let role = UserRole::parse(&role_raw).unwrap_or(UserRole::Intern);
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        role,
    })
}

fn get_or_create_profile(conn: &Connection, user_id: i64) -> Result<i64> {
    if let Some(id) = conn
        .query_row(
            "SELECT id FROM profiles WHERE user_id = ?1",
            params![user_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
    {
        return Ok(id);
    }
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO profiles (user_id, created_at, updated_at) VALUES (?1, ?2, ?2)",
        params![user_id, now],
    )?;
    Ok(conn.last_insert_rowid())
}

fn get_or_create_employer(conn: &Connection, user_id: i64) -> Result<i64> {
    if let Some(id) = conn
        .query_row(
            "SELECT id FROM employers WHERE user_id = ?1",
            params![user_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
    {
        return Ok(id);
    }
    conn.execute("INSERT INTO employers (user_id) VALUES (?1)", params![user_id])?;
    Ok(conn.last_insert_rowid())
}

fn read_profile_snapshot(conn: &Connection, profile_id: i64) -> Result<ProfileSnapshot> {
    let (id, headline, bio, city, state, country, updated_at) = conn.query_row(
        "SELECT id, headline, bio, city, state, country, updated_at FROM profiles WHERE id = ?1",
        params![profile_id],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        },
    )?;

    let availability = conn
        .query_row(
            "SELECT status, earliest_start, hours_per_week, remote_ok, onsite_ok FROM availability WHERE profile_id = ?1",
            params![profile_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<u8>>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            },
        )
        .optional()?;
    let availability = match availability {
        Some((status, earliest_start, hours_per_week, remote_ok, onsite_ok)) => {
            Some(AvailabilitySnapshot {
                status,
                earliest_start: earliest_start.as_deref().map(parse_date).transpose()?,
                hours_per_week,
                remote_ok,
                onsite_ok,
            })
        }
        None => None,
    };

    let mut stmt = conn.prepare(
        r#"
        SELECT s.name FROM skills s
        JOIN profile_skills ps ON ps.skill_id = s.id
        WHERE ps.profile_id = ?1
        ORDER BY s.name
        "#,
    )?;
    let skills = stmt
        .query_map(params![profile_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        r#"
        SELECT id, institution, degree, field_of_study, start_date, end_date, gpa, description
        FROM educations WHERE profile_id = ?1 ORDER BY start_date DESC
        "#,
    )?;
    let rows = stmt.query_map(params![profile_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<f64>>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;
    let mut educations = Vec::new();
    for row in rows {
        let (id, institution, degree, field_of_study, start_date, end_date, gpa, description) =
            row?;
        educations.push(EducationSnapshot {
            id,
            institution,
            degree,
            field_of_study,
            start_date: parse_date(&start_date)?,
            end_date: end_date.as_deref().map(parse_date).transpose()?,
            gpa,
            description,
        });
    }

    Ok(ProfileSnapshot {
        id,
        headline,
        bio,
        city,
        state,
        country,
        availability,
        skills,
        educations,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn read_employer_snapshot(conn: &Connection, employer_id: i64) -> Result<EmployerSnapshot> {
    let (id, company_name, mission, location, website) = conn.query_row(
        "SELECT id, company_name, mission, location, website FROM employers WHERE id = ?1",
        params![employer_id],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    )?;

    let mut stmt = conn.prepare(
        r#"
        SELECT id, title, description, location, is_remote, requirements, posted_at, updated_at
        FROM internships WHERE employer_id = ?1 ORDER BY posted_at DESC, id DESC
        "#,
    )?;
    let rows = stmt.query_map(params![employer_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, bool>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;
    let mut internships = Vec::new();
    for row in rows {
        let (id, title, description, location, is_remote, requirements, posted_at, updated_at) =
            row?;
        internships.push(InternshipSnapshot {
            id,
            title,
            description,
            location,
            is_remote,
            requirements,
            posted_at: parse_ts(&posted_at)?,
            updated_at: parse_ts(&updated_at)?,
        });
    }

    Ok(EmployerSnapshot {
        id,
        company_name,
        mission,
        location,
        website,
        internships,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{AvailabilityPatch, AvailabilityStatus, EducationPatch};

    async fn intern_store() -> (Store, UserRecord) {
        let store = Store::open_in_memory().unwrap();
        let user = store
            .create_user("intern@example.com", UserRole::Intern)
            .await
            .unwrap();
        (store, user)
    }

    async fn employer_store() -> (Store, UserRecord) {
        let store = Store::open_in_memory().unwrap();
        let user = store
            .create_user("boss@example.com", UserRole::Employer)
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn user_round_trip() {
        let (store, user) = intern_store().await;
        let found = store.user_by_email("intern@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, UserRole::Intern);
        assert!(store.user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn messages_are_ordered_and_append_only() {
        let (store, user) = intern_store().await;
        store.append_message(user.id, ChatRole::User, "hi").await.unwrap();
        store
            .append_message(user.id, ChatRole::Assistant, "hello!")
            .await
            .unwrap();
        store.append_message(user.id, ChatRole::User, "again").await.unwrap();

        let messages = store.list_messages(user.id).await.unwrap();
        assert_eq!(
            messages.iter().map(|m| m.role.as_str()).collect::<Vec<_>>(),
            vec!["user", "assistant", "user"]
        );
        assert_eq!(messages[1].content, "hello!");
        assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn profile_patch_partial_update() {
        let (store, user) = intern_store().await;
        store
            .apply_profile_patch(
                user.id,
                ProfilePatch {
                    city: Some("Boston".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .apply_profile_patch(
                user.id,
                ProfilePatch {
                    headline: Some("CS student".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let snapshot = store.profile_snapshot(user.id).await.unwrap();
        assert_eq!(snapshot.city, "Boston");
        assert_eq!(snapshot.headline, "CS student");
        assert_eq!(snapshot.country, "USA");
    }

    #[tokio::test]
    async fn profile_patch_nested_sections() {
        let (store, user) = intern_store().await;
        store
            .apply_profile_patch(
                user.id,
                ProfilePatch {
                    availability: Some(AvailabilityPatch {
                        status: AvailabilityStatus::FromDate,
                        earliest_start: Some(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()),
                        hours_per_week: Some(20),
                        remote_ok: true,
                        onsite_ok: false,
                    }),
                    skills: Some(vec!["Python".into(), "Figma".into(), "Python".into()]),
                    educations: Some(vec![EducationPatch {
                        institution: "MIT".into(),
                        degree: Some("BSc".into()),
                        field_of_study: None,
                        start_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                        end_date: None,
                        gpa: Some(3.8),
                        description: None,
                    }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let snapshot = store.profile_snapshot(user.id).await.unwrap();
        let availability = snapshot.availability.unwrap();
        assert_eq!(availability.status, "FROM_DATE");
        assert_eq!(availability.hours_per_week, Some(20));
        // duplicates collapse
        assert_eq!(snapshot.skills, vec!["Figma".to_string(), "Python".to_string()]);
        assert_eq!(snapshot.educations.len(), 1);
        assert_eq!(snapshot.educations[0].gpa, Some(3.8));
    }

    #[tokio::test]
    async fn educations_are_replaced_not_appended() {
        let (store, user) = intern_store().await;
        let education = |institution: &str| EducationPatch {
            institution: institution.into(),
            degree: None,
            field_of_study: None,
            start_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            end_date: None,
            gpa: None,
            description: None,
        };
        store
            .apply_profile_patch(
                user.id,
                ProfilePatch {
                    educations: Some(vec![education("MIT"), education("Harvard")]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .apply_profile_patch(
                user.id,
                ProfilePatch {
                    educations: Some(vec![education("Stanford")]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let snapshot = store.profile_snapshot(user.id).await.unwrap();
        assert_eq!(snapshot.educations.len(), 1);
        assert_eq!(snapshot.educations[0].institution, "Stanford");
    }

    #[tokio::test]
    async fn company_patch_and_snapshot() {
        let (store, user) = employer_store().await;
        store
            .apply_company_patch(
                user.id,
                CompanyPatch {
                    company_name: Some("Rocket Co".into()),
                    mission: Some("Make space cheap".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let snapshot = store.employer_snapshot(user.id).await.unwrap();
        assert_eq!(snapshot.company_name, "Rocket Co");
        assert_eq!(snapshot.mission, "Make space cheap");
        assert!(snapshot.internships.is_empty());
    }

    #[tokio::test]
    async fn listing_create_then_update() {
        let (store, user) = employer_store().await;
        let (id, created) = store
            .upsert_listing(
                user.id,
                ListingPatch {
                    title: Some("SWE Intern".into()),
                    description: Some("Build things".into()),
                    is_remote: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(created);

        let (same_id, created) = store
            .upsert_listing(
                user.id,
                ListingPatch {
                    id: Some(id),
                    title: Some("Senior SWE Intern".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same_id, id);
        assert!(!created);

        let snapshot = store.employer_snapshot(user.id).await.unwrap();
        assert_eq!(snapshot.internships.len(), 1);
        assert_eq!(snapshot.internships[0].title, "Senior SWE Intern");
        assert!(snapshot.internships[0].is_remote);
    }

    #[tokio::test]
    async fn listing_update_is_owner_scoped() {
        let (store, employer) = employer_store().await;
        let other = store
            .create_user("other@example.com", UserRole::Employer)
            .await
            .unwrap();
        let (id, _) = store
            .upsert_listing(
                employer.id,
                ListingPatch {
                    title: Some("SWE Intern".into()),
                    description: Some("Build things".into()),
                    is_remote: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = store
            .upsert_listing(
                other.id,
                ListingPatch {
                    id: Some(id),
                    title: Some("hijacked".into()),
                    ..Default::default()
                },
            )
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("No internship found"));
    }

    #[tokio::test]
    async fn delete_listing_returns_title() {
        let (store, user) = employer_store().await;
        let (id, _) = store
            .upsert_listing(
                user.id,
                ListingPatch {
                    title: Some("Doomed".into()),
                    description: Some("soon gone".into()),
                    is_remote: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let (deleted_id, title) = store.delete_listing(user.id, id).await.unwrap();
        assert_eq!(deleted_id, id);
        assert_eq!(title, "Doomed");
        assert!(store.delete_listing(user.id, id).await.is_err());
    }

    #[tokio::test]
    async fn applicants_listed_for_owned_listing() {
        let (store, employer) = employer_store().await;
        let intern = store
            .create_user("intern@example.com", UserRole::Intern)
            .await
            .unwrap();
        let (listing_id, _) = store
            .upsert_listing(
                employer.id,
                ListingPatch {
                    title: Some("SWE Intern".into()),
                    description: Some("Build".into()),
                    is_remote: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.add_application(listing_id, intern.id).await.unwrap();

        let applicants = store.list_applicants(employer.id, listing_id).await.unwrap();
        assert_eq!(applicants.len(), 1);
        assert_eq!(applicants[0].intern_email, "intern@example.com");
        assert_eq!(applicants[0].status, "PENDING");
    }
}
