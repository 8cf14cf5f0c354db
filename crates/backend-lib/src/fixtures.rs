// ============================
// authgate-backend/src/fixtures.rs
// ============================
//! Fake user generator for seeding development data.
//!
//! `authgate generate-users 20 > users.csv` writes a CSV that
//! `authgate import-users users.csv` can load back.
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use std::io::Write;

use crate::auth::PasswordHashing;
use crate::error::AppError;
use crate::storage::{new_credential, UserStore};
use crate::validation::is_valid_username;

/// Number of users generated when no count is given.
pub const DEFAULT_USER_COUNT: usize = 5;

/// Column order of the CSV.
pub const CSV_HEADER: [&str; 6] = ["firstname", "lastname", "username", "email", "avatar", "password"];

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Brian", "Claude", "Donald", "Edsger", "Frances", "Grace", "Guido",
    "Hedy", "Ivan", "Jean", "John", "Katherine", "Ken", "Linus", "Margaret", "Niklaus", "Radia",
    "Robin", "Shafi", "Sophie", "Tim",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Backus", "Cerf", "Dijkstra", "Engelbart", "Goldwasser", "Hamilton", "Hopper",
    "Johnson", "Kay", "Knuth", "Lamarr", "Liskov", "Lovelace", "McCarthy", "Milner", "Perlman",
    "Ritchie", "Shannon", "Sutherland", "Thompson", "Turing", "Wilson", "Wirth",
];

const WORDS: &[&str] = &[
    "amet", "aperiam", "dolor", "dolores", "eius", "fugit", "ipsum", "labore", "magnam", "minima",
    "nemo", "omnis", "porro", "quia", "ratione", "sequi", "sint", "tempora", "ullam", "velit",
    "veniam", "voluptas",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.net", "example.org"];

/// One generated user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureUser {
    pub firstname: String,
    pub lastname: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub password: String,
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or("user")
}

fn make_username<R: Rng + ?Sized>(rng: &mut R, first: &str, last: &str) -> String {
    match rng.random_range(0..4u8) {
        0 => format!("{first}.{last}"),
        1 => format!("{first}_{last}{}", rng.random_range(0..100u32)),
        2 => format!("{}{last}", &first[..1]),
        _ => format!("{first}{}", rng.random_range(10..10_000u32)),
    }
}

/// Generate `count` users with distinct usernames.
pub fn generate_users<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<FixtureUser> {
    let mut taken = HashSet::with_capacity(count);
    let mut users = Vec::with_capacity(count);

    while users.len() < count {
        let firstname = pick(rng, FIRST_NAMES).to_string();
        let lastname = pick(rng, LAST_NAMES).to_string();

        let mut username = make_username(rng, &firstname, &lastname);
        if taken.contains(&username) {
            username = format!("{username}{}", users.len());
        }
        if !is_valid_username(&username) || !taken.insert(username.clone()) {
            continue;
        }

        let email = format!(
            "{}.{}@{}",
            firstname.to_lowercase(),
            lastname.to_lowercase(),
            pick(rng, EMAIL_DOMAINS)
        );
        let avatar = format!("https://avatars.example.com/{username}.png");
        let password = pick(rng, WORDS).to_string();

        users.push(FixtureUser {
            firstname,
            lastname,
            username,
            email,
            avatar,
            password,
        });
    }

    users
}

/// Write a header row followed by one row per user.
pub fn write_csv<W: Write>(users: &[FixtureUser], mut out: W) -> std::io::Result<()> {
    writeln!(out, "{}", CSV_HEADER.join(","))?;
    for user in users {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            user.firstname, user.lastname, user.username, user.email, user.avatar, user.password
        )?;
    }
    out.flush()
}

/// Read rows back, locating columns by header name.
pub fn parse_csv(input: &str) -> Result<Vec<FixtureUser>, AppError> {
    let mut lines = input.lines().filter(|line| !line.trim().is_empty());

    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| AppError::InvalidInput("empty CSV".to_string()))?
        .split(',')
        .map(str::trim)
        .collect();

    let column = |name: &str| {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or_else(|| AppError::InvalidInput(format!("missing column {name}")))
    };
    let [first_i, last_i, user_i, email_i, avatar_i, pass_i] = [
        column("firstname")?,
        column("lastname")?,
        column("username")?,
        column("email")?,
        column("avatar")?,
        column("password")?,
    ];

    lines
        .enumerate()
        .map(|(row, line)| {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != header.len() {
                return Err(AppError::InvalidInput(format!(
                    "row {}: expected {} fields, found {}",
                    row + 2,
                    header.len(),
                    fields.len()
                )));
            }
            Ok(FixtureUser {
                firstname: fields[first_i].to_string(),
                lastname: fields[last_i].to_string(),
                username: fields[user_i].to_string(),
                email: fields[email_i].to_string(),
                avatar: fields[avatar_i].to_string(),
                password: fields[pass_i].to_string(),
            })
        })
        .collect()
}

/// Counts reported by [`import_users`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Store every row as a credential record.
///
/// Rows with an unusable username or password, and usernames that already
/// exist, are skipped with a warning. Any other store error aborts.
pub async fn import_users(
    users: &dyn UserStore,
    hasher: &dyn PasswordHashing,
    rows: &[FixtureUser],
) -> Result<ImportSummary, AppError> {
    let mut summary = ImportSummary::default();

    for row in rows {
        let record = match new_credential(hasher, &row.username, &row.password, None) {
            Ok(record) => record,
            Err(AppError::InvalidInput(reason)) => {
                tracing::warn!(username = %row.username, %reason, "invalid row, skipped");
                summary.skipped += 1;
                continue;
            },
            Err(err) => return Err(err),
        };

        match users.insert(record).await {
            Ok(()) => summary.imported += 1,
            Err(AppError::Conflict(_)) => {
                tracing::warn!(username = %row.username, "user exists, skipped");
                summary.skipped += 1;
            },
            Err(err) => return Err(err),
        }
    }

    Ok(summary)
}
