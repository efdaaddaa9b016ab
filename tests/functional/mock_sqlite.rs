//! In-memory stand-in for `sqlite3` running inside a pgAdmin pod.
//!
//! `SqliteExecutor` implements [`Executor`] on top of an in-memory rusqlite
//! database with the tables pgAdmin creates on first start. Commands are
//! interpreted the way the `sqlite3` CLI would:
//!
//! - `sqlite3 [-separator SEP] PATH SQL` runs every statement in `SQL`
//! - rows are printed one per line, columns joined by `SEP` (default `|`)
//! - `NULL` prints as an empty string
//! - any SQL error fails the command with the message on stderr
//!
//! Two knobs simulate a pod that is not healthy yet:
//!
//! - [`SqliteExecutor::uninitialized`]: the schema only appears after a number
//!   of calls, so early calls fail with "no such table"
//! - [`SqliteExecutor::fail_next`]: the next calls fail without touching the
//!   database, like a locked file or a restarting container

use std::sync::Mutex;

use async_trait::async_trait;
use pgadmin_provisioner::client::{ExecError, ExecOutput, Executor};
use pgadmin_provisioner::config::DEFAULT_DATABASE_PATH;
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection};

/// Security salt stored in the mock installation.
pub const SECURITY_SALT: &str = "7fJ3nGq2s9XbYk0VhL1mRz";

/// Email of the user created by pgAdmin setup.
pub const SETUP_EMAIL: &str = "admin@example.com";

const EXIT_FAILURE: &str = "command terminated with non-zero exit code: exit status 1";

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE role (
        id INTEGER PRIMARY KEY,
        name VARCHAR(128) NOT NULL UNIQUE,
        description VARCHAR(256)
    );
    CREATE TABLE user (
        id INTEGER PRIMARY KEY,
        username VARCHAR(256) NOT NULL,
        email VARCHAR(256),
        password VARCHAR(256),
        active BOOLEAN NOT NULL,
        confirmed_at DATETIME,
        masterpass_check VARCHAR(256),
        auth_source VARCHAR(16) NOT NULL DEFAULT 'internal',
        fs_uniquifier VARCHAR(255) NOT NULL UNIQUE,
        locked BOOLEAN NOT NULL DEFAULT 0,
        login_attempts INTEGER NOT NULL DEFAULT 0,
        UNIQUE (username, auth_source)
    );
    CREATE TABLE roles_users (
        user_id INTEGER REFERENCES user (id),
        role_id INTEGER REFERENCES role (id)
    );
    CREATE TABLE servergroup (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES user (id),
        name VARCHAR(128) NOT NULL,
        UNIQUE (user_id, name)
    );
    CREATE TABLE server (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES user (id),
        servergroup_id INTEGER NOT NULL REFERENCES servergroup (id),
        name VARCHAR(128) NOT NULL,
        host VARCHAR(128),
        port INTEGER NOT NULL CHECK (port >= 1 AND port <= 65534),
        maintenance_db VARCHAR(64),
        username VARCHAR(64),
        password VARCHAR(64),
        save_password INTEGER NOT NULL DEFAULT 0,
        ssl_mode VARCHAR(16) NOT NULL,
        comment VARCHAR(1024)
    );
    CREATE TABLE keys (
        name VARCHAR NOT NULL PRIMARY KEY,
        value VARCHAR NOT NULL
    );
    INSERT INTO role (id, name, description) VALUES
        (1, 'Administrator', 'pgAdmin Administrator Role'),
        (2, 'User', 'pgAdmin User Role');
    INSERT INTO user (id, username, email, password, active, fs_uniquifier) VALUES
        (1, 'admin@example.com', 'admin@example.com', '$pbkdf2-sha512$25000$setup$setup', 1, 'setup-user');
    INSERT INTO roles_users (user_id, role_id) VALUES (1, 1);
    INSERT INTO keys (name, value) VALUES
        ('CSRF_SESSION_KEY', 'csrf'),
        ('SECRET_KEY', 'secret'),
        ('SECURITY_PASSWORD_SALT', '7fJ3nGq2s9XbYk0VhL1mRz');
";

struct State {
    conn: Connection,
    /// Calls left before the schema is created; `None` once it exists.
    schema_in: Option<usize>,
    failures: usize,
    failure_stderr: String,
    commands: Vec<Vec<String>>,
}

/// [`Executor`] backed by an in-memory SQLite database.
pub struct SqliteExecutor {
    state: Mutex<State>,
}

impl SqliteExecutor {
    /// A pgAdmin database that has finished its first start.
    pub fn new() -> Self {
        let executor = Self::uninitialized(0);
        executor.with_state(|state| {
            state.conn.execute_batch(SCHEMA).unwrap();
            state.schema_in = None;
        });
        executor
    }

    /// A database whose schema appears after `calls` commands.
    pub fn uninitialized(calls: usize) -> Self {
        Self {
            state: Mutex::new(State {
                conn: Connection::open_in_memory().unwrap(),
                schema_in: Some(calls),
                failures: 0,
                failure_stderr: String::new(),
                commands: Vec::new(),
            }),
        }
    }

    /// A database whose schema is never created.
    pub fn never_initialized() -> Self {
        Self::uninitialized(usize::MAX)
    }

    /// Fail the next `count` commands with `stderr`.
    pub fn fail_next(&self, count: usize, stderr: &str) {
        self.with_state(|state| {
            state.failures = count;
            state.failure_stderr = stderr.to_string();
        });
    }

    /// Number of commands received so far.
    pub fn call_count(&self) -> usize {
        self.with_state(|state| state.commands.len())
    }

    /// Every command received so far.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.with_state(|state| state.commands.clone())
    }

    /// Forget recorded commands.
    pub fn reset_commands(&self) {
        self.with_state(|state| state.commands.clear());
    }

    /// Run `sql` directly, bypassing call accounting.
    pub fn execute(&self, sql: &str) {
        self.with_state(|state| state.conn.execute_batch(sql).unwrap());
    }

    /// Rows of `sql` as strings, bypassing call accounting.
    pub fn rows(&self, sql: &str) -> Vec<Vec<String>> {
        self.with_state(|state| {
            let mut stmt = state.conn.prepare(sql).unwrap();
            let columns = stmt.column_count();
            let mut rows = stmt.query([]).unwrap();
            let mut out = Vec::new();
            while let Some(row) = rows.next().unwrap() {
                out.push(
                    (0..columns)
                        .map(|i| render(row.get_ref(i).unwrap()))
                        .collect(),
                );
            }
            out
        })
    }

    /// Single value of `sql`.
    pub fn scalar(&self, sql: &str) -> String {
        self.rows(sql)[0][0].clone()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

impl Default for SqliteExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    async fn exec(
        &self,
        _namespace: &str,
        _pod: &str,
        _container: &str,
        command: &[String],
        _stdin: Option<&str>,
    ) -> Result<ExecOutput, ExecError> {
        self.with_state(|state| {
            state.commands.push(command.to_vec());

            match state.schema_in {
                Some(0) => {
                    state.conn.execute_batch(SCHEMA).unwrap();
                    state.schema_in = None;
                }
                Some(remaining) => state.schema_in = Some(remaining - 1),
                None => {}
            }

            if state.failures > 0 {
                state.failures -= 1;
                return Err(failed(&state.failure_stderr));
            }

            let (separator, path, sql) = parse_command(command)?;
            if path != DEFAULT_DATABASE_PATH {
                return Err(failed(&format!(
                    "Error: unable to open database \"{path}\": unable to open database file"
                )));
            }
            run_sql(&state.conn, &separator, &sql)
                .map(|stdout| ExecOutput {
                    stdout,
                    stderr: String::new(),
                })
                .map_err(|e| failed(&format!("Error: in prepare, {e}")))
        })
    }
}

fn failed(stderr: &str) -> ExecError {
    ExecError::Failed {
        reason: EXIT_FAILURE.to_string(),
        stderr: stderr.to_string(),
    }
}

fn parse_command(command: &[String]) -> Result<(String, String, String), ExecError> {
    let mut args = command.iter();
    if args.next().map(String::as_str) != Some("sqlite3") {
        return Err(failed("exec: executable file not found in $PATH"));
    }

    let mut separator = "|".to_string();
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "-separator" {
            separator = args
                .next()
                .cloned()
                .ok_or_else(|| failed("sqlite3: Error: missing argument to -separator"))?;
        } else {
            positional.push(arg.clone());
        }
    }

    match <[String; 2]>::try_from(positional) {
        Ok([path, sql]) => Ok((separator, path, sql)),
        Err(_) => Err(failed("sqlite3: Error: expected a database path and SQL")),
    }
}

fn run_sql(conn: &Connection, separator: &str, sql: &str) -> rusqlite::Result<String> {
    let mut stdout = String::new();
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next()? {
        let columns = stmt.column_count();
        if columns == 0 {
            stmt.execute([])?;
            continue;
        }
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let fields = (0..columns)
                .map(|i| row.get_ref(i).map(render))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            stdout.push_str(&fields.join(separator));
            stdout.push('\n');
        }
    }
    Ok(stdout)
}

fn render(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}
