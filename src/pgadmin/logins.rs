//! Login user management.

use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{ADMIN_ROLE, AdminError, Result, SETUP_USER_ID, USER_ROLE, quote};
use crate::client::{Executor, QueryRunner};

impl<E: Executor> QueryRunner<E> {
    /// Create `username` if missing and set its password.
    ///
    /// The insert, role grant and password update run as one batch, so a
    /// repeated call only rewrites the hash and a new password always wins.
    #[instrument(skip(self, password), fields(pod = %self.target().pod))]
    pub async fn ensure_login(&mut self, username: &str, password: &str) -> Result<()> {
        let hash = self.password_hash(password).await?;
        let login = quote(username);
        let sql = format!(
            "INSERT INTO user (email, username, password, active, auth_source, fs_uniquifier) \
             SELECT {login}, {login}, {hash}, 1, 'internal', {uniquifier} \
             WHERE NOT EXISTS (SELECT 1 FROM user WHERE email = {login}); \
             INSERT INTO roles_users (user_id, role_id) \
             SELECT u.id, r.id FROM user u, role r \
             WHERE u.email = {login} AND r.name = {role} \
             AND NOT EXISTS (SELECT 1 FROM roles_users ru WHERE ru.user_id = u.id); \
             UPDATE user SET password = {hash} WHERE email = {login};",
            hash = quote(&hash),
            uniquifier = quote(&Uuid::new_v4().simple().to_string()),
            role = quote(USER_ROLE),
        );
        self.exec(&sql).await?;

        info!("Ensured pgAdmin login");
        Ok(())
    }

    /// Remove `username` along with its servers, groups and role grants.
    ///
    /// A login that does not exist is left alone.
    #[instrument(skip(self), fields(pod = %self.target().pod))]
    pub async fn delete_user(&mut self, username: &str) -> Result<()> {
        let Some(id) = self.user_id(username).await? else {
            debug!("pgAdmin login already absent");
            return Ok(());
        };

        for table in ["server", "servergroup", "roles_users"] {
            self.exec(&format!("DELETE FROM {table} WHERE user_id = {id};"))
                .await?;
        }
        self.exec(&format!("DELETE FROM user WHERE id = {id};"))
            .await?;

        info!(user_id = id, "Deleted pgAdmin login");
        Ok(())
    }

    /// Logins of all active users except the setup administrator.
    #[instrument(skip(self), fields(pod = %self.target().pod))]
    pub async fn list_active_users(&mut self) -> Result<Vec<String>> {
        self.active_logins("").await
    }

    /// Active logins that hold no Administrator role.
    pub(super) async fn prunable_users(&mut self) -> Result<Vec<String>> {
        let filter = format!(
            " AND id NOT IN (SELECT ru.user_id FROM roles_users ru \
             JOIN role r ON r.id = ru.role_id WHERE r.name = {})",
            quote(ADMIN_ROLE)
        );
        self.active_logins(&filter).await
    }

    async fn active_logins(&mut self, filter: &str) -> Result<Vec<String>> {
        let separator = self.separator().to_string();
        let output = self
            .query(&format!(
                "SELECT group_concat(email, {}) FROM user \
                 WHERE active = 1 AND id != {SETUP_USER_ID}{filter};",
                quote(&separator)
            ))
            .await?;

        Ok(output
            .split(separator.as_str())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Row id of `username`, if the login exists.
    pub(super) async fn user_id(&mut self, username: &str) -> Result<Option<i64>> {
        let output = self
            .query(&format!(
                "SELECT id FROM user WHERE email = {};",
                quote(username)
            ))
            .await?;
        let Some(line) = output.lines().next().filter(|l| !l.is_empty()) else {
            return Ok(None);
        };
        parse_id(line).map(Some)
    }
}

pub(super) fn parse_id(value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| AdminError::Parse(format!("expected a user id, got {value:?}")))
}
