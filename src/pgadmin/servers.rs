//! Saved server connections.

use tracing::{info, instrument};

use super::logins::parse_id;
use super::{AdminError, Result, SERVER_GROUP, ServerEntry, quote};
use crate::client::{Executor, QueryRunner};
use crate::crypto;

impl<E: Executor> QueryRunner<E> {
    /// Make sure `username` has a saved connection to `server`.
    ///
    /// pgAdmin encrypts saved passwords with the login's password hash, so
    /// the login must exist first. When the login already has a server only
    /// its password is rewritten, keeping anything changed in the UI.
    #[instrument(skip(self, server), fields(pod = %self.target().pod, server = %server.name))]
    pub async fn ensure_server(&mut self, username: &str, server: &ServerEntry) -> Result<()> {
        let (user_id, hash) = self.user_credentials(username).await?;
        let encrypted = quote(&crypto::encrypt(&server.password, &hash));
        let group = quote(SERVER_GROUP);

        self.exec(&format!(
            "INSERT INTO servergroup (user_id, name) SELECT {user_id}, {group} \
             WHERE NOT EXISTS (SELECT 1 FROM servergroup WHERE user_id = {user_id} AND name = {group});"
        ))
        .await?;

        let existing = self
            .query(&format!(
                "SELECT id FROM server WHERE user_id = {user_id} ORDER BY id LIMIT 1;"
            ))
            .await?;

        if let Some(server_id) = existing.lines().next().filter(|l| !l.is_empty()) {
            let server_id = parse_id(server_id)?;
            self.exec(&format!(
                "UPDATE server SET password = {encrypted} WHERE id = {server_id};"
            ))
            .await?;
            info!(server_id, "Updated pgAdmin server password");
            return Ok(());
        }

        self.exec(&format!(
            "INSERT INTO server (user_id, servergroup_id, name, host, port, maintenance_db, \
             username, password, save_password, ssl_mode, comment) \
             SELECT {user_id}, id, {name}, {host}, {port}, {maintenance_db}, {login}, {encrypted}, 1, \
             {ssl_mode}, {comment} FROM servergroup WHERE user_id = {user_id} AND name = {group} LIMIT 1;",
            name = quote(&server.name),
            host = quote(&server.host),
            port = server.port,
            maintenance_db = quote(&server.maintenance_db),
            login = quote(username),
            ssl_mode = quote(&server.ssl_mode),
            comment = quote(&server.comment),
        ))
        .await?;

        info!("Created pgAdmin server");
        Ok(())
    }

    /// Row id and stored password hash of `username`.
    async fn user_credentials(&mut self, username: &str) -> Result<(i64, String)> {
        let separator = self.separator().to_string();
        let output = self
            .query(&format!(
                "SELECT id, password FROM user WHERE email = {};",
                quote(username)
            ))
            .await?;

        let Some(row) = output.lines().next().filter(|l| !l.is_empty()) else {
            return Err(AdminError::UserNotFound(username.to_string()));
        };
        let (id, hash) = row.split_once(separator.as_str()).ok_or_else(|| {
            AdminError::Parse(format!("expected id and password hash for {username}"))
        })?;
        if hash.is_empty() {
            return Err(AdminError::Parse(format!("{username} has no password hash")));
        }
        Ok((parse_id(id)?, hash.to_string()))
    }
}
