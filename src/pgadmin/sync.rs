//! Converge pgAdmin logins to a desired set.

use std::collections::BTreeSet;

use tracing::{info, instrument};

use super::{DesiredUser, Result, SyncReport};
use crate::client::{Executor, QueryRunner};

impl<E: Executor> QueryRunner<E> {
    /// Ensure every desired login (and its server) exists.
    ///
    /// With `prune`, active logins not in `users` are deleted afterwards.
    /// Administrators are never pruned: neither the setup user nor any
    /// login holding the Administrator role. The first failure aborts the
    /// sync; work already done is kept.
    #[instrument(skip(self, users), fields(pod = %self.target().pod, desired = users.len()))]
    pub async fn sync_users(&mut self, users: &[DesiredUser], prune: bool) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for user in users {
            self.ensure_login(&user.username, &user.password).await?;
            if let Some(server) = &user.server {
                self.ensure_server(&user.username, server).await?;
            }
            report.ensured.push(user.username.clone());
        }

        if prune {
            let desired: BTreeSet<&str> = users.iter().map(|u| u.username.as_str()).collect();
            for stale in self.prunable_users().await? {
                if desired.contains(stale.as_str()) {
                    continue;
                }
                self.delete_user(&stale).await?;
                report.deleted.push(stale);
            }
        }

        info!(
            ensured = report.ensured.len(),
            deleted = report.deleted.len(),
            "pgAdmin users synced"
        );
        Ok(report)
    }
}
