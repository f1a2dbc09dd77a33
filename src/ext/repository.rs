// SPDX-License-Identifier: GPL-2.0-only

use anyhow::{anyhow, Context, Result};

/// Extension trait for [`git_repository::Repository`].
pub(crate) trait RepositoryExtended {
    /// Author signature built from `stgit.authname`/`authemail` config, falling
    /// back to `user.name`/`user.email`, then to `GIT_AUTHOR_*` environment
    /// variables, matching how the original tool resolves patch authorship.
    fn author_signature(&self) -> Result<git_repository::actor::Signature>;

    /// Committer signature, same fallback order under the `committer`/`commname`
    /// config keys.
    fn committer_signature(&self) -> Result<git_repository::actor::Signature>;

    /// The id of the empty tree, used as the implicit parent tree for the
    /// first patch pushed onto an empty stack.
    fn empty_tree_id(&self) -> Result<git_repository::ObjectId>;
}

impl RepositoryExtended for git_repository::Repository {
    fn author_signature(&self) -> Result<git_repository::actor::Signature> {
        let config = self.config_snapshot();
        let name = config
            .string("stgit.authname")
            .or_else(|| config.string("user.name"))
            .or_else(|| std::env::var("GIT_AUTHOR_NAME").ok().map(Into::into))
            .ok_or_else(|| anyhow!("no author name configured"))?;
        let email = config
            .string("stgit.authemail")
            .or_else(|| config.string("user.email"))
            .or_else(|| std::env::var("GIT_AUTHOR_EMAIL").ok().map(Into::into))
            .ok_or_else(|| anyhow!("no author email configured"))?;
        let time = if let Ok(date) = std::env::var("GIT_AUTHOR_DATE") {
            parse_git_time(&date).with_context(|| format!("invalid GIT_AUTHOR_DATE `{date}`"))?
        } else {
            git_repository::date::Time::now_local_or_utc()
        };
        Ok(git_repository::actor::Signature {
            name: name.into_owned().into(),
            email: email.into_owned().into(),
            time,
        })
    }

    fn committer_signature(&self) -> Result<git_repository::actor::Signature> {
        let config = self.config_snapshot();
        let name = config
            .string("stgit.commname")
            .or_else(|| config.string("user.name"))
            .or_else(|| std::env::var("GIT_COMMITTER_NAME").ok().map(Into::into))
            .ok_or_else(|| anyhow!("no committer name configured"))?;
        let email = config
            .string("stgit.commemail")
            .or_else(|| config.string("user.email"))
            .or_else(|| std::env::var("GIT_COMMITTER_EMAIL").ok().map(Into::into))
            .ok_or_else(|| anyhow!("no committer email configured"))?;
        let time = if let Ok(date) = std::env::var("GIT_COMMITTER_DATE") {
            parse_git_time(&date).with_context(|| format!("invalid GIT_COMMITTER_DATE `{date}`"))?
        } else {
            git_repository::date::Time::now_local_or_utc()
        };
        Ok(git_repository::actor::Signature {
            name: name.into_owned().into(),
            email: email.into_owned().into(),
            time,
        })
    }

    fn empty_tree_id(&self) -> Result<git_repository::ObjectId> {
        Ok(self.empty_tree().id)
    }
}

fn parse_git_time(raw: &str) -> Result<git_repository::date::Time> {
    git_repository::date::parse(raw, None).map_err(|e| anyhow!("{e}"))
}
