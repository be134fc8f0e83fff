//! Recursive deletion over the live tree.
//!
//! Depth-first, children before parent - the store forbids deleting a
//! non-empty node, so a surviving child blocks its parent regardless of
//! the parent's own lifetime semantics. The traversal is tolerant of
//! concurrent external mutation: a node that vanishes between listing
//! and visiting is simply no work left to do.

use futures::future::BoxFuture;
use tracing::debug;
use tracing::info;

use super::SessionClient;
use crate::constants::ANY_VERSION;
use crate::Error;
use crate::Result;
use crate::TransportError;

pub(crate) fn join(
    base: &str,
    name: &str,
) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

impl SessionClient {
    /// Deletes `path` and everything below it, children first.
    ///
    /// Ephemeral nodes are skipped unless `force` is set; a skipped node
    /// keeps every ancestor up to `path` alive, since none of them can
    /// become empty. With `dry_run` nothing is mutated and each node's
    /// fate is reported through the log instead.
    ///
    /// Returns `true` when this node or any descendant was left in place
    /// because of an ephemeral block.
    ///
    /// # Errors
    /// Transport errors abort the traversal immediately and may leave
    /// the tree partially deleted; there is no rollback. A node found
    /// already deleted by a concurrent actor is not an error.
    pub async fn delete_recursive(
        &self,
        path: &str,
        dry_run: bool,
        force: bool,
    ) -> Result<bool> {
        self.delete_subtree(path, dry_run, force).await
    }

    fn delete_subtree<'a>(
        &'a self,
        path: &'a str,
        dry_run: bool,
        force: bool,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let children = match self.get_children(path, None).await {
                Ok(children) => children,
                // a concurrent actor already removed this subtree
                Err(Error::Transport(TransportError::NoNode(_))) => return Ok(false),
                Err(e) => return Err(e),
            };

            let mut blocked = false;
            for name in children {
                blocked |= self.delete_subtree(&join(path, &name), dry_run, force).await?;
            }

            if blocked {
                if dry_run {
                    info!(path, "(dry-run) would skip: an ephemeral descendant survives");
                } else {
                    debug!(path, "not deleting: an ephemeral descendant survives");
                }
                return Ok(true);
            }

            let ephemeral = match self.is_ephemeral(path, false).await {
                Ok(ephemeral) => ephemeral && !force,
                Err(Error::Transport(TransportError::NoNode(_))) => return Ok(false),
                Err(e) => return Err(e),
            };

            if dry_run {
                if ephemeral {
                    info!(path, "(dry-run) would skip: node is ephemeral");
                } else {
                    info!(path, "(dry-run) would delete");
                }
            } else if ephemeral {
                debug!(path, "not deleting: node is ephemeral");
            } else {
                debug!(path, "deleting");
                match self.delete(path, ANY_VERSION).await {
                    Ok(()) => {}
                    // already gone, which is what we wanted
                    Err(Error::Transport(TransportError::NoNode(_))) => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(ephemeral)
        })
    }
}
