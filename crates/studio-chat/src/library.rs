//! Cached workflow list with optimistic edits.
//!
//! Edits are applied to the cache first, then sent to the backend. A failed
//! call rolls the cache back to what it held before the edit.

use async_trait::async_trait;

use studio_core::error::Result;
use studio_core::workflow::{Pagination, WorkflowDetail};

/// Backend operations the library depends on.
#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn list_workflows(&self, page: u32, size: u32) -> Result<Pagination<WorkflowDetail>>;

    async fn delete_workflow(&self, id: &str) -> Result<()>;

    async fn rename_workflow(&self, id: &str, name: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryCommand {
    Delete { id: String },
    Rename { id: String, name: String },
}

/// A command that has been applied locally and can still be undone.
#[derive(Debug, Clone)]
pub struct AppliedCommand {
    pub command: LibraryCommand,
    undo: Undo,
}

#[derive(Debug, Clone)]
enum Undo {
    Reinsert { index: usize, item: Box<WorkflowDetail> },
    Rename { id: String, previous: String },
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowLibrary {
    items: Vec<WorkflowDetail>,
}

impl WorkflowLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<WorkflowDetail>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[WorkflowDetail] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&WorkflowDetail> {
        self.items.iter().find(|w| w.id == id)
    }

    /// Replace the cache with the first page of the backend list, most
    /// recently updated first.
    pub async fn refresh(&mut self, backend: &dyn WorkflowBackend, size: u32) -> Result<()> {
        let page = backend.list_workflows(1, size).await?;
        tracing::debug!(count = page.list.len(), total = page.total, "workflow list refreshed");
        self.items = page.list;
        Ok(())
    }

    /// Apply a command to the cache. Returns `None` when the target is not
    /// cached, in which case nothing changed.
    pub fn apply(&mut self, command: LibraryCommand) -> Option<AppliedCommand> {
        match &command {
            LibraryCommand::Delete { id } => {
                let index = self.items.iter().position(|w| w.id == *id)?;
                let item = self.items.remove(index);
                Some(AppliedCommand {
                    command,
                    undo: Undo::Reinsert {
                        index,
                        item: Box::new(item),
                    },
                })
            }
            LibraryCommand::Rename { id, name } => {
                let item = self.items.iter_mut().find(|w| w.id == *id)?;
                let previous = std::mem::replace(&mut item.name, name.clone());
                let id = id.clone();
                Some(AppliedCommand {
                    command,
                    undo: Undo::Rename { id, previous },
                })
            }
        }
    }

    pub fn rollback(&mut self, applied: AppliedCommand) {
        match applied.undo {
            Undo::Reinsert { index, item } => {
                let index = index.min(self.items.len());
                self.items.insert(index, *item);
            }
            Undo::Rename { id, previous } => {
                if let Some(item) = self.items.iter_mut().find(|w| w.id == id) {
                    item.name = previous;
                }
            }
        }
    }

    /// Apply locally, confirm with the backend, roll back on failure.
    pub async fn execute(
        &mut self,
        backend: &dyn WorkflowBackend,
        command: LibraryCommand,
    ) -> Result<()> {
        let applied = self.apply(command.clone());
        let outcome = match &command {
            LibraryCommand::Delete { id } => backend.delete_workflow(id).await,
            LibraryCommand::Rename { id, name } => backend.rename_workflow(id, name).await,
        };

        if let Err(e) = outcome {
            tracing::warn!(?command, error = %e, "workflow edit rejected, rolling back");
            if let Some(applied) = applied {
                self.rollback(applied);
            }
            return Err(e);
        }
        Ok(())
    }

    pub async fn delete(&mut self, backend: &dyn WorkflowBackend, id: &str) -> Result<()> {
        self.execute(backend, LibraryCommand::Delete { id: id.to_string() })
            .await
    }

    pub async fn rename(
        &mut self,
        backend: &dyn WorkflowBackend,
        id: &str,
        name: &str,
    ) -> Result<()> {
        self.execute(
            backend,
            LibraryCommand::Rename {
                id: id.to_string(),
                name: name.to_string(),
            },
        )
        .await
    }
}
