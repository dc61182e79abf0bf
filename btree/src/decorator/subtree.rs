use std::any::Any;

use tracing::warn;

use crate::core::task::{Task, TaskCtx};
use crate::core::types::{ChildLayout, ReentryId, TaskId};
use crate::decorator::forward_event;
use crate::status::Status;

/// Placeholder for the tree `name`, loaded through the tree's loader on first
/// entry and attached as the only child.
///
/// A tree that cannot be loaded or attached fails the reference with ERROR.
#[derive(Debug, Clone)]
pub struct SubtreeRef {
    pub name: String,
}

impl SubtreeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn load<B: 'static>(&self, ctx: &mut TaskCtx<'_, B>) -> Option<TaskId> {
        let id = ctx.id();
        let loader = ctx.tree().loader();
        let loaded = loader
            .load_root_task(ctx.tree_mut(), &self.name)
            .and_then(|root| ctx.tree_mut().add_child(id, root).map(|_| root));
        match loaded {
            Ok(root) => Some(root),
            Err(err) => {
                warn!(task = %id, subtree = %self.name, error = %err, "subtree load failed");
                None
            }
        }
    }
}

impl<B: 'static> Task<B> for SubtreeRef {
    fn layout(&self) -> ChildLayout {
        ChildLayout::Single
    }

    fn enter(&self, ctx: &mut TaskCtx<'_, B>, _rid: ReentryId) {
        if ctx.first_child().is_none() && self.load(ctx).is_none() {
            ctx.set_failed(Status::ERROR);
        }
    }

    fn execute(&self, ctx: &mut TaskCtx<'_, B>) {
        if let Some(child) = ctx.first_child() {
            ctx.run_child(child);
        }
    }

    fn on_child_completed(&self, ctx: &mut TaskCtx<'_, B>, child: TaskId) {
        let status = ctx.status_of(child);
        ctx.set_completed(status, true);
    }

    fn on_event(&self, ctx: &mut TaskCtx<'_, B>, event: &dyn Any) {
        forward_event(ctx, event);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::core::tree::TaskTree;
    use crate::entry::TaskEntry;
    use crate::leaf::WaitFrame;
    use crate::loader::RegistryLoader;

    fn entry_for(name: &str) -> (TaskEntry<()>, TaskId) {
        let mut loader = RegistryLoader::new();
        loader.register_tree("wait", |tree: &mut TaskTree<()>| tree.insert(WaitFrame::new(1)));
        let mut entry = TaskEntry::new(());
        entry.set_loader(Rc::new(loader));
        let root = entry.tree_mut().insert(SubtreeRef::new(name));
        entry.set_root(root).expect("root");
        (entry, root)
    }

    /// The subtree is loaded once and kept across runs.
    #[test]
    fn loads_on_first_entry() {
        let (mut entry, root) = entry_for("wait");
        assert_eq!(entry.tree().child_count(root), 0);
        assert_eq!(entry.update(1), Status::RUNNING);
        let child = entry.tree().first_child(root).expect("loaded child");
        assert_eq!(entry.tree().name(child), Some("wait"));
        assert_eq!(entry.update(2), Status::SUCCESS);

        entry.reset_for_restart();
        assert_eq!(entry.update(1), Status::RUNNING);
        assert_eq!(entry.tree().first_child(root), Some(child));
    }

    #[test]
    fn unknown_subtree_fails() {
        let (mut entry, root) = entry_for("missing");
        assert_eq!(entry.update(1), Status::ERROR);
        assert_eq!(entry.tree().child_count(root), 0);
    }
}
