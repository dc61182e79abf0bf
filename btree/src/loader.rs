//! Where named subtrees and objects come from.
//!
//! The kernel never reads tree assets itself. `SubtreeRef` and
//! `ChangeStateTask` ask the tree's [`TreeLoader`] to build a named root task
//! into the arena; everything behind that call belongs to the application.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::core::tree::TaskTree;
use crate::core::types::TaskId;
use crate::entry::TaskEntry;
use crate::error::TaskError;

/// Builds a named root task into a tree and returns its id.
pub type TaskFactory<B> = Rc<dyn Fn(&mut TaskTree<B>) -> TaskId>;

pub trait TreeLoader<B: 'static> {
    /// Look up an arbitrary object (props, configs) by name or guid.
    fn try_load_object(&self, name_or_guid: &str) -> Option<Rc<dyn Any>>;

    /// Every object stored in `file` accepted by `filter`.
    ///
    /// `sharable` asks for shared instances rather than fresh copies. Loaders
    /// without a notion of files return nothing.
    fn load_many_from_file(
        &self,
        _file: &str,
        _sharable: bool,
        _filter: &dyn Fn(&dyn Any) -> bool,
    ) -> Vec<Rc<dyn Any>> {
        Vec::new()
    }

    /// Build the root task called `name` into `tree`.
    fn try_load_root_task(&self, tree: &mut TaskTree<B>, name: &str) -> Option<TaskId>;

    fn load_root_task(&self, tree: &mut TaskTree<B>, name: &str) -> Result<TaskId, TaskError> {
        let root = self
            .try_load_root_task(tree, name)
            .ok_or_else(|| TaskError::SubtreeNotFound(name.to_string()))?;
        if !tree.contains(root) {
            return Err(TaskError::NotATask(name.to_string()));
        }
        Ok(root)
    }
}

/// Build the tree `name` under a fresh [`TaskEntry`] that keeps `loader` for
/// later lazy loads.
pub fn load_tree<B: 'static>(
    loader: Rc<dyn TreeLoader<B>>,
    name: &str,
    blackboard: B,
) -> Result<TaskEntry<B>, TaskError> {
    load_into(TaskEntry::new(blackboard), loader, name)
}

/// Like [`load_tree`] for an entry built by the caller (for example with
/// [`TaskEntry::with_config`]).
pub fn load_into<B: 'static>(
    mut entry: TaskEntry<B>,
    loader: Rc<dyn TreeLoader<B>>,
    name: &str,
) -> Result<TaskEntry<B>, TaskError> {
    entry.set_name(name);
    entry.set_loader(Rc::clone(&loader));
    let root = loader.load_root_task(entry.tree_mut(), name)?;
    entry.set_root(root)?;
    debug!(tree = name, tasks = entry.tree().len(), "tree loaded");
    Ok(entry)
}

/// Loader that knows nothing. Default for every tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLoader;

impl<B: 'static> TreeLoader<B> for NullLoader {
    fn try_load_object(&self, _name_or_guid: &str) -> Option<Rc<dyn Any>> {
        None
    }

    fn try_load_root_task(&self, _tree: &mut TaskTree<B>, _name: &str) -> Option<TaskId> {
        None
    }
}

/// In-memory loader: named task factories, named objects and object files.
pub struct RegistryLoader<B: 'static> {
    trees: HashMap<String, TaskFactory<B>>,
    objects: HashMap<String, Rc<dyn Any>>,
    files: HashMap<String, Vec<Rc<dyn Any>>>,
}

impl<B: 'static> RegistryLoader<B> {
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            objects: HashMap::new(),
            files: HashMap::new(),
        }
    }

    /// Register `factory` under `name`, replacing any previous one.
    pub fn register_tree(
        &mut self,
        name: &str,
        factory: impl Fn(&mut TaskTree<B>) -> TaskId + 'static,
    ) -> &mut Self {
        self.trees.insert(name.to_string(), Rc::new(factory));
        self
    }

    pub fn register_object(&mut self, name: &str, object: Rc<dyn Any>) -> &mut Self {
        self.objects.insert(name.to_string(), object);
        self
    }

    /// Append `object` to the contents of `file`.
    pub fn register_file_object(&mut self, file: &str, object: Rc<dyn Any>) -> &mut Self {
        self.files.entry(file.to_string()).or_default().push(object);
        self
    }

    pub fn contains_tree(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    /// Registered tree names, sorted.
    pub fn tree_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.trees.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<B: 'static> Default for RegistryLoader<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: 'static> TreeLoader<B> for RegistryLoader<B> {
    fn try_load_object(&self, name_or_guid: &str) -> Option<Rc<dyn Any>> {
        self.objects.get(name_or_guid).cloned()
    }

    /// Registry objects are always shared; `sharable` has no effect.
    fn load_many_from_file(
        &self,
        file: &str,
        _sharable: bool,
        filter: &dyn Fn(&dyn Any) -> bool,
    ) -> Vec<Rc<dyn Any>> {
        self.files
            .get(file)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|object| filter(object.as_ref()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn try_load_root_task(&self, tree: &mut TaskTree<B>, name: &str) -> Option<TaskId> {
        let factory = Rc::clone(self.trees.get(name)?);
        let root = factory(tree);
        if tree.contains(root) && tree.name(root).is_none() {
            tree.set_name(root, name);
        }
        Some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{Failure, Success};
    use crate::status::Status;

    fn loader() -> RegistryLoader<()> {
        let mut loader = RegistryLoader::new();
        loader
            .register_tree("ok", |tree: &mut TaskTree<()>| tree.insert(Success))
            .register_tree("bad", |tree: &mut TaskTree<()>| tree.insert(Failure::default()))
            .register_object("speed", Rc::new(3u32))
            .register_file_object("units.asset", Rc::new(1u32))
            .register_file_object("units.asset", Rc::new("label"))
            .register_file_object("units.asset", Rc::new(2u32));
        loader
    }

    #[test]
    fn null_loader_finds_nothing() {
        let mut tree: TaskTree<()> = TaskTree::new();
        assert!(TreeLoader::<()>::try_load_object(&NullLoader, "x").is_none());
        assert_eq!(
            TreeLoader::<()>::load_root_task(&NullLoader, &mut tree, "x").expect_err("absent"),
            TaskError::SubtreeNotFound("x".to_string())
        );
    }

    /// Each load builds a fresh root named after the tree.
    #[test]
    fn registry_builds_named_roots() {
        let loader = loader();
        let mut tree = TaskTree::new();
        let a = loader.load_root_task(&mut tree, "ok").expect("ok");
        let b = loader.load_root_task(&mut tree, "ok").expect("ok again");
        assert_ne!(a, b);
        assert_eq!(tree.name(a), Some("ok"));
        assert_eq!(loader.tree_names(), vec!["bad".to_string(), "ok".to_string()]);
    }

    /// A factory must return a task of the tree it was given.
    #[test]
    fn foreign_root_is_rejected() {
        let mut loader = RegistryLoader::new();
        loader.register_tree("stray", |_tree: &mut TaskTree<()>| TaskId::from_index(99));
        let mut tree = TaskTree::new();
        assert_eq!(
            loader.load_root_task(&mut tree, "stray").expect_err("stray"),
            TaskError::NotATask("stray".to_string())
        );
    }

    #[test]
    fn objects_and_files_are_filtered_by_type() {
        let loader = loader();
        let speed = loader.try_load_object("speed").expect("speed");
        assert_eq!(speed.downcast_ref::<u32>(), Some(&3));

        let numbers = loader.load_many_from_file("units.asset", true, &|object| object.is::<u32>());
        assert_eq!(numbers.len(), 2);
        assert!(loader.load_many_from_file("missing", true, &|_| true).is_empty());
    }

    #[test]
    fn load_tree_wraps_root_in_entry() {
        let shared: Rc<dyn TreeLoader<()>> = Rc::new(loader());
        let mut entry = load_tree(Rc::clone(&shared), "bad", ()).expect("load");
        assert_eq!(entry.name(), Some("bad"));
        assert_eq!(entry.update(1), Status::ERROR);
        assert!(load_tree(shared, "nope", ()).is_err());
    }
}
