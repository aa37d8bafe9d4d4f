//! Lazy per-kind object dictionaries.
//!
//! Each object kind lives in its own named manifest section. A [`LazyDict`]
//! materializes entries on first access, so the object graph resolves in
//! reference order rather than declaration order: reading a mesh pulls in
//! its accessors, which pull in their buffer views, which pull in their
//! buffers. Ids are registered with the document-wide registry as objects
//! materialize, keeping the id namespace globally unique.

use std::marker::PhantomData;

use hashbrown::HashMap;
use serde_json::Value;

use crate::document::Document;
use crate::error::{AssetError, Result};
use crate::json::JsonMap;

/// Index-based handle to an object held by a document dictionary.
///
/// Handles are plain indices: cheap to copy, stable across buffer growth,
/// and only meaningful against the document that produced them.
pub struct Ref<T> {
    pub(crate) index: u32,
    kind: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    pub(crate) fn new(index: usize) -> Self {
        Ref {
            index: index as u32,
            kind: PhantomData,
        }
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ref<T> {}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Ref<T> {}

impl<T> std::fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ref({})", self.index)
    }
}

/// Capability interface for dictionary-held object kinds.
///
/// The read/write set is closed: every kind the loader resolves and the
/// writer serializes implements this trait, so a missing mapping is a
/// compile error rather than a runtime omission.
pub trait DictObject: Sized {
    /// Manifest section holding this kind.
    const SECTION: &'static str;

    /// When set, the section nests under `extensions.<EXTENSION>`.
    const EXTENSION: Option<&'static str> = None;

    fn new(id: &str) -> Self;
    fn id(&self) -> &str;
    fn name(&self) -> Option<&str>;
    fn set_name(&mut self, name: String);

    fn dict(doc: &Document) -> &LazyDict<Self>;
    fn dict_mut(doc: &mut Document) -> &mut LazyDict<Self>;

    /// Populate kind-specific fields from the manifest object. May resolve
    /// further objects through `doc`; `this` is the object's own handle.
    fn read(&mut self, this: Ref<Self>, obj: &JsonMap, doc: &mut Document) -> Result<()>;

    /// Serialize kind-specific fields; the inverse of [`read`](Self::read).
    /// References are emitted as id strings, absent optionals are omitted.
    fn write(&self, doc: &Document) -> JsonMap;
}

/// Implements the identity/dictionary-plumbing half of [`DictObject`];
/// the type supplies `read_fields`/`write_fields` inherent methods.
macro_rules! dict_object {
    ($ty:ty, $field:ident, $section:literal) => {
        impl crate::dict::DictObject for $ty {
            const SECTION: &'static str = $section;

            fn new(id: &str) -> Self {
                Self {
                    id: id.to_owned(),
                    ..Default::default()
                }
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn name(&self) -> Option<&str> {
                self.name.as_deref()
            }

            fn set_name(&mut self, name: String) {
                self.name = Some(name);
            }

            fn dict(doc: &crate::document::Document) -> &crate::dict::LazyDict<Self> {
                &doc.$field
            }

            fn dict_mut(doc: &mut crate::document::Document) -> &mut crate::dict::LazyDict<Self> {
                &mut doc.$field
            }

            fn read(
                &mut self,
                this: crate::dict::Ref<Self>,
                obj: &crate::json::JsonMap,
                doc: &mut crate::document::Document,
            ) -> crate::error::Result<()> {
                self.read_fields(this, obj, doc)
            }

            fn write(&self, doc: &crate::document::Document) -> crate::json::JsonMap {
                self.write_fields(doc)
            }
        }
    };
}

pub(crate) use dict_object;

/// String id -> lazily materialized object of one kind.
pub struct LazyDict<T> {
    objs: Vec<T>,
    index: HashMap<String, u32>,
    section: Option<JsonMap>,
}

impl<T: DictObject> LazyDict<T> {
    pub(crate) fn new() -> Self {
        LazyDict {
            objs: Vec::new(),
            index: HashMap::new(),
            section: None,
        }
    }

    /// Take this kind's section out of the manifest root. A missing or
    /// non-object section leaves the dictionary unattached.
    pub(crate) fn attach(&mut self, root: &mut JsonMap) {
        let section = match T::EXTENSION {
            None => root.remove(T::SECTION),
            Some(ext) => root
                .get_mut("extensions")
                .and_then(Value::as_object_mut)
                .and_then(|exts| exts.get_mut(ext))
                .and_then(Value::as_object_mut)
                .and_then(|container| container.remove(T::SECTION)),
        };
        if let Some(Value::Object(map)) = section {
            self.section = Some(map);
        }
    }

    /// Drop the manifest binding; later mutation never touches the tree.
    pub(crate) fn detach(&mut self) {
        self.section = None;
    }

    pub(crate) fn lookup(&self, id: &str) -> Option<Ref<T>> {
        self.index.get(id).map(|&i| Ref::new(i as usize))
    }

    /// Remove and return the manifest object for `id`. Each entry is read
    /// exactly once; the materialized object serves all later lookups.
    pub(crate) fn take_source(&mut self, id: &str) -> Result<JsonMap> {
        let section = self
            .section
            .as_mut()
            .ok_or(AssetError::MissingSection(T::SECTION))?;
        let value = section.remove(id).ok_or_else(|| AssetError::MissingObject {
            section: T::SECTION,
            id: id.to_owned(),
        })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(AssetError::MalformedObject {
                section: T::SECTION,
                id: id.to_owned(),
            }),
        }
    }

    /// Insert a fresh instance for `id` and hand out its handle. The slot
    /// exists from this point on, so cyclic references resolve to it while
    /// its fields are still being read.
    pub(crate) fn reserve(&mut self, id: &str) -> Ref<T> {
        let r = Ref::new(self.objs.len());
        self.objs.push(T::new(id));
        self.index.insert(id.to_owned(), r.index);
        r
    }

    pub(crate) fn fill(&mut self, r: Ref<T>, obj: T) {
        self.objs[r.index as usize] = obj;
    }

    pub fn len(&self) -> usize {
        self.objs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }

    pub(crate) fn get(&self, r: Ref<T>) -> &T {
        &self.objs[r.index as usize]
    }

    pub(crate) fn get_mut(&mut self, r: Ref<T>) -> &mut T {
        &mut self.objs[r.index as usize]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.objs.iter()
    }
}
