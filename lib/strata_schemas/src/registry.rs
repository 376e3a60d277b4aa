//! Named lookup tables shared by every generation stage: blocks, biomes and ores are each registered once under a
//! namespaced name and then referred to by a compact numeric ID inside chunks and biome maps.
use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::num::{NonZeroU32, TryFromIntError};
use std::sync::Arc;

use hashbrown::{Equivalent, HashMap};
use kstring::{KString, KStringRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace of the builtin world generation content.
pub const STRATA_NAMESPACE: &str = "strata";

/// Checks if the given name part is made of `[a-z0-9_]+`.
pub const fn is_valid_registry_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' | b'a'..=b'z' | b'_' => {}
            _ => return false,
        }
        i += 1;
    }
    true
}

/// A `namespace:key` name of a block, biome, ore or generation stage.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct RegistryName {
    /// The namespace
    pub ns: KString,
    /// The object name, unique in the namespace
    pub key: KString,
}

/// Borrowed form of [`RegistryName`], used for lookups without allocating.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct RegistryNameRef<'n> {
    /// The namespace
    pub ns: KStringRef<'n>,
    /// The object name, unique in the namespace
    pub key: KStringRef<'n>,
}

impl RegistryName {
    /// A name in the builtin `strata` namespace.
    pub fn strata(key: &str) -> Self {
        Self::new(STRATA_NAMESPACE, key)
    }

    /// Compile time form of [`Self::strata`], for the builtin content constants.
    pub const fn strata_const(key: &'static str) -> Self {
        Self {
            ns: KString::from_static(STRATA_NAMESPACE),
            key: KString::from_static(key),
        }
    }

    /// Constructs a name out of the given namespace and key.
    pub fn new(ns: &str, key: &str) -> Self {
        Self {
            ns: KString::from_ref(ns),
            key: KString::from_ref(key),
        }
    }

    /// Parses a `ns:key` string as written in biome and block structure descriptions.
    /// A bare `key` is placed in the `strata` namespace.
    pub fn parse(name: &str) -> Self {
        match name.split_once(':') {
            Some((ns, key)) => Self::new(ns, key),
            None => Self::strata(name),
        }
    }

    /// Both parts are made of `[a-z0-9_]+`.
    pub fn is_valid(&self) -> bool {
        is_valid_registry_name(&self.ns) && is_valid_registry_name(&self.key)
    }

    /// Converts the name to a reference struct.
    pub fn as_ref(&self) -> RegistryNameRef {
        self.into()
    }
}

impl RegistryNameRef<'_> {
    /// Converts the name to an owned struct, copying the strings as needed
    pub fn to_owned(&self) -> RegistryName {
        self.into()
    }
}

impl Equivalent<RegistryName> for RegistryNameRef<'_> {
    fn equivalent(&self, key: &RegistryName) -> bool {
        key.as_ref() == *self
    }
}

impl<'a> From<&'a RegistryName> for RegistryNameRef<'a> {
    fn from(value: &'a RegistryName) -> Self {
        RegistryNameRef {
            ns: value.ns.as_ref(),
            key: value.key.as_ref(),
        }
    }
}

impl<'a> From<&RegistryNameRef<'a>> for RegistryName {
    fn from(value: &RegistryNameRef<'a>) -> Self {
        RegistryName {
            ns: value.ns.into(),
            key: value.key.into(),
        }
    }
}

impl Display for RegistryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ns, self.key)
    }
}

impl Display for RegistryNameRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ns, self.key)
    }
}

/// Numeric handle of a registered object. IDs start at 1 and follow registration order.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RegistryId(pub NonZeroU32);

impl RegistryId {
    /// The ID of the first registered object.
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(Self)
    }

    fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl Display for RegistryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<u32> for RegistryId {
    type Error = TryFromIntError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(Self(NonZeroU32::try_from(value)?))
    }
}

/// Implemented by everything that can be registered: block definitions, biomes and ores.
pub trait RegistryObject: PartialEq + Hash {
    /// The name the object is registered under.
    fn registry_name(&self) -> RegistryNameRef;
}

impl<O: RegistryObject> RegistryObject for Arc<O> {
    fn registry_name(&self) -> RegistryNameRef {
        O::registry_name(self)
    }
}

/// Possible errors from Registry operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The name given is not a made of legal registry keys.
    #[error("Name {name} is not a legal registry name (made of `[a-z0-9_]+` namespace and key)")]
    IllegalName {
        /// The offending name.
        name: RegistryName,
    },
    /// Every name can be registered only once.
    #[error("Name {name} already exists in the registry")]
    NameAlreadyExists {
        /// The conflicting name.
        name: RegistryName,
    },
    /// A lookup by name found nothing.
    #[error("Name {name} is not registered")]
    UnknownName {
        /// The missing name.
        name: RegistryName,
    },
    /// All 2^32-1 IDs are taken.
    #[error("No free space in the registry")]
    NoFreeSpace,
}

/// Objects addressable both by [`RegistryName`] and by a dense [`RegistryId`].
///
/// Objects are never removed, so the ID of an object is its position in registration order plus one, and
/// [`Registry::iter_ordered`] replays registration order. That order is what makes biome and ore selection
/// reproducible for a seed.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registry<Object: RegistryObject> {
    objects: Vec<Object>,
    name_to_id: HashMap<RegistryName, RegistryId>,
}

impl<Object: RegistryObject> Default for Registry<Object> {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            name_to_id: HashMap::with_capacity(64),
        }
    }
}

impl<Object: RegistryObject> Registry<Object> {
    /// A registry holding a single object at [`RegistryId::FIRST`].
    ///
    /// The object's name must be valid, which is checked in debug builds only.
    pub(crate) fn with_first(object: Object) -> Self {
        let name = object.registry_name().to_owned();
        debug_assert!(name.is_valid(), "{name} is not a legal registry name");
        let mut registry = Self::default();
        registry.name_to_id.insert(name, RegistryId::FIRST);
        registry.objects.push(object);
        registry
    }

    /// Registers the object under the next free ID.
    /// On failure the registry is left unchanged.
    pub fn push_object(&mut self, object: Object) -> Result<RegistryId, RegistryError> {
        let name = object.registry_name().to_owned();
        if !name.is_valid() {
            return Err(RegistryError::IllegalName { name });
        }
        if self.name_to_id.contains_key(&name) {
            return Err(RegistryError::NameAlreadyExists { name });
        }
        let id = RegistryId::from_index(self.objects.len()).ok_or(RegistryError::NoFreeSpace)?;
        self.objects.push(object);
        self.name_to_id.insert(name, id);
        Ok(id)
    }

    /// Looks up an object and its ID by name.
    pub fn lookup_name_to_object(&self, name: RegistryNameRef) -> Option<(RegistryId, &Object)> {
        let id = *self.name_to_id.get(&name)?;
        Some((id, self.objects.get(id.index())?))
    }

    /// Like [`Self::lookup_name_to_object`], but reports a missing name as an error.
    pub fn require(&self, name: RegistryNameRef) -> Result<(RegistryId, &Object), RegistryError> {
        self.lookup_name_to_object(name)
            .ok_or_else(|| RegistryError::UnknownName { name: name.to_owned() })
    }

    /// Looks up an object by ID.
    pub fn lookup_id_to_object(&self, id: RegistryId) -> Option<&Object> {
        self.objects.get(id.index())
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Checks if nothing was registered yet.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over all objects in registration order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = (RegistryId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(index, obj)| Some((RegistryId::from_index(index)?, obj)))
    }
}

#[cfg(test)]
mod test {
    use quickcheck_macros::quickcheck;

    use super::*;

    #[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
    struct DummyObject(RegistryName);

    impl RegistryObject for DummyObject {
        fn registry_name(&self) -> RegistryNameRef {
            self.0.as_ref()
        }
    }

    fn dummy(key: &str) -> DummyObject {
        DummyObject(RegistryName::strata(key))
    }

    #[test]
    fn push_and_lookup() {
        let mut reg: Registry<DummyObject> = Registry::default();
        let a_id = reg.push_object(dummy("a")).unwrap();
        let b_id = reg.push_object(dummy("b")).unwrap();
        assert_eq!(a_id, RegistryId::FIRST);
        assert_eq!(b_id, RegistryId::try_from(2).unwrap());
        assert_eq!(
            reg.push_object(dummy("a")),
            Err(RegistryError::NameAlreadyExists {
                name: RegistryName::strata("a")
            })
        );
        assert_eq!(reg.len(), 2);

        assert_eq!(reg.lookup_id_to_object(b_id).map(|o| o.0.key.as_str()), Some("b"));
        assert_eq!(reg.lookup_id_to_object(RegistryId::try_from(3).unwrap()), None);

        let dyn_a = RegistryName::new(&String::from("strata"), &String::from("a"));
        assert_eq!(
            reg.lookup_name_to_object(dyn_a.as_ref()).map(|(id, o)| (id, o.0.key.as_str())),
            Some((a_id, "a"))
        );
        assert_eq!(
            reg.require(RegistryName::strata("c").as_ref()).unwrap_err(),
            RegistryError::UnknownName {
                name: RegistryName::strata("c")
            }
        );
    }

    #[test]
    fn illegal_names_are_rejected() {
        let mut reg: Registry<DummyObject> = Registry::default();
        assert!(matches!(
            reg.push_object(DummyObject(RegistryName::new("strata", "Upper Case"))),
            Err(RegistryError::IllegalName { .. })
        ));
        assert!(matches!(
            reg.push_object(DummyObject(RegistryName::new("", "empty_ns"))),
            Err(RegistryError::IllegalName { .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn seeded_registry_continues_after_the_first_object() {
        let mut reg = Registry::with_first(dummy("empty"));
        assert_eq!(reg.require(RegistryName::strata("empty").as_ref()).map(|(id, _)| id), Ok(RegistryId::FIRST));
        assert_eq!(reg.push_object(dummy("stone")).ok(), RegistryId::try_from(2).ok());
        assert!(reg.push_object(dummy("empty")).is_err());
    }

    #[quickcheck]
    fn ids_follow_registration_order(keys: Vec<u8>) -> bool {
        let mut reg: Registry<DummyObject> = Registry::default();
        let mut expected = Vec::new();
        for key in keys {
            let name = format!("k{key}");
            if let Ok(id) = reg.push_object(dummy(&name)) {
                expected.push((id, name));
            }
        }
        let ordered: Vec<(RegistryId, String)> =
            reg.iter_ordered().map(|(id, o)| (id, o.0.key.to_string())).collect();
        ordered == expected
            && expected
                .iter()
                .enumerate()
                .all(|(i, (id, name))| id.0.get() as usize == i + 1 && reg.require(RegistryName::strata(name).as_ref()).is_ok())
    }

    #[test]
    fn parse_names() {
        assert_eq!(RegistryName::parse("strata:stone"), RegistryName::strata_const("stone"));
        assert_eq!(RegistryName::parse("stone"), RegistryName::strata("stone"));
        assert_eq!(RegistryName::parse("mymod:ruby").ns.as_str(), "mymod");
        assert!(!RegistryName::parse("Mymod:ruby").is_valid());
        assert_eq!(RegistryName::strata("x").to_string(), "strata:x");
    }
}
