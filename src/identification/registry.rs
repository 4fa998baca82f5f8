use std::sync::Arc;

use crate::{
    identification::{
        ClassIdentifier, FieldIdentifier, IdentifierKind, InstructionIdentifier, MethodIdentifier,
        SearchPurpose,
    },
    Error, Result,
};

/// Maps a symbolic id to an identifier.
///
/// Implemented for every `Fn(&str, SearchPurpose) -> Option<I>`.
pub trait Mapper<I>: Send + Sync {
    /// Identifier for `id`, or `None` if this mapper does not know the id for `purpose`.
    fn map(&self, id: &str, purpose: SearchPurpose) -> Option<I>;
}

impl<I, F> Mapper<I> for F
where
    F: Fn(&str, SearchPurpose) -> Option<I> + Send + Sync,
{
    fn map(&self, id: &str, purpose: SearchPurpose) -> Option<I> {
        self(id, purpose)
    }
}

/// Id-keyed registrations queried in registration order.
///
/// Registering an existing id replaces its value in place.
pub(crate) struct Registrations<T: ?Sized> {
    entries: Vec<(String, Arc<T>)>,
}

impl<T: ?Sized> Default for Registrations<T> {
    fn default() -> Self {
        Registrations {
            entries: Vec::new(),
        }
    }
}

impl<T: ?Sized> Clone for Registrations<T> {
    fn clone(&self) -> Self {
        Registrations {
            entries: self.entries.clone(),
        }
    }
}

impl<T: ?Sized> Registrations<T> {
    pub(crate) fn insert(&mut self, id: &str, value: Arc<T>) {
        match self.entries.iter_mut().find(|(key, _)| key == id) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((id.to_string(), value)),
        }
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(key, _)| key != id);
        self.entries.len() != before
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.iter().map(|(_, value)| value)
    }
}

#[derive(Default, Clone)]
struct Mappers {
    classes: Registrations<dyn Mapper<ClassIdentifier>>,
    fields: Registrations<dyn Mapper<FieldIdentifier>>,
    methods: Registrations<dyn Mapper<MethodIdentifier>>,
    instructions: Registrations<dyn Mapper<InstructionIdentifier>>,
}

fn first_match<I>(
    mappers: &Registrations<dyn Mapper<I>>,
    id: &str,
    purpose: SearchPurpose,
) -> Option<I> {
    mappers.values().find_map(|mapper| mapper.map(id, purpose))
}

macro_rules! lookups {
    ($(#[$doc:meta] $name:ident, $field:ident, $ty:ty;)*) => {
        $(
            #[$doc]
            ///
            /// Mappers are queried in registration order; the first answer wins.
            #[must_use]
            pub fn $name(&self, id: &str, purpose: SearchPurpose) -> Option<$ty> {
                first_match(&self.mappers.$field, id, purpose)
            }
        )*
    };
}

/// Collects mapper registrations during initialization.
///
/// Consumed by [`MapperRegistryBuilder::build`]; once built, the set of mappers cannot change.
#[derive(Default)]
pub struct MapperRegistryBuilder {
    mappers: Mappers,
}

impl MapperRegistryBuilder {
    /// Create a builder with no mappers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class mapper under `id`.
    pub fn register_class_mapper(
        &mut self,
        id: &str,
        mapper: impl Mapper<ClassIdentifier> + 'static,
    ) {
        self.mappers.classes.insert(id, Arc::new(mapper));
    }

    /// Remove the class mapper registered under `id`.
    pub fn unregister_class_mapper(&mut self, id: &str) -> bool {
        self.mappers.classes.remove(id)
    }

    /// Register a field mapper under `id`.
    pub fn register_field_mapper(
        &mut self,
        id: &str,
        mapper: impl Mapper<FieldIdentifier> + 'static,
    ) {
        self.mappers.fields.insert(id, Arc::new(mapper));
    }

    /// Remove the field mapper registered under `id`.
    pub fn unregister_field_mapper(&mut self, id: &str) -> bool {
        self.mappers.fields.remove(id)
    }

    /// Register a method mapper under `id`.
    pub fn register_method_mapper(
        &mut self,
        id: &str,
        mapper: impl Mapper<MethodIdentifier> + 'static,
    ) {
        self.mappers.methods.insert(id, Arc::new(mapper));
    }

    /// Remove the method mapper registered under `id`.
    pub fn unregister_method_mapper(&mut self, id: &str) -> bool {
        self.mappers.methods.remove(id)
    }

    /// Register an instruction mapper under `id`.
    pub fn register_instruction_mapper(
        &mut self,
        id: &str,
        mapper: impl Mapper<InstructionIdentifier> + 'static,
    ) {
        self.mappers.instructions.insert(id, Arc::new(mapper));
    }

    /// Remove the instruction mapper registered under `id`.
    pub fn unregister_instruction_mapper(&mut self, id: &str) -> bool {
        self.mappers.instructions.remove(id)
    }

    lookups! {
        /// Class identifier for `id`, from the mappers registered so far.
        class_identifier, classes, ClassIdentifier;
        /// Field identifier for `id`, from the mappers registered so far.
        field_identifier, fields, FieldIdentifier;
        /// Method identifier for `id`, from the mappers registered so far.
        method_identifier, methods, MethodIdentifier;
    }

    /// Freeze the registrations.
    #[must_use]
    pub fn build(self) -> MapperRegistry {
        MapperRegistry {
            mappers: self.mappers,
        }
    }
}

/// The frozen set of mappers.
#[derive(Clone)]
pub struct MapperRegistry {
    mappers: Mappers,
}

impl MapperRegistry {
    lookups! {
        /// Class identifier for `id`.
        class_identifier, classes, ClassIdentifier;
        /// Field identifier for `id`.
        field_identifier, fields, FieldIdentifier;
        /// Method identifier for `id`.
        method_identifier, methods, MethodIdentifier;
        /// Instruction or local-variable identifier for `id`.
        instruction_identifier, instructions, InstructionIdentifier;
    }

    /// Ids of the registered class mappers, in registration order.
    pub fn class_mapper_ids(&self) -> impl Iterator<Item = &str> {
        self.mappers.classes.ids()
    }

    /// Like [`MapperRegistry::instruction_identifier`], but fails unless the identifier is of
    /// `expected` kind.
    ///
    /// # Errors
    /// Returns [`Error::NotMapped`] if no mapper answers and [`Error::WrongIdentifierKind`] if the
    /// answer locates the wrong kind of element.
    pub fn require_instruction(
        &self,
        owner: &str,
        id: &str,
        purpose: SearchPurpose,
        expected: IdentifierKind,
    ) -> Result<InstructionIdentifier> {
        let Some(identifier) = self.instruction_identifier(id, purpose) else {
            return Err(Error::NotMapped {
                owner: owner.to_string(),
                kind: expected,
                id: id.to_string(),
            });
        };
        if IdentifierKind::from(identifier.kind()) != expected {
            return Err(Error::WrongIdentifierKind {
                owner: owner.to_string(),
                id: id.to_string(),
                expected,
            });
        }
        Ok(identifier)
    }
}
