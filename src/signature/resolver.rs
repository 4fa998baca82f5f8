//! Binding of free type variables to their declaring formals.

use std::collections::{HashMap, HashSet};

use crate::{
    signature::{FormalTypeParameter, Signature},
    topology::{ClassTopology, LoaderRef},
    Result,
};

/// Resolves the type variables of a signature through its enclosing scopes.
///
/// A variable is bound by the nearest scope declaring it: the signature itself, then its owner
/// class, then the owner's outer classes. Variables referenced by the bounds of a bound formal are
/// resolved as well. Variables of local classes declared inside generic methods cannot be
/// resolved and are left out of the result.
pub struct SignatureTypesResolver<'a> {
    topology: &'a ClassTopology,
    loader: &'a LoaderRef,
}

impl<'a> SignatureTypesResolver<'a> {
    /// Create a resolver looking classes up through `topology` for `loader`.
    #[must_use]
    pub fn new(topology: &'a ClassTopology, loader: &'a LoaderRef) -> Self {
        SignatureTypesResolver { topology, loader }
    }

    /// Resolve the variables of `signature`, declared in class `owner`.
    ///
    /// # Errors
    /// Returns decoding errors of scope classes or of their `Signature` attributes.
    pub fn resolve(
        &self,
        owner: &str,
        signature: &Signature,
    ) -> Result<HashMap<String, FormalTypeParameter>> {
        let mut pending = signature.variables();
        let mut resolved = HashMap::new();
        bind(signature, &mut pending, &mut resolved);

        let mut scope = Some(owner.to_string());
        let mut visited = HashSet::new();
        while !pending.is_empty() {
            let Some(name) = scope.take() else {
                break;
            };
            if !visited.insert(name.clone()) {
                break;
            }
            let Some(entry) = self.topology.get_class(self.loader, &name)? else {
                break;
            };
            if let Some(class_signature) = entry.parsed_signature()? {
                bind(&class_signature, &mut pending, &mut resolved);
            }
            scope.clone_from(&entry.outer_name);
        }
        Ok(resolved)
    }
}

fn bind(
    scope: &Signature,
    pending: &mut HashSet<String>,
    resolved: &mut HashMap<String, FormalTypeParameter>,
) {
    // Bounds may reference formals declared earlier in the same scope.
    loop {
        let mut bound = false;
        for formal in &scope.formal_type_parameters {
            if !pending.contains(&formal.name) || resolved.contains_key(&formal.name) {
                continue;
            }
            pending.extend(formal.variables());
            resolved.insert(formal.name.clone(), formal.clone());
            bound = true;
        }
        if !bound {
            break;
        }
    }
    pending.retain(|name| !resolved.contains_key(name));
}
