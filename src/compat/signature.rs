//! Return-signature compatibility of interceptor contexts.

use std::collections::HashMap;

use crate::{
    compat::{CompatibilityChecker, OBJECT},
    signature::{
        ClassType, FormalTypeParameter, Signature, SignatureTypesResolver, TypeArg, TypeSymbol,
    },
    topology::LoaderRef,
    Error, Result,
};

type Formals = HashMap<String, FormalTypeParameter>;

/// One side of a comparison: the type variables in scope where a symbol was written.
#[derive(Clone, Copy)]
struct Scope<'s> {
    formals: &'s Formals,
}

impl Scope<'_> {
    /// Replace a type variable by its first non-variable bound, keeping array dimensions. Base
    /// types become their boxes.
    fn normalize(&self, symbol: &TypeSymbol) -> TypeSymbol {
        match symbol {
            TypeSymbol::Variable { name, dims } => {
                let mut current = name;
                let mut bound = TypeSymbol::class(OBJECT);
                for _ in 0..=self.formals.len() {
                    match self.formals.get(current).and_then(|f| f.bounds().next()) {
                        Some(TypeSymbol::Variable { name: next, .. }) => current = next,
                        Some(other) => {
                            bound = other.clone();
                            break;
                        }
                        None => break,
                    }
                }
                let total = bound.dims() + dims;
                bound.with_dims(total)
            }
            TypeSymbol::Base {
                descriptor,
                dims: 0,
            } => TypeSymbol::class(box_name(*descriptor)),
            other => other.clone(),
        }
    }
}

fn box_name(descriptor: char) -> &'static str {
    match descriptor {
        'Z' => "java/lang/Boolean",
        'B' => "java/lang/Byte",
        'C' => "java/lang/Character",
        'S' => "java/lang/Short",
        'I' => "java/lang/Integer",
        'F' => "java/lang/Float",
        'J' => "java/lang/Long",
        'D' => "java/lang/Double",
        _ => "java/lang/Void",
    }
}

impl CompatibilityChecker<'_> {
    /// Check that an interceptor's context, declared `InterceptorContext<arg>` in the contract
    /// `contract_owner`, accepts the generic return type of a target method of `target_owner`.
    ///
    /// Type variables of both sides are resolved through their declaring scopes and replaced by
    /// their bounds; base types compare as their boxes. The context argument then decides:
    /// `?` accepts anything, an exact argument must match invariantly, `? extends` accepts
    /// subtypes and `? super` accepts supertypes.
    ///
    /// # Errors
    /// Returns [`Error::SignatureMismatch`] if the types are incompatible and
    /// [`Error::ResolutionFailed`] if a class hierarchy on the way cannot be resolved.
    pub fn check_return_signature(
        &self,
        loader: &LoaderRef,
        target_owner: &str,
        target_signature: &Signature,
        contract_owner: &str,
        interceptor_signature: &Signature,
        context_type: &ClassType,
    ) -> Result<()> {
        let Some(target_return) = &target_signature.return_type else {
            return Ok(());
        };
        let Some(context_arg) = context_type.args().first() else {
            return Ok(());
        };

        let resolver = SignatureTypesResolver::new(self.topology, loader);
        let target_formals = resolver.resolve(target_owner, target_signature)?;
        let interceptor_formals = resolver.resolve(contract_owner, interceptor_signature)?;

        let declared = Scope {
            formals: &interceptor_formals,
        };
        let concrete = Scope {
            formals: &target_formals,
        };
        let returned = TypeArg::Exact(target_return.clone());
        if self.contains(loader, declared, context_arg, concrete, &returned)? {
            return Ok(());
        }

        let expected = format_scope(&target_formals, target_return);
        let actual = format_scope(&interceptor_formals, context_arg);
        Err(Error::SignatureMismatch {
            owner: contract_owner.to_string(),
            expected,
            actual,
        })
    }

    /// Returns `true` if the declared type argument contains the concrete one.
    fn contains(
        &self,
        loader: &LoaderRef,
        declared_scope: Scope<'_>,
        declared: &TypeArg,
        concrete_scope: Scope<'_>,
        concrete: &TypeArg,
    ) -> Result<bool> {
        let object = TypeSymbol::class(OBJECT);
        match (declared, concrete) {
            (TypeArg::Unbounded, _) => Ok(true),
            (TypeArg::Extends(upper), TypeArg::Exact(value) | TypeArg::Extends(value)) => {
                self.subtype(loader, concrete_scope, value, declared_scope, upper)
            }
            (TypeArg::Extends(upper), TypeArg::Unbounded | TypeArg::Super(_)) => {
                self.subtype(loader, concrete_scope, &object, declared_scope, upper)
            }
            (TypeArg::Super(lower), TypeArg::Exact(value) | TypeArg::Super(value)) => {
                self.subtype(loader, declared_scope, lower, concrete_scope, value)
            }
            (TypeArg::Exact(expected), TypeArg::Exact(value)) => {
                self.same(loader, declared_scope, expected, concrete_scope, value)
            }
            _ => Ok(false),
        }
    }

    /// Returns `true` if `sub` is assignable to `sup`.
    fn subtype(
        &self,
        loader: &LoaderRef,
        sub_scope: Scope<'_>,
        sub: &TypeSymbol,
        sup_scope: Scope<'_>,
        sup: &TypeSymbol,
    ) -> Result<bool> {
        let sub = sub_scope.normalize(sub);
        let sup = sup_scope.normalize(sup);
        if !self.is_assignable(loader, &sub.erasure()?, &sup.erasure()?)? {
            return Ok(false);
        }
        // Arguments are only comparable when both sides name the same class.
        match (&sub, &sup) {
            (TypeSymbol::Class(sub_class), TypeSymbol::Class(sup_class))
                if sub_class.internal_name() == sup_class.internal_name() =>
            {
                self.arguments(loader, sup_scope, sup_class, sub_scope, sub_class)
            }
            _ => Ok(true),
        }
    }

    /// Returns `true` if both symbols denote the same type.
    fn same(
        &self,
        loader: &LoaderRef,
        left_scope: Scope<'_>,
        left: &TypeSymbol,
        right_scope: Scope<'_>,
        right: &TypeSymbol,
    ) -> Result<bool> {
        let left = left_scope.normalize(left);
        let right = right_scope.normalize(right);
        if left.erasure()? != right.erasure()? {
            return Ok(false);
        }
        match (&left, &right) {
            (TypeSymbol::Class(left_class), TypeSymbol::Class(right_class)) => {
                self.arguments(loader, left_scope, left_class, right_scope, right_class)
            }
            _ => Ok(true),
        }
    }

    /// Pairwise containment of type arguments. Raw types accept any arguments.
    fn arguments(
        &self,
        loader: &LoaderRef,
        declared_scope: Scope<'_>,
        declared: &ClassType,
        concrete_scope: Scope<'_>,
        concrete: &ClassType,
    ) -> Result<bool> {
        let (declared_args, concrete_args) = (declared.args(), concrete.args());
        if declared_args.is_empty() || concrete_args.is_empty() {
            return Ok(true);
        }
        if declared_args.len() != concrete_args.len() {
            return Ok(false);
        }
        for (declared_arg, concrete_arg) in declared_args.iter().zip(concrete_args) {
            if !self.contains(loader, declared_scope, declared_arg, concrete_scope, concrete_arg)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn format_scope(formals: &Formals, symbol: &impl std::fmt::Display) -> String {
    let mut names: Vec<_> = formals.values().map(ToString::to_string).collect();
    names.sort();
    format!("<{}> {symbol}", names.join(", "))
}
