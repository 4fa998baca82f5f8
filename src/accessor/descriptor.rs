//! Decoded form of a contract interface.

use crate::{
    classfile::{AccessFlags, ClassNode, ClassReader, MethodNode, ReaderFlags},
    runtime::abi::annotations as abi,
    Error, Result,
};

/// What a contract member asks the weaver to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRole {
    /// No role; only allowed for static and default members
    None,
    /// Proxy to a target method
    MethodAccessor {
        /// Method identifier id
        method_identifier: String,
    },
    /// Getter or setter of an existing field
    FieldAccessor {
        /// Field identifier id
        field_identifier: String,
    },
    /// Getter or setter of a field added if absent
    FieldGenerator {
        /// Field name identifier id
        field_name_identifier: String,
    },
    /// Call-out inserted into a target method
    Interceptor {
        /// Method identifier id
        method_identifier: String,
        /// Entry instruction identifier id
        entry_identifier: String,
        /// Exit instruction identifier ids, in exit-index order
        exit_identifiers: Vec<String>,
    },
}

/// Per-parameter metadata of a contract member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Instruction identifier id of the local variable this parameter imports
    pub local_variable: Option<String>,
    /// Skip the return-signature check for this (context) parameter
    pub unchecked_signature: bool,
}

/// One method of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Generic signature
    pub signature: Option<String>,
    /// Access flags
    pub access: AccessFlags,
    /// Declared checked exceptions
    pub exceptions: Vec<String>,
    /// Requested role
    pub role: MemberRole,
    /// Parameter metadata, possibly shorter than the parameter list
    pub parameters: Vec<ParameterDescriptor>,
}

impl MemberDescriptor {
    fn new(access: AccessFlags, name: &str, descriptor: &str, role: MemberRole) -> Self {
        MemberDescriptor {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
            access,
            exceptions: Vec::new(),
            role,
            parameters: Vec::new(),
        }
    }

    /// An abstract method proxying the method `method_identifier` names.
    #[must_use]
    pub fn method_accessor(name: &str, descriptor: &str, method_identifier: &str) -> Self {
        let role = MemberRole::MethodAccessor {
            method_identifier: method_identifier.to_string(),
        };
        MemberDescriptor::new(abstract_access(), name, descriptor, role)
    }

    /// An abstract getter or setter of the field `field_identifier` names.
    #[must_use]
    pub fn field_accessor(name: &str, descriptor: &str, field_identifier: &str) -> Self {
        let role = MemberRole::FieldAccessor {
            field_identifier: field_identifier.to_string(),
        };
        MemberDescriptor::new(abstract_access(), name, descriptor, role)
    }

    /// An abstract getter or setter of a field named by `field_name_identifier`.
    #[must_use]
    pub fn field_generator(name: &str, descriptor: &str, field_name_identifier: &str) -> Self {
        let role = MemberRole::FieldGenerator {
            field_name_identifier: field_name_identifier.to_string(),
        };
        MemberDescriptor::new(abstract_access(), name, descriptor, role)
    }

    /// A default method called before the instruction `entry_identifier` selects in the method
    /// `method_identifier` selects.
    #[must_use]
    pub fn interceptor(
        name: &str,
        descriptor: &str,
        method_identifier: &str,
        entry_identifier: &str,
    ) -> Self {
        let role = MemberRole::Interceptor {
            method_identifier: method_identifier.to_string(),
            entry_identifier: entry_identifier.to_string(),
            exit_identifiers: Vec::new(),
        };
        MemberDescriptor::new(AccessFlags::PUBLIC, name, descriptor, role)
    }

    /// A member without role.
    #[must_use]
    pub fn plain(access: AccessFlags, name: &str, descriptor: &str) -> Self {
        MemberDescriptor::new(access, name, descriptor, MemberRole::None)
    }

    /// Set the generic signature.
    #[must_use]
    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    /// Set the declared exceptions.
    #[must_use]
    pub fn with_exceptions(mut self, exceptions: &[&str]) -> Self {
        self.exceptions = exceptions.iter().map(|e| (*e).to_string()).collect();
        self
    }

    /// Append exit identifier ids of an interceptor.
    #[must_use]
    pub fn with_exits(mut self, exits: &[&str]) -> Self {
        if let MemberRole::Interceptor {
            exit_identifiers, ..
        } = &mut self.role
        {
            exit_identifiers.extend(exits.iter().map(|e| (*e).to_string()));
        }
        self
    }

    fn parameter_mut(&mut self, index: usize) -> &mut ParameterDescriptor {
        if self.parameters.len() <= index {
            self.parameters
                .resize_with(index + 1, ParameterDescriptor::default);
        }
        &mut self.parameters[index]
    }

    /// Import the local variable `identifier` selects as parameter `index`.
    #[must_use]
    pub fn with_local(mut self, index: usize, identifier: &str) -> Self {
        self.parameter_mut(index).local_variable = Some(identifier.to_string());
        self
    }

    /// Disable the return-signature check on parameter `index`.
    #[must_use]
    pub fn unchecked(mut self, index: usize) -> Self {
        self.parameter_mut(index).unchecked_signature = true;
        self
    }

    /// Metadata of parameter `index`.
    #[must_use]
    pub fn parameter(&self, index: usize) -> Option<&ParameterDescriptor> {
        self.parameters.get(index)
    }

    /// `name + descriptor`, as used in diagnostics.
    #[must_use]
    pub fn display_name(&self, owner: &str) -> String {
        format!("{owner}.{}{}", self.name, self.descriptor)
    }

    fn from_method(method: &MethodNode, contract: &str) -> Result<Self> {
        let mut roles = Vec::new();
        if let Some(annotation) = method.annotation(abi::METHOD_ACCESSOR) {
            roles.push(MemberRole::MethodAccessor {
                method_identifier: required(annotation.string(abi::METHOD_IDENTIFIER), method, contract)?,
            });
        }
        if let Some(annotation) = method.annotation(abi::FIELD_ACCESSOR) {
            roles.push(MemberRole::FieldAccessor {
                field_identifier: required(annotation.string(abi::FIELD_IDENTIFIER), method, contract)?,
            });
        }
        if let Some(annotation) = method.annotation(abi::FIELD_GENERATOR) {
            roles.push(MemberRole::FieldGenerator {
                field_name_identifier: required(
                    annotation.string(abi::FIELD_NAME_IDENTIFIER),
                    method,
                    contract,
                )?,
            });
        }
        if let Some(annotation) = method.annotation(abi::INTERCEPTOR) {
            roles.push(MemberRole::Interceptor {
                method_identifier: required(annotation.string(abi::METHOD_IDENTIFIER), method, contract)?,
                entry_identifier: required(
                    annotation.string(abi::INSTRUCTION_IDENTIFIER),
                    method,
                    contract,
                )?,
                exit_identifiers: annotation.strings(abi::EXIT_INSTRUCTION_IDENTIFIERS),
            });
        }
        if roles.len() > 1 {
            return Err(Error::InvalidContract {
                contract: contract.to_string(),
                message: format!("{}{} declares more than one role", method.name, method.desc),
            });
        }

        let parameters = method
            .visible_parameter_annotations
            .iter()
            .map(|annotations| {
                let find = |desc: &str| annotations.iter().find(|a| a.desc == desc);
                ParameterDescriptor {
                    local_variable: find(abi::LOCAL_VAR)
                        .and_then(|a| a.string(abi::INSTRUCTION_IDENTIFIER))
                        .map(str::to_string),
                    unchecked_signature: find(abi::UNCHECKED_SIGNATURE)
                        .is_some_and(|a| a.boolean(abi::UNCHECKED_OUT).unwrap_or(true)),
                }
            })
            .collect();

        Ok(MemberDescriptor {
            name: method.name.clone(),
            descriptor: method.desc.clone(),
            signature: method.signature.clone(),
            access: method.access,
            exceptions: method.exceptions.clone(),
            role: roles.pop().unwrap_or(MemberRole::None),
            parameters,
        })
    }
}

fn abstract_access() -> AccessFlags {
    AccessFlags::PUBLIC | AccessFlags::ABSTRACT
}

fn required(value: Option<&str>, method: &MethodNode, contract: &str) -> Result<String> {
    value.map(str::to_string).ok_or_else(|| Error::InvalidContract {
        contract: contract.to_string(),
        message: format!("{}{} has an incomplete role annotation", method.name, method.desc),
    })
}

/// A contract interface, ready for registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    /// Internal name of the contract
    pub name: String,
    /// Access flags; contracts must be interfaces
    pub access: AccessFlags,
    /// Class identifier id of the target class
    pub class_identifier: Option<String>,
    /// Members in declaration order
    pub members: Vec<MemberDescriptor>,
}

impl ContractDescriptor {
    /// Start a public contract interface targeting the class `class_identifier` names.
    #[must_use]
    pub fn builder(name: &str, class_identifier: &str) -> ContractDescriptor {
        ContractDescriptor {
            name: name.to_string(),
            access: AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
            class_identifier: Some(class_identifier.to_string()),
            members: Vec::new(),
        }
    }

    /// Add a member.
    #[must_use]
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    /// Decode a contract from its class node, reading the contract annotations of the runtime
    /// ABI.
    ///
    /// # Errors
    /// Returns [`Error::InvalidContract`] if a member carries several roles or a role annotation
    /// lacks its identifier id.
    pub fn from_class(node: &ClassNode) -> Result<Self> {
        let class_identifier = node
            .annotation(abi::CLASS_ACCESSOR)
            .and_then(|a| a.string(abi::CLASS_IDENTIFIER))
            .map(str::to_string);
        let mut members = Vec::with_capacity(node.methods.len());
        for method in &node.methods {
            if method.name == "<clinit>" {
                continue;
            }
            members.push(MemberDescriptor::from_method(method, &node.name)?);
        }
        Ok(ContractDescriptor {
            name: node.name.clone(),
            access: node.access,
            class_identifier,
            members,
        })
    }

    /// Decode a contract from class-file bytes.
    ///
    /// # Errors
    /// Returns the reader's error for malformed bytes, otherwise see
    /// [`ContractDescriptor::from_class`].
    pub fn from_class_bytes(data: &[u8]) -> Result<Self> {
        let node = ClassReader::new(data).read(ReaderFlags::SKIP_CODE | ReaderFlags::SKIP_DEBUG)?;
        ContractDescriptor::from_class(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{Annotation, ElementValue};

    fn string(value: &str) -> ElementValue {
        ElementValue::String(value.to_string())
    }

    #[test]
    fn test_decode_annotated_contract() {
        let mut node = crate::test::interface("c/Player", &[]);
        node.visible_annotations
            .push(Annotation::new(abi::CLASS_ACCESSOR).with(abi::CLASS_IDENTIFIER, string("player")));

        let mut getter = MethodNode::new(abstract_access(), "getHealth", "()I");
        getter
            .visible_annotations
            .push(Annotation::new(abi::FIELD_ACCESSOR).with(abi::FIELD_IDENTIFIER, string("health")));
        node.methods.push(getter);

        let mut interceptor = MethodNode::new(
            AccessFlags::PUBLIC,
            "onTick",
            "(Lclassweave/runtime/v1/InterceptorContext;I)V",
        );
        interceptor.visible_annotations.push(
            Annotation::new(abi::INTERCEPTOR)
                .with(abi::METHOD_IDENTIFIER, string("tick"))
                .with(abi::INSTRUCTION_IDENTIFIER, string("head"))
                .with(
                    abi::EXIT_INSTRUCTION_IDENTIFIERS,
                    ElementValue::Array(vec![string("tail")]),
                ),
        );
        interceptor.visible_parameter_annotations = vec![
            vec![Annotation::new(abi::UNCHECKED_SIGNATURE)],
            vec![Annotation::new(abi::LOCAL_VAR).with(abi::INSTRUCTION_IDENTIFIER, string("counter"))],
        ];
        node.methods.push(interceptor);

        let descriptor = ContractDescriptor::from_class(&node).unwrap();
        assert_eq!(descriptor.class_identifier.as_deref(), Some("player"));
        assert_eq!(
            descriptor.members[0].role,
            MemberRole::FieldAccessor {
                field_identifier: "health".into()
            }
        );
        assert_eq!(
            descriptor.members[1].role,
            MemberRole::Interceptor {
                method_identifier: "tick".into(),
                entry_identifier: "head".into(),
                exit_identifiers: vec!["tail".into()],
            }
        );
        assert!(descriptor.members[1].parameters[0].unchecked_signature);
        assert_eq!(
            descriptor.members[1].parameters[1].local_variable.as_deref(),
            Some("counter")
        );
    }

    #[test]
    fn test_conflicting_roles() {
        let mut node = crate::test::interface("c/Player", &[]);
        let mut method = MethodNode::new(abstract_access(), "x", "()I");
        method
            .visible_annotations
            .push(Annotation::new(abi::FIELD_ACCESSOR).with(abi::FIELD_IDENTIFIER, string("a")));
        method
            .visible_annotations
            .push(Annotation::new(abi::METHOD_ACCESSOR).with(abi::METHOD_IDENTIFIER, string("b")));
        node.methods.push(method);
        assert!(matches!(
            ContractDescriptor::from_class(&node),
            Err(Error::InvalidContract { .. })
        ));
    }

    #[test]
    fn test_builder_parameters() {
        let member = MemberDescriptor::interceptor("i", "(Ljava/lang/Object;I)V", "m", "e")
            .with_local(1, "local")
            .unchecked(0)
            .with_exits(&["x", "y"]);
        assert_eq!(member.parameters.len(), 2);
        assert!(member.parameter(0).unwrap().unchecked_signature);
        assert!(matches!(&member.role, MemberRole::Interceptor { exit_identifiers, .. } if exit_identifiers.len() == 2));
    }
}
