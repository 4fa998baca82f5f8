//! Declarative identifier mappings.
//!
//! [`XmlMappings`] reads a mapping document and installs it as one mapper per identifier kind,
//! through the same registration calls a programmatic mapper uses.
//!
//! ```xml
//! <mappings>
//!   <class id="player"><name>game/a</name><name>game/Player</name></class>
//!   <field id="health"><member name="b" desc="I"/></field>
//!   <method id="tick"><member name="c" desc="()V"/></method>
//!   <instruction id="start" kind="index" index="0"/>
//!   <instruction id="end" kind="last-return" offset="0"/>
//!   <instruction id="save" kind="call" owner="game/a" name="d" desc="()V" before="true"/>
//!   <instruction id="hp" kind="local-name" names="hp,health"/>
//! </mappings>
//! ```

use std::{collections::HashMap, sync::Arc};

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::{
    bootstrap::BootstrapBuilder,
    identification::{
        builtin, ClassIdentifier, ElementDescription, FieldIdentifier, InstructionIdentifier,
        MethodIdentifier, SearchPurpose,
    },
    Error, Result,
};

/// One `<instruction>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionMapping {
    /// `kind="index"`: `index`, optional `reversed`
    Index {
        /// Node index
        index: usize,
        /// Count from the end
        reversed: bool,
    },
    /// `kind="first-return"`: optional `offset`
    FirstReturn(isize),
    /// `kind="last-return"`: optional `offset`
    LastReturn(isize),
    /// `kind="call"`: `owner`, `name`, `desc`, optional `before`
    Call {
        /// Owner of the invoked method
        owner: String,
        /// The invoked method
        method: ElementDescription,
        /// Point at the invocation instead of the node after it
        before: bool,
    },
    /// `kind="local-name"`: comma-separated `names`
    LocalName(Vec<String>),
    /// `kind="local-index"`: `index`, optional `reversed`
    LocalIndex {
        /// Slot, or entry counted from the end
        index: usize,
        /// Count from the end of the local-variable table
        reversed: bool,
    },
}

impl InstructionMapping {
    fn identifier(&self) -> InstructionIdentifier {
        match self {
            InstructionMapping::Index { index, reversed } => builtin::by_index(*index, *reversed),
            InstructionMapping::FirstReturn(offset) => builtin::first_return(*offset),
            InstructionMapping::LastReturn(offset) => builtin::last_return(*offset),
            InstructionMapping::Call {
                owner,
                method,
                before,
            } => builtin::method_call(vec![(owner.clone(), method.clone())], *before),
            InstructionMapping::LocalName(names) => builtin::local_by_name(names.clone()),
            InstructionMapping::LocalIndex { index, reversed } => {
                builtin::local_by_index(*index, *reversed)
            }
        }
    }
}

/// The element whose children are being read.
enum Open {
    None,
    Class(String),
    Field(String),
    Method(String),
}

/// A parsed mapping document.
#[derive(Debug, Clone, Default)]
pub struct XmlMappings {
    /// Class ids to internal names
    pub classes: HashMap<String, Vec<String>>,
    /// Field ids to descriptions
    pub fields: HashMap<String, Vec<ElementDescription>>,
    /// Method ids to descriptions
    pub methods: HashMap<String, Vec<ElementDescription>>,
    /// Instruction and local-variable ids
    pub instructions: HashMap<String, InstructionMapping>,
}

fn attributes(element: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut values = HashMap::new();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| Error::Xml(e.to_string()))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| Error::Xml(e.to_string()))?;
        values.insert(
            String::from_utf8_lossy(attribute.key.as_ref()).to_string(),
            value.to_string(),
        );
    }
    Ok(values)
}

fn required<'a>(values: &'a HashMap<String, String>, element: &str, name: &str) -> Result<&'a str> {
    values
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::Xml(format!("<{element}> is missing the '{name}' attribute")))
}

fn number<T: std::str::FromStr>(
    values: &HashMap<String, String>,
    name: &str,
    default: Option<T>,
) -> Result<T> {
    match (values.get(name), default) {
        (Some(text), _) => text
            .trim()
            .parse()
            .map_err(|_| Error::Xml(format!("'{name}' is not a number: {text}"))),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(Error::Xml(format!("<instruction> is missing the '{name}' attribute"))),
    }
}

fn flag(values: &HashMap<String, String>, name: &str) -> bool {
    values.get(name).is_some_and(|v| v == "true")
}

impl XmlMappings {
    /// Parse a mapping document.
    ///
    /// # Errors
    /// Returns [`Error::Xml`] for malformed XML, unknown instruction kinds, missing attributes and
    /// elements outside their parent.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut mappings = XmlMappings::default();
        let mut open = Open::None;
        let mut in_name = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::Xml(format!("at {}: {e}", reader.buffer_position())))?;
            match event {
                Event::Start(ref element) => match element.name().as_ref() {
                    b"class" | b"field" | b"method" => {
                        let values = attributes(element)?;
                        let tag = String::from_utf8_lossy(element.name().as_ref()).to_string();
                        let id = required(&values, &tag, "id")?.to_string();
                        open = match tag.as_str() {
                            "class" => Open::Class(id),
                            "field" => Open::Field(id),
                            _ => Open::Method(id),
                        };
                    }
                    b"name" => in_name = true,
                    b"member" => mappings.member(&open, element)?,
                    b"instruction" => mappings.instruction(element)?,
                    _ => {}
                },
                Event::Empty(ref element) => match element.name().as_ref() {
                    b"member" => mappings.member(&open, element)?,
                    b"instruction" => mappings.instruction(element)?,
                    _ => {}
                },
                Event::Text(ref text) if in_name => {
                    let Open::Class(id) = &open else {
                        return Err(Error::Xml("<name> outside <class>".to_string()));
                    };
                    let name = text.unescape().map_err(|e| Error::Xml(e.to_string()))?;
                    let name = name.trim();
                    if !name.is_empty() {
                        mappings
                            .classes
                            .entry(id.clone())
                            .or_default()
                            .push(name.replace('.', "/"));
                    }
                }
                Event::End(ref element) => match element.name().as_ref() {
                    b"name" => in_name = false,
                    b"class" | b"field" | b"method" => open = Open::None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(mappings)
    }

    fn member(&mut self, open: &Open, element: &BytesStart<'_>) -> Result<()> {
        let values = attributes(element)?;
        let description = ElementDescription::new(
            required(&values, "member", "name")?,
            required(&values, "member", "desc")?,
        );
        match open {
            Open::Field(id) => self.fields.entry(id.clone()).or_default().push(description),
            Open::Method(id) => self.methods.entry(id.clone()).or_default().push(description),
            _ => return Err(Error::Xml("<member> outside <field> or <method>".to_string())),
        }
        Ok(())
    }

    fn instruction(&mut self, element: &BytesStart<'_>) -> Result<()> {
        let values = attributes(element)?;
        let id = required(&values, "instruction", "id")?.to_string();
        let mapping = match required(&values, "instruction", "kind")? {
            "index" => InstructionMapping::Index {
                index: number(&values, "index", None)?,
                reversed: flag(&values, "reversed"),
            },
            "first-return" => InstructionMapping::FirstReturn(number(&values, "offset", Some(0))?),
            "last-return" => InstructionMapping::LastReturn(number(&values, "offset", Some(0))?),
            "call" => InstructionMapping::Call {
                owner: required(&values, "instruction", "owner")?.replace('.', "/"),
                method: ElementDescription::new(
                    required(&values, "instruction", "name")?,
                    required(&values, "instruction", "desc")?,
                ),
                before: flag(&values, "before"),
            },
            "local-name" => InstructionMapping::LocalName(
                required(&values, "instruction", "names")?
                    .split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect(),
            ),
            "local-index" => InstructionMapping::LocalIndex {
                index: number(&values, "index", None)?,
                reversed: flag(&values, "reversed"),
            },
            other => return Err(Error::Xml(format!("unknown instruction kind '{other}'"))),
        };
        self.instructions.insert(id, mapping);
        Ok(())
    }

    /// Register one mapper per identifier kind under `mapper_id`.
    pub fn install(self, builder: &mut BootstrapBuilder, mapper_id: &str) {
        let classes = Arc::new(self.classes);
        builder.register_class_mapper(mapper_id, move |id: &str, _: SearchPurpose| {
            classes
                .get(id)
                .map(|names| ClassIdentifier::names(names.iter().cloned()))
        });
        let fields = Arc::new(self.fields);
        builder.register_field_mapper(mapper_id, move |id: &str, _: SearchPurpose| {
            fields
                .get(id)
                .map(|items| FieldIdentifier::descriptions(items.iter().cloned()))
        });
        let methods = Arc::new(self.methods);
        builder.register_method_mapper(mapper_id, move |id: &str, _: SearchPurpose| {
            methods
                .get(id)
                .map(|items| MethodIdentifier::descriptions(items.iter().cloned()))
        });
        let instructions = Arc::new(self.instructions);
        builder.register_instruction_mapper(mapper_id, move |id: &str, _: SearchPurpose| {
            instructions.get(id).map(InstructionMapping::identifier)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
        <mappings>
          <class id="player"><name>game.a</name><name>game/Player</name></class>
          <field id="health"><member name="b" desc="I"/></field>
          <method id="tick">
            <member name="c" desc="()V"/>
            <member name="tick" desc="()V"/>
          </method>
          <instruction id="start" kind="index" index="0"/>
          <instruction id="end" kind="last-return" offset="-1"/>
          <instruction id="save" kind="call" owner="game.a" name="d" desc="()V" before="true"/>
          <instruction id="hp" kind="local-name" names="hp, health"/>
        </mappings>
    "#;

    #[test]
    fn test_parse() {
        let mappings = XmlMappings::parse(DOCUMENT).unwrap();
        assert_eq!(mappings.classes["player"], vec!["game/a", "game/Player"]);
        assert_eq!(mappings.fields["health"], vec![ElementDescription::new("b", "I")]);
        assert_eq!(mappings.methods["tick"].len(), 2);
        assert_eq!(
            mappings.instructions["start"],
            InstructionMapping::Index {
                index: 0,
                reversed: false
            }
        );
        assert_eq!(mappings.instructions["end"], InstructionMapping::LastReturn(-1));
        assert_eq!(
            mappings.instructions["save"],
            InstructionMapping::Call {
                owner: "game/a".into(),
                method: ElementDescription::new("d", "()V"),
                before: true,
            }
        );
        assert_eq!(
            mappings.instructions["hp"],
            InstructionMapping::LocalName(vec!["hp".into(), "health".into()])
        );
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            XmlMappings::parse(r#"<instruction id="x" kind="somewhere"/>"#),
            Err(Error::Xml(_))
        ));
        assert!(matches!(
            XmlMappings::parse(r#"<instruction id="x" kind="index"/>"#),
            Err(Error::Xml(_))
        ));
        assert!(matches!(
            XmlMappings::parse(r#"<member name="a" desc="I"/>"#),
            Err(Error::Xml(_))
        ));
        assert!(matches!(
            XmlMappings::parse(r#"<class><name>a</name></class>"#),
            Err(Error::Xml(_))
        ));
    }

    #[test]
    fn test_install_registers_mappers() {
        let mut builder = BootstrapBuilder::new();
        XmlMappings::parse(DOCUMENT).unwrap().install(&mut builder, "xml");
        let contract = crate::accessor::ContractDescriptor::builder("c/Player", "player").member(
            crate::accessor::MemberDescriptor::field_accessor("getHealth", "()I", "health"),
        );
        assert!(builder.register_accessor(contract).is_ok());

        let unknown = crate::accessor::ContractDescriptor::builder("c/Other", "nobody");
        assert!(matches!(
            builder.register_accessor(unknown),
            Err(Error::NotMapped { .. })
        ));
    }
}
