//! Flattening of nested submodel elements.
//!
//! [`Flatten`] walks every element of an environment depth-first without
//! allocating the whole sequence up front. It is `Clone`, so a caller can
//! restart the walk from any saved position.

use crate::content::{Environment, Submodel, SubmodelElement, ValueClass};
use std::iter::Enumerate;
use std::slice::Iter;

/// One element of a flattened environment.
#[derive(Debug, Clone, Copy)]
pub struct FlatElement<'a> {
    pub submodel: &'a Submodel,
    pub element: &'a SubmodelElement,
    depth: usize,
}

/// A flattened element together with its idShort path inside the submodel.
#[derive(Debug, Clone)]
pub struct FlatEntry<'a> {
    pub path: String,
    pub item: FlatElement<'a>,
}

impl<'a> FlatElement<'a> {
    /// Nesting depth, 0 for top-level submodel elements.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Typed values carried by the element.
    ///
    /// Properties yield one value of their declared class (unparseable
    /// values degrade to text), multi-language properties one value per
    /// language, ranges their bounds; structural elements yield nothing.
    pub fn values(&self) -> Vec<ElementValue> {
        match self.element {
            SubmodelElement::Property(p) => p
                .value
                .as_deref()
                .map(|v| vec![ElementValue::parse(p.value_type.class(), v)])
                .unwrap_or_default(),
            SubmodelElement::MultiLanguageProperty(p) => p
                .value
                .iter()
                .map(|s| ElementValue::LangText {
                    language: s.language.clone(),
                    text: s.text.clone(),
                })
                .collect(),
            SubmodelElement::Range(r) => [r.min.as_deref(), r.max.as_deref()]
                .into_iter()
                .flatten()
                .map(|v| ElementValue::parse(r.value_type.class(), v))
                .collect(),
            SubmodelElement::File(f) => f
                .value
                .iter()
                .map(|v| ElementValue::Text(v.clone()))
                .collect(),
            SubmodelElement::ReferenceElement(r) => r
                .value
                .as_ref()
                .and_then(|r| r.keys.last())
                .map(|k| vec![ElementValue::Text(k.value.clone())])
                .unwrap_or_default(),
            SubmodelElement::Entity(e) => e
                .global_asset_id
                .iter()
                .map(|v| ElementValue::Text(v.clone()))
                .collect(),
            SubmodelElement::Blob(_)
            | SubmodelElement::RelationshipElement(_)
            | SubmodelElement::Collection(_)
            | SubmodelElement::List(_)
            | SubmodelElement::Capability(_)
            | SubmodelElement::Operation(_) => Vec::new(),
        }
    }
}

/// A typed element value, as stored in the index's element view.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Text(String),
    LangText { language: String, text: String },
    Integer(i64),
    Number(f64),
    Boolean(bool),
    /// ISO-8601 date or date-time, compared lexicographically
    Date(String),
}

impl ElementValue {
    /// Parse a raw lexical value according to its storage class.
    pub fn parse(class: ValueClass, raw: &str) -> Self {
        let trimmed = raw.trim();
        match class {
            ValueClass::Integer => trimmed
                .parse()
                .map(ElementValue::Integer)
                .unwrap_or_else(|_| ElementValue::Text(raw.to_string())),
            ValueClass::Number => trimmed
                .parse()
                .map(ElementValue::Number)
                .unwrap_or_else(|_| ElementValue::Text(raw.to_string())),
            ValueClass::Boolean => match trimmed {
                "true" | "1" => ElementValue::Boolean(true),
                "false" | "0" => ElementValue::Boolean(false),
                _ => ElementValue::Text(raw.to_string()),
            },
            ValueClass::Date => ElementValue::Date(trimmed.to_string()),
            ValueClass::Text => ElementValue::Text(raw.to_string()),
        }
    }

    /// Human-readable rendering, used for live value updates.
    pub fn display(&self) -> String {
        match self {
            ElementValue::Text(s) | ElementValue::Date(s) => s.clone(),
            ElementValue::LangText { language, text } => format!("{text}@{language}"),
            ElementValue::Integer(i) => i.to_string(),
            ElementValue::Number(n) => n.to_string(),
            ElementValue::Boolean(b) => b.to_string(),
        }
    }
}

#[derive(Clone)]
struct Frame<'a> {
    prefix: String,
    items: Enumerate<Iter<'a, SubmodelElement>>,
}

impl Frame<'_> {
    fn child_path(&self, index: usize, element: &SubmodelElement) -> String {
        match element.id_short().filter(|s| !s.is_empty()) {
            Some(id_short) if self.prefix.is_empty() => id_short.to_string(),
            Some(id_short) => format!("{}.{}", self.prefix, id_short),
            None => format!("{}[{}]", self.prefix, index),
        }
    }
}

/// Lazy depth-first iterator over every element of an environment.
#[derive(Clone)]
pub struct Flatten<'a> {
    submodels: Iter<'a, Submodel>,
    current: Option<&'a Submodel>,
    stack: Vec<Frame<'a>>,
}

impl<'a> Flatten<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Self::over(&env.submodels)
    }

    /// Flatten only the given submodels.
    pub fn over(submodels: &'a [Submodel]) -> Self {
        Self {
            submodels: submodels.iter(),
            current: None,
            stack: Vec::new(),
        }
    }
}

impl<'a> Iterator for Flatten<'a> {
    type Item = FlatEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                let submodel = self.submodels.next()?;
                self.current = Some(submodel);
                self.stack.push(Frame {
                    prefix: String::new(),
                    items: submodel.submodel_elements.iter().enumerate(),
                });
                continue;
            };

            let Some((index, element)) = frame.items.next() else {
                self.stack.pop();
                continue;
            };

            let path = frame.child_path(index, element);
            let depth = self.stack.len() - 1;
            let children = element.children();
            if !children.is_empty() {
                self.stack.push(Frame {
                    prefix: path.clone(),
                    items: children.iter().enumerate(),
                });
            }

            let submodel = self.current?;
            return Some(FlatEntry {
                path,
                item: FlatElement {
                    submodel,
                    element,
                    depth,
                },
            });
        }
    }
}

impl Environment {
    /// Lazily flatten every element of every submodel.
    pub fn flatten(&self) -> Flatten<'_> {
        Flatten::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::*;

    fn property(id_short: &str, value_type: DataType, value: &str) -> SubmodelElement {
        SubmodelElement::Property(Property {
            id_short: Some(id_short.to_string()),
            semantic_id: None,
            value_type,
            value: Some(value.to_string()),
        })
    }

    fn sample() -> Environment {
        Environment {
            shells: vec![],
            submodels: vec![
                Submodel {
                    id: "urn:sm:1".to_string(),
                    id_short: Some("Technical".to_string()),
                    semantic_id: None,
                    submodel_elements: vec![
                        property("MaxSpeed", DataType::Int, "3000"),
                        SubmodelElement::Collection(ElementCollection {
                            id_short: Some("Motor".to_string()),
                            semantic_id: None,
                            value: vec![
                                property("Power", DataType::Double, "7.5"),
                                SubmodelElement::List(ElementList {
                                    id_short: Some("Phases".to_string()),
                                    semantic_id: None,
                                    order_relevant: true,
                                    value: vec![
                                        property("", DataType::String, "L1"),
                                        SubmodelElement::Property(Property {
                                            id_short: None,
                                            semantic_id: None,
                                            value_type: DataType::String,
                                            value: Some("L2".to_string()),
                                        }),
                                    ],
                                }),
                            ],
                        }),
                    ],
                },
                Submodel {
                    id: "urn:sm:2".to_string(),
                    id_short: Some("Empty".to_string()),
                    semantic_id: None,
                    submodel_elements: vec![],
                },
                Submodel {
                    id: "urn:sm:3".to_string(),
                    id_short: Some("Status".to_string()),
                    semantic_id: None,
                    submodel_elements: vec![property("Running", DataType::Boolean, "true")],
                },
            ],
        }
    }

    #[test]
    fn test_flatten_paths_depth_first() {
        let env = sample();
        let paths: Vec<_> = env.flatten().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![
                "MaxSpeed",
                "Motor",
                "Motor.Power",
                "Motor.Phases",
                "Motor.Phases[0]",
                "Motor.Phases[1]",
                "Running",
            ]
        );
    }

    #[test]
    fn test_flatten_depth_and_submodel() {
        let env = sample();
        let entries: Vec<_> = env.flatten().collect();
        assert_eq!(entries[0].item.depth(), 0);
        assert_eq!(entries[2].item.depth(), 1);
        assert_eq!(entries[5].item.depth(), 2);
        assert_eq!(entries[6].item.submodel.id, "urn:sm:3");
    }

    #[test]
    fn test_flatten_is_restartable() {
        let env = sample();
        let mut walk = env.flatten();
        walk.next();
        let saved = walk.clone();
        let rest: Vec<_> = walk.map(|e| e.path).collect();
        let replay: Vec<_> = saved.map(|e| e.path).collect();
        assert_eq!(rest, replay);
        assert_eq!(rest.len(), 6);
    }

    #[test]
    fn test_typed_values() {
        let env = sample();
        let values: Vec<_> = env.flatten().flat_map(|e| e.item.values()).collect();
        assert!(values.contains(&ElementValue::Integer(3000)));
        assert!(values.contains(&ElementValue::Number(7.5)));
        assert!(values.contains(&ElementValue::Boolean(true)));
        assert!(values.contains(&ElementValue::Text("L2".to_string())));
    }

    #[test]
    fn test_unparseable_value_degrades_to_text() {
        assert_eq!(
            ElementValue::parse(ValueClass::Integer, "n/a"),
            ElementValue::Text("n/a".to_string())
        );
        assert_eq!(
            ElementValue::parse(ValueClass::Boolean, "1"),
            ElementValue::Boolean(true)
        );
    }
}
