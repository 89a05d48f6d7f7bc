//! Document filters and their SQL compilation.
//!
//! A [`Filter`] is a serializable predicate tree. [`CompiledFilter::compile`]
//! turns it into a single SQL boolean expression over the `documents`
//! table (aliased `d`) plus positional parameters, once per page call.
//! Predicates on nested content are evaluated with `EXISTS` against the
//! element view, so a document matching through several elements is still
//! returned once.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use shellhub_core::content::ElementKind;

/// Predicate over documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    And { filters: Vec<Filter> },
    Or { filters: Vec<Filter> },
    Not { filter: Box<Filter> },
    /// Compare a metadata column
    Field {
        field: DocField,
        cmp: TextOp,
        value: String,
    },
    /// Match a boolean flag
    Flag { flag: DocFlag, value: bool },
    /// At least one element satisfies the predicate
    Element(ElementPredicate),
    /// Substring match on names, ids and textual element values
    Text { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocField {
    Source,
    Id,
    IdShort,
    AssetId,
    Checksum,
    Address,
}

impl DocField {
    fn column(self) -> &'static str {
        match self {
            DocField::Source => "d.source",
            DocField::Id => "d.id",
            DocField::IdShort => "d.id_short",
            DocField::AssetId => "d.asset_id",
            DocField::Checksum => "d.checksum",
            DocField::Address => "d.address",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocFlag {
    ReadOnly,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextOp {
    Eq,
    Ne,
    Contains,
    StartsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Conditions on a single element row; absent fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementPredicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<ElementKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<String>,
    /// Exact idShort path inside the submodel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValuePredicate>,
}

/// Condition on an element's typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValuePredicate {
    Text { op: TextOp, value: String },
    /// Integers are stored in the numeric column as well
    Number { op: CmpOp, value: f64 },
    Boolean { value: bool },
    /// ISO-8601 values, compared lexicographically
    Date { op: CmpOp, value: String },
}

/// A filter compiled to SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    /// Boolean expression over `documents d`
    pub sql: String,
    /// Positional parameters, in placeholder order
    pub params: Vec<Value>,
}

impl CompiledFilter {
    /// Matches every document.
    pub fn all() -> Self {
        Self {
            sql: "1".to_string(),
            params: Vec::new(),
        }
    }

    /// Compile `filter`; `language` restricts textual element matches to
    /// values in that language or without one.
    pub fn compile(filter: Option<&Filter>, language: Option<&str>) -> Self {
        let Some(filter) = filter else {
            return Self::all();
        };
        let mut compiler = Compiler {
            language,
            params: Vec::new(),
        };
        let sql = compiler.filter(filter);
        Self {
            sql,
            params: compiler.params,
        }
    }
}

struct Compiler<'a> {
    language: Option<&'a str>,
    params: Vec<Value>,
}

impl Compiler<'_> {
    fn push(&mut self, value: impl Into<Value>) -> &'static str {
        self.params.push(value.into());
        "?"
    }

    fn filter(&mut self, filter: &Filter) -> String {
        match filter {
            Filter::And { filters } => self.join(filters, " AND ", "1"),
            Filter::Or { filters } => self.join(filters, " OR ", "0"),
            Filter::Not { filter } => format!("NOT ({})", self.filter(filter)),
            Filter::Field { field, cmp, value } => self.text(field.column(), *cmp, value),
            Filter::Flag { flag, value } => {
                let column = match flag {
                    DocFlag::ReadOnly => "d.read_only",
                    DocFlag::Online => "d.online",
                };
                format!("{} = {}", column, self.push(*value as i64))
            }
            Filter::Element(predicate) => self.element(predicate),
            Filter::Text { text } => {
                let mut parts = Vec::new();
                for column in ["d.id_short", "d.id", "d.asset_id"] {
                    parts.push(self.text(column, TextOp::Contains, text));
                }
                let value = self.text("e.s_value", TextOp::Contains, text);
                let lang = self.language_clause();
                parts.push(format!(
                    "EXISTS (SELECT 1 FROM elements e WHERE e.doc_uid = d.uid AND {value}{lang})"
                ));
                format!("({})", parts.join(" OR "))
            }
        }
    }

    fn join(&mut self, filters: &[Filter], separator: &str, empty: &str) -> String {
        if filters.is_empty() {
            return empty.to_string();
        }
        let parts: Vec<_> = filters
            .iter()
            .map(|f| format!("({})", self.filter(f)))
            .collect();
        parts.join(separator)
    }

    fn text(&mut self, column: &str, op: TextOp, value: &str) -> String {
        match op {
            TextOp::Eq => format!("{} = {}", column, self.push(value.to_string())),
            TextOp::Ne => format!(
                "({column} IS NULL OR {column} <> {})",
                self.push(value.to_string())
            ),
            TextOp::Contains => format!(
                "{} LIKE {} ESCAPE '\\'",
                column,
                self.push(format!("%{}%", escape_like(value)))
            ),
            TextOp::StartsWith => format!(
                "{} LIKE {} ESCAPE '\\'",
                column,
                self.push(format!("{}%", escape_like(value)))
            ),
        }
    }

    fn language_clause(&mut self) -> String {
        match self.language {
            Some(language) => format!(
                " AND (e.lang IS NULL OR e.lang = {})",
                self.push(language.to_string())
            ),
            None => String::new(),
        }
    }

    fn element(&mut self, predicate: &ElementPredicate) -> String {
        let mut conditions = vec!["e.doc_uid = d.uid".to_string()];

        if let Some(kind) = predicate.model_type {
            conditions.push(format!("e.model_type = {}", self.push(kind.as_str().to_string())));
        }
        if let Some(semantic_id) = &predicate.semantic_id {
            conditions.push(format!(
                "e.semantic_id = {}",
                self.push(semantic_id.clone())
            ));
        }
        if let Some(path) = &predicate.path {
            conditions.push(format!("e.path = {}", self.push(path.clone())));
        }
        if let Some(id_short) = &predicate.id_short {
            conditions.push(format!("e.id_short = {}", self.push(id_short.clone())));
        }

        match &predicate.value {
            Some(ValuePredicate::Text { op, value }) => {
                let clause = self.text("e.s_value", *op, value);
                let lang = self.language_clause();
                conditions.push(format!("e.s_value IS NOT NULL AND {clause}{lang}"));
            }
            Some(ValuePredicate::Number { op, value }) => {
                conditions.push(format!("e.n_value {} {}", op.sql(), self.push(*value)));
            }
            Some(ValuePredicate::Boolean { value }) => {
                conditions.push(format!("e.b_value = {}", self.push(*value as i64)));
            }
            Some(ValuePredicate::Date { op, value }) => {
                conditions.push(format!(
                    "e.d_value {} {}",
                    op.sql(),
                    self.push(value.clone())
                ));
            }
            None => {}
        }

        format!(
            "EXISTS (SELECT 1 FROM elements e WHERE {})",
            conditions.join(" AND ")
        )
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
