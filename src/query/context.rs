use crate::core::error::{Error, ErrorKind, Result};

/// One node of the parsed query tree, produced by an external parser.
///
/// The tree is an immutable description: collectors never mutate it and
/// may evaluate it concurrently, one collector per segment. Children
/// share their parent's field (phrase components and the like).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryContext {
    pub field: String,
    pub value: String,
    pub fuzzy: bool,
    pub prefix: bool,
    /// Edit-distance budget for fuzzy nodes.
    pub edits: u8,
    pub children: Vec<QueryContext>,
}

impl QueryContext {
    pub fn term(field: &str, value: &str) -> Self {
        QueryContext {
            field: field.to_string(),
            value: value.to_string(),
            fuzzy: false,
            prefix: false,
            edits: 0,
            children: Vec::new(),
        }
    }

    pub fn fuzzy(field: &str, value: &str, edits: u8) -> Self {
        QueryContext { fuzzy: true, edits, ..Self::term(field, value) }
    }

    pub fn prefix(field: &str, value: &str) -> Self {
        QueryContext { prefix: true, ..Self::term(field, value) }
    }

    pub fn with_child(mut self, child: QueryContext) -> Self {
        self.children.push(child);
        self
    }

    /// An empty field or value is a broken tree, not an empty result.
    pub fn validate(&self) -> Result<()> {
        if self.field.is_empty() || self.value.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "query node with empty field or value".to_string(),
            ));
        }
        for child in &self.children {
            child.validate()?;
        }
        Ok(())
    }
}
