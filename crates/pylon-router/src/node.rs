//! Segment tree backing the router.

use crate::bindings::Bindings;
use crate::error::RouterError;
use crate::method_table::MethodTable;

/// One parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Literal text, e.g. `items`.
    Literal(String),
    /// Single-segment variable, e.g. `{id}`.
    Variable(String),
    /// Trailing catch-all, e.g. `*path` or `{path=**}`.
    CatchAll(String),
}

impl Segment {
    fn parse(raw: &str, template: &str) -> Result<Self, RouterError> {
        if let Some(inner) = raw.strip_prefix('{') {
            let inner = inner
                .strip_suffix('}')
                .ok_or_else(|| RouterError::invalid(template, format!("unclosed variable '{raw}'")))?;
            let (name, pattern) = match inner.split_once('=') {
                Some((name, pattern)) => (name, Some(pattern)),
                None => (inner, None),
            };
            if name.is_empty() {
                return Err(RouterError::invalid(template, "empty variable name"));
            }
            return match pattern {
                None | Some("*") => Ok(Self::Variable(name.to_string())),
                Some("**") => Ok(Self::CatchAll(name.to_string())),
                Some(other) => Err(RouterError::invalid(
                    template,
                    format!("unsupported variable pattern '{other}'"),
                )),
            };
        }
        if let Some(name) = raw.strip_prefix('*') {
            if name.is_empty() {
                return Err(RouterError::invalid(template, "unnamed catch-all"));
            }
            return Ok(Self::CatchAll(name.to_string()));
        }
        Ok(Self::Literal(raw.to_string()))
    }
}

/// Splits a template into segments, rejecting catch-alls that are not last.
pub(crate) fn parse_template(template: &str) -> Result<Vec<Segment>, RouterError> {
    if !template.starts_with('/') {
        return Err(RouterError::invalid(template, "must start with '/'"));
    }
    let segments = template
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| Segment::parse(s, template))
        .collect::<Result<Vec<_>, _>>()?;

    let catch_all_at = segments
        .iter()
        .position(|s| matches!(s, Segment::CatchAll(_)));
    if let Some(pos) = catch_all_at {
        if pos + 1 != segments.len() {
            return Err(RouterError::invalid(template, "catch-all must be the last segment"));
        }
    }
    Ok(segments)
}

/// A node in the segment tree.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    literal: String,
    methods: MethodTable<T>,
    /// Literal children sorted by text for binary search.
    literals: Vec<Node<T>>,
    variable: Option<(String, Box<Node<T>>)>,
    catch_all: Option<(String, MethodTable<T>)>,
}

impl<T> Node<T> {
    pub(crate) fn root() -> Self {
        Self::literal(String::new())
    }

    fn literal(text: String) -> Self {
        Self {
            literal: text,
            methods: MethodTable::new(),
            literals: Vec::new(),
            variable: None,
            catch_all: None,
        }
    }

    /// Returns the method table at the end of `segments`, creating nodes on the way.
    pub(crate) fn table_mut(
        &mut self,
        segments: &[Segment],
        template: &str,
    ) -> Result<&mut MethodTable<T>, RouterError> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(&mut self.methods);
        };

        match first {
            Segment::Literal(text) => {
                let idx = match self
                    .literals
                    .binary_search_by(|c| c.literal.as_str().cmp(text))
                {
                    Ok(idx) => idx,
                    Err(idx) => {
                        self.literals.insert(idx, Node::literal(text.clone()));
                        idx
                    }
                };
                self.literals[idx].table_mut(rest, template)
            }
            Segment::Variable(name) => {
                let (existing, child) = self
                    .variable
                    .get_or_insert_with(|| (name.clone(), Box::new(Node::root())));
                if *existing != *name {
                    return Err(RouterError::invalid(
                        template,
                        format!("variable '{name}' conflicts with '{existing}' at the same position"),
                    ));
                }
                child.table_mut(rest, template)
            }
            Segment::CatchAll(name) => {
                let (existing, table) = self
                    .catch_all
                    .get_or_insert_with(|| (name.clone(), MethodTable::new()));
                if *existing != *name {
                    return Err(RouterError::invalid(
                        template,
                        format!("catch-all '{name}' conflicts with '{existing}' at the same position"),
                    ));
                }
                Ok(table)
            }
        }
    }

    /// Matches path segments, pushing captured variables into `bindings`.
    pub(crate) fn find<'a>(
        &'a self,
        segments: &[&str],
        bindings: &mut Bindings,
    ) -> Option<&'a MethodTable<T>> {
        let Some((first, rest)) = segments.split_first() else {
            if !self.methods.is_empty() {
                return Some(&self.methods);
            }
            return None;
        };

        if let Ok(idx) = self
            .literals
            .binary_search_by(|c| c.literal.as_str().cmp(first))
        {
            if let Some(found) = self.literals[idx].find(rest, bindings) {
                return Some(found);
            }
        }

        if let Some((name, child)) = &self.variable {
            let mark = bindings.len();
            bindings.push(name.clone(), *first);
            if let Some(found) = child.find(rest, bindings) {
                return Some(found);
            }
            bindings.truncate(mark);
        }

        if let Some((name, table)) = &self.catch_all {
            bindings.push(name.clone(), segments.join("/"));
            return Some(table);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal_and_variable() {
        let segments = parse_template("/v1/items/{id}").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Literal("v1".to_string()),
                Segment::Literal("items".to_string()),
                Segment::Variable("id".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_catch_all_forms() {
        assert_eq!(
            parse_template("/files/*path").unwrap()[1],
            Segment::CatchAll("path".to_string())
        );
        assert_eq!(
            parse_template("/files/{path=**}").unwrap()[1],
            Segment::CatchAll("path".to_string())
        );
        assert_eq!(
            parse_template("/files/{name=*}").unwrap()[1],
            Segment::Variable("name".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_bad_templates() {
        assert!(parse_template("items").is_err());
        assert!(parse_template("/items/{id").is_err());
        assert!(parse_template("/items/{}").is_err());
        assert!(parse_template("/files/*path/more").is_err());
        assert!(parse_template("/files/{p=abc}").is_err());
    }

    #[test]
    fn test_backtracking_drops_stale_bindings() {
        let mut root: Node<&str> = Node::root();
        let a = parse_template("/shelves/{shelf}/books").unwrap();
        root.table_mut(&a, "a").unwrap().set(http::Method::GET, "books");
        let b = parse_template("/shelves/*rest").unwrap();
        root.table_mut(&b, "b").unwrap().set(http::Method::GET, "rest");

        let mut bindings = Bindings::new();
        let table = root.find(&["shelves", "7", "authors"], &mut bindings).unwrap();
        assert_eq!(table.get(&http::Method::GET), Some(&"rest"));
        assert_eq!(bindings.get("shelf"), None);
        assert_eq!(bindings.get("rest"), Some("7/authors"));
    }
}
