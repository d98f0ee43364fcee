//! Template contracts and the built-in placeholder renderer.
//!
//! Templates use a small handlebars-like syntax over the JSON form of the
//! data context:
//!
//! ```text
//! {{name}}                      value at a dotted path
//! {{lit name}}                  the value as an escaped Rust string literal
//! {{#each trigger.verbs}}..{{/each}}   arrays; objects iterate with {{@key}}
//! {{#if result_type_name}}..{{else}}..{{/if}}
//! {{this}} {{@index}} {{@key}}  inside #each
//! ```
//!
//! A path that is not found in the current item is looked up in the
//! enclosing contexts, then renders as empty.

use std::borrow::Cow;
use std::fs;
use std::path::PathBuf;

use rust_embed::Embed;
use serde_json::Value;

use crate::error::{Error, Result};

/// Source of template text by template id.
pub trait TemplateProvider {
    fn template(&self, id: &str) -> Result<Cow<'_, str>>;
}

/// Renders template text against a data context.
pub trait TemplateRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<String>;
}

#[derive(Embed)]
#[folder = "templates/"]
struct TemplateAssets;

/// Templates shipped with bindery: `http`, `event_feed`, `startup` and
/// `openapi_ui`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTemplates;

impl TemplateProvider for BuiltinTemplates {
    fn template(&self, id: &str) -> Result<Cow<'_, str>> {
        let file = TemplateAssets::get(&format!("{id}.rs.tmpl"))
            .ok_or_else(|| Error::Template(format!("no built-in template named {id:?}")))?;
        let text = String::from_utf8(file.data.into_owned())
            .map_err(|e| Error::Template(format!("template {id:?} is not UTF-8: {e}")))?;
        Ok(Cow::Owned(text))
    }
}

/// Templates read from `<dir>/<id>.rs.tmpl`, falling back to the built-ins.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TemplateProvider for DirectoryTemplates {
    fn template(&self, id: &str) -> Result<Cow<'_, str>> {
        let path = self.dir.join(format!("{id}.rs.tmpl"));
        if path.is_file() {
            tracing::debug!("Using template override {}", path.display());
            return Ok(Cow::Owned(fs::read_to_string(path)?));
        }
        BuiltinTemplates.template(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Value(String),
    Literal(String),
    Each(String, Vec<Node>),
    If(String, Vec<Node>, Vec<Node>),
}

/// The built-in renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<String> {
        let nodes = parse(template)?;
        let mut out = String::with_capacity(template.len());
        let mut scopes = vec![Scope::root(context)];
        render_nodes(&nodes, &mut scopes, &mut out);
        Ok(out)
    }
}

/// One level of the context stack.
struct Scope<'v> {
    value: &'v Value,
    index: Option<usize>,
    key: Option<&'v str>,
}

impl<'v> Scope<'v> {
    fn root(value: &'v Value) -> Self {
        Self {
            value,
            index: None,
            key: None,
        }
    }
}

fn parse(template: &str) -> Result<Vec<Node>> {
    let mut rest = template;
    // (block tag, path, then-branch, else-branch, in else)
    let mut stack: Vec<(&str, String, Vec<Node>, Vec<Node>, bool)> = Vec::new();
    let mut root = Vec::new();

    fn current<'a>(
        root: &'a mut Vec<Node>,
        stack: &'a mut [(&str, String, Vec<Node>, Vec<Node>, bool)],
    ) -> &'a mut Vec<Node> {
        match stack.last_mut() {
            Some((_, _, _, otherwise, true)) => otherwise,
            Some((_, _, then, _, false)) => then,
            None => root,
        }
    }

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            current(&mut root, &mut stack).push(Node::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| Error::Template("unterminated `{{`".to_string()))?;
        let tag = after[..end].trim();
        rest = &after[end + 2..];

        if let Some(path) = tag.strip_prefix("#each ") {
            stack.push(("each", path.trim().to_string(), Vec::new(), Vec::new(), false));
        } else if let Some(path) = tag.strip_prefix("#if ") {
            stack.push(("if", path.trim().to_string(), Vec::new(), Vec::new(), false));
        } else if tag == "else" {
            match stack.last_mut() {
                Some(("if", _, _, _, in_else)) if !*in_else => *in_else = true,
                _ => return Err(Error::Template("`{{else}}` outside of `{{#if}}`".to_string())),
            }
        } else if let Some(closing) = tag.strip_prefix('/') {
            let (block, path, then, otherwise, _) = stack
                .pop()
                .ok_or_else(|| Error::Template(format!("unexpected `{{{{/{closing}}}}}`")))?;
            if block != closing {
                return Err(Error::Template(format!(
                    "`{{{{#{block} {path}}}}}` closed by `{{{{/{closing}}}}}`"
                )));
            }
            let node = if block == "each" {
                Node::Each(path, then)
            } else {
                Node::If(path, then, otherwise)
            };
            current(&mut root, &mut stack).push(node);
        } else if let Some(path) = tag.strip_prefix("lit ") {
            current(&mut root, &mut stack).push(Node::Literal(path.trim().to_string()));
        } else if tag.starts_with('#') {
            return Err(Error::Template(format!("unknown block `{{{{{tag}}}}}`")));
        } else {
            current(&mut root, &mut stack).push(Node::Value(tag.to_string()));
        }
    }

    if let Some((block, path, ..)) = stack.last() {
        return Err(Error::Template(format!("unclosed `{{{{#{block} {path}}}}}`")));
    }
    if !rest.is_empty() {
        root.push(Node::Text(rest.to_string()));
    }
    Ok(root)
}

fn render_nodes<'v>(nodes: &[Node], scopes: &mut Vec<Scope<'v>>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Value(path) => match lookup_special(path, scopes) {
                Some(special) => out.push_str(&special),
                None => {
                    if let Some(value) = lookup(path, scopes) {
                        push_value(value, out);
                    }
                }
            },
            Node::Literal(path) => {
                let text = lookup_special(path, scopes).unwrap_or_else(|| {
                    let mut text = String::new();
                    if let Some(value) = lookup(path, scopes) {
                        push_value(value, &mut text);
                    }
                    text
                });
                out.push_str(&format!("{text:?}"));
            }
            Node::If(path, then, otherwise) => {
                let branch = if lookup(path, scopes).is_some_and(is_truthy) {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, scopes, out);
            }
            Node::Each(path, body) => {
                let Some(collection) = lookup(path, scopes) else {
                    continue;
                };
                match collection {
                    Value::Array(items) => {
                        for (index, item) in items.iter().enumerate() {
                            scopes.push(Scope {
                                value: item,
                                index: Some(index),
                                key: None,
                            });
                            render_nodes(body, scopes, out);
                            scopes.pop();
                        }
                    }
                    Value::Object(entries) => {
                        for (index, (key, item)) in entries.iter().enumerate() {
                            scopes.push(Scope {
                                value: item,
                                index: Some(index),
                                key: Some(key),
                            });
                            render_nodes(body, scopes, out);
                            scopes.pop();
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn lookup_special(path: &str, scopes: &[Scope<'_>]) -> Option<String> {
    let scope = scopes.last()?;
    match path {
        "@index" => scope.index.map(|i| i.to_string()),
        "@key" => scope.key.map(str::to_string),
        _ => None,
    }
}

fn lookup<'v>(path: &str, scopes: &[Scope<'v>]) -> Option<&'v Value> {
    if path == "this" {
        return scopes.last().map(|s| s.value);
    }
    let path = path.strip_prefix("this.").unwrap_or(path);
    scopes.iter().rev().find_map(|scope| {
        path.split('.')
            .try_fold(scope.value, |value, segment| value.get(segment))
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

fn push_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, context: Value) -> String {
        PlaceholderRenderer.render(template, &context).unwrap()
    }

    #[test]
    fn test_dotted_paths() {
        let out = render(
            "fn {{name}}() -> &'static str { \"{{trigger.route}}\" }",
            json!({"name": "get_widget", "trigger": {"route": "widgets/{id}"}}),
        );
        assert_eq!(out, "fn get_widget() -> &'static str { \"widgets/{id}\" }");
    }

    #[test]
    fn test_each_over_array_and_parent_lookup() {
        let out = render(
            "{{#each verbs}}{{@index}}:{{this}}@{{route}} {{/each}}",
            json!({"route": "widgets", "verbs": ["get", "post"]}),
        );
        assert_eq!(out, "0:get@widgets 1:post@widgets ");
    }

    #[test]
    fn test_each_over_object() {
        let out = render(
            "{{#each headers}}{{@key}}={{this}};{{/each}}",
            json!({"headers": {"TenantId": "x-tenant", "UserId": "x-user"}}),
        );
        assert_eq!(out, "TenantId=x-tenant;UserId=x-user;");
    }

    #[test]
    fn test_if_else() {
        let template = "{{#if result}}returns {{result}}{{else}}unit{{/if}}";
        assert_eq!(render(template, json!({"result": "Widget"})), "returns Widget");
        assert_eq!(render(template, json!({"result": null})), "unit");
        assert_eq!(render(template, json!({})), "unit");
    }

    #[test]
    fn test_nested_blocks() {
        let out = render(
            "{{#each params}}{{#if is_optional}}{{name}}? {{else}}{{name}} {{/if}}{{/each}}",
            json!({"params": [
                {"name": "id", "is_optional": false},
                {"name": "page", "is_optional": true}
            ]}),
        );
        assert_eq!(out, "id page? ");
    }

    #[test]
    fn test_literals_are_escaped() {
        let out = render(
            "h({{lit name}}); {{#each headers}}k({{lit @key}}, {{lit this}}); {{/each}}n({{lit count}}, {{lit nope}})",
            json!({
                "name": "say \"hi\"",
                "headers": {"C:\\dir": "x-\n"},
                "count": 3
            }),
        );
        assert_eq!(
            out,
            r#"h("say \"hi\""); k("C:\\dir", "x-\n"); n("3", "")"#
        );
    }

    #[test]
    fn test_missing_value_renders_empty() {
        assert_eq!(render("[{{nope.deeper}}]", json!({})), "[]");
    }

    #[test]
    fn test_malformed_templates() {
        for template in [
            "{{#each verbs}}no end",
            "{{/if}}",
            "{{#if a}}{{/each}}",
            "{{else}}",
            "{{name",
            "{{#unless a}}{{/unless}}",
        ] {
            let result = PlaceholderRenderer.render(template, &json!({}));
            assert!(
                matches!(result, Err(Error::Template(_))),
                "{template:?} should fail"
            );
        }
    }

    #[test]
    fn test_builtin_templates_exist() {
        for id in ["http", "event_feed", "startup", "openapi_ui"] {
            let text = BuiltinTemplates.template(id).unwrap();
            assert!(parse(&text).is_ok(), "template {id} must parse");
        }
        assert!(BuiltinTemplates.template("timer").is_err());
    }

    #[test]
    fn test_directory_templates_override() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("http.rs.tmpl"), "// custom {{name}}").unwrap();
        let provider = DirectoryTemplates::new(dir.path());

        assert_eq!(provider.template("http").unwrap(), "// custom {{name}}");
        assert!(provider.template("startup").unwrap().contains("function_index"));
    }
}
