//! Templating collaborator.

use crate::error::TemplateError;
use serde_json::Value;

/// A template ready to render.
pub trait CompiledTemplate: Send + Sync {
    fn render(&self, params: &Value) -> Result<String, TemplateError>;
}

/// Compiles template source into a [`CompiledTemplate`].
pub trait TemplateEngine: Send + Sync {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledTemplate>, TemplateError>;
}

// The `.html` suffix turns on tera's HTML autoescaping.
const TEMPLATE_NAME: &str = "fragment.html";

/// Tera-backed templates. Variables are written `{{ name }}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraTemplates;

struct TeraTemplate {
    tera: tera::Tera,
}

impl TemplateEngine for TeraTemplates {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledTemplate>, TemplateError> {
        let mut tera = tera::Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, source)?;
        Ok(Box::new(TeraTemplate { tera }))
    }
}

impl CompiledTemplate for TeraTemplate {
    fn render(&self, params: &Value) -> Result<String, TemplateError> {
        let context = match params {
            Value::Null => tera::Context::new(),
            Value::Object(_) => tera::Context::from_value(params.clone())?,
            other => return Err(TemplateError::InvalidParams(type_name(other).to_string())),
        };
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_variables() {
        let t = TeraTemplates.compile("<li>{{ name }}</li>").unwrap();
        assert_eq!(t.render(&json!({"name": "Clock"})).unwrap(), "<li>Clock</li>");
    }

    #[test]
    fn escapes_html_in_values() {
        let t = TeraTemplates.compile("<p>{{ v }}</p>").unwrap();
        let out = t.render(&json!({"v": "<script>"})).unwrap();
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn null_params_render_static_template() {
        let t = TeraTemplates.compile("static").unwrap();
        assert_eq!(t.render(&Value::Null).unwrap(), "static");
    }

    #[test]
    fn non_object_params_rejected() {
        let t = TeraTemplates.compile("x").unwrap();
        assert!(matches!(
            t.render(&json!([1])),
            Err(TemplateError::InvalidParams(_))
        ));
    }

    #[test]
    fn bad_syntax_fails_compile() {
        assert!(TeraTemplates.compile("{{ unclosed").is_err());
    }

    #[test]
    fn missing_variable_fails_render() {
        let t = TeraTemplates.compile("{{ missing }}").unwrap();
        assert!(t.render(&json!({})).is_err());
    }
}
