//! Command text and parameter accumulation.

use crate::config::GenerationConfig;
use serde::Serialize;
use serde_json::Value;

/// One bound parameter of a generated command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandParameter {
    pub name: String,
    pub value: Value,
}

/// Finished command: text plus parameters in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlCommand {
    pub command_text: String,
    pub parameters: Vec<CommandParameter>,
}

/// Accumulates command text and parameters.
///
/// Parameter names are positional (`@1`, `@2`, ...) and assigned when the
/// parameter is created, so they always appear in increasing order in the
/// text, across nested sub-statements too.
#[derive(Debug)]
pub struct SqlCommandBuilder {
    parameter_prefix: String,
    text: String,
    parameters: Vec<CommandParameter>,
}

impl SqlCommandBuilder {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            parameter_prefix: config.parameter_prefix.clone(),
            text: String::new(),
            parameters: Vec::new(),
        }
    }

    /// Register `value` and return the parameter name to put in the text.
    pub fn create_parameter(&mut self, value: Value) -> String {
        let name = format!("{}{}", self.parameter_prefix, self.parameters.len() + 1);
        self.parameters.push(CommandParameter {
            name: name.clone(),
            value,
        });
        name
    }

    /// Create a parameter and append its name.
    pub fn append_parameter(&mut self, value: Value) {
        let name = self.create_parameter(value);
        self.text.push_str(&name);
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// `[identifier]`, with `]` doubled.
    pub fn append_identifier(&mut self, identifier: &str) {
        self.text.push('[');
        self.text.push_str(&identifier.replace(']', "]]"));
        self.text.push(']');
    }

    /// `'text'`, with `'` doubled.
    pub fn append_string_literal(&mut self, value: &str) {
        self.text.push('\'');
        self.text.push_str(&value.replace('\'', "''"));
        self.text.push('\'');
    }

    pub fn command_text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[CommandParameter] {
        &self.parameters
    }

    pub fn into_command(self) -> SqlCommand {
        SqlCommand {
            command_text: self.text,
            parameters: self.parameters,
        }
    }
}
