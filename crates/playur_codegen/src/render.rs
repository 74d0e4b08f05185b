use crate::sanitize::{sanitize, strip_invalid};
use playur_core::records::{GroupRecord, ParameterKey, RemoteRecord, ResourceType};
use std::fmt::Write;

/// Records fetched for one resource type, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Records {
    Plain(Vec<RemoteRecord>),
    Groups(Vec<GroupRecord>),
    Parameters(Vec<ParameterKey>),
}

impl Records {
    pub fn len(&self) -> usize {
        match self {
            Records::Plain(records) => records.len(),
            Records::Groups(records) => records.len(),
            Records::Parameters(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn summary(resource: ResourceType) -> &'static str {
    match resource {
        ResourceType::Action => "Enum generated from server representing possible user actions.",
        ResourceType::Element => "Enum generated from server representing top-level game elements.",
        ResourceType::Experiment => {
            "Enum generated from server representing experiments for this game."
        }
        ResourceType::ExperimentGroup => {
            "Enum generated from server representing experiment groups for this game."
        }
        ResourceType::AnalyticsColumn => {
            "Enum generated from server representing the extra analytics columns used for this game."
        }
        ResourceType::Parameter => {
            "Constant Strings generated from server representing the parameter keys for this game."
        }
    }
}

fn open(text: &mut String, resource: ResourceType, declaration: &str) {
    text.push_str("namespace PlayUR\n{\n");
    let _ = writeln!(
        text,
        "\t///<summary>{} To update run `playur generate-enums`.</summary>",
        summary(resource)
    );
    let _ = writeln!(text, "\t{declaration} {}", resource.type_name());
    text.push_str("\t{\n");
}

fn close(text: &mut String) {
    text.push_str("\t}\n}\n");
}

/// `Identifier` for an experiment group: parent experiment and group name
/// joined with `_`.
pub fn group_identifier(record: &GroupRecord) -> String {
    format!("{}_{}", sanitize(&record.experiment), strip_invalid(&record.name))
}

/// Constant name (and value) for a parameter key. Array keys lose their `[]`.
pub fn parameter_identifier(key: &ParameterKey) -> String {
    sanitize(&key.key().replace("[]", ""))
}

pub fn render_enum(resource: ResourceType, records: &[RemoteRecord]) -> String {
    let mut text = String::new();
    open(&mut text, resource, "public enum");
    for record in records {
        let _ = writeln!(text, "\t\t{} = {},", sanitize(&record.name), record.id);
    }
    close(&mut text);
    text
}

pub fn render_groups(records: &[GroupRecord]) -> String {
    let mut text = String::new();
    open(&mut text, ResourceType::ExperimentGroup, "public enum");
    for record in records {
        let _ = writeln!(text, "\t\t{} = {},", group_identifier(record), record.id);
    }
    close(&mut text);
    text
}

pub fn render_parameters(keys: &[ParameterKey]) -> String {
    let mut text = String::new();
    open(&mut text, ResourceType::Parameter, "public static class");
    for key in keys {
        let ident = parameter_identifier(key);
        let _ = writeln!(text, "\t\tpublic static string {ident} = \"{ident}\";");
    }
    close(&mut text);
    text
}

/// Source text for `resource`.
pub fn render(resource: ResourceType, records: &Records) -> String {
    match records {
        Records::Plain(records) => render_enum(resource, records),
        Records::Groups(records) => render_groups(records),
        Records::Parameters(keys) => render_parameters(keys),
    }
}
