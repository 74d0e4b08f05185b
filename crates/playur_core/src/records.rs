use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A category of server-managed entity. Each one maps to a single generated
/// source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Action,
    Element,
    Experiment,
    ExperimentGroup,
    AnalyticsColumn,
    Parameter,
}

impl ResourceType {
    pub const ALL: [ResourceType; 6] = [
        ResourceType::Action,
        ResourceType::Element,
        ResourceType::Experiment,
        ResourceType::ExperimentGroup,
        ResourceType::AnalyticsColumn,
        ResourceType::Parameter,
    ];

    /// Server endpoint, relative to the API root.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ResourceType::Action => "Action/listForGame.php",
            ResourceType::Element => "Element/listForGame.php",
            ResourceType::Experiment => "Experiment/listForGame.php",
            ResourceType::ExperimentGroup => "ExperimentGroup/listForGame.php",
            ResourceType::AnalyticsColumn => "AnalyticsColumn/listForGame.php",
            ResourceType::Parameter => "GameParameter/listParameterKeys.php",
        }
    }

    /// Name of the generated C# type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceType::Action => "Action",
            ResourceType::Element => "Element",
            ResourceType::Experiment => "Experiment",
            ResourceType::ExperimentGroup => "ExperimentGroup",
            ResourceType::AnalyticsColumn => "AnalyticsColumn",
            ResourceType::Parameter => "Parameter",
        }
    }

    /// Name of the generated file. Note the plural for analytics columns.
    pub fn file_name(&self) -> &'static str {
        match self {
            ResourceType::AnalyticsColumn => "AnalyticsColumns.cs",
            ResourceType::Action => "Action.cs",
            ResourceType::Element => "Element.cs",
            ResourceType::Experiment => "Experiment.cs",
            ResourceType::ExperimentGroup => "ExperimentGroup.cs",
            ResourceType::Parameter => "Parameter.cs",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "action" | "actions" => Ok(ResourceType::Action),
            "element" | "elements" => Ok(ResourceType::Element),
            "experiment" | "experiments" => Ok(ResourceType::Experiment),
            "experimentgroup" | "experimentgroups" | "group" | "groups" => {
                Ok(ResourceType::ExperimentGroup)
            }
            "analyticscolumn" | "analyticscolumns" => Ok(ResourceType::AnalyticsColumn),
            "parameter" | "parameters" => Ok(ResourceType::Parameter),
            _ => Err(format!("unknown resource type '{s}'")),
        }
    }
}

/// Ids come back from the server either as JSON numbers or as numeric strings.
pub fn flexible_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => Ok(value),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got '{text}'"))),
    }
}

/// `{ name, id }` as returned by the list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub name: String,
    #[serde(deserialize_with = "flexible_int")]
    pub id: i64,
}

/// An experiment group, carrying the name of its parent experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub experiment: String,
    pub name: String,
    #[serde(deserialize_with = "flexible_int")]
    pub id: i64,
}

/// Parameter keys are usually bare strings, but tolerate `{ "name": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterKey {
    Plain(String),
    Named { name: String },
}

impl ParameterKey {
    pub fn key(&self) -> &str {
        match self {
            ParameterKey::Plain(key) => key,
            ParameterKey::Named { name } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordList<T> {
    pub records: Vec<T>,
}

/// Metadata submitted alongside an archive upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    #[serde(rename = "gameID")]
    pub game_id: i64,

    #[serde(rename = "clientSecret")]
    pub client_secret: String,

    /// Always `latestBuildID + 1` at the time of the upload.
    #[serde(rename = "buildID")]
    pub build_id: i64,

    pub branch: String,
}
