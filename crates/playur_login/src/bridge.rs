use serde::Deserialize;
use serde_json::Value;

/// Payload the hosting web page hands to the game to log a player in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrowserLogin {
    pub username: String,
    pub password: String,

    #[serde(rename = "browserInfo")]
    pub browser_info: Option<Value>,

    experiment: Option<Value>,

    #[serde(rename = "experimentGroup")]
    experiment_group: Option<Value>,
}

impl BrowserLogin {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Experiment pre-selected by the page, if any.
    pub fn requested_experiment(&self) -> Option<i64> {
        self.experiment.as_ref().and_then(requested_id)
    }

    /// Experiment group pre-selected by the page, if any.
    pub fn requested_experiment_group(&self) -> Option<i64> {
        self.experiment_group.as_ref().and_then(requested_id)
    }
}

/// `-1` and anything that is not an integer mean "no request".
fn requested_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (id != -1).then_some(id)
}
