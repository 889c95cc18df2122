use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::params::{LensParams, ParamMap};

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("failed to read profile library {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("profile library is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("profile library must be a JSON object of named profiles")]
    NotAnObject,
}

#[derive(Clone, Debug, Default)]
/// Named lens profiles, in file order.
pub struct ProfileLibrary {
    profiles: Vec<(String, ParamMap)>,
}

impl ProfileLibrary {
    pub fn parse(text: &str) -> Result<Self, ProfileError> {
        let Value::Object(root) = serde_json::from_str::<Value>(text)? else {
            return Err(ProfileError::NotAnObject);
        };
        let mut profiles = Vec::with_capacity(root.len());
        for (name, value) in root {
            match value {
                Value::Object(map) => profiles.push((name, map)),
                other => {
                    tracing::warn!(profile = %name, kind = json_kind(&other), "skipping non-object profile")
                }
            }
        }
        tracing::debug!(count = profiles.len(), "parsed lens profiles");
        Ok(Self { profiles })
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|(name, _)| name.as_str())
    }

    /// The first profile in the file.
    pub fn default_name(&self) -> Option<&str> {
        self.names().next()
    }

    pub fn get(&self, name: &str) -> Option<&ParamMap> {
        self.profiles
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, map)| map)
    }

    pub fn resolve(&self, name: &str) -> Option<LensParams> {
        self.get(name).map(LensParams::resolve)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
