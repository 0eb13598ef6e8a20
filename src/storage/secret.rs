//! Secrets Manager secret construct.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::synth::iam::{PolicyStatement, SECRET_READ_ACTIONS};
use crate::synth::intrinsics::reference;
use crate::synth::{
    logical_id, Construct, ConstructError, ConstructResult, RemovalPolicy, Resource, Stack,
};

/// Generated secret value settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerateProps {
    /// Default: 32.
    pub length: u32,
    pub exclude_punctuation: bool,
    pub exclude_characters: Option<String>,
    /// JSON object the generated value is inserted into.
    pub secret_string_template: Option<String>,
    /// Key of the generated value inside the template.
    pub generate_string_key: Option<String>,
}

impl Default for GenerateProps {
    fn default() -> Self {
        Self {
            length: 32,
            exclude_punctuation: false,
            exclude_characters: None,
            secret_string_template: None,
            generate_string_key: None,
        }
    }
}

/// Props for [`SecretConstruct`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretProps {
    pub id: String,
    pub secret_name: Option<String>,
    pub description: Option<String>,
    /// Reference an existing secret instead of creating one.
    pub existing_secret_arn: Option<String>,
    /// Generation settings; defaults apply when neither this nor an ARN is set.
    pub generate: Option<GenerateProps>,
    /// Functions granted read access.
    pub readers: Vec<String>,
    /// Environment key bound to the secret ARN on readers.
    pub environment_key: Option<String>,
    pub removal_policy: RemovalPolicy,
}

#[derive(Debug, Clone)]
pub struct SecretConstruct {
    pub props: SecretProps,
}

impl SecretConstruct {
    pub fn new(props: SecretProps) -> Self {
        Self { props }
    }

    fn generate_value(&self, generate: &GenerateProps) -> ConstructResult<Value> {
        let id = &self.props.id;
        if !(1..=4096).contains(&generate.length) {
            return Err(ConstructError::invalid(
                id,
                "generate.length",
                "must be between 1 and 4096",
            ));
        }
        let mut value = json!({
            "PasswordLength": generate.length,
            "ExcludePunctuation": generate.exclude_punctuation,
        });
        if let Some(chars) = &generate.exclude_characters {
            value["ExcludeCharacters"] = json!(chars);
        }
        match (&generate.secret_string_template, &generate.generate_string_key) {
            (Some(template), Some(key)) => {
                if serde_json::from_str::<Map<String, Value>>(template).is_err() {
                    return Err(ConstructError::invalid(
                        id,
                        "generate.secret_string_template",
                        "must be a JSON object",
                    ));
                }
                if key.trim().is_empty() {
                    return Err(ConstructError::missing(id, "generate.generate_string_key"));
                }
                value["SecretStringTemplate"] = json!(template);
                value["GenerateStringKey"] = json!(key);
            }
            (Some(_), None) => {
                return Err(ConstructError::dependency(
                    id,
                    "generate.secret_string_template",
                    "generate.generate_string_key",
                ))
            }
            (None, Some(_)) => {
                return Err(ConstructError::dependency(
                    id,
                    "generate.generate_string_key",
                    "generate.secret_string_template",
                ))
            }
            (None, None) => {}
        }
        Ok(value)
    }
}

impl Construct for SecretConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "secret"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        if p.id.trim().is_empty() {
            return Err(ConstructError::missing("secret", "id"));
        }
        let readers = stack.functions(&p.id, &p.readers)?;

        let arn = match &p.existing_secret_arn {
            Some(existing) => {
                if p.generate.is_some() {
                    return Err(ConstructError::conflict(&p.id, "existing_secret_arn", "generate"));
                }
                if p.secret_name.is_some() {
                    return Err(ConstructError::conflict(
                        &p.id,
                        "existing_secret_arn",
                        "secret_name",
                    ));
                }
                if !existing.starts_with("arn:") {
                    return Err(ConstructError::invalid(
                        &p.id,
                        "existing_secret_arn",
                        "must be a secret ARN",
                    ));
                }
                json!(existing)
            }
            None => {
                let generate = p.generate.clone().unwrap_or_default();
                let mut properties = json!({
                    "GenerateSecretString": self.generate_value(&generate)?,
                });
                if let Some(name) = &p.secret_name {
                    properties["Name"] = json!(name);
                }
                if let Some(description) = &p.description {
                    properties["Description"] = json!(description);
                }
                let secret_id = stack.add_resource(
                    logical_id(&[&p.id, "Secret"]),
                    Resource::new("AWS::SecretsManager::Secret", properties)
                        .with_removal_policy(p.removal_policy),
                )?;
                reference(&secret_id)
            }
        };

        for handle in &readers {
            handle.grant(stack, PolicyStatement::allow(SECRET_READ_ACTIONS, vec![arn.clone()]))?;
            if let Some(key) = &p.environment_key {
                handle.bind_environment(stack, key, arn.clone())?;
            }
        }

        stack.add_exported_output(logical_id(&[&p.id, "SecretArn"]), arn, "Secret ARN")
    }
}
