use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::JenkinsClient;
use crate::error::Result;
use crate::jenkins::types::JobParameters;

const PARAMETERS_PROPERTY: &str = "hudson.model.ParametersDefinitionProperty";
const CHOICE_PARAMETER: &str = "hudson.model.ChoiceParameterDefinition";
const GIT_PARAMETER: &str = "net.uaznia.lukanus.hudson.plugins.gitparameter.GitParameterDefinition";

impl JenkinsClient {
    pub async fn list_views(&self) -> Result<Vec<String>> {
        let url = self.url(&["api", "json"])?;
        let response: ViewsResponse = self.get_json("Listing views", url).await?;

        Ok(response.views.into_iter().map(|view| view.name).collect())
    }

    pub async fn list_jobs(&self, view: &str) -> Result<Vec<String>> {
        let url = self.url(&["view", view, "api", "json"])?;
        let response: JobsResponse = self
            .get_json(&format!("Listing jobs in view {view}"), url)
            .await?;

        Ok(response.jobs.into_iter().map(|job| job.name).collect())
    }

    /// Reads the choice and git-branch parameters a job declares.
    ///
    /// Jobs without them yield empty lists rather than an error.
    pub async fn job_parameters(&self, job: &str) -> Result<JobParameters> {
        let url = self.job_url(job, &["api", "json"])?;
        let definition: JobDefinition = self
            .get_json(&format!("Fetching parameters of {job}"), url)
            .await?;

        let parameters = extract_parameters(definition);
        debug!(
            "{job}: {} choices, {} branches",
            parameters.choices.len(),
            parameters.branches.len()
        );
        Ok(parameters)
    }
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct ViewsResponse {
    #[serde(default)]
    views: Vec<Named>,
}

#[derive(Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<Named>,
}

#[derive(Deserialize)]
struct JobDefinition {
    #[serde(default)]
    property: Vec<JobProperty>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobProperty {
    #[serde(rename = "_class", default)]
    class: String,
    #[serde(default)]
    parameter_definitions: Vec<ParameterDefinition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterDefinition {
    #[serde(rename = "_class", default)]
    class: String,
    #[serde(default)]
    name: String,
    // Plugins put arbitrary shapes under these keys; decoded per class below.
    #[serde(default)]
    choices: Value,
    #[serde(default)]
    all_value_items: Value,
}

#[derive(Default, Deserialize)]
struct ValueItems {
    #[serde(default)]
    values: Vec<ValueItem>,
}

#[derive(Deserialize)]
struct ValueItem {
    value: String,
}

/// Takes the first choice and the first git parameter, like the job form does.
fn extract_parameters(definition: JobDefinition) -> JobParameters {
    let mut parameters = JobParameters::default();

    let definitions = definition
        .property
        .into_iter()
        .filter(|property| property.class == PARAMETERS_PROPERTY)
        .flat_map(|property| property.parameter_definitions);

    for parameter in definitions {
        match parameter.class.as_str() {
            CHOICE_PARAMETER if parameters.choice_name.is_none() => {
                parameters.choice_name = Some(parameter.name);
                parameters.choices = decode_or_default::<Vec<String>>(parameter.choices);
            }
            GIT_PARAMETER if parameters.branch_name.is_none() => {
                parameters.branch_name = Some(parameter.name);
                parameters.branches = decode_or_default::<ValueItems>(parameter.all_value_items)
                    .values
                    .into_iter()
                    .map(|item| item.value)
                    .collect();
            }
            _ => {}
        }
    }

    parameters
}

fn decode_or_default<T: DeserializeOwned + Default>(value: Value) -> T {
    if value.is_null() {
        return T::default();
    }
    serde_json::from_value(value).unwrap_or_else(|e| {
        debug!("Ignoring malformed parameter values: {e}");
        T::default()
    })
}
