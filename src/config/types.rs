//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::agents::{
    AgentError, PlainAgent, SubAgent, Supervisor, SupervisorOptions, SUPERVISOR_INFO,
};
use crate::ai::Model;

/// AI provider kind.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Claude,
}

/// Configuration for the model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Provider to use (gemini or claude).
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model name sent to the provider.
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Base URL for the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable name for the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLEAI_API_KEY".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Configuration of the top-level supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub name: String,
    pub system_prompt: String,
    /// Routing description, used if this team is nested in another.
    pub info: String,
    /// Echo the supervisor's own turns.
    pub echo: bool,
    /// Echo the turns of every sub-agent.
    pub sub_agent_verbosity: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            name: "supervisor".to_string(),
            system_prompt: "You are a helpful assistant that answers the user and coordinates the \
agents under your command."
                .to_string(),
            info: SUPERVISOR_INFO.to_string(),
            echo: true,
            sub_agent_verbosity: false,
        }
    }
}

/// Configuration of one plain sub-agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub system_prompt: String,
    /// Short description the supervisor routes on.
    pub info: String,
}

impl AgentConfig {
    fn mlflow() -> Self {
        Self {
            name: "mlflow-agent".to_string(),
            system_prompt: "You are an expert on MLflow experiment tracking. Answer questions \
about experiments, runs, metrics and registered models."
                .to_string(),
            info: "Answers questions about MLflow experiments, runs, metrics and the model \
registry."
                .to_string(),
        }
    }
}

fn default_agents() -> Vec<AgentConfig> {
    vec![AgentConfig::mlflow()]
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai: AiConfig::default(),
            supervisor: SupervisorConfig::default(),
            agents: default_agents(),
        }
    }
}

impl AppConfig {
    /// Assemble the configured team over `lm`.
    ///
    /// Sub-agents are created with their echo already set to
    /// `sub_agent_verbosity`, so a quiet team echoes nothing while it is built.
    ///
    /// # Errors
    ///
    /// Returns an error if an agent name is invalid or repeated.
    pub fn build_supervisor(&self, lm: &Model) -> Result<Supervisor, AgentError> {
        let sub_agents = self
            .agents
            .iter()
            .map(|agent| {
                PlainAgent::with_echo(
                    &agent.name,
                    &agent.system_prompt,
                    &agent.info,
                    lm,
                    self.supervisor.sub_agent_verbosity,
                )
                .map(SubAgent::from)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let options = SupervisorOptions {
            echo: self.supervisor.echo,
            sub_agent_verbosity: self.supervisor.sub_agent_verbosity,
        };
        let supervisor = Supervisor::new(
            &self.supervisor.name,
            &self.supervisor.system_prompt,
            lm,
            sub_agents,
            options,
        )?;
        Ok(supervisor.with_info(&self.supervisor.info))
    }
}
