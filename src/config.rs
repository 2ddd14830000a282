use crate::{
    error::{Error, Result},
    hue::Quantize,
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENDPOINT: &str = "https://not.slack.hackclub.com/api/v4/users/{user_id}/image";
pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api/users.setPhoto";

const USER_ID_PLACEHOLDER: &str = "{user_id}";

/// Which upload client publishes the rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Multipart POST to the configured endpoint.
    #[default]
    Http,
    /// Slack Web API `users.setPhoto`.
    Slack,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Derivative)]
#[derivative(Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[derivative(Default(value = "20"))]
    pub frames: u32,

    #[derivative(Default(value = "PathBuf::from(\"pfp.png\")"))]
    pub image: PathBuf,

    #[derivative(Default(value = "PathBuf::from(\"current_frame.txt\")"))]
    pub state_file: PathBuf,

    pub token: Option<String>,
    pub user_id: Option<String>,

    #[derivative(Default(value = "DEFAULT_ENDPOINT.to_string()"))]
    pub endpoint: String,

    #[derivative(Default(value = "DEFAULT_SLACK_API_URL.to_string()"))]
    pub slack_api_url: String,

    pub transport: Transport,
    pub quantize: Quantize,

    #[derivative(Default(value = "30"))]
    pub timeout_secs: u64,
}

/// Settings given on the command line or through the environment. Anything
/// set here wins over the config file.
#[derive(clap::Args, Debug, Default)]
pub struct Overrides {
    /// Number of frames in one full hue cycle
    #[arg(long, env = "NUM_FRAMES", global = true)]
    pub frames: Option<u32>,

    /// Source image
    #[arg(long, env = "PATH_TO_IMAGE", global = true)]
    pub image: Option<PathBuf>,

    /// File holding the last published frame index
    #[arg(long, env = "FRAME_FILE", global = true)]
    pub state_file: Option<PathBuf>,

    /// Bearer token for the upload API
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// User whose picture is replaced
    #[arg(long, env = "USER_ID", global = true)]
    pub user_id: Option<String>,

    /// Upload endpoint, `{user_id}` is substituted
    #[arg(long, env = "API_PATH", global = true)]
    pub endpoint: Option<String>,

    /// Upload client
    #[arg(long, value_enum, env = "HUECYCLE_TRANSPORT", global = true)]
    pub transport: Option<Transport>,

    /// 8-bit quantization of shifted channels
    #[arg(long, value_enum, env = "HUECYCLE_QUANTIZE", global = true)]
    pub quantize: Option<Quantize>,

    /// Request timeout in seconds
    #[arg(long = "timeout", env = "HUECYCLE_TIMEOUT", global = true)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Reads the optional TOML file and layers `overrides` on top.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                log::debug!("loading config from {}", path.display());
                let text = fs::read_to_string(path)?;
                toml::from_str(&text)?
            }
            None => Config::default(),
        };

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, o: Overrides) {
        if let Some(frames) = o.frames {
            self.frames = frames;
        }
        if let Some(image) = o.image {
            self.image = image;
        }
        if let Some(state_file) = o.state_file {
            self.state_file = state_file;
        }
        if o.token.is_some() {
            self.token = o.token;
        }
        if o.user_id.is_some() {
            self.user_id = o.user_id;
        }
        if let Some(endpoint) = o.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(transport) = o.transport {
            self.transport = transport;
        }
        if let Some(quantize) = o.quantize {
            self.quantize = quantize;
        }
        if let Some(timeout_secs) = o.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.frames == 0 {
            return Err(Error::Config("frames must be at least 1".into()));
        }
        Ok(())
    }

    pub fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Config("no auth token, set AUTH_TOKEN or --token".into()))
    }

    /// The HTTP endpoint with `{user_id}` filled in.
    pub fn endpoint_url(&self) -> Result<String> {
        if !self.endpoint.contains(USER_ID_PLACEHOLDER) {
            return Ok(self.endpoint.clone());
        }

        match self.user_id.as_deref() {
            Some(user_id) if !user_id.is_empty() => {
                Ok(self.endpoint.replace(USER_ID_PLACEHOLDER, user_id))
            }
            _ => Err(Error::Config(format!(
                "endpoint {} needs a user id, set USER_ID or --user-id",
                self.endpoint
            ))),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
