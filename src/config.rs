use std::time::Duration;

use anyhow::Context;
use fanout_bus::{
    fanout::{InitFailurePolicy, Session, SessionOptions},
    input::{AvInput, InputSource},
    output::{AvOutput, AvOutputFactory, OutputOptions},
    reconnect::ReconnectPolicy,
    registry::OutputRegistry,
    sink::OutputSink,
};

use crate::cli::Cli;

/// Everything needed to build one fan-out session.
#[derive(Clone, Debug)]
pub struct FanoutConfig {
    input: String,
    input_format: Option<String>,
    outputs: Vec<String>,
    output: OutputOptions,
    session: SessionOptions,
}

impl FanoutConfig {
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn output_options(&self) -> &OutputOptions {
        &self.output
    }

    pub fn session_options(&self) -> &SessionOptions {
        &self.session
    }

    /// Open and probe the input, then create every output in the order given.
    /// Blocks while the input is being opened.
    pub fn build_session(&self) -> anyhow::Result<Session<AvInput, AvOutput>> {
        let source = InputSource::open(&self.input, self.input_format.as_deref(), None)
            .with_context(|| format!("input {}", self.input))?;

        let mut registry = OutputRegistry::new();
        for url in &self.outputs {
            let sink = OutputSink::create(&AvOutputFactory, url, &self.output)
                .with_context(|| format!("output {}", url))?;
            let slot = registry.append(sink);
            log::debug!("output {} registered in slot {}", url, slot);
        }

        Ok(Session::new(source, registry, self.session.clone()))
    }
}

impl From<&Cli> for FanoutConfig {
    fn from(cli: &Cli) -> Self {
        let output = OutputOptions {
            format: cli.format.clone(),
            accept_timeout: cli.accept_timeout.map(Duration::from_millis),
            header_options: cli.header_options.clone(),
            ..OutputOptions::default()
        };
        let session = SessionOptions {
            reconnect: ReconnectPolicy::new(
                cli.reconnect_attempts,
                Duration::from_millis(cli.reconnect_backoff),
            ),
            init_failure: if cli.isolate_failures {
                InitFailurePolicy::Isolate
            } else {
                InitFailurePolicy::Abort
            },
        };

        Self {
            input: cli.input().to_string(),
            input_format: cli.input_format.clone(),
            outputs: cli.outputs.clone(),
            output,
            session,
        }
    }
}
