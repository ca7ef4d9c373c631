use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::context::StackContext;
use crate::error::{Result, StackError};
use crate::output::CaptureReporter;
use crate::services::process::{ProcessOutput, ProcessRunner, RunOptions};

struct Rule {
    pattern: String,
    responses: VecDeque<ProcessOutput>,
    spawn_error: bool,
}

/// Fake runner answering by substring match on the joined command line.
///
/// Later rules shadow earlier ones. A rule given several responses hands them
/// out in order and then repeats the last. Unmatched commands succeed with no
/// output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, pattern: &str, response: ProcessOutput) {
        self.on_sequence(pattern, vec![response]);
    }

    pub fn on_sequence(&self, pattern: &str, responses: Vec<ProcessOutput>) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            responses: responses.into(),
            spawn_error: false,
        });
    }

    /// Make matching commands fail as if the program could not be started.
    pub fn fail_spawn(&self, pattern: &str) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            responses: VecDeque::new(),
            spawn_error: true,
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, pattern: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.contains(pattern))
            .collect()
    }

    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.contains(pattern))
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, argv: &[String], _options: &RunOptions) -> Result<ProcessOutput> {
        let line = argv.join(" ");
        self.calls.lock().unwrap().push(line.clone());
        let mut rules = self.rules.lock().unwrap();
        let Some(rule) = rules.iter_mut().rev().find(|r| line.contains(&r.pattern)) else {
            return Ok(ProcessOutput::default());
        };
        if rule.spawn_error {
            return Err(StackError::Spawn {
                program: argv.first().cloned().unwrap_or_default(),
                message: "No such file or directory (os error 2)".into(),
            });
        }
        let response = if rule.responses.len() > 1 {
            rule.responses.pop_front()
        } else {
            rule.responses.front().cloned()
        };
        Ok(response.unwrap_or_default())
    }
}

/// Context wired to a scripted runner and a capturing reporter.
pub fn scripted_context() -> (StackContext, Arc<ScriptedRunner>, Arc<CaptureReporter>) {
    let runner = Arc::new(ScriptedRunner::new());
    let reporter = Arc::new(CaptureReporter::new());
    let ctx = StackContext::new(runner.clone(), reporter.clone());
    (ctx, runner, reporter)
}
