//! Pipeline sequencer
//!
//! A [`Pipeline`] is an ordered list of [`Step`]s run strictly one after the
//! other. Every output event produced by a process step is forwarded to the
//! caller's [`EventSink`] in step order. The first failing step stops the
//! pipeline and its error is returned unmodified; no later step starts.
//!
//! Pipelines are steps themselves, so a named sub-pipeline nests inside a
//! larger one and its failure becomes the enclosing step's failure.
//!
//! ```no_run
//! use playground_core::context::{ExecutionContext, Fact, RunFlags};
//! use playground_core::guards::Guard;
//! use playground_core::pipeline::Pipeline;
//! use playground_core::process::{LogSink, ProcessInvocation, ShellRunner};
//! use std::path::Path;
//!
//! # async fn example() -> playground_core::errors::Result<()> {
//! let mut state = ExecutionContext::for_dirs(
//!     Path::new("/home/me"),
//!     Path::new("/home/me/.local/share/topos-playground"),
//!     Path::new("/home/me/.local/state/topos-playground/logs"),
//!     "local-erc20-messaging-infra",
//!     RunFlags::default(),
//! );
//! let pipeline = Pipeline::new("hello")
//!     .log("Saying hello...")
//!     .guarded(
//!         Guard::WorkingDirExists,
//!         Pipeline::new("present").log("✅ Working directory exists"),
//!         Pipeline::new("absent").process(ProcessInvocation::new("echo hello"), "✅ Said hello"),
//!     );
//! pipeline.execute(&mut state, &ShellRunner::from_env(), &mut LogSink).await?;
//! # Ok(())
//! # }
//! ```

use crate::context::{ExecutionContext, Fact};
use crate::errors::Result;
use crate::guards::Guard;
use crate::process::{EventSink, ProcessInvocation, ProcessRunner};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// Everything a step may touch while it runs
pub struct StepContext<'a> {
    pub state: &'a mut ExecutionContext,
    pub runner: &'a dyn ProcessRunner,
    pub events: &'a mut dyn EventSink,
}

/// One unit of work in a workflow
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, cx: &mut StepContext<'_>) -> Result<()>;
}

/// Run `steps` in order, stopping at the first failure
pub async fn sequence(steps: &[Box<dyn Step>], cx: &mut StepContext<'_>) -> Result<()> {
    for step in steps {
        debug!("▶ {}", step.name());
        step.run(cx).await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Emit one log line
#[derive(Debug, Clone)]
pub struct LogStep {
    level: LogLevel,
    message: String,
}

impl LogStep {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[async_trait]
impl Step for LogStep {
    fn name(&self) -> &str {
        "log"
    }

    async fn run(&self, _cx: &mut StepContext<'_>) -> Result<()> {
        match self.level {
            LogLevel::Info => info!("{}", self.message),
            LogLevel::Warn => warn!("{}", self.message),
            LogLevel::Error => error!("{}", self.message),
        }
        Ok(())
    }
}

/// Run one external command and forward its output
#[derive(Debug, Clone)]
pub struct ProcessStep {
    invocation: ProcessInvocation,
    success: Option<String>,
}

impl ProcessStep {
    pub fn new(invocation: ProcessInvocation) -> Self {
        Self {
            invocation,
            success: None,
        }
    }

    /// Message logged once the command completes
    pub fn with_success(mut self, message: impl Into<String>) -> Self {
        self.success = Some(message.into());
        self
    }

    pub fn invocation(&self) -> &ProcessInvocation {
        &self.invocation
    }
}

#[async_trait]
impl Step for ProcessStep {
    fn name(&self) -> &str {
        &self.invocation.command
    }

    async fn run(&self, cx: &mut StepContext<'_>) -> Result<()> {
        let stream = cx.runner.run(&self.invocation);
        stream.forward(&mut *cx.events).await?;
        if let Some(message) = &self.success {
            info!("{}", message);
        }
        Ok(())
    }
}

/// Inspect state and record the outcome in the execution context
#[derive(Debug, Clone)]
pub struct GuardStep {
    guard: Guard,
}

impl GuardStep {
    pub fn new(guard: Guard) -> Self {
        Self { guard }
    }
}

#[async_trait]
impl Step for GuardStep {
    fn name(&self) -> &str {
        "guard"
    }

    async fn run(&self, cx: &mut StepContext<'_>) -> Result<()> {
        self.guard.check(cx.state, cx.runner).await?;
        Ok(())
    }
}

/// Choose between two sub-pipelines based on a recorded fact
pub struct Branch {
    fact: Fact,
    when_present: Pipeline,
    when_absent: Pipeline,
}

impl Branch {
    pub fn new(fact: Fact, when_present: Pipeline, when_absent: Pipeline) -> Self {
        Self {
            fact,
            when_present,
            when_absent,
        }
    }
}

#[async_trait]
impl Step for Branch {
    fn name(&self) -> &str {
        "branch"
    }

    async fn run(&self, cx: &mut StepContext<'_>) -> Result<()> {
        if cx.state.holds(&self.fact) {
            self.when_present.run(cx).await
        } else {
            self.when_absent.run(cx).await
        }
    }
}

/// A named, ordered list of steps
pub struct Pipeline {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn log(self, message: impl Into<String>) -> Self {
        self.step(LogStep::new(LogLevel::Info, message))
    }

    pub fn warn(self, message: impl Into<String>) -> Self {
        self.step(LogStep::new(LogLevel::Warn, message))
    }

    pub fn error(self, message: impl Into<String>) -> Self {
        self.step(LogStep::new(LogLevel::Error, message))
    }

    /// Run `invocation`, logging `success` once it completes
    pub fn process(self, invocation: ProcessInvocation, success: impl Into<String>) -> Self {
        self.step(ProcessStep::new(invocation).with_success(success))
    }

    pub fn guard(self, guard: Guard) -> Self {
        self.step(GuardStep::new(guard))
    }

    /// Check `guard`, then run `when_present` or `when_absent` depending on
    /// the fact it recorded
    pub fn guarded(self, guard: Guard, when_present: Pipeline, when_absent: Pipeline) -> Self {
        let fact = guard.fact();
        self.guard(guard)
            .step(Branch::new(fact, when_present, when_absent))
    }

    /// Branch on a fact recorded by an earlier guard
    pub fn branch(self, fact: Fact, when_present: Pipeline, when_absent: Pipeline) -> Self {
        self.step(Branch::new(fact, when_present, when_absent))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Run the whole pipeline against `state`
    pub async fn execute(
        &self,
        state: &mut ExecutionContext,
        runner: &dyn ProcessRunner,
        events: &mut dyn EventSink,
    ) -> Result<()> {
        let mut cx = StepContext {
            state,
            runner,
            events,
        };
        self.run(&mut cx).await
    }
}

#[async_trait]
impl Step for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, cx: &mut StepContext<'_>) -> Result<()> {
        sequence(&self.steps, cx).await
    }
}
