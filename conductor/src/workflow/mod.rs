//! Linear step chains for agentic workflows.
//!
//! A [`Workflow`] is a fixed, ordered list of named [`Step`]s over a shared
//! state value. Steps run strictly in declaration order; each one sees the
//! outputs of every earlier step by name and produces a text output for the
//! steps after it. The first failing step aborts the chain.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::error::WorkflowError;

pub mod linter;
pub mod tdd;

/// Signature of a step body: mutable access to the workflow state plus
/// read-only access to the outputs recorded so far.
pub type StepFn<S> = fn(&mut S, &StepInput<'_>) -> Result<String, WorkflowError>;

/// A named unit of work inside a [`Workflow`].
pub struct Step<S> {
    pub name: &'static str,
    run: StepFn<S>,
}

impl<S> Step<S> {
    pub fn new(name: &'static str, run: StepFn<S>) -> Self {
        Self { name, run }
    }
}

/// Read access to earlier steps' outputs.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    previous: &'a [StepOutput],
}

impl<'a> StepInput<'a> {
    /// Content recorded by the step called `name`, if it already ran.
    pub fn step_content(&self, name: &str) -> Option<&'a str> {
        self.previous
            .iter()
            .find(|step| step.name == name)
            .map(|step| step.content.as_str())
    }

    pub fn previous(&self) -> &'a [StepOutput] {
        self.previous
    }
}

/// Output recorded for one completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub name: String,
    pub content: String,
}

/// Record of one complete workflow invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub workflow: String,
    pub steps: Vec<StepOutput>,
    /// Terminal content: the last step's output.
    pub content: Option<String>,
}

impl WorkflowRun {
    pub fn step_content(&self, name: &str) -> Option<&str> {
        self.steps
            .iter()
            .find(|step| step.name == name)
            .map(|step| step.content.as_str())
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name.as_str()).collect()
    }
}

/// An ordered chain of steps over state `S`.
pub struct Workflow<S> {
    pub name: &'static str,
    pub description: &'static str,
    steps: Vec<Step<S>>,
}

impl<S> Workflow<S> {
    pub fn new(name: &'static str, description: &'static str, steps: Vec<Step<S>>) -> Self {
        Self {
            name,
            description,
            steps,
        }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name).collect()
    }

    /// Run every step in order, threading outputs forward.
    pub fn run(&self, state: &mut S) -> Result<WorkflowRun, WorkflowError> {
        let _span = info_span!("workflow", name = self.name).entered();
        let mut outputs: Vec<StepOutput> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let started = Instant::now();
            info!(step = step.name, "starting step");
            let content = {
                let input = StepInput { previous: &outputs };
                (step.run)(state, &input)?
            };
            info!(
                step = step.name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "finished step"
            );
            outputs.push(StepOutput {
                name: step.name.to_string(),
                content,
            });
        }

        let content = outputs.last().map(|step| step.content.clone());
        Ok(WorkflowRun {
            workflow: self.name.to_string(),
            steps: outputs,
            content,
        })
    }
}

/// Append `content` under `heading`, separated by a blank line.
///
/// Empty or whitespace-only content leaves the prompt unchanged.
pub fn append_context(prompt: &str, heading: &str, content: Option<&str>) -> String {
    match content.map(str::trim) {
        Some(content) if !content.is_empty() => format!("{prompt}\n\n{heading}\n{content}"),
        _ => prompt.to_string(),
    }
}
