//! Operator confirmation gates.
//!
//! The controller asks twice before any motion: once before moving to the
//! starting pose and once before playing. Anything other than an explicit
//! yes ends the session without further commands. Answers are awaited, so
//! the controller can abandon a pending gate when the session is cancelled.

use std::collections::VecDeque;
use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::limb::BodyPose;

/// Which confirmation the controller is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// Move the robot to the (clamped) starting pose?
    StartPose,
    /// Start playing the trajectory?
    Play,
}

/// What the operator is asked to approve.
#[derive(Clone, Copy, Debug)]
pub struct GatePrompt<'a> {
    pub gate: Gate,
    /// Clamped starting pose.
    pub pose: &'a BodyPose,
    pub start_tick: usize,
    pub tick_count: usize,
    /// Joints of the starting pose that had to be clamped.
    pub start_violations: usize,
}

/// Source of operator decisions.
pub trait Confirmation {
    /// Resolve to `true` to proceed.
    fn confirm(&mut self, prompt: &GatePrompt<'_>) -> impl Future<Output = bool> + Send;
}

/// Interactive prompt on stdin/stdout.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompt<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Prompt on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

fn render(prompt: &GatePrompt<'_>) -> String {
    match prompt.gate {
        Gate::StartPose => {
            let mut text = String::new();
            if prompt.start_violations == 0 {
                text.push_str(" *** FEASIBLE STARTING POSITION *** \n");
            } else {
                text.push_str(" *** INFEASIBLE STARTING POSITION *** \n");
                text.push_str(&format!(
                    "The initial position violates the joint limits x{} times, the values were clamped\n",
                    prompt.start_violations
                ));
            }
            text.push_str(&format!(
                "Move the robot to the initial position:{}\n",
                prompt.pose
            ));
            text.push_str(&format!(
                " ==> at starting tick {} of {}\n",
                prompt.start_tick, prompt.tick_count
            ));
            text.push_str(" ok? (y/n) ");
            text
        }
        Gate::Play => " Starting movement? (y/n) ".to_string(),
    }
}

impl<R, W> ConsolePrompt<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    async fn ask(&mut self, prompt: &GatePrompt<'_>) -> std::io::Result<bool> {
        self.output.write_all(render(prompt).as_bytes()).await?;
        self.output.flush().await?;

        let mut answer = String::new();
        self.input.read_line(&mut answer).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(answer.trim() == "y")
    }
}

impl<R, W> Confirmation for ConsolePrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&mut self, prompt: &GatePrompt<'_>) -> bool {
        match self.ask(prompt).await {
            Ok(yes) => yes,
            Err(e) => {
                tracing::warn!("cannot read confirmation, treating as no: {}", e);
                false
            }
        }
    }
}

/// Confirms every gate without asking.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoConfirm;

impl Confirmation for AutoConfirm {
    async fn confirm(&mut self, prompt: &GatePrompt<'_>) -> bool {
        tracing::info!("{:?} confirmed automatically", prompt.gate);
        true
    }
}

/// Replays a fixed list of answers and records the gates it was asked.
///
/// Once the answers run out every further gate is declined.
#[derive(Clone, Debug, Default)]
pub struct ScriptedConfirm {
    answers: VecDeque<bool>,
    asked: Vec<Gate>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// Gates asked so far, in order.
    pub fn asked(&self) -> &[Gate] {
        &self.asked
    }
}

impl Confirmation for ScriptedConfirm {
    async fn confirm(&mut self, prompt: &GatePrompt<'_>) -> bool {
        self.asked.push(prompt.gate);
        self.answers.pop_front().unwrap_or(false)
    }
}
