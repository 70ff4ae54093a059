//! Confirmation-gated playback controller.
//!
//! One call to [`PlaybackController::run`] drives a whole session:
//!
//! ```text
//! Idle ─► Loaded ─► BaselineCaptured ─► AwaitingStartConfirmation ─► MovingToStart
//!                                                  │                      │
//!                                                  ▼                      ▼
//!                                               Aborted ◄── AwaitingPlayConfirmation
//!                                                  ▲                      │
//!                                                  │                      ▼
//!                                       (error / interrupt) ◄──────── Playing ─► Finished
//! ```
//!
//! Every pose is clamped by the [`SafetyEnvelope`] before it is sent. Ticks
//! are dispatched strictly in order, all five limb groups per tick, followed
//! by a fixed sleep. Driver handles live in a [`LimbRig`] local to the
//! session and are closed on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use body_player::config::PlaybackConfig;
//! use body_player::confirm::AutoConfirm;
//! use body_player::player::{MotionSource, PlaybackController, SessionRequest};
//! use body_player::sim_driver::SimulatedRobot;
//!
//! # async fn example() -> Result<(), body_player::PlayerError> {
//! let robot = SimulatedRobot::new("icubGazeboSim");
//! let mut controller = PlaybackController::new(robot.driver(), AutoConfirm, PlaybackConfig::new());
//!
//! let request = SessionRequest::new(MotionSource::Human("jointAngles_noheader.txt".into()));
//! let outcome = controller.run(&request).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::compose;
use crate::config::PlaybackConfig;
use crate::confirm::{Confirmation, Gate, GatePrompt};
use crate::driver::{LimbRig, MotionDriver};
use crate::error::PlayerError;
use crate::limb::{BodyPose, LimbGroup};
use crate::safety::{ClampReport, SafetyEnvelope};
use crate::trajectory::{self, ReducedHumanTrajectory, Trajectory};

/// Per-tick dispatch order during playback.
const PLAY_ORDER: [LimbGroup; 5] = [
    LimbGroup::Torso,
    LimbGroup::RightArm,
    LimbGroup::LeftArm,
    LimbGroup::RightLeg,
    LimbGroup::LeftLeg,
];

/// Stages of the move to the starting pose.
const ARMS: [LimbGroup; 2] = [LimbGroup::RightArm, LimbGroup::LeftArm];
const LEGS: [LimbGroup; 2] = [LimbGroup::RightLeg, LimbGroup::LeftLeg];
const TORSO: [LimbGroup; 1] = [LimbGroup::Torso];

/// Controller state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loaded,
    BaselineCaptured,
    AwaitingStartConfirmation,
    MovingToStart,
    AwaitingPlayConfirmation,
    Playing,
    Finished,
    Aborted,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a session plays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MotionSource {
    /// Reduced human recording, composed onto the measured baseline.
    Human(PathBuf),
    /// Full robot-space recording; legs hold the baseline.
    Robot(PathBuf),
}

impl MotionSource {
    pub fn path(&self) -> &std::path::Path {
        match self {
            MotionSource::Human(p) | MotionSource::Robot(p) => p,
        }
    }
}

/// Inputs of one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRequest {
    pub source: MotionSource,
    /// First tick to play; must be smaller than the trajectory's tick count.
    pub start_tick: usize,
}

impl SessionRequest {
    pub fn new(source: MotionSource) -> Self {
        Self {
            source,
            start_tick: 0,
        }
    }

    pub fn start_tick(mut self, tick: usize) -> Self {
        self.start_tick = tick;
        self
    }
}

/// Summary of a session that reached playback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub start_tick: usize,
    pub tick_count: usize,
    pub ticks_played: usize,
    /// Last tick dispatched, if any.
    pub last_tick: Option<usize>,
    /// Clamped joints summed over all played ticks.
    pub total_violations: usize,
    /// Clamped joints of the starting pose (not part of the total).
    pub start_violations: usize,
}

/// How a session ended, when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every tick from the start index was played.
    Finished(PlaybackReport),
    /// The operator declined a gate. No command was sent after it.
    Declined(Gate),
    /// The cancellation token fired. Commands stopped at once.
    Interrupted(PlaybackReport),
}

/// Runtime state of the current (or last) session.
#[derive(Clone, Debug, Default)]
pub struct PlaybackSession {
    state: PlaybackState,
    history: Vec<PlaybackState>,
    baseline: Option<BodyPose>,
    start_tick: usize,
    tick_count: usize,
    current_tick: Option<usize>,
    ticks_played: usize,
    start_violations: usize,
    tick_violations: usize,
    total_violations: usize,
}

impl PlaybackSession {
    fn new() -> Self {
        Self {
            history: vec![PlaybackState::Idle],
            ..Default::default()
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Every state entered, starting with `Idle`.
    pub fn history(&self) -> &[PlaybackState] {
        &self.history
    }

    /// Encoder reading taken at session start.
    pub fn baseline(&self) -> Option<&BodyPose> {
        self.baseline.as_ref()
    }

    pub fn start_tick(&self) -> usize {
        self.start_tick
    }

    /// Last tick dispatched, if any.
    pub fn current_tick(&self) -> Option<usize> {
        self.current_tick
    }

    /// Violations of the last dispatched tick.
    pub fn tick_violations(&self) -> usize {
        self.tick_violations
    }

    pub fn total_violations(&self) -> usize {
        self.total_violations
    }

    fn report(&self) -> PlaybackReport {
        PlaybackReport {
            start_tick: self.start_tick,
            tick_count: self.tick_count,
            ticks_played: self.ticks_played,
            last_tick: self.current_tick,
            total_violations: self.total_violations,
            start_violations: self.start_violations,
        }
    }
}

/// Result of one confirmation gate.
enum Answer {
    Proceed,
    Decline,
    Cancelled,
}

enum LoadedSource {
    Human(ReducedHumanTrajectory),
    Robot(Trajectory),
}

impl LoadedSource {
    fn load(source: &MotionSource) -> Result<Self, PlayerError> {
        match source {
            MotionSource::Human(path) => trajectory::load_reduced_trajectory(path).map(Self::Human),
            MotionSource::Robot(path) => trajectory::load_full_trajectory(path).map(Self::Robot),
        }
    }

    fn compose(&self, baseline: &BodyPose) -> Result<Trajectory, PlayerError> {
        match self {
            LoadedSource::Human(reduced) => compose::compose_full_trajectory(reduced, baseline),
            LoadedSource::Robot(full) => compose::compose_recorded_trajectory(full, baseline),
        }
    }

    /// The pose the robot is moved to before playback: tick 0 of the recording.
    fn starting_pose(
        &self,
        trajectory: &Trajectory,
        baseline: &BodyPose,
    ) -> Result<BodyPose, PlayerError> {
        match self {
            LoadedSource::Human(reduced) => compose::compose_starting_pose(reduced, baseline),
            LoadedSource::Robot(_) => trajectory.pose_at(0).ok_or(PlayerError::EmptyTrajectory),
        }
    }
}

/// Drives playback sessions against a [`MotionDriver`].
pub struct PlaybackController<D: MotionDriver, C: Confirmation> {
    driver: D,
    confirm: C,
    config: PlaybackConfig,
    envelope: SafetyEnvelope,
    cancel: CancellationToken,
    session: PlaybackSession,
}

impl<D: MotionDriver, C: Confirmation> PlaybackController<D, C> {
    pub fn new(driver: D, confirm: C, config: PlaybackConfig) -> Self {
        Self {
            driver,
            confirm,
            config,
            envelope: SafetyEnvelope::standard(),
            cancel: CancellationToken::new(),
            session: PlaybackSession::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that interrupts the session when cancelled.
    ///
    /// Once cancelled it stays cancelled; later sessions stop before any motion.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn confirmation(&self) -> &C {
        &self.confirm
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Run one session to completion.
    ///
    /// Errors leave the controller in [`PlaybackState::Aborted`]; every
    /// driver handle opened by the session is closed before this returns.
    pub async fn run(&mut self, request: &SessionRequest) -> Result<SessionOutcome, PlayerError> {
        self.session = PlaybackSession::new();
        self.session.start_tick = request.start_tick;

        let result = self.run_session(request).await;
        match &result {
            Ok(SessionOutcome::Finished(report)) => {
                tracing::info!(
                    "finished: {} ticks played, joint limits violated x{} times",
                    report.ticks_played,
                    report.total_violations
                );
            }
            Ok(SessionOutcome::Declined(gate)) => {
                tracing::info!("{:?} declined, drivers closed", gate);
                self.transition(PlaybackState::Aborted);
            }
            Ok(SessionOutcome::Interrupted(report)) => {
                tracing::warn!(
                    "interrupted after {} ticks, joint limits violated x{} times",
                    report.ticks_played,
                    report.total_violations
                );
                self.transition(PlaybackState::Aborted);
            }
            Err(e) => {
                tracing::error!("session aborted: {}", e);
                self.transition(PlaybackState::Aborted);
            }
        }
        result
    }

    async fn run_session(
        &mut self,
        request: &SessionRequest,
    ) -> Result<SessionOutcome, PlayerError> {
        // Idle -> Loaded
        let source = LoadedSource::load(&request.source)?;
        self.transition(PlaybackState::Loaded);

        // Loaded -> BaselineCaptured
        let mut rig = LimbRig::open(&mut self.driver)?;
        let baseline = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(self.interrupted()),
            baseline = rig.read_baseline(&self.config.encoder_retry) => baseline?,
        };
        tracing::debug!("baseline:{}", baseline);
        self.session.baseline = Some(baseline.clone());
        self.transition(PlaybackState::BaselineCaptured);

        // BaselineCaptured -> AwaitingStartConfirmation
        let trajectory = source.compose(&baseline)?;
        let tick_count = trajectory.tick_count();
        self.session.tick_count = tick_count;
        let start = request.start_tick;
        if start >= tick_count {
            return Err(PlayerError::Range { start, tick_count });
        }
        let raw_start = source.starting_pose(&trajectory, &baseline)?;
        let (start_pose, start_report) = self.envelope.clamp_body(&raw_start);
        log_violations("starting pose", &start_report);
        self.session.start_violations = start_report.count();
        if start_report.is_empty() {
            tracing::info!("starting pose is feasible");
        } else {
            tracing::warn!(
                "starting pose violates the joint limits x{} times, values clamped",
                start_report.count()
            );
        }
        self.transition(PlaybackState::AwaitingStartConfirmation);

        match self.ask(Gate::StartPose, &start_pose).await {
            Answer::Proceed => {}
            Answer::Decline => return Ok(SessionOutcome::Declined(Gate::StartPose)),
            Answer::Cancelled => return Ok(self.interrupted()),
        }

        // MovingToStart -> AwaitingPlayConfirmation
        self.transition(PlaybackState::MovingToStart);
        rig.configure(&self.config.profile)?;
        let settle = self.config.settle;
        for (groups, delay) in [
            (&ARMS[..], settle.arms),
            (&LEGS[..], settle.legs),
            (&TORSO[..], settle.torso),
        ] {
            if self.cancel.is_cancelled() {
                return Ok(self.interrupted());
            }
            tracing::info!("moving {:?} to the starting pose", groups);
            rig.dispatch(&start_pose, groups)?;
            if !self.pause(delay).await {
                return Ok(self.interrupted());
            }
        }
        self.transition(PlaybackState::AwaitingPlayConfirmation);

        match self.ask(Gate::Play, &start_pose).await {
            Answer::Proceed => {}
            Answer::Decline => return Ok(SessionOutcome::Declined(Gate::Play)),
            Answer::Cancelled => return Ok(self.interrupted()),
        }

        // Playing -> Finished
        self.transition(PlaybackState::Playing);
        if !self.pause(self.config.lead_in).await {
            return Ok(self.interrupted());
        }
        for t in start..tick_count {
            let Some(pose) = trajectory.pose_at(t) else {
                break;
            };
            let (command, report) = self.envelope.clamp_body(&pose);
            log_violations("playback", &report);
            self.session.tick_violations = report.count();
            self.session.total_violations += report.count();

            if self.cancel.is_cancelled() {
                return Ok(self.interrupted());
            }
            rig.dispatch(&command, &PLAY_ORDER)?;
            self.session.current_tick = Some(t);
            self.session.ticks_played += 1;
            tracing::debug!("tick {} / {} - violating {}", t, tick_count, report.count());

            if !self.pause(self.config.tick_period).await {
                return Ok(self.interrupted());
            }
        }
        // interrupting the final settle still counts as finished
        self.pause(self.config.settle_after_play).await;

        drop(rig);
        self.transition(PlaybackState::Finished);
        Ok(SessionOutcome::Finished(self.session.report()))
    }

    fn transition(&mut self, next: PlaybackState) {
        tracing::debug!("{} -> {}", self.session.state, next);
        self.session.state = next;
        self.session.history.push(next);
    }

    /// Wait for the operator, giving up if the session is cancelled first.
    ///
    /// A yes that arrives after a cancel still counts as cancelled.
    async fn ask(&mut self, gate: Gate, pose: &BodyPose) -> Answer {
        let prompt = GatePrompt {
            gate,
            pose,
            start_tick: self.session.start_tick,
            tick_count: self.session.tick_count,
            start_violations: self.session.start_violations,
        };
        let yes = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Answer::Cancelled,
            yes = self.confirm.confirm(&prompt) => yes,
        };
        if self.cancel.is_cancelled() {
            Answer::Cancelled
        } else if yes {
            Answer::Proceed
        } else {
            Answer::Decline
        }
    }

    /// Sleep for `delay`; `false` if the session was cancelled first.
    async fn pause(&self, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn interrupted(&self) -> SessionOutcome {
        SessionOutcome::Interrupted(self.session.report())
    }
}

fn log_violations(context: &str, report: &ClampReport) {
    for v in &report.violations {
        tracing::debug!(
            "{}: {} joint {} at {:.2} exceeds {:?} bound, clamped to {:.2}",
            context,
            v.group,
            v.joint,
            v.commanded,
            v.side,
            v.bound
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::ScriptedConfirm;
    use crate::sim_driver::{SimCommand, SimulatedRobot};
    use crate::trajectory::tests::temp_file;
    use std::path::Path;
    use tempfile::NamedTempFile;

    fn fast_config() -> PlaybackConfig {
        PlaybackConfig::new().encoder_attempts(3)
    }

    /// A human recording whose every tick stays inside the envelope.
    fn human_file(ticks: usize) -> NamedTempFile {
        let mut contents = String::new();
        for t in 0..ticks {
            let v = t as f64;
            // hip_pitch hip_roll knee ankle sh_pitch sh_roll sh_yaw elbow torso
            contents.push_str(&format!(
                "{} {} 0 {} 1 {} 0 0 {} {}\n",
                t,
                10.0 + v,
                -5.0 - v,
                -10.0 - v,
                20.0 + v,
                v * 0.5
            ));
        }
        temp_file(&contents)
    }

    fn controller(
        robot: &SimulatedRobot,
        answers: &[bool],
    ) -> PlaybackController<crate::sim_driver::SimulatedDriver, ScriptedConfirm> {
        PlaybackController::new(
            robot.driver(),
            ScriptedConfirm::new(answers.iter().copied()),
            fast_config(),
        )
    }

    fn human(path: impl AsRef<Path>) -> SessionRequest {
        SessionRequest::new(MotionSource::Human(path.as_ref().to_path_buf()))
    }

    /// Cancels the session while answering `gate`, then says yes anyway.
    struct CancelAt {
        gate: Gate,
        token: CancellationToken,
    }

    impl Confirmation for CancelAt {
        async fn confirm(&mut self, prompt: &GatePrompt<'_>) -> bool {
            if prompt.gate == self.gate {
                self.token.cancel();
            }
            true
        }
    }

    fn cancelling_controller(
        robot: &SimulatedRobot,
        gate: Gate,
    ) -> PlaybackController<crate::sim_driver::SimulatedDriver, CancelAt> {
        let token = CancellationToken::new();
        let confirm = CancelAt {
            gate,
            token: token.clone(),
        };
        PlaybackController::new(robot.driver(), confirm, fast_config()).with_cancellation(token)
    }

    /// Cancel the controller's token `after` the session starts.
    fn cancel_after<D: MotionDriver, C: Confirmation>(
        ctl: &PlaybackController<D, C>,
        after: Duration,
    ) {
        let token = ctl.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            token.cancel();
        });
    }

    fn assert_elapsed(from: &SimCommand, to: &SimCommand, expected: Duration) {
        let elapsed = to.at - from.at;
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(1),
            "expected {expected:?}, got {elapsed:?}"
        );
    }

    /// Playback commands: everything after the five starting-pose moves.
    fn playback_commands(robot: &SimulatedRobot) -> Vec<SimCommand> {
        robot.commands().into_iter().skip(5).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_session() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, true]);
        let outcome = ctl.run(&human(&human_file(4))).await.unwrap();

        let report = match outcome {
            SessionOutcome::Finished(report) => report,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(report.ticks_played, 4);
        assert_eq!(report.total_violations, 0);
        assert_eq!(
            ctl.session().history(),
            &[
                PlaybackState::Idle,
                PlaybackState::Loaded,
                PlaybackState::BaselineCaptured,
                PlaybackState::AwaitingStartConfirmation,
                PlaybackState::MovingToStart,
                PlaybackState::AwaitingPlayConfirmation,
                PlaybackState::Playing,
                PlaybackState::Finished,
            ]
        );
        assert_eq!(robot.commands().len(), 5 + 4 * 5);
        assert_eq!(robot.open_count(), 0);
        assert_eq!(robot.close_count(), 5);
        assert_eq!(ctl.confirmation().asked(), &[Gate::StartPose, Gate::Play]);
        for group in LimbGroup::ALL {
            assert!(robot.profile(group).is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_move_is_staged() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, false]);
        ctl.run(&human(&human_file(2))).await.unwrap();

        let commands = robot.commands();
        let groups: Vec<LimbGroup> = commands.iter().map(|c| c.group).collect();
        assert_eq!(
            groups,
            vec![
                LimbGroup::RightArm,
                LimbGroup::LeftArm,
                LimbGroup::RightLeg,
                LimbGroup::LeftLeg,
                LimbGroup::Torso,
            ]
        );
        let settle = ctl.config().settle;
        assert_elapsed(&commands[1], &commands[2], settle.arms);
        assert_elapsed(&commands[3], &commands[4], settle.legs);
        // start pose: mapped joints from tick 0, rest from the baseline
        assert_eq!(commands[0].joints, vec![-10.0, 30.0, 0.0, 20.0, 0.0, 0.0, 0.0]);
        assert_eq!(commands[2].joints, vec![10.0, 0.0, 0.0, -5.0, 1.0, 0.0]);
        assert_eq!(commands[4].joints, vec![0.0, 0.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decline_first_gate_sends_nothing() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[false]);
        let outcome = ctl.run(&human(&human_file(3))).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Declined(Gate::StartPose));
        assert!(robot.commands().is_empty());
        assert_eq!(robot.open_count(), 0);
        assert_eq!(robot.close_count(), 5);
        assert_eq!(ctl.state(), PlaybackState::Aborted);
        assert_eq!(ctl.confirmation().asked(), &[Gate::StartPose]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decline_second_gate_plays_nothing() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, false]);
        let outcome = ctl.run(&human(&human_file(3))).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Declined(Gate::Play));
        assert!(playback_commands(&robot).is_empty());
        assert_eq!(robot.open_count(), 0);
        assert_eq!(ctl.state(), PlaybackState::Aborted);
        assert_eq!(ctl.session().current_tick(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_at_last_tick_plays_one_tick() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, true]);
        let file = human_file(6);
        let request = human(&file).start_tick(5);
        let outcome = ctl.run(&request).await.unwrap();

        match outcome {
            SessionOutcome::Finished(report) => {
                assert_eq!(report.ticks_played, 1);
                assert_eq!(report.start_tick, 5);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let played = playback_commands(&robot);
        assert_eq!(played.len(), 5);
        let torso = played.iter().find(|c| c.group == LimbGroup::Torso).unwrap();
        assert_eq!(torso.joints, vec![0.0, 0.0, 2.5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_past_end_is_range_error() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, true]);
        let err = ctl
            .run(&human(&human_file(6)).start_tick(6))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlayerError::Range {
                start: 6,
                tick_count: 6
            }
        ));
        assert!(robot.commands().is_empty());
        assert_eq!(robot.open_count(), 0);
        assert_eq!(ctl.state(), PlaybackState::Aborted);
        assert!(ctl.confirmation().asked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_aborts_before_opening_drivers() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, true]);
        let path = std::env::temp_dir().join("body_player_no_such_recording.txt");
        let err = ctl.run(&human(&path)).await.unwrap_err();

        assert!(matches!(err, PlayerError::File { .. }));
        assert_eq!(robot.close_count(), 0);
        assert_eq!(
            ctl.session().history(),
            &[PlaybackState::Idle, PlaybackState::Aborted]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_evenly_spaced() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, true]);
        ctl.run(&human(&human_file(5))).await.unwrap();

        let played = playback_commands(&robot);
        let period = ctl.config().tick_period;
        for tick in played.chunks(5) {
            // all groups of a tick go out before the sleep
            assert!(tick.iter().all(|c| c.at == tick[0].at));
            let groups: Vec<LimbGroup> = tick.iter().map(|c| c.group).collect();
            assert_eq!(groups, PLAY_ORDER.to_vec());
        }
        for pair in played.chunks(5).collect::<Vec<_>>().windows(2) {
            assert_elapsed(&pair[0][0], &pair[1][0], period);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_violations_are_clamped_and_counted() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, true]);
        // tick 1: shoulder_pitch 100 exceeds arm max 6 on both arms
        let path = temp_file("0 10 0 -5 2 3 0 0 20 1\n1 10 0 -5 2 100 0 0 20 1\n");
        let outcome = ctl.run(&human(&path)).await.unwrap();

        match outcome {
            SessionOutcome::Finished(report) => {
                assert_eq!(report.total_violations, 2);
                assert_eq!(report.start_violations, 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let env = SafetyEnvelope::standard();
        for command in robot.commands() {
            for (value, bounds) in command.joints.iter().zip(env.bounds(command.group)) {
                assert!(*value >= bounds.min && *value <= bounds.max);
            }
        }
        let last_arm = playback_commands(&robot)
            .into_iter()
            .filter(|c| c.group == LimbGroup::RightArm)
            .last()
            .unwrap();
        assert_eq!(last_arm.joints[0], 6.0);
        assert_eq!(ctl.session().tick_violations(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_infeasible_start_is_clamped_before_the_gate() {
        let robot = SimulatedRobot::new("sim");
        // zero baseline: arm joints 1 and 3 sit below their lower bound
        for group in LimbGroup::ALL {
            robot.set_position(group, &vec![0.0; group.joint_count()]);
        }
        let mut ctl = controller(&robot, &[true, false]);
        ctl.run(&human(&temp_file("0 10 0 -5 2 3 0 0 0 1\n")))
            .await
            .unwrap();

        // elbow 0 and shoulder roll 0 on both arms
        assert_eq!(ctl.session().report().start_violations, 4);
        let right_arm = &robot.commands()[0];
        assert_eq!(right_arm.joints, vec![3.0, 15.0, 0.0, 15.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_encoder_failures_are_hidden() {
        let robot = SimulatedRobot::new("sim");
        robot.fail_encoder_reads(LimbGroup::Torso, 2);
        let mut ctl = controller(&robot, &[true, true]);
        let outcome = ctl.run(&human(&human_file(2))).await.unwrap();
        assert!(matches!(outcome, SessionOutcome::Finished(_)));
        assert_eq!(robot.encoder_reads(LimbGroup::Torso), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_timeout_aborts() {
        let robot = SimulatedRobot::new("sim");
        robot.fail_encoder_reads(LimbGroup::RightLeg, 50);
        let mut ctl = controller(&robot, &[true, true]);
        let err = ctl.run(&human(&human_file(2))).await.unwrap_err();

        assert!(matches!(
            err,
            PlayerError::EncoderTimeout {
                group: LimbGroup::RightLeg,
                attempts: 3,
                ..
            }
        ));
        assert!(robot.commands().is_empty());
        assert_eq!(robot.open_count(), 0);
        assert_eq!(ctl.state(), PlaybackState::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_move_aborts_and_releases() {
        let robot = SimulatedRobot::new("sim");
        robot.fail_moves(LimbGroup::Torso);
        let mut ctl = controller(&robot, &[true, true]);
        let err = ctl.run(&human(&human_file(2))).await.unwrap_err();

        assert!(matches!(
            err,
            PlayerError::Driver {
                group: LimbGroup::Torso,
                ..
            }
        ));
        assert_eq!(robot.open_count(), 0);
        assert_eq!(ctl.confirmation().asked(), &[Gate::StartPose]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_during_playback_releases_drivers() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, true]);
        let path = human_file(100);

        let config = ctl.config().clone();
        // cancel midway through tick 3's sleep
        let cancel_at = config.settle.arms
            + config.settle.legs
            + config.settle.torso
            + config.lead_in
            + config.tick_period * 3
            + config.tick_period / 2;
        cancel_after(&ctl, cancel_at);

        let outcome = ctl.run(&human(&path)).await.unwrap();
        match outcome {
            SessionOutcome::Interrupted(report) => {
                assert_eq!(report.ticks_played, 4);
                assert_eq!(report.last_tick, Some(3));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(playback_commands(&robot).len(), 4 * 5);
        assert_eq!(ctl.session().current_tick(), Some(3));
        assert_eq!(robot.open_count(), 0);
        assert_eq!(robot.close_count(), 5);
        assert_eq!(ctl.state(), PlaybackState::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_robot_recording_holds_legs() {
        let robot = SimulatedRobot::new("sim");
        let leg = [5.0, 10.0, 0.0, -20.0, 3.0, 1.0];
        robot.set_position(LimbGroup::LeftLeg, &leg);
        let mut fields: Vec<String> = (0..7).map(|_| "0".to_string()).collect();
        // torso, left arm, right arm columns, all inside the envelope
        fields.extend(
            [
                1.0, 30.0, 0.0, 0.0, -20.0, 25.0, 0.0, 0.0, 30.0, 0.0, 0.0, -20.0, 25.0, 0.0,
                0.0, 2.0, 0.0,
            ]
            .iter()
            .map(|v| v.to_string()),
        );
        let path = temp_file(&format!("{}\n", fields.join(" ")));

        let mut ctl = controller(&robot, &[true, true]);
        let request = SessionRequest::new(MotionSource::Robot(path.path().to_path_buf()));
        let outcome = ctl.run(&request).await.unwrap();
        assert!(matches!(outcome, SessionOutcome::Finished(_)));

        let played = playback_commands(&robot);
        let left_leg = played.iter().find(|c| c.group == LimbGroup::LeftLeg).unwrap();
        assert_eq!(left_leg.joints, leg.to_vec());
        let torso = played.iter().find(|c| c.group == LimbGroup::Torso).unwrap();
        assert_eq!(torso.joints, vec![1.0, 0.0, 2.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_at_start_gate_sends_nothing() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = cancelling_controller(&robot, Gate::StartPose);
        let outcome = ctl.run(&human(&human_file(3))).await.unwrap();

        match outcome {
            SessionOutcome::Interrupted(report) => assert_eq!(report.ticks_played, 0),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(robot.commands().is_empty());
        assert!(robot.profile(LimbGroup::RightArm).is_none());
        assert_eq!(robot.open_count(), 0);
        assert_eq!(ctl.state(), PlaybackState::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_at_play_gate_plays_nothing() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = cancelling_controller(&robot, Gate::Play);
        let outcome = ctl.run(&human(&human_file(3))).await.unwrap();

        assert!(matches!(outcome, SessionOutcome::Interrupted(_)));
        assert_eq!(robot.commands().len(), 5);
        assert!(playback_commands(&robot).is_empty());
        assert_eq!(robot.open_count(), 0);
        assert!(!ctl.session().history().contains(&PlaybackState::Playing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_while_arms_settle() {
        let robot = SimulatedRobot::new("sim");
        let mut ctl = controller(&robot, &[true, true]);
        cancel_after(&ctl, ctl.config().settle.arms / 2);

        let outcome = ctl.run(&human(&human_file(10))).await.unwrap();
        match outcome {
            SessionOutcome::Interrupted(report) => {
                assert_eq!(report.ticks_played, 0);
                assert_eq!(report.last_tick, None);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let groups: Vec<LimbGroup> = robot.commands().iter().map(|c| c.group).collect();
        assert_eq!(groups, vec![LimbGroup::RightArm, LimbGroup::LeftArm]);
        assert_eq!(robot.open_count(), 0);
        assert_eq!(robot.close_count(), 5);
        assert_eq!(ctl.confirmation().asked(), &[Gate::StartPose]);
        assert_eq!(ctl.state(), PlaybackState::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_during_encoder_retry() {
        let robot = SimulatedRobot::new("sim");
        robot.fail_encoder_reads(LimbGroup::Torso, 50);
        let mut ctl = controller(&robot, &[true, true]);
        // first backoff is 100ms, the second runs until 300ms
        cancel_after(&ctl, Duration::from_millis(150));

        let outcome = ctl.run(&human(&human_file(3))).await.unwrap();
        assert!(matches!(outcome, SessionOutcome::Interrupted(_)));
        assert_eq!(robot.encoder_reads(LimbGroup::Torso), 2);
        assert!(robot.commands().is_empty());
        assert_eq!(robot.open_count(), 0);
        assert!(ctl.confirmation().asked().is_empty());
        assert_eq!(
            ctl.session().history(),
            &[PlaybackState::Idle, PlaybackState::Loaded, PlaybackState::Aborted]
        );
    }
}
