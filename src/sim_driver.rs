//! In-process simulated robot.
//!
//! Drop-in [`MotionDriver`] that needs no hardware or middleware. Each limb
//! group keeps a joint vector that jumps to every commanded position, and
//! every command is logged so a session can be inspected afterwards. Faults
//! can be injected per limb group: failed opens, transient encoder failures,
//! rejected moves and wrong joint counts.
//!
//! # Example
//!
//! ```
//! use body_player::driver::{LimbHandle, MotionDriver};
//! use body_player::limb::LimbGroup;
//! use body_player::sim_driver::SimulatedRobot;
//!
//! let robot = SimulatedRobot::new("icubSim");
//! let mut driver = robot.driver();
//! let mut torso = driver.open(LimbGroup::Torso).unwrap();
//! torso.position_move(&[5.0, 0.0, 10.0]).unwrap();
//! assert_eq!(robot.position(LimbGroup::Torso), vec![5.0, 0.0, 10.0]);
//! assert_eq!(robot.commands().len(), 1);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::Instant;

use crate::config::MotionProfile;
use crate::driver::{LimbHandle, MotionDriver};
use crate::error::{DriverError, EncoderReadError};
use crate::limb::{BodyPose, LimbGroup};

/// One position command received by the simulated robot.
#[derive(Clone, Debug, PartialEq)]
pub struct SimCommand {
    pub group: LimbGroup,
    pub joints: Vec<f64>,
    pub at: Instant,
}

#[derive(Clone, Default)]
struct LimbState {
    position: Vec<f64>,
    open: bool,
    profile: Option<MotionProfile>,
    encoder_reads: u32,
    failing_reads: u32,
    fail_open: bool,
    fail_moves: bool,
    reported_joints: Option<usize>,
}

struct SimState {
    name: String,
    limbs: [LimbState; 5],
    commands: Vec<SimCommand>,
    closes: usize,
}

/// Shared handle to the simulated robot's state.
///
/// Clones share the same robot; hand one to the controller through
/// [`SimulatedRobot::driver`] and keep another for inspection.
#[derive(Clone)]
pub struct SimulatedRobot {
    state: Arc<Mutex<SimState>>,
}

/// A reasonable resting posture, inside the safety envelope.
pub fn home_pose() -> BodyPose {
    let mut pose = BodyPose::zeros();
    for arm in [LimbGroup::RightArm, LimbGroup::LeftArm] {
        pose.group_mut(arm).copy_from_slice(&[-30.0, 30.0, 0.0, 45.0, 0.0, 0.0, 0.0]);
    }
    pose
}

impl SimulatedRobot {
    /// Create a robot named `name`, resting at [`home_pose`].
    pub fn new(name: &str) -> Self {
        let home = home_pose();
        let limbs = LimbGroup::ALL.map(|g| LimbState {
            position: home.group(g).to_vec(),
            ..Default::default()
        });
        Self {
            state: Arc::new(Mutex::new(SimState {
                name: name.to_string(),
                limbs,
                commands: Vec::new(),
                closes: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A driver that opens limbs of this robot.
    pub fn driver(&self) -> SimulatedDriver {
        SimulatedDriver {
            robot: self.clone(),
        }
    }

    /// Overwrite a group's current joint angles.
    pub fn set_position(&self, group: LimbGroup, joints: &[f64]) {
        self.lock().limbs[group.index()].position = joints.to_vec();
    }

    pub fn position(&self, group: LimbGroup) -> Vec<f64> {
        self.lock().limbs[group.index()].position.clone()
    }

    /// Fail the next `count` encoder reads of `group`.
    pub fn fail_encoder_reads(&self, group: LimbGroup, count: u32) {
        self.lock().limbs[group.index()].failing_reads = count;
    }

    /// Make opening `group` fail.
    pub fn fail_open(&self, group: LimbGroup) {
        self.lock().limbs[group.index()].fail_open = true;
    }

    /// Reject every position command for `group`.
    pub fn fail_moves(&self, group: LimbGroup) {
        self.lock().limbs[group.index()].fail_moves = true;
    }

    /// Report `joints` as the joint count of `group`.
    pub fn report_joint_count(&self, group: LimbGroup, joints: usize) {
        self.lock().limbs[group.index()].reported_joints = Some(joints);
    }

    /// Encoder reads attempted on `group`, successful or not.
    pub fn encoder_reads(&self, group: LimbGroup) -> u32 {
        self.lock().limbs[group.index()].encoder_reads
    }

    pub fn is_open(&self, group: LimbGroup) -> bool {
        self.lock().limbs[group.index()].open
    }

    /// Number of limb handles currently open.
    pub fn open_count(&self) -> usize {
        self.lock().limbs.iter().filter(|l| l.open).count()
    }

    /// Number of handles closed so far.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// The motion profile last applied to `group`.
    pub fn profile(&self, group: LimbGroup) -> Option<MotionProfile> {
        self.lock().limbs[group.index()].profile
    }

    /// Every position command received, in arrival order.
    pub fn commands(&self) -> Vec<SimCommand> {
        self.lock().commands.clone()
    }
}

/// [`MotionDriver`] for a [`SimulatedRobot`].
pub struct SimulatedDriver {
    robot: SimulatedRobot,
}

impl MotionDriver for SimulatedDriver {
    type Handle = SimulatedLimb;

    fn open(&mut self, group: LimbGroup) -> Result<SimulatedLimb, DriverError> {
        let mut state = self.robot.lock();
        let remote = format!("/{}/{}", state.name, group.part_name());
        let limb = &mut state.limbs[group.index()];
        if limb.fail_open {
            return Err(DriverError::Connect(remote));
        }
        if limb.open {
            return Err(DriverError::Interface(format!("{} is already in use", remote)));
        }
        limb.open = true;
        tracing::trace!("simulated {} opened", remote);
        Ok(SimulatedLimb {
            group,
            robot: self.robot.clone(),
            closed: false,
        })
    }
}

/// One open limb of a [`SimulatedRobot`].
pub struct SimulatedLimb {
    group: LimbGroup,
    robot: SimulatedRobot,
    closed: bool,
}

impl LimbHandle for SimulatedLimb {
    fn joint_count(&self) -> usize {
        self.robot.lock().limbs[self.group.index()]
            .reported_joints
            .unwrap_or(self.group.joint_count())
    }

    fn get_encoders(&mut self) -> Result<Vec<f64>, EncoderReadError> {
        let mut state = self.robot.lock();
        let limb = &mut state.limbs[self.group.index()];
        limb.encoder_reads += 1;
        if limb.failing_reads > 0 {
            limb.failing_reads -= 1;
            return Err(EncoderReadError(format!("{} encoders not ready", self.group)));
        }
        Ok(limb.position.clone())
    }

    fn configure(&mut self, profile: &MotionProfile) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.robot.lock().limbs[self.group.index()].profile = Some(*profile);
        Ok(())
    }

    fn position_move(&mut self, joints: &[f64]) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        let mut state = self.robot.lock();
        let limb = &mut state.limbs[self.group.index()];
        if limb.fail_moves {
            return Err(DriverError::Rejected(format!(
                "{} is not in position mode",
                self.group
            )));
        }
        limb.position = joints.to_vec();
        state.commands.push(SimCommand {
            group: self.group,
            joints: joints.to_vec(),
            at: Instant::now(),
        });
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = self.robot.lock();
        state.limbs[self.group.index()].open = false;
        state.closes += 1;
    }
}
