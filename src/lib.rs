//! body-player - replay of recorded whole-body joint trajectories.
//!
//! Loads a recorded motion (a reduced human recording or a full robot-space
//! recording), composes it onto the robot's measured posture, clamps every
//! pose to a fixed per-joint safety envelope and streams it to the five limb
//! groups at a fixed tick rate, behind two operator confirmations.
//!
//! - [`trajectory`]: file loaders for both recording formats
//! - [`compose`]: human-to-robot joint mapping over a baseline pose
//! - [`safety`]: per-joint bounds and clamping with violation reports
//! - [`driver`]: the [`MotionDriver`](driver::MotionDriver) seam and scoped limb handles
//! - [`player`]: the confirmation-gated playback state machine
//! - [`sim_driver`]: an in-process simulated robot
//!
//! # Quick Start
//!
//! ```no_run
//! use body_player::{AutoConfirm, MotionSource, PlaybackConfig, PlaybackController};
//! use body_player::{SessionRequest, SimulatedRobot};
//!
//! # async fn example() -> Result<(), body_player::PlayerError> {
//! let robot = SimulatedRobot::new("icubGazeboSim");
//! let mut controller = PlaybackController::new(robot.driver(), AutoConfirm, PlaybackConfig::new());
//!
//! let request = SessionRequest::new(MotionSource::Human("jointAngles_noheader.txt".into()))
//!     .start_tick(0);
//! let outcome = controller.run(&request).await?;
//! # Ok(())
//! # }
//! ```

pub mod compose;
pub mod config;
pub mod confirm;
pub mod driver;
pub mod error;
pub mod limb;
pub mod player;
pub mod safety;
pub mod sim_driver;
pub mod trajectory;

pub use config::{MotionProfile, PlaybackConfig, RetryPolicy, SettleDelays};
pub use confirm::{AutoConfirm, Confirmation, ConsolePrompt, Gate};
pub use driver::{LimbHandle, MotionDriver};
pub use error::{DriverError, EncoderReadError, PlayerError};
pub use limb::{BodyPose, LimbGroup};
pub use player::{
    MotionSource, PlaybackController, PlaybackReport, PlaybackState, SessionOutcome,
    SessionRequest,
};
pub use safety::{ClampReport, SafetyEnvelope};
pub use sim_driver::SimulatedRobot;
pub use trajectory::{
    load_full_trajectory, load_reduced_trajectory, ReducedHumanTrajectory, Trajectory,
};
