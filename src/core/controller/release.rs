//! Release and shutdown.

use tracing::{info, warn};

use crate::core::{ControllerError, ControllerResult, ControllerState, ExperimentController};
use crate::infra::SerializeFormat;
use crate::resource::ResourceState;
use crate::util::Guid;

impl ExperimentController {
    /// Release `guids` (default: every registered resource) and move the
    /// controller to `RELEASED`.
    ///
    /// Blocks until the resources are released or the controller fails.
    /// Persists the experiment if configured to, then forgets the released
    /// resources flagged `hardRelease`. A no-op once the controller is `RELEASED`.
    ///
    /// # Errors
    ///
    /// `UnknownResource`, or persistence failures.
    pub fn release(&self, guids: Option<&[Guid]>) -> ControllerResult<()> {
        let _releasing = self.release_guard.lock();
        if matches!(
            self.state(),
            ControllerState::Released | ControllerState::Terminated
        ) {
            return Ok(());
        }

        let guids = match guids {
            Some(guids) => {
                self.check_known(guids)?;
                guids.to_vec()
            }
            None => self.resources(),
        };

        for &guid in &guids {
            self.schedule_release(guid);
        }
        let released = self.wait_released(&guids)?;
        if released.len() < guids.len() {
            warn!(
                released = released.len(),
                requested = guids.len(),
                "not every resource reached RELEASED"
            );
        }

        if self.config.persist {
            self.save(SerializeFormat::Json)?;
        }

        let hard: Vec<Guid> = released
            .iter()
            .copied()
            .filter(|&guid| {
                self.get_resource(guid).is_ok_and(|rm| {
                    rm.state() == ResourceState::Released && rm.core().hard_release()
                })
            })
            .collect();
        for &guid in &hard {
            if let Err(err) = self.remove_resource(guid) {
                warn!(guid = guid, error = %err, "hard-released resource already removed");
            }
        }

        if self.transition(ControllerState::Released) {
            info!(
                exp_id = %self.exp_id,
                released = released.len(),
                forgotten = hard.len(),
                "experiment released"
            );
        }
        Ok(())
    }

    /// Cancel pending work, release everything, stop the scheduling loop and
    /// wait for the worker pool to drain.
    ///
    /// Must not be called from a task callback.
    ///
    /// # Errors
    ///
    /// `ControllerFailed` if the scheduling loop has failed; release errors.
    pub fn shutdown(&self) -> ControllerResult<()> {
        match self.state() {
            ControllerState::Failed => return Err(ControllerError::ControllerFailed),
            ControllerState::Terminated => return Ok(()),
            ControllerState::Running | ControllerState::Released => {}
        }

        let cancelled = self.dispatcher.clear();
        let discarded = self.dispatcher.pool().empty();
        self.release(None)?;

        self.transition(ControllerState::Terminated);
        self.stop_loop();
        self.dispatcher.pool().sync();

        info!(
            exp_id = %self.exp_id,
            cancelled = cancelled,
            discarded = discarded,
            "experiment controller terminated"
        );
        Ok(())
    }
}
